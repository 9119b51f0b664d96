pub mod attachments;
pub mod events;
pub mod users;

use axum::response::{Html, IntoResponse, Redirect, Response};
use axum_login::tower_sessions::Session;
use minijinja::{Value, context};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};

use crate::{
    entities::user, error::AppResult, flash, permissions, router::AppState,
};

/// Renders a page, adding the values the layout needs: the signed-in user,
/// whether they may create events, and any pending flash messages.
pub async fn render(
    state: &AppState,
    session: &Session,
    user: Option<&user::Model>,
    name: &str,
    ctx: Value,
) -> AppResult<Response> {
    let can_create_events = match user {
        Some(user) => permissions::can_create_events(&state.db, user).await?,
        None => false,
    };
    let messages = flash::take(session).await?;

    let tmpl = state.templates.get_template(name)?;
    let html = tmpl.render(context! {
        current_user => user,
        can_create_events => can_create_events,
        messages => messages,
        ..ctx
    })?;
    Ok(Html(html).into_response())
}

/// Sends anonymous visitors to the login page, coming back to `next` after.
pub fn login_redirect(next: &str) -> Response {
    let next = utf8_percent_encode(next, NON_ALPHANUMERIC);
    Redirect::to(&format!("/users/login?next={next}")).into_response()
}

/// Flashes an error and redirects, the response to every denied action.
pub async fn deny(session: &Session, message: &str, to: &str) -> AppResult<Response> {
    flash::error(session, message).await?;
    Ok(Redirect::to(to).into_response())
}

pub async fn done(session: &Session, message: impl Into<String>, to: &str) -> AppResult<Response> {
    flash::success(session, message).await?;
    Ok(Redirect::to(to).into_response())
}

pub fn event_url(event_id: i32) -> String {
    format!("/event/{event_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_redirect_encodes_next() {
        let response = login_redirect("/event/3/update?x=1");
        let location = response.headers()["location"].to_str().unwrap();
        assert_eq!(location, "/users/login?next=%2Fevent%2F3%2Fupdate%3Fx%3D1");
    }
}
