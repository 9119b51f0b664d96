use axum::{
    Form, Router,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use axum_login::tower_sessions::Session;
use minijinja::context;
use serde::Deserialize;
use tracing::info;

use super::user::{AuthSession, Credentials};
use crate::{
    error::AppResult,
    flash,
    forms::{FormErrors, RegisterForm},
    router::AppState,
    routes::render,
    users::{self, UserError},
};

// This allows us to extract the "next" field from the query string. We use this
// to redirect after log in.
#[derive(Debug, Deserialize)]
pub struct NextUrl {
    next: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", get(self::get::login).post(self::post::login))
        .route("/logout", get(self::get::logout))
        .route("/register", get(self::get::register).post(self::post::register))
}

/// Only same-site paths are followed after login.
fn safe_next(next: Option<&str>) -> Option<&str> {
    next.filter(|n| n.starts_with('/') && !n.starts_with("//") && !n.contains('\\'))
}

mod post {
    use super::*;

    pub async fn login(
        State(state): State<AppState>,
        mut auth_session: AuthSession,
        session: Session,
        Form(creds): Form<Credentials>,
    ) -> AppResult<Response> {
        let next = safe_next(creds.next.as_deref()).map(str::to_string);
        let username = creds.username.clone();

        let Some(user) = auth_session.authenticate(creds).await? else {
            info!(username = %username, "failed login");
            return render(
                &state,
                &session,
                None,
                "users/login.html",
                context! {
                    username => username,
                    next => next,
                    error => "Please enter a correct username and password.",
                },
            )
            .await;
        };

        auth_session.login(&user).await?;
        info!(user_id = user.id, "logged in");
        Ok(Redirect::to(next.as_deref().unwrap_or("/")).into_response())
    }

    pub async fn register(
        State(state): State<AppState>,
        mut auth_session: AuthSession,
        session: Session,
        Form(form): Form<RegisterForm>,
    ) -> AppResult<Response> {
        let input = match form.validate() {
            Ok(input) => input,
            Err(errors) => return render_register(&state, &session, form, errors).await,
        };

        match users::register(&state.db, input).await {
            Ok(user) => {
                auth_session.login(&user).await?;
                flash::success(&session, "Your account has been created!").await?;
                Ok(Redirect::to("/").into_response())
            }
            Err(UserError::UsernameTaken) => {
                let mut errors = FormErrors::default();
                errors.add("username", "A user with that username already exists.");
                render_register(&state, &session, form, errors).await
            }
            Err(err) => Err(err.into()),
        }
    }
}

mod get {
    use super::*;

    pub async fn login(
        State(state): State<AppState>,
        auth_session: AuthSession,
        session: Session,
        Query(NextUrl { next }): Query<NextUrl>,
    ) -> AppResult<Response> {
        let next = safe_next(next.as_deref()).map(str::to_string);
        if auth_session.user.is_some() {
            return Ok(Redirect::to(next.as_deref().unwrap_or("/")).into_response());
        }
        render(&state, &session, None, "users/login.html", context! { next => next }).await
    }

    pub async fn logout(mut auth_session: AuthSession, session: Session) -> AppResult<Response> {
        auth_session.logout().await?;
        flash::success(&session, "You have been logged out!").await?;
        Ok(Redirect::to("/").into_response())
    }

    pub async fn register(
        State(state): State<AppState>,
        auth_session: AuthSession,
        session: Session,
    ) -> AppResult<Response> {
        if auth_session.user.is_some() {
            return Ok(Redirect::to("/").into_response());
        }
        render_register(&state, &session, RegisterForm::default(), FormErrors::default()).await
    }
}

async fn render_register(
    state: &AppState,
    session: &Session,
    form: RegisterForm,
    errors: FormErrors,
) -> AppResult<Response> {
    render(
        state,
        session,
        None,
        "users/register.html",
        context! { form => form, errors => errors },
    )
    .await
}
