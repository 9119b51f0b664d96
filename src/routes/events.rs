use axum::{
    Form, Router,
    extract::{OriginalUri, Path, Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use axum_login::tower_sessions::Session;
use minijinja::context;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use sea_orm::Iterable;

use super::{deny, done, event_url, login_redirect, render};
use crate::{
    auth::user::AuthSession,
    entities::{event, event::EventStatus, user},
    error::AppResult,
    events::{
        listing::{self, ListParams, ListQuery},
        participation,
        service::{self, EventError},
    },
    flash,
    forms::{CommentForm, EventForm, FormErrors},
    permissions,
    router::AppState,
    users,
};

const NOT_ORGANIZER: &str = "Only the organizer can change this event.";

const SORT_OPTIONS: [(&str, &str); 6] = [
    ("-start_date", "Newest start date"),
    ("start_date", "Oldest start date"),
    ("title", "Title A-Z"),
    ("-title", "Title Z-A"),
    ("-participants_count", "Most participants"),
    ("-created_at", "Recently added"),
];

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(event_list))
        .route("/event/new", get(create_form).post(create_submit))
        .route("/event/{id}", get(event_detail))
        .route("/event/{id}/update", get(update_form).post(update_submit))
        .route("/event/{id}/delete", get(delete_confirm).post(delete_submit))
        .route("/event/{id}/participate", post(participate))
        .route("/event/{id}/comment", post(add_comment))
        .route("/my-events", get(my_events))
}

/// Query string that keeps the active filters when paging.
fn filter_query(query: &ListQuery) -> String {
    let mut parts = Vec::new();
    if let Some(id) = query.category_id {
        parts.push(format!("category={id}"));
    }
    if let Some(search) = &query.search {
        parts.push(format!("search={}", utf8_percent_encode(search, NON_ALPHANUMERIC)));
    }
    parts.push(format!("sort={}", query.sort.as_param()));
    parts.join("&")
}

async fn event_list(
    State(state): State<AppState>,
    auth_session: AuthSession,
    session: Session,
    Query(params): Query<ListParams>,
) -> AppResult<Response> {
    let query = ListQuery::from(&params);
    let page = listing::list_published(&state.db, &query).await?;
    let categories = users::list_categories(&state.db).await?;

    render(
        &state,
        &session,
        auth_session.user.as_ref(),
        "events/list.html",
        context! {
            page => page,
            categories => categories,
            selected_category => query.category_id,
            search => query.search,
            sort => query.sort.as_param(),
            sort_options => SORT_OPTIONS,
            filter_query => filter_query(&query),
        },
    )
    .await
}

async fn event_detail(
    State(state): State<AppState>,
    auth_session: AuthSession,
    session: Session,
    Path(id): Path<i32>,
) -> AppResult<Response> {
    let detail = service::event_detail(&state.db, id, auth_session.user.as_ref()).await?;
    render(
        &state,
        &session,
        auth_session.user.as_ref(),
        "events/detail.html",
        context! { detail => detail },
    )
    .await
}

async fn render_event_form(
    state: &AppState,
    session: &Session,
    user: &user::Model,
    form: EventForm,
    errors: FormErrors,
    event: Option<&event::Model>,
) -> AppResult<Response> {
    let categories = users::list_categories(&state.db).await?;
    let statuses: Vec<(&str, &str)> = EventStatus::iter().map(|s| (s.as_str(), s.label())).collect();
    render(
        state,
        session,
        Some(user),
        "events/form.html",
        context! {
            form => form,
            errors => errors,
            event => event,
            categories_exist => !categories.is_empty(),
            categories => categories,
            statuses => statuses,
        },
    )
    .await
}

async fn create_form(
    State(state): State<AppState>,
    auth_session: AuthSession,
    session: Session,
    OriginalUri(uri): OriginalUri,
) -> AppResult<Response> {
    let Some(user) = auth_session.user else {
        return Ok(login_redirect(uri.path()));
    };
    if !permissions::can_create_events(&state.db, &user).await? {
        return deny(&session, "You do not have permission to create events.", "/").await;
    }
    render_event_form(&state, &session, &user, EventForm::blank(), FormErrors::default(), None).await
}

async fn create_submit(
    State(state): State<AppState>,
    auth_session: AuthSession,
    session: Session,
    OriginalUri(uri): OriginalUri,
    Form(form): Form<EventForm>,
) -> AppResult<Response> {
    let Some(user) = auth_session.user else {
        return Ok(login_redirect(uri.path()));
    };
    let category_ids = service::category_ids(&state.db).await?;
    let input = match form.validate(&category_ids) {
        Ok(input) => input,
        Err(errors) => return render_event_form(&state, &session, &user, form, errors, None).await,
    };

    match service::create_event(&state.db, &user, input).await {
        Ok(event) => done(&session, "Event created!", &event_url(event.id)).await,
        Err(EventError::CannotCreate) => {
            deny(&session, "You do not have permission to create events.", "/").await
        }
        Err(err) => Err(err.into()),
    }
}

async fn update_form(
    State(state): State<AppState>,
    auth_session: AuthSession,
    session: Session,
    OriginalUri(uri): OriginalUri,
    Path(id): Path<i32>,
) -> AppResult<Response> {
    let Some(user) = auth_session.user else {
        return Ok(login_redirect(uri.path()));
    };
    let event = service::find_event(&state.db, id).await?;
    if !permissions::is_organizer(&user, &event) {
        return deny(&session, NOT_ORGANIZER, &event_url(id)).await;
    }
    let form = EventForm::from_model(&event);
    render_event_form(&state, &session, &user, form, FormErrors::default(), Some(&event)).await
}

async fn update_submit(
    State(state): State<AppState>,
    auth_session: AuthSession,
    session: Session,
    OriginalUri(uri): OriginalUri,
    Path(id): Path<i32>,
    Form(form): Form<EventForm>,
) -> AppResult<Response> {
    let Some(user) = auth_session.user else {
        return Ok(login_redirect(uri.path()));
    };
    let event = service::find_event(&state.db, id).await?;
    if !permissions::is_organizer(&user, &event) {
        return deny(&session, NOT_ORGANIZER, &event_url(id)).await;
    }
    let category_ids = service::category_ids(&state.db).await?;
    let input = match form.validate(&category_ids) {
        Ok(input) => input,
        Err(errors) => {
            return render_event_form(&state, &session, &user, form, errors, Some(&event)).await;
        }
    };

    match service::update_event(&state.db, &user, id, input).await {
        Ok(event) => done(&session, "Event updated!", &event_url(event.id)).await,
        Err(EventError::NotOrganizer { event_id }) => {
            deny(&session, NOT_ORGANIZER, &event_url(event_id)).await
        }
        Err(err) => Err(err.into()),
    }
}

async fn delete_confirm(
    State(state): State<AppState>,
    auth_session: AuthSession,
    session: Session,
    OriginalUri(uri): OriginalUri,
    Path(id): Path<i32>,
) -> AppResult<Response> {
    let Some(user) = auth_session.user else {
        return Ok(login_redirect(uri.path()));
    };
    let event = service::find_event(&state.db, id).await?;
    if !permissions::is_organizer(&user, &event) {
        return deny(&session, NOT_ORGANIZER, &event_url(id)).await;
    }
    render(
        &state,
        &session,
        Some(&user),
        "events/confirm_delete.html",
        context! { event => event },
    )
    .await
}

async fn delete_submit(
    State(state): State<AppState>,
    auth_session: AuthSession,
    session: Session,
    OriginalUri(uri): OriginalUri,
    Path(id): Path<i32>,
) -> AppResult<Response> {
    let Some(user) = auth_session.user else {
        return Ok(login_redirect(uri.path()));
    };
    match service::delete_event(&state.db, &state.store, &user, id).await {
        Ok(_) => done(&session, "Event deleted!", "/").await,
        Err(EventError::NotOrganizer { event_id }) => {
            deny(&session, NOT_ORGANIZER, &event_url(event_id)).await
        }
        Err(err) => Err(err.into()),
    }
}

async fn participate(
    State(state): State<AppState>,
    auth_session: AuthSession,
    session: Session,
    Path(id): Path<i32>,
) -> AppResult<Response> {
    let Some(user) = auth_session.user else {
        return Ok(login_redirect(&event_url(id)));
    };
    let event = service::find_event(&state.db, id).await?;
    let outcome = participation::toggle(&state.db, user.id, event.id).await?;
    done(&session, outcome.message(), &event_url(event.id)).await
}

async fn add_comment(
    State(state): State<AppState>,
    auth_session: AuthSession,
    session: Session,
    Path(id): Path<i32>,
    Form(form): Form<CommentForm>,
) -> AppResult<Response> {
    let Some(user) = auth_session.user else {
        return Ok(login_redirect(&event_url(id)));
    };
    let event = service::find_event(&state.db, id).await?;
    match form.validate() {
        Ok(content) => {
            service::add_comment(&state.db, &user, event.id, content).await?;
            flash::success(&session, "Comment added!").await?;
        }
        Err(_) => flash::error(&session, "A comment cannot be empty.").await?,
    }
    Ok(Redirect::to(&event_url(event.id)).into_response())
}

async fn my_events(
    State(state): State<AppState>,
    auth_session: AuthSession,
    session: Session,
    OriginalUri(uri): OriginalUri,
) -> AppResult<Response> {
    let Some(user) = auth_session.user else {
        return Ok(login_redirect(uri.path()));
    };
    let mine = service::my_events(&state.db, &user).await?;
    render(
        &state,
        &session,
        Some(&user),
        "events/my_events.html",
        context! {
            organized_events => mine.organized_events,
            participating_events => mine.participating_events,
        },
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_query_keeps_filters_for_paging() {
        let query = ListQuery::from(&ListParams {
            category: Some("4".into()),
            search: Some(" jazz & blues ".into()),
            sort: Some("title".into()),
            page: Some("2".into()),
        });
        assert_eq!(filter_query(&query), "category=4&search=jazz%20%26%20blues&sort=title");

        let query = ListQuery::from(&ListParams::default());
        assert_eq!(filter_query(&query), "sort=-start_date");
    }
}
