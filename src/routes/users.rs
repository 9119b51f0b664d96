use axum::{
    Form, Router,
    extract::{OriginalUri, Path, State},
    response::Response,
    routing::{get, post},
};
use axum_login::tower_sessions::Session;
use minijinja::context;

use super::{deny, done, login_redirect, render};
use crate::{
    auth::user::AuthSession,
    entities::user,
    error::AppResult,
    forms::{CategoryForm, FormErrors, PermissionsForm, ProfileForm},
    permissions,
    router::AppState,
    users::{self, UserError},
};

const MANAGEMENT_URL: &str = "/users/management";
const CATEGORIES_URL: &str = "/users/categories";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/profile", get(profile).post(update_profile))
        .route("/management", get(management))
        .route("/toggle-permission/{user_id}", post(toggle_permission))
        .route(
            "/edit-permissions/{user_id}",
            get(edit_permissions).post(save_permissions),
        )
        .route("/categories", get(categories).post(create_category))
        .route("/categories/{id}/delete", post(delete_category))
}

/// Either the signed-in superuser or the response that turns everyone else away.
async fn require_superuser(
    auth_session: AuthSession,
    session: &Session,
    next: &str,
) -> AppResult<Result<user::Model, Response>> {
    match auth_session.user {
        Some(user) if permissions::is_superuser(Some(&user)) => Ok(Ok(user)),
        Some(_) => Ok(Err(
            deny(session, "Only administrators can manage users.", "/").await?,
        )),
        None => Ok(Err(login_redirect(next))),
    }
}

async fn render_profile(
    state: &AppState,
    session: &Session,
    user: &user::Model,
    form: ProfileForm,
    errors: FormErrors,
) -> AppResult<Response> {
    render(
        state,
        session,
        Some(user),
        "users/profile.html",
        context! { form => form, errors => errors },
    )
    .await
}

async fn profile(
    State(state): State<AppState>,
    auth_session: AuthSession,
    session: Session,
    OriginalUri(uri): OriginalUri,
) -> AppResult<Response> {
    let Some(user) = auth_session.user else {
        return Ok(login_redirect(uri.path()));
    };
    let profile = users::profile_for(&state.db, user.id).await?;
    let form = ProfileForm {
        username: user.username.clone(),
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
        email: user.email.clone(),
        bio: profile.bio,
        phone: profile.phone,
    };
    render_profile(&state, &session, &user, form, FormErrors::default()).await
}

async fn update_profile(
    State(state): State<AppState>,
    auth_session: AuthSession,
    session: Session,
    OriginalUri(uri): OriginalUri,
    Form(form): Form<ProfileForm>,
) -> AppResult<Response> {
    let Some(user) = auth_session.user else {
        return Ok(login_redirect(uri.path()));
    };
    let input = match form.validate() {
        Ok(input) => input,
        Err(errors) => return render_profile(&state, &session, &user, form, errors).await,
    };

    match users::update_profile(&state.db, &user, input).await {
        Ok(_) => done(&session, "Your profile has been updated!", "/users/profile").await,
        Err(UserError::UsernameTaken) => {
            let mut errors = FormErrors::default();
            errors.add("username", "A user with that username already exists.");
            render_profile(&state, &session, &user, form, errors).await
        }
        Err(err) => Err(err.into()),
    }
}

async fn management(
    State(state): State<AppState>,
    auth_session: AuthSession,
    session: Session,
    OriginalUri(uri): OriginalUri,
) -> AppResult<Response> {
    let admin = match require_superuser(auth_session, &session, uri.path()).await? {
        Ok(admin) => admin,
        Err(response) => return Ok(response),
    };
    let users = users::list_users(&state.db).await?;
    render(
        &state,
        &session,
        Some(&admin),
        "users/management.html",
        context! { users => users },
    )
    .await
}

async fn toggle_permission(
    State(state): State<AppState>,
    auth_session: AuthSession,
    session: Session,
    Path(user_id): Path<i32>,
) -> AppResult<Response> {
    if let Err(response) = require_superuser(auth_session, &session, MANAGEMENT_URL).await? {
        return Ok(response);
    }
    let (target, allowed) = users::toggle_event_permission(&state.db, user_id).await?;
    let action = if allowed { "granted to" } else { "revoked from" };
    done(
        &session,
        format!("Event creation permission {action} {}", target.username),
        MANAGEMENT_URL,
    )
    .await
}

async fn edit_permissions(
    State(state): State<AppState>,
    auth_session: AuthSession,
    session: Session,
    OriginalUri(uri): OriginalUri,
    Path(user_id): Path<i32>,
) -> AppResult<Response> {
    let admin = match require_superuser(auth_session, &session, uri.path()).await? {
        Ok(admin) => admin,
        Err(response) => return Ok(response),
    };
    let target = users::find_user(&state.db, user_id).await?;
    let profile = users::profile_for(&state.db, user_id).await?;
    render(
        &state,
        &session,
        Some(&admin),
        "users/edit_permissions.html",
        context! {
            target => target,
            can_create => profile.can_create_events,
        },
    )
    .await
}

async fn save_permissions(
    State(state): State<AppState>,
    auth_session: AuthSession,
    session: Session,
    Path(user_id): Path<i32>,
    Form(form): Form<PermissionsForm>,
) -> AppResult<Response> {
    if let Err(response) = require_superuser(auth_session, &session, MANAGEMENT_URL).await? {
        return Ok(response);
    }
    let target = users::find_user(&state.db, user_id).await?;
    users::set_event_permission(&state.db, target.id, form.can_create_events()).await?;
    done(
        &session,
        format!("Permissions for {} have been updated!", target.username),
        MANAGEMENT_URL,
    )
    .await
}

async fn render_categories(
    state: &AppState,
    session: &Session,
    admin: &user::Model,
    form: CategoryForm,
    errors: FormErrors,
) -> AppResult<Response> {
    let categories = users::list_categories(&state.db).await?;
    render(
        state,
        session,
        Some(admin),
        "users/categories.html",
        context! { categories => categories, form => form, errors => errors },
    )
    .await
}

async fn categories(
    State(state): State<AppState>,
    auth_session: AuthSession,
    session: Session,
    OriginalUri(uri): OriginalUri,
) -> AppResult<Response> {
    let admin = match require_superuser(auth_session, &session, uri.path()).await? {
        Ok(admin) => admin,
        Err(response) => return Ok(response),
    };
    render_categories(&state, &session, &admin, CategoryForm::default(), FormErrors::default()).await
}

async fn create_category(
    State(state): State<AppState>,
    auth_session: AuthSession,
    session: Session,
    Form(form): Form<CategoryForm>,
) -> AppResult<Response> {
    let admin = match require_superuser(auth_session, &session, CATEGORIES_URL).await? {
        Ok(admin) => admin,
        Err(response) => return Ok(response),
    };
    match form.validate() {
        Ok(input) => {
            let category = users::create_category(&state.db, input).await?;
            done(&session, format!("Category {} created!", category.name), CATEGORIES_URL).await
        }
        Err(errors) => render_categories(&state, &session, &admin, form, errors).await,
    }
}

async fn delete_category(
    State(state): State<AppState>,
    auth_session: AuthSession,
    session: Session,
    Path(id): Path<i32>,
) -> AppResult<Response> {
    if let Err(response) = require_superuser(auth_session, &session, CATEGORIES_URL).await? {
        return Ok(response);
    }
    if users::delete_category(&state.db, id).await? {
        done(&session, "Category deleted!", CATEGORIES_URL).await
    } else {
        deny(&session, "That category no longer exists.", CATEGORIES_URL).await
    }
}
