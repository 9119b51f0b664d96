use axum::{
    Router,
    extract::{DefaultBodyLimit, Multipart, Path, State, multipart::MultipartError},
    http::StatusCode,
    response::Response,
    routing::post,
};
use axum_login::tower_sessions::Session;
use tracing::{debug, warn};

use super::{deny, done, event_url, login_redirect};
use crate::{
    auth::user::AuthSession,
    error::AppResult,
    events::service::{self, EventError},
    permissions,
    router::AppState,
};

const UPLOAD_FAILED: &str = "Could not add the attachment.";

pub fn routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/event/{id}/attachment",
            post(add_attachment).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/attachment/{id}/delete", post(delete_attachment))
}

/// The multipart fields of the attachment form.
#[derive(Debug, Default)]
struct Upload {
    name: String,
    file_name: Option<String>,
    contents: Vec<u8>,
}

impl Upload {
    async fn read(multipart: &mut Multipart) -> Result<Self, MultipartError> {
        let mut upload = Upload::default();
        while let Some(field) = multipart.next_field().await? {
            let field_name = field.name().unwrap_or_default().to_string();
            match field_name.as_str() {
                "name" => upload.name = field.text().await?,
                "file" => {
                    upload.file_name = field.file_name().map(str::to_string);
                    upload.contents = field.bytes().await?.to_vec();
                }
                _ => {}
            }
        }
        Ok(upload)
    }

    /// True when the body went past the route's size limit.
    fn too_large(err: &MultipartError) -> bool {
        err.status() == StatusCode::PAYLOAD_TOO_LARGE
    }

    fn is_complete(&self) -> bool {
        !self.name.trim().is_empty()
            && self.name.trim().chars().count() <= 200
            && self.file_name.as_deref().is_some_and(|n| !n.is_empty())
            && !self.contents.is_empty()
    }
}

async fn add_attachment(
    State(state): State<AppState>,
    auth_session: AuthSession,
    session: Session,
    Path(id): Path<i32>,
    mut multipart: Multipart,
) -> AppResult<Response> {
    let Some(user) = auth_session.user else {
        return Ok(login_redirect(&event_url(id)));
    };
    let event = service::find_event(&state.db, id).await?;
    if !permissions::is_organizer(&user, &event) {
        return deny(&session, "You are not allowed to add attachments.", &event_url(id)).await;
    }

    let upload = match Upload::read(&mut multipart).await {
        Ok(upload) => upload,
        Err(err) if Upload::too_large(&err) => {
            warn!(event_id = id, error = %err, "attachment over the upload limit");
            return deny(&session, UPLOAD_FAILED, &event_url(id)).await;
        }
        Err(err) => return Err(err.into()),
    };
    if !upload.is_complete() {
        debug!(event_id = id, "incomplete attachment upload");
        return deny(&session, UPLOAD_FAILED, &event_url(id)).await;
    }
    let file_name = upload.file_name.as_deref().unwrap_or_default();

    match service::add_attachment(
        &state.db,
        &state.store,
        &user,
        event.id,
        &upload.name,
        file_name,
        &upload.contents,
    )
    .await
    {
        Ok(_) => done(&session, "Attachment added!", &event_url(id)).await,
        Err(EventError::NotOrganizer { .. }) => {
            deny(&session, "You are not allowed to add attachments.", &event_url(id)).await
        }
        Err(err) => Err(err.into()),
    }
}

async fn delete_attachment(
    State(state): State<AppState>,
    auth_session: AuthSession,
    session: Session,
    Path(id): Path<i32>,
) -> AppResult<Response> {
    let Some(user) = auth_session.user else {
        return Ok(login_redirect("/"));
    };
    match service::delete_attachment(&state.db, &state.store, &user, id).await {
        Ok(event_id) => done(&session, "Attachment deleted!", &event_url(event_id)).await,
        Err(EventError::NotOrganizer { event_id }) => {
            deny(&session, "You are not allowed to delete attachments.", &event_url(event_id)).await
        }
        Err(err) => Err(err.into()),
    }
}
