use crate::{
    auth::{self, user::Backend},
    config::Config,
    events::storage::AttachmentStore,
    routes,
    util::templates::setup_templates,
};
use axum::{Router, routing::get_service};
use axum_login::{
    AuthManagerLayerBuilder,
    tower_sessions::{
        Expiry, SessionManagerLayer,
        cookie::{SameSite, time},
    },
};
use minijinja::Environment;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tokio::{signal, task::AbortHandle};
use tower_http::{services::ServeDir, trace::TraceLayer};
use tower_sessions_sqlx_store::PostgresStore;
use tracing::{error, info};

const TEMPLATE_DIR: &str = "templates";
const STATIC_DIR: &str = "static";

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub templates: Arc<Environment<'static>>,
    pub store: AttachmentStore,
}

pub fn create_router(
    config: &Config,
    db: DatabaseConnection,
    session_store: PostgresStore,
) -> Router {
    let store = AttachmentStore::new(config.media_root.clone());
    let media = ServeDir::new(store.root());
    let state = AppState {
        db: db.clone(),
        templates: Arc::new(setup_templates(TEMPLATE_DIR, STATIC_DIR)),
        store,
    };

    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(config.session_secure)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::days(1)));

    // Auth service.
    //
    // This combines the session layer with our backend to establish the auth
    // service which will provide the auth session as a request extension.
    let backend = Backend::new(db);
    let auth_layer = AuthManagerLayerBuilder::new(backend, session_layer).build();

    Router::new()
        .merge(routes::events::routes())
        .merge(routes::attachments::routes(config.max_upload_bytes))
        .nest(
            "/users",
            auth::router::router().merge(routes::users::routes()),
        )
        .with_state(state)
        .nest_service("/static", get_service(ServeDir::new(STATIC_DIR)))
        .nest_service("/media", get_service(media))
        .layer(auth_layer)
        .layer(TraceLayer::new_for_http())
}

pub async fn shutdown_signal(deletion_task_abort_handle: AbortHandle) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutting down");
    deletion_task_abort_handle.abort();
}
