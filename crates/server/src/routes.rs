use axum::Router;

use crate::bootstrap::Application;
use crate::catalog_sync::{self, SyncState};
use crate::{chat, health};

pub fn router(app: &Application) -> Router {
    Router::new()
        .merge(chat::router(app.conversation.clone()))
        .merge(catalog_sync::router(SyncState::new(
            app.sync_job.clone(),
            app.config.sync.cron_secret.clone(),
        )))
        .merge(health::router(app.db_pool.clone()))
}
