use crate::config::Config;
use crate::service::FileService;

/// Central application state shared across all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Upload, retrieval and deletion flows over the media host and record store.
    pub files: FileService,

    /// Application configuration loaded from environment variables or `.env`.
    pub config: Config,
}
