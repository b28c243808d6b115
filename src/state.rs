use crate::certificate::CertificateRenderer;
use crate::config::Config;
use crate::db::DbPool;
use crate::storage::FsObjectStore;
use crate::watcher::CertificatePipeline;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub config: Arc<Config>,
    pub objects: Arc<FsObjectStore>,
    pub renderer: CertificateRenderer,
    pub pipeline: Arc<CertificatePipeline>,
}
