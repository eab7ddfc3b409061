//! Application state

use credgate_auth::{Authenticator, JwtManager, SharedPermissionTable};
use credgate_db::Database;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// Handle used to render the Prometheus exposition
pub type MetricsHandle = PrometheusHandle;

/// Application state shared across handlers
///
/// Only the permission table changes after startup, when a role is created.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub auth: Arc<Authenticator>,
    pub jwt: Arc<JwtManager>,
    pub permissions: SharedPermissionTable,
}

impl AppState {
    pub fn new(db: Database, auth: Arc<Authenticator>, permissions: SharedPermissionTable) -> Self {
        let jwt = auth.jwt().clone();
        Self {
            db,
            auth,
            jwt,
            permissions,
        }
    }
}
