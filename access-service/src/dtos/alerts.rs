use crate::models::{Alert, AlertScope, AlertSource, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct AlertListParams {
    /// "platform" or "org:{organization_id}".
    pub scope: String,
    pub since: Option<DateTime<Utc>>,
    /// Minimum severity; defaults to info.
    pub severity: Option<String>,
    pub cursor: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct AlertResponse {
    pub id: String,
    pub scope: AlertScope,
    pub source: AlertSource,
    pub severity: Severity,
    pub message: String,
    pub created_at: String,
}

impl From<Alert> for AlertResponse {
    fn from(alert: Alert) -> Self {
        Self {
            id: alert.id,
            scope: alert.scope,
            source: alert.source,
            severity: alert.severity,
            message: alert.message,
            created_at: alert.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AlertListResponse {
    pub alerts: Vec<AlertResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}
