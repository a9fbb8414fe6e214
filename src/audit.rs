/// Audit trail for domain actions.
///
/// Every mutating operation (login, client create/update/delete, checklist
/// and procedure changes) emits a structured audit record through tracing,
/// so the log stream doubles as the activity history.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct AuditLog {
    pub log_id: String,
    pub timestamp: DateTime<Utc>,
    /// Operation kind (LOGIN, REFRESH, CREATE, UPDATE, DELETE, GENERATE)
    pub action: String,
    /// Resource kind (user, client, checklist, procedure)
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub user_id: Option<String>,
    /// SUCCESS or FAILURE
    pub status: String,
    pub message: String,
}

impl AuditLog {
    pub fn new(action: &str, resource_type: &str, status: &str, message: impl Into<String>) -> Self {
        Self {
            log_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            action: action.to_string(),
            resource_type: resource_type.to_string(),
            resource_id: None,
            user_id: None,
            status: status.to_string(),
            message: message.into(),
        }
    }

    pub fn with_resource_id(mut self, id: impl Into<String>) -> Self {
        self.resource_id = Some(id.into());
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Emits the record. Failures log at warn so they surface in filtered
    /// production streams.
    pub fn record(&self) {
        if self.status == "FAILURE" {
            tracing::warn!(
                log_id = %self.log_id,
                action = %self.action,
                resource_type = %self.resource_type,
                resource_id = ?self.resource_id,
                user_id = ?self.user_id,
                status = %self.status,
                message = %self.message,
                "Audit log entry"
            );
        } else {
            tracing::info!(
                log_id = %self.log_id,
                action = %self.action,
                resource_type = %self.resource_type,
                resource_id = ?self.resource_id,
                user_id = ?self.user_id,
                status = %self.status,
                message = %self.message,
                "Audit log entry"
            );
        }
    }
}
