use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ErrorShape {
    pub error: String,
    pub error_type: String,
}

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Project not found: {request_id}")]
    ProjectNotFound { request_id: String },

    #[error("Subscription not found: {id}")]
    SubscriptionNotFound { id: i64 },

    #[error("Email address already subscribed: {email}")]
    AlreadySubscribed { email: String },

    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("Invalid format: {format}")]
    InvalidFormat { format: String },

    #[error("A monitoring cycle is already running")]
    SyncInProgress,

    #[error("Upstream error from {source_name}: {reason}")]
    Upstream { source_name: String, reason: String },

    #[error("Failed to parse {source_name} data: {reason}")]
    Parse { source_name: String, reason: String },

    #[error("Alert delivery failed: {reason}")]
    AlertDelivery { reason: String },

    #[error("Database error: {reason}")]
    DatabaseError { reason: String },

    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Configuration error: {reason}")]
    ConfigError { reason: String },

    #[error("Internal server error: {reason}")]
    InternalError { reason: String },
}

impl MonitorError {
    pub fn to_error_shape(&self) -> ErrorShape {
        ErrorShape {
            error: self.to_string(),
            error_type: self.error_type().to_string(),
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            MonitorError::ProjectNotFound { .. } => "NotFound",
            MonitorError::SubscriptionNotFound { .. } => "NotFound",
            MonitorError::AlreadySubscribed { .. } => "Conflict",
            MonitorError::InvalidRequest { .. } => "InvalidRequest",
            MonitorError::InvalidFormat { .. } => "InvalidRequest",
            MonitorError::SyncInProgress => "Conflict",
            MonitorError::Upstream { .. } => "UpstreamError",
            MonitorError::Parse { .. } => "UpstreamError",
            MonitorError::AlertDelivery { .. } => "UpstreamError",
            MonitorError::DatabaseError { .. } => "ServiceException",
            MonitorError::SqlxError(_) => "ServiceException",
            MonitorError::ConfigError { .. } => "ServiceException",
            MonitorError::InternalError { .. } => "ServiceException",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            MonitorError::ProjectNotFound { .. } => 404,
            MonitorError::SubscriptionNotFound { .. } => 404,
            MonitorError::AlreadySubscribed { .. } => 409,
            MonitorError::InvalidRequest { .. } => 400,
            MonitorError::InvalidFormat { .. } => 400,
            MonitorError::SyncInProgress => 409,
            MonitorError::Upstream { .. } => 502,
            MonitorError::Parse { .. } => 502,
            MonitorError::AlertDelivery { .. } => 502,
            MonitorError::DatabaseError { .. } => 500,
            MonitorError::SqlxError(_) => 500,
            MonitorError::ConfigError { .. } => 500,
            MonitorError::InternalError { .. } => 500,
        }
    }

    pub fn upstream(source_name: &str, reason: impl ToString) -> Self {
        MonitorError::Upstream {
            source_name: source_name.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn parse(source_name: &str, reason: impl ToString) -> Self {
        MonitorError::Parse {
            source_name: source_name.to_string(),
            reason: reason.to_string(),
        }
    }
}
