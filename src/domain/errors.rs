use thiserror::Error;

#[derive(Error, Debug)]
pub enum SlaError {
    /// An open next-response event already exists for the applied SLA.
    #[error("unmet SLA event already exists for applied SLA {0}")]
    UnmetSlaEventAlreadyExists(String),

    /// There is no open event to mark as met.
    #[error("latest SLA event not found for applied SLA {applied_sla_id} and metric {metric}")]
    LatestSlaEventNotFound {
        applied_sla_id: String,
        metric: String,
    },

    #[error("no next response time set for SLA policy {0}")]
    NextResponseNotConfigured(String),

    #[error("invalid SLA duration: {0}")]
    InvalidDuration(String),

    #[error("business hours or timezone not configured")]
    BusinessHoursNotConfigured,

    #[error("business hours not found: {0}")]
    BusinessHoursNotFound(String),

    #[error("invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("notification delivery failed: {0}")]
    Delivery(String),

    #[error("template rendering failed: {0}")]
    Template(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl SlaError {
    /// Expected outcomes that callers branch on instead of treating as failures.
    pub fn is_soft_miss(&self) -> bool {
        matches!(
            self,
            SlaError::UnmetSlaEventAlreadyExists(_)
                | SlaError::LatestSlaEventNotFound { .. }
                | SlaError::NextResponseNotConfigured(_)
        )
    }

    /// Configuration problems that make a deadline calculation impossible.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            SlaError::InvalidDuration(_)
                | SlaError::BusinessHoursNotConfigured
                | SlaError::BusinessHoursNotFound(_)
                | SlaError::InvalidTimezone(_)
        )
    }
}

impl From<serde_json::Error> for SlaError {
    fn from(err: serde_json::Error) -> Self {
        SlaError::Internal(format!("json: {}", err))
    }
}

pub type SlaResult<T> = Result<T, SlaError>;
