use crate::domain::errors::SlaResult;

/// Settings key holding the system default business-hours calendar id.
pub const SETTING_BUSINESS_HOURS_ID: &str = "app.business_hours_id";
/// Settings key holding the system default IANA timezone.
pub const SETTING_TIMEZONE: &str = "app.timezone";

#[async_trait::async_trait]
pub trait AppSettingsRepository: Send + Sync {
    /// All settings whose key starts with `prefix`, as one JSON object keyed
    /// by the full setting key.
    async fn get_by_prefix(&self, prefix: &str) -> SlaResult<serde_json::Value>;
}
