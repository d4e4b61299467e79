use crate::domain::entities::BusinessHours;
use crate::domain::errors::SlaResult;

#[async_trait::async_trait]
pub trait BusinessHoursRepository: Send + Sync {
    /// Fails with `SlaError::BusinessHoursNotFound` when no calendar has this id.
    async fn get_business_hours(&self, id: &str) -> SlaResult<BusinessHours>;
}
