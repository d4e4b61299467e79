use crate::domain::entities::{BusinessHours, DaySchedule, Holiday};
use crate::domain::errors::{SlaError, SlaResult};
use crate::domain::ports::business_hours_repository::BusinessHoursRepository;
use crate::infrastructure::persistence::Database;
use async_trait::async_trait;
use sqlx::Row;

#[async_trait]
impl BusinessHoursRepository for Database {
    async fn get_business_hours(&self, id: &str) -> SlaResult<BusinessHours> {
        let row = sqlx::query(
            "SELECT id, name, is_always_open, hours, holidays
             FROM business_hours
             WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| SlaError::BusinessHoursNotFound(id.to_string()))?;

        let hours: String = row.try_get("hours")?;
        let holidays: String = row.try_get("holidays")?;
        let hours: Vec<DaySchedule> = serde_json::from_str(&hours).map_err(|e| {
            SlaError::Validation(format!("Invalid hours for business hours {}: {}", id, e))
        })?;
        let holidays: Vec<Holiday> = serde_json::from_str(&holidays).map_err(|e| {
            SlaError::Validation(format!("Invalid holidays for business hours {}: {}", id, e))
        })?;

        Ok(BusinessHours {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            is_always_open: row.try_get::<i64, _>("is_always_open")? != 0,
            hours,
            holidays,
        })
    }
}
