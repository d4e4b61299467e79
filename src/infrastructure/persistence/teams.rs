use crate::domain::entities::Team;
use crate::domain::errors::SlaResult;
use crate::domain::ports::team_repository::TeamRepository;
use crate::infrastructure::persistence::{opt_text, Database};
use async_trait::async_trait;
use sqlx::Row;

#[async_trait]
impl TeamRepository for Database {
    async fn get_team_by_id(&self, id: &str) -> SlaResult<Option<Team>> {
        let row = sqlx::query(
            "SELECT id, name, business_hours_id, timezone
             FROM teams
             WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            Ok(Some(Team {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
                business_hours_id: opt_text(&row, "business_hours_id")
                    .filter(|id| !id.is_empty()),
                timezone: opt_text(&row, "timezone")
                    .unwrap_or_default(),
            }))
        } else {
            Ok(None)
        }
    }
}
