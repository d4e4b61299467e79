use crate::domain::entities::Agent;
use crate::domain::errors::SlaResult;
use crate::domain::ports::agent_repository::AgentRepository;
use crate::infrastructure::persistence::{opt_text, Database};
use async_trait::async_trait;
use sqlx::Row;

#[async_trait]
impl AgentRepository for Database {
    async fn get_agent(&self, id: &str) -> SlaResult<Option<Agent>> {
        let row = sqlx::query(
            "SELECT id, email, first_name, last_name
             FROM agents
             WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            Ok(Some(Agent {
                id: row.try_get("id")?,
                email: row.try_get("email")?,
                first_name: row.try_get("first_name")?,
                last_name: opt_text(&row, "last_name")
                    .unwrap_or_default(),
            }))
        } else {
            Ok(None)
        }
    }
}
