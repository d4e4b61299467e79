use crate::domain::errors::SlaResult;
use crate::domain::ports::settings_repository::AppSettingsRepository;
use crate::infrastructure::persistence::Database;
use async_trait::async_trait;
use sqlx::Row;

#[async_trait]
impl AppSettingsRepository for Database {
    async fn get_by_prefix(&self, prefix: &str) -> SlaResult<serde_json::Value> {
        let rows = sqlx::query("SELECT key, value FROM app_settings WHERE key LIKE ? ORDER BY key")
            .bind(format!("{}%", prefix))
            .fetch_all(&self.pool)
            .await?;

        let mut settings = serde_json::Map::new();
        for row in rows {
            let key: String = row.try_get("key")?;
            let raw: String = row.try_get("value")?;
            // Values are JSON; tolerate bare strings written by hand.
            let value = serde_json::from_str(&raw).unwrap_or(serde_json::Value::String(raw));
            settings.insert(key, value);
        }

        Ok(serde_json::Value::Object(settings))
    }
}
