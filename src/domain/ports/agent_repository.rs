use crate::domain::entities::Agent;
use crate::domain::errors::SlaResult;
use async_trait::async_trait;

#[async_trait]
pub trait AgentRepository: Send + Sync {
    async fn get_agent(&self, id: &str) -> SlaResult<Option<Agent>>;
}
