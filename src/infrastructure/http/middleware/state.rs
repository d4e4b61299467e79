use crate::application::services::SlaService;

#[derive(Clone)]
pub struct AppState {
    pub sla_service: SlaService,
}
