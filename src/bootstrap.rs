use crate::application::services::*;
use crate::config::Config;
use crate::domain::errors::SlaResult;
use crate::domain::ports::agent_repository::AgentRepository;
use crate::domain::ports::business_hours_repository::BusinessHoursRepository;
use crate::domain::ports::notifier::Notifier;
use crate::domain::ports::settings_repository::AppSettingsRepository;
use crate::domain::ports::sla_repository::SlaRepository;
use crate::domain::ports::team_repository::TeamRepository;
use crate::domain::ports::template_renderer::TemplateRenderer;
use crate::domain::ports::time_service::TimeService;
use crate::infrastructure::http::middleware::AppState;
use crate::infrastructure::persistence::Database;
use crate::infrastructure::providers::{AskamaTemplateRenderer, LogNotifier, SmtpNotifier};
use crate::infrastructure::runtime::TokioTimeService;
use crate::infrastructure::workers::SlaWorker;
use std::sync::Arc;

/// Everything the binary runs: HTTP state plus the background worker.
pub struct SlaComponents {
    pub state: AppState,
    pub evaluator: SlaEvaluator,
    pub dispatcher: NotificationDispatcher,
    pub worker: SlaWorker,
}

/// Wire the production components from configuration.
pub fn build_components(db: Database, config: &Config) -> SlaResult<SlaComponents> {
    let notifier: Arc<dyn Notifier> = match &config.smtp {
        Some(smtp) => {
            tracing::info!(host = %smtp.host, port = smtp.port, "SLA notifications via SMTP");
            Arc::new(SmtpNotifier::new(smtp)?)
        }
        None => {
            tracing::warn!("SMTP_HOST not set, SLA notifications will only be logged");
            Arc::new(LogNotifier)
        }
    };

    Ok(wire_components(
        db,
        notifier,
        Arc::new(TokioTimeService::new()),
    ))
}

/// Wire components around an explicit notifier and clock.
pub fn wire_components(
    db: Database,
    notifier: Arc<dyn Notifier>,
    time_service: Arc<dyn TimeService>,
) -> SlaComponents {
    let sla_repo: Arc<dyn SlaRepository> = Arc::new(db.clone());
    let team_repo: Arc<dyn TeamRepository> = Arc::new(db.clone());
    let settings_repo: Arc<dyn AppSettingsRepository> = Arc::new(db.clone());
    let business_hours_repo: Arc<dyn BusinessHoursRepository> = Arc::new(db.clone());
    let agent_repo: Arc<dyn AgentRepository> = Arc::new(db);
    let renderer: Arc<dyn TemplateRenderer> = Arc::new(AskamaTemplateRenderer::new());

    let scheduler = NotificationScheduler::new(sla_repo.clone(), time_service.clone());

    let sla_service = SlaService::new(
        sla_repo.clone(),
        team_repo,
        settings_repo,
        business_hours_repo,
        scheduler.clone(),
        time_service.clone(),
    );

    let evaluator = SlaEvaluator::new(sla_repo.clone(), scheduler, time_service.clone());

    let dispatcher =
        NotificationDispatcher::new(sla_repo, agent_repo, renderer, notifier, time_service);

    let worker = SlaWorker::new(evaluator.clone(), dispatcher.clone());

    SlaComponents {
        state: AppState { sla_service },
        evaluator,
        dispatcher,
        worker,
    }
}
