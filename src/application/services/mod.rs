pub mod notification_dispatcher;
pub mod notification_scheduler;
pub mod sla_evaluator;
pub mod sla_service;

pub use notification_dispatcher::NotificationDispatcher;
pub use notification_scheduler::NotificationScheduler;
pub use sla_evaluator::SlaEvaluator;
pub use sla_service::SlaService;
