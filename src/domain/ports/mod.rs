pub mod agent_repository;
pub mod business_hours_repository;
pub mod notifier;
pub mod settings_repository;
pub mod sla_repository;
pub mod team_repository;
pub mod template_renderer;
pub mod time_service;
