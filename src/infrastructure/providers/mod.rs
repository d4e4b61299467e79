pub mod email_notifier;
pub mod template_renderer;

pub use email_notifier::{LogNotifier, SmtpNotifier};
pub use template_renderer::AskamaTemplateRenderer;
