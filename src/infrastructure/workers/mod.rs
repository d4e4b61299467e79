pub mod sla_worker;

pub use sla_worker::SlaWorker;
