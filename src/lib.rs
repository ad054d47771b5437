pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod server;
pub mod utils;

pub use config::AppConfig;
pub use core::{CallbackToken, IntakeService, Outcome, WorkflowEngine};
pub use utils::error::{FlowError, Result};
