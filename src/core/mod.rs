pub mod callback;
pub mod intake;
pub mod messages;
pub mod workflow;

pub use callback::CallbackToken;
pub use intake::{IntakeReport, IntakeService, ReviewPolicy};
pub use workflow::{Outcome, WorkflowEngine};
