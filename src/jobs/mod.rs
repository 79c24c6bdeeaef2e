mod chat;
mod orchestrator;
pub mod state_machine;

pub use chat::conversation;
pub use orchestrator::{ReviewOrchestrator, CREDENTIAL_MISSING};
pub use state_machine::{JobStateMachine, TransitionError};
