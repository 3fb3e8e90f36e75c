//! Fitness coaching agent core: session state, the deterministic decision
//! policy, the coaching tools, and the optional LLM reasoning path that sits in
//! front of them.

pub mod agent;
pub mod delegate;
pub mod dispatcher;
pub mod error;
pub mod gate;
pub mod llm_client;
pub mod policy;
pub mod runner;
pub mod session;
pub mod tools;

pub use error::{CoachError, ToolError};
pub use policy::{Action, decide};
pub use runner::SessionRunner;
pub use session::{InvalidUserId, SessionRecord, SessionStore, validate_user_id};
