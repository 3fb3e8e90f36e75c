//! Tool Gate
//!
//! Guards the tools the reasoning delegate may call during one run. The gate is
//! created with the action the decision policy picked and lets the delegate
//! perform exactly that action, at most once. Whatever the delegate manages to
//! do is recorded so the runner never repeats a side effect on fallback.

use crate::dispatcher::ActionDispatcher;
use crate::error::CoachError;
use crate::policy::Action;
use crate::session::SessionRecord;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// An action the delegate carried out through the gate, with the tool's result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Performed {
    pub action: Action,
    pub result: String,
}

/// A per-run guard around the action dispatcher. Cloning shares the ledger.
#[derive(Clone)]
pub struct ToolGate {
    record: Arc<SessionRecord>,
    permitted: Action,
    dispatcher: Arc<ActionDispatcher>,
    performed: Arc<Mutex<Option<Performed>>>,
}

impl ToolGate {
    pub fn new(record: SessionRecord, permitted: Action, dispatcher: Arc<ActionDispatcher>) -> Self {
        Self {
            record: Arc::new(record),
            permitted,
            dispatcher,
            performed: Arc::new(Mutex::new(None)),
        }
    }

    /// The record the permitted action was decided from.
    pub fn record(&self) -> &SessionRecord {
        &self.record
    }

    pub fn permitted(&self) -> Action {
        self.permitted
    }

    /// Performs `requested` if it is the permitted action and nothing has been
    /// performed yet in this run.
    pub async fn invoke(&self, requested: Action) -> Result<String, CoachError> {
        // Held across the dispatch so concurrent tool calls cannot both act.
        let mut performed = self.performed.lock().await;
        if let Some(done) = performed.as_ref() {
            warn!(user_id = %self.record.user_id, requested = %requested, "Rejected second action in one run");
            return Err(CoachError::ToolRejected {
                requested,
                reason: format!("{} was already performed in this session turn", done.action),
            });
        }
        if requested != self.permitted {
            warn!(
                user_id = %self.record.user_id,
                requested = %requested,
                permitted = %self.permitted,
                "Rejected action that contradicts the decision policy"
            );
            return Err(CoachError::ToolRejected {
                requested,
                reason: format!("the current session state calls for {}", self.permitted),
            });
        }

        let result = self.dispatcher.dispatch(requested, &self.record).await?;
        info!(user_id = %self.record.user_id, action = %requested, "Delegate performed action");
        *performed = Some(Performed {
            action: requested,
            result: result.clone(),
        });
        Ok(result)
    }

    /// The action performed through this gate, if any.
    pub async fn performed(&self) -> Option<Performed> {
        self.performed.lock().await.clone()
    }
}
