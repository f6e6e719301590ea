use crate::error::AppError;
use crossbeam_channel::{Receiver, Sender};
use parking_lot::RwLock;
use std::sync::Arc;

/// Lifecycle of one recognition session.
///
/// `Error` is terminal for the session itself; the only way out is back to
/// `Idle` (the user must start a new session, errors are never retried
/// automatically).
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Idle,
    Starting,
    Streaming,
    Stopping,
    Error { reason: String },
}

pub struct SessionStateMachine {
    state: Arc<RwLock<SessionState>>,
    state_tx: Sender<SessionState>,
    state_rx: Receiver<SessionState>,
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStateMachine {
    pub fn new() -> Self {
        let (state_tx, state_rx) = crossbeam_channel::unbounded();
        Self {
            state: Arc::new(RwLock::new(SessionState::Idle)),
            state_tx,
            state_rx,
        }
    }

    pub fn transition(&self, new_state: SessionState) -> Result<(), AppError> {
        let mut current = self.state.write();

        let valid = matches!(
            (&*current, &new_state),
            (SessionState::Idle, SessionState::Starting)
                | (SessionState::Starting, SessionState::Streaming)
                | (SessionState::Starting, SessionState::Idle)
                | (SessionState::Streaming, SessionState::Stopping)
                | (SessionState::Streaming, SessionState::Error { .. })
                | (SessionState::Stopping, SessionState::Idle)
                | (SessionState::Error { .. }, SessionState::Idle)
        );

        if !valid {
            return Err(AppError::Fatal(format!(
                "Invalid session transition: {:?} -> {:?}",
                *current, new_state
            )));
        }

        tracing::info!("Session transition: {:?} -> {:?}", *current, new_state);
        *current = new_state.clone();
        let _ = self.state_tx.send(new_state);
        Ok(())
    }

    pub fn current(&self) -> SessionState {
        self.state.read().clone()
    }

    pub fn subscribe(&self) -> Receiver<SessionState> {
        self.state_rx.clone()
    }
}
