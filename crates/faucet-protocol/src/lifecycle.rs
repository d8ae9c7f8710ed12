//! Per-request lifecycle state machine

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{ProtocolError, ProtocolResult, RequestId};

/// Stage of a single faucet round trip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestState {
    /// Nothing started yet
    Idle,
    /// Fetching the server public key
    FetchingServerKey,
    /// Sealing the chat history
    Encrypting,
    /// Posting the envelope
    Submitting,
    /// Waiting for the encrypted reply
    AwaitingResponse,
    /// Opening the reply
    Decrypting,
    /// Round trip finished
    Done,
    /// Round trip failed
    Errored,
}

impl RequestState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Errored)
    }

    /// The single state that follows this one on the happy path
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Idle => Some(Self::FetchingServerKey),
            Self::FetchingServerKey => Some(Self::Encrypting),
            Self::Encrypting => Some(Self::Submitting),
            Self::Submitting => Some(Self::AwaitingResponse),
            Self::AwaitingResponse => Some(Self::Decrypting),
            Self::Decrypting => Some(Self::Done),
            Self::Done | Self::Errored => None,
        }
    }

    pub fn can_transition_to(self, to: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        to == Self::Errored || self.next() == Some(to)
    }
}

/// Tracks the state of one round trip
#[derive(Debug)]
pub struct RequestLifecycle {
    id: RequestId,
    state: RequestState,
}

impl RequestLifecycle {
    pub fn new(id: RequestId) -> Self {
        Self {
            id,
            state: RequestState::Idle,
        }
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    /// Move to `to`, rejecting anything off the happy path except `Errored`
    pub fn advance(&mut self, to: RequestState) -> ProtocolResult<()> {
        if !self.state.can_transition_to(to) {
            return Err(ProtocolError::InvalidStateTransition {
                from: self.state,
                to,
            });
        }

        debug!(request_id = %self.id, from = ?self.state, to = ?to, "request state change");
        self.state = to;
        Ok(())
    }

    /// Mark the round trip as failed, returning the stage it failed in.
    /// A lifecycle that already finished keeps its state.
    pub fn fail(&mut self) -> RequestState {
        let failed_in = self.state;
        if !failed_in.is_terminal() {
            debug!(request_id = %self.id, stage = ?failed_in, "request failed");
            self.state = RequestState::Errored;
        }
        failed_in
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NON_TERMINAL: [RequestState; 6] = [
        RequestState::Idle,
        RequestState::FetchingServerKey,
        RequestState::Encrypting,
        RequestState::Submitting,
        RequestState::AwaitingResponse,
        RequestState::Decrypting,
    ];

    #[test]
    fn test_happy_path() {
        let mut lifecycle = RequestLifecycle::new(RequestId::new());
        let mut state = lifecycle.state();
        while let Some(next) = state.next() {
            lifecycle.advance(next).unwrap();
            state = next;
        }
        assert_eq!(lifecycle.state(), RequestState::Done);
    }

    #[test]
    fn test_skipping_a_stage_is_rejected() {
        let mut lifecycle = RequestLifecycle::new(RequestId::new());
        let err = lifecycle.advance(RequestState::Submitting).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::InvalidStateTransition {
                from: RequestState::Idle,
                to: RequestState::Submitting,
            }
        ));
        assert_eq!(lifecycle.state(), RequestState::Idle);
    }

    #[test]
    fn test_errored_reachable_from_every_non_terminal_state() {
        for state in NON_TERMINAL {
            assert!(state.can_transition_to(RequestState::Errored), "{state:?}");
        }
        assert!(!RequestState::Done.can_transition_to(RequestState::Errored));
        assert!(!RequestState::Errored.can_transition_to(RequestState::Idle));
    }

    #[test]
    fn test_fail_reports_stage() {
        let mut lifecycle = RequestLifecycle::new(RequestId::new());
        lifecycle.advance(RequestState::FetchingServerKey).unwrap();
        lifecycle.advance(RequestState::Encrypting).unwrap();

        assert_eq!(lifecycle.fail(), RequestState::Encrypting);
        assert_eq!(lifecycle.state(), RequestState::Errored);
        assert!(lifecycle.advance(RequestState::Submitting).is_err());
    }

    #[test]
    fn test_fail_after_done_keeps_done() {
        let mut lifecycle = RequestLifecycle::new(RequestId::new());
        let mut state = RequestState::Idle;
        while let Some(next) = state.next() {
            lifecycle.advance(next).unwrap();
            state = next;
        }
        assert_eq!(lifecycle.fail(), RequestState::Done);
        assert_eq!(lifecycle.state(), RequestState::Done);
    }
}
