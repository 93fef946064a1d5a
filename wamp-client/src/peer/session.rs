use ahash::HashSet;
use anyhow::{
    Error,
    Result,
};
use log::trace;

use crate::core::{
    id::Id,
    roles::RouterRole,
};

/// The lifecycle state of a WAMP session.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No connection has ever been attempted.
    #[default]
    Idle,
    /// Waiting for the transport to connect.
    Connecting,
    /// HELLO was sent, or a challenge was answered, and the router has not yet welcomed the peer.
    AwaitingWelcome,
    /// A challenge was received and is being answered.
    AwaitingAuthenticate,
    /// The router welcomed the peer into the realm.
    Established(Id),
    /// GOODBYE was sent and the router has not yet replied.
    Closing,
    /// The session ended. Another connection may be attempted.
    Closed,
}

impl SessionState {
    fn allowed_state_transition(&self, next: &Self) -> bool {
        match (self, next) {
            (Self::Idle, Self::Connecting) => true,
            (Self::Connecting, Self::AwaitingWelcome) => true,
            (Self::AwaitingWelcome, Self::AwaitingAuthenticate) => true,
            (Self::AwaitingAuthenticate, Self::AwaitingWelcome) => true,
            (Self::AwaitingWelcome, Self::Established(_)) => true,
            (Self::Established(_), Self::Closing) => true,
            (Self::Closed, Self::Connecting) => true,
            (Self::Idle, _) => false,
            (Self::Closed, _) => false,
            (_, Self::Closed) => true,
            _ => false,
        }
    }

    /// A short description of the state, for diagnostics.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::AwaitingWelcome => "awaiting welcome",
            Self::AwaitingAuthenticate => "awaiting authentication",
            Self::Established(_) => "established",
            Self::Closing => "closing",
            Self::Closed => "closed",
        }
    }

    /// Checks if the session is negotiating with the router, before a session ID is assigned.
    pub fn negotiating(&self) -> bool {
        matches!(
            self,
            Self::Connecting | Self::AwaitingWelcome | Self::AwaitingAuthenticate
        )
    }

    /// Checks if the router may still send session-scoped messages.
    pub fn open(&self) -> bool {
        matches!(self, Self::Established(_) | Self::Closing)
    }
}

/// The session state machine.
///
/// The session ID is stored inside [`SessionState::Established`], so it exists exactly when the
/// session is established.
#[derive(Debug)]
pub(crate) struct Session {
    name: String,
    state: SessionState,
    router_roles: HashSet<RouterRole>,
}

impl Session {
    pub fn new(name: String) -> Self {
        Self {
            name,
            state: SessionState::default(),
            router_roles: HashSet::default(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn session_id(&self) -> Option<Id> {
        match self.state {
            SessionState::Established(session_id) => Some(session_id),
            _ => None,
        }
    }

    pub fn router_roles(&self) -> &HashSet<RouterRole> {
        &self.router_roles
    }

    /// Records the session ID and router roles from WELCOME.
    pub fn establish(&mut self, session_id: Id, router_roles: HashSet<RouterRole>) -> Result<()> {
        self.transition_state(SessionState::Established(session_id))?;
        self.router_roles = router_roles;
        Ok(())
    }

    pub fn transition_state(&mut self, state: SessionState) -> Result<()> {
        if state == self.state {
            return Ok(());
        }

        if !self.state.allowed_state_transition(&state) {
            return Err(Error::msg(format!(
                "invalid state transition from {:?} to {state:?}",
                self.state
            )));
        }

        trace!(
            "Peer {} transitioned from {:?} to {state:?}",
            self.name, self.state
        );
        self.state = state;

        if let SessionState::Closed = self.state {
            self.router_roles.clear();
        }
        Ok(())
    }
}
