use std::sync::Arc;

use anyhow::Result;

use crate::{
    auth::ChallengeHandler,
    peer::{
        observer::PeerObserver,
        peer::{
            Peer,
            PeerConfig,
            PeerShared,
        },
    },
    transport::transport::Transport,
};

/// Builds a [`Peer`] over some [`Transport`].
pub struct PeerBuilder {
    config: PeerConfig,
    observer: Option<Arc<dyn PeerObserver>>,
    challenge_handler: Option<Arc<dyn ChallengeHandler>>,
}

impl PeerBuilder {
    pub fn new(config: PeerConfig) -> Self {
        Self {
            config,
            observer: None,
            challenge_handler: None,
        }
    }

    /// Sets the observer for session-wide notifications.
    pub fn observer(mut self, observer: Arc<dyn PeerObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Sets the handler for authentication challenges.
    ///
    /// Without one, every challenge is declined.
    pub fn challenge_handler(mut self, challenge_handler: Arc<dyn ChallengeHandler>) -> Self {
        self.challenge_handler = Some(challenge_handler);
        self
    }

    /// Builds the peer. The peer does not connect until [`Peer::connect`] is called.
    pub fn build(self, transport: Box<dyn Transport>) -> Result<Peer> {
        self.config.validate()?;
        Ok(Peer::new(PeerShared::new(
            self.config,
            self.observer,
            self.challenge_handler,
            transport,
        )))
    }
}
