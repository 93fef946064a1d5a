use std::{
    fmt::Debug,
    sync::Weak,
};

use anyhow::Result;

use crate::serializer::serializer::SerializerType;

/// An event produced by a [`Transport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The connection is open, and messages will be serialized with the given serializer.
    Connected(SerializerType),
    /// The connection is closed.
    Disconnected { reason: String, code: Option<u16> },
    /// A payload holding a single serialized message.
    Received(Vec<u8>),
    /// The network path to the router became usable or unusable.
    ViabilityChanged(bool),
    /// The transport believes a better path to the router may be available.
    ReconnectSuggested(bool),
}

/// A receiver of [`TransportEvent`]s.
pub trait TransportEventSink: Send + Sync {
    /// Handles a single event, produced by the given connection attempt.
    ///
    /// Sinks should ignore events from any connection other than the latest.
    fn handle_transport_event(&self, connection: u64, event: TransportEvent);
}

/// The channel a [`Transport`] uses to report events to its owner.
///
/// Each call to [`Transport::connect`] receives a channel tagged with a new connection number, so
/// events from an earlier connection that are still in flight can be told apart from the current
/// one.
///
/// Holds no ownership over the owner. Events delivered after the owner is dropped are ignored.
#[derive(Clone)]
pub struct TransportEvents {
    sink: Weak<dyn TransportEventSink>,
    connection: u64,
}

impl TransportEvents {
    pub fn new(sink: Weak<dyn TransportEventSink>, connection: u64) -> Self {
        Self { sink, connection }
    }

    /// The connection attempt these events belong to.
    pub fn connection(&self) -> u64 {
        self.connection
    }

    /// Delivers an event to the owner.
    pub fn deliver(&self, event: TransportEvent) {
        if let Some(sink) = self.sink.upgrade() {
            sink.handle_transport_event(self.connection, event);
        }
    }
}

impl Debug for TransportEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportEvents")
            .field("connection", &self.connection)
            .field("alive", &(self.sink.strong_count() > 0))
            .finish()
    }
}

/// A transport, over which serialized WAMP messages can be sent and received.
///
/// Implementations must never deliver events from within these methods, since the caller may be
/// holding locks that event handling also requires.
pub trait Transport: Send + Debug {
    /// Starts connecting, reporting progress through the given events.
    fn connect(&mut self, events: TransportEvents) -> Result<()>;

    /// Closes the connection.
    fn disconnect(&mut self, reason: &str) -> Result<()>;

    /// Sends a single serialized message.
    fn send(&mut self, payload: Vec<u8>) -> Result<()>;
}
