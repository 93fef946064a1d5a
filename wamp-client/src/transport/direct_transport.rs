use std::sync::{
    Arc,
    Mutex,
    PoisonError,
};

use anyhow::{
    Error,
    Result,
};
use log::warn;
use tokio::sync::mpsc::{
    UnboundedReceiver,
    UnboundedSender,
    unbounded_channel,
};

use crate::{
    message::message::Message,
    serializer::serializer::{
        SerializerType,
        new_serializer,
    },
    transport::transport::{
        Transport,
        TransportEvent,
        TransportEvents,
    },
};

/// A command issued by a peer to a [`DirectTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCommand {
    Connect,
    Disconnect(String),
    Send(Vec<u8>),
}

type SharedEvents = Arc<Mutex<Option<TransportEvents>>>;

/// An in-process transport, with no network between the peer and whatever drives the
/// [`DirectTransportHandle`].
///
/// Commands from the peer are queued on the handle. Events are injected through the handle.
#[derive(Debug)]
pub struct DirectTransport {
    commands_tx: UnboundedSender<TransportCommand>,
    events: SharedEvents,
}

/// Creates a new [`DirectTransport`] and the handle that drives it.
pub fn new_direct_transport() -> (DirectTransport, DirectTransportHandle) {
    let (commands_tx, commands_rx) = unbounded_channel();
    let events = SharedEvents::default();
    (
        DirectTransport {
            commands_tx,
            events: events.clone(),
        },
        DirectTransportHandle {
            commands_rx,
            events,
            serializer_type: SerializerType::Json,
        },
    )
}

impl DirectTransport {
    fn command(&self, command: TransportCommand) -> Result<()> {
        self.commands_tx
            .send(command)
            .map_err(|_| Error::msg("direct transport handle was dropped"))
    }
}

impl Transport for DirectTransport {
    fn connect(&mut self, events: TransportEvents) -> Result<()> {
        *self.events.lock().unwrap_or_else(PoisonError::into_inner) = Some(events);
        self.command(TransportCommand::Connect)
    }

    fn disconnect(&mut self, reason: &str) -> Result<()> {
        self.command(TransportCommand::Disconnect(reason.to_owned()))
    }

    fn send(&mut self, payload: Vec<u8>) -> Result<()> {
        self.command(TransportCommand::Send(payload))
    }
}

/// The other end of a [`DirectTransport`].
#[derive(Debug)]
pub struct DirectTransportHandle {
    commands_rx: UnboundedReceiver<TransportCommand>,
    events: SharedEvents,
    serializer_type: SerializerType,
}

impl DirectTransportHandle {
    fn deliver(&self, event: TransportEvent) {
        let events = self
            .events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match events {
            Some(events) => events.deliver(event),
            None => warn!("Direct transport dropped {event:?} because the peer never connected"),
        }
    }

    /// Reports the connection as open, with the given serializer.
    pub fn connected(&mut self, serializer_type: SerializerType) {
        self.serializer_type = serializer_type;
        self.deliver(TransportEvent::Connected(serializer_type));
    }

    /// Reports the connection as closed.
    pub fn disconnected(&self, reason: &str, code: Option<u16>) {
        self.deliver(TransportEvent::Disconnected {
            reason: reason.to_owned(),
            code,
        });
    }

    /// Delivers a raw payload.
    pub fn receive_bytes(&self, payload: Vec<u8>) {
        self.deliver(TransportEvent::Received(payload));
    }

    /// Serializes and delivers a message.
    pub fn receive(&self, message: Message) -> Result<()> {
        let payload = new_serializer(self.serializer_type).serialize_message(&message)?;
        self.receive_bytes(payload);
        Ok(())
    }

    /// Reports a change in network viability.
    pub fn viability_changed(&self, viable: bool) {
        self.deliver(TransportEvent::ViabilityChanged(viable));
    }

    /// Suggests that the peer reconnect.
    pub fn reconnect_suggested(&self, better_route: bool) {
        self.deliver(TransportEvent::ReconnectSuggested(better_route));
    }

    /// Waits for the next command from the peer.
    pub async fn recv(&mut self) -> Option<TransportCommand> {
        self.commands_rx.recv().await
    }

    /// Takes all commands issued so far, without waiting.
    pub fn take_commands(&mut self) -> Vec<TransportCommand> {
        let mut commands = Vec::new();
        while let Ok(command) = self.commands_rx.try_recv() {
            commands.push(command);
        }
        commands
    }

    /// Takes all messages sent so far, without waiting.
    ///
    /// Other commands are discarded. Payloads that fail to decode are skipped with a warning.
    pub fn take_messages(&mut self) -> Vec<Message> {
        let serializer = new_serializer(self.serializer_type);
        self.take_commands()
            .into_iter()
            .filter_map(|command| match command {
                TransportCommand::Send(payload) => match serializer.deserialize_message(&payload) {
                    Ok(message) => Some(message),
                    Err(err) => {
                        warn!("Direct transport failed to decode sent payload: {err}");
                        None
                    }
                },
                _ => None,
            })
            .collect()
    }
}
