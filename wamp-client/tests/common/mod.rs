#![allow(dead_code)]

use std::sync::{
    Arc,
    Mutex,
};

use wamp_client::{
    core::{
        error::{
            AuthDeclined,
            DecodeError,
            ProtocolAnomaly,
        },
        id::Id,
        types::{
            Dictionary,
            Value,
        },
        uri::Uri,
    },
    message::message::{
        Message,
        WelcomeMessage,
    },
    peer::{
        Peer,
        PeerBuilder,
        PeerConfig,
        PeerObserver,
    },
    serializer::serializer::SerializerType,
    transport::direct_transport::{
        DirectTransportHandle,
        TransportCommand,
        new_direct_transport,
    },
};

pub const REALM: &str = "com.wamp.test";

/// A single notification received by a [`RecordingObserver`].
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    SessionEstablished(Id),
    SessionEnded(String),
    AuthenticationDeclined(AuthDeclined),
    ProtocolAnomaly(ProtocolAnomaly),
    DecodeFailed(DecodeError),
    ViabilityChanged(bool),
    ReconnectSuggested(bool),
}

#[derive(Default)]
pub struct RecordingObserver {
    observations: Mutex<Vec<Observation>>,
}

impl RecordingObserver {
    fn record(&self, observation: Observation) {
        self.observations.lock().unwrap().push(observation);
    }

    /// Takes every observation recorded so far.
    pub fn take(&self) -> Vec<Observation> {
        std::mem::take(&mut *self.observations.lock().unwrap())
    }
}

impl PeerObserver for RecordingObserver {
    fn session_established(&self, session_id: Id, _: &Dictionary) {
        self.record(Observation::SessionEstablished(session_id));
    }

    fn session_ended(&self, reason: &str) {
        self.record(Observation::SessionEnded(reason.to_owned()));
    }

    fn authentication_declined(&self, declined: &AuthDeclined) {
        self.record(Observation::AuthenticationDeclined(declined.clone()));
    }

    fn protocol_anomaly(&self, anomaly: &ProtocolAnomaly) {
        self.record(Observation::ProtocolAnomaly(anomaly.clone()));
    }

    fn decode_failed(&self, error: &DecodeError) {
        self.record(Observation::DecodeFailed(error.clone()));
    }

    fn viability_changed(&self, viable: bool) {
        self.record(Observation::ViabilityChanged(viable));
    }

    fn reconnect_suggested(&self, better_route: bool) {
        self.record(Observation::ReconnectSuggested(better_route));
    }
}

/// Collects the values passed to completion handlers.
pub struct Captured<T> {
    values: Arc<Mutex<Vec<T>>>,
}

impl<T> Clone for Captured<T> {
    fn clone(&self) -> Self {
        Self {
            values: self.values.clone(),
        }
    }
}

impl<T> Captured<T>
where
    T: Send + 'static,
{
    pub fn new() -> Self {
        Self {
            values: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A handler that records the value it is called with.
    pub fn handler(&self) -> impl FnOnce(T) + Send + 'static {
        let values = self.values.clone();
        move |value| values.lock().unwrap().push(value)
    }

    /// A handler for repeated calls that records every value.
    pub fn repeated_handler(&self) -> impl Fn(T) + Send + Sync + 'static {
        let values = self.values.clone();
        move |value| values.lock().unwrap().push(value)
    }

    pub fn take(&self) -> Vec<T> {
        std::mem::take(&mut *self.values.lock().unwrap())
    }
}

pub fn id(value: u64) -> Id {
    Id::try_from(value).unwrap()
}

pub fn uri(value: &str) -> Uri {
    Uri::try_from(value).unwrap()
}

pub fn router_roles() -> Dictionary {
    Dictionary::from_iter([(
        "roles".to_owned(),
        Value::Dictionary(Dictionary::from_iter([
            ("broker".to_owned(), Value::Dictionary(Dictionary::default())),
            ("dealer".to_owned(), Value::Dictionary(Dictionary::default())),
        ])),
    )])
}

pub fn create_peer(config: PeerConfig) -> (Peer, DirectTransportHandle, Arc<RecordingObserver>) {
    let (transport, router) = new_direct_transport();
    let observer = Arc::new(RecordingObserver::default());
    let peer = PeerBuilder::new(config)
        .observer(observer.clone())
        .build(Box::new(transport))
        .unwrap();
    (peer, router, observer)
}

/// Connects the peer and answers HELLO with WELCOME.
pub fn establish(peer: &Peer, router: &mut DirectTransportHandle, session: u64) {
    peer.connect().unwrap();
    assert_eq!(router.take_commands(), Vec::from_iter([TransportCommand::Connect]));
    router.connected(SerializerType::Json);
    assert_matches::assert_matches!(router.take_messages().as_slice(), [Message::Hello(_)]);
    router
        .receive(Message::Welcome(WelcomeMessage {
            session: id(session),
            details: router_roles(),
        }))
        .unwrap();
    assert_eq!(peer.session_id(), Some(id(session)));
}

/// Creates a peer with an established session.
pub fn create_established_peer(
    session: u64,
) -> (Peer, DirectTransportHandle, Arc<RecordingObserver>) {
    let (peer, mut router, observer) = create_peer(PeerConfig::new(uri(REALM)));
    establish(&peer, &mut router, session);
    assert_eq!(
        observer.take(),
        Vec::from_iter([Observation::SessionEstablished(id(session))])
    );
    (peer, router, observer)
}
