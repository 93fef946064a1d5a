use std::{
    fmt::Debug,
    sync::{
        Arc,
        Mutex,
        MutexGuard,
        PoisonError,
        Weak,
    },
};

use ahash::HashSet;
use anyhow::{
    Error,
    Result,
};
use log::{
    debug,
    error,
};

use crate::{
    auth::{
        AuthConfig,
        ChallengeHandler,
    },
    core::{
        close::CloseReason,
        error::{
            RequestError,
            RouterError,
        },
        id::Id,
        roles::{
            PeerRole,
            RouterRole,
        },
        types::Dictionary,
        uri::Uri,
    },
    message::{
        common::error_for_invocation,
        message::{
            ChallengeMessage,
            Message,
            YieldMessage,
        },
    },
    peer::{
        handler::{
            Event,
            Invocation,
            PublishedEvent,
            RpcCall,
            RpcResult,
            RpcYield,
        },
        observer::PeerObserver,
        registry::{
            Registration,
            Subscription,
        },
        session::SessionState,
        state::{
            Notifications,
            PeerState,
        },
    },
    transport::transport::{
        Transport,
        TransportEvent,
        TransportEventSink,
    },
};

pub(crate) const DEFAULT_AGENT: &str =
    concat!(env!("CARGO_PKG_NAME"), "-", env!("CARGO_PKG_VERSION"));

/// Configuration for a [`Peer`].
#[derive(Debug, Clone)]
pub struct PeerConfig {
    /// Name of the peer, mostly for logging.
    pub name: String,
    /// Agent name, communicated to the router.
    pub agent: String,
    /// The realm to join.
    pub realm: Uri,
    /// Roles implemented by the peer.
    pub roles: HashSet<PeerRole>,
    /// Authentication offered to the router in HELLO.
    ///
    /// If empty, the peer joins anonymously.
    pub auth: Option<AuthConfig>,
    /// The reason sent back to the router when it ends the session.
    ///
    /// A GOODBYE carrying this reason is treated as an acknowledgement, and is never echoed.
    pub goodbye_ack_reason: Uri,
}

impl PeerConfig {
    /// Creates a configuration for joining the given realm with every client role.
    pub fn new(realm: Uri) -> Self {
        Self {
            name: DEFAULT_AGENT.to_owned(),
            agent: DEFAULT_AGENT.to_owned(),
            realm,
            roles: HashSet::from_iter([
                PeerRole::Callee,
                PeerRole::Caller,
                PeerRole::Publisher,
                PeerRole::Subscriber,
            ]),
            auth: None,
            goodbye_ack_reason: CloseReason::GoodbyeAndOut.uri(),
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.roles.is_empty() {
            return Err(Error::msg("at least one role is required"));
        }
        if self.agent.is_empty() {
            return Err(Error::msg("agent cannot be empty"));
        }
        if let Some(auth) = &self.auth {
            if auth.methods.is_empty() {
                return Err(Error::msg(
                    "at least one authentication method is required when authentication is configured",
                ));
            }
        }
        Ok(())
    }
}

/// State shared between a [`Peer`], its handles, and its transport.
pub(crate) struct PeerShared {
    challenge_handler: Option<Arc<dyn ChallengeHandler>>,
    state: Mutex<PeerState>,
}

impl PeerShared {
    pub(crate) fn new(
        config: PeerConfig,
        observer: Option<Arc<dyn PeerObserver>>,
        challenge_handler: Option<Arc<dyn ChallengeHandler>>,
        transport: Box<dyn Transport>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|peer| Self {
            challenge_handler,
            state: Mutex::new(PeerState::new(config, observer, peer.clone(), transport)),
        })
    }

    fn lock(&self) -> MutexGuard<'_, PeerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` against the locked state, then runs every notification it produced after the lock
    /// is released.
    fn with_state<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&mut PeerState, &mut Notifications) -> T,
    {
        let mut notifications = Notifications::default();
        let result = {
            let mut state = self.lock();
            f(&mut state, &mut notifications)
        };
        notifications.run();
        result
    }

    pub(crate) fn unsubscribe(
        &self,
        subscription: Id,
        handler: Box<dyn FnOnce(Result<(), RequestError>) + Send>,
    ) -> Option<Id> {
        self.with_state(|state, notifications| {
            state.unsubscribe(subscription, handler, notifications)
        })
    }

    pub(crate) fn unregister(
        &self,
        registration: Id,
        handler: Box<dyn FnOnce(Result<(), RequestError>) + Send>,
    ) -> Option<Id> {
        self.with_state(|state, notifications| {
            state.unregister(registration, handler, notifications)
        })
    }

    /// Answers a challenge with the challenge handler, outside of the lock.
    fn answer_challenge(&self, connection: u64, challenge: ChallengeMessage) {
        let signature = match &self.challenge_handler {
            Some(challenge_handler) => challenge_handler
                .handle_challenge(&challenge.auth_method, &challenge.extra)
                .map_err(|err| format!("{err:#}")),
            None => Err("no challenge handler is configured".to_owned()),
        };
        self.with_state(|state, notifications| {
            state.complete_challenge(connection, challenge.auth_method, signature, notifications)
        })
    }

    /// Sends the outcome of a procedure handler back to the router.
    pub(crate) fn reply_to_invocation(&self, request: Id, result: Result<RpcYield, RouterError>) {
        self.with_state(|state, _| {
            if !state.session.state().open() {
                debug!(
                    "Peer {} dropped the reply to invocation {request} because the session ended",
                    state.config.name
                );
                return;
            }
            let message = match result {
                Ok(rpc_yield) => Message::Yield(YieldMessage {
                    invocation_request: request,
                    options: rpc_yield.options,
                    arguments: rpc_yield.arguments,
                    arguments_keyword: rpc_yield.arguments_keyword,
                }),
                Err(err) => error_for_invocation(request, err),
            };
            if let Err(err) = state.send(&message) {
                error!(
                    "Peer {} failed to reply to invocation {request}: {err:#}",
                    state.config.name
                );
            }
        })
    }
}

impl TransportEventSink for PeerShared {
    fn handle_transport_event(&self, connection: u64, event: TransportEvent) {
        let challenge = self.with_state(|state, notifications| {
            state.handle_transport_event(connection, event, notifications)
        });
        if let Some(challenge) = challenge {
            self.answer_challenge(connection, challenge);
        }
    }
}

/// A WAMP client peer, which joins a single realm on a router.
///
/// Every request completes through its handler, exactly once, and never while the peer is locked.
/// Handlers may freely call back into the peer.
#[derive(Clone)]
pub struct Peer {
    shared: Arc<PeerShared>,
}

impl Debug for Peer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.lock();
        f.debug_struct("Peer")
            .field("name", &state.config.name)
            .field("state", &state.session.state())
            .finish_non_exhaustive()
    }
}

impl Peer {
    pub(crate) fn new(shared: Arc<PeerShared>) -> Self {
        Self { shared }
    }

    /// Starts connecting to the router.
    ///
    /// Only valid before the first connection or after a session ends.
    pub fn connect(&self) -> Result<()> {
        self.shared.with_state(|state, _| state.connect())
    }

    /// Leaves the realm.
    ///
    /// An established session says GOODBYE and waits for the router to reply. A session still
    /// negotiating is dropped immediately. Otherwise, this does nothing.
    pub fn disconnect(&self, reason: CloseReason) {
        self.shared
            .with_state(|state, notifications| state.disconnect(reason, notifications))
    }

    /// The current state of the session.
    pub fn state(&self) -> SessionState {
        self.shared.lock().session.state()
    }

    /// Checks if the peer is in an established session.
    pub fn is_connected(&self) -> bool {
        self.session_id().is_some()
    }

    /// The session ID assigned by the router, if a session is established.
    pub fn session_id(&self) -> Option<Id> {
        self.shared.lock().session.session_id()
    }

    /// Roles the router announced when welcoming the peer.
    pub fn router_roles(&self) -> HashSet<RouterRole> {
        self.shared.lock().session.router_roles().clone()
    }

    /// Calls a procedure.
    ///
    /// Returns the request ID, if the call was sent.
    pub fn call<H>(&self, procedure: Uri, rpc_call: RpcCall, handler: H) -> Option<Id>
    where
        H: FnOnce(Result<RpcResult, RequestError>) + Send + 'static,
    {
        self.shared.with_state(|state, notifications| {
            state.call(procedure, rpc_call, Box::new(handler), notifications)
        })
    }

    /// Subscribes to a topic.
    ///
    /// `event_handler` receives every event for the subscription while it is active.
    pub fn subscribe<E, H>(&self, topic: Uri, event_handler: E, handler: H) -> Option<Id>
    where
        E: Fn(Event) + Send + Sync + 'static,
        H: FnOnce(Result<Subscription, RequestError>) + Send + 'static,
    {
        self.subscribe_with_options(topic, Dictionary::default(), event_handler, handler)
    }

    /// Subscribes to a topic with SUBSCRIBE options, such as `match`.
    pub fn subscribe_with_options<E, H>(
        &self,
        topic: Uri,
        options: Dictionary,
        event_handler: E,
        handler: H,
    ) -> Option<Id>
    where
        E: Fn(Event) + Send + Sync + 'static,
        H: FnOnce(Result<Subscription, RequestError>) + Send + 'static,
    {
        self.shared.with_state(|state, notifications| {
            state.subscribe(
                topic,
                options,
                Arc::new(event_handler),
                Box::new(handler),
                notifications,
            )
        })
    }

    /// Publishes an event to a topic, without waiting for the router to acknowledge it.
    ///
    /// Any `acknowledge` option on the event is dropped, since nothing would receive the
    /// acknowledgement.
    pub fn publish(&self, topic: Uri, event: PublishedEvent) -> Result<Id, RequestError> {
        self.shared.with_state(|state, _| state.publish(topic, event))
    }

    /// Publishes an event to a topic, asking the router to acknowledge it.
    ///
    /// `handler` receives the publication ID.
    pub fn publish_acknowledged<H>(&self, topic: Uri, event: PublishedEvent, handler: H) -> Option<Id>
    where
        H: FnOnce(Result<Id, RequestError>) + Send + 'static,
    {
        self.shared.with_state(|state, notifications| {
            state.publish_acknowledged(topic, event, Box::new(handler), notifications)
        })
    }

    /// Registers a procedure.
    ///
    /// `procedure_handler` answers every invocation of the procedure while it is registered.
    pub fn register<P, H>(&self, procedure: Uri, procedure_handler: P, handler: H) -> Option<Id>
    where
        P: Fn(Invocation) -> Result<RpcYield, RouterError> + Send + Sync + 'static,
        H: FnOnce(Result<Registration, RequestError>) + Send + 'static,
    {
        self.register_with_options(procedure, Dictionary::default(), procedure_handler, handler)
    }

    /// Registers a procedure with REGISTER options, such as `match` or `invoke`.
    pub fn register_with_options<P, H>(
        &self,
        procedure: Uri,
        options: Dictionary,
        procedure_handler: P,
        handler: H,
    ) -> Option<Id>
    where
        P: Fn(Invocation) -> Result<RpcYield, RouterError> + Send + Sync + 'static,
        H: FnOnce(Result<Registration, RequestError>) + Send + 'static,
    {
        self.shared.with_state(|state, notifications| {
            state.register(
                procedure,
                options,
                Arc::new(procedure_handler),
                Box::new(handler),
                notifications,
            )
        })
    }
}
