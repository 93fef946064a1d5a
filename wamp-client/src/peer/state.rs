use std::sync::{
    Arc,
    Weak,
};

use anyhow::{
    Error,
    Result,
};
use log::{
    debug,
    error,
    info,
    trace,
    warn,
};

use crate::{
    core::{
        close::CloseReason,
        error::{
            PeerNotConnectedError,
            ProtocolAnomaly,
            RequestError,
            SessionTerminated,
        },
        id::{
            Id,
            IdAllocator,
            SequentialIdAllocator,
        },
        types::{
            Dictionary,
            Value,
        },
        uri::Uri,
    },
    message::{
        common::goodbye_with_close_reason,
        message::{
            CallMessage,
            HelloMessage,
            Message,
            PublishMessage,
            RegisterMessage,
            RequestKind,
            SubscribeMessage,
            UnregisterMessage,
            UnsubscribeMessage,
        },
    },
    peer::{
        handler::{
            EventHandler,
            ProcedureHandler,
            PublishedEvent,
            ResultHandler,
            RpcCall,
            RpcResult,
        },
        observer::PeerObserver,
        peer::{
            PeerConfig,
            PeerShared,
        },
        pending::{
            PendingRequest,
            PendingRequests,
        },
        registry::{
            Registration,
            RegistrationEntry,
            Registry,
            Subscription,
            SubscriptionEntry,
        },
        session::{
            Session,
            SessionState,
        },
    },
    serializer::serializer::Serializer,
    transport::transport::{
        Transport,
        TransportEventSink,
        TransportEvents,
    },
};

/// Calls to user code, collected while the peer is locked and run after it is released.
#[derive(Default)]
pub(crate) struct Notifications {
    notifications: Vec<Box<dyn FnOnce() + Send>>,
}

impl Notifications {
    pub fn push<F>(&mut self, notification: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.notifications.push(Box::new(notification));
    }

    pub fn push_boxed(&mut self, notification: Box<dyn FnOnce() + Send>) {
        self.notifications.push(notification);
    }

    pub fn run(self) {
        for notification in self.notifications {
            notification();
        }
    }
}

/// Everything a peer owns, guarded by a single lock.
pub(crate) struct PeerState {
    pub config: PeerConfig,
    pub observer: Option<Arc<dyn PeerObserver>>,
    pub peer: Weak<PeerShared>,
    pub session: Session,
    pub transport: Box<dyn Transport>,
    /// The latest connection attempt. Transport events from any other attempt are stale.
    pub connection: u64,
    pub serializer: Option<Box<dyn Serializer>>,
    pub id_allocator: SequentialIdAllocator,
    pub requests: PendingRequests,
    pub subscriptions: Registry<SubscriptionEntry>,
    pub registrations: Registry<RegistrationEntry>,
}

impl PeerState {
    pub fn new(
        config: PeerConfig,
        observer: Option<Arc<dyn PeerObserver>>,
        peer: Weak<PeerShared>,
        transport: Box<dyn Transport>,
    ) -> Self {
        let session = Session::new(config.name.clone());
        Self {
            config,
            observer,
            peer,
            session,
            transport,
            connection: 0,
            serializer: None,
            id_allocator: SequentialIdAllocator::default(),
            requests: PendingRequests::default(),
            subscriptions: Registry::default(),
            registrations: Registry::default(),
        }
    }

    /// Schedules a call to the observer, if there is one.
    pub fn notify<F>(&self, notifications: &mut Notifications, f: F)
    where
        F: FnOnce(&dyn PeerObserver) + Send + 'static,
    {
        if let Some(observer) = self.observer.clone() {
            notifications.push(move || f(observer.as_ref()));
        }
    }

    pub fn report_anomaly(&self, anomaly: ProtocolAnomaly, notifications: &mut Notifications) {
        warn!("Peer {} ignored a message: {anomaly}", self.config.name);
        self.notify(notifications, move |observer| {
            observer.protocol_anomaly(&anomaly)
        });
    }

    pub fn transition(&mut self, state: SessionState) {
        if let Err(err) = self.session.transition_state(state) {
            error!("Peer {} state machine rejected a transition: {err:#}", self.config.name);
        }
    }

    pub fn send(&mut self, message: &Message) -> Result<()> {
        let serializer = self
            .serializer
            .as_ref()
            .ok_or_else(|| Error::msg("no serializer is bound to the connection"))?;
        let payload = serializer.serialize_message(message)?;
        trace!("Peer {} sending message: {message:?}", self.config.name);
        self.transport.send(payload)
    }

    pub fn close_transport(&mut self, reason: &str) {
        if let Err(err) = self.transport.disconnect(reason) {
            warn!(
                "Peer {} failed to disconnect its transport: {err:#}",
                self.config.name
            );
        }
    }

    pub fn hello_message(&self) -> Message {
        let roles = self
            .config
            .roles
            .iter()
            .map(|role| {
                (
                    role.name().to_owned(),
                    Value::Dictionary(Dictionary::default()),
                )
            })
            .collect::<Dictionary>();
        let mut message = HelloMessage {
            realm: self.config.realm.clone(),
            details: Dictionary::from_iter([
                ("agent".to_owned(), Value::String(self.config.agent.clone())),
                ("roles".to_owned(), Value::Dictionary(roles)),
            ]),
        };
        if let Some(auth) = &self.config.auth {
            auth.embed_into_hello_message(&mut message);
        }
        Message::Hello(message)
    }

    pub fn connect(&mut self) -> Result<()> {
        let state = self.session.state();
        if !matches!(state, SessionState::Idle | SessionState::Closed) {
            return Err(Error::msg(format!(
                "cannot connect while the session is {}",
                state.description()
            )));
        }

        self.session.transition_state(SessionState::Connecting)?;
        self.connection += 1;
        let sink: Weak<dyn TransportEventSink> = self.peer.clone();
        if let Err(err) = self
            .transport
            .connect(TransportEvents::new(sink, self.connection))
        {
            self.transition(SessionState::Closed);
            return Err(err.context("failed to connect transport"));
        }
        debug!(
            "Peer {} connecting to realm {} (connection {})",
            self.config.name, self.config.realm, self.connection
        );
        Ok(())
    }

    pub fn disconnect(&mut self, reason: CloseReason, notifications: &mut Notifications) {
        match self.session.state() {
            SessionState::Established(_) => {
                let goodbye = goodbye_with_close_reason(reason.clone());
                match self.send(&goodbye) {
                    Ok(()) => {
                        info!(
                            "Peer {} leaving realm {} with reason {}",
                            self.config.name,
                            self.config.realm,
                            reason.uri()
                        );
                        self.transition(SessionState::Closing);
                    }
                    Err(err) => {
                        error!("Peer {} failed to send GOODBYE: {err:#}", self.config.name);
                        let reason = reason.uri();
                        self.close_transport(reason.as_ref());
                        self.terminate(reason.as_ref(), notifications);
                    }
                }
            }
            state if state.negotiating() => {
                let reason = reason.uri();
                self.close_transport(reason.as_ref());
                self.terminate(reason.as_ref(), notifications);
            }
            state => debug!(
                "Peer {} ignored disconnect because the session is {}",
                self.config.name,
                state.description()
            ),
        }
    }

    /// Ends the session, failing everything still waiting on the router.
    ///
    /// Does nothing if no session is in progress.
    pub fn terminate(&mut self, reason: &str, notifications: &mut Notifications) {
        if matches!(
            self.session.state(),
            SessionState::Idle | SessionState::Closed
        ) {
            return;
        }

        self.transition(SessionState::Closed);
        let terminated = SessionTerminated {
            reason: reason.to_owned(),
        };
        for request in self.requests.drain() {
            notifications.push_boxed(request.fail(terminated.clone().into()));
        }
        self.subscriptions.clear();
        self.registrations.clear();
        self.serializer = None;

        info!("Peer {} session ended: {reason}", self.config.name);
        let reason = reason.to_owned();
        self.notify(notifications, move |observer| observer.session_ended(&reason));
    }

    /// Hands the handler back if the session is established, and fails it otherwise.
    fn require_established<T>(
        &self,
        handler: ResultHandler<T>,
        notifications: &mut Notifications,
    ) -> Option<ResultHandler<T>>
    where
        T: Send + 'static,
    {
        if self.session.session_id().is_some() {
            Some(handler)
        } else {
            notifications.push(move || handler(Err(PeerNotConnectedError.into())));
            None
        }
    }

    fn next_request_id(&mut self) -> Id {
        loop {
            let id = self.id_allocator.generate_id();
            if !self.requests.contains(id) {
                return id;
            }
        }
    }

    fn send_request(
        &mut self,
        request: Id,
        pending: PendingRequest,
        message: Message,
        notifications: &mut Notifications,
    ) -> Option<Id> {
        self.requests.insert(request, pending);
        match self.send(&message) {
            Ok(()) => Some(request),
            Err(err) => {
                error!(
                    "Peer {} failed to send {} message: {err:#}",
                    self.config.name,
                    message.message_name()
                );
                if let Some(pending) = self.requests.remove(request) {
                    let err = RequestError::Transport(format!("{err:#}"));
                    notifications.push_boxed(pending.fail(err));
                }
                None
            }
        }
    }

    pub fn call(
        &mut self,
        procedure: Uri,
        rpc_call: RpcCall,
        handler: ResultHandler<RpcResult>,
        notifications: &mut Notifications,
    ) -> Option<Id> {
        let handler = self.require_established(handler, notifications)?;
        let request = self.next_request_id();
        let message = Message::Call(CallMessage {
            request,
            options: rpc_call.options,
            procedure,
            arguments: rpc_call.arguments,
            arguments_keyword: rpc_call.arguments_keyword,
        });
        self.send_request(request, PendingRequest::Call { handler }, message, notifications)
    }

    pub fn subscribe(
        &mut self,
        topic: Uri,
        options: Dictionary,
        event_handler: EventHandler,
        handler: ResultHandler<Subscription>,
        notifications: &mut Notifications,
    ) -> Option<Id> {
        let handler = self.require_established(handler, notifications)?;
        let request = self.next_request_id();
        let message = Message::Subscribe(SubscribeMessage {
            request,
            options,
            topic: topic.clone(),
        });
        self.send_request(
            request,
            PendingRequest::Subscribe {
                topic,
                event_handler,
                handler,
            },
            message,
            notifications,
        )
    }

    pub fn unsubscribe(
        &mut self,
        subscription: Id,
        handler: ResultHandler<()>,
        notifications: &mut Notifications,
    ) -> Option<Id> {
        let handler = self.require_established(handler, notifications)?;
        if !self.subscriptions.contains(subscription) {
            notifications.push(move || handler(Err(RequestError::Inactive("subscription"))));
            return None;
        }
        if self.requests.cancels(RequestKind::Unsubscribe, subscription) {
            notifications.push(move || handler(Err(RequestError::Canceling("subscription"))));
            return None;
        }
        let request = self.next_request_id();
        let message = Message::Unsubscribe(UnsubscribeMessage {
            request,
            subscribed_subscription: subscription,
        });
        self.send_request(
            request,
            PendingRequest::Unsubscribe {
                subscription,
                handler,
            },
            message,
            notifications,
        )
    }

    fn publish_message(
        &mut self,
        topic: Uri,
        event: PublishedEvent,
        acknowledge: bool,
    ) -> (Id, Message) {
        let mut options = event.options;
        if acknowledge {
            options.insert("acknowledge".to_owned(), Value::Bool(true));
        } else {
            options.remove("acknowledge");
        }
        let request = self.next_request_id();
        let message = Message::Publish(PublishMessage {
            request,
            options,
            topic,
            arguments: event.arguments,
            arguments_keyword: event.arguments_keyword,
        });
        (request, message)
    }

    pub fn publish(&mut self, topic: Uri, event: PublishedEvent) -> Result<Id, RequestError> {
        if self.session.session_id().is_none() {
            return Err(PeerNotConnectedError.into());
        }
        let (request, message) = self.publish_message(topic, event, false);
        self.send(&message)
            .map_err(|err| RequestError::Transport(format!("{err:#}")))?;
        Ok(request)
    }

    pub fn publish_acknowledged(
        &mut self,
        topic: Uri,
        event: PublishedEvent,
        handler: ResultHandler<Id>,
        notifications: &mut Notifications,
    ) -> Option<Id> {
        let handler = self.require_established(handler, notifications)?;
        let (request, message) = self.publish_message(topic, event, true);
        self.send_request(request, PendingRequest::Publish { handler }, message, notifications)
    }

    pub fn register(
        &mut self,
        procedure: Uri,
        options: Dictionary,
        procedure_handler: ProcedureHandler,
        handler: ResultHandler<Registration>,
        notifications: &mut Notifications,
    ) -> Option<Id> {
        let handler = self.require_established(handler, notifications)?;
        let request = self.next_request_id();
        let message = Message::Register(RegisterMessage {
            request,
            options,
            procedure: procedure.clone(),
        });
        self.send_request(
            request,
            PendingRequest::Register {
                procedure,
                procedure_handler,
                handler,
            },
            message,
            notifications,
        )
    }

    pub fn unregister(
        &mut self,
        registration: Id,
        handler: ResultHandler<()>,
        notifications: &mut Notifications,
    ) -> Option<Id> {
        let handler = self.require_established(handler, notifications)?;
        if !self.registrations.contains(registration) {
            notifications.push(move || handler(Err(RequestError::Inactive("registration"))));
            return None;
        }
        if self.requests.cancels(RequestKind::Unregister, registration) {
            notifications.push(move || handler(Err(RequestError::Canceling("registration"))));
            return None;
        }
        let request = self.next_request_id();
        let message = Message::Unregister(UnregisterMessage {
            request,
            registered_registration: registration,
        });
        self.send_request(
            request,
            PendingRequest::Unregister {
                registration,
                handler,
            },
            message,
            notifications,
        )
    }
}
