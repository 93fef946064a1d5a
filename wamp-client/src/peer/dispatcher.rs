use std::sync::{
    Arc,
    atomic::AtomicBool,
};

use ahash::HashSet;
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
            AuthDeclined,
            InteractionError,
            ProtocolAnomaly,
            RequestError,
        },
        roles::RouterRole,
        types::{
            Dictionary,
            Value,
        },
    },
    message::{
        common::{
            abort_with_close_reason,
            error_for_invocation,
            goodbye_with_reason,
        },
        layout::Layout,
        message::{
            AbortMessage,
            AuthenticateMessage,
            ChallengeMessage,
            ErrorMessage,
            EventMessage,
            GoodbyeMessage,
            InvocationMessage,
            Message,
            PublishedMessage,
            RegisteredMessage,
            RequestKind,
            ResultMessage,
            SubscribedMessage,
            UnregisteredMessage,
            UnsubscribedMessage,
            WelcomeMessage,
        },
    },
    peer::{
        handler::{
            Event,
            Invocation,
            RpcResult,
        },
        pending::PendingRequest,
        registry::{
            Registration,
            RegistrationEntry,
            Subscription,
            SubscriptionEntry,
        },
        session::SessionState,
        state::{
            Notifications,
            PeerState,
        },
    },
    serializer::serializer::{
        SerializerType,
        new_serializer,
    },
    transport::transport::TransportEvent,
};

impl PeerState {
    /// Handles an event from the transport.
    ///
    /// Returns a challenge that must be answered once the lock is released.
    pub fn handle_transport_event(
        &mut self,
        connection: u64,
        event: TransportEvent,
        notifications: &mut Notifications,
    ) -> Option<ChallengeMessage> {
        if connection != self.connection {
            trace!(
                "Peer {} ignored {event:?} from stale connection {connection} (current is {})",
                self.config.name, self.connection
            );
            return None;
        }
        match event {
            TransportEvent::Connected(serializer_type) => {
                self.handle_connected(serializer_type, notifications)
            }
            TransportEvent::Disconnected { reason, code } => {
                self.handle_disconnected(reason, code, notifications)
            }
            TransportEvent::Received(payload) => return self.handle_payload(&payload, notifications),
            TransportEvent::ViabilityChanged(viable) => {
                debug!("Peer {} network viability changed: {viable}", self.config.name);
                self.notify(notifications, move |observer| {
                    observer.viability_changed(viable)
                });
            }
            TransportEvent::ReconnectSuggested(better_route) => {
                debug!(
                    "Peer {} transport suggested reconnecting (better route: {better_route})",
                    self.config.name
                );
                self.notify(notifications, move |observer| {
                    observer.reconnect_suggested(better_route)
                });
            }
        }
        None
    }

    fn handle_connected(&mut self, serializer_type: SerializerType, notifications: &mut Notifications) {
        if self.session.state() != SessionState::Connecting {
            warn!(
                "Peer {} ignored a transport connection while the session is {}",
                self.config.name,
                self.session.state().description()
            );
            return;
        }

        self.serializer = Some(new_serializer(serializer_type));
        let hello = self.hello_message();
        match self.send(&hello) {
            Ok(()) => {
                debug!(
                    "Peer {} connected with {} and sent HELLO",
                    self.config.name,
                    serializer_type.uri()
                );
                self.transition(SessionState::AwaitingWelcome);
            }
            Err(err) => {
                error!("Peer {} failed to send HELLO: {err:#}", self.config.name);
                let reason = format!("{err:#}");
                self.close_transport(&reason);
                self.terminate(&reason, notifications);
            }
        }
    }

    fn handle_disconnected(
        &mut self,
        reason: String,
        code: Option<u16>,
        notifications: &mut Notifications,
    ) {
        match self.session.state() {
            SessionState::Idle | SessionState::Closed => {
                trace!(
                    "Peer {} transport disconnected after the session ended",
                    self.config.name
                );
            }
            state => {
                match code {
                    Some(code) => warn!(
                        "Peer {} lost its connection while {} (code {code}): {reason}",
                        self.config.name,
                        state.description()
                    ),
                    None => warn!(
                        "Peer {} lost its connection while {}: {reason}",
                        self.config.name,
                        state.description()
                    ),
                }
                self.terminate(&reason, notifications);
            }
        }
    }

    fn handle_payload(
        &mut self,
        payload: &[u8],
        notifications: &mut Notifications,
    ) -> Option<ChallengeMessage> {
        if matches!(
            self.session.state(),
            SessionState::Idle | SessionState::Closed
        ) {
            trace!(
                "Peer {} discarded a payload that arrived with no session",
                self.config.name
            );
            return None;
        }
        let Some(serializer) = &self.serializer else {
            warn!(
                "Peer {} discarded a payload that arrived before the transport connected",
                self.config.name
            );
            return None;
        };
        let message = match serializer.deserialize_message(payload) {
            Ok(message) => message,
            Err(err) => {
                warn!("Peer {} failed to decode a message: {err}", self.config.name);
                self.notify(notifications, move |observer| observer.decode_failed(&err));
                return None;
            }
        };
        trace!("Peer {} received message: {message:?}", self.config.name);
        self.handle_message(message, notifications)
    }

    fn unexpected_message(&self, message: &Message, notifications: &mut Notifications) {
        self.report_anomaly(
            ProtocolAnomaly::UnexpectedMessage {
                message: message.message_name(),
                state: self.session.state().description(),
            },
            notifications,
        );
    }

    fn handle_message(
        &mut self,
        message: Message,
        notifications: &mut Notifications,
    ) -> Option<ChallengeMessage> {
        match message {
            Message::Welcome(message) => self.handle_welcome(message, notifications),
            Message::Challenge(message) => return self.handle_challenge(message, notifications),
            Message::Abort(message) => self.handle_abort(message, notifications),
            Message::Goodbye(message) => self.handle_goodbye(message, notifications),
            message if !self.session.state().open() => {
                self.unexpected_message(&message, notifications)
            }
            Message::Error(message) => self.handle_error(message, notifications),
            Message::Published(message) => self.handle_published(message, notifications),
            Message::Subscribed(message) => self.handle_subscribed(message, notifications),
            Message::Unsubscribed(message) => self.handle_unsubscribed(message, notifications),
            Message::Event(message) => self.handle_event(message, notifications),
            Message::Result(message) => self.handle_result(message, notifications),
            Message::Registered(message) => self.handle_registered(message, notifications),
            Message::Unregistered(message) => self.handle_unregistered(message, notifications),
            Message::Invocation(message) => self.handle_invocation(message, notifications),
            message @ (Message::Hello(_)
            | Message::Authenticate(_)
            | Message::Publish(_)
            | Message::Subscribe(_)
            | Message::Unsubscribe(_)
            | Message::Call(_)
            | Message::Register(_)
            | Message::Unregister(_)
            | Message::Yield(_)) => self.unexpected_message(&message, notifications),
        }
        None
    }

    fn handle_welcome(&mut self, message: WelcomeMessage, notifications: &mut Notifications) {
        if self.session.state() != SessionState::AwaitingWelcome {
            return self.unexpected_message(&Message::Welcome(message), notifications);
        }

        let router_roles = message
            .details
            .get("roles")
            .and_then(Value::dictionary)
            .map(|roles| {
                roles
                    .keys()
                    .filter_map(|role| RouterRole::try_from(role.as_str()).ok())
                    .collect::<HashSet<_>>()
            })
            .unwrap_or_default();
        if let Err(err) = self.session.establish(message.session, router_roles) {
            error!("Peer {} failed to establish its session: {err:#}", self.config.name);
            return;
        }

        info!(
            "Peer {} joined realm {} with session {}",
            self.config.name, self.config.realm, message.session
        );
        let session_id = message.session;
        let details = message.details;
        self.notify(notifications, move |observer| {
            observer.session_established(session_id, &details)
        });
    }

    fn handle_challenge(
        &mut self,
        message: ChallengeMessage,
        notifications: &mut Notifications,
    ) -> Option<ChallengeMessage> {
        if self.session.state() != SessionState::AwaitingWelcome {
            self.unexpected_message(&Message::Challenge(message), notifications);
            return None;
        }
        debug!(
            "Peer {} received a {} challenge",
            self.config.name, message.auth_method
        );
        self.transition(SessionState::AwaitingAuthenticate);
        Some(message)
    }

    /// Sends the answer to a challenge, or aborts the session if the challenge was declined.
    pub fn complete_challenge(
        &mut self,
        connection: u64,
        auth_method: String,
        signature: Result<String, String>,
        notifications: &mut Notifications,
    ) {
        if connection != self.connection
            || self.session.state() != SessionState::AwaitingAuthenticate
        {
            debug!(
                "Peer {} discarded a challenge answer because the session is {}",
                self.config.name,
                self.session.state().description()
            );
            return;
        }

        match signature {
            Ok(signature) => {
                let authenticate = Message::Authenticate(AuthenticateMessage {
                    signature,
                    extra: Dictionary::default(),
                });
                match self.send(&authenticate) {
                    Ok(()) => self.transition(SessionState::AwaitingWelcome),
                    Err(err) => {
                        error!("Peer {} failed to send AUTHENTICATE: {err:#}", self.config.name);
                        let reason = format!("{err:#}");
                        self.close_transport(&reason);
                        self.terminate(&reason, notifications);
                    }
                }
            }
            Err(reason) => {
                let declined = AuthDeclined {
                    method: auth_method,
                    reason,
                };
                warn!("Peer {} {declined}", self.config.name);
                self.notify(notifications, move |observer| {
                    observer.authentication_declined(&declined)
                });
                if let Err(err) = self.send(&abort_with_close_reason(CloseReason::SystemShutdown)) {
                    warn!("Peer {} failed to send ABORT: {err:#}", self.config.name);
                }
                let reason = CloseReason::SystemShutdown.uri();
                self.close_transport(reason.as_ref());
                self.terminate(reason.as_ref(), notifications);
            }
        }
    }

    fn handle_abort(&mut self, message: AbortMessage, notifications: &mut Notifications) {
        warn!(
            "Peer {} was aborted by the router: {}",
            self.config.name, message.reason
        );
        self.close_transport(message.reason.as_ref());
        self.terminate(message.reason.as_ref(), notifications);
    }

    fn handle_goodbye(&mut self, message: GoodbyeMessage, notifications: &mut Notifications) {
        match self.session.state() {
            SessionState::Established(_) => {
                info!(
                    "Peer {} was asked to leave by the router: {}",
                    self.config.name, message.reason
                );
                if message.reason != self.config.goodbye_ack_reason {
                    let reply = goodbye_with_reason(self.config.goodbye_ack_reason.clone());
                    if let Err(err) = self.send(&reply) {
                        warn!("Peer {} failed to reply with GOODBYE: {err:#}", self.config.name);
                    }
                }
            }
            SessionState::Closing => {
                debug!(
                    "Peer {} goodbye was acknowledged: {}",
                    self.config.name, message.reason
                );
            }
            _ => return self.unexpected_message(&Message::Goodbye(message), notifications),
        }
        self.close_transport(message.reason.as_ref());
        self.terminate(message.reason.as_ref(), notifications);
    }

    fn handle_error(&mut self, message: ErrorMessage, notifications: &mut Notifications) {
        let kind = match RequestKind::try_from(message.request_type) {
            Ok(kind) => kind,
            Err(request_type) => {
                return self.report_anomaly(
                    ProtocolAnomaly::UnknownRequestKind(request_type),
                    notifications,
                );
            }
        };
        match self
            .requests
            .take_kind(message.request, kind, ErrorMessage::NAME)
        {
            Ok(request) => {
                debug!(
                    "Peer {} {} request {} failed: {}",
                    self.config.name,
                    kind.message_name(),
                    message.request,
                    message.error
                );
                notifications.push_boxed(request.fail(RequestError::Router(message.into())));
            }
            Err(anomaly) => self.report_anomaly(anomaly, notifications),
        }
    }

    fn handle_published(&mut self, message: PublishedMessage, notifications: &mut Notifications) {
        match self.requests.take(
            message.publish_request,
            PublishedMessage::NAME,
            |request| match request {
                PendingRequest::Publish { handler } => Ok(handler),
                request => Err(request),
            },
        ) {
            Ok(handler) => notifications.push(move || handler(Ok(message.publication))),
            Err(anomaly) => self.report_anomaly(anomaly, notifications),
        }
    }

    fn handle_subscribed(&mut self, message: SubscribedMessage, notifications: &mut Notifications) {
        let (topic, event_handler, handler) = match self.requests.take(
            message.subscribe_request,
            SubscribedMessage::NAME,
            |request| match request {
                PendingRequest::Subscribe {
                    topic,
                    event_handler,
                    handler,
                } => Ok((topic, event_handler, handler)),
                request => Err(request),
            },
        ) {
            Ok(pending) => pending,
            Err(anomaly) => return self.report_anomaly(anomaly, notifications),
        };

        let active = Arc::new(AtomicBool::new(true));
        let entry = SubscriptionEntry {
            topic: topic.clone(),
            handler: event_handler,
            active: active.clone(),
        };
        if let Some(replaced) = self.subscriptions.insert(message.subscription, entry) {
            warn!(
                "Peer {} replaced subscription {} to {}",
                self.config.name, message.subscription, replaced.topic
            );
        }
        debug!(
            "Peer {} subscribed to {topic} with subscription {}",
            self.config.name, message.subscription
        );
        let subscription =
            Subscription::new(message.subscription, topic, active, self.peer.clone());
        notifications.push(move || handler(Ok(subscription)));
    }

    fn handle_unsubscribed(
        &mut self,
        message: UnsubscribedMessage,
        notifications: &mut Notifications,
    ) {
        let (subscription, handler) = match self.requests.take(
            message.unsubscribe_request,
            UnsubscribedMessage::NAME,
            |request| match request {
                PendingRequest::Unsubscribe {
                    subscription,
                    handler,
                } => Ok((subscription, handler)),
                request => Err(request),
            },
        ) {
            Ok(pending) => pending,
            Err(anomaly) => return self.report_anomaly(anomaly, notifications),
        };

        if self.subscriptions.remove(subscription).is_none() {
            debug!(
                "Peer {} subscription {subscription} was already removed",
                self.config.name
            );
        }
        notifications.push(move || handler(Ok(())));
    }

    fn handle_event(&mut self, message: EventMessage, notifications: &mut Notifications) {
        let Some(entry) = self.subscriptions.get(message.subscription) else {
            return self.report_anomaly(
                ProtocolAnomaly::UnknownSubscription(message.subscription),
                notifications,
            );
        };
        let handler = entry.handler.clone();
        let event = Event {
            subscription: message.subscription,
            publication: message.publication,
            details: message.details,
            arguments: message.arguments,
            arguments_keyword: message.arguments_keyword,
        };
        notifications.push(move || handler(event));
    }

    fn handle_result(&mut self, message: ResultMessage, notifications: &mut Notifications) {
        match self
            .requests
            .take(message.call_request, ResultMessage::NAME, |request| {
                match request {
                    PendingRequest::Call { handler } => Ok(handler),
                    request => Err(request),
                }
            }) {
            Ok(handler) => {
                let result = RpcResult {
                    details: message.details,
                    arguments: message.arguments,
                    arguments_keyword: message.arguments_keyword,
                };
                notifications.push(move || handler(Ok(result)));
            }
            Err(anomaly) => self.report_anomaly(anomaly, notifications),
        }
    }

    fn handle_registered(&mut self, message: RegisteredMessage, notifications: &mut Notifications) {
        let (procedure, procedure_handler, handler) = match self.requests.take(
            message.register_request,
            RegisteredMessage::NAME,
            |request| match request {
                PendingRequest::Register {
                    procedure,
                    procedure_handler,
                    handler,
                } => Ok((procedure, procedure_handler, handler)),
                request => Err(request),
            },
        ) {
            Ok(pending) => pending,
            Err(anomaly) => return self.report_anomaly(anomaly, notifications),
        };

        let active = Arc::new(AtomicBool::new(true));
        let entry = RegistrationEntry {
            procedure: procedure.clone(),
            handler: procedure_handler,
            active: active.clone(),
        };
        if let Some(replaced) = self.registrations.insert(message.registration, entry) {
            warn!(
                "Peer {} replaced registration {} of {}",
                self.config.name, message.registration, replaced.procedure
            );
        }
        debug!(
            "Peer {} registered {procedure} with registration {}",
            self.config.name, message.registration
        );
        let registration =
            Registration::new(message.registration, procedure, active, self.peer.clone());
        notifications.push(move || handler(Ok(registration)));
    }

    fn handle_unregistered(
        &mut self,
        message: UnregisteredMessage,
        notifications: &mut Notifications,
    ) {
        let (registration, handler) = match self.requests.take(
            message.unregister_request,
            UnregisteredMessage::NAME,
            |request| match request {
                PendingRequest::Unregister {
                    registration,
                    handler,
                } => Ok((registration, handler)),
                request => Err(request),
            },
        ) {
            Ok(pending) => pending,
            Err(anomaly) => return self.report_anomaly(anomaly, notifications),
        };

        if self.registrations.remove(registration).is_none() {
            debug!(
                "Peer {} registration {registration} was already removed",
                self.config.name
            );
        }
        notifications.push(move || handler(Ok(())));
    }

    fn handle_invocation(&mut self, message: InvocationMessage, notifications: &mut Notifications) {
        let Some(entry) = self.registrations.get(message.registration) else {
            self.report_anomaly(
                ProtocolAnomaly::UnknownRegistration(message.registration),
                notifications,
            );
            let reply =
                error_for_invocation(message.request, InteractionError::NoSuchRegistration.into());
            if let Err(err) = self.send(&reply) {
                warn!(
                    "Peer {} failed to reject invocation {}: {err:#}",
                    self.config.name, message.request
                );
            }
            return;
        };

        let handler = entry.handler.clone();
        let peer = self.peer.clone();
        let invocation = Invocation {
            request: message.request,
            registration: message.registration,
            details: message.details,
            arguments: message.arguments,
            arguments_keyword: message.arguments_keyword,
        };
        notifications.push(move || {
            let request = invocation.request;
            let result = handler(invocation);
            if let Some(peer) = peer.upgrade() {
                peer.reply_to_invocation(request, result);
            }
        });
    }
}
