use serde::{
    Deserialize,
    Serialize,
};

use crate::{
    core::{
        error::DecodeError,
        id::Id,
        types::{
            Dictionary,
            Integer,
            List,
            Value,
        },
        uri::Uri,
    },
    message::layout::{
        FieldReader,
        Layout,
        encode_arguments,
    },
};

/// A HELLO message for a peer to initiate a WAMP session in a realm.
#[derive(Debug, Clone, PartialEq)]
pub struct HelloMessage {
    pub realm: Uri,
    pub details: Dictionary,
}

impl Layout for HelloMessage {
    const TAG: u64 = 1;
    const NAME: &'static str = "HELLO";

    fn encode_fields(&self, fields: &mut List) {
        fields.push(self.realm.clone().into());
        fields.push(Value::Dictionary(self.details.clone()));
    }

    fn decode_fields(reader: &mut FieldReader) -> Result<Self, DecodeError> {
        Ok(Self {
            realm: reader.required("realm")?,
            details: reader.required("details")?,
        })
    }
}

/// A WELCOME message for a router to confirm a peer's WAMP session in a realm.
#[derive(Debug, Clone, PartialEq)]
pub struct WelcomeMessage {
    pub session: Id,
    pub details: Dictionary,
}

impl Layout for WelcomeMessage {
    const TAG: u64 = 2;
    const NAME: &'static str = "WELCOME";

    fn encode_fields(&self, fields: &mut List) {
        fields.push(self.session.into());
        fields.push(Value::Dictionary(self.details.clone()));
    }

    fn decode_fields(reader: &mut FieldReader) -> Result<Self, DecodeError> {
        Ok(Self {
            session: reader.required("session")?,
            details: reader.required("details")?,
        })
    }
}

/// An ABORT message for quickly terminating a WAMP session.
#[derive(Debug, Clone, PartialEq)]
pub struct AbortMessage {
    pub details: Dictionary,
    pub reason: Uri,
}

impl Layout for AbortMessage {
    const TAG: u64 = 3;
    const NAME: &'static str = "ABORT";

    fn encode_fields(&self, fields: &mut List) {
        fields.push(Value::Dictionary(self.details.clone()));
        fields.push(self.reason.clone().into());
    }

    fn decode_fields(reader: &mut FieldReader) -> Result<Self, DecodeError> {
        Ok(Self {
            details: reader.required("details")?,
            reason: reader.required("reason")?,
        })
    }
}

/// A CHALLENGE message for a router to request authentication from a joining peer.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ChallengeMessage {
    pub auth_method: String,
    pub extra: Dictionary,
}

impl Layout for ChallengeMessage {
    const TAG: u64 = 4;
    const NAME: &'static str = "CHALLENGE";

    fn encode_fields(&self, fields: &mut List) {
        fields.push(Value::String(self.auth_method.clone()));
        fields.push(Value::Dictionary(self.extra.clone()));
    }

    fn decode_fields(reader: &mut FieldReader) -> Result<Self, DecodeError> {
        Ok(Self {
            auth_method: reader.required("auth method")?,
            extra: reader.required("extra")?,
        })
    }
}

/// An AUTHENTICATE message for a peer to answer a CHALLENGE.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct AuthenticateMessage {
    pub signature: String,
    pub extra: Dictionary,
}

impl Layout for AuthenticateMessage {
    const TAG: u64 = 5;
    const NAME: &'static str = "AUTHENTICATE";

    fn encode_fields(&self, fields: &mut List) {
        fields.push(Value::String(self.signature.clone()));
        fields.push(Value::Dictionary(self.extra.clone()));
    }

    fn decode_fields(reader: &mut FieldReader) -> Result<Self, DecodeError> {
        Ok(Self {
            signature: reader.required("signature")?,
            extra: reader.required("extra")?,
        })
    }
}

/// A GOODBYE message for ending a WAMP session with a two-way handshake.
#[derive(Debug, Clone, PartialEq)]
pub struct GoodbyeMessage {
    pub details: Dictionary,
    pub reason: Uri,
}

impl Layout for GoodbyeMessage {
    const TAG: u64 = 6;
    const NAME: &'static str = "GOODBYE";

    fn encode_fields(&self, fields: &mut List) {
        fields.push(Value::Dictionary(self.details.clone()));
        fields.push(self.reason.clone().into());
    }

    fn decode_fields(reader: &mut FieldReader) -> Result<Self, DecodeError> {
        Ok(Self {
            details: reader.required("details")?,
            reason: reader.required("reason")?,
        })
    }
}

/// An ERROR message for communicating an error in response to a single request.
///
/// The request type is the code of the message that failed, so the error can be routed without
/// knowing which table the request belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorMessage {
    pub request_type: Integer,
    pub request: Id,
    pub details: Dictionary,
    pub error: Uri,
    pub arguments: List,
    pub arguments_keyword: Dictionary,
}

impl Layout for ErrorMessage {
    const TAG: u64 = 8;
    const NAME: &'static str = "ERROR";

    fn encode_fields(&self, fields: &mut List) {
        fields.push(Value::Integer(self.request_type));
        fields.push(self.request.into());
        fields.push(Value::Dictionary(self.details.clone()));
        fields.push(self.error.clone().into());
        encode_arguments(fields, &self.arguments, &self.arguments_keyword);
    }

    fn decode_fields(reader: &mut FieldReader) -> Result<Self, DecodeError> {
        Ok(Self {
            request_type: reader.required("request type")?,
            request: reader.required("request")?,
            details: reader.required("details")?,
            error: reader.required("error")?,
            arguments: reader.optional("arguments")?,
            arguments_keyword: reader.optional("keyword arguments")?,
        })
    }
}

/// A PUBLISH message for publishing an event to a topic.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishMessage {
    pub request: Id,
    pub options: Dictionary,
    pub topic: Uri,
    pub arguments: List,
    pub arguments_keyword: Dictionary,
}

impl Layout for PublishMessage {
    const TAG: u64 = 16;
    const NAME: &'static str = "PUBLISH";

    fn encode_fields(&self, fields: &mut List) {
        fields.push(self.request.into());
        fields.push(Value::Dictionary(self.options.clone()));
        fields.push(self.topic.clone().into());
        encode_arguments(fields, &self.arguments, &self.arguments_keyword);
    }

    fn decode_fields(reader: &mut FieldReader) -> Result<Self, DecodeError> {
        Ok(Self {
            request: reader.required("request")?,
            options: reader.required("options")?,
            topic: reader.required("topic")?,
            arguments: reader.optional("arguments")?,
            arguments_keyword: reader.optional("keyword arguments")?,
        })
    }
}

/// A PUBLISHED message for acknowledging a publication.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PublishedMessage {
    pub publish_request: Id,
    pub publication: Id,
}

impl Layout for PublishedMessage {
    const TAG: u64 = 17;
    const NAME: &'static str = "PUBLISHED";

    fn encode_fields(&self, fields: &mut List) {
        fields.push(self.publish_request.into());
        fields.push(self.publication.into());
    }

    fn decode_fields(reader: &mut FieldReader) -> Result<Self, DecodeError> {
        Ok(Self {
            publish_request: reader.required("publish request")?,
            publication: reader.required("publication")?,
        })
    }
}

/// A SUBSCRIBE message for subscribing to a topic.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscribeMessage {
    pub request: Id,
    pub options: Dictionary,
    pub topic: Uri,
}

impl Layout for SubscribeMessage {
    const TAG: u64 = 32;
    const NAME: &'static str = "SUBSCRIBE";

    fn encode_fields(&self, fields: &mut List) {
        fields.push(self.request.into());
        fields.push(Value::Dictionary(self.options.clone()));
        fields.push(self.topic.clone().into());
    }

    fn decode_fields(reader: &mut FieldReader) -> Result<Self, DecodeError> {
        Ok(Self {
            request: reader.required("request")?,
            options: reader.required("options")?,
            topic: reader.required("topic")?,
        })
    }
}

/// A SUBSCRIBED message for confirming a subscription.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SubscribedMessage {
    pub subscribe_request: Id,
    pub subscription: Id,
}

impl Layout for SubscribedMessage {
    const TAG: u64 = 33;
    const NAME: &'static str = "SUBSCRIBED";

    fn encode_fields(&self, fields: &mut List) {
        fields.push(self.subscribe_request.into());
        fields.push(self.subscription.into());
    }

    fn decode_fields(reader: &mut FieldReader) -> Result<Self, DecodeError> {
        Ok(Self {
            subscribe_request: reader.required("subscribe request")?,
            subscription: reader.required("subscription")?,
        })
    }
}

/// An UNSUBSCRIBE message for removing a subscription.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct UnsubscribeMessage {
    pub request: Id,
    pub subscribed_subscription: Id,
}

impl Layout for UnsubscribeMessage {
    const TAG: u64 = 34;
    const NAME: &'static str = "UNSUBSCRIBE";

    fn encode_fields(&self, fields: &mut List) {
        fields.push(self.request.into());
        fields.push(self.subscribed_subscription.into());
    }

    fn decode_fields(reader: &mut FieldReader) -> Result<Self, DecodeError> {
        Ok(Self {
            request: reader.required("request")?,
            subscribed_subscription: reader.required("subscription")?,
        })
    }
}

/// An UNSUBSCRIBED message for confirming the removal of a subscription.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct UnsubscribedMessage {
    pub unsubscribe_request: Id,
}

impl Layout for UnsubscribedMessage {
    const TAG: u64 = 35;
    const NAME: &'static str = "UNSUBSCRIBED";

    fn encode_fields(&self, fields: &mut List) {
        fields.push(self.unsubscribe_request.into());
    }

    fn decode_fields(reader: &mut FieldReader) -> Result<Self, DecodeError> {
        Ok(Self {
            unsubscribe_request: reader.required("unsubscribe request")?,
        })
    }
}

/// An EVENT message for delivering a publication to a subscriber.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct EventMessage {
    pub subscription: Id,
    pub publication: Id,
    pub details: Dictionary,
    pub arguments: List,
    pub arguments_keyword: Dictionary,
}

impl Layout for EventMessage {
    const TAG: u64 = 36;
    const NAME: &'static str = "EVENT";

    fn encode_fields(&self, fields: &mut List) {
        fields.push(self.subscription.into());
        fields.push(self.publication.into());
        fields.push(Value::Dictionary(self.details.clone()));
        encode_arguments(fields, &self.arguments, &self.arguments_keyword);
    }

    fn decode_fields(reader: &mut FieldReader) -> Result<Self, DecodeError> {
        Ok(Self {
            subscription: reader.required("subscription")?,
            publication: reader.required("publication")?,
            details: reader.required("details")?,
            arguments: reader.optional("arguments")?,
            arguments_keyword: reader.optional("keyword arguments")?,
        })
    }
}

/// A CALL message for calling a procedure.
#[derive(Debug, Clone, PartialEq)]
pub struct CallMessage {
    pub request: Id,
    pub options: Dictionary,
    pub procedure: Uri,
    pub arguments: List,
    pub arguments_keyword: Dictionary,
}

impl Layout for CallMessage {
    const TAG: u64 = 48;
    const NAME: &'static str = "CALL";

    fn encode_fields(&self, fields: &mut List) {
        fields.push(self.request.into());
        fields.push(Value::Dictionary(self.options.clone()));
        fields.push(self.procedure.clone().into());
        encode_arguments(fields, &self.arguments, &self.arguments_keyword);
    }

    fn decode_fields(reader: &mut FieldReader) -> Result<Self, DecodeError> {
        Ok(Self {
            request: reader.required("request")?,
            options: reader.required("options")?,
            procedure: reader.required("procedure")?,
            arguments: reader.optional("arguments")?,
            arguments_keyword: reader.optional("keyword arguments")?,
        })
    }
}

/// A RESULT message for delivering the result of a procedure call.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ResultMessage {
    pub call_request: Id,
    pub details: Dictionary,
    pub arguments: List,
    pub arguments_keyword: Dictionary,
}

impl Layout for ResultMessage {
    const TAG: u64 = 50;
    const NAME: &'static str = "RESULT";

    fn encode_fields(&self, fields: &mut List) {
        fields.push(self.call_request.into());
        fields.push(Value::Dictionary(self.details.clone()));
        encode_arguments(fields, &self.arguments, &self.arguments_keyword);
    }

    fn decode_fields(reader: &mut FieldReader) -> Result<Self, DecodeError> {
        Ok(Self {
            call_request: reader.required("call request")?,
            details: reader.required("details")?,
            arguments: reader.optional("arguments")?,
            arguments_keyword: reader.optional("keyword arguments")?,
        })
    }
}

/// A REGISTER message for registering a procedure.
#[derive(Debug, Clone, PartialEq)]
pub struct RegisterMessage {
    pub request: Id,
    pub options: Dictionary,
    pub procedure: Uri,
}

impl Layout for RegisterMessage {
    const TAG: u64 = 64;
    const NAME: &'static str = "REGISTER";

    fn encode_fields(&self, fields: &mut List) {
        fields.push(self.request.into());
        fields.push(Value::Dictionary(self.options.clone()));
        fields.push(self.procedure.clone().into());
    }

    fn decode_fields(reader: &mut FieldReader) -> Result<Self, DecodeError> {
        Ok(Self {
            request: reader.required("request")?,
            options: reader.required("options")?,
            procedure: reader.required("procedure")?,
        })
    }
}

/// A REGISTERED message for confirming a registration.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RegisteredMessage {
    pub register_request: Id,
    pub registration: Id,
}

impl Layout for RegisteredMessage {
    const TAG: u64 = 65;
    const NAME: &'static str = "REGISTERED";

    fn encode_fields(&self, fields: &mut List) {
        fields.push(self.register_request.into());
        fields.push(self.registration.into());
    }

    fn decode_fields(reader: &mut FieldReader) -> Result<Self, DecodeError> {
        Ok(Self {
            register_request: reader.required("register request")?,
            registration: reader.required("registration")?,
        })
    }
}

/// An UNREGISTER message for removing a registration.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct UnregisterMessage {
    pub request: Id,
    pub registered_registration: Id,
}

impl Layout for UnregisterMessage {
    const TAG: u64 = 66;
    const NAME: &'static str = "UNREGISTER";

    fn encode_fields(&self, fields: &mut List) {
        fields.push(self.request.into());
        fields.push(self.registered_registration.into());
    }

    fn decode_fields(reader: &mut FieldReader) -> Result<Self, DecodeError> {
        Ok(Self {
            request: reader.required("request")?,
            registered_registration: reader.required("registration")?,
        })
    }
}

/// An UNREGISTERED message for confirming the removal of a registration.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct UnregisteredMessage {
    pub unregister_request: Id,
}

impl Layout for UnregisteredMessage {
    const TAG: u64 = 67;
    const NAME: &'static str = "UNREGISTERED";

    fn encode_fields(&self, fields: &mut List) {
        fields.push(self.unregister_request.into());
    }

    fn decode_fields(reader: &mut FieldReader) -> Result<Self, DecodeError> {
        Ok(Self {
            unregister_request: reader.required("unregister request")?,
        })
    }
}

/// An INVOCATION message for a router to invoke a registered procedure on a callee.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct InvocationMessage {
    pub request: Id,
    pub registration: Id,
    pub details: Dictionary,
    pub arguments: List,
    pub arguments_keyword: Dictionary,
}

impl Layout for InvocationMessage {
    const TAG: u64 = 68;
    const NAME: &'static str = "INVOCATION";

    fn encode_fields(&self, fields: &mut List) {
        fields.push(self.request.into());
        fields.push(self.registration.into());
        fields.push(Value::Dictionary(self.details.clone()));
        encode_arguments(fields, &self.arguments, &self.arguments_keyword);
    }

    fn decode_fields(reader: &mut FieldReader) -> Result<Self, DecodeError> {
        Ok(Self {
            request: reader.required("request")?,
            registration: reader.required("registration")?,
            details: reader.required("details")?,
            arguments: reader.optional("arguments")?,
            arguments_keyword: reader.optional("keyword arguments")?,
        })
    }
}

/// A YIELD message for a callee to return the result of an invocation.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct YieldMessage {
    pub invocation_request: Id,
    pub options: Dictionary,
    pub arguments: List,
    pub arguments_keyword: Dictionary,
}

impl Layout for YieldMessage {
    const TAG: u64 = 70;
    const NAME: &'static str = "YIELD";

    fn encode_fields(&self, fields: &mut List) {
        fields.push(self.invocation_request.into());
        fields.push(Value::Dictionary(self.options.clone()));
        encode_arguments(fields, &self.arguments, &self.arguments_keyword);
    }

    fn decode_fields(reader: &mut FieldReader) -> Result<Self, DecodeError> {
        Ok(Self {
            invocation_request: reader.required("invocation request")?,
            options: reader.required("options")?,
            arguments: reader.optional("arguments")?,
            arguments_keyword: reader.optional("keyword arguments")?,
        })
    }
}

macro_rules! messages {
    ($($variant:ident($message:ident),)*) => {
        /// A WAMP message.
        #[derive(Debug, Clone, PartialEq)]
        pub enum Message {
            $($variant($message),)*
        }

        impl Message {
            /// The integer code of the message, which is always its first encoded element.
            pub fn tag(&self) -> Integer {
                match self {
                    $(Self::$variant(_) => <$message as Layout>::TAG,)*
                }
            }

            /// The name of the message, for logging.
            pub fn message_name(&self) -> &'static str {
                match self {
                    $(Self::$variant(_) => <$message as Layout>::NAME,)*
                }
            }

            /// Encodes the message into its positional representation, starting with its code.
            pub fn encode(&self) -> List {
                let mut fields = List::default();
                match self {
                    $(Self::$variant(message) => {
                        fields.push(Value::Integer(<$message as Layout>::TAG));
                        message.encode_fields(&mut fields);
                    })*
                }
                fields
            }

            /// Decodes the message fields that follow the given code.
            pub fn decode_fields(code: Integer, fields: List) -> Result<Self, DecodeError> {
                match code {
                    $(<$message as Layout>::TAG => {
                        let mut reader = FieldReader::new(<$message as Layout>::NAME, fields);
                        let message = <$message as Layout>::decode_fields(&mut reader)?;
                        reader.finish()?;
                        Ok(Self::$variant(message))
                    })*
                    _ => Err(DecodeError::UnknownCode(code)),
                }
            }
        }

        $(
            impl From<$message> for Message {
                fn from(value: $message) -> Self {
                    Self::$variant(value)
                }
            }
        )*
    };
}

messages! {
    Hello(HelloMessage),
    Welcome(WelcomeMessage),
    Abort(AbortMessage),
    Challenge(ChallengeMessage),
    Authenticate(AuthenticateMessage),
    Goodbye(GoodbyeMessage),
    Error(ErrorMessage),
    Publish(PublishMessage),
    Published(PublishedMessage),
    Subscribe(SubscribeMessage),
    Subscribed(SubscribedMessage),
    Unsubscribe(UnsubscribeMessage),
    Unsubscribed(UnsubscribedMessage),
    Event(EventMessage),
    Call(CallMessage),
    Result(ResultMessage),
    Register(RegisterMessage),
    Registered(RegisteredMessage),
    Unregister(UnregisterMessage),
    Unregistered(UnregisteredMessage),
    Invocation(InvocationMessage),
    Yield(YieldMessage),
}

impl Message {
    /// Decodes a message from its positional representation, starting with its code.
    pub fn decode(mut fields: List) -> Result<Self, DecodeError> {
        if fields.is_empty() {
            return Err(DecodeError::Empty);
        }
        let code = fields.remove(0).integer().ok_or(DecodeError::InvalidCode)?;
        Self::decode_fields(code, fields)
    }

    /// The request ID embedded in the message, if any.
    pub fn request_id(&self) -> Option<Id> {
        match self {
            Self::Error(message) => Some(message.request),
            Self::Publish(message) => Some(message.request),
            Self::Published(message) => Some(message.publish_request),
            Self::Subscribe(message) => Some(message.request),
            Self::Subscribed(message) => Some(message.subscribe_request),
            Self::Unsubscribe(message) => Some(message.request),
            Self::Unsubscribed(message) => Some(message.unsubscribe_request),
            Self::Call(message) => Some(message.request),
            Self::Result(message) => Some(message.call_request),
            Self::Register(message) => Some(message.request),
            Self::Registered(message) => Some(message.register_request),
            Self::Unregister(message) => Some(message.request),
            Self::Unregistered(message) => Some(message.unregister_request),
            Self::Invocation(message) => Some(message.request),
            Self::Yield(message) => Some(message.invocation_request),
            _ => None,
        }
    }
}

impl Serialize for Message {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.encode().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Message {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let fields = List::deserialize(deserializer)?;
        Message::decode(fields).map_err(serde::de::Error::custom)
    }
}

/// The kind of request that an ERROR message refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Publish,
    Subscribe,
    Unsubscribe,
    Call,
    Register,
    Unregister,
    Invocation,
}

impl RequestKind {
    /// The code of the request message.
    pub fn tag(&self) -> Integer {
        match self {
            Self::Publish => PublishMessage::TAG,
            Self::Subscribe => SubscribeMessage::TAG,
            Self::Unsubscribe => UnsubscribeMessage::TAG,
            Self::Call => CallMessage::TAG,
            Self::Register => RegisterMessage::TAG,
            Self::Unregister => UnregisterMessage::TAG,
            Self::Invocation => InvocationMessage::TAG,
        }
    }

    /// The name of the request message.
    pub fn message_name(&self) -> &'static str {
        match self {
            Self::Publish => PublishMessage::NAME,
            Self::Subscribe => SubscribeMessage::NAME,
            Self::Unsubscribe => UnsubscribeMessage::NAME,
            Self::Call => CallMessage::NAME,
            Self::Register => RegisterMessage::NAME,
            Self::Unregister => UnregisterMessage::NAME,
            Self::Invocation => InvocationMessage::NAME,
        }
    }
}

impl TryFrom<Integer> for RequestKind {
    type Error = Integer;

    fn try_from(value: Integer) -> Result<Self, Self::Error> {
        match value {
            PublishMessage::TAG => Ok(Self::Publish),
            SubscribeMessage::TAG => Ok(Self::Subscribe),
            UnsubscribeMessage::TAG => Ok(Self::Unsubscribe),
            CallMessage::TAG => Ok(Self::Call),
            RegisterMessage::TAG => Ok(Self::Register),
            UnregisterMessage::TAG => Ok(Self::Unregister),
            InvocationMessage::TAG => Ok(Self::Invocation),
            _ => Err(value),
        }
    }
}
