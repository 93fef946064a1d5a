use thiserror::Error;

use crate::core::{
    id::Id,
    types::{
        Dictionary,
        Integer,
        List,
        Value,
    },
    uri::Uri,
};

/// An inbound payload that could not be turned into a message.
///
/// Decode errors are local to the payload: the payload is dropped and the session carries on.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("failed to deserialize payload: {0}")]
    Payload(String),
    #[error("message is empty")]
    Empty,
    #[error("message code must be an integer")]
    InvalidCode,
    #[error("unknown message code {0}")]
    UnknownCode(Integer),
    #[error("{message} message is missing {field}")]
    MissingField {
        message: &'static str,
        field: &'static str,
    },
    #[error("{message} message has invalid {field}: {reason}")]
    InvalidField {
        message: &'static str,
        field: &'static str,
        reason: String,
    },
    #[error("{message} message has {count} unexpected trailing element(s)")]
    TrailingElements { message: &'static str, count: usize },
}

/// An inbound message that is well-formed but does not fit the current state of the session.
///
/// Anomalies are reported and never terminate the session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolAnomaly {
    /// A response or error referenced a request that is not pending.
    #[error("received {message} for request {request}, which is not pending")]
    UnknownRequest { message: &'static str, request: Id },
    /// A response or error referenced a pending request of a different kind.
    #[error("received {message} for request {request}, which is a pending {pending} request")]
    RequestKindMismatch {
        message: &'static str,
        request: Id,
        pending: &'static str,
    },
    /// An ERROR message referenced a request kind that cannot fail.
    #[error("received ERROR for unsupported request type {0}")]
    UnknownRequestKind(Integer),
    /// An EVENT referenced a subscription that does not exist.
    #[error("received EVENT for unknown subscription {0}")]
    UnknownSubscription(Id),
    /// An INVOCATION referenced a registration that does not exist.
    #[error("received INVOCATION for unknown registration {0}")]
    UnknownRegistration(Id),
    /// A message arrived that the session cannot accept in its current state.
    #[error("received {message} message while {state}")]
    UnexpectedMessage {
        message: &'static str,
        state: &'static str,
    },
}

/// The challenge handler was missing or refused to answer an authentication challenge.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("authentication with method {method} was declined: {reason}")]
pub struct AuthDeclined {
    pub method: String,
    pub reason: String,
}

/// The session ended while a request was outstanding or a handle was still active.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("session terminated: {reason}")]
pub struct SessionTerminated {
    pub reason: String,
}

/// Standard error URIs that peers must be able to parse easily.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InteractionError {
    #[error("protocol violation")]
    ProtocolViolation,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("no such procedure")]
    NoSuchProcedure,
    #[error("no such registration")]
    NoSuchRegistration,
    #[error("no such subscription")]
    NoSuchSubscription,
    #[error("not authorized")]
    NotAuthorized,
    #[error("canceled")]
    Canceled,
}

impl InteractionError {
    /// The trailing URI component for the error.
    pub fn uri_component(&self) -> &str {
        match self {
            Self::ProtocolViolation => "protocol_violation",
            Self::InvalidArgument => "invalid_argument",
            Self::NoSuchProcedure => "no_such_procedure",
            Self::NoSuchRegistration => "no_such_registration",
            Self::NoSuchSubscription => "no_such_subscription",
            Self::NotAuthorized => "not_authorized",
            Self::Canceled => "canceled",
        }
    }

    /// The full error URI.
    pub fn uri(&self) -> Uri {
        Uri::from_known(format!("wamp.error.{}", self.uri_component()))
    }
}

/// An application-level error carried by an ERROR message.
///
/// Received from the router in response to a request, or returned by a procedure handler to be sent
/// back to the router.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{error}")]
pub struct RouterError {
    pub error: Uri,
    pub details: Dictionary,
    pub arguments: List,
    pub arguments_keyword: Dictionary,
}

impl RouterError {
    /// Creates a new error with no details or arguments.
    pub fn new(error: Uri) -> Self {
        Self {
            error,
            details: Dictionary::default(),
            arguments: List::default(),
            arguments_keyword: Dictionary::default(),
        }
    }

    /// Attaches a human-readable message to the error details.
    pub fn with_message<S>(mut self, message: S) -> Self
    where
        S: Into<String>,
    {
        self.details
            .insert("message".to_owned(), Value::String(message.into()));
        self
    }

    /// Attaches positional arguments to the error.
    pub fn with_arguments(mut self, arguments: List) -> Self {
        self.arguments = arguments;
        self
    }

    /// Attaches keyword arguments to the error.
    pub fn with_arguments_keyword(mut self, arguments_keyword: Dictionary) -> Self {
        self.arguments_keyword = arguments_keyword;
        self
    }

    /// The human-readable message in the error details, if any.
    pub fn message(&self) -> Option<&str> {
        self.details.get("message").and_then(Value::string)
    }
}

impl From<InteractionError> for RouterError {
    fn from(value: InteractionError) -> Self {
        Self::new(value.uri())
    }
}

/// Error for a peer not being connected for some operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("peer is not connected")]
pub struct PeerNotConnectedError;

/// The failure delivered to a request's completion handler.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RequestError {
    /// The router rejected the request.
    #[error("router error: {0}")]
    Router(RouterError),
    /// The session ended before the router answered.
    #[error(transparent)]
    SessionTerminated(SessionTerminated),
    /// No session was established when the request was made.
    #[error(transparent)]
    NotConnected(PeerNotConnectedError),
    /// The subscription or registration was already inactive.
    #[error("{0} is already inactive")]
    Inactive(&'static str),
    /// The subscription or registration is already being canceled.
    #[error("{0} is already being canceled")]
    Canceling(&'static str),
    /// The request could not be handed to the transport.
    #[error("failed to send request: {0}")]
    Transport(String),
}

impl RequestError {
    /// The router's error, if the router rejected the request.
    pub fn router_error(&self) -> Option<&RouterError> {
        match self {
            Self::Router(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RouterError> for RequestError {
    fn from(value: RouterError) -> Self {
        Self::Router(value)
    }
}

impl From<SessionTerminated> for RequestError {
    fn from(value: SessionTerminated) -> Self {
        Self::SessionTerminated(value)
    }
}

impl From<PeerNotConnectedError> for RequestError {
    fn from(value: PeerNotConnectedError) -> Self {
        Self::NotConnected(value)
    }
}
