use std::sync::Arc;

use crate::core::{
    error::{
        RequestError,
        RouterError,
    },
    id::Id,
    types::{
        Dictionary,
        List,
    },
};

/// A procedure call.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RpcCall {
    /// CALL options, such as `disclose_me` or `timeout`.
    pub options: Dictionary,
    pub arguments: List,
    pub arguments_keyword: Dictionary,
}

/// A result of a procedure call.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RpcResult {
    pub details: Dictionary,
    pub arguments: List,
    pub arguments_keyword: Dictionary,
}

/// A result produced by a procedure handler, sent back to the router as YIELD.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RpcYield {
    pub options: Dictionary,
    pub arguments: List,
    pub arguments_keyword: Dictionary,
}

/// An event to publish to a topic.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PublishedEvent {
    /// PUBLISH options, such as `exclude_me` or `eligible`.
    ///
    /// `acknowledge` is controlled by the publish method used.
    pub options: Dictionary,
    pub arguments: List,
    pub arguments_keyword: Dictionary,
}

/// An event received for a subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub subscription: Id,
    pub publication: Id,
    pub details: Dictionary,
    pub arguments: List,
    pub arguments_keyword: Dictionary,
}

/// An invocation of a registered procedure.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub request: Id,
    pub registration: Id,
    pub details: Dictionary,
    pub arguments: List,
    pub arguments_keyword: Dictionary,
}

/// Completion handler for a single request.
///
/// Called exactly once, with the router's response or the reason no response will arrive.
pub type ResultHandler<T> = Box<dyn FnOnce(Result<T, RequestError>) + Send>;

/// Handler for events delivered to a subscription.
pub type EventHandler = Arc<dyn Fn(Event) + Send + Sync>;

/// Handler for invocations of a registered procedure.
///
/// An error is sent back to the router as ERROR instead of YIELD.
pub type ProcedureHandler = Arc<dyn Fn(Invocation) -> Result<RpcYield, RouterError> + Send + Sync>;
