use ahash::HashMap;

use crate::{
    core::{
        error::{
            ProtocolAnomaly,
            RequestError,
        },
        id::Id,
        uri::Uri,
    },
    message::message::RequestKind,
    peer::{
        handler::{
            EventHandler,
            ProcedureHandler,
            ResultHandler,
            RpcResult,
        },
        registry::{
            Registration,
            Subscription,
        },
    },
};

/// Context for a request that is waiting on the router.
pub(crate) enum PendingRequest {
    Publish {
        handler: ResultHandler<Id>,
    },
    Subscribe {
        topic: Uri,
        event_handler: EventHandler,
        handler: ResultHandler<Subscription>,
    },
    Unsubscribe {
        subscription: Id,
        handler: ResultHandler<()>,
    },
    Call {
        handler: ResultHandler<RpcResult>,
    },
    Register {
        procedure: Uri,
        procedure_handler: ProcedureHandler,
        handler: ResultHandler<Registration>,
    },
    Unregister {
        registration: Id,
        handler: ResultHandler<()>,
    },
}

#[cfg(test)]
impl std::fmt::Debug for PendingRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PendingRequest::{:?}", self.kind())
    }
}

impl PendingRequest {
    pub fn kind(&self) -> RequestKind {
        match self {
            Self::Publish { .. } => RequestKind::Publish,
            Self::Subscribe { .. } => RequestKind::Subscribe,
            Self::Unsubscribe { .. } => RequestKind::Unsubscribe,
            Self::Call { .. } => RequestKind::Call,
            Self::Register { .. } => RequestKind::Register,
            Self::Unregister { .. } => RequestKind::Unregister,
        }
    }

    /// The subscription or registration that the request removes.
    fn target(&self) -> Option<Id> {
        match self {
            Self::Unsubscribe { subscription, .. } => Some(*subscription),
            Self::Unregister { registration, .. } => Some(*registration),
            _ => None,
        }
    }

    /// Consumes the request, producing a call to its completion handler with the given error.
    pub fn fail(self, error: RequestError) -> Box<dyn FnOnce() + Send> {
        match self {
            Self::Publish { handler } => Box::new(move || handler(Err(error))),
            Self::Subscribe { handler, .. } => Box::new(move || handler(Err(error))),
            Self::Unsubscribe { handler, .. } => Box::new(move || handler(Err(error))),
            Self::Call { handler } => Box::new(move || handler(Err(error))),
            Self::Register { handler, .. } => Box::new(move || handler(Err(error))),
            Self::Unregister { handler, .. } => Box::new(move || handler(Err(error))),
        }
    }
}

/// The table of requests waiting on the router, keyed by request ID.
///
/// Each request leaves the table exactly once: on its matching response, on its matching error, or
/// when the session terminates.
#[derive(Default)]
pub(crate) struct PendingRequests {
    requests: HashMap<Id, PendingRequest>,
}

impl PendingRequests {
    pub fn contains(&self, id: Id) -> bool {
        self.requests.contains_key(&id)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// Whether a request of the given kind is already removing the given subscription or
    /// registration.
    pub fn cancels(&self, kind: RequestKind, target: Id) -> bool {
        self.requests
            .values()
            .any(|request| request.kind() == kind && request.target() == Some(target))
    }

    pub fn insert(&mut self, id: Id, request: PendingRequest) {
        self.requests.insert(id, request);
    }

    pub fn remove(&mut self, id: Id) -> Option<PendingRequest> {
        self.requests.remove(&id)
    }

    /// Removes the request with the given ID, if `extract` accepts it.
    ///
    /// A request that `extract` hands back is of another kind, and stays pending.
    pub fn take<T, F>(&mut self, id: Id, message: &'static str, extract: F) -> Result<T, ProtocolAnomaly>
    where
        F: FnOnce(PendingRequest) -> Result<T, PendingRequest>,
    {
        let request = self
            .requests
            .remove(&id)
            .ok_or(ProtocolAnomaly::UnknownRequest {
                message,
                request: id,
            })?;
        extract(request).map_err(|request| {
            let pending = request.kind().message_name();
            self.requests.insert(id, request);
            ProtocolAnomaly::RequestKindMismatch {
                message,
                request: id,
                pending,
            }
        })
    }

    /// Removes the request with the given ID, if it is of the given kind.
    pub fn take_kind(
        &mut self,
        id: Id,
        kind: RequestKind,
        message: &'static str,
    ) -> Result<PendingRequest, ProtocolAnomaly> {
        self.take(id, message, |request| {
            if request.kind() == kind {
                Ok(request)
            } else {
                Err(request)
            }
        })
    }

    /// Removes every request, in the order they were issued.
    pub fn drain(&mut self) -> Vec<PendingRequest> {
        let mut requests = self.requests.drain().collect::<Vec<_>>();
        requests.sort_by_key(|(id, _)| *id);
        requests.into_iter().map(|(_, request)| request).collect()
    }
}
