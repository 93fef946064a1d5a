use std::sync::{
    Arc,
    Weak,
    atomic::{
        AtomicBool,
        Ordering,
    },
};

use ahash::HashMap;

use crate::{
    core::{
        error::RequestError,
        id::Id,
        uri::Uri,
    },
    peer::{
        handler::{
            EventHandler,
            ProcedureHandler,
        },
        peer::PeerShared,
    },
};

/// An entry in a [`Registry`], which can be shared with a user-facing handle through its active
/// flag.
pub(crate) trait RegistryEntry {
    fn active(&self) -> &Arc<AtomicBool>;

    fn deactivate(&self) {
        self.active().store(false, Ordering::Release);
    }
}

/// A live subscription, as tracked by the peer.
pub(crate) struct SubscriptionEntry {
    pub topic: Uri,
    pub handler: EventHandler,
    pub active: Arc<AtomicBool>,
}

impl RegistryEntry for SubscriptionEntry {
    fn active(&self) -> &Arc<AtomicBool> {
        &self.active
    }
}

/// A live registration, as tracked by the peer.
pub(crate) struct RegistrationEntry {
    pub procedure: Uri,
    pub handler: ProcedureHandler,
    pub active: Arc<AtomicBool>,
}

impl RegistryEntry for RegistrationEntry {
    fn active(&self) -> &Arc<AtomicBool> {
        &self.active
    }
}

/// Entries keyed by their router-assigned ID.
///
/// Every entry that leaves the registry is deactivated, so handles observe removal without holding
/// the registry.
pub(crate) struct Registry<E> {
    entries: HashMap<Id, E>,
}

impl<E> Default for Registry<E> {
    fn default() -> Self {
        Self {
            entries: HashMap::default(),
        }
    }
}

impl<E> Registry<E>
where
    E: RegistryEntry,
{
    /// Inserts an entry, returning the entry it replaced.
    pub fn insert(&mut self, id: Id, entry: E) -> Option<E> {
        let replaced = self.entries.insert(id, entry);
        if let Some(replaced) = &replaced {
            replaced.deactivate();
        }
        replaced
    }

    pub fn get(&self, id: Id) -> Option<&E> {
        self.entries.get(&id)
    }

    pub fn contains(&self, id: Id) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn remove(&mut self, id: Id) -> Option<E> {
        let entry = self.entries.remove(&id);
        if let Some(entry) = &entry {
            entry.deactivate();
        }
        entry
    }

    pub fn clear(&mut self) {
        for (_, entry) in self.entries.drain() {
            entry.deactivate();
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// A subscription to a topic.
///
/// The subscription is active until it is canceled or the session ends.
#[derive(Debug, Clone)]
pub struct Subscription {
    id: Id,
    topic: Uri,
    active: Arc<AtomicBool>,
    peer: Weak<PeerShared>,
}

impl Subscription {
    pub(crate) fn new(id: Id, topic: Uri, active: Arc<AtomicBool>, peer: Weak<PeerShared>) -> Self {
        Self {
            id,
            topic,
            active,
            peer,
        }
    }

    /// The subscription ID, as assigned by the router.
    pub fn id(&self) -> Id {
        self.id
    }

    /// The subscribed topic.
    pub fn topic(&self) -> &Uri {
        &self.topic
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Unsubscribes from the topic.
    ///
    /// An inactive subscription fails immediately, without contacting the router.
    pub fn cancel<H>(&self, handler: H) -> Option<Id>
    where
        H: FnOnce(Result<(), RequestError>) + Send + 'static,
    {
        match self.peer.upgrade() {
            Some(peer) if self.is_active() => peer.unsubscribe(self.id, Box::new(handler)),
            _ => {
                handler(Err(RequestError::Inactive("subscription")));
                None
            }
        }
    }
}

/// A registration of a procedure.
///
/// The registration is active until it is canceled or the session ends.
#[derive(Debug, Clone)]
pub struct Registration {
    id: Id,
    procedure: Uri,
    active: Arc<AtomicBool>,
    peer: Weak<PeerShared>,
}

impl Registration {
    pub(crate) fn new(
        id: Id,
        procedure: Uri,
        active: Arc<AtomicBool>,
        peer: Weak<PeerShared>,
    ) -> Self {
        Self {
            id,
            procedure,
            active,
            peer,
        }
    }

    /// The registration ID, as assigned by the router.
    pub fn id(&self) -> Id {
        self.id
    }

    /// The registered procedure.
    pub fn procedure(&self) -> &Uri {
        &self.procedure
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Unregisters the procedure.
    ///
    /// An inactive registration fails immediately, without contacting the router.
    pub fn cancel<H>(&self, handler: H) -> Option<Id>
    where
        H: FnOnce(Result<(), RequestError>) + Send + 'static,
    {
        match self.peer.upgrade() {
            Some(peer) if self.is_active() => peer.unregister(self.id, Box::new(handler)),
            _ => {
                handler(Err(RequestError::Inactive("registration")));
                None
            }
        }
    }
}
