mod builder;
mod dispatcher;
mod handler;
mod observer;
mod peer;
mod pending;
mod registry;
mod session;
mod state;
mod web_socket_peer;

pub use builder::PeerBuilder;
pub use handler::{
    Event,
    EventHandler,
    Invocation,
    ProcedureHandler,
    PublishedEvent,
    ResultHandler,
    RpcCall,
    RpcResult,
    RpcYield,
};
pub use observer::PeerObserver;
pub use peer::{
    Peer,
    PeerConfig,
};
pub use registry::{
    Registration,
    Subscription,
};
pub use session::SessionState;
pub use web_socket_peer::new_web_socket_peer;
