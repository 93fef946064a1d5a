use crate::core::{
    error::{
        AuthDeclined,
        DecodeError,
        ProtocolAnomaly,
    },
    id::Id,
    types::Dictionary,
};

/// Receives session-wide notifications from a [`Peer`][`crate::peer::Peer`].
///
/// Every method has an empty default, so observers only implement what they need. Observers are
/// never called while the peer is locked.
pub trait PeerObserver: Send + Sync {
    /// The router welcomed the peer into the realm.
    fn session_established(&self, session_id: Id, details: &Dictionary) {
        let _ = (session_id, details);
    }

    /// The session ended, for any reason. Called once per session.
    fn session_ended(&self, reason: &str) {
        let _ = reason;
    }

    /// An authentication challenge could not be answered.
    fn authentication_declined(&self, declined: &AuthDeclined) {
        let _ = declined;
    }

    /// A well-formed message did not match the state of the session.
    fn protocol_anomaly(&self, anomaly: &ProtocolAnomaly) {
        let _ = anomaly;
    }

    /// An inbound payload could not be decoded.
    fn decode_failed(&self, error: &DecodeError) {
        let _ = error;
    }

    /// The transport reported a change in network viability.
    fn viability_changed(&self, viable: bool) {
        let _ = viable;
    }

    /// The transport suggested reconnecting.
    fn reconnect_suggested(&self, better_route: bool) {
        let _ = better_route;
    }
}
