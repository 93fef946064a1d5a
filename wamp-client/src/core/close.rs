use crate::core::uri::Uri;

/// The reason for closing a WAMP session.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub enum CloseReason {
    #[default]
    Normal,
    SystemShutdown,
    CloseRealm,
    Killed,
    TimedOut,
    GoodbyeAndOut,
    /// Any other reason, as given by a router or a caller.
    Custom(Uri),
}

impl CloseReason {
    /// URI for the close reason.
    pub fn uri(&self) -> Uri {
        let component = match self {
            Self::Normal => "normal",
            Self::SystemShutdown => "system_shutdown",
            Self::CloseRealm => "close_realm",
            Self::Killed => "killed",
            Self::TimedOut => "timed_out",
            Self::GoodbyeAndOut => "goodbye_and_out",
            Self::Custom(uri) => return uri.clone(),
        };
        Uri::from_known(format!("wamp.close.{component}"))
    }
}
