use anyhow::Result;

use crate::core::types::Dictionary;

/// A hook for answering authentication challenges from the router.
///
/// Called outside of any peer lock, so implementations may block briefly or call back into the
/// peer. Returning an error declines the challenge, which aborts the session.
pub trait ChallengeHandler: Send + Sync {
    /// Produces the signature for the challenge.
    fn handle_challenge(&self, auth_method: &str, extra: &Dictionary) -> Result<String>;
}

impl<F> ChallengeHandler for F
where
    F: Fn(&str, &Dictionary) -> Result<String> + Send + Sync,
{
    fn handle_challenge(&self, auth_method: &str, extra: &Dictionary) -> Result<String> {
        self(auth_method, extra)
    }
}
