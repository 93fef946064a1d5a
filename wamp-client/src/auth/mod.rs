pub mod auth_method;
pub mod challenge;
pub mod config;
pub mod cra;

pub use auth_method::AuthMethod;
pub use challenge::ChallengeHandler;
pub use config::AuthConfig;
pub use cra::CraChallengeHandler;
