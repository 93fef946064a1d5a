pub mod common;
pub(crate) mod layout;
pub mod message;
