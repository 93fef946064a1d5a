use crate::{
    auth::auth_method::AuthMethod,
    core::types::{
        Dictionary,
        List,
        Value,
    },
    message::message::HelloMessage,
};

/// Authentication parameters sent when joining a realm.
#[derive(Debug, Default, Clone)]
pub struct AuthConfig {
    /// Methods the peer is willing to authenticate with, in order of preference.
    pub methods: Vec<AuthMethod>,
    /// The identity of the user performing authentication.
    pub id: Option<String>,
    /// The role requested by the user.
    pub role: Option<String>,
    /// Extra data for the router's authenticator.
    pub extra: Dictionary,
}

impl AuthConfig {
    /// Embeds the authentication information into a HELLO message.
    ///
    /// Fields that are absent or empty are left out of the message entirely.
    pub fn embed_into_hello_message(&self, message: &mut HelloMessage) {
        if !self.methods.is_empty() {
            let methods = self
                .methods
                .iter()
                .map(|method| Value::String(method.name().to_owned()))
                .collect::<List>();
            message
                .details
                .insert("authmethods".to_owned(), Value::List(methods));
        }
        if let Some(id) = &self.id {
            message
                .details
                .insert("authid".to_owned(), Value::String(id.clone()));
        }
        if let Some(role) = &self.role {
            message
                .details
                .insert("authrole".to_owned(), Value::String(role.clone()));
        }
        if !self.extra.is_empty() {
            message
                .details
                .insert("authextra".to_owned(), Value::Dictionary(self.extra.clone()));
        }
    }
}
