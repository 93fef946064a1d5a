use std::{
    fmt::Display,
    str::FromStr,
};

use anyhow::Error;

use crate::core::types::{
    Value,
    WampDeserialize,
    WampDeserializeError,
    WampSerialize,
    WampSerializeError,
};

/// Authentication methods a peer can advertise in HELLO.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthMethod {
    /// No authentication.
    Anonymous,
    /// A static ticket, sent in response to a challenge.
    Ticket,
    /// WAMP Challenge-Response Authentication.
    ///
    /// The shared secret is never transmitted. The peer signs the router's challenge with it.
    WampCra,
}

impl AuthMethod {
    /// The name of the method on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Anonymous => "anonymous",
            Self::Ticket => "ticket",
            Self::WampCra => "wampcra",
        }
    }
}

impl TryFrom<&str> for AuthMethod {
    type Error = Error;
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "anonymous" => Ok(Self::Anonymous),
            "ticket" => Ok(Self::Ticket),
            "wampcra" => Ok(Self::WampCra),
            _ => Err(Error::msg(format!("invalid auth method: {value}"))),
        }
    }
}

impl FromStr for AuthMethod {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s)
    }
}

impl Display for AuthMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl WampSerialize for AuthMethod {
    fn wamp_serialize(self) -> Result<Value, WampSerializeError> {
        Ok(Value::String(self.name().to_owned()))
    }
}

impl WampDeserialize for AuthMethod {
    fn wamp_deserialize(value: Value) -> Result<Self, WampDeserializeError> {
        value
            .string()
            .ok_or_else(|| WampDeserializeError::new("auth method must be a string"))?
            .try_into()
            .map_err(|err: Error| WampDeserializeError::new(err.to_string()))
    }
}
