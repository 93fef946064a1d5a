pub use wamp_client_values::{
    Dictionary,
    Integer,
    List,
    Value,
    WampDeserialize,
    WampDeserializeError,
    WampSerialize,
    WampSerializeError,
};
