use crate::core::{
    error::DecodeError,
    types::{
        Dictionary,
        List,
        Value,
        WampDeserialize,
    },
};

/// Positional layout of a single message kind.
pub(crate) trait Layout: Sized {
    /// Integer code identifying the message kind.
    const TAG: u64;

    /// Upper-case name of the message kind.
    const NAME: &'static str;

    /// Appends the message fields, without the code, in wire order.
    fn encode_fields(&self, fields: &mut List);

    /// Reads the message fields, without the code, in wire order.
    fn decode_fields(reader: &mut FieldReader) -> Result<Self, DecodeError>;
}

/// Appends optional trailing arguments.
///
/// Keyword arguments can only be located positionally if positional arguments are present, so an
/// empty list is written whenever keyword arguments exist.
pub(crate) fn encode_arguments(fields: &mut List, arguments: &List, arguments_keyword: &Dictionary) {
    if arguments.is_empty() && arguments_keyword.is_empty() {
        return;
    }
    fields.push(Value::List(arguments.clone()));
    if !arguments_keyword.is_empty() {
        fields.push(Value::Dictionary(arguments_keyword.clone()));
    }
}

/// Reads the fields of a message in order.
pub(crate) struct FieldReader {
    message: &'static str,
    fields: std::vec::IntoIter<Value>,
}

impl FieldReader {
    pub fn new(message: &'static str, fields: List) -> Self {
        Self {
            message,
            fields: fields.into_iter(),
        }
    }

    /// Reads a field that must be present.
    pub fn required<T>(&mut self, field: &'static str) -> Result<T, DecodeError>
    where
        T: WampDeserialize,
    {
        match self.fields.next() {
            Some(value) => self.convert(field, value),
            None => Err(DecodeError::MissingField {
                message: self.message,
                field,
            }),
        }
    }

    /// Reads a trailing field that may be omitted.
    pub fn optional<T>(&mut self, field: &'static str) -> Result<T, DecodeError>
    where
        T: WampDeserialize + Default,
    {
        match self.fields.next() {
            Some(value) => self.convert(field, value),
            None => Ok(T::default()),
        }
    }

    /// Completes reading, failing if any elements were left over.
    pub fn finish(self) -> Result<(), DecodeError> {
        match self.fields.len() {
            0 => Ok(()),
            count => Err(DecodeError::TrailingElements {
                message: self.message,
                count,
            }),
        }
    }

    fn convert<T>(&self, field: &'static str, value: Value) -> Result<T, DecodeError>
    where
        T: WampDeserialize,
    {
        T::wamp_deserialize(value).map_err(|err| DecodeError::InvalidField {
            message: self.message,
            field,
            reason: err.to_string(),
        })
    }
}
