use crate::{
    core::{
        close::CloseReason,
        error::RouterError,
        id::Id,
        types::Dictionary,
        uri::Uri,
    },
    message::message::{
        AbortMessage,
        ErrorMessage,
        GoodbyeMessage,
        Message,
        RequestKind,
    },
};

pub fn abort_with_close_reason(close_reason: CloseReason) -> Message {
    Message::Abort(AbortMessage {
        details: Dictionary::default(),
        reason: close_reason.uri(),
    })
}

pub fn goodbye_with_reason(reason: Uri) -> Message {
    Message::Goodbye(GoodbyeMessage {
        details: Dictionary::default(),
        reason,
    })
}

pub fn goodbye_with_close_reason(close_reason: CloseReason) -> Message {
    goodbye_with_reason(close_reason.uri())
}

/// Builds the ERROR reply for a failed invocation.
pub fn error_for_invocation(request: Id, error: RouterError) -> Message {
    Message::Error(ErrorMessage {
        request_type: RequestKind::Invocation.tag(),
        request,
        details: error.details,
        error: error.error,
        arguments: error.arguments,
        arguments_keyword: error.arguments_keyword,
    })
}

impl From<ErrorMessage> for RouterError {
    fn from(value: ErrorMessage) -> Self {
        Self {
            error: value.error,
            details: value.details,
            arguments: value.arguments,
            arguments_keyword: value.arguments_keyword,
        }
    }
}
