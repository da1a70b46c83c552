use thiserror::Error;

use crate::FlowFileId;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("I/O error while {operation} flow file content: {source}")]
    Io {
        operation: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("stream callback failed: {0}")]
    CallbackFailed(#[source] std::io::Error),

    #[error("flow file {id} is not known to this session")]
    UnknownFlowFile { id: FlowFileId },
}

impl SessionError {
    #[must_use]
    pub fn io(operation: &'static str, source: std::io::Error) -> Self {
        Self::Io { operation, source }
    }

    /// Returns the I/O error a stream callback handed back to the session, if any.
    #[must_use]
    pub fn callback_source(&self) -> Option<&std::io::Error> {
        match self {
            Self::CallbackFailed(source) => Some(source),
            _ => None,
        }
    }
}
