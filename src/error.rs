use flow_host::SessionError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("unsupported character encoding '{label}'")]
    InvalidEncoding { label: String },

    #[error("I/O error while {operation}: {source}")]
    Io {
        operation: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("no such method: {name}({signature})")]
    NoSuchMethod { name: String, signature: String },

    #[error("attribute '{key}' is reserved and cannot be written")]
    ReservedAttribute { key: String },

    #[error("invalid argument for {method}: {message}")]
    InvalidArgument {
        method: &'static str,
        message: String,
    },
}

impl ScriptError {
    #[must_use]
    pub fn io(operation: &'static str, source: std::io::Error) -> Self {
        Self::Io { operation, source }
    }

    #[must_use]
    pub fn invalid_encoding(label: impl Into<String>) -> Self {
        Self::InvalidEncoding {
            label: label.into(),
        }
    }

    #[must_use]
    pub fn no_such_method(name: impl Into<String>, signature: impl Into<String>) -> Self {
        Self::NoSuchMethod {
            name: name.into(),
            signature: signature.into(),
        }
    }

    #[must_use]
    pub fn invalid_argument(method: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            method,
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for ScriptError {
    fn from(source: std::io::Error) -> Self {
        Self::io("running stream callback", source)
    }
}
