//! Scripting adapter for host-managed flow files.
//!
//! Invariant: every stream wrapper handed to a script callback is flushed and
//! closed before the adapter call returns, on success and failure alike.
//!
//! # Public API Overview
//! - Wrap a host [`FlowFile`] and its [`ProcessSession`] in a [`SessionFile`].
//! - Read and tag attributes through the property bridge (`get_property`,
//!   `set_property`), where `size` and `attributes` are reserved read names.
//! - Stream content with the named operations (`write_stream`,
//!   `write_transform`, `write_text`, `append_with`, `read_with`, ...).
//! - Dispatch by name from a scripting layer via [`SessionFile::invoke_method`]
//!   and extend handles with a [`MethodTable`].

pub mod charset;
pub mod config;
pub mod error;
pub mod logging;
pub mod session_file;

/// Host contract types.
pub use flow_host::{Attributes, FlowFile, FlowFileId, ProcessSession, SessionError};

/// Character encodings and scoped text wrappers.
pub use crate::charset::{Charset, TextReader, TextWriter};
/// Environment configuration.
pub use crate::config::{EnvConfig, ReservedWritePolicy};
pub use crate::error::ScriptError;
/// Session file handle and its scripting surface.
pub use crate::session_file::{
    register_type_method, script_string, unregister_type_method, ArgKind, Method, MethodTable,
    Property, Rendered, ScriptArg, ScriptCallback, SessionFile, StreamArg, Writable,
    ATTRIBUTES_PROPERTY, SIZE_PROPERTY,
};

/// Dynamic value crossing the scripting boundary.
pub type ScriptValue = serde_json::Value;
