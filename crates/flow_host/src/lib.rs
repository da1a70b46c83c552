//! Minimal host contract for one transactional flow session.
//!
//! This crate defines only the record snapshot and the session primitives a
//! scripting adapter builds on. It excludes queueing, relationship routing,
//! commit/rollback policy and content repository details.

mod error;

use std::collections::BTreeMap;
use std::io::{Read, Write};

pub use error::SessionError;

/// Identifier for one flow record inside a session.
pub type FlowFileId = u64;

/// Attribute mapping carried by a flow record.
pub type Attributes = BTreeMap<String, String>;

/// Callback receiving the readable content of a flow record.
pub type InputCallback<'a> = dyn FnMut(&mut dyn Read) -> std::io::Result<()> + 'a;

/// Callback receiving a writable stream for new or appended content.
pub type OutputCallback<'a> = dyn FnMut(&mut dyn Write) -> std::io::Result<()> + 'a;

/// Callback receiving the current content and a stream for its replacement.
pub type TransformCallback<'a> =
    dyn FnMut(&mut dyn Read, &mut dyn Write) -> std::io::Result<()> + 'a;

/// Immutable snapshot of a flow record.
///
/// Sessions hand out a fresh snapshot from every mutating primitive; holders
/// replace their copy with the returned one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowFile {
    id: FlowFileId,
    size: u64,
    attributes: Attributes,
}

impl FlowFile {
    /// Creates a snapshot with the given content size and attributes.
    #[must_use]
    pub fn new(id: FlowFileId, size: u64, attributes: Attributes) -> Self {
        Self {
            id,
            size,
            attributes,
        }
    }

    #[must_use]
    pub fn id(&self) -> FlowFileId {
        self.id
    }

    /// Content length in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }
}

/// Session interface owning the lifecycle of flow records.
///
/// Each stream primitive invokes its callback at most once, synchronously,
/// and closes the streams it supplied after the callback returns. A callback
/// error is reported as [`SessionError::CallbackFailed`] and leaves the
/// content untouched.
pub trait ProcessSession {
    /// Streams the content of `flow_file` into `callback`.
    fn read(&self, flow_file: &FlowFile, callback: &mut InputCallback<'_>)
        -> Result<(), SessionError>;

    /// Replaces the content of `flow_file` with whatever `callback` writes.
    fn write(
        &self,
        flow_file: &FlowFile,
        callback: &mut OutputCallback<'_>,
    ) -> Result<FlowFile, SessionError>;

    /// Replaces the content of `flow_file`, exposing the old content for reading.
    fn write_transform(
        &self,
        flow_file: &FlowFile,
        callback: &mut TransformCallback<'_>,
    ) -> Result<FlowFile, SessionError>;

    /// Appends whatever `callback` writes past the existing content.
    fn append(
        &self,
        flow_file: &FlowFile,
        callback: &mut OutputCallback<'_>,
    ) -> Result<FlowFile, SessionError>;

    fn put_attribute(
        &self,
        flow_file: &FlowFile,
        key: &str,
        value: &str,
    ) -> Result<FlowFile, SessionError>;

    fn remove_attribute(&self, flow_file: &FlowFile, key: &str)
        -> Result<FlowFile, SessionError>;
}
