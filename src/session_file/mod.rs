//! Script-facing view of one flow file inside a host session.
//!
//! Invariant: every mutation is forwarded to the session immediately and the
//! snapshot it returns replaces the one held here.

mod dispatch;
mod properties;
mod streams;

use flow_host::{FlowFile, ProcessSession};

use crate::charset::Charset;
use crate::config::{EnvConfig, ReservedWritePolicy};

pub use dispatch::{
    register_type_method, unregister_type_method, ArgKind, Method, MethodTable, ScriptArg,
    ScriptCallback, StreamArg,
};
pub use properties::{script_string, Property, ATTRIBUTES_PROPERTY, SIZE_PROPERTY};
pub use streams::{Rendered, Writable};

/// Non-owning handle pairing a flow file snapshot with the session that owns it.
///
/// The borrow of the session keeps the handle from outliving the session
/// invocation that produced it.
pub struct SessionFile<'s> {
    session: &'s dyn ProcessSession,
    flow_file: FlowFile,
    methods: MethodTable,
    default_charset: Charset,
    reserved_writes: ReservedWritePolicy,
}

impl<'s> SessionFile<'s> {
    /// Wraps `flow_file` with the type-default method table and default settings.
    pub fn new(session: &'s dyn ProcessSession, flow_file: FlowFile) -> Self {
        Self::with_config(session, flow_file, &EnvConfig::default())
    }

    pub fn with_config(
        session: &'s dyn ProcessSession,
        flow_file: FlowFile,
        config: &EnvConfig,
    ) -> Self {
        Self {
            session,
            flow_file,
            methods: MethodTable::type_default(),
            default_charset: config.default_charset,
            reserved_writes: config.reserved_writes,
        }
    }

    /// Current snapshot of the underlying flow record.
    #[must_use]
    pub fn flow_file(&self) -> &FlowFile {
        &self.flow_file
    }

    /// Releases the handle, returning the latest snapshot for routing by the host.
    #[must_use]
    pub fn into_flow_file(self) -> FlowFile {
        self.flow_file
    }

    #[must_use]
    pub fn default_charset(&self) -> Charset {
        self.default_charset
    }

    #[must_use]
    pub fn method_table(&self) -> &MethodTable {
        &self.methods
    }

    /// Per-instance table; extensions added here affect only this handle.
    pub fn method_table_mut(&mut self) -> &mut MethodTable {
        &mut self.methods
    }

    /// Replaces the method table wholesale; `None` restores the type default.
    pub fn set_method_table(&mut self, methods: Option<MethodTable>) {
        self.methods = methods.unwrap_or_else(MethodTable::type_default);
    }
}

impl std::fmt::Debug for SessionFile<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionFile")
            .field("flow_file", &self.flow_file)
            .field("methods", &self.methods)
            .field("default_charset", &self.default_charset)
            .field("reserved_writes", &self.reserved_writes)
            .finish_non_exhaustive()
    }
}
