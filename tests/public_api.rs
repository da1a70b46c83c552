#![allow(unused_imports)]

use flowfile_script::{
    register_type_method, script_string, unregister_type_method, ArgKind, Attributes, Charset,
    EnvConfig, FlowFile, FlowFileId, Method, MethodTable, ProcessSession, Property, Rendered,
    ReservedWritePolicy, ScriptArg, ScriptCallback, ScriptError, ScriptValue, SessionError,
    SessionFile, StreamArg, TextReader, TextWriter, Writable, ATTRIBUTES_PROPERTY, SIZE_PROPERTY,
};

#[test]
fn public_api_exports_compile() {}
