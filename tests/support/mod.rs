#![allow(dead_code)]

use flow_host_mock::MockSession;
use flowfile_script::{Attributes, Charset, FlowFile, ScriptError};

pub const CSV_DATA: &str = "gender,title,first,last\nfemale,miss,marlene,shaw\nmale,mr,todd,graham";

/// Error type a script might use on top of the adapter's own errors.
#[derive(Debug)]
pub enum TestError {
    Script(ScriptError),
    Boom(&'static str),
}

impl From<ScriptError> for TestError {
    fn from(error: ScriptError) -> Self {
        Self::Script(error)
    }
}

pub fn utf8() -> Charset {
    Charset::for_label("UTF-8").expect("UTF-8 is always available")
}

pub fn charset(label: &str) -> Charset {
    Charset::for_label(label).expect("charset label should resolve")
}

pub fn attributes(pairs: &[(&str, &str)]) -> Attributes {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

pub fn session_with(content: &str, pairs: &[(&str, &str)]) -> (MockSession, FlowFile) {
    let session = MockSession::new();
    let flow_file = session.create(content, attributes(pairs));
    (session, flow_file)
}
