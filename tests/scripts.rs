//! End-to-end scenarios written the way a processing script uses a handle.

mod support;

use std::io::{BufRead, Read};

use flow_host_mock::MockSession;
use flowfile_script::{
    Property, ScriptCallback, ScriptError, SessionFile, StreamArg, TextReader, TextWriter,
};
use pretty_assertions::assert_eq;
use serde_json::json;

use support::{session_with, utf8, CSV_DATA};

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[test]
fn content_is_copied_into_an_attribute() {
    let (session, flow_file) = session_with("test content", &[]);
    let mut file = SessionFile::new(&session, flow_file);

    let mut content = String::new();
    let callback = ScriptCallback::new(1, |streams| {
        if let StreamArg::Input(input) = streams {
            input.read_to_string(&mut content)?;
        }
        Ok(())
    });
    file.invoke_method("read", vec![callback.into()])
        .expect("read");
    file.set_property("testAttr", &json!(content))
        .expect("tag");

    let released = file.into_flow_file();
    assert_eq!(released.attribute("testAttr"), Some("test content"));
    assert_eq!(session.content_string(&released).as_deref(), Some("test content"));
}

#[test]
fn csv_columns_are_selected_and_capitalized() {
    let (session, flow_file) = session_with(CSV_DATA, &[]);
    let mut file = SessionFile::new(&session, flow_file);
    let columns = ["first", "last"];

    file.write_transform(|input, out| {
        let mut writer = TextWriter::new(out, utf8());
        let mut lines = TextReader::new(input, utf8()).lines();
        let header = lines.next().transpose()?.unwrap_or_default();
        let indexes: Vec<usize> = columns
            .iter()
            .filter_map(|column| header.split(',').position(|name| name == *column))
            .collect();

        for line in lines {
            let line = line?;
            let fields: Vec<&str> = line.split(',').collect();
            let selected: Vec<String> = indexes
                .iter()
                .filter_map(|index| fields.get(*index))
                .map(|field| capitalize(field))
                .collect();
            writeln!(writer, "{}", selected.join(" "))?;
        }
        writer.close()?;
        Ok::<(), ScriptError>(())
    })
    .expect("transform");
    file.put_attribute("selected.columns", &columns.join(","))
        .expect("tag");

    let released = file.into_flow_file();
    assert_eq!(released.attribute("selected.columns"), Some("first,last"));
    assert_eq!(
        session.content_string(&released).as_deref(),
        Some("Marlene Shaw\nTodd Graham\n")
    );
}

#[test]
fn empty_flow_file_gets_a_name_and_content() {
    let session = MockSession::new();
    let mut file = SessionFile::new(&session, session.create_empty());

    file.set_property("filename", &json!("test.txt"))
        .expect("name");
    file.invoke_method("write", vec!["UTF-8".into(), "Test".into()])
        .expect("write");

    assert_eq!(file.get_property("size"), Property::Size(4));
    let released = file.into_flow_file();
    assert_eq!(released.attribute("filename"), Some("test.txt"));
    assert_eq!(session.content_string(&released).as_deref(), Some("Test"));
}

#[test]
fn dynamic_property_access_reads_like_script_fields() {
    let (session, flow_file) = session_with("12345", &[("kind", "report")]);
    let file = SessionFile::new(&session, flow_file);

    let view = json!({
        "kind": file.get_property("kind").into_value(),
        "size": file.get_property("size").into_value(),
        "missing": file.get_property("missing").into_value(),
    });

    assert_eq!(view, json!({"kind": "report", "size": 5, "missing": null}));
}
