mod support;

use assert_matches::assert_matches;
use flow_host_mock::{MockSession, Primitive};
use flowfile_script::{
    EnvConfig, Property, ReservedWritePolicy, ScriptError, SessionFile, ATTRIBUTES_PROPERTY,
    SIZE_PROPERTY,
};
use pretty_assertions::assert_eq;
use serde_json::json;

use support::{attributes, session_with};

fn config(reserved_writes: ReservedWritePolicy) -> EnvConfig {
    EnvConfig {
        reserved_writes,
        ..EnvConfig::default()
    }
}

#[test]
fn set_then_get_round_trips_strings() {
    let (session, flow_file) = session_with("", &[]);
    let mut file = SessionFile::new(&session, flow_file);

    file.set_property("filename", &json!("test.txt"))
        .expect("set should succeed");

    assert_eq!(
        file.get_property("filename"),
        Property::Attribute(Some("test.txt".to_string()))
    );
    assert_eq!(
        session
            .current(file.flow_file())
            .and_then(|current| current.attribute("filename").map(str::to_string)),
        Some("test.txt".to_string())
    );
}

#[test]
fn non_string_values_are_stored_as_their_text() {
    let (session, flow_file) = session_with("", &[]);
    let mut file = SessionFile::new(&session, flow_file);

    file.set_property("count", &json!(42)).expect("set number");
    file.set_property("enabled", &json!(true)).expect("set bool");

    assert_eq!(file.get_attribute("count"), Some("42"));
    assert_eq!(file.get_attribute("enabled"), Some("true"));
}

#[test]
fn null_removes_the_attribute() {
    let (session, flow_file) = session_with("", &[("filename", "a.txt")]);
    let mut file = SessionFile::new(&session, flow_file);

    file.set_property("filename", &json!(null))
        .expect("null should remove");

    assert_eq!(file.get_property("filename"), Property::Attribute(None));
    assert_eq!(session.primitives(), vec![Primitive::RemoveAttribute]);
}

#[test]
fn removing_an_unset_attribute_is_a_host_no_op() {
    let (session, flow_file) = session_with("", &[("other", "1")]);
    let mut file = SessionFile::new(&session, flow_file);

    file.set_property("missing", &json!(null))
        .expect("removal of unset key is a no-op");
    file.remove_attribute("missing").expect("no-op again");

    assert_eq!(file.attributes(), &attributes(&[("other", "1")]));
    assert_eq!(
        session.primitives(),
        vec![Primitive::RemoveAttribute, Primitive::RemoveAttribute]
    );
}

#[test]
fn removal_reaches_keys_added_through_another_handle() {
    let session = MockSession::new();
    let flow_file = session.create_empty();
    let mut stale = SessionFile::new(&session, flow_file.clone());
    let mut fresh = SessionFile::new(&session, flow_file.clone());

    fresh.put_attribute("k", "v").expect("put");
    assert_eq!(stale.get_attribute("k"), None);
    stale.remove_attribute("k").expect("remove");

    assert_eq!(
        session
            .current(&flow_file)
            .and_then(|current| current.attribute("k").map(str::to_string)),
        None
    );
    assert_eq!(stale.get_attribute("k"), None);
}

#[test]
fn reading_an_unset_attribute_yields_none() {
    let (session, flow_file) = session_with("", &[]);
    let file = SessionFile::new(&session, flow_file);

    assert_eq!(file.get_property("nope"), Property::Attribute(None));
    assert_eq!(file.get_property("nope").into_value(), json!(null));
}

#[test]
fn size_is_intercepted_even_when_an_attribute_shares_the_name() {
    let (session, flow_file) = session_with("hello", &[("size", "999")]);
    let file = SessionFile::new(&session, flow_file);

    assert_eq!(file.get_property(SIZE_PROPERTY), Property::Size(5));
    assert_eq!(file.get_attribute("size"), Some("999"));
}

#[test]
fn attributes_property_returns_the_whole_map() {
    let (session, flow_file) = session_with("", &[("a", "1"), ("b", "2")]);
    let file = SessionFile::new(&session, flow_file);

    assert_eq!(
        file.get_property(ATTRIBUTES_PROPERTY),
        Property::Attributes(attributes(&[("a", "1"), ("b", "2")]))
    );
    assert_eq!(
        file.get_property(ATTRIBUTES_PROPERTY).into_value(),
        json!({"a": "1", "b": "2"})
    );
}

#[test]
fn reserved_names_are_stored_by_default() {
    let (session, flow_file) = session_with("abc", &[]);
    let mut file = SessionFile::new(&session, flow_file);

    file.set_property("size", &json!("10")).expect("allowed");

    assert_eq!(file.get_attribute("size"), Some("10"));
    assert_eq!(file.get_property("size"), Property::Size(3));
}

#[test]
fn warn_policy_still_stores_reserved_names() {
    let (session, flow_file) = session_with("", &[]);
    let mut file =
        SessionFile::with_config(&session, flow_file, &config(ReservedWritePolicy::Warn));

    file.put_attribute("attributes", "x").expect("warn stores");

    assert_eq!(file.get_attribute("attributes"), Some("x"));
}

#[test]
fn reject_policy_refuses_reserved_names_before_the_session() {
    let (session, flow_file) = session_with("", &[]);
    let mut file =
        SessionFile::with_config(&session, flow_file, &config(ReservedWritePolicy::Reject));

    let error = file
        .set_property("size", &json!(1))
        .expect_err("reject should refuse");

    assert_matches!(error, ScriptError::ReservedAttribute { key } if key == "size");
    assert!(session.calls().is_empty());

    file.put_attribute("sizeish", "1")
        .expect("only the exact reserved names are refused");
}

#[test]
fn bulk_helpers_apply_every_entry() {
    let (session, flow_file) = session_with("", &[("drop", "1"), ("keep", "2")]);
    let mut file = SessionFile::new(&session, flow_file);

    file.put_all_attributes([("x", "1"), ("y", "2")])
        .expect("put all")
        .remove_all_attributes(["drop", "absent"])
        .expect("remove all");

    assert_eq!(
        file.attributes(),
        &attributes(&[("keep", "2"), ("x", "1"), ("y", "2")])
    );
    assert_eq!(
        session.primitives(),
        vec![
            Primitive::PutAttribute,
            Primitive::PutAttribute,
            Primitive::RemoveAttribute,
            Primitive::RemoveAttribute,
        ]
    );
}

#[test]
fn handle_tracks_the_latest_snapshot() {
    let session = MockSession::new();
    let flow_file = session.create_empty();
    let mut file = SessionFile::new(&session, flow_file.clone());

    file.put_attribute("k", "v").expect("put");

    assert_eq!(flow_file.attribute("k"), None);
    let released = file.into_flow_file();
    assert_eq!(released.attribute("k"), Some("v"));
    assert_eq!(released.id(), flow_file.id());
}
