use std::io::Write;

use eventlens_data::{ScriptValue, TriggerCondition};
use eventlens_script::{ScriptError, parse_events, parse_events_file, read_script_file_chunked, tokenize_stream};

#[test]
fn simple_event_fixture() {
    let events = parse_events(include_str!("fixtures/simple-event.txt")).expect("parse ok");
    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event.namespace.as_deref(), Some("flavor_eng"));
    assert_eq!(event.qualified_id(), "flavor_eng.1");
    assert_eq!(event.title.as_deref(), Some("flavor_eng.1.t"));
    assert_eq!(event.picture.as_deref(), Some("COURT_eventPicture"));
    assert_eq!(event.fire_only_once, Some(true));
    assert_eq!(
        event.mean_time_to_happen.as_ref().and_then(|m| m.get("months")),
        Some(&ScriptValue::Number(120.0))
    );
    let Some(TriggerCondition::And(conditions)) = &event.trigger else {
        panic!("trigger missing");
    };
    assert_eq!(conditions[1], TriggerCondition::leaf("has_country_flag", "eng_ready"));
    assert_eq!(event.options.len(), 1);
    assert_eq!(event.options[0].name.as_deref(), Some("flavor_eng.1.a"));
}

#[test]
fn complex_event_fixture() {
    let events = parse_events(include_str!("fixtures/complex-event.txt")).expect("parse ok");
    assert_eq!(events.len(), 2);

    let reform = &events[0];
    assert_eq!(reform.is_triggered_only, Some(true));
    assert_eq!(reform.major, Some(true));
    let immediate = reform.immediate.as_ref().expect("immediate");
    assert_eq!(
        immediate.get("set_country_flag"),
        Some(&ScriptValue::List(vec!["fra_reform_seen".into(), "fra_reform_pending".into()]))
    );
    assert_eq!(reform.options.len(), 2);
    assert_eq!(reform.options[0].ai_chance, Some(80.0));
    let effects = reform.options[0].effects.as_ref().expect("effects");
    assert_eq!(
        effects.get("country_event").and_then(|e| e.get("id")),
        Some(&ScriptValue::from("flavor_fra.11"))
    );
    assert!(reform.options[1].trigger.is_some());

    let follow_up = &events[1];
    assert_eq!(follow_up.title.as_deref(), Some("flavor_fra.11.t"));
    assert_eq!(follow_up.hidden, Some(false));
}

#[test]
fn dotted_ids_and_date_keys() {
    let events = parse_events(include_str!("fixtures/dotted-id.txt")).expect("parse ok");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].id, "flavor_tur.1");
    assert_eq!(events[0].qualified_id(), "flavor_tur.1");
    assert_eq!(events[0].options[0].ai_chance, Some(100.0));
}

#[test]
fn windows_1252_file_decodes() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"namespace = test\r\ncountry_event = {\r\n\tid = test.1\r\n\ttitle = \"Caf\xe9\"\r\n}\r\n")
        .unwrap();
    file.flush().unwrap();
    let events = parse_events_file(file.path()).expect("parse ok");
    assert_eq!(events[0].title.as_deref(), Some("Caf\u{e9}"));
}

#[test]
fn chunked_read_matches_whole_read() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(include_bytes!("fixtures/complex-event.txt")).unwrap();
    file.flush().unwrap();
    let chunks: Vec<String> = read_script_file_chunked(file.path(), 37)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert!(chunks.len() > 1);
    let tokens = tokenize_stream(&chunks).unwrap().unwrap();
    let whole = eventlens_script::tokenize(&eventlens_script::read_script_file(file.path()).unwrap()).unwrap();
    assert_eq!(tokens, whole);
}

#[test]
fn syntax_errors_carry_lines() {
    let err = parse_events("country_event = {\n  id = x.1\n  title = \n}").unwrap_err();
    assert!(matches!(err, ScriptError::Parse { line: 4, .. }));
}

#[test]
fn malformed_numeric_values_do_not_sink_the_file() {
    let source = "namespace = flavor_eng\n\
        country_event = {\n\
        \tid = flavor_eng.7\n\
        \ttrigger = { version = 1.2.3.4 }\n\
        \timmediate = { range = 10-20 }\n\
        }\n";
    let events = parse_events(source).expect("parse ok");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].qualified_id(), "flavor_eng.7");
    assert_eq!(
        events[0].immediate.as_ref().and_then(|i| i.get("range")),
        Some(&ScriptValue::from("10-20"))
    );
}
