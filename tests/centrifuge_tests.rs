//! Centrifuge behavior through the public surface, including how it
//! composes with the full pipeline.

use decloak_core::{Centrifuge, CentrifugeConfig, Monitor, Pipeline};

#[test]
fn symbol_dense_payload_is_flagged_end_to_end() {
    let pipeline = Pipeline::new();
    let mut monitor = Monitor::new();
    let out = pipeline.run("!!!@@@###$$$%%%^^^&&&***((()))", &mut monitor);
    assert!(out.contains("$[!!!]"));
    let ratio = monitor.ratio().unwrap();
    assert!(ratio <= monitor.threshold().unwrap());
}

#[test]
fn natural_language_leaves_monitor_untouched() {
    let pipeline = Pipeline::new();
    let mut monitor = Monitor::new();
    let input = "please update my shipping address to 12 Elm Street";
    let out = pipeline.run(input, &mut monitor);
    assert!(out.starts_with(input));
    assert!(!monitor.tripped());
}

#[test]
fn json_object_is_exempt_from_ratio_check() {
    let centrifuge = Centrifuge::default();
    let mut monitor = Monitor::new();
    let out = centrifuge.assess(r#"{"a":"&&&***!!!","b":"((()))###"}"#, &mut monitor);
    assert!(monitor.ratio().is_none());
    assert!(!out.contains("$[!!!]"));
}

#[test]
fn malformed_near_json_is_not_exempt() {
    let centrifuge = Centrifuge::default();
    let mut monitor = Monitor::new();
    centrifuge.assess(r#"{"a":&&&***!!!((()))###$$$@@@"#, &mut monitor);
    assert!(monitor.ratio().is_some());
}

#[test]
fn fingerprint_trip_is_recorded_and_appended() {
    let centrifuge = Centrifuge::default();
    let mut monitor = Monitor::new();
    let value = "aaaa bbbb cccc dddd eeee (){}[]!?:=*%&|^/";
    let out = centrifuge.assess(value, &mut monitor);
    let fingerprint = monitor.fingerprint().unwrap();
    assert!(out.ends_with(fingerprint));
    assert!(fingerprint.contains('('));
}

#[test]
fn custom_threshold_is_respected() {
    let cfg = CentrifugeConfig {
        ratio_threshold: 0.1,
        ..CentrifugeConfig::default()
    };
    let centrifuge = Centrifuge::new(cfg).unwrap();
    let mut monitor = Monitor::new();
    let out = centrifuge.assess("!!!@@@###$$$%%%^^^&&&***((()))", &mut monitor);
    assert!(!out.contains("$[!!!]"));
    assert!(monitor.ratio().is_none());
}

#[test]
fn zero_threshold_config_is_rejected() {
    let cfg = CentrifugeConfig {
        ratio_threshold: 0.0,
        ..CentrifugeConfig::default()
    };
    assert!(Centrifuge::new(cfg).is_err());
}

#[test]
fn monitor_serializes_recorded_metrics() {
    let centrifuge = Centrifuge::default();
    let mut monitor = Monitor::new();
    centrifuge.assess("!!!@@@###$$$%%%^^^&&&***((()))", &mut monitor);
    let json = serde_json::to_value(&monitor).unwrap();
    assert!(json["ratio"].is_number());
    assert!(json["threshold"].is_number());
}
