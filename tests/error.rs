use std::error::Error as StdError;
use std::sync::Arc;

use tomorrow::{set_debug, TomorrowError};

#[test]
fn display_leads_with_name_and_message() {
    let err = TomorrowError::new("gone", None, Some(vec!["at read".into(), "at main".into()]));
    assert_eq!(err.to_string(), "Error: gone\nat read\nat main");
}

#[test]
fn frames_from_a_prior_error_come_first() {
    let inner = TomorrowError::new("lost", None, Some(vec!["at origin".into()]));
    let outer = TomorrowError::new(
        "lost",
        Some(Arc::new(inner)),
        Some(vec!["at boundary".into()]),
    );
    assert_eq!(
        outer.frames(),
        &["at origin".to_string(), "at boundary".to_string()]
    );
}

#[test]
fn names_are_inherited_across_boundaries() {
    let inner = TomorrowError::new("denied", None, Some(vec![])).with_name("PermissionError");
    let outer = TomorrowError::new("denied", Some(Arc::new(inner)), Some(vec![]));
    assert_eq!(outer.name(), "PermissionError");
    assert!(outer.to_string().starts_with("PermissionError: denied"));
}

#[test]
fn foreign_origins_contribute_a_provenance_line() {
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
    let err = TomorrowError::new("read failed", Some(Arc::new(io)), Some(vec![]));
    assert_eq!(err.name(), "Error");
    assert_eq!(err.frames().len(), 1);
    assert!(err.frames()[0].starts_with("caused by:"));
    assert!(err.source().is_some());
}

// One test body: the debug flag is global, and interleaving it with the
// capture assertions would race.
#[test]
fn internal_frames_are_hidden_unless_debug() {
    // No stack supplied: one is captured at construction. Whatever it
    // contains, the library's own frames are filtered out.
    let captured = TomorrowError::new("probe", None, None);
    assert!(captured
        .frames()
        .iter()
        .all(|frame| !frame.contains("tomorrow::")));

    let stack = vec![
        "0: tomorrow::deferred::force".to_string(),
        "1: app::main".to_string(),
    ];

    let filtered = TomorrowError::new("x", None, Some(stack.clone()));
    assert_eq!(filtered.frames(), &["1: app::main".to_string()]);

    set_debug(true);
    let unfiltered = TomorrowError::new("x", None, Some(stack));
    set_debug(false);

    assert_eq!(unfiltered.frames().len(), 2);
    assert!(unfiltered.frames().len() > filtered.frames().len());
}
