use std::sync::mpsc::channel;
use std::thread;
use std::time::Duration;

use tomorrow::{begin, wrap, TomorrowError, Value};

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

#[test]
fn a_wrapped_read_behaves_like_its_result() {
    init_logging();
    let read = wrap(
        |args: Vec<Value>| {
            assert_eq!(args[0], Value::Str("a.txt".into()));
            let complete = args[1].clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(10));
                complete
                    .call(&[Value::Null, Value::Str("data".into())])
                    .unwrap();
            });
            Ok(())
        },
        -1,
    );

    let (tx, rx) = channel();
    begin(move || {
        let file = read.call(vec![Value::Str("a.txt".into())]).unwrap();
        // No restructuring around a callback: just touch the value.
        tx.send(file.get("length").unwrap()).unwrap();
    });
    assert_eq!(rx.recv().unwrap(), Value::Int(4));
}

#[test]
fn completion_may_fire_before_the_first_touch() {
    let op = wrap(
        |args: Vec<Value>| {
            // Callback invoked synchronously, before the caller ever forces.
            args[1].call(&[Value::Null, Value::Int(42)]).unwrap();
            Ok(())
        },
        -1,
    );

    let (tx, rx) = channel();
    begin(move || {
        let result = op.call(vec![]).unwrap();
        let value_of = result.get("valueOf").unwrap();
        tx.send(value_of.call(&[]).unwrap()).unwrap();
    });
    assert_eq!(rx.recv().unwrap(), Value::Int(42));
}

#[test]
fn the_callback_lands_at_a_positive_index() {
    let (seen_tx, seen_rx) = channel();
    let op = wrap(
        move |args: Vec<Value>| {
            // Injected first, caller arguments shifted right.
            args[0].call(&[Value::Null, Value::Bool(true)]).unwrap();
            seen_tx.send((args.len(), args[1].clone(), args[2].clone())).unwrap();
            Ok(())
        },
        0,
    );

    let (tx, rx) = channel();
    begin(move || {
        let done = op
            .call(vec![Value::Str("x".into()), Value::Int(9)])
            .unwrap();
        tx.send(done.get("valueOf").unwrap().call(&[]).unwrap()).unwrap();
    });

    assert_eq!(rx.recv().unwrap(), Value::Bool(true));
    let (argc, first, second) = seen_rx.recv().unwrap();
    assert_eq!(argc, 3);
    assert_eq!(first, Value::Str("x".into()));
    assert_eq!(second, Value::Int(9));
}

#[test]
fn synchronous_failures_are_raised_at_the_call_site() {
    let failing = wrap(|_args: Vec<Value>| Err("disk on fire".into()), -1);

    // No context involved: the failure never reaches the future.
    let err = failing.call(vec![]).unwrap_err();
    assert_eq!(err.message(), "disk on fire");
    assert_eq!(err.name(), "Error");
    assert!(err.to_string().starts_with("Error: disk on fire"));
}

#[test]
fn synchronous_failures_keep_prior_frames() {
    let prior = TomorrowError::new("bad handle", None, Some(vec!["at origin".into()]));
    let failing = wrap(
        move |_args: Vec<Value>| Err(Box::new(prior.clone()) as Box<dyn std::error::Error + Send + Sync>),
        -1,
    );

    let err = failing.call(vec![]).unwrap_err();
    assert_eq!(err.message(), "bad handle");
    assert_eq!(err.frames().first().map(String::as_str), Some("at origin"));
    assert!(std::error::Error::source(&err).is_some());
}

#[test]
fn asynchronous_failures_surface_when_forced() {
    let op = wrap(
        |args: Vec<Value>| {
            let complete = args[0].clone();
            thread::spawn(move || {
                complete.call(&[Value::Str("boom".into())]).unwrap();
            });
            Ok(())
        },
        -1,
    );

    let (tx, rx) = channel();
    begin(move || {
        let result = op.call(vec![]).unwrap();
        // The call itself succeeded; the failure arrives at force time.
        tx.send(result.get("anything").unwrap_err()).unwrap();
    });

    let err = rx.recv().unwrap();
    assert_eq!(err.message(), "boom");
    assert!(err.to_string().starts_with("Error: boom"));
}

#[test]
fn error_factories_name_the_failure() {
    let op = wrap(
        |args: Vec<Value>| {
            args[0].call(&[Value::Str("boom".into())]).unwrap();
            Ok(())
        },
        -1,
    )
    .with_error(|message, site| {
        TomorrowError::new(message, None, Some(site)).with_name("IoError")
    });

    let (tx, rx) = channel();
    begin(move || {
        let result = op.call(vec![]).unwrap();
        tx.send(result.get("anything").unwrap_err()).unwrap();
    });

    let err = rx.recv().unwrap();
    assert_eq!(err.name(), "IoError");
    assert!(err.to_string().starts_with("IoError: boom"));
}

#[test]
fn internal_frames_stay_out_of_async_failure_stacks() {
    let op = wrap(
        |args: Vec<Value>| {
            let complete = args[0].clone();
            thread::spawn(move || {
                complete.call(&[Value::Str("lost".into())]).unwrap();
            });
            Ok(())
        },
        -1,
    );

    let (tx, rx) = channel();
    begin(move || {
        let result = op.call(vec![]).unwrap();
        tx.send(result.get("anything").unwrap_err()).unwrap();
    });

    // The failure crossed one suspension boundary; its stitched stack still
    // excludes this library's own frames.
    let err = rx.recv().unwrap();
    assert!(err
        .frames()
        .iter()
        .all(|frame| !frame.contains("tomorrow::")));
}

#[test]
fn object_errors_contribute_their_message() {
    let op = wrap(
        |args: Vec<Value>| {
            let fault = tomorrow::Object::new();
            fault.set("message", Value::Str("no such file".into()));
            args[0]
                .call(&[Value::Object(fault), Value::Null])
                .unwrap();
            Ok(())
        },
        -1,
    );

    let (tx, rx) = channel();
    begin(move || {
        let result = op.call(vec![]).unwrap();
        tx.send(result.get("anything").unwrap_err()).unwrap();
    });
    assert_eq!(rx.recv().unwrap().message(), "no such file");
}
