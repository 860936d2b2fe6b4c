use std::sync::mpsc::channel;
use std::sync::Arc;

use tomorrow::{begin, Deferred, NativeFn, Object, PropertyAttributes, Value};

fn resolved_object() -> (Deferred, Object) {
    let deferred = Deferred::new();
    let object = Object::new();
    object.set("a", Value::Int(1));
    (deferred, object)
}

#[test]
fn handle_operations_match_direct_access() {
    let (deferred, object) = resolved_object();
    let handle = deferred.handle();
    let (tx, rx) = channel();

    begin(move || {
        // Suspends on the first touch, proceeds once resolved.
        let got = handle.get("a").unwrap();
        let assigned = handle.set("b", Value::Int(2)).unwrap();
        let removed = handle.delete("a").unwrap();
        let keys = handle.enumerate().unwrap();
        tx.send((got, assigned, removed, keys)).unwrap();
    });

    deferred.resolve(Value::Object(object.clone()));

    let (got, assigned, removed, keys) = rx.recv().unwrap();
    assert_eq!(got, Value::Int(1));
    assert_eq!(assigned, Value::Int(2));
    assert!(removed);
    assert_eq!(keys, vec!["b".to_string()]);

    // The same side effects are visible on the object itself.
    assert_eq!(object.get("b"), Value::Int(2));
    assert_eq!(object.get("a"), Value::Null);
}

#[test]
fn post_resolution_access_is_direct() {
    let (deferred, object) = resolved_object();
    let handle = deferred.handle();

    deferred.resolve(Value::Object(object.clone()));

    // No context, no suspension: the handle is already rebound to the value.
    assert_eq!(handle.get("a").unwrap(), Value::Int(1));
    handle.set("c", Value::Str("x".into())).unwrap();
    assert_eq!(object.get("c"), Value::Str("x".into()));
    assert_eq!(handle.enumerate().unwrap(), vec!["a".to_string(), "c".to_string()]);
}

#[test]
fn calls_use_the_forced_value_as_receiver() {
    let deferred = Deferred::new();
    let handle = deferred.handle();
    let (tx, rx) = channel();

    begin(move || {
        let first = handle.call(&[Value::Int(10)]).unwrap();
        let second = handle.call(&[Value::Int(5)]).unwrap();
        tx.send((first, second)).unwrap();
    });

    // A counter whose state lives on the object itself.
    let bump: NativeFn = Arc::new(|receiver, args| {
        let counter = receiver.as_object().expect("receiver is the object").clone();
        let step = args.first().and_then(Value::as_int).unwrap_or(1);
        let next = counter.get("count").as_int().unwrap_or(0) + step;
        counter.set("count", Value::Int(next));
        Ok(Value::Int(next))
    });
    let counter = Object::callable(bump);
    counter.set("count", Value::Int(0));
    deferred.resolve(Value::Object(counter.clone()));

    let (first, second) = rx.recv().unwrap();
    assert_eq!(first, Value::Int(10));
    assert_eq!(second, Value::Int(15));
    assert_eq!(counter.get("count"), Value::Int(15));
}

#[test]
fn primitive_results_are_boxed_once() {
    let deferred = Deferred::new();
    let handle = deferred.handle();
    let (tx, rx) = channel();

    begin(move || {
        let value_of = handle.get("valueOf").unwrap();
        tx.send(value_of.call(&[]).unwrap()).unwrap();
    });

    deferred.resolve(5i64);
    assert_eq!(rx.recv().unwrap(), Value::Int(5));
}

#[test]
fn string_results_answer_length() {
    let deferred = Deferred::new();
    let handle = deferred.handle();
    let (tx, rx) = channel();

    begin(move || {
        tx.send(handle.get("length").unwrap()).unwrap();
    });

    deferred.resolve("data");
    assert_eq!(rx.recv().unwrap(), Value::Int(4));
}

#[test]
fn query_reports_property_attributes() {
    let (deferred, object) = resolved_object();
    let handle = deferred.handle();
    let (tx, rx) = channel();

    begin(move || {
        let present = handle.query("a").unwrap();
        let absent = handle.query("missing").unwrap();
        tx.send((present, absent)).unwrap();
    });

    deferred.resolve(Value::Object(object));

    let (present, absent) = rx.recv().unwrap();
    assert_eq!(present, Some(PropertyAttributes::DATA));
    assert_eq!(absent, None);
}

#[test]
fn builtin_length_is_not_writable() {
    let deferred = Deferred::new();
    deferred.resolve("data");
    let handle = deferred.handle();

    let attrs = handle.query("length").unwrap().unwrap();
    assert!(!attrs.writable);
    assert!(!attrs.enumerable);
}

#[test]
fn indexed_operations_mirror_the_named_ones() {
    let deferred = Deferred::new();
    let handle = deferred.handle();
    let (tx, rx) = channel();

    begin(move || {
        let got = handle.index_get(1).unwrap();
        handle.index_set(3, Value::Str("d".into())).unwrap();
        let removed = handle.index_delete(0).unwrap();
        let keys = handle.index_enumerate().unwrap();
        let hole = handle.index_query(0).unwrap();
        let live = handle.index_query(3).unwrap();
        tx.send((got, removed, keys, hole, live)).unwrap();
    });

    let list = Object::new();
    list.index_set(0, Value::Str("a".into()));
    list.index_set(1, Value::Str("b".into()));
    deferred.resolve(Value::Object(list.clone()));

    let (got, removed, keys, hole, live) = rx.recv().unwrap();
    assert_eq!(got, Value::Str("b".into()));
    assert!(removed);
    assert_eq!(keys, vec![1, 3]);
    assert_eq!(hole, None);
    assert_eq!(live, Some(PropertyAttributes::DATA));
    assert_eq!(list.index_get(3), Value::Str("d".into()));
}
