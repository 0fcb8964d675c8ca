//! Array mutation propagation. Observation of indices is positional: an
//! observer of index `i` sees whatever value sits at position `i`.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::json;
use surface_reactive::{Object, ObserveOptions, Reactive, ReactiveError, Value};

type Log = Rc<RefCell<Vec<(String, Value)>>>;

fn watch(target: &Object, paths: &[&str]) -> Log {
    let log: Log = Rc::new(RefCell::new(Vec::new()));
    for path in paths {
        let l = Rc::clone(&log);
        let name = (*path).to_owned();
        Reactive::observe_with(
            target,
            *path,
            move |v: &Value| l.borrow_mut().push((name.clone(), v.clone())),
            ObserveOptions::new().lazy(),
        )
        .unwrap();
    }
    log
}

fn entry(path: &str, value: impl Into<Value>) -> (String, Value) {
    (path.to_owned(), value.into())
}

#[test]
fn unshift_is_positional() {
    let list = Object::array([1, 2]);
    let log = watch(&list, &["0"]);

    assert_eq!(list.unshift([5]).unwrap(), 3);
    assert_eq!(*log.borrow(), vec![entry("0", 5)]);
    assert_eq!(list.get("0"), Value::from(5));
}

#[test]
fn push_notifies_length_only() {
    let list = Object::array([1, 2]);
    let log = watch(&list, &["0", "length"]);

    list.push(3).unwrap();
    assert_eq!(*log.borrow(), vec![entry("length", 3)]);
}

#[test]
fn shift_moves_every_watched_index() {
    let list = Object::array(["a", "b", "c"]);
    let log = watch(&list, &["length", "1", "0"]);

    assert_eq!(list.shift().unwrap(), Value::from("a"));
    assert_eq!(
        *log.borrow(),
        vec![entry("0", "b"), entry("1", "c"), entry("length", 2)]
    );
}

#[test]
fn pop_reports_vacated_slot_as_undefined() {
    let list = Object::array([1, 2]);
    let log = watch(&list, &["1"]);

    assert_eq!(list.pop().unwrap(), Value::from(2));
    assert_eq!(*log.borrow(), vec![entry("1", Value::Undefined)]);
}

#[test]
fn splice_notifies_changed_positions() {
    let list = Object::array([1, 2, 3, 4]);
    let log = watch(&list, &["0", "1", "3"]);

    let removed = list.splice(1, 2, [9]).unwrap();
    assert_eq!(removed, vec![Value::from(2), Value::from(3)]);
    assert_eq!(
        *log.borrow(),
        vec![entry("1", 9), entry("3", Value::Undefined)]
    );
}

#[test]
fn index_and_length_writes() {
    let list = Object::array([1, 2, 3]);
    let log = watch(&list, &["2", "length"]);

    list.set("2", 30).unwrap();
    list.set("2", 30).unwrap();
    list.set("length", 1).unwrap();
    assert_eq!(
        *log.borrow(),
        vec![
            entry("2", 30),
            entry("2", Value::Undefined),
            entry("length", 1)
        ]
    );
}

#[test]
fn element_paths_follow_replaced_items() {
    let state = Object::from_json(json!({ "items": [{ "label": "first" }] }));
    let log = watch(&state, &["items[0].label"]);

    let items = Reactive::resolve(&state, "items")
        .unwrap()
        .as_object()
        .cloned()
        .unwrap();
    items.unshift([Object::from_entries([("label", "zero")])]).unwrap();
    assert_eq!(*log.borrow(), vec![entry("items[0].label", "zero")]);

    let head = Reactive::resolve(&state, "items.0")
        .unwrap()
        .as_object()
        .cloned()
        .unwrap();
    head.set("label", "renamed").unwrap();
    assert_eq!(
        log.borrow().last(),
        Some(&entry("items[0].label", "renamed"))
    );
}

#[test]
fn observing_past_the_end_is_strict() {
    let list = Object::array([1]);
    let err = Reactive::observe(&list, "5").unwrap_err();
    assert_eq!(err, ReactiveError::key_not_found("5", "Array"));

    let log: Log = Rc::new(RefCell::new(Vec::new()));
    let l = Rc::clone(&log);
    Reactive::observe_with(
        &list,
        "5",
        move |v: &Value| l.borrow_mut().push(("5".to_owned(), v.clone())),
        ObserveOptions::new().lazy().loose(),
    )
    .unwrap();
    list.set("5", 6).unwrap();
    assert_eq!(*log.borrow(), vec![entry("5", 6)]);
}

#[test]
fn array_operations_on_records_fail() {
    let record = Object::new();
    assert_eq!(record.push(1), Err(ReactiveError::NotAnArray));
    assert_eq!(
        Object::array([1]).set("name", 1),
        Err(ReactiveError::InvalidIndex {
            key: "name".to_owned()
        })
    );
}
