//! Property-based invariant tests for the reactor graph.
//!
//! 1. Identity short-circuit: writing the current value never notifies.
//! 2. Terminal listeners always report the value reachable through the path
//!    after any sequence of intermediate replacements and leaf writes.
//! 3. Detached objects never reach a listener again.
//! 4. Two-way bindings converge on the last written value.
//! 5. Index observers are positional after arbitrary array mutations.
//! 6. Path parsing accepts every well-formed dotted path and round-trips it.
//! 7. The notification stack is empty after every write.

use std::cell::RefCell;
use std::rc::Rc;

use proptest::prelude::*;
use surface_reactive::reactor::notify_depth;
use surface_reactive::{KeyPath, Object, ObserveOptions, Reactive, Value};

// ── Helpers ──────────────────────────────────────────────────────────

fn recorder() -> (Rc<RefCell<Vec<Value>>>, impl Fn(&Value) + 'static) {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let s = Rc::clone(&seen);
    (seen, move |v: &Value| s.borrow_mut().push(v.clone()))
}

/// `{ k<from>: { ... { k<depth-1>: { value: leaf } } } }`.
fn chain(from: usize, depth: usize, leaf: i32) -> Object {
    let mut node = Object::from_entries([("value", leaf)]);
    for level in (from..depth).rev() {
        node = Object::from_entries([(format!("k{level}"), node)]);
    }
    node
}

fn path_for(depth: usize) -> Vec<String> {
    let mut keys: Vec<String> = (0..depth).map(|level| format!("k{level}")).collect();
    keys.push("value".to_owned());
    keys
}

/// The object at `level` along the chain (`0` is the root).
fn node_at(root: &Object, level: usize) -> Option<Object> {
    let mut node = root.clone();
    for l in 0..level {
        node = node.get(&format!("k{l}")).as_object()?.clone();
    }
    Some(node)
}

#[derive(Debug, Clone)]
enum ChainOp {
    /// Replace the child at `level` with a fresh sub-chain holding `leaf`.
    Replace { level: usize, leaf: i32 },
    /// Write `leaf` into the terminal object.
    Write { leaf: i32 },
}

fn chain_op(depth: usize) -> impl Strategy<Value = ChainOp> {
    prop_oneof![
        (0..depth, -50i32..50).prop_map(|(level, leaf)| ChainOp::Replace { level, leaf }),
        (-50i32..50).prop_map(|leaf| ChainOp::Write { leaf }),
    ]
}

#[derive(Debug, Clone)]
enum ArrayOp {
    Push(i32),
    Pop,
    Shift,
    Unshift(i32),
    Splice(usize, usize, Vec<i32>),
    Set(usize, i32),
}

fn array_op() -> impl Strategy<Value = ArrayOp> {
    prop_oneof![
        any::<i32>().prop_map(ArrayOp::Push),
        Just(ArrayOp::Pop),
        Just(ArrayOp::Shift),
        any::<i32>().prop_map(ArrayOp::Unshift),
        (0usize..6, 0usize..4, proptest::collection::vec(any::<i32>(), 0..3))
            .prop_map(|(s, d, v)| ArrayOp::Splice(s, d, v)),
        (0usize..6, any::<i32>()).prop_map(|(i, v)| ArrayOp::Set(i, v)),
    ]
}

// ═════════════════════════════════════════════════════════════════════════
// 1. Identity short-circuit
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn same_value_never_notifies(values in proptest::collection::vec(-5i32..5, 1..20)) {
        let target = Object::from_entries([("value", 0)]);
        let (seen, listener) = recorder();
        Reactive::observe_with(&target, "value", listener, ObserveOptions::new().lazy()).unwrap();

        let mut expected = Vec::new();
        let mut current = 0;
        for v in values {
            target.set("value", v).unwrap();
            if v != current {
                expected.push(Value::from(v));
                current = v;
            }
        }
        prop_assert_eq!(&*seen.borrow(), &expected);
        prop_assert_eq!(notify_depth(), 0);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 2 + 3. Rebinding after random replacements
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn terminal_listener_tracks_current_chain(
        (depth, ops) in (1usize..5).prop_flat_map(|d| (Just(d), proptest::collection::vec(chain_op(d), 1..25)))
    ) {
        let root = chain(0, depth, 0);
        let (seen, listener) = recorder();
        Reactive::observe_with(&root, path_for(depth), listener, ObserveOptions::new()).unwrap();

        let mut detached: Vec<Object> = Vec::new();
        for op in ops {
            match op {
                ChainOp::Replace { level, leaf } => {
                    let parent = node_at(&root, level).unwrap();
                    let key = format!("k{level}");
                    if let Some(old) = parent.get(&key).as_object() {
                        detached.push(old.clone());
                    }
                    parent.set(key, chain(level + 1, depth, leaf)).unwrap();
                }
                ChainOp::Write { leaf } => {
                    node_at(&root, depth).unwrap().set("value", leaf).unwrap();
                }
            }
            let current = Reactive::resolve(&root, path_for(depth)).unwrap();
            prop_assert_eq!(seen.borrow().last().cloned().unwrap_or_default(), current);
            prop_assert_eq!(notify_depth(), 0);
        }

        let before = seen.borrow().len();
        for old in &detached {
            // Walk each detached subtree down to its leaf and write there.
            let mut node = Some(old.clone());
            while let Some(n) = node {
                if n.has("value") {
                    n.set("value", 12345).unwrap();
                }
                node = n
                    .keys()
                    .into_iter()
                    .find(|k| k.as_str().starts_with('k'))
                    .and_then(|k| n.get(k.as_str()).as_object().cloned());
            }
        }
        prop_assert_eq!(seen.borrow().len(), before);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 4. Two-way convergence
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn two_way_converges(writes in proptest::collection::vec((any::<bool>(), -100i32..100), 1..30)) {
        let left = Object::from_entries([("a", 0)]);
        let right = Object::from_entries([("b", 1)]);
        let _subs = Reactive::observe_two_way(&left, "a", &right, "b").unwrap();
        prop_assert_eq!(right.get("b"), Value::from(0));

        for (to_left, v) in writes {
            if to_left {
                left.set("a", v).unwrap();
            } else {
                right.set("b", v).unwrap();
            }
            prop_assert_eq!(left.get("a"), Value::from(v));
            prop_assert_eq!(right.get("b"), Value::from(v));
            prop_assert_eq!(notify_depth(), 0);
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 5. Positional array observation
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn index_observers_are_positional(
        initial in proptest::collection::vec(any::<i32>(), 0..5),
        ops in proptest::collection::vec(array_op(), 1..20),
    ) {
        let list = Object::array(initial.iter().copied());
        // Positions are observed loosely so out-of-range slots are allowed.
        let mut logs = Vec::new();
        for index in 0..4usize {
            let (seen, listener) = recorder();
            Reactive::observe_with(
                &list,
                index.to_string(),
                listener,
                ObserveOptions::new().loose(),
            )
            .unwrap();
            logs.push((index, seen));
        }
        let (length_log, listener) = recorder();
        Reactive::observe_with(&list, "length", listener, ObserveOptions::new()).unwrap();

        let mut model: Vec<Value> = initial.iter().copied().map(Value::from).collect();
        for op in ops {
            match op {
                ArrayOp::Push(v) => {
                    list.push(v).unwrap();
                    model.push(Value::from(v));
                }
                ArrayOp::Pop => {
                    list.pop().unwrap();
                    model.pop();
                }
                ArrayOp::Shift => {
                    list.shift().unwrap();
                    if !model.is_empty() {
                        model.remove(0);
                    }
                }
                ArrayOp::Unshift(v) => {
                    list.unshift([v]).unwrap();
                    model.insert(0, Value::from(v));
                }
                ArrayOp::Splice(start, delete, insert) => {
                    list.splice(start, delete, insert.iter().copied()).unwrap();
                    let start = start.min(model.len());
                    let end = (start + delete).min(model.len());
                    drop(model.splice(start..end, insert.into_iter().map(Value::from)));
                }
                ArrayOp::Set(index, v) => {
                    list.set(index, v).unwrap();
                    if index >= model.len() {
                        model.resize(index + 1, Value::Undefined);
                    }
                    model[index] = Value::from(v);
                }
            }

            prop_assert_eq!(list.items().unwrap(), model.clone());
            for (index, seen) in &logs {
                let expected = model.get(*index).cloned().unwrap_or_default();
                let last = seen.borrow().last().cloned().unwrap_or_default();
                prop_assert_eq!(last, expected, "index {}", index);
            }
            let last_length = length_log.borrow().last().cloned().unwrap_or_default();
            prop_assert_eq!(last_length, Value::Number(model.len() as f64));
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 6. Path parsing
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn dotted_paths_round_trip(segments in proptest::collection::vec("[a-z_][a-z0-9_]{0,6}", 1..6)) {
        let text = segments.join(".");
        let path = KeyPath::parse(&text).unwrap();
        prop_assert_eq!(path.len(), segments.len());
        prop_assert_eq!(path.to_string(), text);
    }

    #[test]
    fn parse_never_panics(text in ".{0,24}") {
        let _ = KeyPath::parse(&text);
    }
}
