#![no_main]

use std::cell::RefCell;
use std::rc::Rc;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use surface_reactive::reactor::notify_depth;
use surface_reactive::{Object, ObserveOptions, Reactive, Value};

const KEYS: [&str; 3] = ["a", "b", "c"];

#[derive(Arbitrary, Debug)]
enum Op {
    /// Write a number at `keys[0..depth]` below the root.
    Write { depth: u8, key: u8, value: i8 },
    /// Replace the object at `keys[0..depth]` with a fresh subtree.
    Replace { depth: u8, key: u8 },
    /// Point a slot back at the root.
    Cycle { depth: u8, key: u8 },
    Remove { depth: u8, key: u8 },
    Observe { depth: u8, key: u8, loose: bool },
    Bind { depth: u8, key: u8 },
    Dispose,
}

fn key(index: u8) -> &'static str {
    KEYS[usize::from(index) % KEYS.len()]
}

fn walk(root: &Object, depth: u8, key_seed: u8) -> Option<Object> {
    let mut node = root.clone();
    for step in 0..(depth % 4) {
        node = node.get(key(key_seed.wrapping_add(step))).as_object()?.clone();
    }
    Some(node)
}

fn subtree(seed: u8) -> Object {
    Object::from_entries([
        (key(seed), Value::from(i32::from(seed))),
        (key(seed.wrapping_add(1)), Value::from(Object::from_entries([(key(seed), 0)]))),
    ])
}

fuzz_target!(|ops: Vec<Op>| {
    let root = subtree(0);
    let mirror = Object::from_entries([("value", 0)]);
    let hits = Rc::new(RefCell::new(0usize));
    let mut held = Vec::new();

    for op in ops.into_iter().take(256) {
        match op {
            Op::Write { depth, key: k, value } => {
                if let Some(node) = walk(&root, depth, k) {
                    let _ = node.set(key(k), i32::from(value));
                }
            }
            Op::Replace { depth, key: k } => {
                if let Some(node) = walk(&root, depth, k) {
                    let _ = node.set(key(k), subtree(k));
                }
            }
            Op::Cycle { depth, key: k } => {
                if let Some(node) = walk(&root, depth, k) {
                    let _ = node.set(key(k), &root);
                }
            }
            Op::Remove { depth, key: k } => {
                if let Some(node) = walk(&root, depth, k) {
                    let _ = node.remove(key(k));
                }
            }
            Op::Observe { depth, key: k, loose } => {
                let path: Vec<&str> = (0..=depth % 4).map(|s| key(k.wrapping_add(s))).collect();
                let options = if loose {
                    ObserveOptions::new().lazy().loose()
                } else {
                    ObserveOptions::new().lazy()
                };
                let h = Rc::clone(&hits);
                if let Ok(path) = surface_reactive::KeyPath::from_keys(path) {
                    let _ = Reactive::observe_with(
                        &root,
                        path,
                        move |_: &Value| *h.borrow_mut() += 1,
                        options,
                    );
                }
            }
            Op::Bind { depth, key: k } => {
                let path: Vec<&str> = (0..=depth % 3).map(|s| key(k.wrapping_add(s))).collect();
                if let Ok(path) = surface_reactive::KeyPath::from_keys(path) {
                    if let Ok(pair) = Reactive::observe_two_way(&root, path, &mirror, "value") {
                        held.push(pair);
                    }
                }
            }
            Op::Dispose => {
                let _ = Reactive::dispose(&root);
            }
        }
        assert_eq!(notify_depth(), 0);
    }
});
