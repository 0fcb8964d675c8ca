//! Schema-declared computed and notify properties on live instances.

use std::cell::RefCell;
use std::rc::Rc;

use surface_reactive::{
    Accessor, Metadata, Object, ObserveOptions, Reactive, ReactiveError, Schema, SubscriptionScope,
    Value,
};

fn text(value: &Value) -> String {
    value.as_str().unwrap_or_default().to_owned()
}

fn invoice() -> Schema {
    Schema::builder("Invoice")
        .field("customer", Object::from_entries([("name", "ada")]))
        .field("_total", 0)
        .accessor(
            "total",
            Accessor::getter(|o| o.get("_total")).with_setter(|o, v| o.set("_total", v)),
        )
        .computed("heading", ["customer.name", "total"], |o| {
            Value::from(format!(
                "{}: {}",
                text(&o.get("customer").get("name")),
                o.get("total").as_f64().unwrap_or_default()
            ))
        })
        .notify("_total", ["total"])
        .build()
        .unwrap()
}

fn watch(target: &Object, path: &str) -> Rc<RefCell<Vec<Value>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let s = Rc::clone(&seen);
    Reactive::observe_with(
        target,
        path,
        move |v: &Value| s.borrow_mut().push(v.clone()),
        ObserveOptions::new().lazy(),
    )
    .unwrap();
    seen
}

#[test]
fn computed_follows_nested_dependency_and_replacement() {
    let doc = invoice().instantiate().unwrap();
    let headings = watch(&doc, "heading");

    let customer = doc.get("customer").as_object().cloned().unwrap();
    customer.set("name", "grace").unwrap();
    assert_eq!(headings.borrow().last(), Some(&Value::from("grace: 0")));

    doc.set("customer", Object::from_entries([("name", "linus")]))
        .unwrap();
    assert_eq!(headings.borrow().last(), Some(&Value::from("linus: 0")));

    // The replaced customer no longer drives the heading.
    let count = headings.borrow().len();
    customer.set("name", "stale").unwrap();
    assert_eq!(headings.borrow().len(), count);
}

#[test]
fn notify_declaration_bridges_backing_field_to_accessor() {
    let doc = invoice().instantiate().unwrap();
    let totals = watch(&doc, "total");
    let headings = watch(&doc, "heading");

    // Writing the backing field directly still reaches `total` observers,
    // and through them the computed heading.
    doc.set("_total", 42).unwrap();
    assert_eq!(*totals.borrow(), vec![Value::from(42)]);
    assert_eq!(headings.borrow().last(), Some(&Value::from("ada: 42")));
}

#[test]
fn writing_through_the_accessor_reaches_observers() {
    let doc = invoice().instantiate().unwrap();
    let totals = watch(&doc, "total");

    doc.set("total", 7).unwrap();
    assert_eq!(doc.get("_total"), Value::from(7));
    // Both the accessor write and the `_total` notify declaration announce
    // `total`; listeners see the same value.
    assert!(!totals.borrow().is_empty());
    assert!(totals.borrow().iter().all(|v| *v == Value::from(7)));
}

#[test]
fn dispose_releases_schema_subscriptions() {
    let doc = invoice().instantiate().unwrap();
    let metadata = Metadata::of(&doc).unwrap();
    assert_eq!(metadata.disposable_count(), 3);
    assert_eq!(metadata.computed("heading").len(), 2);

    Reactive::dispose(&doc).unwrap();
    assert!(Reactive::get_reactor(&doc).is_none());

    // Fresh observation after dispose sees plain writes only.
    let headings = watch(&doc, "heading");
    doc.set("_total", 5).unwrap();
    assert!(headings.borrow().is_empty());
}

#[test]
fn instances_are_independent() {
    let schema = invoice();
    let first = schema.instantiate().unwrap();
    let second = schema.instantiate().unwrap();
    let first_totals = watch(&first, "total");
    let second_totals = watch(&second, "total");

    first.set("_total", 1).unwrap();
    assert_eq!(*first_totals.borrow(), vec![Value::from(1)]);
    assert!(second_totals.borrow().is_empty());
}

#[test]
fn object_fields_are_not_shared_between_instances() {
    let schema = invoice();
    let first = schema.instantiate().unwrap();
    let second = schema.instantiate().unwrap();
    let first_customer = first.get("customer").as_object().cloned().unwrap();
    let second_customer = second.get("customer").as_object().cloned().unwrap();
    assert!(!first_customer.ptr_eq(&second_customer));

    let first_headings = watch(&first, "heading");
    let second_headings = watch(&second, "heading");
    first_customer.set("name", "grace").unwrap();
    assert_eq!(*first_headings.borrow(), vec![Value::from("grace: 0")]);
    assert!(second_headings.borrow().is_empty());
    assert_eq!(second.get("heading"), Value::from("ada: 0"));
}

#[test]
fn scope_owns_component_bindings() {
    let doc = invoice().instantiate().unwrap();
    let view = Object::from_entries([("title", "")]);
    let mut scope = SubscriptionScope::new();
    scope
        .observe(
            &doc,
            "heading",
            {
                let view = view.downgrade();
                surface_reactive::TryListener(move |v: &Value| match view.upgrade() {
                    Some(view) => view.set("title", v.clone()),
                    None => Ok(()),
                })
            },
            ObserveOptions::new(),
        )
        .unwrap();
    assert_eq!(view.get("title"), Value::from("ada: 0"));

    doc.set("_total", 3).unwrap();
    assert_eq!(view.get("title"), Value::from("ada: 3"));

    scope.dispose().unwrap();
    doc.set("_total", 4).unwrap();
    assert_eq!(view.get("title"), Value::from("ada: 3"));
}

#[test]
fn invalid_dependency_path_fails_build() {
    let err = Schema::builder("Broken")
        .computed("x", ["a["], |_| Value::Null)
        .build()
        .unwrap_err();
    assert!(matches!(err, ReactiveError::InvalidPath { .. }));
}
