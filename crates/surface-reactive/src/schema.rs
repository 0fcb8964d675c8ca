#![forbid(unsafe_code)]

//! Declarative reactive types.
//!
//! A [`Schema`] describes, once per type, the fields and accessors of its
//! instances plus two kinds of derived notifications:
//!
//! - **computed** properties: accessors whose value depends on other paths of
//!   the instance. A change anywhere along a dependency path notifies the
//!   computed property.
//! - **notify** declarations: a change of one property also notifies a list of
//!   other properties.
//!
//! [`Schema::instantiate`] creates an instance and materialises both. The
//! subscriptions created for it are owned by the instance's metadata and are
//! released by `Reactive::dispose`.
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use surface_reactive::{ObserveOptions, Reactive, Schema, Value};
//!
//! let person = Schema::builder("Person")
//!     .field("first", "Ada")
//!     .field("last", "Lovelace")
//!     .computed("full", ["first", "last"], |p| {
//!         let first = p.get("first");
//!         let last = p.get("last");
//!         Value::from(format!(
//!             "{} {}",
//!             first.as_str().unwrap_or_default(),
//!             last.as_str().unwrap_or_default()
//!         ))
//!     })
//!     .build()?;
//!
//! let ada = person.instantiate()?;
//! let renders = Rc::new(Cell::new(0));
//! let r = Rc::clone(&renders);
//! Reactive::observe_with(&ada, "full", move |_: &Value| r.set(r.get() + 1), ObserveOptions::new().lazy())?;
//!
//! ada.set("last", "King")?;
//! assert_eq!(ada.get("full"), Value::from("Ada King"));
//! assert_eq!(renders.get(), 1);
//! # Ok::<(), surface_reactive::ReactiveError>(())
//! ```

use std::fmt;
use std::rc::Rc;

use crate::error::{ReactiveError, Result};
use crate::key::{IntoKeyPath, KeyPath, PropertyKey};
use crate::listener::TryListener;
use crate::metadata::Metadata;
use crate::reactive::{ObserveOptions, Reactive};
use crate::value::{Accessor, Object, Value, WeakObject};

#[derive(Clone)]
struct Computed {
    key: PropertyKey,
    dependencies: Vec<KeyPath>,
    accessor: Accessor,
}

#[derive(Clone)]
struct Notify {
    source: PropertyKey,
    targets: Vec<PropertyKey>,
}

/// Blueprint of a reactive type. Cheap to clone.
#[derive(Clone)]
pub struct Schema {
    inner: Rc<SchemaInner>,
}

struct SchemaInner {
    name: Rc<str>,
    fields: Vec<(PropertyKey, Value)>,
    accessors: Vec<(PropertyKey, Accessor)>,
    computed: Vec<Computed>,
    notify: Vec<Notify>,
    declared: Vec<PropertyKey>,
}

impl Schema {
    /// Start describing a type called `name`.
    #[must_use]
    pub fn builder(name: impl AsRef<str>) -> SchemaBuilder {
        SchemaBuilder {
            inner: SchemaInner {
                name: Rc::from(name.as_ref()),
                fields: Vec::new(),
                accessors: Vec::new(),
                computed: Vec::new(),
                notify: Vec::new(),
                declared: Vec::new(),
            },
            error: None,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Computed properties with their dependency paths, in declaration order.
    #[must_use]
    pub fn computed(&self) -> Vec<(PropertyKey, Vec<KeyPath>)> {
        self.inner
            .computed
            .iter()
            .map(|c| (c.key.clone(), c.dependencies.clone()))
            .collect()
    }

    /// Create an instance with every field and accessor set, then materialise
    /// its computed and notify declarations. Object-valued fields are copied
    /// per instance.
    pub fn instantiate(&self) -> Result<Object> {
        let instance = Object::with_class(&*self.inner.name);
        for (key, value) in &self.inner.fields {
            let value = match value {
                Value::Object(object) => Value::Object(object.deep_copy()),
                other => other.clone(),
            };
            instance.set(key.clone(), value)?;
        }
        for (key, accessor) in &self.inner.accessors {
            instance.define_accessor(key.clone(), accessor.clone())?;
        }
        for computed in &self.inner.computed {
            instance.define_accessor(computed.key.clone(), computed.accessor.clone())?;
        }
        for key in &self.inner.declared {
            instance.declare(key.clone());
        }
        self.materialize(&instance)?;
        Ok(instance)
    }

    /// Wire computed and notify declarations on an existing `instance`.
    ///
    /// Computed dependencies are observed lazily and loosely, so they may
    /// point at data that does not exist yet. Notify sources are observed
    /// lazily and strictly.
    pub fn materialize(&self, instance: &Object) -> Result<()> {
        let metadata = Metadata::ensure(instance);

        for computed in &self.inner.computed {
            metadata.declare_computed(computed.key.clone(), computed.dependencies.clone());
            for path in &computed.dependencies {
                let observation = Reactive::observe_with(
                    instance,
                    path,
                    notify_on(instance.downgrade(), vec![computed.key.clone()]),
                    ObserveOptions::new().lazy().loose(),
                )?;
                if let Some(subscription) = observation.subscription {
                    metadata.add_disposable(subscription);
                }
            }
        }

        for notify in &self.inner.notify {
            let observation = Reactive::observe_with(
                instance,
                notify.source.clone(),
                notify_on(instance.downgrade(), notify.targets.clone()),
                ObserveOptions::new().lazy().strict(),
            )?;
            if let Some(subscription) = observation.subscription {
                metadata.add_disposable(subscription);
            }
        }
        Ok(())
    }
}

/// Listener that re-announces `keys` on `instance` without keeping it alive.
fn notify_on(
    instance: WeakObject,
    keys: Vec<PropertyKey>,
) -> TryListener<impl Fn(&Value) -> Result<()>> {
    TryListener(move |_: &Value| {
        let Some(instance) = instance.upgrade() else {
            return Ok(());
        };
        for key in &keys {
            Reactive::notify(&instance, key)?;
        }
        Ok(())
    })
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("name", &self.inner.name)
            .field(
                "fields",
                &self.inner.fields.iter().map(|(k, _)| k).collect::<Vec<_>>(),
            )
            .field(
                "computed",
                &self.inner.computed.iter().map(|c| &c.key).collect::<Vec<_>>(),
            )
            .field("notify", &self.inner.notify.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder returned by [`Schema::builder`].
///
/// Path errors are deferred: the first one is reported by
/// [`build`](Self::build).
pub struct SchemaBuilder {
    inner: SchemaInner,
    error: Option<ReactiveError>,
}

impl SchemaBuilder {
    /// A data field with its initial value. Each instance receives its own
    /// deep copy of an object value.
    #[must_use]
    pub fn field(mut self, key: impl Into<PropertyKey>, value: impl Into<Value>) -> Self {
        self.inner.fields.push((key.into(), value.into()));
        self
    }

    /// An accessor property.
    #[must_use]
    pub fn accessor(mut self, key: impl Into<PropertyKey>, accessor: Accessor) -> Self {
        self.inner.accessors.push((key.into(), accessor));
        self
    }

    /// A read-only property computed by `getter`, re-announced whenever one of
    /// `dependencies` changes.
    #[must_use]
    pub fn computed<P: IntoKeyPath>(
        mut self,
        key: impl Into<PropertyKey>,
        dependencies: impl IntoIterator<Item = P>,
        getter: impl Fn(&Object) -> Value + 'static,
    ) -> Self {
        let mut paths = Vec::new();
        for dependency in dependencies {
            match dependency.into_key_path() {
                Ok(path) => paths.push(path),
                Err(err) => {
                    self.error.get_or_insert(err);
                }
            }
        }
        self.inner.computed.push(Computed {
            key: key.into(),
            dependencies: paths,
            accessor: Accessor::getter(getter),
        });
        self
    }

    /// A change of `key` also notifies every key in `targets`.
    #[must_use]
    pub fn notify<K: Into<PropertyKey>>(
        mut self,
        key: impl Into<PropertyKey>,
        targets: impl IntoIterator<Item = K>,
    ) -> Self {
        self.inner.notify.push(Notify {
            source: key.into(),
            targets: targets.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Allow `key` to be observed before instances define it.
    #[must_use]
    pub fn declare(mut self, key: impl Into<PropertyKey>) -> Self {
        self.inner.declared.push(key.into());
        self
    }

    /// Finish the schema, reporting the first invalid dependency path.
    pub fn build(self) -> Result<Schema> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(Schema {
                inner: Rc::new(self.inner),
            }),
        }
    }
}

impl fmt::Debug for SchemaBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaBuilder")
            .field("name", &self.inner.name)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}
