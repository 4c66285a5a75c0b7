use crate::field_value::FieldValue;
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Computes a group of entry fields in one go
///
/// A resolver is bound to several fields of an entry with
/// [`Entry::add_lazy_fields`]. The first read of any of those fields calls
/// [`LazyResolver::resolve`] once; the resolver writes whatever it found with
/// [`Entry::set`]. Fields it did not write read as absent afterwards.
#[async_trait]
pub trait LazyResolver: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Fill in the fields this resolver is responsible for
    ///
    /// Errors are logged and treated like a miss; they never reach the reader
    /// of the field.
    async fn resolve(&self, entry: &mut Entry) -> anyhow::Result<()>;
}

#[derive(Clone)]
enum Slot {
    Value(FieldValue),
    Lazy(usize),
    /// Bound to a unit that ran without writing it; reads as absent
    Resolved,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum UnitState {
    Pending,
    Running,
    Done,
}

#[derive(Clone)]
struct LazyUnit {
    resolver: Arc<dyn LazyResolver>,
    fields: Vec<String>,
    state: UnitState,
}

/// A record flowing through a task
///
/// Each field holds either a concrete value or a handle to a pending lazy
/// unit. Forcing a unit resolves all of its fields in place, after which they
/// are indistinguishable from eagerly set fields.
#[derive(Clone, Default)]
pub struct Entry {
    fields: BTreeMap<String, Slot>,
    units: Vec<LazyUnit>,
}

impl Entry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(title: impl Into<String>) -> Self {
        let mut entry = Self::new();
        entry.set("title", title.into());
        entry
    }

    /// Set a field, replacing any value or pending lazy binding
    pub fn set(&mut self, field: &str, value: impl Into<FieldValue>) {
        self.fields.insert(field.to_string(), Slot::Value(value.into()));
    }

    /// Set a field only when a value is present
    pub fn set_opt<V: Into<FieldValue>>(&mut self, field: &str, value: Option<V>) {
        if let Some(value) = value {
            self.set(field, value);
        }
    }

    pub fn remove(&mut self, field: &str) -> Option<FieldValue> {
        match self.fields.remove(field)? {
            Slot::Value(value) => Some(value),
            Slot::Lazy(_) | Slot::Resolved => None,
        }
    }

    /// Read a field without triggering lazy resolution
    pub fn get_eager(&self, field: &str) -> Option<&FieldValue> {
        match self.fields.get(field)? {
            Slot::Value(value) => Some(value),
            Slot::Lazy(_) | Slot::Resolved => None,
        }
    }

    /// Eager text field, treating empty text as missing
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get_eager(field)
            .and_then(FieldValue::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn title(&self) -> Option<&str> {
        self.get_str("title")
    }

    /// True if the field holds a value or a pending lazy binding
    pub fn contains(&self, field: &str) -> bool {
        matches!(self.fields.get(field), Some(Slot::Value(_) | Slot::Lazy(_)))
    }

    pub fn is_lazy(&self, field: &str) -> bool {
        matches!(self.fields.get(field), Some(Slot::Lazy(_)))
    }

    /// Names of all fields, lazy ones included
    pub fn field_names(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|(_, slot)| !matches!(slot, Slot::Resolved))
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Concrete values only, in field name order
    pub fn eager_fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().filter_map(|(name, slot)| match slot {
            Slot::Value(value) => Some((name.as_str(), value)),
            Slot::Lazy(_) | Slot::Resolved => None,
        })
    }

    /// Bind fields to a resolver without calling it
    ///
    /// Only fields that are not already present are bound: an eager value is
    /// never shadowed and the first resolver registered for a field wins, even
    /// after that resolver has run and left the field empty.
    /// Returns the number of fields bound by this call.
    pub fn add_lazy_fields(&mut self, resolver: Arc<dyn LazyResolver>, fields: &[&str]) -> usize {
        let unbound: Vec<String> = fields
            .iter()
            .filter(|f| !self.fields.contains_key(**f))
            .map(|f| f.to_string())
            .collect();
        if unbound.is_empty() {
            return 0;
        }

        let unit = self.units.len();
        for field in &unbound {
            self.fields.insert(field.clone(), Slot::Lazy(unit));
        }
        let bound = unbound.len();
        self.units.push(LazyUnit {
            resolver,
            fields: unbound,
            state: UnitState::Pending,
        });
        bound
    }

    /// Read a field, resolving its lazy unit first when needed
    pub fn get<'a>(&'a mut self, field: &'a str) -> BoxFuture<'a, Option<FieldValue>> {
        async move {
            let unit = match self.fields.get(field)? {
                Slot::Value(value) => return Some(value.clone()),
                Slot::Lazy(unit) => *unit,
                Slot::Resolved => return None,
            };
            self.force(unit).await;
            self.get_eager(field).cloned()
        }
        .boxed()
    }

    /// Force every pending lazy unit
    pub async fn resolve_all(&mut self) {
        for unit in 0..self.units.len() {
            self.force(unit).await;
        }
    }

    fn force(&mut self, unit: usize) -> BoxFuture<'_, ()> {
        async move {
            let resolver = {
                let pending = &mut self.units[unit];
                // A unit reading its own fields while running sees them as absent.
                if pending.state != UnitState::Pending {
                    return;
                }
                pending.state = UnitState::Running;
                pending.resolver.clone()
            };

            debug!(resolver = resolver.name(), title = ?self.title(), "Resolving lazy fields");
            if let Err(e) = resolver.resolve(self).await {
                warn!(resolver = resolver.name(), title = ?self.title(), "Lazy lookup failed: {:#}", e);
            }

            let done = &mut self.units[unit];
            done.state = UnitState::Done;
            let fields = done.fields.clone();
            for field in fields {
                if matches!(self.fields.get(&field), Some(Slot::Lazy(id)) if *id == unit) {
                    self.fields.insert(field, Slot::Resolved);
                }
            }
        }
        .boxed()
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (name, slot) in &self.fields {
            match slot {
                Slot::Value(value) => map.entry(name, value),
                Slot::Lazy(_) => map.entry(name, &"<lazy>"),
                Slot::Resolved => continue,
            };
        }
        map.finish()
    }
}

impl Serialize for Entry {
    /// Serializes concrete values; unresolved lazy fields are left out
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let values: Vec<(&str, &FieldValue)> = self.eager_fields().collect();
        let mut map = serializer.serialize_map(Some(values.len()))?;
        for (name, value) in values {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
