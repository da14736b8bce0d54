//! Bindings between peer properties and keys of an external model.

use crate::peer_tree::{PeerError, PeerId, PeerTree};
use crate::value::{CoerceError, Value, ValueKind};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

/// How a peer value is converted before it is written to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conversion {
    /// Keep the kind the model already holds for the key, if any.
    None,
    Text,
    Integer,
    Boolean,
    /// One of a closed set of strings.
    Enumeration(Vec<String>),
}

impl Conversion {
    /// Parses the markup form (`text`, `integer`, `boolean`, `enum:a|b|c`).
    pub fn parse(markup: &str) -> Option<Conversion> {
        Some(match markup {
            "" => Conversion::None,
            "text" => Conversion::Text,
            "integer" => Conversion::Integer,
            "boolean" => Conversion::Boolean,
            _ => {
                let values = markup.strip_prefix("enum:")?;
                Conversion::Enumeration(values.split('|').map(str::to_string).collect())
            }
        })
    }

    /// The markup form, or `None` for [`Conversion::None`].
    pub fn to_markup(&self) -> Option<String> {
        match self {
            Conversion::None => None,
            Conversion::Text => Some("text".into()),
            Conversion::Integer => Some("integer".into()),
            Conversion::Boolean => Some("boolean".into()),
            Conversion::Enumeration(values) => Some(format!("enum:{}", values.join("|"))),
        }
    }

    /// Converts a peer value for the model. `existing` is the model’s current value for the key.
    pub fn apply(&self, value: Value, existing: Option<&Value>) -> Result<Value, ConversionError> {
        let kind = match self {
            Conversion::None => match existing {
                Some(existing) => existing.kind(),
                None => return Ok(value),
            },
            Conversion::Text => ValueKind::Text,
            Conversion::Integer => ValueKind::Int,
            Conversion::Boolean => ValueKind::Bool,
            Conversion::Enumeration(values) => {
                let s = value.into_string();
                if values.contains(&s) {
                    return Ok(Value::Enum(s));
                }
                return Err(ConversionError::NotInEnumeration {
                    value: s,
                    allowed: values.clone(),
                });
            }
        };
        Ok(value.coerce(kind)?)
    }
}

impl Default for Conversion {
    fn default() -> Conversion {
        Conversion::None
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConversionError {
    #[error(transparent)]
    Coerce(#[from] CoerceError),
    #[error("{value:?} is not one of {allowed:?}")]
    NotInEnumeration { value: String, allowed: Vec<String> },
}

/// Associates a peer property with a model key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    property: String,
    key: String,
    conversion: Conversion,
}

impl Binding {
    pub fn new(property: impl Into<String>, key: impl Into<String>, conversion: Conversion) -> Binding {
        Binding {
            property: property.into(),
            key: key.into(),
            conversion,
        }
    }

    pub fn property(&self) -> &str {
        &self.property
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn conversion(&self) -> &Conversion {
        &self.conversion
    }

    /// The same binding on another property.
    pub fn with_property(&self, property: impl Into<String>) -> Binding {
        Binding {
            property: property.into(),
            key: self.key.clone(),
            conversion: self.conversion.clone(),
        }
    }
}

/// The external model bindings read from and write to.
pub trait Model {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&mut self, key: &str, value: Value);
}

/// A flat key-value model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapModel {
    values: HashMap<String, Value>,
}

impl MapModel {
    pub fn new() -> MapModel {
        MapModel::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> MapModel {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Model for MapModel {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) {
        self.values.insert(key.to_string(), value);
    }
}

/// A [`MapModel`] that can be shared with other threads.
#[derive(Debug, Clone, Default)]
pub struct SharedModel(Arc<Mutex<MapModel>>);

impl SharedModel {
    pub fn new(model: MapModel) -> SharedModel {
        SharedModel(Arc::new(Mutex::new(model)))
    }

    /// A copy of the current values.
    pub fn snapshot(&self) -> MapModel {
        self.0.lock().clone()
    }
}

impl Model for SharedModel {
    fn get(&self, key: &str) -> Option<Value> {
        self.0.lock().get(key)
    }

    fn set(&mut self, key: &str, value: Value) {
        self.0.lock().set(key, value);
    }
}

/// Errors from pushing or pulling a binding.
#[derive(Debug, thiserror::Error)]
pub enum BindError {
    #[error(transparent)]
    Peer(#[from] PeerError),
    #[error("{property:?} has no readable value")]
    Unreadable { property: String },
    #[error("cannot commit {key:?}: {source}")]
    Conversion {
        key: String,
        #[source]
        source: ConversionError,
    },
}

impl PeerTree {
    /// Registers a binding on a peer, remapping its property through the helper.
    ///
    /// Replaces any binding on the same property. Returns the binding as registered.
    pub fn add_binding(&mut self, id: PeerId, binding: &Binding) -> Result<Binding, PeerError> {
        let ext = self.ext_mut(id).ok_or(PeerError::NoSuchPeer(id))?;
        let property = ext.helper.remap(binding.property(), &ext.bindings);
        let binding = binding.with_property(property);
        ext.bindings.retain(|b| b.property() != binding.property());
        ext.bindings.push(binding.clone());
        Ok(binding)
    }

    /// Bindings registered on a peer.
    pub fn bindings(&self, id: PeerId) -> &[Binding] {
        self.ext(id).map_or(&[], |ext| &ext.bindings)
    }

    /// Writes the model’s value for the binding’s key into the peer.
    ///
    /// A key the model doesn’t have leaves the peer alone.
    pub fn push(&mut self, id: PeerId, binding: &Binding, model: &dyn Model) -> Result<(), BindError> {
        let value = match model.get(binding.key()) {
            Some(value) => value,
            None => {
                trace!(key = binding.key(), "push: key not in model");
                return Ok(());
            }
        };
        self.set_property(id, binding.property(), value)?;
        let (peer, ext) = self.split_mut(id)?;
        if let Some(adapter) = ext.adapter.as_mut() {
            adapter.take_snapshot(&*ext.helper, peer);
        }
        Ok(())
    }

    /// Pushes every binding of a peer.
    pub fn push_all(&mut self, id: PeerId, model: &dyn Model) -> Result<(), BindError> {
        for binding in self.bindings(id).to_vec() {
            self.push(id, &binding, model)?;
        }
        Ok(())
    }

    /// The peer’s value for the binding’s property, converted for the model.
    pub fn pulled_value(&self, id: PeerId, binding: &Binding, model: &dyn Model) -> Result<Value, BindError> {
        if !self.contains(id) {
            return Err(PeerError::NoSuchPeer(id).into());
        }
        let value = self
            .property(id, binding.property())
            .ok_or_else(|| BindError::Unreadable {
                property: binding.property().to_string(),
            })?;
        let existing = model.get(binding.key());
        binding
            .conversion()
            .apply(value, existing.as_ref())
            .map_err(|source| BindError::Conversion {
                key: binding.key().to_string(),
                source,
            })
    }

    /// Writes the peer’s value for the binding’s property to the model.
    pub fn pull(&self, id: PeerId, binding: &Binding, model: &mut dyn Model) -> Result<(), BindError> {
        let value = self.pulled_value(id, binding, &*model)?;
        trace!(key = binding.key(), %value, "pulled binding");
        model.set(binding.key(), value);
        Ok(())
    }
}
