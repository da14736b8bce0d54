//! Helpers: the uniform capability contract over peer families.
//!
//! A helper is stateless and shared by every peer of its family (and by subclasses without a more
//! specific helper). Per-peer state lives in the peer's [`PeerExt`](crate::peer_tree::PeerExt).

use crate::binding::Binding;
use crate::descriptor::{self, Attributes};
use crate::events::EventMask;
use crate::peer_tree::{PeerId, PeerTree};
use crate::resource::Resources;
use crate::toolkit::{Listeners, Peer, Widget};
use crate::value::{CoerceError, Value, ValueKind};
use core::fmt;
use std::sync::Arc;
use tracing::warn;

mod choice;
mod container;
mod range;
mod text;

pub use choice::{ChoiceHelper, TabbedHelper};
pub use container::{ContainerHelper, TableHelper};
pub use range::RangeHelper;
pub use text::{ButtonHelper, TextHelper, ToggleHelper};

/// The canonical binding key that helpers remap onto their family's value property.
pub const VALUE_KEY: &str = "Value";

/// Accepted values of the `Align` property.
pub const ALIGNMENTS: &[&str] = &["left", "center", "right", "leading", "trailing"];

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PropertyError {
    #[error("{family} has no property {property:?}")]
    Unknown {
        family: &'static str,
        property: String,
    },
    #[error("property {property:?} expects {expected:?}: {source}")]
    Type {
        property: String,
        expected: ValueKind,
        #[source]
        source: CoerceError,
    },
    #[error("{value:?} is not a valid {property:?}")]
    Invalid { property: String, value: String },
    #[error("property {property:?} is read-only")]
    ReadOnly { property: String },
    #[error("{family} cannot hold a {child}")]
    Child {
        family: &'static str,
        child: &'static str,
    },
}

/// The uniform contract over a peer family.
pub trait Helper: fmt::Debug {
    /// A short name for the family, used in diagnostics.
    fn family(&self) -> &'static str;

    /// The kind of a property, or `None` if the family doesn’t have it.
    fn property_kind(&self, property: &str) -> Option<ValueKind> {
        widget_property_kind(property)
    }

    /// Reads a property.
    fn get(&self, peer: &dyn Peer, property: &str) -> Option<Value> {
        widget_get(peer.widget(), property)
    }

    /// Writes a property, coercing the value to the property’s kind.
    fn set(&self, peer: &mut dyn Peer, property: &str, value: Value) -> Result<(), PropertyError> {
        widget_set(self.family(), peer.widget_mut(), property, value)
    }

    /// The property holding the peer’s primary value, if the family has one.
    fn value_property(&self) -> Option<&'static str> {
        None
    }

    /// Whether a binding on `property` should be committed when the peer’s value changes.
    fn is_value_property(&self, property: &str) -> bool {
        self.value_property() == Some(property)
    }

    /// Maps a binding key onto the concrete property name for this family.
    ///
    /// `bindings` are the bindings already registered on the peer.
    fn remap(&self, key: &str, bindings: &[Binding]) -> String {
        let _ = bindings;
        match self.value_property() {
            Some(property) if key == VALUE_KEY => property.to_string(),
            _ => key.to_string(),
        }
    }

    /// Applies declared attributes. Absent attributes leave the peer’s defaults alone.
    fn configure(&self, peer: &mut dyn Peer, attrs: &Attributes, resources: &mut Resources) {
        configure_attributes(self, peer, attrs, resources)
    }

    /// Family-specific part of attaching `child` at `index`; the peer tree keeps the child list.
    ///
    /// Families that aren’t containers refuse all children.
    fn attach_child(&self, parent: &mut dyn Peer, child: &dyn Peer, index: usize) -> Result<(), PropertyError> {
        let _ = (parent, index);
        Err(PropertyError::Child {
            family: self.family(),
            child: child.class().name,
        })
    }

    /// Undoes [`attach_child`](Helper::attach_child) for the child at `index`.
    fn detach_child(&self, parent: &mut dyn Peer, index: usize) {
        let _ = (parent, index);
    }

    /// Enumerates the peer’s children.
    fn children(&self, tree: &PeerTree, id: PeerId) -> Vec<PeerId> {
        tree.children(id).to_vec()
    }

    /// The native listeners needed to observe an event category on this family.
    fn listeners_for(&self, category: EventMask) -> Listeners {
        default_listeners(category)
    }
}

/// Returns a new range helper; declared on the spinner class.
pub fn range_helper() -> Arc<dyn Helper> {
    Arc::new(RangeHelper)
}

/// Listener requirements that hold for most families.
pub fn default_listeners(category: EventMask) -> Listeners {
    let mut listeners = Listeners::empty();
    for (c, l) in &[
        (EventMask::ACTION, Listeners::ACTION),
        (EventMask::POINTER, Listeners::MOUSE),
        (EventMask::POINTER_MOTION, Listeners::MOUSE_MOTION),
        (EventMask::KEY, Listeners::KEY),
        (EventMask::FOCUS, Listeners::FOCUS),
        (EventMask::SELECTION, Listeners::ITEM),
        (EventMask::VALUE_CHANGE, Listeners::CHANGE | Listeners::FOCUS),
        (EventMask::DRAG_SOURCE, Listeners::DRAG_GESTURE),
        (EventMask::DROP_TARGET, Listeners::DROP_TARGET),
    ] {
        if category.contains(*c) {
            listeners |= *l;
        }
    }
    listeners
}

/// Coerces a value for a property, mapping failures to a [`PropertyError`].
pub(crate) fn coerce(property: &str, value: Value, kind: ValueKind) -> Result<Value, PropertyError> {
    value.coerce(kind).map_err(|source| PropertyError::Type {
        property: property.to_string(),
        expected: kind,
        source,
    })
}

pub(crate) fn unknown(family: &'static str, property: &str) -> PropertyError {
    PropertyError::Unknown {
        family,
        property: property.to_string(),
    }
}

pub(crate) fn widget_property_kind(property: &str) -> Option<ValueKind> {
    Some(match property {
        "Enabled" | "Visible" => ValueKind::Bool,
        "Tooltip" | "Title" => ValueKind::Text,
        "Background" | "Foreground" => ValueKind::Color,
        "Opacity" => ValueKind::Float,
        "Margin" => ValueKind::Int,
        "Align" => ValueKind::Enum,
        _ => return None,
    })
}

pub(crate) fn widget_get(widget: &Widget, property: &str) -> Option<Value> {
    match property {
        "Enabled" => Some(Value::Bool(widget.enabled)),
        "Visible" => Some(Value::Bool(widget.visible)),
        "Tooltip" => widget.tooltip.clone().map(Value::Text),
        "Title" => widget.title.clone().map(Value::Text),
        "Background" => widget.background.map(Value::Color),
        "Foreground" => widget.foreground.map(Value::Color),
        "Opacity" => Some(Value::Float(widget.opacity)),
        "Margin" => Some(Value::Int(widget.margin)),
        "Align" => widget.align.clone().map(Value::Enum),
        _ => None,
    }
}

pub(crate) fn widget_set(
    family: &'static str,
    widget: &mut Widget,
    property: &str,
    value: Value,
) -> Result<(), PropertyError> {
    let kind = widget_property_kind(property).ok_or_else(|| unknown(family, property))?;
    match (property, coerce(property, value, kind)?) {
        ("Enabled", Value::Bool(b)) => widget.enabled = b,
        ("Visible", Value::Bool(b)) => widget.visible = b,
        ("Tooltip", Value::Text(s)) => widget.tooltip = Some(s),
        ("Title", Value::Text(s)) => widget.title = Some(s),
        ("Background", Value::Color(c)) => widget.background = Some(c),
        ("Foreground", Value::Color(c)) => widget.foreground = Some(c),
        ("Opacity", Value::Float(x)) => widget.opacity = x.max(0.).min(1.),
        ("Margin", Value::Int(i)) => widget.margin = i,
        ("Align", Value::Enum(s)) => {
            if !ALIGNMENTS.contains(&s.as_str()) {
                return Err(PropertyError::Invalid {
                    property: property.to_string(),
                    value: s,
                });
            }
            widget.align = Some(s);
        }
        (_, value) => {
            return Err(PropertyError::Invalid {
                property: property.to_string(),
                value: value.to_string(),
            })
        }
    }
    Ok(())
}

/// The default attribute application shared by all helpers.
pub fn configure_attributes<H: Helper + ?Sized>(
    helper: &H,
    peer: &mut dyn Peer,
    attrs: &Attributes,
    resources: &mut Resources,
) {
    let mut bounds = peer.widget().bounds;
    for (name, value) in attrs.iter() {
        match name {
            "x" | "y" | "width" | "height" => {
                if let Some(v) = value.as_int() {
                    let v = v as f64;
                    match name {
                        "x" => bounds.origin.x = v,
                        "y" => bounds.origin.y = v,
                        "width" => bounds.size.x = v,
                        _ => bounds.size.y = v,
                    }
                }
            }
            "image" => {
                if let Some(image_name) = value.as_str() {
                    match resources.image(peer.class(), image_name) {
                        Ok(image) => peer.widget_mut().icon = Some(image),
                        Err(err) => warn!(class = peer.class().name, %err, "skipping image attribute"),
                    }
                }
            }
            _ => {
                if let Some(property) = descriptor::attr_property(name) {
                    if let Err(err) = helper.set(peer, property, value.clone()) {
                        warn!(
                            family = helper.family(),
                            attribute = name,
                            %err,
                            "skipping attribute"
                        );
                    }
                }
            }
        }
    }
    peer.widget_mut().bounds = bounds;
}

/// The helper for plain components.
#[derive(Debug, Default)]
pub struct WidgetHelper;

impl Helper for WidgetHelper {
    fn family(&self) -> &'static str {
        "component"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::MemoryResources;
    use crate::toolkit::{Label, Panel};

    #[test]
    fn test_widget_properties() {
        let helper = WidgetHelper;
        let mut panel = Panel::default();
        helper.set(&mut panel, "Enabled", Value::text("false")).unwrap();
        assert_eq!(helper.get(&panel, "Enabled"), Some(Value::Bool(false)));
        assert_eq!(helper.get(&panel, "Tooltip"), None);

        match helper.set(&mut panel, "Text", Value::text("x")) {
            Err(PropertyError::Unknown { family, .. }) => assert_eq!(family, "component"),
            other => panic!("expected Unknown, got {:?}", other),
        }
        match helper.set(&mut panel, "Align", Value::Enum("upwards".into())) {
            Err(PropertyError::Invalid { .. }) => (),
            other => panic!("expected Invalid, got {:?}", other),
        }
    }

    #[test]
    fn test_configure_skips_missing_image() {
        let mut attrs = Attributes::new();
        attrs.set("x", Value::Int(4));
        attrs.set("width", Value::Int(40));
        attrs.set("image", Value::text("missing.png"));
        attrs.set("text", Value::text("hello"));
        attrs.set("tooltip", Value::text("tip"));

        let mut resources = Resources::new(Box::new(MemoryResources::new()));
        let mut label = Label::default();
        label.widget.bounds.size.y = 12.;
        TextHelper.configure(&mut label, &attrs, &mut resources);

        assert_eq!(label.text, "hello");
        assert_eq!(label.widget.tooltip.as_ref().map(String::as_str), Some("tip"));
        assert!(label.widget.icon.is_none());
        assert_eq!(label.widget.bounds.origin.x, 4.);
        assert_eq!(label.widget.bounds.size.x, 40.);
        assert_eq!(label.widget.bounds.size.y, 12., "undeclared height keeps its default");
    }
}
