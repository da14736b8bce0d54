use super::{coerce, unknown, widget_get, widget_property_kind, widget_set, Helper, PropertyError};
use crate::events::EventMask;
use crate::toolkit::{Listeners, Peer};
use crate::value::{Value, ValueKind};

/// Labels, fields and text areas.
#[derive(Debug, Default)]
pub struct TextHelper;

impl Helper for TextHelper {
    fn family(&self) -> &'static str {
        "text"
    }

    fn property_kind(&self, property: &str) -> Option<ValueKind> {
        match property {
            "Text" => Some(ValueKind::Text),
            "Editable" => Some(ValueKind::Bool),
            _ => widget_property_kind(property),
        }
    }

    fn get(&self, peer: &dyn Peer, property: &str) -> Option<Value> {
        match (property, peer.as_text()) {
            ("Text", Some(text)) => Some(Value::text(text.text())),
            ("Editable", Some(text)) => Some(Value::Bool(text.is_editable())),
            _ => widget_get(peer.widget(), property),
        }
    }

    fn set(&self, peer: &mut dyn Peer, property: &str, value: Value) -> Result<(), PropertyError> {
        let family = self.family();
        match property {
            "Text" => {
                let value = coerce(property, value, ValueKind::Text)?;
                let text = peer.as_text_mut().ok_or_else(|| unknown(family, property))?;
                text.set_text(value.into_string());
            }
            "Editable" => {
                let value = coerce(property, value, ValueKind::Bool)?;
                let text = peer.as_text_mut().ok_or_else(|| unknown(family, property))?;
                text.set_editable(value.as_bool() == Some(true));
            }
            _ => widget_set(family, peer.widget_mut(), property, value)?,
        }
        Ok(())
    }

    fn value_property(&self) -> Option<&'static str> {
        Some("Text")
    }

    fn listeners_for(&self, category: EventMask) -> Listeners {
        // text commits on focus loss or enter
        if category == EventMask::VALUE_CHANGE {
            Listeners::FOCUS | Listeners::ACTION
        } else {
            super::default_listeners(category)
        }
    }
}

/// Push buttons.
#[derive(Debug, Default)]
pub struct ButtonHelper;

impl Helper for ButtonHelper {
    fn family(&self) -> &'static str {
        "button"
    }

    fn property_kind(&self, property: &str) -> Option<ValueKind> {
        match property {
            "Text" => Some(ValueKind::Text),
            _ => widget_property_kind(property),
        }
    }

    fn get(&self, peer: &dyn Peer, property: &str) -> Option<Value> {
        match (property, peer.as_text()) {
            ("Text", Some(text)) => Some(Value::text(text.text())),
            _ => widget_get(peer.widget(), property),
        }
    }

    fn set(&self, peer: &mut dyn Peer, property: &str, value: Value) -> Result<(), PropertyError> {
        let family = self.family();
        if property == "Text" {
            let value = coerce(property, value, ValueKind::Text)?;
            let text = peer.as_text_mut().ok_or_else(|| unknown(family, property))?;
            text.set_text(value.into_string());
            Ok(())
        } else {
            widget_set(family, peer.widget_mut(), property, value)
        }
    }

    fn value_property(&self) -> Option<&'static str> {
        Some("Text")
    }

    fn listeners_for(&self, category: EventMask) -> Listeners {
        if category == EventMask::VALUE_CHANGE {
            Listeners::ACTION
        } else {
            super::default_listeners(category)
        }
    }
}

/// Toggle buttons, check boxes and radio buttons.
#[derive(Debug, Default)]
pub struct ToggleHelper;

impl Helper for ToggleHelper {
    fn family(&self) -> &'static str {
        "toggle"
    }

    fn property_kind(&self, property: &str) -> Option<ValueKind> {
        match property {
            "Selected" => Some(ValueKind::Bool),
            _ => ButtonHelper.property_kind(property),
        }
    }

    fn get(&self, peer: &dyn Peer, property: &str) -> Option<Value> {
        match (property, peer.as_toggle()) {
            ("Selected", Some(toggle)) => Some(Value::Bool(toggle.is_selected())),
            _ => ButtonHelper.get(peer, property),
        }
    }

    fn set(&self, peer: &mut dyn Peer, property: &str, value: Value) -> Result<(), PropertyError> {
        if property == "Selected" {
            let value = coerce(property, value, ValueKind::Bool)?;
            let family = self.family();
            let toggle = peer.as_toggle_mut().ok_or_else(|| unknown(family, property))?;
            toggle.set_selected(value.as_bool() == Some(true));
            Ok(())
        } else {
            ButtonHelper.set(peer, property, value)
        }
    }

    fn value_property(&self) -> Option<&'static str> {
        Some("Selected")
    }

    fn listeners_for(&self, category: EventMask) -> Listeners {
        if category == EventMask::VALUE_CHANGE {
            Listeners::ITEM
        } else {
            super::default_listeners(category)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolkit::{Button, TextField, CHECK_BOX, TEXT_FIELD};

    #[test]
    fn test_text_properties() {
        let mut field = TextField::new(&TEXT_FIELD);
        TextHelper.set(&mut field, "Text", Value::Int(12)).unwrap();
        TextHelper.set(&mut field, "Editable", Value::text("false")).unwrap();
        assert_eq!(field.text, "12");
        assert!(!field.editable);
        assert_eq!(TextHelper.get(&field, "Enabled"), Some(Value::Bool(true)));
        assert_eq!(TextHelper.remap("Value", &[]), "Text");
        assert_eq!(TextHelper.remap("Tooltip", &[]), "Tooltip");
    }

    #[test]
    fn test_toggle_inherits_button_properties() {
        let mut check = Button::new(&CHECK_BOX);
        ToggleHelper.set(&mut check, "Text", Value::text("Bold")).unwrap();
        ToggleHelper.set(&mut check, "Selected", Value::Bool(true)).unwrap();
        assert_eq!(ToggleHelper.get(&check, "Text"), Some(Value::text("Bold")));
        assert_eq!(ToggleHelper.get(&check, "Selected"), Some(Value::Bool(true)));
        assert!(ToggleHelper.set(&mut check, "Selected", Value::text("maybe")).is_err());
        assert_eq!(ToggleHelper.listeners_for(EventMask::VALUE_CHANGE), Listeners::ITEM);
    }
}
