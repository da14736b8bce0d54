use super::{coerce, unknown, widget_get, widget_property_kind, widget_set, Helper, PropertyError, VALUE_KEY};
use crate::binding::Binding;
use crate::events::EventMask;
use crate::toolkit::{Choice, Listeners, Peer};
use crate::value::{Value, ValueKind};

fn choice_kind(property: &str) -> Option<ValueKind> {
    match property {
        "SelectedIndex" => Some(ValueKind::Int),
        _ => widget_property_kind(property),
    }
}

fn choice_get(peer: &dyn Peer, property: &str) -> Option<Value> {
    match (property, peer.as_choice()) {
        ("SelectedIndex", Some(choice)) => Some(Value::Int(
            choice.selected_index().map_or(-1, |i| i as i64),
        )),
        _ => widget_get(peer.widget(), property),
    }
}

fn choice_mut<'a>(family: &'static str, peer: &'a mut dyn Peer, property: &str) -> Result<&'a mut dyn Choice, PropertyError> {
    peer.as_choice_mut().ok_or_else(|| unknown(family, property))
}

fn choice_set(family: &'static str, peer: &mut dyn Peer, property: &str, value: Value) -> Result<(), PropertyError> {
    if property == "SelectedIndex" {
        let index = coerce(property, value, ValueKind::Int)?.as_int().unwrap_or(-1);
        let choice = choice_mut(family, peer, property)?;
        choice.set_selected_index(if index < 0 { None } else { Some(index as usize) });
        Ok(())
    } else {
        widget_set(family, peer.widget_mut(), property, value)
    }
}

/// Combo boxes and lists. Item children become entries.
#[derive(Debug, Default)]
pub struct ChoiceHelper;

impl Helper for ChoiceHelper {
    fn family(&self) -> &'static str {
        "choice"
    }

    fn property_kind(&self, property: &str) -> Option<ValueKind> {
        match property {
            "Items" | "SelectedItem" => Some(ValueKind::Text),
            _ => choice_kind(property),
        }
    }

    fn get(&self, peer: &dyn Peer, property: &str) -> Option<Value> {
        match (property, peer.as_choice()) {
            ("Items", Some(choice)) => Some(Value::text(choice.items().join(","))),
            ("SelectedItem", Some(choice)) => choice.selected_item().map(Value::text),
            _ => choice_get(peer, property),
        }
    }

    fn set(&self, peer: &mut dyn Peer, property: &str, value: Value) -> Result<(), PropertyError> {
        let family = self.family();
        match property {
            "Items" => {
                let items = coerce(property, value, ValueKind::Text)?.into_string();
                let choice = choice_mut(family, peer, property)?;
                let selected = choice.selected_index();
                choice.clear_items();
                for (i, item) in items.split(',').map(str::trim).filter(|s| !s.is_empty()).enumerate() {
                    choice.insert_item(i, item.to_string());
                }
                choice.set_selected_index(selected);
            }
            "SelectedItem" => {
                let item = coerce(property, value, ValueKind::Text)?.into_string();
                let choice = choice_mut(family, peer, property)?;
                match choice.items().iter().position(|i| *i == item) {
                    Some(index) => choice.set_selected_index(Some(index)),
                    None => {
                        return Err(PropertyError::Invalid {
                            property: property.to_string(),
                            value: item,
                        })
                    }
                }
            }
            _ => choice_set(family, peer, property, value)?,
        }
        Ok(())
    }

    fn value_property(&self) -> Option<&'static str> {
        Some("SelectedIndex")
    }

    fn is_value_property(&self, property: &str) -> bool {
        property == "SelectedIndex" || property == "SelectedItem"
    }

    /// The canonical value of a choice is its selected item; a second value binding gets the
    /// selected index instead.
    fn remap(&self, key: &str, bindings: &[Binding]) -> String {
        if key != VALUE_KEY {
            return key.to_string();
        }
        if bindings.iter().any(|b| b.property() == "SelectedItem") {
            "SelectedIndex".to_string()
        } else {
            "SelectedItem".to_string()
        }
    }

    fn attach_child(&self, parent: &mut dyn Peer, child: &dyn Peer, index: usize) -> Result<(), PropertyError> {
        let refused = || PropertyError::Child {
            family: "choice",
            child: child.class().name,
        };
        let text = child.as_text().ok_or_else(refused)?.text().to_string();
        parent.as_choice_mut().ok_or_else(refused)?.insert_item(index, text);
        Ok(())
    }

    fn detach_child(&self, parent: &mut dyn Peer, index: usize) {
        if let Some(choice) = parent.as_choice_mut() {
            choice.remove_item(index);
        }
    }

    fn listeners_for(&self, category: EventMask) -> Listeners {
        if category == EventMask::VALUE_CHANGE {
            Listeners::ITEM
        } else {
            super::default_listeners(category)
        }
    }
}

/// Tabbed panes. Each child becomes a tab titled by its `Title`.
#[derive(Debug, Default)]
pub struct TabbedHelper;

impl Helper for TabbedHelper {
    fn family(&self) -> &'static str {
        "tabs"
    }

    fn property_kind(&self, property: &str) -> Option<ValueKind> {
        choice_kind(property)
    }

    fn get(&self, peer: &dyn Peer, property: &str) -> Option<Value> {
        choice_get(peer, property)
    }

    fn set(&self, peer: &mut dyn Peer, property: &str, value: Value) -> Result<(), PropertyError> {
        choice_set(self.family(), peer, property, value)
    }

    fn value_property(&self) -> Option<&'static str> {
        Some("SelectedIndex")
    }

    fn attach_child(&self, parent: &mut dyn Peer, child: &dyn Peer, index: usize) -> Result<(), PropertyError> {
        let title = child
            .widget()
            .title
            .clone()
            .unwrap_or_else(|| format!("Tab {}", index + 1));
        parent
            .as_choice_mut()
            .ok_or_else(|| unknown("tabs", "Tabs"))?
            .insert_item(index, title);
        Ok(())
    }

    fn detach_child(&self, parent: &mut dyn Peer, index: usize) {
        if let Some(choice) = parent.as_choice_mut() {
            choice.remove_item(index);
        }
    }

    fn listeners_for(&self, category: EventMask) -> Listeners {
        match category {
            EventMask::SELECTION | EventMask::VALUE_CHANGE => Listeners::CHANGE,
            _ => super::default_listeners(category),
        }
    }
}
