use super::{coerce, unknown, widget_get, widget_property_kind, widget_set, Helper, PropertyError};
use crate::toolkit::Peer;
use crate::value::{Value, ValueKind};

/// Sliders and spinners.
#[derive(Debug, Default)]
pub struct RangeHelper;

impl Helper for RangeHelper {
    fn family(&self) -> &'static str {
        "range"
    }

    fn property_kind(&self, property: &str) -> Option<ValueKind> {
        match property {
            "Minimum" | "Maximum" | "Value" => Some(ValueKind::Int),
            _ => widget_property_kind(property),
        }
    }

    fn get(&self, peer: &dyn Peer, property: &str) -> Option<Value> {
        let range = match peer.as_ranged() {
            Some(range) => range,
            None => return widget_get(peer.widget(), property),
        };
        match property {
            "Minimum" => Some(Value::Int(range.minimum())),
            "Maximum" => Some(Value::Int(range.maximum())),
            "Value" => Some(Value::Int(range.value())),
            _ => widget_get(peer.widget(), property),
        }
    }

    fn set(&self, peer: &mut dyn Peer, property: &str, value: Value) -> Result<(), PropertyError> {
        let family = self.family();
        match property {
            "Minimum" | "Maximum" | "Value" => {
                let v = coerce(property, value, ValueKind::Int)?.as_int().unwrap_or_default();
                let range = peer.as_ranged_mut().ok_or_else(|| unknown(family, property))?;
                match property {
                    "Minimum" => range.set_minimum(v),
                    "Maximum" => range.set_maximum(v),
                    _ => range.set_value(v),
                }
                Ok(())
            }
            _ => widget_set(family, peer.widget_mut(), property, value),
        }
    }

    fn value_property(&self) -> Option<&'static str> {
        Some("Value")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventMask;
    use crate::toolkit::{Listeners, Range, SPINNER};

    #[test]
    fn test_range_properties() {
        let mut spinner = Range::new(&SPINNER);
        RangeHelper.set(&mut spinner, "Maximum", Value::text("10")).unwrap();
        RangeHelper.set(&mut spinner, "Value", Value::Int(30)).unwrap();
        assert_eq!(RangeHelper.get(&spinner, "Value"), Some(Value::Int(10)));
        assert_eq!(RangeHelper.remap("Value", &[]), "Value");
        assert_eq!(
            RangeHelper.listeners_for(EventMask::VALUE_CHANGE),
            Listeners::CHANGE | Listeners::FOCUS
        );
    }
}
