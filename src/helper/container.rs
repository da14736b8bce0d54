use super::{widget_get, widget_property_kind, widget_set, Helper, PropertyError};
use crate::toolkit::{Peer, Table};
use crate::value::{Value, ValueKind};

/// Panels and other plain containers.
#[derive(Debug, Default)]
pub struct ContainerHelper;

impl Helper for ContainerHelper {
    fn family(&self) -> &'static str {
        "container"
    }

    fn attach_child(&self, _: &mut dyn Peer, _: &dyn Peer, _: usize) -> Result<(), PropertyError> {
        Ok(())
    }
}

/// Tables. Column children contribute their text as the column header.
#[derive(Debug, Default)]
pub struct TableHelper;

impl Helper for TableHelper {
    fn family(&self) -> &'static str {
        "table"
    }

    fn property_kind(&self, property: &str) -> Option<ValueKind> {
        match property {
            "ColumnCount" => Some(ValueKind::Int),
            _ => widget_property_kind(property),
        }
    }

    fn get(&self, peer: &dyn Peer, property: &str) -> Option<Value> {
        match (property, peer.as_any().downcast_ref::<Table>()) {
            ("ColumnCount", Some(table)) => Some(Value::Int(table.columns.len() as i64)),
            _ => widget_get(peer.widget(), property),
        }
    }

    fn set(&self, peer: &mut dyn Peer, property: &str, value: Value) -> Result<(), PropertyError> {
        if property == "ColumnCount" {
            return Err(PropertyError::ReadOnly {
                property: property.to_string(),
            });
        }
        widget_set(self.family(), peer.widget_mut(), property, value)
    }

    fn attach_child(&self, parent: &mut dyn Peer, child: &dyn Peer, index: usize) -> Result<(), PropertyError> {
        let refused = || PropertyError::Child {
            family: "table",
            child: child.class().name,
        };
        let header = child.as_text().ok_or_else(refused)?.text().to_string();
        let table = parent.as_any_mut().downcast_mut::<Table>().ok_or_else(refused)?;
        let index = index.min(table.columns.len());
        table.columns.insert(index, header);
        Ok(())
    }

    fn detach_child(&self, parent: &mut dyn Peer, index: usize) {
        if let Some(table) = parent.as_any_mut().downcast_mut::<Table>() {
            if index < table.columns.len() {
                table.columns.remove(index);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolkit::{Panel, TableColumn};

    #[test]
    fn test_columns_from_children() {
        let mut table = Table::default();
        let mut column = TableColumn::default();
        column.header = "Name".into();
        TableHelper.attach_child(&mut table, &column, 0).unwrap();
        column.header = "Age".into();
        TableHelper.attach_child(&mut table, &column, 1).unwrap();
        assert_eq!(TableHelper.get(&table, "ColumnCount"), Some(Value::Int(2)));
        assert!(TableHelper.set(&mut table, "ColumnCount", Value::Int(3)).is_err());

        TableHelper.detach_child(&mut table, 0);
        assert_eq!(table.columns, vec!["Age"]);
        assert!(TableHelper.attach_child(&mut table, &Panel::default(), 0).is_err());
    }
}
