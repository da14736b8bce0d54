//! The toolkit's widget classes.

use super::{Choice, Peer, PeerClass, Ranged, TextComponent, Toggle, Widget};
use core::any::Any;

macro_rules! peer_class {
    ($(#[$attr:meta])* $ident:ident = $name:expr, $parent:expr, abstract) => {
        $(#[$attr])*
        pub static $ident: PeerClass = PeerClass {
            name: $name,
            parent: $parent,
            construct: None,
            nested_helper: None,
        };
    };
    ($(#[$attr:meta])* $ident:ident = $name:expr, $parent:expr, new $construct:expr) => {
        $(#[$attr])*
        pub static $ident: PeerClass = PeerClass {
            name: $name,
            parent: $parent,
            construct: Some({
                fn construct() -> Box<dyn Peer> {
                    Box::new($construct)
                }
                construct as fn() -> Box<dyn Peer>
            }),
            nested_helper: None,
        };
    };
}

/// Implements [`Peer`] for a widget struct with a `widget` field.
///
/// `class: EXPR` for single-class structs, `class_field: ident` for structs shared by several
/// classes. Trailing idents list the families the struct belongs to.
macro_rules! impl_peer {
    ($ty:ty, class: $class:expr $(, $family:ident)*) => {
        impl Peer for $ty {
            fn class(&self) -> &'static PeerClass {
                $class
            }
            impl_peer!(__base);
            $(impl_peer!(__family $family);)*
        }
    };
    ($ty:ty, class_field: $field:ident $(, $family:ident)*) => {
        impl Peer for $ty {
            fn class(&self) -> &'static PeerClass {
                self.$field
            }
            impl_peer!(__base);
            $(impl_peer!(__family $family);)*
        }
    };
    (__base) => {
        fn widget(&self) -> &Widget {
            &self.widget
        }
        fn widget_mut(&mut self) -> &mut Widget {
            &mut self.widget
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    };
    (__family text) => {
        fn as_text(&self) -> Option<&dyn TextComponent> {
            Some(self)
        }
        fn as_text_mut(&mut self) -> Option<&mut dyn TextComponent> {
            Some(self)
        }
    };
    (__family ranged) => {
        fn as_ranged(&self) -> Option<&dyn Ranged> {
            Some(self)
        }
        fn as_ranged_mut(&mut self) -> Option<&mut dyn Ranged> {
            Some(self)
        }
    };
    (__family choice) => {
        fn as_choice(&self) -> Option<&dyn Choice> {
            Some(self)
        }
        fn as_choice_mut(&mut self) -> Option<&mut dyn Choice> {
            Some(self)
        }
    };
}

peer_class!(
    /// The abstract root of all peers.
    COMPONENT = "roost::toolkit::Component", None, abstract
);
peer_class!(PANEL = "roost::toolkit::Panel", Some(&COMPONENT), new Panel::default());
peer_class!(LABEL = "roost::toolkit::Label", Some(&COMPONENT), new Label::default());
peer_class!(
    /// The abstract root of buttons.
    ABSTRACT_BUTTON = "roost::toolkit::AbstractButton", Some(&COMPONENT), abstract
);
peer_class!(BUTTON = "roost::toolkit::Button", Some(&ABSTRACT_BUTTON), new Button::new(&BUTTON));
peer_class!(
    TOGGLE_BUTTON = "roost::toolkit::ToggleButton",
    Some(&ABSTRACT_BUTTON),
    new Button::new(&TOGGLE_BUTTON)
);
peer_class!(
    CHECK_BOX = "roost::toolkit::CheckBox",
    Some(&TOGGLE_BUTTON),
    new Button::new(&CHECK_BOX)
);
peer_class!(
    RADIO_BUTTON = "roost::toolkit::RadioButton",
    Some(&TOGGLE_BUTTON),
    new Button::new(&RADIO_BUTTON)
);
peer_class!(
    /// The abstract root of editable text peers.
    TEXT_COMPONENT = "roost::toolkit::TextComponent", Some(&COMPONENT), abstract
);
peer_class!(
    TEXT_FIELD = "roost::toolkit::TextField",
    Some(&TEXT_COMPONENT),
    new TextField::new(&TEXT_FIELD)
);
peer_class!(
    PASSWORD_FIELD = "roost::toolkit::PasswordField",
    Some(&TEXT_FIELD),
    new TextField::new(&PASSWORD_FIELD)
);
peer_class!(
    TEXT_AREA = "roost::toolkit::TextArea",
    Some(&TEXT_COMPONENT),
    new TextField::new(&TEXT_AREA)
);
peer_class!(
    COMBO_BOX = "roost::toolkit::ComboBox",
    Some(&COMPONENT),
    new ChoiceBox::new(&COMBO_BOX)
);
peer_class!(
    LIST_BOX = "roost::toolkit::ListBox",
    Some(&COMPONENT),
    new ChoiceBox::new(&LIST_BOX)
);
peer_class!(ITEM = "roost::toolkit::Item", Some(&COMPONENT), new Item::default());
peer_class!(
    SLIDER = "roost::toolkit::Slider",
    Some(&COMPONENT),
    new Range::new(&SLIDER)
);
peer_class!(
    TABBED_PANE = "roost::toolkit::TabbedPane",
    Some(&COMPONENT),
    new TabbedPane::default()
);
peer_class!(TABLE = "roost::toolkit::Table", Some(&COMPONENT), new Table::default());
peer_class!(
    TABLE_COLUMN = "roost::toolkit::TableColumn",
    Some(&COMPONENT),
    new TableColumn::default()
);

/// Spinners declare their helper on the class itself.
pub static SPINNER: PeerClass = PeerClass {
    name: "roost::toolkit::Spinner",
    parent: Some(&COMPONENT),
    construct: Some({
        fn construct() -> Box<dyn Peer> {
            Box::new(Range::new(&SPINNER))
        }
        construct as fn() -> Box<dyn Peer>
    }),
    nested_helper: Some(crate::helper::range_helper as fn() -> std::sync::Arc<dyn crate::helper::Helper>),
};

/// Every built-in class, with its descriptor tag.
pub static CLASSES: &[(&str, &PeerClass)] = &[
    ("panel", &PANEL),
    ("label", &LABEL),
    ("button", &BUTTON),
    ("toggle", &TOGGLE_BUTTON),
    ("checkbox", &CHECK_BOX),
    ("radio", &RADIO_BUTTON),
    ("textfield", &TEXT_FIELD),
    ("password", &PASSWORD_FIELD),
    ("textarea", &TEXT_AREA),
    ("combobox", &COMBO_BOX),
    ("list", &LIST_BOX),
    ("item", &ITEM),
    ("slider", &SLIDER),
    ("spinner", &SPINNER),
    ("tabs", &TABBED_PANE),
    ("table", &TABLE),
    ("column", &TABLE_COLUMN),
];

/// A plain container.
#[derive(Debug, Default)]
pub struct Panel {
    pub widget: Widget,
}

impl_peer!(Panel, class: &PANEL);

/// A read-only text peer.
#[derive(Debug, Default)]
pub struct Label {
    pub widget: Widget,
    pub text: String,
}

impl TextComponent for Label {
    fn text(&self) -> &str {
        &self.text
    }
    fn set_text(&mut self, text: String) {
        self.text = text;
    }
}

impl_peer!(Label, class: &LABEL, text);

/// Push buttons and toggle buttons (check boxes, radio buttons).
#[derive(Debug)]
pub struct Button {
    pub widget: Widget,
    class: &'static PeerClass,
    pub text: String,
    pub selected: bool,
}

impl Button {
    pub fn new(class: &'static PeerClass) -> Button {
        Button {
            widget: Widget::default(),
            class,
            text: String::new(),
            selected: false,
        }
    }

    fn is_toggle(&self) -> bool {
        self.class.is_a(&TOGGLE_BUTTON)
    }
}

impl TextComponent for Button {
    fn text(&self) -> &str {
        &self.text
    }
    fn set_text(&mut self, text: String) {
        self.text = text;
    }
}

impl Toggle for Button {
    fn is_selected(&self) -> bool {
        self.selected
    }
    fn set_selected(&mut self, selected: bool) {
        self.selected = selected;
    }
}

impl Peer for Button {
    fn class(&self) -> &'static PeerClass {
        self.class
    }
    impl_peer!(__base);
    impl_peer!(__family text);
    fn as_toggle(&self) -> Option<&dyn Toggle> {
        if self.is_toggle() {
            Some(self)
        } else {
            None
        }
    }
    fn as_toggle_mut(&mut self) -> Option<&mut dyn Toggle> {
        if self.is_toggle() {
            Some(self)
        } else {
            None
        }
    }
}

/// Single-line fields, password fields and text areas.
#[derive(Debug)]
pub struct TextField {
    pub widget: Widget,
    class: &'static PeerClass,
    pub text: String,
    pub editable: bool,
}

impl TextField {
    pub fn new(class: &'static PeerClass) -> TextField {
        TextField {
            widget: Widget::default(),
            class,
            text: String::new(),
            editable: true,
        }
    }
}

impl TextComponent for TextField {
    fn text(&self) -> &str {
        &self.text
    }
    fn set_text(&mut self, text: String) {
        self.text = text;
    }
    fn is_editable(&self) -> bool {
        self.editable
    }
    fn set_editable(&mut self, editable: bool) {
        self.editable = editable;
    }
}

impl_peer!(TextField, class_field: class, text);

/// Combo boxes and list boxes.
#[derive(Debug)]
pub struct ChoiceBox {
    pub widget: Widget,
    class: &'static PeerClass,
    pub items: Vec<String>,
    pub selected: Option<usize>,
}

impl ChoiceBox {
    pub fn new(class: &'static PeerClass) -> ChoiceBox {
        ChoiceBox {
            widget: Widget::default(),
            class,
            items: Vec::new(),
            selected: None,
        }
    }
}

impl Choice for ChoiceBox {
    fn items(&self) -> &[String] {
        &self.items
    }
    fn insert_item(&mut self, index: usize, item: String) {
        let index = index.min(self.items.len());
        self.items.insert(index, item);
    }
    fn remove_item(&mut self, index: usize) -> Option<String> {
        if index >= self.items.len() {
            return None;
        }
        match self.selected {
            Some(s) if s == index => self.selected = None,
            Some(s) if s > index => self.selected = Some(s - 1),
            _ => (),
        }
        Some(self.items.remove(index))
    }
    fn clear_items(&mut self) {
        self.items.clear();
        self.selected = None;
    }
    fn selected_index(&self) -> Option<usize> {
        self.selected
    }
    fn set_selected_index(&mut self, index: Option<usize>) {
        self.selected = index;
    }
}

impl_peer!(ChoiceBox, class_field: class, choice);

/// An entry of a choice peer.
#[derive(Debug, Default)]
pub struct Item {
    pub widget: Widget,
    pub text: String,
}

impl TextComponent for Item {
    fn text(&self) -> &str {
        &self.text
    }
    fn set_text(&mut self, text: String) {
        self.text = text;
    }
}

impl_peer!(Item, class: &ITEM, text);

/// Sliders and spinners.
#[derive(Debug)]
pub struct Range {
    pub widget: Widget,
    class: &'static PeerClass,
    pub min: i64,
    pub max: i64,
    pub value: i64,
}

impl Range {
    pub fn new(class: &'static PeerClass) -> Range {
        Range {
            widget: Widget::default(),
            class,
            min: 0,
            max: 100,
            value: 0,
        }
    }
}

impl Ranged for Range {
    fn minimum(&self) -> i64 {
        self.min
    }
    fn maximum(&self) -> i64 {
        self.max
    }
    fn value(&self) -> i64 {
        self.value
    }
    fn set_minimum(&mut self, min: i64) {
        self.min = min;
        self.max = self.max.max(min);
        self.value = self.value.max(min).min(self.max);
    }
    fn set_maximum(&mut self, max: i64) {
        self.max = max;
        self.min = self.min.min(max);
        self.value = self.value.max(self.min).min(max);
    }
    fn set_value(&mut self, value: i64) {
        self.value = value.max(self.min).min(self.max);
    }
}

impl_peer!(Range, class_field: class, ranged);

/// A container showing one child at a time behind titled tabs.
#[derive(Debug, Default)]
pub struct TabbedPane {
    pub widget: Widget,
    pub tabs: Vec<String>,
    pub selected: Option<usize>,
}

impl Choice for TabbedPane {
    fn items(&self) -> &[String] {
        &self.tabs
    }
    fn insert_item(&mut self, index: usize, item: String) {
        let index = index.min(self.tabs.len());
        self.tabs.insert(index, item);
        if self.selected.is_none() {
            self.selected = Some(0);
        }
    }
    fn remove_item(&mut self, index: usize) -> Option<String> {
        if index >= self.tabs.len() {
            return None;
        }
        let tab = self.tabs.remove(index);
        self.selected = match self.selected {
            _ if self.tabs.is_empty() => None,
            Some(s) if s >= index && s > 0 => Some(s - 1),
            s => s,
        };
        Some(tab)
    }
    fn clear_items(&mut self) {
        self.tabs.clear();
        self.selected = None;
    }
    fn selected_index(&self) -> Option<usize> {
        self.selected
    }
    fn set_selected_index(&mut self, index: Option<usize>) {
        self.selected = index;
    }
}

impl_peer!(TabbedPane, class: &TABBED_PANE, choice);

/// A table whose children are its columns.
#[derive(Debug, Default)]
pub struct Table {
    pub widget: Widget,
    /// Column headers, in column order.
    pub columns: Vec<String>,
}

impl_peer!(Table, class: &TABLE);

/// A table column; its text is the header.
#[derive(Debug, Default)]
pub struct TableColumn {
    pub widget: Widget,
    pub header: String,
}

impl TextComponent for TableColumn {
    fn text(&self) -> &str {
        &self.header
    }
    fn set_text(&mut self, text: String) {
        self.header = text;
    }
}

impl_peer!(TableColumn, class: &TABLE_COLUMN, text);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_hierarchy() {
        assert!(PASSWORD_FIELD.is_a(&TEXT_COMPONENT));
        assert!(RADIO_BUTTON.is_a(&TOGGLE_BUTTON));
        assert!(!BUTTON.is_a(&TOGGLE_BUTTON));
        assert_eq!(CHECK_BOX.simple_name(), "CheckBox");
        assert_eq!(CHECK_BOX.namespace(), "roost::toolkit");
        assert!(COMPONENT.construct.is_none());
    }

    #[test]
    fn test_toggle_family_follows_class() {
        let push = Button::new(&BUTTON);
        let check = Button::new(&CHECK_BOX);
        assert!(push.as_toggle().is_none());
        assert!(check.as_toggle().is_some());
        assert!(check.as_text().is_some());
    }

    #[test]
    fn test_labels_stay_read_only() {
        let mut label = Label::default();
        label.set_editable(true);
        assert!(!label.is_editable());
    }

    #[test]
    fn test_range_clamps() {
        let mut range = Range::new(&SLIDER);
        range.set_value(150);
        assert_eq!(range.value(), 100);
        range.set_maximum(50);
        assert_eq!(range.value(), 50);
        range.set_minimum(60);
        assert_eq!((range.minimum(), range.maximum(), range.value()), (60, 60, 60));
    }

    #[test]
    fn test_listener_list_allows_duplicates() {
        let mut widget = Widget::default();
        widget.add_listener(crate::toolkit::Listeners::FOCUS);
        widget.add_listener(crate::toolkit::Listeners::FOCUS);
        assert_eq!(widget.listener_count(crate::toolkit::Listeners::FOCUS), 2);
        widget.remove_listener(crate::toolkit::Listeners::FOCUS);
        widget.remove_listener(crate::toolkit::Listeners::FOCUS);
        widget.remove_listener(crate::toolkit::Listeners::FOCUS);
        assert_eq!(widget.listener_total(), 0);
    }
}
