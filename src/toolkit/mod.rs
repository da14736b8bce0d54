//! A headless native toolkit.
//!
//! This is the layer the binding machinery drives: peers are plain widget objects that know
//! nothing about descriptors, helpers or bindings. Like a real toolkit, peers expose a common
//! component base ([`Widget`]), a handful of family interfaces (text, toggle, range, choice) and a
//! listener list that may contain duplicates.

use crate::color::Color;
use crate::events::Modifiers;
use crate::rect::Rect;
use crate::resource::Image;
use bitflags::bitflags;
use cgmath::Point2;
use core::any::Any;
use core::fmt;

mod widgets;

pub use widgets::*;

/// Static metadata for a peer type.
///
/// Classes form a single-inheritance hierarchy through `parent`; the registry walks it when a
/// class has no helper of its own.
pub struct PeerClass {
    /// Fully qualified type name, e.g. `roost::toolkit::TextField`.
    pub name: &'static str,
    /// The class this one specializes.
    pub parent: Option<&'static PeerClass>,
    /// No-argument constructor. `None` for abstract classes.
    pub construct: Option<fn() -> Box<dyn Peer>>,
    /// A helper declared directly on this class.
    pub nested_helper: Option<fn() -> std::sync::Arc<dyn crate::helper::Helper>>,
}

impl PeerClass {
    /// The last path segment of the class name.
    pub fn simple_name(&self) -> &'static str {
        match self.name.rfind("::") {
            Some(i) => &self.name[i + 2..],
            None => self.name,
        }
    }

    /// The path the class is declared in, or an empty string.
    pub fn namespace(&self) -> &'static str {
        match self.name.rfind("::") {
            Some(i) => &self.name[..i],
            None => "",
        }
    }

    /// Returns true if this class is `other` or inherits from it.
    pub fn is_a(&self, other: &PeerClass) -> bool {
        let mut class = Some(self);
        while let Some(c) = class {
            if c.name == other.name {
                return true;
            }
            class = c.parent;
        }
        false
    }
}

impl fmt::Debug for PeerClass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "PeerClass({})", self.name)
    }
}

bitflags! {
    /// Kinds of native listeners.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Listeners: u16 {
        const ACTION = 1 << 0;
        const MOUSE = 1 << 1;
        const MOUSE_MOTION = 1 << 2;
        const KEY = 1 << 3;
        const FOCUS = 1 << 4;
        const ITEM = 1 << 5;
        const CHANGE = 1 << 6;
        const DRAG_GESTURE = 1 << 7;
        const DROP_TARGET = 1 << 8;
    }
}

/// A widget border (width, color).
pub type Border = (f64, Color);

/// The component base every peer carries.
#[derive(Debug, Clone)]
pub struct Widget {
    pub bounds: Rect,
    pub enabled: bool,
    pub visible: bool,
    pub tooltip: Option<String>,
    pub background: Option<Color>,
    pub foreground: Option<Color>,
    pub border: Option<Border>,
    pub opacity: f64,
    pub margin: i64,
    pub align: Option<String>,
    /// Title used by tab-like parents.
    pub title: Option<String>,
    pub icon: Option<Image>,
    /// Attached listeners. Natively, adding the same kind twice attaches it twice.
    listeners: Vec<Listeners>,
}

impl Default for Widget {
    fn default() -> Widget {
        Widget {
            bounds: Rect::zero(),
            enabled: true,
            visible: true,
            tooltip: None,
            background: None,
            foreground: None,
            border: None,
            opacity: 1.,
            margin: 0,
            align: None,
            title: None,
            icon: None,
            listeners: Vec::new(),
        }
    }
}

impl Widget {
    pub fn add_listener(&mut self, kind: Listeners) {
        self.listeners.push(kind);
    }

    /// Removes one instance of a listener kind. Removing an absent listener does nothing.
    pub fn remove_listener(&mut self, kind: Listeners) {
        if let Some(pos) = self.listeners.iter().position(|l| *l == kind) {
            self.listeners.remove(pos);
        }
    }

    /// Number of attached listeners of the given kind.
    pub fn listener_count(&self, kind: Listeners) -> usize {
        self.listeners.iter().filter(|l| **l == kind).count()
    }

    /// Total number of attached listeners.
    pub fn listener_total(&self) -> usize {
        self.listeners.len()
    }
}

/// A text-bearing peer.
pub trait TextComponent {
    fn text(&self) -> &str;
    fn set_text(&mut self, text: String);
    fn is_editable(&self) -> bool {
        false
    }
    fn set_editable(&mut self, _editable: bool) {}
}

/// A toggle-bearing peer.
pub trait Toggle {
    fn is_selected(&self) -> bool;
    fn set_selected(&mut self, selected: bool);
}

/// A peer holding a bounded integer.
pub trait Ranged {
    fn minimum(&self) -> i64;
    fn maximum(&self) -> i64;
    fn value(&self) -> i64;
    fn set_minimum(&mut self, min: i64);
    fn set_maximum(&mut self, max: i64);
    /// Sets the value, clamped to the range.
    fn set_value(&mut self, value: i64);
}

/// A peer selecting one of a list of items.
pub trait Choice {
    fn items(&self) -> &[String];
    fn insert_item(&mut self, index: usize, item: String);
    fn remove_item(&mut self, index: usize) -> Option<String>;
    fn clear_items(&mut self);
    /// The selected index. May point past the current items until enough items are added.
    fn selected_index(&self) -> Option<usize>;
    fn set_selected_index(&mut self, index: Option<usize>);

    fn selected_item(&self) -> Option<&str> {
        self.selected_index()
            .and_then(|i| self.items().get(i))
            .map(String::as_str)
    }
}

/// A live native widget.
///
/// Family accessors return `None` unless the peer belongs to the family.
pub trait Peer: Any + fmt::Debug {
    fn class(&self) -> &'static PeerClass;
    fn widget(&self) -> &Widget;
    fn widget_mut(&mut self) -> &mut Widget;

    fn as_text(&self) -> Option<&dyn TextComponent> {
        None
    }
    fn as_text_mut(&mut self) -> Option<&mut dyn TextComponent> {
        None
    }
    fn as_toggle(&self) -> Option<&dyn Toggle> {
        None
    }
    fn as_toggle_mut(&mut self) -> Option<&mut dyn Toggle> {
        None
    }
    fn as_ranged(&self) -> Option<&dyn Ranged> {
        None
    }
    fn as_ranged_mut(&mut self) -> Option<&mut dyn Ranged> {
        None
    }
    fn as_choice(&self) -> Option<&dyn Choice> {
        None
    }
    fn as_choice_mut(&mut self) -> Option<&mut dyn Choice> {
        None
    }

    /// For downcasting.
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Pointer event phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseAction {
    Pressed,
    Released,
    Clicked,
    Entered,
    Exited,
    Moved,
    Dragged,
}

/// Key event phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Pressed,
    Typed,
    Released,
}

/// An event as the toolkit reports it to a listener.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeEvent {
    Action(Modifiers),
    Mouse(MouseAction, Point2<f64>, Modifiers),
    Key(KeyAction, char, Modifiers),
    FocusGained,
    FocusLost,
    /// A toggle or choice changed its selection.
    ItemStateChanged,
    /// A ranged peer changed its value.
    StateChanged,
    /// The platform recognized a drag gesture starting at the given location.
    DragGesture(Point2<f64>),
    /// A drag started on this peer finished (dropped somewhere or rejected).
    DragDropEnd,
    DragCancel,
    /// The window lost focus; in-flight gestures are abandoned.
    WindowDeactivated,
    /// A drag carrying the given flavors entered the peer.
    DragEnter(Vec<String>),
    DragOver(Point2<f64>),
    DragExit,
    /// A drop of `(flavors, data)`.
    Drop(Vec<String>, String),
}

impl NativeEvent {
    /// The listener kind the toolkit delivers this event to.
    pub fn listener(&self) -> Listeners {
        match self {
            NativeEvent::Action(_) => Listeners::ACTION,
            NativeEvent::Mouse(MouseAction::Moved, ..)
            | NativeEvent::Mouse(MouseAction::Dragged, ..) => Listeners::MOUSE_MOTION,
            NativeEvent::Mouse(..) => Listeners::MOUSE,
            NativeEvent::Key(..) => Listeners::KEY,
            NativeEvent::FocusGained | NativeEvent::FocusLost => Listeners::FOCUS,
            NativeEvent::ItemStateChanged => Listeners::ITEM,
            NativeEvent::StateChanged => Listeners::CHANGE,
            NativeEvent::DragGesture(_)
            | NativeEvent::DragDropEnd
            | NativeEvent::DragCancel
            | NativeEvent::WindowDeactivated => Listeners::DRAG_GESTURE,
            NativeEvent::DragEnter(_)
            | NativeEvent::DragOver(_)
            | NativeEvent::DragExit
            | NativeEvent::Drop(..) => Listeners::DROP_TARGET,
        }
    }
}

/// The toolkit's answer to a drag or drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DndResponse {
    AcceptDrag,
    RejectDrag,
    AcceptDrop,
    RejectDrop,
}
