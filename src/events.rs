//! Portable events.
//!
//! Native listener callbacks never leave the [`adapter`](crate::adapter); everything downstream
//! of it consumes [`PortableEvent`]s.

use crate::descriptor::NodeId;
use crate::peer_tree::PeerId;
use crate::value::Value;
use bitflags::bitflags;
use cgmath::Point2;
use core::fmt;
use parking_lot::Mutex;
use std::sync::Arc;

bitflags! {
    /// Event categories that can be enabled on a peer.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EventMask: u16 {
        const ACTION = 1 << 0;
        const POINTER = 1 << 1;
        const POINTER_MOTION = 1 << 2;
        const KEY = 1 << 3;
        const FOCUS = 1 << 4;
        const SELECTION = 1 << 5;
        const VALUE_CHANGE = 1 << 6;
        const DRAG_SOURCE = 1 << 7;
        const DROP_TARGET = 1 << 8;
    }
}

const CATEGORY_NAMES: &[(EventMask, &str)] = &[
    (EventMask::ACTION, "action"),
    (EventMask::POINTER, "pointer"),
    (EventMask::POINTER_MOTION, "pointer-motion"),
    (EventMask::KEY, "key"),
    (EventMask::FOCUS, "focus"),
    (EventMask::SELECTION, "selection"),
    (EventMask::VALUE_CHANGE, "value-change"),
    (EventMask::DRAG_SOURCE, "drag-source"),
    (EventMask::DROP_TARGET, "drop-target"),
];

impl EventMask {
    /// Parses a comma-separated category list as written in descriptor documents.
    ///
    /// Returns the offending name if a category is unknown.
    pub fn parse_list(s: &str) -> Result<EventMask, String> {
        let mut mask = EventMask::empty();
        for name in s.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            match CATEGORY_NAMES.iter().find(|(_, n)| *n == name) {
                Some((category, _)) => mask |= *category,
                None => return Err(name.to_string()),
            }
        }
        Ok(mask)
    }

    /// Formats the mask as a comma-separated category list.
    pub fn to_list(self) -> String {
        CATEGORY_NAMES
            .iter()
            .filter(|(category, _)| self.contains(*category))
            .map(|(_, name)| *name)
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Modifier key state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    /// Whether any shift key is pressed.
    pub shift: bool,

    /// Whether any control key is pressed.
    pub control: bool,

    /// Whether any option key or alt key is pressed.
    pub option: bool,

    /// Whether any command key or meta key is pressed.
    pub command: bool,
}

/// Classification of the native event underlying a portable event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Action,
    PointerPressed,
    PointerDragged,
    PointerReleased,
    PointerClicked,
    PointerEntered,
    PointerExited,
    PointerMoved,
    KeyPressed,
    KeyTyped,
    KeyReleased,
    FocusGained,
    FocusLost,
    SelectionChanged,
    ValueChanged,
    DragEnter,
    DragOver,
    DragExit,
    Drop,
    DragGesture,
    /// The end of a drag gesture started on this peer, however it ended.
    DragEnd,
}

/// A toolkit-independent event record.
#[derive(Debug, Clone, PartialEq)]
pub struct PortableEvent {
    pub(crate) category: EventMask,
    pub(crate) kind: EventKind,
    pub(crate) source: PeerId,
    pub(crate) node: Option<NodeId>,
    pub(crate) name: Option<String>,
    pub(crate) modifiers: Modifiers,
    pub(crate) location: Option<Point2<f64>>,
    pub(crate) key: Option<char>,
    pub(crate) value: Option<Value>,
}

impl PortableEvent {
    pub(crate) fn new(category: EventMask, kind: EventKind, source: PeerId) -> PortableEvent {
        PortableEvent {
            category,
            kind,
            source,
            node: None,
            name: None,
            modifiers: Modifiers::default(),
            location: None,
            key: None,
            value: None,
        }
    }

    /// The (single) category this event was delivered under.
    pub fn category(&self) -> EventMask {
        self.category
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// The peer that received the native event.
    pub fn source(&self) -> PeerId {
        self.source
    }

    /// The descriptor node the source peer was materialized from.
    pub fn node(&self) -> Option<NodeId> {
        self.node
    }

    /// The `name` attribute of the source descriptor, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_ref().map(String::as_str)
    }

    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    pub fn is_shift_down(&self) -> bool {
        self.modifiers.shift
    }

    pub fn is_control_down(&self) -> bool {
        self.modifiers.control
    }

    /// Pointer location in the source peer's coordinate system.
    pub fn location(&self) -> Option<Point2<f64>> {
        self.location
    }

    /// The character of a key event.
    pub fn key(&self) -> Option<char> {
        self.key
    }

    /// The value associated with the event: the new value for value changes, the payload for drag
    /// gestures and drops.
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }
}

/// A controller's response handler.
pub struct EventHandler(Arc<Mutex<dyn FnMut(&PortableEvent) + Send>>);

impl Clone for EventHandler {
    fn clone(&self) -> Self {
        EventHandler(Arc::clone(&self.0))
    }
}

impl EventHandler {
    pub fn new<F: 'static + FnMut(&PortableEvent) + Send>(handler: F) -> Self {
        EventHandler(Arc::new(Mutex::new(handler)))
    }

    pub(crate) fn call(&self, event: &PortableEvent) {
        (&mut *self.0.lock())(event)
    }
}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "EventHandler")
    }
}

#[test]
fn test_category_lists() {
    let mask = EventMask::parse_list("focus, action,value-change").unwrap();
    assert_eq!(
        mask,
        EventMask::ACTION | EventMask::FOCUS | EventMask::VALUE_CHANGE
    );
    assert_eq!(mask.to_list(), "action,focus,value-change");
    assert_eq!(EventMask::parse_list(""), Ok(EventMask::empty()));
    assert_eq!(EventMask::parse_list("hover"), Err("hover".to_string()));
}
