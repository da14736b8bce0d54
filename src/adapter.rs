//! Event adapters: per-peer listener bookkeeping and native event translation.

use crate::binding::{Binding, Model};
use crate::events::{EventKind, EventMask, PortableEvent};
use crate::helper::Helper;
use crate::peer_tree::{PeerError, PeerId, PeerTree};
use crate::toolkit::{Border, DndResponse, Listeners, MouseAction, NativeEvent, KeyAction, Peer};
use crate::value::Value;
use tracing::{trace, warn};

/// The result of handing a native event to an adapter.
#[derive(Debug, Default)]
pub struct Handled {
    pub events: Vec<PortableEvent>,
    /// The answer for drag and drop events.
    pub response: Option<DndResponse>,
}

/// Per-peer event state.
///
/// A native listener kind is attached exactly when some enabled category needs it.
#[derive(Debug, Clone, Default)]
pub struct EventAdapter {
    enabled: EventMask,
    attached: Listeners,
    /// The value last known to be committed.
    snapshot: Option<Value>,
    /// Flavors accepted as a drop target; empty accepts anything.
    accept_flavors: Vec<String>,
    /// The border to restore while a drag-over highlight is shown.
    saved_border: Option<Option<Border>>,
    dragging: bool,
}

impl EventAdapter {
    pub fn new() -> EventAdapter {
        EventAdapter::default()
    }

    pub fn enabled(&self) -> EventMask {
        self.enabled
    }

    pub fn attached(&self) -> Listeners {
        self.attached
    }

    pub fn snapshot(&self) -> Option<&Value> {
        self.snapshot.as_ref()
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    pub fn set_accepted_flavors(&mut self, flavors: Vec<String>) {
        self.accept_flavors = flavors;
    }

    /// Enables event categories. Enabling an enabled category does nothing.
    pub fn enable(&mut self, helper: &dyn Helper, peer: &mut dyn Peer, mask: EventMask) {
        let added = mask - self.enabled;
        if added.is_empty() {
            return;
        }
        self.enabled |= added;
        self.sync_listeners(helper, peer);
        if added.contains(EventMask::VALUE_CHANGE) {
            self.take_snapshot(helper, &*peer);
        }
    }

    /// Disables event categories.
    pub fn disable(&mut self, helper: &dyn Helper, peer: &mut dyn Peer, mask: EventMask) {
        if (self.enabled & mask).is_empty() {
            return;
        }
        self.enabled -= mask;
        self.sync_listeners(helper, peer);
    }

    /// Detaches every listener this adapter attached.
    pub fn detach_all(&mut self, peer: &mut dyn Peer) {
        for kind in self.attached.iter() {
            peer.widget_mut().remove_listener(kind);
        }
        self.attached = Listeners::empty();
        self.enabled = EventMask::empty();
        self.dragging = false;
    }

    fn sync_listeners(&mut self, helper: &dyn Helper, peer: &mut dyn Peer) {
        let required = self
            .enabled
            .iter()
            .fold(Listeners::empty(), |acc, category| acc | helper.listeners_for(category));
        for kind in (required - self.attached).iter() {
            trace!(class = peer.class().name, ?kind, "attaching listener");
            peer.widget_mut().add_listener(kind);
        }
        for kind in (self.attached - required).iter() {
            trace!(class = peer.class().name, ?kind, "detaching listener");
            peer.widget_mut().remove_listener(kind);
        }
        self.attached = required;
    }

    /// Records the peer’s current value as committed.
    pub fn take_snapshot(&mut self, helper: &dyn Helper, peer: &dyn Peer) {
        self.snapshot = helper.value_property().and_then(|p| helper.get(peer, p));
    }

    fn event(tree: &PeerTree, id: PeerId, category: EventMask, kind: EventKind) -> PortableEvent {
        let mut event = PortableEvent::new(category, kind, id);
        if let Some(ext) = tree.ext(id) {
            event.node = ext.node;
            event.name = ext.name.clone();
        }
        event
    }

    fn current_value(tree: &PeerTree, id: PeerId) -> Option<Value> {
        let helper = tree.helper(id)?;
        tree.property(id, helper.value_property()?)
    }

    /// Compares the peer’s value to the snapshot and commits it if it changed.
    ///
    /// Returns the synthesized value change event. If a binding can’t be committed the peer is
    /// reverted to the snapshot and no event is produced.
    pub fn verify(&mut self, tree: &mut PeerTree, id: PeerId, model: &mut dyn Model) -> Option<PortableEvent> {
        let helper = tree.helper(id)?;
        let current = EventAdapter::current_value(tree, id);
        if current == self.snapshot {
            return None;
        }

        let bindings: Vec<Binding> = tree
            .bindings(id)
            .iter()
            .filter(|b| helper.is_value_property(b.property()))
            .cloned()
            .collect();
        // nothing is written unless every binding converts
        let mut values = Vec::with_capacity(bindings.len());
        for binding in &bindings {
            match tree.pulled_value(id, binding, &*model) {
                Ok(value) => values.push(value),
                Err(err) => {
                    warn!(key = binding.key(), %err, "commit failed, reverting");
                    if let (Some(property), Some(previous)) = (helper.value_property(), self.snapshot.clone()) {
                        if let Err(err) = tree.set_property(id, property, previous) {
                            warn!(%err, "could not revert peer");
                        }
                    }
                    return None;
                }
            }
        }
        for (binding, value) in bindings.iter().zip(values) {
            trace!(key = binding.key(), %value, "committed binding");
            model.set(binding.key(), value);
        }

        self.snapshot = current.clone();
        let mut event = EventAdapter::event(tree, id, EventMask::VALUE_CHANGE, EventKind::ValueChanged);
        event.value = current;
        Some(event)
    }

    fn accepts(&self, flavors: &[String]) -> bool {
        self.accept_flavors.is_empty() || flavors.iter().any(|f| self.accept_flavors.contains(f))
    }

    fn highlight(&mut self, peer: &mut dyn Peer, highlight: Border) {
        if self.saved_border.is_none() {
            self.saved_border = Some(peer.widget().border);
            peer.widget_mut().border = Some(highlight);
        }
    }

    fn restore(&mut self, peer: &mut dyn Peer) -> bool {
        match self.saved_border.take() {
            Some(border) => {
                peer.widget_mut().border = border;
                true
            }
            None => false,
        }
    }

    /// Translates a native event delivered to peer `id`.
    ///
    /// `highlight` is the border shown while an acceptable drag hovers over a drop target.
    pub fn handle(
        &mut self,
        tree: &mut PeerTree,
        id: PeerId,
        model: &mut dyn Model,
        native: &NativeEvent,
        highlight: Border,
    ) -> Handled {
        let mut out = Handled::default();
        let helper = match tree.helper(id) {
            Some(helper) => helper,
            None => return out,
        };
        let commits = self.enabled.contains(EventMask::VALUE_CHANGE)
            && helper.listeners_for(EventMask::VALUE_CHANGE).contains(native.listener());
        let selects = self.enabled.contains(EventMask::SELECTION)
            && helper.listeners_for(EventMask::SELECTION).contains(native.listener());

        match native {
            NativeEvent::Action(modifiers) => {
                if self.enabled.contains(EventMask::ACTION) {
                    let mut event = EventAdapter::event(tree, id, EventMask::ACTION, EventKind::Action);
                    event.modifiers = *modifiers;
                    out.events.push(event);
                }
            }
            NativeEvent::Mouse(action, location, modifiers) => {
                let (category, kind) = match action {
                    MouseAction::Pressed => (EventMask::POINTER, EventKind::PointerPressed),
                    MouseAction::Released => (EventMask::POINTER, EventKind::PointerReleased),
                    MouseAction::Clicked => (EventMask::POINTER, EventKind::PointerClicked),
                    MouseAction::Entered => (EventMask::POINTER, EventKind::PointerEntered),
                    MouseAction::Exited => (EventMask::POINTER, EventKind::PointerExited),
                    MouseAction::Moved => (EventMask::POINTER_MOTION, EventKind::PointerMoved),
                    MouseAction::Dragged => (EventMask::POINTER_MOTION, EventKind::PointerDragged),
                };
                if self.enabled.contains(category) {
                    let mut event = EventAdapter::event(tree, id, category, kind);
                    event.location = Some(*location);
                    event.modifiers = *modifiers;
                    out.events.push(event);
                }
            }
            NativeEvent::Key(action, key, modifiers) => {
                if self.enabled.contains(EventMask::KEY) {
                    let kind = match action {
                        KeyAction::Pressed => EventKind::KeyPressed,
                        KeyAction::Typed => EventKind::KeyTyped,
                        KeyAction::Released => EventKind::KeyReleased,
                    };
                    let mut event = EventAdapter::event(tree, id, EventMask::KEY, kind);
                    event.key = Some(*key);
                    event.modifiers = *modifiers;
                    out.events.push(event);
                }
            }
            NativeEvent::FocusGained | NativeEvent::FocusLost => {
                let gained = *native == NativeEvent::FocusGained;
                if self.enabled.contains(EventMask::FOCUS) {
                    let kind = if gained { EventKind::FocusGained } else { EventKind::FocusLost };
                    out.events.push(EventAdapter::event(tree, id, EventMask::FOCUS, kind));
                }
                if self.enabled.contains(EventMask::VALUE_CHANGE) && gained {
                    if let Some(peer) = tree.get(id) {
                        self.take_snapshot(&*helper, peer);
                    }
                }
            }
            NativeEvent::ItemStateChanged | NativeEvent::StateChanged => (),
            NativeEvent::DragGesture(location) => {
                if self.enabled.contains(EventMask::DRAG_SOURCE) && !self.dragging {
                    self.dragging = true;
                    let mut event = EventAdapter::event(tree, id, EventMask::DRAG_SOURCE, EventKind::DragGesture);
                    event.location = Some(*location);
                    event.value = EventAdapter::current_value(tree, id);
                    out.events.push(event);
                }
            }
            NativeEvent::DragDropEnd | NativeEvent::DragCancel | NativeEvent::WindowDeactivated => {
                if self.dragging {
                    self.dragging = false;
                    out.events.push(EventAdapter::event(tree, id, EventMask::DRAG_SOURCE, EventKind::DragEnd));
                }
            }
            NativeEvent::DragEnter(flavors) => {
                if self.enabled.contains(EventMask::DROP_TARGET) && self.accepts(flavors) {
                    if let Some(peer) = tree.get_mut(id) {
                        self.highlight(peer, highlight);
                    }
                    out.events.push(EventAdapter::event(tree, id, EventMask::DROP_TARGET, EventKind::DragEnter));
                    out.response = Some(DndResponse::AcceptDrag);
                } else {
                    out.response = Some(DndResponse::RejectDrag);
                }
            }
            NativeEvent::DragOver(location) => {
                if self.enabled.contains(EventMask::DROP_TARGET) && self.saved_border.is_some() {
                    let mut event = EventAdapter::event(tree, id, EventMask::DROP_TARGET, EventKind::DragOver);
                    event.location = Some(*location);
                    out.events.push(event);
                    out.response = Some(DndResponse::AcceptDrag);
                } else {
                    out.response = Some(DndResponse::RejectDrag);
                }
            }
            NativeEvent::DragExit => {
                let restored = match tree.get_mut(id) {
                    Some(peer) => self.restore(peer),
                    None => false,
                };
                if restored {
                    out.events.push(EventAdapter::event(tree, id, EventMask::DROP_TARGET, EventKind::DragExit));
                }
            }
            NativeEvent::Drop(flavors, data) => {
                if let Some(peer) = tree.get_mut(id) {
                    self.restore(peer);
                }
                if self.enabled.contains(EventMask::DROP_TARGET) && self.accepts(flavors) {
                    let mut event = EventAdapter::event(tree, id, EventMask::DROP_TARGET, EventKind::Drop);
                    event.value = Some(Value::text(data.as_str()));
                    out.events.push(event);
                    out.response = Some(DndResponse::AcceptDrop);
                } else {
                    out.response = Some(DndResponse::RejectDrop);
                }
            }
        }

        if selects {
            let mut event = EventAdapter::event(tree, id, EventMask::SELECTION, EventKind::SelectionChanged);
            event.value = EventAdapter::current_value(tree, id);
            out.events.push(event);
        }
        let verifies = match native {
            NativeEvent::FocusGained => false,
            NativeEvent::FocusLost => self.enabled.contains(EventMask::VALUE_CHANGE),
            _ => commits,
        };
        if verifies {
            out.events.extend(self.verify(tree, id, model));
        }
        out
    }
}

impl PeerTree {
    /// Enables event categories on a peer, creating its adapter if needed.
    pub fn enable_events(&mut self, id: PeerId, mask: EventMask) -> Result<(), PeerError> {
        let (peer, ext) = self.split_mut(id)?;
        let adapter = ext.adapter.get_or_insert_with(EventAdapter::new);
        adapter.enable(&*ext.helper, peer, mask);
        Ok(())
    }

    /// Disables event categories on a peer.
    pub fn disable_events(&mut self, id: PeerId, mask: EventMask) -> Result<(), PeerError> {
        let (peer, ext) = self.split_mut(id)?;
        if let Some(adapter) = ext.adapter.as_mut() {
            adapter.disable(&*ext.helper, peer, mask);
        }
        Ok(())
    }

    pub fn adapter(&self, id: PeerId) -> Option<&EventAdapter> {
        self.ext(id).and_then(|ext| ext.adapter.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{Conversion, MapModel};
    use crate::color::Color;
    use crate::helper::{ChoiceHelper, TextHelper};
    use crate::toolkit::{ChoiceBox, TextField, COMBO_BOX, TEXT_FIELD};
    use std::sync::Arc;

    const HIGHLIGHT: Border = (2., Color::WHITE);

    fn field(tree: &mut PeerTree) -> PeerId {
        tree.insert(Box::new(TextField::new(&TEXT_FIELD)), Arc::new(TextHelper))
    }

    fn enable(tree: &mut PeerTree, id: PeerId, mask: EventMask) {
        tree.enable_events(id, mask).unwrap();
    }

    fn deliver(tree: &mut PeerTree, id: PeerId, model: &mut MapModel, native: NativeEvent) -> Handled {
        let mut adapter = tree.ext_mut(id).unwrap().adapter.take().unwrap();
        let handled = adapter.handle(tree, id, model, &native, HIGHLIGHT);
        tree.ext_mut(id).unwrap().adapter = Some(adapter);
        handled
    }

    #[test]
    fn test_enable_is_idempotent() {
        let mut tree = PeerTree::new();
        let id = field(&mut tree);
        // focus and value-change share the focus listener on text peers
        enable(&mut tree, id, EventMask::FOCUS);
        enable(&mut tree, id, EventMask::FOCUS);
        enable(&mut tree, id, EventMask::VALUE_CHANGE);
        let count = |tree: &PeerTree, kind| tree.get(id).unwrap().widget().listener_count(kind);
        assert_eq!(count(&tree, Listeners::FOCUS), 1);
        assert_eq!(count(&tree, Listeners::ACTION), 1);

        tree.disable_events(id, EventMask::FOCUS).unwrap();
        assert_eq!(count(&tree, Listeners::FOCUS), 1);

        tree.disable_events(id, EventMask::VALUE_CHANGE).unwrap();
        assert_eq!(tree.get(id).unwrap().widget().listener_total(), 0);
        assert_eq!(tree.adapter(id).unwrap().attached(), Listeners::empty());
    }

    #[test]
    fn test_focus_loss_commits_once() {
        let mut tree = PeerTree::new();
        let id = field(&mut tree);
        let binding = tree
            .add_binding(id, &Binding::new("Value", "UserName", Conversion::None))
            .unwrap();
        let mut model = MapModel::new().with("UserName", "Ada");
        tree.push(id, &binding, &model).unwrap();
        enable(&mut tree, id, EventMask::VALUE_CHANGE);

        assert!(deliver(&mut tree, id, &mut model, NativeEvent::FocusGained).events.is_empty());
        tree.set_property(id, "Text", Value::text("Grace")).unwrap();
        let handled = deliver(&mut tree, id, &mut model, NativeEvent::FocusLost);
        assert_eq!(handled.events.len(), 1);
        assert_eq!(handled.events[0].kind(), EventKind::ValueChanged);
        assert_eq!(handled.events[0].value(), Some(&Value::text("Grace")));
        assert_eq!(model.get("UserName"), Some(Value::text("Grace")));

        assert!(deliver(&mut tree, id, &mut model, NativeEvent::FocusLost).events.is_empty());
    }

    #[test]
    fn test_failed_commit_reverts() {
        let mut tree = PeerTree::new();
        let id = field(&mut tree);
        let binding = tree
            .add_binding(id, &Binding::new("Value", "Age", Conversion::Integer))
            .unwrap();
        let mut model = MapModel::new().with("Age", 36i64);
        tree.push(id, &binding, &model).unwrap();
        enable(&mut tree, id, EventMask::VALUE_CHANGE);

        tree.set_property(id, "Text", Value::text("old")).unwrap();
        let handled = deliver(&mut tree, id, &mut model, NativeEvent::Action(Default::default()));
        assert!(handled.events.is_empty());
        assert_eq!(tree.property(id, "Text"), Some(Value::text("36")));
        assert_eq!(model.get("Age"), Some(Value::Int(36)));
    }

    #[test]
    fn test_selection_commits_choice() {
        let mut tree = PeerTree::new();
        let mut combo = ChoiceBox::new(&COMBO_BOX);
        combo.items = vec!["red".into(), "green".into()];
        let id = tree.insert(Box::new(combo), Arc::new(ChoiceHelper));
        tree.add_binding(id, &Binding::new("Value", "Color", Conversion::None)).unwrap();
        enable(&mut tree, id, EventMask::VALUE_CHANGE | EventMask::SELECTION);
        assert_eq!(tree.get(id).unwrap().widget().listener_count(Listeners::ITEM), 1);

        let mut model = MapModel::new();
        tree.set_property(id, "SelectedIndex", Value::Int(1)).unwrap();
        let handled = deliver(&mut tree, id, &mut model, NativeEvent::ItemStateChanged);
        let kinds: Vec<_> = handled.events.iter().map(|e| e.kind()).collect();
        assert_eq!(kinds, vec![EventKind::SelectionChanged, EventKind::ValueChanged]);
        assert_eq!(model.get("Color"), Some(Value::text("green")));
    }

    #[test]
    fn test_commit_is_all_or_nothing() {
        let mut tree = PeerTree::new();
        let mut combo = ChoiceBox::new(&COMBO_BOX);
        combo.items = vec!["red".into(), "green".into()];
        let id = tree.insert(Box::new(combo), Arc::new(ChoiceHelper));
        tree.add_binding(id, &Binding::new("SelectedItem", "Color", Conversion::None)).unwrap();
        tree.add_binding(id, &Binding::new("SelectedIndex", "Slot", Conversion::Enumeration(vec!["0".into()])))
            .unwrap();
        enable(&mut tree, id, EventMask::VALUE_CHANGE);

        let mut model = MapModel::new().with("Color", "red");
        tree.set_property(id, "SelectedIndex", Value::Int(0)).unwrap();
        deliver(&mut tree, id, &mut model, NativeEvent::FocusGained);

        // the item converts fine but the index doesn't, so neither is written
        tree.set_property(id, "SelectedIndex", Value::Int(1)).unwrap();
        let handled = deliver(&mut tree, id, &mut model, NativeEvent::ItemStateChanged);
        assert!(handled.events.is_empty());
        assert_eq!(model.get("Color"), Some(Value::text("red")));
        assert_eq!(model.get("Slot"), None);
        assert_eq!(tree.property(id, "SelectedIndex"), Some(Value::Int(0)));
    }

    #[test]
    fn test_drop_restores_highlight() {
        let mut tree = PeerTree::new();
        let id = field(&mut tree);
        enable(&mut tree, id, EventMask::DROP_TARGET);
        tree.ext_mut(id)
            .unwrap()
            .adapter
            .as_mut()
            .unwrap()
            .set_accepted_flavors(vec!["text/plain".into()]);
        let mut model = MapModel::new();
        let border = |tree: &PeerTree| tree.get(id).unwrap().widget().border;

        let handled = deliver(&mut tree, id, &mut model, NativeEvent::DragEnter(vec!["image/png".into()]));
        assert_eq!(handled.response, Some(DndResponse::RejectDrag));
        assert_eq!(border(&tree), None);

        let handled = deliver(&mut tree, id, &mut model, NativeEvent::DragEnter(vec!["text/plain".into()]));
        assert_eq!(handled.response, Some(DndResponse::AcceptDrag));
        assert_eq!(border(&tree), Some(HIGHLIGHT));

        let handled = deliver(
            &mut tree,
            id,
            &mut model,
            NativeEvent::Drop(vec!["image/png".into()], "x".into()),
        );
        assert_eq!(handled.response, Some(DndResponse::RejectDrop));
        assert_eq!(border(&tree), None, "a rejected drop still restores the border");
    }

    #[test]
    fn test_gesture_ends_once() {
        let mut tree = PeerTree::new();
        let id = field(&mut tree);
        enable(&mut tree, id, EventMask::DRAG_SOURCE);
        let mut model = MapModel::new();
        let origin = cgmath::Point2::new(1., 2.);

        assert_eq!(deliver(&mut tree, id, &mut model, NativeEvent::DragGesture(origin)).events.len(), 1);
        assert!(deliver(&mut tree, id, &mut model, NativeEvent::DragGesture(origin)).events.is_empty());
        let ended = deliver(&mut tree, id, &mut model, NativeEvent::DragCancel);
        assert_eq!(ended.events[0].kind(), EventKind::DragEnd);
        assert!(deliver(&mut tree, id, &mut model, NativeEvent::WindowDeactivated).events.is_empty());
        assert!(deliver(&mut tree, id, &mut model, NativeEvent::DragDropEnd).events.is_empty());
    }
}
