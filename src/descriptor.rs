//! Descriptor trees.
//!
//! A [`Document`] is the retained, mutable descriptor tree. Each node caches the peer it was last
//! materialized into; every setter drops that cache and the peer is rebuilt the next time it is
//! asked for. [`Element`] is the owned, serializable form of the same tree.

use crate::binding::Binding;
use crate::builder::{BuildError, GroupScope};
use crate::events::EventMask;
use crate::host::Ui;
use crate::peer_tree::{JoinPolicy, PeerError, PeerId};
use crate::value::{CoerceError, Value, ValueKind};
use std::collections::HashMap;
use tracing::{trace, warn};
use uuid::Uuid;

/// A unique identifier for a descriptor node.
///
/// (this is just a UUID)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32, u16, u16, [u8; 8]);

impl NodeId {
    pub(crate) fn new() -> NodeId {
        let uuid = Uuid::new_v4();
        let (a, b, c, d) = uuid.as_fields();
        NodeId(a, b, c, *d)
    }
}

/// The attribute vocabulary: name, kind, the peer property it configures and its default.
///
/// Attributes without a property are consumed by the builder itself. Unlisted attributes are text
/// and aren’t applied.
const ATTRIBUTES: &[(&str, ValueKind, Option<&str>, Option<&str>)] = &[
    ("name", ValueKind::Text, None, None),
    ("group", ValueKind::Text, None, None),
    ("image", ValueKind::Text, None, None),
    ("drop-flavors", ValueKind::Text, None, None),
    ("text", ValueKind::Text, Some("Text"), None),
    ("tooltip", ValueKind::Text, Some("Tooltip"), None),
    ("title", ValueKind::Text, Some("Title"), None),
    ("items", ValueKind::Text, Some("Items"), None),
    ("align", ValueKind::Enum, Some("Align"), None),
    ("x", ValueKind::Int, None, Some("0")),
    ("y", ValueKind::Int, None, Some("0")),
    ("width", ValueKind::Int, None, None),
    ("height", ValueKind::Int, None, None),
    ("margin", ValueKind::Int, Some("Margin"), None),
    ("min", ValueKind::Int, Some("Minimum"), None),
    ("max", ValueKind::Int, Some("Maximum"), None),
    ("value", ValueKind::Int, Some("Value"), None),
    ("selected-index", ValueKind::Int, Some("SelectedIndex"), None),
    ("enabled", ValueKind::Bool, Some("Enabled"), Some("true")),
    ("visible", ValueKind::Bool, Some("Visible"), Some("true")),
    ("selected", ValueKind::Bool, Some("Selected"), Some("false")),
    ("editable", ValueKind::Bool, Some("Editable"), Some("true")),
    ("background", ValueKind::Color, Some("Background"), None),
    ("foreground", ValueKind::Color, Some("Foreground"), None),
    ("opacity", ValueKind::Float, Some("Opacity"), Some("1")),
];

fn vocabulary(name: &str) -> Option<&'static (&'static str, ValueKind, Option<&'static str>, Option<&'static str>)> {
    ATTRIBUTES.iter().find(|entry| entry.0 == name)
}

/// The kind of an attribute’s value.
pub fn attr_kind(name: &str) -> ValueKind {
    vocabulary(name).map_or(ValueKind::Text, |entry| entry.1)
}

/// The peer property an attribute configures.
pub fn attr_property(name: &str) -> Option<&'static str> {
    vocabulary(name).and_then(|entry| entry.2)
}

/// The value an absent attribute is assumed to have.
pub fn attr_default(name: &str) -> Option<Value> {
    let entry = vocabulary(name)?;
    Value::parse(entry.1, entry.3?).ok()
}

/// Names the markup uses for the event list and the real type override.
pub fn is_reserved(name: &str) -> bool {
    name == "events" || name == "class"
}

/// Coerces a value for an attribute, rejecting reserved names.
fn attr_value(name: &str, value: Value) -> Result<Value, DocumentError> {
    if is_reserved(name) {
        return Err(DocumentError::Reserved(name.to_string()));
    }
    value.coerce(attr_kind(name)).map_err(|source| DocumentError::Value {
        name: name.to_string(),
        source,
    })
}

/// Whether changing the attribute only moves the peer.
pub fn is_positional(name: &str) -> bool {
    name == "x" || name == "y"
}

/// Ordered, typed attributes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes(Vec<(String, Value)>);

impl Attributes {
    pub fn new() -> Attributes {
        Attributes::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Sets an attribute, keeping its position if it already exists.
    pub fn set(&mut self, name: &str, value: Value) {
        match self.0.iter_mut().find(|(n, _)| n == name) {
            Some((_, v)) => *v = value,
            None => self.0.push((name.to_string(), value)),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let index = self.0.iter().position(|(n, _)| n == name)?;
        Some(self.0.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The declarative part of a node.
#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor {
    /// Selects the default peer class.
    pub tag: String,
    pub attrs: Attributes,
    pub bindings: Vec<Binding>,
    pub events: EventMask,
    /// A class name that replaces the tag’s default class.
    pub type_override: Option<String>,
}

impl Descriptor {
    pub fn new(tag: impl Into<String>) -> Descriptor {
        Descriptor {
            tag: tag.into(),
            attrs: Attributes::new(),
            bindings: Vec::new(),
            events: EventMask::empty(),
            type_override: None,
        }
    }

    /// Adds a binding, replacing any binding on the same property.
    pub fn add_binding(&mut self, binding: Binding) {
        self.bindings.retain(|b| b.property() != binding.property());
        self.bindings.push(binding);
    }
}

/// An owned descriptor tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub descriptor: Descriptor,
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Element {
        Element {
            descriptor: Descriptor::new(tag),
            children: Vec::new(),
        }
    }

    /// Sets an attribute, converted to the attribute’s kind.
    pub fn set_attr(&mut self, name: &str, value: impl Into<Value>) -> Result<(), DocumentError> {
        let value = attr_value(name, value.into())?;
        self.descriptor.attrs.set(name, value);
        Ok(())
    }

    /// Builder form of [`set_attr`](Element::set_attr). Values that can’t be set are logged and
    /// left out.
    pub fn attr(mut self, name: &str, value: impl Into<Value>) -> Element {
        if let Err(err) = self.set_attr(name, value) {
            warn!(tag = %self.descriptor.tag, %err, "dropping attribute");
        }
        self
    }

    pub fn bind(mut self, binding: Binding) -> Element {
        self.descriptor.add_binding(binding);
        self
    }

    pub fn events(mut self, events: EventMask) -> Element {
        self.descriptor.events = events;
        self
    }

    pub fn class(mut self, name: impl Into<String>) -> Element {
        self.descriptor.type_override = Some(name.into());
        self
    }

    pub fn child(mut self, child: Element) -> Element {
        self.children.push(child);
        self
    }

    /// A copy without attributes that are set to their default value.
    pub fn normalized(&self) -> Element {
        let mut descriptor = self.descriptor.clone();
        descriptor.attrs.0.retain(|(name, value)| attr_default(name).as_ref() != Some(value));
        Element {
            descriptor,
            children: self.children.iter().map(Element::normalized).collect(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("no such node: {0:?}")]
    NoSuchNode(NodeId),
    #[error("the root node can’t be removed")]
    RemoveRoot,
    #[error("{0:?} is reserved and can’t be an attribute")]
    Reserved(String),
    #[error("attribute {name:?}: {source}")]
    Value {
        name: String,
        #[source]
        source: CoerceError,
    },
    #[error(transparent)]
    Peer(#[from] PeerError),
}

/// A node of a [`Document`].
#[derive(Debug)]
pub struct DescriptorNode {
    descriptor: Descriptor,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    /// Derived; never serialized.
    peer: Option<PeerId>,
}

impl DescriptorNode {
    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// The retained descriptor tree.
#[derive(Debug)]
pub struct Document {
    nodes: HashMap<NodeId, DescriptorNode>,
    root: NodeId,
}

impl Document {
    pub fn new(root: Descriptor) -> Document {
        Document::from_element(Element {
            descriptor: root,
            children: Vec::new(),
        })
    }

    pub fn from_element(element: Element) -> Document {
        let mut doc = Document {
            nodes: HashMap::new(),
            root: NodeId::new(),
        };
        doc.root = doc.insert_element(None, element);
        doc
    }

    fn insert_element(&mut self, parent: Option<NodeId>, element: Element) -> NodeId {
        let id = NodeId::new();
        self.nodes.insert(
            id,
            DescriptorNode {
                descriptor: element.descriptor,
                parent,
                children: Vec::new(),
                peer: None,
            },
        );
        for child in element.children {
            let child_id = self.insert_element(Some(id), child);
            if let Some(node) = self.nodes.get_mut(&id) {
                node.children.push(child_id);
            }
        }
        id
    }

    /// The subtree rooted at `id` in owned form.
    pub fn element(&self, id: NodeId) -> Option<Element> {
        let node = self.nodes.get(&id)?;
        Some(Element {
            descriptor: node.descriptor.clone(),
            children: node
                .children
                .iter()
                .filter_map(|child| self.element(*child))
                .collect(),
        })
    }

    pub fn to_element(&self) -> Element {
        match self.element(self.root) {
            Some(element) => element,
            None => unreachable!("the root node is never removed"),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&DescriptorNode> {
        self.nodes.get(&id)
    }

    pub fn descriptor(&self, id: NodeId) -> Option<&Descriptor> {
        self.nodes.get(&id).map(|node| &node.descriptor)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes.get(&id).map_or(&[], |node| &node.children)
    }

    /// Node ids in depth-first order, starting at the root.
    pub fn walk(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.children(id).iter().rev());
        }
        out
    }

    /// The first node (depth-first) whose `name` attribute is `name`.
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.walk().into_iter().find(|id| {
            self.descriptor(*id)
                .and_then(|d| d.attrs.get("name"))
                .and_then(Value::as_str)
                == Some(name)
        })
    }

    /// The cached peer, if it is still alive.
    pub fn cached_peer(&self, ui: &Ui, id: NodeId) -> Option<PeerId> {
        self.nodes
            .get(&id)
            .and_then(|node| node.peer)
            .filter(|peer| ui.peers().contains(*peer))
    }

    pub(crate) fn set_peer(&mut self, id: NodeId, peer: PeerId) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.peer = Some(peer);
        }
    }

    pub(crate) fn take_peer(&mut self, id: NodeId) -> Option<PeerId> {
        self.nodes.get_mut(&id).and_then(|node| node.peer.take())
    }

    /// Groups joined by the document’s live peers, by name.
    pub(crate) fn live_groups(&self, ui: &Ui) -> GroupScope {
        let mut scope = GroupScope::new(JoinPolicy::TakeOver);
        for id in self.walk() {
            let group = self
                .cached_peer(ui, id)
                .and_then(|peer| ui.peers().ext(peer))
                .and_then(|ext| ext.group);
            if let Some(group) = group {
                if let Some(name) = ui.peers().group_name(group) {
                    scope.insert(name, group);
                }
            }
        }
        scope
    }

    /// Returns the node’s peer, materializing it if the cache is empty.
    ///
    /// A rebuilt peer reuses its children’s cached peers and is put back into its parent’s peer in
    /// descriptor order.
    pub fn peer(&mut self, ui: &mut Ui, id: NodeId) -> Result<PeerId, BuildError> {
        if let Some(peer) = self.cached_peer(ui, id) {
            return Ok(peer);
        }
        if !self.nodes.contains_key(&id) {
            return Err(BuildError::NoSuchNode(id));
        }
        let builder = *ui.builder();
        let mut scope = self.live_groups(ui);
        let peer = builder.materialize_in(ui, self, id, &mut scope, false)?;

        let parent = match self.nodes.get(&id).and_then(|node| node.parent) {
            Some(parent) => parent,
            None => return Ok(peer),
        };
        if let Some(parent_peer) = self.cached_peer(ui, parent) {
            let index = self
                .children(parent)
                .iter()
                .take_while(|sibling| **sibling != id)
                .filter(|sibling| {
                    self.cached_peer(ui, **sibling)
                        .map_or(false, |p| ui.peers().parent(p) == Some(parent_peer))
                })
                .count();
            ui.peers_mut().attach(parent_peer, peer, index)?;
        }
        Ok(peer)
    }

    /// Materializes every node whose peer isn’t cached and returns the root peer.
    pub fn refresh(&mut self, ui: &mut Ui) -> Result<PeerId, BuildError> {
        for id in self.walk() {
            self.peer(ui, id)?;
        }
        self.peer(ui, self.root)
    }

    /// Drops the node’s cached peer and requests a repaint.
    pub fn invalidate(&mut self, ui: &mut Ui, id: NodeId) -> Result<(), DocumentError> {
        if !self.nodes.contains_key(&id) {
            return Err(DocumentError::NoSuchNode(id));
        }
        if let Some(peer) = self.take_peer(id) {
            if ui.peers().contains(peer) {
                trace!(?id, ?peer, "invalidating node");
                ui.peers_mut().discard(peer)?;
            }
        }
        ui.request_repaint(id);
        Ok(())
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut DescriptorNode, DocumentError> {
        self.nodes.get_mut(&id).ok_or(DocumentError::NoSuchNode(id))
    }

    /// Sets an attribute.
    ///
    /// Positional attributes move the cached peer in place; anything else invalidates it.
    pub fn set_attr(&mut self, ui: &mut Ui, id: NodeId, name: &str, value: Value) -> Result<(), DocumentError> {
        let value = attr_value(name, value)?;

        if is_positional(name) {
            let coord = value.as_int().unwrap_or_default() as f64;
            self.node_mut(id)?.descriptor.attrs.set(name, value);
            if let Some(peer) = self.cached_peer(ui, id).and_then(|p| ui.peers_mut().get_mut(p)) {
                let origin = &mut peer.widget_mut().bounds.origin;
                if name == "x" {
                    origin.x = coord;
                } else {
                    origin.y = coord;
                }
            }
            ui.request_repaint(id);
            return Ok(());
        }

        self.node_mut(id)?.descriptor.attrs.set(name, value);
        self.invalidate(ui, id)
    }

    pub fn remove_attr(&mut self, ui: &mut Ui, id: NodeId, name: &str) -> Result<Option<Value>, DocumentError> {
        let removed = self.node_mut(id)?.descriptor.attrs.remove(name);
        if removed.is_some() {
            self.invalidate(ui, id)?;
        }
        Ok(removed)
    }

    pub fn set_type_override(&mut self, ui: &mut Ui, id: NodeId, class: Option<String>) -> Result<(), DocumentError> {
        self.node_mut(id)?.descriptor.type_override = class;
        self.invalidate(ui, id)
    }

    pub fn add_binding(&mut self, ui: &mut Ui, id: NodeId, binding: Binding) -> Result<(), DocumentError> {
        self.node_mut(id)?.descriptor.add_binding(binding);
        self.invalidate(ui, id)
    }

    pub fn set_events(&mut self, ui: &mut Ui, id: NodeId, events: EventMask) -> Result<(), DocumentError> {
        self.node_mut(id)?.descriptor.events = events;
        self.invalidate(ui, id)
    }

    /// Appends a subtree. The parent’s peer is invalidated.
    pub fn append_child(&mut self, ui: &mut Ui, parent: NodeId, child: Element) -> Result<NodeId, DocumentError> {
        self.node_mut(parent)?;
        let id = self.insert_element(Some(parent), child);
        self.node_mut(parent)?.children.push(id);
        self.invalidate(ui, parent)?;
        Ok(id)
    }

    /// Removes a subtree, discarding its peers. The parent’s peer is invalidated.
    pub fn remove_child(&mut self, ui: &mut Ui, id: NodeId) -> Result<Element, DocumentError> {
        if id == self.root {
            return Err(DocumentError::RemoveRoot);
        }
        let element = self.element(id).ok_or(DocumentError::NoSuchNode(id))?;
        let parent = self.nodes.get(&id).and_then(|node| node.parent);

        let mut stack = vec![id];
        while let Some(node_id) = stack.pop() {
            if let Some(node) = self.nodes.remove(&node_id) {
                stack.extend(node.children.iter().copied());
                if let Some(peer) = node.peer.filter(|peer| ui.peers().contains(*peer)) {
                    ui.peers_mut().discard(peer)?;
                }
            }
        }
        if let Some(parent) = parent {
            self.node_mut(parent)?.children.retain(|child| *child != id);
            self.invalidate(ui, parent)?;
        }
        Ok(element)
    }
}
