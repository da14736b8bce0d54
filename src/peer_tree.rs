//! The live peer tree.

use crate::adapter::EventAdapter;
use crate::binding::Binding;
use crate::descriptor::NodeId;
use crate::events::EventHandler;
use crate::helper::{Helper, PropertyError};
use crate::toolkit::Peer;
use crate::value::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;
use uuid::Uuid;

/// A unique identifier for a peer.
///
/// (this is just a UUID)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeerId(u32, u16, u16, [u8; 8]);

impl PeerId {
    pub(crate) fn new() -> PeerId {
        let uuid = Uuid::new_v4();
        let (a, b, c, d) = uuid.as_fields();
        PeerId(a, b, c, *d)
    }
}

/// Identifies an exclusive-selection group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupId(u32);

/// How a toggle joining a group resolves a conflicting selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinPolicy {
    /// An already selected member stays selected; the newcomer is deselected.
    KeepExisting,
    /// A selected newcomer deselects the other members.
    TakeOver,
}

#[derive(Debug)]
struct Group {
    name: String,
    members: Vec<PeerId>,
}

/// Everything this crate attaches to a peer.
#[derive(Debug)]
pub struct PeerExt {
    pub helper: Arc<dyn Helper>,
    /// Created on the first event enablement.
    pub adapter: Option<EventAdapter>,
    pub bindings: Vec<Binding>,
    pub group: Option<GroupId>,
    /// The descriptor node this peer was materialized from.
    pub node: Option<NodeId>,
    /// The `name` attribute of that node.
    pub name: Option<String>,
    pub handler: Option<EventHandler>,
}

#[derive(Debug)]
struct PeerNode {
    peer: Box<dyn Peer>,
    ext: PeerExt,
    parent: Option<PeerId>,
    children: Vec<PeerId>,
}

/// Errors from peer tree operations.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    #[error("no such peer: {0:?}")]
    NoSuchPeer(PeerId),
    #[error("attaching {0:?} would create a cycle")]
    Cycle(PeerId),
    #[error(transparent)]
    Property(#[from] PropertyError),
}

/// The arena of live peers, their parent/child structure and exclusive groups.
#[derive(Debug, Default)]
pub struct PeerTree {
    nodes: HashMap<PeerId, PeerNode>,
    groups: HashMap<GroupId, Group>,
    next_group: u32,
    /// Peers deselected by their group whose bindings haven’t been committed yet.
    deselected: Vec<PeerId>,
}

impl PeerTree {
    pub fn new() -> PeerTree {
        PeerTree::default()
    }

    /// Adds a detached peer.
    pub fn insert(&mut self, peer: Box<dyn Peer>, helper: Arc<dyn Helper>) -> PeerId {
        let id = PeerId::new();
        self.nodes.insert(
            id,
            PeerNode {
                peer,
                ext: PeerExt {
                    helper,
                    adapter: None,
                    bindings: Vec::new(),
                    group: None,
                    node: None,
                    name: None,
                    handler: None,
                },
                parent: None,
                children: Vec::new(),
            },
        );
        id
    }

    pub fn contains(&self, id: PeerId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: PeerId) -> Option<&dyn Peer> {
        self.nodes.get(&id).map(|node| &*node.peer)
    }

    pub fn get_mut(&mut self, id: PeerId) -> Option<&mut dyn Peer> {
        match self.nodes.get_mut(&id) {
            Some(node) => Some(&mut *node.peer),
            None => None,
        }
    }

    /// Downcasts a peer to its concrete type.
    pub fn downcast<T: Peer>(&self, id: PeerId) -> Option<&T> {
        self.get(id).and_then(|peer| peer.as_any().downcast_ref::<T>())
    }

    pub fn ext(&self, id: PeerId) -> Option<&PeerExt> {
        self.nodes.get(&id).map(|node| &node.ext)
    }

    pub fn ext_mut(&mut self, id: PeerId) -> Option<&mut PeerExt> {
        self.nodes.get_mut(&id).map(|node| &mut node.ext)
    }

    /// Returns the peer and its extension record at once.
    pub(crate) fn split_mut(&mut self, id: PeerId) -> Result<(&mut dyn Peer, &mut PeerExt), PeerError> {
        match self.nodes.get_mut(&id) {
            Some(node) => Ok((&mut *node.peer, &mut node.ext)),
            None => Err(PeerError::NoSuchPeer(id)),
        }
    }

    pub fn helper(&self, id: PeerId) -> Option<Arc<dyn Helper>> {
        self.ext(id).map(|ext| Arc::clone(&ext.helper))
    }

    pub fn parent(&self, id: PeerId) -> Option<PeerId> {
        self.nodes.get(&id).and_then(|node| node.parent)
    }

    /// The peer's children in container order.
    pub fn children(&self, id: PeerId) -> &[PeerId] {
        self.nodes.get(&id).map_or(&[], |node| &node.children)
    }

    /// Attaches `child` to `parent` at `index`, detaching it from any previous parent first.
    ///
    /// The parent's helper performs the family-specific part of the attachment.
    pub fn attach(&mut self, parent: PeerId, child: PeerId, index: usize) -> Result<(), PeerError> {
        if !self.nodes.contains_key(&child) {
            return Err(PeerError::NoSuchPeer(child));
        }
        // walk up from the parent to make sure the child isn’t an ancestor
        let mut cursor = Some(parent);
        while let Some(id) = cursor {
            if id == child {
                return Err(PeerError::Cycle(child));
            }
            cursor = self.parent(id);
        }
        if self.parent(child).is_some() {
            self.detach(child)?;
        }

        // remove the parent node because we need to alias self.nodes when handing both peers to
        // the helper
        let mut parent_node = match self.nodes.remove(&parent) {
            Some(node) => node,
            None => return Err(PeerError::NoSuchPeer(parent)),
        };
        let index = index.min(parent_node.children.len());
        let result = {
            let child_node = &self.nodes[&child];
            parent_node
                .ext
                .helper
                .attach_child(&mut *parent_node.peer, &*child_node.peer, index)
        };
        if result.is_ok() {
            parent_node.children.insert(index, child);
        }
        self.nodes.insert(parent, parent_node);
        result?;

        if let Some(node) = self.nodes.get_mut(&child) {
            node.parent = Some(parent);
        }
        trace!(?parent, ?child, index, "attached peer");
        Ok(())
    }

    /// Detaches a peer from its parent. Does nothing if the peer has no parent.
    pub fn detach(&mut self, child: PeerId) -> Result<(), PeerError> {
        let parent = match self.nodes.get(&child) {
            Some(node) => node.parent,
            None => return Err(PeerError::NoSuchPeer(child)),
        };
        let parent = match parent {
            Some(parent) => parent,
            None => return Ok(()),
        };
        if let Some(parent_node) = self.nodes.get_mut(&parent) {
            if let Some(index) = parent_node.children.iter().position(|c| *c == child) {
                parent_node.children.remove(index);
                parent_node
                    .ext
                    .helper
                    .detach_child(&mut *parent_node.peer, index);
            }
        }
        if let Some(node) = self.nodes.get_mut(&child) {
            node.parent = None;
        }
        Ok(())
    }

    /// Discards a peer: detaches it from its parent, orphans its children, detaches all of its
    /// native listeners and removes it from its group.
    ///
    /// The children stay alive; they belong to descriptor nodes of their own.
    pub fn discard(&mut self, id: PeerId) -> Result<(), PeerError> {
        self.detach(id)?;
        let mut node = match self.nodes.remove(&id) {
            Some(node) => node,
            None => return Err(PeerError::NoSuchPeer(id)),
        };
        for child in node.children.drain(..) {
            if let Some(child_node) = self.nodes.get_mut(&child) {
                child_node.parent = None;
            }
        }
        if let Some(mut adapter) = node.ext.adapter.take() {
            adapter.detach_all(&mut *node.peer);
        }
        if let Some(group_id) = node.ext.group {
            let empty = match self.groups.get_mut(&group_id) {
                Some(group) => {
                    group.members.retain(|m| *m != id);
                    group.members.is_empty()
                }
                None => false,
            };
            if empty {
                trace!(group = ?group_id, "dropping empty group");
                self.groups.remove(&group_id);
            }
        }
        self.deselected.retain(|d| *d != id);
        trace!(?id, "discarded peer");
        Ok(())
    }

    /// Reads a property through the peer's helper.
    pub fn property(&self, id: PeerId, property: &str) -> Option<Value> {
        let node = self.nodes.get(&id)?;
        node.ext.helper.get(&*node.peer, property)
    }

    /// Writes a property through the peer's helper, keeping exclusive groups consistent.
    pub fn set_property(&mut self, id: PeerId, property: &str, value: Value) -> Result<(), PeerError> {
        let group = {
            let (peer, ext) = self.split_mut(id)?;
            ext.helper.set(peer, property, value)?;
            ext.group
        };
        if let Some(group) = group {
            self.enforce_exclusive(group, id, JoinPolicy::TakeOver);
        }
        Ok(())
    }

    /// Creates a new, empty group.
    pub fn new_group(&mut self, name: &str) -> GroupId {
        let id = GroupId(self.next_group);
        self.next_group += 1;
        self.groups.insert(
            id,
            Group {
                name: name.to_string(),
                members: Vec::new(),
            },
        );
        id
    }

    pub fn group_name(&self, group: GroupId) -> Option<&str> {
        self.groups.get(&group).map(|g| g.name.as_str())
    }

    /// Number of live groups.
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Takes the peers that lost their selection to another group member since the last call.
    pub(crate) fn take_deselected(&mut self) -> Vec<PeerId> {
        std::mem::replace(&mut self.deselected, Vec::new())
    }

    pub fn group_members(&self, group: GroupId) -> &[PeerId] {
        self.groups.get(&group).map_or(&[], |g| &g.members)
    }

    /// Members of the group whose toggle is selected.
    pub fn selected_in_group(&self, group: GroupId) -> Vec<PeerId> {
        self.group_members(group)
            .iter()
            .copied()
            .filter(|m| self.is_selected(*m))
            .collect()
    }

    fn is_selected(&self, id: PeerId) -> bool {
        self.get(id)
            .and_then(|peer| peer.as_toggle())
            .map_or(false, |toggle| toggle.is_selected())
    }

    /// Adds a peer to a group.
    pub fn join_group(&mut self, id: PeerId, group: GroupId, policy: JoinPolicy) -> Result<(), PeerError> {
        match self.groups.get_mut(&group) {
            Some(g) => {
                if !g.members.contains(&id) {
                    g.members.push(id);
                }
            }
            None => return Ok(()),
        }
        self.ext_mut(id).ok_or(PeerError::NoSuchPeer(id))?.group = Some(group);
        self.enforce_exclusive(group, id, policy);
        Ok(())
    }

    /// Makes sure at most one member of `group` is selected after `member` changed.
    fn enforce_exclusive(&mut self, group: GroupId, member: PeerId, policy: JoinPolicy) {
        if !self.is_selected(member) {
            return;
        }
        let others: Vec<_> = self
            .group_members(group)
            .iter()
            .copied()
            .filter(|m| *m != member && self.is_selected(*m))
            .collect();
        if others.is_empty() {
            return;
        }
        let to_clear = match policy {
            JoinPolicy::KeepExisting => vec![member],
            JoinPolicy::TakeOver => others,
        };
        for id in to_clear {
            if let Some(toggle) = self.get_mut(id).and_then(|peer| peer.as_toggle_mut()) {
                toggle.set_selected(false);
                if !self.deselected.contains(&id) {
                    self.deselected.push(id);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helper::{ContainerHelper, ToggleHelper, WidgetHelper};
    use crate::toolkit::{Button, Panel, RADIO_BUTTON};

    fn radio(tree: &mut PeerTree, selected: bool) -> PeerId {
        let mut button = Button::new(&RADIO_BUTTON);
        button.selected = selected;
        tree.insert(Box::new(button), Arc::new(ToggleHelper))
    }

    #[test]
    fn test_attach_detach() {
        let mut tree = PeerTree::new();
        let root = tree.insert(Box::new(Panel::default()), Arc::new(ContainerHelper));
        let a = tree.insert(Box::new(Panel::default()), Arc::new(ContainerHelper));
        let b = tree.insert(Box::new(Panel::default()), Arc::new(WidgetHelper));

        tree.attach(root, a, 0).unwrap();
        tree.attach(root, b, 0).unwrap();
        assert_eq!(tree.children(root), &[b, a]);
        assert_eq!(tree.parent(a), Some(root));

        // reattaching moves the peer
        tree.attach(a, b, 5).unwrap();
        assert_eq!(tree.children(root), &[a]);
        assert_eq!(tree.children(a), &[b]);

        match tree.attach(b, root, 0) {
            Err(PeerError::Cycle(id)) => assert_eq!(id, root),
            other => panic!("expected a cycle error, got {:?}", other),
        }

        tree.discard(a).unwrap();
        assert!(!tree.contains(a));
        assert_eq!(tree.children(root), &[] as &[PeerId]);
        assert_eq!(tree.parent(b), None, "children of a discarded peer are orphaned");
    }

    #[test]
    fn test_group_policies() {
        let mut tree = PeerTree::new();
        let group = tree.new_group("Mode");
        let a = radio(&mut tree, true);
        let b = radio(&mut tree, true);
        let c = radio(&mut tree, true);

        tree.join_group(a, group, JoinPolicy::KeepExisting).unwrap();
        tree.join_group(b, group, JoinPolicy::KeepExisting).unwrap();
        assert_eq!(tree.selected_in_group(group), vec![a]);

        tree.join_group(c, group, JoinPolicy::TakeOver).unwrap();
        assert_eq!(tree.selected_in_group(group), vec![c]);

        tree.set_property(b, "Selected", Value::Bool(true)).unwrap();
        assert_eq!(tree.selected_in_group(group), vec![b]);
        assert_eq!(tree.group_name(group), Some("Mode"));
        assert_eq!(tree.take_deselected(), vec![b, a, c]);
        assert!(tree.take_deselected().is_empty());
    }

    #[test]
    fn test_empty_groups_are_dropped() {
        let mut tree = PeerTree::new();
        let group = tree.new_group("Mode");
        let a = radio(&mut tree, false);
        let b = radio(&mut tree, false);
        tree.join_group(a, group, JoinPolicy::KeepExisting).unwrap();
        tree.join_group(b, group, JoinPolicy::KeepExisting).unwrap();

        tree.discard(a).unwrap();
        assert_eq!(tree.group_name(group), Some("Mode"));
        tree.discard(b).unwrap();
        assert_eq!(tree.group_name(group), None);
        assert_eq!(tree.group_count(), 0);
    }
}
