//! Materializes descriptor nodes into peers.

use crate::config::UiConfig;
use crate::descriptor::{Descriptor, Document, NodeId};
use crate::events::EventMask;
use crate::helper::PropertyError;
use crate::host::Ui;
use crate::peer_tree::{GroupId, JoinPolicy, PeerError, PeerId, PeerTree};
use crate::registry::Registry;
use crate::toolkit::PeerClass;
use crate::value::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Configuration errors; these abort materialization.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("no such node: {0:?}")]
    NoSuchNode(NodeId),
    #[error("no peer class for tag {0:?}")]
    UnknownTag(String),
    #[error("unknown peer type {0:?}")]
    UnknownPeerType(String),
    #[error("{0} can’t be instantiated")]
    NotInstantiable(&'static str),
    #[error("no helper for {0} or any of its ancestors")]
    NoHelper(&'static str),
    #[error("{parent} can’t contain a {child}")]
    NotAContainer {
        parent: &'static str,
        child: &'static str,
    },
    #[error(transparent)]
    Peer(#[from] PeerError),
}

/// Name → group map for one materialization pass.
#[derive(Debug)]
pub struct GroupScope {
    groups: HashMap<String, GroupId>,
    policy: JoinPolicy,
}

impl GroupScope {
    pub fn new(policy: JoinPolicy) -> GroupScope {
        GroupScope {
            groups: HashMap::new(),
            policy,
        }
    }

    pub fn policy(&self) -> JoinPolicy {
        self.policy
    }

    pub(crate) fn with_policy(mut self, policy: JoinPolicy) -> GroupScope {
        self.policy = policy;
        self
    }

    pub(crate) fn insert(&mut self, name: &str, group: GroupId) {
        self.groups.entry(name.to_string()).or_insert(group);
    }

    /// The group for `name`, created on first use or when the known one has been dropped.
    pub fn group(&mut self, peers: &mut PeerTree, name: &str) -> GroupId {
        if let Some(group) = self.groups.get(name) {
            if peers.group_name(*group).is_some() {
                return *group;
            }
        }
        let group = peers.new_group(name);
        self.groups.insert(name.to_string(), group);
        group
    }
}

/// Builds peers from descriptor nodes.
#[derive(Debug, Clone, Copy)]
pub struct Builder {
    use_type_overrides: bool,
}

impl Default for Builder {
    fn default() -> Builder {
        Builder {
            use_type_overrides: true,
        }
    }
}

impl Builder {
    pub fn new(config: &UiConfig) -> Builder {
        Builder {
            use_type_overrides: config.use_type_overrides,
        }
    }

    /// Whether nodes’ real type overrides are honored.
    pub fn with_type_overrides(mut self, enabled: bool) -> Builder {
        self.use_type_overrides = enabled;
        self
    }

    pub fn uses_type_overrides(&self) -> bool {
        self.use_type_overrides
    }

    /// The class a descriptor materializes as.
    pub fn class_for(&self, registry: &Registry, descriptor: &Descriptor) -> Result<&'static PeerClass, BuildError> {
        if self.use_type_overrides {
            if let Some(name) = &descriptor.type_override {
                return registry
                    .class_named(name)
                    .ok_or_else(|| BuildError::UnknownPeerType(name.clone()));
            }
        }
        registry
            .class_for_tag(&descriptor.tag)
            .ok_or_else(|| BuildError::UnknownTag(descriptor.tag.clone()))
    }

    /// Materializes the whole document with a fresh group scope. Returns the root peer.
    pub fn build(&self, ui: &mut Ui, doc: &mut Document) -> Result<PeerId, BuildError> {
        let mut scope = GroupScope::new(JoinPolicy::KeepExisting);
        let root = doc.root();
        self.materialize_in(ui, doc, root, &mut scope, true)
    }

    /// Builds a new peer for one node, reusing its children’s cached peers.
    pub fn materialize(&self, ui: &mut Ui, doc: &mut Document, node: NodeId) -> Result<PeerId, BuildError> {
        let mut scope = doc.live_groups(ui);
        self.materialize_in(ui, doc, node, &mut scope, false)
    }

    /// Builds new peers for a node and all of its descendants.
    pub fn materialize_deep(&self, ui: &mut Ui, doc: &mut Document, node: NodeId) -> Result<PeerId, BuildError> {
        let mut scope = doc.live_groups(ui).with_policy(JoinPolicy::KeepExisting);
        self.materialize_in(ui, doc, node, &mut scope, true)
    }

    /// Materializes `id`. On failure every peer built by this call is discarded and the node is
    /// left uncached.
    pub(crate) fn materialize_in(
        &self,
        ui: &mut Ui,
        doc: &mut Document,
        id: NodeId,
        scope: &mut GroupScope,
        deep: bool,
    ) -> Result<PeerId, BuildError> {
        let mut built = Vec::new();
        let result = self.materialize_node(ui, doc, id, scope, deep, &mut built);
        if result.is_err() {
            for node in built.into_iter().rev() {
                if let Some(peer) = doc.take_peer(node) {
                    if ui.peers.contains(peer) {
                        ui.peers.discard(peer)?;
                    }
                }
            }
        }
        result
    }

    fn materialize_node(
        &self,
        ui: &mut Ui,
        doc: &mut Document,
        id: NodeId,
        scope: &mut GroupScope,
        deep: bool,
        built: &mut Vec<NodeId>,
    ) -> Result<PeerId, BuildError> {
        let node = doc.node(id).ok_or(BuildError::NoSuchNode(id))?;
        let descriptor = node.descriptor().clone();
        let children = node.children().to_vec();
        if let Some(old) = doc.take_peer(id) {
            if ui.peers.contains(old) {
                ui.peers.discard(old)?;
            }
        }

        let class = self.class_for(&ui.registry, &descriptor)?;
        let construct = class.construct.ok_or(BuildError::NotInstantiable(class.name))?;
        let mut peer = construct();
        let helper = ui.registry.resolve(class)?;
        helper.configure(&mut *peer, &descriptor.attrs, &mut ui.resources);

        let pid = ui.peers.insert(peer, Arc::clone(&helper));
        doc.set_peer(id, pid);
        built.push(id);
        if let Some(ext) = ui.peers.ext_mut(pid) {
            ext.node = Some(id);
            ext.name = descriptor
                .attrs
                .get("name")
                .and_then(Value::as_str)
                .map(str::to_string);
        }
        for binding in &descriptor.bindings {
            ui.peers.add_binding(pid, binding)?;
        }

        let mut events = descriptor.events;
        if !descriptor.bindings.is_empty() {
            events |= EventMask::VALUE_CHANGE;
        }
        if !events.is_empty() {
            ui.peers.enable_events(pid, events)?;
            let flavors = descriptor.attrs.get("drop-flavors").and_then(Value::as_str);
            let adapter = ui.peers.ext_mut(pid).and_then(|ext| ext.adapter.as_mut());
            if let (Some(flavors), Some(adapter)) = (flavors, adapter) {
                adapter.set_accepted_flavors(
                    flavors
                        .split(',')
                        .map(str::trim)
                        .filter(|f| !f.is_empty())
                        .map(str::to_string)
                        .collect(),
                );
            }
        }

        if let Some(name) = descriptor.attrs.get("group").and_then(Value::as_str) {
            let group = scope.group(&mut ui.peers, name);
            ui.peers.join_group(pid, group, scope.policy())?;
        }

        for (index, child) in children.iter().enumerate() {
            let child_peer = match doc.cached_peer(ui, *child) {
                Some(peer) if !deep => peer,
                _ => self.materialize_node(ui, doc, *child, scope, deep, built)?,
            };
            ui.peers
                .attach(pid, child_peer, index)
                .map_err(|err| match err {
                    PeerError::Property(PropertyError::Child { child, .. }) => BuildError::NotAContainer {
                        parent: class.name,
                        child,
                    },
                    err => BuildError::Peer(err),
                })?;
        }

        // after the children, so pushed selections can refer to items
        for binding in ui.peers.bindings(pid).to_vec() {
            if let Err(err) = ui.peers.push(pid, &binding, &*ui.model) {
                warn!(key = binding.key(), %err, "initial push failed");
            }
        }
        debug!(class = class.name, ?id, peer = ?pid, "materialized");
        Ok(pid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{Binding, Conversion, MapModel};
    use crate::descriptor::Element;
    use crate::helper::ToggleHelper;
    use crate::toolkit::{Button, ChoiceBox, Listeners, Peer, TextField, BUTTON};

    static FANCY_BUTTON: PeerClass = PeerClass {
        name: "app::FancyButton",
        parent: Some(&BUTTON),
        construct: Some({
            fn construct() -> Box<dyn Peer> {
                Box::new(Button::new(&FANCY_BUTTON))
            }
            construct as fn() -> Box<dyn Peer>
        }),
        nested_helper: None,
    };

    fn scenario() -> Element {
        Element::new("panel")
            .child(
                Element::new("textfield")
                    .attr("name", "user")
                    .bind(Binding::new("Value", "UserName", Conversion::None)),
            )
            .child(
                Element::new("radio")
                    .attr("name", "first")
                    .attr("selected", true)
                    .attr("group", "Mode"),
            )
            .child(
                Element::new("radio")
                    .attr("name", "second")
                    .attr("selected", true)
                    .attr("group", "Mode"),
            )
    }

    #[test]
    fn test_example_scenario() {
        let mut ui = Ui::new();
        ui.set_model(MapModel::new().with("UserName", "Ada"));
        let mut doc = Document::from_element(scenario());
        let root = ui.build(&mut doc).unwrap();
        assert_eq!(ui.peers().children(root).len(), 3);

        let user = doc.cached_peer(&ui, doc.find("user").unwrap()).unwrap();
        assert_eq!(ui.peers().downcast::<TextField>(user).unwrap().text, "Ada");
        assert_eq!(ui.peers().get(user).unwrap().widget().listener_count(Listeners::FOCUS), 1);

        let first = doc.cached_peer(&ui, doc.find("first").unwrap()).unwrap();
        let second = doc.cached_peer(&ui, doc.find("second").unwrap()).unwrap();
        let group = ui.peers().ext(first).unwrap().group.unwrap();
        assert_eq!(ui.peers().ext(second).unwrap().group, Some(group));
        assert_eq!(ui.peers().selected_in_group(group), vec![first]);

        // rebuilding one node alone lets it take over the selection
        let second_node = doc.find("second").unwrap();
        doc.set_attr(&mut ui, second_node, "text", Value::text("B")).unwrap();
        let rebuilt = doc.peer(&mut ui, second_node).unwrap();
        assert_eq!(ui.peers().selected_in_group(group), vec![rebuilt]);
    }

    #[test]
    fn test_configuration_errors() {
        let mut ui = Ui::new();
        let mut doc = Document::from_element(Element::new("panel").child(Element::new("gauge")));
        match ui.build(&mut doc) {
            Err(BuildError::UnknownTag(tag)) => assert_eq!(tag, "gauge"),
            other => panic!("expected UnknownTag, got {:?}", other),
        }

        let mut doc = Document::from_element(Element::new("button").class("roost::toolkit::AbstractButton"));
        assert!(matches!(ui.build(&mut doc), Err(BuildError::NotInstantiable(_))));

        let mut doc = Document::from_element(Element::new("button").class("app::Missing"));
        assert!(matches!(ui.build(&mut doc), Err(BuildError::UnknownPeerType(_))));

        let mut doc = Document::from_element(Element::new("label").child(Element::new("button")));
        match ui.build(&mut doc) {
            Err(BuildError::NotAContainer { parent, .. }) => assert_eq!(parent, "roost::toolkit::Label"),
            other => panic!("expected NotAContainer, got {:?}", other),
        }
    }

    #[test]
    fn test_failed_build_leaves_nothing_behind() {
        let mut ui = Ui::new();
        let element = Element::new("panel").child(
            Element::new("label")
                .attr("group", "Mode")
                .child(Element::new("button").attr("name", "inner")),
        );
        let mut doc = Document::from_element(element);
        assert!(matches!(ui.build(&mut doc), Err(BuildError::NotAContainer { .. })));
        assert_eq!(ui.peers().len(), 0);
        assert_eq!(ui.peers().group_count(), 0);
        for id in doc.walk() {
            assert_eq!(doc.cached_peer(&ui, id), None);
        }

        // later accesses fail the same way instead of handing out a partial tree
        let root = doc.root();
        assert!(matches!(doc.peer(&mut ui, root), Err(BuildError::NotAContainer { .. })));
        assert!(matches!(doc.refresh(&mut ui), Err(BuildError::NotAContainer { .. })));
        assert_eq!(ui.peers().len(), 0);
    }

    #[test]
    fn test_deep_rebuild_replaces_dropped_group() {
        let mut ui = Ui::new();
        let element = Element::new("panel").child(
            Element::new("radio")
                .attr("name", "only")
                .attr("selected", true)
                .attr("group", "Mode"),
        );
        let mut doc = Document::from_element(element);
        ui.build(&mut doc).unwrap();
        let radio = doc.find("only").unwrap();

        for _ in 0..3 {
            let root = doc.root();
            Builder::default().materialize_deep(&mut ui, &mut doc, root).unwrap();
            let peer = doc.cached_peer(&ui, radio).unwrap();
            let group = ui.peers().ext(peer).unwrap().group.unwrap();
            assert_eq!(ui.peers().group_name(group), Some("Mode"));
            assert_eq!(ui.peers().selected_in_group(group), vec![peer]);
            assert_eq!(ui.peers().group_count(), 1);
        }
    }

    #[test]
    fn test_type_overrides() {
        let mut ui = Ui::new();
        ui.registry_mut().register_class(None, &FANCY_BUTTON);
        let element = Element::new("button").attr("text", "Go").class("app::FancyButton");

        let mut doc = Document::from_element(element.clone());
        let peer = ui.build(&mut doc).unwrap();
        assert_eq!(ui.peers().get(peer).unwrap().class().name, "app::FancyButton");
        assert_eq!(ui.peers().helper(peer).unwrap().family(), "button");

        ui.registry_mut().register_helper(&FANCY_BUTTON, Arc::new(ToggleHelper));
        let peer = ui.build(&mut doc).unwrap();
        assert_eq!(ui.peers().helper(peer).unwrap().family(), "toggle");

        let builder = Builder::default().with_type_overrides(false);
        let mut doc = Document::from_element(element);
        let peer = builder.build(&mut ui, &mut doc).unwrap();
        assert_eq!(ui.peers().get(peer).unwrap().class().name, "roost::toolkit::Button");
    }

    #[test]
    fn test_items_before_push() {
        let mut ui = Ui::new();
        ui.set_model(MapModel::new().with("Color", "green"));
        let element = Element::new("combobox")
            .bind(Binding::new("Value", "Color", Conversion::None))
            .child(Element::new("item").attr("text", "red"))
            .child(Element::new("item").attr("text", "green"));
        let mut doc = Document::from_element(element);
        let peer = ui.build(&mut doc).unwrap();

        let combo = ui.peers().downcast::<ChoiceBox>(peer).unwrap();
        assert_eq!(combo.items, vec!["red", "green"]);
        assert_eq!(combo.selected, Some(1));
    }

    #[test]
    fn test_missing_image_is_not_fatal() {
        let mut ui = Ui::new();
        let mut doc = Document::from_element(
            Element::new("button").attr("image", "nope.png").attr("text", "Save"),
        );
        let peer = ui.build(&mut doc).unwrap();
        let button = ui.peers().downcast::<Button>(peer).unwrap();
        assert_eq!(button.text, "Save");
        assert!(button.widget.icon.is_none());
    }
}
