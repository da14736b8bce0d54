//! The capability registry: resolves peer classes to helpers.

use crate::builder::BuildError;
use crate::helper::{
    ButtonHelper, ChoiceHelper, ContainerHelper, Helper, RangeHelper, TabbedHelper, TableHelper,
    TextHelper, ToggleHelper, WidgetHelper,
};
use crate::toolkit::{self, PeerClass};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// Creates a helper discovered through a namespace.
pub type HelperFactory = fn() -> Arc<dyn Helper>;

/// Helper factories keyed by the simple name of the class they serve.
#[derive(Debug, Clone, Default)]
pub struct HelperNamespace {
    helpers: HashMap<String, HelperFactory>,
}

impl HelperNamespace {
    pub fn new() -> HelperNamespace {
        HelperNamespace::default()
    }

    pub fn register(&mut self, simple_name: impl Into<String>, factory: HelperFactory) {
        self.helpers.insert(simple_name.into(), factory);
    }

    pub fn get(&self, simple_name: &str) -> Option<HelperFactory> {
        self.helpers.get(simple_name).copied()
    }
}

/// Maps peer classes onto helpers.
///
/// Resolution order for a class: a helper registered for exactly that class, then the well-known
/// namespace by simple name, then the namespace the class is declared in, then the class’s nested
/// helper, then the parent class. Results are cached per class.
#[derive(Debug, Default)]
pub struct Registry {
    explicit: HashMap<&'static str, Arc<dyn Helper>>,
    well_known: HelperNamespace,
    namespaces: HashMap<String, HelperNamespace>,
    cache: HashMap<&'static str, Arc<dyn Helper>>,
    tags: HashMap<String, &'static PeerClass>,
    classes: HashMap<&'static str, &'static PeerClass>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Registry {
        Registry::default()
    }

    /// Creates a registry that knows the built-in toolkit classes and their helpers.
    pub fn with_toolkit() -> Registry {
        let mut registry = Registry::new();
        for &(tag, class) in toolkit::CLASSES {
            registry.register_class(Some(tag), class);
        }
        for &class in &[&toolkit::COMPONENT, &toolkit::ABSTRACT_BUTTON, &toolkit::TEXT_COMPONENT] {
            registry.register_class(None, class);
        }

        registry.register_helper(&toolkit::COMPONENT, Arc::new(WidgetHelper));
        registry.register_helper(&toolkit::PANEL, Arc::new(ContainerHelper));
        registry.register_helper(&toolkit::TABBED_PANE, Arc::new(TabbedHelper));
        registry.register_helper(&toolkit::TABLE, Arc::new(TableHelper));
        registry.register_helper(&toolkit::TEXT_COMPONENT, Arc::new(TextHelper));
        registry.register_helper(&toolkit::ABSTRACT_BUTTON, Arc::new(ButtonHelper));
        registry.register_helper(&toolkit::TOGGLE_BUTTON, Arc::new(ToggleHelper));
        registry.register_helper(&toolkit::COMBO_BOX, Arc::new(ChoiceHelper));
        registry.register_helper(&toolkit::SLIDER, Arc::new(RangeHelper));

        let ns = registry.well_known_mut();
        ns.register("ListBox", || -> Arc<dyn Helper> { Arc::new(ChoiceHelper) });
        for name in &["Label", "Item", "TableColumn"] {
            ns.register(*name, || -> Arc<dyn Helper> { Arc::new(TextHelper) });
        }
        registry
    }

    /// Registers a class, optionally under a descriptor tag.
    ///
    /// Registered classes can be named as real type overrides.
    pub fn register_class(&mut self, tag: Option<&str>, class: &'static PeerClass) {
        if let Some(tag) = tag {
            self.tags.insert(tag.to_string(), class);
        }
        self.classes.insert(class.name, class);
    }

    /// Registers a helper for exactly this class.
    pub fn register_helper(&mut self, class: &'static PeerClass, helper: Arc<dyn Helper>) {
        self.explicit.insert(class.name, helper);
        self.cache.clear();
    }

    /// The namespace consulted by simple class name for every class.
    pub fn well_known_mut(&mut self) -> &mut HelperNamespace {
        self.cache.clear();
        &mut self.well_known
    }

    /// Registers helpers for the classes declared in `path` (e.g. `app::widgets`).
    pub fn register_namespace(&mut self, path: impl Into<String>, namespace: HelperNamespace) {
        self.namespaces.insert(path.into(), namespace);
        self.cache.clear();
    }

    /// The default class for a descriptor tag.
    pub fn class_for_tag(&self, tag: &str) -> Option<&'static PeerClass> {
        self.tags.get(tag).copied()
    }

    /// A registered class by fully qualified name.
    pub fn class_named(&self, name: &str) -> Option<&'static PeerClass> {
        self.classes.get(name).copied()
    }

    /// Returns the most specific helper for the class.
    pub fn resolve(&mut self, class: &'static PeerClass) -> Result<Arc<dyn Helper>, BuildError> {
        if let Some(helper) = self.cache.get(class.name) {
            trace!(class = class.name, "helper cache hit");
            return Ok(Arc::clone(helper));
        }
        let helper = self
            .lookup(class)
            .ok_or(BuildError::NoHelper(class.name))?;
        debug!(class = class.name, family = helper.family(), "resolved helper");
        self.cache.insert(class.name, Arc::clone(&helper));
        Ok(helper)
    }

    fn lookup(&mut self, class: &'static PeerClass) -> Option<Arc<dyn Helper>> {
        if let Some(helper) = self.explicit.get(class.name) {
            return Some(Arc::clone(helper));
        }
        let simple_name = class.simple_name();
        if let Some(factory) = self.well_known.get(simple_name) {
            return Some(factory());
        }
        let declared = self
            .namespaces
            .get(class.namespace())
            .and_then(|ns| ns.get(simple_name));
        if let Some(factory) = declared {
            return Some(factory());
        }
        if let Some(factory) = class.nested_helper {
            return Some(factory());
        }
        trace!(class = class.name, "no helper, trying parent");
        let parent = class.parent?;
        self.resolve(parent).ok()
    }

    /// Number of classes with a cached helper.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolkit::{
        BUTTON, CHECK_BOX, LABEL, LIST_BOX, PASSWORD_FIELD, RADIO_BUTTON, SPINNER, TEXT_FIELD,
    };

    static FANCY: PeerClass = PeerClass {
        name: "app::widgets::FancyButton",
        parent: Some(&BUTTON),
        construct: None,
        nested_helper: None,
    };

    static PLAIN: PeerClass = PeerClass {
        name: "app::widgets::PlainButton",
        parent: Some(&BUTTON),
        construct: None,
        nested_helper: None,
    };

    static ORPHAN: PeerClass = PeerClass {
        name: "app::Orphan",
        parent: None,
        construct: None,
        nested_helper: None,
    };

    #[test]
    fn test_resolution_is_cached() {
        let mut registry = Registry::with_toolkit();
        let a = registry.resolve(&TEXT_FIELD).unwrap();
        let b = registry.resolve(&TEXT_FIELD).unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let password = registry.resolve(&PASSWORD_FIELD).unwrap();
        assert!(Arc::ptr_eq(&a, &password));
        assert_eq!(a.family(), "text");

        let check = registry.resolve(&CHECK_BOX).unwrap();
        let radio = registry.resolve(&RADIO_BUTTON).unwrap();
        assert!(Arc::ptr_eq(&check, &radio));
        assert_eq!(check.family(), "toggle");
    }

    #[test]
    fn test_conventions() {
        let mut registry = Registry::with_toolkit();
        assert_eq!(registry.resolve(&LABEL).unwrap().family(), "text");
        assert_eq!(registry.resolve(&LIST_BOX).unwrap().family(), "choice");
        assert_eq!(registry.resolve(&SPINNER).unwrap().family(), "range");

        let mut ns = HelperNamespace::new();
        ns.register("FancyButton", || -> Arc<dyn Helper> { Arc::new(ToggleHelper) });
        registry.register_namespace("app::widgets", ns);
        assert_eq!(registry.resolve(&FANCY).unwrap().family(), "toggle");

        let plain = registry.resolve(&PLAIN).unwrap();
        let button = registry.resolve(&BUTTON).unwrap();
        assert!(Arc::ptr_eq(&plain, &button));
    }

    #[test]
    fn test_explicit_wins() {
        let mut registry = Registry::with_toolkit();
        assert_eq!(registry.resolve(&LIST_BOX).unwrap().family(), "choice");
        registry.register_helper(&LIST_BOX, Arc::new(TextHelper));
        assert_eq!(registry.resolve(&LIST_BOX).unwrap().family(), "text");
    }

    #[test]
    fn test_exhausted_chain() {
        let mut registry = Registry::with_toolkit();
        match registry.resolve(&ORPHAN) {
            Err(BuildError::NoHelper(name)) => assert_eq!(name, "app::Orphan"),
            other => panic!("expected NoHelper, got {:?}", other),
        }
        assert_eq!(registry.class_for_tag("textfield").unwrap().name, TEXT_FIELD.name);
        assert!(registry.class_named("roost::toolkit::AbstractButton").is_some());
    }
}
