//! Keeps a tree of declarative descriptors in sync with live toolkit peers.
//!
//! A [`Document`] holds descriptor nodes; each node lazily materializes into a peer through the
//! [`Builder`], which asks the [`Registry`] for the [`Helper`](helper::Helper) that knows the peer’s
//! family. Peers live in the [`Ui`]’s [`PeerTree`] along with their bindings and event adapters.

pub mod adapter;
pub mod archive;
pub mod binding;
pub mod builder;
pub mod color;
pub mod config;
pub mod descriptor;
pub mod events;
pub mod helper;
mod host;
pub mod peer_tree;
mod rect;
pub mod registry;
pub mod resource;
mod timer;
pub mod toolkit;
pub mod value;

pub use adapter::{EventAdapter, Handled};
pub use binding::{Binding, Conversion, MapModel, Model, SharedModel};
pub use builder::{BuildError, Builder};
pub use color::Color;
pub use config::UiConfig;
pub use descriptor::{Document, Element, NodeId};
pub use events::{EventHandler, EventKind, EventMask, PortableEvent};
pub use host::{DispatchError, Ui, UiHandle};
pub use peer_tree::{PeerId, PeerTree};
pub use rect::Rect;
pub use registry::Registry;
pub use timer::TimerId;
pub use value::Value;
