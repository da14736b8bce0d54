//! The UI context: owns the peers, the registry and the model, and runs work on the UI thread.

use crate::adapter::Handled;
use crate::binding::{MapModel, Model};
use crate::builder::{BuildError, Builder};
use crate::config::UiConfig;
use crate::descriptor::{Document, NodeId};
use crate::events::{EventHandler, PortableEvent};
use crate::peer_tree::{PeerError, PeerId, PeerTree};
use crate::registry::Registry;
use crate::resource::{DirResources, MemoryResources, Resources};
use crate::timer::{TimerId, Timers};
use crate::toolkit::NativeEvent;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

type Task = Box<dyn FnOnce(&mut Ui) + Send>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DispatchError {
    #[error("the UI is gone")]
    Disconnected,
    #[error("call_and_wait on the UI thread would never return")]
    WouldDeadlock,
    #[error("UI task panicked: {0}")]
    Panicked(String),
}

/// Owns everything peers are made of.
///
/// A `Ui` stays on the thread that created it. Other threads reach it through a [`UiHandle`].
pub struct Ui {
    pub(crate) registry: Registry,
    pub(crate) peers: PeerTree,
    pub(crate) resources: Resources,
    pub(crate) model: Box<dyn Model>,
    config: UiConfig,
    builder: Builder,
    timers: Timers,
    repaints: Vec<NodeId>,
    task_send: Sender<Task>,
    task_recv: Receiver<Task>,
    thread: ThreadId,
}

impl Ui {
    /// Creates a UI with the default configuration and an empty in-memory model.
    pub fn new() -> Ui {
        Ui::with_config(UiConfig::default())
    }

    pub fn with_config(config: UiConfig) -> Ui {
        let resources = match &config.resource_root {
            Some(root) => Resources::new(Box::new(DirResources::new(root.clone()))),
            None => Resources::new(Box::new(MemoryResources::new())),
        };
        let (task_send, task_recv) = channel::unbounded();

        Ui {
            registry: Registry::with_toolkit(),
            peers: PeerTree::new(),
            resources,
            model: Box::new(MapModel::new()),
            builder: Builder::new(&config),
            config,
            timers: Timers::default(),
            repaints: Vec::new(),
            task_send,
            task_recv,
            thread: thread::current().id(),
        }
    }

    pub fn config(&self) -> &UiConfig {
        &self.config
    }

    pub fn peers(&self) -> &PeerTree {
        &self.peers
    }

    pub fn peers_mut(&mut self) -> &mut PeerTree {
        &mut self.peers
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn resources_mut(&mut self) -> &mut Resources {
        &mut self.resources
    }

    pub fn builder(&self) -> &Builder {
        &self.builder
    }

    pub fn set_builder(&mut self, builder: Builder) {
        self.builder = builder;
    }

    pub fn model(&self) -> &dyn Model {
        &*self.model
    }

    pub fn model_mut(&mut self) -> &mut dyn Model {
        &mut *self.model
    }

    /// Replaces the model bindings read from and write to.
    pub fn set_model(&mut self, model: impl Model + 'static) {
        self.model = Box::new(model);
    }

    /// Materializes a whole document with this UI’s builder.
    pub fn build(&mut self, doc: &mut Document) -> Result<PeerId, BuildError> {
        let builder = self.builder;
        builder.build(self, doc)
    }

    pub fn request_repaint(&mut self, node: NodeId) {
        trace!(?node, "repaint requested");
        self.repaints.push(node);
    }

    /// Drains repaint requests in the order they were made.
    pub fn take_repaints(&mut self) -> Vec<NodeId> {
        std::mem::replace(&mut self.repaints, Vec::new())
    }

    /// Returns a handle other threads can use to run code on this UI.
    pub fn handle(&self) -> UiHandle {
        UiHandle {
            send: self.task_send.clone(),
            thread: self.thread,
        }
    }

    /// Runs queued tasks and due timers. Returns how many ran.
    pub fn poll(&mut self) -> usize {
        self.poll_at(Instant::now())
    }

    /// Like [`poll`](Ui::poll), with timers judged against `now`.
    pub fn poll_at(&mut self, now: Instant) -> usize {
        let mut ran = 0;
        loop {
            match self.task_recv.try_recv() {
                Ok(task) => {
                    task(self);
                    ran += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }

        for (id, mut callback) in self.timers.take_due(now) {
            trace!(timer = ?id, "firing timer");
            callback(self);
            self.timers.put_back(id, callback);
            ran += 1;
        }
        self.commit_deselected();
        ran
    }

    /// Waits for a task or the next timer, at most one timer period, then polls.
    pub fn run_once(&mut self) -> usize {
        let now = Instant::now();
        let mut timeout = self.config.timer_period();
        if let Some(deadline) = self.timers.next_deadline() {
            timeout = timeout.min(deadline.saturating_duration_since(now));
        }
        let mut ran = 0;
        match self.task_recv.recv_timeout(timeout) {
            Ok(task) => {
                task(self);
                ran += 1;
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => (),
        }
        ran + self.poll()
    }

    /// Adds a repeating timer, first firing one period from now.
    pub fn add_timer<F: 'static + FnMut(&mut Ui)>(&mut self, period: Duration, callback: F) -> TimerId {
        self.timers.add(period, Instant::now(), Box::new(callback))
    }

    pub fn remove_timer(&mut self, id: TimerId) -> bool {
        self.timers.remove(id)
    }

    pub fn stop_timer(&mut self, id: TimerId) -> bool {
        self.timers.stop(id)
    }

    pub fn restart_timer(&mut self, id: TimerId) -> bool {
        self.timers.restart(id, Instant::now())
    }

    pub fn is_timer_running(&self, id: TimerId) -> bool {
        self.timers.is_running(id)
    }

    /// Sets the controller handling portable events from this peer and its descendants.
    pub fn set_handler(&mut self, peer: PeerId, handler: EventHandler) -> Result<(), PeerError> {
        let ext = self.peers.ext_mut(peer).ok_or(PeerError::NoSuchPeer(peer))?;
        ext.handler = Some(handler);
        Ok(())
    }

    /// The controller owning a peer’s events: the nearest one on the peer or its ancestors.
    pub fn handler_for(&self, peer: PeerId) -> Option<&EventHandler> {
        let mut current = Some(peer);
        while let Some(id) = current {
            if let Some(handler) = self.peers.ext(id).and_then(|ext| ext.handler.as_ref()) {
                return Some(handler);
            }
            current = self.peers.parent(id);
        }
        None
    }

    fn dispatch(&self, event: &PortableEvent) {
        match self.handler_for(event.source()) {
            Some(handler) => handler.call(event),
            None => trace!(kind = ?event.kind(), "no controller for event"),
        }
    }

    /// Delivers a native event to a peer’s listener.
    ///
    /// Events for listeners the peer doesn’t have attached are dropped, like the toolkit would.
    /// Resulting portable events go to the owning controller and are also returned.
    pub fn deliver(&mut self, peer: PeerId, native: NativeEvent) -> Result<Handled, PeerError> {
        let ext = self.peers.ext_mut(peer).ok_or(PeerError::NoSuchPeer(peer))?;
        let mut adapter = match ext.adapter.take() {
            Some(adapter) => adapter,
            None => return Ok(Handled::default()),
        };
        if !adapter.attached().contains(native.listener()) {
            ext.adapter = Some(adapter);
            return Ok(Handled::default());
        }

        let highlight = (self.config.drop_highlight_width, self.config.drop_highlight);
        let mut handled = adapter.handle(&mut self.peers, peer, &mut *self.model, &native, highlight);
        if let Some(ext) = self.peers.ext_mut(peer) {
            ext.adapter = Some(adapter);
        }
        for event in &handled.events {
            self.dispatch(event);
        }
        handled.events.extend(self.commit_deselected());
        Ok(handled)
    }

    /// Commits a peer’s value if it changed since the last snapshot.
    pub fn verify(&mut self, peer: PeerId) -> Result<Option<PortableEvent>, PeerError> {
        let ext = self.peers.ext_mut(peer).ok_or(PeerError::NoSuchPeer(peer))?;
        let mut adapter = match ext.adapter.take() {
            Some(adapter) => adapter,
            None => return Ok(None),
        };
        let event = adapter.verify(&mut self.peers, peer, &mut *self.model);
        if let Some(ext) = self.peers.ext_mut(peer) {
            ext.adapter = Some(adapter);
        }
        if let Some(event) = &event {
            self.dispatch(event);
        }
        self.commit_deselected();
        Ok(event)
    }

    /// Commits the bindings of peers their exclusive group deselected, and dispatches the
    /// resulting value change events.
    pub fn commit_deselected(&mut self) -> Vec<PortableEvent> {
        let mut events = Vec::new();
        for peer in self.peers.take_deselected() {
            let mut adapter = match self.peers.ext_mut(peer).and_then(|ext| ext.adapter.take()) {
                Some(adapter) => adapter,
                None => continue,
            };
            let event = adapter.verify(&mut self.peers, peer, &mut *self.model);
            if let Some(ext) = self.peers.ext_mut(peer) {
                ext.adapter = Some(adapter);
            }
            if let Some(event) = event {
                trace!(?peer, "committed deselected peer");
                self.dispatch(&event);
                events.push(event);
            }
        }
        events
    }
}

impl Default for Ui {
    fn default() -> Ui {
        Ui::new()
    }
}

impl Drop for Ui {
    fn drop(&mut self) {
        let pending = self.task_recv.len();
        if pending > 0 {
            debug!(pending, "dropping UI with queued tasks");
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".into()
    }
}

/// Sends work to the UI thread from anywhere.
#[derive(Debug, Clone)]
pub struct UiHandle {
    send: Sender<Task>,
    thread: ThreadId,
}

impl UiHandle {
    /// Queues `f` to run on the UI thread and returns immediately.
    pub fn schedule<F: 'static + FnOnce(&mut Ui) + Send>(&self, f: F) -> Result<(), DispatchError> {
        self.send.send(Box::new(f)).map_err(|_| DispatchError::Disconnected)
    }

    /// Runs `f` on the UI thread and waits for its result.
    ///
    /// A panic in `f` is caught on the UI thread and returned as [`DispatchError::Panicked`].
    pub fn call_and_wait<T, F>(&self, f: F) -> Result<T, DispatchError>
    where
        T: 'static + Send,
        F: 'static + FnOnce(&mut Ui) -> T + Send,
    {
        if thread::current().id() == self.thread {
            return Err(DispatchError::WouldDeadlock);
        }
        let (result_send, result_recv) = channel::bounded(1);
        self.schedule(move |ui| {
            let result = panic::catch_unwind(AssertUnwindSafe(|| f(ui))).map_err(panic_message);
            let _ = result_send.send(result);
        })?;
        match result_recv.recv() {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(message)) => Err(DispatchError::Panicked(message)),
            Err(_) => Err(DispatchError::Disconnected),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{Binding, Conversion, SharedModel};
    use crate::descriptor::Element;
    use crate::events::{EventKind, EventMask, Modifiers};
    use crate::toolkit::{Listeners, TextField};
    use crate::value::Value;
    use parking_lot::Mutex;
    use std::cell::Cell;
    use std::rc::Rc;
    use std::sync::Arc;

    #[test]
    fn test_call_and_wait() {
        let mut ui = Ui::new();
        let handle = ui.handle();
        assert_eq!(handle.call_and_wait(|_| 1), Err(DispatchError::WouldDeadlock));

        let worker = thread::spawn(move || {
            let len = handle.call_and_wait(|ui| ui.peers().len());
            let panicked = handle.call_and_wait(|_| -> usize { panic!("no peers for you") });
            handle.schedule(|ui| ui.request_repaint(NodeId::new())).unwrap();
            (len, panicked)
        });
        let mut ran = 0;
        while ran < 3 {
            ran += ui.run_once();
        }
        let (len, panicked) = worker.join().unwrap();
        assert_eq!(len, Ok(0));
        assert_eq!(panicked, Err(DispatchError::Panicked("no peers for you".into())));
        assert_eq!(ui.take_repaints().len(), 1);
    }

    #[test]
    fn test_disconnected() {
        let handle = Ui::new().handle();
        assert_eq!(handle.schedule(|_| ()), Err(DispatchError::Disconnected));
    }

    #[test]
    fn test_timers() {
        let mut ui = Ui::new();
        let fired = Rc::new(Cell::new(0));
        let count = Rc::clone(&fired);
        let start = Instant::now();
        let timer = ui.add_timer(Duration::from_millis(10), move |_| count.set(count.get() + 1));

        assert_eq!(ui.poll_at(start), 0);
        ui.poll_at(start + Duration::from_secs(1));
        assert_eq!(fired.get(), 1);

        assert!(ui.stop_timer(timer));
        assert!(!ui.is_timer_running(timer));
        ui.poll_at(start + Duration::from_secs(10));
        assert_eq!(fired.get(), 1);

        assert!(ui.restart_timer(timer));
        ui.poll_at(Instant::now() + Duration::from_secs(1));
        assert_eq!(fired.get(), 2);
        assert!(ui.remove_timer(timer));
        assert!(!ui.restart_timer(timer));
    }

    #[test]
    fn test_controller_receives_commits() {
        let mut ui = Ui::new();
        let model = SharedModel::new(MapModel::new().with("UserName", "Ada"));
        ui.set_model(model.clone());

        let element = Element::new("panel").child(
            Element::new("textfield")
                .attr("name", "user")
                .events(EventMask::ACTION)
                .bind(Binding::new("Value", "UserName", Conversion::None)),
        );
        let mut doc = Document::from_element(element);
        let root = ui.build(&mut doc).unwrap();
        let field = doc.cached_peer(&ui, doc.find("user").unwrap()).unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        ui.set_handler(root, EventHandler::new(move |event| {
            log.lock().push((event.kind(), event.name().map(str::to_string)))
        }))
        .unwrap();

        // unattached listener kinds are never delivered
        assert!(ui.deliver(field, NativeEvent::StateChanged).unwrap().events.is_empty());
        assert_eq!(ui.peers().get(field).unwrap().widget().listener_count(Listeners::FOCUS), 1);

        ui.deliver(field, NativeEvent::FocusGained).unwrap();
        ui.peers_mut().set_property(field, "Text", Value::text("Grace")).unwrap();
        ui.deliver(field, NativeEvent::Action(Modifiers::default())).unwrap();
        ui.deliver(field, NativeEvent::FocusLost).unwrap();

        assert_eq!(model.snapshot().get("UserName"), Some(Value::text("Grace")));
        assert_eq!(ui.peers().downcast::<TextField>(field).unwrap().text, "Grace");
        let seen = seen.lock();
        let kinds: Vec<_> = seen.iter().map(|(kind, _)| *kind).collect();
        assert_eq!(kinds, vec![EventKind::Action, EventKind::ValueChanged]);
        assert_eq!(seen[1].1.as_deref(), Some("user"));
        assert!(ui.verify(field).unwrap().is_none());
    }

    #[test]
    fn test_deselected_radio_commits() {
        let mut ui = Ui::new();
        let model = SharedModel::new(MapModel::new().with("A", true).with("B", false));
        ui.set_model(model.clone());
        let radio = |name: &str| {
            Element::new("radio")
                .attr("name", name)
                .attr("group", "Mode")
                .bind(Binding::new("Selected", name, Conversion::None))
        };
        let mut doc = Document::from_element(Element::new("panel").child(radio("A")).child(radio("B")));
        ui.build(&mut doc).unwrap();
        let a = doc.cached_peer(&ui, doc.find("A").unwrap()).unwrap();
        let b = doc.cached_peer(&ui, doc.find("B").unwrap()).unwrap();
        assert_eq!(ui.peers().property(a, "Selected"), Some(Value::Bool(true)));

        ui.peers_mut().set_property(b, "Selected", Value::Bool(true)).unwrap();
        let handled = ui.deliver(b, NativeEvent::ItemStateChanged).unwrap();
        let sources: Vec<_> = handled.events.iter().map(|e| (e.kind(), e.source())).collect();
        assert_eq!(
            sources,
            vec![(EventKind::ValueChanged, b), (EventKind::ValueChanged, a)]
        );
        assert_eq!(ui.peers().property(a, "Selected"), Some(Value::Bool(false)));
        assert_eq!(model.snapshot().get("A"), Some(Value::Bool(false)));
        assert_eq!(model.snapshot().get("B"), Some(Value::Bool(true)));

        // nothing left over for the next poll
        assert!(ui.commit_deselected().is_empty());
    }
}
