//! # Module Composition
//!
//! Modules are the units a pipeline is composed of. A module owns a fixed
//! set of connectors and events, declares routes between them, and
//! implements the processing logic in the [`Module`] trait's handlers.
//!
//! Modules are added to a graph with [`Graph::add_module`], which hands the
//! constructor a [`ModuleSetup`] for declaring the module's endpoints:
//!
//! ```
//! use packetweave::connector::ConnectorId;
//! use packetweave::graph::Graph;
//! use packetweave::module::Module;
//!
//! /// Forwards every item from its passive input to its active output.
//! struct Forwarder {
//!   input: ConnectorId,
//!   output: ConnectorId,
//! }
//!
//! impl Module<u32> for Forwarder {
//!   fn on_request(&mut self, graph: &mut Graph<u32>, connector: ConnectorId) {
//!     assert_eq!(connector, self.input);
//!     if let Some(item) = graph.read(self.input) {
//!       graph.send(self.output, item);
//!     }
//!   }
//! }
//!
//! let mut graph: Graph<u32> = Graph::new("example");
//! let forwarder = graph.add_module("forwarder", |m| {
//!   let input = m.passive_input("input");
//!   let output = m.active_output("output");
//!   m.route(input, output).id();
//!   Forwarder { input, output }
//! });
//! # let _ = forwarder;
//! ```
//!
//! Every connector must appear in a `route()` declaration or be explicitly
//! declared terminal with `no_route()` before [`Graph::init`] will accept
//! the graph; without flow information the throttle state of the connector
//! would be undefined.
//!
//! [`Graph::add_module`]: crate::graph::Graph::add_module
//! [`Graph::init`]: crate::graph::Graph::init

use crate::Item;
use crate::connector::{ConnectorId, ConnectorKind};
use crate::error::contract_violation;
use crate::event::{EventId, EventKind};
use crate::graph::Graph;
use crate::queueing::QueueingDiscipline;
use crate::route::{Endpoint, RouteRef};
use std::any::Any;
use std::collections::VecDeque;
use std::marker::PhantomData;

/// Identifier of a module within its [`Graph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleId(pub(crate) usize);

/// Behaviour of a pipeline module.
///
/// All handlers run synchronously on the single thread that drives the
/// graph, within the call stack of whatever external event initiated them.
/// A handler may itself push or pull on other connectors; the graph tolerates
/// this re-entrancy for acyclic wirings and traps when the dispatch depth
/// bound is exceeded.
///
/// Handlers receive the [`Graph`] itself as context; the module's own state
/// is borrowed out of the graph for the duration of the call, so handlers
/// have full mutable access to both.
pub trait Module<T: Item>: Any {
  /// Called exactly once per module, after the graph for a run has been
  /// wired and before the run loop starts — or, for modules added while the
  /// graph is running, as soon as the current handler returns. Must not
  /// assume any ordering relative to other modules' `init`.
  fn init(&mut self, graph: &mut Graph<T>) {
    let _ = graph;
  }

  /// A passive connector of this module was signaled: an item arrived on a
  /// passive input, or a connected active input requests an item from a
  /// passive output.
  ///
  /// The default implementation treats the call as a contract violation —
  /// every module with passive connectors that can be signaled must handle
  /// it.
  fn on_request(&mut self, graph: &mut Graph<T>, connector: ConnectorId) {
    let _ = graph;
    let _ = connector;
    contract_violation("module received a request but does not implement on_request");
  }

  /// An active connector of this module became throttled.
  fn on_throttle(&mut self, graph: &mut Graph<T>, connector: ConnectorId) {
    let _ = graph;
    let _ = connector;
  }

  /// An active connector of this module became unthrottled.
  fn on_unthrottle(&mut self, graph: &mut Graph<T>, connector: ConnectorId) {
    let _ = graph;
    let _ = connector;
  }

  /// An event registered by this module was delivered by the scheduler.
  fn on_event(&mut self, graph: &mut Graph<T>, event: EventId) {
    let _ = graph;
    let _ = event;
    contract_violation("module registered an event but does not implement on_event");
  }
}

/// Typed handle to a module stored in a graph.
///
/// Handles are cheap ids; they stay valid until the module is removed. Use
/// [`Graph::module`]/[`Graph::module_mut`] to borrow the concrete module
/// back, or [`Graph::with_module`] to drive it with graph context.
///
/// [`Graph::module`]: crate::graph::Graph::module
/// [`Graph::module_mut`]: crate::graph::Graph::module_mut
/// [`Graph::with_module`]: crate::graph::Graph::with_module
pub struct ModuleHandle<M> {
  pub(crate) id: ModuleId,
  marker: PhantomData<fn() -> M>,
}

impl<M> ModuleHandle<M> {
  pub(crate) fn new(id: ModuleId) -> Self {
    Self {
      id,
      marker: PhantomData,
    }
  }

  /// The untyped module id behind this handle.
  pub fn id(&self) -> ModuleId {
    self.id
  }
}

impl<M> Clone for ModuleHandle<M> {
  fn clone(&self) -> Self {
    *self
  }
}

impl<M> Copy for ModuleHandle<M> {}

impl<M> std::fmt::Debug for ModuleHandle<M> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_tuple("ModuleHandle").field(&self.id.0).finish()
  }
}

/// Handler invocation deferred because its module was already on the call
/// stack. Drained as soon as the module's current handler returns.
#[derive(Debug, Clone, Copy)]
pub(crate) enum PendingCall {
  Request(ConnectorId),
  Throttle(ConnectorId),
  Unthrottle(ConnectorId),
  Event(EventId),
}

/// Per-module bookkeeping held by the graph.
pub(crate) struct ModuleSlot<T> {
  pub(crate) name: String,
  /// `None` while the module is dispatched into or after removal.
  pub(crate) module: Option<Box<dyn Module<T>>>,
  pub(crate) removed: bool,
  pub(crate) connectors: Vec<ConnectorId>,
  pub(crate) events: Vec<EventId>,
  pub(crate) routes: Vec<crate::route::RouteId>,
  pub(crate) no_route: Vec<ConnectorId>,
  pub(crate) pending: VecDeque<PendingCall>,
  pub(crate) init_scheduled: bool,
}

impl<T> ModuleSlot<T> {
  pub(crate) fn new(name: String) -> Self {
    Self {
      name,
      module: None,
      removed: false,
      connectors: Vec::new(),
      events: Vec::new(),
      routes: Vec::new(),
      no_route: Vec::new(),
      pending: VecDeque::new(),
      init_scheduled: false,
    }
  }
}

/// Declaration context for a module's connectors, events and routes.
///
/// Passed to the constructor closure of [`Graph::add_module`] and returned
/// by [`Graph::extend`] for modules (joins, routers) that grow connectors
/// dynamically after construction.
///
/// [`Graph::add_module`]: crate::graph::Graph::add_module
/// [`Graph::extend`]: crate::graph::Graph::extend
pub struct ModuleSetup<'a, T: Item> {
  pub(crate) graph: &'a mut Graph<T>,
  pub(crate) module: ModuleId,
}

impl<'a, T: Item> ModuleSetup<'a, T> {
  /// The id of the module being set up.
  pub fn module_id(&self) -> ModuleId {
    self.module
  }

  /// Declares a connector that actively reads items from a connected
  /// passive output.
  pub fn active_input(&mut self, name: &str) -> ConnectorId {
    self
      .graph
      .alloc_connector(self.module, name, ConnectorKind::ActiveInput)
  }

  /// Declares a connector that actively sends items to a connected passive
  /// input.
  pub fn active_output(&mut self, name: &str) -> ConnectorId {
    self
      .graph
      .alloc_connector(self.module, name, ConnectorKind::ActiveOutput)
  }

  /// Declares a connector that receives items pushed by a connected active
  /// output. Starts with the default queueing discipline
  /// (`ThresholdQueueing::new(1, 0)`).
  pub fn passive_input(&mut self, name: &str) -> ConnectorId {
    self
      .graph
      .alloc_connector(self.module, name, ConnectorKind::PassiveInput)
  }

  /// Declares a connector that provides items to a connected active input
  /// whenever signaled.
  pub fn passive_output(&mut self, name: &str) -> ConnectorId {
    self
      .graph
      .alloc_connector(self.module, name, ConnectorKind::PassiveOutput)
  }

  /// Replaces the queueing discipline of a passive input declared by this
  /// module.
  ///
  /// # Panics
  ///
  /// Panics if `connector` is not a passive input of this module.
  pub fn qdisc(&mut self, connector: ConnectorId, qdisc: impl QueueingDiscipline) {
    self
      .graph
      .set_qdisc(self.module, connector, Some(Box::new(qdisc)));
  }

  /// Like [`qdisc`](Self::qdisc), taking an already boxed discipline.
  pub fn qdisc_boxed(&mut self, connector: ConnectorId, qdisc: Box<dyn QueueingDiscipline>) {
    self.graph.set_qdisc(self.module, connector, Some(qdisc));
  }

  /// Removes the queueing discipline of a passive input declared by this
  /// module; its native throttle state is then driven manually only.
  ///
  /// # Panics
  ///
  /// Panics if `connector` is not a passive input of this module.
  pub fn no_qdisc(&mut self, connector: ConnectorId) {
    self.graph.set_qdisc(self.module, connector, None);
  }

  /// Declares flow information between two endpoints of this module and
  /// returns a handle for adjusting the new route.
  ///
  /// A connector source must be an input and a connector target an output —
  /// within a module, data conceptually flows from inputs (or the event
  /// controlling reception) to outputs (or the event controlling
  /// generation).
  ///
  /// # Panics
  ///
  /// Panics on endpoint combinations that cannot form a route: endpoints of
  /// another module, a connector source that is not an input, a connector
  /// target that is not an output, or two events.
  pub fn route(
    &mut self,
    source: impl Into<Endpoint>,
    target: impl Into<Endpoint>,
  ) -> RouteRef<'_> {
    self
      .graph
      .add_route(self.module, source.into(), target.into())
  }

  /// Declares a connector of this module as deliberately terminal: it
  /// forwards no throttle information, but its flow role is accounted for.
  ///
  /// # Panics
  ///
  /// Panics if `connector` does not belong to this module.
  pub fn no_route(&mut self, connector: ConnectorId) {
    self.graph.mark_no_route(self.module, connector);
  }

  /// Registers an external event for this module. The module's
  /// [`Module::on_event`] handler is called whenever the scheduler delivers
  /// it.
  pub fn event(&mut self, name: &str, kind: EventKind) -> EventId {
    self.graph.alloc_event(self.module, name, kind)
  }
}
