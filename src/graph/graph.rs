//! Graph structure: registries, wiring and module access.

use crate::Item;
use crate::connector::{ConnectorId, ConnectorKind, ConnectorState};
use crate::error::{ConfigError, contract_violation};
use crate::event::{EventId, EventKind, EventState};
use crate::module::{Module, ModuleHandle, ModuleId, ModuleSetup, ModuleSlot};
use crate::queueing::QueueingDiscipline;
use crate::route::{Endpoint, Forwarding, RouteId, RouteRef, RouteState};
use std::any::Any;
use std::collections::VecDeque;
use tracing::{debug, info};

/// Upper bound on synchronous handler nesting.
///
/// Deep chains stay far below this; only a cyclic wiring (a configuration
/// error, not a supported topology) can reach it, and hitting the bound
/// traps instead of overflowing the stack.
pub const MAX_DISPATCH_DEPTH: usize = 64;

/// Entry in the deferred-initialization queue.
#[derive(Debug, Clone, Copy)]
pub(crate) enum InitTarget {
  Module(ModuleId),
  Connector(ConnectorId),
}

/// A pipeline: modules wired through connectors, with routes propagating
/// flow-control state between them.
///
/// The graph owns all state. Modules, connectors, routes and events are
/// addressed by copyable ids; a connector's peer link is an id resolved
/// through the graph and cleared explicitly on disconnect, so the lifetime
/// of everything is governed by the graph alone.
///
/// A graph is generic over the item type `T` flowing through it — anything
/// `Debug + 'static`. One graph carries one item type.
///
/// # Example
///
/// ```
/// use packetweave::graph::Graph;
/// use packetweave::modules::debug::{ActiveSource, PassiveSink};
///
/// let mut graph: Graph<&str> = Graph::new("hello");
/// let source = ActiveSource::attach(&mut graph, "source");
/// let sink = PassiveSink::attach(&mut graph, "sink");
///
/// let output = graph.module(source).output;
/// let input = graph.module(sink).input;
/// graph.connect(output, input).unwrap();
/// graph.init().unwrap();
///
/// ActiveSource::submit(&mut graph, source, "hi");
/// assert_eq!(graph.module(sink).front(), Some(&"hi"));
/// ```
pub struct Graph<T: Item> {
  name: String,
  pub(crate) connectors: Vec<Option<ConnectorState<T>>>,
  pub(crate) modules: Vec<ModuleSlot<T>>,
  pub(crate) routes: Vec<Option<RouteState>>,
  pub(crate) events: Vec<Option<EventState>>,
  pub(crate) init_queue: VecDeque<InitTarget>,
  /// Current handler nesting depth.
  pub(crate) depth: usize,
  /// `init()` has validated the graph at least once.
  pub(crate) initialized: bool,
  /// The pending-init queue is currently being drained.
  pub(crate) in_init: bool,
}

impl<T: Item> Graph<T> {
  /// Creates an empty graph.
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      connectors: Vec::new(),
      modules: Vec::new(),
      routes: Vec::new(),
      events: Vec::new(),
      init_queue: VecDeque::new(),
      depth: 0,
      initialized: false,
      in_init: false,
    }
  }

  /// The graph's name.
  pub fn name(&self) -> &str {
    &self.name
  }

  // ---------------------------------------------------------------------
  // Modules
  // ---------------------------------------------------------------------

  /// Adds a module to the graph.
  ///
  /// The `build` closure receives a [`ModuleSetup`] to declare the module's
  /// connectors, events and routes, and returns the module value itself.
  /// The module (and its connectors) are initialized by the next
  /// [`init`](Self::init) call, or automatically when added while the graph
  /// is already running.
  pub fn add_module<M: Module<T>>(
    &mut self,
    name: impl Into<String>,
    build: impl FnOnce(&mut ModuleSetup<'_, T>) -> M,
  ) -> ModuleHandle<M> {
    let id = ModuleId(self.modules.len());
    let name = name.into();
    debug!(module = %name, id = id.0, "adding module");
    self.modules.push(ModuleSlot::new(name));
    // The module is initialized before its connectors, which are enqueued
    // by the build closure below.
    self.schedule_module_init(id);
    let mut setup = ModuleSetup {
      graph: self,
      module: id,
    };
    let module = build(&mut setup);
    self.modules[id.0].module = Some(Box::new(module));
    self.kick_init();
    ModuleHandle::new(id)
  }

  /// Reopens the declaration context of an existing module.
  ///
  /// Used by modules that grow connectors dynamically (joins, routers)
  /// after construction, possibly while the graph is running.
  ///
  /// # Panics
  ///
  /// Panics if the module was removed.
  pub fn extend(&mut self, module: ModuleId) -> ModuleSetup<'_, T> {
    if self.slot(module).removed {
      contract_violation("extend() on a removed module");
    }
    ModuleSetup {
      graph: self,
      module,
    }
  }

  /// Removes a module: disconnects all its connectors (each peer
  /// re-evaluates its throttle state as newly isolated), drops its routes
  /// and events, and frees the module value.
  pub fn remove_module(&mut self, module: ModuleId) -> Result<(), ConfigError> {
    let slot = self.slot(module);
    if slot.removed {
      return Err(ConfigError::ModuleRemoved { module });
    }
    if slot.module.is_none() {
      contract_violation("cannot remove a module from inside its own handler");
    }
    info!(module = %slot.name, "removing module");

    for cid in self.slot(module).connectors.clone() {
      if self.conn(cid).peer.is_some() {
        let _ = self.disconnect(cid);
      }
    }
    let slot = &mut self.modules[module.0];
    slot.module = None;
    slot.removed = true;
    slot.pending.clear();
    for rid in slot.routes.drain(..) {
      self.routes[rid.0] = None;
    }
    let events = std::mem::take(&mut self.modules[module.0].events);
    for eid in events {
      self.events[eid.0] = None;
    }
    let connectors = std::mem::take(&mut self.modules[module.0].connectors);
    for cid in connectors {
      self.connectors[cid.0] = None;
    }
    self.kick_init();
    Ok(())
  }

  /// Borrows a module by its typed handle.
  ///
  /// # Panics
  ///
  /// Panics if the module was removed, is currently dispatched into, or the
  /// handle's type does not match the stored module.
  pub fn module<M: Module<T>>(&self, handle: ModuleHandle<M>) -> &M {
    let slot = self.slot(handle.id);
    let module = slot
      .module
      .as_deref()
      .unwrap_or_else(|| contract_violation("module is removed or currently dispatched"));
    let any: &dyn Any = module;
    any
      .downcast_ref::<M>()
      .unwrap_or_else(|| contract_violation("module handle type mismatch"))
  }

  /// Mutably borrows a module by its typed handle.
  ///
  /// This borrows the module's state only — use
  /// [`with_module`](Self::with_module) when the borrow needs to perform
  /// graph operations (send, read, throttle) on the module's behalf.
  ///
  /// # Panics
  ///
  /// See [`module`](Self::module).
  pub fn module_mut<M: Module<T>>(&mut self, handle: ModuleHandle<M>) -> &mut M {
    let slot = &mut self.modules[handle.id.0];
    let module = slot
      .module
      .as_deref_mut()
      .unwrap_or_else(|| contract_violation("module is removed or currently dispatched"));
    let any: &mut dyn Any = module;
    any
      .downcast_mut::<M>()
      .unwrap_or_else(|| contract_violation("module handle type mismatch"))
  }

  /// The name a module was registered under.
  pub fn module_name(&self, module: ModuleId) -> &str {
    &self.slot(module).name
  }

  // ---------------------------------------------------------------------
  // Declaration plumbing (driven by ModuleSetup)
  // ---------------------------------------------------------------------

  pub(crate) fn alloc_connector(
    &mut self,
    module: ModuleId,
    name: &str,
    kind: ConnectorKind,
  ) -> ConnectorId {
    let id = ConnectorId(self.connectors.len());
    debug!(module = %self.slot(module).name, connector = %name, %kind, "declaring connector");
    self
      .connectors
      .push(Some(ConnectorState::new(module, name.to_string(), kind)));
    self.modules[module.0].connectors.push(id);
    self.schedule_connector_init(id);
    id
  }

  pub(crate) fn alloc_event(&mut self, module: ModuleId, name: &str, kind: EventKind) -> EventId {
    let id = EventId(self.events.len());
    debug!(module = %self.slot(module).name, event = %name, "registering event");
    self
      .events
      .push(Some(EventState::new(module, name.to_string(), kind)));
    self.modules[module.0].events.push(id);
    id
  }

  pub(crate) fn set_qdisc(
    &mut self,
    module: ModuleId,
    connector: ConnectorId,
    qdisc: Option<Box<dyn QueueingDiscipline>>,
  ) {
    let conn = self.conn(connector);
    if conn.module != module {
      contract_violation("qdisc() on a connector of another module");
    }
    if conn.kind != ConnectorKind::PassiveInput {
      contract_violation("a queueing discipline can only be set on a passive input");
    }
    self.conn_mut(connector).qdisc = qdisc;
  }

  pub(crate) fn mark_no_route(&mut self, module: ModuleId, connector: ConnectorId) {
    if self.conn(connector).module != module {
      contract_violation("no_route() on a connector of another module");
    }
    self.modules[module.0].no_route.push(connector);
  }

  pub(crate) fn add_route(
    &mut self,
    module: ModuleId,
    source: Endpoint,
    target: Endpoint,
  ) -> RouteRef<'_> {
    self.check_endpoint_owner(module, source);
    self.check_endpoint_owner(module, target);

    let forwarding = match (source, target) {
      (Endpoint::Connector(s), Endpoint::Connector(t)) => {
        let sk = self.conn(s).kind;
        let tk = self.conn(t).kind;
        if !sk.is_input() {
          contract_violation("route source connector must be an input");
        }
        if !tk.is_output() {
          contract_violation("route target connector must be an output");
        }
        match (sk.is_active(), tk.is_active()) {
          // Forward throttling: upstream starvation reaches the output.
          (true, false) => Some(Forwarding {
            notify_source: source,
            notify_target: target,
          }),
          // Backward throttling: downstream congestion reaches the input.
          (false, true) => Some(Forwarding {
            notify_source: target,
            notify_target: source,
          }),
          // Same-mode pairs declare flow structure only.
          _ => None,
        }
      }
      (Endpoint::Connector(c), Endpoint::Event(e))
      | (Endpoint::Event(e), Endpoint::Connector(c)) => {
        let kind = self.conn(c).kind;
        let connector_is_source = matches!(source, Endpoint::Connector(_));
        if connector_is_source && !kind.is_input() {
          contract_violation("route source connector must be an input");
        }
        if !connector_is_source && !kind.is_output() {
          contract_violation("route target connector must be an output");
        }
        if kind.is_active() {
          // Throttling the active connector disables the event.
          Some(Forwarding {
            notify_source: Endpoint::Connector(c),
            notify_target: Endpoint::Event(e),
          })
        } else {
          // Disabling the event throttles the passive connector.
          Some(Forwarding {
            notify_source: Endpoint::Event(e),
            notify_target: Endpoint::Connector(c),
          })
        }
      }
      (Endpoint::Event(_), Endpoint::Event(_)) => {
        contract_violation("cannot route an event to an event");
      }
    };

    let id = RouteId(self.routes.len());
    self.routes.push(Some(RouteState {
      source,
      target,
      forwarding,
      auto_throttling: true,
    }));
    self.modules[module.0].routes.push(id);

    if let Some(fw) = forwarding {
      match fw.notify_source {
        Endpoint::Connector(c) => self.conn_mut(c).notify_routes.push(id),
        Endpoint::Event(e) => self.event_mut(e).notify_routes.push(id),
      }
      match fw.notify_target {
        Endpoint::Connector(c) => self.conn_mut(c).target_routes.push(id),
        Endpoint::Event(e) => self.event_mut(e).target_routes.push(id),
      }
    }

    RouteRef {
      state: self.routes[id.0].as_mut().expect("route slot just filled"),
      id,
    }
  }

  fn check_endpoint_owner(&self, module: ModuleId, endpoint: Endpoint) {
    let owner = match endpoint {
      Endpoint::Connector(c) => self.conn(c).module,
      Endpoint::Event(e) => self.event(e).module,
    };
    if owner != module {
      contract_violation("route endpoint belongs to another module");
    }
  }

  /// Enables or disables automatic throttle forwarding on a route at
  /// runtime. The change is not applied retroactively to already-forwarded
  /// state; it affects future transitions and aggregation scans.
  pub fn set_auto_throttling(&mut self, route: RouteId, state: bool) {
    self
      .routes
      .get_mut(route.0)
      .and_then(Option::as_mut)
      .unwrap_or_else(|| contract_violation("stale route id"))
      .auto_throttling = state;
  }

  // ---------------------------------------------------------------------
  // Wiring
  // ---------------------------------------------------------------------

  /// Connects an output connector to an input connector.
  ///
  /// Exactly one of the two must be active: the valid pairings are
  /// `ActiveOutput -> PassiveInput` (push) and `PassiveOutput ->
  /// ActiveInput` (pull). On failure nothing is mutated. Both sides are
  /// (re-)initialized so the passive side's throttle state reaches the new
  /// peer — immediately if the graph is initialized and idle, otherwise as
  /// soon as the current handler returns or `init()` runs.
  pub fn connect(&mut self, source: ConnectorId, target: ConnectorId) -> Result<(), ConfigError> {
    let sk = self.conn(source).kind;
    let tk = self.conn(target).kind;
    if !sk.is_output() || !tk.is_input() {
      return Err(ConfigError::DirectionMismatch {
        from: source,
        to: target,
      });
    }
    match (sk.is_active(), tk.is_active()) {
      (true, true) => {
        return Err(ConfigError::BothActive {
          from: source,
          to: target,
        });
      }
      (false, false) => {
        return Err(ConfigError::BothPassive {
          from: source,
          to: target,
        });
      }
      _ => {}
    }
    if self.conn(source).peer.is_some() {
      return Err(ConfigError::AlreadyConnected { connector: source });
    }
    if self.conn(target).peer.is_some() {
      return Err(ConfigError::AlreadyConnected { connector: target });
    }

    self.conn_mut(source).peer = Some(target);
    self.conn_mut(target).peer = Some(source);
    info!(
      source = %self.connector_path(source),
      target = %self.connector_path(target),
      "connected"
    );
    self.schedule_connector_init(source);
    self.schedule_connector_init(target);
    self.kick_init();
    Ok(())
  }

  /// Disconnects a connector from its peer. Both sides re-evaluate their
  /// throttle state as newly isolated.
  pub fn disconnect(&mut self, connector: ConnectorId) -> Result<(), ConfigError> {
    let Some(peer) = self.conn(connector).peer else {
      return Err(ConfigError::NotConnected { connector });
    };
    self.conn_mut(connector).peer = None;
    self.conn_mut(peer).peer = None;
    info!(
      connector = %self.connector_path(connector),
      peer = %self.connector_path(peer),
      "disconnected"
    );
    self.schedule_connector_init(connector);
    self.schedule_connector_init(peer);
    self.kick_init();
    Ok(())
  }

  // ---------------------------------------------------------------------
  // Connector queries
  // ---------------------------------------------------------------------

  /// The capability variant of a connector.
  pub fn connector_kind(&self, connector: ConnectorId) -> ConnectorKind {
    self.conn(connector).kind
  }

  /// The name a connector was declared under.
  pub fn connector_name(&self, connector: ConnectorId) -> &str {
    &self.conn(connector).name
  }

  /// The peer a connector is currently connected to.
  pub fn peer(&self, connector: ConnectorId) -> Option<ConnectorId> {
    self.conn(connector).peer
  }

  /// `true` if the connector has a peer.
  pub fn connected(&self, connector: ConnectorId) -> bool {
    self.conn(connector).peer.is_some()
  }

  /// Effective throttle state of a connector.
  ///
  /// For a passive connector this is its native OR forwarded state; for an
  /// active connector it is the state of its peer, or throttled when
  /// unconnected.
  pub fn throttled(&self, connector: ConnectorId) -> bool {
    let conn = self.conn(connector);
    if conn.kind.is_passive() {
      conn.passive_throttled()
    } else {
      self.active_throttled(connector)
    }
  }

  /// Native (locally decided) throttle state of a passive connector.
  pub fn native_throttled(&self, connector: ConnectorId) -> bool {
    let conn = self.conn(connector);
    if !conn.kind.is_passive() {
      contract_violation("native_throttled() on an active connector");
    }
    conn.native_throttled
  }

  /// Whether the connector is currently usable for its purpose:
  ///
  /// - `ActiveOutput`: the peer accepts data (connected and unthrottled);
  /// - `ActiveInput`: data can be obtained (buffered or peer unthrottled);
  /// - `PassiveInput`: an item is buffered;
  /// - `PassiveOutput`: always `true`.
  pub fn ready(&self, connector: ConnectorId) -> bool {
    let conn = self.conn(connector);
    match conn.kind {
      ConnectorKind::ActiveOutput => !self.active_throttled(connector),
      ConnectorKind::ActiveInput => {
        !conn.queue.is_empty() || !self.active_throttled(connector)
      }
      ConnectorKind::PassiveInput => !conn.queue.is_empty(),
      ConnectorKind::PassiveOutput => true,
    }
  }

  /// Number of items buffered in an input connector's queue.
  pub fn queue_size(&self, connector: ConnectorId) -> usize {
    self.conn(connector).queue.len()
  }

  /// The next buffered item of an input connector, without dequeuing it.
  pub fn peek(&self, connector: ConnectorId) -> Option<&T> {
    self.conn(connector).queue.front()
  }

  // ---------------------------------------------------------------------
  // Events
  // ---------------------------------------------------------------------

  /// Enables delivery of an event. ORed with route-driven throttling: the
  /// event stays off while any contributing route is throttled.
  pub fn enable_event(&mut self, event: EventId) {
    self.event_set_user_enabled(event, true);
  }

  /// Disables delivery of an event.
  pub fn disable_event(&mut self, event: EventId) {
    self.event_set_user_enabled(event, false);
  }

  /// Effective enabled state of an event.
  pub fn event_enabled(&self, event: EventId) -> bool {
    self.event(event).effective_enabled()
  }

  // ---------------------------------------------------------------------
  // Internal accessors
  // ---------------------------------------------------------------------

  pub(crate) fn conn(&self, id: ConnectorId) -> &ConnectorState<T> {
    self
      .connectors
      .get(id.0)
      .and_then(Option::as_ref)
      .unwrap_or_else(|| contract_violation("stale connector id"))
  }

  pub(crate) fn conn_mut(&mut self, id: ConnectorId) -> &mut ConnectorState<T> {
    self
      .connectors
      .get_mut(id.0)
      .and_then(Option::as_mut)
      .unwrap_or_else(|| contract_violation("stale connector id"))
  }

  pub(crate) fn slot(&self, id: ModuleId) -> &ModuleSlot<T> {
    self
      .modules
      .get(id.0)
      .unwrap_or_else(|| contract_violation("stale module id"))
  }

  pub(crate) fn event(&self, id: EventId) -> &EventState {
    self
      .events
      .get(id.0)
      .and_then(Option::as_ref)
      .unwrap_or_else(|| contract_violation("stale event id"))
  }

  pub(crate) fn event_mut(&mut self, id: EventId) -> &mut EventState {
    self
      .events
      .get_mut(id.0)
      .and_then(Option::as_mut)
      .unwrap_or_else(|| contract_violation("stale event id"))
  }

  /// "module.connector" path for log output.
  pub(crate) fn connector_path(&self, id: ConnectorId) -> String {
    let conn = self.conn(id);
    format!("{}.{}", self.slot(conn.module).name, conn.name)
  }
}
