//! Handler dispatch, deferred initialization and the run loop.

use crate::Item;
use crate::connector::{ConnectorId, ConnectorKind};
use crate::error::{ConfigError, contract_violation};
use crate::event::{EventId, EventView};
use crate::graph::Graph;
use crate::graph::graph::{InitTarget, MAX_DISPATCH_DEPTH};
use crate::module::{Module, ModuleHandle, ModuleId, PendingCall};
use crate::route::Endpoint;
use crate::scheduler::Scheduler;
use tracing::{debug, info, trace};

impl<T: Item> Graph<T> {
  // ---------------------------------------------------------------------
  // Initialization
  // ---------------------------------------------------------------------

  /// Validates the graph and initializes every pending module and
  /// connector.
  ///
  /// Validation rejects graphs with connectors that appear in no `route()`
  /// declaration and were not marked `no_route()` — without flow
  /// information the connector's throttle state would be undefined.
  /// Initialization then pushes every passive connector's throttle state to
  /// its peer and calls each module's [`Module::init`] hook exactly once.
  ///
  /// `init` may be called repeatedly; modules added since the last call are
  /// validated and initialized, everything else is untouched.
  pub fn init(&mut self) -> Result<(), ConfigError> {
    self.validate()?;
    self.initialized = true;
    self.run_pending_init();
    Ok(())
  }

  fn validate(&self) -> Result<(), ConfigError> {
    for slot in &self.modules {
      if slot.removed {
        continue;
      }
      for &cid in &slot.connectors {
        let routed = slot.no_route.contains(&cid)
          || slot.routes.iter().any(|&rid| {
            self.routes[rid.0]
              .as_ref()
              .is_some_and(|r| r.endpoints().contains(&Endpoint::Connector(cid)))
          });
        if !routed {
          return Err(ConfigError::UnroutedConnector {
            module: slot.name.clone(),
            connector: self.conn(cid).name.clone(),
          });
        }
      }
    }
    Ok(())
  }

  pub(crate) fn schedule_module_init(&mut self, module: ModuleId) {
    let slot = &mut self.modules[module.0];
    if !slot.init_scheduled {
      slot.init_scheduled = true;
      self.init_queue.push_back(InitTarget::Module(module));
    }
  }

  pub(crate) fn schedule_connector_init(&mut self, connector: ConnectorId) {
    let conn = self.conn_mut(connector);
    if !conn.init_scheduled {
      conn.init_scheduled = true;
      self.init_queue.push_back(InitTarget::Connector(connector));
    }
  }

  /// Runs deferred initialization immediately when the graph is idle.
  /// While a handler is on the stack the queue is drained as soon as it
  /// returns; before the first `init()` everything stays queued.
  pub(crate) fn kick_init(&mut self) {
    if self.initialized && self.depth == 0 && !self.in_init {
      self.run_pending_init();
    }
  }

  pub(crate) fn run_pending_init(&mut self) {
    if self.in_init {
      return;
    }
    self.in_init = true;
    while let Some(target) = self.init_queue.pop_front() {
      match target {
        InitTarget::Module(mid) => {
          self.modules[mid.0].init_scheduled = false;
          if self.modules[mid.0].removed {
            continue;
          }
          trace!(module = %self.slot(mid).name, "module init");
          self.enter_raw(mid, |module, graph| module.init(graph));
        }
        InitTarget::Connector(cid) => {
          let Some(conn) = self.connectors.get_mut(cid.0).and_then(Option::as_mut) else {
            continue;
          };
          conn.init_scheduled = false;
          self.connector_init(cid);
        }
      }
    }
    self.in_init = false;
  }

  /// Establishes a connector's initial state after wiring changes.
  ///
  /// Passive connectors recompute their forwarded state from their routes
  /// and push the effective state to the (possibly new) peer; active
  /// connectors report themselves throttled while unconnected.
  fn connector_init(&mut self, connector: ConnectorId) {
    trace!(connector = %self.connector_path(connector), "connector init");
    let conn = self.conn(connector);
    match conn.kind {
      ConnectorKind::PassiveInput | ConnectorKind::PassiveOutput => {
        let any_route_throttled = conn
          .target_routes
          .iter()
          .any(|&rid| self.route_throttled(rid));
        if !any_route_throttled {
          self.conn_mut(connector).forwarded_throttled = false;
        }
        if self.conn(connector).passive_throttled() {
          self.passive_emit_throttle(connector);
        } else {
          self.passive_emit_unthrottle(connector);
        }
      }
      ConnectorKind::ActiveInput | ConnectorKind::ActiveOutput => {
        if conn.peer.is_none() {
          self.active_notify_throttle(connector);
        }
      }
    }
  }

  // ---------------------------------------------------------------------
  // Dispatch
  // ---------------------------------------------------------------------

  /// Invokes a handler on a module, deferring the call if the module is
  /// already on the stack.
  ///
  /// Deferral keeps legal synchronous re-entrancy safe: a module that
  /// pulls an item can be the target of the throttle notification that
  /// pull provokes (a join draining its last available source). The state
  /// transition itself has already happened — only the callback waits
  /// until the module's current handler returns, still within the same
  /// external event.
  pub(crate) fn dispatch(&mut self, module: ModuleId, call: PendingCall) {
    let slot = &mut self.modules[module.0];
    if slot.removed {
      return;
    }
    if slot.module.is_none() {
      trace!(module = %slot.name, ?call, "deferring handler: module is on the call stack");
      slot.pending.push_back(call);
      return;
    }
    self.enter_raw(module, |m, graph| graph.invoke(m, call));
  }

  fn invoke(&mut self, module: &mut dyn Module<T>, call: PendingCall) {
    match call {
      PendingCall::Request(c) => module.on_request(self, c),
      PendingCall::Throttle(c) => module.on_throttle(self, c),
      PendingCall::Unthrottle(c) => module.on_unthrottle(self, c),
      PendingCall::Event(e) => module.on_event(self, e),
    }
  }

  /// Takes the module out of its slot, runs `f`, puts it back and drains
  /// handler calls that bounced off the module while it was busy.
  pub(crate) fn enter_raw<R>(
    &mut self,
    module: ModuleId,
    f: impl FnOnce(&mut dyn Module<T>, &mut Self) -> R,
  ) -> R {
    if self.depth >= MAX_DISPATCH_DEPTH {
      contract_violation("dispatch depth exceeded: cyclic module wiring?");
    }
    let Some(mut boxed) = self.modules[module.0].module.take() else {
      contract_violation("re-entered a module that is already dispatched");
    };
    self.depth += 1;
    let result = f(&mut *boxed, self);
    self.modules[module.0].module = Some(boxed);

    while let Some(call) = self.modules[module.0].pending.pop_front() {
      let mut boxed = self.modules[module.0]
        .module
        .take()
        .expect("module slot occupied after put-back");
      self.invoke(&mut *boxed, call);
      self.modules[module.0].module = Some(boxed);
    }

    self.depth -= 1;
    if self.depth == 0 && self.initialized && !self.in_init && !self.init_queue.is_empty() {
      self.run_pending_init();
    }
    result
  }

  /// Borrows a module together with graph context.
  ///
  /// This is the entry point for driving a module from outside the run
  /// loop — the debug sources and sinks are built on it. The closure gets
  /// the concrete module and the graph, exactly like a handler invocation.
  ///
  /// # Panics
  ///
  /// Panics if the module is removed, already dispatched into, or of a
  /// different type than the handle promises.
  pub fn with_module<M: Module<T>, R>(
    &mut self,
    handle: ModuleHandle<M>,
    f: impl FnOnce(&mut M, &mut Graph<T>) -> R,
  ) -> R {
    if self.slot(handle.id).removed {
      contract_violation("with_module() on a removed module");
    }
    self.enter_raw(handle.id, |module, graph| {
      let any: &mut dyn std::any::Any = module;
      let concrete = any
        .downcast_mut::<M>()
        .unwrap_or_else(|| contract_violation("module handle type mismatch"));
      f(concrete, graph)
    })
  }

  // ---------------------------------------------------------------------
  // Events and the run loop
  // ---------------------------------------------------------------------

  /// Snapshot of all currently enabled events.
  pub fn enabled_events(&self) -> Vec<EventView> {
    self
      .events
      .iter()
      .enumerate()
      .filter_map(|(i, slot)| {
        let state = slot.as_ref()?;
        if !state.effective_enabled() || self.modules[state.module.0].removed {
          return None;
        }
        Some(EventView {
          id: EventId(i),
          kind: state.kind.clone(),
          name: state.name.clone(),
        })
      })
      .collect()
  }

  /// Delivers one event to its module's [`Module::on_event`] handler.
  ///
  /// External reactors call this when the occurrence an event stands for
  /// has happened. Delivery of a disabled or stale event is ignored with a
  /// trace message — the occurrence may have raced with a throttle.
  pub fn deliver_event(&mut self, event: EventId) {
    let Some(state) = self.events.get(event.0).and_then(Option::as_ref) else {
      trace!(event = event.0, "ignoring delivery of stale event");
      return;
    };
    if !state.effective_enabled() {
      trace!(event = %state.name, "ignoring delivery of disabled event");
      return;
    }
    let module = state.module;
    self.dispatch(module, PendingCall::Event(event));
  }

  /// Runs the graph: initializes it, then repeatedly asks the scheduler to
  /// pick the next event among the enabled ones and delivers it.
  ///
  /// Returns when no module has an enabled event left, or when the
  /// scheduler declines to pick one.
  pub fn run(&mut self, scheduler: &mut dyn Scheduler) -> Result<(), ConfigError> {
    self.init()?;
    info!(graph = %self.name(), "entering run loop");
    loop {
      let enabled = self.enabled_events();
      if enabled.is_empty() {
        debug!(graph = %self.name(), "no enabled events left");
        break;
      }
      let Some(event) = scheduler.select(&enabled) else {
        debug!(graph = %self.name(), "scheduler terminated the run");
        break;
      };
      self.deliver_event(event);
    }
    info!(graph = %self.name(), "run loop finished");
    Ok(())
  }
}
