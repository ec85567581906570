//! Throttle propagation: the control plane of the graph.
//!
//! Throttle notifications originate at passive connectors (from a manual
//! call, a queueing discipline, or a disabled event routed to them) and
//! travel to the connected active peer, whose module reacts through
//! `on_throttle`/`on_unthrottle` callbacks and whose routes forward the
//! transition to the next passive connector or event. All transitions are
//! edge-triggered: a repeated identical state never produces a second
//! notification, so propagation cannot loop on idempotent re-application.

use crate::Item;
use crate::connector::ConnectorId;
use crate::error::contract_violation;
use crate::event::EventId;
use crate::graph::Graph;
use crate::module::PendingCall;
use crate::route::{Endpoint, RouteId};
use tracing::{debug, trace};

impl<T: Item> Graph<T> {
  // ---------------------------------------------------------------------
  // Public throttle operations
  // ---------------------------------------------------------------------

  /// Sets the native throttle state of a passive connector.
  ///
  /// # Panics
  ///
  /// Panics if `connector` is active — active connectors receive
  /// notifications, they do not originate them.
  pub fn throttle(&mut self, connector: ConnectorId) {
    self.passive_set_native(connector, true);
  }

  /// Clears the native throttle state of a passive connector. The
  /// connector stays effectively throttled while a forwarded throttle is
  /// still in place.
  ///
  /// # Panics
  ///
  /// Panics if `connector` is active.
  pub fn unthrottle(&mut self, connector: ConnectorId) {
    self.passive_set_native(connector, false);
  }

  // ---------------------------------------------------------------------
  // Passive side
  // ---------------------------------------------------------------------

  pub(crate) fn passive_set_native(&mut self, connector: ConnectorId, state: bool) {
    let conn = self.conn_mut(connector);
    if !conn.kind.is_passive() {
      contract_violation("throttle()/unthrottle() on an active connector");
    }
    if state {
      let was_throttled = conn.passive_throttled();
      conn.native_throttled = true;
      if !was_throttled {
        self.passive_emit_throttle(connector);
      }
    } else if conn.passive_throttled() && !conn.forwarded_throttled {
      conn.native_throttled = false;
      self.passive_emit_unthrottle(connector);
    } else {
      conn.native_throttled = false;
    }
  }

  /// A route raised the forwarded throttle of this passive connector.
  pub(crate) fn passive_notify_throttle(&mut self, connector: ConnectorId) {
    let conn = self.conn_mut(connector);
    let was_throttled = conn.passive_throttled();
    conn.forwarded_throttled = true;
    if !was_throttled {
      self.passive_emit_throttle(connector);
    }
  }

  /// A route released its throttle on this passive connector. The
  /// forwarded state clears only once no contributing route is throttled
  /// anymore (OR aggregation).
  pub(crate) fn passive_notify_unthrottle(&mut self, connector: ConnectorId) {
    let still_throttled = self
      .conn(connector)
      .target_routes
      .iter()
      .any(|&rid| self.route_throttled(rid));
    if still_throttled {
      trace!(
        connector = %self.connector_path(connector),
        "not forwarding unthrottle: another route is still throttled"
      );
      return;
    }
    let conn = self.conn_mut(connector);
    conn.forwarded_throttled = false;
    if !conn.native_throttled {
      self.passive_emit_unthrottle(connector);
    }
  }

  pub(crate) fn passive_emit_throttle(&mut self, connector: ConnectorId) {
    debug!(connector = %self.connector_path(connector), "throttle");
    if let Some(peer) = self.conn(connector).peer {
      self.active_notify_throttle(peer);
    }
  }

  pub(crate) fn passive_emit_unthrottle(&mut self, connector: ConnectorId) {
    debug!(connector = %self.connector_path(connector), "unthrottle");
    if let Some(peer) = self.conn(connector).peer {
      self.active_notify_unthrottle(peer);
    }
    self.passive_unthrottle_event(connector);
  }

  /// After unthrottling a passive input, drain items buffered while it was
  /// throttled by re-signaling the module until the queue stops shrinking.
  fn passive_unthrottle_event(&mut self, connector: ConnectorId) {
    if self.conn(connector).kind != crate::connector::ConnectorKind::PassiveInput {
      return;
    }
    let mut remaining = self.conn(connector).queue.len();
    while remaining > 0 {
      self.passive_emit(connector);
      let now = self.conn(connector).queue.len();
      if now == remaining {
        break;
      }
      remaining = now;
    }
  }

  /// Signals the owning module of a passive connector, unless the
  /// connector is throttled.
  pub(crate) fn passive_emit(&mut self, connector: ConnectorId) {
    if self.conn(connector).passive_throttled() {
      return;
    }
    let module = self.conn(connector).module;
    self.dispatch(module, PendingCall::Request(connector));
  }

  // ---------------------------------------------------------------------
  // Active side
  // ---------------------------------------------------------------------

  /// Live throttle state seen by an active connector: its peer's effective
  /// state, or throttled while unconnected.
  pub(crate) fn active_throttled(&self, connector: ConnectorId) -> bool {
    match self.conn(connector).peer {
      Some(peer) => self.conn(peer).passive_throttled(),
      None => true,
    }
  }

  pub(crate) fn active_notify_throttle(&mut self, connector: ConnectorId) {
    let conn = self.conn_mut(connector);
    debug_assert!(conn.kind.is_active());
    if conn.peer_throttled {
      return;
    }
    conn.peer_throttled = true;
    trace!(connector = %self.connector_path(connector), "throttle notification in");
    let module = self.conn(connector).module;
    self.dispatch(module, PendingCall::Throttle(connector));
    for rid in self.conn(connector).notify_routes.clone() {
      self.route_notify_throttle(rid);
    }
  }

  pub(crate) fn active_notify_unthrottle(&mut self, connector: ConnectorId) {
    let conn = self.conn_mut(connector);
    debug_assert!(conn.kind.is_active());
    if !conn.peer_throttled {
      return;
    }
    conn.peer_throttled = false;
    trace!(connector = %self.connector_path(connector), "unthrottle notification in");
    let module = self.conn(connector).module;
    self.dispatch(module, PendingCall::Unthrottle(connector));
    for rid in self.conn(connector).notify_routes.clone() {
      self.route_notify_unthrottle(rid);
    }
  }

  // ---------------------------------------------------------------------
  // Routes
  // ---------------------------------------------------------------------

  /// Whether a route currently carries a throttle, as seen from its
  /// notification source. Routes with auto-throttling disabled never
  /// report throttled.
  pub(crate) fn route_throttled(&self, route: RouteId) -> bool {
    let Some(state) = self.routes.get(route.0).and_then(Option::as_ref) else {
      return false;
    };
    if !state.auto_throttling {
      return false;
    }
    let Some(fw) = state.forwarding else {
      return false;
    };
    match fw.notify_source {
      Endpoint::Connector(c) => self.active_throttled(c),
      Endpoint::Event(e) => !self.event(e).effective_enabled(),
    }
  }

  fn route_notify_throttle(&mut self, route: RouteId) {
    let Some(state) = self.routes.get(route.0).and_then(Option::as_ref) else {
      return;
    };
    if !state.auto_throttling {
      return;
    }
    let Some(fw) = state.forwarding else { return };
    match fw.notify_target {
      Endpoint::Connector(c) => self.passive_notify_throttle(c),
      Endpoint::Event(e) => self.event_notify_throttle(e),
    }
  }

  fn route_notify_unthrottle(&mut self, route: RouteId) {
    let Some(state) = self.routes.get(route.0).and_then(Option::as_ref) else {
      return;
    };
    if !state.auto_throttling {
      return;
    }
    let Some(fw) = state.forwarding else { return };
    match fw.notify_target {
      Endpoint::Connector(c) => self.passive_notify_unthrottle(c),
      Endpoint::Event(e) => self.event_notify_unthrottle(e),
    }
  }

  // ---------------------------------------------------------------------
  // Events as notification endpoints
  // ---------------------------------------------------------------------

  fn event_notify_throttle(&mut self, event: EventId) {
    let state = self.event_mut(event);
    if state.throttled {
      return;
    }
    let was_enabled = state.effective_enabled();
    state.throttled = true;
    if was_enabled {
      self.event_became_disabled(event);
    }
  }

  fn event_notify_unthrottle(&mut self, event: EventId) {
    let still_throttled = self
      .event(event)
      .target_routes
      .iter()
      .any(|&rid| self.route_throttled(rid));
    if still_throttled {
      return;
    }
    let state = self.event_mut(event);
    if !state.throttled {
      return;
    }
    state.throttled = false;
    if state.effective_enabled() {
      self.event_became_enabled(event);
    }
  }

  pub(crate) fn event_set_user_enabled(&mut self, event: EventId, enabled: bool) {
    let state = self.event_mut(event);
    if state.user_enabled == enabled {
      return;
    }
    let was_effective = state.effective_enabled();
    state.user_enabled = enabled;
    let is_effective = self.event(event).effective_enabled();
    match (was_effective, is_effective) {
      (false, true) => self.event_became_enabled(event),
      (true, false) => self.event_became_disabled(event),
      _ => {}
    }
  }

  /// An event's effective state flipped to enabled: notify passive
  /// connectors routed from it.
  fn event_became_enabled(&mut self, event: EventId) {
    debug!(event = %self.event(event).name, "event enabled");
    for rid in self.event(event).notify_routes.clone() {
      self.route_notify_unthrottle(rid);
    }
  }

  /// An event's effective state flipped to disabled: throttle passive
  /// connectors routed from it.
  fn event_became_disabled(&mut self, event: EventId) {
    debug!(event = %self.event(event).name, "event disabled");
    for rid in self.event(event).notify_routes.clone() {
      self.route_notify_throttle(rid);
    }
  }
}
