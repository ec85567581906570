//! # Events
//!
//! Events are the graph's hooks into the world outside the pipeline: I/O
//! readiness, timers, or the run loop going idle. The graph itself never
//! waits — it only tracks, per event, whether delivery is currently wanted,
//! and a [`Scheduler`] collaborator turns that into actual registration with
//! whatever reactor the application uses.
//!
//! An event's effective enabled state combines two independent inputs: the
//! module's own [`Graph::enable_event`]/[`Graph::disable_event`] calls and
//! the throttle state forwarded by routes. A throttled event source is
//! disabled so its external trigger stops firing; it is re-enabled only once
//! every contributing route has unthrottled (the same OR aggregation passive
//! connectors use). Routing an event *to* a passive connector works the
//! other way around: whenever the event becomes disabled the connector's
//! forwarded throttle is raised.
//!
//! [`Scheduler`]: crate::scheduler::Scheduler
//! [`Graph::enable_event`]: crate::graph::Graph::enable_event
//! [`Graph::disable_event`]: crate::graph::Graph::disable_event

use crate::module::ModuleId;
use crate::route::RouteId;
use serde::Serialize;

/// Identifier of an event within its [`Graph`](crate::graph::Graph).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventId(pub(crate) usize);

/// What kind of external occurrence an event stands for.
///
/// The graph treats all kinds identically; the kind exists for the
/// [`Scheduler`](crate::scheduler::Scheduler) to decide when the event
/// fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
  /// Fires whenever the run loop has nothing else to do. Drives feeder-style
  /// modules; the default scheduler delivers these round-robin.
  Idle,
  /// Never fires by itself. Used by tests and for events whose delivery is
  /// triggered entirely through [`Graph::with_module`] style entry points.
  ///
  /// [`Graph::with_module`]: crate::graph::Graph::with_module
  Manual,
  /// Application-defined occurrence (an fd becoming readable, a timer); the
  /// label is interpreted by the scheduler implementation.
  Custom(String),
}

/// Per-event state held by the graph.
pub(crate) struct EventState {
  pub(crate) module: ModuleId,
  pub(crate) name: String,
  pub(crate) kind: EventKind,
  /// Module-controlled enable flag.
  pub(crate) user_enabled: bool,
  /// Route-controlled throttle flag.
  pub(crate) throttled: bool,
  /// Routes for which this event is the notification source.
  pub(crate) notify_routes: Vec<RouteId>,
  /// Routes for which this event is the notification target.
  pub(crate) target_routes: Vec<RouteId>,
}

impl EventState {
  pub(crate) fn new(module: ModuleId, name: String, kind: EventKind) -> Self {
    Self {
      module,
      name,
      kind,
      user_enabled: true,
      throttled: false,
      notify_routes: Vec::new(),
      target_routes: Vec::new(),
    }
  }

  /// Delivery is wanted: enabled by the module and not throttled by routes.
  pub(crate) fn effective_enabled(&self) -> bool {
    self.user_enabled && !self.throttled
  }
}

/// Snapshot of an enabled event, handed to the scheduler each iteration.
#[derive(Debug, Clone)]
pub struct EventView {
  /// The event's id, returned from [`Scheduler::select`] to deliver it.
  ///
  /// [`Scheduler::select`]: crate::scheduler::Scheduler::select
  pub id: EventId,
  /// The event's kind.
  pub kind: EventKind,
  /// The event's name as registered by its module.
  pub name: String,
}
