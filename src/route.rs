//! # Routes
//!
//! A route is a declared relationship between two endpoints of the *same*
//! module — connectors or events — used to propagate throttle notifications
//! through the module. Routing never carries data by itself; it defines how
//! flow-control state travels from the endpoint where it originates to the
//! endpoint that must react.
//!
//! Whether a route forwards notifications depends on its endpoint
//! combination:
//!
//! | source          | target          | behaviour                                     |
//! |-----------------|-----------------|-----------------------------------------------|
//! | passive input   | active output   | forwarding; notify source is the output       |
//! | active input    | passive output  | forwarding; notify source is the input        |
//! | active input    | active output   | structural only                               |
//! | passive input   | passive output  | structural only                               |
//! | event           | active conn.    | forwarding; throttle disables the event       |
//! | active conn.    | event           | forwarding; throttle disables the event       |
//! | event           | passive conn.   | forwarding; disabling the event throttles     |
//! | passive conn.   | event           | forwarding; disabling the event throttles     |
//!
//! The *notification source* is always the side that receives throttle
//! notifications from outside (an active connector) or generates them by
//! being disabled (an event); the *notification target* is the passive
//! connector or event that reacts. A notification target fed by several
//! routes aggregates them by OR: it is throttled while any contributing
//! source is throttled and recovers only once all of them have recovered.
//!
//! Even when no automatic throttling is desired, declaring flow information
//! for every connector is mandatory — [`Graph::init`] refuses graphs with
//! unrouted connectors. Use [`ModuleSetup::no_route`] for deliberately
//! terminal connectors. Event routing is optional.
//!
//! [`Graph::init`]: crate::graph::Graph::init
//! [`ModuleSetup::no_route`]: crate::module::ModuleSetup::no_route

use crate::connector::ConnectorId;
use crate::event::EventId;

/// Identifier of a route within its [`Graph`](crate::graph::Graph).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RouteId(pub(crate) usize);

/// One end of a route: a connector or an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
  /// A connector endpoint.
  Connector(ConnectorId),
  /// An event endpoint.
  Event(EventId),
}

impl From<ConnectorId> for Endpoint {
  fn from(id: ConnectorId) -> Self {
    Self::Connector(id)
  }
}

impl From<EventId> for Endpoint {
  fn from(id: EventId) -> Self {
    Self::Event(id)
  }
}

/// Throttle-notification roles of a forwarding route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Forwarding {
  /// The endpoint whose throttle transitions this route observes.
  pub(crate) notify_source: Endpoint,
  /// The endpoint this route forwards those transitions to.
  pub(crate) notify_target: Endpoint,
}

/// Per-route state held by the graph. Ownership is recorded in the owning
/// module's route list.
pub(crate) struct RouteState {
  pub(crate) source: Endpoint,
  pub(crate) target: Endpoint,
  /// `None` for structural (non-forwarding) routes.
  pub(crate) forwarding: Option<Forwarding>,
  /// Automatic throttle forwarding enabled for this route.
  pub(crate) auto_throttling: bool,
}

impl RouteState {
  /// Both declared endpoints, source first.
  pub(crate) fn endpoints(&self) -> [Endpoint; 2] {
    [self.source, self.target]
  }
}

/// Handle returned by [`ModuleSetup::route`] for adjusting a fresh route.
///
/// ```no_run
/// # use packetweave::connector::ConnectorId;
/// # use packetweave::event::EventId;
/// # use packetweave::module::ModuleSetup;
/// # fn demo(m: &mut ModuleSetup<'_, u32>, input: ConnectorId, event: EventId) {
/// // Keep the flow declaration but handle throttling manually:
/// m.route(input, event).auto_throttling(false);
/// # }
/// ```
///
/// [`ModuleSetup::route`]: crate::module::ModuleSetup::route
#[must_use = "discard with `.id()` if the route needs no adjustment"]
pub struct RouteRef<'a> {
  pub(crate) state: &'a mut RouteState,
  pub(crate) id: RouteId,
}

impl RouteRef<'_> {
  /// Enables or disables automatic throttle forwarding on this route.
  ///
  /// A route with auto-throttling disabled keeps its structural role (it
  /// still satisfies the routed-connector requirement) but neither forwards
  /// notifications nor contributes to the target's OR aggregation.
  pub fn auto_throttling(self, state: bool) -> RouteId {
    self.state.auto_throttling = state;
    self.id
  }

  /// The id of the new route.
  pub fn id(self) -> RouteId {
    self.id
  }
}
