//! # Connector Model
//!
//! A connector is one endpoint of a data connection between two modules. It
//! has two independent properties:
//!
//! - it is either *active* or *passive*: active connectors drive the timing
//!   of a transfer (they emit or request), passive connectors respond to a
//!   transfer initiated by their peer;
//! - it is either an *input* or an *output*: inputs receive items and own a
//!   buffer queue, outputs send items and rely on the queueing of the
//!   connected input.
//!
//! That gives four capability variants — [`ConnectorKind::ActiveInput`],
//! [`ConnectorKind::ActiveOutput`], [`ConnectorKind::PassiveInput`] and
//! [`ConnectorKind::PassiveOutput`] — which form a closed set: connect-time
//! validation, throttle propagation and join dispatch all match on them
//! exhaustively.
//!
//! Connectors are declared by a module during [`Graph::add_module`] and are
//! addressed everywhere by [`ConnectorId`]. The peer link established by
//! [`Graph::connect`] is a plain id resolved through the graph, cleared
//! explicitly on disconnect or module removal, so there are no owning or
//! dangling peer references.
//!
//! ## Throttle state
//!
//! Passive connectors carry the throttle state of a connection. They combine
//! two flags: *native* throttling set locally (manually or by the input's
//! queueing discipline) and *forwarded* throttling received from a route.
//! The effective state is the OR of both. Active connectors carry no state of
//! their own; they observe their peer and edge-detect its transitions to fire
//! `on_throttle`/`on_unthrottle` exactly once per change.
//!
//! [`Graph::add_module`]: crate::graph::Graph::add_module
//! [`Graph::connect`]: crate::graph::Graph::connect

use crate::module::ModuleId;
use crate::queueing::QueueingDiscipline;
use crate::route::RouteId;
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;

/// Identifier of a connector within its [`Graph`](crate::graph::Graph).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectorId(pub(crate) usize);

impl ConnectorId {
  /// Returns the raw slot index of this connector.
  pub fn index(self) -> usize {
    self.0
  }
}

/// Whether a connector receives or sends items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
  /// The connector receives items and owns a buffer queue.
  Input,
  /// The connector sends items.
  Output,
}

/// Whether a connector drives transfers or responds to them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
  /// The connector initiates transfers (emit / request).
  Active,
  /// The connector is signaled by its peer.
  Passive,
}

/// The four connector capability variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectorKind {
  /// Actively reads items from a connected [`PassiveOutput`].
  ///
  /// [`PassiveOutput`]: ConnectorKind::PassiveOutput
  ActiveInput,
  /// Actively sends items to a connected [`PassiveInput`].
  ///
  /// [`PassiveInput`]: ConnectorKind::PassiveInput
  ActiveOutput,
  /// Receives items pushed by a connected [`ActiveOutput`]; owns the queue
  /// and the queueing discipline of the connection.
  ///
  /// [`ActiveOutput`]: ConnectorKind::ActiveOutput
  PassiveInput,
  /// Provides items to a connected [`ActiveInput`] whenever signaled.
  ///
  /// [`ActiveInput`]: ConnectorKind::ActiveInput
  PassiveOutput,
}

impl ConnectorKind {
  /// The input/output role of this variant.
  pub fn direction(self) -> Direction {
    match self {
      Self::ActiveInput | Self::PassiveInput => Direction::Input,
      Self::ActiveOutput | Self::PassiveOutput => Direction::Output,
    }
  }

  /// The active/passive role of this variant.
  pub fn mode(self) -> Mode {
    match self {
      Self::ActiveInput | Self::ActiveOutput => Mode::Active,
      Self::PassiveInput | Self::PassiveOutput => Mode::Passive,
    }
  }

  /// `true` for the two input variants.
  pub fn is_input(self) -> bool {
    self.direction() == Direction::Input
  }

  /// `true` for the two output variants.
  pub fn is_output(self) -> bool {
    self.direction() == Direction::Output
  }

  /// `true` for the two active variants.
  pub fn is_active(self) -> bool {
    self.mode() == Mode::Active
  }

  /// `true` for the two passive variants.
  pub fn is_passive(self) -> bool {
    self.mode() == Mode::Passive
  }
}

impl fmt::Display for ConnectorKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      Self::ActiveInput => "ActiveInput",
      Self::ActiveOutput => "ActiveOutput",
      Self::PassiveInput => "PassiveInput",
      Self::PassiveOutput => "PassiveOutput",
    };
    f.write_str(s)
  }
}

/// Per-connector state held by the graph.
///
/// Fields are variant-dependent: `queue` is used by inputs, `qdisc`,
/// `native_throttled`, `forwarded_throttled` and `target_routes` by passive
/// connectors, `peer_throttled` and `notify_routes` by active connectors.
pub(crate) struct ConnectorState<T> {
  pub(crate) module: ModuleId,
  pub(crate) name: String,
  pub(crate) kind: ConnectorKind,
  pub(crate) peer: Option<ConnectorId>,
  /// Buffered items (inputs only).
  pub(crate) queue: VecDeque<T>,
  /// Queueing discipline (passive inputs only).
  pub(crate) qdisc: Option<Box<dyn QueueingDiscipline>>,
  /// Locally decided throttle state (passive only).
  pub(crate) native_throttled: bool,
  /// Throttle state received from routes (passive only).
  pub(crate) forwarded_throttled: bool,
  /// Last state notified by the peer, for edge detection (active only).
  pub(crate) peer_throttled: bool,
  /// Routes for which this connector is the notification source.
  pub(crate) notify_routes: Vec<RouteId>,
  /// Routes for which this connector is the notification target.
  pub(crate) target_routes: Vec<RouteId>,
  /// Already waiting in the pending-init queue.
  pub(crate) init_scheduled: bool,
}

impl<T> ConnectorState<T> {
  pub(crate) fn new(module: ModuleId, name: String, kind: ConnectorKind) -> Self {
    Self {
      module,
      name,
      kind,
      peer: None,
      queue: VecDeque::new(),
      qdisc: if kind == ConnectorKind::PassiveInput {
        Some(crate::queueing::default_discipline())
      } else {
        None
      },
      native_throttled: false,
      forwarded_throttled: false,
      peer_throttled: false,
      notify_routes: Vec::new(),
      target_routes: Vec::new(),
      init_scheduled: false,
    }
  }

  /// Effective throttle state of a passive connector (native OR forwarded).
  pub(crate) fn passive_throttled(&self) -> bool {
    debug_assert!(self.kind.is_passive());
    self.native_throttled || self.forwarded_throttled
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn kind_roles() {
    assert_eq!(ConnectorKind::ActiveInput.direction(), Direction::Input);
    assert_eq!(ConnectorKind::ActiveInput.mode(), Mode::Active);
    assert_eq!(ConnectorKind::PassiveOutput.direction(), Direction::Output);
    assert_eq!(ConnectorKind::PassiveOutput.mode(), Mode::Passive);
    assert!(ConnectorKind::PassiveInput.is_input());
    assert!(ConnectorKind::PassiveInput.is_passive());
    assert!(ConnectorKind::ActiveOutput.is_output());
    assert!(ConnectorKind::ActiveOutput.is_active());
  }

  #[test]
  fn passive_input_gets_default_discipline() {
    let state: ConnectorState<u32> =
      ConnectorState::new(ModuleId(0), "input".to_string(), ConnectorKind::PassiveInput);
    assert!(state.qdisc.is_some());

    let state: ConnectorState<u32> =
      ConnectorState::new(ModuleId(0), "output".to_string(), ConnectorKind::PassiveOutput);
    assert!(state.qdisc.is_none());

    let state: ConnectorState<u32> =
      ConnectorState::new(ModuleId(0), "input".to_string(), ConnectorKind::ActiveInput);
    assert!(state.qdisc.is_none());
  }
}
