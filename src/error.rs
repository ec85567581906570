//! # Error Types
//!
//! Errors in packetweave fall into two categories with very different
//! handling:
//!
//! - **Configuration errors** ([`ConfigError`]) are programming mistakes made
//!   while assembling a graph: connecting two active connectors, forgetting a
//!   `route()`/`no_route()` declaration, pulling a connector into a second
//!   connection. They are reported synchronously at the offending call and
//!   never tolerated silently.
//! - **Contract violations** are runtime calls that a correctly written
//!   module never makes, such as emitting on an unconnected output or pulling
//!   from a module that is already on the call stack (a cyclic wiring). The
//!   whole point of throttle propagation is to make these calls unreachable,
//!   so they panic immediately instead of surfacing as a recoverable value.

use crate::connector::ConnectorId;
use crate::module::ModuleId;
use thiserror::Error;

/// Error raised while assembling or initializing a graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
  /// Both endpoints of a `connect()` call are active connectors.
  #[error("cannot connect two active connectors ({from:?} -> {to:?})")]
  BothActive {
    /// The offending source connector.
    from: ConnectorId,
    /// The offending target connector.
    to: ConnectorId,
  },

  /// Both endpoints of a `connect()` call are passive connectors.
  #[error("cannot connect two passive connectors ({from:?} -> {to:?})")]
  BothPassive {
    /// The offending source connector.
    from: ConnectorId,
    /// The offending target connector.
    to: ConnectorId,
  },

  /// `connect()` was called with a source that is not an output or a target
  /// that is not an input.
  #[error("connect() requires an output as source and an input as target ({from:?} -> {to:?})")]
  DirectionMismatch {
    /// The offending source connector.
    from: ConnectorId,
    /// The offending target connector.
    to: ConnectorId,
  },

  /// One side of a `connect()` call already has a peer.
  #[error("connector {connector:?} is already connected")]
  AlreadyConnected {
    /// The connector that already has a peer.
    connector: ConnectorId,
  },

  /// `disconnect()` was called on a connector without a peer.
  #[error("connector {connector:?} is not connected")]
  NotConnected {
    /// The connector without a peer.
    connector: ConnectorId,
  },

  /// A module owns a connector that appears in no route and was not
  /// explicitly declared `no_route()`. Detected by [`Graph::init`].
  ///
  /// [`Graph::init`]: crate::graph::Graph::init
  #[error("connector '{connector}' of module '{module}' has no route() or no_route() declaration")]
  UnroutedConnector {
    /// Name of the module owning the connector.
    module: String,
    /// Name of the unrouted connector.
    connector: String,
  },

  /// A dynamic connect helper (join, router) was handed a peer connector
  /// of the wrong capability.
  #[error("dynamic connect requires a {expected} peer, got connector {connector:?}")]
  IncompatiblePeer {
    /// The capability the helper expects of its peer.
    expected: &'static str,
    /// The offending peer connector.
    connector: ConnectorId,
  },

  /// An id refers to a module that was removed from the graph.
  #[error("module {module:?} has been removed")]
  ModuleRemoved {
    /// The stale module id.
    module: ModuleId,
  },
}

/// Aborts on a broken framework contract.
///
/// Used for calls that correct throttle observance makes unreachable. Logs
/// the failure through `tracing` before panicking so the defect shows up in
/// the log stream of a long-running process as well.
#[track_caller]
pub(crate) fn contract_violation(message: &str) -> ! {
  tracing::error!(detail = %message, "pipeline contract violation");
  panic!("pipeline contract violation: {message}");
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn config_error_display() {
    let err = ConfigError::BothActive {
      from: ConnectorId(0),
      to: ConnectorId(1),
    };
    assert!(err.to_string().contains("two active connectors"));

    let err = ConfigError::UnroutedConnector {
      module: "feeder".to_string(),
      connector: "input".to_string(),
    };
    assert!(err.to_string().contains("feeder"));
    assert!(err.to_string().contains("no_route()"));
  }
}
