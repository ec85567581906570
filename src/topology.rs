//! # Topology Snapshot
//!
//! [`Graph::topology`] captures the current structure of a pipeline —
//! modules, their connectors, peer wiring, throttle state and queue depths
//! — as a plain value. The snapshot serializes to JSON for diagnostics
//! tooling, renders to a Mermaid flowchart for documentation, and prints as
//! an indented module dump (one paragraph per module) for quick inspection
//! on a console.
//!
//! [`Graph::topology`]: crate::graph::Graph::topology

use crate::Item;
use crate::connector::ConnectorKind;
use crate::graph::Graph;
use serde::Serialize;
use std::fmt;

/// Structure snapshot of a [`Graph`].
#[derive(Debug, Clone, Serialize)]
pub struct Topology {
  /// The graph's name.
  pub graph: String,
  /// One entry per live module, in creation order.
  pub modules: Vec<ModuleInfo>,
}

/// Snapshot of one module.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleInfo {
  /// The module's registered name.
  pub name: String,
  /// The module's connectors, in declaration order.
  pub connectors: Vec<ConnectorInfo>,
  /// The module's events, in registration order.
  pub events: Vec<EventInfo>,
}

/// Snapshot of one connector.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectorInfo {
  /// The connector's declared name.
  pub name: String,
  /// The connector's capability variant.
  pub kind: ConnectorKind,
  /// `"module.connector"` path of the peer, if connected.
  pub peer: Option<String>,
  /// Effective throttle state.
  pub throttled: bool,
  /// Buffered items (inputs only; 0 for outputs).
  pub queued: usize,
}

/// Snapshot of one event.
#[derive(Debug, Clone, Serialize)]
pub struct EventInfo {
  /// The event's registered name.
  pub name: String,
  /// Effective enabled state.
  pub enabled: bool,
}

impl Topology {
  /// Renders the snapshot as JSON.
  pub fn to_json(&self) -> String {
    serde_json::to_string_pretty(self).expect("topology serialization cannot fail")
  }

  /// Renders the snapshot as a Mermaid flowchart. Edges are labeled
  /// `source_connector->target_connector`; only push/pull connections
  /// appear, one edge per connected pair.
  pub fn to_mermaid(&self) -> String {
    let mut out = String::from("flowchart TD\n");
    for (index, module) in self.modules.iter().enumerate() {
      out.push_str(&format!("  m{index}[\"{}\"]\n", module.name));
    }
    for (index, module) in self.modules.iter().enumerate() {
      for conn in &module.connectors {
        if !conn.kind.is_output() {
          continue;
        }
        let Some(peer) = &conn.peer else { continue };
        let Some((peer_module, peer_conn)) = peer.split_once('.') else {
          continue;
        };
        let Some(target) = self.modules.iter().position(|m| m.name == peer_module) else {
          continue;
        };
        out.push_str(&format!(
          "  m{index} -->|\"{}->{}\"| m{target}\n",
          conn.name, peer_conn
        ));
      }
    }
    out
  }
}

impl fmt::Display for Topology {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "graph {}", self.graph)?;
    for module in &self.modules {
      writeln!(f, "{}", module.name)?;
      for conn in &module.connectors {
        write!(f, "  {} {}", conn.name, conn.kind)?;
        if let Some(peer) = &conn.peer {
          write!(f, " -> {peer}")?;
        }
        if conn.throttled {
          write!(f, " throttled")?;
        }
        if conn.queued > 0 {
          write!(f, " queued={}", conn.queued)?;
        }
        writeln!(f)?;
      }
      for event in &module.events {
        writeln!(
          f,
          "  event {} {}",
          event.name,
          if event.enabled { "enabled" } else { "disabled" }
        )?;
      }
    }
    Ok(())
  }
}

impl<T: Item> Graph<T> {
  /// Captures the graph's current structure and flow-control state.
  pub fn topology(&self) -> Topology {
    let modules = self
      .modules
      .iter()
      .filter(|slot| !slot.removed)
      .map(|slot| ModuleInfo {
        name: slot.name.clone(),
        connectors: slot
          .connectors
          .iter()
          .map(|&cid| {
            let conn = self.conn(cid);
            ConnectorInfo {
              name: conn.name.clone(),
              kind: conn.kind,
              peer: conn.peer.map(|peer| self.connector_path(peer)),
              throttled: self.throttled(cid),
              queued: conn.queue.len(),
            }
          })
          .collect(),
        events: slot
          .events
          .iter()
          .map(|&eid| {
            let event = self.event(eid);
            EventInfo {
              name: event.name.clone(),
              enabled: event.effective_enabled(),
            }
          })
          .collect(),
      })
      .collect();
    Topology {
      graph: self.name().to_string(),
      modules,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::modules::debug::{ActiveSource, PassiveSink};

  fn sample() -> (Graph<u32>, crate::connector::ConnectorId) {
    let mut graph: Graph<u32> = Graph::new("sample");
    let source = ActiveSource::attach(&mut graph, "source");
    let sink = PassiveSink::attach(&mut graph, "sink");
    let output = graph.module(source).output;
    let input = graph.module(sink).input;
    graph.connect(output, input).unwrap();
    graph.init().unwrap();
    (graph, input)
  }

  #[test]
  fn snapshot_reflects_wiring_and_state() {
    let (mut graph, sink_input) = sample();
    let topology = graph.topology();
    assert_eq!(topology.graph, "sample");
    assert_eq!(topology.modules.len(), 2);
    assert_eq!(topology.modules[0].name, "source");
    assert_eq!(
      topology.modules[0].connectors[0].peer.as_deref(),
      Some("sink.input")
    );
    assert!(!topology.modules[1].connectors[0].throttled);

    graph.throttle(sink_input);
    assert!(graph.topology().modules[1].connectors[0].throttled);
  }

  #[test]
  fn mermaid_contains_nodes_and_labeled_edge() {
    let (graph, _) = sample();
    let mermaid = graph.topology().to_mermaid();
    assert!(mermaid.starts_with("flowchart TD"));
    assert!(mermaid.contains("m0[\"source\"]"));
    assert!(mermaid.contains("m1[\"sink\"]"));
    assert!(mermaid.contains("m0 -->|\"output->input\"| m1"));
  }

  #[test]
  fn json_snapshot_is_well_formed() {
    let (graph, _) = sample();
    let json = graph.topology().to_json();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["graph"], "sample");
    assert_eq!(value["modules"][1]["connectors"][0]["kind"], "PassiveInput");
  }

  #[test]
  fn display_dump_lists_modules_and_peers() {
    let (graph, _) = sample();
    let dump = graph.topology().to_string();
    assert!(dump.contains("graph sample"));
    assert!(dump.contains("source"));
    assert!(dump.contains("output ActiveOutput -> sink.input"));
  }
}
