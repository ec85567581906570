//! # Key Router
//!
//! [`KeyRouter`] is the fan-out dual of the joins: one passive input and a
//! dynamically growing set of active outputs, one per registered key. Each
//! arriving item is forwarded to the output whose key matches the value a
//! user-supplied function computes from the item; items with an unknown key
//! are dropped with a warning.
//!
//! Every output is routed back to the input, so a throttled branch raises
//! the input's forwarded throttle and backpressures the producer. Because
//! the routes aggregate by OR, the producer resumes only once *all*
//! branches accept data again.

use crate::Item;
use crate::connector::{ConnectorId, ConnectorKind};
use crate::error::{ConfigError, contract_violation};
use crate::graph::Graph;
use crate::module::{Module, ModuleHandle};
use std::fmt::Debug;
use tracing::warn;

/// Dynamic fan-out keyed by a value computed from each item.
pub struct KeyRouter<T, K> {
  /// The router's input; connect an active output to it.
  pub input: ConnectorId,
  key_of: Box<dyn Fn(&T) -> K>,
  outputs: Vec<(K, ConnectorId)>,
}

impl<T, K> KeyRouter<T, K>
where
  T: Item,
  K: Debug + PartialEq + 'static,
{
  /// Adds a `KeyRouter` with no outputs yet to the graph. `key_of`
  /// computes the routing key of each item.
  pub fn attach(
    graph: &mut Graph<T>,
    name: &str,
    key_of: impl Fn(&T) -> K + 'static,
  ) -> ModuleHandle<Self> {
    graph.add_module(name, |m| {
      let input = m.passive_input("input");
      m.no_route(input);
      Self {
        input,
        key_of: Box::new(key_of),
        outputs: Vec::new(),
      }
    })
  }

  /// Registers `key` with a fresh output and connects it to a passive
  /// input. Each key may be registered once.
  pub fn connect_output(
    graph: &mut Graph<T>,
    this: ModuleHandle<Self>,
    key: K,
    target: ConnectorId,
  ) -> Result<ConnectorId, ConfigError> {
    if graph.connector_kind(target) != ConnectorKind::PassiveInput {
      return Err(ConfigError::IncompatiblePeer {
        expected: "PassiveInput",
        connector: target,
      });
    }
    if graph.connected(target) {
      return Err(ConfigError::AlreadyConnected { connector: target });
    }
    if graph.module(this).outputs.iter().any(|(k, _)| *k == key) {
      contract_violation("KeyRouter key registered twice");
    }
    let index = graph.module(this).outputs.len();
    let router_input = graph.module(this).input;
    let mut setup = graph.extend(this.id());
    let output = setup.active_output(&format!("output{index}"));
    // A throttled branch backpressures the shared input; all branches must
    // recover before the producer resumes.
    setup.route(router_input, output).id();
    graph.module_mut(this).outputs.push((key, output));
    graph.connect(output, target)?;
    Ok(output)
  }
}

impl<T, K> Module<T> for KeyRouter<T, K>
where
  T: Item,
  K: Debug + PartialEq + 'static,
{
  fn on_request(&mut self, graph: &mut Graph<T>, connector: ConnectorId) {
    debug_assert_eq!(connector, self.input);
    let Some(item) = graph.read(self.input) else {
      contract_violation("KeyRouter input signaled without an item");
    };
    let key = (self.key_of)(&item);
    match self.outputs.iter().find(|(k, _)| *k == key) {
      Some(&(_, output)) => graph.send(output, item),
      None => warn!(key = ?key, item = ?item, "dropping item with unrouted key"),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::modules::debug::{ActiveSource, PassiveSink};

  fn wire() -> (
    Graph<(char, u32)>,
    ModuleHandle<ActiveSource>,
    ModuleHandle<PassiveSink<(char, u32)>>,
    ModuleHandle<PassiveSink<(char, u32)>>,
  ) {
    let mut graph: Graph<(char, u32)> = Graph::new("router");
    let source = ActiveSource::attach(&mut graph, "source");
    let router = KeyRouter::attach(&mut graph, "router", |item: &(char, u32)| item.0);
    let sink_a = PassiveSink::attach(&mut graph, "sink_a");
    let sink_b = PassiveSink::attach(&mut graph, "sink_b");

    let source_out = graph.module(source).output;
    let router_in = graph.module(router).input;
    let a_in = graph.module(sink_a).input;
    let b_in = graph.module(sink_b).input;
    graph.connect(source_out, router_in).unwrap();
    KeyRouter::connect_output(&mut graph, router, 'a', a_in).unwrap();
    KeyRouter::connect_output(&mut graph, router, 'b', b_in).unwrap();
    graph.init().unwrap();
    (graph, source, sink_a, sink_b)
  }

  #[test]
  fn routes_items_by_key() {
    let (mut graph, source, sink_a, sink_b) = wire();

    ActiveSource::submit(&mut graph, source, ('a', 1));
    ActiveSource::submit(&mut graph, source, ('b', 2));
    ActiveSource::submit(&mut graph, source, ('a', 3));
    // Unknown key: dropped.
    ActiveSource::submit(&mut graph, source, ('x', 4));

    assert_eq!(graph.module(sink_a).items(), &[('a', 1), ('a', 3)]);
    assert_eq!(graph.module(sink_b).items(), &[('b', 2)]);
  }

  #[test]
  fn any_throttled_branch_backpressures_the_producer() {
    let (mut graph, source, sink_a, sink_b) = wire();
    let a_in = graph.module(sink_a).input;
    let b_in = graph.module(sink_b).input;

    graph.throttle(a_in);
    assert!(!ActiveSource::ready(&graph, source));

    // Both branches must recover before the producer may resume.
    graph.throttle(b_in);
    graph.unthrottle(a_in);
    assert!(!ActiveSource::ready(&graph, source));
    graph.unthrottle(b_in);
    assert!(ActiveSource::ready(&graph, source));
  }
}
