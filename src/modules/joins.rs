//! # Join Modules
//!
//! Joins funnel an arbitrary, dynamically growing number of inputs into a
//! single output. Input connectors are allocated lazily, one per connected
//! peer, through the `connect_source` helpers — before `init()` or while
//! the graph is already running.
//!
//! The two joins deliberately aggregate throttle state in opposite ways:
//!
//! - [`PassiveJoin`] is pushed into, so downstream congestion must stop
//!   *every* producer: a throttle on its output is broadcast to all inputs.
//! - [`PriorityJoin`] is pulled from, so data is available as long as *any*
//!   provider has some: its output throttles only once every input is
//!   throttled, and recovers as soon as one input does.
//!
//! The asymmetry is a consequence of push versus pull timing, not an
//! inconsistency — both policies answer "may the peer of `output` keep
//! going?" for their respective transfer direction.

use crate::Item;
use crate::connector::{ConnectorId, ConnectorKind};
use crate::error::{ConfigError, contract_violation};
use crate::graph::Graph;
use crate::module::{Module, ModuleHandle};
use tracing::trace;

/// Fan-in for pushing producers: any number of passive inputs, one active
/// output. Items are forwarded to the output the moment they arrive.
pub struct PassiveJoin {
  /// The join's output; connect it to a passive input.
  pub output: ConnectorId,
  inputs: Vec<ConnectorId>,
}

impl PassiveJoin {
  /// Adds a `PassiveJoin` with no inputs yet to the graph.
  pub fn attach<T: Item>(graph: &mut Graph<T>, name: &str) -> ModuleHandle<Self> {
    graph.add_module(name, |m| {
      let output = m.active_output("output");
      m.no_route(output);
      Self {
        output,
        inputs: Vec::new(),
      }
    })
  }

  /// Connects an active output to the join, allocating a fresh input for
  /// it.
  ///
  /// The new input carries no queueing discipline: the join forwards
  /// instantly and buffers only while throttled, so backpressure is
  /// governed entirely by the broadcast throttle below.
  pub fn connect_source<T: Item>(
    graph: &mut Graph<T>,
    this: ModuleHandle<Self>,
    source: ConnectorId,
  ) -> Result<ConnectorId, ConfigError> {
    if graph.connector_kind(source) != ConnectorKind::ActiveOutput {
      return Err(ConfigError::IncompatiblePeer {
        expected: "ActiveOutput",
        connector: source,
      });
    }
    if graph.connected(source) {
      return Err(ConfigError::AlreadyConnected { connector: source });
    }
    let index = graph.module(this).inputs.len();
    let mut setup = graph.extend(this.id());
    let input = setup.passive_input(&format!("input{index}"));
    setup.no_qdisc(input);
    setup.no_route(input);
    graph.module_mut(this).inputs.push(input);
    graph.connect(source, input)?;
    Ok(input)
  }

  /// The join's inputs, in connection order.
  pub fn inputs(&self) -> &[ConnectorId] {
    &self.inputs
  }
}

impl<T: Item> Module<T> for PassiveJoin {
  fn on_request(&mut self, graph: &mut Graph<T>, connector: ConnectorId) {
    debug_assert!(self.inputs.contains(&connector));
    let Some(item) = graph.read(connector) else {
      contract_violation("PassiveJoin input signaled without an item");
    };
    graph.send(self.output, item);
  }

  fn on_throttle(&mut self, graph: &mut Graph<T>, connector: ConnectorId) {
    debug_assert_eq!(connector, self.output);
    // Downstream cannot accept: stop every producer.
    for &input in &self.inputs {
      graph.throttle(input);
    }
  }

  fn on_unthrottle(&mut self, graph: &mut Graph<T>, connector: ConnectorId) {
    debug_assert_eq!(connector, self.output);
    for &input in &self.inputs {
      graph.unthrottle(input);
    }
  }
}

/// Fan-in for a pulling consumer: any number of active inputs, one passive
/// output. Each pull is served by the first input, in priority order, that
/// can provide an item.
pub struct PriorityJoin {
  /// The join's output; connect an active input to it.
  pub output: ConnectorId,
  inputs: Vec<ConnectorId>,
}

impl PriorityJoin {
  /// Adds a `PriorityJoin` with no inputs yet to the graph.
  pub fn attach<T: Item>(graph: &mut Graph<T>, name: &str) -> ModuleHandle<Self> {
    graph.add_module(name, |m| {
      let output = m.passive_output("output");
      m.no_route(output);
      Self {
        output,
        inputs: Vec::new(),
      }
    })
  }

  /// Connects a passive output to the join, allocating a fresh input with
  /// the lowest priority (after all existing inputs).
  pub fn connect_source<T: Item>(
    graph: &mut Graph<T>,
    this: ModuleHandle<Self>,
    source: ConnectorId,
  ) -> Result<ConnectorId, ConfigError> {
    let position = graph.module(this).inputs.len();
    Self::connect_source_at(graph, this, source, position)
  }

  /// Connects a passive output to the join at an explicit priority
  /// position; `0` is the highest priority. Existing inputs at or after
  /// `position` move down one place.
  pub fn connect_source_at<T: Item>(
    graph: &mut Graph<T>,
    this: ModuleHandle<Self>,
    source: ConnectorId,
    position: usize,
  ) -> Result<ConnectorId, ConfigError> {
    if graph.connector_kind(source) != ConnectorKind::PassiveOutput {
      return Err(ConfigError::IncompatiblePeer {
        expected: "PassiveOutput",
        connector: source,
      });
    }
    if graph.connected(source) {
      return Err(ConfigError::AlreadyConnected { connector: source });
    }
    let count = graph.module(this).inputs.len();
    let mut setup = graph.extend(this.id());
    let input = setup.active_input(&format!("input{count}"));
    setup.no_route(input);
    let join = graph.module_mut(this);
    let position = position.min(join.inputs.len());
    join.inputs.insert(position, input);
    graph.connect(source, input)?;
    Ok(input)
  }

  /// The join's inputs, highest priority first.
  pub fn inputs(&self) -> &[ConnectorId] {
    &self.inputs
  }
}

impl<T: Item> Module<T> for PriorityJoin {
  fn on_request(&mut self, graph: &mut Graph<T>, connector: ConnectorId) {
    debug_assert_eq!(connector, self.output);
    // Strict priority: earlier-connected peers win while they can deliver.
    for &input in &self.inputs {
      if !graph.ready(input) {
        continue;
      }
      match graph.read(input) {
        Some(item) => {
          graph.send(self.output, item);
          return;
        }
        None => continue,
      }
    }
    trace!("PriorityJoin pulled with every input throttled");
  }

  fn on_throttle(&mut self, graph: &mut Graph<T>, connector: ConnectorId) {
    debug_assert!(self.inputs.contains(&connector));
    if self.inputs.iter().all(|&input| graph.throttled(input)) {
      graph.throttle(self.output);
    }
  }

  fn on_unthrottle(&mut self, graph: &mut Graph<T>, connector: ConnectorId) {
    debug_assert!(self.inputs.contains(&connector));
    graph.unthrottle(self.output);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::modules::debug::{ActiveSink, ActiveSource, PassiveSink, PassiveSource};

  #[test]
  fn passive_join_forwards_from_all_sources() {
    let mut graph: Graph<u32> = Graph::new("join");
    let a = ActiveSource::attach(&mut graph, "a");
    let b = ActiveSource::attach(&mut graph, "b");
    let join = PassiveJoin::attach(&mut graph, "join");
    let sink = PassiveSink::attach(&mut graph, "sink");

    let a_out = graph.module(a).output;
    let b_out = graph.module(b).output;
    PassiveJoin::connect_source(&mut graph, join, a_out).unwrap();
    PassiveJoin::connect_source(&mut graph, join, b_out).unwrap();
    let join_out = graph.module(join).output;
    let sink_in = graph.module(sink).input;
    graph.connect(join_out, sink_in).unwrap();
    graph.init().unwrap();

    ActiveSource::submit(&mut graph, a, 1);
    ActiveSource::submit(&mut graph, b, 2);
    ActiveSource::submit(&mut graph, a, 3);
    assert_eq!(graph.module(sink).items(), &[1, 2, 3]);
  }

  #[test]
  fn passive_join_broadcasts_throttle_to_every_source() {
    let mut graph: Graph<u32> = Graph::new("join");
    let a = ActiveSource::attach(&mut graph, "a");
    let b = ActiveSource::attach(&mut graph, "b");
    let c = ActiveSource::attach(&mut graph, "c");
    let join = PassiveJoin::attach(&mut graph, "join");
    let sink = PassiveSink::attach(&mut graph, "sink");

    for source in [a, b, c] {
      let out = graph.module(source).output;
      PassiveJoin::connect_source(&mut graph, join, out).unwrap();
    }
    let join_out = graph.module(join).output;
    let sink_in = graph.module(sink).input;
    graph.connect(join_out, sink_in).unwrap();
    graph.init().unwrap();

    assert!(ActiveSource::ready(&graph, a));
    assert!(ActiveSource::ready(&graph, b));
    assert!(ActiveSource::ready(&graph, c));

    // Throttling the one sink stops all three producers...
    graph.throttle(sink_in);
    assert!(!ActiveSource::ready(&graph, a));
    assert!(!ActiveSource::ready(&graph, b));
    assert!(!ActiveSource::ready(&graph, c));

    // ...and releasing it releases all three.
    graph.unthrottle(sink_in);
    assert!(ActiveSource::ready(&graph, a));
    assert!(ActiveSource::ready(&graph, b));
    assert!(ActiveSource::ready(&graph, c));
  }

  #[test]
  fn priority_join_prefers_the_earlier_connected_source() {
    let mut graph: Graph<u32> = Graph::new("join");
    let s1 = PassiveSource::attach(&mut graph, "s1");
    let s2 = PassiveSource::attach(&mut graph, "s2");
    let join = PriorityJoin::attach(&mut graph, "join");
    let sink = ActiveSink::attach(&mut graph, "sink");

    let s1_out = graph.module(s1).output;
    let s2_out = graph.module(s2).output;
    PriorityJoin::connect_source(&mut graph, join, s1_out).unwrap();
    PriorityJoin::connect_source(&mut graph, join, s2_out).unwrap();
    let join_out = graph.module(join).output;
    let sink_in = graph.module(sink).input;
    graph.connect(join_out, sink_in).unwrap();
    graph.init().unwrap();

    // Both sources have data: s1 always wins, regardless of submit order.
    PassiveSource::submit(&mut graph, s2, 20);
    PassiveSource::submit(&mut graph, s1, 10);
    PassiveSource::submit(&mut graph, s1, 11);
    assert_eq!(ActiveSink::request(&mut graph, sink), 10);
    assert_eq!(ActiveSink::request(&mut graph, sink), 11);
    // Only once s1 drains does s2 get served.
    assert_eq!(ActiveSink::request(&mut graph, sink), 20);
  }

  #[test]
  fn priority_join_output_throttles_only_when_all_inputs_do() {
    let mut graph: Graph<u32> = Graph::new("join");
    let s1 = PassiveSource::attach(&mut graph, "s1");
    let s2 = PassiveSource::attach(&mut graph, "s2");
    let join = PriorityJoin::attach(&mut graph, "join");
    let sink = ActiveSink::attach(&mut graph, "sink");

    let s1_out = graph.module(s1).output;
    let s2_out = graph.module(s2).output;
    PriorityJoin::connect_source(&mut graph, join, s1_out).unwrap();
    PriorityJoin::connect_source(&mut graph, join, s2_out).unwrap();
    let join_out = graph.module(join).output;
    let sink_in = graph.module(sink).input;
    graph.connect(join_out, sink_in).unwrap();
    graph.init().unwrap();

    // Both sources empty: everything throttled.
    assert!(graph.throttled(join_out));
    assert!(!ActiveSink::ready(&graph, sink));

    // One source with data is enough to make the output available.
    PassiveSource::submit(&mut graph, s2, 7);
    assert!(!graph.throttled(join_out));
    assert!(ActiveSink::ready(&graph, sink));
    assert_eq!(ActiveSink::request(&mut graph, sink), 7);

    // Drained: throttled again.
    assert!(graph.throttled(join_out));
  }

  #[test]
  fn priority_join_connect_at_zero_takes_highest_priority() {
    let mut graph: Graph<u32> = Graph::new("join");
    let s1 = PassiveSource::attach(&mut graph, "s1");
    let s2 = PassiveSource::attach(&mut graph, "s2");
    let join = PriorityJoin::attach(&mut graph, "join");
    let sink = ActiveSink::attach(&mut graph, "sink");

    let s1_out = graph.module(s1).output;
    let s2_out = graph.module(s2).output;
    PriorityJoin::connect_source(&mut graph, join, s1_out).unwrap();
    PriorityJoin::connect_source_at(&mut graph, join, s2_out, 0).unwrap();
    let join_out = graph.module(join).output;
    let sink_in = graph.module(sink).input;
    graph.connect(join_out, sink_in).unwrap();
    graph.init().unwrap();

    PassiveSource::submit(&mut graph, s1, 1);
    PassiveSource::submit(&mut graph, s2, 2);
    assert_eq!(ActiveSink::request(&mut graph, sink), 2);
    assert_eq!(ActiveSink::request(&mut graph, sink), 1);
  }

  #[test]
  fn join_rejects_sources_of_the_wrong_capability() {
    let mut graph: Graph<u32> = Graph::new("join");
    let active = ActiveSource::attach(&mut graph, "active");
    let passive = PassiveSource::attach(&mut graph, "passive");
    let passive_join = PassiveJoin::attach(&mut graph, "pjoin");
    let priority_join = PriorityJoin::attach(&mut graph, "prjoin");

    let passive_out = graph.module(passive).output;
    let active_out = graph.module(active).output;
    assert!(matches!(
      PassiveJoin::connect_source(&mut graph, passive_join, passive_out),
      Err(ConfigError::IncompatiblePeer { .. })
    ));
    assert!(matches!(
      PriorityJoin::connect_source(&mut graph, priority_join, active_out),
      Err(ConfigError::IncompatiblePeer { .. })
    ));
  }
}
