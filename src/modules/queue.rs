//! # Passive Queue
//!
//! [`PassiveQueue`] adapts two active connectors to each other: an active
//! producer pushes into its passive input, an active consumer pulls from its
//! passive output, and the input connector's queue buffers whatever sits
//! between the two timings.
//!
//! Backpressure works independently on both faces: the output throttles
//! itself natively whenever the buffer is empty (nothing to pull), and the
//! input's queueing discipline throttles the producer once the buffer
//! grows past its threshold.

use crate::Item;
use crate::connector::ConnectorId;
use crate::error::contract_violation;
use crate::graph::Graph;
use crate::module::{Module, ModuleHandle};
use crate::queueing::QueueingDiscipline;

/// Buffering adapter between an active producer and an active consumer.
pub struct PassiveQueue {
  /// The queue's input; connect an active output to it.
  pub input: ConnectorId,
  /// The queue's output; connect an active input to it.
  pub output: ConnectorId,
}

impl PassiveQueue {
  /// Adds a `PassiveQueue` with the default discipline (throttle the
  /// producer whenever an item is buffered) to the graph.
  pub fn attach<T: Item>(graph: &mut Graph<T>, name: &str) -> ModuleHandle<Self> {
    Self::build(graph, name, None)
  }

  /// Adds a `PassiveQueue` with an explicit queueing discipline, e.g. a
  /// deeper [`ThresholdQueueing`](crate::queueing::ThresholdQueueing).
  pub fn attach_with<T: Item>(
    graph: &mut Graph<T>,
    name: &str,
    qdisc: impl QueueingDiscipline,
  ) -> ModuleHandle<Self> {
    Self::build(graph, name, Some(Box::new(qdisc)))
  }

  fn build<T: Item>(
    graph: &mut Graph<T>,
    name: &str,
    qdisc: Option<Box<dyn QueueingDiscipline>>,
  ) -> ModuleHandle<Self> {
    graph.add_module(name, |m| {
      let input = m.passive_input("input");
      let output = m.passive_output("output");
      if let Some(qdisc) = qdisc {
        m.qdisc_boxed(input, qdisc);
      }
      // Structural only: both ends are passive, backpressure is computed
      // from the buffer on each face.
      m.route(input, output).id();
      Self { input, output }
    })
  }

  /// Number of buffered items.
  pub fn len<T: Item>(&self, graph: &Graph<T>) -> usize {
    graph.queue_size(self.input)
  }
}

impl<T: Item> Module<T> for PassiveQueue {
  fn init(&mut self, graph: &mut Graph<T>) {
    if graph.queue_size(self.input) == 0 {
      graph.throttle(self.output);
    }
  }

  fn on_request(&mut self, graph: &mut Graph<T>, connector: ConnectorId) {
    if connector == self.input {
      // An item arrived; the consumer side has something to pull now.
      graph.unthrottle(self.output);
    } else {
      debug_assert_eq!(connector, self.output);
      let Some(item) = graph.read(self.input) else {
        contract_violation("PassiveQueue pulled while empty");
      };
      graph.send(self.output, item);
      if graph.queue_size(self.input) == 0 {
        graph.throttle(self.output);
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::modules::debug::{ActiveSink, ActiveSource};
  use crate::queueing::ThresholdQueueing;

  fn wire(
    qdisc: Option<ThresholdQueueing>,
  ) -> (
    Graph<u32>,
    ModuleHandle<ActiveSource>,
    ModuleHandle<PassiveQueue>,
    ModuleHandle<ActiveSink>,
  ) {
    let mut graph: Graph<u32> = Graph::new("queue");
    let source = ActiveSource::attach(&mut graph, "source");
    let queue = match qdisc {
      Some(q) => PassiveQueue::attach_with(&mut graph, "queue", q),
      None => PassiveQueue::attach(&mut graph, "queue"),
    };
    let sink = ActiveSink::attach(&mut graph, "sink");
    let source_out = graph.module(source).output;
    let queue_in = graph.module(queue).input;
    let queue_out = graph.module(queue).output;
    let sink_in = graph.module(sink).input;
    graph.connect(source_out, queue_in).unwrap();
    graph.connect(queue_out, sink_in).unwrap();
    graph.init().unwrap();
    (graph, source, queue, sink)
  }

  #[test]
  fn buffers_between_two_active_sides() {
    let (mut graph, source, queue, sink) = wire(Some(ThresholdQueueing::new(8, 0)));

    assert!(!ActiveSink::ready(&graph, sink));
    ActiveSource::submit(&mut graph, source, 1);
    ActiveSource::submit(&mut graph, source, 2);
    assert_eq!(graph.module(queue).len(&graph), 2);

    assert!(ActiveSink::ready(&graph, sink));
    assert_eq!(ActiveSink::request(&mut graph, sink), 1);
    assert_eq!(ActiveSink::request(&mut graph, sink), 2);
    assert!(!ActiveSink::ready(&graph, sink));
  }

  #[test]
  fn discipline_backpressures_the_producer() {
    let (mut graph, source, _, sink) = wire(Some(ThresholdQueueing::new(2, 0)));

    ActiveSource::submit(&mut graph, source, 1);
    assert!(ActiveSource::ready(&graph, source));
    ActiveSource::submit(&mut graph, source, 2);
    assert!(!ActiveSource::ready(&graph, source));

    // low = 0: one pull is not enough to resume the producer.
    assert_eq!(ActiveSink::request(&mut graph, sink), 1);
    assert!(!ActiveSource::ready(&graph, source));
    assert_eq!(ActiveSink::request(&mut graph, sink), 2);
    assert!(ActiveSource::ready(&graph, source));
  }

  #[test]
  fn default_discipline_holds_one_item() {
    let (mut graph, source, _, sink) = wire(None);

    ActiveSource::submit(&mut graph, source, 1);
    assert!(!ActiveSource::ready(&graph, source));
    assert_eq!(ActiveSink::request(&mut graph, sink), 1);
    assert!(ActiveSource::ready(&graph, source));
  }
}
