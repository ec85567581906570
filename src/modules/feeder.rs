//! # Active Feeder
//!
//! [`ActiveFeeder`] adapts two passive connectors to each other while
//! driving the run loop: whenever its idle event fires it pulls one item
//! from its active input and pushes it out of its active output. Routing
//! both connectors to the idle event disables the event as soon as either
//! side throttles, so [`Graph::run`] terminates by itself once the upstream
//! source drains (or the downstream sink stops accepting).
//!
//! Together with a [`PassiveSource`] and a [`PassiveSink`] this forms the
//! classic test harness: submit items, call `run()`, inspect the sink.
//!
//! [`Graph::run`]: crate::graph::Graph::run
//! [`PassiveSource`]: crate::modules::debug::PassiveSource
//! [`PassiveSink`]: crate::modules::debug::PassiveSink

use crate::Item;
use crate::connector::ConnectorId;
use crate::event::{EventId, EventKind};
use crate::graph::Graph;
use crate::module::{Module, ModuleHandle};
use tracing::trace;

/// Pump module: one item per idle-event delivery, input to output.
pub struct ActiveFeeder {
  /// The feeder's input; connect a passive output to it.
  pub input: ConnectorId,
  /// The feeder's output; connect it to a passive input.
  pub output: ConnectorId,
  event: EventId,
}

impl ActiveFeeder {
  /// Adds an `ActiveFeeder` to the graph.
  pub fn attach<T: Item>(graph: &mut Graph<T>, name: &str) -> ModuleHandle<Self> {
    graph.add_module(name, |m| {
      let input = m.active_input("input");
      let output = m.active_output("output");
      let event = m.event("idle", EventKind::Idle);
      // Starvation upstream or congestion downstream both stop the pump.
      m.route(input, event).id();
      m.route(event, output).id();
      Self {
        input,
        output,
        event,
      }
    })
  }

  /// The feeder's idle event.
  pub fn event(&self) -> EventId {
    self.event
  }
}

impl<T: Item> Module<T> for ActiveFeeder {
  fn on_event(&mut self, graph: &mut Graph<T>, event: EventId) {
    debug_assert_eq!(event, self.event);
    match graph.read(self.input) {
      Some(item) => graph.send(self.output, item),
      // The event raced with a throttle; nothing to forward.
      None => trace!("feeder idle tick with no item available"),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::modules::debug::{PassiveSink, PassiveSource};
  use crate::scheduler::IdleScheduler;

  #[test]
  fn feeder_pumps_source_to_sink_and_run_terminates() {
    let mut graph: Graph<u32> = Graph::new("feeder");
    let source = PassiveSource::attach(&mut graph, "source");
    let feeder = ActiveFeeder::attach(&mut graph, "feeder");
    let sink = PassiveSink::attach(&mut graph, "sink");

    let source_output = graph.module(source).output;
    let feeder_input = graph.module(feeder).input;
    let feeder_output = graph.module(feeder).output;
    let sink_input = graph.module(sink).input;
    graph.connect(source_output, feeder_input).unwrap();
    graph.connect(feeder_output, sink_input).unwrap();
    graph.init().unwrap();

    PassiveSource::submit(&mut graph, source, 1);
    PassiveSource::submit(&mut graph, source, 2);
    PassiveSource::submit(&mut graph, source, 3);

    graph.run(&mut IdleScheduler::new()).unwrap();

    assert_eq!(graph.module(sink).items(), &[1, 2, 3]);
    assert!(graph.module(source).is_empty());
  }

  #[test]
  fn feeder_event_disables_while_source_is_empty() {
    let mut graph: Graph<u32> = Graph::new("feeder");
    let source = PassiveSource::attach(&mut graph, "source");
    let feeder = ActiveFeeder::attach(&mut graph, "feeder");
    let sink = PassiveSink::attach(&mut graph, "sink");

    let source_output = graph.module(source).output;
    let feeder_input = graph.module(feeder).input;
    let feeder_output = graph.module(feeder).output;
    let sink_input = graph.module(sink).input;
    graph.connect(source_output, feeder_input).unwrap();
    graph.connect(feeder_output, sink_input).unwrap();
    graph.init().unwrap();

    let idle = graph.module(feeder).event();
    assert!(!graph.event_enabled(idle));
    PassiveSource::submit(&mut graph, source, 9);
    assert!(graph.event_enabled(idle));
  }
}
