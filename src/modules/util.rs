//! # Utility Modules
//!
//! Small sources and sinks used as pipeline endpoints in tests and simple
//! applications.

use crate::Item;
use crate::connector::ConnectorId;
use crate::graph::Graph;
use crate::module::{Module, ModuleHandle};

/// Inexhaustible source providing clones of a template item on every
/// request.
///
/// The output never throttles, so a pulling consumer is never starved —
/// useful as background traffic in tests and as keep-alive filler.
pub struct CloneSource<T> {
  /// The source's output; connect it to an active input.
  pub output: ConnectorId,
  template: T,
}

impl<T: Item + Clone> CloneSource<T> {
  /// Adds a `CloneSource` producing clones of `template` to the graph.
  pub fn attach(graph: &mut Graph<T>, name: &str, template: T) -> ModuleHandle<Self> {
    graph.add_module(name, |m| {
      let output = m.passive_output("output");
      m.no_route(output);
      Self { output, template }
    })
  }

  /// Replaces the template item.
  pub fn set_template(graph: &mut Graph<T>, this: ModuleHandle<Self>, template: T) {
    graph.module_mut(this).template = template;
  }
}

impl<T: Item + Clone> Module<T> for CloneSource<T> {
  fn on_request(&mut self, graph: &mut Graph<T>, connector: ConnectorId) {
    debug_assert_eq!(connector, self.output);
    graph.send(self.output, self.template.clone());
  }
}

/// Sink that accepts and drops everything pushed into it, never
/// throttling.
pub struct DiscardSink {
  /// The sink's input; connect an active output to it.
  pub input: ConnectorId,
}

impl DiscardSink {
  /// Adds a `DiscardSink` to the graph.
  pub fn attach<T: Item>(graph: &mut Graph<T>, name: &str) -> ModuleHandle<Self> {
    graph.add_module(name, |m| {
      let input = m.passive_input("input");
      m.no_route(input);
      Self { input }
    })
  }
}

impl<T: Item> Module<T> for DiscardSink {
  fn on_request(&mut self, graph: &mut Graph<T>, connector: ConnectorId) {
    debug_assert_eq!(connector, self.input);
    let _ = graph.read(self.input);
  }
}
