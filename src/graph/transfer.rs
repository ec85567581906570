//! Item transfer: the data plane of the graph.
//!
//! Transfers are asymmetric by design. A *push* travels from an
//! ActiveOutput into a PassiveInput: [`Graph::send`] enqueues into the
//! peer's queue and signals the receiving module. A *pull* travels from an
//! ActiveInput against a PassiveOutput: [`Graph::read`] signals the
//! providing module, which answers by writing into the requesting input's
//! queue. Exactly one side of any connection drives the timing; the other
//! reacts — which is why `connect` rejects active/active and
//! passive/passive pairs.

use crate::Item;
use crate::connector::{ConnectorId, ConnectorKind};
use crate::error::contract_violation;
use crate::graph::Graph;
use crate::queueing::{Decision, QueueingEvent};
use tracing::trace;

impl<T: Item> Graph<T> {
  /// Sends an item out of an output connector into the connected input's
  /// queue.
  ///
  /// On an active output this is the module-driven "emit"; on a passive
  /// output it is the answer given from inside an `on_request` handler.
  /// Items pushed into a throttled passive input are buffered silently and
  /// signaled once the input unthrottles.
  ///
  /// # Panics
  ///
  /// Panics if `output` is not an output connector or has no peer —
  /// correct throttle observance makes both unreachable.
  pub fn send(&mut self, output: ConnectorId, item: T) {
    let conn = self.conn(output);
    if !conn.kind.is_output() {
      contract_violation("send() on an input connector");
    }
    let Some(peer) = conn.peer else {
      contract_violation("send() on an unconnected output");
    };
    trace!(
      connector = %self.connector_path(output),
      item = ?item,
      "item out"
    );
    self.input_enqueue(peer, item);
  }

  /// Takes the next item from an input connector.
  ///
  /// On a passive input this dequeues a buffered item. On an active input
  /// with an empty queue, the connected passive output's module is
  /// signaled first and the item it provides is returned. `None` means the
  /// connected module provided nothing — with correct throttle observance
  /// that only happens when the caller ignored the connector's state.
  pub fn read(&mut self, input: ConnectorId) -> Option<T> {
    let conn = self.conn(input);
    if !conn.kind.is_input() {
      contract_violation("read() on an output connector");
    }
    if conn.queue.is_empty() && conn.kind == ConnectorKind::ActiveInput {
      self.pull(input);
    }
    let item = self.conn_mut(input).queue.pop_front();
    if item.is_some() {
      trace!(connector = %self.connector_path(input), item = ?item, "item in");
      if self.conn(input).kind == ConnectorKind::PassiveInput {
        self.qdisc_update(input, QueueingEvent::Dequeue);
      }
    }
    item
  }

  /// Requests more items on an active input without dequeuing any — the
  /// provided items land in the input's queue for later [`read`]s.
  ///
  /// [`read`]: Self::read
  ///
  /// # Panics
  ///
  /// Panics if `input` is not an active input or is unconnected.
  pub fn request(&mut self, input: ConnectorId) {
    if self.conn(input).kind != ConnectorKind::ActiveInput {
      contract_violation("request() on a connector that is not an active input");
    }
    self.pull(input);
  }

  /// Signals the passive output peered with `input`, unless it is
  /// throttled.
  fn pull(&mut self, input: ConnectorId) {
    let Some(peer) = self.conn(input).peer else {
      contract_violation("pull on an unconnected active input");
    };
    self.passive_emit(peer);
  }

  /// Appends an item to an input's queue and runs the input's arrival
  /// behaviour: passive inputs signal their module (unless throttled) and
  /// consult their queueing discipline; active inputs just buffer.
  fn input_enqueue(&mut self, input: ConnectorId, item: T) {
    let conn = self.conn_mut(input);
    debug_assert!(conn.kind.is_input());
    conn.queue.push_back(item);
    if conn.kind == ConnectorKind::PassiveInput {
      self.passive_emit(input);
      self.qdisc_update(input, QueueingEvent::Enqueue);
    }
  }

  /// Reports a queue length change to the input's discipline and applies
  /// its decision through the ordinary throttle machinery.
  fn qdisc_update(&mut self, input: ConnectorId, event: QueueingEvent) {
    let conn = self.conn_mut(input);
    let size = conn.queue.len();
    let Some(qdisc) = conn.qdisc.as_mut() else {
      return;
    };
    match qdisc.update(size, event) {
      Some(Decision::Throttle) => self.passive_set_native(input, true),
      Some(Decision::Unthrottle) => self.passive_set_native(input, false),
      None => {}
    }
  }
}
