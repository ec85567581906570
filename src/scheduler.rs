//! # Scheduler Seam
//!
//! The graph never blocks or polls by itself. [`Graph::run`] repeatedly
//! hands the set of currently enabled events to a [`Scheduler`] and
//! delivers whichever event the scheduler picks. What "picking" means is
//! entirely up to the implementation: a real reactor would wait on file
//! descriptors and timers and answer with the event whose occurrence it
//! observed; the built-in [`IdleScheduler`] simply fires idle events as
//! fast as the graph can process them.
//!
//! Event registration works indirectly: the graph tracks each event's
//! enabled state (module calls and throttle routing both feed it), and the
//! scheduler observes the resulting set every iteration. A scheduler with
//! per-event setup costs can diff consecutive sets to register and
//! unregister with its reactor.
//!
//! [`Graph::run`]: crate::graph::Graph::run

use crate::event::{EventId, EventKind, EventView};

/// Picks the next event to deliver out of the currently enabled ones.
///
/// Returning `None` terminates the run loop even though enabled events
/// remain — the seam for external shutdown and for test drivers with an
/// iteration budget.
///
/// Any `FnMut(&[EventView]) -> Option<EventId>` closure is a scheduler:
///
/// ```
/// use packetweave::event::{EventId, EventView};
///
/// // Deliver at most 100 events, round-robin is up to the graph's order.
/// let mut budget = 100;
/// let mut scheduler = move |enabled: &[EventView]| -> Option<EventId> {
///   if budget == 0 {
///     return None;
///   }
///   budget -= 1;
///   enabled.first().map(|view| view.id)
/// };
/// # let _ = &mut scheduler;
/// ```
pub trait Scheduler {
  /// Selects one of the enabled events for delivery, or `None` to stop.
  fn select(&mut self, enabled: &[EventView]) -> Option<EventId>;
}

impl<F> Scheduler for F
where
  F: FnMut(&[EventView]) -> Option<EventId>,
{
  fn select(&mut self, enabled: &[EventView]) -> Option<EventId> {
    self(enabled)
  }
}

/// Scheduler that keeps delivering [`EventKind::Idle`] events round-robin
/// while any are enabled.
///
/// This is all a feeder-driven graph needs: the run loop spins until every
/// idle event has been disabled by throttling, then
/// [`Graph::run`](crate::graph::Graph::run) returns on its own.
#[derive(Debug, Default)]
pub struct IdleScheduler {
  cursor: usize,
}

impl IdleScheduler {
  /// Creates an idle-event scheduler.
  pub fn new() -> Self {
    Self::default()
  }
}

impl Scheduler for IdleScheduler {
  fn select(&mut self, enabled: &[EventView]) -> Option<EventId> {
    let idle: Vec<&EventView> = enabled
      .iter()
      .filter(|view| view.kind == EventKind::Idle)
      .collect();
    if idle.is_empty() {
      return None;
    }
    self.cursor = (self.cursor + 1) % idle.len();
    Some(idle[self.cursor].id)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn view(id: usize, kind: EventKind) -> EventView {
    EventView {
      id: EventId(id),
      kind,
      name: format!("event{id}"),
    }
  }

  #[test]
  fn idle_scheduler_skips_non_idle_events() {
    let mut scheduler = IdleScheduler::new();
    let enabled = vec![view(0, EventKind::Manual), view(1, EventKind::Idle)];
    assert_eq!(scheduler.select(&enabled), Some(EventId(1)));
  }

  #[test]
  fn idle_scheduler_stops_without_idle_events() {
    let mut scheduler = IdleScheduler::new();
    assert_eq!(scheduler.select(&[view(0, EventKind::Manual)]), None);
    assert_eq!(scheduler.select(&[]), None);
  }

  #[test]
  fn idle_scheduler_alternates_between_idle_events() {
    let mut scheduler = IdleScheduler::new();
    let enabled = vec![view(0, EventKind::Idle), view(1, EventKind::Idle)];
    let first = scheduler.select(&enabled).unwrap();
    let second = scheduler.select(&enabled).unwrap();
    assert_ne!(first, second);
  }
}
