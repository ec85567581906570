//! # PacketWeave
//!
//! Composable packet-processing pipelines with cooperative flow control.
//!
//! A network application is assembled as a [`Graph`] of small modules
//! instead of hand-written control flow. Modules exchange discrete items
//! through typed connectors and cooperatively signal flow-control
//! ("throttle") state in both directions, with the guarantee that
//! backpressure in one part of the graph propagates to every module that
//! must react to it — stop producing, stop requesting, disable an event.
//!
//! ## Key Concepts
//!
//! - **Connectors** come in four capability variants (active/passive ×
//!   input/output). A connection always pairs one active and one passive
//!   connector: exactly one side drives the timing of every transfer.
//! - **Routes** declare how throttle notifications travel *through* a
//!   module, from the connector where backpressure arrives to the
//!   connector or event that must react.
//! - **Queueing disciplines** turn buffer occupancy into native throttle
//!   state with hysteresis.
//! - **Joins and routers** grow connectors dynamically for fan-in and
//!   fan-out topologies.
//! - **Events** hook the pipeline to the outside world through a narrow
//!   [`Scheduler`] seam; the run loop ends when no enabled events remain.
//!
//! ## Quick Start
//!
//! ```
//! use packetweave::graph::Graph;
//! use packetweave::modules::debug::{PassiveSink, PassiveSource};
//! use packetweave::modules::feeder::ActiveFeeder;
//! use packetweave::scheduler::IdleScheduler;
//!
//! let mut graph: Graph<u32> = Graph::new("quickstart");
//! let source = PassiveSource::attach(&mut graph, "source");
//! let feeder = ActiveFeeder::attach(&mut graph, "feeder");
//! let sink = PassiveSink::attach(&mut graph, "sink");
//!
//! let source_output = graph.module(source).output;
//! let feeder_input = graph.module(feeder).input;
//! let feeder_output = graph.module(feeder).output;
//! let sink_input = graph.module(sink).input;
//! graph.connect(source_output, feeder_input).unwrap();
//! graph.connect(feeder_output, sink_input).unwrap();
//!
//! for item in [1, 2, 3] {
//!   PassiveSource::submit(&mut graph, source, item);
//! }
//! graph.run(&mut IdleScheduler::new()).unwrap();
//! assert_eq!(graph.module(sink).items(), &[1, 2, 3]);
//! ```
//!
//! ## Concurrency Model
//!
//! Single-threaded, cooperative, event-driven. Every state transition runs
//! synchronously inside the call that initiated it; throttle propagation
//! completes before control returns to the run loop. There is no internal
//! locking and no deferred batching — what a handler observes is always the
//! settled state of the whole graph.

#![deny(missing_docs)]

pub mod connector;
pub mod error;
pub mod event;
pub mod graph;
pub mod module;
pub mod modules;
pub mod queueing;
pub mod route;
pub mod scheduler;
pub mod topology;

pub use connector::{ConnectorId, ConnectorKind, Direction, Mode};
pub use error::ConfigError;
pub use event::{EventId, EventKind};
pub use graph::Graph;
pub use module::{Module, ModuleHandle, ModuleId, ModuleSetup};
pub use queueing::{QueueingDiscipline, ThresholdQueueing};
pub use route::{Endpoint, RouteId};
pub use scheduler::{IdleScheduler, Scheduler};
pub use topology::Topology;

/// Marker for types that may flow through a pipeline.
///
/// Blanket-implemented: any `Debug + 'static` type qualifies. `Debug` keeps
/// items traceable in the transfer log; no other structure is assumed —
/// packet representation is the business of the modules at the pipeline's
/// edges.
pub trait Item: std::fmt::Debug + 'static {}

impl<T: std::fmt::Debug + 'static> Item for T {}
