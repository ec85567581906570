//! # The Pipeline Graph
//!
//! [`Graph`] is the registry that owns every module, connector, route and
//! event of one pipeline, and the engine that moves items and throttle
//! notifications between them. It is an explicit value — construct as many
//! independent graphs as needed (one per test, one per application) — there
//! is no process-wide registry.
//!
//! The implementation is split by concern:
//!
//! - [`graph`](self) — registries, wiring (`connect`/`disconnect`), module
//!   storage and typed access;
//! - `transfer` — the data plane: `send`, `read`, `request` and the queue
//!   bookkeeping around them;
//! - `throttle` — the control plane: native/forwarded state transitions and
//!   route propagation;
//! - `execution` — dispatching module handlers, deferred initialization and
//!   the `run` loop.

mod execution;
#[allow(clippy::module_inception)]
mod graph;
mod throttle;
mod transfer;

pub use graph::{Graph, MAX_DISPATCH_DEPTH};
