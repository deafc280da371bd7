//! Self-describing sensor data components over shared storage blocks, and a
//! process graph that streams them between processing nodes.
//!
//! The crate has two layers:
//! - The data layer describes the shape of a value as a tree of components
//!   (scalars, records, fixed and variable-length arrays, choices) and binds
//!   each node to a view onto contiguous primitive buffers. Views are windows
//!   (`start_index`, `atom_count`) onto shared storage, so traversing the tree
//!   never copies data.
//! - The process layer wires processes into a graph through their input,
//!   output and parameter ports. Connected ports share storage, and
//!   per-connection `needed`/`available` flags decide which process fires
//!   next, letting producers and consumers of different rates cooperate
//!   without a buffering queue.
//!
//! Key modules:
//! - `component`: the schema tree, its construction, view binding and
//!   resizing of variable-length arrays.
//! - `block`: the storage layouts (primitive, parallel, mixed).
//! - `process`: the `Process` trait, ports and the execution context.
//! - `graph`: connection setup and the readiness-driven scheduler.
//! - `config`: binds a process type to a graph and holds scheduler bounds.
//!
//! Quick start:
//! 1. Describe each port with `component::ComponentDesc` and build it.
//! 2. Implement `Process` (or use one from `library`), resolving ports in
//!    `initialize` and flipping readiness flags through `ExecContext` in
//!    `execute`.
//! 3. Add processes to a `graph::ProcessGraph`, connect their ports, call
//!    `initialize`, then feed sources with `execute_process` and drain the
//!    graph with `run_until_idle`.
//!
//! Execution is single-threaded and cooperative: one process runs to
//! completion at a time, and every view stays valid until the next resize of
//! the array it points into.

/// Storage blocks and the primitive buffers behind them.
pub mod block;
/// The component tree: schema, binding of storage views, and resizing.
pub mod component;
/// Binding of the process type and scheduler bounds for a graph.
///
/// Exposes the `Config` trait, mirrored by `DynConfig` for graphs of boxed
/// processes, and `SchedulerOptions`.
pub mod config;
/// Errors of the data layer.
pub mod error;
/// The process graph: connection setup and the readiness-driven scheduler.
///
/// Contains port validation on connect, block sharing between connected
/// ports, and the firing rules driven by `needed`/`available` flags.
pub mod graph;
pub mod library;
/// Process definitions and the port and execution APIs exposed to them.
///
/// Defines the `Process` trait (`initialize`, `execute`), `Ports` used
/// during initialization to look up ports by name, and `ExecContext` used at
/// runtime to reach port data and readiness flags.
pub mod process;
/// Core ids and container aliases used across the crate.
pub mod types;
/// Scalar kinds and values.
pub mod value;
