//! Hexroute: an H3-hierarchical shortest-path engine.
//!
//! The routing graph is a line graph over road edges: shortcut records are
//! its arcs, precomputed offline against an H3-cell hierarchy instead of a
//! node-importance order. The engine loads those records into a packed CSR
//! store, answers bidirectional pruned queries over it, expands shortcut
//! paths back to base edges, and serves everything over HTTP for many named
//! datasets at once.
//!
//! Key principle: datasets are immutable after publish. Queries never write
//! and never lock; loads and unloads go through the registry.

pub mod config;
pub mod error;
pub mod expand;
pub mod graph;
pub mod h3;
pub mod mem;
pub mod query;
pub mod registry;
pub mod server;
pub mod spatial;
pub mod store;

pub use error::EngineError;
pub use graph::RouteGraph;
pub use query::{Algorithm, HighCell, QueryResult};
pub use registry::{Dataset, Registry};
pub use spatial::IndexKind;
