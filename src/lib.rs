//! Vertex-centric bulk synchronous parallel graph computation.
//!
//! A [`PregelComputation`] is run over a read-only [`graph::Graph`] in
//! supersteps. In each superstep every active node is computed once, in
//! parallel, and may send messages that are delivered in the next superstep.
//! A run ends when every node voted to halt and no message is in flight, when
//! the master step says so, or after `max_iterations` supersteps.

pub use computation::PregelComputation;
pub use config::PregelConfig;
pub use error::{Error, Result};
pub use pregel::{Pregel, PregelResult};

pub mod bitset;
pub mod computation;
pub mod computations;
pub mod compute_step;
pub mod config;
pub mod context;
pub mod error;
pub mod graph;
pub mod memory;
pub mod messages;
pub mod node_value;
pub mod partition;
pub mod pregel;
pub mod progress;
pub mod schema;
pub mod types;
