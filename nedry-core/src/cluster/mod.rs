//! Cluster abstraction layer
//!
//! The narrow interface Nedry needs from the control plane and the metrics
//! pipeline, plus an in-memory implementation for tests.

mod interface;
mod mock;

pub use interface::*;
pub use mock::{ClusterCall, MockCluster};
