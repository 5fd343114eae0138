//! Nedry Core Library
//!
//! Convergence-aware pod eviction: derive how long a controller may take to
//! recover from losing a pod, wait for it to be fully available before and
//! after each deletion, and drive drain and soft-limit passes on top.

pub mod cache;
pub mod cluster;
pub mod drain;
pub mod eviction;
pub mod metrics;
pub mod model;
pub mod poller;
pub mod quantity;
pub mod selection;
pub mod softlimit;
pub mod status;
pub mod timeout;

// Re-export common types
pub use cluster::{ClusterClient, ClusterError, MetricsSource, MockCluster, PodMemoryUsage};
pub use drain::{DrainCampaign, DrainConfig, DrainReport};
pub use eviction::{EvictionOutcome, SafeEvictor};
pub use model::{ControllerKind, ControllerObservation, NodeSnapshot, PodRef, PodSnapshot};
pub use poller::{ConvergenceConfig, ConvergencePoller};
pub use selection::{NodeSelector, SelectionConfig};
pub use softlimit::{SoftLimitEnforcer, SoftLimitReport, SoftLimitVerdict};
pub use status::{ControllerStatus, StatusResolver};
