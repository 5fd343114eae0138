//! Nedry Kubernetes Integration
//!
//! Binds the core cluster and metrics interfaces to a live API server.

pub mod client;
pub mod convert;
pub mod metrics_api;
pub mod operator;

pub use client::K8sClient;
pub use metrics_api::PodMetricsSource;
pub use operator::ClusterOperator;
