pub mod atomic_write;
pub mod audit;
pub mod config;
pub mod gateway;
pub mod lock;
pub mod paths;
pub mod self_test;
pub mod snapshots;
pub mod tracing;
pub mod upstream_store;
