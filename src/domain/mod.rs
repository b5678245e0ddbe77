pub mod apply;
pub mod render;
pub mod self_test;
mod snapshot;
pub mod stats;
pub mod upstream;
pub mod value_objects;

pub use apply::{ApplyOptions, ApplyResult, ApplyStage};
pub use self_test::{SelfTestResult, StepStatus, TestStep};
pub use snapshot::{Snapshot, SnapshotMeta};
pub use stats::{ResolverStats, ServfailRate};
pub use upstream::{DohProxy, DohProxyKind, Provider, UpstreamConfig, UpstreamError, UpstreamMode};
pub use value_objects::{DomainName, Port, ServiceName, SnapshotId, StagedPath};
