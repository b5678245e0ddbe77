mod domain_name;
pub mod port;
mod service_name;
mod snapshot_id;
mod staged_path;

pub use domain_name::{DomainName, DomainNameError};
pub use port::{Port, PortError};
pub use service_name::{ServiceName, ServiceNameError};
pub use snapshot_id::{SnapshotId, SnapshotIdError};
pub use staged_path::{StagedPath, StagedPathError};
