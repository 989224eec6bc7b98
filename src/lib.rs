//! History of the partitions visited by a best-first agglomerative
//! clustering search, with best-step tracking, lazy quality scores and the
//! tabular partition file format.

pub mod cluster_path;
pub mod error;
pub mod ground_truth;
pub mod partition;
pub mod path_file;
pub mod report;
pub mod settings;

pub use cluster_path::{PartitionPath, QualityMode, QualitySource, Step};
pub use error::{PathError, Result};
pub use ground_truth::{GroundTruth, QualityMetric};
pub use partition::{Cluster, Partition, SeqId};
pub use path_file::{PathRow, WriteOptions};
pub use settings::PathSettings;
