pub mod analysis;
pub mod config;
pub mod engine;
pub mod error;
pub mod hasher;
pub mod model;
pub mod progress;

pub use config::{
    CompareBy, EngineConfig, HashAlgorithm, PolicyRule, ProfileWeights, SimilarityAlgorithm,
    TimestampField,
};
pub use engine::DetectionEngine;
pub use error::Error;
pub use model::{
    DetectionReport, DirectoryProfile, DuplicateGroup, FileRecord, GroupMember, MatchKind,
    MetadataSignature, Recommendation, ScanStats, SkippedEntity,
};
pub use progress::{ProgressReporter, SilentReporter};
