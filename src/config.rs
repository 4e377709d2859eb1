use crate::error::Error;
use serde::Deserialize;
use std::path::PathBuf;

/// Content digest algorithm, fixed at configuration-parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha256,
}

impl HashAlgorithm {
    /// Length of the lowercase hex digest this algorithm produces.
    pub fn hex_len(&self) -> usize {
        match self {
            HashAlgorithm::Md5 => 32,
            HashAlgorithm::Sha1 => 40,
            HashAlgorithm::Sha256 => 64,
        }
    }
}

impl std::fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HashAlgorithm::Md5 => write!(f, "md5"),
            HashAlgorithm::Sha1 => write!(f, "sha1"),
            HashAlgorithm::Sha256 => write!(f, "sha256"),
        }
    }
}

/// String similarity metric for filename comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SimilarityAlgorithm {
    /// Greedy longest-contiguous-block matching (Ratcliff/Obershelp style).
    Contiguous,
    /// Normalized single-character insert/delete/substitute edit distance.
    EditDistance,
    /// Jaro score with a common-prefix boost (Jaro-Winkler).
    PrefixWeighted,
}

/// What fingerprint the engine compares entities by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareBy {
    Name,
    Metadata,
    Content,
    Structure,
}

/// A single tie-break rule in the recommendation policy. Rules are applied
/// in the configured order until exactly one keep candidate remains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyRule {
    ProtectedPaths,
    KeepOldest,
    KeepShortestPath,
    FirstEncountered,
}

/// Which timestamp the keep-oldest rule compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimestampField {
    Modified,
    Created,
}

/// Blend weights for structural profile similarity. Weights are normalized
/// by their sum, so they need not add up to 1.0.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ProfileWeights {
    pub file_count: f64,
    pub subdirectory_count: f64,
    pub extensions: f64,
    pub subdirectory_names: f64,
}

impl Default for ProfileWeights {
    fn default() -> Self {
        Self {
            file_count: 0.25,
            subdirectory_count: 0.25,
            extensions: 0.25,
            subdirectory_names: 0.25,
        }
    }
}

impl ProfileWeights {
    pub fn sum(&self) -> f64 {
        self.file_count + self.subdirectory_count + self.extensions + self.subdirectory_names
    }
}

/// Engine configuration. Passed by reference into engine entry points; the
/// engine holds no process-wide state. Validated once up front; an invalid
/// value is rejected outright, never silently replaced by a default.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub algorithm: HashAlgorithm,
    pub chunk_size: usize,
    pub similarity_algorithm: SimilarityAlgorithm,
    pub similarity_threshold: f64,
    pub compare_by: CompareBy,
    pub recommendation_policy: Vec<PolicyRule>,
    pub protected_directories: Vec<PathBuf>,
    pub oldest_by: TimestampField,
    /// Include file size in metadata signatures.
    pub signature_includes_size: bool,
    /// Fold a bucketed total size into the structural hash.
    pub include_size_bucket: bool,
    pub profile_weights: ProfileWeights,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            algorithm: HashAlgorithm::Sha256,
            chunk_size: 8192,
            similarity_algorithm: SimilarityAlgorithm::Contiguous,
            similarity_threshold: 0.8,
            compare_by: CompareBy::Content,
            recommendation_policy: vec![
                PolicyRule::ProtectedPaths,
                PolicyRule::KeepOldest,
                PolicyRule::KeepShortestPath,
                PolicyRule::FirstEncountered,
            ],
            protected_directories: Vec::new(),
            oldest_by: TimestampField::Modified,
            signature_includes_size: true,
            include_size_bucket: false,
            profile_weights: ProfileWeights::default(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if self.chunk_size == 0 {
            return Err(Error::InvalidConfiguration(
                "chunk_size must be at least 1 byte".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(Error::InvalidConfiguration(format!(
                "similarity_threshold must be within [0, 1], got {}",
                self.similarity_threshold
            )));
        }
        if self.recommendation_policy.is_empty() {
            return Err(Error::InvalidConfiguration(
                "recommendation policy must contain at least one rule".to_string(),
            ));
        }
        let w = &self.profile_weights;
        if [
            w.file_count,
            w.subdirectory_count,
            w.extensions,
            w.subdirectory_names,
        ]
        .iter()
        .any(|v| *v < 0.0 || !v.is_finite())
        {
            return Err(Error::InvalidConfiguration(
                "profile weights must be finite and non-negative".to_string(),
            ));
        }
        if w.sum() <= 0.0 {
            return Err(Error::InvalidConfiguration(
                "profile weights must not all be zero".to_string(),
            ));
        }
        Ok(())
    }
}
