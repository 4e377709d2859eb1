use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Error;

/// A candidate file discovered by the (external) traversal layer.
///
/// Immutable once created; one record per path within a scan. `content_hash`
/// may be pre-populated by a caller with a hash cache, in which case the
/// engine will not re-hash the file.
#[derive(Debug, Clone, Serialize)]
pub struct FileRecord {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub modified: Option<DateTime<Utc>>,
    pub created: Option<DateTime<Utc>>,
    pub content_hash: Option<String>,
}

impl FileRecord {
    pub fn new(
        path: impl Into<PathBuf>,
        size_bytes: u64,
        modified: Option<DateTime<Utc>>,
        created: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            path: path.into(),
            size_bytes,
            modified,
            created,
            content_hash: None,
        }
    }

    /// Build a record by stat-ing the file. Creation time is unavailable on
    /// some filesystems and is simply left unset there.
    pub fn from_metadata(path: impl Into<PathBuf>) -> Result<Self, Error> {
        let path = path.into();
        let metadata = std::fs::metadata(&path).map_err(|source| Error::Unreadable {
            path: path.clone(),
            source,
        })?;
        Ok(Self {
            size_bytes: metadata.len(),
            modified: metadata.modified().ok().map(DateTime::<Utc>::from),
            created: metadata.created().ok().map(DateTime::<Utc>::from),
            content_hash: None,
            path,
        })
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Structural feature vector for a directory.
///
/// `structural_hash` is a pure function of the remaining fields: two
/// profiles built independently from identical field values carry identical
/// hashes (see `analysis::structure::structural_hash`).
#[derive(Debug, Clone, Serialize)]
pub struct DirectoryProfile {
    pub path: PathBuf,
    pub depth: usize,
    pub file_count: u64,
    pub subdirectory_count: u64,
    /// Lowercase, including the leading dot.
    pub file_extensions: BTreeSet<String>,
    pub subdirectory_names: BTreeSet<String>,
    pub total_size_bytes: u64,
    pub structural_hash: String,
}

/// Composed string of selected metadata fields, used when content hashing
/// is disabled but timestamp/size correlation is the similarity criterion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetadataSignature {
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
    pub size_bytes: Option<u64>,
}

impl MetadataSignature {
    pub fn from_record(record: &FileRecord, include_size: bool) -> Self {
        Self {
            created: record.created,
            modified: record.modified,
            size_bytes: include_size.then_some(record.size_bytes),
        }
    }

    /// Canonical string form; equal values mean an exact metadata match.
    pub fn value(&self) -> String {
        let render = |t: &Option<DateTime<Utc>>| {
            t.map(|t| t.to_rfc3339()).unwrap_or_else(|| "-".to_string())
        };
        let size = self
            .size_bytes
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string());
        format!("c={}|m={}|s={}", render(&self.created), render(&self.modified), size)
    }

    /// Fraction of compared fields that agree, in [0, 1]. Size is compared
    /// only when both signatures carry it.
    pub fn field_similarity(&self, other: &MetadataSignature) -> f64 {
        let mut compared = 0u32;
        let mut matched = 0u32;

        compared += 1;
        if self.created == other.created {
            matched += 1;
        }
        compared += 1;
        if self.modified == other.modified {
            matched += 1;
        }
        if self.size_bytes.is_some() && other.size_bytes.is_some() {
            compared += 1;
            if self.size_bytes == other.size_bytes {
                matched += 1;
            }
        }

        f64::from(matched) / f64::from(compared)
    }
}

/// How a group's members were matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    /// Shared fingerprint value; mutual equality is transitive.
    Exact,
    /// Single-linkage threshold match against the group's seed.
    Threshold,
}

/// One entity inside a duplicate group, reduced to the fields the
/// recommendation rules need. `input_order` is the entity's position in the
/// caller-supplied candidate sequence.
#[derive(Debug, Clone, Serialize)]
pub struct GroupMember {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub modified: Option<DateTime<Utc>>,
    pub created: Option<DateTime<Utc>>,
    pub input_order: usize,
}

impl GroupMember {
    pub fn from_file(record: &FileRecord, input_order: usize) -> Self {
        Self {
            path: record.path.clone(),
            size_bytes: record.size_bytes,
            modified: record.modified,
            created: record.created,
            input_order,
        }
    }

    pub fn from_directory(profile: &DirectoryProfile, input_order: usize) -> Self {
        Self {
            path: profile.path.clone(),
            size_bytes: profile.total_size_bytes,
            modified: None,
            created: None,
            input_order,
        }
    }
}

/// A non-empty collection of >= 2 entities matched under the grouping rule
/// in force. For `MatchKind::Threshold` groups membership is single-linkage:
/// every member matched the group's seed, not necessarily every other member.
#[derive(Debug, Clone, Serialize)]
pub struct DuplicateGroup {
    /// The shared fingerprint for exact groups; absent for threshold groups.
    pub fingerprint: Option<String>,
    pub match_kind: MatchKind,
    pub members: Vec<GroupMember>,
}

/// Deterministic keep/flag partition for one duplicate group. The engine
/// only classifies; it never deletes.
#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub keep: GroupMember,
    pub candidates_for_removal: Vec<GroupMember>,
    /// Names the rule that decided the outcome.
    pub reason: String,
}

/// An entity excluded from grouping because fingerprinting failed.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedEntity {
    pub path: PathBuf,
    pub reason: String,
}

impl SkippedEntity {
    pub fn new(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanStats {
    pub entities_seen: usize,
    pub entities_fingerprinted: usize,
    pub group_count: usize,
    pub fingerprint_duration: Duration,
}

/// Everything one pipeline run produces, for external reporting layers to
/// render. A cancelled run carries whatever work completed before the flag
/// was observed.
#[derive(Debug, Clone, Serialize)]
pub struct DetectionReport {
    pub groups: Vec<DuplicateGroup>,
    pub recommendations: Vec<Recommendation>,
    pub skipped: Vec<SkippedEntity>,
    pub stats: ScanStats,
    pub cancelled: bool,
}

/// True when `path` sits under any of the given directory prefixes.
pub(crate) fn is_under_any(path: &Path, prefixes: &[PathBuf]) -> bool {
    prefixes.iter().any(|prefix| path.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_signature_value_is_stable() {
        let record = FileRecord::new("/a/b.txt", 42, Some(ts(1_700_000_000)), Some(ts(1_600_000_000)));
        let sig_a = MetadataSignature::from_record(&record, true);
        let sig_b = MetadataSignature::from_record(&record, true);
        assert_eq!(sig_a.value(), sig_b.value());
        assert!(sig_a.value().contains("s=42"));
    }

    #[test]
    fn test_signature_without_size_differs() {
        let record = FileRecord::new("/a/b.txt", 42, Some(ts(1)), None);
        let with_size = MetadataSignature::from_record(&record, true);
        let without = MetadataSignature::from_record(&record, false);
        assert_ne!(with_size.value(), without.value());
    }

    #[test]
    fn test_field_similarity_fractional() {
        let a = MetadataSignature {
            created: Some(ts(1)),
            modified: Some(ts(2)),
            size_bytes: Some(10),
        };
        let b = MetadataSignature {
            created: Some(ts(1)),
            modified: Some(ts(3)),
            size_bytes: Some(10),
        };
        // created and size match, modified does not: 2 of 3
        let score = a.field_similarity(&b);
        assert!((score - 2.0 / 3.0).abs() < 1e-9);
        assert!((score - b.field_similarity(&a)).abs() < 1e-9);
    }

    #[test]
    fn test_field_similarity_identity() {
        let a = MetadataSignature {
            created: Some(ts(1)),
            modified: Some(ts(2)),
            size_bytes: None,
        };
        assert!((a.field_similarity(&a) - 1.0).abs() < 1e-9);
    }
}
