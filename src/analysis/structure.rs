//! Directory structural profiling and profile-to-profile similarity.
//!
//! A profile reduces a directory to counts, extension/name sets and a
//! canonical hash of those features. Exclusion policy is external: the
//! profiler works from an already-filtered listing, or applies the filter
//! predicate handed to it by the caller.

use std::collections::BTreeSet;
use std::hash::Hasher as _;
use std::path::{Component, Path};
use tracing::debug;
use twox_hash::XxHash64;
use walkdir::WalkDir;

use crate::config::ProfileWeights;
use crate::error::Error;
use crate::model::DirectoryProfile;

/// Granularity of the optional size component of the structural hash.
/// Bucketing keeps a few bytes of drift from flipping the hash.
pub const SIZE_BUCKET_BYTES: u64 = 4096;

/// One already-filtered child entry of the directory being profiled.
#[derive(Debug, Clone)]
pub struct DirEntrySummary {
    pub name: String,
    pub is_dir: bool,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProfileOptions {
    /// Fold `total_size_bytes / SIZE_BUCKET_BYTES` into the structural hash.
    pub include_size_bucket: bool,
}

/// Build a profile from a pre-filtered listing. `depth` of the resulting
/// profile is the component count of `path`.
pub fn profile_from_entries(
    path: &Path,
    entries: &[DirEntrySummary],
    options: ProfileOptions,
) -> DirectoryProfile {
    let mut file_count = 0u64;
    let mut subdirectory_count = 0u64;
    let mut total_size_bytes = 0u64;
    let mut file_extensions = BTreeSet::new();
    let mut subdirectory_names = BTreeSet::new();

    for entry in entries {
        if entry.is_dir {
            subdirectory_count += 1;
            subdirectory_names.insert(entry.name.clone());
        } else {
            file_count += 1;
            total_size_bytes += entry.size_bytes;
            if let Some(ext) = extension_of(&entry.name) {
                file_extensions.insert(ext);
            }
        }
    }

    let structural_hash = structural_hash(
        &file_extensions,
        &subdirectory_names,
        file_count,
        subdirectory_count,
        options
            .include_size_bucket
            .then_some(total_size_bytes / SIZE_BUCKET_BYTES),
    );

    DirectoryProfile {
        path: path.to_path_buf(),
        depth: path_depth(path),
        file_count,
        subdirectory_count,
        file_extensions,
        subdirectory_names,
        total_size_bytes,
        structural_hash,
    }
}

/// Walk `path` and profile what the walk finds. `max_depth` of 0 means
/// unlimited; `filter` is the caller's exclusion predicate (entries it
/// rejects are pruned, subtrees included).
pub fn profile_directory<F>(
    path: &Path,
    max_depth: usize,
    filter: F,
    options: ProfileOptions,
) -> Result<DirectoryProfile, Error>
where
    F: Fn(&Path) -> bool,
{
    let mut walker = WalkDir::new(path).min_depth(1);
    if max_depth > 0 {
        walker = walker.max_depth(max_depth);
    }

    let mut entries = Vec::new();
    for entry in walker.into_iter().filter_entry(|e| filter(e.path())) {
        let entry = entry.map_err(|e| Error::Unreadable {
            path: path.to_path_buf(),
            source: walk_io_error(&e),
        })?;

        let name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type().is_dir() {
            entries.push(DirEntrySummary {
                name,
                is_dir: true,
                size_bytes: 0,
            });
        } else if entry.file_type().is_file() {
            let size_bytes = entry
                .metadata()
                .map_err(|e| Error::Unreadable {
                    path: entry.path().to_path_buf(),
                    source: walk_io_error(&e),
                })?
                .len();
            entries.push(DirEntrySummary {
                name,
                is_dir: false,
                size_bytes,
            });
        }
    }

    let profile = profile_from_entries(path, &entries, options);
    debug!(
        "Profiled {}: {} files, {} subdirs, hash {}",
        path.display(),
        profile.file_count,
        profile.subdirectory_count,
        profile.structural_hash
    );
    Ok(profile)
}

fn walk_io_error(e: &walkdir::Error) -> std::io::Error {
    match e.io_error() {
        Some(io) => std::io::Error::new(io.kind(), io.to_string()),
        None => std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
    }
}

/// Canonical feature hash: XxHash64 (seed 0) over the sorted extension set,
/// the sorted subdirectory-name set, the two counts and, when given, the
/// size bucket. `BTreeSet` iteration is already sorted, which makes the
/// serialization order deterministic regardless of how the sets were built.
pub fn structural_hash(
    file_extensions: &BTreeSet<String>,
    subdirectory_names: &BTreeSet<String>,
    file_count: u64,
    subdirectory_count: u64,
    size_bucket: Option<u64>,
) -> String {
    let mut hasher = XxHash64::with_seed(0);
    for ext in file_extensions {
        hasher.write(ext.as_bytes());
        hasher.write_u8(0);
    }
    hasher.write_u8(0xff);
    for name in subdirectory_names {
        hasher.write(name.as_bytes());
        hasher.write_u8(0);
    }
    hasher.write_u8(0xff);
    hasher.write_u64(file_count);
    hasher.write_u64(subdirectory_count);
    if let Some(bucket) = size_bucket {
        hasher.write_u64(bucket);
    }
    format!("{:016x}", hasher.finish())
}

/// Weighted blend of count similarity and set overlap, in [0, 1].
/// Identical profiles score exactly 1.0.
pub fn profile_similarity(
    a: &DirectoryProfile,
    b: &DirectoryProfile,
    weights: &ProfileWeights,
) -> f64 {
    let total = weights.sum();
    if total <= 0.0 {
        return 0.0;
    }
    let blended = weights.file_count * count_similarity(a.file_count, b.file_count)
        + weights.subdirectory_count
            * count_similarity(a.subdirectory_count, b.subdirectory_count)
        + weights.extensions * jaccard(&a.file_extensions, &b.file_extensions)
        + weights.subdirectory_names * jaccard(&a.subdirectory_names, &b.subdirectory_names);
    blended / total
}

/// `1 - |a - b| / max(a, b, 1)`.
fn count_similarity(a: u64, b: u64) -> f64 {
    let delta = a.abs_diff(b) as f64;
    let denom = a.max(b).max(1) as f64;
    1.0 - delta / denom
}

/// Intersection over union; two empty sets are identical (1.0).
fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 1.0;
    }
    let intersection = a.intersection(b).count();
    intersection as f64 / union as f64
}

/// Lowercase extension with the leading dot, or `None` for names without
/// one (dotfiles count as extensionless).
fn extension_of(name: &str) -> Option<String> {
    let idx = name.rfind('.')?;
    if idx == 0 || idx + 1 == name.len() {
        return None;
    }
    Some(name[idx..].to_ascii_lowercase())
}

fn path_depth(path: &Path) -> usize {
    path.components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, is_dir: bool, size: u64) -> DirEntrySummary {
        DirEntrySummary {
            name: name.to_string(),
            is_dir,
            size_bytes: size,
        }
    }

    #[test]
    fn test_profile_from_entries_counts() {
        let entries = [
            entry("a.TXT", false, 100),
            entry("b.txt", false, 200),
            entry("c.log", false, 50),
            entry("sub", true, 0),
            entry("other", true, 0),
        ];
        let profile =
            profile_from_entries(Path::new("/data/photos"), &entries, ProfileOptions::default());
        assert_eq!(profile.file_count, 3);
        assert_eq!(profile.subdirectory_count, 2);
        assert_eq!(profile.total_size_bytes, 350);
        // extensions are lowercased and deduplicated
        assert_eq!(
            profile.file_extensions.iter().cloned().collect::<Vec<_>>(),
            vec![".log".to_string(), ".txt".to_string()]
        );
        assert!(profile.subdirectory_names.contains("sub"));
        assert_eq!(profile.depth, 2);
    }

    #[test]
    fn test_structural_hash_reproducible_across_builds() {
        // Same features fed in different entry orders must hash identically.
        let forward = [
            entry("a.txt", false, 10),
            entry("b.log", false, 20),
            entry("sub", true, 0),
        ];
        let backward = [
            entry("sub", true, 0),
            entry("b.log", false, 20),
            entry("a.txt", false, 10),
        ];
        let p1 = profile_from_entries(Path::new("/x"), &forward, ProfileOptions::default());
        let p2 = profile_from_entries(Path::new("/y"), &backward, ProfileOptions::default());
        assert_eq!(p1.structural_hash, p2.structural_hash);
    }

    #[test]
    fn test_structural_hash_pure_function_of_fields() {
        let profile = profile_from_entries(
            Path::new("/x"),
            &[entry("a.txt", false, 10), entry("sub", true, 0)],
            ProfileOptions::default(),
        );
        let recomputed = structural_hash(
            &profile.file_extensions,
            &profile.subdirectory_names,
            profile.file_count,
            profile.subdirectory_count,
            None,
        );
        assert_eq!(profile.structural_hash, recomputed);
    }

    #[test]
    fn test_size_bucket_changes_hash_only_when_enabled() {
        let small = [entry("a.bin", false, 10)];
        let drifted = [entry("a.bin", false, 11)];
        let without_a =
            profile_from_entries(Path::new("/x"), &small, ProfileOptions::default());
        let without_b =
            profile_from_entries(Path::new("/x"), &drifted, ProfileOptions::default());
        assert_eq!(without_a.structural_hash, without_b.structural_hash);

        let opts = ProfileOptions {
            include_size_bucket: true,
        };
        let bucketed_a = profile_from_entries(Path::new("/x"), &small, opts);
        let bucketed_b = profile_from_entries(Path::new("/x"), &drifted, opts);
        // 10 and 11 bytes land in the same 4KiB bucket
        assert_eq!(bucketed_a.structural_hash, bucketed_b.structural_hash);
        let far = [entry("a.bin", false, 10 * SIZE_BUCKET_BYTES)];
        let bucketed_far = profile_from_entries(Path::new("/x"), &far, opts);
        assert_ne!(bucketed_a.structural_hash, bucketed_far.structural_hash);
    }

    #[test]
    fn test_identical_profiles_score_one() {
        let entries = [entry("a.txt", false, 10), entry("sub", true, 0)];
        let p1 = profile_from_entries(Path::new("/x"), &entries, ProfileOptions::default());
        let p2 = profile_from_entries(Path::new("/y"), &entries, ProfileOptions::default());
        let score = profile_similarity(&p1, &p2, &ProfileWeights::default());
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_profile_similarity_partial_overlap() {
        let p1 = profile_from_entries(
            Path::new("/a"),
            &[
                entry("x.txt", false, 10),
                entry("y.log", false, 10),
                entry("docs", true, 0),
            ],
            ProfileOptions::default(),
        );
        let p2 = profile_from_entries(
            Path::new("/b"),
            &[
                entry("x.txt", false, 10),
                entry("y.png", false, 10),
                entry("docs", true, 0),
            ],
            ProfileOptions::default(),
        );
        let score = profile_similarity(&p1, &p2, &ProfileWeights::default());
        assert!(score > 0.5 && score < 1.0, "got {score}");
        // symmetry
        let reverse = profile_similarity(&p2, &p1, &ProfileWeights::default());
        assert!((score - reverse).abs() < 1e-9);
    }

    #[test]
    fn test_count_similarity_bounds() {
        assert_eq!(count_similarity(0, 0), 1.0);
        assert_eq!(count_similarity(5, 5), 1.0);
        assert_eq!(count_similarity(0, 10), 0.0);
        assert!((count_similarity(8, 10) - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_profile_directory_walks_tree() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("sub")).unwrap();
        std::fs::write(tmp.path().join("a.txt"), b"hello").unwrap();
        std::fs::write(tmp.path().join("sub/b.log"), b"world!").unwrap();

        let profile =
            profile_directory(tmp.path(), 0, |_| true, ProfileOptions::default()).unwrap();
        assert_eq!(profile.file_count, 2);
        assert_eq!(profile.subdirectory_count, 1);
        assert_eq!(profile.total_size_bytes, 11);
        assert!(profile.file_extensions.contains(".txt"));
        assert!(profile.file_extensions.contains(".log"));

        // depth-limited walk sees only the immediate children
        let shallow =
            profile_directory(tmp.path(), 1, |_| true, ProfileOptions::default()).unwrap();
        assert_eq!(shallow.file_count, 1);
        assert_eq!(shallow.subdirectory_count, 1);
    }

    #[test]
    fn test_profile_directory_respects_filter() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("node_modules")).unwrap();
        std::fs::write(tmp.path().join("node_modules/x.js"), b"ignored").unwrap();
        std::fs::write(tmp.path().join("keep.rs"), b"kept").unwrap();

        let profile = profile_directory(
            tmp.path(),
            0,
            |p| p.file_name().map(|n| n != "node_modules").unwrap_or(true),
            ProfileOptions::default(),
        )
        .unwrap();
        assert_eq!(profile.file_count, 1);
        assert_eq!(profile.subdirectory_count, 0);
    }
}
