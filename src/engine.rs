use dashmap::DashMap;
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::analysis::cluster::{FingerprintIndex, SimilarityClusterer};
use crate::analysis::recommend::{self, RecommendationPolicy};
use crate::analysis::strings;
use crate::analysis::structure;
use crate::config::{CompareBy, EngineConfig};
use crate::error::Error;
use crate::model::{
    DetectionReport, DirectoryProfile, DuplicateGroup, FileRecord, GroupMember, MatchKind,
    MetadataSignature, ScanStats, SkippedEntity,
};
use crate::progress::{ProgressReporter, SilentReporter};

/// Directory pairs whose total sizes differ by more than this factor skip
/// similarity scoring entirely (cheap pre-filter before the blend).
const STRUCTURE_SIZE_RATIO_CUTOFF: u64 = 16;

/// Pipeline facade: fingerprints candidates in parallel, aggregates them
/// into groups single-threaded (clustering order must be reproducible),
/// then classifies each group under the configured policy.
///
/// Holds no state between runs; every invocation produces an independent,
/// freshly computed report.
pub struct DetectionEngine {
    config: EngineConfig,
    reporter: Box<dyn ProgressReporter>,
}

impl DetectionEngine {
    /// Validates the configuration up front; a bad config is rejected here,
    /// before any entity is touched.
    pub fn new(config: EngineConfig) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self {
            config,
            reporter: Box::new(SilentReporter),
        })
    }

    pub fn with_reporter(mut self, reporter: Box<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run the pipeline over file candidates (`name`, `metadata` and
    /// `content` modes). Candidates must arrive in the caller's canonical
    /// order; group membership and recommendations follow that order.
    pub fn run_files(&self, records: &[FileRecord]) -> Result<DetectionReport, Error> {
        self.run_files_with_cancel(records, &AtomicBool::new(false))
    }

    /// Like `run_files`, but checks `cancel` between entities (never
    /// mid-read). A cancelled run reports the work completed so far with
    /// `cancelled = true`.
    pub fn run_files_with_cancel(
        &self,
        records: &[FileRecord],
        cancel: &AtomicBool,
    ) -> Result<DetectionReport, Error> {
        match self.config.compare_by {
            CompareBy::Content => self.run_content(records, cancel),
            CompareBy::Metadata => self.run_metadata(records, cancel),
            CompareBy::Name => self.run_names(records, cancel),
            CompareBy::Structure => Err(Error::InvalidConfiguration(
                "structure comparison takes directory profiles; use run_directories".to_string(),
            )),
        }
    }

    /// Run the pipeline over directory profiles (`structure` mode). Exact
    /// structural-hash matches group first; the leftovers go through
    /// threshold clustering on the weighted profile similarity.
    pub fn run_directories(
        &self,
        profiles: &[DirectoryProfile],
    ) -> Result<DetectionReport, Error> {
        self.run_directories_with_cancel(profiles, &AtomicBool::new(false))
    }

    pub fn run_directories_with_cancel(
        &self,
        profiles: &[DirectoryProfile],
        cancel: &AtomicBool,
    ) -> Result<DetectionReport, Error> {
        if self.config.compare_by != CompareBy::Structure {
            return Err(Error::InvalidConfiguration(
                "run_directories requires compare_by = structure".to_string(),
            ));
        }

        info!("Grouping {} directory profiles by structure", profiles.len());
        let start = Instant::now();
        let mut fingerprinted = 0usize;

        let mut index = FingerprintIndex::new();
        for (idx, profile) in profiles.iter().enumerate() {
            if cancel.load(Ordering::Relaxed) {
                break;
            }
            index.insert(profile.structural_hash.clone(), idx);
            fingerprinted += 1;
        }

        let mut groups: Vec<DuplicateGroup> = Vec::new();
        let mut singles: Vec<usize> = Vec::new();
        for (fingerprint, member_ids) in index.into_buckets() {
            if member_ids.len() >= 2 {
                groups.push(DuplicateGroup {
                    fingerprint: Some(fingerprint),
                    match_kind: MatchKind::Exact,
                    members: member_ids
                        .iter()
                        .map(|&i| GroupMember::from_directory(&profiles[i], i))
                        .collect(),
                });
            } else {
                singles.extend(member_ids);
            }
        }

        // Approximate pass over whatever the exact pass left unmatched.
        let mut clusterer = SimilarityClusterer::new(self.config.similarity_threshold)?;
        for idx in singles {
            if cancel.load(Ordering::Relaxed) {
                break;
            }
            clusterer.insert_prefiltered(
                idx,
                |&seed, &item| {
                    size_buckets_comparable(
                        profiles[seed].total_size_bytes,
                        profiles[item].total_size_bytes,
                    )
                },
                |&seed, &item| {
                    structure::profile_similarity(
                        &profiles[seed],
                        &profiles[item],
                        &self.config.profile_weights,
                    )
                },
            );
        }
        for member_ids in clusterer.into_clusters() {
            groups.push(DuplicateGroup {
                fingerprint: None,
                match_kind: MatchKind::Threshold,
                members: member_ids
                    .iter()
                    .map(|&i| GroupMember::from_directory(&profiles[i], i))
                    .collect(),
            });
        }

        let duration = start.elapsed();
        self.finish(
            profiles.len(),
            fingerprinted,
            groups,
            Vec::new(),
            duration,
            cancel,
        )
    }

    /// Content mode: size pre-filter, then parallel chunked hashing, then a
    /// single-threaded aggregation into the fingerprint index.
    fn run_content(
        &self,
        records: &[FileRecord],
        cancel: &AtomicBool,
    ) -> Result<DetectionReport, Error> {
        info!(
            "Grouping {} candidates by {} content hash",
            records.len(),
            self.config.algorithm
        );
        let start = Instant::now();

        // Only sizes shared by >= 2 candidates can contain duplicates.
        let size_map: DashMap<u64, Vec<usize>> = DashMap::new();
        records.par_iter().enumerate().for_each(|(idx, record)| {
            size_map.entry(record.size_bytes).or_default().push(idx);
        });
        let mut to_hash: Vec<usize> = size_map
            .iter()
            .filter(|entry| entry.value().len() > 1)
            .flat_map(|entry| entry.value().clone())
            .collect();
        // Canonical order: never depend on map iteration order.
        to_hash.sort_unstable();
        debug!(
            "Size pre-filter kept {} of {} candidates",
            to_hash.len(),
            records.len()
        );

        self.reporter.on_fingerprint_start(to_hash.len());
        let done = AtomicUsize::new(0);
        let digests: Vec<(usize, Option<Result<String, Error>>)> = to_hash
            .par_iter()
            .map(|&idx| {
                if cancel.load(Ordering::Relaxed) {
                    return (idx, None);
                }
                let record = &records[idx];
                let result = match &record.content_hash {
                    Some(hash) => Ok(hash.clone()),
                    None => crate::hasher::digest_file(
                        &record.path,
                        self.config.algorithm,
                        self.config.chunk_size,
                    ),
                };
                let count = done.fetch_add(1, Ordering::Relaxed) + 1;
                self.reporter
                    .on_fingerprint_progress(count, &record.path.to_string_lossy());
                (idx, Some(result))
            })
            .collect();

        let mut skipped = Vec::new();
        let mut fingerprinted = 0usize;
        let mut index = FingerprintIndex::new();
        for (idx, result) in digests {
            match result {
                None => {}
                Some(Ok(digest)) => {
                    fingerprinted += 1;
                    index.insert(digest, idx);
                }
                Some(Err(e)) => {
                    warn!("Skipping '{}': {}", records[idx].path.display(), e);
                    skipped.push(SkippedEntity::new(&records[idx].path, e.to_string()));
                }
            }
        }
        let duration = start.elapsed();
        self.reporter
            .on_fingerprint_complete(fingerprinted, duration.as_secs_f64());

        let groups = exact_groups_from_index(index, records);
        self.finish(records.len(), fingerprinted, groups, skipped, duration, cancel)
    }

    /// Metadata mode: exact grouping on the composed signature string.
    fn run_metadata(
        &self,
        records: &[FileRecord],
        cancel: &AtomicBool,
    ) -> Result<DetectionReport, Error> {
        info!("Grouping {} candidates by metadata signature", records.len());
        let start = Instant::now();
        let mut fingerprinted = 0usize;
        let mut index = FingerprintIndex::new();
        for (idx, record) in records.iter().enumerate() {
            if cancel.load(Ordering::Relaxed) {
                break;
            }
            let signature =
                MetadataSignature::from_record(record, self.config.signature_includes_size);
            index.insert(signature.value(), idx);
            fingerprinted += 1;
        }
        let duration = start.elapsed();

        let groups = exact_groups_from_index(index, records);
        self.finish(records.len(), fingerprinted, groups, Vec::new(), duration, cancel)
    }

    /// Name mode: single-linkage clustering on decomposed filename
    /// similarity under the configured metric.
    fn run_names(
        &self,
        records: &[FileRecord],
        cancel: &AtomicBool,
    ) -> Result<DetectionReport, Error> {
        info!(
            "Clustering {} candidates by filename (threshold {:.2})",
            records.len(),
            self.config.similarity_threshold
        );
        let start = Instant::now();
        let names: Vec<String> = records.iter().map(|r| r.file_name()).collect();

        let mut fingerprinted = 0usize;
        let mut clusterer = SimilarityClusterer::new(self.config.similarity_threshold)?;
        for idx in 0..records.len() {
            if cancel.load(Ordering::Relaxed) {
                break;
            }
            clusterer.insert(idx, |&seed, &item| {
                strings::filename_similarity(
                    &names[seed],
                    &names[item],
                    self.config.similarity_algorithm,
                )
            });
            fingerprinted += 1;
        }
        let duration = start.elapsed();

        let groups: Vec<DuplicateGroup> = clusterer
            .into_clusters()
            .into_iter()
            .map(|member_ids| DuplicateGroup {
                fingerprint: None,
                match_kind: MatchKind::Threshold,
                members: member_ids
                    .iter()
                    .map(|&i| GroupMember::from_file(&records[i], i))
                    .collect(),
            })
            .collect();
        self.finish(records.len(), fingerprinted, groups, Vec::new(), duration, cancel)
    }

    fn finish(
        &self,
        entities_seen: usize,
        entities_fingerprinted: usize,
        groups: Vec<DuplicateGroup>,
        skipped: Vec<SkippedEntity>,
        fingerprint_duration: Duration,
        cancel: &AtomicBool,
    ) -> Result<DetectionReport, Error> {
        self.reporter.on_grouping_complete(groups.len());

        let policy = self.policy();
        let mut recommendations = Vec::with_capacity(groups.len());
        for group in &groups {
            recommendations.push(recommend::recommend(group, &policy)?);
        }
        self.reporter.on_recommend_complete(recommendations.len());

        info!(
            "Detection complete: {} groups, {} entities skipped",
            groups.len(),
            skipped.len()
        );
        Ok(DetectionReport {
            stats: ScanStats {
                entities_seen,
                entities_fingerprinted,
                group_count: groups.len(),
                fingerprint_duration,
            },
            groups,
            recommendations,
            skipped,
            cancelled: cancel.load(Ordering::Relaxed),
        })
    }

    fn policy(&self) -> RecommendationPolicy {
        RecommendationPolicy {
            rules: self.config.recommendation_policy.clone(),
            protected_directories: self.config.protected_directories.clone(),
            oldest_by: self.config.oldest_by,
        }
    }
}

fn exact_groups_from_index(
    index: FingerprintIndex<usize>,
    records: &[FileRecord],
) -> Vec<DuplicateGroup> {
    index
        .into_buckets()
        .into_iter()
        .filter(|(_, member_ids)| member_ids.len() >= 2)
        .map(|(fingerprint, member_ids)| DuplicateGroup {
            fingerprint: Some(fingerprint),
            match_kind: MatchKind::Exact,
            members: member_ids
                .iter()
                .map(|&i| GroupMember::from_file(&records[i], i))
                .collect(),
        })
        .collect()
}

fn size_buckets_comparable(a: u64, b: u64) -> bool {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    hi <= lo.saturating_mul(STRUCTURE_SIZE_RATIO_CUTOFF)
}
