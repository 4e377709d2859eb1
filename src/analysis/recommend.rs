//! Keep/flag classification for duplicate groups.
//!
//! The engine never deletes anything. For each group it picks exactly one
//! `keep` member by running the policy's tie-break rules in order until one
//! candidate remains; everything else (minus protected entities) is listed
//! as a removal candidate with a reason naming the deciding rule.

use std::path::{Component, Path, PathBuf};

use crate::config::{PolicyRule, TimestampField};
use crate::error::Error;
use crate::model::{is_under_any, DuplicateGroup, GroupMember, Recommendation};

#[derive(Debug, Clone)]
pub struct RecommendationPolicy {
    pub rules: Vec<PolicyRule>,
    pub protected_directories: Vec<PathBuf>,
    pub oldest_by: TimestampField,
}

impl Default for RecommendationPolicy {
    fn default() -> Self {
        Self {
            rules: vec![
                PolicyRule::ProtectedPaths,
                PolicyRule::KeepOldest,
                PolicyRule::KeepShortestPath,
                PolicyRule::FirstEncountered,
            ],
            protected_directories: Vec::new(),
            oldest_by: TimestampField::Modified,
        }
    }
}

/// Pick the member to keep. Pure and deterministic: the outcome depends
/// only on the group's contents and the policy, never on wall-clock time or
/// map iteration order.
pub fn recommend(
    group: &DuplicateGroup,
    policy: &RecommendationPolicy,
) -> Result<Recommendation, Error> {
    if policy.rules.is_empty() {
        return Err(Error::InvalidConfiguration(
            "recommendation policy must contain at least one rule".to_string(),
        ));
    }
    if group.members.is_empty() {
        return Err(Error::InvalidConfiguration(
            "cannot recommend for an empty group".to_string(),
        ));
    }

    let protection_active = policy.rules.contains(&PolicyRule::ProtectedPaths);
    let is_protected = |member: &GroupMember| {
        protection_active && is_under_any(&member.path, &policy.protected_directories)
    };

    let mut pool: Vec<&GroupMember> = group.members.iter().collect();
    let mut reason: Option<String> = None;

    for rule in &policy.rules {
        match rule {
            PolicyRule::ProtectedPaths => {
                let unprotected: Vec<&GroupMember> = pool
                    .iter()
                    .copied()
                    .filter(|m| !is_protected(m))
                    .collect();
                if unprotected.is_empty() {
                    // Every member is protected: keep the first encountered,
                    // flag nothing.
                    let keep = first_encountered(&pool).clone();
                    return Ok(Recommendation {
                        keep,
                        candidates_for_removal: Vec::new(),
                        reason: "kept: protected directory".to_string(),
                    });
                }
                if unprotected.len() == 1 {
                    pool = unprotected;
                    reason = Some("kept: protected directory".to_string());
                    break;
                }
                pool = unprotected;
            }
            PolicyRule::KeepOldest => {
                let oldest = pool
                    .iter()
                    .filter_map(|m| timestamp_of(m, policy.oldest_by))
                    .min();
                if let Some(oldest) = oldest {
                    pool.retain(|m| timestamp_of(m, policy.oldest_by) == Some(oldest));
                    if pool.len() == 1 {
                        reason = Some(match policy.oldest_by {
                            TimestampField::Modified => {
                                "kept oldest modification time".to_string()
                            }
                            TimestampField::Created => "kept oldest creation time".to_string(),
                        });
                        break;
                    }
                }
            }
            PolicyRule::KeepShortestPath => {
                let shortest = pool
                    .iter()
                    .map(|m| path_rank(&m.path))
                    .min()
                    .unwrap_or((0, 0));
                pool.retain(|m| path_rank(&m.path) == shortest);
                if pool.len() == 1 {
                    reason = Some("kept shortest path".to_string());
                    break;
                }
            }
            PolicyRule::FirstEncountered => {
                pool = vec![first_encountered(&pool)];
                reason = Some("kept first encountered".to_string());
                break;
            }
        }
    }

    // Stable fallback when the configured rules did not fully decide.
    let keep = if pool.len() == 1 {
        pool[0].clone()
    } else {
        reason = Some("kept first encountered".to_string());
        first_encountered(&pool).clone()
    };

    let candidates_for_removal: Vec<GroupMember> = group
        .members
        .iter()
        .filter(|m| m.input_order != keep.input_order && !is_protected(m))
        .cloned()
        .collect();

    Ok(Recommendation {
        keep,
        candidates_for_removal,
        reason: reason.unwrap_or_else(|| "kept first encountered".to_string()),
    })
}

fn first_encountered<'a>(pool: &[&'a GroupMember]) -> &'a GroupMember {
    pool.iter()
        .min_by_key(|m| m.input_order)
        .expect("pool is never empty")
}

fn timestamp_of(
    member: &GroupMember,
    field: TimestampField,
) -> Option<chrono::DateTime<chrono::Utc>> {
    match field {
        TimestampField::Modified => member.modified,
        TimestampField::Created => member.created,
    }
}

/// Fewest path segments first, then shortest rendered path.
fn path_rank(path: &Path) -> (usize, usize) {
    let segments = path
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .count();
    (segments, path.as_os_str().len())
}
