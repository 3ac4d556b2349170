//! Candidate filtering and duplicate detection across the slides of one run.

use crate::carousel::fingerprint::Fingerprint;
use crate::models::CandidateImage;
use std::collections::{BTreeSet, HashSet};

/// Remove candidates whose URL has already been used by an earlier slide.
///
/// Pure; an empty result means "no eligible candidate" and is not an error.
pub fn filter(candidates: &[CandidateImage], used_urls: &HashSet<String>) -> Vec<CandidateImage> {
    candidates
        .iter()
        .filter(|c| !used_urls.contains(&c.source_url))
        .cloned()
        .collect()
}

/// How close two fingerprints must be to count as the same picture.
///
/// `max_distance == 0` is exact equality, the baseline policy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DuplicatePolicy {
    pub max_distance: u32,
}

impl DuplicatePolicy {
    pub fn exact() -> Self {
        Self { max_distance: 0 }
    }

    pub fn within(max_distance: u32) -> Self {
        Self { max_distance }
    }

    pub fn matches(&self, a: Fingerprint, b: Fingerprint) -> bool {
        a.distance(b) <= self.max_distance
    }
}

/// True if `fp` equals, or is within the policy radius of, any used fingerprint.
pub fn is_duplicate(
    fp: Fingerprint,
    used_fingerprints: &BTreeSet<Fingerprint>,
    policy: DuplicatePolicy,
) -> bool {
    if policy.max_distance == 0 {
        return used_fingerprints.contains(&fp);
    }
    used_fingerprints.iter().any(|used| policy.matches(fp, *used))
}

/// Everything already committed in the current carousel run.
///
/// Grows monotonically; dropped with the run.
#[derive(Debug, Default)]
pub struct UsedSet {
    urls: HashSet<String>,
    fingerprints: BTreeSet<Fingerprint>,
}

impl UsedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn urls(&self) -> &HashSet<String> {
        &self.urls
    }

    pub fn fingerprints(&self) -> &BTreeSet<Fingerprint> {
        &self.fingerprints
    }

    pub fn commit(&mut self, url: &str, fp: Fingerprint) {
        self.urls.insert(url.to_string());
        self.fingerprints.insert(fp);
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}
