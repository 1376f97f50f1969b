//! Identifier allocation
//!
//! Contributors mint IDs from ranges handed out in the configuration, so no
//! central coordination is needed. The allocator checks the ranges once at
//! load time and afterwards only validates observed IDs against them.

use std::collections::BTreeSet;

use tracing::debug;

use crate::config::{normalize_orcid, IdRangeConfig};
use crate::error::ConfigError;
use crate::model::Agent;
use crate::validate::{Violation, ViolationKind};

/// A numeric ID found in vocabulary data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedId {
    pub id: u64,
    /// IRI or row locator the ID was found at
    pub subject: String,
}

/// Consumption of one range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeUsage {
    pub range: IdRangeConfig,
    pub used: u64,
    pub unused: u64,
    pub next_free: Option<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct Allocator {
    width: usize,
    ranges: Vec<IdRangeConfig>,
}

impl Allocator {
    /// Build an allocator; fails if any two ranges overlap
    pub fn new(width: usize, ranges: Vec<IdRangeConfig>) -> Result<Self, ConfigError> {
        Self::check_overlaps(&ranges)?;
        Ok(Allocator { width, ranges })
    }

    pub fn empty(width: usize) -> Self {
        Allocator {
            width,
            ranges: Vec::new(),
        }
    }

    /// Fail with the first pair of intersecting ranges
    pub fn check_overlaps(ranges: &[IdRangeConfig]) -> Result<(), ConfigError> {
        let mut sorted: Vec<&IdRangeConfig> = ranges.iter().collect();
        sorted.sort_by_key(|r| (r.first_id, r.last_id));

        let mut widest: Option<&IdRangeConfig> = None;
        for range in sorted {
            if let Some(prev) = widest {
                if range.first_id <= prev.last_id {
                    return Err(ConfigError::Overlap {
                        first: describe_range(prev),
                        second: describe_range(range),
                    });
                }
            }
            if widest.is_none_or(|w| range.last_id > w.last_id) {
                widest = Some(range);
            }
        }
        Ok(())
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn ranges(&self) -> &[IdRangeConfig] {
        &self.ranges
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Parse an ID string. Only exactly `width` ASCII digits are accepted;
    /// a longer string that merely ends in a valid ID is rejected.
    pub fn parse_id(&self, text: &str) -> Option<u64> {
        if text.len() != self.width || !text.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        text.parse().ok()
    }

    pub fn range_for(&self, id: u64) -> Option<&IdRangeConfig> {
        self.ranges
            .iter()
            .find(|r| (r.first_id..=r.last_id).contains(&id))
    }

    /// Check observed IDs against the configured ranges.
    ///
    /// Every ID must fall into a range. When a committer is known, IDs that
    /// are new relative to `baseline` must fall into one of the committer's
    /// ranges. Without a committer or baseline the ownership check is skipped.
    pub fn verify(
        &self,
        observed: &[ObservedId],
        committer: Option<&str>,
        baseline: Option<&BTreeSet<u64>>,
    ) -> Vec<Violation> {
        let mut violations = Vec::new();
        if self.ranges.is_empty() {
            debug!("No ID ranges configured, skipping ID range checks");
            return violations;
        }
        if committer.is_some() && baseline.is_none() {
            debug!("No baseline IDs available, skipping committer check");
        }

        for obs in observed {
            let Some(range) = self.range_for(obs.id) else {
                violations.push(
                    Violation::violation(
                        ViolationKind::IdOutOfRange,
                        &obs.subject,
                        format!("ID {} is not within any assigned ID range", obs.id),
                    )
                    .with_value(obs.id.to_string()),
                );
                continue;
            };
            let (Some(committer), Some(baseline)) = (committer, baseline) else {
                continue;
            };
            if baseline.contains(&obs.id) || range.is_owned_by(committer) {
                continue;
            }
            violations.push(
                Violation::violation(
                    ViolationKind::WrongContributor,
                    &obs.subject,
                    format!(
                        "ID {} belongs to the range {} of \"{}\", not to \"{}\"",
                        obs.id,
                        self.range_label(range),
                        range.owner(),
                        committer
                    ),
                )
                .with_value(obs.id.to_string()),
            );
        }
        violations
    }

    /// Per range: how many IDs are used and which one is next free
    pub fn usage(&self, used: &BTreeSet<u64>) -> Vec<RangeUsage> {
        self.ranges
            .iter()
            .map(|range| {
                let in_range = used.range(range.first_id..=range.last_id).count() as u64;
                let size = range.last_id - range.first_id + 1;
                let next_free = used
                    .range(range.first_id..=range.last_id)
                    .next_back()
                    .map_or(Some(range.first_id), |last| {
                        (*last < range.last_id).then_some(last + 1)
                    })
                    .or_else(|| (range.first_id..=range.last_id).find(|id| !used.contains(id)));
                RangeUsage {
                    range: range.clone(),
                    used: in_range,
                    unused: size - in_range,
                    next_free,
                }
            })
            .collect()
    }

    /// "0000001 - 0000099"
    pub fn range_label(&self, range: &IdRangeConfig) -> String {
        format!(
            "{:0w$} - {:0w$}",
            range.first_id,
            range.last_id,
            w = self.width
        )
    }

    /// Text for the "Unused IDs" column of the ID Ranges sheet
    pub fn usage_label(&self, usage: &RangeUsage) -> String {
        match usage.next_free {
            Some(next) => format!(
                "next unused: {:0w$}, unused: {}",
                next,
                usage.unused,
                w = self.width
            ),
            None => "all IDs used. Request a new range!".to_string(),
        }
    }

    /// Owners of ranges with used IDs, excluding the given creators
    pub fn contributors(&self, used: &BTreeSet<u64>, creators: &[Agent]) -> Vec<Agent> {
        let mut agents: Vec<Agent> = Vec::new();
        for range in &self.ranges {
            if used.range(range.first_id..=range.last_id).next().is_none() {
                continue;
            }
            let iri = match &range.orcid {
                Some(orcid) => normalize_orcid(orcid).ok(),
                None if !range.gh_name.is_empty() => {
                    Some(format!("https://github.com/{}", range.gh_name))
                }
                None => None,
            };
            let agent = Agent {
                name: range.name.clone().unwrap_or_else(|| range.gh_name.clone()),
                iri,
                email: None,
            };
            let is_creator = creators.iter().any(|c| {
                (c.iri.is_some() && c.iri == agent.iri) || c.name.eq_ignore_ascii_case(&agent.name)
            });
            if !is_creator && !agents.contains(&agent) {
                agents.push(agent);
            }
        }
        agents
    }
}

fn describe_range(range: &IdRangeConfig) -> String {
    format!("{}-{} ({})", range.first_id, range.last_id, range.owner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::Severity;

    fn range(first: u64, last: u64, gh: &str) -> IdRangeConfig {
        IdRangeConfig {
            first_id: first,
            last_id: last,
            gh_name: gh.to_string(),
            ..Default::default()
        }
    }

    fn allocator() -> Allocator {
        Allocator::new(7, vec![range(1, 10, "alice"), range(11, 20, "bob")]).unwrap()
    }

    fn observed(id: u64) -> ObservedId {
        ObservedId {
            id,
            subject: format!("https://example.org/voc_{:07}", id),
        }
    }

    #[test]
    fn test_overlap_names_both_ranges() {
        let err = Allocator::new(7, vec![range(1, 10, "alice"), range(8, 12, "bob")]).unwrap_err();
        match err {
            ConfigError::Overlap { first, second } => {
                assert_eq!(first, "1-10 (alice)");
                assert_eq!(second, "8-12 (bob)");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_overlap_with_nested_range() {
        let ranges = vec![range(1, 100, "a"), range(200, 300, "b"), range(50, 60, "c")];
        assert!(Allocator::check_overlaps(&ranges).is_err());
    }

    #[test]
    fn test_adjacent_ranges_do_not_overlap() {
        assert!(Allocator::check_overlaps(&[range(1, 10, "a"), range(11, 20, "b")]).is_ok());
    }

    #[test]
    fn test_parse_id_exact_width() {
        let alloc = allocator();
        assert_eq!(alloc.parse_id("0012345"), Some(12345));
        // eight digits that contain the valid substring "0012345"
        assert_eq!(alloc.parse_id("00012345"), None);
        assert_eq!(alloc.parse_id("012345"), None);
        assert_eq!(alloc.parse_id("00123a5"), None);
    }

    #[test]
    fn test_verify_out_of_range() {
        let violations = allocator().verify(&[observed(5), observed(25)], None, None);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, ViolationKind::IdOutOfRange);
        assert_eq!(violations[0].severity, Severity::Violation);
        assert_eq!(violations[0].value.as_deref(), Some("25"));
    }

    #[test]
    fn test_verify_committer_only_for_new_ids() {
        let alloc = allocator();
        let baseline: BTreeSet<u64> = [12].into_iter().collect();
        let violations = alloc.verify(
            &[observed(5), observed(12), observed(13)],
            Some("alice"),
            Some(&baseline),
        );
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, ViolationKind::WrongContributor);
        assert!(violations[0].subject.ends_with("0000013"));
    }

    #[test]
    fn test_verify_skips_committer_check_without_identity() {
        let alloc = allocator();
        let baseline = BTreeSet::new();
        assert!(alloc.verify(&[observed(13)], None, Some(&baseline)).is_empty());
        assert!(alloc.verify(&[observed(13)], Some("alice"), None).is_empty());
    }

    #[test]
    fn test_usage() {
        let alloc = allocator();
        let used: BTreeSet<u64> = [1, 2, 3, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20]
            .into_iter()
            .collect();
        let usage = alloc.usage(&used);
        assert_eq!(usage[0].used, 3);
        assert_eq!(usage[0].unused, 7);
        assert_eq!(usage[0].next_free, Some(4));
        assert_eq!(alloc.usage_label(&usage[0]), "next unused: 0000004, unused: 7");
        assert_eq!(usage[1].next_free, None);
        assert_eq!(alloc.usage_label(&usage[1]), "all IDs used. Request a new range!");
        assert_eq!(alloc.range_label(&usage[1].range), "0000011 - 0000020");
    }

    #[test]
    fn test_usage_fills_gap_when_top_used() {
        let alloc = allocator();
        let used: BTreeSet<u64> = [1, 10].into_iter().collect();
        assert_eq!(alloc.usage(&used)[0].next_free, Some(2));
    }

    #[test]
    fn test_contributors_exclude_creators() {
        let alloc = allocator();
        let used: BTreeSet<u64> = [1, 11].into_iter().collect();
        let creators = vec![Agent {
            name: "alice".into(),
            iri: None,
            email: None,
        }];
        let contributors = alloc.contributors(&used, &creators);
        assert_eq!(contributors.len(), 1);
        assert_eq!(contributors[0].name, "bob");
        assert_eq!(contributors[0].iri.as_deref(), Some("https://github.com/bob"));
    }
}
