use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;
use tracing::debug;

use crate::{Message, SearchField};

/// Acceptance threshold for fuzzy matches.
///
/// A candidate is kept when its edit distance to the query is at most
/// `max_distance_factor * query_len`. The factor is an empirical tuning knob:
/// raising it trades precision for recall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchPolicy {
    pub max_distance_factor: usize,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            max_distance_factor: 2,
        }
    }
}

impl MatchPolicy {
    pub fn max_distance(&self, query: &str) -> usize {
        self.max_distance_factor
            .saturating_mul(query.chars().count())
    }
}

/// Filters across sender, subject and body.
pub fn filter<'a>(messages: &'a [Message], query: &str, policy: MatchPolicy) -> Vec<&'a Message> {
    filter_by_field(messages, query, SearchField::All, policy)
}

pub fn filter_by_field<'a>(
    messages: &'a [Message],
    query: &str,
    field: SearchField,
    policy: MatchPolicy,
) -> Vec<&'a Message> {
    filter_indices(messages, query, field, policy)
        .into_iter()
        .map(|idx| &messages[idx])
        .collect()
}

/// Indices into `messages` of the accepted candidates, best match first.
///
/// An empty query keeps everything in input order.
pub fn filter_indices(
    messages: &[Message],
    query: &str,
    field: SearchField,
    policy: MatchPolicy,
) -> Vec<usize> {
    if query.is_empty() {
        return (0..messages.len()).collect();
    }
    let needle = query.to_lowercase();
    let needle_len = needle.chars().count();
    let max_distance = policy.max_distance(query);
    let matcher = SkimMatcherV2::default().ignore_case();

    let mut ranked: Vec<(usize, i64, usize)> = Vec::new();
    for (idx, message) in messages.iter().enumerate() {
        let target = message.searchable(field);
        // Edit distance is at least the length difference.
        if target.chars().count().saturating_sub(needle_len) > max_distance {
            continue;
        }
        let Some(score) = matcher.fuzzy_match(&target, &needle) else {
            continue;
        };
        let distance = strsim::levenshtein(&needle, &target);
        if distance <= max_distance {
            ranked.push((distance, score, idx));
        }
    }
    ranked.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)).then(a.2.cmp(&b.2)));
    debug!(
        query_len = needle_len,
        candidates = messages.len(),
        kept = ranked.len(),
        "fuzzy filter"
    );
    ranked.into_iter().map(|(_, _, idx)| idx).collect()
}
