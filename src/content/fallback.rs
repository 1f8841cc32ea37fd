//! Synthetic content for when the platform API is unreachable.
//!
//! Everything here is a pure function of the identity's platform id (or
//! the search query), so repeated fallback fetches produce the same ids
//! and upsert idempotently instead of multiplying rows.

use crate::content::Candidate;
use crate::store::ContentItem;
use chrono::{Duration, TimeZone, Utc};

const POST_TEMPLATES: [&str; 8] = [
    "finally got the build green after a week of chasing one flaky test",
    "hot take: most performance problems are just unmeasured problems",
    "spent the morning deleting code. best feature I shipped all month",
    "reading other people's error handling is the fastest way to learn a codebase",
    "the older I get the more I like boring technology",
    "wrote docs before the code today. would recommend once a year",
    "profiling session turned a 4s query into 80ms. no heroics, just an index",
    "naming things is still the hard part. the cache invalidation was fine",
];

const REPLY_TEMPLATES: [&str; 6] = [
    "agreed, though it depends a lot on the team size",
    "this matches my experience almost exactly",
    "have you tried turning the retry budget down instead?",
    "strong yes on this. the second-order effects are underrated",
    "counterpoint: the simple version was never actually simple",
    "saving this one, we hit the same wall last quarter",
];

const CANDIDATE_AUTHORS: [&str; 5] = [
    "devpractice",
    "nightshiftlog",
    "queryplanner",
    "smallbatchdev",
    "refactorista",
];

// FNV-1a, enough spread to vary template picks per account.
fn seed_for(key: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in key.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

fn pick(seed: u64, index: usize, len: usize) -> usize {
    let stride = 0x9e37_79b9_7f4a_7c15u64;
    (seed.wrapping_add(stride.wrapping_mul(index as u64)) % len as u64) as usize
}

fn posted_at(index: usize) -> String {
    let base = Utc
        .with_ymd_and_hms(2026, 2, 1, 12, 0, 0)
        .single()
        .unwrap_or_else(Utc::now);
    (base - Duration::days(index as i64)).to_rfc3339()
}

pub fn posts(identity_id: &str, platform_id: &str, count: usize) -> Vec<ContentItem> {
    let seed = seed_for(platform_id);
    (0..count)
        .map(|i| ContentItem {
            identity_id: identity_id.to_string(),
            platform_content_id: format!("fallback-post-{platform_id}-{i}"),
            text: POST_TEMPLATES[pick(seed, i, POST_TEMPLATES.len())].to_string(),
            posted_at: posted_at(i),
            like_count: ((seed >> 8).wrapping_add(i as u64 * 7) % 40) as i64,
            repost_count: ((seed >> 16).wrapping_add(i as u64 * 3) % 12) as i64,
            reply_count: ((seed >> 24).wrapping_add(i as u64 * 5) % 9) as i64,
            is_reply: false,
            parent_id: None,
        })
        .collect()
}

pub fn replies(identity_id: &str, platform_id: &str, count: usize) -> Vec<ContentItem> {
    let seed = seed_for(platform_id).rotate_left(17);
    (0..count)
        .map(|i| ContentItem {
            identity_id: identity_id.to_string(),
            platform_content_id: format!("fallback-reply-{platform_id}-{i}"),
            text: REPLY_TEMPLATES[pick(seed, i, REPLY_TEMPLATES.len())].to_string(),
            posted_at: posted_at(i),
            like_count: ((seed >> 8).wrapping_add(i as u64 * 2) % 15) as i64,
            repost_count: 0,
            reply_count: ((seed >> 24).wrapping_add(i as u64) % 4) as i64,
            is_reply: true,
            parent_id: Some(format!("fallback-parent-{platform_id}-{i}")),
        })
        .collect()
}

/// Candidate posts a search for `query` might have surfaced. The query is
/// woven into each text so drafted replies stay on topic.
pub fn candidates(query: &str, count: usize) -> Vec<Candidate> {
    let seed = seed_for(query);
    (0..count)
        .map(|i| {
            let author = CANDIDATE_AUTHORS[pick(seed, i, CANDIDATE_AUTHORS.len())];
            let text = match pick(seed.rotate_left(7), i, 3) {
                0 => format!("anyone else deep in {query} this week? curious what actually works"),
                1 => format!("unpopular opinion about {query}: the defaults are fine"),
                _ => format!("looking for recommendations on {query}, war stories welcome"),
            };
            Candidate {
                platform_content_id: format!("fallback-cand-{:016x}-{i}", seed),
                author: author.to_string(),
                text,
                engagement_count: ((seed >> 12).wrapping_add(i as u64 * 11) % 60) as i64,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn posts_are_deterministic_per_platform_id() {
        let first = posts("uuid-1", "42", 5);
        let second = posts("uuid-1", "42", 5);
        assert_eq!(first, second);

        let other = posts("uuid-1", "43", 5);
        assert_ne!(
            first.iter().map(|p| &p.platform_content_id).collect::<Vec<_>>(),
            other.iter().map(|p| &p.platform_content_id).collect::<Vec<_>>()
        );
    }

    #[test]
    fn posts_and_replies_have_distinct_stable_ids() {
        let posts = posts("uuid-1", "42", 3);
        let replies = replies("uuid-1", "42", 3);

        assert!(posts.iter().all(|p| !p.is_reply && p.parent_id.is_none()));
        assert!(replies.iter().all(|r| r.is_reply && r.parent_id.is_some()));

        let mut ids: Vec<&str> = posts
            .iter()
            .chain(replies.iter())
            .map(|item| item.platform_content_id.as_str())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 6);
    }

    #[test]
    fn requested_count_is_respected() {
        assert_eq!(posts("uuid-1", "42", 0).len(), 0);
        assert_eq!(posts("uuid-1", "42", 12).len(), 12);
        assert_eq!(replies("uuid-1", "42", 4).len(), 4);
    }

    #[test]
    fn candidates_mention_the_query() {
        let candidates = candidates("rust async", 4);
        assert_eq!(candidates.len(), 4);
        assert!(candidates.iter().all(|c| c.text.contains("rust async")));
        assert!(candidates.iter().all(|c| !c.author.is_empty()));
    }

    #[test]
    fn timestamps_descend_from_newest() {
        let posts = posts("uuid-1", "42", 3);
        assert!(posts[0].posted_at > posts[1].posted_at);
        assert!(posts[1].posted_at > posts[2].posted_at);
    }
}
