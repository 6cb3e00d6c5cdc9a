//! # Content Negotiator
//!
//! Ranks candidate media types against an `Accept` header value.
//!
//! ```
//! use oas_enforcer::negotiate::rank;
//!
//! let ranked = rank(
//!     "text/html;q=0.8, application/json;q=0.9",
//!     &["application/json", "text/html"],
//! );
//! assert_eq!(ranked, vec!["application/json", "text/html"]);
//! ```

use std::cmp::Ordering;

/// One `type/subtype;q=x` entry of an `Accept` header.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaRange {
    pub main_type: String,
    pub sub_type: String,
    pub quality: f32,
    /// Position in the header, used to break ties.
    pub index: usize,
}

impl MediaRange {
    /// Parse every well-formed entry of an `Accept` value. Entries without a
    /// `/` are skipped; an unparsable `q` counts as `1`.
    #[must_use]
    pub fn parse_all(accept: &str) -> Vec<MediaRange> {
        accept
            .split(',')
            .filter_map(|entry| {
                let mut parts = entry.split(';');
                let (main_type, sub_type) = parts.next()?.trim().split_once('/')?;
                if main_type.is_empty() || sub_type.is_empty() {
                    return None;
                }
                let quality = parts
                    .filter_map(|p| p.trim().split_once('='))
                    .find(|(k, _)| k.trim().eq_ignore_ascii_case("q"))
                    .and_then(|(_, v)| v.trim().parse::<f32>().ok())
                    .map_or(1.0, |q| q.clamp(0.0, 1.0));
                Some((
                    main_type.trim().to_ascii_lowercase(),
                    sub_type.trim().to_ascii_lowercase(),
                    quality,
                ))
            })
            .enumerate()
            .map(|(index, (main_type, sub_type, quality))| MediaRange {
                main_type,
                sub_type,
                quality,
                index,
            })
            .collect()
    }

    /// 3 for an exact match, 2 for `type/*`, 1 for `*/*`, `None` otherwise.
    #[must_use]
    pub fn specificity(&self, main_type: &str, sub_type: &str) -> Option<u8> {
        if self.main_type == "*" && self.sub_type == "*" {
            Some(1)
        } else if self.main_type != main_type {
            None
        } else if self.sub_type == "*" {
            Some(2)
        } else if self.sub_type == sub_type {
            Some(3)
        } else {
            None
        }
    }
}

struct Scored {
    position: usize,
    specificity: u8,
    quality: f32,
    entry: usize,
}

/// Order `candidates` by how well the `Accept` value prefers them.
///
/// Each candidate is scored by the most specific entry that matches it (an
/// exact match beats `type/*`, which beats `*/*`). Candidates then sort by
/// specificity, quality, the entry's position and finally their own order.
/// Candidates with no matching entry, or whose most specific entry has
/// `q=0`, are left out. An empty header accepts everything in order.
#[must_use]
pub fn rank<'c, S: AsRef<str>>(accept: &str, candidates: &'c [S]) -> Vec<&'c str> {
    rank_positions(accept, candidates)
        .into_iter()
        .map(|i| candidates[i].as_ref())
        .collect()
}

/// [`rank`], returning positions into `candidates` instead of the values.
#[must_use]
pub fn rank_positions<S: AsRef<str>>(accept: &str, candidates: &[S]) -> Vec<usize> {
    let ranges = if accept.trim().is_empty() {
        MediaRange::parse_all("*/*")
    } else {
        MediaRange::parse_all(accept)
    };

    let mut scored: Vec<Scored> = candidates
        .iter()
        .enumerate()
        .filter_map(|(position, candidate)| {
            let essence = candidate
                .as_ref()
                .split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase();
            let (main_type, sub_type) = essence.split_once('/')?;
            let best = ranges
                .iter()
                .filter_map(|r| r.specificity(main_type, sub_type).map(|s| (s, r)))
                .max_by(|(sa, ra), (sb, rb)| {
                    sa.cmp(sb)
                        .then(ra.quality.partial_cmp(&rb.quality).unwrap_or(Ordering::Equal))
                        .then(rb.index.cmp(&ra.index))
                })?;
            let (specificity, range) = best;
            if range.quality <= 0.0 {
                return None;
            }
            Some(Scored {
                position,
                specificity,
                quality: range.quality,
                entry: range.index,
            })
        })
        .collect();

    scored.sort_by(|a, b| {
        b.specificity
            .cmp(&a.specificity)
            .then(b.quality.partial_cmp(&a.quality).unwrap_or(Ordering::Equal))
            .then(a.entry.cmp(&b.entry))
            .then(a.position.cmp(&b.position))
    });
    scored.into_iter().map(|s| s.position).collect()
}

/// The best candidate for an `Accept` value, if any is acceptable.
#[must_use]
pub fn best<'c, S: AsRef<str>>(accept: &str, candidates: &'c [S]) -> Option<&'c str> {
    rank(accept, candidates).into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_orders_exact_matches() {
        assert_eq!(
            rank("text/html;q=0.8, application/json;q=0.9", &["application/json", "text/html"]),
            vec!["application/json", "text/html"]
        );
        assert_eq!(
            rank("text/html;q=0.9, application/json;q=0.8", &["application/json", "text/html"]),
            vec!["text/html", "application/json"]
        );
    }

    #[test]
    fn specificity_beats_wildcards() {
        assert_eq!(
            rank("*/*, text/*, text/plain", &["application/xml", "text/html", "text/plain"]),
            vec!["text/plain", "text/html", "application/xml"]
        );
    }

    #[test]
    fn unmatched_and_refused_candidates_are_excluded() {
        assert_eq!(rank("application/json", &["text/html"]), Vec::<&str>::new());
        assert_eq!(
            rank("text/html;q=0, */*", &["text/html", "image/png"]),
            vec!["image/png"]
        );
    }

    #[test]
    fn ties_keep_entry_then_candidate_order() {
        assert_eq!(
            rank("image/png, image/gif", &["image/gif", "image/png"]),
            vec!["image/png", "image/gif"]
        );
        assert_eq!(rank("*/*", &["b/b", "a/a"]), vec!["b/b", "a/a"]);
    }

    #[test]
    fn parameters_and_case_are_ignored_for_matching() {
        assert_eq!(
            best("Application/JSON; charset=utf-8", &["application/json; charset=utf-8"]),
            Some("application/json; charset=utf-8")
        );
        assert_eq!(rank("", &["text/plain"]), vec!["text/plain"]);
        assert_eq!(rank("garbage", &["text/plain"]), Vec::<&str>::new());
    }

    #[test]
    fn parse_all_reads_quality() {
        let ranges = MediaRange::parse_all("text/*;q=0.5, */*;level=1");
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[0].quality, 0.5);
        assert_eq!(ranges[1].quality, 1.0);
        assert_eq!(ranges[1].index, 1);
    }
}
