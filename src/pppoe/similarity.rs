// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Username similarity scoring for fuzzy search

/// Scores how well `fragment` matches `candidate`, in `[0, 1]`.
///
/// Case-insensitive. An exact match scores 1.0, a substring match at least
/// 0.5 (more for a longer share of the username, plus a bonus for a
/// prefix), anything else at most 0.5 by edit distance.
#[must_use]
pub fn similarity(fragment: &str, candidate: &str) -> f64 {
    let fragment = fragment.to_lowercase();
    let candidate = candidate.to_lowercase();

    if fragment.is_empty() || candidate.is_empty() {
        return 0.0;
    }
    if fragment == candidate {
        return 1.0;
    }

    let frag_len = fragment.chars().count();
    let cand_len = candidate.chars().count();

    if candidate.contains(&fragment) {
        let mut score = 0.5 + 0.4 * (frag_len as f64 / cand_len as f64);
        if candidate.starts_with(&fragment) {
            score += 0.1;
        }
        return score.min(1.0);
    }

    let max_len = frag_len.max(cand_len) as f64;
    let distance = levenshtein(&fragment, &candidate) as f64;
    (0.5 * (1.0 - distance / max_len)).max(0.0)
}

/// Edit distance over chars, two-row table
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_exact_match_ignores_case() {
        assert!(close(similarity("John", "john"), 1.0));
    }

    #[test]
    fn test_prefix_scores_above_infix() {
        // "jo" in "john": 0.5 + 0.4 * 2/4 + 0.1
        assert!(close(similarity("jo", "john"), 0.8));
        // "jo" in "mojo": no prefix bonus
        assert!(close(similarity("jo", "mojo"), 0.7));
        // "jo" inside "bjorn": 0.5 + 0.4 * 2/5
        assert!(close(similarity("jo", "bjorn"), 0.66));
    }

    #[test]
    fn test_edit_distance_when_not_a_substring() {
        // Two insertions over a length of 4
        assert!(close(similarity("jo", "jxon"), 0.25));
        assert!(similarity("jo", "jxon") < similarity("jo", "bjorn"));
    }

    #[test]
    fn test_no_overlap_scores_low() {
        let score = similarity("xyz", "alice");
        assert!(score < 0.3);
        assert!(score >= 0.0);
    }

    #[test]
    fn test_empty_inputs() {
        assert!(close(similarity("", "alice"), 0.0));
        assert!(close(similarity("alice", ""), 0.0));
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", "abc"), 0);
        assert_eq!(levenshtein("jo", "bjorn"), 3);
        assert_eq!(levenshtein("jo", "jxon"), 2);
    }
}
