//! Fuzzy filename matching for broken-reference suggestions.
//!
//! Similarity is `1 - levenshtein(a, b) / max(len(a), len(b))` over Unicode
//! scalar values: symmetric, 1.0 for identical strings and 0.0 when the two
//! strings share no aligned character at all. Candidate sets are supplied by
//! the resolver and are limited to files next to the expected asset location.

#[derive(Debug, Clone, PartialEq, Eq)]
/// A file that could replace a missing reference.
pub struct Candidate {
    /// Filename compared against the missing reference's filename.
    pub name: String,
    /// Reference text to write if this candidate is chosen.
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq)]
/// Best candidate above threshold.
pub struct Match {
    pub reference: String,
    pub score: f64,
    pub distance: usize,
}

/// Levenshtein edit distance over chars (two-row DP).
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut cur = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        cur[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let sub = prev[j] + usize::from(ca != cb);
            cur[j + 1] = sub.min(prev[j + 1] + 1).min(cur[j] + 1);
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}

/// Normalized similarity in `[0, 1]`.
pub fn similarity(a: &str, b: &str) -> f64 {
    let max = a.chars().count().max(b.chars().count());
    if max == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / max as f64
}

/// Pick the best candidate for `missing_name`.
///
/// Candidates scoring below `threshold` are discarded (a score equal to the
/// threshold is accepted). Among the rest the highest score wins; ties go to
/// the smaller edit distance, then the lexicographically smaller reference.
pub fn suggest(missing_name: &str, candidates: &[Candidate], threshold: f64) -> Option<Match> {
    candidates
        .iter()
        .map(|c| {
            let distance = levenshtein(missing_name, &c.name);
            let max = missing_name.chars().count().max(c.name.chars().count());
            let score = if max == 0 {
                1.0
            } else {
                1.0 - distance as f64 / max as f64
            };
            Match {
                reference: c.reference.clone(),
                score,
                distance,
            }
        })
        .filter(|m| m.score >= threshold)
        .min_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then(a.distance.cmp(&b.distance))
                .then(a.reference.cmp(&b.reference))
        })
}

/// Closest name among `names` at or above `threshold`, same ranking as `suggest`.
pub fn closest_name(target: &str, names: &[String], threshold: f64) -> Option<String> {
    let cands: Vec<Candidate> = names
        .iter()
        .map(|n| Candidate {
            name: n.clone(),
            reference: n.clone(),
        })
        .collect();
    suggest(target, &cands, threshold).map(|m| m.reference)
}
