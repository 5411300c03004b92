// Key reconciler — matches topic labels across naming conventions.
//
// The same topic shows up as "Transport Infra", "transport_infra" and
// "인프라/교통" depending on which file or table it came from. Reconciliation
// first tries an exact match after normalization and then falls back to a
// fuzzy match whose scoring strategy is pluggable.

use std::collections::BTreeSet;

use tracing::debug;

/// Default minimum fuzzy score for accepting a match.
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.8;

/// Canonical form of a label for comparison: whitespace and the separators
/// `_ - / .` removed, ASCII letters lower-cased. Non-ASCII characters pass
/// through unchanged.
pub fn normalize_label(label: &str) -> String {
    label
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '_' | '-' | '/' | '.'))
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Fuzzy similarity strategy between two normalized labels.
pub trait LabelMatcher: Send + Sync {
    /// Similarity in [0.0, 1.0]; 1.0 means identical.
    fn similarity(&self, a: &str, b: &str) -> f64;
}

/// Normalized Levenshtein similarity (1 - distance / longer length).
#[derive(Debug, Clone, Copy, Default)]
pub struct EditDistance;

impl LabelMatcher for EditDistance {
    fn similarity(&self, a: &str, b: &str) -> f64 {
        strsim::normalized_levenshtein(a, b)
    }
}

/// Jaccard overlap of word tokens. Works on the raw (un-normalized) labels
/// split on anything that isn't alphanumeric, so "housing & environment"
/// and "environment housing" match fully.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenOverlap;

impl TokenOverlap {
    fn tokens(label: &str) -> BTreeSet<String> {
        label
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(|t| t.to_ascii_lowercase())
            .collect()
    }
}

impl LabelMatcher for TokenOverlap {
    fn similarity(&self, a: &str, b: &str) -> f64 {
        let ta = Self::tokens(a);
        let tb = Self::tokens(b);
        if ta.is_empty() && tb.is_empty() {
            return 0.0;
        }
        let inter = ta.intersection(&tb).count() as f64;
        let union = ta.union(&tb).count() as f64;
        if union == 0.0 {
            0.0
        } else {
            inter / union
        }
    }
}

/// Resolves a target topic (given as a set of acceptable spellings) against
/// the labels actually present in some source.
pub struct KeyReconciler {
    matcher: Box<dyn LabelMatcher>,
    threshold: f64,
}

impl Default for KeyReconciler {
    fn default() -> Self {
        Self::new(Box::new(EditDistance), DEFAULT_MATCH_THRESHOLD)
    }
}

impl KeyReconciler {
    pub fn new(matcher: Box<dyn LabelMatcher>, threshold: f64) -> Self {
        Self { matcher, threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Find the available label that best matches any of the targets.
    ///
    /// Returns `None` when nothing matches exactly and no fuzzy candidate
    /// reaches the threshold. Both sets are sorted first, so the answer does
    /// not depend on the caller's iteration order.
    pub fn resolve<T, A>(&self, targets: T, available: A) -> Option<String>
    where
        T: IntoIterator,
        T::Item: AsRef<str>,
        A: IntoIterator,
        A::Item: AsRef<str>,
    {
        let targets: BTreeSet<String> = targets
            .into_iter()
            .map(|t| t.as_ref().to_string())
            .collect();
        let available: BTreeSet<String> = available
            .into_iter()
            .map(|a| a.as_ref().to_string())
            .collect();

        if targets.is_empty() || available.is_empty() {
            return None;
        }

        let normalized_available: Vec<(String, &String)> = available
            .iter()
            .map(|label| (normalize_label(label), label))
            .collect();

        // Exact match after normalization
        for target in &targets {
            let wanted = normalize_label(target);
            if let Some((_, label)) = normalized_available.iter().find(|(n, _)| *n == wanted) {
                return Some((*label).clone());
            }
        }

        // Fuzzy fallback: keep the first best score in sorted order. Score
        // both the normalized and the raw forms since token-based matchers
        // need the separators that normalization strips.
        let mut best: Option<(f64, &String)> = None;
        for target in &targets {
            let wanted = normalize_label(target);
            for (normalized, label) in &normalized_available {
                let score = self
                    .matcher
                    .similarity(&wanted, normalized)
                    .max(self.matcher.similarity(target, label));
                if best.map_or(true, |(s, _)| score > s) {
                    best = Some((score, *label));
                }
            }
        }

        match best {
            Some((score, label)) if score >= self.threshold => {
                debug!(label = %label, score = score, "Fuzzy label match");
                Some(label.clone())
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label(" Transport Infra "), "transportinfra");
        assert_eq!(normalize_label("transport_infra"), "transportinfra");
        assert_eq!(normalize_label("주거/환경"), "주거환경");
        assert_eq!(normalize_label("Ünicode"), "Ünicode");
    }

    #[test]
    fn test_exact_match_wins_over_fuzzy() {
        let r = KeyReconciler::default();
        let got = r.resolve(["housing"], ["housings", "Housing"]);
        assert_eq!(got.as_deref(), Some("Housing"));
    }

    #[test]
    fn test_fuzzy_match_above_threshold() {
        let r = KeyReconciler::default();
        // One typo in ten characters: similarity 0.9
        let got = r.resolve(["healthcare"], ["healtcare", "labor"]);
        assert_eq!(got.as_deref(), Some("healtcare"));
    }

    #[test]
    fn test_fuzzy_match_below_threshold_is_unresolved() {
        let r = KeyReconciler::default();
        assert_eq!(r.resolve(["healthcare"], ["housing", "transport"]), None);
    }

    #[test]
    fn test_empty_sets_are_unresolved() {
        let r = KeyReconciler::default();
        assert_eq!(r.resolve(Vec::<String>::new(), ["a"]), None);
        assert_eq!(r.resolve(["a"], Vec::<String>::new()), None);
    }

    #[test]
    fn test_token_overlap_matcher() {
        let m = TokenOverlap;
        assert!((m.similarity("housing environment", "environment housing") - 1.0).abs() < 1e-12);
        assert!((m.similarity("housing environment", "housing") - 0.5).abs() < 1e-12);
        assert_eq!(m.similarity("", ""), 0.0);
    }

    #[test]
    fn test_token_overlap_reconciler() {
        let r = KeyReconciler::new(Box::new(TokenOverlap), 0.5);
        let got = r.resolve(["labor and economy"], ["economy labor", "health"]);
        assert_eq!(got.as_deref(), Some("economy labor"));
    }
}
