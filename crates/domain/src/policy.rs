//! Acceptance policy for generated candidates

use std::collections::HashSet;
use std::sync::Arc;

use crate::model::Candidate;
use crate::ports::SentimentScorer;

/// Acceptance constraints, each independently configurable
#[derive(Debug, Clone)]
pub struct AcceptanceConfig {
    /// Minimum length in characters (inclusive)
    pub min_chars: usize,
    /// Maximum length in characters (inclusive)
    pub max_chars: usize,
    /// Positivity score must exceed this value (None disables the check)
    pub min_positivity: Option<f64>,
}

impl Default for AcceptanceConfig {
    fn default() -> Self {
        Self {
            min_chars: 1,
            max_chars: 280,
            min_positivity: Some(0.1),
        }
    }
}

/// Why a candidate was turned away
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Rejection {
    #[error("Too short: {len} < {min}")]
    TooShort { len: usize, min: usize },
    #[error("Too long: {len} > {max}")]
    TooLong { len: usize, max: usize },
    #[error("Duplicate of previously emitted text")]
    Duplicate,
    #[error("Not positive enough: {score:.3} <= {threshold:.3}")]
    NotPositive { score: f64, threshold: f64 },
}

/// An accepted candidate with its score, if one was computed
#[derive(Debug, Clone)]
pub struct Accepted {
    pub candidate: Candidate,
    pub positivity: Option<f64>,
}

/// Filter deciding which candidates enter the batch
pub struct AcceptanceFilter {
    config: AcceptanceConfig,
    scorer: Arc<dyn SentimentScorer>,
}

impl AcceptanceFilter {
    pub fn new(config: AcceptanceConfig, scorer: Arc<dyn SentimentScorer>) -> Self {
        Self { config, scorer }
    }

    pub fn config(&self) -> &AcceptanceConfig {
        &self.config
    }

    /// Check a candidate against every constraint
    ///
    /// On acceptance the text is added to `seen`.
    pub fn accept(
        &self,
        candidate: Candidate,
        seen: &mut HashSet<String>,
    ) -> Result<Accepted, Rejection> {
        self.check_length(&candidate.text)?;

        if seen.contains(&candidate.text) {
            return Err(Rejection::Duplicate);
        }

        let positivity = match self.config.min_positivity {
            Some(threshold) => {
                let score = self.scorer.score(&candidate.text);
                if score <= threshold {
                    return Err(Rejection::NotPositive { score, threshold });
                }
                Some(score)
            }
            None => None,
        };

        seen.insert(candidate.text.clone());

        Ok(Accepted {
            candidate,
            positivity,
        })
    }

    /// Length and duplicate checks for hand-written reserve entries
    ///
    /// Reserve text is curated, so it skips the positivity score.
    pub fn check_reserve(&self, text: &str, seen: &HashSet<String>) -> Result<(), Rejection> {
        self.check_length(text)?;
        if seen.contains(text) {
            return Err(Rejection::Duplicate);
        }
        Ok(())
    }

    fn check_length(&self, text: &str) -> Result<(), Rejection> {
        let len = text.chars().count();
        if len < self.config.min_chars {
            return Err(Rejection::TooShort {
                len,
                min: self.config.min_chars,
            });
        }
        if len > self.config.max_chars {
            return Err(Rejection::TooLong {
                len,
                max: self.config.max_chars,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct FixedScorer(HashMap<&'static str, f64>);

    impl SentimentScorer for FixedScorer {
        fn score(&self, text: &str) -> f64 {
            self.0.get(text).copied().unwrap_or(0.0)
        }
    }

    fn candidate(text: &str) -> Candidate {
        Candidate {
            index: 1,
            text: text.to_string(),
            image_suggestion: None,
        }
    }

    fn filter(config: AcceptanceConfig) -> AcceptanceFilter {
        let scores = HashMap::from([("Good morning", 0.6), ("Hello world", 0.4), ("Meh", 0.05)]);
        AcceptanceFilter::new(config, Arc::new(FixedScorer(scores)))
    }

    #[test]
    fn test_accepts_and_records_text() {
        let filter = filter(AcceptanceConfig::default());
        let mut seen = HashSet::new();

        let accepted = filter.accept(candidate("Good morning"), &mut seen).unwrap();

        assert_eq!(accepted.positivity, Some(0.6));
        assert!(seen.contains("Good morning"));
    }

    #[test]
    fn test_rejects_duplicate_from_history() {
        let filter = filter(AcceptanceConfig::default());
        let mut seen = HashSet::from(["Hello world".to_string()]);

        let result = filter.accept(candidate("Hello world"), &mut seen);

        assert_eq!(result.unwrap_err(), Rejection::Duplicate);
    }

    #[test]
    fn test_rejects_second_copy_within_session() {
        let filter = filter(AcceptanceConfig::default());
        let mut seen = HashSet::new();

        assert!(filter.accept(candidate("Good morning"), &mut seen).is_ok());
        assert_eq!(
            filter.accept(candidate("Good morning"), &mut seen).unwrap_err(),
            Rejection::Duplicate
        );
    }

    #[test]
    fn test_length_window_is_closed_and_counts_chars() {
        let filter = filter(AcceptanceConfig {
            min_chars: 3,
            max_chars: 4,
            min_positivity: None,
        });
        let mut seen = HashSet::new();

        assert!(filter.accept(candidate("abc"), &mut seen).is_ok());
        assert!(filter.accept(candidate("ééé"), &mut seen).is_ok());
        assert!(filter.accept(candidate("abcd"), &mut seen).is_ok());
        assert!(matches!(
            filter.accept(candidate("ab"), &mut seen),
            Err(Rejection::TooShort { len: 2, min: 3 })
        ));
        assert!(matches!(
            filter.accept(candidate("abcde"), &mut seen),
            Err(Rejection::TooLong { len: 5, max: 4 })
        ));
    }

    #[test]
    fn test_positivity_must_exceed_threshold() {
        let filter = filter(AcceptanceConfig::default());
        let mut seen = HashSet::new();

        let result = filter.accept(candidate("Meh"), &mut seen);

        assert!(matches!(result, Err(Rejection::NotPositive { .. })));
        assert!(!seen.contains("Meh"));
    }

    #[test]
    fn test_disabled_positivity_skips_scorer() {
        let filter = filter(AcceptanceConfig {
            min_positivity: None,
            ..Default::default()
        });
        let mut seen = HashSet::new();

        let accepted = filter.accept(candidate("Meh"), &mut seen).unwrap();

        assert_eq!(accepted.positivity, None);
    }

    #[test]
    fn test_reserve_check_applies_length_but_not_positivity() {
        let filter = filter(AcceptanceConfig {
            min_chars: 3,
            max_chars: 12,
            min_positivity: Some(0.5),
        });
        let seen = HashSet::from(["Hello world".to_string()]);

        assert!(filter.check_reserve("Meh", &seen).is_ok());
        assert_eq!(
            filter.check_reserve("Hello world", &seen).unwrap_err(),
            Rejection::Duplicate
        );
        assert!(matches!(
            filter.check_reserve(&"x".repeat(400), &seen),
            Err(Rejection::TooLong { len: 400, max: 12 })
        ));
        assert!(matches!(
            filter.check_reserve("ok", &seen),
            Err(Rejection::TooShort { len: 2, min: 3 })
        ));
    }
}
