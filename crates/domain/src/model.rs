//! Domain models and value objects

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

/// A fully rendered prompt, ready to hand to a provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt(String);

impl Prompt {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Prompt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raw text returned by a provider for a single invocation
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// Name of the provider link that produced the text
    pub provider: String,
    /// Unparsed output
    pub text: String,
}

/// One parsed, not-yet-accepted unit of output text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Block number as labelled by the provider
    pub index: u32,
    /// Main post text
    pub text: String,
    /// Optional image idea captured from the sub-field marker
    pub image_suggestion: Option<String>,
}

/// Where a batch item came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemOrigin {
    /// Produced by a provider and accepted by the filter
    Generated { provider: String },
    /// Taken from the pre-written reserve list
    Reserve,
}

/// An accepted item waiting in the batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItem {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_suggestion: Option<String>,
    pub origin: ItemOrigin,
    /// Positivity score at acceptance time, if the check was enabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub positivity: Option<f64>,
}

impl BatchItem {
    pub fn generated(candidate: Candidate, provider: &str, positivity: Option<f64>) -> Self {
        Self {
            text: candidate.text,
            image_suggestion: candidate.image_suggestion,
            origin: ItemOrigin::Generated {
                provider: provider.to_string(),
            },
            positivity,
        }
    }

    pub fn reserve(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            image_suggestion: None,
            origin: ItemOrigin::Reserve,
            positivity: None,
        }
    }

    pub fn is_reserve(&self) -> bool {
        matches!(self.origin, ItemOrigin::Reserve)
    }
}

/// The day's accepted output set awaiting publication
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    /// Persisted format version
    pub version: u32,
    /// Calendar day the batch was generated for
    pub date: Date,
    /// Number of items the generation session aimed for
    pub target_count: usize,
    /// When the batch was written
    #[serde(with = "time::serde::rfc3339")]
    pub generated_at: OffsetDateTime,
    /// Items already consumed by a publisher
    #[serde(default)]
    pub published: usize,
    /// Pending items, front first
    pub items: Vec<BatchItem>,
}

impl Batch {
    pub const FORMAT_VERSION: u32 = 1;

    pub fn new(date: Date, target_count: usize, generated_at: OffsetDateTime) -> Self {
        Self {
            version: Self::FORMAT_VERSION,
            date,
            target_count,
            generated_at,
            published: 0,
            items: Vec::with_capacity(target_count),
        }
    }

    /// Whether generation for `date` already happened with enough output
    pub fn satisfies(&self, date: Date, target_count: usize) -> bool {
        self.date == date && self.items.len() + self.published >= target_count
    }

    /// Items still needed, counting those already published
    pub fn remaining(&self) -> usize {
        self.target_count.saturating_sub(self.items.len() + self.published)
    }

    pub fn is_full(&self) -> bool {
        self.remaining() == 0
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Append an item unless the batch is already at its target
    pub fn push(&mut self, item: BatchItem) -> bool {
        if self.is_full() {
            return false;
        }
        self.items.push(item);
        true
    }

    pub fn front(&self) -> Option<&BatchItem> {
        self.items.first()
    }

    /// Remove the front item after it has been published
    pub fn consume_front(&mut self) -> Option<BatchItem> {
        if self.items.is_empty() {
            return None;
        }
        self.published += 1;
        Some(self.items.remove(0))
    }

    pub fn generated_count(&self) -> usize {
        self.items.iter().filter(|item| !item.is_reserve()).count()
    }

    pub fn reserve_count(&self) -> usize {
        self.items.iter().filter(|item| item.is_reserve()).count()
    }
}

/// Record of a published post, appended to the history log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedRecord {
    /// Unique record ID
    pub id: Uuid,
    /// Platform-specific post ID
    pub post_id: String,
    /// Platform name (e.g., "x", "outbox")
    pub platform: String,
    /// Exact published text
    pub text: String,
    /// When published
    #[serde(with = "time::serde::rfc3339")]
    pub published_at: OffsetDateTime,
}

/// How a generation session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// A batch for today of sufficient size already existed
    AlreadySatisfied,
    /// Enough generated items were accepted
    TargetMet,
    /// Rounds ran out; the remainder came from the reserve list
    FilledFromReserve,
}

/// Counts reported at the end of every generation session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationReport {
    pub target: usize,
    /// Items kept from an earlier session the same day, published or pending
    pub carried_over: usize,
    pub accepted: usize,
    pub reserve_filled: usize,
    pub rounds: usize,
    pub failed_rounds: usize,
    pub rejected: usize,
}

impl GenerationReport {
    pub fn total(&self) -> usize {
        self.carried_over + self.accepted + self.reserve_filled
    }

    pub fn shortfall(&self) -> usize {
        self.target.saturating_sub(self.total())
    }

    /// Single summary line for operators
    pub fn summary_line(&self, status: &str) -> String {
        format!(
            "{}: accepted={} reserve_filled={} carried_over={} failed_rounds={} rounds={} rejected={} target={}",
            status,
            self.accepted,
            self.reserve_filled,
            self.carried_over,
            self.failed_rounds,
            self.rounds,
            self.rejected,
            self.target
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn sample_batch() -> Batch {
        let now = OffsetDateTime::UNIX_EPOCH;
        let mut batch = Batch::new(now.date(), 2, now);
        batch.push(BatchItem::reserve("first"));
        batch.push(BatchItem::reserve("second"));
        batch
    }

    #[test]
    fn test_push_stops_at_target() {
        let mut batch = sample_batch();
        assert!(!batch.push(BatchItem::reserve("third")));
        assert_eq!(batch.items.len(), 2);
    }

    #[test]
    fn test_consume_front_counts_published() {
        let mut batch = sample_batch();
        let item = batch.consume_front().unwrap();
        assert_eq!(item.text, "first");
        assert_eq!(batch.published, 1);
        assert!(batch.satisfies(batch.date, 2));
    }

    #[test]
    fn test_published_items_count_toward_target() {
        let mut batch = sample_batch();
        batch.consume_front();
        assert_eq!(batch.remaining(), 0);
        assert!(!batch.push(BatchItem::reserve("third")));

        batch.target_count = 4;
        assert_eq!(batch.remaining(), 2);
        assert!(batch.push(BatchItem::reserve("third")));
    }

    #[test]
    fn test_satisfies_requires_same_day() {
        let batch = sample_batch();
        let tomorrow = batch.date.next_day().unwrap();
        assert!(!batch.satisfies(tomorrow, 2));
        assert!(!batch.satisfies(batch.date, 3));
    }

    #[test]
    fn test_batch_json_uses_iso_date() {
        let at = datetime!(2026-10-19 08:00 UTC);
        let batch = Batch::new(at.date(), 1, at);
        let json = serde_json::to_value(&batch).unwrap();
        assert_eq!(json["date"], "2026-10-19");
        assert_eq!(json["version"], 1);
    }
}
