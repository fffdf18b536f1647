//! Generation session - orchestrates chain, extractor, filter and reserve fill

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::{
    format::{BlockExtractor, BlockFormat, FormatError},
    model::{Batch, BatchItem, GenerationReport, SessionOutcome},
    policy::{AcceptanceFilter, Rejection},
    ports::{BatchStore, BatchStoreError, Clock, HistoryError, HistoryLog},
    prompt::PromptTemplate,
    usecases::chain::ProviderChain,
};

/// Configuration for one generation profile
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Number of items the batch should hold
    pub target_count: usize,
    /// Upper bound on provider rounds before falling back to the reserve
    pub max_rounds: usize,
    /// Pause between rounds to respect upstream rate limits
    pub round_delay: Duration,
    /// Prompt template rendered for every round
    pub prompt: PromptTemplate,
    /// Delimiter grammar shared by prompt and extractor
    pub format: BlockFormat,
    /// Pre-written fallback items, in fill order
    pub reserve: Vec<String>,
    /// Ignore an existing batch for today
    pub force: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            target_count: 5,
            max_rounds: 5,
            round_delay: Duration::from_secs(2),
            prompt: PromptTemplate::default(),
            format: BlockFormat::default(),
            reserve: vec![],
            force: false,
        }
    }
}

/// Errors that end a generation session
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Invalid block format: {0}")]
    Format(#[from] FormatError),
    #[error("History error: {0}")]
    History(#[from] HistoryError),
    #[error("Failed to read existing batch: {0}")]
    BatchRead(BatchStoreError),
    #[error("Failed to persist batch: {source}")]
    Persistence {
        source: BatchStoreError,
        report: GenerationReport,
    },
}

impl SessionError {
    /// Counts gathered before the failure, if generation got that far
    pub fn report(&self) -> Option<&GenerationReport> {
        match self {
            SessionError::Persistence { report, .. } => Some(report),
            _ => None,
        }
    }
}

/// Result of a completed session
#[derive(Debug, Clone)]
pub struct SessionResult {
    pub outcome: SessionOutcome,
    pub report: GenerationReport,
    pub batch: Batch,
}

/// One generation session, constructed per invocation
pub struct GenerationSession<B, H, Cl>
where
    B: BatchStore + ?Sized,
    H: HistoryLog + ?Sized,
    Cl: Clock + ?Sized,
{
    chain: ProviderChain,
    filter: AcceptanceFilter,
    batch_store: Arc<B>,
    history: Arc<H>,
    clock: Arc<Cl>,
    config: GenerationConfig,
}

impl<B, H, Cl> GenerationSession<B, H, Cl>
where
    B: BatchStore + ?Sized,
    H: HistoryLog + ?Sized,
    Cl: Clock + ?Sized,
{
    pub fn new(
        chain: ProviderChain,
        filter: AcceptanceFilter,
        batch_store: Arc<B>,
        history: Arc<H>,
        clock: Arc<Cl>,
        config: GenerationConfig,
    ) -> Self {
        Self {
            chain,
            filter,
            batch_store,
            history,
            clock,
            config,
        }
    }

    /// Run the session to completion
    pub async fn run(&self) -> Result<SessionResult, SessionError> {
        let now = self.clock.now();
        let today = now.date();
        let target = self.config.target_count;

        if target == 0 {
            return Err(SessionError::Configuration(
                "target_count must be at least 1".to_string(),
            ));
        }

        let existing = self
            .batch_store
            .load()
            .await
            .map_err(SessionError::BatchRead)?;

        let mut carried = None;
        if let Some(batch) = existing {
            if !self.config.force && batch.satisfies(today, target) {
                tracing::info!(
                    date = %today,
                    pending = batch.items.len(),
                    published = batch.published,
                    "Batch for today already exists, skipping generation"
                );
                let report = GenerationReport {
                    target,
                    carried_over: batch.published,
                    accepted: batch.generated_count(),
                    reserve_filled: batch.reserve_count(),
                    ..Default::default()
                };
                return Ok(SessionResult {
                    outcome: SessionOutcome::AlreadySatisfied,
                    report,
                    batch,
                });
            }

            if batch.date == today && !self.config.force {
                tracing::info!(
                    pending = batch.items.len(),
                    published = batch.published,
                    target = target,
                    "Topping up today's short batch"
                );
                carried = Some(batch);
            } else if !batch.is_empty() {
                tracing::warn!(
                    batch_date = %batch.date,
                    discarded = batch.items.len(),
                    "Replacing batch with unpublished items"
                );
            }
        }

        if !self.chain.has_available() {
            return Err(SessionError::Configuration(
                "No text provider has its credential configured".to_string(),
            ));
        }

        let extractor = self.config.format.compile()?;
        let mut seen = self.history.load_seen().await?;

        let mut batch = match carried {
            Some(mut batch) => {
                batch.target_count = target;
                batch.generated_at = now;
                batch
            }
            None => Batch::new(today, target, now),
        };
        seen.extend(batch.items.iter().map(|item| item.text.clone()));

        let mut report = GenerationReport {
            target,
            carried_over: batch.items.len() + batch.published,
            ..Default::default()
        };

        tracing::info!(
            date = %today,
            target = target,
            remaining = batch.remaining(),
            history_size = seen.len(),
            providers = ?self.chain.available(),
            "Starting generation session"
        );

        let outcome = self
            .generate_rounds(&extractor, &mut batch, &mut seen, &mut report)
            .await;

        let outcome = match outcome {
            SessionOutcome::TargetMet => outcome,
            _ => {
                tracing::warn!(
                    generated = report.accepted,
                    target = target,
                    "Shortfall after generation rounds, filling from reserve"
                );
                self.fill_from_reserve(&mut batch, &mut seen, &mut report);
                SessionOutcome::FilledFromReserve
            }
        };

        if let Err(source) = self.batch_store.save(&batch).await {
            tracing::error!(error = %source, "{}", report.summary_line("Generation failed"));
            return Err(SessionError::Persistence { source, report });
        }

        tracing::info!("{}", report.summary_line("Generation complete"));

        Ok(SessionResult {
            outcome,
            report,
            batch,
        })
    }

    async fn generate_rounds(
        &self,
        extractor: &BlockExtractor,
        batch: &mut Batch,
        seen: &mut HashSet<String>,
        report: &mut GenerationReport,
    ) -> SessionOutcome {
        let acceptance = self.filter.config();

        for round in 1..=self.config.max_rounds {
            if batch.is_full() {
                break;
            }

            if round > 1 && !self.config.round_delay.is_zero() {
                tokio::time::sleep(self.config.round_delay).await;
            }

            report.rounds += 1;
            let remaining = batch.remaining();
            let prompt = self.config.prompt.render(
                remaining,
                acceptance.min_chars,
                acceptance.max_chars,
                &self.config.format,
            );

            let response = match self.chain.generate(&prompt).await {
                Ok(response) => response,
                Err(failure) => {
                    tracing::warn!(round = round, error = %failure, "Generation round failed");
                    report.failed_rounds += 1;
                    continue;
                }
            };

            let candidates = extractor.extract(&response.text);
            if candidates.is_empty() {
                tracing::warn!(
                    round = round,
                    provider = %response.provider,
                    response_preview = %preview(&response.text),
                    "No blocks found in provider output, discarding round"
                );
                report.failed_rounds += 1;
                continue;
            }

            let found = candidates.len();
            let mut accepted_this_round = 0;

            for candidate in candidates {
                if batch.is_full() {
                    break;
                }

                let index = candidate.index;
                match self.filter.accept(candidate, seen) {
                    Ok(accepted) => {
                        batch.push(BatchItem::generated(
                            accepted.candidate,
                            &response.provider,
                            accepted.positivity,
                        ));
                        report.accepted += 1;
                        accepted_this_round += 1;
                    }
                    Err(reason) => {
                        tracing::debug!(round = round, index = index, reason = %reason, "Rejected candidate");
                        report.rejected += 1;
                    }
                }
            }

            tracing::info!(
                round = round,
                provider = %response.provider,
                candidates = found,
                accepted = accepted_this_round,
                total = batch.items.len(),
                "Round complete"
            );
        }

        if batch.is_full() {
            SessionOutcome::TargetMet
        } else {
            SessionOutcome::FilledFromReserve
        }
    }

    /// Cycle the reserve list in order, skipping anything already seen
    fn fill_from_reserve(
        &self,
        batch: &mut Batch,
        seen: &mut HashSet<String>,
        report: &mut GenerationReport,
    ) {
        for entry in &self.config.reserve {
            if batch.is_full() {
                break;
            }
            let text = entry.trim();
            if text.is_empty() {
                continue;
            }
            match self.filter.check_reserve(text, seen) {
                Ok(()) => {}
                Err(Rejection::Duplicate) => continue,
                Err(reason) => {
                    tracing::warn!(reason = %reason, "Skipping reserve entry outside the length window");
                    continue;
                }
            }
            seen.insert(text.to_string());
            batch.push(BatchItem::reserve(text));
            report.reserve_filled += 1;
        }

        let shortfall = report.shortfall();
        if shortfall > 0 {
            tracing::warn!(
                missing = shortfall,
                reserve_size = self.config.reserve.len(),
                "Reserve list exhausted, batch is short of target"
            );
        }
    }
}

fn preview(text: &str) -> String {
    let mut preview: String = text.chars().take(120).collect();
    if text.chars().count() > 120 {
        preview.push_str("...");
    }
    preview
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ItemOrigin, Prompt, PublishedRecord};
    use crate::policy::AcceptanceConfig;
    use crate::ports::{ProviderError, SentimentScorer, TextProvider};
    use crate::usecases::chain::ChainConfig;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use time::OffsetDateTime;
    use time::macros::datetime;

    // Fake implementations for testing
    struct ScriptedProvider {
        name: &'static str,
        available: bool,
        responses: Mutex<Vec<String>>,
        calls: AtomicUsize,
    }

    impl ScriptedProvider {
        fn new(name: &'static str, responses: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                name,
                available: true,
                responses: Mutex::new(responses.iter().map(|r| r.to_string()).collect()),
                calls: AtomicUsize::new(0),
            })
        }

        fn unavailable(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                available: false,
                responses: Mutex::new(vec![]),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TextProvider for ScriptedProvider {
        fn name(&self) -> &str {
            self.name
        }

        fn is_available(&self) -> bool {
            self.available
        }

        async fn generate(&self, _prompt: &Prompt) -> Result<String, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                return Err(ProviderError::Api("quota exhausted".to_string()));
            }
            Ok(responses.remove(0))
        }
    }

    struct TableScorer(HashMap<String, f64>);

    impl SentimentScorer for TableScorer {
        fn score(&self, text: &str) -> f64 {
            self.0.get(text).copied().unwrap_or(0.5)
        }
    }

    #[derive(Default)]
    struct FakeBatchStore {
        batch: Mutex<Option<Batch>>,
        saves: AtomicUsize,
        fail_save: bool,
    }

    #[async_trait]
    impl BatchStore for FakeBatchStore {
        async fn load(&self) -> Result<Option<Batch>, BatchStoreError> {
            Ok(self.batch.lock().unwrap().clone())
        }

        async fn save(&self, batch: &Batch) -> Result<(), BatchStoreError> {
            if self.fail_save {
                return Err(BatchStoreError::Io(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "read-only",
                )));
            }
            self.saves.fetch_add(1, Ordering::SeqCst);
            *self.batch.lock().unwrap() = Some(batch.clone());
            Ok(())
        }

        async fn remove(&self) -> Result<(), BatchStoreError> {
            *self.batch.lock().unwrap() = None;
            Ok(())
        }
    }

    struct FakeHistory {
        seen: HashSet<String>,
    }

    #[async_trait]
    impl HistoryLog for FakeHistory {
        async fn load_seen(&self) -> Result<HashSet<String>, HistoryError> {
            Ok(self.seen.clone())
        }

        async fn record_published(&self, _record: &PublishedRecord) -> Result<(), HistoryError> {
            Ok(())
        }
    }

    struct FakeClock {
        time: OffsetDateTime,
    }

    impl Clock for FakeClock {
        fn now(&self) -> OffsetDateTime {
            self.time
        }
    }

    const NOW: OffsetDateTime = datetime!(2026-10-19 09:00 UTC);

    fn reserve() -> Vec<String> {
        (1..=6).map(|i| format!("Reserve post number {}", i)).collect()
    }

    fn session(
        providers: Vec<Arc<dyn TextProvider>>,
        store: Arc<FakeBatchStore>,
        history: &[&str],
        config: GenerationConfig,
    ) -> GenerationSession<FakeBatchStore, FakeHistory, FakeClock> {
        let scores = HashMap::from([
            ("Hello world".to_string(), 0.4),
            ("Good morning".to_string(), 0.6),
            ("Everything is terrible".to_string(), -0.7),
        ]);
        let chain = ProviderChain::new(
            providers,
            ChainConfig {
                timeout: Duration::from_secs(5),
                retries: 0,
                backoff: Duration::ZERO,
            },
        );
        let filter = AcceptanceFilter::new(
            AcceptanceConfig {
                min_chars: 1,
                max_chars: 280,
                min_positivity: Some(0.1),
            },
            Arc::new(TableScorer(scores)),
        );
        GenerationSession::new(
            chain,
            filter,
            store,
            Arc::new(FakeHistory {
                seen: history.iter().map(|s| s.to_string()).collect(),
            }),
            Arc::new(FakeClock { time: NOW }),
            config,
        )
    }

    fn config() -> GenerationConfig {
        GenerationConfig {
            target_count: 5,
            max_rounds: 3,
            round_delay: Duration::ZERO,
            reserve: reserve(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_duplicate_from_history_is_rejected_and_reserve_fills() {
        let a = ScriptedProvider::unavailable("a");
        let b = ScriptedProvider::new("b", &["Tweet 1:\nHello world\n\nTweet 2:\nGood morning\n"]);
        let store = Arc::new(FakeBatchStore::default());

        let result = session(
            vec![a.clone(), b.clone()],
            store.clone(),
            &["Hello world"],
            config(),
        )
        .run()
        .await
        .unwrap();

        assert_eq!(a.calls(), 0);
        assert_eq!(result.outcome, SessionOutcome::FilledFromReserve);
        assert_eq!(result.batch.items.len(), 5);
        assert_eq!(result.batch.items[0].text, "Good morning");
        assert_eq!(
            result.batch.items[0].origin,
            ItemOrigin::Generated {
                provider: "b".to_string()
            }
        );
        assert_eq!(result.report.accepted, 1);
        assert_eq!(result.report.reserve_filled, 4);
        assert_eq!(result.report.rejected, 1);
        // b runs dry after its first response
        assert_eq!(result.report.failed_rounds, 2);
        assert_eq!(store.saves.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_target_met_without_reserve() {
        let b = ScriptedProvider::new(
            "b",
            &[
                "Tweet 1: One\nTweet 2: Two\nTweet 3: Three",
                "Tweet 1: Four\nTweet 2: Five\nTweet 3: Six",
            ],
        );
        let store = Arc::new(FakeBatchStore::default());

        let result = session(vec![b.clone()], store, &[], config())
            .run()
            .await
            .unwrap();

        assert_eq!(result.outcome, SessionOutcome::TargetMet);
        let texts: Vec<_> = result.batch.items.iter().map(|i| i.text.as_str()).collect();
        assert_eq!(texts, vec!["One", "Two", "Three", "Four", "Five"]);
        assert_eq!(b.calls(), 2);
        assert_eq!(result.report.reserve_filled, 0);
    }

    #[tokio::test]
    async fn test_unparseable_rounds_are_retried() {
        let b = ScriptedProvider::new(
            "b",
            &[
                "Sorry, here are some thoughts without any numbering.",
                "Tweet 1: Good morning\nTweet 2: Everything is terrible",
            ],
        );
        let store = Arc::new(FakeBatchStore::default());

        let result = session(vec![b], store, &[], config()).run().await.unwrap();

        assert_eq!(result.report.failed_rounds, 2);
        assert_eq!(result.report.accepted, 1);
        assert_eq!(result.report.rejected, 1);
        assert_eq!(result.batch.items.len(), 5);
    }

    #[tokio::test]
    async fn test_existing_batch_for_today_skips_generation() {
        let b = ScriptedProvider::new("b", &["Tweet 1: Fresh"]);
        let mut existing = Batch::new(NOW.date(), 2, NOW);
        existing.push(BatchItem::reserve("already here"));
        existing.push(BatchItem::reserve("and here"));
        let store = Arc::new(FakeBatchStore {
            batch: Mutex::new(Some(existing.clone())),
            ..Default::default()
        });

        let result = session(
            vec![b.clone()],
            store.clone(),
            &[],
            GenerationConfig {
                target_count: 2,
                ..config()
            },
        )
        .run()
        .await
        .unwrap();

        assert_eq!(result.outcome, SessionOutcome::AlreadySatisfied);
        assert_eq!(b.calls(), 0);
        assert_eq!(store.saves.load(Ordering::SeqCst), 0);
        assert_eq!(store.batch.lock().unwrap().as_ref(), Some(&existing));
    }

    #[tokio::test]
    async fn test_stale_batch_is_replaced() {
        let b = ScriptedProvider::new("b", &["Tweet 1: Good morning"]);
        let yesterday = NOW - time::Duration::days(1);
        let mut existing = Batch::new(yesterday.date(), 1, yesterday);
        existing.push(BatchItem::reserve("left over"));
        let store = Arc::new(FakeBatchStore {
            batch: Mutex::new(Some(existing)),
            ..Default::default()
        });

        let result = session(
            vec![b],
            store,
            &[],
            GenerationConfig {
                target_count: 1,
                ..config()
            },
        )
        .run()
        .await
        .unwrap();

        assert_eq!(result.outcome, SessionOutcome::TargetMet);
        assert_eq!(result.batch.date, NOW.date());
        assert_eq!(result.batch.items[0].text, "Good morning");
    }

    #[tokio::test]
    async fn test_no_available_provider_is_configuration_error() {
        let a = ScriptedProvider::unavailable("a");
        let store = Arc::new(FakeBatchStore::default());

        let result = session(vec![a], store.clone(), &[], config()).run().await;

        assert!(matches!(result, Err(SessionError::Configuration(_))));
        assert!(store.batch.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reserve_skips_history_and_caps_when_exhausted() {
        let store = Arc::new(FakeBatchStore::default());
        let b = ScriptedProvider::new("b", &[]);

        let result = session(
            vec![b],
            store,
            &["Reserve post number 1"],
            GenerationConfig {
                target_count: 8,
                ..config()
            },
        )
        .run()
        .await
        .unwrap();

        assert_eq!(result.report.reserve_filled, 5);
        assert_eq!(result.report.shortfall(), 3);
        let unique: HashSet<_> = result.batch.items.iter().map(|i| &i.text).collect();
        assert_eq!(unique.len(), result.batch.items.len());
        assert!(!unique.contains(&"Reserve post number 1".to_string()));
    }

    #[tokio::test]
    async fn test_persistence_failure_is_surfaced_with_report() {
        let b = ScriptedProvider::new("b", &["Tweet 1: Good morning"]);
        let store = Arc::new(FakeBatchStore {
            fail_save: true,
            ..Default::default()
        });

        let error = session(
            vec![b],
            store,
            &[],
            GenerationConfig {
                target_count: 1,
                ..config()
            },
        )
        .run()
        .await
        .unwrap_err();

        assert!(matches!(error, SessionError::Persistence { .. }));
        assert_eq!(error.report().map(|r| r.accepted), Some(1));
    }

    #[tokio::test]
    async fn test_force_regenerates_existing_batch() {
        let b = ScriptedProvider::new("b", &["Tweet 1: Good morning"]);
        let mut existing = Batch::new(NOW.date(), 1, NOW);
        existing.push(BatchItem::reserve("already here"));
        let store = Arc::new(FakeBatchStore {
            batch: Mutex::new(Some(existing)),
            ..Default::default()
        });

        let result = session(
            vec![b.clone()],
            store,
            &[],
            GenerationConfig {
                target_count: 1,
                force: true,
                ..config()
            },
        )
        .run()
        .await
        .unwrap();

        assert_eq!(b.calls(), 1);
        assert_eq!(result.batch.items[0].text, "Good morning");
    }

    #[tokio::test]
    async fn test_reserve_entries_outside_length_window_are_skipped() {
        let b = ScriptedProvider::new("b", &[]);
        let store = Arc::new(FakeBatchStore::default());
        let oversized = "x".repeat(400);

        let result = session(
            vec![b],
            store,
            &[],
            GenerationConfig {
                target_count: 1,
                reserve: vec![oversized.clone(), "Reserve post number 2".to_string()],
                ..config()
            },
        )
        .run()
        .await
        .unwrap();

        assert_eq!(result.outcome, SessionOutcome::FilledFromReserve);
        let texts: Vec<_> = result.batch.items.iter().map(|i| i.text.as_str()).collect();
        assert_eq!(texts, vec!["Reserve post number 2"]);
        assert_eq!(result.report.reserve_filled, 1);
    }

    #[tokio::test]
    async fn test_short_batch_for_today_is_topped_up() {
        let b = ScriptedProvider::new(
            "b",
            &["Tweet 1: kept one\nTweet 2: Good morning\nTweet 3: Hello world"],
        );
        let mut existing = Batch::new(NOW.date(), 5, NOW - time::Duration::hours(3));
        existing.push(BatchItem::reserve("kept one"));
        existing.push(BatchItem::reserve("kept two"));
        existing.published = 2;
        let store = Arc::new(FakeBatchStore {
            batch: Mutex::new(Some(existing)),
            ..Default::default()
        });

        let result = session(vec![b.clone()], store.clone(), &[], config())
            .run()
            .await
            .unwrap();

        assert_eq!(b.calls(), 1);
        assert_eq!(result.outcome, SessionOutcome::TargetMet);
        let texts: Vec<_> = result.batch.items.iter().map(|i| i.text.as_str()).collect();
        assert_eq!(texts, vec!["kept one", "kept two", "Good morning"]);
        assert_eq!(result.batch.published, 2);
        assert_eq!(result.batch.generated_at, NOW);
        assert_eq!(result.report.carried_over, 4);
        assert_eq!(result.report.accepted, 1);
        assert_eq!(result.report.rejected, 1);
        assert_eq!(result.report.shortfall(), 0);

        let saved = store.batch.lock().unwrap().clone().unwrap();
        assert_eq!(saved.published, 2);
        assert_eq!(saved.items.len(), 3);
    }
}
