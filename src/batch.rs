//! Batch Coordinator
//!
//! `classify_batch(texts)` answers a list of texts with one classification
//! per input, in input order.
//!
//! Positions are resolved in three passes:
//! - empty input, fresh cache hits and rate-limited keys are filled at once
//! - the remaining misses are deduplicated by normalized key and sent to the
//!   remote providers in sub-batches of at most `batch.max_size`
//! - any sub-batch whose call fails entirely, and any item answered below
//!   the confidence floor, falls back item by item through the single-text
//!   chain; with no batch-capable provider every item goes this way
//!
//! Every distinct miss is claimed in the in-flight registry before the
//! provider call, so a single-text `classify` of the same key arriving
//! meanwhile joins the batch's answer instead of calling a provider again.
//! A key that already has a computation in flight joins it instead of being
//! batched.

use crate::enhanced::InFlightClaim;
use crate::metrics::{
    self, OUTCOME_CACHE_HIT, OUTCOME_COMPUTED, OUTCOME_DEDUPLICATED, OUTCOME_EMPTY,
};
use crate::normalize::NormalizedKey;
use crate::orchestrator::EmotionOrchestrator;
use crate::{Classification, ClassifierError};
use futures::future::join_all;
use std::collections::HashMap;
use tracing::{debug, warn};

/// A distinct key this batch computes itself, with every input position
/// that maps to it.
struct Claimed {
    claim: InFlightClaim,
    text: String,
    positions: Vec<usize>,
}

/// A distinct key some other caller is already computing.
struct Joined {
    key: NormalizedKey,
    text: String,
    positions: Vec<usize>,
}

#[derive(Clone, Copy)]
enum Seen {
    Claimed(usize),
    Joined(usize),
}

impl EmotionOrchestrator {
    /// Classify every text in `texts`, preserving length and order.
    ///
    /// Never fails: a failed batch call degrades to per-item fallback, and
    /// per-item fallback always produces a classification.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use tokio_emotion_orchestrator::{ClassifierConfig, EmotionOrchestrator};
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), tokio_emotion_orchestrator::ClassifierError> {
    /// let orchestrator = EmotionOrchestrator::from_config(&ClassifierConfig::default())?;
    /// let results = orchestrator
    ///     .classify_batch(&["I am thrilled", "", "this is terrifying"])
    ///     .await;
    /// assert_eq!(results.len(), 3);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn classify_batch<S: AsRef<str>>(&self, texts: &[S]) -> Vec<Classification> {
        let mut results: Vec<Option<Classification>> = vec![None; texts.len()];
        let mut claimed: Vec<Claimed> = Vec::new();
        let mut joined: Vec<Joined> = Vec::new();
        let mut seen: HashMap<NormalizedKey, Seen> = HashMap::new();

        for (position, text) in texts.iter().enumerate() {
            let text = text.as_ref();
            let key = self.key_for(text);

            if key.is_empty() {
                metrics::inc_request(OUTCOME_EMPTY);
                results[position] = Some(Classification::empty_input());
                continue;
            }
            if let Some(hit) = self.inner.cache.get(&key) {
                metrics::inc_request(OUTCOME_CACHE_HIT);
                results[position] = Some(hit);
                continue;
            }
            // Repeats inside one batch share the first occurrence's answer
            // and quota.
            if let Some(&slot) = seen.get(&key) {
                metrics::inc_request(OUTCOME_DEDUPLICATED);
                match slot {
                    Seen::Claimed(i) => claimed[i].positions.push(position),
                    Seen::Joined(i) => joined[i].positions.push(position),
                }
                continue;
            }
            if !self.inner.limiter.allow(&key) {
                results[position] = Some(self.rate_limited(&key));
                continue;
            }

            match self.inner.inflight.claim(&key) {
                Some(claim) => {
                    seen.insert(key, Seen::Claimed(claimed.len()));
                    claimed.push(Claimed {
                        claim,
                        text: text.to_string(),
                        positions: vec![position],
                    });
                }
                None => {
                    seen.insert(key.clone(), Seen::Joined(joined.len()));
                    joined.push(Joined {
                        key,
                        text: text.to_string(),
                        positions: vec![position],
                    });
                }
            }
        }

        debug!(
            total = texts.len(),
            misses = claimed.len(),
            joined = joined.len(),
            "batch split"
        );

        let max_size = self.inner.config.batch.max_size.max(1);
        let chunk_work = claimed.chunks(max_size).map(|chunk| async move {
            self.resolve_chunk(chunk)
                .await
                .into_iter()
                .map(|(item, c)| (item.positions.as_slice(), c))
                .collect::<Vec<_>>()
        });
        let join_work = joined.iter().map(|item| async move {
            vec![(
                item.positions.as_slice(),
                self.classify_admitted(&item.key, &item.text).await,
            )]
        });

        let (chunked, joins) = futures::join!(join_all(chunk_work), join_all(join_work));
        for (positions, classification) in chunked.into_iter().chain(joins).flatten() {
            for &position in positions {
                results[position] = Some(classification.clone());
            }
        }

        results
            .into_iter()
            .map(|slot| slot.unwrap_or_else(Classification::degraded))
            .collect()
    }

    /// One provider batch call for `chunk`, with per-item fallback. Every
    /// claim in `chunk` is completed before this returns.
    async fn resolve_chunk<'c>(
        &self,
        chunk: &'c [Claimed],
    ) -> Vec<(&'c Claimed, Classification)> {
        let min_confidence = self.inner.config.providers.min_confidence;
        let mut resolved = Vec::with_capacity(chunk.len());
        let mut fallback: Vec<&Claimed> = Vec::new();

        if self.inner.has_batch_provider() {
            let texts: Vec<String> = chunk.iter().map(|item| item.text.clone()).collect();
            match self.inner.run_batch_chain(&texts).await {
                Ok(classifications) => {
                    for (item, classification) in chunk.iter().zip(classifications) {
                        if classification.confidence() < min_confidence {
                            fallback.push(item);
                            continue;
                        }
                        metrics::inc_request(OUTCOME_COMPUTED);
                        self.inner.store_and_publish(item.claim.key(), &classification);
                        item.claim.complete(Ok(classification.clone()));
                        resolved.push((item, classification));
                    }
                }
                Err(ClassifierError::AllProvidersExhausted) => {
                    debug!(
                        count = chunk.len(),
                        "no batch provider admitted; classifying items individually"
                    );
                    fallback.extend(chunk.iter());
                }
                Err(e) => {
                    warn!(
                        count = chunk.len(),
                        error = %e,
                        "batch failed; classifying items individually"
                    );
                    fallback.extend(chunk.iter());
                }
            }
        } else {
            fallback.extend(chunk.iter());
        }

        let singles = join_all(
            fallback
                .into_iter()
                .map(|item| async move { (item, self.compute_claimed(item).await) }),
        )
        .await;
        resolved.extend(singles);
        resolved
    }

    /// Run the single-text chain for a claimed key and hand the result to
    /// anyone who joined the claim.
    async fn compute_claimed(&self, item: &Claimed) -> Classification {
        let key = item.claim.key();
        let result = self.inner.compute(key, &item.text).await;
        item.claim.complete(result.clone());
        metrics::inc_request(OUTCOME_COMPUTED);
        self.settle(key, &item.text, result)
    }
}
