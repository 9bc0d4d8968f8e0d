//! Optional AI enrichment.
//!
//! One suggestion call per declared entity, all in flight together (bounded
//! by `max_concurrency`), each under its own timeout. Nothing is merged until
//! every call has settled; a failed or timed-out entity simply stays as it is.

mod merge;
mod service;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::EnrichmentConfig;
use crate::graph::EntityGraph;

pub use merge::merge_annotations;
pub use service::{
    Annotations, EntitySummary, FieldSummary, FieldSuggestion, IndexSuggestion,
    StaticSuggestions, SuggestionError, SuggestionService,
};

/// Non-fatal: the entity proceeds unenriched.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("enrichment of '{entity}' {reason}")]
pub struct EnrichmentFailure {
    pub entity: String,
    pub reason: FailureReason,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FailureReason {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("failed: {0}")]
    Service(#[from] SuggestionError),
}

#[derive(Debug, Clone)]
pub struct EnrichmentOutcome {
    pub graph: EntityGraph,
    pub failures: Vec<EnrichmentFailure>,
    /// Stopped before merging; `graph` is the input graph.
    pub cancelled: bool,
}

impl EnrichmentOutcome {
    fn unchanged(graph: &EntityGraph, cancelled: bool) -> Self {
        EnrichmentOutcome {
            graph: graph.clone(),
            failures: Vec::new(),
            cancelled,
        }
    }

    pub fn warnings(&self) -> Vec<String> {
        self.failures.iter().map(ToString::to_string).collect()
    }
}

pub struct Enricher {
    service: Arc<dyn SuggestionService>,
    config: EnrichmentConfig,
    call_timeout: Duration,
}

impl Enricher {
    pub fn new(service: Arc<dyn SuggestionService>, config: EnrichmentConfig) -> Self {
        let call_timeout = config.timeout();
        Enricher {
            service,
            config,
            call_timeout,
        }
    }

    /// Override the per-call timeout from the config.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub async fn enrich(&self, graph: &EntityGraph) -> EnrichmentOutcome {
        self.enrich_until(graph, std::future::pending::<()>()).await
    }

    /// Like [`Enricher::enrich`], abandoning the run if `cancel` resolves before
    /// all calls have settled.
    pub async fn enrich_until<C>(&self, graph: &EntityGraph, cancel: C) -> EnrichmentOutcome
    where
        C: Future<Output = ()>,
    {
        if !self.config.enabled {
            debug!("enrichment disabled");
            return EnrichmentOutcome::unchanged(graph, false);
        }

        // Cancellation is checked first on every poll
        tokio::select! {
            biased;
            _ = cancel => {
                warn!("enrichment cancelled before merge, keeping validated graph");
                EnrichmentOutcome::unchanged(graph, true)
            }
            settled = self.collect(graph) => self.reduce(graph, settled),
        }
    }

    async fn collect(&self, graph: &EntityGraph) -> Vec<(String, Result<Annotations, FailureReason>)> {
        let summaries: Vec<EntitySummary> = graph
            .entities()
            .filter(|e| !e.is_synthesized_join())
            .map(EntitySummary::of)
            .collect();
        let call_timeout = self.call_timeout;

        stream::iter(summaries.into_iter().map(|summary| {
            let service = Arc::clone(&self.service);
            async move {
                let result = match tokio::time::timeout(call_timeout, service.suggest(&summary)).await {
                    Ok(Ok(annotations)) => Ok(annotations),
                    Ok(Err(e)) => Err(FailureReason::Service(e)),
                    Err(_) => Err(FailureReason::Timeout(call_timeout)),
                };
                (summary.name, result)
            }
        }))
        .buffer_unordered(self.config.max_concurrency.max(1))
        .collect()
        .await
    }

    fn reduce(
        &self,
        graph: &EntityGraph,
        settled: Vec<(String, Result<Annotations, FailureReason>)>,
    ) -> EnrichmentOutcome {
        let mut annotations = HashMap::new();
        let mut failures = Vec::new();

        for (entity, result) in settled {
            match result {
                Ok(found) => {
                    annotations.insert(entity, found);
                }
                Err(reason) => {
                    let failure = EnrichmentFailure { entity, reason };
                    warn!("{failure}");
                    failures.push(failure);
                }
            }
        }
        // Completion order is arbitrary; report in graph order
        failures.sort_by_key(|f| graph.position(&f.entity));

        info!(
            enriched = annotations.len(),
            failed = failures.len(),
            "enrichment settled"
        );

        EnrichmentOutcome {
            graph: merge_annotations(graph, &annotations),
            failures,
            cancelled: false,
        }
    }
}
