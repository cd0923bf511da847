//! Query orchestration.
//!
//! `QueryRelay` runs one statement lifecycle per call: resolve the input,
//! submit (unless resuming), poll to a terminal state, materialize the
//! results and assemble the envelope.

use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::backoff::RetryPolicy;
use crate::config::{validate_page_size, RelayConfig, MAX_PAGE_SIZE};
use crate::decode::{CoercionOptions, DecodeOptions, Item, ResultDecoder};
use crate::engine::{
    ExecutionHandle, ExecutionRequest, GetQueryResultsOutput, QueryEngine, QueryExecutionContext,
    ResultConfiguration, StatementKind,
};
use crate::envelope::{ExecutionStatistics, ResultEnvelope};
use crate::error::{RelayError, Result};
use crate::execution::{call_with_retry, CompletedExecution, Poller, Submitter};
use crate::input::{QueryInput, ResolvedQuery, Target};
use crate::store::{ObjectLocation, ObjectStore};

/// How far to follow pagination tokens in page mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PageWalk {
    Single,
    All,
}

/// Submits queries and turns their results into records.
///
/// Engine and store clients are shared; every call owns its own handle and
/// retry state, so one relay can serve concurrent callers.
pub struct QueryRelay {
    engine: Arc<dyn QueryEngine>,
    store: Arc<dyn ObjectStore>,
    config: RelayConfig,
    poll_policy: RetryPolicy,
    transient_policy: RetryPolicy,
}

impl QueryRelay {
    /// Creates a relay. The configuration is validated here, so a bad
    /// setting fails before any remote call.
    pub fn new(
        engine: Arc<dyn QueryEngine>,
        store: Arc<dyn ObjectStore>,
        config: RelayConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            poll_policy: config.poll_policy(),
            transient_policy: config.transient_policy(),
            engine,
            store,
            config,
        })
    }

    /// Replaces the poll pacing derived from the configuration.
    pub fn with_poll_policy(mut self, policy: RetryPolicy) -> Self {
        self.poll_policy = policy;
        self
    }

    /// Replaces the transient-error pacing derived from the configuration.
    pub fn with_transient_policy(mut self, policy: RetryPolicy) -> Self {
        self.transient_policy = policy;
        self
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Runs one query lifecycle to completion.
    pub async fn query(&self, input: impl Into<QueryInput>) -> Result<ResultEnvelope> {
        self.query_with_cancel(input, &CancellationToken::new()).await
    }

    /// Like [`query`](Self::query), abandoning every wait once `cancel` fires.
    pub async fn query_with_cancel(
        &self,
        input: impl Into<QueryInput>,
        cancel: &CancellationToken,
    ) -> Result<ResultEnvelope> {
        self.run(input.into(), cancel, PageWalk::Single)
            .await
            .map_err(RelayError::into_surfaced)
    }

    /// Runs a query and follows every pagination token, returning all items
    /// in one envelope.
    pub async fn collect_all_pages(
        &self,
        input: impl Into<QueryInput>,
        cancel: &CancellationToken,
    ) -> Result<ResultEnvelope> {
        self.run(input.into(), cancel, PageWalk::All)
            .await
            .map_err(RelayError::into_surfaced)
    }

    async fn run(
        &self,
        input: QueryInput,
        cancel: &CancellationToken,
        walk: PageWalk,
    ) -> Result<ResultEnvelope> {
        let resolved = input.resolve()?;
        if let Some(page_size) = resolved.page_size {
            validate_page_size(page_size)?;
        }

        let handle = match &resolved.target {
            Target::Submit(sql) => {
                let request = self.build_request(sql, &resolved);
                Submitter::new(self.engine.as_ref(), &self.transient_policy)
                    .submit(&request, cancel)
                    .await?
            }
            Target::Resume(handle) => {
                info!("Resuming execution {}", handle);
                handle.clone()
            }
        };

        if !self.config.wait_for_results {
            return Ok(ResultEnvelope::pending(handle.as_str()));
        }

        let completed = Poller::new(
            self.engine.as_ref(),
            &self.poll_policy,
            &self.transient_policy,
        )
        .with_manifest(self.config.format_json && !self.config.skip_results)
        .wait(&handle, cancel)
        .await?;

        let mut envelope = ResultEnvelope::pending(handle.as_str());
        if !self.config.skip_results {
            let page_size = resolved.page_size.or(self.config.page_size);
            let (items, next_token) = self
                .materialize(&completed, page_size, resolved.next_token, walk, cancel)
                .await?;
            envelope.items = Some(items);
            envelope.next_token = next_token;
        }

        if self.config.get_stats {
            envelope.statistics = Some(ExecutionStatistics::compute(
                &completed.execution.statistics,
                envelope.items().len(),
                completed.execution.output_location(),
            ));
        }

        info!(
            "Execution {} returned {} items",
            handle,
            envelope.items().len()
        );
        Ok(envelope)
    }

    fn build_request(&self, sql: &str, resolved: &ResolvedQuery) -> ExecutionRequest {
        let config = &self.config;
        ExecutionRequest {
            query_string: sql.to_string(),
            query_execution_context: QueryExecutionContext {
                database: Some(resolved.db.clone().unwrap_or_else(|| config.database.clone())),
                catalog: resolved.catalog.clone().or_else(|| config.catalog.clone()),
            },
            result_configuration: ResultConfiguration {
                output_location: config.output_location.clone(),
                encryption_configuration: config.encryption.as_ref().map(Into::into),
            },
            work_group: Some(
                resolved
                    .workgroup
                    .clone()
                    .unwrap_or_else(|| config.workgroup.clone()),
            ),
            execution_parameters: resolved.parameters.clone(),
        }
    }

    fn decoder(&self) -> ResultDecoder {
        ResultDecoder::new(
            self.config.format_json,
            DecodeOptions {
                ignore_empty: self.config.ignore_empty,
                coercion: CoercionOptions {
                    utc_dates: self.config.utc_dates,
                },
            },
        )
    }

    async fn materialize(
        &self,
        completed: &CompletedExecution,
        page_size: Option<u32>,
        next_token: Option<String>,
        walk: PageWalk,
        cancel: &CancellationToken,
    ) -> Result<(Vec<Item>, Option<String>)> {
        let decoder = self.decoder();
        let kind = completed
            .execution
            .statement_type
            .clone()
            .unwrap_or(StatementKind::Dml);

        match page_size {
            Some(page_size) if decoder.is_structured() && !kind.is_listing() => {
                self.read_pages(&decoder, completed, page_size, next_token, walk, cancel)
                    .await
            }
            _ => {
                let items = self.read_artifact(&decoder, completed, &kind, cancel).await?;
                Ok((items, None))
            }
        }
    }

    async fn read_artifact(
        &self,
        decoder: &ResultDecoder,
        completed: &CompletedExecution,
        kind: &StatementKind,
        cancel: &CancellationToken,
    ) -> Result<Vec<Item>> {
        let location = completed.execution.output_location().ok_or_else(|| {
            RelayError::object_store(format!(
                "Execution {} reported no output location",
                completed.handle
            ))
        })?;

        if !location.ends_with(kind.artifact_suffix()) {
            debug!(
                "Output {} does not carry the {} suffix expected for {:?}; returning no items",
                location,
                kind.artifact_suffix(),
                kind
            );
            return Ok(Vec::new());
        }

        let object = ObjectLocation::parse(location)?;
        debug!("Reading results from {}", object);

        tokio::select! {
            biased;

            _ = cancel.cancelled() => Err(RelayError::Cancelled),
            items = self.fetch_artifact(decoder, &object, kind, completed) => items,
        }
    }

    async fn fetch_artifact(
        &self,
        decoder: &ResultDecoder,
        object: &ObjectLocation,
        kind: &StatementKind,
        completed: &CompletedExecution,
    ) -> Result<Vec<Item>> {
        let stream = self.store.get_object(object).await?;
        decoder
            .decode_artifact(stream, kind, completed.manifest.as_ref())
            .await
    }

    async fn read_pages(
        &self,
        decoder: &ResultDecoder,
        completed: &CompletedExecution,
        page_size: u32,
        mut next_token: Option<String>,
        walk: PageWalk,
        cancel: &CancellationToken,
    ) -> Result<(Vec<Item>, Option<String>)> {
        let manifest = completed.manifest.as_ref().ok_or_else(|| {
            RelayError::decode("Column manifest is required to decode result pages")
        })?;

        let mut items = Vec::new();
        let mut seen_tokens: HashSet<String> = next_token.iter().cloned().collect();
        loop {
            let first_page = next_token.is_none();
            // The first page carries the header row on top of the requested rows.
            let max_results = if first_page {
                (page_size + 1).min(MAX_PAGE_SIZE)
            } else {
                page_size
            };
            let output = self
                .fetch_page(&completed.handle, max_results, next_token.as_deref(), cancel)
                .await?;
            let page = decoder.decode_page(output, manifest, first_page);
            debug!(
                "Fetched page of {} items for {} (more: {})",
                page.items.len(),
                completed.handle,
                page.next_token.is_some()
            );
            items.extend(page.items);

            if let Some(next) = &page.next_token {
                if !seen_tokens.insert(next.clone()) {
                    return Err(RelayError::decode(format!(
                        "Engine returned pagination token {next} twice for execution {}",
                        completed.handle
                    )));
                }
            }
            next_token = page.next_token;

            if walk == PageWalk::Single || next_token.is_none() {
                return Ok((items, next_token));
            }
        }
    }

    async fn fetch_page(
        &self,
        handle: &ExecutionHandle,
        max_results: u32,
        next_token: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<GetQueryResultsOutput> {
        call_with_retry(&self.transient_policy, cancel, "GetQueryResults", || {
            self.engine
                .get_query_results(handle, Some(max_results), next_token)
        })
        .await
    }
}
