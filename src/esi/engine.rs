//! ESI resolution engine.
//!
//! # Responsibilities
//! - Drive scan → fan-out → barrier → substitute rounds over one buffer
//! - Resolve every distinct directive of a round concurrently
//! - Stop at a fixed point, the round cap, or the resolution deadline
//!
//! # Design Decisions
//! - Identical directive literals are fetched once per round
//! - Any failure resolving an occurrence yields [`INVALID_TAG_MARKER`]; the
//!   page is still served
//! - When the deadline passes mid-round, that round's results are discarded
//!   and in-flight side-requests are aborted

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::esi::buffer::DirectiveBuffer;
use crate::esi::directive::{Directive, INVALID_TAG_MARKER};
use crate::esi::processor::{EsiError, ProcessorRegistry};
use crate::http::request::OriginRequest;
use crate::observability::metrics;

/// Why a resolution pass stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionOutcome {
    /// No directives remain.
    Complete,
    /// The round cap was reached with directives still present.
    RoundLimit,
    /// The resolution deadline passed.
    TimedOut,
}

impl ResolutionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionOutcome::Complete => "complete",
            ResolutionOutcome::RoundLimit => "round_limit",
            ResolutionOutcome::TimedOut => "timed_out",
        }
    }
}

/// Result of one resolution pass.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub body: Bytes,
    /// Rounds that fanned out, including a timed-out one.
    pub rounds: usize,
    pub outcome: ResolutionOutcome,
}

/// Resolves `<esi:include>` directives in response bodies.
#[derive(Debug)]
pub struct EsiEngine {
    processors: Arc<ProcessorRegistry>,
    max_rounds: usize,
    resolution_timeout: Duration,
}

impl EsiEngine {
    pub fn new(processors: ProcessorRegistry, max_rounds: usize, resolution_timeout: Duration) -> Self {
        Self {
            processors: Arc::new(processors),
            max_rounds,
            resolution_timeout,
        }
    }

    /// Resolve every directive in `body`, recursively, on behalf of `origin`.
    pub async fn resolve(&self, origin: Arc<OriginRequest>, body: Bytes) -> Resolution {
        let deadline = Instant::now() + self.resolution_timeout;
        let buffer = DirectiveBuffer::new(body);
        let mut rounds = 0;

        let outcome = loop {
            let found = buffer.scan().await;
            if found.is_empty() {
                break ResolutionOutcome::Complete;
            }
            if rounds >= self.max_rounds {
                break ResolutionOutcome::RoundLimit;
            }
            rounds += 1;

            tracing::debug!(
                request_id = %origin.request_id,
                round = rounds,
                directives = found.len(),
                "Resolving ESI round"
            );

            // Pre-filled so a panicked task leaves its occurrence invalid.
            let mut resolved: HashMap<Bytes, Bytes> = found
                .iter()
                .map(|literal| (literal.clone(), Bytes::from_static(INVALID_TAG_MARKER)))
                .collect();

            let mut tasks = JoinSet::new();
            for literal in found {
                let processors = self.processors.clone();
                let origin = origin.clone();
                tasks.spawn(async move {
                    let value = resolve_occurrence(&processors, &origin, &literal).await;
                    (literal, value)
                });
            }

            let barrier = async {
                while let Some(joined) = tasks.join_next().await {
                    match joined {
                        Ok((literal, value)) => {
                            resolved.insert(literal, value);
                        }
                        Err(e) => {
                            tracing::error!(
                                request_id = %origin.request_id,
                                error = %e,
                                "Directive task failed"
                            );
                        }
                    }
                }
            };

            if tokio::time::timeout_at(deadline, barrier).await.is_err() {
                tasks.abort_all();
                break ResolutionOutcome::TimedOut;
            }

            buffer.substitute(&resolved).await;
        };

        if outcome != ResolutionOutcome::Complete {
            tracing::warn!(
                request_id = %origin.request_id,
                rounds,
                outcome = outcome.as_str(),
                "ESI resolution stopped early"
            );
        }
        metrics::record_resolution(outcome.as_str(), rounds);

        Resolution {
            body: buffer.into_bytes(),
            rounds,
            outcome,
        }
    }
}

/// Resolve one directive literal to its replacement bytes.
async fn resolve_occurrence(
    processors: &ProcessorRegistry,
    origin: &OriginRequest,
    literal: &[u8],
) -> Bytes {
    let directive = match Directive::parse(literal) {
        Ok(directive) => directive,
        Err(e) => {
            tracing::debug!(
                request_id = %origin.request_id,
                markup = %String::from_utf8_lossy(literal),
                error = %e,
                "Invalid ESI directive"
            );
            return Bytes::from_static(INVALID_TAG_MARKER);
        }
    };

    let result = match processors.get(directive.processor.as_deref()) {
        Ok(processor) => processor.process(origin, &directive).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(body) => body,
        Err(e @ EsiError::UnknownProcessor(_)) | Err(e @ EsiError::UnknownPartitioner(_)) => {
            tracing::debug!(
                request_id = %origin.request_id,
                src = %directive.src,
                error = %e,
                "Unresolvable ESI directive"
            );
            Bytes::from_static(INVALID_TAG_MARKER)
        }
        Err(e) => {
            tracing::warn!(
                request_id = %origin.request_id,
                src = %directive.src,
                error = %e,
                "ESI side-request failed"
            );
            Bytes::from_static(INVALID_TAG_MARKER)
        }
    }
}
