//! Response assembly with fallback to the original response.
//!
//! # Responsibilities
//! - Read the routing headers and pick a transform
//! - Keep an untouched copy of every body chunk read from origin
//! - Drive the transform to completion before trusting its output
//! - Return the original status, headers and body on any failure
//!
//! # Design Decisions
//! - Pass-through responses are never buffered; only transformed bodies are
//! - The HTML rewriter runs on a blocking worker fed by a bounded channel, so
//!   a slow rewrite slows the upstream read instead of growing a queue
//! - Dropping the channel sender is the only shutdown signal the worker needs,
//!   which holds on every exit path

use std::time::Instant;

use axum::body::{Body, Bytes, HttpBody};
use axum::http::{header, Response};
use futures_util::{future, stream, Stream, StreamExt};
use tokio::sync::mpsc;

use crate::config::TransformConfig;
use crate::observability::metrics;
use crate::transform::context::RequestContext;
use crate::transform::error::TransformError;
use crate::transform::policy::{self, TransformMode};
use crate::transform::rewriter::RewritePlan;
use crate::transform::rules::SEARCHTOOLS_PATCH;

/// Chunks queued between the body reader and the rewriter worker.
const WORKER_QUEUE_DEPTH: usize = 8;

/// Applies the transform pipeline to origin responses.
#[derive(Debug, Clone)]
pub struct ResponseAssembler {
    settings: TransformConfig,
}

impl ResponseAssembler {
    pub fn new(settings: TransformConfig) -> Self {
        Self { settings }
    }

    /// Transform an origin response, or hand it back unchanged.
    ///
    /// Never fails: every error path ends in the original response.
    pub async fn assemble(&self, path: &str, response: Response<Body>) -> Response<Body> {
        if !self.settings.enabled {
            return response;
        }

        if response.body().is_end_stream() {
            tracing::debug!(path = %path, "Response body was already empty, passing through");
            return response;
        }

        let ctx = RequestContext::from_response(
            path,
            response.status(),
            response.headers(),
            self.settings.allow_fault_injection,
        );
        let mode = policy::decide(&ctx);

        tracing::debug!(
            path = %path,
            content_type = %ctx.content_type,
            force_addons = ctx.force_addons,
            hosting_integrations = ctx.hosting_integrations,
            http_status = ctx.http_status,
            throw_error = ctx.debug_throw_error,
            mode = %mode,
            "Transform decision"
        );
        metrics::record_transform_decision(mode);

        if mode == TransformMode::None {
            return response;
        }
        if ctx.is_encoded() {
            tracing::debug!(
                path = %path,
                content_encoding = %ctx.content_encoding,
                "Encoded body, passing through"
            );
            return response;
        }

        let start = Instant::now();
        let (mut parts, body) = response.into_parts();

        let result = match RewritePlan::for_mode(mode, &ctx) {
            Some(plan) => self.rewrite(plan, body).await,
            None => {
                tracing::info!(path = %path, "Modifying _static/searchtools.js");
                self.patch(body).await
            }
        };

        match result {
            Ok(output) => {
                parts.headers.remove(header::CONTENT_LENGTH);
                metrics::record_transform_duration(mode, start);
                Response::from_parts(parts, Body::from(output))
            }
            Err(fallback) => {
                tracing::error!(
                    path = %path,
                    mode = %mode,
                    error = %fallback.error,
                    "Discarding transform error, returning original response"
                );
                metrics::record_transform_fallback(mode, fallback.error.reason());
                Response::from_parts(parts, fallback.body)
            }
        }
    }

    async fn rewrite(&self, plan: RewritePlan, body: Body) -> Result<Bytes, Fallback> {
        self.drive(body, move |chunks| plan.rewrite(chunks)).await
    }

    /// Run `work` on a blocking worker over the body chunks as they arrive.
    async fn drive<F>(&self, body: Body, work: F) -> Result<Bytes, Fallback>
    where
        F: FnOnce(&mut dyn Iterator<Item = Bytes>) -> Result<Bytes, TransformError>
            + Send
            + 'static,
    {
        let (tx, mut rx) = mpsc::channel::<Bytes>(WORKER_QUEUE_DEPTH);
        let worker = tokio::task::spawn_blocking(move || {
            let mut chunks = std::iter::from_fn(move || rx.blocking_recv());
            work(&mut chunks)
        });

        let copy = self.drain(body, Some(tx)).await?;

        match worker.await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(error)) => Err(copy.into_fallback(error)),
            Err(join) => Err(copy.into_fallback(TransformError::Worker(join.to_string()))),
        }
    }

    async fn patch(&self, body: Body) -> Result<Bytes, Fallback> {
        let copy = self.drain(body, None).await?;
        Ok(SEARCHTOOLS_PATCH.apply_bytes(copy.into_bytes()))
    }

    /// Read the whole body, keeping a copy and forwarding chunks to `sink`.
    async fn drain(
        &self,
        body: Body,
        mut sink: Option<mpsc::Sender<Bytes>>,
    ) -> Result<OriginalCopy, Fallback> {
        let limit = self.settings.max_body_bytes;
        let mut copy = OriginalCopy::default();
        let mut frames = body.into_data_stream();

        while let Some(next) = frames.next().await {
            let chunk = match next {
                Ok(chunk) => chunk,
                Err(e) => {
                    let error = TransformError::Upstream(e.to_string());
                    let rest = stream::once(future::ready(Err(e)));
                    return Err(Fallback {
                        body: copy.into_body_with(rest),
                        error,
                    });
                }
            };
            if chunk.is_empty() {
                continue;
            }

            copy.push(chunk.clone());
            if copy.len > limit {
                return Err(Fallback {
                    body: copy.into_body_with(frames),
                    error: TransformError::BodyTooLarge { limit },
                });
            }

            if let Some(tx) = &sink {
                // The worker hung up early; its own error is reported on join.
                if tx.send(chunk).await.is_err() {
                    sink = None;
                }
            }
        }

        Ok(copy)
    }
}

/// The original response body, rebuilt after a failed transform.
struct Fallback {
    body: Body,
    error: TransformError,
}

/// Every chunk read from origin, in order.
#[derive(Default)]
struct OriginalCopy {
    chunks: Vec<Bytes>,
    len: usize,
}

impl OriginalCopy {
    fn push(&mut self, chunk: Bytes) {
        self.len += chunk.len();
        self.chunks.push(chunk);
    }

    fn into_bytes(mut self) -> Bytes {
        match self.chunks.len() {
            0 => Bytes::new(),
            1 => self.chunks.pop().unwrap_or_default(),
            _ => {
                let mut buf = Vec::with_capacity(self.len);
                for chunk in &self.chunks {
                    buf.extend_from_slice(chunk);
                }
                Bytes::from(buf)
            }
        }
    }

    fn into_fallback(self, error: TransformError) -> Fallback {
        Fallback {
            body: Body::from(self.into_bytes()),
            error,
        }
    }

    /// Replay the copy, then continue with whatever the upstream has left.
    fn into_body_with<S>(self, rest: S) -> Body
    where
        S: Stream<Item = Result<Bytes, axum::Error>> + Send + 'static,
    {
        let prefix = stream::iter(self.chunks.into_iter().map(Ok::<_, axum::Error>));
        Body::from_stream(prefix.chain(rest))
    }
}
