//! Typed progress events and the channel that carries them.
//!
//! The engine writes to an [`EventSink`]; callers read an [`EventStream`].
//! Line encoding is a caller concern ([`ReportEvent::to_ndjson`]).

use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};

use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::provider::Source;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ReportEvent {
    SearchStart { prompt: String },
    DecomposedQueries { queries: Vec<String> },
    SearchQuery { query: String },
    SearchResults { query: String, count: usize },
    NoResults { query: String },
    SummarizeProgress { query: String, current: usize, total: usize },
    SummarizeComplete { query: String, count: usize },
    Evaluation { query: String, sufficient: bool, reasoning: String },
    ReportChunk { content: String },
    Sources { sources: Vec<Source> },
    Error { message: String, fatal: bool },
    SearchComplete,
}

impl ReportEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ReportEvent::SearchStart { .. } => "search_start",
            ReportEvent::DecomposedQueries { .. } => "decomposed_queries",
            ReportEvent::SearchQuery { .. } => "search_query",
            ReportEvent::SearchResults { .. } => "search_results",
            ReportEvent::NoResults { .. } => "no_results",
            ReportEvent::SummarizeProgress { .. } => "summarize_progress",
            ReportEvent::SummarizeComplete { .. } => "summarize_complete",
            ReportEvent::Evaluation { .. } => "evaluation",
            ReportEvent::ReportChunk { .. } => "report_chunk",
            ReportEvent::Sources { .. } => "sources",
            ReportEvent::Error { .. } => "error",
            ReportEvent::SearchComplete => "search_complete",
        }
    }

    /// `search_complete` or a fatal `error`; nothing follows either.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReportEvent::SearchComplete | ReportEvent::Error { fatal: true, .. }
        )
    }

    /// One JSON object plus newline: `{"event":"...","data":{...}}`.
    pub fn to_ndjson(&self) -> serde_json::Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

/// Write half. Cloning shares the seal.
#[derive(Clone, Debug)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<ReportEvent>,
    sealed: Arc<AtomicBool>,
}

impl EventSink {
    /// A sink whose events go nowhere, for non-streaming runs.
    pub fn discard() -> Self {
        let (tx, _) = mpsc::unbounded_channel();
        Self {
            tx,
            sealed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns false once sealed or when the reader is gone.
    pub fn emit(&self, event: ReportEvent) -> bool {
        if self.is_sealed() {
            return false;
        }
        self.tx.send(event).is_ok()
    }

    /// Emits `event` and refuses everything after it.
    pub fn emit_last(&self, event: ReportEvent) -> bool {
        let sent = self.emit(event);
        self.seal();
        sent
    }

    pub fn seal(&self) {
        self.sealed.store(true, Ordering::Release);
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }
}

/// Read half. Dropping it cancels the session feeding it.
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<ReportEvent>,
    cancel: CancellationToken,
}

impl EventStream {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn next_event(&mut self) -> Option<ReportEvent> {
        self.rx.recv().await
    }
}

impl Stream for EventStream {
    type Item = ReportEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

pub fn channel(cancel: CancellationToken) -> (EventSink, EventStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        EventSink {
            tx,
            sealed: Arc::new(AtomicBool::new(false)),
        },
        EventStream { rx, cancel },
    )
}
