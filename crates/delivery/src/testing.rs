//! Scripted transport for exercising the retry loop without a network.

use parking_lot::Mutex;
use relay_core::event::EventBatch;
use std::collections::VecDeque;

use crate::transport::{ConversionTransport, TransportFailure, TransportFuture, TransportResponse};

/// Pops one scripted outcome per request and records every batch it sees.
/// An exhausted script answers 200 with an empty receipt.
#[derive(Default)]
pub struct MockTransport {
    script: Mutex<VecDeque<Result<TransportResponse, TransportFailure>>>,
    batches: Mutex<Vec<EventBatch>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond_with(&self, status: u16, body: impl Into<String>) {
        self.script.lock().push_back(Ok(TransportResponse {
            status,
            body: body.into(),
        }));
    }

    pub fn fail_with(&self, retryable: bool, message: impl Into<String>) {
        self.script.lock().push_back(Err(TransportFailure {
            retryable,
            message: message.into(),
        }));
    }

    pub fn request_count(&self) -> usize {
        self.batches.lock().len()
    }

    pub fn sent_batches(&self) -> Vec<EventBatch> {
        self.batches.lock().clone()
    }

    pub fn last_batch(&self) -> Option<EventBatch> {
        self.batches.lock().last().cloned()
    }
}

impl ConversionTransport for MockTransport {
    fn post<'a>(&'a self, batch: &'a EventBatch) -> TransportFuture<'a> {
        self.batches.lock().push(batch.clone());
        let outcome = self.script.lock().pop_front().unwrap_or(Ok(TransportResponse {
            status: 200,
            body: r#"{"events_received":1}"#.to_string(),
        }));
        Box::pin(async move { outcome })
    }
}
