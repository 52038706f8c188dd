//! # Batch Parsing
//!
//! Parses many documents against the same tables. With the `parallel`
//! feature the batch is spread over the rayon thread pool; without it the
//! documents are parsed one after another. Results come back in input
//! order either way.

use super::Parser;
use crate::syntax::SyntaxTree;
use std::time::{Duration, Instant};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Named documents to parse together
#[derive(Debug, Clone, Default)]
pub struct ParseBatch {
    documents: Vec<(String, Vec<u8>)>,
}

impl ParseBatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, id: impl Into<String>, text: impl Into<Vec<u8>>) {
        self.documents.push((id.into(), text.into()));
    }

    #[must_use]
    pub fn with(mut self, id: impl Into<String>, text: impl Into<Vec<u8>>) -> Self {
        self.add(id, text);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Outcome of parsing one document of a [`ParseBatch`]
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub id: String,
    pub tree: SyntaxTree,
    pub duration: Duration,
}

impl Parser {
    fn parse_document(&self, id: &str, text: &[u8]) -> BatchResult {
        let start = Instant::now();
        let tree = self.parse(text);
        BatchResult {
            id: id.to_owned(),
            tree,
            duration: start.elapsed(),
        }
    }

    /// Parses every document of `batch`.
    #[must_use]
    pub fn parse_batch(&self, batch: &ParseBatch) -> Vec<BatchResult> {
        self.parse_batch_with_progress(batch, |_, _| {})
    }

    /// Like [`parse_batch`](Self::parse_batch), calling `progress` with the
    /// number of finished documents and the batch size after each one.
    pub fn parse_batch_with_progress<F>(&self, batch: &ParseBatch, progress: F) -> Vec<BatchResult>
    where
        F: Fn(usize, usize) + Send + Sync,
    {
        let total = batch.len();
        let completed = std::sync::atomic::AtomicUsize::new(0);
        let parse_one = |(id, text): &(String, Vec<u8>)| {
            let result = self.parse_document(id, text);
            let done = completed.fetch_add(1, std::sync::atomic::Ordering::Relaxed) + 1;
            progress(done, total);
            result
        };

        #[cfg(feature = "parallel")]
        let results = batch.documents.par_iter().map(parse_one).collect();
        #[cfg(not(feature = "parallel"))]
        let results = batch.documents.iter().map(parse_one).collect();
        results
    }
}
