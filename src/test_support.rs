// Test support utilities for both unit and integration tests

use crate::index::{IndexError, TitleIndex, TitleRecord};
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Mock metadata search service
///
/// Replays a fixed result list for every query through a single-slot
/// channel, the way a real index streams lazily.
#[derive(Default)]
pub struct MockTitleIndex {
    results: Vec<TitleRecord>,
    failure: Option<String>,
    queries: Mutex<Vec<String>>,
    producers: Mutex<Vec<JoinHandle<usize>>>,
}

impl MockTitleIndex {
    pub fn new(results: Vec<TitleRecord>) -> Self {
        MockTitleIndex {
            results,
            ..Default::default()
        }
    }

    /// Index whose every search fails with `reason`
    pub fn failing(reason: &str) -> Self {
        MockTitleIndex {
            failure: Some(reason.to_string()),
            ..Default::default()
        }
    }

    /// Queries received so far, in order
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    /// Wait for every producer task to exit, returning how many records
    /// each one handed over to its channel
    pub async fn wait_for_producers(&self) -> Vec<usize> {
        let handles = std::mem::take(&mut *self.producers.lock().unwrap());
        let mut sent = Vec::with_capacity(handles.len());
        for handle in handles {
            sent.push(handle.await.unwrap());
        }
        sent
    }
}

#[async_trait::async_trait]
impl TitleIndex for MockTitleIndex {
    async fn search(
        &self,
        query: &str,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<TitleRecord>, IndexError> {
        self.queries.lock().unwrap().push(query.to_string());
        if let Some(reason) = &self.failure {
            return Err(IndexError::Search {
                query: query.to_string(),
                reason: reason.clone(),
            });
        }

        let (tx, rx) = mpsc::channel(1);
        let results = self.results.clone();
        let producer = tokio::spawn(async move {
            let mut sent = 0;
            for record in results {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    result = tx.send(record) => {
                        if result.is_err() {
                            break;
                        }
                        sent += 1;
                    }
                }
            }
            sent
        });
        self.producers.lock().unwrap().push(producer);
        Ok(rx)
    }
}

/// Build a search candidate with only the fields the resolver looks at
pub fn title_record(id: &str, title_type: &str, runtime_minutes: Option<i32>) -> TitleRecord {
    TitleRecord {
        id: id.to_string(),
        title_type: title_type.into(),
        primary_title: format!("Title {}", id),
        original_title: format!("Title {}", id),
        start_year: None,
        runtime_minutes,
        genres: Vec::new(),
    }
}
