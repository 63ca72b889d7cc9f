//! Scripted extractor for tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{MediaProbe, MetadataDocument, ProbeError, ProbeOptions, SearchEntry};

/// One recorded `probe` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeCall {
    pub source_url: String,
    pub options: ProbeOptions,
}

#[derive(Debug, Default)]
struct Script {
    probe_responses: VecDeque<Result<MetadataDocument, ProbeError>>,
    search_responses: VecDeque<Result<Vec<SearchEntry>, ProbeError>>,
    calls: Vec<ProbeCall>,
    search_calls: usize,
}

/// Extractor that replays queued responses in call order.
///
/// When the queue runs dry every further probe fails with a fixed
/// diagnostic. Clones share the same script and call log.
#[derive(Debug, Clone, Default)]
pub struct ScriptedProbe {
    script: Arc<Mutex<Script>>,
    delay: Option<Duration>,
}

impl ScriptedProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a successful probe response.
    pub fn push_document(&self, document: MetadataDocument) -> &Self {
        self.script.lock().probe_responses.push_back(Ok(document));
        self
    }

    /// Queues a failed probe response.
    pub fn push_failure(&self, error: ProbeError) -> &Self {
        self.script.lock().probe_responses.push_back(Err(error));
        self
    }

    /// Queues a failure with the given extractor diagnostic.
    pub fn push_failure_message(&self, reason: impl Into<String>) -> &Self {
        self.push_failure(ProbeError::Failed {
            code: Some(1),
            reason: reason.into(),
        })
    }

    pub fn push_search(&self, entries: Vec<SearchEntry>) -> &Self {
        self.script.lock().search_responses.push_back(Ok(entries));
        self
    }

    /// Makes every call take `delay` before answering.
    ///
    /// The delay is cut short by `options.timeout`, which then yields
    /// `ProbeError::Timeout` like the real backend.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Recorded probe calls, oldest first.
    pub fn calls(&self) -> Vec<ProbeCall> {
        self.script.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.script.lock().calls.len()
    }

    pub fn search_call_count(&self) -> usize {
        self.script.lock().search_calls
    }

    async fn wait(&self, timeout: Duration) -> Result<(), ProbeError> {
        match self.delay {
            Some(delay) if delay > timeout => {
                tokio::time::sleep(timeout).await;
                Err(ProbeError::timeout(timeout))
            }
            Some(delay) => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl MediaProbe for ScriptedProbe {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn probe(
        &self,
        source_url: &str,
        options: &ProbeOptions,
    ) -> Result<MetadataDocument, ProbeError> {
        let response = {
            let mut script = self.script.lock();
            script.calls.push(ProbeCall {
                source_url: source_url.to_string(),
                options: options.clone(),
            });
            script.probe_responses.pop_front()
        };

        self.wait(options.timeout).await?;

        response.unwrap_or_else(|| {
            Err(ProbeError::Failed {
                code: Some(1),
                reason: "ERROR: no scripted response".to_string(),
            })
        })
    }

    async fn search(
        &self,
        _query: &str,
        limit: usize,
        options: &ProbeOptions,
    ) -> Result<Vec<SearchEntry>, ProbeError> {
        let response = {
            let mut script = self.script.lock();
            script.search_calls += 1;
            script.search_responses.pop_front()
        };

        self.wait(options.timeout).await?;

        let mut entries = response.unwrap_or_else(|| Ok(Vec::new()))?;
        entries.truncate(limit);
        Ok(entries)
    }

    async fn version(&self) -> Result<String, ProbeError> {
        Ok("scripted".to_string())
    }
}
