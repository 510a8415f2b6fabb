//! Retrying, key-rotating front end to a provider

use crate::{
    CompletionRequest, CompletionResponse, CompletionStream, KeyPool, LLMProvider, Result,
    RetryPolicy,
};
use futures::{StreamExt, future, stream};
use std::sync::Arc;
use tracing::debug;

/// Provider + key pool + retry policy
///
/// Every attempt leases the next key from the pool, so a retry after a
/// rate-limit lands on a different credential whenever the pool has more
/// than one.
#[derive(Clone)]
pub struct LlmClient {
    provider: Arc<dyn LLMProvider>,
    keys: Arc<KeyPool>,
    policy: RetryPolicy,
}

impl LlmClient {
    pub fn new(provider: Arc<dyn LLMProvider>, keys: Arc<KeyPool>, policy: RetryPolicy) -> Self {
        Self {
            provider,
            keys,
            policy,
        }
    }

    pub fn keys(&self) -> &Arc<KeyPool> {
        &self.keys
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Run a non-streaming completion with retries
    pub async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        self.policy
            .execute("complete", |attempt| async move {
                let lease = self.keys.lease()?;
                debug!("complete attempt {} using key {}", attempt + 1, lease.index + 1);
                self.provider
                    .complete(&lease.credential, request)
                    .await
                    .inspect_err(|e| self.keys.report_failure(&lease, e))
            })
            .await
    }

    /// Open a streamed completion with retries
    ///
    /// Retries cover opening the stream and its first event, since the
    /// upstream reports quota errors inside an already-accepted stream.
    /// Once the first event has been returned, later errors are yielded
    /// to the caller as-is and nothing is replayed.
    pub async fn stream(&self, request: &CompletionRequest) -> Result<CompletionStream> {
        self.policy
            .execute("stream", |attempt| async move {
                let lease = self.keys.lease()?;
                debug!("stream attempt {} using key {}", attempt + 1, lease.index + 1);

                let opened = async {
                    let mut events = self.provider.stream(&lease.credential, request).await?;
                    match events.next().await {
                        Some(Err(e)) => Err(e),
                        Some(Ok(first)) => {
                            Ok(stream::once(future::ready(Ok(first))).chain(events).boxed())
                        }
                        None => Ok(stream::empty().boxed()),
                    }
                }
                .await;

                opened.inspect_err(|e| self.keys.report_failure(&lease, e))
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Credential, LLMError, MockLLMProvider, StreamEvent};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn pool(names: &[&str]) -> Arc<KeyPool> {
        Arc::new(KeyPool::new(names.iter().map(|n| Credential::new(*n)).collect()))
    }

    fn request() -> CompletionRequest {
        CompletionRequest::builder("gemini-2.5-flash")
            .prompt("Analyse ACME")
            .build()
    }

    #[tokio::test]
    async fn test_two_keys_alternate_over_sequential_calls() {
        let used = Arc::new(Mutex::new(Vec::new()));
        let seen = used.clone();

        let mut provider = MockLLMProvider::new();
        provider.expect_name().return_const("mock");
        provider
            .expect_complete()
            .times(10)
            .returning(move |credential: &Credential, _request: &CompletionRequest| {
                seen.lock().unwrap().push(credential.expose().to_string());
                Ok(CompletionResponse::default())
            });

        let keys = pool(&["key-a", "key-b"]);
        let client = LlmClient::new(Arc::new(provider), keys.clone(), RetryPolicy::fast());
        for _ in 0..10 {
            client.complete(&request()).await.unwrap();
        }

        let indices: Vec<usize> = used
            .lock()
            .unwrap()
            .iter()
            .map(|k| usize::from(k == "key-b"))
            .collect();
        assert_eq!(indices, vec![0, 1, 0, 1, 0, 1, 0, 1, 0, 1]);
        assert_eq!(keys.stats().rotations, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_rotates_to_next_key() {
        let used = Arc::new(Mutex::new(Vec::new()));
        let seen = used.clone();

        let mut provider = MockLLMProvider::new();
        provider
            .expect_complete()
            .times(3)
            .returning(move |credential: &Credential, _request: &CompletionRequest| {
                let mut seen = seen.lock().unwrap();
                seen.push(credential.expose().to_string());
                if seen.len() < 3 {
                    Err(LLMError::from_status(429, "quota"))
                } else {
                    Ok(CompletionResponse {
                        text: "done".to_string(),
                        ..Default::default()
                    })
                }
            });

        let client = LlmClient::new(Arc::new(provider), pool(&["a", "b"]), RetryPolicy::fast());
        let response = client.complete(&request()).await.unwrap();

        assert_eq!(response.text, "done");
        assert_eq!(*used.lock().unwrap(), vec!["a", "b", "a"]);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let mut provider = MockLLMProvider::new();
        provider
            .expect_complete()
            .times(1)
            .returning(|_: &Credential, _: &CompletionRequest| {
                Err(LLMError::from_status(403, "forbidden"))
            });

        let client = LlmClient::new(Arc::new(provider), pool(&["a", "b"]), RetryPolicy::fast());
        let result = client.complete(&request()).await;
        assert!(matches!(result, Err(LLMError::PermissionDenied(_))));
    }

    #[tokio::test]
    async fn test_empty_pool() {
        let mut provider = MockLLMProvider::new();
        provider.expect_complete().never();

        let client = LlmClient::new(Arc::new(provider), pool(&[]), RetryPolicy::fast());
        assert!(matches!(
            client.complete(&request()).await,
            Err(LLMError::NoCredentials)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_retries_error_in_first_event() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let mut provider = MockLLMProvider::new();
        provider
            .expect_stream()
            .times(2)
            .returning(move |_: &Credential, _: &CompletionRequest| {
                let events = if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    vec![Err(LLMError::upstream("RESOURCE_EXHAUSTED: quota"))]
                } else {
                    vec![
                        Ok(StreamEvent::Text("Hello ".to_string())),
                        Ok(StreamEvent::Text("world".to_string())),
                    ]
                };
                Ok(stream::iter(events).boxed())
            });

        let client = LlmClient::new(Arc::new(provider), pool(&["a", "b"]), RetryPolicy::fast());
        let events: Vec<_> = client.stream(&request()).await.unwrap().collect().await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        let text: String = events
            .into_iter()
            .filter_map(|e| match e {
                Ok(StreamEvent::Text(t)) => Some(t),
                _ => None,
            })
            .collect();
        assert_eq!(text, "Hello world");
    }

    #[tokio::test]
    async fn test_stream_mid_generation_error_is_surfaced() {
        let mut provider = MockLLMProvider::new();
        provider
            .expect_stream()
            .times(1)
            .returning(|_: &Credential, _: &CompletionRequest| {
                Ok(stream::iter(vec![
                    Ok(StreamEvent::Text("partial".to_string())),
                    Err(LLMError::StreamInterrupted("connection reset".to_string())),
                ])
                .boxed())
            });

        let client = LlmClient::new(Arc::new(provider), pool(&["a"]), RetryPolicy::fast());
        let events: Vec<_> = client.stream(&request()).await.unwrap().collect().await;

        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], Err(LLMError::StreamInterrupted(_))));
    }
}
