//! Translation gateway: wraps the external provider with retries and
//! normalizes every outcome into a `Translation` value.
//!
//! The gateway never returns an error. Provider failures are absorbed into
//! the outcome so message handling can always produce a chat reply.

use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::Error;
use crate::langs::LangCode;
use crate::retry::{self, RetryPolicy};
use crate::Result;

/// Request for a single provider attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TranslationRequest {
    pub text: String,
    pub target: LangCode,
    /// Explicit source language; `None` asks the provider to detect it.
    pub source: Option<LangCode>,
    /// The provider must translate into `target` even if its own detection
    /// disagrees.
    pub force_target: bool,
    /// The provider must treat `source` as authoritative. Only meaningful
    /// when `source` is set.
    pub force_source: bool,
}

/// Raw provider response before gateway normalization.
#[derive(Clone, Debug)]
pub struct ProviderReply {
    pub text: String,
    /// Source language the provider resolved, detected or forced.
    pub detected_source: LangCode,
}

/// One attempt against the external translation provider.
#[async_trait]
pub trait TranslateProvider: Send + Sync {
    async fn translate(&self, req: &TranslationRequest) -> Result<ProviderReply>;
}

/// Normalized translation outcome.
#[derive(Clone, Debug)]
pub struct Translation {
    /// Translated text, or the original text when nothing was translated.
    pub text: String,
    /// Resolved source language. Absent when every attempt failed.
    pub source: Option<LangCode>,
    pub target: LangCode,
    pub translated: bool,
    /// Provider failure message after the retry budget was exhausted.
    pub error: Option<String>,
}

pub struct TranslationGateway {
    provider: Arc<dyn TranslateProvider>,
    policy: RetryPolicy,
}

impl TranslationGateway {
    pub fn new(provider: Arc<dyn TranslateProvider>, policy: RetryPolicy) -> Self {
        Self { provider, policy }
    }

    /// Translates `text` into `target`. An explicit `source` is forced on the
    /// provider; otherwise the provider detects the source itself.
    ///
    /// When the resolved source already equals the target the original text
    /// is returned untouched with `translated: false`.
    pub async fn translate(
        &self,
        text: &str,
        target: &LangCode,
        source: Option<&LangCode>,
    ) -> Translation {
        let req = TranslationRequest {
            text: text.to_string(),
            target: target.clone(),
            source: source.cloned(),
            force_target: true,
            force_source: source.is_some(),
        };

        let outcome =
            retry::retry(&self.policy, "translation", || self.provider.translate(&req)).await;

        match outcome {
            Ok(reply) => {
                if reply.detected_source == *target {
                    return Translation {
                        text: text.to_string(),
                        source: Some(reply.detected_source),
                        target: target.clone(),
                        translated: false,
                        error: None,
                    };
                }
                tracing::info!(
                    source = %reply.detected_source,
                    target = %target,
                    chars = text.chars().count(),
                    "translated message"
                );
                Translation {
                    text: reply.text,
                    source: Some(reply.detected_source),
                    target: target.clone(),
                    translated: true,
                    error: None,
                }
            }
            Err(err) => {
                let message = match &err {
                    Error::Provider(msg) => msg.clone(),
                    other => other.to_string(),
                };
                Translation {
                    text: text.to_string(),
                    source: None,
                    target: target.clone(),
                    translated: false,
                    error: Some(message),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;

    struct FakeProvider {
        replies: Mutex<Vec<Result<ProviderReply>>>,
        calls: AtomicUsize,
        requests: Mutex<Vec<TranslationRequest>>,
    }

    impl FakeProvider {
        fn new(replies: Vec<Result<ProviderReply>>) -> Self {
            Self {
                replies: Mutex::new(replies),
                calls: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn last_request(&self) -> TranslationRequest {
            self.requests
                .lock()
                .unwrap()
                .last()
                .cloned()
                .expect("provider was never called")
        }
    }

    #[async_trait]
    impl TranslateProvider for FakeProvider {
        async fn translate(&self, req: &TranslationRequest) -> Result<ProviderReply> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(req.clone());
            let mut replies = self.replies.lock().unwrap();
            if replies.is_empty() {
                Err(Error::Provider("provider unavailable".to_string()))
            } else {
                replies.remove(0)
            }
        }
    }

    fn gateway(provider: Arc<FakeProvider>) -> TranslationGateway {
        TranslationGateway::new(provider, RetryPolicy::fixed(3, Duration::ZERO))
    }

    fn reply(text: &str, source: &str) -> Result<ProviderReply> {
        Ok(ProviderReply {
            text: text.to_string(),
            detected_source: LangCode::new(source),
        })
    }

    #[tokio::test]
    async fn translates_and_reports_detected_source() {
        let provider = Arc::new(FakeProvider::new(vec![reply("Halo dunia", "en")]));
        let gateway = gateway(provider.clone());

        let out = gateway
            .translate("Hello world", &LangCode::new("id"), None)
            .await;

        assert!(out.translated);
        assert_eq!(out.text, "Halo dunia");
        assert_eq!(out.source, Some(LangCode::new("en")));
        assert_eq!(out.target, LangCode::new("id"));
        assert!(out.error.is_none());

        let req = provider.last_request();
        assert!(req.force_target);
        assert!(!req.force_source, "detected source must not be forced");
        assert_eq!(req.source, None);
    }

    #[tokio::test]
    async fn skips_translation_when_source_equals_target() {
        let provider = Arc::new(FakeProvider::new(vec![reply("should be ignored", "id")]));
        let gateway = gateway(provider.clone());

        let out = gateway
            .translate("Sudah bahasa Indonesia", &LangCode::new("id"), None)
            .await;

        assert!(!out.translated);
        assert_eq!(out.text, "Sudah bahasa Indonesia");
        assert_eq!(out.source, Some(LangCode::new("id")));
        assert!(out.error.is_none());
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn forces_an_explicit_source() {
        let provider = Arc::new(FakeProvider::new(vec![reply("hello", "zh-CN")]));
        let gateway = gateway(provider.clone());

        let source = LangCode::new("zh-CN");
        gateway
            .translate("你好", &LangCode::new("en"), Some(&source))
            .await;

        let req = provider.last_request();
        assert!(req.force_source);
        assert_eq!(req.source, Some(LangCode::new("zh-CN")));
    }

    #[tokio::test]
    async fn retries_transient_failures_before_succeeding() {
        let provider = Arc::new(FakeProvider::new(vec![
            Err(Error::Provider("timeout".to_string())),
            reply("Halo", "en"),
        ]));
        let gateway = gateway(provider.clone());

        let out = gateway.translate("Hello", &LangCode::new("id"), None).await;

        assert!(out.translated);
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn absorbs_exhausted_retries_into_the_outcome() {
        let provider = Arc::new(FakeProvider::new(Vec::new()));
        let gateway = gateway(provider.clone());

        let out = gateway.translate("Hello", &LangCode::new("id"), None).await;

        assert!(!out.translated);
        assert_eq!(out.text, "Hello", "original text must be preserved");
        assert_eq!(out.source, None);
        assert_eq!(out.error.as_deref(), Some("provider unavailable"));
        assert_eq!(provider.calls(), 3, "retry budget is three attempts");
    }
}
