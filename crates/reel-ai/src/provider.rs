//! Provider traits and the ranked fallback chain.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::ProviderError;

/// Counter of fallback events, labelled by capability and reason.
pub const METRIC_PROVIDER_FALLBACKS: &str = "reel_provider_fallbacks_total";

/// What a chain produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Script,
    Image,
    Speech,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Script => "script",
            Self::Image => "image",
            Self::Speech => "speech",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Common surface of every provider adapter.
pub trait Provider: Send + Sync {
    /// Short stable name used in logs and errors.
    fn name(&self) -> &str;

    /// Whether credentials look real enough to attempt a call.
    fn is_configured(&self) -> bool;
}

/// Produces raw script text for a system and user prompt.
#[async_trait]
pub trait ScriptProvider: Provider {
    async fn complete(&self, system: &str, user: &str) -> Result<Option<String>, ProviderError>;
}

/// Produces image bytes for a description.
#[async_trait]
pub trait ImageProvider: Provider {
    async fn generate_image(&self, prompt: &str) -> Result<Option<Vec<u8>>, ProviderError>;
}

/// Produces narration audio bytes for a line of text.
#[async_trait]
pub trait SpeechProvider: Provider {
    async fn synthesize(&self, text: &str) -> Result<Option<Vec<u8>>, ProviderError>;
}

/// Ranked providers for one capability.
///
/// Providers are tried in order. Unconfigured providers are skipped,
/// quota and credential failures move on to the next provider, and any
/// other failure aborts the chain. `Ok(None)` means every provider was
/// skipped, failed recoverably, or produced nothing.
pub struct FallbackChain<P: ?Sized> {
    capability: Capability,
    providers: Vec<Arc<P>>,
    timeout: Option<Duration>,
}

impl<P: ?Sized> Clone for FallbackChain<P> {
    fn clone(&self) -> Self {
        Self {
            capability: self.capability,
            providers: self.providers.clone(),
            timeout: self.timeout,
        }
    }
}

impl<P: Provider + ?Sized> FallbackChain<P> {
    pub fn new(capability: Capability) -> Self {
        Self {
            capability,
            providers: Vec::new(),
            timeout: None,
        }
    }

    /// Append a provider at the lowest rank.
    pub fn with_provider(mut self, provider: Arc<P>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Bound every provider call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn capability(&self) -> Capability {
        self.capability
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Names of providers that would be attempted.
    pub fn configured(&self) -> Vec<String> {
        self.providers
            .iter()
            .filter(|p| p.is_configured())
            .map(|p| p.name().to_string())
            .collect()
    }

    /// Run `call` against each provider in rank order.
    pub async fn run<T, F, Fut>(&self, mut call: F) -> Result<Option<T>, ProviderError>
    where
        F: FnMut(Arc<P>) -> Fut,
        Fut: Future<Output = Result<Option<T>, ProviderError>>,
    {
        let capability = self.capability.as_str();

        for provider in &self.providers {
            let name = provider.name().to_string();
            if !provider.is_configured() {
                debug!(capability, provider = %name, "Provider not configured, skipping");
                continue;
            }

            let attempt = match self.timeout {
                Some(limit) => match tokio::time::timeout(limit, call(Arc::clone(provider))).await {
                    Ok(result) => result,
                    Err(_) => Err(ProviderError::other(
                        &name,
                        format!("timed out after {} seconds", limit.as_secs()),
                    )),
                },
                None => call(Arc::clone(provider)).await,
            };

            match attempt {
                Ok(Some(output)) => {
                    info!(capability, provider = %name, "Provider succeeded");
                    return Ok(Some(output));
                }
                Ok(None) => {
                    warn!(capability, provider = %name, "Provider returned no output, trying next");
                    metrics::counter!(METRIC_PROVIDER_FALLBACKS, "capability" => capability, "reason" => "no_output")
                        .increment(1);
                }
                Err(e) if e.is_recoverable() => {
                    warn!(
                        capability,
                        provider = %name,
                        reason = %e.kind,
                        error = %e.message,
                        "Provider unavailable, trying next"
                    );
                    metrics::counter!(METRIC_PROVIDER_FALLBACKS, "capability" => capability, "reason" => e.kind.as_str())
                        .increment(1);
                }
                Err(e) => return Err(e),
            }
        }

        warn!(capability, "All providers exhausted, using fallback");
        metrics::counter!(METRIC_PROVIDER_FALLBACKS, "capability" => capability, "reason" => "exhausted")
            .increment(1);
        Ok(None)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted providers for chain and generator tests.

    use super::*;
    use crate::error::ProviderErrorKind;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    pub enum Reply {
        Output(Vec<u8>),
        Text(String),
        Nothing,
        Fail(ProviderErrorKind),
        Hang,
    }

    pub struct Scripted {
        pub name: String,
        pub configured: bool,
        pub reply: Mutex<Reply>,
        pub calls: AtomicUsize,
    }

    impl Scripted {
        pub fn new(name: &str, reply: Reply) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                configured: true,
                reply: Mutex::new(reply),
                calls: AtomicUsize::new(0),
            })
        }

        pub fn unconfigured(name: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                configured: false,
                reply: Mutex::new(Reply::Nothing),
                calls: AtomicUsize::new(0),
            })
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        async fn respond(&self) -> Result<Option<Vec<u8>>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let (outcome, hang) = {
                let reply = self.reply.lock().unwrap();
                let outcome = match &*reply {
                    Reply::Output(bytes) => Ok(Some(bytes.clone())),
                    Reply::Text(text) => Ok(Some(text.clone().into_bytes())),
                    Reply::Nothing | Reply::Hang => Ok(None),
                    Reply::Fail(kind) => Err(ProviderError::new(*kind, &self.name, "scripted failure")),
                };
                (outcome, matches!(&*reply, Reply::Hang))
            };
            if hang {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            outcome
        }
    }

    impl Provider for Scripted {
        fn name(&self) -> &str {
            &self.name
        }

        fn is_configured(&self) -> bool {
            self.configured
        }
    }

    #[async_trait]
    impl ScriptProvider for Scripted {
        async fn complete(&self, _system: &str, _user: &str) -> Result<Option<String>, ProviderError> {
            Ok(self
                .respond()
                .await?
                .map(|b| String::from_utf8_lossy(&b).into_owned()))
        }
    }

    #[async_trait]
    impl ImageProvider for Scripted {
        async fn generate_image(&self, _prompt: &str) -> Result<Option<Vec<u8>>, ProviderError> {
            self.respond().await
        }
    }

    #[async_trait]
    impl SpeechProvider for Scripted {
        async fn synthesize(&self, _text: &str) -> Result<Option<Vec<u8>>, ProviderError> {
            self.respond().await
        }
    }
}
