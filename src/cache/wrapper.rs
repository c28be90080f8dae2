//! Caching Wrapper
//!
//! Wraps an async fallible function so repeated calls with equal arguments
//! are served from the cache. The argument type supplies the key
//! components, either through a caller-provided extractor or by
//! serializing the argument itself.

use crate::cache::entry::KeyComponents;
use crate::cache::manager::CacheManager;
use crate::error::Result;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

/// Extracts key components from a wrapped function's argument.
///
/// Use a custom extractor to keep volatile or sensitive fields (auth
/// tokens, request IDs) out of the cache key.
pub type KeyExtractor<A> = Arc<dyn Fn(&A) -> KeyComponents + Send + Sync>;

/// Configuration for a wrapped function
pub struct WrapConfig<A> {
    /// Namespace all keys from this wrapper share
    pub namespace: String,
    /// Tier whose TTL applies to cached results
    pub tier: String,
    /// Optional key extractor; defaults to serializing the argument
    pub extractor: Option<KeyExtractor<A>>,
}

impl<A> WrapConfig<A> {
    pub fn new(namespace: impl Into<String>, tier: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            tier: tier.into(),
            extractor: None,
        }
    }

    pub fn with_extractor(
        mut self,
        extractor: impl Fn(&A) -> KeyComponents + Send + Sync + 'static,
    ) -> Self {
        self.extractor = Some(Arc::new(extractor));
        self
    }
}

/// Derive key components by serializing the argument.
///
/// A struct argument contributes one component per field; nested values
/// are stringified by the key builder. Any other argument shape becomes a
/// single `arg_0` component.
pub fn default_components<A: Serialize>(args: &A) -> Result<KeyComponents> {
    let value = serde_json::to_value(args)?;
    Ok(match value {
        Value::Object(fields) => fields.into_iter().collect(),
        other => {
            let mut components = KeyComponents::new();
            components.insert("arg_0".to_string(), other);
            components
        }
    })
}

/// Wrap an async function with caching.
///
/// The returned function checks the cache before invoking `f` and stores
/// successful results under the configured tier's TTL. Errors from `f`
/// pass through uncached, so a failed fetch is retried on the next call.
pub fn wrap<A, T, F, Fut>(
    manager: Arc<CacheManager>,
    config: WrapConfig<A>,
    f: F,
) -> impl Fn(A) -> BoxFuture<'static, Result<T>>
where
    A: Serialize + Send + Sync + 'static,
    T: Serialize + DeserializeOwned + Send + 'static,
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    let f = Arc::new(f);
    move |args: A| {
        let manager = Arc::clone(&manager);
        let f = Arc::clone(&f);
        let namespace = config.namespace.clone();
        let tier = config.tier.clone();
        let extractor = config.extractor.clone();

        Box::pin(async move {
            let components = match &extractor {
                Some(extract) => extract(&args),
                None => default_components(&args)?,
            };
            manager
                .get_or_compute(&namespace, &components, &tier, move || f(args))
                .await
        })
    }
}
