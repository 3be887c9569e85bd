//! Provider pool: the concrete provider registry

use std::collections::HashMap;
use std::sync::Arc;

use super::{MediaProvider, ProviderError, ProviderRegistry};
use crate::media::{DownloadMode, Media};
use crate::security::DownloadStrategy;

/// Formats and download policy of one context.
#[derive(Clone)]
pub struct MediaContext {
    formats: Vec<String>,
    strategy: Arc<dyn DownloadStrategy>,
    mode: DownloadMode,
}

impl MediaContext {
    /// Creates a context.
    ///
    /// Format names are qualified with the context name, so `small` in the
    /// `default` context is registered as `default_small`.
    pub fn new<I, S>(
        name: &str,
        formats: I,
        strategy: Arc<dyn DownloadStrategy>,
        mode: DownloadMode,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            formats: formats
                .into_iter()
                .map(|format| format!("{}_{}", name, format.as_ref()))
                .collect(),
            strategy,
            mode,
        }
    }

    /// Qualified format names.
    pub fn formats(&self) -> &[String] {
        &self.formats
    }

    /// Strategy gating downloads.
    pub fn strategy(&self) -> &Arc<dyn DownloadStrategy> {
        &self.strategy
    }

    /// Delivery mode for downloads.
    pub fn mode(&self) -> DownloadMode {
        self.mode
    }
}

/// Registry of providers and contexts.
#[derive(Clone, Default)]
pub struct ProviderPool {
    providers: HashMap<String, Arc<dyn MediaProvider>>,
    contexts: HashMap<String, MediaContext>,
}

impl ProviderPool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a provider under a name.
    pub fn add_provider(&mut self, name: impl Into<String>, provider: Arc<dyn MediaProvider>) {
        self.providers.insert(name.into(), provider);
    }

    /// Registers a context.
    pub fn add_context(&mut self, name: impl Into<String>, context: MediaContext) {
        self.contexts.insert(name.into(), context);
    }

    /// Context registered under a name.
    pub fn context(&self, name: &str) -> Option<&MediaContext> {
        self.contexts.get(name)
    }

    /// Names of every registered context, sorted.
    pub fn context_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.contexts.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl ProviderRegistry for ProviderPool {
    fn provider(&self, name: &str) -> Result<Arc<dyn MediaProvider>, ProviderError> {
        self.providers
            .get(name)
            .cloned()
            .ok_or_else(|| ProviderError::UnknownProvider {
                name: name.to_string(),
            })
    }

    fn download_strategy(&self, media: &Media) -> Result<Arc<dyn DownloadStrategy>, ProviderError> {
        self.contexts
            .get(&media.context)
            .map(|context| Arc::clone(&context.strategy))
            .ok_or_else(|| ProviderError::UnknownContext {
                context: media.context.clone(),
            })
    }

    fn download_mode(&self, media: &Media) -> DownloadMode {
        self.contexts
            .get(&media.context)
            .map(|context| context.mode)
            .unwrap_or_default()
    }

    fn format_names(&self, context: &str) -> Vec<String> {
        self.contexts
            .get(context)
            .map(|context| context.formats.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::{ForbiddenDownloadStrategy, PublicDownloadStrategy};

    fn pool() -> ProviderPool {
        let mut pool = ProviderPool::new();
        pool.add_context(
            "default",
            MediaContext::new(
                "default",
                ["small", "big"],
                Arc::new(PublicDownloadStrategy),
                DownloadMode::XSendfile,
            ),
        );
        pool.add_context(
            "private",
            MediaContext::new(
                "private",
                Vec::<String>::new(),
                Arc::new(ForbiddenDownloadStrategy),
                DownloadMode::Http,
            ),
        );
        pool
    }

    #[test]
    fn test_format_names_are_context_qualified_and_ordered() {
        assert_eq!(
            pool().format_names("default"),
            vec!["default_small".to_string(), "default_big".to_string()]
        );
        assert!(pool().format_names("private").is_empty());
        assert!(pool().format_names("missing").is_empty());
    }

    #[test]
    fn test_strategy_and_mode_follow_context() {
        let pool = pool();
        let media = Media::new(1u64, "image", "default", "default/1.jpg");

        let strategy = pool.download_strategy(&media).unwrap();
        assert_eq!(strategy.description(), "The media is publicly available.");
        assert_eq!(pool.download_mode(&media), DownloadMode::XSendfile);
    }

    #[test]
    fn test_unknown_context_and_provider_are_errors() {
        let pool = pool();
        let media = Media::new(1u64, "image", "archive", "archive/1.jpg");

        assert!(matches!(
            pool.download_strategy(&media),
            Err(ProviderError::UnknownContext { .. })
        ));
        assert_eq!(pool.download_mode(&media), DownloadMode::Http);
        assert!(matches!(
            pool.provider("video"),
            Err(ProviderError::UnknownProvider { .. })
        ));
    }

    #[test]
    fn test_context_names_sorted() {
        assert_eq!(pool().context_names(), vec!["default", "private"]);
    }
}
