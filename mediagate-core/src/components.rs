//! Wiring of concrete collaborators from configuration.
//!
//! The web layer and the CLI receive fully built components and never look
//! at configuration sections themselves.

use std::sync::Arc;

use tracing::info;

use crate::MediaGateError;
use crate::cache::{DerivedImageCache, FilesystemImageCache, MemoryImageCache};
use crate::config::{CacheBackend, CacheConfig, MediaGateConfig, SecurityConfig, StrategyConfig};
use crate::filter::FilterManager;
use crate::gateway::MediaGateway;
use crate::provider::{FilesystemProvider, MediaContext, ProviderPool};
use crate::repository::InMemoryMediaRepository;
use crate::response::AccelMapping;
use crate::security::{
    AuthorizationChecker, DownloadStrategy, ForbiddenDownloadStrategy, PublicDownloadStrategy,
    RoleAuthorizationChecker, RoleBasedStrategy, SessionDownloadStrategy,
};

/// Role checker configured with the hierarchy and abstain policy.
pub fn build_checker(security: &SecurityConfig) -> Arc<dyn AuthorizationChecker> {
    Arc::new(
        RoleAuthorizationChecker::new()
            .with_hierarchy(security.role_hierarchy.clone())
            .with_allow_if_all_abstain(security.allow_if_all_abstain),
    )
}

/// Strategy described by a context's configuration.
pub fn build_strategy(
    strategy: &StrategyConfig,
    checker: &Arc<dyn AuthorizationChecker>,
) -> Arc<dyn DownloadStrategy> {
    match strategy {
        StrategyConfig::Public => Arc::new(PublicDownloadStrategy),
        StrategyConfig::Forbidden => Arc::new(ForbiddenDownloadStrategy),
        StrategyConfig::Roles { roles } => {
            Arc::new(RoleBasedStrategy::new(Arc::clone(checker), roles.clone()))
        }
        StrategyConfig::Session { times } => Arc::new(SessionDownloadStrategy::new(*times)),
    }
}

/// Provider pool with one filesystem provider per configured provider name.
pub fn build_registry(config: &MediaGateConfig) -> ProviderPool {
    let checker = build_checker(&config.security);
    let mut pool = ProviderPool::new();
    let accel_mapping = AccelMapping::new(config.storage.accel_mapping.clone());

    for name in &config.storage.providers {
        let mut provider = FilesystemProvider::new(name.clone(), config.storage.media_root.clone())
            .with_accel_mapping(accel_mapping.clone());
        if let Some(url) = &config.storage.public_base_url {
            provider = provider.with_public_base_url(url.clone());
        }
        pool.add_provider(name.clone(), Arc::new(provider));
    }

    for (name, context) in &config.contexts {
        pool.add_context(
            name.clone(),
            MediaContext::new(
                name,
                &context.formats,
                build_strategy(&context.strategy, &checker),
                context.download_mode,
            ),
        );
    }

    pool
}

/// Derived-image cache for the configured backend.
pub fn build_cache(cache: &CacheConfig) -> Arc<dyn DerivedImageCache> {
    match cache.backend {
        CacheBackend::Filesystem => Arc::new(FilesystemImageCache::new(
            cache.root.clone(),
            cache.url_prefix.clone(),
        )),
        CacheBackend::Memory => Arc::new(MemoryImageCache::new(cache.max_entries)),
    }
}

/// Builds the gateway, loading the catalog when one is configured.
///
/// # Errors
/// - `MediaGateError::Repository` - If the catalog cannot be loaded
pub async fn build_gateway(config: &MediaGateConfig) -> Result<MediaGateway, MediaGateError> {
    let repository = match &config.storage.catalog {
        Some(path) => InMemoryMediaRepository::from_catalog(path).await?,
        None => InMemoryMediaRepository::new(),
    };

    let registry = build_registry(config);
    let filters = FilterManager::new(config.filters.0.clone());

    info!(
        "Gateway ready: {} media, contexts [{}], filters [{}], {:?} cache",
        repository.len().await,
        registry.context_names().join(", "),
        filters.names().collect::<Vec<_>>().join(", "),
        config.cache.backend
    );

    Ok(MediaGateway::new(
        Arc::new(repository),
        Arc::new(registry),
        build_cache(&config.cache),
        Arc::new(filters),
    )
    .with_temp_dir(config.storage.temp_dir.clone()))
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::config::ContextConfig;
    use crate::media::{Format, Media, MediaId};
    use crate::provider::ProviderRegistry;
    use crate::request::{MediaRequest, SecurityToken};

    #[test]
    fn test_strategy_descriptions() {
        let checker = build_checker(&SecurityConfig::default());
        let roles = StrategyConfig::Roles {
            roles: vec!["ROLE_A".to_string(), "ROLE_B".to_string()],
        };

        assert_eq!(
            build_strategy(&roles, &checker).description(),
            "The media can be retrieved by users with the following roles: ROLE_A, ROLE_B."
        );
        assert_eq!(
            build_strategy(&StrategyConfig::Session { times: 3 }, &checker).description(),
            "The media can be retrieved 3 time(s) per session."
        );
    }

    #[test]
    fn test_registry_uses_role_hierarchy() {
        let mut config = MediaGateConfig::default();
        config
            .security
            .role_hierarchy
            .insert("ROLE_SUPER".to_string(), vec!["ROLE_ADMIN".to_string()]);
        config
            .contexts
            .insert("default".to_string(), ContextConfig::default());

        let registry = build_registry(&config);
        let media = Media::new(1u64, "image", "default", "default/1.jpg");
        let strategy = registry.download_strategy(&media).unwrap();

        let request = MediaRequest::new().with_token(SecurityToken::new("root", ["ROLE_SUPER"]));
        assert!(strategy.is_granted(&media, &request).unwrap());
        assert!(!strategy.is_granted(&media, &MediaRequest::new()).unwrap());
        assert!(registry.provider("file").is_ok());
        assert_eq!(
            registry.format_names("default"),
            vec!["default_small", "default_big"]
        );
    }

    #[tokio::test]
    async fn test_build_gateway_from_catalog() {
        let dir = TempDir::new().unwrap();
        let catalog = dir.path().join("catalog.json");
        std::fs::write(
            &catalog,
            r#"[{"id": 5, "name": "5.jpg", "provider_name": "image", "context": "default",
                "extension": "jpg", "content_type": "image/jpeg", "reference": "default/5.jpg"}]"#,
        )
        .unwrap();

        let mut config = MediaGateConfig::for_testing(dir.path());
        config.storage.catalog = Some(catalog);
        let gateway = build_gateway(&config).await.unwrap();

        let view = gateway
            .view(&MediaRequest::new(), &MediaId::from(5u64), &Format::reference())
            .await
            .unwrap();
        assert_eq!(view.media.name, "5.jpg");
    }

    #[tokio::test]
    async fn test_build_gateway_rejects_broken_catalog() {
        let dir = TempDir::new().unwrap();
        let catalog = dir.path().join("catalog.json");
        std::fs::write(&catalog, "{not json").unwrap();

        let mut config = MediaGateConfig::for_testing(dir.path());
        config.storage.catalog = Some(catalog);

        assert!(matches!(
            build_gateway(&config).await,
            Err(MediaGateError::Repository(_))
        ));
    }
}
