use std::sync::Arc;

use crate::resolver::Resolver;
use crate::storage::{LookupRecord, LookupStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("unable to resolve domain {0}")]
    DomainNotResolvable(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("resolver task failed: {0}")]
    Internal(#[from] tokio::task::JoinError),
}

/// Sink for lookup outcomes, implemented by the metrics layer.
///
/// Injected rather than reached through a global registry so the service can
/// be exercised in tests without a metrics backend.
pub trait LookupObserver: Send + Sync {
    fn lookup_succeeded(&self);
    fn lookup_failed(&self);
}

/// Orchestrates the resolver and the store.
///
/// One invocation per request; the only shared mutable state is inside the
/// store, so concurrent calls need no coordination here.
pub struct LookupService {
    resolver: Arc<dyn Resolver>,
    store: LookupStore,
    observer: Option<Arc<dyn LookupObserver>>,
}

impl LookupService {
    pub fn new(resolver: Arc<dyn Resolver>, store: LookupStore) -> Self {
        Self {
            resolver,
            store,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn LookupObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Resolve `domain` and upsert the result.
    ///
    /// Repeated calls for a domain whose resolution is stable converge to the
    /// same stored addresses while `lookup_time` advances each time. A failed
    /// resolution leaves the store untouched.
    pub async fn lookup_and_record(&self, domain: &str) -> Result<LookupRecord, ServiceError> {
        if domain.is_empty() {
            return Err(ServiceError::InvalidInput(
                "domain must not be empty".to_string(),
            ));
        }

        // Platform resolution blocks, so it runs on the blocking pool.
        let resolver = self.resolver.clone();
        let target = domain.to_string();
        let resolved = tokio::task::spawn_blocking(move || resolver.resolve(&target)).await?;

        let addresses = match resolved {
            Ok(addresses) => addresses,
            Err(e) => {
                tracing::warn!("resolution failed for {}: {}", domain, e);
                if let Some(ref observer) = self.observer {
                    observer.lookup_failed();
                }
                return Err(ServiceError::DomainNotResolvable(domain.to_string()));
            }
        };

        let record = self.store.upsert(domain, &addresses)?;
        tracing::info!(
            "recorded lookup for {} ({} addresses)",
            record.domain,
            record.addresses.len()
        );

        if let Some(ref observer) = self.observer {
            observer.lookup_succeeded();
        }
        Ok(record)
    }

    /// The recency window: up to `limit` records, most recent first.
    ///
    /// An empty store is a successful empty list, not an error.
    pub fn recent_history(&self, limit: usize) -> Result<Vec<LookupRecord>, ServiceError> {
        Ok(self.store.recent(limit)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::ResolveError;
    use std::net::Ipv4Addr;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;
    use tokio::time::{sleep, Duration};

    /// Resolver returning a configurable fixed address set.
    struct StaticResolver {
        addrs: Mutex<Vec<Ipv4Addr>>,
    }

    impl StaticResolver {
        fn returning(addrs: &[&str]) -> Self {
            Self {
                addrs: Mutex::new(addrs.iter().map(|a| a.parse().unwrap()).collect()),
            }
        }

        fn set(&self, addrs: &[&str]) {
            *self.addrs.lock().unwrap() = addrs.iter().map(|a| a.parse().unwrap()).collect();
        }
    }

    impl Resolver for StaticResolver {
        fn resolve(&self, _domain: &str) -> Result<Vec<Ipv4Addr>, ResolveError> {
            Ok(self.addrs.lock().unwrap().clone())
        }
    }

    struct FailingResolver;

    impl Resolver for FailingResolver {
        fn resolve(&self, domain: &str) -> Result<Vec<Ipv4Addr>, ResolveError> {
            Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("unknown host {}", domain),
            )
            .into())
        }
    }

    #[derive(Default)]
    struct CountingObserver {
        succeeded: AtomicU64,
        failed: AtomicU64,
    }

    impl LookupObserver for CountingObserver {
        fn lookup_succeeded(&self) {
            self.succeeded.fetch_add(1, Ordering::Relaxed);
        }
        fn lookup_failed(&self) {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn service_with(resolver: Arc<dyn Resolver>) -> LookupService {
        LookupService::new(resolver, LookupStore::open(":memory:").unwrap())
    }

    #[tokio::test]
    async fn test_empty_domain_is_invalid_input() {
        let service = service_with(Arc::new(StaticResolver::returning(&["1.2.3.4"])));

        let err = service.lookup_and_record("").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
        assert!(service.recent_history(20).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_resolution_failure_persists_nothing() {
        let service = service_with(Arc::new(FailingResolver));

        let err = service.lookup_and_record("down.example").await.unwrap_err();
        assert!(matches!(err, ServiceError::DomainNotResolvable(_)));
        assert!(service.recent_history(20).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lookup_creates_then_updates_same_record() {
        let resolver = Arc::new(StaticResolver::returning(&["93.184.216.34"]));
        let service = service_with(resolver.clone());

        let first = service.lookup_and_record("example.com").await.unwrap();
        assert_eq!(first.domain, "example.com");
        assert_eq!(first.addresses, vec!["93.184.216.34"]);

        resolver.set(&["93.184.216.35"]);
        sleep(Duration::from_millis(2)).await;
        let second = service.lookup_and_record("example.com").await.unwrap();

        assert_eq!(second.id, first.id);
        assert_eq!(second.addresses, vec!["93.184.216.35"]);
        assert!(second.lookup_time > first.lookup_time);

        let recent = service.recent_history(1).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].domain, "example.com");
    }

    #[tokio::test]
    async fn test_stable_resolution_converges() {
        let service = service_with(Arc::new(StaticResolver::returning(&["10.1.1.1"])));

        let mut previous = service.lookup_and_record("stable.example").await.unwrap();
        for _ in 0..3 {
            sleep(Duration::from_millis(2)).await;
            let next = service.lookup_and_record("stable.example").await.unwrap();
            assert_eq!(next.id, previous.id);
            assert_eq!(next.addresses, previous.addresses);
            assert!(next.lookup_time > previous.lookup_time);
            previous = next;
        }

        // Still exactly one record regardless of call count.
        assert_eq!(service.recent_history(20).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_observer_sees_outcomes() {
        let observer = Arc::new(CountingObserver::default());
        let ok_service = service_with(Arc::new(StaticResolver::returning(&["1.1.1.1"])))
            .with_observer(observer.clone());
        ok_service.lookup_and_record("up.example").await.unwrap();

        let failing =
            service_with(Arc::new(FailingResolver)).with_observer(observer.clone());
        let _ = failing.lookup_and_record("down.example").await;

        assert_eq!(observer.succeeded.load(Ordering::Relaxed), 1);
        assert_eq!(observer.failed.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_history_most_recent_first() {
        let service = service_with(Arc::new(StaticResolver::returning(&["1.1.1.1"])));

        for domain in ["a.example", "b.example", "c.example"] {
            service.lookup_and_record(domain).await.unwrap();
            sleep(Duration::from_millis(2)).await;
        }

        let recent = service.recent_history(2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].domain, "c.example");
        assert_eq!(recent[1].domain, "b.example");
    }
}
