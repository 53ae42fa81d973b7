//! Multi-tenant routing integration tests: cache population under
//! concurrency, per-tenant isolation and aggregate close reporting.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_test::assert_ok;
use tokio::sync::Barrier;

use aquifer_core::datasource::{Connection, DataSource, DataSourceError};
use aquifer_tenancy::router::{MultiTenantDataSource, RoutingError};
use aquifer_tenancy::strategy::{FixedTenantResolver, TenantDataSourceProvider};

struct MarkedConnection {
    data_source_id: usize,
}

#[async_trait]
impl Connection for MarkedConnection {
    async fn execute(&mut self, _sql: &str) -> Result<u64, DataSourceError> {
        Ok(self.data_source_id as u64)
    }
}

/// Data source carrying a unique id so tests can tell which underlying
/// instance served a connection.
struct MarkedDataSource {
    id: usize,
    fail_close: bool,
    closed: AtomicUsize,
}

impl MarkedDataSource {
    fn new(id: usize) -> Self {
        Self {
            id,
            fail_close: false,
            closed: AtomicUsize::new(0),
        }
    }

    fn failing_close(id: usize) -> Self {
        Self {
            id,
            fail_close: true,
            closed: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl DataSource for MarkedDataSource {
    async fn connection(&self) -> Result<Box<dyn Connection>, DataSourceError> {
        Ok(Box::new(MarkedConnection {
            data_source_id: self.id,
        }))
    }

    async fn close(&self) -> Result<(), DataSourceError> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err(DataSourceError::Close(format!(
                "data source {} refused to close",
                self.id
            )));
        }
        Ok(())
    }
}

/// Provider that counts invocations per tenant id and hands out uniquely
/// identified data sources.
struct CountingProvider {
    invocations: Mutex<HashMap<String, usize>>,
    next_id: AtomicUsize,
}

impl CountingProvider {
    fn new() -> Self {
        Self {
            invocations: Mutex::new(HashMap::new()),
            next_id: AtomicUsize::new(0),
        }
    }

    fn invocations_for(&self, tenant_id: &str) -> usize {
        self.invocations
            .lock()
            .get(tenant_id)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl TenantDataSourceProvider for CountingProvider {
    async fn data_source_for(
        &self,
        tenant_id: Option<&str>,
    ) -> Result<Option<Arc<dyn DataSource>>, DataSourceError> {
        let key = tenant_id.unwrap_or("<none>").to_string();
        *self.invocations.lock().entry(key).or_insert(0) += 1;
        // yield so concurrent callers pile up on the same cache entry
        tokio::task::yield_now().await;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(Some(Arc::new(MarkedDataSource::new(id))))
    }
}

async fn connection_mark(router: &MultiTenantDataSource) -> u64 {
    let mut connection = router.get_connection().await.unwrap();
    connection.execute("SELECT 1").await.unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_at_most_once_build_per_tenant_under_concurrency() {
    const CALLERS: usize = 16;

    let provider = Arc::new(CountingProvider::new());
    let router = Arc::new(
        MultiTenantDataSource::builder()
            .resolver(Arc::new(FixedTenantResolver::new("unseen")))
            .provider(Arc::clone(&provider) as Arc<dyn TenantDataSourceProvider>)
            .build(),
    );

    let barrier = Arc::new(Barrier::new(CALLERS));
    let mut handles = Vec::with_capacity(CALLERS);
    for _ in 0..CALLERS {
        let router = Arc::clone(&router);
        let barrier = Arc::clone(&barrier);
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            connection_mark(&router).await
        }));
    }

    let mut marks = Vec::with_capacity(CALLERS);
    for handle in handles {
        marks.push(handle.await.unwrap());
    }

    // exactly one provider invocation, and every caller got a connection
    // from the same underlying data source
    assert_eq!(provider.invocations_for("unseen"), 1);
    assert!(marks.iter().all(|mark| *mark == marks[0]));
}

#[tokio::test]
async fn test_reset_single_tenant_leaves_others_cached() {
    let provider = Arc::new(CountingProvider::new());

    let current = Arc::new(Mutex::new(Some("T1".to_string())));
    let resolver_state = Arc::clone(&current);
    let resolver = move || resolver_state.lock().clone();

    let router = MultiTenantDataSource::builder()
        .resolver(Arc::new(resolver))
        .provider(Arc::clone(&provider) as Arc<dyn TenantDataSourceProvider>)
        .build();

    let t1_mark = connection_mark(&router).await;
    *current.lock() = Some("T2".to_string());
    let t2_mark = connection_mark(&router).await;
    assert_ne!(t1_mark, t2_mark);
    assert_eq!(provider.invocations_for("T1"), 1);
    assert_eq!(provider.invocations_for("T2"), 1);

    router.reset_tenant(Some("T1"));

    // T1 rebuilds, T2 stays cached
    *current.lock() = Some("T1".to_string());
    let t1_rebuilt = connection_mark(&router).await;
    assert_ne!(t1_rebuilt, t1_mark);
    assert_eq!(provider.invocations_for("T1"), 2);

    *current.lock() = Some("T2".to_string());
    let t2_again = connection_mark(&router).await;
    assert_eq!(t2_again, t2_mark);
    assert_eq!(provider.invocations_for("T2"), 1);
}

#[tokio::test]
async fn test_reset_all_rebuilds_every_tenant() {
    let provider = Arc::new(CountingProvider::new());

    let current = Arc::new(Mutex::new(Some("T1".to_string())));
    let resolver_state = Arc::clone(&current);
    let resolver = move || resolver_state.lock().clone();

    let router = MultiTenantDataSource::builder()
        .resolver(Arc::new(resolver))
        .provider(Arc::clone(&provider) as Arc<dyn TenantDataSourceProvider>)
        .build();

    connection_mark(&router).await;
    *current.lock() = Some("T2".to_string());
    connection_mark(&router).await;

    router.reset();

    connection_mark(&router).await;
    *current.lock() = Some("T1".to_string());
    connection_mark(&router).await;

    assert_eq!(provider.invocations_for("T1"), 2);
    assert_eq!(provider.invocations_for("T2"), 2);
}

/// Provider handing out pre-built data sources keyed by tenant id.
struct StaticProvider {
    data_sources: HashMap<String, Arc<MarkedDataSource>>,
}

#[async_trait]
impl TenantDataSourceProvider for StaticProvider {
    async fn data_source_for(
        &self,
        tenant_id: Option<&str>,
    ) -> Result<Option<Arc<dyn DataSource>>, DataSourceError> {
        Ok(tenant_id
            .and_then(|id| self.data_sources.get(id))
            .map(|ds| Arc::clone(ds) as Arc<dyn DataSource>))
    }
}

#[tokio::test]
async fn test_close_aggregates_every_failure_and_still_closes_the_rest() {
    let healthy = Arc::new(MarkedDataSource::new(0));
    let broken_one = Arc::new(MarkedDataSource::failing_close(1));
    let broken_two = Arc::new(MarkedDataSource::failing_close(2));

    let mut data_sources: HashMap<String, Arc<MarkedDataSource>> = HashMap::new();
    data_sources.insert("healthy".to_string(), Arc::clone(&healthy));
    data_sources.insert("broken-1".to_string(), Arc::clone(&broken_one));
    data_sources.insert("broken-2".to_string(), Arc::clone(&broken_two));

    let current = Arc::new(Mutex::new(Some("healthy".to_string())));
    let resolver_state = Arc::clone(&current);
    let resolver = move || resolver_state.lock().clone();

    let router = MultiTenantDataSource::builder()
        .resolver(Arc::new(resolver))
        .provider(Arc::new(StaticProvider { data_sources }))
        .build();

    for tenant in ["healthy", "broken-1", "broken-2"] {
        *current.lock() = Some(tenant.to_string());
        router.get_connection().await.unwrap();
    }

    let err = router.close().await.unwrap_err();
    let RoutingError::Close { causes } = err else {
        panic!("expected an aggregate close error");
    };
    assert_eq!(causes.len(), 2);
    let joined = causes.join("; ");
    assert!(joined.contains("data source 1 refused to close"));
    assert!(joined.contains("data source 2 refused to close"));

    // every cached data source was attempted, including the healthy one
    assert_eq!(healthy.closed.load(Ordering::SeqCst), 1);
    assert_eq!(broken_one.closed.load(Ordering::SeqCst), 1);
    assert_eq!(broken_two.closed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_close_succeeds_when_all_data_sources_close() {
    let healthy = Arc::new(MarkedDataSource::new(0));
    let mut data_sources: HashMap<String, Arc<MarkedDataSource>> = HashMap::new();
    data_sources.insert("healthy".to_string(), Arc::clone(&healthy));

    let router = MultiTenantDataSource::builder()
        .resolver(Arc::new(FixedTenantResolver::new("healthy")))
        .provider(Arc::new(StaticProvider { data_sources }))
        .build();

    router.get_connection().await.unwrap();
    tokio_test::assert_ok!(router.close().await);
    assert_eq!(healthy.closed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_provider_failure_is_retried_on_next_call() {
    struct FlakyProvider {
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl TenantDataSourceProvider for FlakyProvider {
        async fn data_source_for(
            &self,
            _tenant_id: Option<&str>,
        ) -> Result<Option<Arc<dyn DataSource>>, DataSourceError> {
            if self.attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(DataSourceError::Connection("transient".to_string()));
            }
            Ok(Some(Arc::new(MarkedDataSource::new(7))))
        }
    }

    let router = MultiTenantDataSource::builder()
        .resolver(Arc::new(FixedTenantResolver::new("flaky")))
        .provider(Arc::new(FlakyProvider {
            attempts: AtomicUsize::new(0),
        }))
        .build();

    let err = router.get_connection().await.unwrap_err();
    assert!(matches!(err, RoutingError::Provider { .. }));

    // the failed build was not cached; the second call succeeds
    assert_eq!(connection_mark(&router).await, 7);
}
