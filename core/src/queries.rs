//! Resource queries: a cache key, the shared cache and a mapper.
//!
//! Each `use_*` method mounts a [`QueryHandle`] and pairs it with the mapper
//! for that resource. Mapping happens on read, so every observer of a key
//! shares one raw value in the cache.

use std::sync::Arc;

use serde_json::Value;

use crate::cache::{QueryCache, QueryHandle};
use crate::client::{BillFilter, BillingClient, RestFetcher};
use crate::config::{BillingConfig, CacheConfig};
use crate::error::ApiError;
use crate::http::Transport;
use crate::mappers::{self, MappedBill};
use crate::types::{BillableService, PaymentMode, ServiceConcept, ServiceType};

/// Mapped view of a query at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySnapshot<T> {
    pub data: T,
    /// Whether the cache holds any value for the key, as opposed to `data`
    /// being a mapper default.
    pub has_data: bool,
    pub is_loading: bool,
    pub is_validating: bool,
    pub error: Option<ApiError>,
}

/// A mounted query whose data is mapped to `T` on read.
pub struct Query<T> {
    handle: QueryHandle,
    map: fn(Option<&Value>) -> T,
}

impl<T> Query<T> {
    pub fn new(handle: QueryHandle, map: fn(Option<&Value>) -> T) -> Self {
        Self { handle, map }
    }

    pub fn data(&self) -> T {
        let raw = self.handle.data();
        (self.map)(raw.as_deref())
    }

    pub fn is_loading(&self) -> bool {
        self.handle.is_loading()
    }

    pub fn is_validating(&self) -> bool {
        self.handle.is_validating()
    }

    pub fn error(&self) -> Option<ApiError> {
        self.handle.error()
    }

    pub fn mutate(&self) {
        self.handle.mutate();
    }

    pub fn handle(&self) -> &QueryHandle {
        &self.handle
    }

    pub fn snapshot(&self) -> QuerySnapshot<T> {
        let state = self.handle.state();
        QuerySnapshot {
            data: (self.map)(state.data.as_deref()),
            has_data: state.data.is_some(),
            is_loading: state.is_loading,
            is_validating: state.is_validating,
            error: state.error,
        }
    }

    /// Wait for any running fetch to finish, then snapshot.
    pub async fn settled(&mut self) -> QuerySnapshot<T> {
        self.handle.settled().await;
        self.snapshot()
    }
}

impl Query<Vec<BillableService>> {
    pub fn billable_services(&self) -> Vec<BillableService> {
        self.data()
    }
}

impl Query<Vec<ServiceType>> {
    pub fn service_types(&self) -> Vec<ServiceType> {
        self.data()
    }
}

impl Query<Vec<PaymentMode>> {
    pub fn payment_modes(&self) -> Vec<PaymentMode> {
        self.data()
    }
}

impl Query<Vec<ServiceConcept>> {
    pub fn search_results(&self) -> Vec<ServiceConcept> {
        self.data()
    }

    /// False whenever the search is disabled by an empty term.
    pub fn is_searching(&self) -> bool {
        self.is_loading()
    }
}

impl Query<Vec<MappedBill>> {
    pub fn bills(&self) -> Vec<MappedBill> {
        self.data()
    }
}

impl Query<Option<MappedBill>> {
    pub fn bill(&self) -> Option<MappedBill> {
        self.data()
    }
}

/// Entry point for the billing resources.
#[derive(Clone)]
pub struct BillingQueries {
    client: BillingClient,
    cache: QueryCache,
}

impl BillingQueries {
    pub fn new(client: BillingClient, cache: QueryCache) -> Self {
        Self { client, cache }
    }

    /// Wire a client, a REST fetcher and a fresh cache over `transport`.
    pub fn connect(config: &BillingConfig, transport: Arc<dyn Transport>) -> Self {
        Self::connect_with(config, CacheConfig::default(), transport)
    }

    pub fn connect_with(
        config: &BillingConfig,
        cache_config: CacheConfig,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let client = BillingClient::from_config(config);
        let fetcher = RestFetcher::new(client.clone(), transport);
        let cache = QueryCache::with_config(Arc::new(fetcher), cache_config);
        Self::new(client, cache)
    }

    pub fn client(&self) -> &BillingClient {
        &self.client
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn use_billable_services(&self) -> Query<Vec<BillableService>> {
        let key = self.client.billable_services_key();
        Query::new(self.cache.query(Some(&key)), mappers::map_billable_services)
    }

    pub fn use_service_types(&self) -> Query<Vec<ServiceType>> {
        let key = self.client.service_types_key();
        Query::new(self.cache.query(Some(&key)), mappers::map_service_types)
    }

    pub fn use_payment_modes(&self) -> Query<Vec<PaymentMode>> {
        let key = self.client.payment_modes_key();
        Query::new(self.cache.query(Some(&key)), mappers::map_payment_modes)
    }

    /// A blank term mounts a disabled query: no request, empty results.
    pub fn use_concept_search(&self, term: &str) -> Query<Vec<ServiceConcept>> {
        let key = self.client.concept_search_key(term);
        Query::new(self.cache.query(key.as_deref()), mappers::map_search_results)
    }

    pub fn use_bills(&self, filter: &BillFilter) -> Query<Vec<MappedBill>> {
        let key = self.client.bills_key(filter);
        Query::new(self.cache.query(Some(&key)), mappers::map_bills)
    }

    /// A blank uuid mounts a disabled query.
    pub fn use_bill(&self, bill_uuid: &str) -> Query<Option<MappedBill>> {
        let key = (!bill_uuid.trim().is_empty()).then(|| self.client.bill_key(bill_uuid));
        Query::new(self.cache.query(key.as_deref()), mappers::map_bill)
    }
}
