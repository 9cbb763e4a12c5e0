//! Data layer for the billing module of a hospital information system.
//!
//! # Overview
//! Fetches billable services, service types, payment modes, concept search
//! results and bills from the billing REST API, caches them by request url,
//! and maps the nested JSON into flat records for display.
//!
//! # Design
//! - `BillingClient` builds `HttpRequest` values and parses `HttpResponse`
//!   values; an injected `Transport` does the I/O (host-does-IO pattern).
//! - `QueryCache` deduplicates in-flight fetches per key, serves stale data
//!   while revalidating, and lets the most recently requested fetch win.
//! - Mappers are pure and never fail; absent lists become empty.
//! - Mutation helpers POST and leave cache revalidation to the caller.
//! - `views` turns query snapshots into table and invoice view models.

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod mappers;
pub mod mutations;
pub mod queries;
pub mod transport;
pub mod types;
pub mod views;

pub use cache::{Fetcher, QueryCache, QueryHandle, QueryState};
pub use client::{BillFilter, BillingClient, RestFetcher};
pub use config::{BillingConfig, CacheConfig};
pub use error::ApiError;
pub use http::{Envelope, HttpMethod, HttpRequest, HttpResponse, Transport};
pub use mappers::{MappedBill, MappedLineItem};
pub use mutations::BillingMutations;
pub use queries::{BillingQueries, Query, QuerySnapshot};
pub use transport::HttpTransport;
pub use types::{
    Bill, BillPayment, BillStatus, BillableService, CreateBillableService, LineItem,
    NewPayment, NewServicePrice, PaymentMode, RequestBody, ServiceConcept, ServiceStatus,
    ServiceType,
};
pub use views::{BillsTable, InvoiceView, Pagination};
