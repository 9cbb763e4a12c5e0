//! Request builder and response parser for the billing API.
//!
//! # Design
//! `BillingClient` holds only the base url and the service-types concept
//! uuid, and carries no mutable state between calls. Every GET resource is
//! addressed by a cache key (the absolute request url) produced by a
//! `*_key` method; `build_get` turns a key into an `HttpRequest`. POSTs are
//! built from a tagged [`RequestBody`]. The caller (a [`Transport`]) executes
//! the round-trip, keeping this module deterministic.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::cache::Fetcher;
use crate::config::BillingConfig;
use crate::error::ApiError;
use crate::http::{Envelope, HttpMethod, HttpRequest, HttpResponse, Transport};
use crate::types::{BillStatus, RequestBody};

const BILLABLE_SERVICE_VIEW: &str =
    "custom:(uuid,name,shortName,serviceStatus,serviceType:(display),servicePrices:(uuid,name,price))";
const SERVICE_TYPES_VIEW: &str = "custom:(setMembers:(uuid,display))";

/// Optional filters for the bill list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BillFilter {
    pub patient_uuid: Option<String>,
    pub status: Option<BillStatus>,
}

/// Stateless client for the billing API.
#[derive(Debug, Clone)]
pub struct BillingClient {
    base_url: String,
    service_types_concept: String,
}

impl BillingClient {
    pub fn new(base_url: &str, service_types_concept: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            service_types_concept: service_types_concept.to_string(),
        }
    }

    pub fn from_config(config: &BillingConfig) -> Self {
        Self::new(&config.base_url, &config.service_types_concept_uuid)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // -----------------------------------------------------------------------
    // Cache keys
    // -----------------------------------------------------------------------

    pub fn billable_services_key(&self) -> String {
        format!("{}/billableService?v={BILLABLE_SERVICE_VIEW}", self.base_url)
    }

    pub fn service_types_key(&self) -> String {
        format!(
            "{}/concept/{}?v={SERVICE_TYPES_VIEW}",
            self.base_url, self.service_types_concept
        )
    }

    pub fn payment_modes_key(&self) -> String {
        format!("{}/cashier/paymentMode?v=full", self.base_url)
    }

    /// `None` for an empty or whitespace-only term: there is nothing to search.
    pub fn concept_search_key(&self, term: &str) -> Option<String> {
        let term = term.trim();
        if term.is_empty() {
            return None;
        }
        Some(format!(
            "{}/conceptsearch?q={}",
            self.base_url,
            urlencoding::encode(term)
        ))
    }

    pub fn bills_key(&self, filter: &BillFilter) -> String {
        let mut key = format!("{}/cashier/bill?v=full", self.base_url);
        if let Some(patient_uuid) = &filter.patient_uuid {
            key.push_str("&patientUuid=");
            key.push_str(&urlencoding::encode(patient_uuid));
        }
        if let Some(status) = filter.status {
            key.push_str("&status=");
            key.push_str(status.as_str());
        }
        key
    }

    pub fn bill_key(&self, bill_uuid: &str) -> String {
        format!(
            "{}/cashier/bill/{}?v=full",
            self.base_url,
            urlencoding::encode(bill_uuid)
        )
    }

    // -----------------------------------------------------------------------
    // Requests
    // -----------------------------------------------------------------------

    /// GET request for a key produced by one of the `*_key` methods.
    pub fn build_get(&self, key: &str) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            path: key.to_string(),
            headers: vec![("accept".to_string(), "application/json".to_string())],
            body: None,
        }
    }

    pub fn build_post(&self, body: &RequestBody) -> Result<HttpRequest, ApiError> {
        Ok(HttpRequest {
            method: HttpMethod::Post,
            path: format!("{}{}", self.base_url, body.path()),
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: Some(body.to_json()?),
        })
    }

    // -----------------------------------------------------------------------
    // Responses
    // -----------------------------------------------------------------------

    /// Parse a GET response into its envelope. Any 2xx is success; an empty
    /// body (e.g. 204) becomes `null`.
    pub fn parse_envelope(&self, response: HttpResponse) -> Result<Envelope<Value>, ApiError> {
        check_status(&response, |status| (200..300).contains(&status))?;
        Ok(Envelope {
            data: parse_json(&response.body)?,
        })
    }

    /// Parse a POST response. Servers answer 201 for creations and 200 for updates.
    pub fn parse_created(&self, response: HttpResponse) -> Result<Value, ApiError> {
        check_status(&response, |status| matches!(status, 200 | 201))?;
        parse_json(&response.body)
    }
}

fn parse_json(body: &str) -> Result<Value, ApiError> {
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(body).map_err(|e| ApiError::DeserializationError(e.to_string()))
}

/// Map non-success status codes to the appropriate `ApiError` variant.
fn check_status(response: &HttpResponse, accepted: impl Fn(u16) -> bool) -> Result<(), ApiError> {
    if accepted(response.status) {
        return Ok(());
    }
    if response.status == 404 {
        return Err(ApiError::NotFound);
    }
    Err(ApiError::HttpError {
        status: response.status,
        body: response.body.clone(),
    })
}

/// [`Fetcher`] that GETs the key through a [`Transport`].
#[derive(Clone)]
pub struct RestFetcher {
    client: BillingClient,
    transport: Arc<dyn Transport>,
}

impl RestFetcher {
    pub fn new(client: BillingClient, transport: Arc<dyn Transport>) -> Self {
        Self { client, transport }
    }
}

#[async_trait]
impl Fetcher for RestFetcher {
    async fn fetch(&self, key: &str) -> Result<Value, ApiError> {
        let response = self.transport.execute(self.client.build_get(key)).await?;
        Ok(self.client.parse_envelope(response)?.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CreateBillableService, ServiceStatus};

    fn client() -> BillingClient {
        BillingClient::new("http://localhost:3000", "types-set")
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    #[test]
    fn billable_services_key_selects_custom_view() {
        assert_eq!(
            client().billable_services_key(),
            "http://localhost:3000/billableService?v=custom:(uuid,name,shortName,serviceStatus,serviceType:(display),servicePrices:(uuid,name,price))"
        );
    }

    #[test]
    fn service_types_key_uses_configured_concept_set() {
        assert_eq!(
            client().service_types_key(),
            "http://localhost:3000/concept/types-set?v=custom:(setMembers:(uuid,display))"
        );
    }

    #[test]
    fn concept_search_key_is_none_for_blank_terms() {
        assert_eq!(client().concept_search_key(""), None);
        assert_eq!(client().concept_search_key("   "), None);
    }

    #[test]
    fn concept_search_key_encodes_term() {
        assert_eq!(
            client().concept_search_key(" full blood count ").as_deref(),
            Some("http://localhost:3000/conceptsearch?q=full%20blood%20count")
        );
    }

    #[test]
    fn bills_key_appends_filters() {
        let c = client();
        assert_eq!(c.bills_key(&BillFilter::default()), "http://localhost:3000/cashier/bill?v=full");
        let filter = BillFilter {
            patient_uuid: Some("p-1".to_string()),
            status: Some(BillStatus::Pending),
        };
        assert_eq!(
            c.bills_key(&filter),
            "http://localhost:3000/cashier/bill?v=full&patientUuid=p-1&status=PENDING"
        );
    }

    #[test]
    fn build_get_uses_key_verbatim() {
        let c = client();
        let key = c.payment_modes_key();
        let req = c.build_get(&key);
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.path, "http://localhost:3000/cashier/paymentMode?v=full");
        assert!(req.body.is_none());
    }

    #[test]
    fn build_post_produces_json_request() {
        let body = RequestBody::CreateBillableService(CreateBillableService {
            name: "Consultation".to_string(),
            short_name: "CONS".to_string(),
            service_type: "type".to_string(),
            service_prices: Vec::new(),
            service_status: ServiceStatus::Enabled,
            concept: "concept".to_string(),
        });
        let req = client().build_post(&body).unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.path, "http://localhost:3000/cashier/api/billable-service");
        assert_eq!(
            req.headers,
            vec![("content-type".to_string(), "application/json".to_string())]
        );
        let json: Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(json["name"], "Consultation");
    }

    #[test]
    fn parse_envelope_wraps_body() {
        let envelope = client()
            .parse_envelope(response(200, r#"{"results":[]}"#))
            .unwrap();
        assert_eq!(envelope.data["results"], serde_json::json!([]));
    }

    #[test]
    fn parse_envelope_empty_body_is_null() {
        let envelope = client().parse_envelope(response(200, "")).unwrap();
        assert!(envelope.data.is_null());
    }

    #[test]
    fn parse_envelope_accepts_any_2xx() {
        let envelope = client().parse_envelope(response(204, "")).unwrap();
        assert!(envelope.data.is_null());
        let envelope = client()
            .parse_envelope(response(203, r#"{"results":[]}"#))
            .unwrap();
        assert_eq!(envelope.data["results"], serde_json::json!([]));
        let err = client().parse_envelope(response(302, "")).unwrap_err();
        assert!(matches!(err, ApiError::HttpError { status: 302, .. }));
    }

    #[test]
    fn parse_envelope_not_found() {
        let err = client().parse_envelope(response(404, "")).unwrap_err();
        assert!(matches!(err, ApiError::NotFound));
    }

    #[test]
    fn parse_envelope_server_error() {
        let err = client().parse_envelope(response(500, "boom")).unwrap_err();
        assert!(matches!(err, ApiError::HttpError { status: 500, .. }));
    }

    #[test]
    fn parse_envelope_bad_json() {
        let err = client().parse_envelope(response(200, "not json")).unwrap_err();
        assert!(matches!(err, ApiError::DeserializationError(_)));
    }

    #[test]
    fn parse_created_accepts_200_and_201() {
        assert!(client().parse_created(response(201, r#"{"uuid":"x"}"#)).is_ok());
        assert!(client().parse_created(response(200, r#"{"uuid":"x"}"#)).is_ok());
        let err = client().parse_created(response(400, "invalid")).unwrap_err();
        assert!(matches!(err, ApiError::HttpError { status: 400, .. }));
    }

    #[test]
    fn trailing_slash_is_stripped() {
        let c = BillingClient::new("http://localhost:3000/", "set");
        assert_eq!(c.payment_modes_key(), "http://localhost:3000/cashier/paymentMode?v=full");
    }
}
