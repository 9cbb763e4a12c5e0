//! Wire DTOs for the billing REST API.
//!
//! # Design
//! Response types are deliberately lenient: every field has a default and
//! JSON `null` is treated like an absent field, so a sparse or partially
//! expanded resource still deserializes. Request payloads are strict and
//! typed per endpoint; [`RequestBody`] tags which endpoint a payload targets.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ApiError;

/// Treat an explicit JSON `null` the same as a missing field.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// `{ uuid, display }` reference to another resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayRef {
    #[serde(deserialize_with = "nullable")]
    pub uuid: String,
    #[serde(deserialize_with = "nullable")]
    pub display: String,
}

/// `{ uuid, name }` reference, used for cash points and payment instance types.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NameRef {
    #[serde(deserialize_with = "nullable")]
    pub uuid: String,
    #[serde(deserialize_with = "nullable")]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServicePrice {
    #[serde(deserialize_with = "nullable")]
    pub uuid: String,
    #[serde(deserialize_with = "nullable")]
    pub name: String,
    #[serde(deserialize_with = "nullable")]
    pub price: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BillableService {
    #[serde(deserialize_with = "nullable")]
    pub uuid: String,
    #[serde(deserialize_with = "nullable")]
    pub name: String,
    #[serde(deserialize_with = "nullable")]
    pub short_name: String,
    #[serde(deserialize_with = "nullable")]
    pub service_status: String,
    #[serde(deserialize_with = "nullable")]
    pub service_type: DisplayRef,
    #[serde(deserialize_with = "nullable")]
    pub service_prices: Vec<ServicePrice>,
}

/// Member of the service-types concept set.
pub type ServiceType = DisplayRef;

/// A concept search hit. Some servers nest the matched concept, others
/// return it flat; `concept_uuid` resolves either shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConcept {
    #[serde(deserialize_with = "nullable")]
    pub uuid: String,
    #[serde(deserialize_with = "nullable")]
    pub display: String,
    pub concept: Option<DisplayRef>,
}

impl ServiceConcept {
    pub fn concept_uuid(&self) -> &str {
        match &self.concept {
            Some(concept) if !concept.uuid.is_empty() => &concept.uuid,
            _ => &self.uuid,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentMode {
    #[serde(deserialize_with = "nullable")]
    pub uuid: String,
    #[serde(deserialize_with = "nullable")]
    pub name: String,
    #[serde(deserialize_with = "nullable")]
    pub description: String,
    #[serde(deserialize_with = "nullable")]
    pub retired: bool,
}

/// Status shared by bills and their line items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillStatus {
    #[default]
    Pending,
    Posted,
    Paid,
    Credited,
    Cancelled,
    Adjusted,
    Exempted,
    #[serde(other)]
    Unknown,
}

impl BillStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillStatus::Pending => "PENDING",
            BillStatus::Posted => "POSTED",
            BillStatus::Paid => "PAID",
            BillStatus::Credited => "CREDITED",
            BillStatus::Cancelled => "CANCELLED",
            BillStatus::Adjusted => "ADJUSTED",
            BillStatus::Exempted => "EXEMPTED",
            BillStatus::Unknown => "UNKNOWN",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LineItem {
    #[serde(deserialize_with = "nullable")]
    pub uuid: String,
    /// Usually `"<uuid>:<name>"`; absent for stock items.
    pub billable_service: Option<String>,
    /// Stock item reference, used when `billable_service` is absent.
    pub item: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub price: Decimal,
    /// Absent means one unit.
    pub quantity: Option<Decimal>,
    #[serde(deserialize_with = "nullable")]
    pub price_name: String,
    #[serde(deserialize_with = "nullable")]
    pub payment_status: BillStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Payment {
    #[serde(deserialize_with = "nullable")]
    pub uuid: String,
    #[serde(deserialize_with = "nullable")]
    pub amount: Decimal,
    #[serde(deserialize_with = "nullable")]
    pub amount_tendered: Decimal,
    #[serde(deserialize_with = "nullable")]
    pub instance_type: NameRef,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Visit {
    #[serde(deserialize_with = "nullable")]
    pub uuid: String,
    #[serde(deserialize_with = "nullable")]
    pub visit_type: DisplayRef,
}

/// A bill as the cashier endpoint returns it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Bill {
    #[serde(deserialize_with = "nullable")]
    pub uuid: String,
    pub id: Option<i64>,
    /// `display` reads `"<identifier> - <name>"`.
    #[serde(deserialize_with = "nullable")]
    pub patient: DisplayRef,
    pub visit: Option<Visit>,
    #[serde(deserialize_with = "nullable")]
    pub date_created: String,
    #[serde(deserialize_with = "nullable")]
    pub status: BillStatus,
    #[serde(deserialize_with = "nullable")]
    pub receipt_number: String,
    #[serde(deserialize_with = "nullable")]
    pub cash_point: NameRef,
    #[serde(deserialize_with = "nullable")]
    pub line_items: Vec<LineItem>,
    #[serde(deserialize_with = "nullable")]
    pub payments: Vec<Payment>,
}

// ---------------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceStatus {
    #[default]
    Enabled,
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewServicePrice {
    /// Payment mode uuid.
    pub payment_mode: String,
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
}

/// Body of `POST /cashier/api/billable-service`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBillableService {
    pub name: String,
    pub short_name: String,
    /// Service type concept uuid.
    pub service_type: String,
    pub service_prices: Vec<NewServicePrice>,
    pub service_status: ServiceStatus,
    /// Concept uuid picked from a concept search.
    pub concept: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemUpdate {
    pub uuid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billable_service: Option<String>,
    #[serde(with = "rust_decimal::serde::float")]
    pub quantity: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub price_name: String,
    pub payment_status: BillStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPayment {
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount_tendered: Decimal,
    /// Payment mode uuid.
    pub instance_type: String,
}

/// Body of `POST /cashier/bill/{uuid}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillPayment {
    pub cash_point: String,
    pub cashier: String,
    pub patient: String,
    pub status: BillStatus,
    pub line_items: Vec<LineItemUpdate>,
    pub payments: Vec<NewPayment>,
}

/// A POST body tagged with the endpoint it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    CreateBillableService(CreateBillableService),
    BillPayment { bill_uuid: String, payment: BillPayment },
}

impl RequestBody {
    /// Path relative to the API base url.
    pub fn path(&self) -> String {
        match self {
            RequestBody::CreateBillableService(_) => "/cashier/api/billable-service".to_string(),
            RequestBody::BillPayment { bill_uuid, .. } => format!("/cashier/bill/{bill_uuid}"),
        }
    }

    pub fn to_json(&self) -> Result<String, ApiError> {
        let encoded = match self {
            RequestBody::CreateBillableService(payload) => serde_json::to_string(payload),
            RequestBody::BillPayment { payment, .. } => serde_json::to_string(payment),
        };
        encoded.map_err(|e| ApiError::SerializationError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn billable_service_tolerates_nulls_and_missing_fields() {
        let service: BillableService = serde_json::from_str(
            r#"{"uuid":"s1","name":"X-Ray","shortName":null,"servicePrices":null}"#,
        )
        .unwrap();
        assert_eq!(service.name, "X-Ray");
        assert_eq!(service.short_name, "");
        assert!(service.service_prices.is_empty());
        assert_eq!(service.service_type, DisplayRef::default());
    }

    #[test]
    fn prices_accept_numbers_and_strings() {
        let prices: Vec<ServicePrice> =
            serde_json::from_str(r#"[{"price":100},{"price":"12.50"},{"price":7.5}]"#).unwrap();
        assert_eq!(prices[0].price, dec!(100));
        assert_eq!(prices[1].price, dec!(12.50));
        assert_eq!(prices[2].price, dec!(7.5));
    }

    #[test]
    fn unknown_status_does_not_fail() {
        let item: LineItem = serde_json::from_str(r#"{"paymentStatus":"REFUNDED"}"#).unwrap();
        assert_eq!(item.payment_status, BillStatus::Unknown);
        let item: LineItem = serde_json::from_str(r#"{"paymentStatus":null}"#).unwrap();
        assert_eq!(item.payment_status, BillStatus::Pending);
    }

    #[test]
    fn concept_uuid_prefers_nested_concept() {
        let nested: ServiceConcept = serde_json::from_str(
            r#"{"uuid":"hit","display":"Blood","concept":{"uuid":"c-1","display":"Blood"}}"#,
        )
        .unwrap();
        assert_eq!(nested.concept_uuid(), "c-1");
        let flat: ServiceConcept = serde_json::from_str(r#"{"uuid":"c-2","display":"Urine"}"#).unwrap();
        assert_eq!(flat.concept_uuid(), "c-2");
    }

    #[test]
    fn create_billable_service_serializes_camel_case_with_numeric_price() {
        let body = RequestBody::CreateBillableService(CreateBillableService {
            name: "Lab test".to_string(),
            short_name: "LT".to_string(),
            service_type: "type-uuid".to_string(),
            service_prices: vec![NewServicePrice {
                payment_mode: "cash-uuid".to_string(),
                name: "Cash".to_string(),
                price: dec!(250),
            }],
            service_status: ServiceStatus::Enabled,
            concept: "concept-uuid".to_string(),
        });
        assert_eq!(body.path(), "/cashier/api/billable-service");
        let json: serde_json::Value = serde_json::from_str(&body.to_json().unwrap()).unwrap();
        assert_eq!(json["shortName"], "LT");
        assert_eq!(json["serviceStatus"], "ENABLED");
        assert_eq!(json["servicePrices"][0]["paymentMode"], "cash-uuid");
        assert_eq!(json["servicePrices"][0]["price"], 250.0);
    }

    #[test]
    fn bill_payment_targets_its_bill() {
        let body = RequestBody::BillPayment {
            bill_uuid: "bill-1".to_string(),
            payment: BillPayment {
                cash_point: "cp".to_string(),
                cashier: "provider".to_string(),
                patient: "patient".to_string(),
                status: BillStatus::Paid,
                line_items: Vec::new(),
                payments: vec![NewPayment {
                    amount: dec!(200),
                    amount_tendered: dec!(200),
                    instance_type: "cash-uuid".to_string(),
                }],
            },
        };
        assert_eq!(body.path(), "/cashier/bill/bill-1");
        let json: serde_json::Value = serde_json::from_str(&body.to_json().unwrap()).unwrap();
        assert_eq!(json["status"], "PAID");
        assert_eq!(json["payments"][0]["amountTendered"], 200.0);
    }
}
