//! Pure projections from raw response JSON to UI-ready records.
//!
//! Mappers never fail: a missing envelope, a missing or non-array list
//! field, or a malformed item all degrade to empty values. Malformed list
//! items are skipped and logged at debug level.

use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::types::{
    Bill, BillStatus, BillableService, LineItem, Payment, PaymentMode, ServiceConcept, ServiceType,
};

/// A line item with its derived total and display name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappedLineItem {
    pub uuid: String,
    pub display: String,
    pub price_name: String,
    pub price: Decimal,
    pub quantity: Decimal,
    pub line_total: Decimal,
    pub payment_status: BillStatus,
}

impl MappedLineItem {
    pub fn is_paid(&self) -> bool {
        self.payment_status == BillStatus::Paid
    }
}

/// Flat view of a bill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappedBill {
    pub uuid: String,
    pub id: Option<i64>,
    pub patient_uuid: String,
    pub patient_name: String,
    pub identifier: String,
    pub visit_type: String,
    pub date_created: String,
    pub status: BillStatus,
    pub receipt_number: String,
    pub cash_point: String,
    /// Line item names joined by a space.
    pub billing_service: String,
    pub line_items: Vec<MappedLineItem>,
    pub paid_items: Vec<MappedLineItem>,
    pub unpaid_items: Vec<MappedLineItem>,
    pub payments: Vec<Payment>,
    pub total_amount: Decimal,
    pub tendered_amount: Decimal,
    pub unpaid_total: Decimal,
}

fn list_field<T: DeserializeOwned>(data: Option<&Value>, field: &str) -> Vec<T> {
    let Some(items) = data.and_then(|data| data.get(field)).and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match T::deserialize(item) {
            Ok(value) => Some(value),
            Err(err) => {
                debug!(field, error = %err, "skipping malformed item");
                None
            }
        })
        .collect()
}

pub fn map_billable_services(data: Option<&Value>) -> Vec<BillableService> {
    list_field(data, "results")
}

pub fn map_service_types(data: Option<&Value>) -> Vec<ServiceType> {
    list_field(data, "setMembers")
}

pub fn map_payment_modes(data: Option<&Value>) -> Vec<PaymentMode> {
    list_field(data, "results")
}

pub fn map_search_results(data: Option<&Value>) -> Vec<ServiceConcept> {
    list_field(data, "results")
}

pub fn map_bills(data: Option<&Value>) -> Vec<MappedBill> {
    list_field::<Bill>(data, "results")
        .iter()
        .map(map_bill_properties)
        .collect()
}

/// Single-bill endpoint. `None` when there is no data or it is not an object.
pub fn map_bill(data: Option<&Value>) -> Option<MappedBill> {
    let data = data.filter(|data| data.is_object())?;
    match Bill::deserialize(data) {
        Ok(bill) => Some(map_bill_properties(&bill)),
        Err(err) => {
            debug!(error = %err, "malformed bill");
            None
        }
    }
}

/// `price * quantity`, with an absent quantity counting as one. Saturates
/// at the `Decimal` bounds instead of overflowing.
pub fn line_total(item: &LineItem) -> Decimal {
    let quantity = item.quantity.unwrap_or(Decimal::ONE);
    item.price.checked_mul(quantity).unwrap_or_else(|| {
        debug!(uuid = %item.uuid, price = %item.price, %quantity, "line total overflowed");
        item.price.saturating_mul(quantity)
    })
}

/// Sum of `amounts`, saturating at the `Decimal` bounds.
pub fn saturating_sum(amounts: impl IntoIterator<Item = Decimal>) -> Decimal {
    amounts.into_iter().fold(Decimal::ZERO, |total, amount| {
        total.checked_add(amount).unwrap_or_else(|| {
            debug!(%total, %amount, "total overflowed");
            total.saturating_add(amount)
        })
    })
}

/// Name of the billed service or stock item, without its `uuid:` prefix.
pub fn line_item_display(item: &LineItem) -> String {
    let reference = item
        .billable_service
        .as_deref()
        .filter(|s| !s.is_empty())
        .or(item.item.as_deref())
        .unwrap_or_default();
    match reference.split_once(':') {
        Some((_, name)) => name.trim().to_string(),
        None => reference.trim().to_string(),
    }
}

/// Split a patient display of the form `"<identifier> - <name>"`.
fn split_patient_display(display: &str) -> (String, String) {
    match display.split_once(" - ") {
        Some((identifier, name)) => (identifier.trim().to_string(), name.trim().to_string()),
        None => (String::new(), display.trim().to_string()),
    }
}

fn map_line_item(item: &LineItem) -> MappedLineItem {
    MappedLineItem {
        uuid: item.uuid.clone(),
        display: line_item_display(item),
        price_name: item.price_name.clone(),
        price: item.price,
        quantity: item.quantity.unwrap_or(Decimal::ONE),
        line_total: line_total(item),
        payment_status: item.payment_status,
    }
}

pub fn map_bill_properties(bill: &Bill) -> MappedBill {
    let (identifier, patient_name) = split_patient_display(&bill.patient.display);
    let line_items: Vec<MappedLineItem> = bill.line_items.iter().map(map_line_item).collect();
    let (paid_items, unpaid_items): (Vec<_>, Vec<_>) =
        line_items.iter().cloned().partition(MappedLineItem::is_paid);

    let total_amount = saturating_sum(line_items.iter().map(|item| item.line_total));
    let unpaid_total = saturating_sum(unpaid_items.iter().map(|item| item.line_total));
    let tendered_amount = saturating_sum(bill.payments.iter().map(|p| p.amount_tendered));
    let billing_service = line_items
        .iter()
        .map(|item| item.display.as_str())
        .filter(|display| !display.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    MappedBill {
        uuid: bill.uuid.clone(),
        id: bill.id,
        patient_uuid: bill.patient.uuid.clone(),
        patient_name,
        identifier,
        visit_type: bill
            .visit
            .as_ref()
            .map(|visit| visit.visit_type.display.clone())
            .unwrap_or_default(),
        date_created: bill.date_created.clone(),
        status: bill.status,
        receipt_number: bill.receipt_number.clone(),
        cash_point: bill.cash_point.name.clone(),
        billing_service,
        line_items,
        paid_items,
        unpaid_items,
        payments: bill.payments.clone(),
        total_amount,
        tendered_amount,
        unpaid_total,
    }
}
