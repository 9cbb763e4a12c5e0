//! View models for the bills table and the invoice.
//!
//! # Design
//! Views consume query snapshots and produce plain data plus a text
//! rendering; they hold no business rules beyond display state. The table
//! is exactly one of loading, error, empty or rows. Printing is delegated to
//! a caller-supplied callback.

use rust_decimal::Decimal;

use crate::error::ApiError;
use crate::mappers::{saturating_sum, MappedBill, MappedLineItem};
use crate::queries::QuerySnapshot;
use crate::types::BillStatus;

pub const EMPTY_BILLS_MESSAGE: &str = "There are no bills to display";
pub const LOADING_BILLS_MESSAGE: &str = "Loading bills...";

/// Substitute `{patientUuid}` and `{uuid}` in a link template.
pub fn resolve_link(template: &str, patient_uuid: &str, uuid: &str) -> String {
    template
        .replace("{patientUuid}", patient_uuid)
        .replace("{uuid}", uuid)
}

/// 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page_size: usize,
    pub current_page: usize,
}

impl Pagination {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            current_page: 1,
        }
    }

    pub fn page(mut self, current_page: usize) -> Self {
        self.current_page = current_page.max(1);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page<R> {
    pub rows: Vec<R>,
    pub current_page: usize,
    pub total_pages: usize,
    pub total_rows: usize,
}

/// Slice `rows` to the requested page, clamping past-the-end requests to the
/// last page.
pub fn paginate<R: Clone>(rows: &[R], pagination: Pagination) -> Page<R> {
    let page_size = pagination.page_size.max(1);
    let total_rows = rows.len();
    let total_pages = total_rows.div_ceil(page_size).max(1);
    let current_page = pagination.current_page.clamp(1, total_pages);
    let start = (current_page - 1) * page_size;
    let end = (start + page_size).min(total_rows);

    Page {
        rows: rows.get(start..end).map(<[R]>::to_vec).unwrap_or_default(),
        current_page,
        total_pages,
        total_rows,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BillRow {
    pub uuid: String,
    pub identifier: String,
    pub patient_name: String,
    pub visit_type: String,
    pub date_created: String,
    pub billing_service: String,
    pub total_amount: Decimal,
    pub status: BillStatus,
    pub link: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BillsTable {
    Loading,
    Error(ApiError),
    Empty,
    Rows(Page<BillRow>),
}

impl BillsTable {
    /// Build the table for one page. `search` keeps bills whose patient name
    /// or identifier contains the term, case-insensitively.
    pub fn from_snapshot(
        snapshot: &QuerySnapshot<Vec<MappedBill>>,
        pagination: Pagination,
        link_template: &str,
        search: Option<&str>,
    ) -> Self {
        if snapshot.is_loading {
            return BillsTable::Loading;
        }
        if let (Some(error), false) = (&snapshot.error, snapshot.has_data) {
            return BillsTable::Error(error.clone());
        }

        let needle = search
            .map(|term| term.trim().to_lowercase())
            .filter(|term| !term.is_empty());
        let rows: Vec<BillRow> = snapshot
            .data
            .iter()
            .filter(|bill| match &needle {
                Some(needle) => {
                    bill.patient_name.to_lowercase().contains(needle)
                        || bill.identifier.to_lowercase().contains(needle)
                }
                None => true,
            })
            .map(|bill| BillRow {
                uuid: bill.uuid.clone(),
                identifier: bill.identifier.clone(),
                patient_name: bill.patient_name.clone(),
                visit_type: bill.visit_type.clone(),
                date_created: bill.date_created.clone(),
                billing_service: bill.billing_service.clone(),
                total_amount: bill.total_amount,
                status: bill.status,
                link: resolve_link(link_template, &bill.patient_uuid, &bill.uuid),
            })
            .collect();

        if rows.is_empty() {
            return BillsTable::Empty;
        }
        BillsTable::Rows(paginate(&rows, pagination))
    }

    pub fn render(&self) -> String {
        match self {
            BillsTable::Loading => LOADING_BILLS_MESSAGE.to_string(),
            BillsTable::Error(error) => format!("Error loading bills: {error}"),
            BillsTable::Empty => EMPTY_BILLS_MESSAGE.to_string(),
            BillsTable::Rows(page) => {
                let mut out = String::from(
                    "Identifier | Name | Visit type | Date | Billed items | Total | Status\n",
                );
                for row in &page.rows {
                    out.push_str(&format!(
                        "{} | {} | {} | {} | {} | {} | {}\n",
                        row.identifier,
                        row.patient_name,
                        row.visit_type,
                        row.date_created,
                        row.billing_service,
                        row.total_amount,
                        row.status.as_str(),
                    ));
                }
                out.push_str(&format!(
                    "Page {} of {} ({} bills)",
                    page.current_page, page.total_pages, page.total_rows
                ));
                out
            }
        }
    }
}

/// Invoice for one bill with a payment selection. Items start selected iff
/// they are not already paid; paid items cannot be selected.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceView {
    bill: MappedBill,
    selected: Vec<bool>,
}

impl InvoiceView {
    pub fn new(bill: MappedBill) -> Self {
        let selected = bill.line_items.iter().map(|item| !item.is_paid()).collect();
        Self { bill, selected }
    }

    pub fn bill(&self) -> &MappedBill {
        &self.bill
    }

    /// Flip the selection of the item at `index`. Returns the new selection,
    /// or `None` when the index is out of range or the item is paid.
    pub fn toggle(&mut self, index: usize) -> Option<bool> {
        let item = self.bill.line_items.get(index)?;
        if item.is_paid() {
            return None;
        }
        let selected = self.selected.get_mut(index)?;
        *selected = !*selected;
        Some(*selected)
    }

    pub fn selected_items(&self) -> Vec<&MappedLineItem> {
        self.bill
            .line_items
            .iter()
            .zip(&self.selected)
            .filter_map(|(item, selected)| selected.then_some(item))
            .collect()
    }

    pub fn selected_total(&self) -> Decimal {
        saturating_sum(self.selected_items().iter().map(|item| item.line_total))
    }

    pub fn render(&self) -> String {
        let bill = &self.bill;
        let mut out = format!(
            "Invoice {}\nPatient: {} ({})\nDate: {}\nStatus: {}\n",
            bill.receipt_number,
            bill.patient_name,
            bill.identifier,
            bill.date_created,
            bill.status.as_str(),
        );
        for (item, selected) in bill.line_items.iter().zip(&self.selected) {
            out.push_str(&format!(
                "[{}] {} x{} @ {} = {} ({})\n",
                if *selected { "x" } else { " " },
                item.display,
                item.quantity,
                item.price,
                item.line_total,
                item.payment_status.as_str(),
            ));
        }
        out.push_str(&format!(
            "Total: {}\nAmount tendered: {}\nAmount due: {}",
            bill.total_amount,
            bill.tendered_amount,
            self.selected_total(),
        ));
        out
    }

    pub fn print<F: FnOnce(&str)>(&self, print: F) {
        print(&self.render());
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use serde_json::json;

    use super::*;
    use crate::mappers::map_bill;

    fn snapshot(data: Vec<MappedBill>) -> QuerySnapshot<Vec<MappedBill>> {
        QuerySnapshot {
            data,
            has_data: true,
            is_loading: false,
            is_validating: false,
            error: None,
        }
    }

    fn mixed_bill() -> MappedBill {
        map_bill(Some(&json!({
            "uuid": "b1",
            "receiptNumber": "0042",
            "patient": {"uuid": "p1", "display": "12345678 - John Doe"},
            "lineItems": [
                {"uuid": "l1", "billableService": "s:Lab test", "price": 100, "quantity": 2, "paymentStatus": "PENDING"},
                {"uuid": "l2", "billableService": "s:Consultation", "price": 50, "quantity": 1, "paymentStatus": "PAID"}
            ]
        })))
        .unwrap()
    }

    #[test]
    fn link_template_substitutes_both_placeholders() {
        assert_eq!(
            resolve_link("/billing/patient/{patientUuid}/{uuid}", "p1", "b1"),
            "/billing/patient/p1/b1"
        );
    }

    #[test]
    fn paginate_slices_and_clamps() {
        let rows: Vec<u32> = (1..=12).collect();
        let page = paginate(&rows, Pagination::new(5).page(3));
        assert_eq!(page.rows, vec![11, 12]);
        assert_eq!(page.total_pages, 3);

        let clamped = paginate(&rows, Pagination::new(5).page(9));
        assert_eq!(clamped.current_page, 3);

        let empty = paginate::<u32>(&[], Pagination::new(5));
        assert!(empty.rows.is_empty());
        assert_eq!(empty.total_pages, 1);
    }

    #[test]
    fn loading_takes_precedence() {
        let mut snap = snapshot(Vec::new());
        snap.is_loading = true;
        snap.has_data = false;
        let table = BillsTable::from_snapshot(&snap, Pagination::new(10), "{uuid}", None);
        assert_eq!(table, BillsTable::Loading);
        assert_eq!(table.render(), LOADING_BILLS_MESSAGE);
    }

    #[test]
    fn error_without_data_renders_error_state() {
        let mut snap = snapshot(Vec::new());
        snap.has_data = false;
        snap.error = Some(ApiError::HttpError {
            status: 500,
            body: "down".to_string(),
        });
        let table = BillsTable::from_snapshot(&snap, Pagination::new(10), "{uuid}", None);
        assert!(matches!(table, BillsTable::Error(_)));
        let rendered = table.render();
        assert!(rendered.contains("Error loading bills"));
        assert!(!rendered.contains("Identifier |"));
    }

    #[test]
    fn error_with_stale_data_keeps_rows() {
        let mut snap = snapshot(vec![mixed_bill()]);
        snap.error = Some(ApiError::Transport("offline".to_string()));
        let table = BillsTable::from_snapshot(&snap, Pagination::new(10), "{uuid}", None);
        assert!(matches!(table, BillsTable::Rows(_)));
    }

    #[test]
    fn empty_bills_render_empty_message() {
        let table = BillsTable::from_snapshot(&snapshot(Vec::new()), Pagination::new(10), "{uuid}", None);
        assert_eq!(table, BillsTable::Empty);
        assert_eq!(table.render(), EMPTY_BILLS_MESSAGE);
    }

    #[test]
    fn search_filters_by_name_or_identifier() {
        let snap = snapshot(vec![mixed_bill()]);
        let by_name = BillsTable::from_snapshot(&snap, Pagination::new(10), "{uuid}", Some("john"));
        assert!(matches!(by_name, BillsTable::Rows(_)));
        let by_id = BillsTable::from_snapshot(&snap, Pagination::new(10), "{uuid}", Some("1234"));
        assert!(matches!(by_id, BillsTable::Rows(_)));
        let miss = BillsTable::from_snapshot(&snap, Pagination::new(10), "{uuid}", Some("mary"));
        assert_eq!(miss, BillsTable::Empty);
    }

    #[test]
    fn rows_carry_resolved_links() {
        let snap = snapshot(vec![mixed_bill()]);
        let BillsTable::Rows(page) =
            BillsTable::from_snapshot(&snap, Pagination::new(10), "/bills/{patientUuid}/{uuid}", None)
        else {
            panic!("expected rows");
        };
        assert_eq!(page.rows[0].link, "/bills/p1/b1");
        assert_eq!(page.rows[0].total_amount, dec!(250));
    }

    #[test]
    fn invoice_selects_unpaid_items_by_default() {
        let invoice = InvoiceView::new(mixed_bill());
        let selected = invoice.selected_items();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].uuid, "l1");
        assert_eq!(invoice.selected_total(), dec!(200));
    }

    #[test]
    fn paid_items_cannot_be_toggled() {
        let mut invoice = InvoiceView::new(mixed_bill());
        assert_eq!(invoice.toggle(1), None);
        assert_eq!(invoice.toggle(7), None);
        assert_eq!(invoice.toggle(0), Some(false));
        assert_eq!(invoice.selected_total(), Decimal::ZERO);
    }

    #[test]
    fn selected_total_saturates_on_huge_prices() {
        let bill = map_bill(Some(&json!({
            "uuid": "b2",
            "lineItems": [
                {"uuid": "l1", "billableService": "s:MRI", "price": "60000000000000000000000000000"},
                {"uuid": "l2", "billableService": "s:CT", "price": "60000000000000000000000000000"}
            ]
        })))
        .unwrap();
        let invoice = InvoiceView::new(bill);
        assert_eq!(invoice.selected_items().len(), 2);
        assert_eq!(invoice.selected_total(), Decimal::MAX);
        assert!(invoice.render().contains(&Decimal::MAX.to_string()));
    }

    #[test]
    fn print_receives_rendered_invoice() {
        let invoice = InvoiceView::new(mixed_bill());
        let mut printed = String::new();
        invoice.print(|text| printed.push_str(text));
        assert!(printed.contains("Invoice 0042"));
        assert!(printed.contains("John Doe"));
        assert!(printed.contains("Amount due: 200"));
    }
}
