use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

/// `EnvFilter` directives used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "mock_server=info,tower_http=info";

pub const SERVICE_TYPES_CONCEPT: &str = "21b8cf43-9f9f-4d02-9f4a-d710ece54c46";
pub const JOHN_DOE_BILL: Uuid = Uuid::from_u128(0x0b11_0000_0000_4000_8000_0000_0000_0001);
pub const MARY_SMITH_BILL: Uuid = Uuid::from_u128(0x0b11_0000_0000_4000_8000_0000_0000_0002);
pub const JOHN_DOE: Uuid = Uuid::from_u128(0x0a71_0000_0000_4000_8000_0000_0000_0001);
pub const MARY_SMITH: Uuid = Uuid::from_u128(0x0a71_0000_0000_4000_8000_0000_0000_0002);
pub const CASH: Uuid = Uuid::from_u128(0x0ca5_0000_0000_4000_8000_0000_0000_0001);

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Concept {
    pub uuid: Uuid,
    pub display: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServicePrice {
    pub uuid: Uuid,
    pub name: String,
    pub price: f64,
    pub payment_mode: Uuid,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BillableService {
    pub uuid: Uuid,
    pub name: String,
    pub short_name: String,
    pub service_status: String,
    pub service_type: Concept,
    pub service_prices: Vec<ServicePrice>,
    pub concept: Uuid,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PaymentMode {
    pub uuid: Uuid,
    pub name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub uuid: Uuid,
    /// `"<uuid>:<name>"`.
    pub billable_service: String,
    pub price: f64,
    pub quantity: u32,
    pub price_name: String,
    pub payment_status: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub uuid: Uuid,
    pub amount: f64,
    pub amount_tendered: f64,
    pub instance_type: PaymentMode,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Bill {
    pub uuid: Uuid,
    pub patient: Concept,
    pub date_created: String,
    pub status: String,
    pub receipt_number: String,
    pub line_items: Vec<LineItem>,
    pub payments: Vec<Payment>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewServicePrice {
    pub payment_mode: Uuid,
    pub name: String,
    pub price: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBillableService {
    pub name: String,
    pub short_name: String,
    pub service_type: Uuid,
    #[serde(default)]
    pub service_prices: Vec<NewServicePrice>,
    #[serde(default = "enabled")]
    pub service_status: String,
    pub concept: Uuid,
}

fn enabled() -> String {
    "ENABLED".to_string()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemUpdate {
    pub uuid: Uuid,
    pub payment_status: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPayment {
    pub amount: f64,
    pub amount_tendered: f64,
    pub instance_type: Uuid,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillPayment {
    pub status: String,
    #[serde(default)]
    pub line_items: Vec<LineItemUpdate>,
    #[serde(default)]
    pub payments: Vec<NewPayment>,
}

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillParams {
    pub patient_uuid: Option<Uuid>,
    pub status: Option<String>,
}

/// In-memory backend data.
#[derive(Clone, Debug, Default)]
pub struct Store {
    pub services: Vec<BillableService>,
    pub service_types: Vec<Concept>,
    pub payment_modes: Vec<PaymentMode>,
    pub concepts: Vec<Concept>,
    pub bills: Vec<Bill>,
}

impl Store {
    /// Two pending bills (John Doe / 12345678, Mary Smith / 98765432), a
    /// lab service type with one service, and cash plus insurance modes.
    pub fn seeded() -> Self {
        let lab = Concept {
            uuid: Uuid::from_u128(0x7e5_0001),
            display: "Lab service".to_string(),
        };
        let radiology = Concept {
            uuid: Uuid::from_u128(0x7e5_0002),
            display: "Radiology".to_string(),
        };
        let cash = PaymentMode {
            uuid: CASH,
            name: "Cash".to_string(),
        };
        let insurance = PaymentMode {
            uuid: Uuid::from_u128(0x0ca5_0002),
            name: "Insurance".to_string(),
        };
        let blood_test = Concept {
            uuid: Uuid::from_u128(0xc0_0001),
            display: "Full blood count".to_string(),
        };
        let chest_xray = Concept {
            uuid: Uuid::from_u128(0xc0_0002),
            display: "Chest X-ray".to_string(),
        };
        let lab_test = BillableService {
            uuid: Uuid::from_u128(0x5e_0001),
            name: "Full blood count".to_string(),
            short_name: "FBC".to_string(),
            service_status: "ENABLED".to_string(),
            service_type: lab.clone(),
            service_prices: vec![ServicePrice {
                uuid: Uuid::from_u128(0x9e_0001),
                name: cash.name.clone(),
                price: 100.0,
                payment_mode: cash.uuid,
            }],
            concept: blood_test.uuid,
        };
        let bill = |uuid: Uuid, patient: Uuid, display: &str, receipt: &str, items: Vec<LineItem>| Bill {
            uuid,
            patient: Concept {
                uuid: patient,
                display: display.to_string(),
            },
            date_created: "2024-03-01T09:30:00.000+0000".to_string(),
            status: "PENDING".to_string(),
            receipt_number: receipt.to_string(),
            line_items: items,
            payments: Vec::new(),
        };
        let item = |n: u128, price: f64, quantity: u32, status: &str| LineItem {
            uuid: Uuid::from_u128(0x1e_0000 + n),
            billable_service: format!("{}:{}", lab_test.uuid, lab_test.name),
            price,
            quantity,
            price_name: "Cash".to_string(),
            payment_status: status.to_string(),
        };

        Self {
            bills: vec![
                bill(
                    JOHN_DOE_BILL,
                    JOHN_DOE,
                    "12345678 - John Doe",
                    "0001",
                    vec![item(1, 100.0, 2, "PENDING"), item(2, 50.0, 1, "PAID")],
                ),
                bill(
                    MARY_SMITH_BILL,
                    MARY_SMITH,
                    "98765432 - Mary Smith",
                    "0002",
                    vec![item(3, 75.0, 1, "PENDING")],
                ),
            ],
            services: vec![lab_test],
            service_types: vec![lab, radiology],
            payment_modes: vec![cash, insurance],
            concepts: vec![blood_test, chest_xray],
        }
    }
}

pub type Db = Arc<RwLock<Store>>;

pub fn app() -> Router {
    app_with(Store::seeded())
}

pub fn app_with(store: Store) -> Router {
    let db: Db = Arc::new(RwLock::new(store));
    Router::new()
        .route("/billableService", get(list_services))
        .route(
            "/cashier/api/billable-service",
            axum::routing::post(create_service),
        )
        .route("/concept/{uuid}", get(get_concept_set))
        .route("/cashier/paymentMode", get(list_payment_modes))
        .route("/conceptsearch", get(search_concepts))
        .route("/cashier/bill", get(list_bills))
        .route("/cashier/bill/{uuid}", get(get_bill).post(pay_bill))
        .layer(TraceLayer::new_for_http())
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    run_with(listener, Store::seeded()).await
}

pub async fn run_with(listener: TcpListener, store: Store) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with(store)).await
}

async fn list_services(State(db): State<Db>) -> Json<Value> {
    let store = db.read().await;
    Json(json!({ "results": store.services }))
}

async fn create_service(
    State(db): State<Db>,
    Json(input): Json<CreateBillableService>,
) -> Result<(StatusCode, Json<BillableService>), StatusCode> {
    let mut store = db.write().await;
    let service_type = store
        .service_types
        .iter()
        .find(|t| t.uuid == input.service_type)
        .cloned()
        .ok_or(StatusCode::BAD_REQUEST)?;
    let mut service_prices = Vec::with_capacity(input.service_prices.len());
    for price in input.service_prices {
        if !store.payment_modes.iter().any(|m| m.uuid == price.payment_mode) {
            return Err(StatusCode::BAD_REQUEST);
        }
        service_prices.push(ServicePrice {
            uuid: Uuid::new_v4(),
            name: price.name,
            price: price.price,
            payment_mode: price.payment_mode,
        });
    }
    let service = BillableService {
        uuid: Uuid::new_v4(),
        name: input.name,
        short_name: input.short_name,
        service_status: input.service_status,
        service_type,
        service_prices,
        concept: input.concept,
    };
    info!(uuid = %service.uuid, name = %service.name, "billable service created");
    store.services.push(service.clone());
    Ok((StatusCode::CREATED, Json(service)))
}

async fn get_concept_set(
    State(db): State<Db>,
    Path(uuid): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    if uuid != SERVICE_TYPES_CONCEPT {
        return Err(StatusCode::NOT_FOUND);
    }
    let store = db.read().await;
    Ok(Json(json!({ "uuid": uuid, "setMembers": store.service_types })))
}

async fn list_payment_modes(State(db): State<Db>) -> Json<Value> {
    let store = db.read().await;
    Json(json!({ "results": store.payment_modes }))
}

async fn search_concepts(
    State(db): State<Db>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Value>, StatusCode> {
    let term = params
        .q
        .map(|q| q.trim().to_lowercase())
        .filter(|q| !q.is_empty())
        .ok_or(StatusCode::BAD_REQUEST)?;
    let store = db.read().await;
    let results: Vec<&Concept> = store
        .concepts
        .iter()
        .filter(|c| c.display.to_lowercase().contains(&term))
        .collect();
    Ok(Json(json!({ "results": results })))
}

async fn list_bills(State(db): State<Db>, Query(params): Query<BillParams>) -> Json<Value> {
    let store = db.read().await;
    let results: Vec<&Bill> = store
        .bills
        .iter()
        .filter(|b| params.patient_uuid.map_or(true, |p| b.patient.uuid == p))
        .filter(|b| params.status.as_deref().map_or(true, |s| b.status == s))
        .collect();
    Json(json!({ "results": results }))
}

async fn get_bill(State(db): State<Db>, Path(uuid): Path<Uuid>) -> Result<Json<Bill>, StatusCode> {
    let store = db.read().await;
    store
        .bills
        .iter()
        .find(|b| b.uuid == uuid)
        .cloned()
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn pay_bill(
    State(db): State<Db>,
    Path(uuid): Path<Uuid>,
    Json(input): Json<BillPayment>,
) -> Result<Json<Bill>, StatusCode> {
    let mut store = db.write().await;
    let modes = store.payment_modes.clone();
    let bill = store
        .bills
        .iter_mut()
        .find(|b| b.uuid == uuid)
        .ok_or(StatusCode::NOT_FOUND)?;

    for update in input.line_items {
        if let Some(item) = bill.line_items.iter_mut().find(|i| i.uuid == update.uuid) {
            item.payment_status = update.payment_status;
        }
    }
    for payment in input.payments {
        let instance_type = modes
            .iter()
            .find(|m| m.uuid == payment.instance_type)
            .cloned()
            .ok_or(StatusCode::BAD_REQUEST)?;
        bill.payments.push(Payment {
            uuid: Uuid::new_v4(),
            amount: payment.amount,
            amount_tendered: payment.amount_tendered,
            instance_type,
        });
    }
    bill.status = input.status;
    info!(%uuid, status = %bill.status, "bill payment processed");
    Ok(Json(bill.clone()))
}
