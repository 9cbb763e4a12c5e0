//! POST helpers.
//!
//! These never touch a [`QueryCache`](crate::cache::QueryCache). After a
//! successful call the caller revalidates whatever queries depend on the
//! change, typically with `Query::mutate`. Errors are returned unchanged and
//! nothing is retried.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::client::BillingClient;
use crate::error::ApiError;
use crate::http::Transport;
use crate::types::{BillPayment, CreateBillableService, RequestBody};

#[derive(Clone)]
pub struct BillingMutations {
    client: BillingClient,
    transport: Arc<dyn Transport>,
}

impl BillingMutations {
    pub fn new(client: BillingClient, transport: Arc<dyn Transport>) -> Self {
        Self { client, transport }
    }

    /// `POST /cashier/api/billable-service`; resolves to the created resource.
    pub async fn create_billable_service(
        &self,
        payload: CreateBillableService,
    ) -> Result<Value, ApiError> {
        self.post(&RequestBody::CreateBillableService(payload)).await
    }

    /// `POST /cashier/bill/{uuid}`; resolves to the updated bill.
    pub async fn process_bill_payment(
        &self,
        bill_uuid: &str,
        payment: BillPayment,
    ) -> Result<Value, ApiError> {
        self.post(&RequestBody::BillPayment {
            bill_uuid: bill_uuid.to_string(),
            payment,
        })
        .await
    }

    pub async fn post(&self, body: &RequestBody) -> Result<Value, ApiError> {
        let request = self.client.build_post(body)?;
        debug!(path = %request.path, "posting");
        let response = self.transport.execute(request).await?;
        self.client.parse_created(response).inspect_err(|err| {
            warn!(path = %body.path(), error = %err, "post rejected");
        })
    }
}
