//! Blocking REST client for the desk's brokerage middleware.

use std::time::Duration;

use log::{debug, info};
use reqwest::blocking::{Client, Response};

use crate::Backend;
use crate::error::{BackendError, describe_reject_code};
use crate::types::{
    AccountInfo, AllocationInfo, IcebergAck, IcebergMasterOrder, IcebergOrder, IcebergStatus,
    JobId, OrderAck, OrderRequest, PositionInfo,
};

/// Structured error body the middleware returns on rejects.
#[derive(Debug, serde::Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, serde::Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// Blocking HTTP client for the backend REST surface.
pub struct RestBackend {
    client: Client,
    base_url: String,
}

impl RestBackend {
    /// Create a client against `base_url` with a per-request timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Connection(format!("failed to build client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Turn a non-success response into the right error. A parseable
    /// `{"error": {...}}` body is a reject; anything else is a raw status.
    fn check(resp: Response) -> Result<Response, BackendError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().unwrap_or_default();
        if let Ok(parsed) = serde_json::from_str::<ErrorBody>(&body) {
            let message = describe_reject_code(&parsed.error.code)
                .map(str::to_string)
                .unwrap_or(parsed.error.message);
            return Err(BackendError::Rejected { code: parsed.error.code, message });
        }
        Err(BackendError::Status { status: status.as_u16(), body })
    }

    fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        context: &str,
    ) -> Result<T, BackendError> {
        let resp = self
            .client
            .get(self.url(path))
            .send()
            .map_err(|e| BackendError::Connection(format!("{context} request failed: {e}")))?;
        Self::check(resp)?
            .json::<T>()
            .map_err(|e| BackendError::Parse(format!("{context}: {e}")))
    }

    fn post_json<B: serde::Serialize, T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        context: &str,
    ) -> Result<T, BackendError> {
        let resp = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .map_err(|e| BackendError::Connection(format!("{context} request failed: {e}")))?;
        Self::check(resp)?
            .json::<T>()
            .map_err(|e| BackendError::Parse(format!("{context}: {e}")))
    }
}

impl Backend for RestBackend {
    fn accounts(&self) -> Result<Vec<AccountInfo>, BackendError> {
        self.get_json("/accounts", "accounts")
    }

    fn allocations(&self, strategy: &str) -> Result<Vec<AllocationInfo>, BackendError> {
        self.get_json(&format!("/allocations?strategy_id={strategy}"), "allocations")
    }

    fn strategy_positions(&self, strategy: &str) -> Result<Vec<PositionInfo>, BackendError> {
        self.get_json(
            &format!("/positions_strategy?strategy_id={strategy}"),
            "positions",
        )
    }

    fn submit_order(&self, order: &OrderRequest) -> Result<OrderAck, BackendError> {
        debug!(
            "Submitting order: {} {} {} @ {} for {}",
            order.side, order.quantity, order.ticker, order.price, order.account_id
        );
        self.post_json("/order", order, "order")
    }

    fn submit_iceberg(&self, order: &IcebergOrder) -> Result<JobId, BackendError> {
        info!(
            "Submitting iceberg: {} {} {} @ {} for {} (lot size {})",
            order.side, order.quantity, order.ticker, order.price, order.account_id,
            order.lot_size
        );
        let ack: IcebergAck = self.post_json("/order_iceberg", order, "iceberg")?;
        Ok(ack.iceberg_id)
    }

    fn submit_iceberg_master(&self, order: &IcebergMasterOrder) -> Result<JobId, BackendError> {
        let total: i64 = order.accounts.iter().map(|leg| leg.quantity).sum();
        info!(
            "Submitting master iceberg: {} {} {} @ {} across {} accounts (lot size {})",
            order.side, total, order.ticker, order.price,
            order.accounts.len(), order.lot_size
        );
        let ack: IcebergAck = self.post_json("/order_iceberg_master", order, "master iceberg")?;
        Ok(ack.iceberg_id)
    }

    fn iceberg_status(&self, job: &JobId) -> Result<IcebergStatus, BackendError> {
        self.get_json(&format!("/iceberg_status/{job}"), "iceberg status")
    }

    fn cancel_iceberg(&self, job: &JobId) -> Result<(), BackendError> {
        info!("Cancelling iceberg {job}");
        let resp = self
            .client
            .post(self.url(&format!("/cancel_iceberg/{job}")))
            .send()
            .map_err(|e| BackendError::Connection(format!("cancel request failed: {e}")))?;
        Self::check(resp)?;
        Ok(())
    }
}
