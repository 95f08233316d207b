//! PMS Adapter (C1): typed operations against the property management
//! system, with the read/write timeout-retry split and error taxonomy the
//! rest of the checkout core expects.
//!
//! Defined as a trait so the orchestrator and its tests depend on an
//! interface, not a concrete HTTP client — the boundary a router isolates
//! the core engine from broker specifics.

pub mod types;

use async_trait::async_trait;
use checkout_schemas::CheckoutError;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use types::*;

/// Reads get a short timeout and a couple of retries; they are naturally
/// safe to repeat. Writes get a long timeout and no automatic retry, since
/// retrying a write without an idempotency key could double-create state.
const READ_TIMEOUT: Duration = Duration::from_secs(8);
const READ_RETRIES: u32 = 2;
const WRITE_TIMEOUT: Duration = Duration::from_secs(30);

#[async_trait]
pub trait PmsAdapter: Send + Sync {
    async fn get_listing_detail(&self, listing_id: &str) -> Result<ListingDetail, CheckoutError>;
    async fn calculate_price(
        &self,
        listing_id: &str,
        check_in: chrono::NaiveDate,
        check_out: chrono::NaiveDate,
        guests: &checkout_schemas::Guests,
        coupon_code: Option<&str>,
    ) -> Result<CalculatedPrice, CheckoutError>;
    async fn get_calendar(&self, listing_id: &str) -> Result<Vec<CalendarDay>, CheckoutError>;
    async fn search_listings(&self, query: &str) -> Result<Vec<ListingSummary>, CheckoutError>;

    async fn create_reservation(&self, req: CreateReservationRequest) -> Result<Reservation, CheckoutError>;
    async fn update_reservation(
        &self,
        pms_reservation_id: &str,
        req: UpdateReservationRequest,
    ) -> Result<Reservation, CheckoutError>;
    async fn cancel_reservation(&self, pms_reservation_id: &str) -> Result<(), CheckoutError>;
    async fn get_reservation(&self, pms_reservation_id: &str) -> Result<Reservation, CheckoutError>;
    async fn register_payment(&self, req: RegisterPaymentRequest) -> Result<(), CheckoutError>;
}

pub struct HttpPmsClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl HttpPmsClient {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            http: Client::new(),
            base_url,
            api_key,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// GET with the read timeout/retry policy: a 4xx never retries (it's a
    /// client error, not a transient one), a 5xx or timeout retries up to
    /// `READ_RETRIES` times with backoff (1s, 2s).
    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, CheckoutError> {
        let mut last_err = None;
        for attempt in 0..=READ_RETRIES {
            let outcome = match self
                .http
                .get(self.url(path))
                .bearer_auth(&self.api_key)
                .timeout(READ_TIMEOUT)
                .send()
                .await
            {
                Ok(resp) => Self::decode(resp, path).await,
                Err(e) if e.is_timeout() => Err(CheckoutError::PmsTimeout {
                    operation: path.to_string(),
                }),
                Err(e) => Err(CheckoutError::PmsServerError {
                    status: 0,
                    message: e.to_string(),
                }),
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(e @ CheckoutError::PmsClientError { .. }) => return Err(e),
                Err(e) => last_err = Some(e),
            }

            if attempt < READ_RETRIES {
                tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
            }
        }
        Err(last_err.unwrap_or_else(|| CheckoutError::PmsTimeout {
            operation: path.to_string(),
        }))
    }

    /// POST/PUT with the write timeout policy; never retried here (the
    /// caller supplies an idempotency key if it wants retry safety).
    async fn send_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: &B,
    ) -> Result<T, CheckoutError> {
        let resp = self
            .http
            .request(method, self.url(path))
            .bearer_auth(&self.api_key)
            .timeout(WRITE_TIMEOUT)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CheckoutError::PmsTimeout {
                        operation: path.to_string(),
                    }
                } else {
                    CheckoutError::PmsServerError {
                        status: 0,
                        message: e.to_string(),
                    }
                }
            })?;

        Self::decode(resp, path).await
    }

    async fn decode<T: DeserializeOwned>(resp: reqwest::Response, path: &str) -> Result<T, CheckoutError> {
        let status = resp.status();
        if status.is_success() {
            resp.json::<T>()
                .await
                .map_err(|e| CheckoutError::Internal(format!("pms response decode failed for {path}: {e}")))
        } else if status.is_client_error() {
            let message = resp.text().await.unwrap_or_default();
            Err(CheckoutError::PmsClientError {
                status: status.as_u16(),
                message,
            })
        } else if status == StatusCode::REQUEST_TIMEOUT || status == StatusCode::GATEWAY_TIMEOUT {
            Err(CheckoutError::PmsTimeout {
                operation: path.to_string(),
            })
        } else {
            let message = resp.text().await.unwrap_or_default();
            Err(CheckoutError::PmsServerError {
                status: status.as_u16(),
                message,
            })
        }
    }
}

#[async_trait]
impl PmsAdapter for HttpPmsClient {
    async fn get_listing_detail(&self, listing_id: &str) -> Result<ListingDetail, CheckoutError> {
        self.get_json(&format!("/listings/{listing_id}")).await
    }

    async fn calculate_price(
        &self,
        listing_id: &str,
        check_in: chrono::NaiveDate,
        check_out: chrono::NaiveDate,
        guests: &checkout_schemas::Guests,
        coupon_code: Option<&str>,
    ) -> Result<CalculatedPrice, CheckoutError> {
        let path = format!(
            "/listings/{listing_id}/price?check_in={check_in}&check_out={check_out}&adults={}&children={}&infants={}{}",
            guests.adults,
            guests.children,
            guests.infants,
            coupon_code.map(|c| format!("&coupon_code={c}")).unwrap_or_default(),
        );
        self.get_json(&path).await
    }

    async fn get_calendar(&self, listing_id: &str) -> Result<Vec<CalendarDay>, CheckoutError> {
        self.get_json(&format!("/listings/{listing_id}/calendar")).await
    }

    async fn search_listings(&self, query: &str) -> Result<Vec<ListingSummary>, CheckoutError> {
        self.get_json(&format!("/listings?q={query}")).await
    }

    async fn create_reservation(&self, req: CreateReservationRequest) -> Result<Reservation, CheckoutError> {
        self.send_json(reqwest::Method::POST, "/reservations", &req).await
    }

    async fn update_reservation(
        &self,
        pms_reservation_id: &str,
        req: UpdateReservationRequest,
    ) -> Result<Reservation, CheckoutError> {
        self.send_json(
            reqwest::Method::PUT,
            &format!("/reservations/{pms_reservation_id}"),
            &req,
        )
        .await
    }

    async fn cancel_reservation(&self, pms_reservation_id: &str) -> Result<(), CheckoutError> {
        let resp = self
            .http
            .delete(self.url(&format!("/reservations/{pms_reservation_id}")))
            .bearer_auth(&self.api_key)
            .timeout(WRITE_TIMEOUT)
            .send()
            .await
            .map_err(|e| CheckoutError::PmsServerError {
                status: 0,
                message: e.to_string(),
            })?;

        // Tolerate an already-canceled / already-gone reservation.
        if resp.status().is_success() || resp.status() == StatusCode::NOT_FOUND {
            Ok(())
        } else if resp.status().is_client_error() {
            Err(CheckoutError::PmsClientError {
                status: resp.status().as_u16(),
                message: resp.text().await.unwrap_or_default(),
            })
        } else {
            Err(CheckoutError::PmsServerError {
                status: resp.status().as_u16(),
                message: resp.text().await.unwrap_or_default(),
            })
        }
    }

    async fn get_reservation(&self, pms_reservation_id: &str) -> Result<Reservation, CheckoutError> {
        self.get_json(&format!("/reservations/{pms_reservation_id}")).await
    }

    async fn register_payment(&self, req: RegisterPaymentRequest) -> Result<(), CheckoutError> {
        self.send_json::<_, serde_json::Value>(
            reqwest::Method::POST,
            &format!("/reservations/{}/payments", req.pms_reservation_id),
            &req,
        )
        .await
        .map(|_| ())
    }
}
