//! Deterministic fake PMS adapter: no network I/O, in-memory reservations,
//! keyed by the same idempotency key the orchestrator supplies so repeated
//! `create_reservation` calls for the same checkout return the same
//! reservation instead of creating a second one.

use async_trait::async_trait;
use checkout_pms::types::*;
use checkout_pms::PmsAdapter;
use checkout_schemas::{CheckoutError, Guests, Money, PriceBreakdown};
use std::collections::HashMap;
use tokio::sync::Mutex;

#[derive(Default)]
struct State {
    next_id: u64,
    by_idempotency_key: HashMap<String, String>,
    reservations: HashMap<String, Reservation>,
}

pub struct FakePms {
    state: Mutex<State>,
    pub unit_price: Money,
}

impl Default for FakePms {
    fn default() -> Self {
        Self::new()
    }
}

impl FakePms {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            unit_price: Money(10_000),
        }
    }
}

#[async_trait]
impl PmsAdapter for FakePms {
    async fn get_listing_detail(&self, listing_id: &str) -> Result<ListingDetail, CheckoutError> {
        Ok(ListingDetail {
            listing_id: listing_id.to_string(),
            display_name: "Test Listing".to_string(),
            max_guests: 6,
        })
    }

    async fn calculate_price(
        &self,
        _listing_id: &str,
        check_in: chrono::NaiveDate,
        check_out: chrono::NaiveDate,
        _guests: &Guests,
        _coupon_code: Option<&str>,
    ) -> Result<CalculatedPrice, CheckoutError> {
        let nights = (check_out - check_in).num_days().max(1);
        let subtotal = Money(self.unit_price.0 * nights);
        let cleaning_fee = Money(5_000);
        let service_fee = Money(subtotal.0 / 10);
        let taxes = Money((subtotal.0 + cleaning_fee.0 + service_fee.0) / 20);
        let total = subtotal + cleaning_fee + service_fee + taxes;

        Ok(CalculatedPrice {
            total,
            currency: "USD".to_string(),
            breakdown: PriceBreakdown {
                subtotal,
                cleaning_fee,
                service_fee,
                taxes,
            },
        })
    }

    async fn get_calendar(&self, _listing_id: &str) -> Result<Vec<CalendarDay>, CheckoutError> {
        Ok(Vec::new())
    }

    async fn search_listings(&self, _query: &str) -> Result<Vec<ListingSummary>, CheckoutError> {
        Ok(Vec::new())
    }

    async fn create_reservation(&self, req: CreateReservationRequest) -> Result<Reservation, CheckoutError> {
        let mut state = self.state.lock().await;

        if let Some(existing_id) = state.by_idempotency_key.get(&req.idempotency_key) {
            return Ok(state.reservations.get(existing_id).cloned().unwrap());
        }

        state.next_id += 1;
        let pms_reservation_id = format!("RES-{:06}", state.next_id);
        let reservation = Reservation {
            pms_reservation_id: pms_reservation_id.clone(),
            status: ReservationStatus::Reserved,
            booking_code: None,
        };

        state
            .by_idempotency_key
            .insert(req.idempotency_key, pms_reservation_id.clone());
        state.reservations.insert(pms_reservation_id, reservation.clone());

        Ok(reservation)
    }

    async fn update_reservation(
        &self,
        pms_reservation_id: &str,
        req: UpdateReservationRequest,
    ) -> Result<Reservation, CheckoutError> {
        let mut state = self.state.lock().await;
        let reservation = state
            .reservations
            .get_mut(pms_reservation_id)
            .ok_or_else(|| CheckoutError::PmsClientError {
                status: 404,
                message: format!("reservation {pms_reservation_id} not found"),
            })?;
        reservation.status = req.target_status;
        Ok(reservation.clone())
    }

    async fn cancel_reservation(&self, pms_reservation_id: &str) -> Result<(), CheckoutError> {
        let mut state = self.state.lock().await;
        if let Some(reservation) = state.reservations.get_mut(pms_reservation_id) {
            reservation.status = ReservationStatus::Canceled;
        }
        Ok(())
    }

    async fn get_reservation(&self, pms_reservation_id: &str) -> Result<Reservation, CheckoutError> {
        let mut state = self.state.lock().await;
        let reservation = state
            .reservations
            .get_mut(pms_reservation_id)
            .ok_or_else(|| CheckoutError::PmsClientError {
                status: 404,
                message: format!("reservation {pms_reservation_id} not found"),
            })?;
        if reservation.booking_code.is_none() && reservation.status == ReservationStatus::Booked {
            reservation.booking_code = Some(format!("BK-{pms_reservation_id}"));
        }
        Ok(reservation.clone())
    }

    async fn register_payment(&self, req: RegisterPaymentRequest) -> Result<(), CheckoutError> {
        let state = self.state.lock().await;
        if !state.reservations.contains_key(&req.pms_reservation_id) {
            return Err(CheckoutError::PmsClientError {
                status: 404,
                message: format!("reservation {} not found", req.pms_reservation_id),
            });
        }
        Ok(())
    }
}
