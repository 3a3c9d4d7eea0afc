use std::sync::Arc;

use common::logger::{TraceId, annotate_span, root_span};
use tracing::{Instrument, error};

use crate::api::dto::{PaymentProcessRequest, ReservationRequest, TimeSlotQuery};
use crate::api::envelope::ApiResponse;
use crate::catalog::model::Resource;
use crate::error::BookingError;
use crate::ledger::model::{Reservation, ReservationId};
use crate::orchestrator::BookingCore;
use crate::payment::types::PaymentResult;
use crate::slot::model::TimeSlot;

/// Envelope-producing entry points, one per route.
#[derive(Clone)]
pub struct BookingApi {
    core: Arc<BookingCore>,
}

impl BookingApi {
    pub fn new(core: Arc<BookingCore>) -> Self {
        Self { core }
    }

    /// `GET /resources`
    pub async fn get_resources(&self) -> ApiResponse<Vec<Resource>> {
        let span = root_span("get_resources", &TraceId::new());
        respond(self.core.list_resources().instrument(span).await)
    }

    /// `GET /timeslots?resourceId&startDate`
    pub async fn get_time_slots(&self, query: TimeSlotQuery) -> ApiResponse<Vec<TimeSlot>> {
        let span = root_span("get_time_slots", &TraceId::new());
        respond(
            self.core
                .list_time_slots(query.resource_id, query.start_date)
                .instrument(span)
                .await,
        )
    }

    /// `POST /reservations`; data is the new reservation id as a UUID string.
    pub async fn create_reservation(
        &self,
        req: ReservationRequest,
    ) -> ApiResponse<ReservationId> {
        let span = root_span("create_reservation", &TraceId::new());
        let result = async {
            annotate_span(Some(req.time_slot_id), None);
            let r = self
                .core
                .create_reservation(req.time_slot_id, &req.user_email)
                .await?;
            annotate_span(None, Some(&r.id));
            Ok::<_, BookingError>(r.id)
        }
        .instrument(span)
        .await;

        respond(result)
    }

    /// `POST /payments/process`
    pub async fn process_payment(&self, req: PaymentProcessRequest) -> ApiResponse<PaymentResult> {
        let span = root_span("process_payment", &TraceId::new());
        let result = async {
            annotate_span(None, Some(&req.reservation_id));
            self.core
                .process_payment(req.reservation_id, req.decision)
                .await
        }
        .instrument(span)
        .await;

        respond(result)
    }

    /// `GET /reservations/{id}`
    pub async fn get_reservation(&self, id: ReservationId) -> ApiResponse<Reservation> {
        let span = root_span("get_reservation", &TraceId::new());
        let result = async {
            annotate_span(None, Some(&id));
            self.core.get_reservation(id).await
        }
        .instrument(span)
        .await;

        respond(result)
    }
}

fn respond<T>(result: Result<T, BookingError>) -> ApiResponse<T> {
    match result {
        Ok(data) => ApiResponse::ok(data),
        Err(e) => {
            let status = status_for(&e);
            if status >= 500 {
                error!(error = ?e, "request failed");
                ApiResponse::failure(status, "internal error")
            } else {
                ApiResponse::failure(status, e.to_string())
            }
        }
    }
}

pub fn status_for(e: &BookingError) -> u16 {
    match e {
        BookingError::Validation(_) => 400,
        BookingError::ResourceNotFound(_)
        | BookingError::SlotNotFound(_)
        | BookingError::ReservationNotFound(_) => 404,
        BookingError::SlotUnavailable(_) => 409,
        BookingError::Internal(_) => 500,
    }
}
