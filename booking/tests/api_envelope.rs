use chrono::{NaiveDate, NaiveTime};
use sqlx::AnyPool;
use sqlx::any::AnyPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use booking::api::dto::{PaymentProcessRequest, ReservationRequest, TimeSlotQuery};
use booking::api::handlers::BookingApi;
use booking::catalog::model::{NewResource, NewTimeSlot, ResourceId};
use booking::catalog::repository::CatalogRepository;
use booking::catalog::repository_sqlx::SqlxCatalogRepository;
use booking::ledger::model::{PaymentDecision, ReservationStatus};
use booking::metrics::counters::Counters;
use booking::orchestrator::BookingCore;
use booking::payment::types::PaymentResult;
use booking::slot::model::{SlotId, SlotStatus};

async fn setup_db() -> AnyPool {
    sqlx::any::install_default_drivers();

    let db_name = Uuid::new_v4().to_string();
    let conn = format!("sqlite:file:{}?mode=memory&cache=shared", db_name);

    let pool = AnyPoolOptions::new()
        .max_connections(5)
        .connect(&conn)
        .await
        .expect("connect sqlite memory db");

    booking::db::schema::migrate(&pool).await.expect("migrate");
    pool
}

async fn setup() -> (BookingApi, ResourceId, SlotId) {
    let pool = setup_db().await;
    let catalog = SqlxCatalogRepository::new(pool.clone());

    let resource = catalog
        .create_resource(NewResource {
            name: "Meeting room".into(),
            description: Some("6 seats".into()),
            category: None,
        })
        .await
        .unwrap();
    let slot = catalog
        .create_time_slot(NewTimeSlot {
            resource_id: resource.id,
            reservation_date: NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
        })
        .await
        .unwrap();

    let core = BookingCore::with_sqlx(pool, Duration::from_secs(300), Counters::default());
    (BookingApi::new(Arc::new(core)), resource.id, slot.id)
}

#[tokio::test]
async fn booking_flow_through_envelopes() {
    let (api, resource_id, slot_id) = setup().await;

    let resources = api.get_resources().await.into_result().unwrap();
    assert_eq!(resources.len(), 1);
    assert_eq!(resources[0].name, "Meeting room");

    let query = TimeSlotQuery {
        resource_id,
        start_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
    };
    let slots = api.get_time_slots(query.clone()).await.into_result().unwrap();
    assert_eq!(slots.len(), 1);
    assert_eq!(slots[0].status, SlotStatus::Available);

    let reservation_id = api
        .create_reservation(ReservationRequest {
            time_slot_id: slot_id,
            user_email: "guest@example.com".into(),
        })
        .await
        .into_result()
        .unwrap();

    let result = api
        .process_payment(PaymentProcessRequest {
            reservation_id,
            decision: PaymentDecision::Success,
        })
        .await;
    assert_eq!(result.status, 200);
    assert_eq!(
        serde_json::to_value(&result).unwrap()["data"],
        serde_json::json!("CONFIRMED")
    );

    let reservation = api.get_reservation(reservation_id).await.into_result().unwrap();
    assert_eq!(reservation.status, ReservationStatus::Confirmed);

    let slots = api.get_time_slots(query).await.into_result().unwrap();
    assert_eq!(slots[0].status, SlotStatus::Reserved);
}

#[tokio::test]
async fn reservation_id_travels_as_uuid_string() {
    let (api, _, slot_id) = setup().await;

    let res = api
        .create_reservation(ReservationRequest {
            time_slot_id: slot_id,
            user_email: "guest@example.com".into(),
        })
        .await;
    let json = serde_json::to_value(&res).unwrap();

    let raw = json["data"].as_str().expect("reservation id is a string");
    let id = Uuid::parse_str(raw).unwrap();
    assert_eq!(res.data, Some(id));

    // A client echoing it back in the payment request round-trips.
    let req: PaymentProcessRequest = serde_json::from_value(serde_json::json!({
        "reservationId": raw,
        "decision": "SUCCESS",
    }))
    .unwrap();
    assert_eq!(
        api.process_payment(req).await.into_result().unwrap(),
        PaymentResult::Confirmed
    );
}

#[tokio::test]
async fn taken_slot_is_a_409_business_error() {
    let (api, _, slot_id) = setup().await;
    let req = |email: &str| ReservationRequest {
        time_slot_id: slot_id,
        user_email: email.into(),
    };

    assert!(api.create_reservation(req("a@example.com")).await.is_success());

    let err = api
        .create_reservation(req("b@example.com"))
        .await
        .into_result()
        .unwrap_err();
    assert_eq!(err.status, 409);
    assert!(err.message.contains("no longer available"), "{}", err.message);
}

#[tokio::test]
async fn bad_input_and_unknown_ids_map_to_4xx() {
    let (api, resource_id, slot_id) = setup().await;

    let bad_email = api
        .create_reservation(ReservationRequest {
            time_slot_id: slot_id,
            user_email: "not-an-email".into(),
        })
        .await;
    assert_eq!(bad_email.status, 400);
    assert_eq!(bad_email.data, None);

    let unknown_slot = api
        .create_reservation(ReservationRequest {
            time_slot_id: slot_id + 1,
            user_email: "a@example.com".into(),
        })
        .await;
    assert_eq!(unknown_slot.status, 404);

    let unknown_resource = api
        .get_time_slots(TimeSlotQuery {
            resource_id: resource_id + 1,
            start_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
        })
        .await;
    assert_eq!(unknown_resource.status, 404);

    let unknown_reservation = api
        .process_payment(PaymentProcessRequest {
            reservation_id: Uuid::new_v4(),
            decision: PaymentDecision::Fail,
        })
        .await;
    assert_eq!(unknown_reservation.status, 404);
}

#[tokio::test]
async fn duplicate_payment_reports_already_processed() {
    let (api, _, slot_id) = setup().await;

    let reservation_id = api
        .create_reservation(ReservationRequest {
            time_slot_id: slot_id,
            user_email: "guest@example.com".into(),
        })
        .await
        .into_result()
        .unwrap();

    let pay = || PaymentProcessRequest {
        reservation_id,
        decision: PaymentDecision::Fail,
    };

    assert_eq!(
        api.process_payment(pay()).await.into_result().unwrap(),
        PaymentResult::Released
    );
    assert_eq!(
        api.process_payment(pay()).await.into_result().unwrap(),
        PaymentResult::AlreadyProcessed
    );
}
