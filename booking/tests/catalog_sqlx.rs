use chrono::{NaiveDate, NaiveTime};
use sqlx::AnyPool;
use sqlx::any::AnyPoolOptions;
use uuid::Uuid;

use booking::catalog::model::{NewResource, NewTimeSlot, ResourceId};
use booking::catalog::repository::CatalogRepository;
use booking::catalog::repository_sqlx::SqlxCatalogRepository;
use booking::slot::model::SlotStatus;

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

fn date(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, d).unwrap()
}

fn hm(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn new_slot(resource_id: ResourceId, day: u32, start: u32, end: u32) -> NewTimeSlot {
    NewTimeSlot {
        resource_id,
        reservation_date: date(day),
        start_time: hm(start, 0),
        end_time: hm(end, 0),
    }
}

async fn room(catalog: &SqlxCatalogRepository, name: &str) -> ResourceId {
    catalog
        .create_resource(NewResource {
            name: name.into(),
            description: Some("second floor".into()),
            category: None,
        })
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn resources_are_listed_in_creation_order() {
    let catalog = SqlxCatalogRepository::new(setup_db().await);
    let a = room(&catalog, "Room A").await;
    let b = room(&catalog, "Room B").await;

    let listed = catalog.list_resources().await.unwrap();
    assert_eq!(listed.iter().map(|r| r.id).collect::<Vec<_>>(), vec![a, b]);
    assert_eq!(listed[0].description.as_deref(), Some("second floor"));
    assert_eq!(listed[0].category, None);

    assert!(catalog.fetch_resource(b).await.unwrap().is_some());
    assert!(catalog.fetch_resource(b + 100).await.unwrap().is_none());
}

#[tokio::test]
async fn time_slots_from_start_date_ordered_by_date_then_time() {
    let catalog = SqlxCatalogRepository::new(setup_db().await);
    let a = room(&catalog, "Room A").await;
    let b = room(&catalog, "Room B").await;

    let before = catalog.create_time_slot(new_slot(a, 1, 9, 10)).await.unwrap();
    let late = catalog.create_time_slot(new_slot(a, 3, 14, 15)).await.unwrap();
    let early = catalog.create_time_slot(new_slot(a, 3, 8, 9)).await.unwrap();
    let first = catalog.create_time_slot(new_slot(a, 2, 11, 12)).await.unwrap();
    catalog.create_time_slot(new_slot(b, 2, 11, 12)).await.unwrap();

    let slots = catalog.list_time_slots(a, date(2)).await.unwrap();
    let ids: Vec<_> = slots.iter().map(|s| s.id).collect();

    assert_eq!(ids, vec![first.id, early.id, late.id]);
    assert!(!ids.contains(&before.id));
    assert!(slots.iter().all(|s| s.status == SlotStatus::Available && s.version == 0));
    assert_eq!(slots[1].start_time, hm(8, 0));
}

#[tokio::test]
async fn invalid_slots_are_rejected() {
    let catalog = SqlxCatalogRepository::new(setup_db().await);
    let a = room(&catalog, "Room A").await;

    // ends before it starts
    assert!(catalog.create_time_slot(new_slot(a, 1, 10, 9)).await.is_err());
    // unknown resource
    assert!(catalog.create_time_slot(new_slot(a + 1, 1, 9, 10)).await.is_err());
    // exact duplicate
    catalog.create_time_slot(new_slot(a, 1, 9, 10)).await.unwrap();
    assert!(catalog.create_time_slot(new_slot(a, 1, 9, 10)).await.is_err());
}

#[tokio::test]
async fn blank_resource_name_is_rejected() {
    let catalog = SqlxCatalogRepository::new(setup_db().await);
    let res = catalog
        .create_resource(NewResource {
            name: "   ".into(),
            description: None,
            category: None,
        })
        .await;
    assert!(res.is_err());
}

#[tokio::test]
async fn storage_failures_carry_context() {
    let pool = setup_db().await;
    let catalog = SqlxCatalogRepository::new(pool.clone());
    let a = room(&catalog, "Room A").await;

    sqlx::query("DROP TABLE time_slots;").execute(&pool).await.unwrap();
    let err = catalog.list_time_slots(a, date(1)).await.unwrap_err();
    assert!(
        format!("{err:#}").contains(&format!("time slot listing failed for resource {a}")),
        "{err:#}"
    );

    sqlx::query("DROP TABLE resources;").execute(&pool).await.unwrap();
    let err = catalog.list_resources().await.unwrap_err();
    assert!(format!("{err:#}").contains("resource listing failed"), "{err:#}");

    let err = catalog.fetch_resource(a).await.unwrap_err();
    assert!(
        format!("{err:#}").contains(&format!("resource {a} lookup failed")),
        "{err:#}"
    );
}
