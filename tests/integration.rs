use chrono::{DateTime, TimeZone, Utc};
use fleet_dispatch::config::Config;
use fleet_dispatch::engine::lifecycle::DRIVER_SETTLEMENT_FRACTION;
use fleet_dispatch::error::DispatchError;
use fleet_dispatch::events::payloads::RoomEvent;
use fleet_dispatch::events::router::{customer_room, delivery_room, driver_room, ADMIN_ROOM};
use fleet_dispatch::guard::Actor;
use fleet_dispatch::models::delivery::{Delivery, DeliveryStatus, GeoPoint, Location};
use fleet_dispatch::models::driver::Driver;
use fleet_dispatch::models::tracking::{LocationSample, MovementStatus};
use fleet_dispatch::models::vehicle::{Vehicle, VehicleStatus, VehicleType};
use fleet_dispatch::models::window::TimeWindow;
use fleet_dispatch::state::AppState;
use tokio::sync::broadcast::error::TryRecvError;
use uuid::Uuid;

fn setup() -> AppState {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("warn"))
        .with_test_writer()
        .try_init();
    AppState::new(Config::default())
}

fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, hour, minute, 0).unwrap()
}

fn window(start: (u32, u32), end: (u32, u32)) -> TimeWindow {
    TimeWindow::new(at(start.0, start.1), at(end.0, end.1)).unwrap()
}

fn location(address: &str, lat: f64, lng: f64) -> Location {
    Location {
        address: address.to_string(),
        coordinates: GeoPoint { lat, lng },
    }
}

fn new_delivery(state: &AppState, customer_id: Uuid, window: TimeWindow) -> Delivery {
    let mut delivery = Delivery::new(
        customer_id,
        location("12 Pickup Lane", 52.52, 13.405),
        location("7 Drop Street", 52.54, 13.42),
        window,
    );
    delivery.payment.amount = Some(100.0);
    state.store.insert_delivery(delivery)
}

fn drain_status_updates(rx: &mut tokio::sync::broadcast::Receiver<RoomEvent>) -> Vec<DeliveryStatus> {
    let mut seen = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(RoomEvent::StatusUpdate(update)) => seen.push(update.status),
            Ok(_) => {}
            Err(TryRecvError::Empty) => break,
            Err(err) => panic!("unexpected receive error: {err}"),
        }
    }
    seen
}

#[tokio::test]
async fn full_assignment_flow() {
    let state = setup();
    let driver = state.store.insert_driver(Driver::new("Dispatch Dan"));
    let vehicle = state
        .store
        .insert_vehicle(Vehicle::new("B-FD 100", VehicleType::Van, 500.0));
    let delivery = new_delivery(&state, Uuid::new_v4(), window((10, 0), (11, 0)));

    state.router.join_room(driver.id, &driver_room(driver.id));
    let mut driver_rx = state.transport.subscribe(&driver_room(driver.id));

    let assigned = state.assignment.auto_assign(delivery.id).await.unwrap();
    assert_eq!(assigned.status, DeliveryStatus::Assigned);
    assert_eq!(assigned.driver_id, Some(driver.id));
    assert_eq!(assigned.vehicle_id, Some(vehicle.id));
    assert!(assigned.assigned_at.is_some());

    let driver = state.store.driver(driver.id).unwrap();
    assert!(!driver.is_available);
    assert_eq!(driver.total_deliveries, 1);

    let vehicle = state.store.vehicle(vehicle.id).unwrap();
    assert_eq!(vehicle.status, VehicleStatus::InUse);
    assert_eq!(vehicle.assigned_driver, Some(driver.id));

    match driver_rx.try_recv().unwrap() {
        RoomEvent::DriverAssigned(payload) => {
            assert_eq!(payload.booking_id, delivery.id);
            assert_eq!(payload.vehicle_type, Some(VehicleType::Van));
            assert_eq!(payload.payment.amount, Some(100.0));
        }
        other => panic!("expected driverAssigned, got {}", other.name()),
    }
}

#[tokio::test]
async fn auto_assign_on_non_pending_delivery_fails_without_mutation() {
    let state = setup();
    state.store.insert_driver(Driver::new("a"));
    state
        .store
        .insert_vehicle(Vehicle::new("V-1", VehicleType::Van, 500.0));
    let delivery = new_delivery(&state, Uuid::new_v4(), window((10, 0), (11, 0)));

    state.assignment.auto_assign(delivery.id).await.unwrap();
    let before = state.store.delivery(delivery.id).unwrap();

    let second = state.assignment.auto_assign(delivery.id).await;
    assert!(matches!(second, Err(DispatchError::AlreadyAssigned(id)) if id == delivery.id));

    let after = state.store.delivery(delivery.id).unwrap();
    assert_eq!(after.status, before.status);
    assert_eq!(after.driver_id, before.driver_id);
    assert_eq!(after.recent_updates.len(), before.recent_updates.len());
}

#[tokio::test]
async fn auto_assign_without_candidates_reports_which_pool_is_empty() {
    let state = setup();
    let delivery = new_delivery(&state, Uuid::new_v4(), window((10, 0), (11, 0)));

    let result = state.assignment.auto_assign(delivery.id).await;
    assert!(matches!(result, Err(DispatchError::NoAvailableDriver)));

    state.store.insert_driver(Driver::new("a"));
    let result = state.assignment.auto_assign(delivery.id).await;
    assert!(matches!(result, Err(DispatchError::NoAvailableVehicle)));
}

#[tokio::test]
async fn overlapping_window_conflicts_but_touching_window_does_not() {
    let state = setup();
    state.store.insert_driver(Driver::new("A"));
    state
        .store
        .insert_vehicle(Vehicle::new("V-1", VehicleType::Van, 500.0));
    state
        .store
        .insert_vehicle(Vehicle::new("V-2", VehicleType::Van, 500.0));

    // D1 [10:00, 11:00) commits against the only driver.
    let d1 = new_delivery(&state, Uuid::new_v4(), window((10, 0), (11, 0)));
    state.assignment.auto_assign(d1.id).await.unwrap();

    // D2 [10:30, 11:30) overlaps D1.
    let d2 = new_delivery(&state, Uuid::new_v4(), window((10, 30), (11, 30)));
    let result = state.assignment.auto_assign(d2.id).await;
    assert!(matches!(result, Err(DispatchError::NoAvailableDriver)));

    // D3 [11:00, 12:00) only touches D1's boundary.
    let d3 = new_delivery(&state, Uuid::new_v4(), window((11, 0), (12, 0)));
    let assigned = state.assignment.auto_assign(d3.id).await.unwrap();
    assert_eq!(assigned.status, DeliveryStatus::Assigned);
}

#[tokio::test]
async fn manual_assign_revalidates_conflicts_and_requires_admin() {
    let state = setup();
    let driver = state.store.insert_driver(Driver::new("A"));
    let vehicle = state
        .store
        .insert_vehicle(Vehicle::new("V-1", VehicleType::Van, 500.0));
    let other_vehicle = state
        .store
        .insert_vehicle(Vehicle::new("V-2", VehicleType::Van, 500.0));

    let d1 = new_delivery(&state, Uuid::new_v4(), window((10, 0), (11, 0)));
    let admin = Actor::admin(Uuid::new_v4());
    state
        .assignment
        .manual_assign(d1.id, driver.id, vehicle.id, &admin)
        .await
        .unwrap();

    // Same driver, overlapping window: the commit-time re-check rejects it.
    let d2 = new_delivery(&state, Uuid::new_v4(), window((10, 30), (11, 30)));
    let result = state
        .assignment
        .manual_assign(d2.id, driver.id, other_vehicle.id, &admin)
        .await;
    assert!(matches!(result, Err(DispatchError::Conflict(_))));

    let customer = Actor::customer(Uuid::new_v4());
    let result = state
        .assignment
        .manual_assign(d2.id, driver.id, other_vehicle.id, &customer)
        .await;
    assert!(matches!(result, Err(DispatchError::Unauthorized(_))));
}

#[tokio::test]
async fn concurrent_auto_assigns_over_one_driver_commit_exactly_once() {
    let state = setup();
    state.store.insert_driver(Driver::new("only"));
    state
        .store
        .insert_vehicle(Vehicle::new("V-1", VehicleType::Van, 500.0));
    state
        .store
        .insert_vehicle(Vehicle::new("V-2", VehicleType::Van, 500.0));

    let d1 = new_delivery(&state, Uuid::new_v4(), window((10, 0), (11, 0)));
    let d2 = new_delivery(&state, Uuid::new_v4(), window((10, 30), (11, 30)));

    let (r1, r2) = tokio::join!(
        state.assignment.auto_assign(d1.id),
        state.assignment.auto_assign(d2.id)
    );

    let successes = [&r1, &r2].iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "exactly one of two racing assignments may commit");

    let loser = if r1.is_ok() { r2 } else { r1 };
    assert!(matches!(
        loser,
        Err(DispatchError::NoAvailableDriver) | Err(DispatchError::Conflict(_))
    ));
}

#[tokio::test]
async fn delivered_side_effects_settle_driver_and_release_vehicle() {
    let state = setup();
    let driver = state.store.insert_driver(Driver::new("A"));
    let vehicle = state
        .store
        .insert_vehicle(Vehicle::new("V-1", VehicleType::Van, 500.0));
    let delivery = new_delivery(&state, Uuid::new_v4(), window((10, 0), (11, 0)));

    state.assignment.auto_assign(delivery.id).await.unwrap();

    let driver_actor = Actor::driver(driver.id);
    state
        .lifecycle
        .transition(delivery.id, DeliveryStatus::OnRoute, &driver_actor, None, None)
        .await
        .unwrap();
    state
        .lifecycle
        .transition(delivery.id, DeliveryStatus::PickedUp, &driver_actor, None, None)
        .await
        .unwrap();
    let done = state
        .lifecycle
        .transition(delivery.id, DeliveryStatus::Delivered, &driver_actor, None, None)
        .await
        .unwrap();

    assert_eq!(done.status, DeliveryStatus::Delivered);
    assert!(done.actual_pickup_time.is_some());
    assert!(done.actual_delivery_time.is_some());

    let driver = state.store.driver(driver.id).unwrap();
    assert!(driver.is_available);
    assert_eq!(driver.completed_deliveries, 1);
    assert!((driver.total_earnings - 100.0 * DRIVER_SETTLEMENT_FRACTION).abs() < 1e-9);

    let vehicle = state.store.vehicle(vehicle.id).unwrap();
    assert_eq!(vehicle.status, VehicleStatus::Available);
    assert_eq!(vehicle.assigned_driver, None);
    assert_eq!(
        vehicle.current_location,
        Some(done.drop_location.coordinates)
    );
}

#[tokio::test]
async fn delivered_event_reaches_each_room_exactly_once() {
    let state = setup();
    let driver = state.store.insert_driver(Driver::new("A"));
    state
        .store
        .insert_vehicle(Vehicle::new("V-1", VehicleType::Van, 500.0));
    let customer_id = Uuid::new_v4();
    let delivery = new_delivery(&state, customer_id, window((10, 0), (11, 0)));

    state.assignment.auto_assign(delivery.id).await.unwrap();
    let driver_actor = Actor::driver(driver.id);
    state
        .lifecycle
        .transition(delivery.id, DeliveryStatus::PickedUp, &driver_actor, None, None)
        .await
        .unwrap();

    // Subscribe after the earlier transitions so only the delivered
    // emission is observed.
    let mut delivery_rx = state.transport.subscribe(&delivery_room(delivery.id));
    let mut customer_rx = state.transport.subscribe(&customer_room(customer_id));
    let mut admin_rx = state.transport.subscribe(ADMIN_ROOM);

    state
        .lifecycle
        .transition(delivery.id, DeliveryStatus::Delivered, &driver_actor, None, None)
        .await
        .unwrap();

    for rx in [&mut delivery_rx, &mut customer_rx, &mut admin_rx] {
        let statuses = drain_status_updates(rx);
        assert_eq!(statuses, vec![DeliveryStatus::Delivered]);
    }
}

#[tokio::test]
async fn illegal_and_unauthorized_transitions_are_rejected() {
    let state = setup();
    let driver = state.store.insert_driver(Driver::new("A"));
    state
        .store
        .insert_vehicle(Vehicle::new("V-1", VehicleType::Van, 500.0));
    let customer_id = Uuid::new_v4();
    let delivery = new_delivery(&state, customer_id, window((10, 0), (11, 0)));

    // pending -> delivered is outside the table regardless of actor.
    let admin = Actor::admin(Uuid::new_v4());
    let result = state
        .lifecycle
        .transition(delivery.id, DeliveryStatus::Delivered, &admin, None, None)
        .await;
    assert!(matches!(result, Err(DispatchError::Conflict(_))));

    state.assignment.auto_assign(delivery.id).await.unwrap();

    // assigned -> delivered skips picked-up.
    let driver_actor = Actor::driver(driver.id);
    let result = state
        .lifecycle
        .transition(delivery.id, DeliveryStatus::Delivered, &driver_actor, None, None)
        .await;
    assert!(matches!(result, Err(DispatchError::Conflict(_))));

    // A stranger driver cannot drive someone else's delivery.
    let stranger = Actor::driver(Uuid::new_v4());
    let result = state
        .lifecycle
        .transition(delivery.id, DeliveryStatus::OnRoute, &stranger, None, None)
        .await;
    assert!(matches!(result, Err(DispatchError::Unauthorized(_))));
}

#[tokio::test]
async fn cancellation_releases_resources_and_keeps_the_record() {
    let state = setup();
    let driver = state.store.insert_driver(Driver::new("A"));
    let vehicle = state
        .store
        .insert_vehicle(Vehicle::new("V-1", VehicleType::Van, 500.0));
    let customer_id = Uuid::new_v4();
    let delivery = new_delivery(&state, customer_id, window((10, 0), (11, 0)));

    state.assignment.auto_assign(delivery.id).await.unwrap();

    let owner = Actor::customer(customer_id);
    let cancelled = state
        .lifecycle
        .transition(delivery.id, DeliveryStatus::Cancelled, &owner, None, None)
        .await
        .unwrap();
    assert_eq!(cancelled.status, DeliveryStatus::Cancelled);

    let driver = state.store.driver(driver.id).unwrap();
    assert!(driver.is_available);
    assert_eq!(driver.cancelled_deliveries, 1);
    assert_eq!(driver.completed_deliveries, 0);
    assert_eq!(driver.total_earnings, 0.0);

    let vehicle = state.store.vehicle(vehicle.id).unwrap();
    assert_eq!(vehicle.status, VehicleStatus::Available);

    // The record is retained and terminal: no further transition commits.
    let retained = state.store.delivery(delivery.id).unwrap();
    assert_eq!(retained.status, DeliveryStatus::Cancelled);
    let admin = Actor::admin(Uuid::new_v4());
    let result = state
        .lifecycle
        .transition(delivery.id, DeliveryStatus::Cancelled, &admin, None, None)
        .await;
    assert!(matches!(result, Err(DispatchError::Conflict(_))));
}

#[tokio::test]
async fn location_ingestion_validates_ownership_and_fans_out() {
    let state = setup();
    let driver = state.store.insert_driver(Driver::new("A"));
    let vehicle = state
        .store
        .insert_vehicle(Vehicle::new("V-1", VehicleType::Van, 500.0));
    let delivery = new_delivery(&state, Uuid::new_v4(), window((10, 0), (11, 0)));

    state.assignment.auto_assign(delivery.id).await.unwrap();

    let mut delivery_rx = state.transport.subscribe(&delivery_room(delivery.id));
    let mut admin_rx = state.transport.subscribe(ADMIN_ROOM);

    let sample = LocationSample {
        delivery_id: delivery.id,
        driver_id: driver.id,
        vehicle_id: vehicle.id,
        location: GeoPoint { lat: 52.53, lng: 13.41 },
        speed: Some(38.0),
        heading: Some(90.0),
        status: Some(MovementStatus::Moving),
        timestamp: at(10, 15),
    };
    let point = state
        .router
        .ingest_location(sample.clone())
        .await
        .unwrap()
        .expect("fresh sample should be stored");
    assert_eq!(point.location.lat, 52.53);

    let vehicle = state.store.vehicle(vehicle.id).unwrap();
    assert_eq!(
        vehicle.current_location,
        Some(GeoPoint { lat: 52.53, lng: 13.41 })
    );
    assert_eq!(state.store.recent_tracking(delivery.id, 50).len(), 1);

    for rx in [&mut delivery_rx, &mut admin_rx] {
        match rx.try_recv().unwrap() {
            RoomEvent::LocationUpdate(update) => {
                assert_eq!(update.delivery_id, delivery.id);
                assert_eq!(update.speed, Some(38.0));
            }
            other => panic!("expected locationUpdate, got {}", other.name()),
        }
    }

    // Stale sample: same timestamp, silently dropped.
    let dropped = state.router.ingest_location(sample).await.unwrap();
    assert!(dropped.is_none());
    assert_eq!(state.store.recent_tracking(delivery.id, 50).len(), 1);

    // A driver who does not hold the delivery is rejected.
    let intruder = LocationSample {
        delivery_id: delivery.id,
        driver_id: Uuid::new_v4(),
        vehicle_id: vehicle.id,
        location: GeoPoint { lat: 0.0, lng: 0.0 },
        speed: None,
        heading: None,
        status: None,
        timestamp: at(10, 20),
    };
    let result = state.router.ingest_location(intruder).await;
    assert!(matches!(result, Err(DispatchError::Unauthorized(_))));
}

#[tokio::test]
async fn audit_trail_records_every_transition_in_order() {
    let state = setup();
    let driver = state.store.insert_driver(Driver::new("A"));
    state
        .store
        .insert_vehicle(Vehicle::new("V-1", VehicleType::Van, 500.0));
    let delivery = new_delivery(&state, Uuid::new_v4(), window((10, 0), (11, 0)));

    state.assignment.auto_assign(delivery.id).await.unwrap();
    let driver_actor = Actor::driver(driver.id);
    for target in [
        DeliveryStatus::OnRoute,
        DeliveryStatus::PickedUp,
        DeliveryStatus::Delivered,
    ] {
        state
            .lifecycle
            .transition(delivery.id, target, &driver_actor, None, Some("ok".to_string()))
            .await
            .unwrap();
    }

    let trail: Vec<DeliveryStatus> = state
        .store
        .audit_trail(delivery.id)
        .into_iter()
        .map(|update| update.status)
        .collect();
    assert_eq!(
        trail,
        vec![
            DeliveryStatus::Assigned,
            DeliveryStatus::OnRoute,
            DeliveryStatus::PickedUp,
            DeliveryStatus::Delivered,
        ]
    );

    let cached = state.store.delivery(delivery.id).unwrap().recent_updates;
    assert_eq!(cached.len(), 4);
}
