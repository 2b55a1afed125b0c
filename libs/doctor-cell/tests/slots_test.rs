use std::collections::BTreeSet;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use assert_matches::assert_matches;
use uuid::Uuid;

use doctor_cell::models::{AvailabilityWindow, BookedInterval, DoctorError};
use doctor_cell::services::slots::{
    build_availability, generate_slots, is_bookable, is_on_grid, reconcile_slots, validate_availability,
};
use shared_models::TimeWindow;

fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 20, hour, minute, 0).unwrap()
}

fn booking(hour: u32, minute: u32, duration_minutes: i32, status: &str) -> BookedInterval {
    BookedInterval {
        date_time: at(hour, minute),
        duration_minutes,
        status: status.to_string(),
    }
}

fn stored_window(start: DateTime<Utc>, end: DateTime<Utc>) -> AvailabilityWindow {
    AvailabilityWindow {
        doctor_id: Uuid::new_v4(),
        date: NaiveDate::from_ymd_opt(2025, 6, 20).unwrap(),
        start_time: start,
        end_time: end,
        available_slots: None,
    }
}

#[test]
fn generates_quarter_hour_slots_before_end() {
    let slots: Vec<_> = generate_slots(at(9, 0), at(10, 0), 15).collect();
    assert_eq!(slots, vec![at(9, 0), at(9, 15), at(9, 30), at(9, 45)]);
}

#[test]
fn partial_trailing_slot_is_still_generated() {
    let slots: Vec<_> = generate_slots(at(9, 0), at(9, 40), 15).collect();
    assert_eq!(slots, vec![at(9, 0), at(9, 15), at(9, 30)]);
    assert_eq!(generate_slots(at(9, 0), at(9, 40), 15).len(), 3);
}

#[test]
fn reported_length_counts_sub_second_remainders() {
    let end = at(9, 15) + Duration::milliseconds(500);
    let slots = generate_slots(at(9, 0), end, 15);

    assert_eq!(slots.len(), 2);
    assert_eq!(slots.collect::<Vec<_>>(), vec![at(9, 0), at(9, 15)]);

    let mut walked = generate_slots(at(9, 0), at(9, 30) + Duration::nanoseconds(1), 15);
    walked.next();
    assert_eq!(walked.len(), 2);
}

#[test]
fn inverted_or_empty_window_yields_no_slots() {
    assert_eq!(generate_slots(at(10, 0), at(9, 0), 15).count(), 0);
    assert_eq!(generate_slots(at(9, 0), at(9, 0), 15).count(), 0);
    assert_eq!(generate_slots(at(9, 0), at(10, 0), 0).count(), 0);
}

#[test]
fn generated_sequence_is_restartable() {
    let slots = generate_slots(at(9, 0), at(11, 0), 15);
    let first_pass: Vec<_> = slots.clone().collect();
    let second_pass: Vec<_> = slots.collect();
    assert_eq!(first_pass.len(), 8);
    assert_eq!(first_pass, second_pass);
}

#[test]
fn bookable_requires_listing_and_future_start() {
    let available: BTreeSet<_> = [at(9, 0), at(9, 30)].into_iter().collect();

    assert!(is_bookable(at(9, 30), &available, at(9, 10)));
    assert!(!is_bookable(at(9, 15), &available, at(9, 10)));
    // Still listed but already started
    assert!(!is_bookable(at(9, 0), &available, at(9, 10)));
    assert!(!is_bookable(at(9, 30), &available, at(9, 30)));
}

#[test]
fn live_bookings_consume_every_overlapped_slot() {
    let bookings = vec![
        booking(9, 30, 30, "confirmed"),
        booking(10, 30, 15, "pending"),
        booking(11, 0, 60, "cancelled"),
        booking(11, 15, 15, "completed"),
    ];

    let open = reconcile_slots(generate_slots(at(9, 0), at(12, 0), 15), 15, &bookings);

    assert!(open.contains(&at(9, 0)));
    assert!(!open.contains(&at(9, 30)));
    assert!(!open.contains(&at(9, 45)));
    assert!(open.contains(&at(10, 0)));
    assert!(!open.contains(&at(10, 30)));
    assert!(open.contains(&at(11, 0)));
    assert!(open.contains(&at(11, 15)));
    assert_eq!(open.len(), 12 - 3);
}

#[test]
fn off_grid_booking_blocks_both_touched_slots() {
    let open = reconcile_slots(
        generate_slots(at(9, 0), at(10, 0), 15),
        15,
        &[booking(9, 10, 15, "confirmed")],
    );
    assert_eq!(open.into_iter().collect::<Vec<_>>(), vec![at(9, 30), at(9, 45)]);
}

#[test]
fn booking_without_duration_still_takes_its_slot() {
    let open = reconcile_slots(
        generate_slots(at(9, 0), at(10, 0), 15),
        15,
        &[booking(9, 15, 0, "pending")],
    );
    assert!(!open.contains(&at(9, 15)));
    assert_eq!(open.len(), 3);
}

#[test]
fn grid_check_is_relative_to_window_start() {
    let window = TimeWindow::new(at(9, 5), at(10, 5));
    assert!(is_on_grid(at(9, 20), &window, 15));
    assert!(!is_on_grid(at(9, 15), &window, 15));
    assert!(!is_on_grid(at(10, 5), &window, 15));
}

#[test]
fn curated_slots_off_the_grid_are_dropped() {
    let mut stored = stored_window(at(9, 0), at(10, 0));
    stored.available_slots = Some(vec![at(9, 0), at(9, 7), at(9, 45), at(10, 0)]);

    let availability = build_availability(&stored, &[booking(9, 45, 15, "confirmed")], 15);

    assert_eq!(availability.available_slots.into_iter().collect::<Vec<_>>(), vec![at(9, 0)]);
}

#[test]
fn built_availability_satisfies_slot_invariant() {
    let stored = stored_window(at(8, 0), at(17, 0));
    let availability = build_availability(&stored, &[booking(12, 0, 60, "confirmed")], 15);

    assert_eq!(availability.available_slots.len(), 36 - 4);
    tokio_test::assert_ok!(validate_availability(&availability, 15));
}

#[test]
fn validation_rejects_slot_outside_window() {
    let stored = stored_window(at(9, 0), at(10, 0));
    let mut availability = build_availability(&stored, &[], 15);
    availability.available_slots.insert(at(10, 0) + Duration::minutes(15));

    assert_matches!(
        validate_availability(&availability, 15),
        Err(DoctorError::InvalidAvailability(_))
    );
}

#[test]
fn empty_window_builds_empty_availability() {
    let stored = stored_window(at(17, 0), at(9, 0));
    let availability = build_availability(&stored, &[], 15);
    assert!(availability.available_slots.is_empty());
    tokio_test::assert_ok!(validate_availability(&availability, 15));
}
