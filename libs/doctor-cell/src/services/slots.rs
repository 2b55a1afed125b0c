use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use shared_models::TimeWindow;

use crate::models::{AvailabilityWindow, BookedInterval, DoctorAvailability, DoctorError};

/// Lazy walk over the slot grid of a window.
///
/// Cloning yields an independent iterator starting from the same position,
/// so a generated sequence can be replayed as often as needed.
#[derive(Debug, Clone)]
pub struct SlotIter {
    next: DateTime<Utc>,
    end: DateTime<Utc>,
    step: Duration,
}

impl Iterator for SlotIter {
    type Item = DateTime<Utc>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.step <= Duration::zero() || self.next >= self.end {
            return None;
        }
        let slot = self.next;
        self.next = slot + self.step;
        Some(slot)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.step <= Duration::zero() || self.next >= self.end {
            return (0, Some(0));
        }
        let remaining = nanos(self.end - self.next);
        let step = nanos(self.step).max(1);
        let count = usize::try_from((remaining + step - 1) / step).unwrap_or(usize::MAX);
        (count, Some(count))
    }
}

// Exact below ~292 years; millisecond precision beyond that.
fn nanos(span: Duration) -> i128 {
    match span.num_nanoseconds() {
        Some(n) => i128::from(n),
        None => i128::from(span.num_milliseconds()) * 1_000_000,
    }
}

impl ExactSizeIterator for SlotIter {}

/// Instants at `granularity_minutes` spacing from `start`, strictly before `end`.
///
/// An inverted or empty window, or a non-positive granularity, yields nothing.
pub fn generate_slots(start: DateTime<Utc>, end: DateTime<Utc>, granularity_minutes: i64) -> SlotIter {
    SlotIter {
        next: start,
        end,
        step: Duration::minutes(granularity_minutes),
    }
}

/// A slot can be booked only while it is still listed and still ahead of `now`.
pub fn is_bookable(slot: DateTime<Utc>, available_slots: &BTreeSet<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    slot > now && available_slots.contains(&slot)
}

pub fn is_on_grid(slot: DateTime<Utc>, window: &TimeWindow, granularity_minutes: i64) -> bool {
    if granularity_minutes <= 0 || !window.contains(slot) {
        return false;
    }
    let offset = (slot - window.start).num_seconds();
    offset % (granularity_minutes * 60) == 0
}

/// Candidate slots not overlapped by any live booking.
///
/// A booking without a usable duration still consumes the slot it starts in.
pub fn reconcile_slots(
    candidates: impl Iterator<Item = DateTime<Utc>>,
    granularity_minutes: i64,
    bookings: &[BookedInterval],
) -> BTreeSet<DateTime<Utc>> {
    let slot_length = Duration::minutes(granularity_minutes);
    let busy: Vec<TimeWindow> = bookings
        .iter()
        .filter(|booking| booking.is_active())
        .map(|booking| {
            let booked = booking.window();
            if booked.is_empty() {
                TimeWindow::starting_at(booking.date_time, slot_length)
            } else {
                booked
            }
        })
        .collect();

    candidates
        .filter(|slot| {
            let slot_window = TimeWindow::starting_at(*slot, slot_length);
            !busy.iter().any(|booked| booked.overlaps(&slot_window))
        })
        .collect()
}

/// Build the reconciled availability for a stored window.
///
/// A curated slot list is honoured but entries off the grid are dropped.
pub fn build_availability(
    stored: &AvailabilityWindow,
    bookings: &[BookedInterval],
    granularity_minutes: i64,
) -> DoctorAvailability {
    let window = stored.window();

    let available_slots = match &stored.available_slots {
        Some(curated) => {
            let on_grid: Vec<DateTime<Utc>> = curated
                .iter()
                .copied()
                .filter(|slot| {
                    let keep = is_on_grid(*slot, &window, granularity_minutes);
                    if !keep {
                        warn!("Dropping off-grid slot {} for doctor {}", slot, stored.doctor_id);
                    }
                    keep
                })
                .collect();
            reconcile_slots(on_grid.into_iter(), granularity_minutes, bookings)
        }
        None => reconcile_slots(
            generate_slots(window.start, window.end, granularity_minutes),
            granularity_minutes,
            bookings,
        ),
    };

    debug!(
        "Doctor {} has {} open slots on {}",
        stored.doctor_id,
        available_slots.len(),
        stored.date
    );

    DoctorAvailability {
        doctor_id: stored.doctor_id,
        date: stored.date,
        start_time: stored.start_time,
        end_time: stored.end_time,
        available_slots,
    }
}

/// Check the slot invariant: every slot on the grid inside `[start_time, end_time)`.
pub fn validate_availability(
    availability: &DoctorAvailability,
    granularity_minutes: i64,
) -> Result<(), DoctorError> {
    let window = availability.window();
    if let Some(slot) = availability
        .available_slots
        .iter()
        .find(|slot| !is_on_grid(**slot, &window, granularity_minutes))
    {
        return Err(DoctorError::InvalidAvailability(format!(
            "slot {} is not on the {}-minute grid of [{}, {})",
            slot, granularity_minutes, window.start, window.end
        )));
    }
    Ok(())
}
