use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use traveleasy_shared::Masked;
use uuid::Uuid;

use crate::validation::{
    is_pan, is_phone, is_vehicle_number, number_or_string, parse_date, parse_time, required,
    required_number,
};
use crate::{CoreError, CoreResult};

const MAX_NAME_LEN: usize = 100;
pub const MAX_SEATS: u32 = 100;

/// Lifecycle shared by trips and the bookings made on them.
/// `Completed` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TripStatus {
    Active,
    Completed,
    Cancelled,
}

impl TripStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TripStatus::Active => "Active",
            TripStatus::Completed => "Completed",
            TripStatus::Cancelled => "Cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TripStatus::Active)
    }

    /// Query-string filter; anything other than a known status means "no filter".
    pub fn from_filter(value: Option<&str>) -> Option<Self> {
        value.and_then(|v| v.parse().ok())
    }
}

impl std::fmt::Display for TripStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TripStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Active" => Ok(TripStatus::Active),
            "Completed" => Ok(TripStatus::Completed),
            "Cancelled" => Ok(TripStatus::Cancelled),
            other => Err(CoreError::ValidationError(format!("Unknown status: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub id: Uuid,
    #[serde(rename = "creator")]
    pub creator_id: Uuid,
    pub status: TripStatus,
    pub name: String,
    pub seats: u32,
    #[serde(rename = "bookedseats")]
    pub booked_seats: u32,
    pub date: String,
    pub time: String,
    pub meet_place: String,
    pub source: String,
    pub destination: String,
    pub kilometer: f64,
    pub contact: String,
    pub vehicle: String,
    pub vehicle_type: String,
    /// Kept for records, never echoed back to clients.
    #[serde(skip_serializing)]
    pub pan_card: Masked<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Trip {
    pub fn new(creator_id: Uuid, new_trip: NewTrip) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            creator_id,
            status: TripStatus::Active,
            name: new_trip.name,
            seats: new_trip.seats,
            booked_seats: 0,
            date: new_trip.date,
            time: new_trip.time,
            meet_place: new_trip.meet_place,
            source: new_trip.source,
            destination: new_trip.destination,
            kilometer: new_trip.kilometer,
            contact: new_trip.contact,
            vehicle: new_trip.vehicle,
            vehicle_type: new_trip.vehicle_type,
            pan_card: new_trip.pan_card,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn remaining_seats(&self) -> u32 {
        self.seats.saturating_sub(self.booked_seats)
    }

    /// Claims `count` seats. Fails when the trip is no longer active or
    /// fewer than `count` seats remain.
    pub fn reserve(&mut self, count: u32) -> CoreResult<()> {
        if self.status != TripStatus::Active {
            return Err(CoreError::InvalidTransition(format!(
                "Trip is {} and can no longer be booked.",
                self.status
            )));
        }
        if self.remaining_seats() == 0 {
            return Err(CoreError::ValidationError("All seats are already booked.".to_string()));
        }
        if count > self.remaining_seats() {
            return Err(CoreError::InsufficientSeats {
                requested: count,
                available: self.remaining_seats(),
            });
        }

        self.booked_seats += count;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn release(&mut self, count: u32) {
        self.booked_seats = self.booked_seats.saturating_sub(count);
        self.updated_at = Utc::now();
    }

    /// Active → Completed
    pub fn complete(&mut self) -> CoreResult<()> {
        self.transition(TripStatus::Completed)
    }

    /// Active → Cancelled. Every seat goes back to the pool.
    pub fn cancel(&mut self) -> CoreResult<()> {
        self.transition(TripStatus::Cancelled)?;
        self.booked_seats = 0;
        Ok(())
    }

    fn transition(&mut self, to: TripStatus) -> CoreResult<()> {
        if self.status.is_terminal() {
            return Err(CoreError::InvalidTransition(format!("Trip already {}", self.status)));
        }
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn has_seat(&self, label: &str) -> bool {
        seat_number(label).is_some_and(|n| (1..=self.seats).contains(&n))
    }

    /// Labels not held by any active booking, in seat order.
    pub fn available_seat_labels(&self, held: &HashSet<String>) -> Vec<String> {
        seat_labels(self.seats)
            .into_iter()
            .filter(|label| !held.contains(label))
            .collect()
    }
}

pub fn seat_label(n: u32) -> String {
    format!("Seat {}", n)
}

pub fn seat_labels(seats: u32) -> Vec<String> {
    (1..=seats).map(seat_label).collect()
}

fn seat_number(label: &str) -> Option<u32> {
    label.strip_prefix("Seat ")?.parse().ok()
}

/// Listing criteria; results are always newest first.
#[derive(Debug, Clone, Default)]
pub struct TripFilter {
    pub creator: Option<Uuid>,
    pub status: Option<TripStatus>,
}

impl TripFilter {
    pub fn matches(&self, trip: &Trip) -> bool {
        self.creator.map_or(true, |c| c == trip.creator_id)
            && self.status.map_or(true, |s| s == trip.status)
    }
}

/// Trip publication payload as received.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripDraft {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "number_or_string")]
    pub seats: Option<u32>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub meet_place: Option<String>,
    pub source: Option<String>,
    pub destination: Option<String>,
    #[serde(default, deserialize_with = "number_or_string")]
    pub kilometer: Option<f64>,
    pub contact: Option<String>,
    pub vehicle: Option<String>,
    pub vehicle_type: Option<String>,
    pub pan_card: Option<Masked<String>>,
}

#[derive(Debug, Clone)]
pub struct NewTrip {
    pub name: String,
    pub seats: u32,
    pub date: String,
    pub time: String,
    pub meet_place: String,
    pub source: String,
    pub destination: String,
    pub kilometer: f64,
    pub contact: String,
    pub vehicle: String,
    pub vehicle_type: String,
    pub pan_card: Masked<String>,
}

impl TripDraft {
    pub fn validate(self) -> CoreResult<NewTrip> {
        let name = required(self.name, "name")?;
        let seats = required_number(self.seats, "seats")?;
        let date = required(self.date, "date")?;
        let time = required(self.time, "time")?;
        let meet_place = required(self.meet_place, "meetPlace")?;
        let source = required(self.source, "source")?;
        let destination = required(self.destination, "destination")?;
        let kilometer = required_number(self.kilometer, "kilometer")?;
        let contact = required(self.contact, "contact")?;
        let vehicle = required(self.vehicle, "vehicle")?;
        let vehicle_type = required(self.vehicle_type, "vehicleType")?;
        let pan_card = required(self.pan_card.map(Masked::into_inner), "panCard")?;

        if name.chars().count() > MAX_NAME_LEN {
            return Err(CoreError::ValidationError(format!(
                "Trip name cannot be more than {} characters.",
                MAX_NAME_LEN
            )));
        }
        if seats < 1 {
            return Err(CoreError::ValidationError("Must offer at least 1 seat.".to_string()));
        }
        if seats > MAX_SEATS {
            return Err(CoreError::ValidationError(format!(
                "Cannot offer more than {} seats.",
                MAX_SEATS
            )));
        }
        if !kilometer.is_finite() || kilometer < 1.0 {
            return Err(CoreError::ValidationError("Invalid kilometer value.".to_string()));
        }
        parse_date(&date, "date")?;
        parse_time(&time, "time")?;
        if !is_phone(&contact) {
            return Err(CoreError::ValidationError("Invalid contact number.".to_string()));
        }

        let vehicle = vehicle.to_uppercase();
        if !is_vehicle_number(&vehicle) {
            return Err(CoreError::ValidationError("Invalid vehicle number.".to_string()));
        }
        let pan_card = pan_card.to_uppercase();
        if !is_pan(&pan_card) {
            return Err(CoreError::ValidationError("Invalid PAN card number.".to_string()));
        }

        Ok(NewTrip {
            name,
            seats,
            date,
            time,
            meet_place,
            source,
            destination,
            kilometer,
            contact,
            vehicle,
            vehicle_type: vehicle_type.to_uppercase(),
            pan_card: Masked(pan_card),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn draft() -> TripDraft {
        TripDraft {
            name: Some("Pune to Mumbai Express".into()),
            seats: Some(4),
            date: Some("2025-03-14".into()),
            time: Some("07:30".into()),
            meet_place: Some("Shivajinagar bus stand".into()),
            source: Some("Pune".into()),
            destination: Some("Mumbai".into()),
            kilometer: Some(150.0),
            contact: Some("9876543210".into()),
            vehicle: Some("mh 12 ab 1234".into()),
            vehicle_type: Some("suv".into()),
            pan_card: Some(Masked("abcde1234f".into())),
        }
    }

    pub(crate) fn trip() -> Trip {
        Trip::new(Uuid::new_v4(), draft().validate().unwrap())
    }

    #[test]
    fn test_draft_normalises_case() {
        let new_trip = draft().validate().unwrap();
        assert_eq!(new_trip.vehicle, "MH 12 AB 1234");
        assert_eq!(new_trip.vehicle_type, "SUV");
        assert_eq!(new_trip.pan_card.expose(), "ABCDE1234F");
    }

    #[test]
    fn test_draft_reports_first_missing_field() {
        let mut d = draft();
        d.meet_place = None;
        assert_eq!(
            d.validate().unwrap_err(),
            CoreError::ValidationError("meetPlace is required.".into())
        );
    }

    #[test]
    fn test_draft_rejects_bad_values() {
        let mut d = draft();
        d.kilometer = Some(0.5);
        assert!(d.validate().is_err());

        let mut d = draft();
        d.seats = Some(0);
        assert!(d.validate().is_err());

        let mut d = draft();
        d.seats = Some(MAX_SEATS + 1);
        assert_eq!(
            d.validate().unwrap_err(),
            CoreError::ValidationError("Cannot offer more than 100 seats.".into())
        );

        let mut d = draft();
        d.seats = Some(MAX_SEATS);
        assert!(d.validate().is_ok());

        let mut d = draft();
        d.pan_card = Some(Masked("ABCDE12345".into()));
        assert_eq!(
            d.validate().unwrap_err(),
            CoreError::ValidationError("Invalid PAN card number.".into())
        );

        let mut d = draft();
        d.contact = Some("12345".into());
        assert!(d.validate().is_err());

        let mut d = draft();
        d.name = Some("x".repeat(101));
        assert!(d.validate().is_err());
    }

    #[test]
    fn test_reserve_and_release() {
        let mut t = trip();
        t.reserve(3).unwrap();
        assert_eq!(t.remaining_seats(), 1);

        assert_eq!(
            t.reserve(2).unwrap_err(),
            CoreError::InsufficientSeats { requested: 2, available: 1 }
        );

        t.reserve(1).unwrap();
        assert_eq!(
            t.reserve(1).unwrap_err(),
            CoreError::ValidationError("All seats are already booked.".into())
        );

        t.release(10);
        assert_eq!(t.booked_seats, 0);
    }

    #[test]
    fn test_terminal_states() {
        let mut t = trip();
        t.complete().unwrap();
        assert_eq!(t.status, TripStatus::Completed);
        assert!(t.complete().is_err());
        assert!(t.cancel().is_err());
        assert!(t.reserve(1).is_err());

        let mut t = trip();
        t.reserve(2).unwrap();
        t.cancel().unwrap();
        assert_eq!(t.status, TripStatus::Cancelled);
        assert_eq!(t.booked_seats, 0);
    }

    #[test]
    fn test_seat_labels() {
        let t = trip();
        assert!(t.has_seat("Seat 1"));
        assert!(t.has_seat("Seat 4"));
        assert!(!t.has_seat("Seat 5"));
        assert!(!t.has_seat("Seat 0"));
        assert!(!t.has_seat("seat 1"));

        let held: HashSet<String> = ["Seat 2".to_string()].into_iter().collect();
        assert_eq!(t.available_seat_labels(&held), vec!["Seat 1", "Seat 3", "Seat 4"]);
    }

    #[test]
    fn test_status_filter_ignores_unknown() {
        assert_eq!(TripStatus::from_filter(Some("Active")), Some(TripStatus::Active));
        assert_eq!(TripStatus::from_filter(Some("Pending")), None);
        assert_eq!(TripStatus::from_filter(None), None);
    }

    #[test]
    fn test_draft_accepts_numeric_strings() {
        let d: TripDraft = serde_json::from_value(serde_json::json!({
            "name": "Pune to Mumbai Express",
            "seats": "4",
            "date": "2025-03-14",
            "time": "07:30",
            "meetPlace": "Shivajinagar bus stand",
            "source": "Pune",
            "destination": "Mumbai",
            "kilometer": "150",
            "contact": "9876543210",
            "vehicle": "MH 12 AB 1234",
            "vehicleType": "SUV",
            "panCard": "ABCDE1234F"
        }))
        .unwrap();
        assert_eq!(d.seats, Some(4));
        assert_eq!(d.kilometer, Some(150.0));

        let d: TripDraft =
            serde_json::from_value(serde_json::json!({ "seats": 4, "kilometer": 150.5 })).unwrap();
        assert_eq!(d.seats, Some(4));
        assert_eq!(d.kilometer, Some(150.5));

        let d: TripDraft = serde_json::from_value(serde_json::json!({ "seats": " " })).unwrap();
        assert_eq!(d.seats, None);
    }

    #[test]
    fn test_trip_json_field_names() {
        let value = serde_json::to_value(trip()).unwrap();
        assert_eq!(value["bookedseats"], 0);
        assert_eq!(value["meetPlace"], "Shivajinagar bus stand");
        assert!(value.get("panCard").is_none());
        assert_eq!(value["status"], "Active");
        assert!(value.get("creator").is_some());
    }
}
