use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use crate::pricing;
use crate::trip::Trip;
use crate::validation::{
    is_person_name, is_phone, number_or_string, parse_date, required, required_number,
};
use crate::{CoreError, CoreResult};

/// A booking follows its trip through the same three states.
pub use crate::trip::TripStatus as BookingStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: Uuid,
    #[serde(rename = "trip")]
    pub trip_id: Uuid,
    pub booked_by: Uuid,
    pub source: String,
    pub destination: String,
    pub contact: String,
    pub traveler_name: String,
    pub traveler_number: String,
    pub seats_booked: Vec<String>,
    pub number_of_seats: u32,
    pub kilometers: f64,
    pub rate_per_km: f64,
    pub total_price: f64,
    pub date: String,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn new(booked_by: Uuid, new_booking: NewBooking) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            trip_id: new_booking.trip_id,
            booked_by,
            source: new_booking.source,
            destination: new_booking.destination,
            contact: new_booking.contact,
            traveler_name: new_booking.traveler_name,
            traveler_number: new_booking.traveler_number,
            seats_booked: new_booking.seats_booked,
            number_of_seats: new_booking.number_of_seats,
            kilometers: new_booking.kilometers,
            rate_per_km: new_booking.rate_per_km,
            total_price: new_booking.total_price,
            date: new_booking.date,
            status: BookingStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == BookingStatus::Active
    }

    /// Active → Cancelled. The caller releases `number_of_seats` on the trip.
    pub fn cancel(&mut self) -> CoreResult<()> {
        match self.status {
            BookingStatus::Active => {
                self.status = BookingStatus::Cancelled;
                self.updated_at = Utc::now();
                Ok(())
            }
            BookingStatus::Cancelled => Err(CoreError::InvalidTransition(
                "This booking is already cancelled.".to_string(),
            )),
            BookingStatus::Completed => Err(CoreError::InvalidTransition(
                "This booking is already completed.".to_string(),
            )),
        }
    }

    /// Active → Completed, driven by the trip completing.
    pub fn complete(&mut self) -> CoreResult<()> {
        if !self.is_active() {
            return Err(CoreError::InvalidTransition(format!("Booking already {}", self.status)));
        }
        self.status = BookingStatus::Completed;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Labels held by the active bookings among `bookings`.
pub fn held_seats<'a>(bookings: impl IntoIterator<Item = &'a Booking>) -> HashSet<String> {
    bookings
        .into_iter()
        .filter(|b| b.is_active())
        .flat_map(|b| b.seats_booked.iter().cloned())
        .collect()
}

/// Booking payload as received.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingDraft {
    pub trip: Option<Uuid>,
    pub source: Option<String>,
    pub destination: Option<String>,
    pub contact: Option<String>,
    pub traveler_name: Option<String>,
    pub traveler_number: Option<String>,
    pub seats_booked: Option<Vec<String>>,
    #[serde(default, deserialize_with = "number_or_string")]
    pub number_of_seats: Option<u32>,
    #[serde(default, deserialize_with = "number_or_string")]
    pub kilometers: Option<f64>,
    pub date: Option<String>,
    #[serde(default, deserialize_with = "number_or_string")]
    pub total_price: Option<f64>,
    #[serde(default, deserialize_with = "number_or_string")]
    pub rate_per_km: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub trip_id: Uuid,
    pub source: String,
    pub destination: String,
    pub contact: String,
    pub traveler_name: String,
    pub traveler_number: String,
    pub seats_booked: Vec<String>,
    pub number_of_seats: u32,
    pub kilometers: f64,
    pub rate_per_km: f64,
    pub total_price: f64,
    pub date: String,
}

impl BookingDraft {
    /// Checks the payload on its own and prices it at `rate_per_km`.
    /// A client-supplied rate or total must agree with the server's figures.
    pub fn validate(self, rate_per_km: f64) -> CoreResult<NewBooking> {
        let all_required = || CoreError::ValidationError("All required fields must be filled.".to_string());

        let trip_id = self.trip.ok_or_else(all_required)?;
        let source = required(self.source, "source").map_err(|_| all_required())?;
        let destination = required(self.destination, "destination").map_err(|_| all_required())?;
        let contact = required(self.contact, "contact").map_err(|_| all_required())?;
        let traveler_name = required(self.traveler_name, "travelerName").map_err(|_| all_required())?;
        let traveler_number =
            required(self.traveler_number, "travelerNumber").map_err(|_| all_required())?;
        let seats_booked: Vec<String> = self
            .seats_booked
            .unwrap_or_default()
            .into_iter()
            .map(|s| s.trim().to_string())
            .collect();
        if seats_booked.is_empty() {
            return Err(all_required());
        }
        let number_of_seats = required_number(self.number_of_seats, "numberOfSeats").map_err(|_| all_required())?;
        let kilometers = required_number(self.kilometers, "kilometers").map_err(|_| all_required())?;
        let date = required(self.date, "date").map_err(|_| all_required())?;

        if !is_person_name(&traveler_name) {
            return Err(CoreError::ValidationError("Invalid traveler name.".to_string()));
        }
        if !is_phone(&traveler_number) {
            return Err(CoreError::ValidationError(
                "Invalid traveler number. Must be 10-15 digits.".to_string(),
            ));
        }
        if !is_phone(&contact) {
            return Err(CoreError::ValidationError(
                "Invalid provider contact. Must be 10-15 digits.".to_string(),
            ));
        }
        parse_date(&date, "date")?;

        if number_of_seats == 0 {
            return Err(CoreError::ValidationError("Book at least one seat.".to_string()));
        }
        let distinct: HashSet<&String> = seats_booked.iter().collect();
        if distinct.len() != seats_booked.len() {
            return Err(CoreError::ValidationError("Seat labels must be distinct.".to_string()));
        }
        if seats_booked.len() != number_of_seats as usize {
            return Err(CoreError::ValidationError(format!(
                "numberOfSeats ({}) does not match the {} seat(s) selected.",
                number_of_seats,
                seats_booked.len()
            )));
        }
        if !kilometers.is_finite() || kilometers <= 0.0 {
            return Err(CoreError::ValidationError("Invalid kilometer value.".to_string()));
        }

        if let Some(client_rate) = self.rate_per_km {
            if !pricing::matches(client_rate, rate_per_km) {
                return Err(CoreError::ValidationError(format!(
                    "Rate per km ({}) does not match the current rate ({}).",
                    client_rate, rate_per_km
                )));
            }
        }
        let total_price = pricing::quote(kilometers, rate_per_km, number_of_seats);
        if let Some(client_total) = self.total_price {
            if !pricing::matches(client_total, total_price) {
                return Err(CoreError::ValidationError(format!(
                    "Total price ({}) does not match the computed fare ({}).",
                    client_total, total_price
                )));
            }
        }

        Ok(NewBooking {
            trip_id,
            source,
            destination,
            contact,
            traveler_name,
            traveler_number,
            seats_booked,
            number_of_seats,
            kilometers,
            rate_per_km,
            total_price,
            date,
        })
    }
}

impl NewBooking {
    /// Checks that only depend on the trip row, not on other bookings.
    pub fn check_against(&self, trip: &Trip) -> CoreResult<()> {
        if !pricing::matches(self.kilometers, trip.kilometer) {
            return Err(CoreError::ValidationError(format!(
                "Entered kilometers ({}) do not match the trip's distance ({}).",
                self.kilometers, trip.kilometer
            )));
        }
        if let Some(label) = self.seats_booked.iter().find(|l| !trip.has_seat(l)) {
            return Err(CoreError::ValidationError(format!("{} does not exist on this trip.", label)));
        }
        Ok(())
    }

    /// Full admission: route checks, seat labels free, capacity reserved on `trip`.
    pub fn admit(&self, trip: &mut Trip, held: &HashSet<String>) -> CoreResult<()> {
        self.check_against(trip)?;
        trip.reserve(self.number_of_seats)?;
        if let Some(label) = self.seats_booked.iter().find(|l| held.contains(*l)) {
            trip.release(self.number_of_seats);
            return Err(CoreError::SeatUnavailable(label.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trip::tests::trip;

    fn draft(trip_id: Uuid) -> BookingDraft {
        BookingDraft {
            trip: Some(trip_id),
            source: Some("Pune".into()),
            destination: Some("Mumbai".into()),
            contact: Some("9876543210".into()),
            traveler_name: Some("Ravi Kumar".into()),
            traveler_number: Some("9123456780".into()),
            seats_booked: Some(vec!["Seat 1".into(), "Seat 2".into()]),
            number_of_seats: Some(2),
            kilometers: Some(150.0),
            date: Some("2025-03-14".into()),
            total_price: Some(7800.0),
            rate_per_km: Some(26.0),
        }
    }

    #[test]
    fn test_validate_prices_booking() {
        let nb = draft(Uuid::new_v4()).validate(pricing::DEFAULT_RATE_PER_KM).unwrap();
        assert_eq!(nb.total_price, 7800.0);
        assert_eq!(nb.number_of_seats, 2);
    }

    #[test]
    fn test_validate_without_client_price() {
        let mut d = draft(Uuid::new_v4());
        d.total_price = None;
        d.rate_per_km = None;
        let nb = d.validate(30.0).unwrap();
        assert_eq!(nb.total_price, 9000.0);
        assert_eq!(nb.rate_per_km, 30.0);
    }

    #[test]
    fn test_draft_accepts_numeric_strings() {
        let d: BookingDraft = serde_json::from_value(serde_json::json!({
            "trip": Uuid::new_v4(),
            "source": "Pune",
            "destination": "Mumbai",
            "contact": "9876543210",
            "travelerName": "Ravi Kumar",
            "travelerNumber": "9123456780",
            "seatsBooked": ["Seat 1", "Seat 2"],
            "numberOfSeats": "2",
            "kilometers": "150",
            "date": "2025-03-14",
            "totalPrice": "7800",
            "ratePerKm": 26
        }))
        .unwrap();
        assert_eq!(d.number_of_seats, Some(2));
        assert_eq!(d.total_price, Some(7800.0));
        let nb = d.validate(pricing::DEFAULT_RATE_PER_KM).unwrap();
        assert_eq!(nb.kilometers, 150.0);
    }

    #[test]
    fn test_draft_rejects_non_numeric_string() {
        let parsed = serde_json::from_value::<BookingDraft>(serde_json::json!({
            "numberOfSeats": "two"
        }));
        assert!(parsed.is_err());
    }

    #[test]
    fn test_validate_rejects_tampered_price() {
        let mut d = draft(Uuid::new_v4());
        d.total_price = Some(100.0);
        assert!(d.validate(pricing::DEFAULT_RATE_PER_KM).is_err());

        let mut d = draft(Uuid::new_v4());
        d.rate_per_km = Some(1.0);
        assert!(d.validate(pricing::DEFAULT_RATE_PER_KM).is_err());
    }

    #[test]
    fn test_validate_field_rules() {
        let mut d = draft(Uuid::new_v4());
        d.seats_booked = Some(vec![]);
        assert_eq!(
            d.validate(26.0).unwrap_err(),
            CoreError::ValidationError("All required fields must be filled.".into())
        );

        let mut d = draft(Uuid::new_v4());
        d.traveler_name = Some("R2D2".into());
        assert_eq!(
            d.validate(26.0).unwrap_err(),
            CoreError::ValidationError("Invalid traveler name.".into())
        );

        let mut d = draft(Uuid::new_v4());
        d.seats_booked = Some(vec!["Seat 1".into(), "Seat 1".into()]);
        assert!(d.validate(26.0).is_err());

        let mut d = draft(Uuid::new_v4());
        d.number_of_seats = Some(3);
        assert!(d.validate(26.0).is_err());
    }

    #[test]
    fn test_admit_checks_distance_and_labels() {
        let mut t = trip();
        let mut d = draft(t.id);
        d.kilometers = Some(100.0);
        d.total_price = None;
        let nb = d.validate(26.0).unwrap();
        assert!(nb.admit(&mut t, &HashSet::new()).is_err());
        assert_eq!(t.booked_seats, 0);

        let mut d = draft(t.id);
        d.seats_booked = Some(vec!["Seat 1".into(), "Seat 9".into()]);
        let nb = d.validate(26.0).unwrap();
        assert!(nb.admit(&mut t, &HashSet::new()).is_err());
    }

    #[test]
    fn test_admit_rejects_held_seat_without_reserving() {
        let mut t = trip();
        let nb = draft(t.id).validate(26.0).unwrap();
        let held: HashSet<String> = ["Seat 2".to_string()].into_iter().collect();

        assert_eq!(
            nb.admit(&mut t, &held).unwrap_err(),
            CoreError::SeatUnavailable("Seat 2".into())
        );
        assert_eq!(t.booked_seats, 0);

        nb.admit(&mut t, &HashSet::new()).unwrap();
        assert_eq!(t.booked_seats, 2);
    }

    #[test]
    fn test_booking_transitions() {
        let t = trip();
        let nb = draft(t.id).validate(26.0).unwrap();
        let mut booking = Booking::new(Uuid::new_v4(), nb.clone());
        booking.cancel().unwrap();
        assert_eq!(booking.status, BookingStatus::Cancelled);
        assert_eq!(
            booking.cancel().unwrap_err(),
            CoreError::InvalidTransition("This booking is already cancelled.".into())
        );
        assert!(booking.complete().is_err());

        let mut booking = Booking::new(Uuid::new_v4(), nb);
        booking.complete().unwrap();
        assert!(booking.cancel().is_err());
    }

    #[test]
    fn test_held_seats_ignores_inactive() {
        let t = trip();
        let nb = draft(t.id).validate(26.0).unwrap();
        let active = Booking::new(Uuid::new_v4(), nb.clone());
        let mut cancelled = Booking::new(Uuid::new_v4(), nb);
        cancelled.seats_booked = vec!["Seat 3".into()];
        cancelled.cancel().unwrap();

        let held = held_seats([&active, &cancelled]);
        assert!(held.contains("Seat 1"));
        assert!(!held.contains("Seat 3"));
    }
}
