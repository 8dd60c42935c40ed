pub mod user;
pub mod credentials;
pub mod trip;
pub mod booking;
pub mod pricing;
pub mod repository;
mod validation;

pub use booking::{Booking, BookingDraft, BookingStatus, NewBooking};
pub use repository::{BookingRepository, RepoError, RepoResult, TripRepository, UserRepository};
pub use trip::{NewTrip, Trip, TripDraft, TripFilter, TripStatus};
pub use user::{NewUser, ProviderProfile, Registration, Role, User, VerifyOutcome};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoreError {
    #[error("{0}")]
    ValidationError(String),
    #[error("Invalid or expired verification code.")]
    InvalidCode,
    #[error("{0}")]
    InvalidTransition(String),
    #[error("Only {available} seat(s) remaining, requested {requested}.")]
    InsufficientSeats { requested: u32, available: u32 },
    #[error("{0} is already booked.")]
    SeatUnavailable(String),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

impl CoreError {
    pub(crate) fn required(field: &str) -> Self {
        CoreError::ValidationError(format!("{} is required.", field))
    }

    pub fn already_verified() -> Self {
        CoreError::ValidationError("Email already verified.".to_string())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
