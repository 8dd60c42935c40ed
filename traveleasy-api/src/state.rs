use std::sync::Arc;
use traveleasy_core::{BookingRepository, TripRepository, UserRepository};
use traveleasy_shared::Masked;
use traveleasy_store::app_config::BusinessRules;
use traveleasy_store::RateLimiter;

use crate::mailer::Mailer;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: Masked<String>,
    pub expiration: u64,
    pub bcrypt_cost: u32,
}

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepository>,
    pub trips: Arc<dyn TripRepository>,
    pub bookings: Arc<dyn BookingRepository>,
    pub mailer: Arc<dyn Mailer>,
    pub limiter: Arc<dyn RateLimiter>,
    pub auth: AuthConfig,
    pub business_rules: BusinessRules,
}
