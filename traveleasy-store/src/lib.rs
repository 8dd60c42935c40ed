pub mod app_config;
pub mod booking_repo;
pub mod database;
pub mod memory;
pub mod rate_limit;
pub mod redis_repo;
pub mod trip_repo;
pub mod user_repo;

pub use app_config::Config;
pub use booking_repo::PgBookingRepository;
pub use database::DbClient;
pub use memory::MemoryStore;
pub use rate_limit::{MemoryRateLimiter, RateLimiter};
pub use redis_repo::RedisRateLimiter;
pub use trip_repo::PgTripRepository;
pub use user_repo::PgUserRepository;
