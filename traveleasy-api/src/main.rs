use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use traveleasy_api::mailer::{ConsoleMailer, Mailer, SmtpMailer};
use traveleasy_api::{app, state::{AppState, AuthConfig}};
use traveleasy_core::{BookingRepository, TripRepository, UserRepository};
use traveleasy_store::{
    Config, DbClient, MemoryRateLimiter, MemoryStore, PgBookingRepository, PgTripRepository,
    PgUserRepository, RateLimiter, RedisRateLimiter,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

type Repositories = (Arc<dyn UserRepository>, Arc<dyn TripRepository>, Arc<dyn BookingRepository>);

async fn repositories(config: &Config) -> anyhow::Result<Repositories> {
    match &config.database {
        Some(db) => {
            let client = DbClient::new(db.url.expose(), db.max_connections)
                .await
                .context("Failed to connect to Postgres")?;
            client.migrate().await.context("Failed to run migrations")?;
            let pool = client.pool;
            let users: Arc<dyn UserRepository> = Arc::new(PgUserRepository::new(pool.clone()));
            let trips: Arc<dyn TripRepository> = Arc::new(PgTripRepository::new(pool.clone()));
            let bookings: Arc<dyn BookingRepository> = Arc::new(PgBookingRepository::new(pool));
            Ok((users, trips, bookings))
        }
        None => {
            tracing::warn!("No database configured; using the in-memory store");
            let store = MemoryStore::new();
            let users: Arc<dyn UserRepository> = Arc::new(store.clone());
            let trips: Arc<dyn TripRepository> = Arc::new(store.clone());
            let bookings: Arc<dyn BookingRepository> = Arc::new(store);
            Ok((users, trips, bookings))
        }
    }
}

async fn rate_limiter(config: &Config) -> anyhow::Result<Arc<dyn RateLimiter>> {
    match &config.redis {
        Some(redis) => {
            let limiter = RedisRateLimiter::new(&redis.url)
                .await
                .context("Failed to connect to Redis")?;
            Ok(Arc::new(limiter))
        }
        None => Ok(Arc::new(MemoryRateLimiter::new())),
    }
}

fn mailer(config: &Config) -> anyhow::Result<Arc<dyn Mailer>> {
    match &config.mail {
        Some(mail) => Ok(Arc::new(SmtpMailer::new(mail).context("Invalid SMTP settings")?)),
        None => {
            tracing::warn!("SMTP not configured; verification codes will only be logged");
            Ok(Arc::new(ConsoleMailer))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "traveleasy_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting TravelEasy API on port {}", config.server.port);

    let (users, trips, bookings) = repositories(&config).await?;

    let app_state = AppState {
        users,
        trips,
        bookings,
        mailer: mailer(&config)?,
        limiter: rate_limiter(&config).await?,
        business_rules: config.business_rules.clone(),
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
            bcrypt_cost: config.auth.bcrypt_cost,
        },
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
