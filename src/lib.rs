use config::Config;
use identity::IdentityProvider;
use redis::Client as RedisClient;
use sqlx::PgPool;
use std::sync::Arc;

pub mod chat;
pub mod config;
pub mod database;
pub mod error;
pub mod guard;
pub mod identity;
pub mod middleware;
pub mod utils;

pub mod routes;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub redis: Arc<RedisClient>,
    pub identity: Arc<IdentityProvider>,
}
