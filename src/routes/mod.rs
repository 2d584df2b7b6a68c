pub mod chat;
pub mod passenger;
pub mod ping;
pub mod trip;
pub mod user;
pub mod vehicle;
pub mod whitelist;
