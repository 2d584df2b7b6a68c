mod handler;
pub mod model;

pub use handler::{check_username, list_users, sync_database, update_user_role};
