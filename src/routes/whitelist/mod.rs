mod handler;
pub mod model;

pub use handler::{add_email, check_email, get_whitelist, remove_email};
