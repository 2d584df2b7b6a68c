mod handler;
pub mod model;

pub use handler::{get_vehicle, list_vehicles, update_vehicle};
