mod handler;

pub use handler::{add_members, get_trip_group, list_groups};
