mod handler;
pub mod model;

pub use handler::{
    create_marker,
    delete_marker,
    get_marker,
    list_trip_markers,
    owner_update_marker,
    update_marker,
};
