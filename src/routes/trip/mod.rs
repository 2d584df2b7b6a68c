mod handler;
pub mod model;

pub use handler::{
    create_trip,
    delete_trip,
    get_trip,
    list_all_trips,
    list_all_user_trips,
    list_upcoming_trips,
    list_user_trips,
    update_trip,
};
