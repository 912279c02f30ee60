pub mod access_points;
pub mod alerts;
pub mod health;
pub mod locations;
pub mod organizations;
pub mod principals;
pub mod routines;

pub use access_points::{apply_state, delete_access_point, get_access_point};
pub use alerts::list_alerts;
pub use health::health_check;
pub use locations::{
    create_access_point, create_location, delete_location, get_location, list_access_points,
    list_locations,
};
pub use organizations::{
    create_organization, delete_organization, get_organization, remove_member, upsert_member,
};
pub use principals::set_principal_disabled;
pub use routines::{create_routine, delete_routine, list_routines, set_routine_enabled};
