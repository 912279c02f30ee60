pub mod alerts;
pub mod authz;
pub mod controller;
pub mod database;
pub mod gateway;
pub mod identity;
pub mod memory;
pub mod routines;
pub mod schedule;
pub mod store;

pub use alerts::AlertAggregator;
pub use authz::AuthorizationEngine;
pub use controller::{ControllerFault, DoorAck, DoorCommand, DoorController, HttpDoorController};
pub use database::MongoDb;
pub use gateway::{CommandOrigin, DeviceGateway};
pub use identity::{IdentityResolver, JwtVerifier, TokenVerifier, VerifiedIdentity};
pub use memory::MemoryStore;
pub use routines::{RoutineEngine, RoutineState};
pub use schedule::Schedule;
pub use store::{AlertCursor, AlertPage, AlertQuery, AlertStore, RoutineStore, TenancyStore};
