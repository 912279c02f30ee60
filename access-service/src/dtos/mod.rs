mod alerts;
mod locations;
mod organizations;
mod principals;
mod routines;

pub use alerts::{AlertListParams, AlertListResponse, AlertResponse};
pub use locations::{
    AccessPointResponse, ApplyStateRequest, CreateAccessPointRequest, CreateLocationRequest,
    LocationResponse,
};
pub use organizations::{
    CreateOrganizationRequest, MembershipResponse, OrganizationResponse, UpsertMemberRequest,
};
pub use principals::SetPrincipalDisabledRequest;
pub use routines::{CreateRoutineRequest, RoutineResponse, SetRoutineEnabledRequest};
