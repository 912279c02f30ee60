use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct SetPrincipalDisabledRequest {
    pub disabled: bool,
}
