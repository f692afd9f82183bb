pub mod attendance;
pub mod correction;
pub mod entity;
pub mod settings;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Identity of whoever triggered a mutating call. Authorization happens
/// upstream; this is kept purely for audit attribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Actor {
    #[schema(example = "usr-1042")]
    pub id: String,
    #[schema(example = "Front Desk Kiosk 2")]
    pub name: String,
    #[schema(example = "staff")]
    pub role: String,
}

impl Actor {
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: impl Into<String>) -> Self {
        Self { id: id.into(), name: name.into(), role: role.into() }
    }

    /// Attribution used when the system itself acts (expiry sweeps).
    pub fn system() -> Self {
        Self::new("system", "system", "system")
    }
}
