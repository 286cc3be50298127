use serde::{Deserialize, Serialize};

use crate::utils::eq_ignore_case;

/// The identity record associated with an authenticated session.
///
/// Role is a free-form tag ("admin", "faculty", "student") consumed by
/// authorization decisions in the view layer; the server is inconsistent
/// about casing, so comparisons go through [`Principal::has_role`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    pub id: i64,
    pub email: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    #[serde(rename = "fullName")]
    pub full_name: String,
    #[serde(rename = "isActive")]
    pub is_active: bool,
    #[serde(rename = "isAdmin")]
    pub is_admin: bool,
    pub role: String,
}

impl Principal {
    /// Case-insensitive role check.
    pub fn has_role(&self, role: &str) -> bool {
        eq_ignore_case(&self.role, role)
    }

    /// Whether this principal is eligible for unattended session renewal.
    pub fn is_elevated(&self) -> bool {
        self.is_admin || self.has_role("admin")
    }
}

/// Credential endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}
