//! Warden profile as served by the admin worker.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Warden {
    #[serde(default, alias = "warden_id")]
    pub id: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub gender: Option<String>,
    /// Hostel the warden is responsible for; this is the cache scope.
    pub hostel: Option<String>,
    pub created_at: Option<String>,
}

impl Warden {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Warden")
    }
}

/// Editable profile fields. Only the fields that are set are sent.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WardenProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
}

impl WardenProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.phone.is_none() && self.gender.is_none()
    }

    /// Merge the sent fields into a locally held profile after the server
    /// accepted them.
    pub fn apply_to(&self, warden: &mut Warden) {
        if let Some(ref name) = self.name {
            warden.name = Some(name.clone());
        }
        if let Some(ref email) = self.email {
            warden.email = Some(email.clone());
        }
        if let Some(ref phone) = self.phone {
            warden.phone = Some(phone.clone());
        }
        if let Some(ref gender) = self.gender {
            warden.gender = Some(gender.clone());
        }
    }
}
