use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use traveleasy_shared::Masked;
use uuid::Uuid;

use crate::validation::{is_email, required};
use crate::{CoreError, CoreResult};

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Traveler,
    Provider,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Traveler => "traveler",
            Role::Provider => "provider",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "traveler" => Ok(Role::Traveler),
            "provider" => Ok(Role::Provider),
            other => Err(CoreError::ValidationError(format!("Unknown role: {}", other))),
        }
    }
}

/// Extra profile carried by providers only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderProfile {
    pub travel_name: String,
    pub contact: String,
    pub vehicle: String,
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: Masked<String>,
    pub role: Role,
    pub provider: Option<ProviderProfile>,
    pub is_verified: bool,
    pub verification_code: Option<Masked<String>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    Verified,
    AlreadyVerified,
}

impl User {
    pub fn new(new_user: NewUser, password_hash: String, verification_code: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: new_user.name,
            email: new_user.email,
            password_hash: Masked(password_hash),
            role: new_user.role,
            provider: new_user.provider,
            is_verified: false,
            verification_code: Some(Masked(verification_code)),
            created_at: now,
            updated_at: now,
        }
    }

    /// Marks the account verified when `code` matches the outstanding one.
    /// Verifying an already verified account succeeds without change.
    pub fn verify_email(&mut self, code: &str) -> CoreResult<VerifyOutcome> {
        if self.is_verified {
            return Ok(VerifyOutcome::AlreadyVerified);
        }

        match &self.verification_code {
            Some(expected) if expected.expose() == code.trim() => {
                self.is_verified = true;
                self.verification_code = None;
                self.updated_at = Utc::now();
                Ok(VerifyOutcome::Verified)
            }
            _ => Err(CoreError::InvalidCode),
        }
    }

    pub fn reissue_code(&mut self, code: String) -> CoreResult<()> {
        if self.is_verified {
            return Err(CoreError::already_verified());
        }
        self.verification_code = Some(Masked(code));
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Registration payload as received; every field optional so that missing
/// fields surface as validation messages rather than parse failures.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<Masked<String>>,
    pub role: Option<Role>,
    pub travel_name: Option<String>,
    pub contact: Option<String>,
    pub vehicle: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: Masked<String>,
    pub role: Role,
    pub provider: Option<ProviderProfile>,
}

impl Registration {
    pub fn validate(self) -> CoreResult<NewUser> {
        let name = self.name.map(|v| v.trim().to_string()).unwrap_or_default();
        let email = self.email.map(|v| v.trim().to_lowercase()).unwrap_or_default();
        let password = self.password.map(Masked::into_inner).unwrap_or_default();

        if name.is_empty() || email.is_empty() || password.is_empty() {
            return Err(CoreError::ValidationError(
                "Name, email, and password are required".to_string(),
            ));
        }
        if !is_email(&email) {
            return Err(CoreError::ValidationError("Enter a valid email".to_string()));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(CoreError::ValidationError(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        let role = self.role.unwrap_or_default();
        let provider = match role {
            Role::Provider => {
                let missing = || {
                    CoreError::ValidationError(
                        "Provider must include travelName, contact, and vehicle".to_string(),
                    )
                };
                Some(ProviderProfile {
                    travel_name: required(self.travel_name, "travelName").map_err(|_| missing())?,
                    contact: required(self.contact, "contact").map_err(|_| missing())?,
                    vehicle: required(self.vehicle, "vehicle").map_err(|_| missing())?,
                })
            }
            Role::Traveler => None,
        };

        Ok(NewUser {
            name,
            email,
            password: Masked(password),
            role,
            provider,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(role: Option<Role>) -> Registration {
        Registration {
            name: Some(" Asha ".into()),
            email: Some("Asha@Example.com".into()),
            password: Some(Masked("secret1".into())),
            role,
            ..Default::default()
        }
    }

    #[test]
    fn test_traveler_registration_normalises() {
        let user = registration(None).validate().unwrap();
        assert_eq!(user.name, "Asha");
        assert_eq!(user.email, "asha@example.com");
        assert_eq!(user.role, Role::Traveler);
        assert!(user.provider.is_none());
    }

    #[test]
    fn test_provider_requires_profile() {
        let err = registration(Some(Role::Provider)).validate().unwrap_err();
        assert_eq!(
            err,
            CoreError::ValidationError("Provider must include travelName, contact, and vehicle".into())
        );

        let mut reg = registration(Some(Role::Provider));
        reg.travel_name = Some("Asha Travels".into());
        reg.contact = Some("9876543210".into());
        reg.vehicle = Some("MH12AB1234".into());
        let user = reg.validate().unwrap();
        assert_eq!(user.provider.unwrap().travel_name, "Asha Travels");
    }

    #[test]
    fn test_short_password_rejected() {
        let mut reg = registration(None);
        reg.password = Some(Masked("12345".into()));
        assert!(reg.validate().is_err());
    }

    #[test]
    fn test_verify_email_flow() {
        let new_user = registration(None).validate().unwrap();
        let mut user = User::new(new_user, "hash".into(), "042042".into());

        assert_eq!(user.verify_email("000000"), Err(CoreError::InvalidCode));
        assert!(!user.is_verified);

        assert_eq!(user.verify_email("042042"), Ok(VerifyOutcome::Verified));
        assert!(user.is_verified);
        assert!(user.verification_code.is_none());

        assert_eq!(user.verify_email("anything"), Ok(VerifyOutcome::AlreadyVerified));
        assert!(user.reissue_code("111111".into()).is_err());
    }

    #[test]
    fn test_role_round_trips_through_str() {
        assert_eq!("provider".parse::<Role>().unwrap(), Role::Provider);
        assert!("admin".parse::<Role>().is_err());
        assert_eq!(serde_json::to_string(&Role::Traveler).unwrap(), "\"traveler\"");
    }
}
