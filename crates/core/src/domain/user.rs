use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Sales,
    Engineer,
    Management,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::Sales, Role::Engineer, Role::Management];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Sales => "sales",
            Self::Engineer => "engineer",
            Self::Management => "management",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "sales" => Ok(Self::Sales),
            "engineer" => Ok(Self::Engineer),
            "management" => Ok(Self::Management),
            other => Err(DomainError::Validation(format!(
                "invalid role `{other}` (expected admin|sales|engineer|management)"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn actor(&self) -> Actor {
        Actor { id: self.id.clone(), role: self.role }
    }
}

/// The authenticated principal on whose behalf an operation runs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Actor {
    pub id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self { id: UserId(id.into()), role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub role: Role,
}

impl NewUser {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.username.trim().is_empty() {
            return Err(DomainError::Validation("username is required".to_string()));
        }
        validate_email(&self.email)?;
        if self.full_name.trim().is_empty() {
            return Err(DomainError::Validation("full name is required".to_string()));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserPatch {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

impl UserPatch {
    pub fn validate(&self) -> Result<(), DomainError> {
        if let Some(email) = &self.email {
            validate_email(email)?;
        }
        if matches!(&self.full_name, Some(name) if name.trim().is_empty()) {
            return Err(DomainError::Validation("full name cannot be empty".to_string()));
        }
        Ok(())
    }
}

fn validate_email(email: &str) -> Result<(), DomainError> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(DomainError::Validation(format!("invalid email `{email}`"))),
    }
}

#[cfg(test)]
mod tests {
    use super::{NewUser, Role, UserPatch};

    #[test]
    fn role_parses_case_insensitively_and_rejects_unknown() {
        assert_eq!("Engineer".parse::<Role>().expect("role"), Role::Engineer);
        assert!("superuser".parse::<Role>().is_err());
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Management).expect("json"), "\"management\"");
    }

    #[test]
    fn new_user_requires_plausible_email() {
        let user = NewUser {
            username: "jdoe".to_string(),
            email: "not-an-email".to_string(),
            full_name: "Jane Doe".to_string(),
            role: Role::Sales,
        };
        assert!(user.validate().is_err());

        let user = NewUser { email: "jane@example.com".to_string(), ..user };
        user.validate().expect("valid user");
    }

    #[test]
    fn patch_rejects_blank_full_name() {
        let patch = UserPatch { full_name: Some(" ".to_string()), ..UserPatch::default() };
        assert!(patch.validate().is_err());
    }
}
