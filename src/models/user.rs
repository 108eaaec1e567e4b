// src/models/user.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'users' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,

    /// Unique username.
    pub username: String,

    /// Argon2 password hash.
    /// Skipped during serialization to prevent leaking sensitive data.
    #[serde(skip)]
    pub password: String,

    /// Role: 'undergrad', 'postgrad', 'admin' or 'super'.
    pub role: String,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

pub const ROLE_UNDERGRAD: &str = "undergrad";
pub const ROLE_POSTGRAD: &str = "postgrad";
pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_SUPER: &str = "super";

/// DTO for creating a new user (Registration).
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(
        min = 3,
        max = 50,
        message = "Username length must be between 3 and 50 characters."
    ))]
    pub username: String,
    #[validate(length(
        min = 4,
        max = 128,
        message = "Password length must be between 4 and 128 characters."
    ))]
    pub password: String,
    /// Self-registration is limited to the submitter roles.
    #[validate(custom(function = validate_user_role))]
    pub role: Option<String>,
}

fn validate_user_role(role: &str) -> Result<(), validator::ValidationError> {
    if role != ROLE_UNDERGRAD && role != ROLE_POSTGRAD {
        return Err(validator::ValidationError::new("invalid_role"));
    }
    Ok(())
}

/// DTO for user login.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 50))]
    pub username: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}
