// Identity domain - pure types and rules, storage lives in the repository
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MAX_NAME_LEN: usize = 100;
pub const DELETE_CONFIRMATION: &str = "DELETE";
pub const MAX_AVATAR_BYTES: usize = 2 * 1024 * 1024;

/// Normalised email address (trimmed, lowercase)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Email(String);

impl Email {
    pub fn parse(raw: &str) -> Result<Self, AccountError> {
        let email = raw.trim().to_lowercase();
        let valid = match email.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty()
                    && domain.contains('.')
                    && !domain.starts_with('.')
                    && !domain.ends_with('.')
                    && !email.contains(char::is_whitespace)
            }
            None => false,
        };
        if !valid {
            return Err(AccountError::InvalidEmail);
        }
        Ok(Self(email))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What an identity is allowed to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    ReportProblem,
    Comment,
    UpdateStatus,
    ViewDashboard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[serde(alias = "user")]
    Citizen,
    Agent,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Citizen => "citizen",
            Self::Agent => "agent",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "citizen" | "user" => Some(Self::Citizen),
            "agent" => Some(Self::Agent),
            _ => None,
        }
    }

    pub fn grants(&self, capability: Capability) -> bool {
        match capability {
            Capability::ReportProblem | Capability::Comment => true,
            Capability::UpdateStatus | Capability::ViewDashboard => {
                matches!(self, Self::Agent)
            }
        }
    }
}

/// A registered account, as carried in sessions and handed to the domain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: String,
    pub name: String,
    pub email: Email,
    pub role: Role,
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Identity {
    /// New citizen account. Registration never hands out the agent role.
    pub fn register(email: Email, name: &str, now: DateTime<Utc>) -> Result<Self, AccountError> {
        Ok(Self {
            id: uuid::Uuid::now_v7().to_string(),
            name: validate_name(name)?,
            email,
            role: Role::Citizen,
            avatar: None,
            created_at: now.trunc_subsecs(6),
        })
    }

    pub fn can(&self, capability: Capability) -> bool {
        self.role.grants(capability)
    }

    /// Apply a profile edit. Only name and avatar are mutable.
    pub fn apply_profile(self, update: ProfileUpdate) -> Result<Self, AccountError> {
        if let Some(ref email) = update.email {
            let requested = Email::parse(email)?;
            if requested != self.email {
                return Err(AccountError::EmailImmutable);
            }
        }

        let name = match update.name {
            Some(name) => validate_name(&name)?,
            None => self.name,
        };
        let avatar = match update.avatar {
            AvatarChange::Keep => self.avatar,
            AvatarChange::Set(url) => Some(url),
            AvatarChange::Remove => None,
        };

        Ok(Self {
            name,
            avatar,
            ..self
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum AvatarChange {
    #[default]
    Keep,
    Set(String),
    Remove,
}

#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    /// Echo of the email; rejected if it differs from the stored one
    pub email: Option<String>,
    pub avatar: AvatarChange,
}

pub fn validate_name(name: &str) -> Result<String, AccountError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AccountError::NameRequired);
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(AccountError::NameTooLong);
    }
    Ok(name.to_string())
}

pub fn validate_password(password: &str) -> Result<(), AccountError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AccountError::WeakPassword);
    }
    Ok(())
}

pub fn validate_avatar(content_type: &str, len: usize) -> Result<(), AccountError> {
    if !content_type.trim().to_ascii_lowercase().starts_with("image/") {
        return Err(AccountError::AvatarNotImage);
    }
    if len > MAX_AVATAR_BYTES {
        return Err(AccountError::AvatarTooLarge);
    }
    Ok(())
}

pub fn check_delete_confirmation(confirmation: &str) -> Result<(), AccountError> {
    if confirmation != DELETE_CONFIRMATION {
        return Err(AccountError::DeleteNotConfirmed);
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub enum AccountError {
    UserExists,
    InvalidCredentials,
    UserNotFound,
    InvalidEmail,
    EmailImmutable,
    NameRequired,
    NameTooLong,
    WeakPassword,
    WrongPassword,
    AvatarNotImage,
    AvatarTooLarge,
    DeleteNotConfirmed,
}

impl fmt::Display for AccountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UserExists => write!(f, "User already exists"),
            Self::InvalidCredentials => write!(f, "Invalid credentials"),
            Self::UserNotFound => write!(f, "User not found"),
            Self::InvalidEmail => write!(f, "Invalid email address"),
            Self::EmailImmutable => write!(f, "Email cannot be changed"),
            Self::NameRequired => write!(f, "Name is required"),
            Self::NameTooLong => {
                write!(f, "Name must be {} characters or less", MAX_NAME_LEN)
            }
            Self::WeakPassword => write!(
                f,
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            ),
            Self::WrongPassword => write!(f, "Current password is incorrect"),
            Self::AvatarNotImage => write!(f, "Avatar must be an image"),
            Self::AvatarTooLarge => write!(f, "Avatar must be 2 MB or less"),
            Self::DeleteNotConfirmed => {
                write!(f, "Type \"{}\" to confirm account deletion", DELETE_CONFIRMATION)
            }
        }
    }
}

impl std::error::Error for AccountError {}
