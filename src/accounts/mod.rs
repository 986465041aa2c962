pub mod domain;
pub mod repository;

pub use domain::{
    AccountError, AvatarChange, Capability, Email, Identity, ProfileUpdate, Role,
};
pub use repository::{AccountRepository, DynAccountRepository, SqliteAccountRepository};
