pub mod auth;
pub mod forms;
pub mod graphql;
pub mod home;
pub mod media;
pub mod problems;
