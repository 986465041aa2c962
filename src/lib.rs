// Library exports for Bhimdatta
// This allows integration tests and external code to use Bhimdatta modules

pub mod accounts;
pub mod app;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod graphql;
pub mod problems;
pub mod routes;
pub mod state;
pub mod storage;
