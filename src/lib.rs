// Library exports for Gains
// This allows integration tests and external code to use Gains modules

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod graphql;
pub mod routes;
pub mod social;
pub mod source;
pub mod state;
