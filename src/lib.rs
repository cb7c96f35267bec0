// Library exports for nebob
// This allows integration tests and external code to use nebob modules

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod follow;
pub mod response;
pub mod restaurants;
pub mod routes;
pub mod state;
pub mod storage;
pub mod users;
