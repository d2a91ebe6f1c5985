pub mod config;
pub mod reset_db;
pub mod routes;
pub mod serve;
