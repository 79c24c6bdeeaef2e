pub mod access;
pub mod agents;
pub mod config;
pub mod db;
pub mod error;
pub mod intake;
pub mod jobs;
pub mod models;
pub mod pdf;
pub mod report;
pub mod routes;
pub mod state;
pub mod storage;
pub mod templates;
