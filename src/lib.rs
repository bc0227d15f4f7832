//! Community board of short "needs", filtered to the ones posted near you.

pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod services;
pub mod web;

pub use error::BoardError;
