// Stockdesk - library root for testing

pub mod api;
pub mod config;
pub mod error;
pub mod token;
