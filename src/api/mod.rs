// Warehouse API module
// Authenticated request pipeline and typed resource endpoints

pub mod auth;
pub mod client;
pub mod models;
pub mod resources;

pub use client::ApiClient;
pub use resources::ResourceClient;
