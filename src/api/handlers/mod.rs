pub mod admin;
pub mod alerts;
pub mod health;
pub mod metrics;
pub mod wheel;
