// Supervisor REST surface: transport mechanics live in `client`, endpoint
// groups are inherent methods in their own files.

pub mod addons;
pub mod client;
pub mod core;
pub mod models;

pub use client::SupervisorClient;
