pub mod client;
pub mod resources;
pub mod types;

pub use client::{HttpResourceClient, ResourceClient, WithTimeout};
pub use resources::{snapshot_key, StatusToggle, Tabular};
