pub mod monitoring;
pub mod tenants;
