pub mod checkout;
pub mod fulfillment;
pub mod stats;
pub mod tenant_service;

pub use tenant_service::{TenantError, TenantService};
