// Handler tiers
//
// public    no authentication; tenant from X-Tenant or the path (/, /health, /auth/*, catalogue reads, webhooks)
// protected JWT + tenant + user (/api/*)
// admin     protected plus the admin role (/api/admin/*)
// root      JWT with root access, no tenant (/api/root/*)

pub mod admin;
pub mod common;
pub mod protected;
pub mod public;
pub mod root;
