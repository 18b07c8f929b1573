pub mod admin_guard;
pub use admin_guard::{AdminGuard, CriticalSection};

pub mod auth_service;
pub mod auth_service_impl;
pub use auth_service::{AuthError, AuthService, LoginOutcome};
pub use auth_service_impl::SeaOrmAuthService;

pub mod admin_service;
pub mod admin_service_impl;
pub use admin_service::{AdminService, CredentialChange};
pub use admin_service_impl::SeaOrmAdminService;

pub mod bootstrap;
pub use bootstrap::{BootstrapOutcome, bootstrap};

pub mod password;
pub use password::PasswordHasher;

pub mod policy;
pub use policy::require_admin;

pub mod recovery;
pub use recovery::{RecoveryRequest, RecoveryWorkflow};

pub mod token;
pub use token::{Claims, InvalidToken, TokenConfig, TokenService, bearer_token};

pub mod validation;
