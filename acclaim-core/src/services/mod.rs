//! Service layer for business logic
//!
//! Services are generic over the repository traits and own no storage of
//! their own.

pub mod access;
pub mod authentication;
pub mod login_location;
pub mod password;
pub mod rate_limit;
pub mod session;
pub mod user;

pub use access::{AccessConfig, AccessRestrictionService, RequestKind};
pub use authentication::{AuthenticationService, LoginContext, LoginOutcome};
pub use login_location::LoginLocationService;
pub use password::PasswordService;
pub use rate_limit::LoginRateLimiter;
pub use session::SessionService;
pub use user::UserService;
