pub mod auth;
pub mod session;
pub mod tenant;

pub use auth::{bearer_auth_middleware, CurrentUser};
pub use session::{
    load_session_user, sign_in_session, sign_out_session, SessionUser, SESSION_USER_KEY,
};
pub use tenant::{tenant_middleware, CurrentTenant};
