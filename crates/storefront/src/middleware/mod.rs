//! HTTP middleware stack for the storefront API.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, HTTP transaction)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Security headers
//! 5. CORS
//! 6. Session layer (tower-sessions with `PostgreSQL` store)
//! 7. Idle timeout (needs the session)
//! 8. Rate limiting (per route group, governor)

pub mod auth;
pub mod idle_timeout;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use auth::{RequireAuth, expire_session, sign_in, sign_out, take_notice};
pub use idle_timeout::idle_timeout_middleware;
pub use rate_limit::{api_rate_limiter, auth_rate_limiter, otp_rate_limiter};
pub use request_id::{RequestId, request_id_middleware};
pub use security_headers::security_headers_middleware;
pub use session::{create_session_layer, session_layer};
