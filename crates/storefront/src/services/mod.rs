//! Business logic services for storefront.
//!
//! # Services
//!
//! - `auth` - Password accounts, OTP-gated signup and password reset
//! - `otp` - One-time password issuance and verification
//! - `email` - Transactional email through Resend
//! - `payment` - Razorpay orders and signature checks
//! - `checkout` - Cart to order to payment session orchestration
//!
//! Services that talk to storage or remote APIs go through small traits
//! (`OtpStore`, `NotificationGateway`, `PaymentBroker`, `Catalog`,
//! `OrderStore`) so the flows can be tested with in-memory implementations.

pub mod auth;
pub mod checkout;
pub mod email;
pub mod otp;
pub mod payment;
