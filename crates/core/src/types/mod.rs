//! Core types for Life Biotech.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod idle;
pub mod otp;
pub mod price;
pub mod product;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use idle::{DEFAULT_IDLE_WINDOW_SECS, IdleState, IdleTimer};
pub use otp::{OTP_TTL_MINUTES, OtpCode, OtpCodeError, OtpRecord, select_active};
pub use price::{CurrencyCode, Price, PriceError};
pub use product::{MedicineForm, ProductRef};
pub use status::*;
