//! Life Biotech Core - Shared domain types.
//!
//! This crate provides the types used across all Life Biotech components:
//! - `storefront` - Public JSON API (catalog, cart, auth, checkout)
//! - `cli` - Command-line tools for migrations and catalog seeding
//!
//! # Architecture
//!
//! The core crate contains only types and pure rules - no I/O, no database
//! access, no HTTP clients. Anything that needs a clock takes `now` as an
//! argument so the rules can be tested deterministically.
//!
//! # Modules
//!
//! - [`types`] - IDs, emails, prices, statuses, OTP codes, product references
//!   and the idle-timeout state machine

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
