//! Domain models for the storefront.
//!
//! These types are validated domain objects, separate from database row
//! types and request/response bodies.

pub mod cart;
pub mod order;
pub mod product;
pub mod session;
pub mod user;

pub use cart::{Cart, CartError, CartLine};
pub use order::{NewOrderItem, Order, OrderItem, ShippingAddress, ShippingError};
pub use product::Product;
pub use session::{CurrentUser, PendingSignup, keys as session_keys};
pub use user::User;
