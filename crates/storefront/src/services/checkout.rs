//! Checkout orchestration.
//!
//! Turns a session cart into a persisted order and a payment session:
//!
//! 1. Every cart line is resolved to a catalog product. Nothing is written
//!    until all lines resolve.
//! 2. The order and its items are inserted in one transaction.
//! 3. A remote order is created at the gateway and its id recorded on the
//!    order.
//!
//! Confirmation checks the gateway signature before the order is marked paid.

use std::collections::HashMap;
use std::future::Future;

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::instrument;

use lifebiotech_core::{OrderId, Price, ProductId, UserId};

use crate::db::RepositoryError;
use crate::models::{
    Cart, CartLine, CurrentUser, NewOrderItem, Order, Product, ShippingAddress, ShippingError,
};
use crate::services::payment::{
    CHECKOUT_DESCRIPTION, CheckoutPrefill, PaymentBroker, PaymentConfirmation, PaymentError,
    PaymentSession,
};

/// Errors from checkout and payment confirmation.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("Your cart is empty")]
    EmptyCart,

    #[error(transparent)]
    InvalidShipping(#[from] ShippingError),

    /// A cart line matched nothing in the catalog.
    #[error("Product not found: {0}. Please try adding the product to cart again.")]
    ProductNotFound(String),

    /// A line quantity the order table cannot hold.
    #[error("Invalid quantity {quantity} for {name}")]
    InvalidQuantity { name: String, quantity: u32 },

    #[error("Order not found")]
    OrderNotFound,

    /// The confirmation names a different gateway order than the one on record.
    #[error("Payment does not belong to this order")]
    GatewayOrderMismatch,

    #[error("Payment verification failed")]
    VerificationFailed,

    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Product lookups used to resolve cart lines.
pub trait Catalog: Send + Sync {
    fn find_by_id(
        &self,
        id: ProductId,
    ) -> impl Future<Output = Result<Option<Product>, RepositoryError>> + Send;

    /// Exact, case-sensitive name match.
    fn find_by_name(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<Product>, RepositoryError>> + Send;

    /// Case-insensitive name match.
    fn find_by_name_ci(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<Product>, RepositoryError>> + Send;
}

/// Order persistence used by checkout.
pub trait OrderStore: Send + Sync {
    /// Insert the order and all its items atomically.
    fn create_with_items(
        &self,
        user_id: UserId,
        total_amount: Decimal,
        shipping_address: &str,
        items: &[NewOrderItem],
    ) -> impl Future<Output = Result<Order, RepositoryError>> + Send;

    fn attach_gateway_order(
        &self,
        order_id: OrderId,
        gateway_order_id: &str,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    fn find_for_user(
        &self,
        order_id: OrderId,
        user_id: UserId,
    ) -> impl Future<Output = Result<Option<Order>, RepositoryError>> + Send;

    /// Mark a pending order paid. Returns `false` if it was already paid.
    fn mark_paid(
        &self,
        order_id: OrderId,
        payment_id: &str,
    ) -> impl Future<Output = Result<bool, RepositoryError>> + Send;

    /// Webhook variant keyed by the gateway order id.
    fn mark_paid_by_gateway_order(
        &self,
        gateway_order_id: &str,
        payment_id: &str,
    ) -> impl Future<Output = Result<Option<OrderId>, RepositoryError>> + Send;
}

/// Result of a successful checkout.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutOutcome {
    pub order_id: OrderId,
    pub total_amount: Decimal,
    pub payment: PaymentSession,
}

/// Result of a verified payment.
#[derive(Debug, Clone, Serialize)]
pub struct ConfirmedPayment {
    pub order_id: OrderId,
    pub payment_id: String,
    /// Whether the order row was updated. `false` when it was already paid
    /// or the update failed.
    pub recorded: bool,
}

/// Checkout service.
pub struct CheckoutService<'a, C, O, P> {
    catalog: C,
    orders: O,
    payments: &'a P,
}

impl<'a, C: Catalog, O: OrderStore, P: PaymentBroker> CheckoutService<'a, C, O, P> {
    #[must_use]
    pub const fn new(catalog: C, orders: O, payments: &'a P) -> Self {
        Self {
            catalog,
            orders,
            payments,
        }
    }

    /// Create the order and open a payment session for it.
    ///
    /// # Errors
    ///
    /// Returns validation errors for an empty cart or bad shipping details,
    /// `CheckoutError::ProductNotFound` when a line cannot be resolved, and
    /// gateway or database errors.
    #[instrument(skip(self, cart, shipping), fields(user_id = %user.id, lines = cart.lines().len()))]
    pub async fn checkout(
        &self,
        user: &CurrentUser,
        cart: &Cart,
        shipping: ShippingAddress,
    ) -> Result<CheckoutOutcome, CheckoutError> {
        let shipping = shipping.validated()?;
        let order = self.create_order(user.id, cart, &shipping).await?;
        let payment = self.start_payment_session(&order, user).await?;

        Ok(CheckoutOutcome {
            order_id: order.id,
            total_amount: order.total_amount,
            payment,
        })
    }

    /// Resolve the cart and persist the order with its items.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::EmptyCart`, `CheckoutError::InvalidQuantity`,
    /// `CheckoutError::ProductNotFound` or `CheckoutError::Repository`.
    pub async fn create_order(
        &self,
        user_id: UserId,
        cart: &Cart,
        shipping: &ShippingAddress,
    ) -> Result<Order, CheckoutError> {
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let items = self.resolve_lines(cart.lines()).await?;

        let order = self
            .orders
            .create_with_items(user_id, cart.total(), &shipping.one_line(), &items)
            .await?;

        tracing::info!(order_id = %order.id, items = items.len(), "Order created");
        Ok(order)
    }

    /// Resolve every line, in order, before anything is written.
    async fn resolve_lines(&self, lines: &[CartLine]) -> Result<Vec<NewOrderItem>, CheckoutError> {
        let mut resolved: HashMap<(&str, &str), ProductId> = HashMap::new();
        let mut items = Vec::with_capacity(lines.len());

        for line in lines {
            let quantity = i32::try_from(line.quantity)
                .ok()
                .filter(|q| *q >= 1)
                .ok_or_else(|| CheckoutError::InvalidQuantity {
                    name: line.name.clone(),
                    quantity: line.quantity,
                })?;

            let key = (line.product_ref.as_str(), line.name.as_str());
            let product_id = match resolved.get(&key) {
                Some(id) => *id,
                None => {
                    let id = self.resolve_line(line).await?;
                    resolved.insert(key, id);
                    id
                }
            };

            items.push(NewOrderItem {
                product_id,
                quantity,
                price: line.unit_price,
            });
        }

        Ok(items)
    }

    /// Canonical id, then exact name, then case-insensitive name, then the
    /// reference itself as a name.
    async fn resolve_line(&self, line: &CartLine) -> Result<ProductId, CheckoutError> {
        if let Some(id) = line.product_ref.as_catalog_id()
            && let Some(product) = self.catalog.find_by_id(id).await?
        {
            return Ok(product.id);
        }

        if let Some(product) = self.catalog.find_by_name(&line.name).await? {
            return Ok(product.id);
        }

        if let Some(product) = self.catalog.find_by_name_ci(&line.name).await? {
            return Ok(product.id);
        }

        if let Some(product) = self.catalog.find_by_name(line.product_ref.as_str()).await? {
            return Ok(product.id);
        }

        tracing::warn!(product_ref = %line.product_ref, name = %line.name, "Cart line did not resolve");
        Err(CheckoutError::ProductNotFound(line.name.clone()))
    }

    /// Create the remote order and build the hosted checkout hand-off.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Payment` if the gateway rejects the order.
    pub async fn start_payment_session(
        &self,
        order: &Order,
        user: &CurrentUser,
    ) -> Result<PaymentSession, CheckoutError> {
        let notes = json!({
            "order_id": order.id.to_string(),
            "user_id": user.id.to_string(),
            "shipping_address": order.shipping_address,
        });
        let amount = Price::new(order.total_amount, self.payments.currency());

        let gateway_order = self
            .payments
            .create_order(&amount, &order.id.to_string(), &notes)
            .await?;

        self.orders
            .attach_gateway_order(order.id, &gateway_order.id)
            .await?;

        Ok(PaymentSession {
            key: self.payments.key_id().to_string(),
            order_id: gateway_order.id,
            amount: gateway_order.amount,
            currency: gateway_order.currency,
            name: self.payments.merchant_name().to_string(),
            description: CHECKOUT_DESCRIPTION.to_string(),
            prefill: CheckoutPrefill {
                name: user.full_name.clone(),
                email: user.email.to_string(),
            },
            notes,
        })
    }

    /// Verify the hosted checkout's signature and mark the order paid.
    ///
    /// The status update is best-effort: a failure is logged and the payment
    /// still counts as confirmed. The webhook settles it later.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::OrderNotFound`,
    /// `CheckoutError::GatewayOrderMismatch` or
    /// `CheckoutError::VerificationFailed`.
    #[instrument(skip(self, confirmation), fields(user_id = %user_id, order_id = %order_id))]
    pub async fn confirm_payment(
        &self,
        user_id: UserId,
        order_id: OrderId,
        confirmation: &PaymentConfirmation,
    ) -> Result<ConfirmedPayment, CheckoutError> {
        let order = self
            .orders
            .find_for_user(order_id, user_id)
            .await?
            .ok_or(CheckoutError::OrderNotFound)?;

        if order.gateway_order_id.as_deref() != Some(confirmation.razorpay_order_id.as_str()) {
            return Err(CheckoutError::GatewayOrderMismatch);
        }

        if !self.payments.verify_payment(confirmation) {
            tracing::warn!("Payment signature rejected");
            return Err(CheckoutError::VerificationFailed);
        }

        let recorded = match self
            .orders
            .mark_paid(order.id, &confirmation.razorpay_payment_id)
            .await
        {
            Ok(updated) => updated,
            Err(e) => {
                tracing::error!(error = %e, "Failed to record payment on order");
                false
            }
        };

        tracing::info!(recorded, "Payment confirmed");

        Ok(ConfirmedPayment {
            order_id: order.id,
            payment_id: confirmation.razorpay_payment_id.clone(),
            recorded,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;
    use std::sync::Mutex;

    use chrono::Utc;
    use uuid::Uuid;

    use lifebiotech_core::{
        CurrencyCode, Email, MedicineForm, OrderStatus, PaymentStatus, ProductRef,
    };

    use super::*;
    use crate::models::OrderItem;
    use crate::services::payment::GatewayOrder;

    fn product(name: &str) -> Product {
        Product {
            id: ProductId::new(Uuid::new_v4()),
            name: name.to_string(),
            description: String::new(),
            form: MedicineForm::Tablet,
            price: Decimal::from(45),
            composition: None,
            manufacturer: None,
            category: None,
            image_url: None,
            stock: 10,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[derive(Default)]
    struct MemoryCatalog {
        products: Vec<Product>,
        lookups: Mutex<u32>,
    }

    impl MemoryCatalog {
        fn with(products: Vec<Product>) -> Self {
            Self {
                products,
                lookups: Mutex::new(0),
            }
        }

        fn found(&self, pred: impl Fn(&Product) -> bool) -> Option<Product> {
            *self.lookups.lock().unwrap() += 1;
            self.products.iter().find(|p| pred(p)).cloned()
        }
    }

    impl Catalog for &MemoryCatalog {
        async fn find_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
            Ok(self.found(|p| p.id == id))
        }

        async fn find_by_name(&self, name: &str) -> Result<Option<Product>, RepositoryError> {
            Ok(self.found(|p| p.name == name))
        }

        async fn find_by_name_ci(&self, name: &str) -> Result<Option<Product>, RepositoryError> {
            Ok(self.found(|p| p.name.to_lowercase() == name.to_lowercase()))
        }
    }

    #[derive(Default)]
    struct MemoryOrders {
        orders: Mutex<Vec<Order>>,
        items: Mutex<Vec<OrderItem>>,
        fail_mark_paid: bool,
    }

    impl OrderStore for &MemoryOrders {
        async fn create_with_items(
            &self,
            user_id: UserId,
            total_amount: Decimal,
            shipping_address: &str,
            items: &[NewOrderItem],
        ) -> Result<Order, RepositoryError> {
            let order = Order {
                id: OrderId::new(Uuid::new_v4()),
                user_id,
                total_amount,
                shipping_address: shipping_address.to_string(),
                status: OrderStatus::Pending,
                payment_status: PaymentStatus::Pending,
                payment_id: None,
                gateway_order_id: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            };
            self.orders.lock().unwrap().push(order.clone());
            let mut stored = self.items.lock().unwrap();
            for item in items {
                stored.push(OrderItem {
                    id: lifebiotech_core::OrderItemId::new(Uuid::new_v4()),
                    order_id: order.id,
                    product_id: item.product_id,
                    quantity: item.quantity,
                    price: item.price,
                });
            }
            Ok(order)
        }

        async fn attach_gateway_order(
            &self,
            order_id: OrderId,
            gateway_order_id: &str,
        ) -> Result<(), RepositoryError> {
            let mut orders = self.orders.lock().unwrap();
            let order = orders
                .iter_mut()
                .find(|o| o.id == order_id)
                .ok_or(RepositoryError::NotFound)?;
            order.gateway_order_id = Some(gateway_order_id.to_string());
            Ok(())
        }

        async fn find_for_user(
            &self,
            order_id: OrderId,
            user_id: UserId,
        ) -> Result<Option<Order>, RepositoryError> {
            Ok(self
                .orders
                .lock()
                .unwrap()
                .iter()
                .find(|o| o.id == order_id && o.user_id == user_id)
                .cloned())
        }

        async fn mark_paid(&self, order_id: OrderId, payment_id: &str) -> Result<bool, RepositoryError> {
            if self.fail_mark_paid {
                return Err(RepositoryError::DataCorruption("simulated".to_string()));
            }
            let mut orders = self.orders.lock().unwrap();
            match orders
                .iter_mut()
                .find(|o| o.id == order_id && o.payment_status == PaymentStatus::Pending)
            {
                Some(order) => {
                    order.payment_status = PaymentStatus::Paid;
                    order.payment_id = Some(payment_id.to_string());
                    Ok(true)
                }
                None => Ok(false),
            }
        }

        async fn mark_paid_by_gateway_order(
            &self,
            gateway_order_id: &str,
            payment_id: &str,
        ) -> Result<Option<OrderId>, RepositoryError> {
            let id = self
                .orders
                .lock()
                .unwrap()
                .iter()
                .find(|o| o.gateway_order_id.as_deref() == Some(gateway_order_id))
                .map(|o| o.id);
            match id {
                Some(id) if self.mark_paid(id, payment_id).await? => Ok(Some(id)),
                _ => Ok(None),
            }
        }
    }

    struct FakeBroker {
        accept_signature: bool,
        created: Mutex<Vec<(i64, String, serde_json::Value)>>,
    }

    impl FakeBroker {
        fn new(accept_signature: bool) -> Self {
            Self {
                accept_signature,
                created: Mutex::default(),
            }
        }
    }

    impl PaymentBroker for FakeBroker {
        async fn create_order(
            &self,
            amount: &Price,
            receipt: &str,
            notes: &serde_json::Value,
        ) -> Result<GatewayOrder, PaymentError> {
            let paise = amount.to_minor_units()?;
            self.created
                .lock()
                .unwrap()
                .push((paise, receipt.to_string(), notes.clone()));
            Ok(GatewayOrder {
                id: "order_RZP123".to_string(),
                amount: paise,
                currency: amount.currency_code.code().to_string(),
            })
        }

        fn verify_payment(&self, _confirmation: &PaymentConfirmation) -> bool {
            self.accept_signature
        }

        fn key_id(&self) -> &str {
            "rzp_test_Kq3vT9mLx2"
        }

        fn merchant_name(&self) -> &str {
            "Life Biotech"
        }

        fn currency(&self) -> CurrencyCode {
            CurrencyCode::INR
        }
    }

    fn user() -> CurrentUser {
        CurrentUser {
            id: UserId::new(Uuid::new_v4()),
            email: Email::parse("asha@example.com").unwrap(),
            full_name: "Asha Rao".to_string(),
        }
    }

    fn shipping() -> ShippingAddress {
        ShippingAddress {
            address: "12 MG Road".to_string(),
            city: "Pune".to_string(),
            pincode: "411001".to_string(),
        }
    }

    fn line(product_ref: &str, name: &str, quantity: u32, price: &str) -> CartLine {
        CartLine {
            product_ref: ProductRef::new(product_ref),
            name: name.to_string(),
            quantity,
            unit_price: Decimal::from_str(price).unwrap(),
        }
    }

    fn cart(lines: Vec<CartLine>) -> Cart {
        let mut cart = Cart::default();
        for l in lines {
            cart.add(l).unwrap();
        }
        cart
    }

    #[tokio::test]
    async fn test_checkout_creates_order_and_session() {
        let paracetamol = product("Paracetamol 500mg");
        let catalog = MemoryCatalog::with(vec![paracetamol.clone()]);
        let orders = MemoryOrders::default();
        let broker = FakeBroker::new(true);
        let service = CheckoutService::new(&catalog, &orders, &broker);
        let user = user();

        let outcome = service
            .checkout(
                &user,
                &cart(vec![line(&paracetamol.id.to_string(), "Paracetamol 500mg", 2, "45.50")]),
                shipping(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.total_amount, Decimal::from_str("91.00").unwrap());
        assert_eq!(outcome.payment.amount, 9100);
        assert_eq!(outcome.payment.currency, "INR");
        assert_eq!(outcome.payment.order_id, "order_RZP123");
        assert_eq!(outcome.payment.description, "Purchase from Life Biotech");
        assert_eq!(outcome.payment.prefill.email, "asha@example.com");
        assert_eq!(
            outcome.payment.notes["shipping_address"],
            "12 MG Road, Pune, 411001"
        );
        assert_eq!(outcome.payment.notes["user_id"], user.id.to_string());

        let created = broker.created.lock().unwrap();
        assert_eq!(created[0].1, outcome.order_id.to_string());

        let stored = orders.orders.lock().unwrap();
        assert_eq!(stored[0].gateway_order_id.as_deref(), Some("order_RZP123"));
        let items = orders.items.lock().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].product_id, paracetamol.id);
        assert_eq!(items[0].quantity, 2);
    }

    #[tokio::test]
    async fn test_empty_cart_rejected() {
        let catalog = MemoryCatalog::default();
        let orders = MemoryOrders::default();
        let broker = FakeBroker::new(true);
        let service = CheckoutService::new(&catalog, &orders, &broker);

        let err = service
            .checkout(&user(), &Cart::default(), shipping())
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::EmptyCart));
    }

    #[tokio::test]
    async fn test_invalid_shipping_rejected_before_resolution() {
        let catalog = MemoryCatalog::default();
        let orders = MemoryOrders::default();
        let broker = FakeBroker::new(true);
        let service = CheckoutService::new(&catalog, &orders, &broker);

        let mut bad = shipping();
        bad.pincode = "41100A".to_string();
        let err = service
            .checkout(&user(), &cart(vec![line("x", "x", 1, "1")]), bad)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::InvalidShipping(ShippingError::InvalidPincode)
        ));
        assert_eq!(*catalog.lookups.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unresolvable_line_writes_nothing() {
        let catalog = MemoryCatalog::with(vec![product("Cetirizine")]);
        let orders = MemoryOrders::default();
        let broker = FakeBroker::new(true);
        let service = CheckoutService::new(&catalog, &orders, &broker);

        let err = service
            .checkout(
                &user(),
                &cart(vec![
                    line("cetirizine-ref", "Cetirizine", 1, "30"),
                    line("ghost-ref", "Ghost Syrup", 1, "99"),
                ]),
                shipping(),
            )
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Product not found: Ghost Syrup. Please try adding the product to cart again."
        );
        assert!(orders.orders.lock().unwrap().is_empty());
        assert!(orders.items.lock().unwrap().is_empty());
        assert!(broker.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_out_of_range_quantity_rejected_not_clamped() {
        let catalog = MemoryCatalog::with(vec![product("Cetirizine")]);
        let orders = MemoryOrders::default();
        let broker = FakeBroker::new(true);
        let service = CheckoutService::new(&catalog, &orders, &broker);

        // Sessions deserialize carts without the add-time quantity cap.
        let oversized: Cart = serde_json::from_value(serde_json::json!({
            "lines": [{
                "product_ref": "Cetirizine",
                "name": "Cetirizine",
                "quantity": u32::MAX,
                "unit_price": "30"
            }]
        }))
        .unwrap();

        let err = service
            .checkout(&user(), &oversized, shipping())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CheckoutError::InvalidQuantity { quantity: u32::MAX, .. }
        ));
        assert!(orders.orders.lock().unwrap().is_empty());
        assert!(broker.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_resolution_priority() {
        let exact = product("Amoxicillin");
        let lower = product("amoxicillin");
        let catalog = MemoryCatalog::with(vec![lower.clone(), exact.clone()]);
        let orders = MemoryOrders::default();
        let broker = FakeBroker::new(true);
        let service = CheckoutService::new(&catalog, &orders, &broker);

        // Exact match beats case-insensitive.
        let id = service
            .resolve_line(&line("amx", "Amoxicillin", 1, "10"))
            .await
            .unwrap();
        assert_eq!(id, exact.id);

        // Case-insensitive when no exact match exists.
        let id = service
            .resolve_line(&line("amx", "AMOXICILLIN", 1, "10"))
            .await
            .unwrap();
        assert_eq!(id, lower.id);

        // Reference used as a name when the line name matches nothing.
        let id = service
            .resolve_line(&line("Amoxicillin", "Old Label", 1, "10"))
            .await
            .unwrap();
        assert_eq!(id, exact.id);
    }

    #[tokio::test]
    async fn test_unknown_uuid_falls_back_to_name() {
        let ibuprofen = product("Ibuprofen");
        let catalog = MemoryCatalog::with(vec![ibuprofen.clone()]);
        let orders = MemoryOrders::default();
        let broker = FakeBroker::new(true);
        let service = CheckoutService::new(&catalog, &orders, &broker);

        let id = service
            .resolve_line(&line(&Uuid::new_v4().to_string(), "Ibuprofen", 1, "10"))
            .await
            .unwrap();
        assert_eq!(id, ibuprofen.id);
    }

    #[tokio::test]
    async fn test_repeated_reference_resolved_once() {
        let catalog = MemoryCatalog::with(vec![product("Azithromycin")]);
        let orders = MemoryOrders::default();
        let broker = FakeBroker::new(true);
        let service = CheckoutService::new(&catalog, &orders, &broker);

        let lines = vec![
            line("azi", "Azithromycin", 1, "80"),
            line("azi", "Azithromycin", 2, "80"),
        ];
        let items = service.resolve_lines(&lines).await.unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].product_id, items[1].product_id);
        // One exact-name lookup for the first line, none for the second.
        assert_eq!(*catalog.lookups.lock().unwrap(), 1);
    }

    async fn placed_order(orders: &MemoryOrders, user: &CurrentUser) -> OrderId {
        let order = (&*orders)
            .create_with_items(user.id, Decimal::from(100), "a, b, 1", &[])
            .await
            .unwrap();
        (&*orders)
            .attach_gateway_order(order.id, "order_RZP123")
            .await
            .unwrap();
        order.id
    }

    fn confirmation(gateway_order_id: &str) -> PaymentConfirmation {
        PaymentConfirmation {
            razorpay_order_id: gateway_order_id.to_string(),
            razorpay_payment_id: "pay_ABC".to_string(),
            razorpay_signature: "sig".to_string(),
        }
    }

    #[tokio::test]
    async fn test_confirm_marks_paid_only_when_verified() {
        let catalog = MemoryCatalog::default();
        let orders = MemoryOrders::default();
        let user = user();
        let order_id = placed_order(&orders, &user).await;

        let rejecting = FakeBroker::new(false);
        let err = CheckoutService::new(&catalog, &orders, &rejecting)
            .confirm_payment(user.id, order_id, &confirmation("order_RZP123"))
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::VerificationFailed));
        assert_eq!(
            orders.orders.lock().unwrap()[0].payment_status,
            PaymentStatus::Pending
        );

        let accepting = FakeBroker::new(true);
        let confirmed = CheckoutService::new(&catalog, &orders, &accepting)
            .confirm_payment(user.id, order_id, &confirmation("order_RZP123"))
            .await
            .unwrap();
        assert!(confirmed.recorded);
        let stored = orders.orders.lock().unwrap()[0].clone();
        assert_eq!(stored.payment_status, PaymentStatus::Paid);
        assert_eq!(stored.payment_id.as_deref(), Some("pay_ABC"));
    }

    #[tokio::test]
    async fn test_confirm_rejects_foreign_gateway_order() {
        let catalog = MemoryCatalog::default();
        let orders = MemoryOrders::default();
        let broker = FakeBroker::new(true);
        let user = user();
        let order_id = placed_order(&orders, &user).await;

        let err = CheckoutService::new(&catalog, &orders, &broker)
            .confirm_payment(user.id, order_id, &confirmation("order_OTHER"))
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::GatewayOrderMismatch));
    }

    #[tokio::test]
    async fn test_confirm_other_users_order_not_found() {
        let catalog = MemoryCatalog::default();
        let orders = MemoryOrders::default();
        let broker = FakeBroker::new(true);
        let order_id = placed_order(&orders, &user()).await;

        let err = CheckoutService::new(&catalog, &orders, &broker)
            .confirm_payment(user().id, order_id, &confirmation("order_RZP123"))
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::OrderNotFound));
    }

    #[tokio::test]
    async fn test_confirm_succeeds_when_status_update_fails() {
        let catalog = MemoryCatalog::default();
        let orders = MemoryOrders {
            fail_mark_paid: true,
            ..MemoryOrders::default()
        };
        let broker = FakeBroker::new(true);
        let user = user();
        let order_id = placed_order(&orders, &user).await;

        let confirmed = CheckoutService::new(&catalog, &orders, &broker)
            .confirm_payment(user.id, order_id, &confirmation("order_RZP123"))
            .await
            .unwrap();
        assert!(!confirmed.recorded);
        assert_eq!(confirmed.payment_id, "pay_ABC");
    }
}
