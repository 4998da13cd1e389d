//! Cart validation for order creation

use shared::models::{CartItem, cart_quantity};

use super::{CreateOrderRequest, OrderError, OrderResult};
use crate::auth::AuthContext;
use crate::money;
use crate::stripe;

/// A cart that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidCart {
    pub items: Vec<CartItem>,
    /// Σ item quantity
    pub quantity: i64,
    pub amount_paid: f64,
}

pub fn validate_cart(req: &CreateOrderRequest, actor: &AuthContext) -> OrderResult<ValidCart> {
    if let Some(declared) = req.user.as_ref().and_then(|u| u.id.as_deref())
        && declared != actor.user_id
    {
        return Err(OrderError::IdentityMismatch);
    }

    if req.cart_list.is_empty() {
        return Err(OrderError::EmptyCart);
    }

    for (index, item) in req.cart_list.iter().enumerate() {
        if item.product_id.trim().is_empty() {
            return Err(OrderError::Validation(format!(
                "cart_list[{index}] has no product id"
            )));
        }
        if item.quantity <= 0 {
            return Err(OrderError::Validation(format!(
                "cart_list[{index}] quantity must be positive"
            )));
        }
        if !item.price.is_finite() || item.price < 0.0 {
            return Err(OrderError::Validation(format!(
                "cart_list[{index}] price must be a non-negative number"
            )));
        }
        if money::to_decimal(item.price).is_none() {
            return Err(OrderError::Validation(format!(
                "cart_list[{index}] price is out of range"
            )));
        }
    }

    if let Some(pi) = req.payment_intent_id.as_deref().map(str::trim)
        && !pi.is_empty()
        && !stripe::is_intent_id(pi)
    {
        return Err(OrderError::Validation(
            "payment_intent_id is not a payment intent id".into(),
        ));
    }

    let paid = if req.amount_paid.is_finite() && req.amount_paid >= 0.0 {
        money::to_decimal(req.amount_paid)
    } else {
        None
    };
    let Some(paid) = paid else {
        return Err(OrderError::Validation(
            "amount_paid must be a non-negative number in range".into(),
        ));
    };
    let total = money::cart_total(&req.cart_list)
        .ok_or_else(|| OrderError::Validation("cart total is out of range".into()))?;
    if !money::amounts_match(paid, total) {
        return Err(OrderError::AmountMismatch {
            expected: money::to_f64(total),
            actual: req.amount_paid,
        });
    }

    let quantity = cart_quantity(&req.cart_list)
        .ok_or_else(|| OrderError::Validation("cart quantity is out of range".into()))?;
    if let Some(declared) = req.quantity
        && declared != quantity
    {
        return Err(OrderError::Validation(format!(
            "quantity {declared} does not match cart quantity {quantity}"
        )));
    }

    Ok(ValidCart {
        items: req.cart_list.clone(),
        quantity,
        amount_paid: req.amount_paid,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::DeclaredUser;
    use shared::models::UserRole;

    fn actor() -> AuthContext {
        AuthContext {
            user_id: "u1".into(),
            email: "u1@codebook.dev".into(),
            name: "U1".into(),
            role: UserRole::User,
            issued_at: 0,
            expires_at: i64::MAX,
        }
    }

    fn item(id: &str, price: f64, quantity: i64) -> CartItem {
        CartItem {
            product_id: id.into(),
            name: id.into(),
            price,
            quantity,
        }
    }

    fn request(items: Vec<CartItem>, amount_paid: f64) -> CreateOrderRequest {
        CreateOrderRequest {
            cart_list: items,
            amount_paid,
            quantity: None,
            user: None,
            payment_intent_id: None,
        }
    }

    #[test]
    fn test_valid_cart() {
        let mut req = request(vec![item("p1", 10.0, 2), item("p2", 4.99, 1)], 24.99);
        req.quantity = Some(3);
        let cart = validate_cart(&req, &actor()).unwrap();
        assert_eq!(cart.quantity, 3);
        assert_eq!(cart.items.len(), 2);
    }

    #[test]
    fn test_amount_tolerance() {
        let ok = request(vec![item("p1", 10.0, 2)], 20.009);
        assert!(validate_cart(&ok, &actor()).is_ok());

        let off = request(vec![item("p1", 10.0, 2)], 20.02);
        assert!(matches!(
            validate_cart(&off, &actor()),
            Err(OrderError::AmountMismatch { .. })
        ));
    }

    #[test]
    fn test_rejections() {
        assert!(matches!(
            validate_cart(&request(vec![], 0.0), &actor()),
            Err(OrderError::EmptyCart)
        ));
        assert!(matches!(
            validate_cart(&request(vec![item("p1", 10.0, 0)], 0.0), &actor()),
            Err(OrderError::Validation(_))
        ));
        assert!(matches!(
            validate_cart(&request(vec![item("p1", f64::NAN, 1)], 0.0), &actor()),
            Err(OrderError::Validation(_))
        ));
        assert!(matches!(
            validate_cart(&request(vec![item("p1", -1.0, 1)], -1.0), &actor()),
            Err(OrderError::Validation(_))
        ));

        let mut wrong_qty = request(vec![item("p1", 10.0, 2)], 20.0);
        wrong_qty.quantity = Some(3);
        assert!(matches!(
            validate_cart(&wrong_qty, &actor()),
            Err(OrderError::Validation(_))
        ));
    }

    #[test]
    fn test_out_of_range_price_is_rejected() {
        let req = request(vec![item("p1", 1e30, 1)], 0.0);
        assert!(matches!(
            validate_cart(&req, &actor()),
            Err(OrderError::Validation(_))
        ));

        let req = request(vec![item("p1", 10.0, 1)], 1e30);
        assert!(matches!(
            validate_cart(&req, &actor()),
            Err(OrderError::Validation(_))
        ));
    }

    #[test]
    fn test_overflowing_line_total_is_rejected() {
        let req = request(vec![item("p1", 1e20, 1_000_000_000)], 0.0);
        assert!(matches!(
            validate_cart(&req, &actor()),
            Err(OrderError::Validation(_))
        ));
    }

    #[test]
    fn test_overflowing_quantity_is_rejected() {
        let req = request(vec![item("p1", 0.0, i64::MAX), item("p2", 0.0, 1)], 0.0);
        assert!(matches!(
            validate_cart(&req, &actor()),
            Err(OrderError::Validation(_))
        ));
    }

    #[test]
    fn test_malformed_intent_id_is_rejected() {
        let mut req = request(vec![item("p1", 10.0, 1)], 10.0);
        req.payment_intent_id = Some("../balance".into());
        assert!(matches!(
            validate_cart(&req, &actor()),
            Err(OrderError::Validation(_))
        ));

        req.payment_intent_id = Some("pi_3Mtw_abc".into());
        assert!(validate_cart(&req, &actor()).is_ok());
    }

    #[test]
    fn test_identity_mismatch() {
        let mut req = request(vec![item("p1", 10.0, 1)], 10.0);
        req.user = Some(DeclaredUser {
            id: Some("u2".into()),
        });
        assert!(matches!(
            validate_cart(&req, &actor()),
            Err(OrderError::IdentityMismatch)
        ));

        req.user = Some(DeclaredUser {
            id: Some("u1".into()),
        });
        assert!(validate_cart(&req, &actor()).is_ok());
    }
}
