//! Plain-text bodies for every [`Template`]

use serde_json::Value;

use super::Template;

fn text<'a>(data: &'a Value, key: &str) -> &'a str {
    data.get(key).and_then(Value::as_str).unwrap_or("")
}

fn money(data: &Value, key: &str) -> String {
    format!("{:.2}", data.get(key).and_then(Value::as_f64).unwrap_or(0.0))
}

fn items(data: &Value) -> String {
    let Some(items) = data.get("items").and_then(Value::as_array) else {
        return String::new();
    };
    items
        .iter()
        .map(|i| {
            format!(
                "  - {} x{} @ {:.2}",
                text(i, "name"),
                i.get("quantity").and_then(Value::as_i64).unwrap_or(1),
                i.get("price").and_then(Value::as_f64).unwrap_or(0.0)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn greeting(data: &Value) -> String {
    match text(data, "customer_name") {
        "" => "Hello,".to_string(),
        name => format!("Hello {name},"),
    }
}

fn tracking(data: &Value) -> String {
    let number = text(data, "tracking_number");
    if number.is_empty() {
        return "Tracking details will follow shortly.".to_string();
    }
    let mut line = format!("Tracking number: {number}");
    let carrier = text(data, "tracking_carrier");
    if !carrier.is_empty() {
        line.push_str(&format!(" ({carrier})"));
    }
    let url = text(data, "tracking_url");
    if !url.is_empty() {
        line.push_str(&format!("\nTrack your package: {url}"));
    }
    line
}

/// Render `(subject, body)`; `base_url` has no trailing slash
pub fn render(template: Template, data: &Value, base_url: &str) -> (String, String) {
    let order_id = text(data, "order_id");
    let orders_link = format!("{base_url}/dashboard");
    let admin_order_link = format!("{base_url}/admin/orders/{order_id}");

    match template {
        Template::OrderConfirmation => (
            format!("Order confirmed: {order_id}"),
            format!(
                "{}\n\nThank you for your order.\n\nOrder: {order_id}\n{}\nTotal: {}\n\nView your orders: {orders_link}\n",
                greeting(data),
                items(data),
                money(data, "amount"),
            ),
        ),
        Template::PaymentProcessing => (
            format!("Payment processing for order {order_id}"),
            format!(
                "{}\n\nYour payment for order {order_id} is being processed. We will email you once it completes.\n\nView your orders: {orders_link}\n",
                greeting(data),
            ),
        ),
        Template::PaymentFailed => (
            "Your payment could not be completed".to_string(),
            format!(
                "{}\n\nYour payment{} did not go through. No charge was made.\nPlease try again: {base_url}/cart\n",
                greeting(data),
                match order_id {
                    "" => String::new(),
                    id => format!(" for order {id}"),
                },
            ),
        ),
        Template::ShippingNotification => (
            format!("Your order {order_id} has shipped"),
            format!(
                "{}\n\nGood news: order {order_id} is on its way.\n{}\n\nView your orders: {orders_link}\n",
                greeting(data),
                tracking(data),
            ),
        ),
        Template::DeliveryConfirmation => (
            format!("Your order {order_id} was delivered"),
            format!(
                "{}\n\nOrder {order_id} has been delivered. Enjoy your reading!\n\nView your orders: {orders_link}\n",
                greeting(data),
            ),
        ),
        Template::OrderCanceled => (
            format!("Order {order_id} cancelled"),
            format!(
                "{}\n\nOrder {order_id} has been cancelled.\n{}\n\nView your orders: {orders_link}\n",
                greeting(data),
                items(data),
            ),
        ),
        Template::OrderRefunded => (
            format!("Refund issued for order {order_id}"),
            format!(
                "{}\n\nA refund of {:.2} has been issued for order {order_id}. It may take 5-10 business days to appear.\n\nView your orders: {orders_link}\n",
                greeting(data),
                data.get("refund_amount")
                    .and_then(Value::as_i64)
                    .map(|minor| minor as f64 / 100.0)
                    .unwrap_or_else(|| data.get("amount").and_then(Value::as_f64).unwrap_or(0.0)),
            ),
        ),
        Template::AdminNewOrder => (
            format!("New order {order_id}"),
            format!(
                "New order from {} <{}>\n\n{}\nTotal: {}\n\nManage: {admin_order_link}\n",
                text(data, "customer_name"),
                text(data, "customer_email"),
                items(data),
                money(data, "amount"),
            ),
        ),
        Template::AdminLowStock => (
            format!("Low stock: {}", text(data, "product_name")),
            format!(
                "{} is running low: {} left (threshold {}).\n\nRestock: {base_url}/admin/products/{}\n",
                text(data, "product_name"),
                data.get("stock").and_then(Value::as_i64).unwrap_or(0),
                data.get("threshold").and_then(Value::as_i64).unwrap_or(0),
                text(data, "product_id"),
            ),
        ),
        Template::AdminOutOfStock => (
            format!("Out of stock: {}", text(data, "product_name")),
            format!(
                "{} is out of stock.\n\nRestock: {base_url}/admin/products/{}\n",
                text(data, "product_name"),
                text(data, "product_id"),
            ),
        ),
        Template::AdminPaymentFailure => (
            format!("Payment failed: {}", text(data, "payment_intent_id")),
            format!(
                "Payment {} for {} failed.\nReason: {}\n",
                text(data, "payment_intent_id"),
                text(data, "customer_email"),
                match text(data, "error") {
                    "" => "unknown",
                    reason => reason,
                },
            ),
        ),
        Template::AdminRefundProcessed => (
            format!("Refund processed for order {order_id}"),
            format!(
                "Refund {} processed for order {order_id} ({} minor units).\nReason: {}\n\nOrder: {admin_order_link}\n",
                text(data, "refund_id"),
                data.get("refund_amount").and_then(Value::as_i64).unwrap_or(0),
                match text(data, "refund_reason") {
                    "" => "none given",
                    reason => reason,
                },
            ),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_shipping_body_carries_tracking() {
        let data = json!({
            "order_id": "o1",
            "customer_name": "Ada",
            "tracking_number": "1Z999",
            "tracking_carrier": "UPS",
        });
        let (subject, body) = render(Template::ShippingNotification, &data, "https://shop.test");
        assert_eq!(subject, "Your order o1 has shipped");
        assert!(body.starts_with("Hello Ada,"));
        assert!(body.contains("Tracking number: 1Z999 (UPS)"));
        assert!(body.contains("https://shop.test/dashboard"));
    }

    #[test]
    fn test_stock_alert_links_to_product() {
        let data = json!({"product_id": "p1", "product_name": "Rust", "stock": 2, "threshold": 10});
        let (subject, body) = render(Template::AdminLowStock, &data, "https://shop.test");
        assert_eq!(subject, "Low stock: Rust");
        assert!(body.contains("2 left (threshold 10)"));
        assert!(body.contains("https://shop.test/admin/products/p1"));
    }

    #[test]
    fn test_refund_amount_from_minor_units() {
        let data = json!({"order_id": "o1", "refund_amount": 1250});
        let (_, body) = render(Template::OrderRefunded, &data, "");
        assert!(body.contains("12.50"));
    }
}
