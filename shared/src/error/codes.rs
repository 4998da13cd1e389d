//! Error codes for the CodeBook API
//!
//! Codes are grouped by range:
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 2xxx: Permission errors
//! - 4xxx: Order errors
//! - 5xxx: Payment errors
//! - 6xxx: Product errors
//! - 7xxx: User errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error code enum
///
/// Serialized as a bare `u16` so clients can switch on the number without
/// parsing the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Resource already exists
    AlreadyExists = 4,
    /// Invalid request
    InvalidRequest = 5,
    /// Concurrent modification or failed write condition
    Conflict = 6,

    // ==================== 1xxx: Auth ====================
    /// Not authenticated
    NotAuthenticated = 1001,
    /// Invalid credentials
    InvalidCredentials = 1002,
    /// Token expired
    TokenExpired = 1003,
    /// Token invalid
    TokenInvalid = 1004,
    /// Too many login or registration attempts
    TooManyRequests = 1005,

    // ==================== 2xxx: Permission ====================
    /// Permission denied
    PermissionDenied = 2001,
    /// Admin role required
    AdminRequired = 2002,
    /// Acting on another user's resource
    IdentityMismatch = 2003,
    /// Demo accounts cannot be modified or deleted
    DemoAccountProtected = 2004,
    /// Admins cannot delete their own account
    CannotDeleteSelf = 2005,

    // ==================== 4xxx: Order ====================
    /// Order not found
    OrderNotFound = 4001,
    /// Order has no items
    OrderEmpty = 4002,
    /// Status edge not allowed
    InvalidTransition = 4003,
    /// Order status changed concurrently
    StatusConflict = 4004,
    /// Paid amount does not match the cart total
    AmountMismatch = 4005,
    /// Order already refunded
    AlreadyRefunded = 4006,
    /// Not enough stock for a cart item
    InsufficientStock = 4007,

    // ==================== 5xxx: Payment ====================
    /// Payment declined or rejected by the processor
    PaymentFailed = 5001,
    /// Order carries no payment intent
    PaymentIntentMissing = 5002,
    /// Payment intent not found at the processor
    PaymentNotFound = 5003,
    /// Webhook signature did not verify
    InvalidWebhookSignature = 5004,
    /// Payment processor unreachable
    PaymentProviderUnavailable = 5005,

    // ==================== 6xxx: Product ====================
    /// Product not found
    ProductNotFound = 6001,
    /// Featured product cap reached
    FeaturedLimitReached = 6002,

    // ==================== 7xxx: User ====================
    /// User not found
    UserNotFound = 7001,
    /// Email already registered
    EmailExists = 7002,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Database error
    DatabaseError = 9002,
    /// Configuration error
    ConfigError = 9003,
    /// Backend throttled the request
    Throttled = 9004,
    /// Dependency unavailable
    ServiceUnavailable = 9005,
    /// Shipping provider failed
    ShippingProviderError = 9006,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Check if this is a success code
    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    /// Default English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::Unknown => "An unknown error occurred",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::AlreadyExists => "Resource already exists",
            ErrorCode::InvalidRequest => "Invalid request",
            ErrorCode::Conflict => "Resource was modified concurrently",

            // Auth
            ErrorCode::NotAuthenticated => "Authentication required",
            ErrorCode::InvalidCredentials => "Invalid email or password",
            ErrorCode::TokenExpired => "Authentication token has expired",
            ErrorCode::TokenInvalid => "Authentication token is invalid",
            ErrorCode::TooManyRequests => "Too many requests, please try again later",

            // Permission
            ErrorCode::PermissionDenied => "Permission denied",
            ErrorCode::AdminRequired => "Administrator role is required",
            ErrorCode::IdentityMismatch => "Cannot act on behalf of another user",
            ErrorCode::DemoAccountProtected => "Demo accounts cannot be modified",
            ErrorCode::CannotDeleteSelf => "Cannot delete your own account",

            // Order
            ErrorCode::OrderNotFound => "Order not found",
            ErrorCode::OrderEmpty => "Order has no items",
            ErrorCode::InvalidTransition => "Order status transition is not allowed",
            ErrorCode::StatusConflict => "Order status was changed by another request",
            ErrorCode::AmountMismatch => "Amount paid does not match the cart total",
            ErrorCode::AlreadyRefunded => "Order has already been refunded",
            ErrorCode::InsufficientStock => "Insufficient stock",

            // Payment
            ErrorCode::PaymentFailed => "Payment processing failed",
            ErrorCode::PaymentIntentMissing => "Order has no payment to refund",
            ErrorCode::PaymentNotFound => "Payment not found",
            ErrorCode::InvalidWebhookSignature => "Invalid webhook signature",
            ErrorCode::PaymentProviderUnavailable => "Payment provider is unavailable",

            // Product
            ErrorCode::ProductNotFound => "Product not found",
            ErrorCode::FeaturedLimitReached => "At most three products can be featured",

            // User
            ErrorCode::UserNotFound => "User not found",
            ErrorCode::EmailExists => "Email is already registered",

            // System
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database error",
            ErrorCode::ConfigError => "Configuration error",
            ErrorCode::Throttled => "Service is busy, please retry",
            ErrorCode::ServiceUnavailable => "Service temporarily unavailable",
            ErrorCode::ShippingProviderError => "Shipping provider error",
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error when converting from an invalid u16 to ErrorCode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            0 => Ok(ErrorCode::Success),
            1 => Ok(ErrorCode::Unknown),
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),
            4 => Ok(ErrorCode::AlreadyExists),
            5 => Ok(ErrorCode::InvalidRequest),
            6 => Ok(ErrorCode::Conflict),

            // Auth
            1001 => Ok(ErrorCode::NotAuthenticated),
            1002 => Ok(ErrorCode::InvalidCredentials),
            1003 => Ok(ErrorCode::TokenExpired),
            1004 => Ok(ErrorCode::TokenInvalid),
            1005 => Ok(ErrorCode::TooManyRequests),

            // Permission
            2001 => Ok(ErrorCode::PermissionDenied),
            2002 => Ok(ErrorCode::AdminRequired),
            2003 => Ok(ErrorCode::IdentityMismatch),
            2004 => Ok(ErrorCode::DemoAccountProtected),
            2005 => Ok(ErrorCode::CannotDeleteSelf),

            // Order
            4001 => Ok(ErrorCode::OrderNotFound),
            4002 => Ok(ErrorCode::OrderEmpty),
            4003 => Ok(ErrorCode::InvalidTransition),
            4004 => Ok(ErrorCode::StatusConflict),
            4005 => Ok(ErrorCode::AmountMismatch),
            4006 => Ok(ErrorCode::AlreadyRefunded),
            4007 => Ok(ErrorCode::InsufficientStock),

            // Payment
            5001 => Ok(ErrorCode::PaymentFailed),
            5002 => Ok(ErrorCode::PaymentIntentMissing),
            5003 => Ok(ErrorCode::PaymentNotFound),
            5004 => Ok(ErrorCode::InvalidWebhookSignature),
            5005 => Ok(ErrorCode::PaymentProviderUnavailable),

            // Product
            6001 => Ok(ErrorCode::ProductNotFound),
            6002 => Ok(ErrorCode::FeaturedLimitReached),

            // User
            7001 => Ok(ErrorCode::UserNotFound),
            7002 => Ok(ErrorCode::EmailExists),

            // System
            9001 => Ok(ErrorCode::InternalError),
            9002 => Ok(ErrorCode::DatabaseError),
            9003 => Ok(ErrorCode::ConfigError),
            9004 => Ok(ErrorCode::Throttled),
            9005 => Ok(ErrorCode::ServiceUnavailable),
            9006 => Ok(ErrorCode::ShippingProviderError),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_values() {
        assert_eq!(ErrorCode::Success.code(), 0);
        assert_eq!(ErrorCode::ValidationFailed.code(), 2);
        assert_eq!(ErrorCode::Conflict.code(), 6);
        assert_eq!(ErrorCode::NotAuthenticated.code(), 1001);
        assert_eq!(ErrorCode::AdminRequired.code(), 2002);
        assert_eq!(ErrorCode::InsufficientStock.code(), 4007);
        assert_eq!(ErrorCode::PaymentFailed.code(), 5001);
        assert_eq!(ErrorCode::FeaturedLimitReached.code(), 6002);
        assert_eq!(ErrorCode::EmailExists.code(), 7002);
        assert_eq!(ErrorCode::InternalError.code(), 9001);
    }

    #[test]
    fn test_is_success() {
        assert!(ErrorCode::Success.is_success());
        assert!(!ErrorCode::Unknown.is_success());
        assert!(!ErrorCode::OrderNotFound.is_success());
    }

    #[test]
    fn test_try_from_covers_every_code() {
        for value in 0..10_000u16 {
            if let Ok(code) = ErrorCode::try_from(value) {
                assert_eq!(code.code(), value);
            }
        }
        assert_eq!(ErrorCode::try_from(4003), Ok(ErrorCode::InvalidTransition));
        assert_eq!(ErrorCode::try_from(9006), Ok(ErrorCode::ShippingProviderError));
    }

    #[test]
    fn test_try_from_invalid() {
        assert_eq!(ErrorCode::try_from(999), Err(InvalidErrorCode(999)));
        assert_eq!(ErrorCode::try_from(3001), Err(InvalidErrorCode(3001)));
    }

    #[test]
    fn test_serialize_as_number() {
        assert_eq!(serde_json::to_string(&ErrorCode::NotFound).unwrap(), "3");
        assert_eq!(
            serde_json::to_string(&ErrorCode::AlreadyRefunded).unwrap(),
            "4006"
        );
    }

    #[test]
    fn test_deserialize() {
        let code: ErrorCode = serde_json::from_str("4004").unwrap();
        assert_eq!(code, ErrorCode::StatusConflict);

        let result: Result<ErrorCode, _> = serde_json::from_str("10000");
        assert!(result.is_err());
    }

    #[test]
    fn test_message() {
        assert_eq!(ErrorCode::OrderNotFound.message(), "Order not found");
        assert_eq!(
            ErrorCode::FeaturedLimitReached.message(),
            "At most three products can be featured"
        );
    }
}
