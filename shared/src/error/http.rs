//! HTTP status code mapping for error codes

use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    /// Get the HTTP status code for this error code
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::Success => StatusCode::OK,

            // 400 Bad Request
            Self::Unknown
            | Self::ValidationFailed
            | Self::InvalidRequest
            | Self::OrderEmpty
            | Self::AmountMismatch
            | Self::FeaturedLimitReached
            | Self::PaymentIntentMissing
            | Self::InvalidWebhookSignature => StatusCode::BAD_REQUEST,

            // 401 Unauthorized
            Self::NotAuthenticated
            | Self::InvalidCredentials
            | Self::TokenExpired
            | Self::TokenInvalid => StatusCode::UNAUTHORIZED,

            // 402 Payment Required
            Self::PaymentFailed => StatusCode::PAYMENT_REQUIRED,

            // 403 Forbidden
            Self::PermissionDenied
            | Self::AdminRequired
            | Self::IdentityMismatch
            | Self::DemoAccountProtected
            | Self::CannotDeleteSelf => StatusCode::FORBIDDEN,

            // 404 Not Found
            Self::NotFound
            | Self::OrderNotFound
            | Self::ProductNotFound
            | Self::UserNotFound
            | Self::PaymentNotFound => StatusCode::NOT_FOUND,

            // 409 Conflict
            Self::AlreadyExists
            | Self::Conflict
            | Self::EmailExists
            | Self::InvalidTransition
            | Self::StatusConflict
            | Self::AlreadyRefunded
            | Self::InsufficientStock => StatusCode::CONFLICT,

            // 429 Too Many Requests
            Self::Throttled | Self::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,

            // 503 Service Unavailable (client can retry)
            Self::ServiceUnavailable
            | Self::PaymentProviderUnavailable
            | Self::ShippingProviderError => StatusCode::SERVICE_UNAVAILABLE,

            // 500 Internal Server Error
            Self::InternalError | Self::DatabaseError | Self::ConfigError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Whether responses for this code must hide the message behind a correlation id
    pub fn is_internal(&self) -> bool {
        self.http_status() == StatusCode::INTERNAL_SERVER_ERROR
    }
}
