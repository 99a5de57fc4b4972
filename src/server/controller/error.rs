use actix_web::http::header::ContentType;
use actix_web::http::StatusCode;
use actix_web::{error, HttpResponse};
use derive_more::{Display, Error};

use crate::server::domain::lifecycle::{CheckoutError, PaymentError, SubmissionError};

#[derive(Debug, Display, Error)]
pub(crate) enum CustomError {
    #[display("server is busy")]
    ServerIsBusy,
    #[display("invalid request")]
    BadRequest,
    #[display("{_0}")]
    Validation(#[error(not(source))] String),
    #[display("resource not found")]
    ResourceNotFound,
    #[display("database error")]
    DbError,
    #[display("timeout occurred")]
    Timeout,
    #[display("authentication required")]
    Unauthorized,
    #[display("not allowed for this role")]
    Forbidden,
    #[display("cash received is less than the order total")]
    InsufficientPayment,
    #[display("unknown payment method")]
    InvalidPaymentMethod,
    #[display("order is already closed")]
    AlreadyClosed,
}

impl error::ResponseError for CustomError {
    fn status_code(&self) -> StatusCode {
        match *self {
            CustomError::ServerIsBusy | CustomError::DbError => StatusCode::INTERNAL_SERVER_ERROR,
            CustomError::BadRequest | CustomError::Validation(_) => StatusCode::BAD_REQUEST,
            CustomError::ResourceNotFound => StatusCode::NOT_FOUND,
            CustomError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            CustomError::Unauthorized => StatusCode::UNAUTHORIZED,
            CustomError::Forbidden => StatusCode::FORBIDDEN,
            CustomError::InsufficientPayment | CustomError::InvalidPaymentMethod => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            CustomError::AlreadyClosed => StatusCode::CONFLICT,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::html())
            .body(self.to_string())
    }
}

impl From<SubmissionError> for CustomError {
    fn from(e: SubmissionError) -> Self {
        CustomError::Validation(e.to_string())
    }
}

impl From<PaymentError> for CustomError {
    fn from(e: PaymentError) -> Self {
        match e {
            PaymentError::Insufficient => CustomError::InsufficientPayment,
            PaymentError::InvalidMethod => CustomError::InvalidPaymentMethod,
        }
    }
}

impl From<CheckoutError> for CustomError {
    fn from(e: CheckoutError) -> Self {
        match e {
            CheckoutError::AlreadyClosed => CustomError::AlreadyClosed,
            CheckoutError::Payment(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use actix_web::error::ResponseError;

    use super::*;

    #[test]
    fn payment_rejections_map_to_unprocessable_and_conflict() {
        assert_eq!(
            CustomError::from(PaymentError::Insufficient).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            CustomError::from(PaymentError::InvalidMethod).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(CustomError::AlreadyClosed.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            CustomError::from(CheckoutError::AlreadyClosed).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            CustomError::from(CheckoutError::Payment(PaymentError::Insufficient)).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn validation_carries_the_user_facing_message() {
        let err = CustomError::from(SubmissionError::EmptySubmission);
        assert_eq!(err.to_string(), "no items submitted");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
