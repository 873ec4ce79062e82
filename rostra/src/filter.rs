//! The default exception filter.
//!
//! Converts a [`DispatchError`] into the stable client-facing error
//! envelope. Every envelope carries at least an `"error"` field; validation
//! and HTTP-carrying failures may also carry `"details"`. Unclassified
//! failures always become an opaque 500 so internal error text never
//! reaches a client.

use http::StatusCode;
use rostra_core::{
    DispatchError, ExceptionFilter, HttpError, Request, Response, SchemaError, body_parse_failure,
    schema_failure,
};
use serde_json::{Value, json};

/// The filter used when the dispatcher is configured without a custom one.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultExceptionFilter;

impl DefaultExceptionFilter {
    fn envelope(status: StatusCode, message: &str, details: Option<&Value>) -> Response {
        let mut body = json!({ "error": message });
        if let Some(details) = details {
            body["details"] = details.clone();
        }
        Response::json(status, &body)
    }

    fn http(error: &HttpError) -> Response {
        Self::envelope(error.status, &error.message, error.details.as_ref())
    }

    fn validation(error: &SchemaError) -> Response {
        Self::envelope(
            StatusCode::BAD_REQUEST,
            "Validation failed",
            Some(&error.to_details()),
        )
    }

    fn bad_body() -> Response {
        Self::envelope(StatusCode::BAD_REQUEST, "Invalid JSON body", None)
    }

    fn internal() -> Response {
        Self::envelope(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error", None)
    }
}

impl ExceptionFilter for DefaultExceptionFilter {
    fn catch(&self, error: &DispatchError, _request: &Request) -> Response {
        match error {
            DispatchError::Http(http) => Self::http(http),
            DispatchError::Validation(schema) => Self::validation(schema),
            DispatchError::BodyParse(_) => Self::bad_body(),
            DispatchError::Handler(inner) => {
                // Handlers sometimes surface a validator or JSON failure as
                // a plain boxed error; classify structurally before giving
                // up and going opaque.
                if let Some(schema) = schema_failure(inner.as_ref()) {
                    Self::validation(schema)
                } else if body_parse_failure(inner.as_ref()) {
                    Self::bad_body()
                } else {
                    Self::internal()
                }
            }
        }
    }
}
