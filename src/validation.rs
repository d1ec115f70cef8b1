//! Request payload validation.
//!
//! Every JSON body accepted by the API is declared as a [`Schema`]: a serde
//! type with `validator` rules and a fixed field order. [`validate`] turns a
//! raw body into a normalized payload or an ordered list of field errors, and
//! [`ValidatedJson`] wires that into actix extraction.

use std::fmt;
use std::ops::Deref;

use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use futures::future::LocalBoxFuture;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use validator::{Validate, ValidationErrors};

use crate::error::AppError;

/// A single violated rule on one request field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Ordered collection of field errors for one rejected payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    errors: Vec<FieldError>,
}

impl ValidationFailure {
    pub fn new(errors: Vec<FieldError>) -> Self {
        Self { errors }
    }

    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(vec![FieldError::new(field, message)])
    }

    /// Flattens `validator` output using the schema's declared field order.
    pub fn from_errors(fields: &[(&'static str, &'static str)], errors: &ValidationErrors) -> Self {
        let by_field = errors.field_errors();
        let mut ordered = Vec::new();

        for (name, wire_name) in fields {
            if let Some(field_errors) = by_field.get(*name) {
                for err in field_errors.iter() {
                    let message = err
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("{} is invalid", wire_name));
                    ordered.push(FieldError::new(*wire_name, message));
                }
            }
        }

        Self::new(ordered)
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    pub fn fields(&self) -> Vec<&str> {
        self.errors.iter().map(|e| e.field.as_str()).collect()
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for ValidationFailure {}

/// A named request body shape.
pub trait Schema: DeserializeOwned + Validate {
    const NAME: &'static str;

    /// `(rust field, wire field)` pairs in reporting order.
    const FIELDS: &'static [(&'static str, &'static str)];

    fn normalize(self) -> Self {
        self
    }
}

/// Deserializes, normalizes and checks `body` against schema `T`.
pub fn validate<T: Schema>(body: Value) -> Result<T, ValidationFailure> {
    let body = match body {
        Value::Null => Value::Object(Default::default()),
        other => other,
    };

    let payload: T = serde_json::from_value(body).map_err(|e| {
        ValidationFailure::single("body", format!("Invalid {} request body: {}", T::NAME, e))
    })?;
    let payload = payload.normalize();

    payload
        .validate()
        .map_err(|errors| ValidationFailure::from_errors(T::FIELDS, &errors))?;

    Ok(payload)
}

/// JSON body extractor that only yields payloads passing [`validate`].
#[derive(Debug)]
pub struct ValidatedJson<T>(pub T);

impl<T> ValidatedJson<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Deref for ValidatedJson<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: Schema + 'static> FromRequest for ValidatedJson<T> {
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        let body = web::Bytes::from_request(req, payload);

        Box::pin(async move {
            let bytes = body.await?;
            let value = if bytes.iter().all(u8::is_ascii_whitespace) {
                Value::Null
            } else {
                serde_json::from_slice::<Value>(&bytes).map_err(|e| {
                    AppError::from(ValidationFailure::single("body", format!("Malformed JSON: {}", e)))
                })?
            };

            let payload = validate::<T>(value).map_err(AppError::from)?;
            Ok(ValidatedJson(payload))
        })
    }
}
