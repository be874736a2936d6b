//! Body extractors that reject with the API envelope
//!
//! axum's `Form`/`Json` rejections are plain text; these wrappers turn them
//! into [`ApiError::BadRequest`] so clients always get the same shape.

use axum::{
    async_trait,
    extract::{FromRequest, Request},
    Form, Json,
};
use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// `application/x-www-form-urlencoded` body
pub struct ActionForm<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ActionForm<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Form(value) = Form::<T>::from_request(req, state)
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        Ok(Self(value))
    }
}

/// JSON body
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        Ok(Self(value))
    }
}
