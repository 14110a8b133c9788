use actix_web::middleware::Next;
use actix_web::{
    Error, HttpMessage, HttpResponse,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    web::Data,
};
use serde_json::{Value, json};
use tracing::warn;

use crate::auth::auth::AuthUser;
use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::model::role::Role;

fn reject(req: ServiceRequest, body: Value) -> ServiceResponse<BoxBody> {
    warn!(path = %req.path(), reason = %body["message"], "Rejected unauthenticated request");
    req.into_response(HttpResponse::Unauthorized().json(body).map_into_boxed_body())
}

/// Verifies the bearer token once per request and stores the caller as an
/// [`AuthUser`] extension for the handlers.
pub async fn auth_middleware(req: ServiceRequest, next: Next<BoxBody>) -> Result<ServiceResponse<BoxBody>, Error> {
    let config = req
        .app_data::<Data<Config>>()
        .cloned()
        .ok_or_else(|| actix_web::error::ErrorInternalServerError("App config missing"))?;

    let header_value = match req.headers().get("Authorization").map(|h| h.to_str()) {
        Some(Ok(h)) => h.to_string(),
        Some(Err(_)) => {
            return Ok(reject(req, json!({"message": "Invalid Authorization header encoding"})));
        }
        None => return Ok(reject(req, json!({"message": "Missing Authorization header"}))),
    };

    let Some(token) = header_value.strip_prefix("Bearer ") else {
        return Ok(reject(
            req,
            json!({"message": "Authorization header must start with Bearer"}),
        ));
    };

    let claims = match verify_token(token, &config.jwt_secret) {
        Ok(c) => c,
        Err(e) => {
            return Ok(reject(
                req,
                json!({"message": "Invalid or expired token", "details": e}),
            ));
        }
    };

    let Some(role) = Role::from_id(claims.role) else {
        return Ok(reject(req, json!({"message": "Invalid role"})));
    };

    req.extensions_mut().insert(AuthUser {
        user_id: claims.user_id,
        username: claims.sub,
        role,
    });

    next.call(req).await
}
