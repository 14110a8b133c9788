use actix_web::error::{ErrorForbidden, ErrorInternalServerError, ErrorUnauthorized};
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, web::Data};
use futures::future::{Ready, ready};

use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::model::payroll_lock::LockRole;
use crate::model::role::Role;

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub username: String,
    pub role: Role,
}

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // Already verified by the auth middleware
        if let Some(user) = req.extensions().get::<AuthUser>() {
            return ready(Ok(user.clone()));
        }

        let token = match req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
        {
            Some(t) => t,
            None => return ready(Err(ErrorUnauthorized("Missing token"))),
        };

        let config = match req.app_data::<Data<Config>>() {
            Some(c) => c,
            None => return ready(Err(ErrorInternalServerError("Config missing"))),
        };

        let claims = match verify_token(token, &config.jwt_secret) {
            Ok(c) => c,
            Err(_) => return ready(Err(ErrorUnauthorized("Invalid token"))),
        };

        let role = match Role::from_id(claims.role) {
            Some(r) => r,
            None => return ready(Err(ErrorUnauthorized("Invalid role"))),
        };

        ready(Ok(AuthUser {
            user_id: claims.user_id,
            username: claims.sub,
            role,
        }))
    }
}

impl AuthUser {
    pub fn actor(&self) -> Option<u64> {
        Some(self.user_id)
    }

    pub fn require_admin(&self) -> actix_web::Result<()> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(ErrorForbidden("Admin only"))
        }
    }

    pub fn require_hr_or_admin(&self) -> actix_web::Result<()> {
        if matches!(self.role, Role::Admin | Role::Hr) {
            Ok(())
        } else {
            Err(ErrorForbidden("HR/Admin only"))
        }
    }

    pub fn can_act_as(&self, role: LockRole) -> bool {
        matches!(
            (self.role, role),
            (Role::Admin, _) | (Role::Hr, LockRole::Hr) | (Role::Finance, LockRole::Finance)
        )
    }

    /// HR locks and sign-off for HR or Admin, Finance ones for Finance or Admin.
    pub fn require_lock_role(&self, role: LockRole) -> actix_web::Result<()> {
        if self.can_act_as(role) {
            Ok(())
        } else {
            match role {
                LockRole::Hr => Err(ErrorForbidden("HR/Admin only")),
                LockRole::Finance => Err(ErrorForbidden("Finance/Admin only")),
            }
        }
    }
}
