//! Access control middleware.
//!
//! This middleware can be placed on any route or service. It validates the bearer token in the
//! `Authorization` header against the server's [`TokenIssuer`] and then checks the claims in the
//! token against the required roles for the route. If the token is valid and the user has the
//! required roles, the claims are stored in the request extensions (where handlers extract them as
//! [`JwtClaims`]) and the request continues. Otherwise a 401 or 403 response is returned.

use std::{pin::Pin, rc::Rc};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    error::ErrorInternalServerError,
    web,
    Error,
    HttpMessage,
};
use arena_payment_engine::db_types::Role;
use futures::{
    future::{ok, Ready},
    Future,
};

use crate::{
    auth::{extract_bearer_token, JwtClaims, TokenIssuer},
    errors::{AuthError, ServerError},
};

pub struct AclMiddlewareFactory {
    required_roles: Vec<Role>,
}

impl AclMiddlewareFactory {
    pub fn new(required_roles: &[Role]) -> Self {
        AclMiddlewareFactory { required_roles: required_roles.to_vec() }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AclMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = AclMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AclMiddlewareService { required_roles: self.required_roles.clone(), service: Rc::new(service) })
    }
}

pub struct AclMiddlewareService<S> {
    required_roles: Vec<Role>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AclMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let required_roles = self.required_roles.clone();
        Box::pin(async move {
            let issuer = req.app_data::<web::Data<TokenIssuer>>().cloned().ok_or_else(|| {
                log::warn!("🛡️ No token issuer registered with the application");
                ErrorInternalServerError("No token issuer registered with the application")
            })?;
            let token = extract_bearer_token(req.request())
                .map_err(|e| Error::from(ServerError::AuthenticationError(e)))?;
            let claims = issuer
                .validate_token(&token)
                .map_err(|e| Error::from(ServerError::AuthenticationError(e)))?;
            if required_roles.iter().all(|role| claims.roles.contains(role)) {
                req.extensions_mut().insert::<JwtClaims>(claims);
                service.call(req).await
            } else {
                Err(ServerError::AuthenticationError(AuthError::InsufficientPermissions(format!(
                    "{} does not hold the required roles for this route",
                    claims.sub
                )))
                .into())
            }
        })
    }
}
