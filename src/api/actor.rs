use actix_web::{
    FromRequest, HttpRequest,
    dev::Payload,
    error::{ErrorBadRequest, ErrorUnauthorized},
};
use futures::future::{Ready, ready};

use crate::model::Actor;

/// Tenant + actor attribution extracted from headers. Authorization is
/// the upstream gateway's job; these headers arrive pre-verified and are
/// recorded for audit only.
pub struct ActorContext {
    pub tenant_id: String,
    pub actor: Actor,
}

impl FromRequest for ActorContext {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let header = |name: &str| {
            req.headers()
                .get(name)
                .and_then(|h| h.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let tenant_id = match header("X-Tenant-Id") {
            Some(t) => t,
            None => return ready(Err(ErrorBadRequest("Missing X-Tenant-Id header"))),
        };
        let actor_id = match header("X-Actor-Id") {
            Some(id) => id,
            None => return ready(Err(ErrorUnauthorized("Missing X-Actor-Id header"))),
        };
        let name = header("X-Actor-Name").unwrap_or_else(|| actor_id.clone());
        let role = header("X-Actor-Role").unwrap_or_else(|| "api".to_string());

        ready(Ok(ActorContext { tenant_id, actor: Actor::new(actor_id, name, role) }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[actix_web::test]
    async fn extracts_tenant_and_actor() {
        let req = TestRequest::default()
            .insert_header(("X-Tenant-Id", "t1"))
            .insert_header(("X-Actor-Id", "usr-9"))
            .insert_header(("X-Actor-Role", "admin"))
            .to_http_request();
        let ctx = ActorContext::from_request(&req, &mut Payload::None).await.unwrap();
        assert_eq!(ctx.tenant_id, "t1");
        assert_eq!(ctx.actor.id, "usr-9");
        // name defaults to the id when absent
        assert_eq!(ctx.actor.name, "usr-9");
        assert_eq!(ctx.actor.role, "admin");
    }

    #[actix_web::test]
    async fn missing_tenant_is_rejected() {
        let req = TestRequest::default()
            .insert_header(("X-Actor-Id", "usr-9"))
            .to_http_request();
        assert!(ActorContext::from_request(&req, &mut Payload::None).await.is_err());
    }
}
