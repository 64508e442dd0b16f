use async_trait::async_trait;
use infrakit_core::{handler_fn, App, Context, Handler, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::bootstrap::{single, Controller, Services};

pub const API_KEY_HEADER: &str = "x-api-key";
pub const CALLER_LOCAL: &str = "caller";

pub const CODE_INVALID_REQUEST: i64 = 1001;
pub const CODE_EMPTY_MESSAGE: i64 = 1002;
pub const CODE_UNAUTHORIZED: i64 = 1401;

#[derive(Debug, Deserialize)]
pub struct EchoRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct EchoReply {
    pub message: String,
    pub length: usize,
}

/// Smoke-test routes under `/test`.
///
/// - `GET /test/ping` answers `pong`
/// - `POST /test/echo` echoes a JSON or form `message` in a result envelope
/// - `GET /test/whoami` runs behind an API-key guard
pub struct TestCtrl;

impl Controller for TestCtrl {
    fn init(&self, app: &mut dyn App, _services: &Services) {
        app.get(
            "/test/ping",
            vec![handler_fn(|ctx| Box::pin(async move { ctx.send_string("pong") }))],
        );
        app.post("/test/echo", single(Echo));
        let guard: Arc<dyn Handler> = Arc::new(ApiKeyGuard);
        let whoami: Arc<dyn Handler> = Arc::new(WhoAmI);
        app.get("/test/whoami", vec![guard, whoami]);
    }
}

struct Echo;

#[async_trait]
impl Handler for Echo {
    async fn handle(&self, ctx: &mut Context) -> Result<()> {
        let request: EchoRequest = match ctx.bind() {
            Ok(request) => request,
            Err(e) => return ctx.send_error(CODE_INVALID_REQUEST, &e.to_string(), None),
        };
        if request.message.is_empty() {
            return ctx.send_error(CODE_EMPTY_MESSAGE, "message must not be empty", None);
        }

        ctx.send_result(&EchoReply {
            length: request.message.chars().count(),
            message: request.message,
        })
    }
}

/// Rejects requests without an API key; otherwise stores it for later handlers.
struct ApiKeyGuard;

#[async_trait]
impl Handler for ApiKeyGuard {
    async fn handle(&self, ctx: &mut Context) -> Result<()> {
        let key = ctx.get_header(API_KEY_HEADER);
        if key.is_empty() {
            return ctx.send_error(CODE_UNAUTHORIZED, "missing api key", None);
        }
        ctx.set(CALLER_LOCAL, key);
        ctx.next().await
    }
}

struct WhoAmI;

#[async_trait]
impl Handler for WhoAmI {
    async fn handle(&self, ctx: &mut Context) -> Result<()> {
        let caller = ctx.get::<String>(CALLER_LOCAL).cloned().unwrap_or_default();
        ctx.send_result(&serde_json::json!({ "caller": caller }))
    }
}
