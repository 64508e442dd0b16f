use async_trait::async_trait;
use infrakit_core::{App, Context, Handler, KeyValClient, Result};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use crate::bootstrap::{single, Controller, Services};

pub const CODE_INVALID_VALUE: i64 = 2001;

#[derive(Debug, Deserialize)]
pub struct PutValueRequest {
    pub value: String,
    /// Time to live in milliseconds; absent or zero keeps the key forever.
    #[serde(default)]
    pub ttl_ms: Option<u64>,
}

/// Key-value routes over the configured store.
pub struct KeyValCtrl;

impl Controller for KeyValCtrl {
    fn init(&self, app: &mut dyn App, services: &Services) {
        let kv = &services.keyval;
        app.get("/keyval/:key", single(GetValue(kv.clone())));
        app.get("/keyval/:key/int", single(GetInt(kv.clone())));
        app.put("/keyval/:key", single(PutValue(kv.clone())));
        app.delete("/keyval/:key", single(DeleteValue(kv.clone())));
    }
}

struct GetValue(Arc<dyn KeyValClient>);

#[async_trait]
impl Handler for GetValue {
    async fn handle(&self, ctx: &mut Context) -> Result<()> {
        let key = ctx.param("key", "");
        let value = self.0.get(&key).await;
        ctx.send_result(&json!({ "key": key, "value": value }))
    }
}

struct GetInt(Arc<dyn KeyValClient>);

#[async_trait]
impl Handler for GetInt {
    async fn handle(&self, ctx: &mut Context) -> Result<()> {
        let key = ctx.param("key", "");
        let value = self.0.get_int(&key).await;
        ctx.send_result(&json!({ "key": key, "value": value }))
    }
}

struct PutValue(Arc<dyn KeyValClient>);

#[async_trait]
impl Handler for PutValue {
    async fn handle(&self, ctx: &mut Context) -> Result<()> {
        let key = ctx.param("key", "");
        let request: PutValueRequest = match ctx.bind() {
            Ok(request) => request,
            Err(e) => return ctx.send_error(CODE_INVALID_VALUE, &e.to_string(), None),
        };

        let ttl = request.ttl_ms.map(Duration::from_millis);
        self.0.set(&key, &request.value, ttl).await?;
        ctx.send_result(&json!({ "key": key }))
    }
}

struct DeleteValue(Arc<dyn KeyValClient>);

#[async_trait]
impl Handler for DeleteValue {
    async fn handle(&self, ctx: &mut Context) -> Result<()> {
        let key = ctx.param("key", "");
        self.0.del(&key).await?;
        ctx.send_result(&json!({ "key": key }))
    }
}
