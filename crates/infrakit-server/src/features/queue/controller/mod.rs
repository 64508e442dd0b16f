use async_trait::async_trait;
use infrakit_core::{App, Context, Handler, QueueClient, QueuePayload, Result};
use serde_json::json;
use std::sync::Arc;

use crate::bootstrap::{single, Controller, Services};

pub const CODE_INVALID_MESSAGE: i64 = 3001;

/// `POST /queue/:name` publishes the JSON request body onto queue `name`.
///
/// JSON scalars go out as plain text (`42`, `true`); strings lose their
/// quotes; objects and arrays are sent as JSON.
pub struct QueueCtrl;

impl Controller for QueueCtrl {
    fn init(&self, app: &mut dyn App, services: &Services) {
        app.post("/queue/:name", single(Publish(services.queue.clone())));
    }
}

struct Publish(Arc<dyn QueueClient>);

fn to_payload(value: serde_json::Value) -> QueuePayload {
    match value {
        serde_json::Value::String(text) => QueuePayload::Str(text),
        serde_json::Value::Bool(flag) => QueuePayload::Bool(flag),
        serde_json::Value::Number(number) => match number.as_i64() {
            Some(int) => QueuePayload::Int(int),
            None => QueuePayload::Structured(serde_json::Value::Number(number)),
        },
        other => QueuePayload::Structured(other),
    }
}

#[async_trait]
impl Handler for Publish {
    async fn handle(&self, ctx: &mut Context) -> Result<()> {
        let name = ctx.param("name", "");
        let message: serde_json::Value = match ctx.bind() {
            Ok(message) => message,
            Err(e) => return ctx.send_error(CODE_INVALID_MESSAGE, &e.to_string(), None),
        };

        self.0.publish(&name, to_payload(message)).await?;
        ctx.send_result(&json!({ "queue": name }))
    }
}
