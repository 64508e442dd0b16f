use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use crate::{BoxFuture, InfraError, Result, ResultEnvelope};

pub const STATUS_OK: u16 = 200;
pub const STATUS_BAD_REQUEST: u16 = 400;

const CONTENT_TYPE: &str = "content-type";
const JSON_CONTENT_TYPE: &str = "application/json";
const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const OCTET_CONTENT_TYPE: &str = "application/octet-stream";
const CONTENT_DISPOSITION: &str = "content-disposition";

/// Ordered handlers bound to one route.
pub type HandlerChain = Arc<[Arc<dyn Handler>]>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

/// Listener settings read from `app.http.*`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpConfig {
    pub address: String,
    pub port: u16,
}

impl HttpConfig {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self::new("0.0.0.0", 8080)
    }
}

/// One step of a route's handler chain.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, ctx: &mut Context) -> Result<()>;
}

struct FnHandler<F>(F);

#[async_trait]
impl<F> Handler for FnHandler<F>
where
    F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, Result<()>> + Send + Sync,
{
    async fn handle(&self, ctx: &mut Context) -> Result<()> {
        (self.0)(ctx).await
    }
}

/// Wraps a closure returning a boxed future as a [`Handler`].
pub fn handler_fn<F>(f: F) -> Arc<dyn Handler>
where
    F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, Result<()>> + Send + Sync + 'static,
{
    Arc::new(FnHandler(f))
}

/// Capability contract for an HTTP server engine.
#[async_trait]
pub trait App: Send {
    fn route(&mut self, method: Method, path: &str, handlers: Vec<Arc<dyn Handler>>);

    fn get(&mut self, path: &str, handlers: Vec<Arc<dyn Handler>>) {
        self.route(Method::Get, path, handlers);
    }

    fn post(&mut self, path: &str, handlers: Vec<Arc<dyn Handler>>) {
        self.route(Method::Post, path, handlers);
    }

    fn put(&mut self, path: &str, handlers: Vec<Arc<dyn Handler>>) {
        self.route(Method::Put, path, handlers);
    }

    fn patch(&mut self, path: &str, handlers: Vec<Arc<dyn Handler>>) {
        self.route(Method::Patch, path, handlers);
    }

    fn delete(&mut self, path: &str, handlers: Vec<Arc<dyn Handler>>) {
        self.route(Method::Delete, path, handlers);
    }

    /// Binds the configured address and serves until the server stops.
    async fn start(self: Box<Self>) -> Result<()>;
}

/// Response under construction for a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Default for Response {
    fn default() -> Self {
        Self {
            status: STATUS_OK,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }
}

impl Response {
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, value)| value.as_str())
    }

    fn set_header(&mut self, key: &str, value: &str) {
        let key = key.to_ascii_lowercase();
        match self.headers.iter_mut().find(|(name, _)| *name == key) {
            Some(entry) => entry.1 = value.to_string(),
            None => self.headers.push((key, value.to_string())),
        }
    }
}

/// Backend-agnostic per-request state.
///
/// A server adapter snapshots the inbound request into a `Context`, runs the
/// route's chain with [`Context::dispatch`] and turns the resulting
/// [`Response`] back into its own response type.
pub struct Context {
    method: String,
    path: String,
    params: HashMap<String, String>,
    query: HashMap<String, String>,
    headers: HashMap<String, String>,
    body: Vec<u8>,
    locals: HashMap<String, Box<dyn Any + Send + Sync>>,
    chain: HandlerChain,
    position: usize,
    response: Response,
}

impl Context {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            params: HashMap::new(),
            query: HashMap::new(),
            headers: HashMap::new(),
            body: Vec::new(),
            locals: HashMap::new(),
            chain: Arc::from(Vec::new()),
            position: 0,
            response: Response::default(),
        }
    }

    pub fn with_params(mut self, params: HashMap<String, String>) -> Self {
        self.params = params;
        self
    }

    pub fn with_query(mut self, query: HashMap<String, String>) -> Self {
        self.query = query;
        self
    }

    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.headers
            .insert(key.to_ascii_lowercase(), value.to_string());
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Runs `chain` from its first handler and returns the built response.
    pub async fn dispatch(mut self, chain: HandlerChain) -> Result<Response> {
        self.chain = chain;
        self.position = 0;
        if let Some(first) = self.chain.first().cloned() {
            first.handle(&mut self).await?;
        }
        Ok(self.response)
    }

    /// Hands control to the next handler of the chain, if any.
    pub async fn next(&mut self) -> Result<()> {
        self.position += 1;
        match self.chain.get(self.position).cloned() {
            Some(handler) => handler.handle(self).await,
            None => Ok(()),
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn status(&mut self, code: u16) -> &mut Self {
        self.response.status = code;
        self
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn param(&self, key: &str, default: &str) -> String {
        lookup_or(&self.params, key, default)
    }

    pub fn query(&self, key: &str, default: &str) -> String {
        lookup_or(&self.query, key, default)
    }

    /// Reads a field of a url-encoded request body.
    pub fn form_value(&self, key: &str, default: &str) -> String {
        if !self.is_form() {
            return default.to_string();
        }
        url::form_urlencoded::parse(&self.body)
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.into_owned())
            .unwrap_or_else(|| default.to_string())
    }

    /// Decodes the request body into `T`, as JSON or as a url-encoded form.
    pub fn bind<T: DeserializeOwned>(&self) -> Result<T> {
        if self.is_form() {
            let fields: serde_json::Map<String, serde_json::Value> =
                url::form_urlencoded::parse(&self.body)
                    .map(|(k, v)| (k.into_owned(), serde_json::Value::String(v.into_owned())))
                    .collect();
            return serde_json::from_value(serde_json::Value::Object(fields))
                .map_err(|e| InfraError::DecodeError(format!("invalid form body: {e}")));
        }

        serde_json::from_slice(&self.body)
            .map_err(|e| InfraError::DecodeError(format!("invalid JSON body: {e}")))
    }

    pub fn get_header(&self, key: &str) -> String {
        self.headers
            .get(&key.to_ascii_lowercase())
            .cloned()
            .unwrap_or_default()
    }

    pub fn set_header(&mut self, key: &str, value: &str) {
        self.response.set_header(key, value);
    }

    /// Stores a request-scoped value for later handlers of the chain.
    pub fn set<T: Any + Send + Sync>(&mut self, key: &str, value: T) {
        self.locals.insert(key.to_string(), Box::new(value));
    }

    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.locals.get(key).and_then(|value| value.downcast_ref())
    }

    pub fn send_string(&mut self, data: impl Into<String>) -> Result<()> {
        self.response.set_header(CONTENT_TYPE, TEXT_CONTENT_TYPE);
        self.response.body = data.into().into_bytes();
        Ok(())
    }

    /// Wraps `data` in a success envelope.
    pub fn send_result<T: Serialize + ?Sized>(&mut self, data: &T) -> Result<()> {
        let data = serde_json::to_value(data)
            .map_err(|e| InfraError::SerializationError(format!("invalid result data: {e}")))?;
        self.send_json(&ResultEnvelope::success(Some(data)))
    }

    /// Sends an error envelope. The HTTP status is always 400, whatever `code` is.
    pub fn send_error(
        &mut self,
        code: i64,
        message: &str,
        data: Option<serde_json::Value>,
    ) -> Result<()> {
        let mut envelope = ResultEnvelope::failure(code, message);
        envelope.data = data;
        self.status(STATUS_BAD_REQUEST);
        self.send_json(&envelope)
    }

    pub fn send_json<T: Serialize + ?Sized>(&mut self, data: &T) -> Result<()> {
        let body = serde_json::to_vec(data)
            .map_err(|e| InfraError::SerializationError(format!("invalid JSON response: {e}")))?;
        self.response.set_header(CONTENT_TYPE, JSON_CONTENT_TYPE);
        self.response.body = body;
        Ok(())
    }

    /// Sends the file at `path` as a download named `file_name`, or after
    /// the path's last component when `file_name` is empty.
    pub async fn send_file(&mut self, path: &str, file_name: &str) -> Result<()> {
        let body = tokio::fs::read(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => InfraError::NotFound(format!("file '{path}'")),
            _ => InfraError::ServerError(format!("failed to read file '{path}': {e}")),
        })?;
        let file_name = if file_name.is_empty() {
            std::path::Path::new(path)
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or_default()
        } else {
            file_name
        };
        self.send_file_bytes(body, file_name)
    }

    /// Sends in-memory bytes as a download named `file_name`.
    pub fn send_file_bytes(&mut self, data: impl Into<Vec<u8>>, file_name: &str) -> Result<()> {
        self.response.set_header(CONTENT_TYPE, OCTET_CONTENT_TYPE);
        self.response
            .set_header(CONTENT_DISPOSITION, &attachment(file_name));
        self.response.body = data.into();
        Ok(())
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    fn is_form(&self) -> bool {
        self.headers
            .get(CONTENT_TYPE)
            .map(|value| value.starts_with(FORM_CONTENT_TYPE))
            .unwrap_or(false)
    }
}

fn lookup_or(values: &HashMap<String, String>, key: &str, default: &str) -> String {
    values
        .get(key)
        .cloned()
        .unwrap_or_else(|| default.to_string())
}

/// `attachment` disposition; quotes and control characters are dropped from
/// the name so the header stays well formed.
fn attachment(file_name: &str) -> String {
    let name: String = file_name
        .chars()
        .filter(|c| *c != '"' && *c != '\\' && !c.is_control())
        .collect();
    if name.is_empty() {
        "attachment".to_string()
    } else {
        format!("attachment; filename=\"{name}\"")
    }
}
