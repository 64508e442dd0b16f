use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::extract::{Path, Query};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::routing::{MethodFilter, MethodRouter};
use axum::Router;
use infrakit_core::{
    App, Context, Handler, HandlerChain, HttpConfig, InfraError, Method, Response, Result,
};
use std::collections::{BTreeMap, HashMap};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// [`App`] backed by an axum router.
///
/// Routes are collected while controllers initialize and compiled into a
/// [`Router`] when the server starts. Registering the same method and path
/// twice keeps the later chain.
pub struct AxumApp {
    config: HttpConfig,
    routes: BTreeMap<String, HashMap<Method, HandlerChain>>,
}

impl AxumApp {
    pub fn new(config: HttpConfig) -> Self {
        Self {
            config,
            routes: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    /// Compiles the registered routes. Unknown paths answer 404.
    ///
    /// Patterns axum cannot route, such as an unnamed `*` or two parameter
    /// names at the same position, fail with [`InfraError::ServerError`].
    pub fn into_router(self) -> Result<Router> {
        let paths: Vec<&str> = self.routes.keys().map(String::as_str).collect();
        for (i, path) in paths.iter().enumerate() {
            check_pattern(path)?;
            for other in &paths[..i] {
                check_overlap(other, path)?;
            }
        }

        let mut router = Router::new();
        for (path, methods) in self.routes {
            let mut endpoints = MethodRouter::new();
            for (method, chain) in methods {
                endpoints = endpoints.merge(chain_endpoint(method, chain));
            }
            // Backstop for insertion rules the checks above do not cover.
            router = panic::catch_unwind(AssertUnwindSafe(|| router.route(&path, endpoints)))
                .map_err(|_| invalid_route(&path, "rejected by the router"))?;
        }
        Ok(router)
    }
}

fn invalid_route(path: &str, reason: &str) -> InfraError {
    InfraError::ServerError(format!("invalid route '{path}': {reason}"))
}

fn is_capture(segment: &str) -> bool {
    segment.starts_with(':') || segment.starts_with('*')
}

/// Captures need a name and a wildcard must be the last segment.
fn check_pattern(path: &str) -> Result<()> {
    let segments: Vec<&str> = path.split('/').skip(1).collect();
    for (i, segment) in segments.iter().enumerate() {
        if is_capture(segment) && segment.len() == 1 {
            return Err(invalid_route(path, "parameters must be named"));
        }
        if segment.starts_with('*') && i + 1 != segments.len() {
            return Err(invalid_route(path, "a wildcard must be the last segment"));
        }
    }
    Ok(())
}

/// Two paths sharing a prefix must capture the next segment under one name.
fn check_overlap(first: &str, second: &str) -> Result<()> {
    for (a, b) in first.split('/').zip(second.split('/')) {
        if a == b {
            continue;
        }
        if is_capture(a) && is_capture(b) {
            return Err(invalid_route(
                second,
                &format!("'{b}' conflicts with '{a}' in '{first}'"),
            ));
        }
        break;
    }
    Ok(())
}

/// Factory registered under the `axum` app name.
pub fn create_app(config: &HttpConfig) -> Result<Box<dyn App>> {
    Ok(Box::new(AxumApp::new(config.clone())))
}

#[async_trait]
impl App for AxumApp {
    fn route(&mut self, method: Method, path: &str, handlers: Vec<Arc<dyn Handler>>) {
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };
        debug!(method = method.as_str(), %path, handlers = handlers.len(), "Registered route");
        self.routes
            .entry(path)
            .or_default()
            .insert(method, Arc::from(handlers));
    }

    async fn start(self: Box<Self>) -> Result<()> {
        let addr = self.config.bind_addr();
        let router = (*self).into_router()?;
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| InfraError::ServerError(format!("unable to bind {addr}: {e}")))?;
        info!(%addr, "HTTP server listening");

        axum::serve(listener, router)
            .await
            .map_err(|e| InfraError::ServerError(format!("HTTP server on {addr} failed: {e}")))
    }
}

fn method_filter(method: Method) -> MethodFilter {
    match method {
        Method::Get => MethodFilter::GET,
        Method::Post => MethodFilter::POST,
        Method::Put => MethodFilter::PUT,
        Method::Patch => MethodFilter::PATCH,
        Method::Delete => MethodFilter::DELETE,
    }
}

fn chain_endpoint(method: Method, chain: HandlerChain) -> MethodRouter {
    let handler = move |params: Option<Path<HashMap<String, String>>>,
                        Query(query): Query<HashMap<String, String>>,
                        verb: axum::http::Method,
                        uri: Uri,
                        headers: HeaderMap,
                        body: Bytes| {
        let chain = chain.clone();
        async move {
            let params = params.map(|Path(params)| params).unwrap_or_default();
            let mut ctx = Context::new(verb.as_str(), uri.path())
                .with_params(params)
                .with_query(query)
                .with_body(body.to_vec());
            for (name, value) in headers.iter() {
                if let Ok(value) = value.to_str() {
                    ctx = ctx.with_header(name.as_str(), value);
                }
            }

            match ctx.dispatch(chain).await {
                Ok(response) => into_axum_response(response),
                Err(err) => {
                    warn!(method = %verb, path = uri.path(), error = %err, "Handler chain failed");
                    (error_status(&err), err.to_string()).into_response()
                }
            }
        }
    };
    axum::routing::on(method_filter(method), handler)
}

fn error_status(err: &InfraError) -> StatusCode {
    match err {
        InfraError::DecodeError(_) => StatusCode::UNPROCESSABLE_ENTITY,
        InfraError::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn into_axum_response(response: Response) -> axum::response::Response {
    let status =
        StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut builder = axum::http::Response::builder().status(status);
    for (name, value) in response.headers {
        builder = builder.header(name, value);
    }
    builder.body(Body::from(response.body)).unwrap_or_else(|e| {
        warn!(error = %e, "Handler produced an invalid response");
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use infrakit_core::handler_fn;
    use serde::Deserialize;
    use tower::ServiceExt;

    async fn call(app: AxumApp, request: Request<Body>) -> (StatusCode, String) {
        let response = app.into_router().unwrap().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn ping() -> Arc<dyn Handler> {
        handler_fn(|ctx| {
            Box::pin(async move { ctx.send_string("pong") })
        })
    }

    #[tokio::test]
    async fn test_route_serves_string() {
        let mut app = AxumApp::new(HttpConfig::default());
        app.get("/ping", vec![ping()]);

        let (status, body) = call(app, get("/ping")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "pong");
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let mut app = AxumApp::new(HttpConfig::default());
        app.get("/ping", vec![ping()]);

        let (status, _) = call(app, get("/missing")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_methods_share_a_path() {
        let mut app = AxumApp::new(HttpConfig::default());
        app.get("/item", vec![ping()]);
        app.delete(
            "/item",
            vec![handler_fn(|ctx| {
                Box::pin(async move { ctx.send_string("gone") })
            })],
        );

        let request = Request::builder()
            .method("DELETE")
            .uri("/item")
            .body(Body::empty())
            .unwrap();
        let (status, body) = call(app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "gone");
    }

    #[tokio::test]
    async fn test_guard_short_circuits_chain() {
        let guard = handler_fn(|ctx| {
            Box::pin(async move {
                if ctx.get_header("x-token").is_empty() {
                    return ctx.send_error(401, "missing token", None);
                }
                ctx.next().await
            })
        });
        let mut app = AxumApp::new(HttpConfig::default());
        app.get("/secret", vec![guard, ping()]);

        let (status, body) = call(app, get("/secret")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let envelope: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(envelope["code"], 401);
        assert_eq!(envelope["messages"], "missing token");
    }

    #[tokio::test]
    async fn test_guard_passes_to_next_handler() {
        let guard = handler_fn(|ctx| {
            Box::pin(async move { ctx.next().await })
        });
        let mut app = AxumApp::new(HttpConfig::default());
        app.get("/secret", vec![guard, ping()]);

        let request = Request::builder()
            .uri("/secret")
            .header("X-Token", "t")
            .body(Body::empty())
            .unwrap();
        let (status, body) = call(app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "pong");
    }

    #[tokio::test]
    async fn test_path_and_query_reach_context() {
        let echo = handler_fn(|ctx| {
            Box::pin(async move {
                let text = format!("{}:{}", ctx.param("id", "?"), ctx.query("page", "1"));
                ctx.send_string(text)
            })
        });
        let mut app = AxumApp::new(HttpConfig::default());
        app.get("/users/:id", vec![echo]);

        let (_, body) = call(app, get("/users/7?page=3")).await;
        assert_eq!(body, "7:3");
    }

    #[tokio::test]
    async fn test_decode_error_is_unprocessable() {
        #[derive(Deserialize)]
        struct Signup {
            #[allow(dead_code)]
            name: String,
        }
        let bind = handler_fn(|ctx| {
            Box::pin(async move {
                let _: Signup = ctx.bind()?;
                ctx.send_string("ok")
            })
        });
        let mut app = AxumApp::new(HttpConfig::default());
        app.post("/bind", vec![bind]);

        let request = Request::builder()
            .method("POST")
            .uri("/bind")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, _) = call(app, request).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_handler_error_is_server_error() {
        let failing = handler_fn(|_ctx| {
            Box::pin(async move { Err(InfraError::BackendError("boom".to_string())) })
        });
        let mut app = AxumApp::new(HttpConfig::default());
        app.get("/fail", vec![failing]);

        let (status, body) = call(app, get("/fail")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.contains("boom"));
    }

    #[tokio::test]
    async fn test_later_registration_replaces_chain() {
        let mut app = AxumApp::new(HttpConfig::default());
        app.get("ping", vec![ping()]);
        app.get(
            "/ping",
            vec![handler_fn(|ctx| {
                Box::pin(async move { ctx.send_string("pong v2") })
            })],
        );

        let (_, body) = call(app, get("/ping")).await;
        assert_eq!(body, "pong v2");
    }

    #[test]
    fn test_conflicting_param_names_are_rejected() {
        let mut app = AxumApp::new(HttpConfig::default());
        app.get("/users/:id", vec![ping()]);
        app.delete("/users/:name", vec![ping()]);

        let err = app.into_router().err().unwrap();
        assert!(matches!(err, InfraError::ServerError(_)));
        assert!(err.to_string().contains("/users/:name"));
    }

    #[test]
    fn test_unnamed_wildcard_is_rejected() {
        let mut app = AxumApp::new(HttpConfig::default());
        app.get("/static/*", vec![ping()]);

        let err = app.into_router().err().unwrap();
        assert!(matches!(err, InfraError::ServerError(_)));
    }

    #[test]
    fn test_check_pattern_rules() {
        assert!(check_pattern("/files/*path").is_ok());
        assert!(check_pattern("/users/:id/posts").is_ok());
        assert!(check_pattern("/users/:").is_err());
        assert!(check_pattern("/files/*path/meta").is_err());

        assert!(check_overlap("/users/:id", "/users/:id/posts").is_ok());
        assert!(check_overlap("/users/:id", "/teams/:name").is_ok());
        assert!(check_overlap("/users/:id/a", "/users/:uid/b").is_err());
    }

    #[tokio::test]
    async fn test_start_reports_invalid_route() {
        let mut app = AxumApp::new(HttpConfig::new("127.0.0.1", 0));
        app.get("/static/*", vec![ping()]);

        let err = Box::new(app).start().await.unwrap_err();
        assert!(matches!(err, InfraError::ServerError(_)));
    }

    #[tokio::test]
    async fn test_factory_builds_app() {
        let app = create_app(&HttpConfig::new("127.0.0.1", 0)).unwrap();
        drop(app);
    }
}
