use axum::body::Body;
use axum::http::{Request, StatusCode};
use infrakit_core::HttpConfig;
use infrakit_providers::features::http_server::AxumApp;
use infrakit_providers::features::{keyval, queue};
use tower::ServiceExt;

use crate::bootstrap::{Controller, Services};

pub async fn memory_services() -> Services {
    Services {
        keyval: keyval::connect_memory("memory://".to_string()).await.unwrap(),
        queue: queue::connect_memory("memory://".to_string()).await.unwrap(),
    }
}

pub fn router(ctrl: &dyn Controller, services: &Services) -> axum::Router {
    let mut app = AxumApp::new(HttpConfig::default());
    ctrl.init(&mut app, services);
    app.into_router().unwrap()
}

pub fn request(method: &str, uri: &str, json: Option<&str>) -> Request<Body> {
    let builder = Request::builder().method(method).uri(uri);
    match json {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn call(router: axum::Router, request: Request<Body>) -> (StatusCode, String) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}
