use crate::errors::WebhookError;
use crate::handler::WebhookHandler;
use crate::metrics_defs::{WEBHOOK_DURATION, WEBHOOK_REQUESTS};
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::{Body, Bytes, Incoming};
use hyper::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    ACCESS_CONTROL_REQUEST_HEADERS, HeaderMap, HeaderValue,
};
use hyper::service::Service;
use hyper::{Method, Request, Response, StatusCode};
use serde_json::json;
use shared::http::{make_empty_response, make_json_error_response, make_json_response};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

pub const WEBHOOK_PATH: &str = "/api/webhooks/typeform";
pub const HEALTH_PATH: &str = "/api/health";

pub type ResponseBody = BoxBody<Bytes, WebhookError>;

/// Routes inbound requests to the webhook handler and the health endpoint.
#[derive(Clone)]
pub struct RelayService {
    handler: Arc<WebhookHandler>,
    max_body_bytes: usize,
}

impl RelayService {
    pub fn new(handler: WebhookHandler, max_body_bytes: usize) -> Self {
        Self {
            handler: Arc::new(handler),
            max_body_bytes,
        }
    }

    pub async fn route<B>(&self, req: Request<B>) -> Response<ResponseBody>
    where
        B: Body + Send + 'static,
        B::Data: Send,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let requested_headers = req.headers().get(ACCESS_CONTROL_REQUEST_HEADERS).cloned();
        let path = req.uri().path().to_string();

        let mut response = match (req.method(), normalize_path(&path)) {
            (&Method::OPTIONS, _) => make_empty_response(StatusCode::NO_CONTENT),
            (&Method::GET | &Method::HEAD, HEALTH_PATH) => make_json_response(
                StatusCode::OK,
                &json!({ "status": "ok", "message": "API server is running" }),
            ),
            (&Method::POST, WEBHOOK_PATH) => self.handle_webhook(req).await,
            (method, path) => {
                tracing::warn!(method = %method, path = %path, "No route matched");
                make_json_error_response(StatusCode::NOT_FOUND, "Not found")
            }
        };

        add_cors_headers(response.headers_mut(), requested_headers);
        response
    }

    async fn handle_webhook<B>(&self, req: Request<B>) -> Response<ResponseBody>
    where
        B: Body + Send + 'static,
        B::Data: Send,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let start = Instant::now();
        let (parts, body) = req.into_parts();

        let (status, reply) = match read_body(body, self.max_body_bytes).await {
            Ok(bytes) => self.handler.handle(&parts.headers, &bytes).await,
            Err(e) => self.handler.error_reply(&e),
        };

        let status_tag = status.as_u16().to_string();
        shared::counter!(WEBHOOK_REQUESTS, "status" => status_tag.clone()).increment(1);
        shared::histogram!(WEBHOOK_DURATION, "status" => status_tag)
            .record(start.elapsed().as_secs_f64());

        make_json_response(status, &reply)
    }
}

async fn read_body<B>(body: B, limit: usize) -> Result<Bytes, WebhookError>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    Limited::new(body, limit)
        .collect()
        .await
        .map(|collected| collected.to_bytes())
        .map_err(|e| {
            if e.downcast_ref::<LengthLimitError>().is_some() {
                WebhookError::PayloadTooLarge(limit)
            } else {
                WebhookError::RequestBodyError(e.to_string())
            }
        })
}

/// Treats `/api/health/` like `/api/health`.
fn normalize_path(path: &str) -> &str {
    match path.strip_suffix('/') {
        Some(trimmed) if !trimmed.is_empty() => trimmed,
        _ => path,
    }
}

/// Allows any origin. Preflights get back whatever headers they asked for.
fn add_cors_headers(headers: &mut HeaderMap, requested_headers: Option<HeaderValue>) {
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, HEAD, POST, OPTIONS"),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        requested_headers
            .unwrap_or_else(|| HeaderValue::from_static("Content-Type, Typeform-Signature")),
    );
}

impl Service<Request<Incoming>> for RelayService {
    type Response = Response<ResponseBody>;
    type Error = WebhookError;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let service = self.clone();
        Box::pin(async move { Ok(service.route(req).await) })
    }
}
