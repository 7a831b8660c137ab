use crate::email::{EmailError, EmailMessage, EmailSender};
use crate::notes_store::{NotesStore, NotesStoreError, Properties, RecordHandle};
use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::header::HeaderMap;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use url::Url;

/// Notes store double recording every call.
#[derive(Default)]
pub struct RecordingStore {
    calls: Mutex<Vec<(String, Properties)>>,
    failure: Option<String>,
}

impl RecordingStore {
    pub fn failing(message: &str) -> Self {
        RecordingStore {
            calls: Mutex::new(Vec::new()),
            failure: Some(message.to_string()),
        }
    }

    pub fn calls(&self) -> Vec<(String, Properties)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotesStore for RecordingStore {
    async fn create_record(
        &self,
        database_id: &str,
        properties: &Properties,
    ) -> Result<RecordHandle, NotesStoreError> {
        self.calls
            .lock()
            .unwrap()
            .push((database_id.to_string(), properties.clone()));

        match &self.failure {
            Some(message) => Err(NotesStoreError::Api {
                status: 400,
                message: message.clone(),
            }),
            None => Ok(RecordHandle {
                id: "page-1".to_string(),
                url: None,
            }),
        }
    }
}

/// Email sender double recording every message.
#[derive(Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<EmailMessage>>,
    failure: Option<String>,
}

impl RecordingSender {
    pub fn failing(message: &str) -> Self {
        RecordingSender {
            sent: Mutex::new(Vec::new()),
            failure: Some(message.to_string()),
        }
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailSender for RecordingSender {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        self.sent.lock().unwrap().push(message.clone());

        match &self.failure {
            Some(message) => Err(EmailError::Api {
                status: 503,
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

pub struct MockUpstream {
    pub url: Url,
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
}

impl MockUpstream {
    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

/// Starts a local HTTP server that records requests and answers each with `status` and `body`.
pub async fn start_mock_upstream(status: StatusCode, body: &'static str) -> MockUpstream {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to address");
    let port = listener.local_addr().unwrap().port();

    let requests = Arc::new(Mutex::new(Vec::new()));
    let captured = requests.clone();

    tokio::spawn(async move {
        loop {
            let (stream, _) = listener.accept().await.unwrap();
            let io = TokioIo::new(stream);
            let captured = captured.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req: Request<Incoming>| {
                    let captured = captured.clone();
                    async move {
                        let (parts, incoming) = req.into_parts();
                        let bytes = incoming
                            .collect()
                            .await
                            .map(|collected| collected.to_bytes())
                            .unwrap_or_else(|_| Bytes::new());

                        captured.lock().unwrap().push(CapturedRequest {
                            method: parts.method,
                            path: parts.uri.path().to_string(),
                            headers: parts.headers,
                            body: bytes,
                        });

                        let mut response = Response::new(Full::new(Bytes::from_static(body.as_bytes())));
                        *response.status_mut() = status;
                        Ok::<_, Infallible>(response)
                    }
                });

                if let Err(err) = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new())
                    .serve_connection(io, service)
                    .await
                {
                    eprintln!("Error serving connection: {:?}", err);
                }
            });
        }
    });

    MockUpstream {
        url: Url::parse(&format!("http://127.0.0.1:{port}")).expect("Failed to parse URL"),
        requests,
    }
}
