//! An in-process HTTP server standing in for the Google APIs in tests.

use crate::config::Config;
use crate::youtube_api::ApiClient;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
pub(crate) struct Reply {
    status: u16,
    body: String,
    delay: Option<Duration>,
}

impl Reply {
    pub(crate) fn json(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            delay: None,
        }
    }

    pub(crate) fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub(crate) path: String,
    pub(crate) query: Vec<(String, String)>,
    pub(crate) authorization: Option<String>,
}

impl RecordedRequest {
    pub(crate) fn param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

type Handler = dyn Fn(&str, &[(String, String)]) -> Reply + Send + Sync;

pub(crate) struct MockServer {
    base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockServer {
    /// Serves every request on a random localhost port by asking `handler` for the reply.
    ///
    /// The handler sees the request path and its decoded query parameters.
    pub(crate) async fn start<F>(handler: F) -> Self
    where
        F: Fn(&str, &[(String, String)]) -> Reply + Send + Sync + 'static,
    {
        let handler: Arc<Handler> = Arc::new(handler);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind to localhost");
        let addr = listener.local_addr().expect("get local address");
        let requests = Arc::new(Mutex::new(Vec::new()));

        let recorded = Arc::clone(&requests);
        tokio::spawn(async move {
            loop {
                let Ok((conn, _)) = listener.accept().await else {
                    return;
                };
                let conn = hyper_util::rt::TokioIo::new(conn);
                let handler = Arc::clone(&handler);
                let recorded = Arc::clone(&recorded);
                tokio::spawn(async move {
                    let service = service_fn(move |req: Request<Incoming>| {
                        let handler = Arc::clone(&handler);
                        let recorded = Arc::clone(&recorded);
                        async move {
                            let path = req.uri().path().to_string();
                            let query: Vec<(String, String)> =
                                form_urlencoded::parse(req.uri().query().unwrap_or("").as_bytes())
                                    .into_owned()
                                    .collect();
                            let authorization = req
                                .headers()
                                .get(hyper::header::AUTHORIZATION)
                                .and_then(|v| v.to_str().ok())
                                .map(str::to_string);

                            let reply = (*handler)(&path, query.as_slice());
                            recorded.lock().expect("not poisoned").push(RecordedRequest {
                                path,
                                query,
                                authorization,
                            });
                            if let Some(delay) = reply.delay {
                                tokio::time::sleep(delay).await;
                            }

                            let mut response = Response::new(Full::new(Bytes::from(reply.body)));
                            *response.status_mut() =
                                StatusCode::from_u16(reply.status).expect("valid status code");
                            response.headers_mut().insert(
                                hyper::header::CONTENT_TYPE,
                                hyper::header::HeaderValue::from_static("application/json"),
                            );
                            Ok::<_, Infallible>(response)
                        }
                    });
                    let _ = hyper::server::conn::http1::Builder::new()
                        .serve_connection(conn, service)
                        .await;
                });
            }
        });

        Self {
            base_url: format!("http://{addr}"),
            requests,
        }
    }

    /// A config whose API bases point at this server.
    pub(crate) fn config(&self) -> Config {
        Config {
            data_api_base: format!("{}/youtube/v3", self.base_url),
            analytics_api_base: format!("{}/v2", self.base_url),
            ..Config::default()
        }
    }

    pub(crate) fn client(&self) -> ApiClient {
        ApiClient::new(&self.config()).expect("build API client")
    }

    pub(crate) fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().expect("not poisoned").clone()
    }
}
