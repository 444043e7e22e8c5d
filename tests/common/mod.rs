//! In-process mock COS server

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, Response, StatusCode};
use axum::Router;
use coskit::signer::{Query, Signer};
use coskit::{Client, CosConfig};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const SECRET_ID: &str = "AKIDmocksecretid";
pub const SECRET_KEY: &str = "mocksecretkey";

/// A request as seen by the mock server
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub query: Query,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Recompute the signature from what arrived on the wire
    pub fn assert_signed(&self) {
        let auth = self.header("authorization").expect("missing authorization");
        let fields: Query = auth
            .split('&')
            .filter_map(|kv| kv.split_once('='))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert_eq!(fields["q-sign-algorithm"], "sha1");
        assert_eq!(fields["q-ak"], SECRET_ID);

        let (start, end) = fields["q-key-time"].split_once(';').unwrap();
        let start: i64 = start.parse().unwrap();
        let end: i64 = end.parse().unwrap();

        let mut signed_headers = HeaderMap::new();
        for name in fields["q-header-list"].split(';').filter(|s| !s.is_empty()) {
            let value = self
                .headers
                .get(name)
                .unwrap_or_else(|| panic!("signed header {} not sent", name));
            signed_headers.insert(
                axum::http::HeaderName::from_bytes(name.as_bytes()).unwrap(),
                value.clone(),
            );
        }

        let expected = Signer::new(&self.method, &self.path, Some(&signed_headers), Some(&self.query))
            .get_signature_at(
                SECRET_KEY,
                SECRET_ID,
                start,
                Duration::from_secs((end - start) as u64),
            );
        assert_eq!(auth, expected);
    }
}

/// What the mock answers
pub struct Reply {
    pub status: StatusCode,
    pub headers: Vec<(&'static str, String)>,
    pub body: Vec<u8>,
    /// Send `body`, then break the stream instead of finishing it
    pub cut_off: bool,
}

impl Reply {
    pub fn ok() -> Self {
        Self::status(StatusCode::OK)
    }

    pub fn status(status: StatusCode) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
            cut_off: false,
        }
    }

    pub fn xml(body: &str) -> Self {
        Self::ok()
            .header("content-type", "application/xml")
            .body(body.as_bytes().to_vec())
    }

    pub fn error(status: StatusCode, code: &str) -> Self {
        let body = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
             <Error><Code>{}</Code><Message>mock {}</Message>\
             <Resource>mock</Resource><RequestId>req-{}</RequestId></Error>",
            code,
            code,
            status.as_u16()
        );
        Self::status(status)
            .header("content-type", "application/xml")
            .body(body.into_bytes())
    }

    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    pub fn cut_off(mut self) -> Self {
        self.cut_off = true;
        self
    }
}

type Responder = Arc<dyn Fn(&Recorded) -> Reply + Send + Sync>;

#[derive(Clone)]
struct MockState {
    responder: Responder,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

pub struct MockCos {
    pub url: String,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl MockCos {
    pub async fn start<F>(responder: F) -> Self
    where
        F: Fn(&Recorded) -> Reply + Send + Sync + 'static,
    {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = MockState {
            responder: Arc::new(responder),
            requests: requests.clone(),
        };
        let app = Router::new().fallback(handle).with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{}", addr),
            requests,
        }
    }

    pub fn config(&self) -> CosConfig {
        let mut config = CosConfig::new("mock", SECRET_ID, SECRET_KEY);
        config.endpoint = Some(self.url.clone());
        config.service_endpoint = Some(self.url.clone());
        config.timeout = 10;
        config
    }

    pub fn client(&self) -> Client {
        Client::new(&self.config()).unwrap()
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last(&self) -> Recorded {
        self.requests().pop().expect("no request recorded")
    }
}

async fn handle(State(state): State<MockState>, req: Request) -> Response<Body> {
    let (parts, body) = req.into_parts();
    let body = axum::body::to_bytes(body, usize::MAX).await.unwrap().to_vec();

    let url = reqwest::Url::parse(&format!("http://mock{}", parts.uri)).unwrap();
    let recorded = Recorded {
        method: parts.method.to_string(),
        path: parts.uri.path().to_string(),
        query: url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect(),
        headers: parts.headers.clone(),
        body,
    };

    let reply = (state.responder)(&recorded);
    state.requests.lock().unwrap().push(recorded);

    let mut builder = Response::builder().status(reply.status);
    for (name, value) in reply.headers {
        builder = builder.header(name, value);
    }
    let body = if reply.cut_off {
        let chunks: Vec<Result<Vec<u8>, std::io::Error>> = vec![
            Ok(reply.body),
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "cut off")),
        ];
        Body::from_stream(futures::stream::iter(chunks))
    } else {
        Body::from(reply.body)
    };
    builder.body(body).unwrap()
}
