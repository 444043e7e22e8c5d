//! COS客户端模块
//! 持有HTTP连接池、存储桶地址和密钥

use crate::config::CosConfig;
use crate::cos::request::{ErrorBody, Request, Response};
use crate::cos::signer::Signer;
use crate::error::{CosError, Result};
use chrono::Utc;
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_LENGTH, DATE, HOST};
use reqwest::{Method, Url};
use std::time::Duration;
use urlencoding::encode;

/// 签名密钥
#[derive(Clone)]
pub struct Credential {
    pub secret_id: String,
    pub secret_key: String,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("secret_id", &self.secret_id)
            .field("secret_key", &"***")
            .finish()
    }
}

/// 绑定单个存储桶的COS客户端
#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
    bucket_url: Url,
    service_url: Url,
    credential: Credential,
    sign_expire: Duration,
}

impl Client {
    /// 根据完整配置创建客户端
    pub fn new(config: &CosConfig) -> Result<Self> {
        if config.endpoint.is_none() && config.bucket.trim().is_empty() {
            return Err(CosError::Config("bucket name is empty".to_string()));
        }
        let bucket_url = parse_url(&config.bucket_url())?;
        let service_url = parse_url(&config.service_url())?;
        let http = reqwest::ClientBuilder::new()
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            http,
            bucket_url,
            service_url,
            credential: Credential {
                secret_id: config.secret_id.clone(),
                secret_key: config.secret_key.clone(),
            },
            sign_expire: config.sign_expire(),
        })
    }

    pub fn bucket_url(&self) -> &Url {
        &self.bucket_url
    }

    pub fn service_url(&self) -> &Url {
        &self.service_url
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// 对象key对应的路径，总是以 `/` 开头
    pub fn get_path_from_object_key(&self, key: &str) -> Result<String> {
        if key.is_empty() {
            return Err(CosError::InvalidArgument("object key is empty".to_string()));
        }
        if key.starts_with('/') {
            Ok(key.to_string())
        } else {
            Ok(format!("/{}", key))
        }
    }

    /// 存储桶中对象的URL
    ///
    /// key按 `/` 分段逐段做百分号编码，`%`、`+` 和非ASCII字符
    /// 原样作为key到达COS。含 `.` 或 `..` 段的key会被拒绝，
    /// URL会把这些段规范化掉。
    pub fn object_url(&self, key: &str) -> Result<Url> {
        let path = self.get_path_from_object_key(key)?;
        let mut encoded = String::with_capacity(path.len());
        for segment in path[1..].split('/') {
            if segment == "." || segment == ".." {
                return Err(CosError::InvalidArgument(format!(
                    "object key {:?} has a dot segment",
                    key
                )));
            }
            encoded.push('/');
            encoded.push_str(&encode(segment));
        }
        let mut url = self.bucket_url.clone();
        url.set_path(&encoded);
        Ok(url)
    }

    /// 针对存储桶根路径的请求
    pub(crate) fn bucket_request(&self, method: Method) -> Request {
        let mut url = self.bucket_url.clone();
        url.set_path("/");
        Request::new(method, url)
    }

    pub(crate) fn object_request(&self, method: Method, key: &str) -> Result<Request> {
        Ok(Request::new(method, self.object_url(key)?))
    }

    pub(crate) fn service_request(&self, method: Method) -> Request {
        let mut url = self.service_url.clone();
        url.set_path("/");
        Request::new(method, url)
    }

    /// 签名并发送请求，非2xx响应转换为错误
    ///
    /// 成功响应的body不会被读取。
    pub(crate) async fn execute(&self, req: Request) -> Result<reqwest::Response> {
        let Request {
            method,
            url,
            query,
            mut headers,
            body,
        } = req;

        headers.insert(HOST, host_header(&url)?);
        let now = Utc::now().format("%a, %d %b %Y %T GMT").to_string();
        headers.insert(DATE, HeaderValue::from_str(&now).map_err(|e| CosError::Config(e.to_string()))?);
        if let Some(body) = &body {
            headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
        }

        let signature = Signer::new(method.as_str(), url.path(), Some(&headers), Some(&query))
            .get_signature(
                &self.credential.secret_key,
                &self.credential.secret_id,
                self.sign_expire,
            );
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&signature).map_err(|e| CosError::Config(e.to_string()))?,
        );

        tracing::debug!("COS request: {} {} {:?}", method, url.path(), query);

        let mut builder = self.http.request(method.clone(), url.clone()).headers(headers);
        if !query.is_empty() {
            builder = builder.query(&query);
        }
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let resp = builder.send().await?;
        let status = resp.status();
        if status.is_client_error() || status.is_server_error() {
            let headers = resp.headers().clone();
            let body = resp.bytes().await.unwrap_or_default();
            let err = ErrorBody::into_error(&body, status, &headers);
            tracing::debug!("COS request failed: {} {}: {}", method, url.path(), err);
            return Err(err);
        }

        tracing::debug!("COS response: {} {} -> {}", method, url.path(), status);
        Ok(resp)
    }

    /// 签名、发送并读取完整响应
    pub(crate) async fn send(&self, req: Request) -> Result<Response> {
        let resp = self.execute(req).await?;
        Response::read(resp).await
    }
}

/// 使用默认AppID和地域为存储桶创建客户端
pub fn new_client(bucket_name: &str, secret_id: &str, secret_key: &str) -> Result<Client> {
    Client::new(&CosConfig::new(bucket_name, secret_id, secret_key))
}

fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| CosError::Config(format!("invalid endpoint {:?}: {}", raw, e)))
}

fn host_header(url: &Url) -> Result<HeaderValue> {
    let host = url
        .host_str()
        .ok_or_else(|| CosError::Config(format!("endpoint has no host: {}", url)))?;
    let host = match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };
    HeaderValue::from_str(&host).map_err(|e| CosError::Config(e.to_string()))
}
