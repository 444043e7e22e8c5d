//! COS请求与响应的公共处理

use crate::error::{CosError, Result};
use crate::cos::signer::Query;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ETAG};
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::str::FromStr;

pub const REQUEST_ID_HEADER: &str = "x-cos-request-id";

/// 签名前的COS请求
#[derive(Debug)]
pub struct Request {
    pub(crate) method: Method,
    pub(crate) url: Url,
    pub(crate) query: Query,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Option<Bytes>,
}

impl Request {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            query: Query::new(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.insert(key.to_string(), value.to_string());
        self
    }

    /// 有值时才添加参数
    pub fn query_opt<T: ToString>(self, key: &str, value: Option<T>) -> Self {
        match value {
            Some(v) => self.query(key, v),
            None => self,
        }
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// COS原始响应：状态码、头部和body
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Response {
    pub(crate) async fn read(resp: reqwest::Response) -> Result<Self> {
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp.bytes().await?;
        Ok(Self {
            status,
            headers,
            body,
        })
    }

    /// body已在别处读取的响应
    pub(crate) fn without_body(resp: &reqwest::Response) -> Self {
        Self {
            status: resp.status(),
            headers: resp.headers().clone(),
            body: Bytes::new(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn request_id(&self) -> Option<&str> {
        self.header(REQUEST_ID_HEADER)
    }

    /// COS返回的ETag，包含引号
    pub fn etag(&self) -> Option<&str> {
        self.headers.get(ETAG).and_then(|v| v.to_str().ok())
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// 解析XML body
    pub fn xml<T: DeserializeOwned>(&self) -> Result<T> {
        from_xml(&self.body)
    }
}

/// COS的 `<Error>` 响应体
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(rename = "Error")]
pub struct ErrorBody {
    #[serde(rename = "Code", default)]
    pub code: String,
    #[serde(rename = "Message", default)]
    pub message: String,
    #[serde(rename = "Resource", default)]
    pub resource: String,
    #[serde(rename = "RequestId", default)]
    pub request_id: String,
}

impl ErrorBody {
    /// 根据非2xx响应构造错误
    pub(crate) fn into_error(body: &[u8], status: StatusCode, headers: &HeaderMap) -> CosError {
        let mut parsed = if body.is_empty() {
            ErrorBody::default()
        } else {
            from_xml::<ErrorBody>(body).unwrap_or_else(|_| ErrorBody {
                message: String::from_utf8_lossy(body).into_owned(),
                ..ErrorBody::default()
            })
        };
        if parsed.request_id.is_empty() {
            if let Some(id) = headers.get(REQUEST_ID_HEADER).and_then(|v| v.to_str().ok()) {
                parsed.request_id = id.to_string();
            }
        }
        CosError::Service {
            status,
            code: parsed.code,
            message: parsed.message,
            request_id: parsed.request_id,
            resource: parsed.resource,
        }
    }
}

pub fn from_xml<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    Ok(quick_xml::de::from_reader::<&[u8], T>(body)?)
}

pub fn to_xml<T: Serialize>(value: &T) -> Result<String> {
    Ok(quick_xml::se::to_string(value)?)
}

pub fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| CosError::InvalidArgument(format!("invalid header value {:?}: {}", value, e)))
}

pub fn header_name(name: &str) -> Result<HeaderName> {
    HeaderName::from_str(name)
        .map_err(|e| CosError::InvalidArgument(format!("invalid header name {:?}: {}", name, e)))
}
