//! COS签名模块
//! 实现 `q-sign-algorithm=sha1` 签名算法
//! 参考文档: https://cloud.tencent.com/document/product/436/7778

use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::header::HeaderMap;
use sha1::{Digest, Sha1};
use std::collections::BTreeMap;
use std::time::Duration;
use urlencoding::{decode, encode};

type HmacSha1 = Hmac<Sha1>;

/// COS请求的查询参数，按key排序
pub type Query = BTreeMap<String, String>;

/// COS签名器
pub struct Signer<'a> {
    method: &'a str,
    url_path: &'a str,
    headers: Option<&'a HeaderMap>,
    query: Option<&'a Query>,
}

impl<'a> Signer<'a> {
    pub fn new(
        method: &'a str,
        url_path: &'a str,
        headers: Option<&'a HeaderMap>,
        query: Option<&'a Query>,
    ) -> Self {
        Self {
            method,
            url_path,
            headers,
            query,
        }
    }

    fn hex(bytes: &[u8]) -> String {
        bytes.iter().map(|x| format!("{:02x}", x)).collect()
    }

    fn hmac_hex(key: &str, data: &str) -> String {
        let mut mac =
            HmacSha1::new_from_slice(key.as_bytes()).expect("HMAC can take key of any size");
        mac.update(data.as_bytes());
        Self::hex(&mac.finalize().into_bytes())
    }

    /// 小写、URL编码并按key排序的键值对
    fn encode_pairs<I, K, V>(pairs: I) -> BTreeMap<String, String>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        pairs
            .into_iter()
            .map(|(k, v)| (encode(k.as_ref()).to_lowercase(), encode(v.as_ref()).into_owned()))
            .collect()
    }

    fn encoded_query(&self) -> BTreeMap<String, String> {
        match self.query {
            Some(query) => Self::encode_pairs(query),
            None => BTreeMap::new(),
        }
    }

    fn encoded_headers(&self) -> BTreeMap<String, String> {
        match self.headers {
            Some(headers) => Self::encode_pairs(
                headers
                    .iter()
                    .map(|(k, v)| (k.as_str(), String::from_utf8_lossy(v.as_bytes()))),
            ),
            None => BTreeMap::new(),
        }
    }

    fn key_list(pairs: &BTreeMap<String, String>) -> String {
        pairs.keys().cloned().collect::<Vec<_>>().join(";")
    }

    fn key_values(pairs: &BTreeMap<String, String>) -> String {
        pairs
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&")
    }

    fn get_url_param_list(&self) -> String {
        Self::key_list(&self.encoded_query())
    }

    fn get_http_parameters(&self) -> String {
        Self::key_values(&self.encoded_query())
    }

    fn get_header_list(&self) -> String {
        Self::key_list(&self.encoded_headers())
    }

    fn get_http_headers(&self) -> String {
        Self::key_values(&self.encoded_headers())
    }

    fn get_http_string(&self) -> String {
        let path = decode(self.url_path)
            .map(|p| p.into_owned())
            .unwrap_or_else(|_| self.url_path.to_string());
        let s = [
            self.method.to_lowercase(),
            path,
            self.get_http_parameters(),
            self.get_http_headers(),
        ];
        s.join("\n") + "\n"
    }

    fn get_string_to_sign(&self, key_time: &str) -> String {
        let digest = Sha1::digest(self.get_http_string().as_bytes());
        format!("sha1\n{}\n{}\n", key_time, Self::hex(&digest))
    }

    /// 从当前时间起有效期为 `valid` 的签名
    pub fn get_signature(&self, secret_key: &str, secret_id: &str, valid: Duration) -> String {
        self.get_signature_at(secret_key, secret_id, Utc::now().timestamp(), valid)
    }

    /// 从unix时间 `start` 起有效期为 `valid` 的签名
    pub fn get_signature_at(
        &self,
        secret_key: &str,
        secret_id: &str,
        start: i64,
        valid: Duration,
    ) -> String {
        let key_time = format!("{};{}", start, start + valid.as_secs() as i64);
        let sign_key = Self::hmac_hex(secret_key, &key_time);
        let signature = Self::hmac_hex(&sign_key, &self.get_string_to_sign(&key_time));
        format!(
            "q-sign-algorithm=sha1&q-ak={}&q-sign-time={}&q-key-time={}&q-header-list={}&q-url-param-list={}&q-signature={}",
            secret_id,
            key_time,
            key_time,
            self.get_header_list(),
            self.get_url_param_list(),
            signature
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderName, HeaderValue, CONTENT_LENGTH, HOST};
    use std::str::FromStr;

    #[test]
    fn test_get_url_param_list() {
        let mut query = Query::new();
        query.insert("a".to_string(), "a ".to_string());
        query.insert("B".to_string(), " b".to_string());
        let signer = Signer::new("", "", None, Some(&query));
        assert_eq!(signer.get_url_param_list(), "a;b");
        assert_eq!(signer.get_http_parameters(), "a=a%20&b=%20b");
    }

    #[test]
    fn test_get_http_string() {
        let mut query = Query::new();
        query.insert("a".to_string(), "a ".to_string());
        query.insert("B".to_string(), " b".to_string());
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_str("h").unwrap(),
            HeaderValue::from_str("h").unwrap(),
        );
        let signer = Signer::new("GET", "/path", Some(&headers), Some(&query));
        assert_eq!(signer.get_http_string(), "get\n/path\na=a%20&b=%20b\nh=h\n");
    }

    #[test]
    fn test_signature_known_answer() {
        let mut headers = HeaderMap::new();
        headers.insert(
            HOST,
            HeaderValue::from_static("examplebucket-1250000000.cos.ap-beijing.myqcloud.com"),
        );
        let signer = Signer::new("get", "/exampleobject", Some(&headers), None);
        let signature = signer.get_signature_at(
            "BQYIM75p8x0iWVFSIgqEKwFprpRSVHlz",
            "AKIDQjz3ltompVjBni5LitkWHFlFpwkn9U5q",
            1557989151,
            Duration::from_secs(7200),
        );
        assert_eq!(
            signature,
            "q-sign-algorithm=sha1&q-ak=AKIDQjz3ltompVjBni5LitkWHFlFpwkn9U5q\
             &q-sign-time=1557989151;1557996351&q-key-time=1557989151;1557996351\
             &q-header-list=host&q-url-param-list=\
             &q-signature=27cf30444826da1b67c09aa099a56cfe3a6a1cc5"
        );
    }

    #[test]
    fn test_signature_with_query_and_encoded_path() {
        let mut headers = HeaderMap::new();
        headers.insert(HOST, HeaderValue::from_static("127.0.0.1:9000"));
        headers.insert(CONTENT_LENGTH, HeaderValue::from(5u64));
        let mut query = Query::new();
        query.insert("partNumber".to_string(), "1".to_string());
        query.insert("uploadId".to_string(), "abc".to_string());

        let signer = Signer::new("PUT", "/docs/a%20b.txt", Some(&headers), Some(&query));
        let signature =
            signer.get_signature_at("secret", "id", 1700000000, Duration::from_secs(60));

        assert!(signature.contains("&q-header-list=content-length;host&"));
        assert!(signature.contains("&q-url-param-list=partnumber;uploadid&"));
        assert!(signature.ends_with("&q-signature=28de94953055466c783657ffbe783081f3c482ec"));
    }

    #[test]
    fn test_signature_depends_on_secret() {
        let signer = Signer::new("get", "/", None, None);
        let a = signer.get_signature_at("key-a", "id", 0, Duration::from_secs(10));
        let b = signer.get_signature_at("key-b", "id", 0, Duration::from_secs(10));
        assert_ne!(a, b);
        assert_eq!(
            a,
            signer.get_signature_at("key-a", "id", 0, Duration::from_secs(10))
        );
    }
}
