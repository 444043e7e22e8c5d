//! 存储桶操作：创建、检查、删除与对象列表

use crate::cos::acl::AclHeader;
use crate::cos::client::{new_client, Client};
use crate::cos::request::{to_xml, Response};
use crate::cos::service::Owner;
use crate::error::{CosError, Result};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use urlencoding::decode;

/// 创建存储桶的选项
#[derive(Debug, Clone, Default)]
pub struct BucketPutOptions {
    pub acl: AclHeader,
    /// 多AZ存储桶填 `MAZ`
    pub az_config: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename = "CreateBucketConfiguration")]
struct CreateBucketConfiguration<'a> {
    #[serde(rename = "BucketAZConfig")]
    bucket_az_config: &'a str,
}

/// 创建存储桶的结果
#[derive(Debug, Clone)]
pub enum CreateBucketOutcome {
    Created(Response),
    /// COS返回409：存储桶名已被占用
    AlreadyExists { code: String, request_id: String },
}

impl CreateBucketOutcome {
    pub fn is_created(&self) -> bool {
        matches!(self, CreateBucketOutcome::Created(_))
    }
}

/// 列出对象的选项
///
/// 未设置的字段不会发送，此时COS从头开始列出，不分组，
/// 最多1000个key。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketGetOptions {
    /// 只列出以此前缀开头的key
    pub prefix: Option<String>,
    /// 按此分隔符分组，例如用 `/` 模拟文件夹
    pub delimiter: Option<String>,
    /// 填 `url` 时COS对响应中的key做URL编码
    pub encoding_type: Option<String>,
    /// 从此key之后开始列出（UTF-8二进制序）
    pub marker: Option<String>,
    /// 最大1000
    pub max_keys: Option<u32>,
}

impl BucketGetOptions {
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            ..Self::default()
        }
    }
}

/// 列表中的一个对象
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Object {
    #[serde(rename = "Key", default)]
    pub key: String,
    #[serde(rename = "ETag", default)]
    pub etag: String,
    #[serde(rename = "Size", default)]
    pub size: u64,
    #[serde(rename = "LastModified", default)]
    pub last_modified: String,
    #[serde(rename = "StorageClass", default)]
    pub storage_class: String,
    #[serde(rename = "Owner", default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<Owner>,
}

impl Object {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    /// key是否表示文件夹
    pub fn is_dir(&self) -> bool {
        is_dir(self)
    }
}

/// 以 `/` 结尾的key即为文件夹
pub fn is_dir(object: &Object) -> bool {
    object.key.ends_with('/')
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommonPrefix {
    #[serde(rename = "Prefix", default)]
    pub prefix: String,
}

/// `ListBucketResult`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BucketGetResult {
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Prefix", default)]
    pub prefix: String,
    #[serde(rename = "Marker", default)]
    pub marker: String,
    #[serde(rename = "NextMarker", default)]
    pub next_marker: String,
    #[serde(rename = "Delimiter", default)]
    pub delimiter: String,
    #[serde(rename = "MaxKeys", default)]
    pub max_keys: u32,
    #[serde(rename = "IsTruncated", default)]
    pub is_truncated: bool,
    #[serde(rename = "EncodingType", default)]
    pub encoding_type: String,
    #[serde(rename = "Contents", default)]
    pub contents: Vec<Object>,
    #[serde(rename = "CommonPrefixes", default)]
    pub common_prefixes: Vec<CommonPrefix>,
}

impl BucketGetResult {
    /// 还原 `encoding-type=url` 编码过的key字段
    fn decode_keys(&mut self) -> Result<()> {
        fn dec(s: &mut String) -> Result<()> {
            let decoded = decode(s)
                .map_err(|e| CosError::Xml(format!("invalid url-encoded key {:?}: {}", s, e)))?
                .into_owned();
            *s = decoded;
            Ok(())
        }

        dec(&mut self.prefix)?;
        dec(&mut self.marker)?;
        dec(&mut self.next_marker)?;
        dec(&mut self.delimiter)?;
        for object in &mut self.contents {
            dec(&mut object.key)?;
        }
        for prefix in &mut self.common_prefixes {
            dec(&mut prefix.prefix)?;
        }
        Ok(())
    }

    /// 列表被截断时，下一页的marker
    ///
    /// 没有 `NextMarker` 时取最后一个key与最后一个公共前缀中较大者，
    /// 只含公共前缀的页也能继续翻页。
    pub fn next_page_marker(&self) -> Option<String> {
        if !self.is_truncated {
            return None;
        }
        if !self.next_marker.is_empty() {
            return Some(self.next_marker.clone());
        }
        let last_key = self.contents.last().map(|o| o.key.as_str());
        let last_prefix = self.common_prefixes.last().map(|p| p.prefix.as_str());
        last_key.max(last_prefix).map(str::to_string)
    }
}

/// 使用临时客户端创建存储桶
///
/// COS返回409时结果为 [`CreateBucketOutcome::AlreadyExists`]。
pub async fn new_bucket(
    bucket_name: &str,
    opt: &BucketPutOptions,
    secret_id: &str,
    secret_key: &str,
) -> Result<CreateBucketOutcome> {
    new_client(bucket_name, secret_id, secret_key)?
        .put_bucket(opt)
        .await
}

impl Client {
    /// 创建客户端所指向的存储桶
    ///
    /// 参考文档: https://cloud.tencent.com/document/product/436/7738
    pub async fn put_bucket(&self, opt: &BucketPutOptions) -> Result<CreateBucketOutcome> {
        let mut headers = HeaderMap::new();
        opt.acl.apply(&mut headers)?;

        let mut req = self.bucket_request(Method::PUT);
        if let Some(az) = &opt.az_config {
            let body = to_xml(&CreateBucketConfiguration {
                bucket_az_config: az,
            })?;
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/xml"));
            req = req.body(body);
        }

        match self.send(req.headers(headers)).await {
            Ok(resp) => {
                tracing::info!("Created bucket {}", self.bucket_url());
                Ok(CreateBucketOutcome::Created(resp))
            }
            Err(CosError::Service {
                status,
                code,
                request_id,
                ..
            }) if status == reqwest::StatusCode::CONFLICT => {
                tracing::warn!("Bucket {} already exists: {}", self.bucket_url(), code);
                Ok(CreateBucketOutcome::AlreadyExists { code, request_id })
            }
            Err(e) => Err(e),
        }
    }

    /// 存储桶是否存在且可访问
    ///
    /// 参考文档: https://cloud.tencent.com/document/product/436/7735
    pub async fn head_bucket(&self) -> Result<bool> {
        match self.send(self.bucket_request(Method::HEAD)).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// 删除（空）存储桶
    ///
    /// 参考文档: https://cloud.tencent.com/document/product/436/7732
    pub async fn delete_bucket(&self) -> Result<Response> {
        let resp = self.send(self.bucket_request(Method::DELETE)).await?;
        tracing::info!("Deleted bucket {}", self.bucket_url());
        Ok(resp)
    }

    /// 按前缀列出对象，最多 `max_keys` 个（0表示使用COS默认值）
    pub async fn list_prefix(&self, prefix: &str, max_keys: u32) -> Result<(BucketGetResult, Response)> {
        let opt = BucketGetOptions {
            prefix: Some(prefix.to_string()).filter(|p| !p.is_empty()),
            max_keys: Some(max_keys).filter(|n| *n > 0),
            ..BucketGetOptions::default()
        };
        self.list_objects(&opt).await
    }

    /// 列出一页对象
    ///
    /// 参考文档: https://cloud.tencent.com/document/product/436/7734
    pub async fn list_objects(&self, opt: &BucketGetOptions) -> Result<(BucketGetResult, Response)> {
        let req = self
            .bucket_request(Method::GET)
            .query_opt("prefix", opt.prefix.as_deref())
            .query_opt("delimiter", opt.delimiter.as_deref())
            .query_opt("encoding-type", opt.encoding_type.as_deref())
            .query_opt("marker", opt.marker.as_deref())
            .query_opt("max-keys", opt.max_keys);

        let resp = self.send(req).await?;
        let mut result: BucketGetResult = resp.xml()?;
        if result.encoding_type.eq_ignore_ascii_case("url") {
            result.decode_keys()?;
        }
        Ok((result, resp))
    }

    /// 按marker翻页直到列完
    ///
    /// 所有页的对象与公共前缀合并到同一个结果中。
    /// 被截断但无法得到marker的页，或重复请求marker的页，
    /// 返回 [`CosError::UnexpectedResponse`]。
    pub async fn list_all_objects(&self, opt: &BucketGetOptions) -> Result<BucketGetResult> {
        let mut opt = opt.clone();
        let (mut all, _) = self.list_objects(&opt).await?;
        let mut truncated = all.is_truncated;
        let mut next = all.next_page_marker();

        while truncated {
            let marker = next.ok_or_else(|| {
                CosError::UnexpectedResponse("truncated listing without a marker".to_string())
            })?;
            if opt.marker.as_deref() == Some(marker.as_str()) {
                return Err(CosError::UnexpectedResponse(format!(
                    "listing did not advance past marker {:?}",
                    marker
                )));
            }
            tracing::debug!("Listing next page after {}", marker);
            opt.marker = Some(marker);
            let (page, _) = self.list_objects(&opt).await?;
            truncated = page.is_truncated;
            next = page.next_page_marker();
            all.contents.extend(page.contents);
            all.common_prefixes.extend(page.common_prefixes);
        }

        all.is_truncated = false;
        all.next_marker.clear();
        Ok(all)
    }
}
