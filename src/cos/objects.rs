//! 对象操作：上传、下载、删除与元数据

use crate::cos::acl::AclHeader;
use crate::cos::client::Client;
use crate::cos::request::{header_name, header_value, to_xml, Request, Response};
use crate::error::{CosError, Result};
use base64::Engine;
use bytes::Bytes;
use md5::{Digest, Md5};
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_ENCODING,
    CONTENT_LENGTH, CONTENT_TYPE, ETAG, EXPIRES, IF_MODIFIED_SINCE, LAST_MODIFIED, RANGE,
};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

const STORAGE_CLASS_HEADER: &str = "x-cos-storage-class";
const META_PREFIX: &str = "x-cos-meta-";

/// 批量删除每次最多的key数量
pub const MAX_DELETE_KEYS: usize = 1000;

/// 存储类型
/// 参考文档: https://cloud.tencent.com/document/product/436/33417
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageClass {
    Standard,
    StandardIa,
    MazStandard,
    MazStandardIa,
    IntelligentTiering,
    MazIntelligentTiering,
    Archive,
    DeepArchive,
}

impl StorageClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageClass::Standard => "STANDARD",
            StorageClass::StandardIa => "STANDARD_IA",
            StorageClass::MazStandard => "MAZ_STANDARD",
            StorageClass::MazStandardIa => "MAZ_STANDARD_IA",
            StorageClass::IntelligentTiering => "INTELLIGENT_TIERING",
            StorageClass::MazIntelligentTiering => "MAZ_INTELLIGENT_TIERING",
            StorageClass::Archive => "ARCHIVE",
            StorageClass::DeepArchive => "DEEP_ARCHIVE",
        }
    }
}

/// 写入对象时的标准头部与 `x-cos-*` 头部
#[derive(Debug, Clone, Default)]
pub struct ObjectPutHeaderOptions {
    pub content_type: Option<String>,
    pub cache_control: Option<String>,
    pub content_disposition: Option<String>,
    pub content_encoding: Option<String>,
    pub expires: Option<String>,
    pub storage_class: Option<StorageClass>,
    /// 用户自定义元数据，以 `x-cos-meta-<key>` 发送
    pub meta: BTreeMap<String, String>,
}

impl ObjectPutHeaderOptions {
    pub(crate) fn apply(&self, headers: &mut HeaderMap) -> Result<()> {
        let standard: [(HeaderName, &Option<String>); 5] = [
            (CONTENT_TYPE, &self.content_type),
            (CACHE_CONTROL, &self.cache_control),
            (CONTENT_DISPOSITION, &self.content_disposition),
            (CONTENT_ENCODING, &self.content_encoding),
            (EXPIRES, &self.expires),
        ];
        for (name, value) in standard {
            if let Some(v) = value {
                headers.insert(name, header_value(v)?);
            }
        }
        if let Some(class) = self.storage_class {
            headers.insert(
                HeaderName::from_static(STORAGE_CLASS_HEADER),
                HeaderValue::from_static(class.as_str()),
            );
        }
        for (k, v) in &self.meta {
            let name = format!("{}{}", META_PREFIX, k.to_lowercase());
            headers.insert(header_name(&name)?, header_value(v)?);
        }
        Ok(())
    }
}

/// 简单上传的选项
#[derive(Debug, Clone, Default)]
pub struct ObjectPutOptions {
    pub acl: AclHeader,
    pub header: ObjectPutHeaderOptions,
}

/// 下载的选项
#[derive(Debug, Clone, Default)]
pub struct ObjectGetOptions {
    /// 例如 `bytes=0-1023`
    pub range: Option<String>,
    pub if_modified_since: Option<String>,
}

/// HEAD请求的选项
#[derive(Debug, Clone, Default)]
pub struct ObjectHeadOptions {
    pub if_modified_since: Option<String>,
}

/// 下载结果的存放方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadMode {
    /// 内容保留在返回的响应中
    Response,
    /// 内容流式写入本地文件
    File,
}

/// 对象响应头部的类型化视图
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ObjectMeta {
    pub content_length: Option<u64>,
    pub content_type: Option<String>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    /// COS未返回该头部时为 `STANDARD`
    pub storage_class: String,
    pub meta: BTreeMap<String, String>,
}

impl ObjectMeta {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let get = |name: &HeaderName| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.to_string())
        };

        let meta = headers
            .iter()
            .filter_map(|(k, v)| {
                let key = k.as_str().strip_prefix(META_PREFIX)?;
                Some((key.to_string(), v.to_str().ok()?.to_string()))
            })
            .collect();

        Self {
            content_length: get(&CONTENT_LENGTH).and_then(|v| v.parse().ok()),
            content_type: get(&CONTENT_TYPE),
            etag: get(&ETAG),
            last_modified: get(&LAST_MODIFIED),
            storage_class: get(&HeaderName::from_static(STORAGE_CLASS_HEADER))
                .unwrap_or_else(|| StorageClass::Standard.as_str().to_string()),
            meta,
        }
    }
}

/// 批量删除中的一个key
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeleteObject {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "VersionId", default, skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,
}

/// `<Delete>` 请求体
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename = "Delete")]
pub struct ObjectDeleteMultiOptions {
    /// 设置后只返回删除失败的key
    #[serde(rename = "Quiet")]
    pub quiet: bool,
    #[serde(rename = "Object")]
    pub objects: Vec<DeleteObject>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeleteError {
    #[serde(rename = "Key", default)]
    pub key: String,
    #[serde(rename = "Code", default)]
    pub code: String,
    #[serde(rename = "Message", default)]
    pub message: String,
}

/// `DeleteResult`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ObjectDeleteMultiResult {
    #[serde(rename = "Deleted", default)]
    pub deleted: Vec<DeleteObject>,
    #[serde(rename = "Error", default)]
    pub errors: Vec<DeleteError>,
}

/// 目标文件旁的 `<local_file>.part`
fn partial_path(local_file: &Path) -> Result<PathBuf> {
    let name = local_file.file_name().ok_or_else(|| {
        CosError::InvalidArgument(format!("{} is not a file path", local_file.display()))
    })?;
    let mut partial = name.to_os_string();
    partial.push(".part");
    Ok(local_file.with_file_name(partial))
}

impl Client {
    /// 上传内存中的内容
    ///
    /// 参考文档: https://cloud.tencent.com/document/product/436/7749
    pub async fn put_object(
        &self,
        key: &str,
        body: impl Into<Bytes>,
        opt: &ObjectPutOptions,
    ) -> Result<Response> {
        let body: Bytes = body.into();
        let mut headers = HeaderMap::new();
        opt.acl.apply(&mut headers)?;
        opt.header.apply(&mut headers)?;
        if !headers.contains_key(CONTENT_TYPE) {
            headers.insert(CONTENT_TYPE, header_value(mime::APPLICATION_OCTET_STREAM.as_ref())?);
        }

        let size = body.len();
        let req = self.object_request(Method::PUT, key)?.headers(headers).body(body);
        let resp = self.send(req).await?;
        tracing::debug!("Uploaded {} ({} bytes)", key, size);
        Ok(resp)
    }

    /// 以指定的Content-Type把 `body` 上传到 `cloud_file`
    pub async fn upload_file(
        &self,
        body: impl Into<Bytes>,
        content_type: &str,
        cloud_file: &str,
    ) -> Result<Response> {
        let opt = ObjectPutOptions {
            header: ObjectPutHeaderOptions {
                content_type: Some(content_type.to_string()).filter(|c| !c.is_empty()),
                ..ObjectPutHeaderOptions::default()
            },
            ..ObjectPutOptions::default()
        };
        self.put_object(cloud_file, body, &opt).await
    }

    /// 上传本地文件，按扩展名推断Content-Type
    pub async fn upload_local_file(&self, local_file: &Path, cloud_file: &str) -> Result<Response> {
        let buf = fs::read(local_file).await?;
        let mime_type = mime_guess::from_path(local_file).first_or_octet_stream();
        tracing::info!(
            "Uploading {} to {} ({} bytes)",
            local_file.display(),
            cloud_file,
            buf.len()
        );
        self.upload_file(buf, mime_type.as_ref(), cloud_file).await
    }

    fn get_request(&self, key: &str, opt: Option<&ObjectGetOptions>) -> Result<Request> {
        let mut req = self.object_request(Method::GET, key)?;
        if let Some(opt) = opt {
            if let Some(range) = &opt.range {
                req = req.header(RANGE, header_value(range)?);
            }
            if let Some(since) = &opt.if_modified_since {
                req = req.header(IF_MODIFIED_SINCE, header_value(since)?);
            }
        }
        Ok(req)
    }

    /// 下载对象到内存
    ///
    /// 参考文档: https://cloud.tencent.com/document/product/436/7753
    pub async fn get_object(&self, key: &str, opt: Option<&ObjectGetOptions>) -> Result<Response> {
        self.send(self.get_request(key, opt)?).await
    }

    /// 下载对象直接写入本地文件
    ///
    /// 会创建缺失的父目录。内容先流式写入同目录下的 `.part` 文件，
    /// 完整写完后才替换 `local_file`，下载失败时已有文件保持不变。
    /// 返回的响应body为空。
    pub async fn get_object_to_file(
        &self,
        key: &str,
        local_file: &Path,
        opt: Option<&ObjectGetOptions>,
    ) -> Result<Response> {
        let partial = partial_path(local_file)?;
        let mut resp = self.execute(self.get_request(key, opt)?).await?;
        let meta = Response::without_body(&resp);

        if let Some(parent) = local_file.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let streamed: Result<u64> = async {
            let mut output = fs::File::create(&partial).await?;
            let mut written = 0u64;
            while let Some(chunk) = resp.chunk().await? {
                output.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
            output.flush().await?;
            Ok(written)
        }
        .await;

        let written = match streamed {
            Ok(written) => written,
            Err(e) => {
                if let Err(rm) = fs::remove_file(&partial).await {
                    tracing::warn!("Failed to remove {}: {}", partial.display(), rm);
                }
                return Err(e);
            }
        };
        fs::rename(&partial, local_file).await?;

        tracing::info!("Downloaded {} to {} ({} bytes)", key, local_file.display(), written);
        Ok(meta)
    }

    /// 下载 `cloud_file`，保留在响应中或写入 `local_file`
    pub async fn download_file(
        &self,
        cloud_file: &str,
        local_file: &Path,
        mode: DownloadMode,
    ) -> Result<Response> {
        match mode {
            DownloadMode::Response => self.get_object(cloud_file, None).await,
            DownloadMode::File => self.get_object_to_file(cloud_file, local_file, None).await,
        }
    }

    /// 下载 `start..=end` 字节（`end` 为None时到末尾）
    pub async fn get_object_range(&self, key: &str, start: u64, end: Option<u64>) -> Result<Response> {
        let end = end.map(|e| e.to_string()).unwrap_or_default();
        let opt = ObjectGetOptions {
            range: Some(format!("bytes={}-{}", start, end)),
            ..ObjectGetOptions::default()
        };
        self.get_object(key, Some(&opt)).await
    }

    /// 删除单个对象
    ///
    /// 参考文档: https://cloud.tencent.com/document/product/436/7743
    pub async fn delete(&self, cloud_file: &str) -> Result<Response> {
        let resp = self.send(self.object_request(Method::DELETE, cloud_file)?).await?;
        tracing::debug!("Deleted {}", cloud_file);
        Ok(resp)
    }

    /// 以quiet模式批量删除对象
    ///
    /// 删除失败的key在结果的 `errors` 中。
    pub async fn multi_delete<S: AsRef<str>>(
        &self,
        cloud_files: &[S],
    ) -> Result<(ObjectDeleteMultiResult, Response)> {
        let opt = ObjectDeleteMultiOptions {
            quiet: true,
            objects: cloud_files
                .iter()
                .map(|k| DeleteObject {
                    key: k.as_ref().to_string(),
                    version_id: None,
                })
                .collect(),
        };
        self.delete_multi(&opt).await
    }

    /// 删除任意数量的对象，按 [`MAX_DELETE_KEYS`] 分批
    ///
    /// 某一批整体失败时立即返回；各批中单个key的失败
    /// 合并到同一个结果中。
    pub async fn multi_delete_all<S: AsRef<str>>(
        &self,
        cloud_files: &[S],
    ) -> Result<ObjectDeleteMultiResult> {
        let mut merged = ObjectDeleteMultiResult::default();
        for batch in cloud_files.chunks(MAX_DELETE_KEYS) {
            let (result, _) = self.multi_delete(batch).await?;
            merged.deleted.extend(result.deleted);
            merged.errors.extend(result.errors);
        }
        Ok(merged)
    }

    /// 使用完整选项批量删除
    ///
    /// 参考文档: https://cloud.tencent.com/document/product/436/8289
    pub async fn delete_multi(
        &self,
        opt: &ObjectDeleteMultiOptions,
    ) -> Result<(ObjectDeleteMultiResult, Response)> {
        if opt.objects.is_empty() {
            return Err(CosError::InvalidArgument("no keys to delete".to_string()));
        }
        if opt.objects.len() > MAX_DELETE_KEYS {
            return Err(CosError::InvalidArgument(format!(
                "at most {} keys per batch delete, got {}",
                MAX_DELETE_KEYS,
                opt.objects.len()
            )));
        }

        let body = to_xml(opt)?;
        let md5 = base64::engine::general_purpose::STANDARD.encode(Md5::digest(body.as_bytes()));
        let req = self
            .bucket_request(Method::POST)
            .query("delete", "")
            .header(CONTENT_TYPE, HeaderValue::from_static("application/xml"))
            .header(HeaderName::from_static("content-md5"), header_value(&md5)?)
            .body(body);

        let resp = self.send(req).await?;
        let result: ObjectDeleteMultiResult = if resp.body.is_empty() {
            ObjectDeleteMultiResult::default()
        } else {
            resp.xml()?
        };
        if !result.errors.is_empty() {
            tracing::warn!("{} of {} keys were not deleted", result.errors.len(), opt.objects.len());
        }
        Ok((result, resp))
    }

    /// 获取对象元数据，见 [`ObjectMeta::from_headers`]
    ///
    /// 参考文档: https://cloud.tencent.com/document/product/436/7745
    pub async fn object_head(&self, cloud_file: &str) -> Result<Response> {
        self.head_object(cloud_file, None).await
    }

    pub async fn head_object(&self, key: &str, opt: Option<&ObjectHeadOptions>) -> Result<Response> {
        let mut req = self.object_request(Method::HEAD, key)?;
        if let Some(since) = opt.and_then(|o| o.if_modified_since.as_deref()) {
            req = req.header(IF_MODIFIED_SINCE, header_value(since)?);
        }
        self.send(req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cos::request::from_xml;

    #[test]
    fn test_delete_body_xml() {
        let opt = ObjectDeleteMultiOptions {
            quiet: true,
            objects: vec![
                DeleteObject {
                    key: "a.txt".to_string(),
                    version_id: None,
                },
                DeleteObject {
                    key: "b/".to_string(),
                    version_id: None,
                },
            ],
        };
        assert_eq!(
            to_xml(&opt).unwrap(),
            "<Delete><Quiet>true</Quiet><Object><Key>a.txt</Key></Object><Object><Key>b/</Key></Object></Delete>"
        );
    }

    #[test]
    fn test_parse_delete_result() {
        let body = br#"<?xml version="1.0" encoding="UTF-8"?>
<DeleteResult>
    <Deleted><Key>a.txt</Key></Deleted>
    <Error>
        <Key>locked.txt</Key>
        <Code>AccessDenied</Code>
        <Message>Access Denied.</Message>
    </Error>
</DeleteResult>"#;
        let result: ObjectDeleteMultiResult = from_xml(body).unwrap();
        assert_eq!(result.deleted.len(), 1);
        assert_eq!(result.deleted[0].key, "a.txt");
        assert_eq!(result.errors[0].code, "AccessDenied");
    }

    #[test]
    fn test_put_header_options() {
        let mut meta = BTreeMap::new();
        meta.insert("Author".to_string(), "alice".to_string());
        let opt = ObjectPutHeaderOptions {
            content_type: Some("text/plain".to_string()),
            storage_class: Some(StorageClass::Archive),
            meta,
            ..ObjectPutHeaderOptions::default()
        };

        let mut headers = HeaderMap::new();
        opt.apply(&mut headers).unwrap();
        assert_eq!(headers[CONTENT_TYPE], "text/plain");
        assert_eq!(headers["x-cos-storage-class"], "ARCHIVE");
        assert_eq!(headers["x-cos-meta-author"], "alice");
        assert!(!headers.contains_key(CACHE_CONTROL));
    }

    #[test]
    fn test_partial_path_is_a_sibling() {
        assert_eq!(
            partial_path(Path::new("out/a.txt")).unwrap(),
            PathBuf::from("out/a.txt.part")
        );
        assert!(partial_path(Path::new("out/..")).is_err());
    }

    #[test]
    fn test_object_meta_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("42"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("image/png"));
        headers.insert(ETAG, HeaderValue::from_static("\"abc\""));
        headers.insert("x-cos-meta-author", HeaderValue::from_static("alice"));

        let meta = ObjectMeta::from_headers(&headers);
        assert_eq!(meta.content_length, Some(42));
        assert_eq!(meta.content_type.as_deref(), Some("image/png"));
        assert_eq!(meta.etag.as_deref(), Some("\"abc\""));
        assert_eq!(meta.storage_class, "STANDARD");
        assert_eq!(meta.meta.get("author").map(String::as_str), Some("alice"));
    }
}
