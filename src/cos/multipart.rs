//! 分片上传：初始化、上传分片、列出分片、完成、终止

use crate::cos::acl::AclHeader;
use crate::cos::client::Client;
use crate::cos::objects::ObjectPutHeaderOptions;
use crate::cos::request::{header_value, to_xml, ErrorBody, Response};
use crate::cos::service::Owner;
use crate::error::{CosError, Result};
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde::{Deserialize, Serialize};

/// COS接受的分片编号范围
pub const PART_NUMBER_RANGE: std::ops::RangeInclusive<u32> = 1..=10000;

#[derive(Debug, Clone, Default)]
pub struct InitiateMultipartUploadOptions {
    pub acl: AclHeader,
    pub header: ObjectPutHeaderOptions,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct InitiateMultipartUploadResult {
    #[serde(rename = "Bucket", default)]
    pub bucket: String,
    #[serde(rename = "Key", default)]
    pub key: String,
    #[serde(rename = "UploadId")]
    pub upload_id: String,
}

#[derive(Debug, Clone, Default)]
pub struct ObjectUploadPartOptions {
    /// 分片的Base64 MD5，由COS校验
    pub content_md5: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ObjectListPartsOptions {
    pub encoding_type: Option<String>,
    /// 最大1000
    pub max_parts: Option<u32>,
    /// 从此分片编号之后开始列出
    pub part_number_marker: Option<u32>,
}

/// COS列出的已上传分片
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PartInfo {
    #[serde(rename = "PartNumber", default)]
    pub part_number: u32,
    #[serde(rename = "LastModified", default)]
    pub last_modified: String,
    #[serde(rename = "ETag", default)]
    pub etag: String,
    #[serde(rename = "Size", default)]
    pub size: u64,
}

/// `ListPartsResult`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ObjectListPartsResult {
    #[serde(rename = "Bucket", default)]
    pub bucket: String,
    #[serde(rename = "EncodingType", default)]
    pub encoding_type: String,
    #[serde(rename = "Key", default)]
    pub key: String,
    #[serde(rename = "UploadId", default)]
    pub upload_id: String,
    #[serde(rename = "Initiator", default)]
    pub initiator: Option<Owner>,
    #[serde(rename = "Owner", default)]
    pub owner: Option<Owner>,
    #[serde(rename = "StorageClass", default)]
    pub storage_class: String,
    #[serde(rename = "PartNumberMarker", default)]
    pub part_number_marker: String,
    #[serde(rename = "NextPartNumberMarker", default)]
    pub next_part_number_marker: String,
    #[serde(rename = "MaxParts", default)]
    pub max_parts: u32,
    #[serde(rename = "IsTruncated", default)]
    pub is_truncated: bool,
    #[serde(rename = "Part", default)]
    pub parts: Vec<PartInfo>,
}

/// 完成上传时要合并的分片
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Part {
    #[serde(rename = "PartNumber")]
    pub part_number: u32,
    #[serde(rename = "ETag")]
    pub etag: String,
}

/// `<CompleteMultipartUpload>` 请求体
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename = "CompleteMultipartUpload")]
pub struct CompleteMultipartUploadOptions {
    #[serde(rename = "Part")]
    pub parts: Vec<Part>,
}

impl CompleteMultipartUploadOptions {
    pub fn push(&mut self, part_number: u32, etag: impl Into<String>) -> &mut Self {
        self.parts.push(Part {
            part_number,
            etag: etag.into(),
        });
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompleteMultipartUploadResult {
    #[serde(rename = "Location", default)]
    pub location: String,
    #[serde(rename = "Bucket", default)]
    pub bucket: String,
    #[serde(rename = "Key", default)]
    pub key: String,
    #[serde(rename = "ETag", default)]
    pub etag: String,
}

fn check_upload_id(upload_id: &str) -> Result<()> {
    if upload_id.is_empty() {
        return Err(CosError::InvalidArgument("upload id is empty".to_string()));
    }
    Ok(())
}

impl Client {
    /// 初始化分片上传，结果中包含upload id
    ///
    /// 参考文档: https://cloud.tencent.com/document/product/436/7746
    pub async fn init_multipart_upload(
        &self,
        cloud_file: &str,
        opt: Option<&InitiateMultipartUploadOptions>,
    ) -> Result<(InitiateMultipartUploadResult, Response)> {
        let mut headers = HeaderMap::new();
        if let Some(opt) = opt {
            opt.acl.apply(&mut headers)?;
            opt.header.apply(&mut headers)?;
        }

        let req = self
            .object_request(Method::POST, cloud_file)?
            .query("uploads", "")
            .headers(headers);
        let resp = self.send(req).await?;
        let result: InitiateMultipartUploadResult = resp.xml()?;
        tracing::info!("Initiated multipart upload {} for {}", result.upload_id, cloud_file);
        Ok((result, resp))
    }

    /// 终止分片上传并丢弃已上传的分片
    ///
    /// 参考文档: https://cloud.tencent.com/document/product/436/7740
    pub async fn abort_multipart_upload(&self, cloud_file: &str, upload_id: &str) -> Result<Response> {
        check_upload_id(upload_id)?;
        let req = self
            .object_request(Method::DELETE, cloud_file)?
            .query("uploadId", upload_id);
        let resp = self.send(req).await?;
        tracing::info!("Aborted multipart upload {} for {}", upload_id, cloud_file);
        Ok(resp)
    }

    /// 上传一个分片，ETag见 [`Response::etag`]
    ///
    /// 参考文档: https://cloud.tencent.com/document/product/436/7750
    pub async fn upload_part(
        &self,
        cloud_file: &str,
        upload_id: &str,
        body: impl Into<Bytes>,
        part_number: u32,
        opt: Option<&ObjectUploadPartOptions>,
    ) -> Result<Response> {
        check_upload_id(upload_id)?;
        if !PART_NUMBER_RANGE.contains(&part_number) {
            return Err(CosError::InvalidArgument(format!(
                "part number {} is outside {:?}",
                part_number, PART_NUMBER_RANGE
            )));
        }

        let mut req = self
            .object_request(Method::PUT, cloud_file)?
            .query("partNumber", part_number)
            .query("uploadId", upload_id)
            .body(body);
        if let Some(md5) = opt.and_then(|o| o.content_md5.as_deref()) {
            req = req.header(HeaderName::from_static("content-md5"), header_value(md5)?);
        }

        let resp = self.send(req).await?;
        tracing::debug!(
            "Uploaded part {} of {} ({:?})",
            part_number,
            upload_id,
            resp.etag()
        );
        Ok(resp)
    }

    /// 列出已上传的分片
    ///
    /// 参考文档: https://cloud.tencent.com/document/product/436/7747
    pub async fn list_parts(
        &self,
        cloud_file: &str,
        upload_id: &str,
        opt: Option<&ObjectListPartsOptions>,
    ) -> Result<(ObjectListPartsResult, Response)> {
        check_upload_id(upload_id)?;
        let mut req = self
            .object_request(Method::GET, cloud_file)?
            .query("uploadId", upload_id);
        if let Some(opt) = opt {
            req = req
                .query_opt("encoding-type", opt.encoding_type.as_deref())
                .query_opt("max-parts", opt.max_parts)
                .query_opt("part-number-marker", opt.part_number_marker);
        }

        let resp = self.send(req).await?;
        let result: ObjectListPartsResult = resp.xml()?;
        Ok((result, resp))
    }

    /// 合并已上传的分片为最终对象
    ///
    /// 分片按编号升序发送。
    /// 参考文档: https://cloud.tencent.com/document/product/436/7742
    pub async fn complete_multipart_upload(
        &self,
        cloud_file: &str,
        upload_id: &str,
        opt: &CompleteMultipartUploadOptions,
    ) -> Result<(CompleteMultipartUploadResult, Response)> {
        check_upload_id(upload_id)?;
        if opt.parts.is_empty() {
            return Err(CosError::InvalidArgument("no parts to complete".to_string()));
        }

        let mut sorted = opt.clone();
        sorted.parts.sort_by_key(|p| p.part_number);
        let body = to_xml(&sorted)?;

        let req = self
            .object_request(Method::POST, cloud_file)?
            .query("uploadId", upload_id)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/xml"))
            .body(body);
        let resp = self.send(req).await?;

        // COS可能在200响应中返回合并失败
        if resp.text().contains("<Error>") {
            return Err(ErrorBody::into_error(&resp.body, resp.status, &resp.headers));
        }

        let result: CompleteMultipartUploadResult = resp.xml()?;
        tracing::info!("Completed multipart upload {} for {}", upload_id, cloud_file);
        Ok((result, resp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cos::request::from_xml;

    #[test]
    fn test_parse_initiate_result() {
        let body = br#"<?xml version="1.0" encoding="UTF-8"?>
<InitiateMultipartUploadResult>
    <Bucket>examplebucket-1250000000</Bucket>
    <Key>exampleobject</Key>
    <UploadId>1585130821cbb7df1d11846c073ad648e8f33b087cec2381df437acdc833cf654b9ecc6361</UploadId>
</InitiateMultipartUploadResult>"#;
        let result: InitiateMultipartUploadResult = from_xml(body).unwrap();
        assert_eq!(result.key, "exampleobject");
        assert!(result.upload_id.starts_with("1585130821"));
    }

    #[test]
    fn test_parse_list_parts_result() {
        let body = br#"<ListPartsResult>
    <Bucket>examplebucket-1250000000</Bucket>
    <Key>exampleobject</Key>
    <UploadId>up-1</UploadId>
    <Initiator><ID>1250000000</ID><DisplayName>1250000000</DisplayName></Initiator>
    <Owner><ID>1250000000</ID><DisplayName>1250000000</DisplayName></Owner>
    <StorageClass>STANDARD</StorageClass>
    <PartNumberMarker>0</PartNumberMarker>
    <NextPartNumberMarker>2</NextPartNumberMarker>
    <MaxParts>2</MaxParts>
    <IsTruncated>true</IsTruncated>
    <Part>
        <PartNumber>1</PartNumber>
        <LastModified>2020-03-25T10:07:01.000Z</LastModified>
        <ETag>&quot;e1ac49d4fbd2bd0a5fb4c6f6d9cf1f9b&quot;</ETag>
        <Size>1048576</Size>
    </Part>
    <Part>
        <PartNumber>2</PartNumber>
        <LastModified>2020-03-25T10:07:02.000Z</LastModified>
        <ETag>&quot;a1f2a6e9a1b2c3d4e5f60718293a4b5c&quot;</ETag>
        <Size>512</Size>
    </Part>
</ListPartsResult>"#;
        let result: ObjectListPartsResult = from_xml(body).unwrap();
        assert_eq!(result.upload_id, "up-1");
        assert_eq!(result.initiator.as_ref().map(|o| o.id.as_str()), Some("1250000000"));
        assert_eq!(result.next_part_number_marker, "2");
        assert!(result.is_truncated);
        assert_eq!(result.parts.len(), 2);
        assert_eq!(result.parts[0].size, 1048576);
        assert_eq!(result.parts[1].part_number, 2);
    }

    #[test]
    fn test_complete_body_xml() {
        let mut opt = CompleteMultipartUploadOptions::default();
        opt.push(1, "etag-1").push(2, "etag-2");
        assert_eq!(
            to_xml(&opt).unwrap(),
            "<CompleteMultipartUpload>\
             <Part><PartNumber>1</PartNumber><ETag>etag-1</ETag></Part>\
             <Part><PartNumber>2</PartNumber><ETag>etag-2</ETag></Part>\
             </CompleteMultipartUpload>"
        );
    }

    #[test]
    fn test_parse_complete_result() {
        let body = br#"<CompleteMultipartUploadResult>
    <Location>examplebucket-1250000000.cos.ap-beijing.myqcloud.com/exampleobject</Location>
    <Bucket>examplebucket-1250000000</Bucket>
    <Key>exampleobject</Key>
    <ETag>&quot;aa259a62513358f69e98e72e59856d88-3&quot;</ETag>
</CompleteMultipartUploadResult>"#;
        let result: CompleteMultipartUploadResult = from_xml(body).unwrap();
        assert_eq!(result.etag, "\"aa259a62513358f69e98e72e59856d88-3\"");
        assert!(result.location.ends_with("/exampleobject"));
    }
}
