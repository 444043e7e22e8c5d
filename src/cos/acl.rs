//! 访问控制头部
//! 参考文档: https://cloud.tencent.com/document/product/436/30752

use crate::cos::request::{header_name, header_value};
use crate::error::Result;
use reqwest::header::HeaderMap;
use std::collections::BTreeMap;

/// 对象的预设ACL
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ObjectAcl {
    /// 继承存储桶权限（默认）
    Default,
    Private,
    PublicRead,
    AuthenticatedRead,
    BucketOwnerRead,
    BucketOwnerFullControl,
}

impl ObjectAcl {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectAcl::Default => "default",
            ObjectAcl::Private => "private",
            ObjectAcl::PublicRead => "public-read",
            ObjectAcl::AuthenticatedRead => "authenticated-read",
            ObjectAcl::BucketOwnerRead => "bucket-owner-read",
            ObjectAcl::BucketOwnerFullControl => "bucket-owner-full-control",
        }
    }
}

/// 存储桶的预设ACL
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum BucketAcl {
    /// 所有者拥有FULL_CONTROL，其他人无权限（默认）
    Private,
    PublicRead,
    /// 一般不建议使用
    PublicReadWrite,
    AuthenticatedRead,
}

impl BucketAcl {
    pub fn as_str(&self) -> &'static str {
        match self {
            BucketAcl::Private => "private",
            BucketAcl::PublicRead => "public-read",
            BucketAcl::PublicReadWrite => "public-read-write",
            BucketAcl::AuthenticatedRead => "authenticated-read",
        }
    }
}

/// `x-cos-acl` 与 `x-cos-grant-*` 请求头部
///
/// 被授权者使用COS格式，例如 `id="100000000001"`。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AclHeader {
    headers: BTreeMap<String, String>,
}

impl AclHeader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    pub fn insert_object_x_cos_acl(&mut self, acl: ObjectAcl) -> &mut Self {
        self.insert("x-cos-acl", acl.as_str())
    }

    pub fn insert_bucket_x_cos_acl(&mut self, acl: BucketAcl) -> &mut Self {
        self.insert("x-cos-acl", acl.as_str())
    }

    pub fn insert_x_cos_grant_read(&mut self, grantee: impl Into<String>) -> &mut Self {
        self.insert("x-cos-grant-read", grantee)
    }

    pub fn insert_x_cos_grant_read_acp(&mut self, grantee: impl Into<String>) -> &mut Self {
        self.insert("x-cos-grant-read-acp", grantee)
    }

    pub fn insert_x_cos_grant_write_acp(&mut self, grantee: impl Into<String>) -> &mut Self {
        self.insert("x-cos-grant-write-acp", grantee)
    }

    pub fn insert_x_cos_grant_full_control(&mut self, grantee: impl Into<String>) -> &mut Self {
        self.insert("x-cos-grant-full-control", grantee)
    }

    /// 仅用于存储桶
    pub fn insert_bucket_x_cos_grant_write(&mut self, grantee: impl Into<String>) -> &mut Self {
        self.insert("x-cos-grant-write", grantee)
    }

    fn insert(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        self.headers.insert(name.to_string(), value.into());
        self
    }

    /// 把ACL头部写入请求头部
    pub fn apply(&self, headers: &mut HeaderMap) -> Result<()> {
        for (k, v) in &self.headers {
            headers.insert(header_name(k)?, header_value(v)?);
        }
        Ok(())
    }
}
