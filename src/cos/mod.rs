//! 腾讯云COS客户端
//!
//! - 签名认证
//! - 存储桶创建与对象列表
//! - 上传/下载、删除与元数据
//! - 分片上传
//!
//! 每个操作只发起一次REST请求，返回解析后的结果
//! 以及原始的 [`Response`]。

pub mod acl;
pub mod bucket;
pub mod client;
pub mod multipart;
pub mod objects;
pub mod request;
pub mod service;
pub mod signer;

pub use acl::{AclHeader, BucketAcl, ObjectAcl};
pub use bucket::{
    is_dir, new_bucket, BucketGetOptions, BucketGetResult, BucketPutOptions, CommonPrefix,
    CreateBucketOutcome, Object,
};
pub use client::{new_client, Client, Credential};
pub use multipart::{
    CompleteMultipartUploadOptions, CompleteMultipartUploadResult, InitiateMultipartUploadOptions,
    InitiateMultipartUploadResult, ObjectListPartsOptions, ObjectListPartsResult,
    ObjectUploadPartOptions, Part, PartInfo,
};
pub use objects::{
    DeleteError, DeleteObject, DownloadMode, ObjectDeleteMultiOptions, ObjectDeleteMultiResult,
    ObjectGetOptions, ObjectHeadOptions, ObjectMeta, ObjectPutHeaderOptions, ObjectPutOptions,
    StorageClass, MAX_DELETE_KEYS,
};
pub use request::Response;
pub use service::{Bucket, Owner, ServiceGetResult};
pub use signer::Signer;
