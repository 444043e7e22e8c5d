//! 服务级操作（账号范围）
//! 参考文档: https://cloud.tencent.com/document/product/436/8291

use crate::cos::client::Client;
use crate::error::Result;
use reqwest::Method;
use serde::{Deserialize, Deserializer, Serialize};

/// 资源的所有者或发起者
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Owner {
    #[serde(rename = "ID", default)]
    pub id: String,
    #[serde(rename = "DisplayName", default)]
    pub display_name: String,
}

/// 账号下的一个存储桶
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Bucket {
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Location", default)]
    pub region: String,
    #[serde(rename = "CreationDate", default)]
    pub creation_date: String,
    #[serde(rename = "BucketType", default, skip_serializing_if = "Option::is_none")]
    pub bucket_type: Option<String>,
}

/// `ListAllMyBucketsResult`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ServiceGetResult {
    #[serde(rename = "Owner", default)]
    pub owner: Owner,
    #[serde(rename = "Buckets", default, deserialize_with = "unwrap_buckets")]
    pub buckets: Vec<Bucket>,
}

fn unwrap_buckets<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Vec<Bucket>, D::Error> {
    #[derive(Deserialize)]
    struct Buckets {
        #[serde(rename = "Bucket", default)]
        bucket: Vec<Bucket>,
    }
    Ok(Buckets::deserialize(deserializer)?.bucket)
}

impl Client {
    /// 列出账号下的所有存储桶
    pub async fn list_buckets(&self) -> Result<ServiceGetResult> {
        let resp = self.send(self.service_request(Method::GET)).await?;
        let result: ServiceGetResult = resp.xml()?;
        for bucket in &result.buckets {
            tracing::info!(
                name = %bucket.name,
                creation_date = %bucket.creation_date,
                region = %bucket.region,
                "bucket"
            );
        }
        Ok(result)
    }
}
