use super::{ClientCache, MultipartStorage};
use crate::{
    config::StorageConfig,
    error::{AppError, AppResult},
    models::{CompletedPart, CompletedUpload, validate_parts},
};
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart as S3CompletedPart};
use std::{sync::Arc, time::Duration};

/// S3兼容对象存储（MinIO / R2）上的multipart签发端
///
/// 客户端按bucket缓存，凭证取用时从环境变量解析。
#[derive(Debug, Clone)]
pub struct S3Storage {
    cache: Arc<ClientCache>,
    config: StorageConfig,
}

impl S3Storage {
    /// 创建存储实例
    pub fn new(config: StorageConfig) -> Self {
        let cache = ClientCache::new(
            config.endpoint.clone(),
            config.region.clone(),
            Duration::from_secs(config.client_idle_ttl_secs),
        );

        Self {
            cache: Arc::new(cache),
            config,
        }
    }

}

#[async_trait::async_trait]
impl MultipartStorage for S3Storage {
    async fn health_check(&self) -> AppResult<bool> {
        let client = self.cache.get(&self.config.default_bucket)?;
        match client
            .head_bucket()
            .bucket(&self.config.default_bucket)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::error!("存储健康检查失败: {}", e);
                Ok(false)
            }
        }
    }

    async fn create_multipart(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
    ) -> AppResult<String> {
        let client = self.cache.get(bucket)?;

        let output = client
            .create_multipart_upload()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| AppError::storage(format!("发起multipart上传失败: {}", e)))?;

        let upload_id = output
            .upload_id()
            .ok_or_else(|| AppError::storage("存储后端未返回uploadId"))?
            .to_string();

        tracing::info!("发起multipart上传: {}/{}, uploadId: {}", bucket, key, upload_id);
        Ok(upload_id)
    }

    async fn presign_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
    ) -> AppResult<String> {
        let client = self.cache.get(bucket)?;

        let presigning_config = aws_sdk_s3::presigning::PresigningConfig::expires_in(
            Duration::from_secs(self.config.presign_expiry_secs),
        )
        .map_err(|e| AppError::storage(format!("预签名配置错误: {}", e)))?;

        let presigned_request = client
            .upload_part()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .presigned(presigning_config)
            .await
            .map_err(|e| AppError::storage(format!("生成分片预签名URL失败: {}", e)))?;

        Ok(presigned_request.uri().to_string())
    }

    async fn part_etag(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
    ) -> AppResult<Option<String>> {
        let client = self.cache.get(bucket)?;

        // 从上一分片号开始只取一个，ListParts按分片号升序返回
        let output = client
            .list_parts()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number_marker((part_number - 1).to_string())
            .max_parts(1)
            .send()
            .await
            .map_err(|e| AppError::storage(format!("查询分片信息失败: {}", e)))?;

        let etag = output
            .parts()
            .iter()
            .find(|p| p.part_number() == Some(part_number))
            .and_then(|p| p.e_tag())
            .map(|s| s.to_string());

        Ok(etag)
    }

    async fn complete_multipart(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> AppResult<CompletedUpload> {
        // 先校验连续性，后端调用之前不做任何状态变更
        let sorted = validate_parts(parts)?;

        let client = self.cache.get(bucket)?;

        let s3_parts: Vec<S3CompletedPart> = sorted
            .iter()
            .map(|p| {
                S3CompletedPart::builder()
                    .e_tag(&p.e_tag)
                    .part_number(p.part_number)
                    .build()
            })
            .collect();

        let output = client
            .complete_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(s3_parts))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| AppError::storage(format!("完成multipart上传失败: {}", e)))?;

        tracing::info!(
            "完成multipart上传: {}/{} ({}个分片)",
            bucket,
            key,
            sorted.len()
        );

        Ok(CompletedUpload {
            bucket: bucket.to_string(),
            key: output.key().unwrap_or(key).to_string(),
            location: output.location().map(|s| s.to_string()),
            e_tag: output.e_tag().map(|s| s.to_string()),
        })
    }

    async fn abort_multipart(&self, bucket: &str, key: &str, upload_id: &str) -> AppResult<()> {
        let client = self.cache.get(bucket)?;

        client
            .abort_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(|e| AppError::storage(format!("中止multipart上传失败: {}", e)))?;

        tracing::info!("中止multipart上传: {}/{}, uploadId: {}", bucket, key, upload_id);
        Ok(())
    }
}
