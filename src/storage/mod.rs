pub mod cache;
pub mod s3;

pub use cache::ClientCache;
pub use s3::S3Storage;

use crate::{
    error::AppResult,
    models::{CompletedPart, CompletedUpload},
};

/// multipart上传的存储抽象接口
///
/// 每个操作独立失败并向调用方传播，失败不产生半途状态。
/// handler层通过该接口注入实现，测试注入mock。
#[async_trait::async_trait]
pub trait MultipartStorage: Send + Sync {
    /// 健康检查（探测默认bucket）
    async fn health_check(&self) -> AppResult<bool>;

    /// 发起multipart上传，返回不透明upload_id
    async fn create_multipart(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
    ) -> AppResult<String>;

    /// 为指定分片生成限时上传URL（客户端直传，绕过应用服务器）
    async fn presign_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
    ) -> AppResult<String>;

    /// 查询已上传分片的ETag（直传响应不过服务器，事后查询）
    async fn part_etag(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
    ) -> AppResult<Option<String>>;

    /// 按分片号顺序完成multipart上传，合并为单个对象
    async fn complete_multipart(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> AppResult<CompletedUpload>;

    /// 中止multipart上传，释放已上传未提交的分片
    async fn abort_multipart(&self, bucket: &str, key: &str, upload_id: &str) -> AppResult<()>;
}
