//! 上传会话coordinator：驱动单个文件create → 分片签名/直传/取ETag → complete
//! 的严格顺序状态机，多文件按提交顺序逐个处理。
//!
//! 设计上不重试、不自动abort：失败的会话留在存储端，只有调用方显式
//! 调用[`MultipartUploader::abort`]才会清理。

use crate::{
    error::{AppError, AppResult},
    models::{CompletedPart, UploadSession, object_key, plan_chunks},
};
use bytes::Bytes;
use reqwest::header::CONTENT_LENGTH;
use serde::{Deserialize, Serialize};
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

/// 分片直传的字节进度回调（每发出一帧调用一次，参数为帧字节数）
pub type ByteProgress = Arc<dyn Fn(u64) + Send + Sync>;

/// 单文件整体进度回调，取值0.0..=1.0
pub type OverallProgress = Arc<dyn Fn(f64) + Send + Sync>;

/// 上传状态机的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadPhase {
    Pending,
    Creating,
    RequestingUrl(i32),
    Transferring(i32),
    FetchingEtag(i32),
    Completing,
    Completed,
}

impl std::fmt::Display for UploadPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UploadPhase::Pending => write!(f, "待上传"),
            UploadPhase::Creating => write!(f, "发起上传"),
            UploadPhase::RequestingUrl(n) => write!(f, "请求分片{}签名URL", n),
            UploadPhase::Transferring(n) => write!(f, "直传分片{}", n),
            UploadPhase::FetchingEtag(n) => write!(f, "查询分片{}ETag", n),
            UploadPhase::Completing => write!(f, "完成上传"),
            UploadPhase::Completed => write!(f, "已完成"),
        }
    }
}

/// coordinator与上传API之间的窄接口
///
/// 生产实现走HTTP（本服务自身的 /photos/upload 接口 + 预签名直传），
/// 测试注入mock。
#[async_trait::async_trait]
pub trait UploadTransport: Send + Sync {
    /// 发起multipart上传
    async fn create(&self, file_name: &str, file_type: &str, bucket: &str) -> AppResult<String>;

    /// 获取指定分片的签名URL
    async fn sign_part(
        &self,
        file_name: &str,
        upload_id: &str,
        part_number: i32,
        bucket: &str,
    ) -> AppResult<String>;

    /// 向签名URL直传分片字节
    async fn put_part(&self, signed_url: &str, data: Vec<u8>, on_bytes: ByteProgress)
    -> AppResult<()>;

    /// 查询已上传分片的ETag；分片不存在时返回None
    async fn part_etag(
        &self,
        file_name: &str,
        upload_id: &str,
        part_number: i32,
        bucket: &str,
    ) -> AppResult<Option<String>>;

    /// 提交完整分片列表完成上传，返回登记的imageId
    async fn complete(
        &self,
        file_name: &str,
        upload_id: &str,
        parts: &[CompletedPart],
        bucket: &str,
    ) -> AppResult<String>;

    /// 显式中止上传会话
    async fn abort(&self, file_name: &str, upload_id: &str, bucket: &str) -> AppResult<()>;
}

/// 待上传文件
#[derive(Debug, Clone)]
pub struct PendingFile {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// 单文件上传结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    /// 已完成，携带审核队列中登记的imageId
    Uploaded { image_id: String },
    /// 失败；会话未清理，需要调用方显式abort
    Failed { error: String },
}

/// 批次中单个文件的上报
#[derive(Debug, Clone)]
pub struct FileResult {
    pub original_name: String,
    /// 实际写入存储的对象key（时间戳+清洗后文件名）
    pub object_key: String,
    pub status: FileStatus,
}

/// 一次提交批次的汇总
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub files: Vec<FileResult>,
}

impl BatchReport {
    /// 任一文件失败则整个批次记为失败
    pub fn is_failed(&self) -> bool {
        self.files
            .iter()
            .any(|f| matches!(f.status, FileStatus::Failed { .. }))
    }
}

/// 上传会话coordinator
///
/// 单文件内分片严格顺序处理，文件之间也严格顺序处理。
pub struct MultipartUploader<T: UploadTransport> {
    transport: T,
    bucket: String,
    chunk_size: u64,
}

impl<T: UploadTransport> MultipartUploader<T> {
    pub fn new(transport: T, bucket: String, chunk_size: u64) -> Self {
        Self {
            transport,
            bucket,
            chunk_size,
        }
    }

    /// 上传单个文件，返回完成后的会话与登记的imageId
    ///
    /// 任一步骤失败立即返回错误，不重试也不自动abort。
    pub async fn upload_file(
        &self,
        file: &PendingFile,
        on_progress: Option<OverallProgress>,
    ) -> AppResult<(UploadSession, String)> {
        let mut phase = UploadPhase::Pending;

        let key = object_key(&file.file_name, chrono::Utc::now());
        let chunks = plan_chunks(file.data.len() as u64, self.chunk_size)?;
        let total_parts = chunks.len();
        tracing::debug!("文件 {} ({}个分片) 阶段: {}", key, total_parts, phase);

        phase = UploadPhase::Creating;
        tracing::debug!("文件 {} 进入阶段: {}", key, phase);
        let upload_id = self
            .transport
            .create(&key, &file.content_type, &self.bucket)
            .await
            .map_err(|e| step_error(phase, e))?;

        let mut session = UploadSession {
            file_name: key.clone(),
            content_type: file.content_type.clone(),
            bucket_name: self.bucket.clone(),
            upload_id: upload_id.clone(),
            parts: Vec::with_capacity(total_parts),
        };

        for chunk in &chunks {
            let part_number = chunk.part_number;

            phase = UploadPhase::RequestingUrl(part_number);
            tracing::debug!("文件 {} 进入阶段: {}", key, phase);
            let signed_url = self
                .transport
                .sign_part(&key, &upload_id, part_number, &self.bucket)
                .await
                .map_err(|e| step_error(phase, e))?;

            phase = UploadPhase::Transferring(part_number);
            tracing::debug!("文件 {} 进入阶段: {}", key, phase);
            let part_bytes = file.data[chunk.start as usize..chunk.end as usize].to_vec();
            let part_size = chunk.len();
            let completed_parts = session.parts.len();

            // 整体进度 = (已完成分片数 + 当前分片字节占比) / 总分片数
            let on_bytes: ByteProgress = {
                let sent = Arc::new(AtomicU64::new(0));
                let on_progress = on_progress.clone();
                Arc::new(move |delta: u64| {
                    let total_sent = sent.fetch_add(delta, Ordering::Relaxed) + delta;
                    if let Some(cb) = &on_progress {
                        let fraction = (total_sent as f64 / part_size as f64).min(1.0);
                        cb((completed_parts as f64 + fraction) / total_parts as f64);
                    }
                })
            };

            self.transport
                .put_part(&signed_url, part_bytes, on_bytes)
                .await
                .map_err(|e| step_error(phase, e))?;

            phase = UploadPhase::FetchingEtag(part_number);
            tracing::debug!("文件 {} 进入阶段: {}", key, phase);
            let e_tag = self
                .transport
                .part_etag(&key, &upload_id, part_number, &self.bucket)
                .await
                .map_err(|e| step_error(phase, e))?
                .ok_or_else(|| {
                    // 存储端接收了分片却不暴露其校验和，属协议违例
                    AppError::upload_protocol(format!(
                        "存储端未返回分片{}的ETag (阶段: {})",
                        part_number, phase
                    ))
                })?;

            // ListParts返回的ETag带双引号，提交completion前去掉
            session.parts.push(CompletedPart {
                e_tag: e_tag.trim_matches('"').to_string(),
                part_number,
            });
        }

        phase = UploadPhase::Completing;
        tracing::debug!("文件 {} 进入阶段: {}", key, phase);
        let image_id = self
            .transport
            .complete(&key, &upload_id, &session.parts, &self.bucket)
            .await
            .map_err(|e| step_error(phase, e))?;

        phase = UploadPhase::Completed;
        if let Some(cb) = &on_progress {
            cb(1.0);
        }
        tracing::info!(
            "文件 {} 阶段: {} ({}个分片), imageId: {}",
            key,
            phase,
            total_parts,
            image_id
        );

        Ok((session, image_id))
    }

    /// 按提交顺序逐个上传一批文件
    ///
    /// 单个文件失败不阻止后续文件，也不回滚已登记的图片；
    /// 汇总里任一失败即整批失败。
    pub async fn upload_batch(&self, files: &[PendingFile]) -> BatchReport {
        let mut report = BatchReport::default();

        for file in files {
            match self.upload_file(file, None).await {
                Ok((session, image_id)) => {
                    report.files.push(FileResult {
                        original_name: file.file_name.clone(),
                        object_key: session.file_name,
                        status: FileStatus::Uploaded { image_id },
                    });
                }
                Err(e) => {
                    tracing::warn!("文件 {} 上传失败: {}", file.file_name, e);
                    report.files.push(FileResult {
                        original_name: file.file_name.clone(),
                        object_key: String::new(),
                        status: FileStatus::Failed {
                            error: e.to_string(),
                        },
                    });
                }
            }
        }

        report
    }

    /// 显式中止一个遗留会话（唯一的清理路径）
    pub async fn abort(&self, session: &UploadSession) -> AppResult<()> {
        self.transport
            .abort(&session.file_name, &session.upload_id, &session.bucket_name)
            .await
    }
}

fn step_error(phase: UploadPhase, source: AppError) -> AppError {
    AppError::storage(format!("在「{}」阶段失败: {}", phase, source))
}

/// 走HTTP的生产transport：JSON调用本服务的上传接口，分片字节直传签名URL
#[derive(Debug, Clone)]
pub struct HttpUploadTransport {
    client: reqwest::Client,
    base_url: String,
}

const UPLOAD_PATH: &str = "/photos/upload";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadActionBody<'a> {
    file_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_type: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    part_number: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    upload_id: Option<&'a str>,
    bucket_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    action: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct CreateResponse {
    #[serde(rename = "uploadId")]
    upload_id: String,
}

#[derive(Debug, Deserialize)]
struct SignResponse {
    #[serde(rename = "signedUrl")]
    signed_url: String,
}

#[derive(Debug, Deserialize)]
struct ETagResponse {
    #[serde(rename = "ETag")]
    e_tag: String,
}

#[derive(Debug, Deserialize)]
struct CompleteResponse {
    #[serde(rename = "imageId")]
    image_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CompleteBody<'a> {
    file_name: &'a str,
    upload_id: &'a str,
    parts: &'a [CompletedPart],
    bucket_name: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AbortBody<'a> {
    file_name: &'a str,
    upload_id: &'a str,
    bucket_name: &'a str,
}

impl HttpUploadTransport {
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    fn upload_endpoint(&self) -> String {
        format!("{}{}", self.base_url, UPLOAD_PATH)
    }
}

#[async_trait::async_trait]
impl UploadTransport for HttpUploadTransport {
    async fn create(&self, file_name: &str, file_type: &str, bucket: &str) -> AppResult<String> {
        let response = self
            .client
            .post(self.upload_endpoint())
            .json(&UploadActionBody {
                file_name,
                file_type: Some(file_type),
                part_number: None,
                upload_id: None,
                bucket_name: bucket,
                action: None,
            })
            .send()
            .await
            .map_err(|e| AppError::storage(format!("发起上传请求失败: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::storage(format!(
                "发起上传返回错误: HTTP {}",
                response.status()
            )));
        }

        let body: CreateResponse = response
            .json()
            .await
            .map_err(|e| AppError::storage(format!("解析发起上传响应失败: {}", e)))?;
        Ok(body.upload_id)
    }

    async fn sign_part(
        &self,
        file_name: &str,
        upload_id: &str,
        part_number: i32,
        bucket: &str,
    ) -> AppResult<String> {
        let response = self
            .client
            .post(self.upload_endpoint())
            .json(&UploadActionBody {
                file_name,
                file_type: None,
                part_number: Some(part_number),
                upload_id: Some(upload_id),
                bucket_name: bucket,
                action: None,
            })
            .send()
            .await
            .map_err(|e| AppError::storage(format!("请求分片签名URL失败: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::storage(format!(
                "分片签名返回错误: HTTP {}",
                response.status()
            )));
        }

        let body: SignResponse = response
            .json()
            .await
            .map_err(|e| AppError::storage(format!("解析分片签名响应失败: {}", e)))?;
        Ok(body.signed_url)
    }

    async fn put_part(
        &self,
        signed_url: &str,
        data: Vec<u8>,
        on_bytes: ByteProgress,
    ) -> AppResult<()> {
        // 以64KiB帧流式发送，边发边上报进度
        const FRAME_SIZE: usize = 64 * 1024;
        let content_length = data.len();
        let frames: Vec<Bytes> = data.chunks(FRAME_SIZE).map(Bytes::copy_from_slice).collect();
        let stream = futures::stream::iter(frames.into_iter().map(move |frame| {
            on_bytes(frame.len() as u64);
            Ok::<Bytes, std::io::Error>(frame)
        }));

        let response = self
            .client
            .put(signed_url)
            .header(CONTENT_LENGTH, content_length)
            .body(reqwest::Body::wrap_stream(stream))
            .send()
            .await
            .map_err(|e| AppError::storage(format!("分片直传失败: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::storage(format!(
                "分片直传返回错误: HTTP {}",
                response.status()
            )));
        }

        Ok(())
    }

    async fn part_etag(
        &self,
        file_name: &str,
        upload_id: &str,
        part_number: i32,
        bucket: &str,
    ) -> AppResult<Option<String>> {
        let response = self
            .client
            .post(self.upload_endpoint())
            .json(&UploadActionBody {
                file_name,
                file_type: None,
                part_number: Some(part_number),
                upload_id: Some(upload_id),
                bucket_name: bucket,
                action: Some("getETag"),
            })
            .send()
            .await
            .map_err(|e| AppError::storage(format!("查询分片ETag失败: {}", e)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(AppError::storage(format!(
                "查询分片ETag返回错误: HTTP {}",
                response.status()
            )));
        }

        let body: ETagResponse = response
            .json()
            .await
            .map_err(|e| AppError::storage(format!("解析分片ETag响应失败: {}", e)))?;
        Ok(Some(body.e_tag))
    }

    async fn complete(
        &self,
        file_name: &str,
        upload_id: &str,
        parts: &[CompletedPart],
        bucket: &str,
    ) -> AppResult<String> {
        let response = self
            .client
            .put(self.upload_endpoint())
            .json(&CompleteBody {
                file_name,
                upload_id,
                parts,
                bucket_name: bucket,
            })
            .send()
            .await
            .map_err(|e| AppError::storage(format!("完成上传请求失败: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::storage(format!(
                "完成上传返回错误: HTTP {}",
                response.status()
            )));
        }

        let body: CompleteResponse = response
            .json()
            .await
            .map_err(|e| AppError::storage(format!("解析完成上传响应失败: {}", e)))?;
        Ok(body.image_id)
    }

    async fn abort(&self, file_name: &str, upload_id: &str, bucket: &str) -> AppResult<()> {
        let response = self
            .client
            .delete(self.upload_endpoint())
            .json(&AbortBody {
                file_name,
                upload_id,
                bucket_name: bucket,
            })
            .send()
            .await
            .map_err(|e| AppError::storage(format!("中止上传请求失败: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::storage(format!(
                "中止上传返回错误: HTTP {}",
                response.status()
            )));
        }

        Ok(())
    }
}
