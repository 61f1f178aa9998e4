use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// 一个分片对应的字节区间（前闭后开）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRange {
    /// 分片号（从1开始，连续）
    pub part_number: i32,
    pub start: u64,
    /// 不含end本身
    pub end: u64,
}

impl ChunkRange {
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// 分片规划：把文件切成固定大小、1起始、连续覆盖的分片序列
///
/// 最后一个分片允许小于chunk_size。文件大小为0时拒绝。
pub fn plan_chunks(file_size: u64, chunk_size: u64) -> AppResult<Vec<ChunkRange>> {
    if file_size == 0 {
        return Err(AppError::validation("文件大小不能为0"));
    }
    if chunk_size == 0 {
        return Err(AppError::validation("分片大小不能为0"));
    }

    let count = file_size.div_ceil(chunk_size);
    let mut chunks = Vec::with_capacity(count as usize);
    for i in 0..count {
        let start = i * chunk_size;
        let end = (start + chunk_size).min(file_size);
        chunks.push(ChunkRange {
            part_number: (i + 1) as i32,
            start,
            end,
        });
    }

    Ok(chunks)
}

/// 生成对象存储key：毫秒时间戳 + 清洗后的原始文件名
///
/// 字母数字、`.`、`-`以外的字符替换为`_`，与前端上传页保持一致。
pub fn object_key(original_name: &str, now: chrono::DateTime<chrono::Utc>) -> String {
    let sanitized: String = original_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();

    format!("{}-{}", now.timestamp_millis(), sanitized)
}

/// 已上传分片（完成multipart上传时提交）
///
/// 字段名与S3 completion报文一致（`ETag` / `PartNumber`）。
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CompletedPart {
    #[serde(rename = "ETag")]
    pub e_tag: String,
    #[serde(rename = "PartNumber")]
    pub part_number: i32,
}

/// 校验并规范化完成列表：按分片号排序后必须是连续的1..N
///
/// 分片到达顺序不限，但缺号或重号一律拒绝。
pub fn validate_parts(parts: &[CompletedPart]) -> AppResult<Vec<CompletedPart>> {
    if parts.is_empty() {
        return Err(AppError::validation("分片列表不能为空"));
    }

    let mut sorted = parts.to_vec();
    sorted.sort_by_key(|p| p.part_number);

    for (i, part) in sorted.iter().enumerate() {
        let expected = (i + 1) as i32;
        if part.part_number != expected {
            return Err(AppError::validation(format!(
                "分片号不连续: 期望{}, 实际{}",
                expected, part.part_number
            )));
        }
        if part.e_tag.is_empty() {
            return Err(AppError::validation(format!(
                "分片{}缺少ETag",
                part.part_number
            )));
        }
    }

    Ok(sorted)
}

/// 一次multipart上传会话（由coordinator独占持有，单文件）
#[derive(Debug, Clone)]
pub struct UploadSession {
    pub file_name: String,
    pub content_type: String,
    pub bucket_name: String,
    pub upload_id: String,
    /// 按分片号递增收集
    pub parts: Vec<CompletedPart>,
}

/// 完成multipart上传后的摘要
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompletedUpload {
    pub bucket: String,
    pub key: String,
    pub location: Option<String>,
    #[serde(rename = "eTag")]
    pub e_tag: Option<String>,
}
