use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// 图片审核状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ImageStatus {
    /// 待审核
    Pending,
    /// 已通过
    Approved,
    /// 已拒绝
    Rejected,
}

/// 审核动作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ModerationAction {
    Approve,
    Reject,
}

impl ModerationAction {
    /// 动作到状态的确定性映射
    pub fn target_status(self) -> ImageStatus {
        match self {
            ModerationAction::Approve => ImageStatus::Approved,
            ModerationAction::Reject => ImageStatus::Rejected,
        }
    }
}

/// 图片记录
///
/// 上传会话完成时创建，状态只能由审核接口变更，没有删除路径。
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    /// 图片唯一标识符（UUID v4）
    pub id: Uuid,
    /// 对外展示URL
    pub url: String,
    /// 对象存储中的文件名
    pub file_name: String,
    /// 上传完成时间（UTC时间）
    pub uploaded_at: DateTime<Utc>,
    /// 审核状态
    pub status: ImageStatus,
}

impl ImageRecord {
    /// 创建一条待审核记录
    pub fn new_pending(url: String, file_name: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            url,
            file_name,
            uploaded_at: Utc::now(),
            status: ImageStatus::Pending,
        }
    }
}

/// 公开画廊条目（仅已通过的图片，不暴露审核状态）
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GalleryPhoto {
    pub id: Uuid,
    pub url: String,
    pub file_name: String,
    pub uploaded_at: DateTime<Utc>,
}

impl From<&ImageRecord> for GalleryPhoto {
    fn from(record: &ImageRecord) -> Self {
        Self {
            id: record.id,
            url: record.url.clone(),
            file_name: record.file_name.clone(),
            uploaded_at: record.uploaded_at,
        }
    }
}
