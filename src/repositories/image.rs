use crate::{
    error::{AppError, AppResult},
    models::{GalleryPhoto, ImageRecord, ModerationAction},
};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// 图片记录仓库接口
///
/// 审核状态的唯一权威来源。实现必须自行串行化读写，
/// 多线程runtime下不允许裸的共享可变序列。
#[async_trait::async_trait]
pub trait ImageRepository: Send + Sync {
    /// 插入新记录（上传完成时调用）
    async fn insert(&self, record: ImageRecord) -> AppResult<()>;

    /// 全量列表（审核页使用，含全部状态）
    async fn list(&self) -> AppResult<Vec<ImageRecord>>;

    /// 仅已通过的记录，裁剪为公开展示字段
    async fn list_approved(&self) -> AppResult<Vec<GalleryPhoto>>;

    /// 按ID查找
    async fn get(&self, id: Uuid) -> AppResult<Option<ImageRecord>>;

    /// 应用审核动作；未知ID返回NotFound，重复同一动作幂等
    async fn set_status(&self, id: Uuid, action: ModerationAction) -> AppResult<ImageRecord>;
}

/// 进程内存实现
///
/// 生命周期与进程相同，没有持久化。同ID并发更新由互斥锁串行化，
/// 语义为后写覆盖。
#[derive(Debug, Clone, Default)]
pub struct InMemoryImageRepository {
    records: Arc<Mutex<Vec<ImageRecord>>>,
}

impl InMemoryImageRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> AppResult<std::sync::MutexGuard<'_, Vec<ImageRecord>>> {
        self.records
            .lock()
            .map_err(|_| AppError::Internal(anyhow::anyhow!("图片仓库互斥锁中毒")))
    }
}

#[async_trait::async_trait]
impl ImageRepository for InMemoryImageRepository {
    async fn insert(&self, record: ImageRecord) -> AppResult<()> {
        let mut records = self.lock()?;
        tracing::info!("新增待审核图片: {} ({})", record.id, record.file_name);
        records.push(record);
        Ok(())
    }

    async fn list(&self) -> AppResult<Vec<ImageRecord>> {
        Ok(self.lock()?.clone())
    }

    async fn list_approved(&self) -> AppResult<Vec<GalleryPhoto>> {
        let records = self.lock()?;
        Ok(records
            .iter()
            .filter(|r| r.status == crate::models::ImageStatus::Approved)
            .map(GalleryPhoto::from)
            .collect())
    }

    async fn get(&self, id: Uuid) -> AppResult<Option<ImageRecord>> {
        Ok(self.lock()?.iter().find(|r| r.id == id).cloned())
    }

    async fn set_status(&self, id: Uuid, action: ModerationAction) -> AppResult<ImageRecord> {
        let mut records = self.lock()?;
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| AppError::not_found(format!("图片 {}", id)))?;

        record.status = action.target_status();
        tracing::info!("图片 {} 审核状态更新为 {:?}", id, record.status);
        Ok(record.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ImageStatus;

    fn sample_record(name: &str) -> ImageRecord {
        ImageRecord::new_pending(
            format!("https://storage.infidrive.net/{}", name),
            name.to_string(),
        )
    }

    #[tokio::test]
    async fn test_insert_and_list() {
        let repo = InMemoryImageRepository::new();
        repo.insert(sample_record("a.jpg")).await.unwrap();
        repo.insert(sample_record("b.jpg")).await.unwrap();

        let all = repo.list().await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|r| r.status == ImageStatus::Pending));
    }

    #[tokio::test]
    async fn test_approve_then_gallery_includes() {
        let repo = InMemoryImageRepository::new();
        let record = sample_record("a.jpg");
        let id = record.id;
        repo.insert(record).await.unwrap();

        let updated = repo.set_status(id, ModerationAction::Approve).await.unwrap();
        assert_eq!(updated.status, ImageStatus::Approved);

        let gallery = repo.list_approved().await.unwrap();
        assert_eq!(gallery.len(), 1);
        assert_eq!(gallery[0].id, id);
    }

    #[tokio::test]
    async fn test_reject_then_gallery_excludes() {
        let repo = InMemoryImageRepository::new();
        let record = sample_record("a.jpg");
        let id = record.id;
        repo.insert(record).await.unwrap();

        repo.set_status(id, ModerationAction::Approve).await.unwrap();
        repo.set_status(id, ModerationAction::Reject).await.unwrap();

        assert!(repo.list_approved().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_set_status_idempotent() {
        let repo = InMemoryImageRepository::new();
        let record = sample_record("a.jpg");
        let id = record.id;
        repo.insert(record).await.unwrap();

        repo.set_status(id, ModerationAction::Approve).await.unwrap();
        let again = repo.set_status(id, ModerationAction::Approve).await.unwrap();
        assert_eq!(again.status, ImageStatus::Approved);
    }

    #[tokio::test]
    async fn test_set_status_unknown_id() {
        let repo = InMemoryImageRepository::new();
        repo.insert(sample_record("a.jpg")).await.unwrap();

        let result = repo
            .set_status(Uuid::new_v4(), ModerationAction::Approve)
            .await;
        assert!(matches!(result, Err(AppError::NotFound { .. })));

        // 未命中不改变现有记录集
        let all = repo.list().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].status, ImageStatus::Pending);
    }
}
