pub mod moderation;
pub mod upload;

pub use moderation::{gallery, list_images, moderate_image};
pub use upload::{abort_upload, complete_upload, upload_action};

use crate::{config::Config, repositories::ImageRepository, storage::MultipartStorage};
use std::sync::Arc;

/// 应用状态
///
/// 存储与审核仓库都以接口注入，生产环境接S3与进程内存实现，测试注入mock。
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn MultipartStorage>,
    pub images: Arc<dyn ImageRepository>,
    pub config: Config,
}
