use crate::handlers::{
    AppState, abort_upload, complete_upload, gallery, list_images, moderate_image, upload_action,
};
use axum::{
    Router,
    routing::{delete as axum_delete, get, post, put},
};

/// 创建API路由
pub fn create_api_routes() -> Router<AppState> {
    Router::new()
        // 分片上传API
        .route("/photos/upload", post(upload_action)) // 发起/签名/查ETag
        .route("/photos/upload", put(complete_upload)) // 完成上传并登记审核
        .route("/photos/upload", axum_delete(abort_upload)) // 中止上传
        // 审核与画廊API
        .route("/photos/moderate", get(list_images)) // 审核列表
        .route("/photos/moderate", post(moderate_image)) // 通过/拒绝
        .route("/photos/gallery", get(gallery)) // 公开画廊
}
