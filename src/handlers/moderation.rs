use crate::{
    error::{AppError, AppResult},
    handlers::AppState,
    models::{GalleryPhoto, ImageRecord, ModerationAction},
};
use axum::extract::{Json, State};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// 审核列表响应（含全部状态）
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ModerationListResponse {
    pub success: bool,
    pub images: Vec<ImageRecord>,
}

/// 获取全部图片及其当前审核状态
#[utoipa::path(
    get,
    path = "/photos/moderate",
    responses(
        (status = 200, description = "审核列表", body = ModerationListResponse)
    ),
    tag = "照片审核"
)]
pub async fn list_images(
    State(app_state): State<AppState>,
) -> AppResult<Json<ModerationListResponse>> {
    let images = app_state.images.list().await?;

    Ok(Json(ModerationListResponse {
        success: true,
        images,
    }))
}

/// 审核请求体
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ModerateRequest {
    pub image_id: Option<String>,
    pub action: Option<String>,
}

/// 审核响应
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ModerateResponse {
    pub success: bool,
    pub message: String,
    pub image: ImageRecord,
}

/// 通过或拒绝一张图片
///
/// 同一动作重复提交幂等（重复应用相同状态）。
#[utoipa::path(
    post,
    path = "/photos/moderate",
    request_body = ModerateRequest,
    responses(
        (status = 200, description = "审核完成", body = ModerateResponse),
        (status = 400, description = "缺少imageId/action或动作不合法"),
        (status = 404, description = "图片不存在")
    ),
    tag = "照片审核"
)]
pub async fn moderate_image(
    State(app_state): State<AppState>,
    Json(request): Json<ModerateRequest>,
) -> Result<Json<ModerateResponse>, AppError> {
    let (image_id, action) = match (request.image_id, request.action) {
        (Some(id), Some(action)) => (id, action),
        _ => return Err(AppError::bad_request("缺少imageId或action")),
    };

    let action = match action.as_str() {
        "approve" => ModerationAction::Approve,
        "reject" => ModerationAction::Reject,
        other => {
            return Err(AppError::bad_request(format!(
                "不合法的action: {}（只接受approve或reject）",
                other
            )));
        }
    };

    // 格式不合法的ID视同未知ID
    let id = Uuid::parse_str(&image_id)
        .map_err(|_| AppError::not_found(format!("图片 {}", image_id)))?;

    let image = app_state.images.set_status(id, action).await?;

    let message = match action {
        ModerationAction::Approve => "图片审核已通过".to_string(),
        ModerationAction::Reject => "图片已拒绝".to_string(),
    };

    Ok(Json(ModerateResponse {
        success: true,
        message,
        image,
    }))
}

/// 公开画廊响应（仅已通过，裁剪审核状态字段）
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct GalleryResponse {
    pub success: bool,
    pub photos: Vec<GalleryPhoto>,
}

/// 公开画廊：仅返回已通过审核的图片
#[utoipa::path(
    get,
    path = "/photos/gallery",
    responses(
        (status = 200, description = "已通过审核的图片", body = GalleryResponse)
    ),
    tag = "照片审核"
)]
pub async fn gallery(State(app_state): State<AppState>) -> AppResult<Json<GalleryResponse>> {
    let photos = app_state.images.list_approved().await?;

    Ok(Json(GalleryResponse {
        success: true,
        photos,
    }))
}
