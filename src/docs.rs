use crate::{
    handlers::{
        moderation::{GalleryResponse, ModerateRequest, ModerateResponse, ModerationListResponse},
        upload::{
            AbortUploadRequest, AbortUploadResponse, CompleteUploadRequest,
            CompleteUploadResponse, CreateUploadResponse, PartETagResponse, SignPartResponse,
            UploadActionRequest,
        },
    },
    models::{CompletedPart, CompletedUpload, GalleryPhoto, ImageRecord, ImageStatus,
        ModerationAction},
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        // 分片上传API
        crate::handlers::upload::upload_action,
        crate::handlers::upload::complete_upload,
        crate::handlers::upload::abort_upload,
        // 审核与画廊API
        crate::handlers::moderation::list_images,
        crate::handlers::moderation::moderate_image,
        crate::handlers::moderation::gallery,
    ),
    components(schemas(
        UploadActionRequest,
        CreateUploadResponse,
        SignPartResponse,
        PartETagResponse,
        CompleteUploadRequest,
        CompleteUploadResponse,
        AbortUploadRequest,
        AbortUploadResponse,
        ModerateRequest,
        ModerateResponse,
        ModerationListResponse,
        GalleryResponse,
        CompletedPart,
        CompletedUpload,
        ImageRecord,
        ImageStatus,
        ModerationAction,
        GalleryPhoto,
    )),
    tags(
        (name = "照片上传", description = "分片直传对象存储（发起/签名/查ETag/完成/中止）"),
        (name = "照片审核", description = "审核队列与公开画廊")
    ),
    info(
        title = "Fotofi Backend API",
        description = "活动照片收集后端：multipart直传 + 审核门",
        version = "0.1.0"
    )
)]
pub struct ApiDoc;
