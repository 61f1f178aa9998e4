use crate::{
    error::{AppError, AppResult},
    handlers::AppState,
    models::{CompletedPart, CompletedUpload, ImageRecord},
};
use axum::{
    extract::{Json, State},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// 发起/签名/查ETag的统一请求体
///
/// 三种操作复用一个POST入口：无uploadId时发起上传，
/// 有uploadId时为partNumber签名，action=getETag时查询分片ETag。
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadActionRequest {
    pub file_name: Option<String>,
    pub file_type: Option<String>,
    pub part_number: Option<i32>,
    pub upload_id: Option<String>,
    pub bucket_name: Option<String>,
    pub action: Option<String>,
}

/// 发起上传响应
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateUploadResponse {
    #[serde(rename = "uploadId")]
    pub upload_id: String,
}

/// 分片签名响应
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SignPartResponse {
    #[serde(rename = "signedUrl")]
    pub signed_url: String,
}

/// 分片ETag查询响应
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PartETagResponse {
    #[serde(rename = "ETag")]
    pub e_tag: String,
}

fn required<T>(value: Option<T>, name: &str) -> AppResult<T> {
    value.ok_or_else(|| AppError::bad_request(format!("缺少{}", name)))
}

/// 发起multipart上传 / 分片签名 / 查询分片ETag
#[utoipa::path(
    post,
    path = "/photos/upload",
    request_body = UploadActionRequest,
    responses(
        (status = 200, description = "uploadId、signedUrl或ETag（取决于请求分支）"),
        (status = 400, description = "缺少bucketName等必填字段"),
        (status = 404, description = "分片不存在"),
        (status = 500, description = "存储后端错误")
    ),
    tag = "照片上传"
)]
pub async fn upload_action(
    State(app_state): State<AppState>,
    Json(request): Json<UploadActionRequest>,
) -> Result<Response, AppError> {
    let bucket = required(request.bucket_name, "bucketName")?;
    let file_name = required(request.file_name, "fileName")?;

    if request.action.as_deref() == Some("getETag") {
        let upload_id = required(request.upload_id, "uploadId")?;
        let part_number = required(request.part_number, "partNumber")?;

        let e_tag = app_state
            .storage
            .part_etag(&bucket, &file_name, &upload_id, part_number)
            .await?
            .ok_or_else(|| AppError::not_found(format!("分片{}", part_number)))?;

        return Ok(Json(PartETagResponse { e_tag }).into_response());
    }

    match request.upload_id {
        None => {
            // 无uploadId：发起新的multipart上传
            let content_type = request
                .file_type
                .unwrap_or_else(|| "application/octet-stream".to_string());
            let upload_id = app_state
                .storage
                .create_multipart(&bucket, &file_name, &content_type)
                .await?;

            Ok(Json(CreateUploadResponse { upload_id }).into_response())
        }
        Some(upload_id) => {
            let part_number = required(request.part_number, "partNumber")?;
            let signed_url = app_state
                .storage
                .presign_part(&bucket, &file_name, &upload_id, part_number)
                .await?;

            Ok(Json(SignPartResponse { signed_url }).into_response())
        }
    }
}

/// 完成上传请求体
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompleteUploadRequest {
    pub file_name: Option<String>,
    pub upload_id: Option<String>,
    pub parts: Option<Vec<CompletedPart>>,
    pub bucket_name: Option<String>,
}

/// 完成上传响应
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CompleteUploadResponse {
    pub message: String,
    pub result: CompletedUpload,
    #[serde(rename = "imageId")]
    pub image_id: Uuid,
}

/// 完成multipart上传并登记待审核图片
#[utoipa::path(
    put,
    path = "/photos/upload",
    request_body = CompleteUploadRequest,
    responses(
        (status = 200, description = "上传完成", body = CompleteUploadResponse),
        (status = 400, description = "缺少必填字段或分片列表不合法"),
        (status = 500, description = "存储后端错误")
    ),
    tag = "照片上传"
)]
pub async fn complete_upload(
    State(app_state): State<AppState>,
    Json(request): Json<CompleteUploadRequest>,
) -> Result<Json<CompleteUploadResponse>, AppError> {
    let bucket = required(request.bucket_name, "bucketName")?;
    let file_name = required(request.file_name, "fileName")?;
    let upload_id = required(request.upload_id, "uploadId")?;
    let parts = required(request.parts, "parts")?;

    let result = app_state
        .storage
        .complete_multipart(&bucket, &file_name, &upload_id, &parts)
        .await?;

    // 完成即进入审核队列，状态pending
    let url = format!(
        "{}/{}",
        app_state.config.storage.public_base_url, file_name
    );
    let record = ImageRecord::new_pending(url, file_name);
    let image_id = record.id;
    app_state.images.insert(record).await?;

    Ok(Json(CompleteUploadResponse {
        message: "上传完成".to_string(),
        result,
        image_id,
    }))
}

/// 中止上传请求体
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AbortUploadRequest {
    pub file_name: Option<String>,
    pub upload_id: Option<String>,
    pub bucket_name: Option<String>,
}

/// 中止上传响应
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AbortUploadResponse {
    pub message: String,
}

/// 中止multipart上传，释放未提交的分片
#[utoipa::path(
    delete,
    path = "/photos/upload",
    request_body = AbortUploadRequest,
    responses(
        (status = 200, description = "上传已中止", body = AbortUploadResponse),
        (status = 400, description = "缺少必填字段"),
        (status = 500, description = "存储后端错误")
    ),
    tag = "照片上传"
)]
pub async fn abort_upload(
    State(app_state): State<AppState>,
    Json(request): Json<AbortUploadRequest>,
) -> Result<Json<AbortUploadResponse>, AppError> {
    let bucket = required(request.bucket_name, "bucketName")?;
    let file_name = required(request.file_name, "fileName")?;
    let upload_id = required(request.upload_id, "uploadId")?;

    app_state
        .storage
        .abort_multipart(&bucket, &file_name, &upload_id)
        .await?;

    Ok(Json(AbortUploadResponse {
        message: "上传已中止".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::Config,
        models::{ImageStatus, validate_parts},
        repositories::{ImageRepository, InMemoryImageRepository},
        storage::MultipartStorage,
    };
    use std::sync::Arc;

    /// 不碰网络的mock存储
    #[derive(Default)]
    struct MockStorage {
        /// ETag查询是否命中分片
        part_found: bool,
    }

    #[async_trait::async_trait]
    impl MultipartStorage for MockStorage {
        async fn health_check(&self) -> AppResult<bool> {
            Ok(true)
        }

        async fn create_multipart(
            &self,
            _bucket: &str,
            _key: &str,
            _content_type: &str,
        ) -> AppResult<String> {
            Ok("upload-1".to_string())
        }

        async fn presign_part(
            &self,
            _bucket: &str,
            _key: &str,
            _upload_id: &str,
            part_number: i32,
        ) -> AppResult<String> {
            Ok(format!("https://signed.example/{}", part_number))
        }

        async fn part_etag(
            &self,
            _bucket: &str,
            _key: &str,
            _upload_id: &str,
            part_number: i32,
        ) -> AppResult<Option<String>> {
            Ok(self.part_found.then(|| format!("e{}", part_number)))
        }

        async fn complete_multipart(
            &self,
            bucket: &str,
            key: &str,
            _upload_id: &str,
            parts: &[CompletedPart],
        ) -> AppResult<CompletedUpload> {
            let sorted = validate_parts(parts)?;
            Ok(CompletedUpload {
                bucket: bucket.to_string(),
                key: key.to_string(),
                location: None,
                e_tag: Some(format!("merged-{}", sorted.len())),
            })
        }

        async fn abort_multipart(
            &self,
            _bucket: &str,
            _key: &str,
            _upload_id: &str,
        ) -> AppResult<()> {
            Ok(())
        }
    }

    fn test_state_with(storage: MockStorage) -> AppState {
        AppState {
            storage: Arc::new(storage),
            images: Arc::new(InMemoryImageRepository::new()),
            config: Config::default(),
        }
    }

    fn test_state() -> AppState {
        test_state_with(MockStorage::default())
    }

    async fn response_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_upload_action_missing_bucket_is_bad_request() {
        // 其他字段齐全也一样：缺bucketName直接400
        let request = UploadActionRequest {
            file_name: Some("a.jpg".to_string()),
            file_type: Some("image/jpeg".to_string()),
            part_number: Some(1),
            upload_id: Some("u-1".to_string()),
            bucket_name: None,
            action: None,
        };

        let err = upload_action(State(test_state()), Json(request))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_complete_upload_missing_parts_is_bad_request() {
        let request = CompleteUploadRequest {
            file_name: Some("a.jpg".to_string()),
            upload_id: Some("u-1".to_string()),
            parts: None,
            bucket_name: Some("fotofi-photos".to_string()),
        };

        let err = complete_upload(State(test_state()), Json(request))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_abort_upload_missing_upload_id_is_bad_request() {
        let request = AbortUploadRequest {
            file_name: Some("a.jpg".to_string()),
            upload_id: None,
            bucket_name: Some("fotofi-photos".to_string()),
        };

        let err = abort_upload(State(test_state()), Json(request))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_create_branch_returns_upload_id() {
        // 无uploadId：发起分支
        let request = UploadActionRequest {
            file_name: Some("123-a.jpg".to_string()),
            file_type: Some("image/jpeg".to_string()),
            part_number: None,
            upload_id: None,
            bucket_name: Some("fotofi-photos".to_string()),
            action: None,
        };

        let response = upload_action(State(test_state()), Json(request))
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
        let body = response_json(response).await;
        assert_eq!(body["uploadId"], "upload-1");
    }

    #[tokio::test]
    async fn test_sign_branch_returns_signed_url() {
        let request = UploadActionRequest {
            file_name: Some("123-a.jpg".to_string()),
            file_type: None,
            part_number: Some(2),
            upload_id: Some("upload-1".to_string()),
            bucket_name: Some("fotofi-photos".to_string()),
            action: None,
        };

        let response = upload_action(State(test_state()), Json(request))
            .await
            .unwrap();
        let body = response_json(response).await;
        assert_eq!(body["signedUrl"], "https://signed.example/2");
    }

    #[tokio::test]
    async fn test_get_etag_branch_returns_backend_etag() {
        let request = UploadActionRequest {
            file_name: Some("123-a.jpg".to_string()),
            file_type: None,
            part_number: Some(1),
            upload_id: Some("upload-1".to_string()),
            bucket_name: Some("fotofi-photos".to_string()),
            action: Some("getETag".to_string()),
        };

        let response = upload_action(
            State(test_state_with(MockStorage { part_found: true })),
            Json(request),
        )
        .await
        .unwrap();
        let body = response_json(response).await;
        assert_eq!(body["ETag"], "e1");
    }

    #[tokio::test]
    async fn test_get_etag_unknown_part_is_not_found() {
        let request = UploadActionRequest {
            file_name: Some("123-a.jpg".to_string()),
            file_type: None,
            part_number: Some(3),
            upload_id: Some("upload-1".to_string()),
            bucket_name: Some("fotofi-photos".to_string()),
            action: Some("getETag".to_string()),
        };

        let err = upload_action(
            State(test_state_with(MockStorage { part_found: false })),
            Json(request),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_complete_registers_exactly_one_pending_record() {
        let state = test_state();
        // 乱序提交也成功，分片号齐全即可
        let request = CompleteUploadRequest {
            file_name: Some("123-a.jpg".to_string()),
            upload_id: Some("upload-1".to_string()),
            parts: Some(vec![
                CompletedPart {
                    e_tag: "e2".to_string(),
                    part_number: 2,
                },
                CompletedPart {
                    e_tag: "e1".to_string(),
                    part_number: 1,
                },
                CompletedPart {
                    e_tag: "e3".to_string(),
                    part_number: 3,
                },
            ]),
            bucket_name: Some("fotofi-photos".to_string()),
        };

        let response = complete_upload(State(state.clone()), Json(request))
            .await
            .unwrap();

        // 恰好登记一条pending记录，imageId与响应一致
        let records = state.images.list().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, response.0.image_id);
        assert_eq!(records[0].status, ImageStatus::Pending);
        assert_eq!(records[0].file_name, "123-a.jpg");
        assert_eq!(
            records[0].url,
            format!("{}/123-a.jpg", state.config.storage.public_base_url)
        );
    }

    #[tokio::test]
    async fn test_complete_with_missing_part_registers_nothing() {
        let state = test_state();
        let request = CompleteUploadRequest {
            file_name: Some("123-a.jpg".to_string()),
            upload_id: Some("upload-1".to_string()),
            parts: Some(vec![
                CompletedPart {
                    e_tag: "e1".to_string(),
                    part_number: 1,
                },
                CompletedPart {
                    e_tag: "e3".to_string(),
                    part_number: 3,
                },
            ]),
            bucket_name: Some("fotofi-photos".to_string()),
        };

        let err = complete_upload(State(state.clone()), Json(request))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(state.images.list().await.unwrap().is_empty());
    }
}
