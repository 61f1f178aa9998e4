use axum::{
    Router,
    extract::{Query, State},
    http::Method,
    response::{Html, Json},
    routing::get,
};
use fotofi_backend::{
    config::Config,
    docs::ApiDoc,
    error::AppResult,
    handlers::AppState,
    repositories::InMemoryImageRepository,
    routes::create_api_routes,
    storage::{MultipartStorage, S3Storage},
};
use serde::Deserialize;
use std::{collections::HashMap, sync::Arc};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;

#[derive(Deserialize)]
struct HealthQuery {
    #[serde(default)]
    detail: bool,
}

/// 健康检查处理器
async fn health_check(Query(params): Query<HealthQuery>) -> Json<serde_json::Value> {
    if params.detail {
        let timestamp = chrono::Utc::now().to_rfc3339();
        let mut details = HashMap::new();
        details.insert("status", "healthy");
        details.insert("version", "0.1.0");
        details.insert("timestamp", timestamp.as_str());

        Json(serde_json::json!(details))
    } else {
        Json(serde_json::json!({"status": "ok"}))
    }
}

/// 存储健康检查处理器
async fn storage_health_check(State(app_state): State<AppState>) -> Json<serde_json::Value> {
    match app_state.storage.health_check().await {
        Ok(true) => {
            let timestamp = chrono::Utc::now().to_rfc3339();
            Json(serde_json::json!({
                "storage": "healthy",
                "timestamp": timestamp,
            }))
        }
        Ok(false) => Json(serde_json::json!({
            "storage": "unhealthy",
        })),
        Err(e) => {
            tracing::error!("存储健康检查失败: {}", e);
            Json(serde_json::json!({
                "storage": "error",
                "error": e.to_string(),
            }))
        }
    }
}

/// Swagger UI 页面（访问路径：/swagger-ui）
/// OpenAPI JSON 路径：/api-docs/openapi.json
async fn swagger_ui_page() -> Html<&'static str> {
    Html(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset=UTF-8>
  <title>Fotofi API 文档</title>
  <link rel=stylesheet href=https://cdn.jsdelivr.net/npm/swagger-ui-dist@5.11.0/swagger-ui.css>
</head>
<body>
  <div id=swagger-ui></div>
  <script src=https://cdn.jsdelivr.net/npm/swagger-ui-dist@5.11.0/swagger-ui-bundle.js></script>
  <script>
    window.onload = function() {
      window.ui = SwaggerUIBundle({
        url: '/api-docs/openapi.json',
        dom_id: '#swagger-ui',
        deepLinking: true,
        validatorUrl: null
      });
    };
  </script>
</body>
</html>"#,
    )
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // 初始化日志
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fotofi_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置
    let config = match Config::from_file("config.toml") {
        Ok(config) => {
            tracing::info!("已加载配置文件: config.toml");
            config
        }
        Err(_) => {
            tracing::warn!("未找到配置文件，使用默认配置");
            let default_config = Config::default();
            // 保存默认配置到文件
            if let Err(e) = default_config.save_to_file("config.toml") {
                tracing::warn!("保存默认配置失败: {}", e);
            }
            default_config
        }
    };

    tracing::info!("服务器配置: {}", config.server_addr());

    // 初始化对象存储（客户端按bucket懒加载，凭证取用时从环境变量解析）
    let storage: Arc<dyn MultipartStorage> = Arc::new(S3Storage::new(config.storage.clone()));
    match storage.health_check().await {
        Ok(true) => tracing::info!("对象存储连接正常: {}", config.storage.endpoint),
        Ok(false) => tracing::warn!("对象存储暂不可达，签名请求将在后端恢复后生效"),
        Err(e) => tracing::warn!("对象存储健康检查失败: {}", e),
    }

    // 审核队列为进程内存实现，随进程重启清空
    let images = Arc::new(InMemoryImageRepository::new());

    // 创建应用状态
    let app_state = AppState {
        storage,
        images,
        config: config.clone(),
    };

    // 创建CORS中间件
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(vec![
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    // 创建主路由
    let app = Router::new()
        // 健康检查
        .route("/health", get(health_check))
        .route("/api/health/storage", get(storage_health_check))
        // OpenAPI JSON 路由
        .route(
            "/api-docs/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        // Swagger UI 页面
        .route("/swagger-ui", get(swagger_ui_page))
        // 业务API路由
        .merge(create_api_routes())
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // 启动服务器
    let listener = tokio::net::TcpListener::bind(&config.server_addr()).await?;
    tracing::info!("🚀 服务器启动成功，监听地址: {}", config.server_addr());

    axum::serve(listener, app).await?;

    Ok(())
}
