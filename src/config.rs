use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 分片大小：10 MiB
pub const DEFAULT_CHUNK_SIZE: u64 = 10 * 1024 * 1024;

/// 应用程序配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub upload: UploadConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// 对象存储配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// S3兼容endpoint（MinIO / R2）
    pub endpoint: String,
    pub region: String,
    /// 默认上传bucket
    pub default_bucket: String,
    /// 预签名URL有效期（秒）
    pub presign_expiry_secs: u64,
    /// bucket客户端空闲淘汰时间（秒）
    pub client_idle_ttl_secs: u64,
    /// 完成上传后对外展示的URL前缀
    pub public_base_url: String,
}

/// 上传配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// 分片大小（字节）
    pub chunk_size: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            storage: StorageConfig {
                endpoint: "http://localhost:9000".to_string(),
                region: "auto".to_string(),
                default_bucket: "fotofi-photos".to_string(),
                presign_expiry_secs: 60,
                client_idle_ttl_secs: 15 * 60,
                public_base_url: "https://storage.infidrive.net".to_string(),
            },
            upload: UploadConfig {
                chunk_size: DEFAULT_CHUNK_SIZE,
            },
        }
    }
}

impl Config {
    /// 从配置文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| AppError::config(format!("解析配置文件失败: {}", e)))?;

        // 验证配置
        config.validate()?;

        Ok(config)
    }

    /// 验证配置有效性
    pub fn validate(&self) -> AppResult<()> {
        if self.server.port == 0 {
            return Err(AppError::config("服务器端口不能为0"));
        }

        if self.storage.endpoint.is_empty() {
            return Err(AppError::config("存储endpoint不能为空"));
        }

        if self.storage.default_bucket.is_empty() {
            return Err(AppError::config("默认bucket不能为空"));
        }

        if self.storage.presign_expiry_secs == 0 {
            return Err(AppError::config("预签名有效期不能为0"));
        }

        if self.storage.client_idle_ttl_secs == 0 {
            return Err(AppError::config("客户端空闲淘汰时间不能为0"));
        }

        if self.upload.chunk_size == 0 {
            return Err(AppError::config("分片大小不能为0"));
        }

        Ok(())
    }

    /// 获取服务器监听地址
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// 保存配置到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> AppResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| AppError::config(format!("序列化配置失败: {}", e)))?;

        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }
}
