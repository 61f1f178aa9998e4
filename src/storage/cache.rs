use crate::error::{AppError, AppResult};
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::{Client, config::Credentials};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

/// 缓存的bucket客户端
#[derive(Debug, Clone)]
struct CachedClient {
    client: Arc<Client>,
    last_used: Instant,
}

/// 按bucket名缓存的S3客户端
///
/// 每个bucket的凭证在取用时从环境变量解析，客户端懒加载。
/// 过期条目在下一次访问时惰性淘汰，没有后台定时器。
/// 读-淘汰-写整个序列由互斥锁保护（tokio多线程runtime下必需）。
#[derive(Debug)]
pub struct ClientCache {
    endpoint: String,
    region: String,
    idle_ttl: Duration,
    entries: Mutex<HashMap<String, CachedClient>>,
}

impl ClientCache {
    pub fn new(endpoint: String, region: String, idle_ttl: Duration) -> Self {
        Self {
            endpoint,
            region,
            idle_ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// 获取或创建bucket对应的客户端
    ///
    /// 同一bucket在空闲TTL内返回同一实例；缺少凭证只让该bucket的请求失败。
    pub fn get(&self, bucket: &str) -> AppResult<Arc<Client>> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| AppError::Internal(anyhow::anyhow!("客户端缓存互斥锁中毒")))?;

        // 惰性淘汰过期条目
        let now = Instant::now();
        entries.retain(|_, entry| now.duration_since(entry.last_used) <= self.idle_ttl);

        if let Some(entry) = entries.get_mut(bucket) {
            entry.last_used = now;
            return Ok(entry.client.clone());
        }

        let (access_key, secret_key) = resolve_credentials(bucket)?;

        let s3_config = aws_sdk_s3::Config::builder()
            .endpoint_url(&self.endpoint)
            .credentials_provider(Credentials::new(
                access_key, secret_key, None, // session token
                None, // expiration
                "fotofi",
            ))
            .region(Region::new(self.region.clone()))
            .force_path_style(true) // MinIO需要路径样式
            .behavior_version(BehaviorVersion::latest())
            .build();

        let client = Arc::new(Client::from_conf(s3_config));
        tracing::debug!("为bucket '{}' 创建新的S3客户端", bucket);

        entries.insert(
            bucket.to_string(),
            CachedClient {
                client: client.clone(),
                last_used: now,
            },
        );

        Ok(client)
    }
}

/// bucket名派生的凭证环境变量名
///
/// 大写后把字母数字以外的字符替换为`_`，保证shell可设置。
fn credential_env_keys(bucket: &str) -> (String, String) {
    let prefix: String = bucket
        .to_uppercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();

    (
        format!("{}_ACCESS_KEY_ID", prefix),
        format!("{}_SECRET_ACCESS_KEY", prefix),
    )
}

/// 取用时解析bucket凭证
fn resolve_credentials(bucket: &str) -> AppResult<(String, String)> {
    let (access_key_var, secret_key_var) = credential_env_keys(bucket);

    let access_key = std::env::var(&access_key_var)
        .map_err(|_| AppError::config(format!("缺少bucket '{}'的凭证: {}", bucket, access_key_var)))?;
    let secret_key = std::env::var(&secret_key_var)
        .map_err(|_| AppError::config(format!("缺少bucket '{}'的凭证: {}", bucket, secret_key_var)))?;

    Ok((access_key, secret_key))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_test_credentials(bucket: &str) {
        let (ak, sk) = credential_env_keys(bucket);
        unsafe {
            std::env::set_var(ak, "test-access-key");
            std::env::set_var(sk, "test-secret-key");
        }
    }

    #[test]
    fn test_env_key_derivation() {
        let (ak, sk) = credential_env_keys("fotofi-photos");
        assert_eq!(ak, "FOTOFI_PHOTOS_ACCESS_KEY_ID");
        assert_eq!(sk, "FOTOFI_PHOTOS_SECRET_ACCESS_KEY");
    }

    #[test]
    fn test_missing_credentials_fails_only_that_bucket() {
        let cache = ClientCache::new(
            "http://localhost:9000".to_string(),
            "auto".to_string(),
            Duration::from_secs(900),
        );

        set_test_credentials("cache-ok-bucket");
        assert!(cache.get("cache-ok-bucket").is_ok());

        let err = cache.get("cache-bucket-without-creds").unwrap_err();
        assert!(matches!(err, AppError::Config(_)));

        // 其他bucket不受影响
        assert!(cache.get("cache-ok-bucket").is_ok());
    }

    #[test]
    fn test_same_client_within_ttl() {
        let cache = ClientCache::new(
            "http://localhost:9000".to_string(),
            "auto".to_string(),
            Duration::from_secs(900),
        );

        set_test_credentials("cache-reuse-bucket");
        let first = cache.get("cache-reuse-bucket").unwrap();
        let second = cache.get("cache-reuse-bucket").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_distinct_client_after_ttl() {
        let cache = ClientCache::new(
            "http://localhost:9000".to_string(),
            "auto".to_string(),
            Duration::from_millis(20),
        );

        set_test_credentials("cache-expire-bucket");
        let first = cache.get("cache-expire-bucket").unwrap();
        std::thread::sleep(Duration::from_millis(50));
        let second = cache.get("cache-expire-bucket").unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_one_client_per_bucket() {
        let cache = ClientCache::new(
            "http://localhost:9000".to_string(),
            "auto".to_string(),
            Duration::from_secs(900),
        );

        set_test_credentials("cache-bucket-a");
        set_test_credentials("cache-bucket-b");
        let a = cache.get("cache-bucket-a").unwrap();
        let b = cache.get("cache-bucket-b").unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }
}
