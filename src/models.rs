use serde::{Deserialize, Serialize};
use std::time::Duration;
use utoipa::ToSchema;

/// 申请锁 / 续期请求
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct LockRequest {
    /// Any JSON value; equal values name the same lock.
    #[schema(value_type = Object)]
    pub key: serde_json::Value,
    /// Falls back to the service default when absent.
    #[schema(example = 60)]
    pub lifetime_secs: Option<u64>, // 秒
}

impl LockRequest {
    pub fn lifetime(&self) -> Option<Duration> {
        self.lifetime_secs.map(Duration::from_secs)
    }
}

/// 查询 / 释放锁请求
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct KeyRequest {
    #[schema(value_type = Object)]
    pub key: serde_json::Value,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct LockState {
    pub locked: bool,
}

/// 统一响应结构
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub message: String,
    pub data: Option<T>,
    pub success: bool,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: 0,
            message: "success".to_string(),
            data: Some(data),
            success: true,
        }
    }

    pub fn error(code: i32, message: String) -> Self {
        Self {
            code,
            message,
            data: None,
            success: false,
        }
    }
}
