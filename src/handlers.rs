use crate::client::LockClient;
use crate::error::LockError;
use crate::models::{ApiResponse, KeyRequest, LockRequest, LockState};
use actix_web::{web, HttpResponse};
use log::{error, info};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        acquire_lock,
        check_lock,
        release_lock,
        extend_lock
    ),
    components(
        schemas(
            LockRequest,
            KeyRequest,
            LockState,
            ApiResponse<LockState>,
            ApiResponse<serde_json::Value>,
        )
    ),
    tags(
        (name = "lock", description = "分布式锁接口")
    ),
    info(
        title = "interlock API",
        version = "0.1.0",
        description = "提供分布式锁的申请、查询、释放和续期功能",
    )
)]
pub struct ApiDoc;

/// Registers the lock routes; shared by `main` and the HTTP tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/lock/acquire", web::post().to(acquire_lock))
        .route("/api/lock/check", web::post().to(check_lock))
        .route("/api/lock/release", web::post().to(release_lock))
        .route("/api/lock/extend", web::post().to(extend_lock));
}

/// 申请锁接口
#[utoipa::path(
    post,
    path = "/api/lock/acquire",
    tag = "lock",
    request_body = LockRequest,
    responses(
        (status = 200, description = "申请锁成功", body = ApiResponse<serde_json::Value>),
        (status = 200, description = "锁已被占用", body = ApiResponse<serde_json::Value>)
    )
)]
pub async fn acquire_lock(client: web::Data<LockClient>, req: web::Json<LockRequest>) -> HttpResponse {
    info!("[ACQUIRE] Attempting to acquire lock - key: {}, lifetime: {:?}", req.key, req.lifetime());

    match client.try_lock(&req.key, req.lifetime()).await {
        Ok(()) => {
            info!("[ACQUIRE SUCCESS] Lock acquired - key: {}", req.key);
            HttpResponse::Ok().json(ApiResponse::success(serde_json::json!({
                "acquired": true
            })))
        }
        Err(LockError::LockFailed) => {
            info!("[ACQUIRE FAILED] Lock already held - key: {}", req.key);
            HttpResponse::Ok().json(ApiResponse::<serde_json::Value>::error(
                1001,
                "Lock already held".to_string(),
            ))
        }
        Err(LockError::InvalidKey(e)) => HttpResponse::Ok().json(ApiResponse::<serde_json::Value>::error(
            1002,
            format!("Invalid lock key: {}", e),
        )),
        Err(e) => {
            error!("Failed to acquire lock: {}", e);
            HttpResponse::Ok().json(ApiResponse::<serde_json::Value>::error(
                1004,
                format!("Failed to acquire lock: {}", e),
            ))
        }
    }
}

/// 查询锁状态接口（存储不可用时返回未锁定）
#[utoipa::path(
    post,
    path = "/api/lock/check",
    tag = "lock",
    request_body = KeyRequest,
    responses(
        (status = 200, description = "锁状态", body = ApiResponse<LockState>)
    )
)]
pub async fn check_lock(client: web::Data<LockClient>, req: web::Json<KeyRequest>) -> HttpResponse {
    let locked = client.is_locked(&req.key).await;
    info!("Check request: key={}, locked={}", req.key, locked);
    HttpResponse::Ok().json(ApiResponse::success(LockState { locked }))
}

/// 释放锁接口
#[utoipa::path(
    post,
    path = "/api/lock/release",
    tag = "lock",
    request_body = KeyRequest,
    responses(
        (status = 200, description = "释放锁成功", body = ApiResponse<serde_json::Value>),
        (status = 200, description = "存储不可用", body = ApiResponse<serde_json::Value>)
    )
)]
pub async fn release_lock(client: web::Data<LockClient>, req: web::Json<KeyRequest>) -> HttpResponse {
    info!("[RELEASE] Attempting to release lock - key: {}", req.key);

    match client.unlock(&req.key).await {
        Ok(()) => {
            info!("[RELEASE SUCCESS] Lock released - key: {}", req.key);
            HttpResponse::Ok().json(ApiResponse::success(serde_json::json!({
                "released": true
            })))
        }
        Err(LockError::InvalidKey(e)) => HttpResponse::Ok().json(ApiResponse::<serde_json::Value>::error(
            3001,
            format!("Invalid lock key: {}", e),
        )),
        Err(e) => {
            error!("Failed to release lock: {}", e);
            HttpResponse::Ok().json(ApiResponse::<serde_json::Value>::error(
                3002,
                format!("Failed to release lock: {}", e),
            ))
        }
    }
}

/// 续期接口
#[utoipa::path(
    post,
    path = "/api/lock/extend",
    tag = "lock",
    request_body = LockRequest,
    responses(
        (status = 200, description = "续期成功", body = ApiResponse<serde_json::Value>),
        (status = 200, description = "锁不存在或已过期", body = ApiResponse<serde_json::Value>)
    )
)]
pub async fn extend_lock(client: web::Data<LockClient>, req: web::Json<LockRequest>) -> HttpResponse {
    info!("[EXTEND] Extend request: key={}, lifetime={:?}", req.key, req.lifetime());

    match client.expire(&req.key, req.lifetime()).await {
        Ok(()) => {
            info!("[EXTEND SUCCESS] Lock extended: {}", req.key);
            HttpResponse::Ok().json(ApiResponse::success(serde_json::json!({
                "extended": true
            })))
        }
        Err(LockError::LockDoesNotExist) => {
            info!("Lock not found or expired: {}", req.key);
            HttpResponse::Ok().json(ApiResponse::<serde_json::Value>::error(
                2001,
                "Lock not found or expired".to_string(),
            ))
        }
        Err(e) => {
            error!("Failed to extend lock: {}", e);
            HttpResponse::Ok().json(ApiResponse::<serde_json::Value>::error(
                2002,
                format!("Failed to extend lock: {}", e),
            ))
        }
    }
}
