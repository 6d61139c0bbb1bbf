use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Context;
use interlock::config::{Config, StorageType};
use interlock::{handlers, EndpointPool, LockClient, MemoryStore, Store};
use log::info;
use std::sync::Arc;
use std::time::Duration;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    // 加载配置
    let config = Config::from_env();
    info!(
        "Starting interlock with storage: {:?}, lifetime: {}s",
        config.storage_type, config.lock_lifetime
    );

    // 创建锁客户端
    let client = match config.storage_type {
        StorageType::Memory => {
            info!("Using memory storage");
            let memory_store = Arc::new(MemoryStore::new("memory"));

            // 定期清理过期记录
            let sweep_store = memory_store.clone();
            let cleanup_interval = config.memory_cleanup_interval.max(1);
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs(cleanup_interval));
                loop {
                    interval.tick().await;
                    sweep_store.cleanup_expired();
                }
            });

            let pool = EndpointPool::new(vec![memory_store as Arc<dyn Store>])?;
            LockClient::new(pool, config.lifetime())
        }
        StorageType::Redis => {
            let url = config.store_url().context("Invalid redis configuration")?;
            info!("Using Redis storage with endpoints: {:?}", url.endpoints);
            if config.redis_order_by_latency {
                LockClient::connect_by_latency(&url, config.lifetime())
                    .await
                    .context("Failed to build redis endpoint pool")?
            } else {
                LockClient::from_store_url(&url, config.lifetime()).context("Failed to create redis client")?
            }
        }
    };
    let client = web::Data::new(client.with_prefix(config.lock_key_prefix.clone()));
    info!("Active endpoint: {}", client.active_endpoint().await);

    let bind_addr = format!("{}:{}", config.server_host, config.server_port);
    info!("Server starting on http://{}", bind_addr);
    info!("Swagger UI available at http://{}/swagger-ui/", bind_addr);

    // 启动 HTTP 服务
    HttpServer::new(move || {
        let openapi = handlers::ApiDoc::openapi();

        App::new()
            .wrap(Logger::default())
            .app_data(client.clone())
            .service(SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", openapi.clone()))
            .configure(handlers::configure)
    })
    .bind(&bind_addr)
    .with_context(|| format!("Failed to bind {}", bind_addr))?
    .run()
    .await?;

    Ok(())
}
