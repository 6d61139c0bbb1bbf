use actix_web::{test, web, App};
use interlock::handlers;
use interlock::models::{ApiResponse, LockState};
use interlock::{EndpointPool, LockClient, MemoryStore, Store};
use serde_json::{json, Value};
use std::io;
use std::sync::Arc;
use std::time::Duration;

fn memory_client(stores: &[Arc<MemoryStore>]) -> web::Data<LockClient> {
    let pool = EndpointPool::new(stores.iter().map(|s| s.clone() as Arc<dyn Store>).collect()).unwrap();
    web::Data::new(LockClient::new(pool, Duration::from_secs(60)))
}

macro_rules! post {
    ($app:expr, $uri:expr, $body:expr) => {{
        let req = test::TestRequest::post().uri($uri).set_json($body).to_request();
        test::call_and_read_body_json($app, req).await
    }};
}

#[actix_rt::test]
async fn lock_lifecycle_over_http() {
    let _ = env_logger::builder().is_test(true).try_init();
    let client = memory_client(&[Arc::new(MemoryStore::new("mem-0"))]);
    let app = test::init_service(App::new().app_data(client).configure(handlers::configure)).await;
    let key = json!({"job": 42});

    let resp: ApiResponse<Value> = post!(&app, "/api/lock/acquire", &json!({"key": key}));
    assert!(resp.success);

    let resp: ApiResponse<Value> = post!(&app, "/api/lock/acquire", &json!({"key": key, "lifetime_secs": 5}));
    assert!(!resp.success);
    assert_eq!(resp.code, 1001);

    let resp: ApiResponse<LockState> = post!(&app, "/api/lock/check", &json!({"key": key}));
    assert!(resp.data.unwrap().locked);

    let resp: ApiResponse<Value> = post!(&app, "/api/lock/extend", &json!({"key": key, "lifetime_secs": 120}));
    assert!(resp.success);

    let resp: ApiResponse<Value> = post!(&app, "/api/lock/release", &json!({"key": key}));
    assert!(resp.success);

    let resp: ApiResponse<LockState> = post!(&app, "/api/lock/check", &json!({"key": key}));
    assert!(!resp.data.unwrap().locked);

    let resp: ApiResponse<Value> = post!(&app, "/api/lock/extend", &json!({"key": key}));
    assert_eq!(resp.code, 2001);
}

#[actix_rt::test]
async fn outage_is_reported_but_check_fails_open() {
    let store = Arc::new(MemoryStore::new("mem-0"));
    let client = memory_client(&[store.clone()]);
    let app = test::init_service(App::new().app_data(client).configure(handlers::configure)).await;
    store.fail_with(Some(io::ErrorKind::ConnectionRefused));

    let resp: ApiResponse<Value> = post!(&app, "/api/lock/acquire", &json!({"key": "job-42"}));
    assert_eq!(resp.code, 1004);

    let resp: ApiResponse<Value> = post!(&app, "/api/lock/release", &json!({"key": "job-42"}));
    assert_eq!(resp.code, 3002);

    let resp: ApiResponse<LockState> = post!(&app, "/api/lock/check", &json!({"key": "job-42"}));
    assert!(resp.success);
    assert!(!resp.data.unwrap().locked);
}

#[actix_rt::test]
async fn requests_fail_over_to_healthy_endpoint() {
    let down = Arc::new(MemoryStore::new("down"));
    let up = Arc::new(MemoryStore::new("up"));
    down.fail_with(Some(io::ErrorKind::TimedOut));
    let client = memory_client(&[down.clone(), up.clone()]);
    let app = test::init_service(App::new().app_data(client.clone()).configure(handlers::configure)).await;

    let resp: ApiResponse<Value> = post!(&app, "/api/lock/acquire", &json!({"key": "job-42"}));
    assert!(resp.success);
    assert_eq!(client.active_endpoint().await, "up");

    // the broken endpoint is not retried while the healthy one answers
    let resp: ApiResponse<LockState> = post!(&app, "/api/lock/check", &json!({"key": "job-42"}));
    assert!(resp.data.unwrap().locked);
    assert_eq!(down.calls(), 1);
}

#[actix_rt::test]
async fn out_of_range_lifetime_is_an_error_response() {
    let store = Arc::new(MemoryStore::new("mem-0"));
    let client = memory_client(&[store]);
    let app = test::init_service(App::new().app_data(client).configure(handlers::configure)).await;

    let body = json!({"key": "k", "lifetime_secs": 9_000_000_000_000u64});
    let resp: ApiResponse<Value> = post!(&app, "/api/lock/acquire", &body);
    assert_eq!(resp.code, 1004);

    let resp: ApiResponse<LockState> = post!(&app, "/api/lock/check", &json!({"key": "k"}));
    assert!(!resp.data.unwrap().locked);
}
