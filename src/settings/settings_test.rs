use super::*;
use crate::error::StoreError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn synchronizer(store: Arc<dyn SettingsStore>) -> SettingsSynchronizer {
    SettingsSynchronizer::new(store, Duration::from_secs(5))
}

fn settings(pairs: &[(&str, &str)]) -> SettingsMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

// ========================================
// MEMORY STORE
// ========================================

#[tokio::test]
async fn test_memory_store_missing_key_reads_empty() {
    let store = MemorySettingsStore::new();
    assert_eq!(store.get_setting("api.security.enabled").await.unwrap(), "");
}

#[tokio::test]
async fn test_memory_store_batch_write_and_read() {
    let store = Arc::new(MemorySettingsStore::new());
    let sync = synchronizer(store.clone());

    sync.write_settings(&settings(&[("a", "1"), ("b", "2")]))
        .await
        .unwrap();

    let read = sync.read_settings(&["a", "b", "c"]).await.unwrap();
    assert_eq!(read.get("a").map(String::as_str), Some("1"));
    assert_eq!(read.get("b").map(String::as_str), Some("2"));
    assert_eq!(read.get("c").map(String::as_str), Some(""));
}

#[tokio::test]
async fn test_memory_store_rejected_batch_writes_nothing() {
    let store = Arc::new(MemorySettingsStore::with_settings(settings(&[("a", "old")])));
    store.set_reject_writes(true);

    let result = synchronizer(store.clone())
        .write_settings(&settings(&[("a", "new"), ("b", "2")]))
        .await;

    assert!(matches!(
        result,
        Err(AuthBridgeError::Store(StoreError::Write { .. }))
    ));
    assert_eq!(store.value("a").as_deref(), Some("old"));
    assert!(store.value("b").is_none());
}

#[tokio::test]
async fn test_read_failure_aborts() {
    let store = Arc::new(MemorySettingsStore::new());
    store.set_reject_reads(true);

    let result = synchronizer(store).read_settings(&["a"]).await;
    assert!(matches!(
        result,
        Err(AuthBridgeError::Store(StoreError::Read { .. }))
    ));
}

struct SlowStore;

#[async_trait]
impl SettingsStore for SlowStore {
    async fn get_setting(&self, _key: &str) -> Result<String> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(String::new())
    }

    async fn update_setting(&self, _key: &str, _value: &str) -> Result<()> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(())
    }
}

#[tokio::test]
async fn test_slow_store_times_out() {
    let sync = SettingsSynchronizer::new(Arc::new(SlowStore), Duration::from_millis(20));

    let read = sync.read_settings(&["a"]).await;
    assert!(matches!(read, Err(AuthBridgeError::Timeout(_))));

    let write = sync.write_settings(&settings(&[("a", "1")])).await;
    assert!(matches!(write, Err(AuthBridgeError::Timeout(_))));
}

// ========================================
// STORE FACTORY
// ========================================

#[test]
fn test_create_store_from_config() {
    let memory = SettingsStoreConfig::default();
    assert!(create_store_from_config(&memory).is_ok());

    let http_without_url = SettingsStoreConfig {
        driver: "http".to_string(),
        ..Default::default()
    };
    assert!(matches!(
        create_store_from_config(&http_without_url),
        Err(AuthBridgeError::Config(_))
    ));

    let unknown = SettingsStoreConfig {
        driver: "etcd".to_string(),
        ..Default::default()
    };
    assert!(create_store_from_config(&unknown).is_err());
}

// ========================================
// HTTP STORE
// ========================================

#[tokio::test]
async fn test_http_store_reads_active_value() {
    let mock_server = MockServer::start().await;
    let credentials = format!("Basic {}", STANDARD.encode("ak:sk"));

    Mock::given(method("GET"))
        .and(path("/v1/settings/api.security.enabled"))
        .and(header("authorization", credentials.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "api.security.enabled",
            "activeValue": "true",
            "value": "false"
        })))
        .mount(&mock_server)
        .await;

    let store = HttpSettingsStore::new(
        &format!("{}/v1/", mock_server.uri()),
        Some("ak".to_string()),
        Some("sk".to_string()),
    )
    .unwrap();

    assert_eq!(store.get_setting("api.security.enabled").await.unwrap(), "true");
}

#[tokio::test]
async fn test_http_store_not_found_reads_empty() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/settings/api.auth.provider.configured"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let store = HttpSettingsStore::new(&mock_server.uri(), None, None).unwrap();
    assert_eq!(
        store.get_setting("api.auth.provider.configured").await.unwrap(),
        ""
    );
}

#[tokio::test]
async fn test_http_store_server_error_is_read_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/settings/broken"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&mock_server)
        .await;

    let store = HttpSettingsStore::new(&mock_server.uri(), None, None).unwrap();
    let result = store.get_setting("broken").await;
    assert!(matches!(
        result,
        Err(AuthBridgeError::Store(StoreError::Read { .. }))
    ));
}

#[tokio::test]
async fn test_http_store_writes_each_key() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/settings/a"))
        .and(body_json(serde_json::json!({"value": "1"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/settings/b"))
        .and(body_json(serde_json::json!({"value": "2"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = HttpSettingsStore::new(&mock_server.uri(), None, None).unwrap();
    synchronizer(Arc::new(store))
        .write_settings(&settings(&[("a", "1"), ("b", "2")]))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_http_store_write_failure_stops_batch() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/settings/a"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/settings/b"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let store = HttpSettingsStore::new(&mock_server.uri(), None, None).unwrap();
    let result = synchronizer(Arc::new(store))
        .write_settings(&settings(&[("a", "1"), ("b", "2")]))
        .await;

    assert!(matches!(
        result,
        Err(AuthBridgeError::Store(StoreError::Write { .. }))
    ));
}
