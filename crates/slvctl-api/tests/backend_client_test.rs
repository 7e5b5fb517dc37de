// Integration tests for `BackendClient` using wiremock.

use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use slvctl_api::transport::{FRONTEND_VERSION, FRONTEND_VERSION_HEADER};
use slvctl_api::{AutomationScript, BackendClient, Error, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, BackendClient) {
    let server = MockServer::start().await;
    let client = BackendClient::new(
        Url::parse(&server.uri()).unwrap(),
        &TransportConfig::default(),
    )
    .unwrap();
    (server, client)
}

// ── Devices ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_list_devices() {
    let (server, client) = setup().await;

    let body = json!({
        "items": [
            {
                "deviceId": "et312-1",
                "deviceName": "ET312",
                "deviceModel": "ET312B",
                "type": "serial",
                "state": "READY",
                "connectedSince": "2024-05-01T10:00:00Z",
                "lastRefresh": "2024-05-01T10:00:05Z",
                "attributes": {
                    "levelA": {
                        "name": "levelA", "type": "range", "modifier": "rw",
                        "min": 0, "max": 99, "incrementStep": 1, "value": 10
                    }
                }
            },
            { "deviceId": "tts-1", "deviceName": "TTS", "type": "virtual", "attributes": {} }
        ]
    });

    Mock::given(method("GET"))
        .and(path("/devices"))
        .and(header(FRONTEND_VERSION_HEADER, FRONTEND_VERSION))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .expect(1)
        .mount(&server)
        .await;

    let devices = client.list_devices().await.unwrap();

    assert_eq!(devices.len(), 2);
    assert_eq!(devices[0].device_id, "et312-1");
    assert_eq!(devices[0].state.as_deref(), Some("READY"));
    assert_eq!(devices[0].attributes["levelA"]["value"], 10);
    assert_eq!(devices[1].device_type.as_deref(), Some("virtual"));
}

#[tokio::test]
async fn test_list_devices_without_items_is_empty() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    assert!(client.list_devices().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_malformed_body_is_deserialization_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy</html>"))
        .mount(&server)
        .await;

    let err = client.list_devices().await.unwrap_err();
    match err {
        Error::Deserialization { body, .. } => assert!(body.contains("proxy")),
        other => panic!("expected Deserialization, got {other:?}"),
    }
}

// ── Error mapping ───────────────────────────────────────────────────

#[tokio::test]
async fn test_not_found_maps_to_http_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/automation/scripts/missing.js"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = client.get_script("missing.js").await.unwrap_err();
    assert!(err.is_not_found());
    match err {
        Error::Http { status, status_text } => {
            assert_eq!(status, 404);
            assert_eq!(status_text, "Not Found");
        }
        other => panic!("expected Http, got {other:?}"),
    }
}

#[tokio::test]
async fn test_server_error_is_transient() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = client.health().await.unwrap_err();
    assert!(err.is_transient());
}

// ── Settings ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_settings_round_trip() {
    let (server, client) = setup().await;

    let settings = json!({ "serverPort": 1337, "logLevel": "info" });

    Mock::given(method("GET"))
        .and(path("/settings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&settings))
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/settings"))
        .and(header(FRONTEND_VERSION_HEADER, FRONTEND_VERSION))
        .and(body_json(&settings))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let fetched = client.get_settings().await.unwrap();
    assert_eq!(fetched, settings);
    client.save_settings(&fetched).await.unwrap();
}

#[tokio::test]
async fn test_settings_validation_errors() {
    let (server, client) = setup().await;

    Mock::given(method("PUT"))
        .and(path("/settings"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "errors": [
                { "property": "serverPort", "message": "must be a positive number" },
                { "property": "logLevel", "message": "unknown level" }
            ]
        })))
        .mount(&server)
        .await;

    let err = client
        .save_settings(&json!({ "serverPort": -1 }))
        .await
        .unwrap_err();

    let errors = err.field_errors().unwrap();
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0].field, "serverPort");
    assert_eq!(errors[1].message, "unknown level");
}

#[tokio::test]
async fn test_bad_request_without_field_errors_is_http() {
    let (server, client) = setup().await;

    Mock::given(method("PUT"))
        .and(path("/settings"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad"))
        .mount(&server)
        .await;

    let err = client.save_settings(&json!({})).await.unwrap_err();
    assert!(matches!(err, Error::Http { status: 400, .. }));
}

// ── Automation scripts ──────────────────────────────────────────────

#[tokio::test]
async fn test_script_crud() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/automation/scripts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{ "name": "blink.js" }, { "name": "pulse.js" }]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/automation/scripts/blink.js"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "blink.js",
            "code": "log('hi');"
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/automation/scripts"))
        .and(body_json(json!({ "name": "new.js", "code": "1;" })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/automation/scripts/blink.js"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/automation/scripts/pulse.js"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let names: Vec<_> = client
        .list_scripts()
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.name)
        .collect();
    assert_eq!(names, ["blink.js", "pulse.js"]);

    let mut blink = client.get_script("blink.js").await.unwrap();
    assert_eq!(blink.code.as_deref(), Some("log('hi');"));

    client
        .create_script(&AutomationScript::new("new.js", "1;"))
        .await
        .unwrap();

    blink.code = Some("log('bye');".into());
    client.update_script(&blink).await.unwrap();

    client.delete_script("pulse.js").await.unwrap();
}

// ── Health ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_health() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "process": {
                "memoryUsage": { "rss": 73_400_320, "heapTotal": 31_457_280, "heapUsed": 20_971_520, "external": 1024 }
            },
            "system": {
                "cpu": { "usage": 12.5, "model": "ARM Cortex-A72" },
                "memory": {
                    "totalMemMb": 3792.0, "usedMemMb": 1024.0, "freeMemMb": 2768.0,
                    "usedMemPercentage": 27.0, "freeMemPercentage": 73.0
                },
                "os": { "name": "Linux" },
                "uptime": 3600.0,
                "hostname": "slvctrl",
                "ip": "192.168.1.20"
            }
        })))
        .mount(&server)
        .await;

    let info = client.health().await.unwrap();
    assert_eq!(info.process.memory_usage.rss, 73_400_320);
    assert!((info.system.cpu.usage - 12.5).abs() < f64::EPSILON);
    assert_eq!(info.system.hostname, "slvctrl");
    assert_eq!(info.system.os.name, "Linux");
}

// ── Base path ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_base_url_path_prefix_is_kept() {
    let server = MockServer::start().await;
    let client = BackendClient::new(
        Url::parse(&format!("{}/slv/", server.uri())).unwrap(),
        &TransportConfig::default(),
    )
    .unwrap();

    Mock::given(method("GET"))
        .and(path("/slv/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [] })))
        .expect(1)
        .mount(&server)
        .await;

    assert!(client.list_devices().await.unwrap().is_empty());
}
