// Integration tests for `HttpStreamBackend` using wiremock.

use std::time::Duration;

use chrono::{DateTime, Timelike, Utc};
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use videowall_client::domain::ports::StreamBackend;
use videowall_client::{DeviceId, DomainError, HttpStreamBackend, StreamRequest};

async fn setup() -> (MockServer, HttpStreamBackend) {
    let server = MockServer::start().await;
    let backend = HttpStreamBackend::new(
        Url::parse(&server.uri()).unwrap(),
        Some("secret"),
        Duration::from_secs(5),
    )
    .unwrap();
    (server, backend)
}

fn request(device_id: u64) -> StreamRequest {
    StreamRequest::new(DeviceId(device_id))
}

#[tokio::test]
async fn test_start_stream_resolves_relative_playlist() {
    let (server, backend) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/streams/start"))
        .and(header("authorization", "Bearer secret"))
        .and(body_json(json!({
            "device_id": 4,
            "channel": 2,
            "sub_stream": 1,
            "duration": 600
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "stream_id": "a1b2",
            "playlist_url": "/hls/a1b2/stream.m3u8",
            "device_name": "Lobby NVR",
            "status": "started"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let request = request(4)
        .with_channel(2)
        .unwrap()
        .with_sub_stream(1)
        .unwrap()
        .with_duration_hint(Duration::from_secs(600))
        .unwrap();
    let session = backend.start_stream(&request).await.unwrap();

    assert_eq!(session.id(), "a1b2");
    assert_eq!(session.device_id(), DeviceId(4));
    assert_eq!(session.channel(), Some(2));
    assert_eq!(session.device_name(), Some("Lobby NVR"));
    assert_eq!(
        session.locator().as_str(),
        format!("{}/hls/a1b2/stream.m3u8", server.uri())
    );
}

#[tokio::test]
async fn test_start_stream_surfaces_backend_detail() {
    let (server, backend) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/streams/start"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({ "detail": "Dispositivo no encontrado" })),
        )
        .mount(&server)
        .await;

    let err = backend.start_stream(&request(99)).await.unwrap_err();

    match err {
        DomainError::Backend { status, reason } => {
            assert_eq!(status, 404);
            assert_eq!(reason, "Dispositivo no encontrado");
        }
        other => panic!("expected backend error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_start_stream_reports_validation_errors() {
    let (server, backend) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/streams/start"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "detail": [
                { "loc": ["body", "duration"], "msg": "ensure this value is greater than or equal to 60", "type": "value_error" }
            ]
        })))
        .mount(&server)
        .await;

    let err = backend.start_stream(&request(1)).await.unwrap_err();

    assert!(matches!(
        err,
        DomainError::Backend { status: 422, ref reason } if reason.contains("greater than or equal to 60")
    ));
}

#[tokio::test]
async fn test_start_stream_rejects_malformed_response() {
    let (server, backend) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/streams/start"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
        .mount(&server)
        .await;

    let err = backend.start_stream(&request(1)).await.unwrap_err();
    assert!(matches!(err, DomainError::Decode(_)));
}

#[tokio::test]
async fn test_stop_stream_posts_session_id() {
    let (server, backend) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/streams/stop"))
        .and(body_json(json!({ "stream_id": "a1b2" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "stopped" })))
        .expect(1)
        .mount(&server)
        .await;

    backend.stop_stream("a1b2").await.unwrap();
}

#[tokio::test]
async fn test_stop_of_unknown_session_counts_as_stopped() {
    let (server, backend) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/streams/stop"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "detail": "Stream no encontrado" })))
        .mount(&server)
        .await;

    assert!(backend.stop_stream("gone").await.is_ok());
}

#[tokio::test]
async fn test_stop_failure_is_an_error() {
    let (server, backend) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/streams/stop"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&server)
        .await;

    let err = backend.stop_stream("a1b2").await.unwrap_err();
    assert!(matches!(err, DomainError::Backend { status: 500, .. }));
}

#[tokio::test]
async fn test_bulk_start_maps_results_per_device() {
    let (server, backend) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/streams/bulk/start"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                { "device_id": 2, "status": "error", "message": "Dispositivo inactivo" },
                { "device_id": 1, "status": "success", "stream_id": "s1", "playlist_url": "/hls/s1/stream.m3u8" }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let items = backend.bulk_start(&[request(1), request(2)]).await.unwrap();

    assert_eq!(items.len(), 2);
    let first = items.iter().find(|i| i.device_id == DeviceId(1)).unwrap();
    let session = first.outcome.as_ref().unwrap();
    assert_eq!(session.id(), "s1");
    assert!(session.locator().as_str().ends_with("/hls/s1/stream.m3u8"));

    let second = items.iter().find(|i| i.device_id == DeviceId(2)).unwrap();
    assert_eq!(second.outcome.as_ref().unwrap_err(), "Dispositivo inactivo");
}

#[tokio::test]
async fn test_bulk_stop_reports_each_session() {
    let (server, backend) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/streams/bulk/stop"))
        .and(body_json(json!(["s1", "s2"])))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                { "stream_id": "s1", "status": "success" },
                { "stream_id": "s2", "status": "error", "message": "Stream no encontrado" }
            ]
        })))
        .mount(&server)
        .await;

    let items = backend
        .bulk_stop(&["s1".to_string(), "s2".to_string()])
        .await
        .unwrap();

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].session_id, "s1");
    assert!(items[0].outcome.is_ok());
    assert_eq!(items[1].outcome, Err("Stream no encontrado".to_string()));
}

#[tokio::test]
async fn test_active_streams_parses_registry() {
    let (server, backend) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/streams/active"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "streams": {
                "abc": {
                    "playlist_url": "/hls/abc/stream.m3u8",
                    "started_at": "2024-05-01T12:00:00.123456",
                    "duration": 3600,
                    "device_id": 3,
                    "channel": 1,
                    "sub_stream": 0
                },
                "xyz": {
                    "playlist_url": "/hls/xyz/stream.m3u8"
                },
                "broken": {
                    "playlist_url": "rtsp://10.0.0.5/stream"
                }
            },
            "count": 3
        })))
        .mount(&server)
        .await;

    let mut streams = backend.active_streams().await.unwrap();
    streams.sort_by(|a, b| a.session_id.cmp(&b.session_id));

    assert_eq!(streams.len(), 2);
    let abc = &streams[0];
    assert_eq!(abc.session_id, "abc");
    assert_eq!(abc.device_id, Some(DeviceId(3)));
    assert_eq!(abc.channel, Some(1));
    assert_eq!(abc.duration, Duration::from_secs(3600));
    assert_eq!(abc.started_at.hour(), 12);
    assert!(abc.locator.as_str().ends_with("/hls/abc/stream.m3u8"));

    let xyz = &streams[1];
    assert_eq!(xyz.device_id, None);
    assert_eq!(xyz.started_at, DateTime::<Utc>::MIN_UTC);
}

#[tokio::test]
async fn test_devices_fill_defaults() {
    let (server, backend) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 1, "name": "NVR Lobby", "brand": "hikvision", "ip": "10.0.0.5", "port": 8000, "channels": 32, "is_active": true },
            { "id": 2, "name": "Parking" }
        ])))
        .mount(&server)
        .await;

    let devices = backend.devices().await.unwrap();

    assert_eq!(devices.len(), 2);
    assert_eq!(devices[0].brand(), "hikvision");
    assert_eq!(devices[0].channels(), 32);
    assert_eq!(devices[1].id(), DeviceId(2));
    assert_eq!(devices[1].channels(), 16);
    assert!(devices[1].is_active());
}

#[tokio::test]
async fn test_base_url_path_prefix_is_kept() {
    let server = MockServer::start().await;
    let backend = HttpStreamBackend::with_client(
        reqwest::Client::new(),
        Url::parse(&format!("{}/vms", server.uri())).unwrap(),
    );

    Mock::given(method("GET"))
        .and(path("/vms/api/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    assert!(backend.devices().await.unwrap().is_empty());
    assert!(backend.base_url().as_str().ends_with("/vms/"));
}

#[tokio::test]
async fn test_unreachable_backend_is_transport_error() {
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let backend = HttpStreamBackend::new(
        Url::parse(&format!("http://127.0.0.1:{port}")).unwrap(),
        None,
        Duration::from_secs(2),
    )
    .unwrap();

    let err = backend.active_streams().await.unwrap_err();
    assert!(matches!(err, DomainError::Transport(_)));
}
