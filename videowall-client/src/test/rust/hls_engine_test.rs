// Integration tests for the HLS engine against a wiremock origin.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver};
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use videowall_client::domain::ports::{AdaptiveEngine, DisplaySurface, EngineEvent};
use videowall_client::{
    BackoffPolicy, HeadlessSurface, HlsEngine, PlaybackFailure, PlaybackLocator, PlaybackOptions,
};

const VOD: &str = "#EXTM3U
#EXT-X-VERSION:3
#EXT-X-TARGETDURATION:1
#EXT-X-MEDIA-SEQUENCE:0
#EXTINF:1.0,
segment_0.ts
#EXTINF:1.0,
segment_1.ts
#EXTINF:1.0,
segment_2.ts
#EXT-X-ENDLIST
";

const LIVE: &str = "#EXTM3U
#EXT-X-VERSION:3
#EXT-X-TARGETDURATION:1
#EXT-X-MEDIA-SEQUENCE:100
#EXTINF:1.0,
segment_100.ts
#EXTINF:1.0,
segment_101.ts
#EXTINF:1.0,
segment_102.ts
#EXTINF:1.0,
segment_103.ts
#EXTINF:1.0,
segment_104.ts
";

fn options() -> PlaybackOptions {
    PlaybackOptions::new().with_retry_budget(2).with_backoff(
        BackoffPolicy::new(Duration::from_millis(10), Duration::from_millis(40), 2.0).unwrap(),
    )
}

fn attached_surface() -> Arc<HeadlessSurface> {
    let surface = Arc::new(HeadlessSurface::new(false, true));
    surface.attach(Uuid::new_v4()).unwrap();
    surface
}

async fn mount_text(server: &MockServer, at: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn mount_segments(server: &MockServer, prefix: &str, sequences: impl IntoIterator<Item = u64>) {
    for sequence in sequences {
        Mock::given(method("GET"))
            .and(path(format!("{prefix}/segment_{sequence}.ts")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0x47u8; 188]))
            .mount(server)
            .await;
    }
}

fn play(
    server: &MockServer,
    manifest: &str,
    surface: Arc<HeadlessSurface>,
) -> (HlsEngine, UnboundedReceiver<EngineEvent>) {
    let locator = PlaybackLocator::parse(&format!("{}{manifest}", server.uri())).unwrap();
    let (tx, rx) = mpsc::unbounded_channel();
    let mut engine = HlsEngine::new(reqwest::Client::new(), options());
    engine.load(&locator, surface, tx);
    (engine, rx)
}

async fn next_event(events: &mut UnboundedReceiver<EngineEvent>) -> EngineEvent {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("engine event in time")
        .expect("engine still running")
}

#[tokio::test]
async fn test_plays_finished_playlist_through_master() {
    let server = MockServer::start().await;
    mount_text(
        &server,
        "/hls/cam1/stream.m3u8",
        "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360\nlow/index.m3u8\n",
    )
    .await;
    mount_text(&server, "/hls/cam1/low/index.m3u8", VOD).await;
    mount_segments(&server, "/hls/cam1/low", 0..3).await;

    let surface = attached_surface();
    let (_engine, mut events) = play(&server, "/hls/cam1/stream.m3u8", surface.clone());

    assert_eq!(next_event(&mut events).await, EngineEvent::ManifestParsed);
    assert_eq!(next_event(&mut events).await, EngineEvent::Ended);
    assert_eq!(surface.segments_appended(), 3);
    assert_eq!(surface.buffered_segments(), vec![0, 1, 2]);
}

#[tokio::test]
async fn test_live_playlist_starts_at_newest_segment() {
    let server = MockServer::start().await;
    mount_text(&server, "/hls/cam2/stream.m3u8", LIVE).await;
    mount_segments(&server, "/hls/cam2", 100..105).await;

    let surface = attached_surface();
    let (mut engine, mut events) = play(&server, "/hls/cam2/stream.m3u8", surface.clone());

    assert_eq!(next_event(&mut events).await, EngineEvent::ManifestParsed);
    for _ in 0..200 {
        if surface.segments_appended() > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    engine.destroy();

    assert_eq!(surface.buffered_segments(), vec![104]);
}

#[tokio::test]
async fn test_missing_manifest_exhausts_retry_budget() {
    let server = MockServer::start().await;

    let (_engine, mut events) = play(&server, "/hls/gone/stream.m3u8", attached_surface());

    assert_eq!(next_event(&mut events).await, EngineEvent::Buffering);
    assert_eq!(next_event(&mut events).await, EngineEvent::Buffering);
    assert_eq!(
        next_event(&mut events).await,
        EngineEvent::Fatal(PlaybackFailure::RetriesExhausted { attempts: 3 })
    );
}

#[tokio::test]
async fn test_unparseable_manifest_is_fatal_without_retry() {
    let server = MockServer::start().await;
    mount_text(&server, "/hls/cam3/stream.m3u8", "<html>Not Found</html>").await;

    let (_engine, mut events) = play(&server, "/hls/cam3/stream.m3u8", attached_surface());

    assert!(matches!(
        next_event(&mut events).await,
        EngineEvent::Fatal(PlaybackFailure::ManifestInvalid(_))
    ));
}

#[tokio::test]
async fn test_oversized_segment_duration_is_fatal() {
    let server = MockServer::start().await;
    mount_text(
        &server,
        "/hls/cam7/stream.m3u8",
        "#EXTM3U\n#EXT-X-TARGETDURATION:2\n#EXTINF:1e30,\nsegment_0.ts\n",
    )
    .await;

    let (_engine, mut events) = play(&server, "/hls/cam7/stream.m3u8", attached_surface());

    assert!(matches!(
        next_event(&mut events).await,
        EngineEvent::Fatal(PlaybackFailure::ManifestInvalid(_))
    ));
}

/// Serves the live playlist, then fails every other refresh
struct FlakyPlaylist {
    hits: AtomicUsize,
}

impl Respond for FlakyPlaylist {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let hit = self.hits.fetch_add(1, Ordering::SeqCst);
        if hit % 2 == 1 {
            ResponseTemplate::new(503)
        } else {
            ResponseTemplate::new(200).set_body_string(LIVE)
        }
    }
}

#[tokio::test]
async fn test_successful_refresh_resets_retry_count() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/hls/cam8/stream.m3u8"))
        .respond_with(FlakyPlaylist {
            hits: AtomicUsize::new(0),
        })
        .mount(&server)
        .await;
    mount_segments(&server, "/hls/cam8", 100..105).await;

    let (_engine, mut events) = play(&server, "/hls/cam8/stream.m3u8", attached_surface());
    assert_eq!(next_event(&mut events).await, EngineEvent::ManifestParsed);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(4);
    let mut buffering = 0;
    while let Ok(Some(event)) = tokio::time::timeout_at(deadline, events.recv()).await {
        match event {
            EngineEvent::Buffering => buffering += 1,
            EngineEvent::Fatal(failure) => panic!("isolated refresh failures were fatal: {failure}"),
            _ => {}
        }
    }

    assert!(buffering >= 3, "only {buffering} refresh failures observed");
}

#[tokio::test]
async fn test_unknown_container_is_fatal() {
    let server = MockServer::start().await;
    mount_text(
        &server,
        "/hls/cam4/stream.m3u8",
        "#EXTM3U\n#EXT-X-TARGETDURATION:1\n#EXTINF:1.0,\nsegment_0.mkv\n#EXT-X-ENDLIST\n",
    )
    .await;

    let (_engine, mut events) = play(&server, "/hls/cam4/stream.m3u8", attached_surface());

    assert_eq!(next_event(&mut events).await, EngineEvent::ManifestParsed);
    assert_eq!(
        next_event(&mut events).await,
        EngineEvent::Fatal(PlaybackFailure::UnsupportedContainer("segment_0.mkv".to_string()))
    );
}

#[tokio::test]
async fn test_transient_segment_failure_recovers() {
    let server = MockServer::start().await;
    mount_text(&server, "/hls/cam5/stream.m3u8", VOD).await;
    Mock::given(method("GET"))
        .and(path("/hls/cam5/segment_1.ts"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    mount_segments(&server, "/hls/cam5", 0..3).await;

    let surface = attached_surface();
    let (_engine, mut events) = play(&server, "/hls/cam5/stream.m3u8", surface.clone());

    assert_eq!(next_event(&mut events).await, EngineEvent::ManifestParsed);
    assert_eq!(next_event(&mut events).await, EngineEvent::Buffering);
    assert_eq!(next_event(&mut events).await, EngineEvent::Ended);
    assert_eq!(surface.buffered_segments(), vec![0, 1, 2]);
}

#[tokio::test]
async fn test_destroy_stops_fetching() {
    let server = MockServer::start().await;
    mount_text(&server, "/hls/cam6/stream.m3u8", LIVE).await;
    mount_segments(&server, "/hls/cam6", 100..105).await;

    let (mut engine, mut events) = play(&server, "/hls/cam6/stream.m3u8", attached_surface());
    assert_eq!(next_event(&mut events).await, EngineEvent::ManifestParsed);

    engine.destroy();
    engine.destroy();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let seen = server.received_requests().await.unwrap().len();
    tokio::time::sleep(Duration::from_millis(1200)).await;

    assert_eq!(server.received_requests().await.unwrap().len(), seen);
    assert!(events.recv().await.is_none());
}
