use scrobble_relay_lastfm::{
    HttpScrobbleClient, NowPlayingUpdate, ScrobbleError, ScrobbleService, ScrobbleSubmission,
};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> HttpScrobbleClient {
    HttpScrobbleClient::new(server.uri(), "key", "session").expect("client")
}

fn submission() -> ScrobbleSubmission {
    ScrobbleSubmission {
        artist: "Pink Floyd".to_string(),
        album_artist: "Pink Floyd".to_string(),
        track: "Time".to_string(),
        album: "The Dark Side of the Moon".to_string(),
        duration: 413,
        timestamp: 1_736_950_000,
        track_number: 4,
        external_track_id: String::new(),
    }
}

#[tokio::test]
async fn submits_completion_with_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/track/scrobble"))
        .and(header("x-api-key", "key"))
        .and(body_json(submission()))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "ok"})))
        .expect(1)
        .mount(&server)
        .await;

    client(&server).submit_completion(&submission()).await.unwrap();
}

#[tokio::test]
async fn server_error_maps_to_service_variant() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/track/now-playing"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let err = client(&server)
        .update_now_playing(&NowPlayingUpdate {
            artist: "Pink Floyd".to_string(),
            album_artist: "Pink Floyd".to_string(),
            track: "Time".to_string(),
            album: "The Dark Side of the Moon".to_string(),
            duration: 413,
        })
        .await
        .unwrap_err();

    match err {
        ScrobbleError::Service { status, message } => {
            assert_eq!(status, 503);
            assert_eq!(message, "maintenance");
        }
        other => panic!("expected service error, got {other}"),
    }
}

#[tokio::test]
async fn parses_loved_flag() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/track/love"))
        .and(query_param("artist", "Pink Floyd"))
        .and(query_param("track", "Mother"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"loved": true})))
        .mount(&server)
        .await;

    assert!(client(&server)
        .query_favorite("Pink Floyd", "Mother")
        .await
        .unwrap());
}

#[tokio::test]
async fn sets_favorite() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/track/love"))
        .and(body_json(serde_json::json!({
            "artist": "Pink Floyd",
            "track": "Time",
            "loved": true,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "ok"})))
        .expect(1)
        .mount(&server)
        .await;

    client(&server)
        .set_favorite("Pink Floyd", "Time", true)
        .await
        .unwrap();
}
