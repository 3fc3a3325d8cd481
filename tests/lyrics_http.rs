use lyricbar::config::LyricsConfig;
use lyricbar::display::{LyricsView, FAILURE_HTML};
use lyricbar::{DisplayUpdater, LrclibClient, LyricsError, LyricsLookup, LyricsQuery, SongSnapshot};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Minimal HTTP stub answering by track name, recording request targets
async fn stub_server() -> (String, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&requests);

    tokio::spawn(async move {
        loop {
            let (mut stream, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => return,
            };
            let seen = Arc::clone(&seen);

            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut chunk).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => buf.extend_from_slice(&chunk[..n]),
                    }
                }

                let head = String::from_utf8_lossy(&buf).to_string();
                let target = head
                    .lines()
                    .next()
                    .and_then(|line| line.split_whitespace().nth(1))
                    .unwrap_or_default()
                    .to_string();
                seen.lock().unwrap().push(target.clone());

                let (status, body) = if target.contains("track_name=Missing") {
                    ("404 Not Found", r#"{"code":404,"message":"Failed to find specified track"}"#)
                } else if target.contains("track_name=Broken") {
                    ("500 Internal Server Error", "oops")
                } else if target.contains("track_name=Garbled") {
                    ("200 OK", "not json")
                } else if target.contains("track_name=Instrumental") {
                    ("200 OK", r#"{"id":2,"plainLyrics":null,"syncedLyrics":null}"#)
                } else {
                    ("200 OK", r#"{"id":1,"plainLyrics":"first line\nsecond line","syncedLyrics":"[00:01.00] first line"}"#)
                };

                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });

    (format!("http://{}/api/get", addr), requests)
}

async fn client() -> (LrclibClient, LyricsConfig, Arc<Mutex<Vec<String>>>) {
    let (base_url, requests) = stub_server().await;
    let config = LyricsConfig {
        base_url,
        timeout_seconds: Some(5),
        ..LyricsConfig::default()
    };
    (LrclibClient::new(&config).unwrap(), config, requests)
}

#[tokio::test]
async fn found_lyrics_are_decoded() {
    let (client, _, requests) = client().await;
    let record = client
        .lookup(&LyricsQuery::new("Song", "Artist", Some("Album")))
        .await
        .unwrap();

    assert_eq!(record.plain_lyrics.as_deref(), Some("first line\nsecond line"));
    let requests = requests.lock().unwrap();
    assert_eq!(
        requests[0],
        "/api/get?track_name=Song&artist_name=Artist&album_name=Album"
    );
}

#[tokio::test]
async fn missing_song_is_not_found() {
    let (client, _, _) = client().await;
    let result = client.lookup(&LyricsQuery::new("Missing", "Artist", None)).await;
    assert!(matches!(result, Err(LyricsError::NotFound)));
}

#[tokio::test]
async fn server_error_keeps_status() {
    let (client, _, _) = client().await;
    let result = client.lookup(&LyricsQuery::new("Broken", "Artist", None)).await;
    assert!(matches!(result, Err(LyricsError::Status(500))));
}

#[tokio::test]
async fn bad_body_is_decode_error() {
    let (client, _, _) = client().await;
    let result = client.lookup(&LyricsQuery::new("Garbled", "Artist", None)).await;
    assert!(matches!(result, Err(LyricsError::Decode(_))));
}

#[tokio::test]
async fn unreachable_provider_is_request_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = LyricsConfig {
        base_url: format!("http://{}/api/get", addr),
        ..LyricsConfig::default()
    };
    let client = LrclibClient::new(&config).unwrap();
    let result = client.lookup(&LyricsQuery::new("Song", "Artist", None)).await;
    assert!(matches!(result, Err(LyricsError::Request(_))));
}

#[tokio::test]
async fn display_outcomes_over_http() {
    let (client, config, requests) = client().await;
    let updater = DisplayUpdater::new(client, &config);

    let view = updater.update(&SongSnapshot::new("Song", "Artist")).await;
    assert_eq!(view.lyrics, LyricsView::Plain("first line\nsecond line".to_string()));

    let view = updater.update(&SongSnapshot::new("Missing", "Artist")).await;
    assert_eq!(
        view.lyrics.to_html(),
        r#"<p class="error">Lyrics not found for "Missing" by Artist</p>"#
    );

    let view = updater.update(&SongSnapshot::new("Instrumental", "Artist")).await;
    assert_eq!(view.lyrics, LyricsView::NoLyrics);

    let view = updater.update(&SongSnapshot::new("Broken", "Artist")).await;
    assert_eq!(view.lyrics.to_html(), FAILURE_HTML);

    assert!(requests.lock().unwrap().iter().all(|r| !r.contains("album_name")));
}
