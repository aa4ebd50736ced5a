//! `HttpCommandSource` against a throwaway loopback backend.

use std::time::Duration;

use rover_runtime::{CommandSource, HttpCommandSource};
use rover_types::{RoverError, Sequence};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Serve `status` + `body` to every connection; returns the base URL.
async fn serve(status: &'static str, body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let mut buf = [0u8; 1024];
            let _ = stream.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 {status}\r\n\
                 Content-Type: application/json\r\n\
                 Content-Length: {}\r\n\
                 Connection: close\r\n\
                 \r\n\
                 {body}",
                body.len(),
            );
            let _ = stream.write_all(response.as_bytes()).await;
        }
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn parses_backend_drive_payload() {
    let base = serve(
        "200 OK",
        r#"{"x": 25, "y": -60, "speed": 75, "ts": 1718000000.5}"#,
    )
    .await;
    let source = HttpCommandSource::new(&base, Duration::from_millis(500)).unwrap();

    let cmd = source.fetch_latest().await.unwrap();
    assert_eq!((cmd.turn, cmd.throttle, cmd.speed_cap), (25, -60, 75));
    assert_eq!(cmd.sequence, Sequence(1718000000.5));
}

#[tokio::test]
async fn server_error_is_transient() {
    let base = serve("503 Service Unavailable", "{}").await;
    let source = HttpCommandSource::new(&base, Duration::from_millis(500)).unwrap();
    assert!(matches!(
        source.fetch_latest().await,
        Err(RoverError::TransientLink(_))
    ));
}

#[tokio::test]
async fn garbage_body_is_transient() {
    let base = serve("200 OK", "not json").await;
    let source = HttpCommandSource::new(&base, Duration::from_millis(500)).unwrap();
    let err = source.fetch_latest().await.unwrap_err();
    assert!(
        matches!(&err, RoverError::TransientLink(msg) if msg.contains("Unexpected response format")),
        "got {err:?}"
    );
}

#[tokio::test]
async fn slow_backend_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        // Accept and never answer.
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });
    let source =
        HttpCommandSource::new(&format!("http://{addr}"), Duration::from_millis(100)).unwrap();
    assert!(matches!(
        source.fetch_latest().await,
        Err(RoverError::TransientLink(_))
    ));
}

#[tokio::test]
async fn well_formed_json_of_the_wrong_shape_is_a_bad_response() {
    let base = serve("200 OK", r#"[1, 2, 3]"#).await;
    let source = HttpCommandSource::new(&base, Duration::from_millis(500)).unwrap();
    let err = source.fetch_latest().await.unwrap_err();
    assert!(
        matches!(&err, RoverError::TransientLink(msg) if msg.contains("Unexpected response format")),
        "got {err:?}"
    );
}
