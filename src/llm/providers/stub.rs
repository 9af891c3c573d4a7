//! Single-request HTTP server for provider tests.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// What the client sent. `head` is the lower-cased request line plus headers.
pub struct Captured {
    pub head: String,
    pub body: serde_json::Value,
}

/// Serve exactly one request on a random local port and return its base URL.
///
/// The body is close-delimited: every entry of `chunks` is written and flushed
/// separately, with a short pause in between, so the client sees them as
/// distinct reads.
pub async fn serve_once(status: &str, content_type: &str, chunks: Vec<Vec<u8>>) -> (String, JoinHandle<Captured>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let head = format!("HTTP/1.1 {status}\r\ncontent-type: {content_type}\r\nconnection: close\r\n\r\n");

    let handle = tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        let captured = read_request(&mut sock).await;
        sock.write_all(head.as_bytes()).await.unwrap();
        sock.flush().await.unwrap();
        for chunk in chunks {
            tokio::time::sleep(Duration::from_millis(20)).await;
            // The client may hang up early once it has seen the end marker.
            if sock.write_all(&chunk).await.is_err() {
                break;
            }
            let _ = sock.flush().await;
        }
        let _ = sock.shutdown().await;
        captured
    });

    (format!("http://{addr}"), handle)
}

async fn read_request(sock: &mut TcpStream) -> Captured {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];
    let header_end = loop {
        let n = sock.read(&mut buf).await.unwrap();
        assert!(n > 0, "client closed before sending headers");
        data.extend_from_slice(&buf[..n]);
        if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&data[..header_end]).to_lowercase();
    let len = head
        .lines()
        .find_map(|l| l.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);
    while data.len() < header_end + len {
        let n = sock.read(&mut buf).await.unwrap();
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buf[..n]);
    }

    let end = (header_end + len).min(data.len());
    let body = serde_json::from_slice(&data[header_end..end]).unwrap_or(serde_json::Value::Null);
    Captured { head, body }
}
