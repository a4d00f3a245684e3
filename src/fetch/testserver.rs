//! Minimal canned-response HTTP server for exercising fetch paths in tests.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Serves one canned HTTP response per connection on an ephemeral local
/// port; returns the feed URL to fetch.
pub async fn spawn_feed_server(status_line: &'static str, body: String) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let body = body.clone();
            tokio::spawn(async move {
                let mut request = [0u8; 4096];
                let _ = socket.read(&mut request).await;
                let response = format!(
                    "HTTP/1.1 {status_line}\r\nContent-Type: application/rss+xml\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len(),
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    format!("http://{addr}/?feed=job_feed")
}

/// An RSS channel with `item_count` well-formed items.
pub fn feed_body(item_count: usize) -> String {
    let items: String = (0..item_count)
        .map(|i| {
            format!(
                "<item><title>Job {i}</title><link>https://x.test/{i}</link>\
                 <guid>job-{i}</guid><description>Company: Acme</description></item>"
            )
        })
        .collect();
    format!("<rss><channel><title>Feed</title>{items}</channel></rss>")
}
