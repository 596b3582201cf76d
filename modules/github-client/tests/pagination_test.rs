//! Pagination behavior of the listing endpoints, exercised against a local
//! HTTP stub through `with_base_url`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use github_client::GithubClient;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Minimal HTTP/1.1 server speaking just enough for reqwest: one canned JSON
/// body per exact request path, unknown paths get a 404. Returns the base URL
/// and the log of request paths in arrival order.
async fn spawn_stub(pages: HashMap<String, String>) -> (String, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let mut head = Vec::new();
            let mut chunk = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                match socket.read(&mut chunk).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => head.extend_from_slice(&chunk[..n]),
                }
            }
            let head = String::from_utf8_lossy(&head);
            let path = head
                .lines()
                .next()
                .and_then(|line| line.split_whitespace().nth(1))
                .unwrap_or("")
                .to_string();
            log.lock().unwrap().push(path.clone());
            let (status, body) = match pages.get(&path) {
                Some(body) => ("200 OK", body.clone()),
                None => ("404 Not Found", "[]".to_string()),
            };
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });
    (format!("http://{addr}"), seen)
}

fn login_page(range: std::ops::RangeInclusive<u32>) -> String {
    let entries: Vec<serde_json::Value> = range
        .map(|i| json!({ "login": format!("user{i:03}"), "id": i }))
        .collect();
    serde_json::Value::Array(entries).to_string()
}

#[tokio::test]
async fn listing_walks_pages_until_a_short_page() {
    let pages = HashMap::from([
        (
            "/users/alice/followers?per_page=100&page=1".to_string(),
            login_page(1..=100),
        ),
        (
            "/users/alice/followers?per_page=100&page=2".to_string(),
            login_page(101..=103),
        ),
    ]);
    let (base, seen) = spawn_stub(pages).await;

    let client = GithubClient::new(None).with_base_url(base);
    let logins = client.followers("alice").await.unwrap();

    assert_eq!(logins.len(), 103);
    assert_eq!(logins[0], "user001");
    assert_eq!(logins[99], "user100");
    assert_eq!(logins[100], "user101");
    assert_eq!(logins[102], "user103");

    let requests = seen.lock().unwrap().clone();
    assert_eq!(
        requests,
        vec![
            "/users/alice/followers?per_page=100&page=1".to_string(),
            "/users/alice/followers?per_page=100&page=2".to_string(),
        ]
    );
}

#[tokio::test]
async fn short_first_page_completes_in_one_request() {
    let pages = HashMap::from([(
        "/users/alice/following?per_page=100&page=1".to_string(),
        login_page(1..=2),
    )]);
    let (base, seen) = spawn_stub(pages).await;

    let client = GithubClient::new(None).with_base_url(base);
    let logins = client.following("alice").await.unwrap();

    assert_eq!(logins, vec!["user001", "user002"]);
    assert_eq!(seen.lock().unwrap().len(), 1);
}
