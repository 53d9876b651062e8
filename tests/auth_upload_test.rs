use ragline::auth::{login, logout, signup};
use ragline::constants::{TOKEN_KEY, USER_KEY};
use ragline::main_helper::{AppContext, Args};
use ragline::session::{MemoryStore, SessionStore};
use ragline::upload::upload_pdf;
use clap::Parser;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

const JSON_OK: &str =
    "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\nconnection: close\r\n\r\n";
const JSON_UNAUTHORIZED: &str =
    "HTTP/1.1 401 Unauthorized\r\ncontent-type: application/json\r\nconnection: close\r\n\r\n";

/// Serves one scripted body per connection and records the request heads.
async fn spawn_server(responses: Vec<(&'static str, &'static str)>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        for (head, body) in responses {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            // Drain the whole request; multipart bodies can arrive in
            // several segments.
            let mut buf = vec![0u8; 1 << 20];
            let _ = socket.read(&mut buf).await;
            while let Ok(Ok(n)) = tokio::time::timeout(
                std::time::Duration::from_millis(50),
                socket.read(&mut buf),
            )
            .await
            {
                if n == 0 {
                    break;
                }
            }
            let _ = socket.write_all(head.as_bytes()).await;
            let _ = socket.write_all(body.as_bytes()).await;
            let _ = socket.flush().await;
        }
    });
    format!("http://{}", addr)
}

fn test_ctx(base_url: &str) -> AppContext {
    let args = Args::parse_from([
        "ragline",
        "--base-url",
        base_url,
        "--request-timeout-secs",
        "5",
    ]);
    AppContext::new(
        reqwest::Client::new(),
        Arc::new(args),
        Arc::new(MemoryStore::new()),
    )
}

const LOGIN_BODY: &str = "{\"access_token\":\"tok-abc\",\"user\":{\"id\":\"u1\",\"name\":\"Ada\",\"email\":\"ada@example.com\"}}";

#[tokio::test]
async fn test_login_persists_session() {
    let base_url = spawn_server(vec![(JSON_OK, LOGIN_BODY)]).await;
    let ctx = test_ctx(&base_url);

    let session = login(&ctx, "ada@example.com", "pw").await.unwrap();
    assert_eq!(session.token, "tok-abc");
    assert_eq!(session.user.name, "Ada");

    assert_eq!(ctx.store.get(TOKEN_KEY).as_deref(), Some("tok-abc"));
    assert!(ctx.store.get(USER_KEY).is_some());

    logout(&ctx);
    assert!(ctx.store.get(TOKEN_KEY).is_none());
    assert!(ctx.store.get(USER_KEY).is_none());
}

#[tokio::test]
async fn test_login_failure_surfaces_detail() {
    let base_url =
        spawn_server(vec![(JSON_UNAUTHORIZED, "{\"detail\":\"bad credentials\"}")]).await;
    let ctx = test_ctx(&base_url);

    let err = login(&ctx, "ada@example.com", "wrong").await.unwrap_err();
    assert!(err.to_string().contains("bad credentials"));
    assert!(ctx.store.get(TOKEN_KEY).is_none());
}

#[tokio::test]
async fn test_signup_signs_in_afterwards() {
    // Signup returns the profile without a token, so a login follows.
    let base_url = spawn_server(vec![
        (
            JSON_OK,
            "{\"id\":\"u1\",\"name\":\"Ada\",\"email\":\"ada@example.com\"}",
        ),
        (JSON_OK, LOGIN_BODY),
    ])
    .await;
    let ctx = test_ctx(&base_url);

    let session = signup(&ctx, "Ada", "ada@example.com", "pw").await.unwrap();
    assert_eq!(session.token, "tok-abc");
    assert_eq!(ctx.store.get(TOKEN_KEY).as_deref(), Some("tok-abc"));
}

#[tokio::test]
async fn test_signup_conflict_does_not_attempt_login() {
    let base_url = spawn_server(vec![(
        "HTTP/1.1 409 Conflict\r\ncontent-type: application/json\r\nconnection: close\r\n\r\n",
        "{\"detail\":\"email already registered\"}",
    )])
    .await;
    let ctx = test_ctx(&base_url);

    let err = signup(&ctx, "Ada", "ada@example.com", "pw").await.unwrap_err();
    assert!(err.to_string().contains("email already registered"));
}

#[tokio::test]
async fn test_upload_rejects_non_pdf_before_any_request() {
    // Base URL points nowhere; the check must fire before the network.
    let ctx = test_ctx("http://127.0.0.1:1");
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.txt");
    std::fs::File::create(&path)
        .unwrap()
        .write_all(b"plain text")
        .unwrap();

    let err = upload_pdf(&ctx, &path).await.unwrap_err();
    assert!(err.to_string().contains("PDF"));
}

#[tokio::test]
async fn test_upload_requires_a_session() {
    let ctx = test_ctx("http://127.0.0.1:1");
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("doc.pdf");
    std::fs::File::create(&path)
        .unwrap()
        .write_all(b"%PDF-1.4")
        .unwrap();

    let err = upload_pdf(&ctx, &path).await.unwrap_err();
    assert!(err.to_string().contains("sign in"));
}

#[tokio::test]
async fn test_upload_missing_file_is_io_error() {
    let ctx = test_ctx("http://127.0.0.1:1");
    assert!(upload_pdf(&ctx, Path::new("/no/such/file.pdf"))
        .await
        .is_err());
}

#[tokio::test]
async fn test_upload_returns_indexing_receipt() {
    let base_url = spawn_server(vec![(
        JSON_OK,
        "{\"filename\":\"doc.pdf\",\"pages\":3,\"chunks\":12}",
    )])
    .await;
    let ctx = test_ctx(&base_url);
    ctx.store.set(TOKEN_KEY, "tok-abc");

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("doc.pdf");
    std::fs::File::create(&path)
        .unwrap()
        .write_all(b"%PDF-1.4 test body")
        .unwrap();

    let receipt = upload_pdf(&ctx, &path).await.unwrap();
    assert_eq!(receipt.filename, "doc.pdf");
    assert_eq!(receipt.pages, Some(3));
    assert_eq!(receipt.chunks, Some(12));
}
