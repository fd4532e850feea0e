//! Model downloads against a local HTTP server

use bgstrip::segmentation::download::verify_file_integrity;
use bgstrip::{BgStripError, ModelCache, ModelDownloader, ModelPreset};
use sha2::{Digest, Sha256};
use std::net::SocketAddr;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Serve `body` with `status` to every connection
async fn serve(status: &'static str, body: Vec<u8>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let body = body.clone();
            tokio::spawn(async move {
                let mut request = [0u8; 1024];
                let _ = socket.read(&mut request).await;
                let head = format!(
                    "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    status,
                    body.len()
                );
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.write_all(&body).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    addr
}

fn downloader(temp: &TempDir) -> ModelDownloader {
    let cache = ModelCache::with_dir(temp.path().join("models")).unwrap();
    ModelDownloader::new(cache).unwrap()
}

#[tokio::test]
async fn test_download_with_matching_digest() {
    let body = vec![7u8; 20_000];
    let digest = format!("{:x}", Sha256::digest(&body));
    let addr = serve("200 OK", body.clone()).await;

    let temp = TempDir::new().unwrap();
    let dl = downloader(&temp);
    let destination = temp.path().join("models").join("fake.onnx");
    let bytes = dl
        .download_to(&format!("http://{addr}/fake.onnx"), &destination, Some(&digest.to_uppercase()), false)
        .await
        .unwrap();

    assert_eq!(bytes, 20_000);
    assert_eq!(std::fs::read(&destination).unwrap(), body);
    assert!(!temp.path().join("models").join("fake.onnx.part").exists());
    assert!(verify_file_integrity(&destination, Some(&digest)).unwrap());
}

#[tokio::test]
async fn test_digest_mismatch_leaves_nothing_behind() {
    let addr = serve("200 OK", b"tampered".to_vec()).await;
    let temp = TempDir::new().unwrap();
    let dl = downloader(&temp);
    let destination = temp.path().join("models").join("fake.onnx");

    let err = dl
        .download_to(&format!("http://{addr}/fake.onnx"), &destination, Some("00ff"), false)
        .await
        .unwrap_err();

    assert!(matches!(err, BgStripError::Network(_)));
    assert!(!destination.exists());
    assert!(!temp.path().join("models").join("fake.onnx.part").exists());
}

#[tokio::test]
async fn test_http_error_status_is_network_error() {
    let addr = serve("404 Not Found", Vec::new()).await;
    let temp = TempDir::new().unwrap();
    let dl = downloader(&temp);
    let destination = temp.path().join("models").join("missing.onnx");

    let err = dl
        .download_to(&format!("http://{addr}/missing.onnx"), &destination, None, false)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("404"));
    assert!(!destination.exists());
}

#[tokio::test]
async fn test_cached_preset_skips_network() {
    let temp = TempDir::new().unwrap();
    let dl = downloader(&temp);
    let cached = dl.cache().model_path(ModelPreset::U2NetP);
    std::fs::write(&cached, b"already here").unwrap();

    let path = dl.ensure_preset(ModelPreset::U2NetP, false).await.unwrap();
    assert_eq!(path, cached);
    assert_eq!(std::fs::read(&path).unwrap(), b"already here");
}
