//! Shared fixtures for API integration tests

#![allow(dead_code)]

use std::io::{Cursor, Read, Write};
use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use prices_server::{api, catalog::memory::MemoryCatalogStore, config::Config};
use tempfile::TempDir;
use tower::ServiceExt;
use zip::{write::SimpleFileOptions, ZipArchive, ZipWriter};

pub const PRICES_URI: &str = "/api/v0/prices";
pub const BOUNDARY: &str = "prices-test-boundary";

pub const EXPORT_HEADER: &str = "id,product_name,product_category,product_price,manufacture_date";

/// Router wired to an in-memory catalog and a private scratch root
pub struct TestApp {
    pub router: Router,
    pub store: MemoryCatalogStore,
    pub scratch: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(customize: impl FnOnce(&mut Config)) -> Self {
        let scratch = tempfile::tempdir().expect("create scratch root");
        let store = MemoryCatalogStore::new();

        let mut config = Config::default();
        config.ingest.scratch_dir = scratch.path().to_path_buf();
        customize(&mut config);

        let router = api::router(Arc::new(store.clone()), &config);
        Self {
            router,
            store,
            scratch,
        }
    }

    /// Entries left behind under the scratch root.
    pub fn scratch_entries(&self) -> usize {
        std::fs::read_dir(self.scratch.path())
            .expect("read scratch root")
            .count()
    }

    pub async fn upload(&self, archive: Vec<u8>) -> (StatusCode, serde_json::Value) {
        self.send_json(multipart_request(PRICES_URI, "file", "prices.zip", &archive))
            .await
    }

    pub async fn send_json(&self, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let (status, _, body) = self.send(request).await;
        let value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
        (status, value)
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
        let response = self.router.clone().oneshot(request).await.unwrap();

        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        (status, headers, body.to_vec())
    }

    /// GET the export and return the CSV text of its single entry.
    pub async fn export_csv(&self) -> String {
        let (status, _, body) = self
            .send(Request::builder().uri(PRICES_URI).body(Body::empty()).unwrap())
            .await;
        assert_eq!(status, StatusCode::OK);
        read_zip_entry(body, "data.csv")
    }
}

/// Build a ZIP archive in memory from `(name, content)` pairs.
pub fn build_zip(files: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in files {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

pub fn read_zip_entry(archive: Vec<u8>, name: &str) -> String {
    let mut zip = ZipArchive::new(Cursor::new(archive)).unwrap();
    let mut content = String::new();
    zip.by_name(name).unwrap().read_to_string(&mut content).unwrap();
    content
}

/// Multipart POST with a single file field.
pub fn multipart_request(uri: &str, field: &str, filename: &str, content: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/zip\r\n\r\n");
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

pub const SAMPLE_CSV: &str = "product_name,product_category,product_price,manufacture_date\n\
                               Widget,Tools,9.99,2024-01-15\n\
                               Gadget,Tools,19.50,2024-02-01\n";
