// epx-gateways/src/s3_uploads/tests.rs
// ============================================================================
// Module: Upload Gateway Tests
// Description: Unit tests for content sniffing and the dummy gateway.
// Purpose: Validate type detection and testing-environment behavior.
// Dependencies: tokio, zip
// ============================================================================

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    reason = "Test-only assertions use unwrap/expect for clarity."
)]

use std::io::Cursor;
use std::io::Write;

use epx_core::UploadContent;
use epx_core::UploadLocationGateway;
use epx_core::core::upload::JobUpload;
use epx_core::core::upload::UploadContext;
use epx_core::core::upload::UploadLocation;
use epx_core::core::upload::UploadType;
use zip::CompressionMethod;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use super::DummyUploadGateway;
use super::S3UploadGateway;

fn sample_zip() -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    writer.start_file("main.fred", options).expect("start");
    writer.write_all(b"simulation {}\n").expect("write");
    writer.start_file("data.bin", options).expect("start");
    writer.write_all(&[0_u8, 1, 2, 3]).expect("write");
    writer.finish().expect("finish").into_inner()
}

#[test]
fn zip_payloads_are_listed_with_previews() {
    let content = S3UploadGateway::parse_content(sample_zip(), "jobs/1/job_input.zip");
    match content {
        UploadContent::ZipArchive { entries, summary, .. } => {
            assert_eq!(entries.len(), 2);
            assert_eq!(entries[0].name, "main.fred");
            assert!(entries[0].preview.as_deref().expect("preview").contains("simulation"));
            assert!(entries[1].preview.is_none());
            assert!(summary.contains("2 files"));
        }
        other => panic!("expected zip content, got {}", other.kind()),
    }
}

#[test]
fn json_is_detected_by_suffix_and_shape() {
    let by_suffix = S3UploadGateway::parse_content(b"{\"a\": 1}".to_vec(), "jobs/1/run_4_config.json");
    assert_eq!(by_suffix.kind(), "json");
    let by_shape = S3UploadGateway::parse_content(b"  {\"a\": 1}  ".to_vec(), "jobs/1/notes");
    assert_eq!(by_shape.kind(), "json");
}

#[test]
fn utf8_text_is_detected() {
    let content = S3UploadGateway::parse_content(b"hello world".to_vec(), "jobs/1/notes.txt");
    match content {
        UploadContent::Text { content, encoding } => {
            assert_eq!(content, "hello world");
            assert_eq!(encoding, "utf-8");
        }
        other => panic!("expected text content, got {}", other.kind()),
    }
}

#[test]
fn non_utf8_text_falls_back_to_latin1() {
    // 0xE9 is 'e' acute in latin-1 and invalid standalone UTF-8.
    let content = S3UploadGateway::parse_content(vec![b'c', b'a', b'f', 0xE9], "jobs/1/notes.txt");
    match content {
        UploadContent::Text { content, encoding } => {
            assert_eq!(content, "caf\u{e9}");
            assert_eq!(encoding, "latin-1");
        }
        other => panic!("expected text content, got {}", other.kind()),
    }
}

#[test]
fn nul_bytes_produce_a_hex_preview() {
    let content = S3UploadGateway::parse_content(vec![0xFF, 0x00, 0xAA], "jobs/1/blob");
    match content {
        UploadContent::Binary { preview } => {
            assert!(preview.contains("ff00aa"));
        }
        other => panic!("expected binary content, got {}", other.kind()),
    }
}

#[test]
fn corrupt_zip_suffix_falls_back_to_text() {
    let content = S3UploadGateway::parse_content(b"definitely not a zip".to_vec(), "jobs/1/bad.zip");
    assert_eq!(content.kind(), "text");
}

#[tokio::test]
async fn dummy_gateway_returns_its_fixed_url() {
    let gateway = DummyUploadGateway::default();
    let upload = JobUpload::new(UploadContext::Job, UploadType::Input, 1, None).expect("upload");
    let job = {
        let mut job = epx_core::Job::create_unpersisted(1, vec![]);
        job.id = Some(1);
        job
    };
    let prefix = epx_core::KeyPrefix::from_job(&job).expect("prefix");
    let location = gateway.get_upload_location(&upload, &prefix).await.expect("location");
    assert_eq!(location.url, "http://localhost:5001/pre-signed-url");

    let passthrough = gateway
        .archive_uploads(vec![UploadLocation::new("u")], None)
        .await
        .expect("archive");
    assert_eq!(passthrough.len(), 1);
}
