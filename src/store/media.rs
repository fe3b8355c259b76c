//! Media upload store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::api::types::{MediaUpload, UploadBatch};
use crate::api::{self, Adapter, ApiError, FilePart};

use super::LoadingGuard;

/// Server-side batch limit, enforced client-side before any bytes move.
pub const MAX_BATCH_FILES: usize = 10;

/// One file queued for upload.
#[derive(Debug, Clone)]
pub struct UploadFile {
  pub filename: String,
  pub content_type: String,
  pub bytes: Vec<u8>,
}

impl UploadFile {
  fn into_part(self, field: &str) -> FilePart {
    FilePart {
      field: field.to_string(),
      filename: self.filename,
      content_type: self.content_type,
      bytes: self.bytes,
    }
  }
}

/// State container for media uploads.
pub struct MediaStore<A: Adapter> {
  api: Arc<A>,
  uploading: Arc<AtomicBool>,
}

impl<A: Adapter> MediaStore<A> {
  pub fn new(api: Arc<A>) -> Self {
    Self {
      api,
      uploading: Arc::new(AtomicBool::new(false)),
    }
  }

  pub fn is_uploading(&self) -> bool {
    self.uploading.load(Ordering::SeqCst)
  }

  /// Upload one file.
  pub async fn upload(&self, file: UploadFile) -> Result<MediaUpload, ApiError> {
    let _guard = LoadingGuard::engage(&self.uploading);
    api::upload_json(self.api.as_ref(), "/media/upload", vec![file.into_part("file")]).await
  }

  /// Upload up to [`MAX_BATCH_FILES`] files in one request.
  pub async fn upload_multiple(&self, files: Vec<UploadFile>) -> Result<UploadBatch, ApiError> {
    if files.len() > MAX_BATCH_FILES {
      return Err(ApiError::Rejected {
        status: 400,
        message: "Maximum 10 files allowed per upload".to_string(),
      });
    }

    let _guard = LoadingGuard::engage(&self.uploading);
    let parts = files.into_iter().map(|f| f.into_part("files")).collect();
    api::upload_json(self.api.as_ref(), "/media/upload-multiple", parts).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::Method;
  use crate::store::mock::MockAdapter;
  use serde_json::json;

  fn file(name: &str) -> UploadFile {
    UploadFile {
      filename: name.to_string(),
      content_type: "image/png".to_string(),
      bytes: vec![0u8; 16],
    }
  }

  #[tokio::test]
  async fn test_upload_decodes_file_metadata() {
    let api = Arc::new(MockAdapter::new());
    api.stub(
      Method::Post,
      "/media/upload",
      Ok(json!({
        "filename": "abc123.png",
        "media_type": "image",
        "file_size": 2048,
        "url": "/media/files/image/abc123.png",
        "thumbnail_url": "/media/thumbnails/abc123.png"
      })),
    );
    let store = MediaStore::new(api);

    let uploaded = store.upload(file("photo.png")).await.expect("upload");

    assert_eq!(uploaded.filename, "abc123.png");
    assert_eq!(uploaded.url, "/media/files/image/abc123.png");
    assert!(!store.is_uploading());
  }

  #[tokio::test]
  async fn test_upload_failure_clears_uploading_flag() {
    let api = Arc::new(MockAdapter::new());
    api.stub(
      Method::Post,
      "/media/upload",
      Err(ApiError::Server("disk full".to_string())),
    );
    let store = MediaStore::new(api);

    assert!(store.upload(file("photo.png")).await.is_err());
    assert!(!store.is_uploading());
  }

  #[tokio::test]
  async fn test_upload_multiple_decodes_batch_summary() {
    let api = Arc::new(MockAdapter::new());
    api.stub(
      Method::Post,
      "/media/upload-multiple",
      Ok(json!({ "uploaded": 2, "failed": 0, "files": [{}, {}] })),
    );
    let store = MediaStore::new(api);

    let batch = store
      .upload_multiple(vec![file("a.png"), file("b.png")])
      .await
      .expect("upload");

    assert_eq!(batch.uploaded, 2);
    assert_eq!(batch.failed, 0);
  }

  #[tokio::test]
  async fn test_oversized_batch_is_rejected_before_sending() {
    let api = Arc::new(MockAdapter::new());
    let store = MediaStore::new(Arc::clone(&api));
    let files: Vec<UploadFile> = (0..11).map(|i| file(&format!("f{i}.png"))).collect();

    let result = store.upload_multiple(files).await;

    assert!(matches!(result, Err(ApiError::Rejected { status: 400, .. })));
    assert_eq!(api.calls_to(Method::Post, "/media/upload-multiple"), 0);
    assert!(!store.is_uploading());
  }
}
