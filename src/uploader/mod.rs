// Uploader module - everything between a captured frame and a shareable link
//
// The client talks to the hosting endpoint, the pipeline saves, uploads and
// reports back to the host UI

pub mod pipeline;
pub mod scapecloud_client;

pub use pipeline::{CaptureOutcome, CaptureSettings, ScreenshotPipeline};
pub use scapecloud_client::{parse_upload_response, Link, UploadClient, UploadPayload};
