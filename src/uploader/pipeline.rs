use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::config::{CaptureTriggers, Config};
use crate::errors::{AppResult, UploadError};
use crate::events::{MessageKind, UiHandle};
use crate::metadata::{self, GameClient, GameState};
use crate::screenshot::{SavedScreenshot, ScreenshotRequest, ScreenshotStore};

use super::scapecloud_client::{Link, UploadClient, UploadPayload};

const UPLOAD_TITLE: &str = "ScapeCloud Upload";
const UPLOADED_MESSAGE: &str = "A screenshot was uploaded and inserted into your clipboard!";
const UPLOAD_FAILED_MESSAGE: &str = "Error occurred while uploading to ScapeCloud.";
const UPLOAD_EXCEPTION_MESSAGE: &str = "Exception occurred while uploading to ScapeCloud.";

/// What happened to a screenshot handed to the pipeline.
#[derive(Debug)]
pub enum CaptureOutcome {
    /// Saved locally only (not logged in).
    Saved(SavedScreenshot),
    /// Saved and an upload is running in the background.
    Uploading {
        saved: SavedScreenshot,
        task: JoinHandle<Result<Link, UploadError>>,
    },
}

impl CaptureOutcome {
    pub fn saved(&self) -> &SavedScreenshot {
        match self {
            CaptureOutcome::Saved(saved) => saved,
            CaptureOutcome::Uploading { saved, .. } => saved,
        }
    }
}

/// The part of [`Config`] that shapes a capture.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureSettings {
    pub notify_when_taken: bool,
    pub triggers: CaptureTriggers,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for CaptureSettings {
    fn from(config: &Config) -> Self {
        Self {
            notify_when_taken: config.notify_when_taken,
            triggers: config.triggers.clone(),
        }
    }
}

/// Save, upload when logged in, and report back to the host UI.
#[derive(Clone)]
pub struct ScreenshotPipeline {
    store: ScreenshotStore,
    uploader: UploadClient,
    ui: UiHandle,
    runtime: Handle,
    settings: CaptureSettings,
}

impl ScreenshotPipeline {
    pub fn new(store: ScreenshotStore, uploader: UploadClient, ui: UiHandle, runtime: Handle) -> Self {
        Self {
            store,
            uploader,
            ui,
            runtime,
            settings: CaptureSettings::default(),
        }
    }

    /// Pipeline writing to the configured screenshot folder with the configured
    /// notification and trigger settings.
    pub fn from_config(
        config: &Config,
        uploader: UploadClient,
        ui: UiHandle,
        runtime: Handle,
    ) -> AppResult<Self> {
        let store = ScreenshotStore::new(config.resolve_screenshot_dir()?);
        Ok(Self::new(store, uploader, ui, runtime).with_settings(CaptureSettings::from(config)))
    }

    pub fn with_settings(mut self, settings: CaptureSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn store(&self) -> &ScreenshotStore {
        &self.store
    }

    /// Called from the host thread with the frame it just rendered.
    ///
    /// Returns `None` when the event's trigger is switched off or the host is
    /// on the login screen. Game state is read here, synchronously; the
    /// network part runs on the tokio runtime so the caller never blocks on it.
    pub fn take_screenshot(
        &self,
        client: &dyn GameClient,
        request: ScreenshotRequest,
    ) -> AppResult<Option<CaptureOutcome>> {
        if !self.settings.triggers.allows(&request.event) {
            log::debug!("Screenshots for {:?} are switched off", request.event);
            return Ok(None);
        }
        let notify = request.notify.unwrap_or(self.settings.notify_when_taken);

        let saved = match self.store.save(
            client,
            &request.image,
            &request.file_name,
            request.sub_dir.as_deref(),
        )? {
            Some(saved) => saved,
            None => return Ok(None),
        };

        if !self.uploader.session().is_authenticated() {
            if notify {
                self.ui
                    .notify(&format!("A screenshot was saved to {}", saved.path.display()));
            }
            return Ok(Some(CaptureOutcome::Saved(saved)));
        }

        let metadata = metadata::metadata_json(client, request.event.tag())?;
        let game_state = client.game_state();

        let pipeline = self.clone();
        let upload_target = saved.clone();
        let task = self.runtime.spawn(async move {
            pipeline
                .upload_saved(&upload_target, metadata, notify, game_state)
                .await
        });

        Ok(Some(CaptureOutcome::Uploading { saved, task }))
    }

    /// Upload an already stored screenshot and report the result to the UI.
    pub async fn upload_saved(
        &self,
        saved: &SavedScreenshot,
        metadata: String,
        notify: bool,
        game_state: GameState,
    ) -> Result<Link, UploadError> {
        let result = match tokio::fs::read(&saved.path).await {
            Ok(bytes) => {
                let payload = UploadPayload::new(&saved.file_name, bytes, metadata);
                self.uploader.upload(&payload).await
            }
            Err(e) => Err(UploadError::Io(e)),
        };

        match result {
            Ok(link) => {
                log::info!("Uploaded {} to {}", saved.file_name, link);
                self.ui.copy_to_clipboard(link.as_str());
                if notify {
                    self.ui.notify(UPLOADED_MESSAGE);
                }
                self.message(game_state, UPLOADED_MESSAGE, MessageKind::Info);
                Ok(link)
            }
            Err(e) if e.is_user_facing() => {
                log::error!("Error occurred while uploading to ScapeCloud: {}", e);
                let text = match &e {
                    UploadError::Server { message, .. } => {
                        format!("{} {}", UPLOAD_FAILED_MESSAGE, message)
                    }
                    _ => UPLOAD_FAILED_MESSAGE.to_string(),
                };
                self.message(game_state, &text, MessageKind::Error);
                Err(e)
            }
            Err(e) => {
                log::error!("Exception occurred while uploading to ScapeCloud: {}", e);
                self.message(game_state, UPLOAD_EXCEPTION_MESSAGE, MessageKind::Error);
                Err(e)
            }
        }
    }

    /// Chat line while in game with a live session, dialog otherwise.
    fn message(&self, game_state: GameState, message: &str, kind: MessageKind) {
        if !self.uploader.session().is_authenticated() || game_state != GameState::LoggedIn {
            self.ui.dialog(UPLOAD_TITLE, message, kind);
        } else {
            self.ui.chat(message, kind);
        }
    }
}
