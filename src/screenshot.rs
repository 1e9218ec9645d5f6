use chrono::{DateTime, Local};
use image::{ImageFormat, RgbaImage};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::CaptureEvent;
use crate::errors::AppResult;
use crate::metadata::{GameClient, GameState, WorldType};
use crate::security::InputValidator;

const TIME_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// A frame handed over by the host, plus where and how to file it.
#[derive(Debug, Clone)]
pub struct ScreenshotRequest {
    pub image: RgbaImage,
    /// Name prefix without extension, e.g. `"Levelup 99 Attack"`. May be empty.
    pub file_name: String,
    /// Optional folder inside the player directory, e.g. `"Levels"`.
    pub sub_dir: Option<String>,
    /// Show a tray notification once the screenshot is stored or uploaded.
    /// `None` follows the `notify_when_taken` setting.
    pub notify: Option<bool>,
    pub event: CaptureEvent,
}

impl ScreenshotRequest {
    pub fn new(image: RgbaImage, file_name: &str) -> Self {
        Self::for_event(image, file_name, CaptureEvent::Manual)
    }

    pub fn for_event(image: RgbaImage, file_name: &str, event: CaptureEvent) -> Self {
        Self {
            image,
            file_name: file_name.to_string(),
            sub_dir: None,
            notify: None,
            event,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedScreenshot {
    pub path: PathBuf,
    pub file_name: String,
}

/// Writes screenshots below a root folder, one directory per player.
#[derive(Debug, Clone)]
pub struct ScreenshotStore {
    root: PathBuf,
}

impl ScreenshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<player>[-Deadman|-League][/<sub_dir>]`, or just `<root>`
    /// while there is no named local player.
    pub fn player_folder(&self, client: &dyn GameClient, sub_dir: Option<&str>) -> PathBuf {
        let Some(name) = client.local_player().and_then(|player| player.name) else {
            return self.root.clone();
        };

        let world_types = client.world_types();
        let mut player_dir = InputValidator::sanitize_filename(&name);
        if world_types.contains(&WorldType::Deadman) {
            player_dir.push_str("-Deadman");
        } else if world_types.contains(&WorldType::League) {
            player_dir.push_str("-League");
        }

        let mut folder = self.root.join(player_dir);
        if let Some(sub_dir) = sub_dir.map(str::trim).filter(|s| !s.is_empty()) {
            folder = folder.join(InputValidator::sanitize_filename(sub_dir));
        }
        folder
    }

    pub fn save(
        &self,
        client: &dyn GameClient,
        image: &RgbaImage,
        file_name: &str,
        sub_dir: Option<&str>,
    ) -> AppResult<Option<SavedScreenshot>> {
        self.save_at(client, image, file_name, sub_dir, Local::now())
    }

    /// Store `image` as PNG. Returns `None` when the host is on the login
    /// screen, where screenshots are never taken.
    pub fn save_at(
        &self,
        client: &dyn GameClient,
        image: &RgbaImage,
        file_name: &str,
        sub_dir: Option<&str>,
        taken_at: DateTime<Local>,
    ) -> AppResult<Option<SavedScreenshot>> {
        if client.game_state() == GameState::LoginScreen {
            log::info!("Login screenshot prevented");
            return Ok(None);
        }

        let folder = self.player_folder(client, sub_dir);
        fs::create_dir_all(&folder)?;

        let base_name = timestamped_name(&InputValidator::sanitize_filename(file_name), taken_at);
        let path = unique_path(&folder, &base_name);

        image.save_with_format(&path, ImageFormat::Png)?;

        let file_name = path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        log::info!("Screenshot saved to {}", path.display());

        Ok(Some(SavedScreenshot { path, file_name }))
    }
}

/// `"<name> <yyyy-MM-dd_HH-mm-ss>"`, without the separator for an empty name.
pub fn timestamped_name(file_name: &str, taken_at: DateTime<Local>) -> String {
    let stamp = taken_at.format(TIME_FORMAT).to_string();
    if file_name.is_empty() {
        stamp
    } else {
        format!("{} {}", file_name, stamp)
    }
}

/// First of `<name>.png`, `<name>(1).png`, `<name>(2).png`, ... that does not exist yet.
pub fn unique_path(folder: &Path, base_name: &str) -> PathBuf {
    let mut candidate = folder.join(format!("{}.png", base_name));
    let mut suffix = 1;
    while candidate.exists() {
        candidate = folder.join(format!("{}({}).png", base_name, suffix));
        suffix += 1;
    }
    candidate
}
