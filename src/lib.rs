//! Screenshot uploading for the ScapeCloud game client plugin.
//!
//! The host owns the game client and the UI. This crate keeps the account
//! session alive, stores screenshots per player, uploads them with a snapshot
//! of the player's state and tells the host what to show through
//! [`events::UiEvent`]s.

pub mod auth;
pub mod config;
pub mod errors;
pub mod events;
pub mod login;
pub mod metadata;
pub mod screenshot;
pub mod security;
pub mod uploader;

#[cfg(test)]
#[path = "../tests/support/mod.rs"]
mod test_support;

pub use auth::{IdentityClient, SessionEvent, SessionManager};
pub use errors::{AppError, AppResult, AuthError, UploadError};
pub use events::{ui_channel, MessageKind, UiEvent, UiHandle};
pub use login::LoginController;
pub use metadata::{GameClient, UploadMetadata};
pub use screenshot::{ScreenshotRequest, ScreenshotStore};
pub use uploader::{Link, ScreenshotPipeline, UploadClient};
