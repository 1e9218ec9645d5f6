use std::path::PathBuf;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::auth::{LogoutReason, SessionEvent, SessionManager};
use crate::config;
use crate::errors::{AppError, AppResult};
use crate::events::{MessageKind, UiHandle};
use crate::security::InputValidator;

const LOGIN_TITLE: &str = "ScapeCloud Login";

/// Glue between the login panel, the session and the stored credentials.
#[derive(Clone)]
pub struct LoginController {
    session: SessionManager,
    ui: UiHandle,
    config_path: PathBuf,
}

impl LoginController {
    pub fn new(session: SessionManager, ui: UiHandle, config_path: PathBuf) -> Self {
        Self {
            session,
            ui,
            config_path,
        }
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub async fn login(&self, email: &str, password: &str) -> AppResult<()> {
        if let Err(e) = InputValidator::validate_email(email)
            .and_then(|_| InputValidator::validate_password(password))
        {
            self.ui.dialog(LOGIN_TITLE, &e.to_string(), MessageKind::Error);
            return Err(e);
        }

        // A broken settings file must fail before the session changes
        let mut config = match config::load_config_from(&self.config_path) {
            Ok(config) => config,
            Err(e) => {
                log::error!("Could not read settings before login: {}", e);
                self.ui.dialog(
                    LOGIN_TITLE,
                    &format!("Could not read your settings: {}", e),
                    MessageKind::Error,
                );
                return Err(e);
            }
        };

        if let Err(e) = self.session.authenticate(email, password).await {
            self.ui.dialog(
                LOGIN_TITLE,
                &format!("Login failed: {}", e.user_message()),
                MessageKind::Error,
            );
            return Err(AppError::Auth(e));
        }

        config.set_credentials(email, password);
        if let Err(e) = config::save_config_to(&self.config_path, &config) {
            log::error!("Could not store credentials, logging out again: {}", e);
            self.session.logout().await;
            self.ui.dialog(
                LOGIN_TITLE,
                &format!("Could not save your login: {}", e),
                MessageKind::Error,
            );
            return Err(e);
        }

        self.ui
            .dialog(LOGIN_TITLE, "Successfully logged in to ScapeCloud!", MessageKind::Info);
        self.ui.session_changed(true);
        Ok(())
    }

    /// Log out and forget the stored credentials. The session is cleared even
    /// when the settings file cannot be updated.
    pub async fn logout(&self) -> AppResult<()> {
        if self.session.logout().await {
            log::info!("Logged out of ScapeCloud");
        }
        self.ui.session_changed(false);

        let result = config::load_config_from(&self.config_path).and_then(|mut config| {
            if config.has_credentials() {
                config.clear_credentials();
                config::save_config_to(&self.config_path, &config)?;
            }
            Ok(())
        });

        if let Err(e) = &result {
            log::error!("Could not clear stored credentials: {}", e);
            self.ui.dialog(
                LOGIN_TITLE,
                &format!("Logged out, but the stored login could not be removed: {}", e),
                MessageKind::Error,
            );
        }
        result
    }

    /// Sign in with stored credentials, if any. A rejected login is logged and
    /// leaves the session logged out.
    pub async fn restore(&self) -> AppResult<bool> {
        let config = config::load_config_from(&self.config_path)?;
        if !config.has_credentials() {
            log::debug!("No stored ScapeCloud credentials");
            return Ok(false);
        }

        match self.session.authenticate(&config.email, &config.password).await {
            Ok(()) => {
                self.ui.session_changed(true);
                Ok(true)
            }
            Err(e) => {
                log::warn!("Could not restore ScapeCloud session: {}", e);
                Ok(false)
            }
        }
    }

    /// Forward forced logouts to the UI. Ends when the session is dropped.
    pub fn watch_session(&self) -> JoinHandle<()> {
        let mut events = self.session.subscribe();
        let ui = self.ui.clone();

        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(SessionEvent::LoggedOut(LogoutReason::RefreshFailed(reason))) => {
                        log::warn!("ScapeCloud session expired: {}", reason);
                        ui.dialog(
                            LOGIN_TITLE,
                            "Your ScapeCloud session expired. Please log in again.",
                            MessageKind::Error,
                        );
                        ui.session_changed(false);
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        log::debug!("Session watcher skipped {} events", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}
