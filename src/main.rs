use anyhow::{bail, Context};
use std::path::Path;
use std::str::FromStr;

use scapecloud_uploader::config::{self, Config};
use scapecloud_uploader::events::{ui_channel, MessageKind, UiEvent};
use scapecloud_uploader::security::InputValidator;
use scapecloud_uploader::{IdentityClient, LoginController, SessionManager, UploadClient};

const USAGE: &str = "usage: scapecloud <command>

commands:
  login <email> <password>        sign in and remember the credentials
  logout                          sign out and forget the credentials
  status                          show the stored account and session state
  upload <file.png> [meta.json]   upload a screenshot with optional metadata";

fn init_logging(config: &Config) {
    let level = log::LevelFilter::from_str(&config.log_level).unwrap_or(log::LevelFilter::Info);

    // RUST_LOG wins over the configured level
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn print_event(event: UiEvent) {
    match event {
        UiEvent::Notify { message } => println!("{}", message),
        UiEvent::Dialog {
            title,
            message,
            kind,
        } => match kind {
            MessageKind::Info => println!("[{}] {}", title, message),
            MessageKind::Error => eprintln!("[{}] {}", title, message),
        },
        UiEvent::ChatMessage { message, kind } => match kind {
            MessageKind::Info => println!("{}", message),
            MessageKind::Error => eprintln!("{}", message),
        },
        UiEvent::CopyToClipboard { text } => println!("{}", text),
        UiEvent::SessionChanged { authenticated } => {
            log::debug!("Session changed, authenticated = {}", authenticated)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = config::migrate_config() {
        eprintln!("Failed to migrate configuration: {}", e);
    }

    let config_path = config::get_config_path().context("locating the config file")?;
    let config = config::load_config_from(&config_path).context("loading the config file")?;
    init_logging(&config);

    log::info!("Starting ScapeCloud uploader");

    let endpoints = config.endpoints.clone().with_env_overrides();
    let session = SessionManager::new(IdentityClient::new(&endpoints)?);

    let (ui, mut ui_events) = ui_channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = ui_events.recv().await {
            print_event(event);
        }
    });

    let controller = LoginController::new(session.clone(), ui, config_path);
    let args: Vec<String> = std::env::args().skip(1).collect();

    let result = match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["login", email, password] => controller
            .login(email, password)
            .await
            .map_err(anyhow::Error::from),
        ["logout"] => controller.logout().await.map_err(anyhow::Error::from),
        ["status"] => status(&controller, &config).await,
        ["upload", file] => upload(&controller, &endpoints, file, None).await,
        ["upload", file, metadata] => upload(&controller, &endpoints, file, Some(*metadata)).await,
        _ => {
            eprintln!("{}", USAGE);
            Ok(())
        }
    };

    // Drop every sender so the printer drains and exits
    drop(controller);
    drop(session);
    let _ = printer.await;

    result
}

async fn status(controller: &LoginController, config: &Config) -> anyhow::Result<()> {
    if !config.has_credentials() {
        println!("Not logged in");
        return Ok(());
    }

    let restored = controller.restore().await?;
    let session = controller.session().snapshot();
    println!("Account: {}", config.email);
    match (restored, session.expires_at()) {
        (true, Some(expires_at)) => println!("Session valid until {}", expires_at),
        _ => println!("Stored credentials were rejected"),
    }
    Ok(())
}

async fn upload(
    controller: &LoginController,
    endpoints: &config::Endpoints,
    file: &str,
    metadata_file: Option<&str>,
) -> anyhow::Result<()> {
    InputValidator::validate_image_file(file)?;

    if !controller.restore().await? {
        bail!("Log in first with `scapecloud login <email> <password>`");
    }

    let metadata = match metadata_file {
        Some(path) => {
            let text = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading {}", path))?;
            serde_json::from_str::<serde_json::Value>(&text)
                .with_context(|| format!("{} is not valid JSON", path))?;
            text
        }
        None => String::new(),
    };

    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("reading {}", file))?;
    let file_name = Path::new(file)
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "screenshot.png".to_string());

    let client = UploadClient::new(endpoints, controller.session().clone())?;
    let link = client.upload_bytes(bytes, &file_name, metadata).await?;
    println!("{}", link);
    Ok(())
}
