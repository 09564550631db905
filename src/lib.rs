pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod models;
pub mod render;
pub mod services;
pub mod shell;

use clap::Parser;
use cli::{Args, Command};
use commands::AppState;
use config::AppConfig;
use error::AppError;
use services::analysis::AnalysisState;
use services::source::camera::impl_command::CommandCamera;
use std::sync::Arc;
use std::time::Duration;

pub fn run() {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    let args = Args::parse();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            log::error!("Failed to start runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(execute(args)) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

async fn execute(args: Args) -> Result<(), AppError> {
    let mut config = AppConfig::load(args.config.as_deref())?;
    args.apply(&mut config);

    let camera = Arc::new(CommandCamera::new(config.camera.clone()));
    let state = AppState::with_backend(config, args.backend, camera)?;
    log::info!("Classifier backend: {}", state.classifier.name());

    let outcome = match args.command.clone().unwrap_or(Command::Interactive) {
        Command::Interactive => return shell::run(&state, args.json).await,
        Command::Model => {
            let status = commands::classifier::load_model(&state).await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                println!("{}", render::model_status(&status));
            }
            return Ok(());
        }
        Command::Classify { path } => commands::input::classify_file(&state, path).await,
        Command::Drop { paths } => match commands::input::classify_drop(&state, paths).await? {
            Some(outcome) => Ok(outcome),
            None => {
                log::info!("No image among the dropped paths");
                shell::print_state(&state, args.json).await;
                return Ok(());
            }
        },
        Command::Camera {
            facing,
            capture_after_ms,
        } => {
            commands::input::start_camera(&state, Some(facing)).await?;
            tokio::time::sleep(Duration::from_millis(capture_after_ms)).await;
            commands::input::capture_camera(&state).await
        }
        Command::Remote { .. } => commands::input::capture_remote(&state).await,
    };

    shell::print_state(&state, args.json).await;

    match outcome? {
        AnalysisState::Idle { error: Some(error) } => Err(AppError::inference(error)),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;
    use std::path::Path;

    fn argv(config: &Path, command: &str, path: &Path) -> Vec<OsString> {
        vec![
            "biosort".into(),
            "--config".into(),
            config.as_os_str().to_owned(),
            "--backend".into(),
            "demo".into(),
            command.into(),
            path.as_os_str().to_owned(),
        ]
    }

    #[tokio::test]
    async fn test_drop_without_images_is_not_a_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let config = tmp.path().join("config.json");
        let notes = tmp.path().join("notes.txt");
        std::fs::write(&config, "{}").unwrap();
        std::fs::write(&notes, "handover notes").unwrap();

        let args = Args::parse_from(argv(&config, "drop", &notes));

        assert!(execute(args).await.is_ok());
    }

    #[tokio::test]
    async fn test_classify_non_image_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let config = tmp.path().join("config.json");
        let notes = tmp.path().join("notes.txt");
        std::fs::write(&config, "{}").unwrap();
        std::fs::write(&notes, "handover notes").unwrap();

        let args = Args::parse_from(argv(&config, "classify", &notes));

        let err = execute(args).await.unwrap_err();
        assert_eq!(err.kind, error::ErrorKind::Acquisition);
    }
}
