use crate::commands::{self, AppState};
use crate::error::AppError;
use crate::render;
use crate::services::source::camera::interface::FacingMode;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};

const HELP: &str = "\
Commands:
  file <path>          classify an image file
  drop <path>...       classify the first image among the paths
  camera [user|env]    open the camera
  capture              capture the camera frame and classify it
  stop                 close the camera
  remote               capture from the network camera
  reset                clear result and input
  dismiss              dismiss the current error
  status               show the current state
  model                load the model and show its status
  help                 this text
  quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    File(PathBuf),
    Drop(Vec<PathBuf>),
    Camera(Option<FacingMode>),
    Capture,
    Stop,
    Remote,
    Reset,
    Dismiss,
    Status,
    Model,
    Help,
    Quit,
}

pub fn parse_line(line: &str) -> Result<Option<ShellCommand>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word.to_lowercase().as_str() {
        "file" | "open" => {
            if rest.is_empty() {
                return Err("usage: file <path>".into());
            }
            ShellCommand::File(PathBuf::from(rest))
        }
        "drop" => {
            let paths: Vec<PathBuf> = rest.split_whitespace().map(PathBuf::from).collect();
            if paths.is_empty() {
                return Err("usage: drop <path>...".into());
            }
            ShellCommand::Drop(paths)
        }
        "camera" => match rest {
            "" => ShellCommand::Camera(None),
            "user" | "front" => ShellCommand::Camera(Some(FacingMode::User)),
            "env" | "environment" | "rear" => ShellCommand::Camera(Some(FacingMode::Environment)),
            other => return Err(format!("unknown facing mode '{}'", other)),
        },
        "capture" | "snap" => ShellCommand::Capture,
        "stop" => ShellCommand::Stop,
        "remote" => ShellCommand::Remote,
        "reset" | "clear" => ShellCommand::Reset,
        "dismiss" => ShellCommand::Dismiss,
        "status" => ShellCommand::Status,
        "model" => ShellCommand::Model,
        "help" | "?" => ShellCommand::Help,
        "quit" | "exit" | "q" => ShellCommand::Quit,
        other => return Err(format!("unknown command '{}', type `help`", other)),
    };
    Ok(Some(command))
}

pub async fn print_state(state: &AppState, json: bool) {
    let snapshot = commands::analysis::get_analysis_state(state).await;
    if json {
        match serde_json::to_string_pretty(&snapshot) {
            Ok(text) => println!("{}", text),
            Err(e) => log::error!("Failed to serialize state: {}", e),
        }
    } else {
        println!("{}", render::snapshot(&snapshot));
    }
}

fn report(result: Result<(), AppError>) {
    if let Err(e) = result {
        println!("! {}", e);
    }
}

/// Returns false when the session should end.
async fn execute(state: &AppState, command: ShellCommand, json: bool) -> bool {
    match command {
        ShellCommand::File(path) => {
            report(commands::input::classify_file(state, path).await.map(|_| ()));
            print_state(state, json).await;
        }
        ShellCommand::Drop(paths) => {
            match commands::input::classify_drop(state, paths).await {
                Ok(None) => println!("(nothing to classify)"),
                other => report(other.map(|_| ())),
            }
            print_state(state, json).await;
        }
        ShellCommand::Camera(facing) => {
            report(commands::input::start_camera(state, facing).await);
            print_state(state, json).await;
        }
        ShellCommand::Capture => {
            report(commands::input::capture_camera(state).await.map(|_| ()));
            print_state(state, json).await;
        }
        ShellCommand::Stop => {
            commands::input::stop_camera(state).await;
            print_state(state, json).await;
        }
        ShellCommand::Remote => {
            report(commands::input::capture_remote(state).await.map(|_| ()));
            print_state(state, json).await;
        }
        ShellCommand::Reset => {
            commands::analysis::reset(state).await;
            print_state(state, json).await;
        }
        ShellCommand::Dismiss => {
            commands::analysis::dismiss_error(state).await;
            print_state(state, json).await;
        }
        ShellCommand::Status => print_state(state, json).await,
        ShellCommand::Model => match commands::classifier::load_model(state).await {
            Ok(status) => println!("{}", render::model_status(&status)),
            Err(e) => println!("! {}", e),
        },
        ShellCommand::Help => println!("{}", HELP),
        ShellCommand::Quit => return false,
    }
    true
}

/// Read commands from stdin until `quit` or end of input.
pub async fn run(state: &AppState, json: bool) -> Result<(), AppError> {
    println!("BioSort AI :: Biomedical Waste Classification (type `help`)");
    print_state(state, json).await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let Some(line) = lines.next_line().await? else {
            break;
        };
        match parse_line(&line) {
            Ok(Some(command)) => {
                if !execute(state, command, json).await {
                    break;
                }
            }
            Ok(None) => {}
            Err(message) => println!("! {}", message),
        }
    }

    commands::input::stop_camera(state).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            parse_line("file /tmp/bottle photo.jpg"),
            Ok(Some(ShellCommand::File(PathBuf::from("/tmp/bottle photo.jpg"))))
        );
        assert_eq!(
            parse_line("drop a.txt b.png"),
            Ok(Some(ShellCommand::Drop(vec![PathBuf::from("a.txt"), PathBuf::from("b.png")])))
        );
        assert_eq!(
            parse_line("camera user"),
            Ok(Some(ShellCommand::Camera(Some(FacingMode::User))))
        );
        assert_eq!(parse_line("  QUIT "), Ok(Some(ShellCommand::Quit)));
        assert_eq!(parse_line("   "), Ok(None));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_line("file").is_err());
        assert!(parse_line("camera sideways").is_err());
        assert!(parse_line("launch").is_err());
    }
}
