//! Plain-text rendering of the presentation state for the terminal.

use crate::commands::analysis::{AppSnapshot, InputView};
use crate::models::classify_types::{ModelStatus, PredictionEntry};
use crate::services::analysis::PresentationView;
use crate::services::source::{InputMode, RemoteStatus};
use std::fmt::Write;

const BAR_WIDTH: usize = 30;

pub fn status_line(view: &PresentationView) -> &'static str {
    if view.analyzing {
        "ANALYZING..."
    } else {
        "SYSTEM ONLINE"
    }
}

pub fn prediction_card(view: &PresentationView) -> String {
    if view.analyzing {
        return "Processing Input...".to_string();
    }
    match (&view.top, &view.image) {
        (Some(top), Some(image)) => format!(
            "Detected Material\n  {}  ({:.1}%)\n  REF ID: {:06X}-{:04X}",
            top.category.display_name().to_uppercase(),
            top.percentage(),
            image.id(),
            view.generation
        ),
        (Some(top), None) => format!(
            "Detected Material\n  {}  ({:.1}%)",
            top.category.display_name().to_uppercase(),
            top.percentage()
        ),
        _ => "Awaiting visual input...".to_string(),
    }
}

fn bar(entry: &PredictionEntry) -> String {
    let filled = ((entry.probability.clamp(0.0, 1.0) * BAR_WIDTH as f32).round() as usize).min(BAR_WIDTH);
    format!("{}{}", "#".repeat(filled), ".".repeat(BAR_WIDTH - filled))
}

/// Ranking rows, best first.
pub fn ranking(entries: &[PredictionEntry]) -> String {
    if entries.is_empty() {
        return "Waiting for data feed...".to_string();
    }

    let mut out = String::new();
    for (i, entry) in entries.iter().enumerate() {
        let tag = if i == 0 { " MATCH" } else { "" };
        let _ = writeln!(
            out,
            "{:<26} {:>5.1}% [{}]{}",
            entry.category.display_name(),
            entry.percentage(),
            bar(entry),
            tag
        );
    }
    out.truncate(out.trim_end().len());
    out
}

fn input_line(input: &InputView) -> String {
    let mode = match input.mode {
        InputMode::Upload => "upload".to_string(),
        InputMode::Camera => format!("camera ({:?}, {} track(s))", input.facing, input.active_tracks),
    };
    let mut line = format!("Input: {}", mode);
    if let Some(preview) = &input.preview {
        let _ = write!(line, " | image #{} {} ({} bytes)", preview.id(), preview.mime(), preview.len());
    }
    if let RemoteStatus::ConnectionError { message } = &input.remote {
        let _ = write!(line, "\nCONNECTION ERROR: {} (type `dismiss`)", message);
    }
    line
}

pub fn snapshot(snapshot: &AppSnapshot) -> String {
    let view = &snapshot.analysis;
    let mut out = String::new();
    let _ = writeln!(out, "BioSort AI :: {}", status_line(view));
    let _ = writeln!(out, "{}", input_line(&snapshot.input));
    if let Some(error) = &view.error {
        let _ = writeln!(out, "ERROR: {}", error);
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", prediction_card(view));
    let _ = writeln!(out);
    let _ = writeln!(out, "Classification Ranking");
    let _ = write!(out, "{}", ranking(&view.ranked));
    out
}

pub fn model_status(status: &ModelStatus) -> String {
    let state = if status.ready {
        "ready"
    } else if status.loading {
        "loading"
    } else if status.downloaded {
        "downloaded"
    } else {
        "not downloaded"
    };
    let mut out = format!(
        "Model: {} [{}]",
        status.locator.as_deref().unwrap_or("-"),
        state
    );
    if !status.labels.is_empty() {
        let _ = write!(out, "\nLabels: {}", status.labels.join(", "));
    }
    if let Some(error) = &status.error {
        let _ = write!(out, "\nError: {}", error);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::classify_types::WasteCategory;
    use crate::services::analysis::AnalysisSession;
    use crate::services::ranking::rank;

    fn idle_view() -> PresentationView {
        AnalysisSession::new().view()
    }

    #[test]
    fn test_idle_placeholders() {
        let view = idle_view();
        assert_eq!(status_line(&view), "SYSTEM ONLINE");
        assert_eq!(prediction_card(&view), "Awaiting visual input...");
        assert_eq!(ranking(&view.ranked), "Waiting for data feed...");
    }

    #[test]
    fn test_analyzing_card() {
        let mut view = idle_view();
        view.analyzing = true;
        assert_eq!(status_line(&view), "ANALYZING...");
        assert_eq!(prediction_card(&view), "Processing Input...");
    }

    #[test]
    fn test_ranking_rows() {
        let set = rank(&[
            PredictionEntry::new(WasteCategory::Plastic, 0.951),
            PredictionEntry::new(WasteCategory::Chemical, 0.049),
        ])
        .unwrap();
        let text = ranking(set.ranked());
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("Plastic/Recyclable Waste"));
        assert!(lines[0].contains("95.1%"));
        assert!(lines[0].ends_with("MATCH"));
        assert!(lines[1].contains("4.9%"));
        assert!(!lines[1].contains("MATCH"));
        assert!(lines[3].contains("0.0%"));
    }

    #[test]
    fn test_bar_width() {
        assert_eq!(bar(&PredictionEntry::new(WasteCategory::General, 1.0)), "#".repeat(BAR_WIDTH));
        assert_eq!(bar(&PredictionEntry::new(WasteCategory::General, 0.0)), ".".repeat(BAR_WIDTH));
    }
}
