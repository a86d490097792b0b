//! Ingest command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the ingest command.
pub async fn run_ingest(path: &str, clear: bool, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Ingest) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let path = Settings::expand_path(path);
    let orchestrator = Orchestrator::new(settings)?;

    if path.is_dir() {
        let spinner = Output::spinner(&format!("Ingesting courses from {}...", path.display()));
        let result = orchestrator.add_course_folder(&path, clear).await;
        spinner.finish_and_clear();

        let (courses, chunks) = result?;
        if courses == 0 {
            Output::info("No new courses found.");
        } else {
            Output::success(&format!("Added {} courses with {} chunks", courses, chunks));
        }
        return Ok(());
    }

    if clear {
        Output::warning("--clear only applies to folders, ignoring it.");
    }

    let spinner = Output::spinner(&format!("Ingesting {}...", path.display()));
    let result = orchestrator.add_course_document(&path).await;
    spinner.finish_and_clear();

    match result {
        Ok(Some(ingested)) => {
            Output::success(&format!(
                "Added '{}' with {} chunks",
                ingested.course.title, ingested.chunks_added
            ));
            Output::kv("Lessons", &ingested.course.lessons.len().to_string());
            if let Some(instructor) = &ingested.course.instructor {
                Output::kv("Instructor", instructor);
            }
        }
        Ok(None) => Output::info("Course already ingested, skipping."),
        Err(e) => {
            Output::error(&format!("Failed to ingest {}: {}", path.display(), e));
            return Err(e.into());
        }
    }

    Ok(())
}
