//! Courses command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the courses command.
pub async fn run_courses(settings: Settings) -> Result<()> {
    let orchestrator = Orchestrator::new(settings)?;
    let store = orchestrator.course_store();

    let analytics = match orchestrator.course_analytics().await {
        Ok(analytics) => analytics,
        Err(e) => {
            Output::error(&format!("Failed to list courses: {}", e));
            return Err(e.into());
        }
    };

    if analytics.total_courses == 0 {
        Output::info("No courses ingested yet. Use 'kurs ingest <path>' to add content.");
        return Ok(());
    }

    Output::header(&format!("Courses ({})", analytics.total_courses));
    println!();

    for title in &analytics.course_titles {
        match store.course_outline(title).await? {
            Some(course) => {
                let instructor = course
                    .instructor
                    .map(|i| format!(", {}", i))
                    .unwrap_or_default();
                Output::list_item(&format!(
                    "{} ({} lessons{})",
                    course.title,
                    course.lessons.len(),
                    instructor
                ));
            }
            None => Output::list_item(title),
        }
    }

    println!();
    Output::kv("Total courses", &analytics.total_courses.to_string());
    Output::kv("Total chunks", &store.chunk_count().await?.to_string());

    Ok(())
}
