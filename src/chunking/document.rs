//! Course document parsing.
//!
//! Expected layout:
//!
//! ```text
//! Course Title: <title>
//! Course Link: <url>            (optional)
//! Course Instructor: <name>     (optional)
//!
//! Lesson <N>: <title>
//! Lesson Link: <url>            (optional)
//! <lesson body text>
//! ```

use super::{Course, Lesson};
use crate::error::{KursError, Result};
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;
use tracing::{debug, warn};

/// A parsed course with the raw body of each lesson.
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub course: Course,
    /// Lesson bodies in lesson order.
    pub sections: Vec<LessonSection>,
}

/// The body text belonging to one lesson.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonSection {
    /// `None` when the document has no lesson markers at all.
    pub number: Option<u32>,
    pub body: String,
}

fn lesson_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^lesson\s+(\d+)\s*:\s*(.*)$").expect("Invalid regex"))
}

/// Return the value after `prefix` when `line` starts with it (ASCII case-insensitive).
fn field_value<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let head = line.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        line.get(prefix.len()..).map(str::trim)
    } else {
        None
    }
}

fn valid_link(raw: &str) -> Option<String> {
    if raw.is_empty() {
        return None;
    }
    match url::Url::parse(raw) {
        Ok(_) => Some(raw.to_string()),
        Err(e) => {
            warn!("Ignoring invalid link '{}': {}", raw, e);
            None
        }
    }
}

/// Parse a course document into its metadata and lesson bodies.
///
/// Fails only when the title line is missing. A document without lesson
/// markers yields a single unnumbered section holding the remaining text.
pub fn parse_course_document(text: &str) -> Result<ParsedDocument> {
    let lines: Vec<&str> = text.lines().collect();
    let mut idx = lines
        .iter()
        .position(|l| !l.trim().is_empty())
        .ok_or_else(|| KursError::Parse("document is empty".to_string()))?;

    let title = field_value(lines[idx].trim(), "Course Title:")
        .ok_or_else(|| KursError::Parse("missing 'Course Title:' line".to_string()))?;
    if title.is_empty() {
        return Err(KursError::Parse("course title is empty".to_string()));
    }
    let title = title.to_string();
    idx += 1;

    let mut source_link = None;
    let mut instructor = None;
    while idx < lines.len() {
        let line = lines[idx].trim();
        if line.is_empty() {
            idx += 1;
        } else if let Some(link) = field_value(line, "Course Link:") {
            source_link = valid_link(link);
            idx += 1;
        } else if let Some(name) = field_value(line, "Course Instructor:") {
            instructor = Some(name.to_string()).filter(|n| !n.is_empty());
            idx += 1;
        } else {
            break;
        }
    }

    let mut lessons = Vec::new();
    let mut sections = Vec::new();
    let mut preamble: Vec<&str> = Vec::new();
    let mut current: Option<(u32, Vec<&str>)> = None;
    let mut seen = HashSet::new();
    let mut saw_marker = false;

    while idx < lines.len() {
        let line = lines[idx];
        if let Some(caps) = lesson_marker().captures(line.trim()) {
            saw_marker = true;
            if let Some((number, body)) = current.take() {
                sections.push(LessonSection {
                    number: Some(number),
                    body: body.join("\n").trim().to_string(),
                });
            }

            let lesson_title = caps[2].trim().to_string();
            let mut link = None;
            if let Some(next) = (idx + 1..lines.len()).find(|&j| !lines[j].trim().is_empty()) {
                if let Some(raw) = field_value(lines[next].trim(), "Lesson Link:") {
                    link = valid_link(raw);
                    idx = next;
                }
            }

            match caps[1].parse::<u32>() {
                Ok(number) if seen.insert(number) => {
                    lessons.push(Lesson {
                        number,
                        title: lesson_title,
                        link,
                    });
                    current = Some((number, Vec::new()));
                }
                Ok(number) => {
                    warn!("Skipping duplicate lesson {} in '{}'", number, title);
                }
                Err(e) => {
                    warn!("Skipping lesson with unreadable number '{}': {}", &caps[1], e);
                }
            }
        } else if let Some((_, body)) = current.as_mut() {
            body.push(line);
        } else if !saw_marker {
            preamble.push(line);
        }
        idx += 1;
    }

    if let Some((number, body)) = current.take() {
        sections.push(LessonSection {
            number: Some(number),
            body: body.join("\n").trim().to_string(),
        });
    }

    if saw_marker {
        if preamble.iter().any(|l| !l.trim().is_empty()) {
            debug!("Ignoring text before the first lesson marker in '{}'", title);
        }
    } else {
        let body = preamble.join("\n").trim().to_string();
        if !body.is_empty() {
            sections.push(LessonSection { number: None, body });
        }
    }

    lessons.sort_by_key(|l| l.number);
    sections.sort_by_key(|s| s.number);

    Ok(ParsedDocument {
        course: Course {
            title,
            instructor,
            source_link,
            lessons,
        },
        sections,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_header() {
        let doc = "Course Title: MCP: Build Rich-Context AI Apps with Anthropic
Course Link: https://example.com/mcp
Course Instructor: Elie Schoppik

Lesson 0: Introduction
Lesson Link: https://example.com/mcp/0
Hello and welcome.

Lesson 1: Why MCP
Lesson Link: https://example.com/mcp/1
MCP standardizes context.
";
        let parsed = parse_course_document(doc).unwrap();
        let course = &parsed.course;

        assert_eq!(course.title, "MCP: Build Rich-Context AI Apps with Anthropic");
        assert_eq!(course.source_link.as_deref(), Some("https://example.com/mcp"));
        assert_eq!(course.instructor.as_deref(), Some("Elie Schoppik"));
        assert_eq!(course.lessons.len(), 2);
        assert_eq!(course.lessons[1].title, "Why MCP");
        assert_eq!(course.lessons[1].link.as_deref(), Some("https://example.com/mcp/1"));

        assert_eq!(parsed.sections[0].body, "Hello and welcome.");
        assert_eq!(parsed.sections[1].number, Some(1));
    }

    #[test]
    fn test_missing_title_is_fatal() {
        let err = parse_course_document("Lesson 1: Orphan\nSome text").unwrap_err();
        assert!(matches!(err, KursError::Parse(_)));

        assert!(parse_course_document("   \n\n").is_err());
        assert!(parse_course_document("Course Title:   \nbody").is_err());
    }

    #[test]
    fn test_no_lesson_markers_becomes_single_section() {
        let doc = "Course Title: Freeform\nCourse Instructor: Someone\n\nJust some notes.\nMore notes.";
        let parsed = parse_course_document(doc).unwrap();

        assert!(parsed.course.lessons.is_empty());
        assert_eq!(
            parsed.sections,
            vec![LessonSection {
                number: None,
                body: "Just some notes.\nMore notes.".to_string()
            }]
        );
    }

    #[test]
    fn test_optional_fields_absent() {
        let doc = "Course Title: Bare\n\nLesson 3: Only\nBody.";
        let parsed = parse_course_document(doc).unwrap();
        assert_eq!(parsed.course.source_link, None);
        assert_eq!(parsed.course.instructor, None);
        assert_eq!(parsed.course.lessons[0].number, 3);
        assert_eq!(parsed.course.lessons[0].link, None);
    }

    #[test]
    fn test_duplicate_lesson_number_skipped() {
        let doc = "Course Title: Dupes\n\nLesson 1: First\nAlpha.\n\nLesson 1: Again\nBeta.\n\nLesson 2: Second\nGamma.";
        let parsed = parse_course_document(doc).unwrap();

        assert_eq!(parsed.course.lessons.len(), 2);
        assert_eq!(parsed.course.lessons[0].title, "First");
        assert_eq!(parsed.sections.len(), 2);
        assert_eq!(parsed.sections[0].body, "Alpha.");
        assert_eq!(parsed.sections[1].body, "Gamma.");
    }

    #[test]
    fn test_lessons_sorted_and_non_contiguous() {
        let doc = "Course Title: Shuffled\n\nLesson 5: Five\nE.\n\nLesson 2: Two\nB.";
        let parsed = parse_course_document(doc).unwrap();
        let numbers: Vec<u32> = parsed.course.lessons.iter().map(|l| l.number).collect();
        assert_eq!(numbers, vec![2, 5]);
        assert_eq!(parsed.sections[0].body, "B.");
    }

    #[test]
    fn test_invalid_link_dropped() {
        let doc = "Course Title: Links\nCourse Link: not a url\n\nLesson 1: A\nBody.";
        let parsed = parse_course_document(doc).unwrap();
        assert_eq!(parsed.course.source_link, None);
    }
}
