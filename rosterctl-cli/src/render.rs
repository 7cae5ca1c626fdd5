//! Console and JSON presentation of query results.

use std::fmt::Write as _;

use anyhow::Result;
use rosterctl_core::{AddedStudent, NewStudent, Section, Student};
use serde_json::json;

use crate::commands::OutputFormat;

/// `<id> - <name>` per section.
pub fn sections(sections: &[Section], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(sections)? + "\n"),
        OutputFormat::Text => {
            let mut out = String::new();
            for section in sections {
                writeln!(out, "{} - {}", section.section_id, section.section_name)?;
            }
            Ok(out)
        }
    }
}

pub fn students(students: &[Student], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(students)? + "\n"),
        OutputFormat::Text => {
            let mut out = String::new();
            for s in students {
                let result = s
                    .year_result
                    .map(|r| r.to_string())
                    .unwrap_or_else(|| "-".to_string());
                writeln!(
                    out,
                    "{:>5}  {} {} ({})  section {}  result {}",
                    s.student_id, s.first_name, s.last_name, s.login, s.section_id, result
                )?;
            }
            Ok(out)
        }
    }
}

pub fn added(added: &AddedStudent, student: &NewStudent, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&json!({
            "student_id": added.student_id,
            "section_id": student.section_id,
            "section_created": added.section_created,
        }))? + "\n"),
        OutputFormat::Text => {
            let mut out = String::new();
            if added.section_created {
                writeln!(out, "Created section {}", student.section_id)?;
            }
            writeln!(
                out,
                "Added student {} ({} {}) to section {}",
                added.student_id, student.first_name, student.last_name, student.section_id
            )?;
            Ok(out)
        }
    }
}
