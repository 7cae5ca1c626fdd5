//! Section and student records.

use serde::{Deserialize, Serialize};

use crate::error::QueryError;
use crate::query::Value;
use crate::result::Row;

/// Section record from database
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Section {
    pub section_id: i32,
    pub section_name: String,
}

/// Student record from database
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Student {
    pub student_id: i32,
    pub first_name: String,
    pub last_name: String,
    pub year_result: Option<f64>,
    pub login: String,
    pub course_id: Option<i32>,
    pub section_id: i32,
}

/// Input of the insert workflow.
///
/// `section_name` is only consulted when `section_id` does not exist yet; a
/// missing name on that path is left for the store to reject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewStudent {
    pub first_name: String,
    pub last_name: String,
    pub year_result: f64,
    pub login: String,
    pub course_id: Option<i32>,
    pub section_id: i32,
    pub section_name: Option<String>,
}

/// Outcome of a committed insert workflow.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AddedStudent {
    pub student_id: i32,
    pub section_created: bool,
}

fn column<'r>(row: &'r Row, name: &str) -> Result<&'r Value, QueryError> {
    row.get(name)
        .ok_or_else(|| QueryError::Decode(format!("missing column '{name}'")))
}

fn required_i32(row: &Row, name: &str) -> Result<i32, QueryError> {
    column(row, name)?
        .as_i32()
        .ok_or_else(|| QueryError::Decode(format!("column '{name}' is not a non-null integer")))
}

fn required_text(row: &Row, name: &str) -> Result<String, QueryError> {
    column(row, name)?
        .as_str()
        .map(str::to_owned)
        .ok_or_else(|| QueryError::Decode(format!("column '{name}' is not non-null text")))
}

impl TryFrom<&Row> for Section {
    type Error = QueryError;

    fn try_from(row: &Row) -> Result<Self, Self::Error> {
        Ok(Self {
            section_id: required_i32(row, "section_id")?,
            section_name: required_text(row, "section_name")?,
        })
    }
}

impl TryFrom<&Row> for Student {
    type Error = QueryError;

    fn try_from(row: &Row) -> Result<Self, Self::Error> {
        Ok(Self {
            student_id: required_i32(row, "student_id")?,
            first_name: required_text(row, "first_name")?,
            last_name: required_text(row, "last_name")?,
            year_result: column(row, "year_result")?.as_f64(),
            login: required_text(row, "login")?,
            course_id: column(row, "course_id")?.as_i32(),
            section_id: required_i32(row, "section_id")?,
        })
    }
}
