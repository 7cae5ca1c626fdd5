//! Student repository
//!
//! Handles:
//! - Atomic insert: ensure the section exists, then insert the student, in one
//!   transaction (both rows or neither)
//! - Listing, optionally by section, and lookup by login
//!
//! Student ids are `max + 1`. The table is locked in SHARE ROW EXCLUSIVE mode
//! right after BEGIN so two concurrent inserts queue instead of computing the
//! same id. The lock comes before any query, so snapshot isolation levels
//! still see the previous writer's row.

use tracing::{error, info, warn};

use crate::config::IsolationLevel;
use crate::error::{QueryError, Result, TransactionError, TxStage};
use crate::executor::QueryExecutor;
use crate::models::{AddedStudent, NewStudent, Student};
use crate::query::Query;
use crate::sections::SectionRepo;
use crate::transaction::Transaction;

const LOCK_STUDENTS: &str = "LOCK TABLE student IN SHARE ROW EXCLUSIVE MODE";

const INSERT_STUDENT: &str = r#"
    INSERT INTO student
        (student_id, first_name, last_name, year_result, login, course_id, section_id)
    SELECT COALESCE(MAX(student_id), 0) + 1, $1, $2, $3, $4, $5, $6
    FROM student
    RETURNING student_id
"#;

const STUDENT_COLUMNS_ALL: &str = r#"
    SELECT student_id, first_name, last_name, year_result, login, course_id, section_id
    FROM student
    ORDER BY student_id
"#;

const STUDENT_COLUMNS_BY_SECTION: &str = r#"
    SELECT student_id, first_name, last_name, year_result, login, course_id, section_id
    FROM student
    WHERE section_id = $1
    ORDER BY student_id
"#;

const STUDENT_BY_LOGIN: &str = r#"
    SELECT student_id, first_name, last_name, year_result, login, course_id, section_id
    FROM student
    WHERE login = $1
    ORDER BY student_id
"#;

/// Student repository
pub struct StudentRepo<'e, E: QueryExecutor + ?Sized> {
    executor: &'e mut E,
    isolation: IsolationLevel,
}

impl<'e, E: QueryExecutor + ?Sized> StudentRepo<'e, E> {
    pub fn new(executor: &'e mut E) -> Self {
        Self {
            executor,
            isolation: IsolationLevel::default(),
        }
    }

    pub fn with_isolation(mut self, isolation: IsolationLevel) -> Self {
        self.isolation = isolation;
        self
    }

    /// Insert a student, creating its section first if needed (atomic).
    ///
    /// On any failure after BEGIN the transaction is rolled back and the
    /// original statement error is returned inside a [`TransactionError`].
    pub async fn add(&mut self, student: &NewStudent) -> std::result::Result<AddedStudent, TransactionError> {
        let mut tx = Transaction::begin(&mut *self.executor, self.isolation)
            .await
            .map_err(|source| {
                error!(error = %source, "could not open transaction");
                TransactionError {
                    stage: TxStage::Begin,
                    source,
                    rollback: None,
                }
            })?;

        let outcome = match insert_within(&mut tx, student).await {
            Ok(added) => tx.commit().await.map(|()| added).map_err(|e| (TxStage::Commit, e)),
            Err(failure) => Err(failure),
        };

        match outcome {
            Ok(added) => {
                info!(
                    student_id = added.student_id,
                    section_id = student.section_id,
                    section_created = added.section_created,
                    "student added"
                );
                Ok(added)
            }
            Err((stage, source)) => {
                warn!(%stage, error = %source, "rolling back student insert");
                let rollback = tx.rollback().await.err();
                if let Some(rollback_error) = &rollback {
                    error!(error = %rollback_error, "rollback failed");
                }
                Err(TransactionError {
                    stage,
                    source,
                    rollback,
                })
            }
        }
    }

    /// Students ordered by id, optionally restricted to one section.
    pub async fn list(&mut self, section_id: Option<i32>) -> Result<Vec<Student>> {
        let query = match section_id {
            Some(id) => Query::new(STUDENT_COLUMNS_BY_SECTION).bind(id),
            None => Query::new(STUDENT_COLUMNS_ALL),
        };
        let result = self.executor.execute(&query).await?;
        result.rows.iter().map(Student::try_from).collect()
    }

    /// Students whose login is exactly `login`.
    pub async fn find_by_login(&mut self, login: &str) -> Result<Vec<Student>> {
        let result = self
            .executor
            .execute(&Query::new(STUDENT_BY_LOGIN).bind(login))
            .await?;
        result.rows.iter().map(Student::try_from).collect()
    }
}

/// Everything between BEGIN and COMMIT.
async fn insert_within<E: QueryExecutor + ?Sized>(
    tx: &mut Transaction<'_, E>,
    student: &NewStudent,
) -> std::result::Result<AddedStudent, (TxStage, QueryError)> {
    tx.execute(&Query::new(LOCK_STUDENTS))
        .await
        .map_err(|e| (TxStage::Lock, e))?;

    let section_created = SectionRepo::new(&mut *tx)
        .ensure_exists(student.section_id, student.section_name.as_deref())
        .await
        .map_err(|e| (TxStage::ResolveSection, e))?;

    let inserted = tx
        .execute(
            &Query::new(INSERT_STUDENT)
                .named("insert_student")
                .bind(student.first_name.as_str())
                .bind(student.last_name.as_str())
                .bind(student.year_result)
                .bind(student.login.as_str())
                .bind(student.course_id)
                .bind(student.section_id),
        )
        .await
        .map_err(|e| (TxStage::InsertStudent, e))?;

    let student_id = inserted
        .first()
        .and_then(|row| row.get("student_id"))
        .and_then(|v| v.as_i32())
        .ok_or_else(|| {
            (
                TxStage::InsertStudent,
                QueryError::Decode("insert returned no student_id".to_string()),
            )
        })?;

    Ok(AddedStudent {
        student_id,
        section_created,
    })
}
