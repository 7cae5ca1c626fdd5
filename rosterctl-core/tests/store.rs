//! Database-backed tests for the section/student workflow.
//!
//! Run with: DATABASE_URL=postgres://... cargo test -p rosterctl-core -- --ignored

use std::time::Duration;

use rosterctl_core::{
    Constraint, ErrorKind, IsolationLevel, NewStudent, Query, QueryError, QueryExecutor,
    SectionRepo, Session, SessionOptions, StudentRepo, Transaction, TxStage,
};
use sqlx::PgPool;

async fn session(pool: &PgPool) -> anyhow::Result<Session> {
    let conn = pool.acquire().await?.detach();
    Ok(Session::from_connection(conn, SessionOptions::default()))
}

async fn seed_section(pool: &PgPool, id: i32, name: &str) -> anyhow::Result<()> {
    sqlx::query("INSERT INTO section (section_id, section_name, delegate_id) VALUES ($1, $2, 1)")
        .bind(id)
        .bind(name)
        .execute(pool)
        .await?;
    Ok(())
}

async fn seed_student(pool: &PgPool, id: i32, login: &str, section_id: i32) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO student (student_id, first_name, last_name, year_result, login, course_id, section_id)
        VALUES ($1, 'Seed', 'Student', 12.0, $2, NULL, $3)
        "#,
    )
    .bind(id)
    .bind(login)
    .bind(section_id)
    .execute(pool)
    .await?;
    Ok(())
}

async fn count(pool: &PgPool, sql: &'static str, id: i32) -> anyhow::Result<i64> {
    Ok(sqlx::query_scalar(sql).bind(id).fetch_one(pool).await?)
}

async fn sections_with_id(pool: &PgPool, id: i32) -> anyhow::Result<i64> {
    count(pool, "SELECT COUNT(*) FROM section WHERE section_id = $1", id).await
}

async fn students_in_section(pool: &PgPool, id: i32) -> anyhow::Result<i64> {
    count(pool, "SELECT COUNT(*) FROM student WHERE section_id = $1", id).await
}

fn student(login: &str, section_id: i32, section_name: Option<&str>) -> NewStudent {
    NewStudent {
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
        year_result: 17.5,
        login: login.to_string(),
        course_id: None,
        section_id,
        section_name: section_name.map(str::to_owned),
    }
}

#[sqlx::test(migrator = "rosterctl_core::MIGRATOR")]
#[ignore = "requires database"]
async fn existing_section_is_left_alone(pool: PgPool) -> anyhow::Result<()> {
    seed_section(&pool, 1010, "Informatique").await?;
    let mut session = session(&pool).await?;
    let mut repo = SectionRepo::new(&mut session);

    assert!(!repo.ensure_exists(1010, Some("Autre nom")).await?);
    assert!(!repo.ensure_exists(1010, None).await?);

    let section = repo.get(1010).await?.expect("section exists");
    assert_eq!(section.section_name, "Informatique");
    assert_eq!(sections_with_id(&pool, 1010).await?, 1);
    Ok(())
}

#[sqlx::test(migrator = "rosterctl_core::MIGRATOR")]
#[ignore = "requires database"]
async fn absent_section_is_created(pool: PgPool) -> anyhow::Result<()> {
    let mut session = session(&pool).await?;
    let mut repo = SectionRepo::new(&mut session);

    assert!(repo.ensure_exists(4242, Some("Chimie")).await?);
    assert_eq!(repo.get(4242).await?.map(|s| s.section_name), Some("Chimie".to_string()));

    let listed = repo.list().await?;
    assert_eq!(listed.len(), 1);
    Ok(())
}

#[sqlx::test(migrator = "rosterctl_core::MIGRATOR")]
#[ignore = "requires database"]
async fn add_student_commits_with_next_id(pool: PgPool) -> anyhow::Result<()> {
    seed_section(&pool, 1010, "Informatique").await?;
    seed_student(&pool, 1, "first", 1010).await?;
    seed_student(&pool, 5, "fifth", 1010).await?;

    let mut session = session(&pool).await?;
    let added = StudentRepo::new(&mut session)
        .add(&student("lovelace", 1010, None))
        .await?;

    assert_eq!(added.student_id, 6);
    assert!(!added.section_created);

    let login: String = sqlx::query_scalar("SELECT login FROM student WHERE student_id = 6")
        .fetch_one(&pool)
        .await?;
    assert_eq!(login, "lovelace");
    Ok(())
}

#[sqlx::test(migrator = "rosterctl_core::MIGRATOR")]
#[ignore = "requires database"]
async fn add_student_creates_section(pool: PgPool) -> anyhow::Result<()> {
    let mut session = session(&pool).await?;
    let added = StudentRepo::new(&mut session)
        .add(&student("lovelace", 77, Some("Mathématiques")))
        .await?;

    assert_eq!(added.student_id, 1);
    assert!(added.section_created);
    assert_eq!(sections_with_id(&pool, 77).await?, 1);
    assert_eq!(students_in_section(&pool, 77).await?, 1);
    Ok(())
}

#[sqlx::test(migrator = "rosterctl_core::MIGRATOR")]
#[ignore = "requires database"]
async fn missing_section_name_rolls_back_everything(pool: PgPool) -> anyhow::Result<()> {
    let mut session = session(&pool).await?;
    let err = StudentRepo::new(&mut session)
        .add(&NewStudent {
            first_name: "Gontran".to_string(),
            last_name: "Bonheur".to_string(),
            year_result: 21.0,
            login: "bonheur".to_string(),
            course_id: None,
            section_id: 4242,
            section_name: None,
        })
        .await
        .unwrap_err();

    assert_eq!(err.stage, TxStage::ResolveSection);
    assert_eq!(
        err.cause().kind(),
        ErrorKind::ConstraintViolation(Constraint::NotNull)
    );
    assert!(err.rolled_back_cleanly());
    assert_eq!(sections_with_id(&pool, 4242).await?, 0);
    assert_eq!(students_in_section(&pool, 4242).await?, 0);

    // the session is usable again after the rollback
    let students = StudentRepo::new(&mut session).list(None).await?;
    assert!(students.is_empty());
    Ok(())
}

#[sqlx::test(migrator = "rosterctl_core::MIGRATOR")]
#[ignore = "requires database"]
async fn failed_student_insert_discards_new_section(pool: PgPool) -> anyhow::Result<()> {
    let mut session = session(&pool).await?;
    let mut bad = student("lovelace", 88, Some("Physique"));
    bad.course_id = Some(999);

    let err = StudentRepo::new(&mut session).add(&bad).await.unwrap_err();

    assert_eq!(err.stage, TxStage::InsertStudent);
    assert_eq!(
        err.cause().kind(),
        ErrorKind::ConstraintViolation(Constraint::ForeignKey)
    );
    assert_eq!(sections_with_id(&pool, 88).await?, 0);
    Ok(())
}

#[sqlx::test(migrator = "rosterctl_core::MIGRATOR")]
#[ignore = "requires database"]
async fn uncommitted_section_is_invisible_to_others(pool: PgPool) -> anyhow::Result<()> {
    let mut session = session(&pool).await?;
    let mut tx = Transaction::begin(&mut session, IsolationLevel::ReadCommitted).await?;

    let created = SectionRepo::new(&mut tx)
        .ensure_exists(31, Some("Biologie"))
        .await?;
    assert!(created);

    // visible inside the transaction
    assert!(SectionRepo::new(&mut tx).get(31).await?.is_some());
    // not outside it
    assert_eq!(sections_with_id(&pool, 31).await?, 0);

    tx.commit().await?;
    assert_eq!(sections_with_id(&pool, 31).await?, 1);
    Ok(())
}

#[sqlx::test(migrator = "rosterctl_core::MIGRATOR")]
#[ignore = "requires database"]
async fn concurrent_adds_get_distinct_ids(pool: PgPool) -> anyhow::Result<()> {
    seed_section(&pool, 1010, "Informatique").await?;
    let mut first = session(&pool).await?;
    let mut second = session(&pool).await?;

    let a = student("a", 1010, None);
    let b = student("b", 1010, None);
    let mut repo_a = StudentRepo::new(&mut first);
    let mut repo_b = StudentRepo::new(&mut second);
    let (added_a, added_b) = tokio::join!(repo_a.add(&a), repo_b.add(&b));

    let mut ids = vec![added_a?.student_id, added_b?.student_id];
    ids.sort();
    assert_eq!(ids, vec![1, 2]);
    Ok(())
}

#[sqlx::test(migrator = "rosterctl_core::MIGRATOR")]
#[ignore = "requires database"]
async fn hostile_filter_value_matches_literally(pool: PgPool) -> anyhow::Result<()> {
    let hostile = "' OR 1=1; --";
    seed_section(&pool, 1010, "Informatique").await?;
    seed_student(&pool, 1, "alice", 1010).await?;
    seed_student(&pool, 2, "bob", 1010).await?;

    let mut session = session(&pool).await?;
    let mut repo = StudentRepo::new(&mut session);
    assert!(repo.find_by_login(hostile).await?.is_empty());

    seed_student(&pool, 3, hostile, 1010).await?;
    let matched = repo.find_by_login(hostile).await?;
    assert_eq!(matched.len(), 1);
    assert_eq!(matched[0].student_id, 3);

    assert_eq!(repo.list(Some(1010)).await?.len(), 3);
    Ok(())
}

#[sqlx::test(migrator = "rosterctl_core::MIGRATOR")]
#[ignore = "requires database"]
async fn named_and_unnamed_execution_agree(pool: PgPool) -> anyhow::Result<()> {
    seed_section(&pool, 1010, "Informatique").await?;
    seed_section(&pool, 2020, "Chimie").await?;
    let mut session = session(&pool).await?;

    const TEXT: &str = "SELECT section_id, section_name FROM section WHERE section_id >= $1 ORDER BY section_id";
    let plain = session.execute(&Query::new(TEXT).bind(1500)).await?;
    let first = session
        .execute(&Query::new(TEXT).named("sections_from").bind(1500))
        .await?;
    let again = session
        .execute(&Query::new(TEXT).named("sections_from").bind(1500))
        .await?;

    assert_eq!(plain, first);
    assert_eq!(first, again);
    assert_eq!(plain.row_count, 1);
    assert_eq!(session.statements().len(), 1);

    let conflict = session
        .execute(&Query::new("SELECT 1").named("sections_from"))
        .await
        .unwrap_err();
    assert_eq!(conflict, QueryError::StatementConflict { name: "sections_from" });
    Ok(())
}

#[sqlx::test(migrator = "rosterctl_core::MIGRATOR")]
#[ignore = "requires database"]
async fn executor_reports_store_diagnostics(pool: PgPool) -> anyhow::Result<()> {
    let mut session = session(&pool).await?;

    let err = session.execute(&Query::new("SELEC 1")).await.unwrap_err();
    assert!(matches!(err, QueryError::Database { ref code, .. } if code.as_deref() == Some("42601")));

    let err = session
        .execute(&Query::new("SELECT * FROM section WHERE section_id = $1"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidQuery);

    let err = session
        .execute(&Query::new("SELECT now() AS t"))
        .await
        .unwrap_err();
    assert!(matches!(err, QueryError::UnsupportedColumn { .. }));

    let write = session
        .execute(
            &Query::new("INSERT INTO section (section_id, section_name, delegate_id) VALUES ($1, $2, 1)")
                .bind(5)
                .bind("Droit"),
        )
        .await?;
    assert_eq!(write.row_count, 1);
    assert!(write.rows.is_empty());
    Ok(())
}

#[sqlx::test(migrator = "rosterctl_core::MIGRATOR")]
#[ignore = "requires database"]
async fn slow_statement_times_out(pool: PgPool) -> anyhow::Result<()> {
    let conn = pool.acquire().await?.detach();
    let mut session = Session::from_connection(
        conn,
        SessionOptions {
            statement_timeout_secs: 1,
            ..SessionOptions::default()
        },
    );

    let err = session
        .execute(&Query::new("SELECT pg_sleep(3)"))
        .await
        .unwrap_err();
    assert_eq!(err, QueryError::Timeout(Duration::from_secs(1)));
    Ok(())
}

#[sqlx::test(migrator = "rosterctl_core::MIGRATOR")]
#[ignore = "requires database"]
async fn numeric_year_result_is_listed(pool: PgPool) -> anyhow::Result<()> {
    sqlx::query("ALTER TABLE student ALTER COLUMN year_result TYPE NUMERIC(4, 2)")
        .execute(&pool)
        .await?;
    seed_section(&pool, 1, "Informatique").await?;
    seed_student(&pool, 1, "seed", 1).await?;

    let mut session = session(&pool).await?;
    let students = StudentRepo::new(&mut session).list(Some(1)).await?;
    assert_eq!(students.len(), 1);
    assert_eq!(students[0].year_result, Some(12.0));

    let rows = session
        .execute(&Query::new("SELECT 14.50::numeric AS n, NULL::numeric AS missing"))
        .await?;
    let row = rows.first().unwrap();
    assert_eq!(row.get("n").and_then(|v| v.as_f64()), Some(14.5));
    assert_eq!(row.get("missing").and_then(|v| v.as_f64()), None);
    Ok(())
}
