//! Command handlers.
//!
//! Each handler opens one session, runs its work, and closes the session on
//! both the success and the error path.

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use rosterctl_core::{
    migrate, ConnectionConfig, NewStudent, SectionRepo, Session, SessionOptions, StudentRepo,
};
use tracing::{info, warn};

use crate::render;

#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Args, Debug)]
pub struct SectionsArgs {
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Args, Debug)]
pub struct StudentsArgs {
    /// Only students of this section
    #[arg(long)]
    pub section: Option<i32>,

    /// Only students with exactly this login
    #[arg(long, conflicts_with = "section")]
    pub login: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Args, Debug)]
pub struct AddStudentArgs {
    /// Student first name
    #[arg(long)]
    pub first_name: String,

    /// Student last name
    #[arg(long)]
    pub last_name: String,

    /// Year result
    #[arg(long)]
    pub year_result: f64,

    /// Student login
    #[arg(long)]
    pub login: String,

    /// Course the student follows
    #[arg(long)]
    pub course_id: Option<i32>,

    /// Section the student belongs to (created if missing)
    #[arg(long)]
    pub section_id: i32,

    /// Name for the section when it has to be created
    #[arg(long)]
    pub section_name: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

impl AddStudentArgs {
    fn to_new_student(&self) -> NewStudent {
        NewStudent {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            year_result: self.year_result,
            login: self.login.clone(),
            course_id: self.course_id,
            section_id: self.section_id,
            section_name: self.section_name.clone(),
        }
    }
}

/// Resolved connection settings handed to every command.
pub struct Settings {
    pub connection: ConnectionConfig,
    pub session: SessionOptions,
}

async fn open(settings: &Settings) -> Result<Session> {
    Session::open(&settings.connection, settings.session.clone())
        .await
        .with_context(|| {
            format!(
                "Failed to connect to {}:{}/{}",
                settings.connection.host, settings.connection.port, settings.connection.database
            )
        })
}

async fn close(session: Session) {
    if let Err(e) = session.close().await {
        warn!(error = %e, "failed to close session cleanly");
    }
}

pub async fn run_sections(settings: &Settings, args: SectionsArgs) -> Result<()> {
    let mut session = open(settings).await?;
    let outcome = SectionRepo::new(&mut session).list().await;
    close(session).await;

    let sections = outcome.context("Failed to list sections")?;
    print!("{}", render::sections(&sections, args.format)?);
    Ok(())
}

pub async fn run_students(settings: &Settings, args: StudentsArgs) -> Result<()> {
    let mut session = open(settings).await?;
    let outcome = {
        let mut repo = StudentRepo::new(&mut session);
        match &args.login {
            Some(login) => repo.find_by_login(login).await,
            None => repo.list(args.section).await,
        }
    };
    close(session).await;

    let students = outcome.context("Failed to list students")?;
    print!("{}", render::students(&students, args.format)?);
    Ok(())
}

pub async fn run_add_student(settings: &Settings, args: AddStudentArgs) -> Result<()> {
    let student = args.to_new_student();
    let mut session = open(settings).await?;
    let outcome = StudentRepo::new(&mut session)
        .with_isolation(settings.session.isolation)
        .add(&student)
        .await;
    close(session).await;

    let added = outcome.with_context(|| {
        format!(
            "Failed to add student '{}' to section {}",
            student.login, student.section_id
        )
    })?;
    print!("{}", render::added(&added, &student, args.format)?);
    Ok(())
}

pub async fn run_migrate(settings: &Settings) -> Result<()> {
    let mut session = open(settings).await?;
    let outcome = migrate(&mut session).await;
    close(session).await;

    outcome.context("Failed to apply migrations")?;
    info!("migrations applied");
    println!("Schema is up to date");
    Ok(())
}
