use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use gradebook_report::averages::{format_average, summarize_students};
use gradebook_report::charts::{comparison_series, trend_series, StudentOverview};
use gradebook_report::comment::{CommentRequest, CommentService, CommentSlot};
use gradebook_report::config::Settings;
use gradebook_report::export::{grade_rows, student_rows, write_csv_export};
use gradebook_report::models::{ClassFilter, Gradebook, Student};
use gradebook_report::pdf::write_report_pdf;
use gradebook_report::report::build_class_report;
use gradebook_report::semester::{filter_grades, Semester};
use gradebook_report::store;

#[derive(Parser)]
#[command(name = "gradebook-report")]
#[command(about = "Grade averages, exports and report comments for a class gradebook", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a sample gradebook
    Seed {
        #[arg(long, default_value = "gradebook.json")]
        out: PathBuf,
    },
    /// Append grades from a CSV file to a gradebook
    Import {
        #[arg(long, default_value = "gradebook.json")]
        book: PathBuf,
        #[arg(long)]
        csv: PathBuf,
    },
    /// Print chart data for one student as JSON
    Overview {
        #[arg(long, default_value = "gradebook.json")]
        book: PathBuf,
        /// Student name or id
        #[arg(long)]
        student: String,
        #[arg(long, default_value = "HK1")]
        semester: Semester,
    },
    /// Rank students by weighted average
    Summary {
        #[arg(long, default_value = "gradebook.json")]
        book: PathBuf,
        /// Restrict to one class (by name)
        #[arg(long)]
        class: Option<String>,
        /// Only students whose name contains this text
        #[arg(long, default_value = "")]
        search: String,
        #[arg(long, default_value = "HK1")]
        semester: Semester,
    },
    /// Export students (or individual grades) as CSV
    Export {
        #[arg(long, default_value = "gradebook.json")]
        book: PathBuf,
        #[arg(long)]
        class: Option<String>,
        /// One row per grade instead of one row per student
        #[arg(long, default_value_t = false)]
        grades: bool,
        #[arg(long, default_value = "all")]
        semester: Semester,
        /// File name without the .csv extension
        #[arg(long, default_value = "students")]
        out: String,
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
    /// Write the printable class report as PDF
    Report {
        #[arg(long, default_value = "gradebook.json")]
        book: PathBuf,
        #[arg(long)]
        class: String,
        #[arg(long, default_value = "HK1")]
        semester: Semester,
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
    /// Ask the AI service for a report comment
    Comment {
        #[arg(long, default_value = "gradebook.json")]
        book: PathBuf,
        /// Student name or id
        #[arg(long)]
        student: String,
        #[arg(long, default_value = "HK1")]
        semester: Semester,
        #[arg(long, default_value = "")]
        notes: String,
        /// Overrides the student's stored target goal
        #[arg(long)]
        goal: Option<String>,
        /// Short summary of the daily log
        #[arg(long)]
        log: Option<String>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr)
        .with_filter(filter);

    tracing_subscriber::registry().with(stderr_layer).init();
}

fn find_student<'a>(book: &'a Gradebook, key: &str) -> anyhow::Result<&'a Student> {
    book.lookup_student(key)
        .with_context(|| format!("no student named or with id `{key}`"))
}

fn class_filter(book: &Gradebook, class: Option<&str>) -> anyhow::Result<ClassFilter> {
    match class {
        Some(name) => {
            let class = book
                .class_by_name(name)
                .with_context(|| format!("no class named `{name}`"))?;
            Ok(ClassFilter::Class(class.id))
        }
        None => Ok(ClassFilter::All),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let settings = Settings::from_env();

    match cli.command {
        Commands::Seed { out } => {
            let book = store::seed()?;
            store::save_gradebook(&out, &book)?;
            println!("Sample gradebook written to {}.", out.display());
        }
        Commands::Import { book, csv } => {
            let current = store::load_gradebook(&book)?;
            let (updated, inserted) = store::import_grades_csv(&current, &csv)?;
            store::save_gradebook(&book, &updated)?;
            println!("Imported {inserted} grades from {}.", csv.display());
        }
        Commands::Overview {
            book,
            student,
            semester,
        } => {
            let book = store::load_gradebook(&book)?;
            let student = find_student(&book, &student)?;
            let grades = filter_grades(&student.grades, semester);
            let overview = StudentOverview {
                student_name: student.name.clone(),
                semester: semester.to_string(),
                comparison: comparison_series(&grades),
                trend: trend_series(&grades),
            };
            println!("{}", serde_json::to_string_pretty(&overview)?);
        }
        Commands::Summary {
            book,
            class,
            search,
            semester,
        } => {
            let book = store::load_gradebook(&book)?;
            let filter = class_filter(&book, class.as_deref())?;
            let summaries = summarize_students(&book, book.find_students(filter, &search), semester);

            if summaries.is_empty() {
                println!("No students found.");
                return Ok(());
            }

            println!("Students by weighted average ({semester}):");
            for summary in &summaries {
                println!(
                    "- {} ({}) average {} across {} grades (all-time mean {:.1})",
                    summary.student_name,
                    summary.class_name.as_deref().unwrap_or("unassigned"),
                    format_average(summary.weighted_average),
                    summary.grade_count,
                    summary.card_mean
                );
            }
        }
        Commands::Export {
            book,
            class,
            grades,
            semester,
            out,
            dir,
        } => {
            let book = store::load_gradebook(&book)?;
            let filter = class_filter(&book, class.as_deref())?;
            let members = book.members(filter);

            let written = if grades {
                write_csv_export(&dir, &out, &grade_rows(members, semester))?
            } else {
                write_csv_export(&dir, &out, &student_rows(&book, members, semester))?
            };

            match written {
                Some(path) => println!("Export written to {}.", path.display()),
                None => println!("Nothing to export."),
            }
        }
        Commands::Report {
            book,
            class,
            semester,
            dir,
        } => {
            let book = store::load_gradebook(&book)?;
            let filter = class_filter(&book, Some(class.as_str()))?;
            let report = build_class_report(&class, book.members(filter), semester);
            let path = write_report_pdf(&dir, &class, &report)?;
            print!("{}", report.to_text());
            println!();
            println!("Report written to {}.", path.display());
        }
        Commands::Comment {
            book,
            student,
            semester,
            notes,
            goal,
            log,
        } => {
            let book = store::load_gradebook(&book)?;
            let student = find_student(&book, &student)?;
            let mut request = CommentRequest::for_student(&book, student, semester, notes);
            if goal.is_some() {
                request.target_goal = goal;
            }
            request.daily_log_summary = log;

            let service = CommentService::from_settings(&settings);
            if !service.is_configured() {
                warn!("GEMINI_API_KEY is not set");
            }
            info!(student = %request.student_name, %semester, "Requesting comment");

            let slot = CommentSlot::default();
            let outcome = slot.run(&service, &request).await?;
            println!("{outcome}");
        }
    }

    Ok(())
}
