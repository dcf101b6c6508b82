use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use portal_core::model::{
    DocumentKind, PaymentMode, PaymentStatus, QuestionKind, QuizKind, QuizStatus,
    StudentStatusFilter,
};
use portal_core::time::parse_timestamp;

#[derive(Debug, Parser)]
#[command(name = "portal", author, version, about = "Training portal client", long_about = None)]
pub struct Cli {
    /// Backend base url, e.g. http://localhost:5000/api
    #[arg(long, global = true)]
    pub api_url: Option<String>,
    /// Local session database, e.g. sqlite://portal.sqlite3
    #[arg(long, global = true)]
    pub db: Option<String>,
    /// HTTP timeout in seconds
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,
    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Log in as a student with e-mail and auth code
    LoginStudent { email: String, code: String },
    /// Log in as an administrator; the password is asked for when omitted
    LoginAdmin {
        email: String,
        #[arg(long)]
        password: Option<String>,
    },
    /// Self-register a student along with a first payment
    Register(RegisterArgs),
    Logout,
    /// Show who is logged in
    Whoami,
    /// List quizzes
    Quizzes,
    /// Take a quiz interactively
    Take { quiz_id: u64 },
    /// Student home screen, or the admin overview
    Dashboard,
    #[command(subcommand)]
    Documents(DocumentCommand),
    #[command(subcommand)]
    Notifications(NotificationCommand),
    #[command(subcommand)]
    Students(StudentCommand),
    #[command(subcommand)]
    Payments(PaymentCommand),
    #[command(subcommand)]
    Quiz(QuizCommand),
}

#[derive(Debug, Args)]
pub struct RegisterArgs {
    #[arg(long)]
    pub last_name: String,
    #[arg(long)]
    pub first_name: String,
    #[arg(long)]
    pub email: String,
    #[arg(long)]
    pub phone: Option<String>,
    #[arg(long, value_enum, default_value_t = ModeArg::Mvola)]
    pub mode: ModeArg,
    /// Mvola transaction reference
    #[arg(long)]
    pub reference: Option<String>,
    #[arg(long)]
    pub amount: f64,
    /// Amount still due after this payment
    #[arg(long, default_value_t = 0.0)]
    pub remaining: f64,
}

#[derive(Debug, Subcommand)]
pub enum DocumentCommand {
    List,
    Download {
        id: u64,
        #[arg(short, long)]
        out: PathBuf,
    },
    Upload {
        path: PathBuf,
        #[arg(long)]
        title: String,
        #[arg(long, value_enum)]
        kind: Option<KindArg>,
        #[arg(long)]
        downloadable: bool,
    },
    Rename {
        id: u64,
        title: String,
    },
    Delete {
        id: u64,
    },
}

#[derive(Debug, Subcommand)]
pub enum NotificationCommand {
    List,
    MarkRead { id: u64 },
    /// Send to everyone, or to one student with --student
    Send {
        title: String,
        message: String,
        #[arg(long)]
        student: Option<u64>,
    },
}

#[derive(Debug, Subcommand)]
pub enum StudentCommand {
    List {
        #[arg(long, default_value = "")]
        search: String,
        #[arg(long, value_enum, default_value_t = StatusFilterArg::All)]
        status: StatusFilterArg,
    },
    Create {
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        phone: Option<String>,
    },
    Show { id: u64 },
    Activate { id: u64 },
    Suspend { id: u64 },
    Delete { id: u64 },
    ResendCode { id: u64 },
}

#[derive(Debug, Subcommand)]
pub enum PaymentCommand {
    List {
        #[arg(long, default_value = "")]
        search: String,
        #[arg(long, value_enum)]
        status: Option<PaymentStatusArg>,
    },
    /// Record a payment on behalf of a student
    Record {
        student_id: u64,
        #[arg(long, value_enum, default_value_t = ModeArg::Cash)]
        mode: ModeArg,
        #[arg(long)]
        reference: Option<String>,
        #[arg(long)]
        amount: f64,
        #[arg(long, default_value_t = 0.0)]
        remaining: f64,
        #[arg(long, value_enum, default_value_t = PaymentStatusArg::Pending)]
        status: PaymentStatusArg,
    },
    Validate { id: u64 },
    Partial { id: u64 },
    Reject { id: u64 },
    VerifyMvola { code: String },
}

#[derive(Debug, Subcommand)]
pub enum QuizCommand {
    Show { id: u64 },
    /// Create an empty quiz; add questions with `add-question`
    Create(CreateQuizArgs),
    AddQuestion(AddQuestionArgs),
    Status {
        id: u64,
        #[arg(value_parser = parse_quiz_status)]
        status: QuizStatus,
    },
    Delete { id: u64 },
    Results { id: u64 },
}

#[derive(Debug, Args)]
pub struct CreateQuizArgs {
    #[arg(long)]
    pub title: String,
    #[arg(long, value_parser = parse_quiz_kind, default_value = "quiz")]
    pub kind: QuizKind,
    /// Opening time, e.g. 2024-05-01T08:00:00
    #[arg(long, value_parser = parse_datetime)]
    pub starts: DateTime<Utc>,
    #[arg(long, value_parser = parse_datetime)]
    pub ends: DateTime<Utc>,
    #[arg(long, default_value_t = 60)]
    pub duration: u32,
    #[arg(long)]
    pub total_points: Option<u32>,
    #[arg(long, value_parser = parse_quiz_status, default_value = "inactif")]
    pub status: QuizStatus,
}

#[derive(Debug, Args)]
pub struct AddQuestionArgs {
    pub quiz_id: u64,
    #[arg(long)]
    pub text: String,
    #[arg(long, value_parser = parse_question_kind, default_value = "choix_multiple")]
    pub kind: QuestionKind,
    #[arg(long)]
    pub answer: String,
    /// Repeat once per choice
    #[arg(long = "option")]
    pub options: Vec<String>,
    #[arg(long, default_value_t = 1)]
    pub points: u32,
}

fn parse_datetime(raw: &str) -> Result<DateTime<Utc>, String> {
    parse_timestamp(raw).ok_or_else(|| format!("invalid date `{raw}`"))
}

fn parse_quiz_kind(raw: &str) -> Result<QuizKind, String> {
    QuizKind::parse(raw).ok_or_else(|| format!("unknown quiz type `{raw}`"))
}

fn parse_question_kind(raw: &str) -> Result<QuestionKind, String> {
    QuestionKind::parse(raw).ok_or_else(|| format!("unknown question type `{raw}`"))
}

fn parse_quiz_status(raw: &str) -> Result<QuizStatus, String> {
    QuizStatus::parse(raw).ok_or_else(|| format!("unknown status `{raw}` (actif, inactif, planifie, clos)"))
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModeArg {
    Mvola,
    Cash,
}

impl From<ModeArg> for PaymentMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Mvola => PaymentMode::Mvola,
            ModeArg::Cash => PaymentMode::Cash,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum KindArg {
    Pdf,
    Video,
    Image,
}

impl From<KindArg> for DocumentKind {
    fn from(arg: KindArg) -> Self {
        match arg {
            KindArg::Pdf => DocumentKind::Pdf,
            KindArg::Video => DocumentKind::Video,
            KindArg::Image => DocumentKind::Image,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StatusFilterArg {
    All,
    Active,
    Suspended,
}

impl From<StatusFilterArg> for StudentStatusFilter {
    fn from(arg: StatusFilterArg) -> Self {
        match arg {
            StatusFilterArg::All => StudentStatusFilter::All,
            StatusFilterArg::Active => StudentStatusFilter::Active,
            StatusFilterArg::Suspended => StudentStatusFilter::Suspended,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PaymentStatusArg {
    Complete,
    Installment,
    Pending,
}

impl From<PaymentStatusArg> for PaymentStatus {
    fn from(arg: PaymentStatusArg) -> Self {
        match arg {
            PaymentStatusArg::Complete => PaymentStatus::Complete,
            PaymentStatusArg::Installment => PaymentStatus::Installment,
            PaymentStatusArg::Pending => PaymentStatus::Pending,
        }
    }
}
