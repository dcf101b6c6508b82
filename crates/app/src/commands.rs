use std::error::Error;
use std::time::Duration;

use portal_core::model::{
    DocumentId, DocumentPatch, Identity, NotificationDraft, NotificationId, Payment, PaymentDraft,
    PaymentId, PaymentStatus, QuestionDraft, Quiz, QuizDraft, QuizId, QuizResult, Registration,
    Student, StudentDraft, StudentId,
};
use portal_core::time::format_timestamp;
use services::dashboard_service::{AdminMetrics, PaymentState, StudentDashboard};
use services::{Activation, AppServices, DocumentUpload, StudentService};
use tokio::io::AsyncBufRead;
use tracing::info;

use crate::cli::{
    Command, DocumentCommand, NotificationCommand, PaymentCommand, QuizCommand, RegisterArgs,
    StudentCommand,
};
use crate::prompt::Prompt;
use crate::take::take_quiz;

type CommandResult = Result<(), Box<dyn Error>>;

pub async fn dispatch<R: AsyncBufRead + Unpin>(
    services: &mut AppServices,
    command: Command,
    prompt: &mut Prompt<R>,
) -> CommandResult {
    match command {
        Command::LoginStudent { email, code } => {
            let identity = services.auth_mut().login_student(&email, &code).await?;
            println!("Welcome, {}.", identity.display_name());
        }
        Command::LoginAdmin { email, password } => {
            let password = match password {
                Some(password) => password,
                None => prompt.ask("Password: ").await?.unwrap_or_default(),
            };
            let identity = services.auth_mut().login_admin(&email, &password).await?;
            println!("Logged in as administrator {}.", identity.display_name());
        }
        Command::Register(args) => register(services, args).await?,
        Command::Logout => {
            services.auth_mut().logout().await?;
            println!("Logged out.");
        }
        Command::Whoami => whoami(services.auth().identity()),
        Command::Quizzes => {
            let quizzes = services.quizzes()?;
            let listed = if services.auth().is_admin() {
                quizzes.list_quizzes().await?
            } else {
                quizzes.open_quizzes().await?
            };
            print_quizzes(&listed);
        }
        Command::Take { quiz_id } => {
            let mut controller = services.quiz_session()?;
            take_quiz(&mut controller, QuizId::new(quiz_id), prompt, Duration::from_secs(1)).await?;
        }
        Command::Dashboard => {
            let dashboard = services.dashboard()?;
            if services.auth().is_admin() {
                print_admin_metrics(&dashboard.admin_metrics().await?);
            } else {
                let student = services.auth().student()?.clone();
                print_student_dashboard(&dashboard.student_dashboard(&student).await?);
            }
        }
        Command::Documents(command) => documents(services, command).await?,
        Command::Notifications(command) => notifications(services, command).await?,
        Command::Students(command) => students(services, command).await?,
        Command::Payments(command) => payments(services, command).await?,
        Command::Quiz(command) => quiz(services, command).await?,
    }
    Ok(())
}

async fn register(services: &AppServices, args: RegisterArgs) -> CommandResult {
    let registration = Registration {
        student: StudentDraft {
            last_name: args.last_name,
            first_name: args.first_name,
            email: args.email,
            phone: args.phone,
        },
        payment: PaymentDraft {
            mode: args.mode.into(),
            mvola_reference: args.reference,
            amount: args.amount,
            status: if args.remaining > 0.0 {
                PaymentStatus::Installment
            } else {
                PaymentStatus::Pending
            },
            remaining_installment: args.remaining,
        },
    };
    let receipt = services.auth().register(&registration).await?;
    match receipt.auth_code {
        Some(code) => println!("Registered. Your auth code is {code}; keep it to log in."),
        None => println!("Registered. Your auth code will be sent once the payment is validated."),
    }
    Ok(())
}

fn whoami(identity: Option<&Identity>) {
    match identity {
        None => println!("Not logged in."),
        Some(Identity::Admin(admin)) => println!("{} <{}> (admin)", admin.username, admin.email),
        Some(Identity::Student(student)) => {
            println!("{} <{}> (student #{})", student.full_name(), student.email, student.id);
        }
    }
}

async fn documents(services: &AppServices, command: DocumentCommand) -> CommandResult {
    let documents = services.documents()?;
    match command {
        DocumentCommand::List => {
            for doc in documents.list().await? {
                let download = if doc.downloadable { "downloadable" } else { "view only" };
                println!("#{:<4} {:<6} {:<40} {download}", doc.id, doc.kind.as_str(), doc.title);
            }
        }
        DocumentCommand::Download { id, out } => {
            let bytes = documents.download(DocumentId::new(id)).await?;
            tokio::fs::write(&out, &bytes).await?;
            println!("Saved {} bytes to {}.", bytes.len(), out.display());
        }
        DocumentCommand::Upload {
            path,
            title,
            kind,
            downloadable,
        } => {
            let mut upload = DocumentUpload::from_path(&path, title, downloadable).await?;
            if let Some(kind) = kind {
                upload.kind = kind.into();
            }
            let id = documents.upload(upload).await?;
            println!("Uploaded document #{id}.");
        }
        DocumentCommand::Rename { id, title } => {
            let patch = DocumentPatch {
                title: Some(title),
                downloadable: None,
            };
            documents.update(DocumentId::new(id), &patch).await?;
            println!("Document #{id} updated.");
        }
        DocumentCommand::Delete { id } => {
            documents.delete(DocumentId::new(id)).await?;
            println!("Document #{id} deleted.");
        }
    }
    Ok(())
}

async fn notifications(services: &AppServices, command: NotificationCommand) -> CommandResult {
    let notifications = services.notifications()?;
    match command {
        NotificationCommand::List => {
            let listed = match services.auth().identity().and_then(Identity::as_student) {
                Some(student) => notifications.list_for_student(student.id).await?,
                None => notifications.list_all().await?,
            };
            for n in listed {
                let marker = if n.read { " " } else { "*" };
                println!("{marker} #{:<4} {}: {}", n.id, n.title, n.message);
            }
        }
        NotificationCommand::MarkRead { id } => {
            notifications.mark_read(NotificationId::new(id)).await?;
        }
        NotificationCommand::Send {
            title,
            message,
            student,
        } => {
            services.auth().admin_client()?;
            let draft = NotificationDraft {
                title,
                message,
                individual: student.is_some(),
                recipient: student.map(StudentId::new),
            };
            notifications.send(&draft).await?;
            info!(individual = draft.individual, "notification sent");
            println!("Notification sent.");
        }
    }
    Ok(())
}

async fn students(services: &AppServices, command: StudentCommand) -> CommandResult {
    let students = services.students()?;
    match command {
        StudentCommand::List { search, status } => {
            print_students(&students.search_students(&search, status.into()).await?);
        }
        StudentCommand::Create {
            last_name,
            first_name,
            email,
            phone,
        } => {
            let draft = StudentDraft {
                last_name,
                first_name,
                email,
                phone,
            };
            let enrolled = students.create_student(&draft).await?;
            let id = enrolled.student_id.map_or_else(|| "?".to_owned(), |id| id.to_string());
            println!(
                "Student #{id} created, auth code {}.",
                enrolled.auth_code.as_deref().unwrap_or("(not returned)")
            );
        }
        StudentCommand::Show { id } => {
            print_students(std::slice::from_ref(&students.get_student(StudentId::new(id)).await?));
            print_payments(&services.payments()?.list_for_student(StudentId::new(id)).await?);
        }
        StudentCommand::Activate { id } => set_active(&students, id, true).await?,
        StudentCommand::Suspend { id } => set_active(&students, id, false).await?,
        StudentCommand::Delete { id } => {
            students.delete_student(StudentId::new(id)).await?;
            println!("Student #{id} deleted.");
        }
        StudentCommand::ResendCode { id } => {
            match students.resend_code(StudentId::new(id)).await? {
                Some(code) => println!("New code for #{id}: {code}"),
                None => println!("Code resent to student #{id}."),
            }
        }
    }
    Ok(())
}

async fn set_active(students: &StudentService, id: u64, active: bool) -> CommandResult {
    let now = students.set_active(StudentId::new(id), active).await?;
    let state = if now.unwrap_or(active) { "active" } else { "suspended" };
    println!("Student #{id} is {state}.");
    Ok(())
}

async fn payments(services: &AppServices, command: PaymentCommand) -> CommandResult {
    let payments = services.payments()?;
    match command {
        PaymentCommand::List { search, status } => {
            services.auth().admin_client()?;
            print_payments(&payments.search(&search, status.map(Into::into)).await?);
        }
        PaymentCommand::Record {
            student_id,
            mode,
            reference,
            amount,
            remaining,
            status,
        } => {
            services.auth().admin_client()?;
            let draft = PaymentDraft {
                mode: mode.into(),
                mvola_reference: reference,
                amount,
                status: status.into(),
                remaining_installment: remaining,
            };
            let id = payments.record(StudentId::new(student_id), &draft).await?;
            println!("Payment #{id} recorded.");
        }
        PaymentCommand::Validate { id } => {
            print_activation(id, &payments.validate(PaymentId::new(id)).await?);
        }
        PaymentCommand::Partial { id } => {
            print_activation(id, &payments.mark_partial(PaymentId::new(id)).await?);
        }
        PaymentCommand::Reject { id } => {
            payments.reject(PaymentId::new(id)).await?;
            println!("Payment #{id} rejected.");
        }
        PaymentCommand::VerifyMvola { code } => {
            if payments.verify_mvola(&code).await? {
                println!("Mvola reference {code} is valid.");
            } else {
                println!("Mvola reference {code} was not found.");
            }
        }
    }
    Ok(())
}

async fn quiz(services: &AppServices, command: QuizCommand) -> CommandResult {
    let quizzes = services.quizzes()?;
    match command {
        QuizCommand::Show { id } => {
            services.auth().admin_client()?;
            let (quiz, questions) = quizzes.quiz_with_questions(QuizId::new(id)).await?;
            print_quizzes(std::slice::from_ref(&quiz));
            for (n, question) in questions.iter().enumerate() {
                println!("  {}. [{}] {}", n + 1, question.kind().as_str(), question.text());
                if let Some(answer) = question.correct_answer() {
                    println!("     answer: {answer}");
                }
            }
        }
        QuizCommand::Create(args) => {
            services.auth().admin_client()?;
            let draft = QuizDraft {
                title: args.title,
                kind: args.kind,
                total_points: args.total_points,
                starts_at: args.starts,
                ends_at: args.ends,
                duration_minutes: args.duration,
                status: args.status,
            };
            let id = quizzes.create_quiz(&draft, &[]).await?;
            println!("Quiz #{id} created.");
        }
        QuizCommand::AddQuestion(args) => {
            services.auth().admin_client()?;
            let (quiz, _) = quizzes.quiz_with_questions(QuizId::new(args.quiz_id)).await?;
            let draft = QuestionDraft {
                text: args.text,
                kind: args.kind,
                correct_answer: args.answer,
                options: args.options,
                points: args.points,
            };
            let id = quizzes.add_question(&quiz, &draft).await?;
            println!("Question #{id} added to quiz #{}.", quiz.id());
        }
        QuizCommand::Status { id, status } => {
            services.auth().admin_client()?;
            quizzes.set_status(QuizId::new(id), status).await?;
            println!("Quiz #{id} is now {}.", status.as_str());
        }
        QuizCommand::Delete { id } => {
            services.auth().admin_client()?;
            quizzes.delete_quiz(QuizId::new(id)).await?;
            println!("Quiz #{id} deleted.");
        }
        QuizCommand::Results { id } => {
            services.auth().admin_client()?;
            print_results(&quizzes.results_for_quiz(QuizId::new(id)).await?);
        }
    }
    Ok(())
}

//
// ─── RENDERING ─────────────────────────────────────────────────────────────────
//

fn print_activation(id: u64, activation: &Activation) {
    println!("Payment #{id} accepted.");
    if let Some(code) = &activation.auth_code {
        let to = activation.email.as_deref().unwrap_or("the student");
        println!("Auth code {code} issued to {to}.");
    }
}

fn print_quizzes(quizzes: &[Quiz]) {
    if quizzes.is_empty() {
        println!("No quizzes.");
    }
    for quiz in quizzes {
        let window = match (quiz.starts_at(), quiz.ends_at()) {
            (Some(start), Some(end)) => {
                format!("{} → {}", format_timestamp(start), format_timestamp(end))
            }
            _ => String::new(),
        };
        println!(
            "#{:<4} {:<8} {:<36} {:>4} min  {}",
            quiz.id(),
            quiz.status().as_str(),
            quiz.title(),
            quiz.duration_minutes(),
            window
        );
    }
}

fn print_students(students: &[Student]) {
    for s in students {
        let state = if s.active { "active" } else { "suspended" };
        println!(
            "#{:<4} {:<30} {:<32} {:<9} {}",
            s.id,
            s.full_name(),
            s.email,
            state,
            s.auth_code.as_deref().unwrap_or("-")
        );
    }
}

fn print_payments(payments: &[Payment]) {
    for p in payments {
        println!(
            "#{:<4} student #{:<4} {:<10} {:>10.0} Ar  remaining {:>8.0}  {}",
            p.id,
            p.student_id,
            p.status.as_str(),
            p.amount,
            p.remaining_installment,
            p.mvola_reference.as_deref().unwrap_or(p.mode.as_str())
        );
    }
}

fn print_results(results: &[QuizResult]) {
    for r in results {
        let student = r.student_id.map_or_else(|| "-".to_owned(), |id| id.to_string());
        let max = r.max_score.map_or_else(String::new, |m| format!(" / {m}"));
        println!("student #{student:<4} {}{max}  {} s", r.score, r.time_used_secs);
    }
}

fn print_student_dashboard(dashboard: &StudentDashboard) {
    let summary = &dashboard.summary;
    println!("{}", dashboard.student.full_name());
    let state = match summary.payment_state {
        PaymentState::Complete => "complete",
        PaymentState::Partial => "partial",
    };
    println!(
        "Payments: {:.0} Ar paid, {:.0} Ar remaining ({state})",
        summary.total_paid, summary.remaining_due
    );
    println!("Unread notifications: {}", summary.unread_notifications);
    if let Some(average) = summary.average_score {
        println!("Average score: {average}");
    }
    println!("Documents: {}", dashboard.documents.len());
    println!("Open quizzes: {}", summary.open_quizzes);
    print_quizzes(&dashboard.open_quizzes);
}

fn print_admin_metrics(metrics: &AdminMetrics) {
    let s = &metrics.students;
    println!(
        "Students: {} total, {} active, {} suspended ({}% engagement)",
        s.total, s.active, s.suspended, s.engagement_percent
    );
    let p = &metrics.payments;
    println!(
        "Payments: {:.0} Ar revenue; {} complete, {} installment, {} pending ({}% complete)",
        p.revenue, p.complete, p.installment, p.pending, p.completion_percent
    );
    let q = &metrics.quizzes;
    println!(
        "Quizzes: {} total, {} active, {} scheduled, {} closed",
        q.total, q.active, q.scheduled, q.closed
    );
    match &metrics.results {
        Some(r) => {
            let average = r.average_score.map_or_else(|| "-".to_owned(), |a| a.to_string());
            println!(
                "Results: {} graded, average {average}, {}% passed",
                r.count, r.pass_rate_percent
            );
        }
        None => println!("Results: unavailable"),
    }
}
