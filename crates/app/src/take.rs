use std::error::Error;
use std::io::{self, Write};
use std::time::Duration;

use portal_core::model::{
    Question, QuestionKind, QuizId, Submission, SubmitTrigger, TimeBand, format_countdown,
};
use services::error::QuizSessionError;
use services::sessions::{Countdown, QuizSessionController, SubmitOutcome, TickEvent};
use tokio::io::AsyncBufRead;

use crate::prompt::{Prompt, is_no, is_yes};

const HELP: &str = "\
  <answer>     answer the current question (a number picks a choice)
  :n / :p      next / previous question
  :g <n>       go to question n
  :t           show remaining time and progress
  :s           submit
  :q           abandon the quiz";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Input {
    Answer(String),
    Next,
    Previous,
    Goto(usize),
    Status,
    Submit,
    Quit,
    Help,
}

fn parse_input(line: &str) -> Input {
    let line = line.trim();
    let Some(command) = line.strip_prefix(':') else {
        return match line {
            "" => Input::Status,
            "?" => Input::Help,
            answer => Input::Answer(answer.to_owned()),
        };
    };
    let mut parts = command.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some("n" | "next"), _) => Input::Next,
        (Some("p" | "prev"), _) => Input::Previous,
        (Some("g" | "goto"), Some(n)) => match n.parse::<usize>() {
            Ok(n) if n > 0 => Input::Goto(n - 1),
            _ => Input::Help,
        },
        (Some("t" | "time"), _) => Input::Status,
        (Some("s" | "submit"), _) => Input::Submit,
        (Some("q" | "quit"), _) => Input::Quit,
        _ => Input::Help,
    }
}

/// A number selects one of the fixed choices; anything else is sent as typed.
fn resolve_answer(question: &Question, raw: &str) -> String {
    if question.kind() == QuestionKind::FreeText {
        return raw.to_owned();
    }
    let choices = question.choices();
    raw.parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|index| choices.get(index).cloned())
        .unwrap_or_else(|| raw.to_owned())
}

fn show_current(controller: &QuizSessionController) {
    let Some(attempt) = controller.attempt() else {
        return;
    };
    let Some(question) = attempt.current_question() else {
        return;
    };
    println!();
    println!(
        "Question {}/{}  ({} pts, {}% answered)",
        attempt.current_index() + 1,
        attempt.questions().len(),
        question.points(),
        attempt.progress_percent()
    );
    println!("{}", question.text());
    for (n, choice) in question.choices().iter().enumerate() {
        println!("  {}. {choice}", n + 1);
    }
    if let Some(answer) = attempt.answers().get(question.id()) {
        println!("  current answer: {answer}");
    }
}

fn show_time(controller: &QuizSessionController) {
    if let Some(attempt) = controller.attempt() {
        let marker = match attempt.time_band() {
            TimeBand::Comfortable => "",
            TimeBand::Warning => " (hurry)",
            TimeBand::Critical => " (almost over!)",
        };
        println!(
            "[{} left{marker}, {} unanswered]",
            format_countdown(attempt.remaining_secs()),
            attempt.unanswered_count()
        );
    }
}

fn should_announce(remaining_secs: u32) -> bool {
    remaining_secs % 300 == 0 || remaining_secs == 60 || remaining_secs == 30 || remaining_secs <= 10
}

fn report(outcome: &SubmitOutcome) {
    match outcome {
        SubmitOutcome::Submitted {
            receipt,
            elapsed_secs,
            trigger,
        } => {
            if trigger.is_auto() {
                println!("Time is up, your answers were submitted.");
            }
            if let Some(message) = &receipt.message {
                println!("{message}");
            }
            match (receipt.score, receipt.max_score) {
                (Some(score), Some(max)) => println!("Score: {score} / {max}"),
                (Some(score), None) => println!("Score: {score}"),
                _ => {}
            }
            if let Some(percentage) = receipt.percentage {
                println!("Percentage: {percentage:.1}%");
            }
            if let (Some(correct), Some(total)) = (receipt.correct_answers, receipt.total_questions) {
                println!("Correct answers: {correct}/{total}");
            }
            println!("Time used: {}", format_countdown(*elapsed_secs));
        }
        SubmitOutcome::AlreadySubmitted { message } => println!("{message}"),
        SubmitOutcome::ConfirmationRequired { .. } => {}
    }
}

/// Run one quiz attempt on the terminal until it is submitted or abandoned.
///
/// # Errors
///
/// Returns load failures, refused submissions and I/O errors.
pub async fn take_quiz<R: AsyncBufRead + Unpin>(
    controller: &mut QuizSessionController,
    quiz_id: QuizId,
    prompt: &mut Prompt<R>,
    tick_period: Duration,
) -> Result<(), Box<dyn Error>> {
    let attempt = controller.load_quiz(quiz_id).await?;
    println!(
        "{} ({} questions, {})",
        attempt.quiz().title(),
        attempt.questions().len(),
        format_countdown(attempt.remaining_secs())
    );
    println!("{HELP}");
    controller.start()?;
    show_current(controller);

    let mut countdown = Countdown::start(tick_period);
    let mut awaiting_confirmation = false;

    let result = loop {
        tokio::select! {
            tick = countdown.next_tick(), if !countdown.is_cancelled() => {
                if tick.is_none() {
                    countdown.cancel();
                    continue;
                }
                match controller.tick().await {
                    Ok(TickEvent::Counting { remaining_secs }) => {
                        if should_announce(remaining_secs) {
                            show_time(controller);
                        }
                    }
                    Ok(TickEvent::Ignored) => {}
                    Ok(TickEvent::Expired(outcome)) => break Ok(outcome),
                    Err(err) => break Err(err),
                }
            }
            line = prompt.next_line() => {
                let Some(line) = line? else {
                    controller.abandon();
                    println!("Input closed, quiz abandoned.");
                    return Ok(());
                };
                if awaiting_confirmation {
                    awaiting_confirmation = false;
                    if is_yes(&line) {
                        break controller.submit(SubmitTrigger::Confirmed).await;
                    }
                    println!("Back to the quiz.");
                    continue;
                }
                match parse_input(&line) {
                    Input::Answer(raw) => {
                        let Some(question) = controller.attempt().and_then(|a| a.current_question()) else {
                            continue;
                        };
                        let (question_id, value) = (question.id(), resolve_answer(question, &raw));
                        if let Err(err) = controller.record_answer(question_id, value) {
                            println!("{err}");
                            continue;
                        }
                        let current = controller.attempt().map_or(0, |a| a.current_index());
                        if controller.navigate(current + 1)? == current {
                            println!("Last question answered; :s to submit.");
                        } else {
                            show_current(controller);
                        }
                    }
                    Input::Next => {
                        let current = controller.attempt().map_or(0, |a| a.current_index());
                        controller.navigate(current + 1)?;
                        show_current(controller);
                    }
                    Input::Previous => {
                        let current = controller.attempt().map_or(0, |a| a.current_index());
                        controller.navigate(current.saturating_sub(1))?;
                        show_current(controller);
                    }
                    Input::Goto(index) => {
                        controller.navigate(index)?;
                        show_current(controller);
                    }
                    Input::Status => show_time(controller),
                    Input::Help => println!("{HELP}"),
                    Input::Quit => {
                        controller.abandon();
                        println!("Quiz abandoned.");
                        return Ok(());
                    }
                    Input::Submit => match controller.submit(SubmitTrigger::Manual).await {
                        Ok(SubmitOutcome::ConfirmationRequired { unanswered }) => {
                            print!("{unanswered} question(s) unanswered. Submit anyway? [y/N] ");
                            io::stdout().flush()?;
                            awaiting_confirmation = true;
                        }
                        other => break other,
                    },
                }
            }
        }
    };
    countdown.cancel();

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(err) => retry_submission(controller, prompt, err).await?,
    };
    report(&outcome);
    Ok(())
}

fn describe_pending(submission: &Submission) -> String {
    format!(
        "Held for retry: {} answer(s), {} used.",
        submission.answers.len(),
        format_countdown(submission.elapsed_secs)
    )
}

/// Resend the frozen submission while the failure is transient and the student agrees.
async fn retry_submission<R: AsyncBufRead + Unpin>(
    controller: &mut QuizSessionController,
    prompt: &mut Prompt<R>,
    mut err: QuizSessionError,
) -> Result<SubmitOutcome, Box<dyn Error>> {
    loop {
        if !matches!(err, QuizSessionError::SubmissionNetwork(_)) {
            return Err(err.into());
        }
        println!("{err}");
        if let Some(pending) = controller.attempt().and_then(|a| a.pending_submission()) {
            println!("{}", describe_pending(pending));
        }
        let answer = prompt.ask("Retry now? [Y/n] ").await?;
        if answer.as_deref().is_none_or(is_no) {
            controller.abandon();
            return Err(err.into());
        }
        match controller.submit(SubmitTrigger::Manual).await {
            Ok(outcome) => return Ok(outcome),
            Err(next) => err = next,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_core::model::{AnswerEntry, QuestionId};

    fn question(kind: QuestionKind, options: &[&str]) -> Question {
        Question::from_persisted(
            QuestionId::new(1),
            QuizId::new(1),
            "Q",
            kind,
            None,
            options.iter().map(|o| (*o).to_owned()).collect(),
            1,
        )
    }

    #[test]
    fn pending_submission_is_summarized_for_retry() {
        let submission = Submission {
            answers: vec![AnswerEntry {
                question_id: QuestionId::new(4),
                answer_text: "vrai".into(),
            }],
            elapsed_secs: 3100,
            trigger: SubmitTrigger::Manual,
        };
        assert_eq!(
            describe_pending(&submission),
            "Held for retry: 1 answer(s), 51:40 used."
        );
    }

    #[test]
    fn commands_and_answers_are_told_apart() {
        assert_eq!(parse_input(":s"), Input::Submit);
        assert_eq!(parse_input(" :submit "), Input::Submit);
        assert_eq!(parse_input(":g 3"), Input::Goto(2));
        assert_eq!(parse_input(":g 0"), Input::Help);
        assert_eq!(parse_input(":zz"), Input::Help);
        assert_eq!(parse_input(""), Input::Status);
        assert_eq!(parse_input("Paris"), Input::Answer("Paris".into()));
    }

    #[test]
    fn numbers_pick_choices_except_for_free_text() {
        let mc = question(QuestionKind::MultipleChoice, &["Lyon", "Paris"]);
        assert_eq!(resolve_answer(&mc, "2"), "Paris");
        assert_eq!(resolve_answer(&mc, "3"), "3");
        assert_eq!(resolve_answer(&mc, "Paris"), "Paris");

        let tf = question(QuestionKind::TrueFalse, &[]);
        assert_eq!(resolve_answer(&tf, "1"), "true");

        let free = question(QuestionKind::FreeText, &[]);
        assert_eq!(resolve_answer(&free, "1"), "1");
    }

    #[test]
    fn announcements_thin_out_far_from_the_end() {
        assert!(should_announce(600));
        assert!(should_announce(60));
        assert!(should_announce(5));
        assert!(!should_announce(61));
    }
}
