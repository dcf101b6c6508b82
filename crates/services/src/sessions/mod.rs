//! Quiz-taking sessions: backend seam, controller and countdown.

mod backend;
mod controller;
mod countdown;

pub use backend::QuizBackend;
pub use controller::{QuizSessionController, SessionPhase, SubmitOutcome, TickEvent};
pub use countdown::{Countdown, CountdownHandle, Tick};
