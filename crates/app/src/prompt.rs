use std::io::{self, Write};

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};

/// Line-oriented terminal input. Reading a line is cancel-safe, so it can sit in
/// a `select!` next to the countdown.
pub struct Prompt<R> {
    lines: Lines<R>,
}

impl Prompt<BufReader<Stdin>> {
    #[must_use]
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

impl<R: AsyncBufRead + Unpin> Prompt<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }

    /// Next trimmed line, or `None` at end of input.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error.
    pub async fn next_line(&mut self) -> io::Result<Option<String>> {
        Ok(self
            .lines
            .next_line()
            .await?
            .map(|line| line.trim().to_owned()))
    }

    /// # Errors
    ///
    /// Returns the underlying I/O error.
    pub async fn ask(&mut self, question: &str) -> io::Result<Option<String>> {
        print!("{question}");
        io::stdout().flush()?;
        self.next_line().await
    }
}

#[must_use]
pub fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "o" | "oui" | "y" | "yes")
}

#[must_use]
pub fn is_no(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "n" | "non" | "no")
}
