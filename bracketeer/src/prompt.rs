//! Terminal confirmation prompt.

use async_trait::async_trait;
use std::io::{self, BufRead, Write};

use bracketeer_exec::{ConfirmationPort, ExecError, OrderPreview};

/// Asks for confirmation on stdin/stdout. Anything but `y`/`yes` declines.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompt;

#[async_trait]
impl ConfirmationPort for TerminalPrompt {
    async fn confirm(&self, preview: &OrderPreview) -> Result<bool, ExecError> {
        let summary = preview.to_string();

        tokio::task::spawn_blocking(move || {
            let stdin = io::stdin();
            let mut stdout = io::stdout();
            ask(&mut stdin.lock(), &mut stdout, &summary)
        })
        .await
        .map_err(|e| ExecError::Confirmation(e.to_string()))?
        .map_err(|e| ExecError::Confirmation(e.to_string()))
    }
}

/// Print the summary and read one answer line.
///
/// End of input counts as "no".
pub fn ask<R: BufRead, W: Write>(input: &mut R, output: &mut W, summary: &str) -> io::Result<bool> {
    writeln!(output)?;
    writeln!(output, "{}", summary)?;
    write!(output, "\nSubmit this order? [y/N] ")?;
    output.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;

    Ok(parse_answer(&answer))
}

/// `y` or `yes` (any case) approves; everything else declines.
pub fn parse_answer(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
