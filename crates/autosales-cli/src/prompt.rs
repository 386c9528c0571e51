//! Confirmation prompts on standard input

use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};

/// Reads answers line by line from one buffered input
///
/// A single reader is kept for the whole run so that answers typed ahead
/// are not lost between prompts.
pub struct Prompter<R> {
    lines: Lines<R>,
    assume_yes: bool,
}

impl Prompter<BufReader<Stdin>> {
    /// Prompter on standard input
    pub fn stdin(assume_yes: bool) -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), assume_yes)
    }
}

impl<R: AsyncBufRead + Unpin> Prompter<R> {
    /// Prompter reading answers from `input`
    ///
    /// With `assume_yes` every question is answered yes without reading.
    pub fn new(input: R, assume_yes: bool) -> Self {
        Self {
            lines: input.lines(),
            assume_yes,
        }
    }

    /// Ask a yes/no question; an empty answer or closed input means yes
    pub async fn confirm(&mut self, question: &str) -> Result<bool> {
        if self.assume_yes {
            return Ok(true);
        }

        let line = self.ask(&format!("{question} [Y/n] ")).await?;
        Ok(parse_answer(&line))
    }

    /// Wait for Enter
    pub async fn pause(&mut self, message: &str) -> Result<()> {
        if !self.assume_yes {
            self.ask(&format!("{message} ")).await?;
        }
        Ok(())
    }

    async fn ask(&mut self, prompt: &str) -> Result<String> {
        let mut stdout = tokio::io::stdout();
        stdout
            .write_all(prompt.as_bytes())
            .await
            .context("Failed to write prompt")?;
        stdout.flush().await.context("Failed to write prompt")?;

        let line = self
            .lines
            .next_line()
            .await
            .context("Failed to read answer")?;
        Ok(line.unwrap_or_default())
    }
}

fn parse_answer(line: &str) -> bool {
    !matches!(line.trim().to_ascii_lowercase().as_str(), "n" | "no")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("\n", true)]
    #[case("", true)]
    #[case("y\n", true)]
    #[case("YES\n", true)]
    #[case("n\n", false)]
    #[case(" No \n", false)]
    fn test_parse_answer(#[case] line: &str, #[case] expected: bool) {
        assert_eq!(parse_answer(line), expected);
    }

    #[tokio::test]
    async fn test_assume_yes_skips_prompt() {
        let mut prompter = Prompter::new(&b"n\n"[..], true);
        assert!(prompter.confirm("Continue?").await.unwrap());
        prompter.pause("Press Enter").await.unwrap();
    }

    #[tokio::test]
    async fn test_answers_typed_ahead_reach_later_prompts() {
        let mut prompter = Prompter::new(&b"n\n\ny\nno\n"[..], false);
        assert!(!prompter.confirm("Run verification queries?").await.unwrap());
        prompter.pause("Press Enter to tear down").await.unwrap();
        assert!(prompter.confirm("Again?").await.unwrap());
        assert!(!prompter.confirm("Once more?").await.unwrap());
        // closed input
        assert!(prompter.confirm("Last?").await.unwrap());
    }
}
