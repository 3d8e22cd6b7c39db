use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout};
use tokio::sync::Mutex;
use tracing::error;

/// Confirmation and free-text questions put to the user.
///
/// `confirm` resolves to `false` and `prompt` to `None` when the user cancels.
#[async_trait]
pub trait UserPrompt: Send + Sync {
    async fn confirm(&self, message: &str) -> bool;
    async fn prompt(&self, message: &str, default: &str) -> Option<String>;
}

/// Accepts every confirmation and every suggested default.
pub struct AssumeYes;

#[async_trait]
impl UserPrompt for AssumeYes {
    async fn confirm(&self, _message: &str) -> bool {
        true
    }

    async fn prompt(&self, _message: &str, default: &str) -> Option<String> {
        Some(default.to_string())
    }
}

/// Asks line by line over a reader and writer pair. The reader is kept
/// across questions so buffered input is not lost.
pub struct LinePrompt<R, W> {
    io: Mutex<(R, W)>,
}

/// Asks on the terminal.
pub type StdinPrompt = LinePrompt<BufReader<Stdin>, Stdout>;

impl StdinPrompt {
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> LinePrompt<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            io: Mutex::new((reader, writer)),
        }
    }

    async fn ask(&self, question: &str) -> Option<String> {
        let mut io = self.io.lock().await;
        let (reader, writer) = &mut *io;
        if let Err(err) = writer.write_all(question.as_bytes()).await {
            error!("failed to write prompt: {err}");
            return None;
        }
        if let Err(err) = writer.flush().await {
            error!("failed to flush prompt: {err}");
        }

        let mut line = String::new();
        match reader.read_line(&mut line).await {
            Ok(0) => None,
            Ok(_) => Some(line.trim().to_string()),
            Err(err) => {
                error!("failed to read answer: {err}");
                None
            }
        }
    }
}

#[async_trait]
impl<R, W> UserPrompt for LinePrompt<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn confirm(&self, message: &str) -> bool {
        matches!(
            self.ask(&format!("{message} [y/N] ")).await.as_deref(),
            Some("y") | Some("Y") | Some("yes")
        )
    }

    async fn prompt(&self, message: &str, default: &str) -> Option<String> {
        let answer = self.ask(&format!("{message} [{default}] ")).await?;
        if answer.is_empty() {
            Some(default.to_string())
        } else {
            Some(answer)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn piped_answers_are_read_one_per_question() {
        let input: &[u8] = b"y\n\n42\nno\n";
        let prompt = LinePrompt::new(input, Vec::new());

        assert!(prompt.confirm("Delete?").await);
        assert_eq!(prompt.prompt("Days?", "365").await.as_deref(), Some("365"));
        assert_eq!(prompt.prompt("Amount?", "0").await.as_deref(), Some("42"));
        assert!(!prompt.confirm("Remove?").await);
        assert_eq!(prompt.prompt("Again?", "1").await, None);

        let (_, written) = prompt.io.into_inner();
        let written = String::from_utf8(written).unwrap();
        assert!(written.starts_with("Delete? [y/N] Days? [365] "));
    }
}
