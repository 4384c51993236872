//! Console stand-ins for the speech engines: utterances go to stdout, answers
//! are read line by line from stdin.

use std::future::Future;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::{Mutex, Notify};
use welcome_core::{CollaboratorError, SpeechInput, SpeechOutput};

const SPEECH_INTERRUPTED: i32 = 1;
const NO_SPEECH: i32 = 2;
const INPUT_CLOSED: i32 = 3;
const INPUT_ERROR: i32 = 4;
const RECOGNITION_STOPPED: i32 = 5;

/// Seconds per word at rate 1.0.
const SECS_PER_WORD: f32 = 0.4;

pub struct ConsoleSpeech {
    rate: f32,
    stop: Notify,
}

impl ConsoleSpeech {
    pub fn new(rate: f32) -> Self {
        tracing::info!(rate, "console speech output ready");
        Self {
            rate,
            stop: Notify::new(),
        }
    }
}

/// How long an utterance takes to "play" at the given rate.
fn utterance_duration(text: &str, rate: f32) -> Duration {
    let words = text.split_whitespace().count() as f32;
    Duration::from_secs_f32(words * SECS_PER_WORD / rate.max(0.1))
}

impl SpeechOutput for ConsoleSpeech {
    fn speak(&self, text: &str) -> impl Future<Output = Result<(), CollaboratorError>> + Send {
        let duration = utterance_duration(text, self.rate);
        let text = text.to_string();
        async move {
            println!("[robot] {text}");
            tracing::debug!(?duration, "speaking");
            tokio::select! {
                _ = tokio::time::sleep(duration) => Ok(()),
                _ = self.stop.notified() => {
                    Err(CollaboratorError::new(SPEECH_INTERRUPTED, "speech stopped"))
                }
            }
        }
    }

    fn stop(&self) {
        self.stop.notify_waiters();
    }
}

/// Reads answers line by line; stdin unless built with [`ConsoleListener::with_reader`].
pub struct ConsoleListener<R = BufReader<Stdin>> {
    lines: Mutex<Lines<R>>,
    language: String,
    timeout: Duration,
    stop: Notify,
}

impl ConsoleListener {
    pub fn new(language: String, timeout: Duration) -> Self {
        Self::with_reader(BufReader::new(tokio::io::stdin()), language, timeout)
    }
}

impl<R: AsyncBufRead + Unpin> ConsoleListener<R> {
    pub fn with_reader(reader: R, language: String, timeout: Duration) -> Self {
        tracing::info!(language = %language, ?timeout, "console speech input ready");
        Self {
            lines: Mutex::new(reader.lines()),
            language,
            timeout,
            stop: Notify::new(),
        }
    }
}

impl<R> SpeechInput for ConsoleListener<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    fn listen(&self) -> impl Future<Output = Result<String, CollaboratorError>> + Send {
        async move {
            println!("[listening, {}] > ", self.language);
            let mut lines = self.lines.lock().await;
            tokio::select! {
                line = tokio::time::timeout(self.timeout, lines.next_line()) => match line {
                    Ok(Ok(Some(text))) => Ok(text),
                    Ok(Ok(None)) => Err(CollaboratorError::new(INPUT_CLOSED, "input closed")),
                    Ok(Err(e)) => Err(CollaboratorError::new(INPUT_ERROR, e.to_string())),
                    Err(_) => Err(CollaboratorError::new(NO_SPEECH, "no speech detected")),
                },
                _ = self.stop.notified() => {
                    Err(CollaboratorError::new(RECOGNITION_STOPPED, "recognition stopped"))
                }
            }
        }
    }

    fn stop(&self) {
        self.stop.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::io::{AsyncWriteExt, DuplexStream};

    type DuplexListener = ConsoleListener<BufReader<DuplexStream>>;

    /// Listener fed through an in-memory pipe; the returned half is the speaker.
    fn listener(timeout: Duration) -> (DuplexListener, DuplexStream) {
        let (reader, writer) = tokio::io::duplex(64);
        let listener =
            ConsoleListener::with_reader(BufReader::new(reader), "en-US".into(), timeout);
        (listener, writer)
    }

    #[test]
    fn test_utterance_duration_scales_with_rate() {
        let normal = utterance_duration("one two three four", 1.0);
        let slow = utterance_duration("one two three four", 0.8);
        assert!((normal.as_secs_f32() - 1.6).abs() < 1e-3);
        assert!(slow > normal);
        assert_eq!(utterance_duration("", 1.0), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_speak_finishes() {
        let speech = ConsoleSpeech::new(100.0);
        assert!(speech.speak("hello there").await.is_ok());
    }

    #[tokio::test]
    async fn test_stop_interrupts_speech() {
        let speech = Arc::new(ConsoleSpeech::new(0.1));
        let task = {
            let speech = Arc::clone(&speech);
            tokio::spawn(async move { speech.speak("a rather long sentence to say").await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        speech.stop();
        let result = task.await.unwrap();
        assert_eq!(result.unwrap_err().code, SPEECH_INTERRUPTED);
    }

    #[tokio::test]
    async fn test_listen_returns_line() {
        let (listener, mut writer) = listener(Duration::from_secs(5));
        writer.write_all(b"  Alice \n").await.unwrap();
        assert_eq!(listener.listen().await.unwrap(), "  Alice ");
    }

    #[tokio::test]
    async fn test_listen_times_out_without_speech() {
        // Writer stays open, nothing is said.
        let (listener, _writer) = listener(Duration::from_millis(20));
        let err = listener.listen().await.unwrap_err();
        assert_eq!(err.code, NO_SPEECH);
    }

    #[tokio::test]
    async fn test_listen_reports_closed_input() {
        let input = BufReader::new(&b""[..]);
        let listener = ConsoleListener::with_reader(input, "en-US".into(), Duration::from_secs(5));
        let err = listener.listen().await.unwrap_err();
        assert_eq!(err.code, INPUT_CLOSED);
    }

    #[tokio::test]
    async fn test_stop_aborts_listen() {
        let (listener, _writer) = listener(Duration::from_secs(30));
        let listener = Arc::new(listener);
        let task = {
            let listener = Arc::clone(&listener);
            tokio::spawn(async move { listener.listen().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        listener.stop();
        let result = task.await.unwrap();
        assert_eq!(result.unwrap_err().code, RECOGNITION_STOPPED);
    }
}
