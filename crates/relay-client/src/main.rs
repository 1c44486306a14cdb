//! Streams one completion from the relay and prints it as it arrives.

use std::cell::RefCell;
use std::io::Write;

use clap::Parser;
use relay_client::{ClientConfig, DEFAULT_RELAY_URL, RelayClient};
use relay_core::{ChatMessage, CompletionRequest, ModelId};
use tokio::sync::Notify;

#[derive(Parser, Debug)]
#[command(name = "feedback-stream")]
#[command(about = "Stream a completion from the relay to stdout")]
#[command(version)]
struct Cli {
    /// Relay base URL.
    #[arg(long, env = "RELAY_URL", default_value = DEFAULT_RELAY_URL)]
    url: String,

    /// Bearer token presented to the relay.
    #[arg(long, env = "RELAY_ACCESS_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[arg(long, default_value = "gpt-4o-mini")]
    model: ModelId,

    #[arg(long, default_value_t = 0.7)]
    temperature: f64,

    /// Optional system message sent before the prompt.
    #[arg(long)]
    system: Option<String>,

    /// User prompt.
    prompt: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    relay_core::init_observability();
    let cli = Cli::parse();

    let mut messages = Vec::new();
    if let Some(system) = cli.system {
        messages.push(ChatMessage::system(system));
    }
    messages.push(ChatMessage::user(cli.prompt));
    let request = CompletionRequest::new(cli.model, messages, cli.temperature);
    request.validate()?;

    let mut config = ClientConfig::new(cli.url);
    if let Some(token) = cli.token {
        config = config.access_token(token);
    }
    let client = RelayClient::new(config)?;

    // A stdout write failure (e.g. a closed pipe) drops the in-flight stream,
    // which closes the relay connection.
    let mut printer = SuffixPrinter::new(std::io::stdout());
    let write_error = RefCell::new(None::<std::io::Error>);
    let stop = Notify::new();
    let streamed = client.stream_completion(
        &request,
        |text| {
            if write_error.borrow().is_some() {
                return;
            }
            if let Err(err) = printer.print(text) {
                *write_error.borrow_mut() = Some(err);
                stop.notify_one();
            }
        },
        |_| {},
    );

    let result = tokio::select! {
        biased;
        () = stop.notified() => {
            let err = write_error.borrow_mut().take();
            return Err(err.map_or_else(|| "stdout closed".into(), Into::into));
        }
        result = streamed => result?,
    };

    match result {
        Some(_) => println!(),
        None => eprintln!("relay returned no content"),
    }
    Ok(())
}

/// Writes only the part of the cumulative text not yet written.
struct SuffixPrinter<W> {
    out: W,
    printed: usize,
}

impl<W: Write> SuffixPrinter<W> {
    fn new(out: W) -> Self {
        Self { out, printed: 0 }
    }

    fn print(&mut self, text: &str) -> std::io::Result<()> {
        let suffix = text.get(self.printed..).unwrap_or_default();
        self.out.write_all(suffix.as_bytes())?;
        self.out.flush()?;
        self.printed = text.len();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prints_only_the_new_suffix() {
        let mut printer = SuffixPrinter::new(Vec::new());
        for text in ["Hel", "Hello", "Hello wo", "Hello world"] {
            printer.print(text).expect("write");
        }
        assert_eq!(printer.out, b"Hello world");
    }

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn write_failure_is_reported() {
        let mut printer = SuffixPrinter::new(ClosedPipe);
        let err = printer.print("Hello").expect_err("closed pipe");
        assert_eq!(err.kind(), std::io::ErrorKind::BrokenPipe);
        assert_eq!(printer.printed, 0);
    }
}
