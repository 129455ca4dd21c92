//! `mailpipe` - compose a message and hand it to sendmail
//!
//! Reads the body from a file or stdin, builds the message with
//! `mailpipe-core` and delivers it through the configured mechanism.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

use std::io::{IsTerminal, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use mailpipe_core::{Attachment, DeliveryStatus, Mailer, MailerConfig, Sender};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "mailpipe", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to the user config directory)
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Compose and send a message
    Send(SendArgs),
}

#[derive(clap::Args)]
struct SendArgs {
    /// Subject line
    #[arg(short, long, default_value = "")]
    subject: String,

    /// Recipient address (repeatable)
    #[arg(short, long = "to", value_name = "ADDRESS", required = true)]
    to: Vec<String>,

    /// Carbon-copy address (repeatable)
    #[arg(long, value_name = "ADDRESS")]
    cc: Vec<String>,

    /// Blind carbon-copy address (repeatable)
    #[arg(long, value_name = "ADDRESS")]
    bcc: Vec<String>,

    /// Sender address (defaults to the configured sender)
    #[arg(short, long, value_name = "ADDRESS")]
    from: Option<String>,

    /// Display name for the sender
    #[arg(long, value_name = "NAME", requires = "from")]
    from_name: Option<String>,

    /// Reply-To address
    #[arg(long, value_name = "ADDRESS")]
    reply_to: Option<String>,

    /// Plain-text body file (reads stdin when omitted, unless only HTML is
    /// given from a terminal)
    #[arg(short, long, value_name = "FILE")]
    body_file: Option<PathBuf>,

    /// HTML body file
    #[arg(long, value_name = "FILE")]
    html_file: Option<PathBuf>,

    /// Attachment, optionally followed by its content type
    #[arg(short, long, value_name = "PATH[:TYPE]")]
    attach: Vec<String>,

    /// Body charset
    #[arg(long)]
    charset: Option<String>,

    /// Print the serialized message instead of sending it
    #[arg(long)]
    dry_run: bool,
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "mailpipe=info",
        1 => "mailpipe=info,mailpipe_core=info",
        2 => "mailpipe=debug,mailpipe_core=debug,mailpipe_sendmail=debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = load_config(cli.config.as_deref())?;
    let mailer = Mailer::new(config);

    match cli.command {
        Commands::Send(args) => send(&mailer, args),
    }
}

/// Loads the explicit config file, else the user one when present, then
/// applies environment overrides.
fn load_config(explicit: Option<&Path>) -> anyhow::Result<MailerConfig> {
    let path = explicit.map(Path::to_path_buf).or_else(|| {
        dirs::config_dir()
            .map(|dir| dir.join("mailpipe").join("config.toml"))
            .filter(|path| path.exists())
    });

    let config = match path {
        Some(path) => MailerConfig::load(&path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => MailerConfig::default(),
    };

    config
        .with_lookup(|key| std::env::var(key).ok())
        .context("Invalid environment setting")
}

/// Where the plain-text body comes from.
#[derive(Debug, PartialEq, Eq)]
enum BodySource<'a> {
    File(&'a Path),
    Stdin,
    Empty,
}

/// An HTML-only message typed at a terminal has no plain body to wait for.
fn body_source(
    body_file: Option<&Path>,
    has_html: bool,
    stdin_is_terminal: bool,
) -> BodySource<'_> {
    match body_file {
        Some(path) => BodySource::File(path),
        None if has_html && stdin_is_terminal => BodySource::Empty,
        None => BodySource::Stdin,
    }
}

fn send(mailer: &Mailer, args: SendArgs) -> anyhow::Result<ExitCode> {
    let source = body_source(
        args.body_file.as_deref(),
        args.html_file.is_some(),
        std::io::stdin().is_terminal(),
    );
    let body = match source {
        BodySource::File(path) => Some(read_text(path)?),
        BodySource::Stdin => {
            let mut body = String::new();
            std::io::stdin()
                .read_to_string(&mut body)
                .context("Failed to read body from stdin")?;
            Some(body)
        }
        BodySource::Empty => None,
    };

    let mut message = mailer.message(args.subject).with_recipients(args.to);
    if let Some(body) = body {
        message = message.with_body(body);
    }

    if let Some(address) = args.from {
        message = message.with_sender(match args.from_name {
            Some(name) => Sender::named(name, address),
            None => Sender::from(address),
        });
    }
    if !args.cc.is_empty() {
        message = message.with_cc(args.cc);
    }
    if !args.bcc.is_empty() {
        message = message.with_bcc(args.bcc);
    }
    if let Some(reply_to) = args.reply_to {
        message = message.with_reply_to(reply_to);
    }
    if let Some(charset) = args.charset {
        message = message.with_charset(charset);
    }
    if let Some(path) = &args.html_file {
        message = message.with_html(read_text(path)?);
    }
    for spec in &args.attach {
        message = message.with_attachment(read_attachment(spec)?);
    }

    if args.dry_run {
        std::io::stdout()
            .write_all(&message.dump())
            .context("Failed to write message")?;
        return Ok(ExitCode::SUCCESS);
    }

    match mailer.send(&message)? {
        DeliveryStatus::Suppressed => {
            info!("Sending is suppressed, nothing was delivered");
            Ok(ExitCode::SUCCESS)
        }
        DeliveryStatus::Delivered(_) => {
            info!(recipients = message.recipients.len(), "Message delivered");
            Ok(ExitCode::SUCCESS)
        }
        DeliveryStatus::Silenced(e) => {
            eprintln!("mailpipe: {e}");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn read_text(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Splits `PATH[:TYPE]`. The suffix only counts as a type when it looks
/// like one, so paths containing colons still work.
fn split_attach_spec(spec: &str) -> (&str, Option<&str>) {
    match spec.rsplit_once(':') {
        Some((path, content_type))
            if !path.is_empty() && content_type.contains('/') && !content_type.contains(' ') =>
        {
            (path, Some(content_type))
        }
        _ => (spec, None),
    }
}

fn read_attachment(spec: &str) -> anyhow::Result<Attachment> {
    let (path, content_type) = split_attach_spec(spec);
    let path = Path::new(path);
    let Some(filename) = path.file_name().and_then(|name| name.to_str()) else {
        bail!("Attachment path has no file name: {}", path.display());
    };

    let data = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let mut attachment = Attachment::new(data).with_filename(filename);
    if let Some(content_type) = content_type {
        attachment = attachment.with_content_type(content_type);
    }
    Ok(attachment)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_split_attach_spec() {
        assert_eq!(split_attach_spec("report.pdf"), ("report.pdf", None));
        assert_eq!(
            split_attach_spec("report.pdf:application/pdf"),
            ("report.pdf", Some("application/pdf"))
        );
        assert_eq!(split_attach_spec("C:notes.txt"), ("C:notes.txt", None));
        assert_eq!(split_attach_spec(":text/plain"), (":text/plain", None));
    }

    #[test]
    fn test_cli_parses_send() {
        let cli = Cli::try_parse_from([
            "mailpipe", "send", "-s", "Hi", "--to", "a@example.com", "--to", "b@example.com",
            "--attach", "x.csv:text/csv", "--dry-run",
        ])
        .unwrap();

        let Commands::Send(args) = cli.command;
        assert_eq!(args.subject, "Hi");
        assert_eq!(args.to, vec!["a@example.com", "b@example.com"]);
        assert_eq!(args.attach, vec!["x.csv:text/csv"]);
        assert!(args.dry_run);
    }

    #[test]
    fn test_body_source() {
        let file = Path::new("body.txt");
        assert_eq!(body_source(Some(file), true, true), BodySource::File(file));
        assert_eq!(body_source(None, true, true), BodySource::Empty);
        assert_eq!(body_source(None, true, false), BodySource::Stdin);
        assert_eq!(body_source(None, false, true), BodySource::Stdin);
        assert_eq!(body_source(None, false, false), BodySource::Stdin);
    }

    #[test]
    fn test_cli_parses_html_only_send() {
        let cli = Cli::try_parse_from([
            "mailpipe", "send", "--to", "a@example.com", "--html-file", "page.html",
        ])
        .unwrap();

        let Commands::Send(args) = cli.command;
        assert!(args.body_file.is_none());
        assert_eq!(
            body_source(args.body_file.as_deref(), args.html_file.is_some(), true),
            BodySource::Empty
        );
    }

    #[test]
    fn test_cli_requires_recipient() {
        assert!(Cli::try_parse_from(["mailpipe", "send", "-s", "Hi"]).is_err());
    }
}
