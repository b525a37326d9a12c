use anyhow::Context;
use beamer_rs::api::create_provider;
use beamer_rs::session::load_attachment;
use beamer_rs::template::{missing_font_lines, INITIAL_DOCUMENT};
use beamer_rs::utils::{open_file, save_file};
use beamer_rs::{run_action, ActionKind, AppConfig, EditSession, GenerationClient, MediaKind};
use clap::{Parser, Subcommand};
use std::cell::RefCell;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "beamer-rs",
    about = "Edit Gujarati LaTeX Beamer presentations with an AI model",
    version
)]
struct Cli {
    /// Document to edit. The built-in template is used when absent.
    #[arg(short, long, global = true)]
    file: Option<PathBuf>,

    /// Where to write the result. Defaults to --file, else stdout.
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Provider name from the config file (e.g. Gemini, OpenAI, Ollama).
    #[arg(long, global = true)]
    provider: Option<String>,

    /// Model override for this run.
    #[arg(long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply an instruction to the whole document.
    Update { instruction: String },
    /// Rewrite a range of the document in place.
    Rewrite {
        /// Start of the range, in characters.
        #[arg(long, requires = "end", conflicts_with = "pattern")]
        start: Option<usize>,
        /// End of the range (exclusive), in characters.
        #[arg(long, requires = "start")]
        end: Option<usize>,
        /// Select the first occurrence of this text instead of a range.
        #[arg(long = "match", required_unless_present = "start")]
        pattern: Option<String>,
        instruction: String,
    },
    /// Add slides generated from an image.
    Image {
        path: PathBuf,
        #[arg(short, long, default_value = "")]
        prompt: String,
    },
    /// Add slides generated from a PDF.
    Pdf {
        path: PathBuf,
        #[arg(short, long, default_value = "")]
        prompt: String,
    },
    /// Print the starting template.
    Template,
    /// Check that the configured provider is reachable.
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "beamer_rs=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    if let Commands::Template = cli.command {
        return write_output(cli.output.as_deref(), INITIAL_DOCUMENT);
    }

    let config = AppConfig::load();
    let provider = config.resolve_provider(cli.provider.as_deref(), cli.model.as_deref())?;
    let client = GenerationClient::new(create_provider(&provider))
        .with_system_suffix(provider.system_prompt.clone());
    tracing::info!(
        "Using provider {} ({})",
        client.provider_name(),
        client.model()
    );

    if let Commands::Check = cli.command {
        return match client.check_availability().await {
            Ok(()) => {
                println!("{} is ready (model: {})", client.provider_name(), client.model());
                Ok(())
            }
            Err(e) => anyhow::bail!("{} is not available: {}", client.provider_name(), e),
        };
    }

    let document = match &cli.file {
        Some(path) => open_file(path)?,
        None => INITIAL_DOCUMENT.to_string(),
    };
    let result = execute(cli.command, document, &client).await?;

    let missing = missing_font_lines(&result);
    if !missing.is_empty() {
        tracing::warn!("Gujarati font setup lines missing from result: {:?}", missing);
    }

    let target = cli.output.as_deref().or(cli.file.as_deref());
    write_output(target, &result)
}

/// Runs one editing command against `document` and returns the merged text.
/// Ctrl-C while the request is in flight cancels it.
async fn execute(
    command: Commands,
    document: String,
    client: &GenerationClient,
) -> anyhow::Result<String> {
    let session = RefCell::new(EditSession::new(document));

    let kind = match command {
        Commands::Update { instruction } => {
            session.borrow_mut().set_instruction(instruction);
            ActionKind::WholeDocumentUpdate
        }
        Commands::Rewrite {
            start,
            end,
            pattern,
            instruction,
        } => {
            let (start, end) = match (start, end, pattern) {
                (Some(start), Some(end), _) => (start, end),
                (_, _, Some(pattern)) => find_chars(session.borrow().document(), &pattern)
                    .with_context(|| format!("Text not found in document: {:?}", pattern))?,
                _ => anyhow::bail!("Pass either --start/--end or --match"),
            };
            let mut s = session.borrow_mut();
            if s.select(start, end).is_none() {
                anyhow::bail!("Empty selection {}..{}", start, end);
            }
            s.set_instruction(instruction);
            ActionKind::SelectionRewrite
        }
        Commands::Image { path, prompt } => {
            attach(&session, &path, MediaKind::Image, prompt).await?;
            ActionKind::ImageGeneration
        }
        Commands::Pdf { path, prompt } => {
            attach(&session, &path, MediaKind::Pdf, prompt).await?;
            ActionKind::PdfGeneration
        }
        Commands::Template | Commands::Check => {
            anyhow::bail!("Template and check do not edit a document")
        }
    };

    let result = {
        let action = run_action(&session, client, kind);
        tokio::pin!(action);
        let mut interrupted = false;
        loop {
            tokio::select! {
                result = &mut action => break result,
                _ = tokio::signal::ctrl_c(), if !interrupted => {
                    interrupted = true;
                    eprintln!("Cancelling...");
                    session.borrow().cancel_active();
                }
            }
        }
    };

    let session = session.into_inner();
    if result.is_err() {
        anyhow::bail!("{}", session.error().unwrap_or("Action failed"));
    }
    Ok(session.document().to_string())
}

async fn attach(
    session: &RefCell<EditSession>,
    path: &Path,
    kind: MediaKind,
    prompt: String,
) -> anyhow::Result<()> {
    load_attachment(session, path, kind)
        .await
        .with_context(|| format!("Could not attach {:?}", path))?;
    session.borrow_mut().set_media_prompt(kind, prompt);
    Ok(())
}

/// Char range of the first occurrence of `pattern`.
fn find_chars(document: &str, pattern: &str) -> Option<(usize, usize)> {
    if pattern.is_empty() {
        return None;
    }
    let byte = document.find(pattern)?;
    let start = document[..byte].chars().count();
    Some((start, start + pattern.chars().count()))
}

fn write_output(path: Option<&Path>, contents: &str) -> anyhow::Result<()> {
    match path {
        Some(path) => {
            save_file(path, contents)?;
            eprintln!("Wrote {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(contents.as_bytes())?;
            stdout.flush()?;
        }
    }
    Ok(())
}
