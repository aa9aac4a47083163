//! pdfquiz CLI
//!
//! Generates a multiple-choice quiz from a PDF and runs it in the terminal,
//! or serves the quiz session over HTTP for a browser front-end.

use std::io::Write as _;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use quiz_core::{
    create_router, AnswerStatus, AppState, Config, Document, Phase, Session, SessionView,
};
use quiz_extract::HttpExtractionGateway;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

type InputLines = Lines<BufReader<Stdin>>;

/// pdfquiz - Quiz yourself on a PDF
///
/// Sends the PDF to an extraction service, which returns multiple-choice
/// questions, then walks you through them one at a time.
#[derive(Parser, Debug)]
#[command(name = "pdfquiz")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the PDF to generate a quiz from
    #[arg(value_name = "PDF")]
    pdf: Option<String>,

    /// Path to configuration file (default: pdfquiz.json in current directory)
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long)]
    verbose: bool,

    /// Serve the quiz session over HTTP instead of running in the terminal
    #[arg(long)]
    serve: bool,

    /// Port for the HTTP server (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// URL of the extraction service (overrides config)
    #[arg(long, value_name = "URL")]
    endpoint: Option<String>,
}

/// A line of user input while answering.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    /// Select the option at this zero-based index.
    Select(usize),
    Submit,
    Next,
    Quit,
    Unknown,
}

/// What to do once the summary is shown.
#[derive(Debug, Clone, PartialEq, Eq)]
enum SummaryChoice {
    /// Start over, optionally with a different PDF.
    Restart(Option<String>),
    Quit,
    Unknown,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (warn in the
    // terminal so logs don't interleave with the quiz, info when serving)
    let default_level = if args.verbose {
        "debug"
    } else if args.serve {
        "info"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("pdfquiz starting");
    tracing::debug!(config = ?args.config, "Config file");

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mut config = load_config(args.config.as_deref())?;

    // Apply CLI argument overrides
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(ref endpoint) = args.endpoint {
        config.extraction.endpoint.clone_from(endpoint);
    }

    // Re-validate after overrides
    config.validate()?;

    let gateway = HttpExtractionGateway::from_config(&config.extraction).map_err(|e| {
        anyhow::anyhow!(
            "{e}\n\nSuggestion: Set extraction.endpoint in pdfquiz.json or pass --endpoint"
        )
    })?;

    if args.serve {
        return serve(config, gateway).await;
    }

    let Some(pdf) = args.pdf else {
        anyhow::bail!(
            "No PDF given\n\nSuggestion: Run 'pdfquiz <PDF>' or 'pdfquiz --serve'"
        );
    };

    print_config(&config);
    run_terminal(&config, &gateway, pdf).await
}

/// Loads configuration from the given file or the current directory.
fn load_config(config_path: Option<&str>) -> anyhow::Result<Config> {
    match config_path {
        Some(path_str) => {
            let path = Path::new(path_str);
            if !path.exists() {
                anyhow::bail!(
                    "Config file not found: '{}'\n\nSuggestion: Check the path or remove the --config flag to use defaults",
                    path.display()
                );
            }
            Config::load_from_file(path).map_err(|e| anyhow::anyhow!("{e}"))
        }
        None => Config::load().map_err(|e| anyhow::anyhow!("{e}")),
    }
}

/// Prints the loaded configuration.
fn print_config(config: &Config) {
    println!("Configuration loaded:");
    println!("  Extraction endpoint: {}", config.extraction.endpoint);
    println!("  Extraction timeout: {}s", config.extraction.timeout_secs);
    println!(
        "  Max document size: {} KB",
        config.max_document_size / 1024
    );
}

// ============================================================================
// HTTP mode
// ============================================================================

/// Serves the session over HTTP until Ctrl+C.
async fn serve(config: Config, gateway: HttpExtractionGateway) -> anyhow::Result<()> {
    let listener = bind_listener(&config.server.host, config.server.port).await?;
    let addr = listener.local_addr()?;

    let router = create_router(AppState::new(config, Arc::new(gateway)));

    println!("pdfquiz server running on http://{addr}");
    println!("Press Ctrl+C to stop");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Received Ctrl+C, shutting down");
            }
        })
        .await?;

    Ok(())
}

/// Binds the server socket.
///
/// `host` may be a host name or an IP address; IPv6 addresses are given
/// without brackets.
async fn bind_listener(host: &str, port: u16) -> anyhow::Result<TcpListener> {
    TcpListener::bind((host, port)).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to bind to {host} port {port}: {e}\n\nSuggestion: Check server.host or try a different port with --port"
        )
    })
}

// ============================================================================
// Terminal mode
// ============================================================================

/// Runs quizzes in the terminal until the user quits.
async fn run_terminal(
    config: &Config,
    gateway: &HttpExtractionGateway,
    pdf: String,
) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut session = Session::new();
    let mut path = pdf;

    loop {
        if !start_quiz(&mut session, config, gateway, &path).await {
            let Some(next) = prompt(&mut lines, "Enter another PDF path (or q to quit)").await?
            else {
                return Ok(());
            };
            if next == "q" {
                return Ok(());
            }
            path = next;
            continue;
        }

        if !answer_questions(&mut session, &mut lines).await? {
            return Ok(());
        }

        print_summary(&session.view());

        loop {
            let Some(input) =
                prompt(&mut lines, "Enter 'r <PDF>' to start over, or q to quit").await?
            else {
                return Ok(());
            };
            match parse_summary_choice(&input) {
                SummaryChoice::Restart(next) => {
                    session.restart();
                    if let Some(next) = next {
                        path = next;
                    }
                    break;
                }
                SummaryChoice::Quit => return Ok(()),
                SummaryChoice::Unknown => println!("Unknown command: {input}"),
            }
        }
    }
}

/// Loads `path`, selects it and generates questions.
///
/// Returns `true` once the session is answering. On failure the session's
/// error has been printed and it is back to awaiting a document.
async fn start_quiz(
    session: &mut Session,
    config: &Config,
    gateway: &HttpExtractionGateway,
    path: &str,
) -> bool {
    let document = match Document::load(path, config.max_document_size) {
        Ok(document) => document,
        Err(e) => {
            println!();
            println!("{e}");
            return false;
        }
    };

    session.select_document(document);
    if let Some(error) = session.error() {
        println!();
        println!("{error}");
        return false;
    }

    println!();
    println!(
        "Generating quiz from {}... (Ctrl+C to cancel)",
        session.document_name().unwrap_or(path)
    );

    let finished = tokio::select! {
        answering = session.generate(gateway, config.extraction.timeout()) => Some(answering),
        Ok(()) = tokio::signal::ctrl_c() => None,
    };
    if finished.is_none() {
        session.cancel_extraction();
    }

    if let Some(error) = session.error() {
        println!("{error}");
    }
    session.phase() == Phase::Answering
}

/// Walks the user through every question.
///
/// Returns `false` if the user quit before reaching the summary.
async fn answer_questions(session: &mut Session, lines: &mut InputLines) -> anyhow::Result<bool> {
    while session.phase() == Phase::Answering {
        let view = session.view();
        print_question(&view);

        let Some(input) = prompt(lines, "Choose 1-n, s to submit, n for next, q to quit").await?
        else {
            return Ok(false);
        };
        let option_count = view.question.as_ref().map_or(0, |q| q.options.len());

        match parse_command(&input, option_count) {
            Command::Select(index) => {
                if let Some(option) = view.question.as_ref().and_then(|q| q.options.get(index)) {
                    if !session.select_option(option) {
                        println!("This question has already been answered.");
                    }
                }
            }
            Command::Submit => {
                if !session.submit_answer() {
                    println!("Select an option before submitting.");
                }
            }
            Command::Next => {
                if !session.advance() {
                    println!("Submit an answer before moving on.");
                }
            }
            Command::Quit => return Ok(false),
            Command::Unknown => println!("Unknown command: {input}"),
        }
    }

    Ok(true)
}

/// Prints a prompt and reads one trimmed line; `None` at end of input.
async fn prompt(lines: &mut InputLines, message: &str) -> anyhow::Result<Option<String>> {
    print!("{message}> ");
    std::io::stdout().flush()?;
    Ok(lines.next_line().await?.map(|line| line.trim().to_string()))
}

fn parse_command(input: &str, option_count: usize) -> Command {
    match input {
        "s" => Command::Submit,
        "n" => Command::Next,
        "q" => Command::Quit,
        _ => match input.parse::<usize>() {
            Ok(number) if (1..=option_count).contains(&number) => Command::Select(number - 1),
            _ => Command::Unknown,
        },
    }
}

fn parse_summary_choice(input: &str) -> SummaryChoice {
    if input == "q" {
        return SummaryChoice::Quit;
    }
    if input == "r" {
        return SummaryChoice::Restart(None);
    }
    match input.strip_prefix("r ") {
        Some(path) if !path.trim().is_empty() => {
            SummaryChoice::Restart(Some(path.trim().to_string()))
        }
        _ => SummaryChoice::Unknown,
    }
}

/// Prints the active question with selection and grading marks.
fn print_question(view: &SessionView) {
    let Some(question) = &view.question else {
        return;
    };

    println!();
    println!(
        "Question {}/{}: {}",
        view.current_index.unwrap_or_default() + 1,
        view.question_count,
        question.prompt
    );

    for (i, option) in question.options.iter().enumerate() {
        let selected = view.pending_selection.as_deref() == Some(option.as_str());
        let correct = view.correct_option.as_deref() == Some(option.as_str());
        let marker = match (selected, correct) {
            (_, true) => "+",
            (true, false) if view.correct_option.is_some() => "x",
            (true, false) => ">",
            (false, false) => " ",
        };
        println!("  {marker} {}) {option}", i + 1);
    }

    match view.answer_status {
        Some(AnswerStatus::Correct) => println!("Correct!"),
        Some(AnswerStatus::Incorrect) => println!(
            "Incorrect. The answer is: {}",
            view.correct_option.as_deref().unwrap_or_default()
        ),
        _ => {}
    }
}

/// Prints the final score and how long the attempt took.
fn print_summary(view: &SessionView) {
    println!();
    println!("=== Quiz Summary ===");
    if let Some(name) = &view.document_name {
        println!("Document: {name}");
    }
    println!("Score: {} / {}", view.score, view.question_count);

    let elapsed = view.duration_secs.unwrap_or_default();
    println!("Duration: {}m {}s", elapsed / 60, elapsed % 60);
}
