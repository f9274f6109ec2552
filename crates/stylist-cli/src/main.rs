use std::io::{self, ErrorKind, Write};
use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use stylist_contracts::chat::{parse_intent, CHAT_HELP_COMMANDS};
use stylist_contracts::closet::SyncOutcome;
use stylist_contracts::error::StylistError;
use stylist_contracts::models::{ModelRegistry, ModelSpec, VISION};
use stylist_engine::config::StylistConfig;
use stylist_engine::uploads::{load_batch, load_upload};
use stylist_engine::{StylistEngine, SyncReport};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

const DEFAULT_EVENTS_PATH: &str = ".stylist/events.jsonl";

#[derive(Debug, Parser)]
#[command(name = "stylist", version, about = "AI digital stylist for the clothes you own")]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive styling chat.
    Chat(ChatArgs),
    /// Ask a single question and print the answer.
    Ask(AskArgs),
    /// Mail the closet to yourself now.
    Sync(SyncArgs),
    /// List the allowed models.
    Models,
}

#[derive(Debug, Args)]
struct SessionArgs {
    /// Clothing photos (png, jpg, jpeg).
    #[arg(long, num_args = 1..)]
    closet: Vec<PathBuf>,
    /// Optional selfie used for skin-tone matching.
    #[arg(long)]
    face: Option<PathBuf>,
    #[arg(long)]
    model: Option<String>,
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long)]
    secrets: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct ChatArgs {
    #[command(flatten)]
    session: SessionArgs,
}

#[derive(Debug, Parser)]
struct AskArgs {
    #[arg(long)]
    prompt: String,
    #[command(flatten)]
    session: SessionArgs,
}

#[derive(Debug, Parser)]
struct SyncArgs {
    #[command(flatten)]
    session: SessionArgs,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("stylist error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.command {
        Command::Chat(args) => {
            run_chat(args)?;
            Ok(0)
        }
        Command::Ask(args) => run_ask(args),
        Command::Sync(args) => run_sync(args),
        Command::Models => {
            print_models(&ModelRegistry::new(None).by_capability(VISION), None);
            Ok(0)
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(io::stderr)
        .finish();
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Warning: failed to install log subscriber: {err}");
    }
}

fn open_engine(args: &SessionArgs) -> Result<StylistEngine> {
    let mut config = StylistConfig::load(args.secrets.as_deref())?;
    if let Some(model) = &args.model {
        config.model = model.clone();
    }
    let events_path = args
        .events
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_EVENTS_PATH));
    let mut engine = StylistEngine::new(config, events_path)?;
    if !args.closet.is_empty() {
        engine.set_closet(load_batch(&args.closet)?);
    }
    if let Some(face) = &args.face {
        engine.set_face(Some(load_upload(face)?));
    }
    Ok(engine)
}

fn run_chat(args: ChatArgs) -> Result<()> {
    let mut engine = open_engine(&args.session)?;
    let stdin = io::stdin();
    let mut line = String::new();

    begin_chat(&mut engine);

    loop {
        print!("> ");
        io::stdout().flush()?;

        line.clear();
        let read = match stdin.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        report_sync(&engine.refresh(), false);

        let input = line.trim_end_matches(['\n', '\r']);
        let intent = parse_intent(input);
        match intent.action.as_str() {
            "noop" => continue,
            "help" => {
                println!("Commands: {}", CHAT_HELP_COMMANDS.join(" "));
            }
            "set_closet" => {
                let paths = value_as_string_list(intent.command_args.get("paths"));
                if paths.is_empty() {
                    println!("/closet requires at least one image path");
                    continue;
                }
                match load_batch(&paths) {
                    Ok(batch) => {
                        engine.set_closet(batch);
                        print_closet(&engine);
                        report_sync(&engine.refresh(), false);
                    }
                    Err(err) => println!("Upload failed: {err:#}"),
                }
            }
            "set_face" => match value_as_non_empty_string(intent.command_args.get("path")) {
                Some(path) => match load_upload(PathBuf::from(&path).as_path()) {
                    Ok(face) => {
                        println!("Selfie set to {}", face.filename);
                        engine.set_face(Some(face));
                    }
                    Err(err) => println!("Upload failed: {err:#}"),
                },
                None => {
                    engine.set_face(None);
                    println!("Selfie removed.");
                }
            },
            "sync_now" => {
                report_sync(&engine.sync_now(), true);
            }
            "clear_history" => {
                engine.clear_history();
                println!("Chat history cleared.");
            }
            "history" => print_history(&engine),
            "list_models" => print_models(&engine.models(), Some(engine.model().name.as_str())),
            "set_model" => {
                let Some(model) = value_as_non_empty_string(intent.command_args.get("model"))
                else {
                    println!("/model requires a model name");
                    continue;
                };
                let selection = engine.set_model(&model);
                println!("Model set to {}", selection.model.name);
                if let Some(fallback) = selection.fallback {
                    println!("{fallback}");
                }
            }
            "set_api_key" => {
                match value_as_non_empty_string(intent.command_args.get("api_key")) {
                    Some(key) => {
                        engine.set_api_key(&key);
                        println!("API key updated.");
                    }
                    None => println!("/key requires a value"),
                }
            }
            "unknown" => {
                let command = value_as_non_empty_string(intent.command_args.get("command"))
                    .unwrap_or_default();
                println!("Unknown command: /{command}. Type /help for commands.");
            }
            "chat" => {
                let Some(prompt) = intent.prompt else {
                    continue;
                };
                if engine.closet().is_empty() {
                    print_upload_hint();
                    continue;
                }
                println!("Stylist is thinking using {}...", engine.model().name);
                match engine.chat(&prompt) {
                    Ok(reply) => println!("{reply}"),
                    Err(err) => report_error(&err),
                }
            }
            _ => {}
        }
    }

    engine.finish()
}

fn run_ask(args: AskArgs) -> Result<i32> {
    let mut engine = open_engine(&args.session)?;
    report_sync(&engine.refresh(), false);
    if engine.closet().is_empty() {
        print_upload_hint();
        engine.finish()?;
        return Ok(1);
    }
    let code = match engine.chat(&args.prompt) {
        Ok(reply) => {
            println!("{reply}");
            0
        }
        Err(err) => {
            report_error(&err);
            1
        }
    };
    engine.finish()?;
    Ok(code)
}

fn run_sync(args: SyncArgs) -> Result<i32> {
    if args.session.closet.is_empty() {
        bail!("sync requires at least one --closet image");
    }
    let mut engine = open_engine(&args.session)?;
    let report = engine.sync_now();
    report_sync(&report, true);
    engine.finish()?;
    Ok(match report.outcome {
        SyncOutcome::Failed(_) => 1,
        _ => 0,
    })
}

/// Opening screen of the chat; the first render also syncs a preloaded closet.
fn begin_chat(engine: &mut StylistEngine) -> SyncReport {
    println!(
        "Stylist chat started with {} (session {}). Type /help for commands.",
        engine.model().name,
        engine.session_id()
    );
    if engine.closet().is_empty() {
        print_upload_hint();
    } else {
        print_closet(engine);
    }
    let report = engine.refresh();
    report_sync(&report, false);
    report
}

fn report_sync(report: &SyncReport, manual: bool) {
    if report.repeat {
        return;
    }
    match &report.outcome {
        SyncOutcome::Sent => println!("Closet synced to your inbox."),
        SyncOutcome::Failed(err) => {
            println!("Closet sync failed.");
            report_error(&StylistError::from(err.clone()));
        }
        SyncOutcome::Skipped if manual => println!("No closet items to sync."),
        SyncOutcome::Skipped => {}
    }
}

fn report_error(err: &StylistError) {
    match err {
        StylistError::ModelNotFound { model, .. } => println!("Model '{model}' not found."),
        StylistError::Configuration { message, .. } => {
            println!("Configuration error: {message}")
        }
        StylistError::Transport(message) => println!("API Error: {message}"),
    }
    if let Some(hint) = err.hint() {
        println!("{hint}");
    }
}

fn print_upload_hint() {
    println!("Step 1: Set your API key. Step 2: Upload clothes with /closet <paths>!");
}

fn print_closet(engine: &StylistEngine) {
    let names = engine.closet().filenames();
    println!("Your closet ({} items): {}", names.len(), names.join(", "));
    if let Some(face) = engine.face() {
        println!("Selfie: {}", face.filename);
    }
}

fn print_history(engine: &StylistEngine) {
    let log = engine.conversation();
    if log.is_empty() {
        println!("No messages yet.");
        return;
    }
    for message in log.messages() {
        println!("{}: {}", message.role.as_str(), message.content);
    }
    if log.awaiting_reply() {
        println!("(the last message has no reply)");
    }
}

fn print_models(models: &[ModelSpec], current: Option<&str>) {
    for model in models {
        let marker = if Some(model.name.as_str()) == current {
            "*"
        } else {
            " "
        };
        println!("{marker} {} ({})", model.name, model.provider);
    }
}

fn value_as_string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
        .into_iter()
        .filter_map(|item| item.as_str().map(str::trim).map(str::to_string))
        .filter(|item| !item.is_empty())
        .collect()
}

fn value_as_non_empty_string(value: Option<&Value>) -> Option<String> {
    let raw = value
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default();
    if raw.is_empty() {
        None
    } else {
        Some(raw.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use clap::Parser;
    use serde_json::json;
    use stylist_contracts::closet::{Notifier, SyncOutcome, UploadBatch, UploadedFile};
    use stylist_contracts::error::NotifyError;
    use stylist_engine::config::StylistConfig;
    use stylist_engine::providers::{DryrunProvider, ProviderRegistry};
    use stylist_engine::StylistEngine;

    use super::{begin_chat, value_as_non_empty_string, value_as_string_list, Cli, Command};

    struct CountingNotifier(Arc<AtomicUsize>);

    impl Notifier for CountingNotifier {
        fn send(&self, _batch: &UploadBatch) -> Result<(), NotifyError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn preloaded_closet_syncs_before_first_prompt() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let calls = Arc::new(AtomicUsize::new(0));
        let mut providers = ProviderRegistry::new();
        providers.register(DryrunProvider);
        let mut engine = StylistEngine::with_parts(
            StylistConfig {
                model: "dryrun-stylist".to_string(),
                ..StylistConfig::default()
            },
            temp.path().join("events.jsonl"),
            providers,
            Box::new(CountingNotifier(calls.clone())),
        )?;
        engine.set_closet(UploadBatch::new(vec![UploadedFile::new(
            "shirt.jpg",
            vec![0xff, 0xd8],
            "jpeg",
        )]));

        let report = begin_chat(&mut engine);
        assert_eq!(report.outcome, SyncOutcome::Sent);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(engine.refresh().outcome, SyncOutcome::Skipped);
        Ok(())
    }

    #[test]
    fn chat_accepts_multiple_closet_paths() {
        let cli = Cli::try_parse_from([
            "stylist",
            "chat",
            "--closet",
            "shirt.jpg",
            "pants.png",
            "--face",
            "me.jpg",
            "--model",
            "gemini-2.5-flash",
        ])
        .unwrap();
        let Command::Chat(args) = cli.command else {
            panic!("expected chat command");
        };
        assert_eq!(args.session.closet.len(), 2);
        assert_eq!(
            args.session.face.as_deref(),
            Some(std::path::Path::new("me.jpg"))
        );
        assert_eq!(args.session.model.as_deref(), Some("gemini-2.5-flash"));
    }

    #[test]
    fn ask_requires_prompt() {
        assert!(Cli::try_parse_from(["stylist", "ask", "--closet", "a.png"]).is_err());
        assert!(Cli::try_parse_from(["stylist", "-vv", "ask", "--prompt", "office"]).is_ok());
    }

    #[test]
    fn value_helpers_trim_and_drop_blanks() {
        assert_eq!(
            value_as_string_list(Some(&json!([" a.png ", "", 3, "b.jpg"]))),
            vec!["a.png", "b.jpg"]
        );
        assert_eq!(value_as_non_empty_string(Some(&json!("  "))), None);
        assert_eq!(
            value_as_non_empty_string(Some(&json!(" gemini-2.5-flash "))),
            Some("gemini-2.5-flash".to_string())
        );
    }
}
