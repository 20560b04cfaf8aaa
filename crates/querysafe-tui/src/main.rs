use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use anyhow::{Result, anyhow, bail};
use clap::{Args, Parser, Subcommand};
use colored::*;
use querysafe_core::{Author, ChatController, ConfigOverrides, FormattedText, LogEntry, WidgetConfig};
use tracing_subscriber::EnvFilter;

mod app;
mod handler;
mod tui;
mod ui;

use app::App;

#[derive(Parser)]
#[command(name = "querysafe")]
#[command(version, about = "Chat with a querySafe chatbot from the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    widget: WidgetArgs,
}

#[derive(Args, Debug, Default)]
struct WidgetArgs {
    /// Chat backend base URL (requests go to <BASE_URL>/chat/)
    #[arg(long, global = true)]
    base_url: Option<String>,
    /// Chatbot identifier sent with every request
    #[arg(long, global = true)]
    chatbot_id: Option<String>,
    /// Display name shown in the widget header
    #[arg(long, global = true)]
    name: Option<String>,
    /// Logo URL shown in the widget header
    #[arg(long, global = true)]
    logo_url: Option<String>,
    /// Show messages as literal text instead of markdown
    #[arg(long, global = true)]
    plain: bool,
    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

impl WidgetArgs {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            display_name: self.name.clone(),
            logo_url: self.logo_url.clone(),
            base_url: self.base_url.clone(),
            chatbot_id: self.chatbot_id.clone(),
            plain_text: self.plain,
        }
    }

    fn config_path(&self) -> Result<PathBuf> {
        match &self.config {
            Some(path) => Ok(path.clone()),
            None => WidgetConfig::default_path(),
        }
    }

    /// File, then environment, then flags.
    fn resolve(&self) -> Result<WidgetConfig> {
        let mut config = WidgetConfig::load_from(&self.config_path()?)?;
        config.apply_env();
        config.apply_overrides(&self.overrides());
        config.validate()
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Open the chat widget (default)
    Chat,
    /// Send one or more messages in a single conversation and print the replies
    Ask {
        /// Messages to send, in order
        #[arg(required = true)]
        messages: Vec<String>,
    },
    /// Write the resolved settings to the config file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_path = init_logging()?;
    tracing::info!(log = %log_path.display(), "querysafe starting");

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => run_chat(cli.widget.resolve()?).await,
        Commands::Ask { messages } => ask(cli.widget.resolve()?, &messages, &log_path).await,
        Commands::Init => init_config(&cli.widget),
    }
}

/// Logs go to a file because the terminal belongs to the UI.
fn init_logging() -> Result<PathBuf> {
    let log_dir = dirs::data_local_dir()
        .ok_or_else(|| anyhow!("Could not determine data directory"))?
        .join("querysafe");
    fs::create_dir_all(&log_dir)?;

    let log_path = log_dir.join("querysafe.log");
    let file = OpenOptions::new().create(true).append(true).open(&log_path)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("querysafe=info,querysafe_core=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();

    Ok(log_path)
}

async fn run_chat(config: WidgetConfig) -> Result<()> {
    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut app = App::new(config);

    let result = event_loop(&mut terminal, &mut app).await;

    tui::restore()?;
    result
}

async fn event_loop(terminal: &mut tui::Tui, app: &mut App) -> Result<()> {
    let mut events = tui::EventHandler::new();

    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        tokio::select! {
            event = events.next() => match event {
                Some(event) => handler::handle_event(app, event)?,
                None => break,
            },
            Some(completion) = app.controller.next_completion() => app.on_completion(completion),
        }
    }

    Ok(())
}

async fn ask(config: WidgetConfig, messages: &[String], log_path: &Path) -> Result<()> {
    let bot_name = config.display_name.clone();
    let mut controller = ChatController::new(config);
    let mut failures = 0;

    for message in messages {
        let start = controller.widget().log().len();
        if controller.send_message(message).is_none() {
            println!("{}", "Skipping empty message".yellow());
            continue;
        }
        println!("{} {}", "You:".bold().cyan(), message.trim());

        let failed = controller.settle().await;
        failures += failed;

        // Everything after the user's own entry came back for this turn
        let replies: Vec<_> = controller.widget().log()[start + 1..]
            .iter()
            .filter_map(|entry| match entry {
                LogEntry::Message(rendered) if rendered.message.author == Author::Bot => Some(rendered),
                _ => None,
            })
            .collect();

        if replies.is_empty() {
            println!("{}", "(no answer)".dimmed());
        }
        for reply in replies {
            if failed > 0 {
                println!("{} {}", format!("{}:", bot_name).bold().red(), reply.message.text.red());
            } else {
                println!("{}", format!("{}:", bot_name).bold().yellow());
                print_formatted(&reply.body);
            }
        }
        println!();
    }

    if let Some(id) = &controller.widget().session().conversation_id {
        println!("{} {}", "Conversation:".dimmed(), id.dimmed());
    }

    if failures > 0 {
        bail!("{} request(s) failed, details in {}", failures, log_path.display());
    }
    Ok(())
}

fn print_formatted(text: &FormattedText) {
    for line in &text.lines {
        let mut out = line.prefix.clone();
        for span in &line.spans {
            let mut piece = span.text.normal();
            if span.style.bold {
                piece = piece.bold();
            }
            if span.style.italic {
                piece = piece.italic();
            }
            if span.style.strikethrough {
                piece = piece.strikethrough();
            }
            if span.style.code {
                piece = piece.magenta();
            }
            out.push_str(&piece.to_string());
        }
        println!("  {}", out);
    }
}

fn init_config(args: &WidgetArgs) -> Result<()> {
    let path = args.config_path()?;
    let config = args.resolve()?;
    config.save_to(&path)?;
    println!("{} {}", "Saved config to".green(), path.display().to_string().bold());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_ask_with_global_flags() {
        let cli = Cli::try_parse_from([
            "querysafe",
            "ask",
            "hello",
            "and then?",
            "--base-url",
            "https://bots.example.com",
            "--chatbot-id",
            "bot-7",
            "--plain",
        ])
        .unwrap();

        match cli.command {
            Some(Commands::Ask { messages }) => assert_eq!(messages, vec!["hello", "and then?"]),
            _ => panic!("expected ask"),
        }
        assert_eq!(cli.widget.chatbot_id.as_deref(), Some("bot-7"));
        assert!(cli.widget.plain);
    }

    #[test]
    fn test_no_subcommand_means_chat() {
        let cli = Cli::try_parse_from(["querysafe"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_resolve_reads_file_then_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut saved = WidgetConfig::new("https://file.example.com/", "file-bot");
        saved.display_name = "From File".to_string();
        saved.save_to(&path).unwrap();

        let args = WidgetArgs {
            chatbot_id: Some("flag-bot".to_string()),
            config: Some(path),
            ..WidgetArgs::default()
        };
        let config = args.resolve().unwrap();

        assert_eq!(config.chatbot_id, "flag-bot");
        assert_eq!(config.display_name, "From File");
        assert!(config.formatting);
    }
}
