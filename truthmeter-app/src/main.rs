use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::io::AsyncReadExt;
use truthmeter_analysis::{AnalysisRequest, Analyzer, HistoryReport, HistoryStore, open_history};
use truthmeter_common::observability::{LogConfig, init_logging};
use truthmeter_config::{DEFAULT_CONFIG_FILE, TruthMeterConfig, TruthMeterConfigLoader};
use truthmeter_llm::build_backend;
use truthmeter_server::AppState;

#[derive(Debug, Parser)]
#[command(name = "truthmeter", version, about = "Score AI-generated text for accuracy")]
struct Cli {
    /// YAML config file. Defaults to ./truthmeter.yaml when present.
    #[arg(long, global = true, env = "TRUTHMETER_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
enum ProviderChoice {
    #[default]
    Primary,
    Alternate,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP gateway.
    Serve {
        /// Overrides `server.bind`.
        #[arg(long)]
        bind: Option<String>,
    },
    /// Analyze one piece of content and print the result as JSON.
    Analyze {
        /// Label of the model that produced the content.
        #[arg(long, default_value = "unknown")]
        model: String,
        /// Read content from a file instead of the argument or stdin.
        #[arg(long, conflicts_with = "text")]
        file: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t)]
        provider: ProviderChoice,
        text: Option<String>,
    },
    /// Issue a minimal provider call to check the credential.
    Ping {
        #[arg(long, value_enum, default_value_t)]
        provider: ProviderChoice,
    },
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
}

#[derive(Debug, Subcommand)]
enum HistoryAction {
    List {
        #[arg(long)]
        limit: Option<usize>,
    },
    Clear,
    Stats,
}

fn load_config(path: Option<&PathBuf>) -> Result<TruthMeterConfig> {
    let loader = match path {
        Some(p) => TruthMeterConfigLoader::new().with_file(p),
        None => TruthMeterConfigLoader::new().with_optional_file(DEFAULT_CONFIG_FILE),
    };
    loader.load().context("failed to load configuration")
}

fn log_config(cfg: &TruthMeterConfig) -> LogConfig {
    LogConfig {
        app_name: "truthmeter",
        log_dir: cfg.logging.dir.clone(),
        emit_file: cfg.logging.file,
        emit_stderr: cfg.logging.stderr,
        format: cfg.logging.format,
        default_filter: cfg.logging.filter.clone(),
    }
}

fn analyzer(
    cfg: &TruthMeterConfig,
    choice: ProviderChoice,
    history: Arc<dyn HistoryStore>,
) -> Result<Analyzer> {
    let provider = match choice {
        ProviderChoice::Primary => &cfg.providers.primary,
        ProviderChoice::Alternate => &cfg.providers.alternate,
    };
    let backend = build_backend(provider)?;
    Ok(Analyzer::new(backend, history, &cfg.analysis, &cfg.pricing))
}

async fn read_content(file: Option<PathBuf>, text: Option<String>) -> Result<String> {
    if let Some(path) = file {
        return tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("failed to read {}", path.display()));
    }
    if let Some(text) = text {
        return Ok(text);
    }
    let mut buf = String::new();
    tokio::io::stdin()
        .read_to_string(&mut buf)
        .await
        .context("failed to read content from stdin")?;
    Ok(buf)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = load_config(cli.config.as_ref())?;

    if let Some(path) = init_logging(log_config(&cfg))? {
        tracing::debug!(log_file = %path.display(), "logging.ready");
    }

    let history = open_history(&cfg.history).await?;

    match cli.command {
        Command::Serve { bind } => {
            let state = AppState {
                primary: Arc::new(analyzer(&cfg, ProviderChoice::Primary, history.clone())?),
                alternate: Arc::new(analyzer(&cfg, ProviderChoice::Alternate, history.clone())?),
                history,
            };
            let addr = bind.unwrap_or_else(|| cfg.server.bind.clone());
            truthmeter_server::serve(state, &addr).await?;
        }
        Command::Analyze {
            model,
            file,
            provider,
            text,
        } => {
            let content = read_content(file, text).await?;
            if content.trim().is_empty() {
                bail!("no content to analyze");
            }
            let outcome = analyzer(&cfg, provider, history)?
                .analyze(&AnalysisRequest::new(content, model))
                .await?;
            print_json(&outcome.result)?;
        }
        Command::Ping { provider } => {
            let analyzer = analyzer(&cfg, provider, history)?;
            let completion = analyzer.backend().ping().await?;
            println!(
                "{} ({}) OK: {}",
                analyzer.backend().provider().display_name(),
                analyzer.backend().model_name(),
                completion.text.trim()
            );
        }
        Command::History { action } => match action {
            HistoryAction::List { limit } => {
                let mut entries = history.list().await;
                if let Some(limit) = limit {
                    entries.truncate(limit);
                }
                print_json(&entries)?;
            }
            HistoryAction::Clear => {
                history.clear().await;
                println!("history cleared");
            }
            HistoryAction::Stats => {
                print_json(&HistoryReport::from_entries(&history.list().await))?;
            }
        },
    }

    Ok(())
}
