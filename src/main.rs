//! sourcereg CLI entry point

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use source_registry::{
    catalog::ContentType,
    commands::{
        cmd_clear_badge, cmd_disable_all, cmd_disabled_sources, cmd_enable_only,
        cmd_enabled_sources, cmd_get_settings, cmd_init, cmd_list_sources, cmd_pinned_sources,
        cmd_reorder, cmd_set_enabled, cmd_set_pinned, cmd_set_setting, cmd_status,
        cmd_top_sources, cmd_track_usage, cmd_watch, print_settings, print_source_completions,
        print_sources, print_status, print_toggle, ListOptions, SourceView, WatchTarget,
    },
    config::Config,
    error::Result,
    registry::SourceRegistry,
    settings::SortOrder,
};
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "sourcereg")]
#[command(version, about = "Manage content sources: enable, pin, order and track usage", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, env = "SOURCEREG_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration and database
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// List catalog sources
    List {
        /// Only sources that are not enabled
        #[arg(long)]
        disabled: bool,

        /// Only sources added by this version
        #[arg(long = "new")]
        new_only: bool,

        /// Hide sources marked broken
        #[arg(long)]
        exclude_broken: bool,

        /// Only these content types (repeatable)
        #[arg(short = 't', long = "type")]
        content_types: Vec<ContentType>,

        /// Filter by title or name (case-insensitive substring)
        #[arg(short, long)]
        query: Option<String>,

        /// Only sources in this language (e.g., en)
        #[arg(short, long)]
        locale: Option<String>,

        /// Order results (manual, alphabetic, alphabetic_pinned)
        #[arg(short, long)]
        sort: Option<SortOrder>,

        /// Output only source names (one per line, for scripting)
        #[arg(long)]
        names_only: bool,

        /// Output source names with titles for shell completions
        #[arg(long, value_enum, hide = true)]
        completion: Option<Shell>,
    },

    /// List enabled sources in display order
    Enabled,

    /// List sources that are not enabled
    Disabled,

    /// List pinned sources
    Pinned,

    /// List most recently used sources
    Top {
        /// Maximum number of sources (defaults to config top_sources_limit)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Enable sources
    ///
    /// Use 'sourcereg list --names-only' to list available names
    Enable {
        #[arg(required = true)]
        sources: Vec<String>,
    },

    /// Disable sources
    Disable {
        #[arg(required = true)]
        sources: Vec<String>,
    },

    /// Enable exactly these sources and disable all others
    Only { sources: Vec<String> },

    /// Disable every source
    DisableAll {
        /// Skip confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Pin sources
    Pin {
        #[arg(required = true)]
        sources: Vec<String>,
    },

    /// Unpin sources
    Unpin {
        #[arg(required = true)]
        sources: Vec<String>,
    },

    /// Move sources to the front of the manual order
    Reorder {
        #[arg(required = true)]
        sources: Vec<String>,
    },

    /// Record that a source was just used
    Use { source: String },

    /// Show registry status
    Status,

    /// Acknowledge new sources and hide the badge
    ClearBadge,

    /// Show or change settings
    Set {
        /// Setting key (omit to show all)
        key: Option<String>,
        /// New value (omit to show the current one)
        value: Option<String>,
    },

    /// Print a live view until Ctrl-C
    Watch {
        #[arg(value_enum)]
        target: WatchTarget,

        /// Source name, for the 'source' view
        #[arg(long)]
        source: Option<String>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    // Handle init command specially (doesn't need existing config)
    if let Commands::Init { force } = cli.command {
        let base_dir = cli.config.as_deref().map(config_base_dir);
        let report = cmd_init(base_dir, force).await?;
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            println!("✓ sourcereg initialized successfully");
            println!("  Config: {}", report.config_path);
            println!("  Database: {}", report.db_path);
            println!("  Sources registered: {}", report.stored_records);
            println!("\nNext steps:");
            println!("  1. Browse sources: sourcereg list");
            println!("  2. Enable some: sourcereg enable <NAME>...");
        }
        return Ok(());
    }

    // Handle completions command (doesn't need config/db)
    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "sourcereg", &mut std::io::stdout());
        print_completion_extras(shell);
        return Ok(());
    }

    let config = load_config(cli.config.as_deref())?;
    let registry = SourceRegistry::from_config(&config).await?;
    let json = cli.json;

    match cli.command {
        Commands::Init { .. } | Commands::Completions { .. } => unreachable!(),

        Commands::List {
            disabled,
            new_only,
            exclude_broken,
            content_types,
            query,
            locale,
            sort,
            names_only,
            completion,
        } => {
            if let Some(shell) = completion {
                print_source_completions(&registry, shell);
                return Ok(());
            }

            let options = ListOptions {
                disabled_only: disabled,
                new_only,
                exclude_broken,
                content_types,
                query,
                locale,
                sort,
            };
            let sources = cmd_list_sources(&registry, &options).await?;

            if names_only {
                for source in &sources {
                    println!("{}", source.name);
                }
            } else {
                output_sources("Sources", &sources, json)?;
            }
        }

        Commands::Enabled => {
            let sources = cmd_enabled_sources(&registry).await?;
            output_sources("Enabled Sources", &sources, json)?;
        }

        Commands::Disabled => {
            let sources = cmd_disabled_sources(&registry).await?;
            output_sources("Disabled Sources", &sources, json)?;
        }

        Commands::Pinned => {
            let sources = cmd_pinned_sources(&registry).await?;
            output_sources("Pinned Sources", &sources, json)?;
        }

        Commands::Top { limit } => {
            let limit = limit.unwrap_or(config.top_sources_limit);
            let sources = cmd_top_sources(&registry, limit).await?;
            output_sources("Recently Used Sources", &sources, json)?;
        }

        Commands::Enable { sources } => {
            let handle = cmd_set_enabled(&registry, &sources, true).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&handle)?);
            } else {
                print_toggle(&handle, true);
            }
        }

        Commands::Disable { sources } => {
            let handle = cmd_set_enabled(&registry, &sources, false).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&handle)?);
            } else {
                print_toggle(&handle, false);
            }
        }

        Commands::Only { sources } => {
            let enabled = cmd_enable_only(&registry, &sources).await?;
            output_sources("Enabled Sources", &enabled, json)?;
        }

        Commands::DisableAll { yes } => {
            if !yes {
                eprintln!("⚠️  This will disable ALL sources!");
                eprintln!("Run with --yes to confirm.");
                std::process::exit(1);
            }
            cmd_disable_all(&registry).await?;
            if json {
                println!(r#"{{"status": "ok", "message": "All sources disabled"}}"#);
            } else {
                println!("✓ All sources disabled");
            }
        }

        Commands::Pin { sources } => {
            let handle = cmd_set_pinned(&registry, &sources, true).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&handle)?);
            } else {
                print_toggle(&handle, true);
            }
        }

        Commands::Unpin { sources } => {
            let handle = cmd_set_pinned(&registry, &sources, false).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&handle)?);
            } else {
                print_toggle(&handle, false);
            }
        }

        Commands::Reorder { sources } => {
            let ordered = cmd_reorder(&registry, &sources).await?;
            output_sources("Manual Order", &ordered, json)?;
        }

        Commands::Use { source } => {
            let recorded = cmd_track_usage(&registry, &source).await?;
            if json {
                let outcome = serde_json::json!({ "source": source, "recorded": recorded });
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else if recorded {
                println!("✓ Recorded usage of '{}'", source);
            } else {
                println!("Usage of '{}' not recorded (incognito or NSFW history excluded)", source);
            }
        }

        Commands::Status => {
            let status = cmd_status(&config, &registry).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print_status(&status);
            }
        }

        Commands::ClearBadge => {
            let entry = cmd_clear_badge(&registry)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&entry)?);
            } else {
                println!("✓ New sources acknowledged (version {})", entry.value);
            }
        }

        Commands::Set { key, value } => {
            let entries = match (key.as_deref(), value.as_deref()) {
                (Some(key), Some(value)) => vec![cmd_set_setting(&registry, key, value)?],
                (key, None) => cmd_get_settings(&registry, key)?,
                (None, Some(_)) => unreachable!(),
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                print_settings(&entries);
            }
        }

        Commands::Watch { target, source } => {
            cmd_watch(&registry, target, source.as_deref(), json).await?;
        }
    }

    Ok(())
}

fn output_sources(heading: &str, sources: &[SourceView], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(sources)?);
    } else {
        print_sources(heading, sources);
    }
    Ok(())
}

/// `--config` may name a file or a directory
fn config_base_dir(path: &std::path::Path) -> PathBuf {
    if path.extension().is_some_and(|e| e == "toml") {
        path.parent()
            .map(PathBuf::from)
            .unwrap_or_else(Config::default_base_dir)
    } else {
        path.to_path_buf()
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    let config_path = match path {
        Some(p) if p.extension().is_some_and(|e| e == "toml") => p.to_path_buf(),
        Some(p) => p.join("config.toml"),
        None => Config::default_config_path(),
    };

    if !config_path.exists() {
        eprintln!(
            "Config file not found: {}\nRun 'sourcereg init' first.",
            config_path.display()
        );
        std::process::exit(1);
    }

    Config::load(&config_path)
}

fn print_completion_extras(shell: Shell) {
    match shell {
        Shell::Zsh => {
            println!();
            println!("{}", r#"# Dynamic completion for source names"#);
            println!("{}", r#"_sourcereg_source_names() {"#);
            println!("{}", r#"    local -a entries"#);
            println!(
                "{}",
                r#"    entries=("${(@f)$(sourcereg list --completion zsh 2>/dev/null)}")"#
            );
            println!("{}", r#"    _describe -t sources 'source names' entries"#);
            println!("{}", r#"}"#);
            for sub in ["enable", "disable", "only", "pin", "unpin", "reorder", "use"] {
                println!("compdef _sourcereg_source_names 'sourcereg {}'", sub);
            }
        }
        Shell::Fish => {
            println!();
            println!("{}", r#"# Dynamic completion for source names"#);
            println!(
                "{}",
                r#"complete -c sourcereg -n '__fish_seen_subcommand_from enable disable only pin unpin reorder use' -a '(sourcereg list --completion fish 2>/dev/null)'"#
            );
        }
        _ => {}
    }
}
