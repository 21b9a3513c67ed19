use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::{Parser, Subcommand};

use cmdctx::output::{OutputSink, TerminalUi, WireFormat};
use cmdctx::project::{self, Project, ProjectHandle};
use cmdctx::registry::{catalog, CommandBuilder};
use cmdctx::session::ScriptSession;
use cmdctx::settings::{self, AppSettings};
use cmdctx::state::AppState;
use cmdctx::{logging, paths};

// ── CLI argument parsing ─────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "cmdctx-cli",
    about = "Run project commands from a terminal or as a script session",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Project file to open; a missing file starts an empty project
    #[arg(long, global = true)]
    project: Option<PathBuf>,

    /// Config directory override
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Wire format for script responses
    #[arg(long, global = true, value_enum)]
    format: Option<WireFormat>,

    /// Suppress progress lines in script responses
    #[arg(long, global = true)]
    quiet: bool,

    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run command lines with the terminal as the user interface
    Run {
        /// e.g. "SetTrack: Track=0 Gain=-3"
        #[arg(required = true)]
        lines: Vec<String>,
    },
    /// Read commands from stdin, one per line, and answer on stdout
    Script,
    /// List commands; give a category or command name for details
    List { topic: Option<String> },
    /// Run command lines, then save the project to a file
    Save {
        file: PathBuf,
        lines: Vec<String>,
    },
}

// ── Startup ──────────────────────────────────────────────────────

fn initialize_state(cli: &Cli) -> Arc<AppState> {
    let config_dir = cli
        .config_dir
        .clone()
        .unwrap_or_else(paths::default_config_dir);
    let mut loaded = settings::load_settings(&config_dir).unwrap_or_default();
    if let Some(format) = cli.format {
        loaded.script.wire_format = format;
    }
    if cli.quiet {
        loaded.script.quiet_progress = true;
    }

    let state = Arc::new(AppState::new(config_dir, loaded));
    state.open_project(open_project_file(cli.project.as_deref()));
    state
}

fn open_project_file(path: Option<&Path>) -> Project {
    let Some(path) = path else {
        return Project::new("Untitled");
    };
    if !path.exists() {
        let name = path
            .file_stem()
            .map_or_else(|| "Untitled".to_string(), |s| s.to_string_lossy().into_owned());
        tracing::info!(path = %path.display(), "project file not found; starting empty");
        return Project::new(name);
    }
    match project::load_project(path) {
        Ok(project) => project,
        Err(e) => {
            eprintln!("Failed to open project '{}': {e}", path.display());
            process::exit(1);
        }
    }
}

/// Ctrl-C raises the flag that the terminal progress bar reports as cancel.
fn install_cancel_handler() -> Arc<AtomicBool> {
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received; cancelling");
            flag.store(true, Ordering::SeqCst);
        }
    });
    cancel
}

// ── Subcommands ──────────────────────────────────────────────────

/// Run each line with an interactive sink; stop at the first failure.
fn run_lines(state: &AppState, lines: &[String], cancel: &Arc<AtomicBool>) -> bool {
    let strict = state.with_settings(|s| s.script.strict());
    let builder = CommandBuilder::new(&state.commands);
    for (index, line) in lines.iter().enumerate() {
        let invocation = match builder.build_line(line) {
            Ok(invocation) => invocation.with_index(index),
            Err(e) => {
                eprintln!("Error: {e}");
                return false;
            }
        };
        let sink = OutputSink::interactive(TerminalUi::new(Arc::clone(cancel))).strict(strict);
        if invocation.run(state, Some(sink)).is_err() {
            return false;
        }
    }
    true
}

fn save_active_project(state: &AppState, file: &Path) {
    let Some(handle): Option<ProjectHandle> = state.active_project() else {
        eprintln!("Error: no project to save");
        process::exit(1);
    };
    if let Err(e) = project::save_project(&handle.lock(), file) {
        eprintln!("Failed to save project '{}': {e}", file.display());
        process::exit(1);
    }
    eprintln!("Saved {}", file.display());

    let updated: AppSettings = state.with_settings(|s| {
        let mut s = s.clone();
        s.recent_project = Some(file.to_path_buf());
        s
    });
    if let Err(e) = settings::save_settings(&state.app_config_dir, &updated) {
        tracing::warn!(error = %e, "could not record recent project");
    }
    *state.settings.lock() = updated;
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose);

    let state = initialize_state(&cli);

    match &cli.command {
        Commands::Run { lines } => {
            let cancel = install_cancel_handler();
            if !run_lines(&state, lines, &cancel) {
                process::exit(1);
            }
        }
        Commands::Save { file, lines } => {
            let cancel = install_cancel_handler();
            if !run_lines(&state, lines, &cancel) {
                process::exit(1);
            }
            save_active_project(&state, file);
        }
        Commands::Script => {
            let stdin = std::io::stdin();
            let result = ScriptSession::new(&state).run(stdin.lock(), std::io::stdout());
            match result {
                Ok(summary) => {
                    tracing::debug!(?summary, "script finished");
                }
                Err(e) => {
                    eprintln!("Error: {e}");
                    process::exit(1);
                }
            }
        }
        Commands::List { topic } => {
            println!("{}", catalog::help_text(&state.commands, topic.as_deref()));
        }
    }
}
