//!
//! coursehub CLI binary
//! --------------------
//! Command-line client for the coursehub marketplace API. Runs a single command
//! (`--command`) or an interactive interpreter reading commands from stdin. On
//! startup, stored credentials are resolved into the current user the same way
//! the web client does on page load.

use std::env;
use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use coursehub::cli::commands::{self, Flow, COMMAND_HELP};
use coursehub::{ClientConfig, SessionController};

fn print_usage(program: &str) {
    eprintln!(
        "Usage:\n  {program} [--api <url>] [--token-file <path>] --command \"<command>\"\n  {program} [--api <url>] [--token-file <path>] [--repl]\n\nFlags:\n  --api <url>              API base URL (env COURSEHUB_API_URL, default http://127.0.0.1:8080/api)\n  --token-file <path>      Persist tokens in this JSON file (env COURSEHUB_TOKEN_FILE; in-memory if unset)\n  -c, --command <cmd>      Run one command and exit\n  --repl                   Start the interactive interpreter (default when no command is given)\n  -h, --help               Show this help\n\n{COMMAND_HELP}\n\nExamples:\n  {program} --token-file ~/.coursehub/tokens.json -c \"login a@b.com secret123\"\n  {program} --token-file ~/.coursehub/tokens.json -c \"courses rust\"\n  {program} --api https://learn.example.com/api --repl"
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .context("invalid log filter")?;
    fmt().with_env_filter(filter).with_writer(io::stderr).init();

    let mut args: Vec<String> = env::args().collect();
    let program = args.remove(0);

    let mut api: Option<String> = None;
    let mut token_file: Option<String> = None;
    let mut command: Option<String> = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--api" => {
                if i + 1 >= args.len() { eprintln!("--api requires a URL"); print_usage(&program); std::process::exit(2); }
                api = Some(args[i + 1].clone());
                i += 2; continue;
            }
            "--token-file" => {
                if i + 1 >= args.len() { eprintln!("--token-file requires a path"); print_usage(&program); std::process::exit(2); }
                token_file = Some(args[i + 1].clone());
                i += 2; continue;
            }
            "--command" | "-c" => {
                if i + 1 >= args.len() { eprintln!("--command requires a value"); print_usage(&program); std::process::exit(2); }
                command = Some(args[i + 1].clone());
                i += 2; continue;
            }
            "--repl" => { i += 1; continue; }
            "-h" | "--help" => {
                print_usage(&program);
                return Ok(());
            }
            unk => {
                eprintln!("Unrecognized argument: {}", unk);
                print_usage(&program);
                std::process::exit(2);
            }
        }
    }

    let mut config = ClientConfig::from_env().context("invalid COURSEHUB_* configuration")?;
    if let Some(url) = api {
        config.base_url = ClientConfig::new(&url).context("invalid --api url")?.base_url;
    }
    if let Some(path) = token_file { config = config.with_token_file(path); }

    let ctl = SessionController::open(config).context("failed to open session client")?;
    let _watcher = ctl.watch_storage();
    match ctl.resolve_current_user().await {
        Ok(Some(p)) => info!(target: "coursehub::session", "signed in as {} ({})", p.email, p.role),
        Ok(None) => {}
        Err(e) => warn!(target: "coursehub::session", "stored session is no longer valid: {}", e),
    }

    if let Some(line) = command {
        let cmd = commands::parse(&line)?;
        commands::execute(&ctl, cmd).await?;
        return Ok(());
    }
    run_repl(&ctl).await
}

async fn run_repl(ctl: &SessionController) -> Result<()> {
    println!("coursehub interpreter. Type 'help' for commands.");
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        io::stdout().flush().ok();
        let Some(line) = lines.next() else { break };
        let line = line.context("failed to read from stdin")?;
        if line.trim().is_empty() { continue; }
        let cmd = match commands::parse(&line) {
            Ok(c) => c,
            Err(e) => { eprintln!("{}", e.message()); continue; }
        };
        match commands::execute(ctl, cmd).await {
            Ok(Flow::Quit) => break,
            Ok(Flow::Continue) => {}
            Err(e) => eprintln!("error: {}", e),
        }
    }
    Ok(())
}
