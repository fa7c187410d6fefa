//! wallet-session CLI - drive a session against the simulated wallet
//!
//!   wallet-session status            → Initialize, print snapshot
//!   wallet-session demo              → Scripted connect/sign/switch/disconnect
//!   wallet-session repl              → Interactive session
//!
//! Configuration:
//!   WALLETCONNECT_PROJECT_ID (or --project-id) is required; `.env` is loaded first.
//!
//! Output format:
//!   --json     Output raw JSON (default for non-tty)
//!   --pretty   Pretty-print JSON (default for tty)

use anyhow::{anyhow, Context};
use serde_json::{json, Value};
use std::env;
use std::io::{IsTerminal, Write};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;
use wallet_session::logging::init_logging;
use wallet_session::{
    load_env_file, ChainId, ConnectBehavior, ConnectOutcome, ProviderEvent, SessionConfig, SessionManager,
    SimulatedFactory, SimulatedProvider, TeardownPolicy,
};

const DEFAULT_ACCOUNT: &str = "0xABCDEF0123456789ABCDEF0123456789ABCDEF01";
const WAIT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();
    let opts = ParsedArgs::parse(&args[1..]);
    init_logging();

    if opts.help {
        print_usage();
        return;
    }
    if opts.version {
        println!("wallet-session {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    let result = match opts.command.as_deref() {
        Some("status") => cmd_status(&opts).await,
        Some("demo") => cmd_demo(&opts).await,
        Some("repl") => cmd_repl(&opts).await,
        Some(cmd) => Err(anyhow!("Unknown command: {}", cmd)),
        None => {
            print_usage();
            return;
        }
    };

    match result {
        Ok(output) => println!("{}", render(&output, opts.pretty_output())),
        Err(e) => {
            eprintln!("{}", render(&json!({"error": format!("{:#}", e)}), opts.pretty_output()));
            std::process::exit(1);
        }
    }
}

fn render(value: &Value, pretty: bool) -> String {
    let rendered = if pretty { serde_json::to_string_pretty(value) } else { serde_json::to_string(value) };
    rendered.unwrap_or_else(|_| value.to_string())
}

#[derive(Default)]
struct ParsedArgs {
    command: Option<String>,
    project_id: Option<String>,
    env_file: Option<String>,
    account: Option<String>,
    chain: Option<String>,
    timeout_secs: Option<u64>,
    teardown: Option<String>,
    reject: bool,
    resume: bool,
    json: bool,
    pretty: bool,
    help: bool,
    version: bool,
}

impl ParsedArgs {
    fn parse(args: &[String]) -> Self {
        let mut opts = ParsedArgs::default();
        let mut positional = Vec::new();
        let mut i = 0;

        while i < args.len() {
            let arg = &args[i];
            let next = args.get(i + 1).cloned();
            match arg.as_str() {
                "--help" | "-h" => opts.help = true,
                "--version" | "-V" => opts.version = true,
                "--json" => opts.json = true,
                "--pretty" => opts.pretty = true,
                "--reject" => opts.reject = true,
                "--resume" => opts.resume = true,
                "--project-id" | "-p" => { opts.project_id = next; i += 1; }
                "--env-file" => { opts.env_file = next; i += 1; }
                "--account" | "-a" => { opts.account = next; i += 1; }
                "--chain" | "-c" => { opts.chain = next; i += 1; }
                "--teardown" => { opts.teardown = next; i += 1; }
                "--timeout" | "-t" => {
                    opts.timeout_secs = next.and_then(|s| s.parse().ok());
                    i += 1;
                }
                _ if !arg.starts_with('-') => positional.push(arg.clone()),
                _ => {} // Ignore unknown flags
            }
            i += 1;
        }

        if !positional.is_empty() {
            opts.command = Some(positional.remove(0));
        }
        opts
    }

    fn pretty_output(&self) -> bool {
        !self.json && (self.pretty || std::io::stdout().is_terminal())
    }

    fn config(&self) -> anyhow::Result<SessionConfig> {
        let env_file = self.env_file.as_deref().unwrap_or(".env");
        match load_env_file(env_file) {
            Ok(n) => debug!(path = env_file, applied = n, "loaded env file"),
            Err(e) if self.env_file.is_some() => return Err(e.into()),
            Err(_) => {}
        }

        // CLI args take precedence over the environment
        let mut config = match &self.project_id {
            Some(id) => SessionConfig::new(id.clone())?,
            None => SessionConfig::from_env()?,
        };
        if let Some(secs) = self.timeout_secs {
            config = if secs == 0 { config.without_connect_timeout() } else { config.with_connect_timeout(Duration::from_secs(secs)) };
        }
        if let Some(policy) = &self.teardown {
            let policy = TeardownPolicy::from_str(policy).ok_or_else(|| anyhow!("Unknown teardown policy: {}", policy))?;
            config = config.with_teardown(policy);
        }
        Ok(config)
    }

    fn chain(&self) -> anyhow::Result<ChainId> {
        match &self.chain {
            Some(raw) => raw.parse::<ChainId>().with_context(|| format!("--chain {}", raw)),
            None => Ok(ChainId::ETHEREUM),
        }
    }

    /// Simulated wallet wired per the flags.
    fn wallet(&self) -> anyhow::Result<Arc<SimulatedProvider>> {
        let account = self.account.clone().unwrap_or_else(|| DEFAULT_ACCOUNT.to_string());
        let chain = self.chain()?;
        let provider = if self.resume {
            SimulatedProvider::new().with_session(vec![account.clone()], chain)
        } else {
            SimulatedProvider::new()
        };
        provider.set_connect_behavior(if self.reject {
            ConnectBehavior::Reject("user rejected the pairing request".into())
        } else {
            ConnectBehavior::approve(account, chain)
        });
        Ok(Arc::new(provider))
    }

    fn session(&self) -> anyhow::Result<(SessionManager, Arc<SimulatedProvider>)> {
        let config = self.config()?;
        let wallet = self.wallet()?;
        let factory = Arc::new(SimulatedFactory::new(wallet.clone()));
        Ok((SessionManager::new(config, factory), wallet))
    }
}

fn snapshot(session: &SessionManager) -> Value {
    serde_json::to_value(session.snapshot()).unwrap_or(Value::Null)
}

fn outcome_json(outcome: &ConnectOutcome) -> Value {
    match outcome {
        ConnectOutcome::Failed(e) => json!({"outcome": "failed", "error": e.to_string()}),
        other => json!({"outcome": format!("{:?}", other).to_lowercase()}),
    }
}

async fn settle(session: &SessionManager, applied: u64) {
    let _ = tokio::time::timeout(WAIT, session.wait_for(|s| s.events_applied >= applied)).await;
}

/// Only wait when the session was subscribed to receive the event.
async fn settle_if(session: &SessionManager, delivered: usize, before: u64) {
    if delivered > 0 && session.is_attached().await {
        settle(session, before + 1).await;
    }
}

async fn cmd_status(opts: &ParsedArgs) -> anyhow::Result<Value> {
    let (session, _wallet) = opts.session()?;
    session.initialize().await?;
    Ok(snapshot(&session))
}

async fn cmd_demo(opts: &ParsedArgs) -> anyhow::Result<Value> {
    let (session, wallet) = opts.session()?;
    let mut steps = Vec::new();

    session.initialize().await?;
    steps.push(json!({"step": "initialize", "state": snapshot(&session)}));

    let before = session.state().events_applied;
    let outcome = session.connect().await;
    if outcome == ConnectOutcome::Settled {
        settle(&session, before + 1).await;
    }
    steps.push(json!({"step": "connect", "result": outcome_json(&outcome), "state": snapshot(&session)}));

    if !session.state().connected() {
        return Ok(Value::Array(steps));
    }

    let signature = session.sign_message("hello").await?;
    steps.push(json!({"step": "sign", "message": "hello", "signature": signature}));

    let before = session.state().events_applied;
    wallet.switch_chain(ChainId::BASE);
    settle(&session, before + 1).await;
    steps.push(json!({"step": "chainChanged", "state": snapshot(&session)}));

    let disconnected = session.disconnect().await?;
    steps.push(json!({"step": "disconnect", "result": disconnected, "state": snapshot(&session)}));

    session.detach().await;
    Ok(Value::Array(steps))
}

async fn cmd_repl(opts: &ParsedArgs) -> anyhow::Result<Value> {
    let (session, wallet) = opts.session()?;
    let pretty = opts.pretty_output();
    println!("wallet-session REPL - type 'help' or 'quit'\n");
    if let Err(e) = session.initialize().await {
        println!("Init failed: {} (type 'init' to retry)", e);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("session> ");
        std::io::stdout().flush().ok();

        let Some(line) = lines.next_line().await.context("stdin")? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        let parts: Vec<&str> = input.splitn(3, ' ').collect();

        let before = session.state().events_applied;
        let result: anyhow::Result<Value> = match parts[0] {
            "quit" | "exit" | "q" => break,
            "help" | "?" => {
                println!("Commands:");
                println!("  status               - Print session state");
                println!("  init                 - Initialize (or re-attach)");
                println!("  connect              - Pair with the wallet");
                println!("  disconnect           - End the session");
                println!("  sign <message>       - personal_sign with the active account");
                println!("  emit <event> [json]  - Deliver a raw provider event");
                println!("  chain <id>           - Wallet switches chain");
                println!("  accounts [a,b,...]   - Wallet changes accounts (empty = none)");
                println!("  detach               - Consumer teardown");
                println!("  close                - Drop the provider handle");
                println!("  quit                 - Exit");
                continue;
            }
            "status" => Ok(snapshot(&session)),
            "init" => session.initialize().await.map(|_| snapshot(&session)).map_err(Into::into),
            "connect" => {
                let outcome = session.connect().await;
                if outcome == ConnectOutcome::Settled {
                    settle(&session, before + 1).await;
                }
                Ok(json!({"result": outcome_json(&outcome), "state": snapshot(&session)}))
            }
            "disconnect" => session.disconnect().await.map(|done| json!({"result": done, "state": snapshot(&session)})).map_err(Into::into),
            "sign" => match parts.get(1..) {
                Some(rest) if !rest.is_empty() => session
                    .sign_message(&rest.join(" "))
                    .await
                    .map(|sig| json!({"signature": sig}))
                    .map_err(Into::into),
                _ => Err(anyhow!("Usage: sign <message>")),
            },
            "emit" => {
                let name = parts.get(1).copied().unwrap_or_default();
                let payload = match parts.get(2).map(|raw| serde_json::from_str::<Value>(raw)) {
                    Some(Ok(value)) => value,
                    Some(Err(e)) => {
                        println!("Invalid JSON: {}", e);
                        continue;
                    }
                    None => Value::Null,
                };
                match wallet.emit_wire(name, &payload) {
                    Some(delivered) => {
                        settle_if(&session, delivered, before).await;
                        Ok(snapshot(&session))
                    }
                    None => Err(anyhow!("Cannot decode {} payload: {}", name, payload)),
                }
            }
            "chain" => match parts.get(1).map(|raw| raw.parse::<ChainId>()) {
                Some(Ok(chain)) => {
                    let delivered = wallet.switch_chain(chain);
                    settle_if(&session, delivered, before).await;
                    Ok(snapshot(&session))
                }
                Some(Err(e)) => Err(e.into()),
                None => Err(anyhow!("Usage: chain <id>")),
            },
            "accounts" => {
                let accounts: Vec<String> = parts
                    .get(1)
                    .map(|raw| raw.split(',').map(|a| a.trim().to_string()).filter(|a| !a.is_empty()).collect())
                    .unwrap_or_default();
                let delivered = if accounts.is_empty() {
                    wallet.emit(ProviderEvent::AccountsChanged(Vec::new()))
                } else {
                    wallet.set_accounts(accounts)
                };
                settle_if(&session, delivered, before).await;
                Ok(snapshot(&session))
            }
            "detach" => {
                session.detach().await;
                Ok(json!({"attached": session.is_attached().await, "state": snapshot(&session)}))
            }
            "close" => {
                session.close().await;
                Ok(snapshot(&session))
            }
            other => Err(anyhow!("Unknown command: {}", other)),
        };

        match result {
            Ok(value) => println!("{}", render(&value, pretty)),
            Err(e) => println!("Error: {:#}", e),
        }
    }

    session.detach().await;
    Ok(snapshot(&session))
}

fn print_usage() {
    println!(
        r#"wallet-session - Wallet session manager

USAGE:
    wallet-session <command> [options]

COMMANDS:
    status                  Initialize and print the session state
    demo                    Connect, sign, switch chain, disconnect
    repl                    Interactive mode

CONFIG OPTIONS:
    --project-id, -p <id>   Project id (env: WALLETCONNECT_PROJECT_ID)
    --env-file <path>       Env file to load (default: .env if present)
    --timeout, -t <secs>    Connect timeout, 0 = none
                            (env: WALLET_SESSION_CONNECT_TIMEOUT_SECS)
    --teardown <policy>     detach|destroy

SIMULATED WALLET:
    --account, -a <addr>    Account the wallet approves with
    --chain, -c <id>        Chain, decimal or 0x hex (default: 1)
    --reject                Wallet rejects pairing
    --resume                Start with a restored session

OUTPUT OPTIONS:
    --json                  Raw JSON output
    --pretty                Pretty-print JSON
    --version, -V           Print version

LOGGING:
    RUST_LOG=debug          Verbosity
    WALLET_SESSION_LOG_JSON=1  JSON logs on stderr

EXAMPLES:
    wallet-session demo -p my-project --chain 0x2105
    wallet-session status -p my-project --resume
    wallet-session repl --reject
"#
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_flags_and_command() {
        let opts = ParsedArgs::parse(&args(&["demo", "-p", "pid", "--chain", "0x2105", "--reject", "-t", "0", "--json"]));
        assert_eq!(opts.command.as_deref(), Some("demo"));
        assert_eq!(opts.project_id.as_deref(), Some("pid"));
        assert_eq!(opts.chain().unwrap(), ChainId::BASE);
        assert!(opts.reject);
        assert_eq!(opts.timeout_secs, Some(0));
        assert!(!opts.pretty_output());
    }

    #[test]
    fn bad_chain_flag_errors() {
        let opts = ParsedArgs::parse(&args(&["status", "--chain", "mainnet"]));
        assert!(opts.chain().is_err());
    }

    #[test]
    fn outcome_names() {
        assert_eq!(outcome_json(&ConnectOutcome::Busy)["outcome"], "busy");
        assert_eq!(outcome_json(&ConnectOutcome::Failed(wallet_session::ProviderError::Cancelled))["error"], "Cancelled");
    }
}
