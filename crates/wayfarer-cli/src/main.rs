//! The `wayfarer` binary: a terminal chat agent with local and remote tools.

use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use wayfarer_api::AnthropicProvider;
use wayfarer_config::{CliOverrides, WayfarerConfig};
use wayfarer_core::{Agent, AgentEvent};
use wayfarer_mcp::{McpClient, McpError, McpTool, SharedClient};
use wayfarer_tools::{ToolRegistry, builtin_tools};

#[derive(Parser)]
#[command(name = "wayfarer", version, about = "A chat agent that can call tools")]
struct Cli {
    /// Send a single prompt and print the response (non-interactive)
    #[arg(short, long)]
    print: Option<String>,

    /// Model to use
    #[arg(long)]
    model: Option<String>,

    /// Maximum tokens in the response
    #[arg(long)]
    max_tokens: Option<u32>,

    /// API key (overrides ANTHROPIC_API_KEY)
    #[arg(long)]
    api_key: Option<String>,

    /// Tool server command (overrides the [mcp] config section)
    #[arg(long)]
    mcp_command: Option<String>,

    /// Argument for the tool server command (repeatable)
    #[arg(long = "mcp-arg", allow_hyphen_values = true)]
    mcp_args: Vec<String>,

    /// Run with local tools only
    #[arg(long, conflicts_with = "mcp_command")]
    no_mcp: bool,

    /// Enable verbose/debug logging
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(io::stderr)
        .init();

    let config = WayfarerConfig::load(CliOverrides {
        api_key: cli.api_key,
        model: cli.model,
        max_tokens: cli.max_tokens,
        mcp_command: cli.mcp_command,
        mcp_args: cli.mcp_args,
        no_mcp: cli.no_mcp,
    })
    .map_err(|e| anyhow::anyhow!("{e}"))?;

    let (server, remote_tools) = start_tool_server(&config).await?;

    let registry = match ToolRegistry::build(builtin_tools(), remote_tools) {
        Ok(registry) => registry,
        Err(e) => {
            stop_tool_server(server).await;
            return Err(e).context("Cannot build the tool catalogue");
        }
    };

    let provider = AnthropicProvider::new(&config.api_key, &config.api_base_url, &config.model)
        .context("Failed to create API client")?
        .with_max_tokens(config.max_tokens)
        .with_temperature(config.temperature);

    let mut agent = Agent::new(Arc::new(provider), registry, config.system_prompt.clone())
        .with_max_tool_loops(config.max_tool_loops);

    let result = match cli.print {
        Some(prompt) => run_turn(&mut agent, &prompt)
            .await
            .map(|answer| println!("{answer}")),
        None => repl(&mut agent, &config).await,
    };

    stop_tool_server(server).await;
    result
}

/// Launch and handshake with the configured tool server, if any.
///
/// A failure is fatal for a required server. An optional one degrades to a
/// warning and the session continues with local tools only.
async fn start_tool_server(
    config: &WayfarerConfig,
) -> Result<(Option<SharedClient>, Vec<McpTool>)> {
    let Some(server) = &config.mcp else {
        return Ok((None, Vec::new()));
    };

    eprintln!("Starting tool server: {}", server.display_name());
    match McpClient::connect(server.command.clone(), server).await {
        Ok((client, definitions)) => {
            let names: Vec<&str> = definitions.iter().map(|d| d.name.as_str()).collect();
            eprintln!(
                "Connected to tool server ({} tools: {})",
                names.len(),
                names.join(", ")
            );
            let shared = client.into_shared();
            let tools = McpTool::wrap_all(definitions, &shared);
            Ok((Some(shared), tools))
        }
        Err(e) => {
            print_server_stderr(&e);
            if server.required {
                Err(e).context("Tool server failed to start")
            } else {
                tracing::warn!("optional tool server unavailable: {e}");
                eprintln!("Warning: {e}");
                eprintln!("Continuing with local tools only.");
                Ok((None, Vec::new()))
            }
        }
    }
}

fn print_server_stderr(err: &McpError) {
    if let McpError::Startup { stderr, .. } = err {
        if !stderr.is_empty() {
            eprintln!("Tool server stderr (last {} lines):", stderr.len());
            for line in stderr {
                eprintln!("  {line}");
            }
        }
    }
}

async fn stop_tool_server(server: Option<SharedClient>) {
    if let Some(client) = server {
        client.lock().await.shutdown().await;
    }
}

/// Run one user turn, printing a notice for every tool invocation.
async fn run_turn(agent: &mut Agent, input: &str) -> Result<String> {
    let stdout = io::stdout();
    agent
        .submit(input, |event| {
            if let AgentEvent::ToolStart { name } = event {
                let mut out = stdout.lock();
                let _ = writeln!(out, "\n[Using tool: {name}]");
                let _ = out.flush();
            }
        })
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))
}

async fn repl(agent: &mut Agent, config: &WayfarerConfig) -> Result<()> {
    let stdin = io::stdin();

    eprintln!(
        "Wayfarer v{} (model: {}, {} tools)",
        env!("CARGO_PKG_VERSION"),
        config.model,
        agent.registry().len()
    );
    eprintln!("Type your message. Type 'quit' or press Ctrl+D to exit, /help for commands.\n");

    loop {
        eprint!("You: ");
        io::stderr().flush()?;

        let mut input = String::new();
        let bytes_read = stdin.lock().read_line(&mut input)?;
        if bytes_read == 0 {
            eprintln!();
            break;
        }

        match ReplCommand::parse(&input) {
            ReplCommand::Empty => continue,
            ReplCommand::Quit => break,
            ReplCommand::Help => print_help(),
            ReplCommand::Tools => print_tools(agent.registry()),
            ReplCommand::Clear => {
                agent.reset();
                eprintln!("Conversation cleared.");
            }
            ReplCommand::Unknown(cmd) => {
                eprintln!("Unknown command: {cmd}. Type /help for available commands.");
            }
            ReplCommand::Message(text) => match run_turn(agent, text).await {
                Ok(answer) => println!("\nAI-Agent: {answer}\n"),
                Err(e) => eprintln!("\nError: {e}\n"),
            },
        }
    }

    Ok(())
}

/// One line of REPL input, classified.
#[derive(Debug, PartialEq)]
enum ReplCommand<'a> {
    Empty,
    Quit,
    Help,
    Tools,
    Clear,
    Unknown(&'a str),
    Message(&'a str),
}

impl<'a> ReplCommand<'a> {
    fn parse(line: &'a str) -> Self {
        let input = line.trim();
        if input.is_empty() {
            return Self::Empty;
        }
        if input.eq_ignore_ascii_case("quit") || input.eq_ignore_ascii_case("exit") {
            return Self::Quit;
        }
        if !input.starts_with('/') {
            return Self::Message(input);
        }
        match input {
            "/quit" | "/exit" => Self::Quit,
            "/help" => Self::Help,
            "/tools" => Self::Tools,
            "/clear" => Self::Clear,
            other => Self::Unknown(other),
        }
    }
}

fn print_tools(registry: &ToolRegistry) {
    eprintln!("Available tools:");
    for tool in registry.iter() {
        let def = tool.definition();
        let origin = if tool.is_remote() { "remote" } else { "local" };
        let args: Vec<String> = def
            .arguments
            .iter()
            .map(|a| {
                if a.required {
                    a.name.clone()
                } else {
                    format!("{}?", a.name)
                }
            })
            .collect();
        eprintln!("  {}({}) [{origin}]", def.name, args.join(", "));
        if !def.description.is_empty() {
            eprintln!("      {}", wayfarer_types::preview(&def.description, 100));
        }
    }
}

fn print_help() {
    eprintln!("Available commands:");
    eprintln!("  /help   Show this help");
    eprintln!("  /tools  List available tools");
    eprintln!("  /clear  Clear conversation (keeps the system prompt)");
    eprintln!("  /quit   Exit (also: quit, exit)");
}
