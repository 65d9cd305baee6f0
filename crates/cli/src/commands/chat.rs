//! `agentflux chat` — Interactive or single-message chat mode.
//!
//! Answer text goes to stdout as it streams; reasoning and tool activity
//! go to stderr so the answer can be piped on its own.

use std::io::Write;
use std::sync::Arc;

use agentflux_agent::{AgentEvent, AgentLoop};
use agentflux_config::AppConfig;
use agentflux_core::message::Conversation;
use tokio::io::{AsyncBufReadExt, BufReader};

const PREVIEW_CHARS: usize = 200;

pub async fn run(message: Option<String>, no_stream: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    OPENROUTER_API_KEY=sk-or-v1-...   (recommended)");
        eprintln!("    AGENTFLUX_API_KEY=sk-...          (any OpenAI-compatible endpoint)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let provider = agentflux_providers::build_from_config(&config)?;
    let tools = Arc::new(agentflux_tools::default_registry(&config.tools));
    let tool_names: Vec<String> = tools.names().into_iter().map(String::from).collect();

    let mut agent = AgentLoop::from_config(provider, tools, &config);
    if no_stream {
        agent = agent.with_streaming(false);
    }

    if let Some(msg) = message {
        run_turn(&agent, &msg, None).await?;
        return Ok(());
    }

    println!();
    println!("  AgentFlux — Interactive Mode");
    println!();
    println!("  Model:     {}", config.model);
    if tool_names.is_empty() {
        println!("  Tools:     (none)");
    } else {
        println!("  Tools:     {}", tool_names.join(", "));
    }
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or Ctrl+C to quit; Ctrl+C during an answer cancels it.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut conversation: Option<Conversation> = None;

    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "exit" || input == "quit" {
            break;
        }

        println!();
        match run_turn(&agent, input, conversation.clone()).await {
            Ok(updated) => conversation = Some(updated),
            // The conversation stays as it was before the failed run
            Err(e) => eprintln!("  [Error] {e}"),
        }
        println!();
    }

    println!();
    println!("  Goodbye!");
    println!();

    Ok(())
}

/// Run one user input to completion, printing events as they arrive, and
/// return the updated conversation.
async fn run_turn(
    agent: &AgentLoop,
    input: &str,
    prior: Option<Conversation>,
) -> Result<Conversation, Box<dyn std::error::Error>> {
    let mut handle = agent.run_stream(input, prior);
    let mut answer_started = false;

    loop {
        tokio::select! {
            event = handle.events.recv() => match event {
                Some(event) => print_event(&event, &mut answer_started)?,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => handle.cancel.cancel(),
        }
    }
    if answer_started {
        println!();
    }

    let outcome = handle.result.await??;
    tracing::debug!(turns = outcome.turns, messages = outcome.conversation.len(), "Run finished");
    Ok(outcome.conversation)
}

fn print_event(event: &AgentEvent, answer_started: &mut bool) -> std::io::Result<()> {
    match event {
        AgentEvent::Thinking { content } => {
            eprint!("{content}");
        }
        AgentEvent::Answer { content } => {
            if !*answer_started {
                print!("  Assistant > ");
                *answer_started = true;
            }
            print!("{content}");
            std::io::stdout().flush()?;
        }
        AgentEvent::ToolCall { .. } | AgentEvent::ToolResult { .. } => {
            if let Some(line) = describe_tool_event(event) {
                eprintln!("{line}");
            }
        }
    }
    Ok(())
}

/// One status line for tool activity.
fn describe_tool_event(event: &AgentEvent) -> Option<String> {
    match event {
        AgentEvent::ToolCall {
            tool_name,
            tool_input,
            ..
        } => Some(format!("  [tool] {tool_name} {}", preview(tool_input))),
        AgentEvent::ToolResult {
            tool_name,
            tool_output,
            success,
            ..
        } => {
            let status = if *success { "ok" } else { "failed" };
            Some(format!("  [{status}] {tool_name}: {}", preview(tool_output)))
        }
        _ => None,
    }
}

fn preview(text: &str) -> String {
    let flat = text.replace('\n', " ");
    if flat.chars().count() <= PREVIEW_CHARS {
        return flat;
    }
    let cut: String = flat.chars().take(PREVIEW_CHARS).collect();
    format!("{cut}…")
}
