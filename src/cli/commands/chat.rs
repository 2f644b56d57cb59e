//! Interactive chat command.
//!
//! Each message runs on a copy of the conversation; the copy replaces the
//! conversation only when the run succeeds, so a failed run leaves no
//! half-finished rounds behind.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::transcript::Transcript;
use anyhow::Result;
use console::style;
use std::io::{self, BufRead, Write};

/// Run the interactive chat command.
pub async fn run_chat(settings: Settings) -> Result<()> {
    // Pre-flight checks
    if let Err(e) = preflight::check(Operation::Ask, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'dbchat doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(&settings).await?;
    let mut transcript = Transcript::new();

    println!("\n{}", style("dbchat").bold().cyan());
    println!(
        "{}\n",
        style("Ask about your database, or 'exit' to quit. Use 'clear' to reset conversation.").dim()
    );

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("{} ", style("You:").green().bold());
        stdout.flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            break;
        }

        let input = input.trim();

        if input.is_empty() {
            continue;
        }

        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            Output::info("Goodbye!");
            break;
        }

        if input.eq_ignore_ascii_case("clear") {
            transcript = Transcript::new();
            Output::info("Conversation history cleared.");
            continue;
        }

        let mut attempt = transcript.clone();
        let spinner = Output::spinner("Thinking...");
        let outcome = orchestrator.run_with(&mut attempt, input).await;
        spinner.finish_and_clear();

        match outcome {
            Ok(response) => {
                for call in &response.tool_calls {
                    Output::tool_call(call);
                }
                println!("\n{} {}\n", style("dbchat:").cyan().bold(), response.answer);
                transcript = attempt;
            }
            Err(e) => {
                Output::error(&format!("Error: {}", e));
            }
        }
    }

    orchestrator.shutdown().await;
    Ok(())
}
