//! Ask command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the ask command.
pub async fn run_ask(question: &str, settings: Settings) -> Result<()> {
    // Pre-flight checks
    if let Err(e) = preflight::check(Operation::Ask, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'dbchat doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(&settings).await?;

    let spinner = Output::spinner("Thinking...");
    let outcome = orchestrator.run(question).await;
    spinner.finish_and_clear();
    orchestrator.shutdown().await;

    match outcome {
        Ok(response) => {
            println!("\n{}\n", response.answer);

            if !response.tool_calls.is_empty() {
                Output::header(&format!("Tool calls ({})", response.tool_calls.len()));
                for call in &response.tool_calls {
                    Output::tool_call(call);
                }
                println!();
            }

            Output::info(&format!("Completed in {} round(s)", response.rounds));
        }
        Err(e) => {
            Output::error(&format!("Failed to answer: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
