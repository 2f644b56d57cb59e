//! Doctor command - verify system requirements and configuration.

use crate::cli::Output;
use crate::config::Settings;
use crate::database::SqliteDatabase;
use crate::mcp::McpClient;
use crate::orchestrator::tool_server_command;
use crate::tools::fetch_catalog;
use console::style;
use std::path::Path;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

/// Run all diagnostic checks.
pub async fn run_doctor(settings: &Settings, config_path: &Path) -> anyhow::Result<()> {
    Output::header("dbchat Doctor");
    println!();
    println!("Checking configuration and tool server...\n");

    let mut checks = Vec::new();

    println!("{}", style("Model").bold());
    let model_checks = vec![
        CheckResult::ok(
            "Provider",
            &format!("{} ({})", settings.model.provider, settings.model.model_name()),
        ),
        check_api_key(settings.model.api_key_env(), std::env::var(settings.model.api_key_env()).ok()),
    ];
    for check in &model_checks {
        check.print();
    }
    checks.extend(model_checks);

    println!();

    println!("{}", style("Database").bold());
    let db_check = check_database(settings);
    db_check.print();
    checks.push(db_check);

    println!();

    println!("{}", style("Tool Server").bold());
    let server_check = check_tool_server(settings).await;
    server_check.print();
    checks.push(server_check);

    println!();

    println!("{}", style("Configuration").bold());
    let config_check = check_config_file(config_path);
    config_check.print();
    checks.push(config_check);

    println!();

    // Summary
    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before using dbchat.",
            errors
        ));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed! dbchat is ready to use.");
    }

    Ok(())
}

/// Check that the API key variable holds something.
fn check_api_key(var: &str, value: Option<String>) -> CheckResult {
    match value {
        Some(key) if key.trim().is_empty() => {
            CheckResult::error(var, "empty", &format!("Set with: export {}='...'", var))
        }
        Some(key) if key.chars().count() > 12 => {
            let head: String = key.chars().take(7).collect();
            let tail: String = key.chars().skip(key.chars().count() - 4).collect();
            CheckResult::ok(var, &format!("configured ({}...{})", head, tail))
        }
        Some(_) => CheckResult::warning(
            var,
            "set but looks too short",
            "Check that the full API key was copied",
        ),
        None => CheckResult::error(var, "not set", &format!("Set with: export {}='...'", var)),
    }
}

/// Check the SQLite database the built-in tool server would open.
fn check_database(settings: &Settings) -> CheckResult {
    if settings.tool_server.command.is_some() {
        return CheckResult::ok("Database", "managed by the external tool server");
    }

    let path = settings.database_path();
    if !path.exists() {
        return if settings.database.read_only {
            CheckResult::error(
                "Database",
                &format!("{} (missing, read-only)", path.display()),
                "Create the database or disable database.read_only",
            )
        } else {
            CheckResult::warning(
                "Database",
                &format!("{} (not created yet)", path.display()),
                "An empty database will be created on first use",
            )
        };
    }

    match SqliteDatabase::open(&path, true).and_then(|db| db.list_tables()) {
        Ok(tables) => {
            let size = std::fs::metadata(&path)
                .map(|m| format_size(m.len()))
                .unwrap_or_else(|_| "unknown size".to_string());
            CheckResult::ok(
                "Database",
                &format!("{} ({}, {} tables)", path.display(), size, tables.len()),
            )
        }
        Err(e) => CheckResult::error(
            "Database",
            &format!("{} ({})", path.display(), e),
            "Check that the file is a SQLite database",
        ),
    }
}

/// Launch the tool server and list its tools.
async fn check_tool_server(settings: &Settings) -> CheckResult {
    let (command, args) = match tool_server_command(settings) {
        Ok(cmd) => cmd,
        Err(e) => return CheckResult::error("Tool server", &e.to_string(), "Set tool_server.command"),
    };

    let client =
        match McpClient::spawn(&command, &args, settings.tool_server.handshake_timeout()).await {
            Ok(client) => client,
            Err(e) => {
                return CheckResult::error(
                    "Tool server",
                    &e.to_string(),
                    "Check tool_server.command and tool_server.args",
                )
            }
        };

    let result = match fetch_catalog(&client).await {
        Ok(catalog) => {
            let names: Vec<_> = catalog.iter().map(|t| t.name.as_str()).collect();
            CheckResult::ok("Tool server", &format!("tools: {}", names.join(", ")))
        }
        Err(e) => CheckResult::error(
            "Tool server",
            &e.to_string(),
            "The server started but its tool catalog is unusable",
        ),
    };
    client.shutdown().await;
    result
}

/// Check if config file exists.
fn check_config_file(config_path: &Path) -> CheckResult {
    if config_path.exists() {
        CheckResult::ok("Config file", &format!("{}", config_path.display()))
    } else {
        CheckResult::warning(
            "Config file",
            "using defaults",
            "Create with: dbchat config edit",
        )
    }
}

/// Format file size in human-readable format.
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
