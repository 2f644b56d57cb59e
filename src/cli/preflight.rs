//! Pre-flight checks before expensive operations.
//!
//! Validates that required configuration is available before launching the
//! tool server and calling the model.

use crate::config::Settings;
use crate::error::{DbChatError, Result};

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Asking questions requires an API key and a usable tool server.
    Ask,
    /// Listing tools only requires a usable tool server.
    Tools,
    /// Serving the database requires it to exist when opened read-only.
    Mcp,
}

/// Run pre-flight checks for the given operation.
///
/// Returns Ok(()) if all checks pass, or an error describing what's missing.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    match operation {
        Operation::Ask => {
            check_api_key(settings)?;
            check_database(settings)?;
        }
        Operation::Tools | Operation::Mcp => {
            check_database(settings)?;
        }
    }
    Ok(())
}

/// Check that the configured API key variable is set.
fn check_api_key(settings: &Settings) -> Result<()> {
    let var = settings.model.api_key_env();
    match std::env::var(var) {
        Ok(key) if !key.trim().is_empty() => Ok(()),
        Ok(_) => Err(DbChatError::Config(format!(
            "{} is empty. Set it with: export {}='...'",
            var, var
        ))),
        Err(_) => Err(DbChatError::Config(format!(
            "{} not set. Set it with: export {}='...'",
            var, var
        ))),
    }
}

/// A read-only database must already exist; a writable one is created on demand.
/// Skipped when an external tool server is configured.
fn check_database(settings: &Settings) -> Result<()> {
    if settings.tool_server.command.is_some() || !settings.database.read_only {
        return Ok(());
    }
    let path = settings.database_path();
    if path.exists() {
        Ok(())
    } else {
        Err(DbChatError::Config(format!(
            "Database {} does not exist and is configured read-only",
            path.display()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_read_only_database() {
        let mut settings = Settings::default();
        settings.database.path = "/nonexistent/dbchat/shop.db".to_string();
        assert!(check(Operation::Mcp, &settings).is_ok());

        settings.database.read_only = true;
        assert!(matches!(
            check(Operation::Tools, &settings),
            Err(DbChatError::Config(_))
        ));

        settings.tool_server.command = Some("python".to_string());
        assert!(check(Operation::Tools, &settings).is_ok());
    }

    #[test]
    fn test_missing_api_key() {
        let mut settings = Settings::default();
        settings.model.api_key_env = Some("DBCHAT_PREFLIGHT_KEY_NOT_SET".to_string());
        let err = check(Operation::Ask, &settings).unwrap_err();
        assert!(err.to_string().contains("DBCHAT_PREFLIGHT_KEY_NOT_SET not set"));
    }
}
