//! MCP tool definitions for the SQLite server.

use super::protocol::Tool;
use serde_json::json;

pub const QUERY_DATA: &str = "query_data";
pub const LIST_TABLES: &str = "list_tables";
pub const DESCRIBE_TABLE: &str = "describe_table";

/// Get all available tools.
pub fn get_tools() -> Vec<Tool> {
    vec![
        Tool {
            name: QUERY_DATA.to_string(),
            description: "Executes raw SQL on the local SQLite database. \
                Returns one line per result row, or a success message for statements without rows."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "sql": {
                        "type": "string",
                        "description": "A single SQL statement"
                    }
                },
                "required": ["sql"]
            }),
        },
        Tool {
            name: LIST_TABLES.to_string(),
            description: "List the tables in the database.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        },
        Tool {
            name: DESCRIBE_TABLE.to_string(),
            description: "Describe the columns of a table (name, type, NOT NULL, primary key)."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "table": {
                        "type": "string",
                        "description": "Table name"
                    }
                },
                "required": ["table"]
            }),
        },
    ]
}
