//! Command gateway: the boundary between an external agent and the store.
//!
//! Four operations are exposed: list resources, read a resource, list tools, call a tool.
//! Tools pass caller-supplied SQL through to the engine, gated only by the leading
//! keyword (`select` for `query`, `insert` for `insert`, `update` for `update`).
//! Every failure after dispatch becomes an `isError: true` result; only an unknown tool
//! name is reported as an error of its own.

use crate::core::error::KipsError;
use regex::Regex;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue, json};
use tracing::{info, warn};

pub const RESOURCE_URI_PREFIX: &str = "kips:///";
const RESOURCE_URI_PATTERN: &str = r"^kips:///([A-Za-z_][A-Za-z0-9_]*)$";
pub const SCHEMA_MIME_TYPE: &str = "application/json";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceDescriptor {
    pub uri: String,
    pub name: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    pub schema: JsonValue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: JsonValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolContent {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    pub content: Vec<ToolContent>,
    #[serde(rename = "isError")]
    pub is_error: bool,
}

impl ToolResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent {
                kind: "text".to_string(),
                text: text.into(),
            }],
            is_error: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            is_error: true,
            ..Self::text(message)
        }
    }

    /// Text of the first content item.
    pub fn first_text(&self) -> &str {
        self.content.first().map(|c| c.text.as_str()).unwrap_or("")
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Tool {
    Query,
    Insert,
    Update,
}

impl Tool {
    pub const ALL: [Tool; 3] = [Tool::Query, Tool::Insert, Tool::Update];

    pub fn name(&self) -> &'static str {
        match self {
            Tool::Query => "query",
            Tool::Insert => "insert",
            Tool::Update => "update",
        }
    }

    /// Leading SQL keyword this tool accepts.
    pub fn verb(&self) -> &'static str {
        match self {
            Tool::Query => "select",
            Tool::Insert => "insert",
            Tool::Update => "update",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Tool::Query => "Run a read-only SQL query (must start with SELECT)",
            Tool::Insert => "Insert rows with a SQL statement (must start with INSERT)",
            Tool::Update => "Update rows with a SQL statement (must start with UPDATE)",
        }
    }

    pub fn from_name(name: &str) -> Option<Tool> {
        Tool::ALL.into_iter().find(|t| t.name() == name)
    }

    pub fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "sql": { "type": "string" }
                },
                "required": ["sql"]
            }),
        }
    }
}

/// First run of ASCII letters after leading whitespace, lower-cased.
pub fn leading_keyword(sql: &str) -> String {
    sql.trim_start()
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_lowercase()
}

pub fn check_verb(tool: Tool, sql: &str) -> Result<(), KipsError> {
    let keyword = leading_keyword(sql);
    if keyword == tool.verb() {
        return Ok(());
    }
    Err(KipsError::ValidationError(format!(
        "The {} tool only accepts {} statements (got '{}')",
        tool.name(),
        tool.verb().to_uppercase(),
        keyword
    )))
}

/// Map a declared column type onto one of four JSON primitive kinds.
pub fn column_kind(declared: &str) -> &'static str {
    let upper = declared.to_ascii_uppercase();
    if upper.contains("INT") {
        "integer"
    } else if upper.contains("BOOL") {
        "boolean"
    } else if ["REAL", "FLOA", "DOUB", "NUMERIC", "DECIMAL"]
        .iter()
        .any(|k| upper.contains(k))
    {
        "number"
    } else {
        "string"
    }
}

/// Table name named by a `kips:///<table>` URI.
pub fn parse_resource_uri(uri: &str) -> Result<String, KipsError> {
    let re = Regex::new(RESOURCE_URI_PATTERN)
        .map_err(|e| KipsError::ValidationError(e.to_string()))?;
    re.captures(uri)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| {
            KipsError::ValidationError(format!(
                "Invalid resource URI '{}'. Expected {}<table>",
                uri, RESOURCE_URI_PREFIX
            ))
        })
}

pub fn resource_uri(table: &str) -> String {
    format!("{}{}", RESOURCE_URI_PREFIX, table)
}

fn value_to_json(value: ValueRef<'_>) -> JsonValue {
    match value {
        ValueRef::Null => JsonValue::Null,
        ValueRef::Integer(n) => json!(n),
        ValueRef::Real(f) => json!(f),
        ValueRef::Text(t) => JsonValue::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => json!(b),
    }
}

/// Message relayed to the agent: the engine's own text for engine failures.
fn failure_message(err: &KipsError) -> String {
    match err {
        KipsError::RusqliteError(e) => e.to_string(),
        other => other.to_string(),
    }
}

pub struct Gateway<'a> {
    conn: &'a Connection,
}

impl<'a> Gateway<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// User tables, excluding SQLite's internal catalog tables.
    pub fn table_names(&self) -> Result<Vec<String>, KipsError> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master
             WHERE type = 'table' AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\'
             ORDER BY name",
        )?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut names = Vec::new();
        for r in rows {
            names.push(r?);
        }
        Ok(names)
    }

    /// JSON-shape schema of one table: column name -> {type, nullable}.
    pub fn table_schema(&self, table: &str) -> Result<JsonValue, KipsError> {
        let mut stmt = self.conn.prepare(
            "SELECT name, type, \"notnull\", pk FROM pragma_table_info(?1) ORDER BY cid",
        )?;
        let rows = stmt.query_map(params![table], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?;

        let mut properties = Map::new();
        let mut required = Vec::new();
        for r in rows {
            let (name, declared, not_null, pk) = r?;
            let nullable = not_null == 0 && pk == 0;
            if !nullable {
                required.push(JsonValue::String(name.clone()));
            }
            properties.insert(
                name,
                json!({ "type": column_kind(&declared), "nullable": nullable }),
            );
        }
        if properties.is_empty() {
            return Err(KipsError::NotFound(format!("table '{}'", table)));
        }

        Ok(json!({
            "type": "object",
            "properties": properties,
            "required": required
        }))
    }

    pub fn list_resources(&self) -> Result<Vec<ResourceDescriptor>, KipsError> {
        let mut resources = Vec::new();
        for table in self.table_names()? {
            resources.push(ResourceDescriptor {
                uri: resource_uri(&table),
                name: format!("\"{}\" database schema", table),
                mime_type: SCHEMA_MIME_TYPE.to_string(),
                schema: self.table_schema(&table)?,
            });
        }
        Ok(resources)
    }

    pub fn read_resource(&self, uri: &str) -> Result<JsonValue, KipsError> {
        let table = parse_resource_uri(uri)?;
        if !self.table_names()?.contains(&table) {
            return Err(KipsError::NotFound(format!("resource '{}'", uri)));
        }
        self.table_schema(&table)
    }

    pub fn list_tools(&self) -> Vec<ToolDescriptor> {
        Tool::ALL.iter().map(Tool::descriptor).collect()
    }

    /// Dispatch a tool call. Only an unknown tool name is an `Err`; bad arguments,
    /// disallowed verbs and engine failures come back as `isError: true`.
    pub fn call_tool(&self, name: &str, arguments: &JsonValue) -> Result<ToolResult, KipsError> {
        let tool = Tool::from_name(name).ok_or_else(|| KipsError::UnknownTool(name.to_string()))?;

        let Some(sql) = arguments.get("sql").and_then(JsonValue::as_str) else {
            warn!(tool = name, "tool call without a string 'sql' argument");
            return Ok(ToolResult::error(
                "Missing required string argument 'sql'",
            ));
        };
        if let Err(e) = check_verb(tool, sql) {
            warn!(tool = name, error = %e, "tool call rejected");
            return Ok(ToolResult::error(failure_message(&e)));
        }

        let outcome = match tool {
            Tool::Query => self.run_query(sql),
            Tool::Insert => self.run_insert(sql),
            Tool::Update => self.run_update(sql),
        };
        match outcome {
            Ok(text) => {
                info!(tool = name, "tool call succeeded");
                Ok(ToolResult::text(text))
            }
            Err(e) => {
                warn!(tool = name, error = %e, "tool call failed");
                Ok(ToolResult::error(failure_message(&e)))
            }
        }
    }

    /// Run a SELECT inside a transaction that is always rolled back.
    fn run_query(&self, sql: &str) -> Result<String, KipsError> {
        let tx = self.conn.unchecked_transaction()?;
        let rows = collect_rows(&tx, sql)?;
        tx.rollback()?;
        Ok(serde_json::to_string_pretty(&rows)?)
    }

    fn run_insert(&self, sql: &str) -> Result<String, KipsError> {
        let write = self.run_write(sql)?;
        let mut body = json!({
            "changes": write.changes,
            "lastInsertRowid": write.last_insert_rowid
        });
        if !write.returned.is_empty() {
            body["rows"] = JsonValue::Array(write.returned);
        }
        Ok(serde_json::to_string_pretty(&body)?)
    }

    fn run_update(&self, sql: &str) -> Result<String, KipsError> {
        let write = self.run_write(sql)?;
        let mut body = json!({ "changes": write.changes });
        if !write.returned.is_empty() {
            body["rows"] = JsonValue::Array(write.returned);
        }
        Ok(serde_json::to_string_pretty(&body)?)
    }

    /// Execute one write statement in its own transaction.
    ///
    /// Rows produced by a `RETURNING` clause are drained and kept. Any error drops the
    /// transaction, so a failed call never leaves a partial write behind.
    fn run_write(&self, sql: &str) -> Result<WriteOutcome, KipsError> {
        let tx = self.conn.unchecked_transaction()?;
        let returned = collect_rows(&tx, sql)?;
        let outcome = WriteOutcome {
            changes: tx.changes(),
            last_insert_rowid: tx.last_insert_rowid(),
            returned,
        };
        tx.commit()?;
        Ok(outcome)
    }
}

struct WriteOutcome {
    changes: u64,
    last_insert_rowid: i64,
    returned: Vec<JsonValue>,
}

/// Step one statement to completion, turning every result row into a JSON object.
fn collect_rows(conn: &Connection, sql: &str) -> Result<Vec<JsonValue>, KipsError> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let mut rows = stmt.query([])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut obj = Map::new();
        for (i, column) in columns.iter().enumerate() {
            obj.insert(column.clone(), value_to_json(row.get_ref(i)?));
        }
        out.push(JsonValue::Object(obj));
    }
    Ok(out)
}
