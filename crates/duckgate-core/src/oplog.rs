use std::fmt;

use tracing::Level;

/// Closed set of operations that show up in the logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    DatabaseInit,
    DatabaseConnect,
    ApiKeyCreate,
    ApiKeyDelete,
    ApiKeyValidate,
    ChatCompletion,
    AdminValidate,
    ServerStart,
    RequestReceived,
    RequestProcessed,
    Error,
}

impl Operation {
    pub const ALL: &[Operation] = &[
        Operation::DatabaseInit,
        Operation::DatabaseConnect,
        Operation::ApiKeyCreate,
        Operation::ApiKeyDelete,
        Operation::ApiKeyValidate,
        Operation::ChatCompletion,
        Operation::AdminValidate,
        Operation::ServerStart,
        Operation::RequestReceived,
        Operation::RequestProcessed,
        Operation::Error,
    ];

    /// Machine-readable tag, emitted as the `operation` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::DatabaseInit => "database_init",
            Operation::DatabaseConnect => "database_connect",
            Operation::ApiKeyCreate => "api_key_create",
            Operation::ApiKeyDelete => "api_key_delete",
            Operation::ApiKeyValidate => "api_key_validate",
            Operation::ChatCompletion => "chat_completion",
            Operation::AdminValidate => "admin_validate",
            Operation::ServerStart => "server_start",
            Operation::RequestReceived => "request_received",
            Operation::RequestProcessed => "request_processed",
            Operation::Error => "error",
        }
    }

    /// Human-readable label used as the message prefix.
    pub fn label(&self) -> &'static str {
        match self {
            Operation::DatabaseInit => "Database initialization",
            Operation::DatabaseConnect => "Database connection",
            Operation::ApiKeyCreate => "API key creation",
            Operation::ApiKeyDelete => "API key deletion",
            Operation::ApiKeyValidate => "API key validation",
            Operation::ChatCompletion => "Chat completion",
            Operation::AdminValidate => "Admin validation",
            Operation::ServerStart => "Server start",
            Operation::RequestReceived => "Request received",
            Operation::RequestProcessed => "Request processed",
            Operation::Error => "Error",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Emit one log line for `op` at `level`.
///
/// The record carries `operation = <tag>` as a structured field and
/// `"<label>: <detail>"` as the message (just the label when `detail` is empty).
pub fn log_operation(level: Level, op: Operation, detail: impl fmt::Display) {
    let message = format_message(op, &detail.to_string());
    let tag = op.as_str();
    match level {
        Level::ERROR => tracing::error!(operation = tag, "{message}"),
        Level::WARN => tracing::warn!(operation = tag, "{message}"),
        Level::INFO => tracing::info!(operation = tag, "{message}"),
        Level::DEBUG => tracing::debug!(operation = tag, "{message}"),
        Level::TRACE => tracing::trace!(operation = tag, "{message}"),
    }
}

fn format_message(op: Operation, detail: &str) -> String {
    if detail.is_empty() {
        op.label().to_string()
    } else {
        format!("{}: {detail}", op.label())
    }
}
