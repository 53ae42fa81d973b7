//! SQL script splitting and execution.
//!
//! [`split_statements`] tokenizes a SQL script into individual executable
//! statements, respecting quoting, escaping and comment rules.
//! [`execute_script`] runs a script against a freshly acquired connection,
//! one statement at a time, with best-effort semantics: there is no
//! transaction and no rollback on a mid-script failure.

use tracing::{debug, info};

use crate::datasource::DataSource;
use crate::error::ScriptError;

const LINE_COMMENT: &str = "--";
const BLOCK_COMMENT_START: &str = "/*";
const BLOCK_COMMENT_END: &str = "*/";

/// Split a SQL script into separate statements.
///
/// Statements are separated by `;`. Line comments (`--`) and block
/// comments (`/* */`) are stripped, and runs of whitespace are collapsed
/// to a single space. Quoted regions are copied verbatim: a separator or
/// comment marker inside a `'` or `"` quoted string is treated as text,
/// and a backslash escapes exactly the next character. Mixed quote
/// nesting is not supported: a single quote inside a double-quoted string
/// still toggles the single-quote state.
///
/// Fails with [`ScriptError::UnterminatedBlockComment`] when a block
/// comment is never closed.
pub fn split_statements(script: &str) -> Result<Vec<String>, ScriptError> {
    let mut statements = Vec::new();
    let mut buf = String::new();

    let mut in_single_quote = false;
    let mut in_double_quote = false;
    let mut in_escape = false;

    let mut chars = script.char_indices().peekable();
    while let Some((i, mut c)) = chars.next() {
        if in_escape {
            in_escape = false;
            buf.push(c);
            continue;
        }
        if c == '\\' {
            in_escape = true;
            buf.push(c);
            continue;
        }
        if !in_double_quote && c == '\'' {
            in_single_quote = !in_single_quote;
        } else if !in_single_quote && c == '"' {
            in_double_quote = !in_double_quote;
        }
        if !in_single_quote && !in_double_quote {
            if c == ';' {
                // end of statement
                if !buf.is_empty() {
                    statements.push(std::mem::take(&mut buf));
                }
                continue;
            }
            if script[i..].starts_with(LINE_COMMENT) {
                // consumed through end of line, or end of script
                match script[i..].find('\n') {
                    Some(offset) => {
                        skip_to(&mut chars, i + offset + 1);
                        continue;
                    }
                    None => break,
                }
            }
            if script[i..].starts_with(BLOCK_COMMENT_START) {
                match script[i..].find(BLOCK_COMMENT_END) {
                    Some(offset) if offset > 0 => {
                        skip_to(&mut chars, i + offset + BLOCK_COMMENT_END.len());
                        continue;
                    }
                    _ => return Err(ScriptError::UnterminatedBlockComment { position: i }),
                }
            }
            if c == ' ' || c == '\n' || c == '\t' {
                // collapse whitespace runs into a single space
                if !buf.is_empty() && !buf.ends_with(' ') {
                    c = ' ';
                } else {
                    continue;
                }
            }
        }
        buf.push(c);
    }

    if !buf.trim().is_empty() {
        statements.push(buf);
    }

    Ok(statements)
}

fn skip_to(chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>, target: usize) {
    while let Some((i, _)) = chars.peek() {
        if *i < target {
            chars.next();
        } else {
            break;
        }
    }
}

/// Execute a SQL script against a connection acquired from the given data
/// source.
///
/// The script is split via [`split_statements`] and each statement is
/// executed sequentially on a single connection. The first failing
/// statement aborts the remainder and is surfaced as
/// [`ScriptError::Statement`]. The connection is closed on every exit
/// path; close failures are logged and never mask the primary outcome.
pub async fn execute_script(data_source: &dyn DataSource, script: &str) -> Result<(), ScriptError> {
    let statements = split_statements(script)?;

    let mut connection = data_source
        .connection()
        .await
        .map_err(|source| ScriptError::Connection { source })?;

    let mut outcome = Ok(());
    for statement in &statements {
        if let Err(source) = connection.execute(statement).await {
            outcome = Err(ScriptError::Statement {
                statement: statement.clone(),
                source,
            });
            break;
        }
    }

    if let Err(err) = connection.close().await {
        debug!(error = %err, "failed to close connection after script execution");
    }

    if outcome.is_ok() {
        info!(statements = statements.len(), "SQL script executed");
    }
    outcome
}
