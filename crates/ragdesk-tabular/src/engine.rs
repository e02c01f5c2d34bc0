//! Natural-language questions over department datasets.
//!
//! The generation backend translates a question into one read-only SQLite
//! `SELECT` against the dataset's table. The statement runs on a private
//! materialisation of the snapshot and the rows become the raw answer.
//! When the backend answers in prose with no SQL in it, that prose is the
//! raw answer and goes through the same usefulness check. SQL that is not a
//! single `SELECT` is refused and reported as that department's error.

use std::sync::Arc;

use ragdesk_core::access::AccessScope;
use ragdesk_core::config::TabularConfig;
use ragdesk_core::error::{RagDeskError, Result};
use ragdesk_core::traits::{GenerateParams, Provider};
use ragdesk_core::types::Message;
use rusqlite::types::ValueRef;

use crate::dataset::{Dataset, TABLE_NAME, sql_err};
use crate::registry::DatasetRegistry;

/// Lowercased markers that make a raw answer useless.
const REFUSAL_MARKERS: &[&str] = &["i don't know", "sorry"];

/// Whether a raw tabular answer is worth rewriting.
///
/// Keyword heuristic: the answer must be non-blank and must not contain a
/// refusal marker, compared case-insensitively.
pub fn is_useful(raw: &str) -> bool {
    let lowered = raw.trim().to_lowercase();
    !lowered.is_empty() && !REFUSAL_MARKERS.iter().any(|m| lowered.contains(m))
}

/// Result for one department.
#[derive(Debug, Clone, PartialEq)]
pub struct DepartmentAnswer {
    pub department: String,
    /// Useful raw answer, or the error message if the department failed.
    pub raw: std::result::Result<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TabularOutcome {
    /// The scope has no dataset loaded.
    NoDataset,
    /// One entry per queried department that answered usefully or failed.
    /// Departments with useless answers are left out, so this may be empty.
    Answers(Vec<DepartmentAnswer>),
}

pub struct TabularEngine {
    registry: Arc<DatasetRegistry>,
    provider: Arc<dyn Provider>,
    params: GenerateParams,
    max_rows: usize,
    sample_rows: usize,
}

impl TabularEngine {
    pub fn new(
        registry: Arc<DatasetRegistry>,
        provider: Arc<dyn Provider>,
        params: GenerateParams,
        config: &TabularConfig,
    ) -> Self {
        Self {
            registry,
            provider,
            params,
            max_rows: config.max_rows.max(1),
            sample_rows: config.sample_rows,
        }
    }

    pub fn registry(&self) -> &Arc<DatasetRegistry> {
        &self.registry
    }

    /// Query every dataset visible to `scope`.
    ///
    /// Departments are queried one after another in sorted order; a failure
    /// is recorded in that department's slot and the rest still run.
    pub async fn query(&self, question: &str, scope: &AccessScope) -> TabularOutcome {
        let datasets = match scope.department() {
            None => self.registry.all(),
            Some(dept) => self.registry.get(dept).into_iter().collect(),
        };
        if datasets.is_empty() {
            tracing::info!("📊 No dataset available for '{scope}'");
            return TabularOutcome::NoDataset;
        }

        let mut answers = Vec::new();
        for dataset in datasets {
            let department = dataset.department.clone();
            tracing::info!("📊 Querying {department} dataset");
            match self.ask(&dataset, question).await {
                Ok(raw) if is_useful(&raw) => {
                    tracing::info!("✅ Got a useful answer from {department}");
                    answers.push(DepartmentAnswer { department, raw: Ok(raw) });
                }
                Ok(_) => tracing::info!("⚠️ No useful answer from {department}"),
                Err(e) => {
                    tracing::warn!("❌ Error in {department} dataset: {e}");
                    answers.push(DepartmentAnswer {
                        department,
                        raw: Err(e.to_string()),
                    });
                }
            }
        }
        TabularOutcome::Answers(answers)
    }

    /// Ask one dataset and return its raw text answer.
    pub async fn ask(&self, dataset: &Dataset, question: &str) -> Result<String> {
        let messages = [
            Message::system(SQL_SYSTEM_PROMPT),
            Message::user(self.sql_prompt(dataset, question)),
        ];
        let response = self.provider.chat(&messages, &self.params).await?;
        let reply = response.text_or_empty();

        let Some(sql) = extract_sql(reply)? else {
            // Prose reply, typically a refusal.
            return Ok(reply.trim().to_string());
        };
        tracing::debug!("📊 [{}] SQL: {sql}", dataset.department);

        let conn = dataset.materialize()?;
        run_select(&conn, &sql, self.max_rows)
    }

    fn sql_prompt(&self, dataset: &Dataset, question: &str) -> String {
        format!(
            "Table schema:\n{schema};\n\nFirst rows (CSV):\n{sample}\n\nQuestion: {question}\n\nSQL:",
            schema = dataset.schema_sql(),
            sample = dataset.sample(self.sample_rows),
        )
    }
}

const SQL_SYSTEM_PROMPT: &str = "You translate questions about a single SQLite table named \
`data` into one SQLite SELECT statement. Reply with the SQL only, no explanation. \
Quote column names with double quotes. If the table cannot answer the question, \
reply exactly: I don't know";

/// Statement heads that modify data or the connection.
const WRITE_HEADS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "REPLACE", "DROP", "CREATE", "ALTER", "PRAGMA", "ATTACH",
    "DETACH", "VACUUM", "REINDEX",
];

/// Pull a single read-only statement out of a model reply.
///
/// Accepts bare SQL, a fenced code block, or a `SELECT` after a prose
/// lead-in such as "Here is the query:". Returns `Ok(None)` when the reply
/// holds no SQL at all, and an error when it holds SQL that is not exactly
/// one `SELECT`/`WITH` statement.
pub fn extract_sql(reply: &str) -> Result<Option<String>> {
    let text = reply.trim();
    let candidate = match text.find("```") {
        Some(start) => {
            let after = &text[start + 3..];
            let after = after
                .strip_prefix("sqlite")
                .or_else(|| after.strip_prefix("sql"))
                .unwrap_or(after);
            match after.find("```") {
                Some(end) => &after[..end],
                None => after,
            }
        }
        None => match statement_head(text) {
            Some(_) => text,
            None => match find_keyword(text, "select") {
                Some(pos) => &text[pos..],
                None => return Ok(None),
            },
        },
    };

    let sql = candidate.trim().trim_end_matches(';').trim();
    let head = statement_head(sql).unwrap_or_default();
    if head != "SELECT" && head != "WITH" {
        return Err(refused(if head.is_empty() { "empty statement" } else { head.as_str() }));
    }
    if has_statement_break(sql) {
        return Err(refused("multiple statements"));
    }
    Ok(Some(sql.to_string()))
}

fn refused(what: &str) -> RagDeskError {
    RagDeskError::Tabular(format!("refused non-SELECT statement ({what})"))
}

/// Uppercased first word when it is a SQL statement keyword.
fn statement_head(text: &str) -> Option<String> {
    let word = text.split_whitespace().next()?.to_ascii_uppercase();
    let word = word.trim_end_matches('(');
    (word == "SELECT" || word == "WITH" || WRITE_HEADS.contains(&word)).then(|| word.to_string())
}

/// Byte offset of `keyword` as a whole word, ignoring ASCII case.
fn find_keyword(text: &str, keyword: &str) -> Option<usize> {
    let lowered = text.to_ascii_lowercase();
    let bytes = lowered.as_bytes();
    let is_word = |b: u8| b.is_ascii_alphanumeric() || b == b'_';
    lowered.match_indices(keyword).map(|(pos, _)| pos).find(|&pos| {
        let end = pos + keyword.len();
        (pos == 0 || !is_word(bytes[pos - 1])) && (end == bytes.len() || !is_word(bytes[end]))
    })
}

/// Whether `sql` has a `;` outside quoted strings and identifiers.
fn has_statement_break(sql: &str) -> bool {
    let mut quote: Option<char> = None;
    for c in sql.chars() {
        match (quote, c) {
            (None, '\'' | '"' | '`') => quote = Some(c),
            (None, ';') => return true,
            (Some(q), c) if c == q => quote = None,
            _ => {}
        }
    }
    false
}

/// Run `sql` and render up to `max_rows` rows as text.
///
/// A single cell renders as just its value. Otherwise the first line holds
/// the column names and each row follows on its own line, cells joined with
/// ` | `.
fn run_select(conn: &rusqlite::Connection, sql: &str, max_rows: usize) -> Result<String> {
    let mut stmt = conn.prepare(sql).map_err(sql_err)?;
    if !stmt.readonly() {
        return Err(RagDeskError::Tabular(format!(
            "refusing to run a statement that writes to {TABLE_NAME}"
        )));
    }
    let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let width = names.len();

    let mut rows = stmt.query([]).map_err(sql_err)?;
    let mut rendered: Vec<Vec<String>> = Vec::new();
    let mut truncated = false;
    while let Some(row) = rows.next().map_err(sql_err)? {
        if rendered.len() == max_rows {
            truncated = true;
            break;
        }
        let mut cells = Vec::with_capacity(width);
        for i in 0..width {
            cells.push(render_cell(row.get_ref(i).map_err(sql_err)?));
        }
        rendered.push(cells);
    }

    if rendered.is_empty() {
        return Ok(String::new());
    }
    if width == 1 && rendered.len() == 1 {
        return Ok(rendered.remove(0).remove(0));
    }

    let mut out = names.join(" | ");
    for row in &rendered {
        out.push('\n');
        out.push_str(&row.join(" | "));
    }
    if truncated {
        out.push_str(&format!("\n(first {max_rows} rows shown)"));
    }
    Ok(out)
}

fn render_cell(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => String::new(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => {
            if f.fract() == 0.0 && f.abs() < 1e15 {
                format!("{f:.1}")
            } else {
                let s = format!("{f:.4}");
                s.trim_end_matches('0').trim_end_matches('.').to_string()
            }
        }
        ValueRef::Text(t) => String::from_utf8_lossy(t).into_owned(),
        ValueRef::Blob(b) => format!("<{} bytes>", b.len()),
    }
}
