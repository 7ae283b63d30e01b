//! SQL text helpers: quoting, statement splitting and the statements built
//! for record operations. Values are never spliced into SQL text; builders
//! only emit `?` placeholders.

/// Column names and primary key ranks of a table, in declaration order.
pub const TABLE_INFO: &str = "SELECT name, pk FROM pragma_table_info(?1) ORDER BY cid";

/// Quote an identifier (table, column or index name) for SQLite.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a string literal for SQLite.
pub fn quote_literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// `INSERT INTO t (c1, c2, ..) VALUES (?, ?, ..) RETURNING k1, k2, ..`
///
/// Only the key columns come back; the stored row is read afterwards with
/// [`select_by_key`].
pub fn insert_returning(table: &str, columns: &[String], keys: &[String]) -> String {
    let names = columns
        .iter()
        .map(|column| quote_identifier(column))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = vec!["?"; columns.len()].join(", ");
    let returning = keys
        .iter()
        .map(|key| quote_identifier(key))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {} ({names}) VALUES ({placeholders}) RETURNING {returning}",
        quote_identifier(table)
    )
}

/// `SELECT * FROM t WHERE k1 = ? AND k2 = ?`
pub fn select_by_key(table: &str, keys: &[String]) -> String {
    format!(
        "SELECT * FROM {} WHERE {}",
        quote_identifier(table),
        key_condition(keys)
    )
}

/// `SELECT count(*) FROM t WHERE k1 = ? AND k2 = ?`
pub fn count_by_key(table: &str, keys: &[String]) -> String {
    format!(
        "SELECT count(*) FROM {} WHERE {}",
        quote_identifier(table),
        key_condition(keys)
    )
}

/// `UPDATE t SET c1 = ?, c2 = ? WHERE k1 = ? AND ..`; bind the set values
/// first, then the key values.
pub fn update_by_key<'a>(
    table: &str,
    columns: impl IntoIterator<Item = &'a str>,
    keys: &[String],
) -> String {
    let assignments = columns
        .into_iter()
        .map(|column| format!("{} = ?", quote_identifier(column)))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "UPDATE {} SET {assignments} WHERE {}",
        quote_identifier(table),
        key_condition(keys)
    )
}

fn key_condition(keys: &[String]) -> String {
    keys.iter()
        .map(|key| format!("{} = ?", quote_identifier(key)))
        .collect::<Vec<_>>()
        .join(" AND ")
}

/// Whether `statement` starts with INSERT, UPDATE, DELETE or REPLACE,
/// ignoring leading whitespace and comments.
pub fn is_data_change(statement: &str) -> bool {
    let mut rest = statement;
    loop {
        rest = rest.trim_start();
        if let Some(comment) = rest.strip_prefix("--") {
            rest = comment.split_once('\n').map_or("", |(_, tail)| tail);
        } else if let Some(comment) = rest.strip_prefix("/*") {
            rest = comment.split_once("*/").map_or("", |(_, tail)| tail);
        } else {
            break;
        }
    }
    let keyword: String = rest
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    matches!(
        keyword.to_ascii_uppercase().as_str(),
        "INSERT" | "UPDATE" | "DELETE" | "REPLACE"
    )
}

#[derive(Clone, Copy)]
enum Lexeme {
    Code,
    Quoted(char),
    LineComment,
    BlockComment,
}

/// Keywords seen so far in the statement being scanned. Only used to keep
/// `CREATE TRIGGER .. BEGIN .. END` bodies in one piece.
#[derive(Default)]
struct Keywords {
    head: Vec<String>,
    count: usize,
    case_depth: usize,
    closed_block: bool,
}

impl Keywords {
    fn push(&mut self, word: &str) {
        let upper = word.to_ascii_uppercase();
        self.closed_block = false;
        match upper.as_str() {
            "CASE" => self.case_depth += 1,
            "END" if self.case_depth > 0 => self.case_depth -= 1,
            "END" => self.closed_block = true,
            _ => {}
        }
        if self.head.len() < 3 {
            self.head.push(upper);
        }
        self.count += 1;
    }

    fn is_trigger(&self) -> bool {
        let head: Vec<&str> = self.head.iter().map(String::as_str).collect();
        matches!(
            head.as_slice(),
            ["CREATE", "TRIGGER", ..] | ["CREATE", "TEMP" | "TEMPORARY", "TRIGGER"]
        )
    }

    fn ends_at_semicolon(&self) -> bool {
        !self.is_trigger() || self.closed_block
    }
}

/// Split SQL text into statements on `;`.
///
/// Semicolons inside string literals, quoted identifiers and comments do not
/// split, and a trigger body stays with its `CREATE TRIGGER`. Fragments
/// without any SQL (blank or comment-only) are dropped. Returned statements
/// are trimmed and carry no trailing `;`.
pub fn split_statements(sql: &str) -> Vec<&str> {
    let mut statements = Vec::new();
    let mut start = 0;
    let mut state = Lexeme::Code;
    let mut keywords = Keywords::default();
    let mut word_start: Option<usize> = None;
    let mut chars = sql.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        match state {
            Lexeme::Quoted(close) => {
                if c == close {
                    state = Lexeme::Code;
                }
                continue;
            }
            Lexeme::LineComment => {
                if c == '\n' {
                    state = Lexeme::Code;
                }
                continue;
            }
            Lexeme::BlockComment => {
                if c == '*' && matches!(chars.peek(), Some((_, '/'))) {
                    chars.next();
                    state = Lexeme::Code;
                }
                continue;
            }
            Lexeme::Code => {}
        }

        if c.is_alphanumeric() || c == '_' {
            word_start.get_or_insert(i);
            continue;
        }
        if let Some(begin) = word_start.take() {
            keywords.push(&sql[begin..i]);
        }

        match c {
            '\'' | '"' | '`' => state = Lexeme::Quoted(c),
            '[' => state = Lexeme::Quoted(']'),
            '-' if matches!(chars.peek(), Some((_, '-'))) => {
                chars.next();
                state = Lexeme::LineComment;
            }
            '/' if matches!(chars.peek(), Some((_, '*'))) => {
                chars.next();
                state = Lexeme::BlockComment;
            }
            ';' if keywords.ends_at_semicolon() => {
                if keywords.count > 0 {
                    statements.push(sql[start..i].trim());
                }
                start = i + c.len_utf8();
                keywords = Keywords::default();
            }
            _ => {}
        }
    }

    if let Some(begin) = word_start {
        keywords.push(&sql[begin..]);
    }
    if keywords.count > 0 {
        statements.push(sql[start..].trim());
    }
    statements
}
