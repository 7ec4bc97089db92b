//! Line-editor helper: completion for SQL keywords and special commands.
//!
//! Consulted only by the line editor; the execution pipeline never calls
//! into it.

use std::borrow::Cow;

use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Helper};

/// SQL keywords offered for tab completion.
const SQL_KEYWORDS: &[&str] = &[
    "SELECT", "FROM", "WHERE", "AND", "OR", "NOT", "IN", "LIKE", "BETWEEN", "ORDER", "BY", "ASC",
    "DESC", "LIMIT", "OFFSET", "GROUP", "HAVING", "JOIN", "LEFT", "RIGHT", "INNER", "OUTER",
    "CROSS", "ON", "AS", "INSERT", "INTO", "VALUES", "UPDATE", "SET", "DELETE", "TRUNCATE",
    "CREATE", "DROP", "ALTER", "TABLE", "DATABASE", "INDEX", "VIEW", "PRIMARY", "KEY", "FOREIGN",
    "REFERENCES", "UNIQUE", "NULL", "DEFAULT", "COUNT", "SUM", "AVG", "MIN", "MAX", "DISTINCT",
    "UNION", "INTERSECT", "EXCEPT", "ALL", "CASE", "WHEN", "THEN", "ELSE", "END", "CAST",
    "COALESCE", "NULLIF", "TRUE", "FALSE", "IS", "EXPLAIN", "ANALYZE", "SHOW", "RETURNING",
    "COPY", "GRANT", "REVOKE", "TO", "WITH",
];

/// Completion helper for the REPL line editor.
pub struct SqlHelper {
    special_commands: Vec<&'static str>,
}

impl SqlHelper {
    pub fn new(special_commands: Vec<&'static str>) -> Self {
        Self { special_commands }
    }

    fn completions(&self, line: &str, pos: usize) -> (usize, Vec<Pair>) {
        let line_to_cursor = &line[..pos];
        let word_start = line_to_cursor
            .rfind(|c: char| c.is_whitespace() || c == ',' || c == '(')
            .map(|i| i + 1)
            .unwrap_or(0);
        let word = &line_to_cursor[word_start..];

        let mut candidates = Vec::new();

        if word.starts_with('\\') {
            for cmd in &self.special_commands {
                if cmd.starts_with(word) {
                    candidates.push(Pair {
                        display: cmd.to_string(),
                        replacement: cmd.to_string(),
                    });
                }
            }
            return (word_start, candidates);
        }

        if word.is_empty() {
            return (word_start, candidates);
        }

        let word_upper = word.to_uppercase();
        for keyword in SQL_KEYWORDS {
            if keyword.starts_with(&word_upper) {
                // Match the case the user started typing with.
                let replacement = if word.chars().next().is_some_and(|c| c.is_lowercase()) {
                    keyword.to_lowercase()
                } else {
                    keyword.to_string()
                };
                candidates.push(Pair {
                    display: keyword.to_string(),
                    replacement,
                });
            }
        }

        (word_start, candidates)
    }
}

impl Completer for SqlHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        Ok(self.completions(line, pos))
    }
}

impl Hinter for SqlHelper {
    type Hint = String;
}

impl Highlighter for SqlHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        Cow::Borrowed(line)
    }
}

impl Validator for SqlHelper {}

impl Helper for SqlHelper {}

#[cfg(test)]
mod tests {
    use super::*;

    fn helper() -> SqlHelper {
        SqlHelper::new(vec!["\\q", "\\quit", "\\conninfo"])
    }

    #[test]
    fn test_keyword_completion_matches_case() {
        let (start, pairs) = helper().completions("sel", 3);
        assert_eq!(start, 0);
        assert!(pairs.iter().any(|p| p.replacement == "select"));

        let (_, pairs) = helper().completions("SEL", 3);
        assert!(pairs.iter().any(|p| p.replacement == "SELECT"));
    }

    #[test]
    fn test_special_command_completion() {
        let (start, pairs) = helper().completions("\\q", 2);
        assert_eq!(start, 0);
        let names: Vec<_> = pairs.iter().map(|p| p.display.as_str()).collect();
        assert!(names.contains(&"\\q"));
        assert!(names.contains(&"\\quit"));
    }

    #[test]
    fn test_mid_statement_word_start() {
        let (start, pairs) = helper().completions("SELECT * fr", 11);
        assert_eq!(start, 9);
        assert!(pairs.iter().any(|p| p.display == "FROM"));
    }

    #[test]
    fn test_empty_word_offers_nothing() {
        let (_, pairs) = helper().completions("SELECT ", 7);
        assert!(pairs.is_empty());
    }
}
