//! SQL statement classification.
//!
//! Labels a statement (or statement sequence) as read-only, write, or invalid
//! without executing it, using sqlparser with the PostgreSQL dialect. The
//! label decides which execution path the executor takes: the row-streaming
//! path for reads, the status/row-count path for writes.

use sqlparser::ast::{Query, SetExpr, Statement};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

/// Classification of a SQL statement sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementClass {
    /// Produces a result set and has no side effects on the server.
    Read,
    /// Has side effects (data, schema, or session state).
    Write,
    /// Does not parse, or contains no statement at all.
    Invalid,
}

/// Classifies a SQL string.
///
/// A statement sequence classifies as `Write` if any statement in it has side
/// effects; otherwise `Read`. Unparseable, empty, whitespace-only, and
/// comment-only input classifies as `Invalid`. The classification is a pure
/// function of the input text.
pub fn classify(sql: &str) -> StatementClass {
    let dialect = PostgreSqlDialect {};
    let statements = match Parser::parse_sql(&dialect, sql) {
        Ok(statements) => statements,
        Err(_) => return StatementClass::Invalid,
    };

    if statements.is_empty() {
        return StatementClass::Invalid;
    }

    if statements.iter().any(statement_writes) {
        StatementClass::Write
    } else {
        StatementClass::Read
    }
}

/// Returns true if the SQL is a read-only query.
pub fn is_read(sql: &str) -> bool {
    classify(sql) == StatementClass::Read
}

/// Returns true if the SQL has side effects.
pub fn is_write(sql: &str) -> bool {
    classify(sql) == StatementClass::Write
}

/// Returns true if the SQL parses as at least one statement.
pub fn is_valid(sql: &str) -> bool {
    classify(sql) != StatementClass::Invalid
}

/// Decides whether a single statement has side effects.
fn statement_writes(statement: &Statement) -> bool {
    match statement {
        // SELECT is a read unless it materializes a new relation (SELECT INTO).
        Statement::Query(query) => query_has_into(query),

        // DML with a RETURNING projection streams rows; the client treats it
        // as a read so the result set is rendered. Without RETURNING it is a
        // plain write.
        Statement::Insert(insert) => insert.returning.is_none(),
        Statement::Update { returning, .. } => returning.is_none(),
        Statement::Delete(delete) => delete.returning.is_none(),

        // COPY ... TO exports (read); COPY ... FROM imports (write).
        Statement::Copy { to, .. } => !to,

        // Introspection never writes, regardless of nested clauses.
        Statement::Explain { .. }
        | Statement::ExplainTable { .. }
        | Statement::Execute { .. }
        | Statement::ShowVariable { .. }
        | Statement::ShowVariables { .. }
        | Statement::ShowTables { .. }
        | Statement::ShowColumns { .. }
        | Statement::ShowCreate { .. }
        | Statement::ShowFunctions { .. }
        | Statement::ShowStatus { .. }
        | Statement::ShowCollation { .. } => false,

        // Schema-mutating and session-mutating statements.
        Statement::CreateTable { .. }
        | Statement::CreateIndex { .. }
        | Statement::CreateView { .. }
        | Statement::CreateSchema { .. }
        | Statement::CreateDatabase { .. }
        | Statement::AlterTable { .. }
        | Statement::AlterIndex { .. }
        | Statement::AlterView { .. }
        | Statement::Drop { .. }
        | Statement::Truncate { .. }
        | Statement::SetVariable { .. } => true,

        // Fail safe: anything not enumerated takes the side-effecting path.
        _ => true,
    }
}

/// Returns true if any SELECT inside the query carries an INTO target.
fn query_has_into(query: &Query) -> bool {
    set_expr_has_into(&query.body)
}

fn set_expr_has_into(set_expr: &SetExpr) -> bool {
    match set_expr {
        SetExpr::Select(select) => select.into.is_some(),
        SetExpr::Query(query) => query_has_into(query),
        SetExpr::SetOperation { left, right, .. } => {
            set_expr_has_into(left) || set_expr_has_into(right)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_class(sql: &str, expected: StatementClass) {
        assert_eq!(
            classify(sql),
            expected,
            "SQL: '{}' - expected {:?}, got {:?}",
            sql,
            expected,
            classify(sql)
        );
    }

    // Reads
    #[test]
    fn test_select_is_read() {
        assert_class("SELECT * FROM users", StatementClass::Read);
    }

    #[test]
    fn test_select_with_where_is_read() {
        assert_class(
            "SELECT id, name FROM users WHERE active = true",
            StatementClass::Read,
        );
    }

    #[test]
    fn test_select_trailing_semicolon_is_read() {
        assert_class("SELECT * FROM users;", StatementClass::Read);
    }

    #[test]
    fn test_show_is_read() {
        assert_class("SHOW search_path", StatementClass::Read);
    }

    #[test]
    fn test_explain_is_read() {
        assert_class("EXPLAIN SELECT * FROM users", StatementClass::Read);
    }

    #[test]
    fn test_explain_delete_is_read() {
        // Introspection is never reclassified by its nested statement.
        assert_class("EXPLAIN DELETE FROM users", StatementClass::Read);
    }

    #[test]
    fn test_execute_prepared_is_read() {
        assert_class("EXECUTE fetch_users", StatementClass::Read);
    }

    #[test]
    fn test_case_insensitive() {
        assert_class("select * from users", StatementClass::Read);
        assert_class("SeLeCt * FrOm UsErS", StatementClass::Read);
        assert_class("  SELECT 1  ", StatementClass::Read);
    }

    // RETURNING reclassification
    #[test]
    fn test_insert_is_write() {
        assert_class(
            "INSERT INTO users (name) VALUES ('Alice')",
            StatementClass::Write,
        );
    }

    #[test]
    fn test_insert_returning_is_read() {
        assert_class(
            "INSERT INTO users (name) VALUES ('Alice') RETURNING id",
            StatementClass::Read,
        );
    }

    #[test]
    fn test_update_is_write() {
        assert_class("UPDATE users SET active = false", StatementClass::Write);
    }

    #[test]
    fn test_update_returning_is_read() {
        assert_class(
            "UPDATE users SET active = false RETURNING id",
            StatementClass::Read,
        );
    }

    #[test]
    fn test_delete_is_write() {
        assert_class("DELETE FROM users WHERE id = 1", StatementClass::Write);
    }

    #[test]
    fn test_delete_returning_is_read() {
        assert_class(
            "DELETE FROM users WHERE id = 1 RETURNING *",
            StatementClass::Read,
        );
    }

    // SELECT INTO
    #[test]
    fn test_select_into_is_write() {
        assert_class(
            "SELECT * INTO users_backup FROM users",
            StatementClass::Write,
        );
    }

    // COPY direction
    #[test]
    fn test_copy_from_is_write() {
        assert_class("COPY users FROM STDIN;", StatementClass::Write);
    }

    #[test]
    fn test_copy_to_is_read() {
        assert_class("COPY (SELECT * FROM users) TO STDOUT", StatementClass::Read);
    }

    // Schema and session mutation
    #[test]
    fn test_create_table_is_write() {
        assert_class(
            "CREATE TABLE t (id SERIAL PRIMARY KEY)",
            StatementClass::Write,
        );
    }

    #[test]
    fn test_alter_table_is_write() {
        assert_class("ALTER TABLE t ADD COLUMN v TEXT", StatementClass::Write);
    }

    #[test]
    fn test_drop_table_is_write() {
        assert_class("DROP TABLE t", StatementClass::Write);
    }

    #[test]
    fn test_truncate_is_write() {
        assert_class("TRUNCATE TABLE logs", StatementClass::Write);
    }

    #[test]
    fn test_set_is_write() {
        assert_class("SET search_path TO public", StatementClass::Write);
    }

    #[test]
    fn test_unknown_statement_defaults_to_write() {
        assert_class("GRANT SELECT ON users TO reader", StatementClass::Write);
        assert_class("START TRANSACTION", StatementClass::Write);
    }

    // Multi-statement sequences
    #[test]
    fn test_sequence_with_write_is_write() {
        assert_class("SELECT 1; DELETE FROM logs", StatementClass::Write);
    }

    #[test]
    fn test_sequence_all_reads_is_read() {
        assert_class(
            "SELECT 1; SELECT COUNT(*) FROM users;",
            StatementClass::Read,
        );
    }

    // Invalid input
    #[test]
    fn test_empty_is_invalid() {
        assert_class("", StatementClass::Invalid);
    }

    #[test]
    fn test_whitespace_only_is_invalid() {
        assert_class("   \n\t  ", StatementClass::Invalid);
    }

    #[test]
    fn test_comment_only_is_invalid() {
        assert_class("-- just a comment", StatementClass::Invalid);
        assert_class("/* block comment */", StatementClass::Invalid);
    }

    #[test]
    fn test_gibberish_is_invalid() {
        assert_class("THIS IS NOT SQL AT ALL !!!", StatementClass::Invalid);
    }

    #[test]
    fn test_classify_is_pure() {
        // Identical input yields identical output regardless of prior calls.
        let inputs = ["SELECT 1", "DELETE FROM t", "not sql", ""];
        let first: Vec<_> = inputs.iter().map(|s| classify(s)).collect();
        for _ in 0..3 {
            let again: Vec<_> = inputs.iter().map(|s| classify(s)).collect();
            assert_eq!(first, again);
        }
    }

    #[test]
    fn test_predicates_are_derived() {
        assert!(is_read("SELECT 1"));
        assert!(!is_write("SELECT 1"));
        assert!(is_write("DELETE FROM t"));
        assert!(is_valid("SELECT 1"));
        assert!(!is_valid("   "));
    }
}
