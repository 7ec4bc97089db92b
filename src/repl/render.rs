//! Tabular rendering of query results and special-command blocks.
//!
//! Query results are streamed in fixed-size batches so an arbitrarily large
//! result set never resides entirely in memory: each batch is rendered and
//! flushed to the output before the next is buffered.

use std::io::Write;

use comfy_table::{presets, Table};

use crate::db::QueryResult;
use crate::error::Result;
use crate::special::TableBlock;

/// Rows buffered per rendered table chunk.
pub const BATCH_SIZE: usize = 500;

/// Streams a query result into `out` in batches of [`BATCH_SIZE`] rows.
///
/// If the result has zero rows a header-only table is still emitted so the
/// column names remain visible.
pub async fn render_query<W: Write>(result: &mut QueryResult, out: &mut W) -> Result<()> {
    let header = result.columns().to_vec();
    let mut wrote_any = false;

    loop {
        let mut batch: Vec<Vec<String>> = Vec::new();
        while batch.len() < BATCH_SIZE {
            match result.next().await? {
                Some(row) => batch.push(row.iter().map(|v| v.to_display_string()).collect()),
                None => break,
            }
        }
        if batch.is_empty() {
            break;
        }
        wrote_any = true;
        let table = build_table(&header, &batch);
        writeln!(out, "{table}")?;
        out.flush()?;
    }

    if !wrote_any {
        let table = build_table(&header, &[]);
        writeln!(out, "{table}")?;
        out.flush()?;
    }

    Ok(())
}

/// Renders one special-command block.
pub fn render_block<W: Write>(block: &TableBlock, out: &mut W) -> Result<()> {
    if let Some(title) = &block.title {
        writeln!(out, "{title}")?;
    }
    let table = build_table(&block.columns, &block.rows);
    writeln!(out, "{table}")?;
    Ok(())
}

fn build_table(header: &[String], rows: &[Vec<String>]) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::ASCII_FULL);
    table.set_header(header.to_vec());
    for row in rows {
        table.add_row(row.clone());
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::mock::MockRowSource;
    use crate::db::{CommandTag, Row, RowSource, Value};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    /// A writer that counts flushes, shared with the row source so a test
    /// can observe output reaching the writer before the stream is drained.
    #[derive(Clone, Default)]
    struct CountingWriter {
        flushes: Arc<AtomicUsize>,
        bytes: Arc<AtomicUsize>,
    }

    impl Write for CountingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.bytes.fetch_add(buf.len(), Ordering::SeqCst);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            self.flushes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// A row source that records how many flushes had happened by the time
    /// its last row was pulled.
    struct ProbingSource {
        remaining: usize,
        flushes: Arc<AtomicUsize>,
        flushes_at_last_row: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl RowSource for ProbingSource {
        async fn next_row(&mut self) -> crate::error::Result<Option<Row>> {
            if self.remaining == 0 {
                return Ok(None);
            }
            self.remaining -= 1;
            if self.remaining == 0 {
                self.flushes_at_last_row
                    .store(self.flushes.load(Ordering::SeqCst), Ordering::SeqCst);
            }
            Ok(Some(vec![Value::Int(self.remaining as i64)]))
        }

        fn command_tag(&self) -> CommandTag {
            CommandTag::new("SELECT")
        }

        fn close(&mut self) {}
    }

    fn query_result(source: Box<dyn RowSource>) -> QueryResult {
        QueryResult::new(
            vec!["n".to_string()],
            source,
            Instant::now(),
            Duration::from_millis(1),
        )
    }

    #[tokio::test]
    async fn test_zero_rows_emits_header_only_table() {
        let mut result = query_result(Box::new(MockRowSource::new(vec![], "SELECT")));
        let mut out = Vec::new();
        render_query(&mut result, &mut out).await.unwrap();
        let rendered = String::from_utf8(out).unwrap();
        assert!(rendered.contains('n'));
        assert!(rendered.contains('+'));
    }

    #[tokio::test]
    async fn test_large_result_flushes_before_drain() {
        let writer = CountingWriter::default();
        let flushes_at_last_row = Arc::new(AtomicUsize::new(usize::MAX));
        let source = ProbingSource {
            remaining: BATCH_SIZE * 2 + 50,
            flushes: writer.flushes.clone(),
            flushes_at_last_row: flushes_at_last_row.clone(),
        };
        let mut result = query_result(Box::new(source));
        let mut out = writer.clone();
        render_query(&mut result, &mut out).await.unwrap();

        // At least one batch reached the writer before the final row was
        // pulled from the stream.
        assert!(flushes_at_last_row.load(Ordering::SeqCst) >= 1);
        // Three batches were written in total (500 + 500 + 50).
        assert!(writer.flushes.load(Ordering::SeqCst) >= 3);
    }

    #[tokio::test]
    async fn test_small_result_single_batch() {
        let rows = vec![vec![Value::Int(1)], vec![Value::Int(2)]];
        let mut result = query_result(Box::new(MockRowSource::new(rows, "SELECT")));
        let writer = CountingWriter::default();
        let mut out = writer.clone();
        render_query(&mut result, &mut out).await.unwrap();
        assert_eq!(writer.flushes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_render_block_includes_title_and_rows() {
        let block = TableBlock {
            title: Some("Indexes".to_string()),
            columns: vec!["Name".to_string()],
            rows: vec![vec!["users_pkey".to_string()]],
        };
        let mut out = Vec::new();
        render_block(&block, &mut out).unwrap();
        let rendered = String::from_utf8(out).unwrap();
        assert!(rendered.contains("Indexes"));
        assert!(rendered.contains("users_pkey"));
    }
}
