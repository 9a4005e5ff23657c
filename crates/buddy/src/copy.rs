//! CSV bulk load through `COPY ... FROM STDIN`.

use crate::builder::Context;
use crate::error::BuddyResult;
use crate::executor::{CopySink, QueryKind, SqlExecutor, log_sql};
use crate::metadata::{Entity, TableField, TableInfo};
use crate::value::Value;
use bytes::BytesMut;
use futures_core::Stream;
use futures_util::StreamExt;

/// Streams entities into their table as CSV.
///
/// Only insertable columns are copied. Lines are buffered and written in
/// batches of [`DatabaseConfig::copy_batch_size`](crate::DatabaseConfig)
/// lines; each batch is flushed before the next one starts.
pub struct CopyIn<E> {
    ctx: Context,
    table: TableInfo<E>,
}

impl<E: Entity> CopyIn<E> {
    pub fn new(ctx: Context, table: TableInfo<E>) -> Self {
        Self { ctx, table }
    }

    /// `COPY <table> (c1,c2) FROM STDIN WITH (FORMAT csv)`
    pub fn statement(&self) -> String {
        let columns: Vec<&str> = self
            .table
            .details()
            .insertable_columns()
            .map(|c| c.name.as_str())
            .collect();
        format!(
            "COPY {} ({}) FROM STDIN WITH (FORMAT csv)",
            self.table.name(),
            columns.join(",")
        )
    }

    /// Copy every entity of `entities` and return the number of rows loaded.
    pub async fn execute<X, S>(&self, executor: &X, entities: S) -> BuddyResult<u64>
    where
        X: SqlExecutor,
        S: Stream<Item = E> + Send,
    {
        let columns = self.table.insertable_columns();
        let statement = self.statement();
        log_sql(QueryKind::Copy, &statement, 0, self.ctx.config.max_sql_length);

        let mut sink = executor.copy_in(&statement).await?;
        let batch_size = self.ctx.config.copy_batch_size.max(1);
        let mut buffer = BytesMut::new();
        let mut line = String::new();
        let mut pending = 0usize;

        let mut entities = std::pin::pin!(entities);
        while let Some(entity) = entities.next().await {
            line.clear();
            write_line(&mut line, &columns, &entity);
            buffer.extend_from_slice(line.as_bytes());
            pending += 1;
            if pending == batch_size {
                write_batch(&mut sink, &mut buffer, pending).await?;
                pending = 0;
            }
        }
        if pending > 0 {
            write_batch(&mut sink, &mut buffer, pending).await?;
        }

        let copied = sink.close().await?;
        tracing::debug!(target: "buddy.copy", table = self.table.name(), rows = copied, "copy finished");
        Ok(copied)
    }
}

async fn write_batch<K: CopySink>(sink: &mut K, buffer: &mut BytesMut, lines: usize) -> BuddyResult<()> {
    tracing::trace!(target: "buddy.copy", lines, bytes = buffer.len(), "writing batch");
    sink.write(buffer.split().freeze()).await?;
    sink.flush().await
}

fn write_line<E: Entity>(out: &mut String, columns: &[TableField<E>], entity: &E) {
    for (i, column) in columns.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        write_csv_field(out, &column.value_of(entity));
    }
    out.push('\n');
}

/// Append one CSV field. Text and documents are quoted with inner quotes
/// doubled; NULL is an empty field; everything else is written as is.
pub fn write_csv_field(out: &mut String, value: &Value) {
    match value {
        Value::Null => {}
        Value::Text(text) => quote(out, text),
        Value::Json(doc) => quote(out, &doc.to_string()),
        other => out.push_str(&other.to_string()),
    }
}

fn quote(out: &mut String, input: &str) {
    out.push('"');
    for (i, part) in input.split('"').enumerate() {
        if i > 0 {
            out.push_str("\"\"");
        }
        out.push_str(part);
    }
    out.push('"');
}
