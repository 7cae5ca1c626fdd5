//! Query execution.
//!
//! [`QueryExecutor`] is the single seam every statement goes through,
//! transaction control included. The Postgres plumbing below binds values
//! positionally and decodes rows into [`Row`]s.

use async_trait::async_trait;
use futures::TryStreamExt;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::{Column, Either, Executor, PgConnection, Postgres, Row as _, TypeInfo};

use crate::error::{QueryError, Result};
use crate::query::{Query, Value};
use crate::result::{ResultSet, Row};

/// Runs a [`Query`] against the store.
///
/// Implementations must validate the descriptor before sending it and must
/// pass values as bound parameters, never as statement text.
#[async_trait]
pub trait QueryExecutor: Send {
    async fn execute(&mut self, query: &Query) -> Result<ResultSet>;
}

pub(crate) type PgQuery<'q> = sqlx::query::Query<'q, Postgres, PgArguments>;

/// Bind `values` onto `query` in order, each with its native type.
pub(crate) fn bind_values<'q>(mut query: PgQuery<'q>, values: &[Value]) -> PgQuery<'q> {
    for value in values {
        query = match value {
            Value::Bool(v) => query.bind(*v),
            Value::Int(v) => query.bind(*v),
            Value::BigInt(v) => query.bind(*v),
            Value::Double(v) => query.bind(*v),
            Value::Text(v) => query.bind(v.clone()),
        };
    }
    query
}

/// Run a bound statement and collect its rows and reported row count.
pub(crate) async fn fetch_result(conn: &mut PgConnection, query: PgQuery<'_>) -> Result<ResultSet> {
    let mut stream = (&mut *conn).fetch_many(query);
    let mut rows = Vec::new();
    let mut row_count = 0u64;

    while let Some(step) = stream.try_next().await? {
        match step {
            Either::Left(done) => row_count += done.rows_affected(),
            Either::Right(row) => rows.push(decode_row(&row)?),
        }
    }

    Ok(ResultSet {
        row_count: row_count.max(rows.len() as u64),
        rows,
    })
}

fn decode_row(row: &PgRow) -> Result<Row> {
    let mut decoded = Row::new();

    for column in row.columns() {
        let idx = column.ordinal();
        let value = match column.type_info().name() {
            "BOOL" => Value::Bool(row.try_get(idx)?),
            "INT2" => Value::Int(row.try_get::<Option<i16>, _>(idx)?.map(i32::from)),
            "INT4" => Value::Int(row.try_get(idx)?),
            "INT8" => Value::BigInt(row.try_get(idx)?),
            "FLOAT4" => Value::Double(row.try_get::<Option<f32>, _>(idx)?.map(f64::from)),
            "FLOAT8" => Value::Double(row.try_get(idx)?),
            "NUMERIC" => Value::Double(
                row.try_get::<Option<Decimal>, _>(idx)?
                    .map(|d| numeric_to_f64(column.name(), d))
                    .transpose()?,
            ),
            "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => Value::Text(row.try_get(idx)?),
            other => {
                return Err(QueryError::UnsupportedColumn {
                    column: column.name().to_owned(),
                    type_name: other.to_owned(),
                })
            }
        };
        decoded.push(column.name(), value);
    }

    Ok(decoded)
}

fn numeric_to_f64(column: &str, value: Decimal) -> Result<f64> {
    value
        .to_f64()
        .ok_or_else(|| QueryError::Decode(format!("column {column}: {value} does not fit in f64")))
}
