//! Cached result payload: Arrow IPC stream codec for [`RowSet`]

use std::io::Cursor;
use std::sync::Arc;

use arrow::ipc::reader::StreamReader;
use arrow::ipc::writer::StreamWriter;
use arrow_array::builder::{
    ArrayBuilder, BinaryBuilder, BooleanBuilder, Float64Builder, Int64Builder, StringBuilder,
};
use arrow_array::cast::AsArray;
use arrow_array::types::{Float64Type, Int64Type};
use arrow_array::{Array, ArrayRef, RecordBatch, RecordBatchOptions};
use arrow_schema::{DataType, Field, Schema, SchemaRef};

use super::error::{PayloadError, PayloadResult};
use super::source::{Column, ColumnType, RowSet, Value};

const fn arrow_type(data_type: ColumnType) -> DataType {
    match data_type {
        ColumnType::Boolean => DataType::Boolean,
        ColumnType::Int64 => DataType::Int64,
        ColumnType::Float64 => DataType::Float64,
        ColumnType::Utf8 => DataType::Utf8,
        ColumnType::Binary => DataType::Binary,
    }
}

fn column_type(field: &Field) -> PayloadResult<ColumnType> {
    match field.data_type() {
        DataType::Boolean => Ok(ColumnType::Boolean),
        DataType::Int64 => Ok(ColumnType::Int64),
        DataType::Float64 => Ok(ColumnType::Float64),
        DataType::Utf8 => Ok(ColumnType::Utf8),
        DataType::Binary => Ok(ColumnType::Binary),
        other => Err(PayloadError::TypeMismatch {
            column: field.name().clone(),
            expected: "BOOLEAN, INT64, FLOAT64, UTF8 or BINARY".to_string(),
            actual: other.to_string(),
        }),
    }
}

fn schema_for(columns: &[Column]) -> SchemaRef {
    let fields: Vec<Field> = columns
        .iter()
        .map(|c| Field::new(&c.name, arrow_type(c.data_type), true))
        .collect();
    Arc::new(Schema::new(fields))
}

fn build_array<B, F>(
    mut builder: B,
    column: &Column,
    idx: usize,
    rows: &[Vec<Value>],
    append: F,
) -> PayloadResult<ArrayRef>
where
    B: ArrayBuilder,
    F: Fn(&mut B, &Value) -> bool,
{
    for row in rows {
        let value = &row[idx];
        if !append(&mut builder, value) {
            return Err(PayloadError::TypeMismatch {
                column: column.name.clone(),
                expected: column.data_type.to_string(),
                actual: value.type_name().to_string(),
            });
        }
    }
    Ok(builder.finish())
}

fn column_array(column: &Column, idx: usize, rows: &[Vec<Value>]) -> PayloadResult<ArrayRef> {
    let n = rows.len();
    match column.data_type {
        ColumnType::Boolean => build_array(
            BooleanBuilder::with_capacity(n),
            column,
            idx,
            rows,
            |b, v| match v {
                Value::Null => {
                    b.append_null();
                    true
                }
                Value::Boolean(x) => {
                    b.append_value(*x);
                    true
                }
                _ => false,
            },
        ),
        ColumnType::Int64 => build_array(
            Int64Builder::with_capacity(n),
            column,
            idx,
            rows,
            |b, v| match v {
                Value::Null => {
                    b.append_null();
                    true
                }
                Value::Int(x) => {
                    b.append_value(*x);
                    true
                }
                _ => false,
            },
        ),
        ColumnType::Float64 => build_array(
            Float64Builder::with_capacity(n),
            column,
            idx,
            rows,
            |b, v| match v {
                Value::Null => {
                    b.append_null();
                    true
                }
                Value::Float(x) => {
                    b.append_value(*x);
                    true
                }
                _ => false,
            },
        ),
        ColumnType::Utf8 => build_array(
            StringBuilder::with_capacity(n, n * 16),
            column,
            idx,
            rows,
            |b, v| match v {
                Value::Null => {
                    b.append_null();
                    true
                }
                Value::Text(x) => {
                    b.append_value(x);
                    true
                }
                _ => false,
            },
        ),
        ColumnType::Binary => build_array(
            BinaryBuilder::with_capacity(n, n * 16),
            column,
            idx,
            rows,
            |b, v| match v {
                Value::Null => {
                    b.append_null();
                    true
                }
                Value::Bytes(x) => {
                    b.append_value(x);
                    true
                }
                _ => false,
            },
        ),
    }
}

fn to_record_batch(rows: &RowSet, schema: SchemaRef) -> PayloadResult<RecordBatch> {
    let width = rows.columns().len();
    if let Some((row, values)) = rows
        .rows()
        .iter()
        .enumerate()
        .find(|(_, values)| values.len() != width)
    {
        return Err(PayloadError::ColumnMismatch {
            row,
            expected: width,
            actual: values.len(),
        });
    }

    let arrays = rows
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, column)| column_array(column, idx, rows.rows()))
        .collect::<PayloadResult<Vec<_>>>()?;

    let options = RecordBatchOptions::new().with_row_count(Some(rows.len()));
    Ok(RecordBatch::try_new_with_options(schema, arrays, &options)?)
}

/// Serialize a result set into an Arrow IPC stream.
///
/// The output is a pure function of the row set, so identical results
/// produce identical bytes.
pub fn encode_payload(rows: &RowSet) -> PayloadResult<Vec<u8>> {
    let schema = schema_for(rows.columns());
    let batch = to_record_batch(rows, Arc::clone(&schema))?;

    let mut buffer = Vec::new();
    let mut writer = StreamWriter::try_new(&mut buffer, &schema)?;
    writer.write(&batch)?;
    writer.finish()?;
    drop(writer);

    Ok(buffer)
}

fn read_value(array: &ArrayRef, data_type: ColumnType, row: usize) -> Value {
    if array.is_null(row) {
        return Value::Null;
    }
    match data_type {
        ColumnType::Boolean => Value::Boolean(array.as_boolean().value(row)),
        ColumnType::Int64 => Value::Int(array.as_primitive::<Int64Type>().value(row)),
        ColumnType::Float64 => Value::Float(array.as_primitive::<Float64Type>().value(row)),
        ColumnType::Utf8 => Value::Text(array.as_string::<i32>().value(row).to_string()),
        ColumnType::Binary => Value::Bytes(array.as_binary::<i32>().value(row).to_vec()),
    }
}

/// Decode a payload produced by [`encode_payload`].
pub fn decode_payload(bytes: &[u8]) -> PayloadResult<RowSet> {
    let reader = StreamReader::try_new(Cursor::new(bytes), None)?;
    let schema = reader.schema();

    let columns = schema
        .fields()
        .iter()
        .map(|field| Ok(Column::new(field.name().clone(), column_type(field)?)))
        .collect::<PayloadResult<Vec<_>>>()?;

    let mut rows: Vec<Vec<Value>> = Vec::new();
    for batch in reader {
        let batch = batch?;
        for row in 0..batch.num_rows() {
            rows.push(
                columns
                    .iter()
                    .enumerate()
                    .map(|(idx, column)| read_value(batch.column(idx), column.data_type, row))
                    .collect(),
            );
        }
    }

    Ok(RowSet::new(columns, rows))
}
