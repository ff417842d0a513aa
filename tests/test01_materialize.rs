use chrono::{FixedOffset, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use stealth_sql::error::SQLSTATE_OUT_OF_RANGE;
use stealth_sql::prelude::*;
use stealth_sql::test_utils::MemoryCursor;

fn zone() -> FixedOffset {
    FixedOffset::east_opt(2 * 3600).unwrap()
}

fn orders_cursor() -> MemoryCursor {
    let placed = NaiveDate::from_ymd_opt(2024, 3, 9)
        .unwrap()
        .and_hms_opt(14, 30, 0)
        .unwrap();
    MemoryCursor::new(vec![
        ColumnMetadata::new("Order_Id", FieldKind::Int64),
        ColumnMetadata::new("Quantity", FieldKind::Tiny).unsigned(),
        ColumnMetadata::new("Total", FieldKind::Decimal),
        ColumnMetadata::new("Placed_At", FieldKind::DateTime),
        ColumnMetadata::new("Note", FieldKind::String),
        ColumnMetadata::new("Receipt", FieldKind::Binary),
    ])
    .row(vec![
        Value::Int64(1),
        Value::Tiny(-56),
        Value::Decimal(Decimal::new(1999, 2)),
        Value::DateTime(placed),
        Value::Text("first".into()),
        Value::Binary(vec![0xca, 0xfe]),
    ])
    .row(vec![
        Value::Int64(2),
        Value::Small(17),
        Value::Null,
        Value::Null,
        Value::Null,
        Value::Null,
    ])
}

#[test]
fn materializes_every_row_in_canonical_form() -> Result<(), Box<dyn std::error::Error>> {
    let mut cursor = orders_cursor();
    let table = ResultTable::from_cursor_in_zone(&mut cursor, zone())?;

    assert_eq!(table.field_count(), 6);
    assert_eq!(table.record_count(), 2);
    assert!(table.has_records());
    assert!(!table.is_signed("quantity")?);
    assert_eq!(table.field_kind(1)?, FieldKind::Tiny);
    assert_eq!(table.fields()[1].canonical_kind(), FieldKind::Small);

    let first = table.record(0).ok_or("missing first record")?;
    assert_eq!(first.get_value("quantity")?, &Value::Small(200));
    assert_eq!(first.get_i32("QUANTITY")?, Some(200));
    assert_eq!(first.get_decimal("total")?, Some(Decimal::new(1999, 2)));
    assert_eq!(first.get_bytes("receipt")?, Some(vec![0xca, 0xfe]));

    let second = table.record(1).ok_or("missing second record")?;
    assert_eq!(second.get_i16("quantity")?, Some(17));
    assert_eq!(second.get_decimal("total")?, None);
    assert!(second.is_null("receipt")?);
    Ok(())
}

#[test]
fn field_index_ignores_case() -> Result<(), Box<dyn std::error::Error>> {
    let mut cursor = orders_cursor();
    let table = ResultTable::from_cursor_in_zone(&mut cursor, zone())?;
    for i in 0..table.field_count() {
        let name = table.field_name(i)?.to_string();
        for variant in [name.clone(), name.to_lowercase(), name.to_uppercase()] {
            assert_eq!(table.field_index(&variant), Some(i), "variant {variant}");
        }
    }
    assert_eq!(table.field_index("nope"), None);
    Ok(())
}

#[test]
fn get_string_never_fails() -> Result<(), Box<dyn std::error::Error>> {
    let mut cursor = orders_cursor();
    let table = ResultTable::from_cursor_in_zone(&mut cursor, zone())?;
    for record in &table {
        for i in 0..record.field_count() {
            record.get_string(i)?;
        }
    }
    let first = table.record(0).ok_or("missing first record")?;
    assert_eq!(first.get_string("receipt")?.as_deref(), Some("0xcafe"));
    assert_eq!(first.get_string("total")?.as_deref(), Some("19.99"));
    assert_eq!(
        first.get_string("placed_at")?.as_deref(),
        Some("2024-03-09 14:30:00")
    );
    Ok(())
}

#[test]
fn offset_values_use_materialization_zone() -> Result<(), Box<dyn std::error::Error>> {
    let mut cursor = orders_cursor();
    let table = ResultTable::from_cursor_in_zone(&mut cursor, zone())?;
    assert_eq!(table.zone(), zone());
    let first = table.record(0).ok_or("missing first record")?;
    let placed = first
        .get_offset_datetime("placed_at")?
        .ok_or("placed_at is null")?;
    assert_eq!(placed.offset(), &zone());
    let expected: NaiveDateTime = NaiveDate::from_ymd_opt(2024, 3, 9)
        .unwrap()
        .and_hms_opt(12, 30, 0)
        .unwrap();
    assert_eq!(placed.naive_utc(), expected);
    Ok(())
}

#[test]
fn unsigned_value_outside_domain_is_a_range_error() {
    let mut cursor = MemoryCursor::new(vec![
        ColumnMetadata::new("level", FieldKind::Tiny).unsigned(),
    ])
    .row(vec![Value::Small(255)])
    .row(vec![Value::Small(256)]);
    let err = ResultTable::from_cursor(&mut cursor).unwrap_err();
    match err {
        StealthDbError::DataRange { sql_state, message } => {
            assert_eq!(sql_state, SQLSTATE_OUT_OF_RANGE);
            assert!(message.contains("level"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn negative_wide_value_for_unsigned_column_is_rejected() {
    let mut cursor = MemoryCursor::new(vec![
        ColumnMetadata::new("counter", FieldKind::Int32).unsigned(),
    ])
    .row(vec![Value::Int64(-1)]);
    assert!(matches!(
        ResultTable::from_cursor(&mut cursor),
        Err(StealthDbError::DataRange { .. })
    ));
}

#[test]
fn unsigned_int64_maximum_fits() -> Result<(), Box<dyn std::error::Error>> {
    let mut cursor = MemoryCursor::new(vec![
        ColumnMetadata::new("id", FieldKind::Int64).unsigned(),
    ])
    .row(vec![Value::Int64(-1)]);
    let table = ResultTable::from_cursor(&mut cursor)?;
    let record = table.record(0).ok_or("missing record")?;
    assert_eq!(record.get_i128("id")?, Some(i128::from(u64::MAX)));
    assert!(record.get_i64("id").is_err());
    Ok(())
}

#[test]
fn cursor_failure_mid_scan_yields_no_table() {
    let rows = (1..=5).map(|i| vec![Value::Int32(i)]);
    let mut cursor = MemoryCursor::new(vec![ColumnMetadata::new("n", FieldKind::Int32)])
        .rows(rows)
        .fail_after(3);
    let result = ResultTable::from_cursor(&mut cursor);
    assert!(matches!(result, Err(StealthDbError::Driver(_))));
    assert_eq!(cursor.rows_produced(), 3);
}

#[test]
fn binary_columns_stream_in_chunks() -> Result<(), Box<dyn std::error::Error>> {
    let big: Vec<u8> = (0..5000u32).map(|i| (i % 256) as u8).collect();
    let small = vec![1u8, 2, 3];
    let mut cursor = MemoryCursor::new(vec![ColumnMetadata::new("blob", FieldKind::Binary)])
        .row(vec![Value::Binary(big.clone())])
        .row(vec![Value::Binary(small.clone())])
        .row(vec![Value::Binary(Vec::new())])
        .chunk_size(333);
    let table = ResultTable::from_cursor(&mut cursor)?;
    let blobs: Vec<Option<Vec<u8>>> = table
        .iter()
        .map(|record| record.get_bytes(0))
        .collect::<Result<_, _>>()?;
    assert_eq!(blobs, vec![Some(big), Some(small), Some(Vec::new())]);
    Ok(())
}

#[test]
fn display_lists_names_rule_and_rows() -> Result<(), Box<dyn std::error::Error>> {
    let mut empty = MemoryCursor::new(vec![
        ColumnMetadata::new("a", FieldKind::Int32),
        ColumnMetadata::new("b", FieldKind::String),
    ]);
    let table = ResultTable::from_cursor(&mut empty)?;
    let expected = format!("a, b\n{}\n(empty)\n", "~".repeat(25));
    assert_eq!(table.to_string(), expected);

    let mut cursor = MemoryCursor::new(vec![
        ColumnMetadata::new("a", FieldKind::Int32),
        ColumnMetadata::new("b", FieldKind::String),
    ])
    .row(vec![Value::Int32(7), Value::Null]);
    let table = ResultTable::from_cursor(&mut cursor)?;
    assert!(table.to_string().ends_with("7, null\n"));
    Ok(())
}

#[test]
fn tables_are_readable_from_many_threads() -> Result<(), Box<dyn std::error::Error>> {
    let mut cursor = orders_cursor();
    let table = std::sync::Arc::new(ResultTable::from_cursor_in_zone(&mut cursor, zone())?);
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let table = std::sync::Arc::clone(&table);
            std::thread::spawn(move || {
                table
                    .iter()
                    .filter_map(|record| record.get_i64("order_id").ok().flatten())
                    .sum::<i64>()
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().map_err(|_| "reader panicked")?, 3);
    }
    Ok(())
}

#[test]
fn wide_driver_value_for_unsigned_column_is_range_checked() -> Result<(), Box<dyn std::error::Error>> {
    let mut too_wide = MemoryCursor::new(vec![
        ColumnMetadata::new("level", FieldKind::Tiny).unsigned(),
    ])
    .row(vec![Value::Int32(70000)]);
    match ResultTable::from_cursor(&mut too_wide) {
        Err(StealthDbError::DataRange { sql_state, .. }) => {
            assert_eq!(sql_state, SQLSTATE_OUT_OF_RANGE);
        }
        other => panic!("unexpected result: {other:?}"),
    }

    let mut fits = MemoryCursor::new(vec![
        ColumnMetadata::new("level", FieldKind::Tiny).unsigned(),
        ColumnMetadata::new("hits", FieldKind::Int32).unsigned(),
    ])
    .row(vec![Value::Int64(250), Value::Text("4000000000".into())]);
    let table = ResultTable::from_cursor(&mut fits)?;
    let record = table.record(0).ok_or("missing record")?;
    assert_eq!(record.get_value("level")?, &Value::Small(250));
    assert_eq!(record.get_value("hits")?, &Value::Int64(4_000_000_000));
    Ok(())
}

#[test]
fn other_column_keeps_the_driver_value() -> Result<(), Box<dyn std::error::Error>> {
    let mut cursor = MemoryCursor::new(vec![ColumnMetadata::new("shape", FieldKind::Other)])
        .row(vec![Value::Text("POINT(1 2)".into())])
        .row(vec![Value::Null]);
    let table = ResultTable::from_cursor(&mut cursor)?;
    let first = table.record(0).ok_or("missing record")?;
    assert_eq!(first.get_string("shape")?.as_deref(), Some("POINT(1 2)"));
    assert!(table.record(1).ok_or("missing record")?.is_null("shape")?);
    Ok(())
}

#[test]
fn char_column_keeps_multi_character_text() -> Result<(), Box<dyn std::error::Error>> {
    let mut cursor = MemoryCursor::new(vec![ColumnMetadata::new("code", FieldKind::Char)])
        .row(vec![Value::Text("ABC".into())])
        .row(vec![Value::Text("Z".into())]);
    let table = ResultTable::from_cursor(&mut cursor)?;
    let first = table.record(0).ok_or("missing record")?;
    assert_eq!(first.get_string("code")?.as_deref(), Some("ABC"));
    assert_eq!(first.get_char("code")?, Some('A'));
    let second = table.record(1).ok_or("missing record")?;
    assert_eq!(second.get_value("code")?, &Value::Char('Z'));
    Ok(())
}
