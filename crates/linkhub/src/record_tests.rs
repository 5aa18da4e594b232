// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use proptest::prelude::*;
use serde_json::json;

use super::*;

fn table(page: &RecordPage) -> Option<&Table> {
    match page {
        RecordPage::TableRows(table) => Some(table),
        RecordPage::OpaqueDocument(_) => None,
    }
}

#[test]
fn items_with_properties_become_rows() {
    let page = RecordPage::from_value(json!([
        { "id": "1", "properties": { "firstname": "Ada", "email": "ada@example.com" } },
        { "id": "2", "properties": { "firstname": "Grace", "company": "Navy" } },
    ]));

    let Some(table) = table(&page) else {
        unreachable!("expected table rows, got {page:?}");
    };
    assert_eq!(table.fields, ["firstname", "email", "company"]);
    assert_eq!(table.rows.len(), 2);
    assert_eq!(table.cell(&table.rows[1], "email"), "");
    assert_eq!(table.cell(&table.rows[1], "company"), "Navy");
    assert_eq!(page.len(), 2);
}

#[yare::parameterized(
    object = { json!({ "results": [] }) },
    empty_array = { json!([]) },
    null = { json!(null) },
    plain_items = { json!([{ "id": "1", "name": "a" }]) },
    mixed_items = { json!([{ "properties": { "a": 1 } }, { "id": "2" }]) },
    scalar_properties = { json!([{ "properties": "nope" }]) },
    empty_properties = { json!([{ "properties": {} }, { "properties": {} }]) },
    strings = { json!(["a", "b"]) },
)]
fn other_shapes_stay_opaque(value: Value) {
    let page = RecordPage::from_value(value.clone());
    assert_eq!(page, RecordPage::OpaqueDocument(value));
}

#[yare::parameterized(
    string = { json!("Ada"), "Ada" },
    null = { json!(null), "" },
    number = { json!(42), "42" },
    boolean = { json!(true), "true" },
    array = { json!(["x", 1]), r#"["x",1]"# },
    object = { json!({ "k": "v" }), r#"{"k":"v"}"# },
)]
fn cell_display(value: Value, expected: &str) {
    assert_eq!(display_value(&value), expected);
}

#[test]
fn table_renders_aligned_columns() {
    let page = RecordPage::from_value(json!([
        { "properties": { "name": "Ada", "age": 36 } },
        { "properties": { "name": "Grace" } },
    ]));

    let expected = "\
name  | age
----- | ---
Ada   | 36
Grace |
";
    assert_eq!(page.render(), expected);
}

#[test]
fn opaque_document_renders_pretty_json() {
    let page = RecordPage::from_value(json!({ "object": "list" }));
    assert_eq!(page.render(), "{\n  \"object\": \"list\"\n}");
    assert_eq!(page.len(), 1);
}

#[test]
fn serializes_with_kind_tag() -> anyhow::Result<()> {
    let page = RecordPage::from_value(json!({ "ok": true }));
    let encoded = serde_json::to_value(&page)?;
    assert_eq!(encoded, json!({ "kind": "opaque_document", "data": { "ok": true } }));
    Ok(())
}

fn properties() -> impl Strategy<Value = Vec<(String, i64)>> {
    prop::collection::vec(("[a-e]", any::<i64>()), 1..5)
}

proptest! {
    #[test]
    fn fields_are_the_union_in_first_appearance_order(
        items in prop::collection::vec(properties(), 1..8)
    ) {
        let value = Value::Array(
            items
                .iter()
                .map(|props| {
                    let map: Map<String, Value> =
                        props.iter().map(|(k, v)| (k.clone(), json!(v))).collect();
                    json!({ "properties": map })
                })
                .collect(),
        );

        let mut expected: Vec<String> = Vec::new();
        for props in &items {
            for (key, _) in props {
                if !expected.contains(key) {
                    expected.push(key.clone());
                }
            }
        }

        let page = RecordPage::from_value(value);
        let table = table(&page);
        prop_assert!(table.is_some());
        if let Some(table) = table {
            prop_assert_eq!(&table.fields, &expected);
            prop_assert_eq!(table.rows.len(), items.len());
        }
    }
}
