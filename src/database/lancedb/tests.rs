use super::*;

#[test]
fn schema_has_fixed_size_vector() {
    let schema = chunk_schema(8);
    let field = schema
        .field_with_name(VECTOR_COLUMN)
        .expect("vector column exists");

    assert!(matches!(field.data_type(), DataType::FixedSizeList(_, 8)));
    assert!(schema.field_with_name("metadata").is_ok());
    assert_eq!(schema.fields().len(), 7);
}

#[test]
fn literals_are_escaped() {
    assert_eq!(quote_literal("abc"), "'abc'");
    assert_eq!(quote_literal("o'brien"), "'o''brien'");
}

#[test]
fn document_id_is_pushed_down() {
    let filter = MetadataFilter::for_document("doc-1");
    assert_eq!(
        pushdown_predicate(Some(&filter)).as_deref(),
        Some("document_id = 'doc-1'")
    );
    assert!(!needs_residual_filter(Some(&filter)));

    let wider = filter.with("source", "file_upload");
    assert!(pushdown_predicate(Some(&wider)).is_some());
    assert!(needs_residual_filter(Some(&wider)));

    let numeric = MetadataFilter::new().with("document_id", 5_i64);
    assert!(pushdown_predicate(Some(&numeric)).is_none());
    assert!(needs_residual_filter(Some(&numeric)));

    assert!(pushdown_predicate(None).is_none());
    assert!(!needs_residual_filter(None));
}

#[test]
fn id_list() {
    let ids = vec!["a:0".to_string(), "a:1".to_string()];
    assert_eq!(id_list_predicate(&ids), "id IN ('a:0', 'a:1')");
}
