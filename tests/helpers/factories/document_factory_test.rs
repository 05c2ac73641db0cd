use crate::test_helpers::factory::Factory;
use serde_json::json;

#[test]
fn document_factory_splits_values_by_kind() {
    let doc = Factory::document()
        .with("country", json!(["us", "ca"]))
        .with("clicks", 4)
        .create();

    assert_eq!(doc.string_fields["country"], vec!["us", "ca"]);
    assert_eq!(doc.int_fields["clicks"], vec![4]);
    assert_eq!(doc.int_fields["unixtime"], vec![1_700_000_000]);
}

#[test]
fn document_factory_create_list_indexes_documents() {
    let docs = Factory::document().without("clicks").create_list(3);

    assert_eq!(docs.len(), 3);
    for (i, doc) in docs.iter().enumerate() {
        assert_eq!(doc.int_fields["index"], vec![i as i64]);
        let clicks = doc.int_fields["clicks"][0];
        assert!((0..10).contains(&clicks));
    }
}
