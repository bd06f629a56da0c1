use revdex_core::persist::{load_all, load_result, save_all, save_query_result, IndexPaths};
use revdex_core::refine::Refiner;
use revdex_core::{build, verify_consistency, Combinator, Error, Lexicon, Polarity, Query, ResultSet, Review};
use std::fs;
use tempfile::tempdir;

fn corpus() -> Vec<Review> {
    vec![
        Review::new(0, "wifi is great", Some(5)),
        Review::new(1, "audio poor quality", Some(2)),
        Review::new(2, "gps map is useful", Some(4)),
        Review::new(3, "screen cracked", Some(1)),
    ]
}

#[test]
fn four_review_walkthrough() {
    let (index, metadata) = build(corpus()).unwrap();
    assert_eq!(index.get("gps"), &[2]);
    assert_eq!(index.get("map"), &[2]);
    assert_eq!(index.get("useful"), &[2]);

    let strict = Query::parse("gps", "map", "useful", "method2").unwrap().execute(&index);
    assert_eq!(strict.to_vec(), vec![2]);

    let lexicon = Lexicon::default();
    let refiner = Refiner::new(&metadata, &lexicon, None);
    let kept = refiner.rating_filter(&strict, Polarity::Positive).unwrap();
    assert_eq!(kept.ids.to_vec(), vec![2]);

    let broad = Query::parse("wifi", "audio", "poor", "method1").unwrap().execute(&index);
    assert_eq!(broad.to_vec(), vec![0, 1]);
}

#[test]
fn mixed_equals_union_then_intersect() {
    let (index, _) = build(vec![
        Review::new(0, "audio quality poor", Some(2)),
        Review::new(1, "audio is fine", Some(4)),
        Review::new(2, "quality is poor", Some(1)),
        Review::new(3, "poor packaging", Some(2)),
        Review::new(4, "audio quality great", Some(5)),
    ])
    .unwrap();
    let a1 = ResultSet::from(index.get("audio"));
    let a2 = ResultSet::from(index.get("quality"));
    let op = ResultSet::from(index.get("poor"));
    let expected = a1.union(&a2).intersection(&op);

    let mixed = Query::new("audio", "quality", "poor", Combinator::Method3).unwrap().execute(&index);
    assert_eq!(mixed, expected);
    assert_eq!(mixed.to_vec(), vec![0, 2]);
}

#[test]
fn persisted_index_answers_identically() {
    let dir = tempdir().unwrap();
    let paths = IndexPaths::new(dir.path());
    let (index, metadata) = build(corpus()).unwrap();
    save_all(&paths, &index, &metadata).unwrap();

    let (reloaded, reloaded_meta) = load_all(&paths).unwrap();
    assert_eq!(reloaded, index);
    assert_eq!(reloaded_meta, metadata);

    for method in Combinator::ALL {
        let q = Query::new("wifi", "map", "is", method).unwrap();
        let before = save_query_result(&paths, &q, &q.execute(&index)).unwrap();
        let bytes_before = fs::read(&before).unwrap();
        let after = save_query_result(&paths, &q, &q.execute(&reloaded)).unwrap();
        assert_eq!(before, after);
        assert_eq!(fs::read(&after).unwrap(), bytes_before);
        assert_eq!(load_result(&paths, &q.artifact_name()).unwrap(), q.execute(&index));
    }
}

#[test]
fn result_file_has_review_index_column() {
    let dir = tempdir().unwrap();
    let paths = IndexPaths::new(dir.path());
    let (index, _) = build(corpus()).unwrap();
    let q = Query::parse("wifi", "audio", "poor", "method1").unwrap();
    let path = save_query_result(&paths, &q, &q.execute(&index)).unwrap();
    assert!(path.ends_with("results/wifi_audio_poor_method1.json"));
    let json: serde_json::Value = serde_json::from_slice(&fs::read(path).unwrap()).unwrap();
    assert_eq!(json, serde_json::json!({ "review_index": [0, 1] }));
}

#[test]
fn deleting_referenced_metadata_breaks_consistency() {
    let (index, mut metadata) = build(corpus()).unwrap();
    metadata.remove(3);
    for _ in 0..3 {
        let err = verify_consistency(&index, &metadata).unwrap_err();
        assert!(matches!(err, Error::ConsistencyViolation(ref m) if m.contains("\"cracked\"")), "{err}");
    }
}

#[test]
fn loading_missing_index_reports_path() {
    let dir = tempdir().unwrap();
    let paths = IndexPaths::new(dir.path().join("nope"));
    match load_all(&paths).unwrap_err() {
        Error::ResourceNotFound(p) => assert!(p.ends_with("meta.json")),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn corrupt_postings_are_malformed() {
    let dir = tempdir().unwrap();
    let paths = IndexPaths::new(dir.path());
    let (index, metadata) = build(corpus()).unwrap();
    save_all(&paths, &index, &metadata).unwrap();
    fs::write(paths.postings(), b"\x01\x02").unwrap();
    assert!(matches!(load_all(&paths).unwrap_err(), Error::MalformedResource { .. }));
}
