use serde_json::json;
use sluice_runtime::{evaluate, try_evaluate, EngineConfig, FaultKind, RuntimePool};
use sluice_shared::{Document, FlagSet, RecordValue, ReplicationFlag};

fn pool() -> RuntimePool {
    RuntimePool::new(EngineConfig {
        memory_limit_mb: 32,
        max_stack_size_kb: 512,
        execution_timeout_ms: 500,
    })
}

fn doc(value: serde_json::Value) -> Document {
    Document::from_json(value, "generated").unwrap()
}

type Reference = fn(&Document, FlagSet) -> bool;

fn int_field(doc: &Document, key: &str) -> Option<i64> {
    match doc.fields.get(key) {
        Some(RecordValue::Integer(i)) => Some(*i),
        _ => None,
    }
}

fn str_field<'a>(doc: &'a Document, key: &str) -> Option<&'a str> {
    match doc.fields.get(key) {
        Some(RecordValue::String(s)) => Some(s),
        _ => None,
    }
}

fn is_task(d: &Document, _: FlagSet) -> bool {
    str_field(d, "type") == Some("task")
}

fn high_priority(d: &Document, _: FlagSet) -> bool {
    int_field(d, "priority").is_some_and(|p| p >= 3)
}

fn live_and_synced(d: &Document, f: FlagSet) -> bool {
    !f.deleted()
        && match d.fields.get("tags") {
            Some(RecordValue::List(tags)) => tags.contains(&RecordValue::String("sync".into())),
            _ => false,
        }
}

fn revoked_or_public(d: &Document, f: FlagSet) -> bool {
    f.access_removed() || d.id.starts_with("pub-")
}

#[test]
fn test_matches_reference_predicates() {
    let filters: [(&str, Reference); 4] = [
        ("function (doc) { return doc.type === 'task'; }", is_task),
        (
            "function (doc) { return typeof doc.priority === 'number' && doc.priority >= 3; }",
            high_priority,
        ),
        (
            "function (doc, flags) { return !flags.deleted && Array.isArray(doc.tags) && doc.tags.indexOf('sync') >= 0; }",
            live_and_synced,
        ),
        (
            "(doc, flags) => flags.accessRemoved || doc._id.startsWith('pub-')",
            revoked_or_public,
        ),
    ];

    let types = ["task", "note", "event"];
    let tag_sets: [&[&str]; 3] = [&[], &["sync"], &["local", "sync"]];
    let flag_sets = [
        FlagSet::empty(),
        FlagSet::empty().with(ReplicationFlag::Deleted),
        FlagSet::empty().with(ReplicationFlag::AccessRemoved),
    ];

    let mut pool = pool();
    let mut checked = 0;
    for i in 0..18i64 {
        let id = if i % 3 == 0 {
            format!("pub-{i}")
        } else {
            format!("doc-{i}")
        };
        let document = doc(json!({
            "_id": id,
            "type": types[(i % 3) as usize],
            "priority": i % 5,
            "tags": tag_sets[(i % 3) as usize],
        }));
        for flags in flag_sets {
            for (source, reference) in &filters {
                assert_eq!(
                    evaluate(&mut pool, source, &document, flags),
                    reference(&document, flags),
                    "filter {source} disagrees on {document:?} with {flags:?}"
                );
                checked += 1;
            }
        }
    }
    assert_eq!(checked, 18 * 3 * 4);
}

#[test]
fn test_repeated_evaluation_does_not_leak_handles() {
    let mut pool = pool();
    let document = doc(json!({
        "_id": "d1",
        "tags": ["a", "b", ["nested", {"deep": true}]],
        "nested": {"x": 1, "y": {"z": [1, 2, 3]}}
    }));
    let src = "function (doc) { return doc.nested.y.z.length === 3; }";

    for _ in 0..10_000 {
        assert!(evaluate(&mut pool, src, &document, FlagSet::empty()));
        let runtime = pool.acquire().unwrap();
        assert_eq!(runtime.live_handles(), 0);
    }

    let runtime = pool.acquire().unwrap();
    assert_eq!(runtime.cache().compilations(), 1);
    assert_eq!(pool.generation(), 1);
}

#[test]
fn test_same_inputs_same_result() {
    let mut pool = pool();
    let document = doc(json!({"_id": "d1", "n": 4}));
    let src = "function (doc) { return doc.n * 2 === 8; }";
    let first = evaluate(&mut pool, src, &document, FlagSet::empty());
    let second = evaluate(&mut pool, src, &document, FlagSet::empty());
    assert!(first);
    assert_eq!(first, second);
}

#[test]
fn test_throwing_filter_is_false() {
    let mut pool = pool();
    let document = doc(json!({"_id": "d1"}));
    let src = "function(doc,flags){ throw \"x\"; }";
    assert!(!evaluate(&mut pool, src, &document, FlagSet::empty()));

    // Errors are per call; the cached function stays valid.
    let src = "function (doc) { if (doc.boom) { throw new Error('boom'); } return true; }";
    assert!(!evaluate(&mut pool, src, &doc(json!({"boom": 1})), FlagSet::empty()));
    assert!(evaluate(&mut pool, src, &doc(json!({"boom": 0})), FlagSet::empty()));
    assert_eq!(pool.acquire().unwrap().script_errors(), 2);
}

#[test]
fn test_truthiness() {
    let mut pool = pool();
    let document = doc(json!({"_id": "d1"}));
    let cases = [
        ("function () { return 'yes'; }", true),
        ("function () { return {}; }", true),
        ("function () { return 1; }", true),
        ("function () { return 0; }", false),
        ("function () { return undefined; }", false),
        ("function () { }", false),
        ("function () { return null; }", false),
        ("function () { return ''; }", false),
        ("function () { return NaN; }", false),
    ];
    for (src, expected) in cases {
        assert_eq!(
            evaluate(&mut pool, src, &document, FlagSet::empty()),
            expected,
            "{src}"
        );
    }
}

#[test]
fn test_broken_source_compiled_once() {
    let mut pool = pool();
    let document = doc(json!({"_id": "d1"}));
    let src = "function (doc) { return doc.x === ; ";

    for _ in 0..100 {
        assert!(!evaluate(&mut pool, src, &document, FlagSet::empty()));
    }
    let err = try_evaluate(&mut pool, src, &document, FlagSet::empty()).unwrap_err();
    assert_eq!(err.kind(), FaultKind::Compilation);

    let runtime = pool.acquire().unwrap();
    assert_eq!(runtime.cache().compilations(), 1);
    assert!(runtime.cache().is_fallback(src));
}

#[test]
fn test_marshalled_document_shape() {
    let mut pool = pool();
    let document = doc(json!({"_id": "d1", "tags": ["a", "b"], "nested": {"x": 1}}));
    let flags = FlagSet::empty().with(ReplicationFlag::Deleted);
    let src = r#"function (doc, flags) {
        return doc._id === "d1"
            && Array.isArray(doc.tags) && doc.tags.length === 2
            && doc.nested.x === 1
            && flags.deleted === true
            && flags.accessRemoved === false;
    }"#;
    assert!(try_evaluate(&mut pool, src, &document, flags).unwrap());
}

#[test]
fn test_console_log_does_not_affect_result() {
    let mut pool = pool();
    let document = doc(json!({"_id": "d1"}));
    let src = "function (doc) { console.log('checking', doc._id, 42); return true; }";
    assert!(evaluate(&mut pool, src, &document, FlagSet::empty()));
}

#[test]
fn test_mutating_doc_does_not_leak_between_calls() {
    let mut pool = pool();
    let document = doc(json!({"_id": "d1", "n": 1}));
    let src = "function (doc) { const seen = doc.n === 1; doc.n = 99; return seen; }";
    assert!(evaluate(&mut pool, src, &document, FlagSet::empty()));
    assert!(evaluate(&mut pool, src, &document, FlagSet::empty()));
}

#[test]
fn test_trailing_semicolon_filter_evaluates() {
    let mut pool = pool();
    let document = doc(json!({"_id": "d1", "type": "task"}));
    let src = "function (doc) { return doc.type === 'task'; };\n";
    assert!(try_evaluate(&mut pool, src, &document, FlagSet::empty()).unwrap());
}

#[test]
fn test_document_too_large_for_runtime_degrades_to_stub() {
    let mut pool = RuntimePool::new(EngineConfig {
        memory_limit_mb: 1,
        max_stack_size_kb: 256,
        execution_timeout_ms: 1000,
    });
    let payload: serde_json::Map<String, serde_json::Value> = (0..8000)
        .map(|i| (format!("field{i}"), json!("x".repeat(200))))
        .collect();
    let document = doc(json!({"_id": "big", "payload": payload}));
    let src = "function (doc) { return doc._id === 'big' && Object.keys(doc).length === 1; }";

    assert!(try_evaluate(&mut pool, src, &document, FlagSet::empty()).unwrap());

    // The runtime and its cache survive the failed conversion.
    let runtime = pool.acquire().unwrap();
    assert_eq!(runtime.live_handles(), 0);
    assert_eq!(runtime.cache().compilations(), 1);
    assert_eq!(pool.generation(), 1);

    // A document that fits is still converted in full.
    let small = doc(json!({"_id": "big", "n": 1}));
    assert!(!evaluate(&mut pool, src, &small, FlagSet::empty()));
    assert_eq!(pool.generation(), 1);
}
