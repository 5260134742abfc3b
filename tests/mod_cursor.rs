use std::sync::Arc;

use serde_json::json;

use docwire::query::{Operator, Order, SortSpec};
use docwire::{Constraint, Error, JsonMap, MemoryExecutor, PageCursor, PageExecutor};

fn row(id: &str, plays: i64) -> JsonMap {
    let serde_json::Value::Object(m) = json!({"objectId": id, "plays": plays}) else {
        unreachable!()
    };
    m
}

// Duplicate play counts on purpose: the identifier tie-break is what keeps
// these rows from being skipped or visited twice.
fn dataset() -> Vec<JsonMap> {
    vec![
        row("o03", 10),
        row("o01", 10),
        row("o05", 7),
        row("o02", 10),
        row("o04", 3),
        row("o06", 7),
    ]
}

fn executor() -> Arc<dyn PageExecutor> {
    Arc::new(MemoryExecutor::new(dataset()))
}

fn cursor(page_size: usize, order: Order) -> PageCursor {
    PageCursor::new(
        executor(),
        "Song",
        Vec::new(),
        page_size,
        Some(SortSpec { field: "plays".into(), order }),
    )
    .unwrap()
}

fn ids(cur: &mut PageCursor) -> Vec<String> {
    let mut out = Vec::new();
    for page in cur.pages() {
        for r in page.unwrap() {
            out.push(r["objectId"].as_str().unwrap().to_owned());
        }
    }
    out
}

const ASC_ORDER: [&str; 6] = ["o04", "o05", "o06", "o01", "o02", "o03"];

#[test]
fn visits_every_row_once_in_order_for_any_page_size() {
    for page_size in 1..=7 {
        let mut cur = cursor(page_size, Order::Asc);
        assert_eq!(ids(&mut cur), ASC_ORDER.to_vec(), "page size {page_size}");
        assert_eq!(cur.items_fetched(), 6);
        assert!(cur.is_exhausted());
    }
}

#[test]
fn descending_order_reverses_traversal() {
    // Within equal play counts the identifier follows the scan direction
    // too, so the descending traversal is the exact reverse of ascending.
    let mut cur = cursor(2, Order::Desc);
    let expected: Vec<String> = ASC_ORDER.iter().rev().map(|s| (*s).to_owned()).collect();
    assert_eq!(ids(&mut cur), expected);
}

#[test]
fn empty_dataset_yields_zero_pages() {
    let mut cur = PageCursor::new(
        Arc::new(MemoryExecutor::new(Vec::new())),
        "Song",
        Vec::new(),
        3,
        None,
    )
    .unwrap();
    assert_eq!(cur.pages().count(), 0);
    assert!(cur.is_exhausted());
    assert_eq!(cur.items_fetched(), 0);
}

#[test]
fn full_final_page_triggers_one_extra_fetch() {
    // 6 rows, page size 6: one full page, then one empty confirming fetch.
    let mut cur = cursor(6, Order::Asc);
    let pages: Vec<_> = cur.pages().map(Result::unwrap).collect();
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].len(), 6);
    assert_eq!(cur.pages_fetched(), 2, "a full page does not prove exhaustion");
}

#[test]
fn short_page_detects_exhaustion_without_extra_fetch() {
    let mut cur = cursor(10, Order::Asc);
    let pages: Vec<_> = cur.pages().map(Result::unwrap).collect();
    assert_eq!(pages.len(), 1);
    assert_eq!(cur.pages_fetched(), 1);
    assert!(cur.is_exhausted());
}

#[test]
fn re_iterating_after_exhaustion_is_empty_not_an_error() {
    let mut cur = cursor(2, Order::Asc);
    assert_eq!(ids(&mut cur), ASC_ORDER.to_vec());
    assert_eq!(cur.pages().count(), 0);
    assert_eq!(cur.next_page().unwrap(), Vec::<JsonMap>::new());
}

#[test]
fn reset_restores_initial_traversal() {
    let mut cur = cursor(4, Order::Asc);
    assert_eq!(ids(&mut cur), ASC_ORDER.to_vec());
    cur.reset();
    assert!(!cur.is_exhausted());
    assert_eq!(cur.pages_fetched(), 0);
    assert_eq!(cur.items_fetched(), 0);
    assert_eq!(ids(&mut cur), ASC_ORDER.to_vec());
}

#[test]
fn items_flattens_pages() {
    let mut cur = cursor(4, Order::Asc);
    let items: Vec<JsonMap> = cur.items().map(Result::unwrap).collect();
    assert_eq!(items.len(), 6);
    assert_eq!(items[0]["objectId"], "o04");
}

#[test]
fn serialize_round_trip_resumes_identically() {
    let exec = executor();
    let mut original =
        PageCursor::new(
            exec.clone(),
            "Song",
            Vec::new(),
            2,
            Some(SortSpec { field: "plays".into(), order: Order::Asc }),
        )
        .unwrap();
    let first = original.next_page().unwrap();
    assert_eq!(first.len(), 2);

    let frozen = original.serialize().unwrap();
    let mut restored = PageCursor::deserialize(&frozen, exec).unwrap();

    let continued = original.next_page().unwrap();
    let resumed = restored.next_page().unwrap();
    assert_eq!(continued, resumed, "restored cursor must produce the same next page");
    assert_eq!(restored.pages_fetched(), original.pages_fetched());
}

#[test]
fn serialized_state_survives_base_constraints() {
    let exec = executor();
    let constraints = vec![Constraint::new("plays", Operator::Gte, 7i64)];
    let mut cur = PageCursor::new(
        exec.clone(),
        "Song",
        constraints,
        2,
        Some(SortSpec { field: "plays".into(), order: Order::Asc }),
    )
    .unwrap();
    let first = cur.next_page().unwrap();
    assert_eq!(first.len(), 2);
    let frozen = cur.serialize().unwrap();
    let mut restored = PageCursor::deserialize(&frozen, exec).unwrap();
    let rest: Vec<String> = restored
        .items()
        .map(|r| r.unwrap()["objectId"].as_str().unwrap().to_owned())
        .collect();
    assert_eq!(rest, vec!["o01".to_owned(), "o02".to_owned(), "o03".to_owned()]);
}

#[test]
fn base_constraints_filter_rows() {
    let constraints = vec![Constraint::new("plays", Operator::Lt, 10i64)];
    let mut cur = PageCursor::new(
        executor(),
        "Song",
        constraints,
        2,
        Some(SortSpec { field: "plays".into(), order: Order::Asc }),
    )
    .unwrap();
    assert_eq!(ids(&mut cur), vec!["o04".to_owned(), "o05".to_owned(), "o06".to_owned()]);
}

#[test]
fn page_size_above_limit_is_an_error_not_a_truncation() {
    let err = PageCursor::new(executor(), "Song", Vec::new(), 1001, None).unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[test]
fn page_size_zero_clamps_to_one() {
    let cur = PageCursor::new(executor(), "Song", Vec::new(), 0, None).unwrap();
    assert_eq!(cur.page_size(), 1);
}

#[test]
fn order_spec_appends_identifier_tie_break() {
    let cur = cursor(3, Order::Desc);
    assert_eq!(
        cur.order_spec(),
        vec![
            SortSpec { field: "plays".into(), order: Order::Desc },
            SortSpec { field: "objectId".into(), order: Order::Desc },
        ]
    );

    let by_id = PageCursor::new(
        executor(),
        "Song",
        Vec::new(),
        3,
        Some(SortSpec { field: "object_id".into(), order: Order::Asc }),
    )
    .unwrap();
    assert_eq!(
        by_id.order_spec(),
        vec![SortSpec { field: "objectId".into(), order: Order::Asc }]
    );
}

#[test]
fn identifier_ordering_uses_plain_tie_break() {
    let mut cur = PageCursor::new(
        executor(),
        "Song",
        Vec::new(),
        2,
        Some(SortSpec { field: "object_id".into(), order: Order::Asc }),
    )
    .unwrap();
    assert_eq!(
        ids(&mut cur),
        vec!["o01", "o02", "o03", "o04", "o05", "o06"]
            .into_iter()
            .map(str::to_owned)
            .collect::<Vec<_>>()
    );
}
