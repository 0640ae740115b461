use srcom_dump::fetcher::page::{link_offset, Page};
use srcom_dump::fetcher::FetcherError;

const BODY: &str = r#"{
    "data": [{"id": "z13x8o4y", "times": {"primary_t": 1204}}],
    "pagination": {
        "offset": 200,
        "max": 200,
        "size": 1,
        "links": [
            {"rel": "prev", "uri": "https://www.speedrun.com/api/v1/runs?category=x&offset=0"},
            {"rel": "next", "uri": "https://www.speedrun.com/api/v1/runs?category=x&offset=400"}
        ]
    }
}"#;

#[test]
fn test_parse_page() {
    let page = Page::parse(BODY.as_bytes()).unwrap();

    assert_eq!(page.records.len(), 1);
    assert_eq!(page.records[0]["id"], "z13x8o4y");
    assert_eq!(page.pagination.offset, 200);
    assert!(page.is_last());
    assert_eq!(
        page.next_link(),
        Some("https://www.speedrun.com/api/v1/runs?category=x&offset=400")
    );
}

#[test]
fn test_record_key_order_is_preserved() {
    let page = Page::parse(br#"{"data": [{"z": 1, "a": 2, "id": "x"}], "pagination": {"max": 1, "size": 1}}"#)
        .unwrap();
    let keys: Vec<&String> = page.records[0].as_object().unwrap().keys().collect();
    assert_eq!(keys, vec!["z", "a", "id"]);
    assert!(!page.is_last());
    assert!(page.next_link().is_none());
}

#[test]
fn test_rejects_non_page_bodies() {
    for body in ["", "[]", "{\"data\": []}", "<html></html>"] {
        assert!(
            matches!(Page::parse(body.as_bytes()), Err(FetcherError::ParseError(_))),
            "{body:?}"
        );
    }
}

#[test]
fn test_link_offset() {
    assert_eq!(link_offset("https://a.test/runs?max=200&offset=9800"), Some(9800));
    assert_eq!(link_offset("https://a.test/runs?max=200"), None);
    assert_eq!(link_offset("https://a.test/runs?offset=abc"), None);
    assert_eq!(link_offset("not a url"), None);
}
