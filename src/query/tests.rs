use super::*;
use crate::storage::Row;

fn row(pairs: &[(&str, &str)]) -> Row {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

fn names(rows: &[Row]) -> Vec<&str> { rows.iter().map(|r| r.get("name").map(String::as_str).unwrap_or("")).collect() }

fn scored() -> Vec<Row> {
    vec![
        row(&[("name", "Zebra"), ("score", "90"), ("joined", "2024-03-01T10:00:00Z")]),
        row(&[("name", "Alpha"), ("score", "80"), ("joined", "2024-01-15")]),
        row(&[("name", "Beta"), ("score", "85.5"), ("joined", "2023-12-31T23:59:59+00:00")]),
        row(&[("name", "gamma"), ("score", "n/a"), ("joined", "not a date")]),
    ]
}

fn filtered(op: Operator, field: &str, value: &str) -> Vec<Row> {
    apply_field_filter(scored(), &FilterSpec::new(field, op, value))
}

#[test]
fn string_operators() {
    assert_eq!(names(&filtered(Operator::Eq, "name", "Alpha")), vec!["Alpha"]);
    assert!(filtered(Operator::Eq, "name", "alpha").is_empty());
    assert_eq!(filtered(Operator::Ne, "name", "Alpha").len(), 3);
    assert_eq!(names(&filtered(Operator::Contains, "name", "ET")), vec!["Beta"]);
    assert_eq!(filtered(Operator::NotContains, "name", "a").len(), 0);
    assert_eq!(names(&filtered(Operator::StartsWith, "name", "G")), vec!["gamma"]);
    assert_eq!(names(&filtered(Operator::EndsWith, "name", "RA")), vec!["Zebra"]);
}

#[test]
fn missing_field_is_empty_string() {
    assert_eq!(filtered(Operator::Eq, "nickname", "").len(), 4);
    assert_eq!(filtered(Operator::NotContains, "nickname", "x").len(), 4);
    assert!(filtered(Operator::Gt, "nickname", "0").is_empty());
    assert!(filtered(Operator::DateAfter, "nickname", "2000-01-01").is_empty());
}

#[test]
fn regex_is_case_insensitive_and_malformed_matches_nothing() {
    assert_eq!(names(&filtered(Operator::Regex, "name", "^(alpha|beta)$")), vec!["Alpha", "Beta"]);
    assert_eq!(names(&filtered(Operator::Regex, "name", "mm")), vec!["gamma"]);
    assert!(filtered(Operator::Regex, "name", "(unclosed").is_empty());
}

#[test]
fn numeric_operators_skip_unparseable_cells() {
    assert_eq!(names(&filtered(Operator::Gt, "score", "80")), vec!["Zebra", "Beta"]);
    assert_eq!(filtered(Operator::Gte, "score", "80").len(), 3);
    assert_eq!(names(&filtered(Operator::Lt, "score", "85.5")), vec!["Alpha"]);
    assert_eq!(filtered(Operator::Lte, "score", " 85.5 ").len(), 2);
    assert!(filtered(Operator::Gt, "score", "eighty").is_empty());
}

#[test]
fn gt_and_lte_partition_parseable_rows() {
    for bound in ["0", "80", "85", "85.5", "100"] {
        let above = filtered(Operator::Gt, "score", bound).len();
        let at_or_below = filtered(Operator::Lte, "score", bound).len();
        // "n/a" parses on neither side
        assert_eq!(above + at_or_below, 3, "bound {}", bound);
    }
}

#[test]
fn membership_operators_trim_list_items() {
    assert_eq!(names(&filtered(Operator::In, "name", "Alpha, Beta ,Nope")), vec!["Alpha", "Beta"]);
    assert_eq!(names(&filtered(Operator::NotIn, "name", "Alpha,Beta")), vec!["Zebra", "gamma"]);
    assert!(filtered(Operator::In, "name", "alpha").is_empty());
}

#[test]
fn date_operators() {
    assert_eq!(names(&filtered(Operator::DateAfter, "joined", "2024-01-01T00:00:00Z")), vec!["Zebra", "Alpha"]);
    assert_eq!(names(&filtered(Operator::DateBefore, "joined", "2024-01-01")), vec!["Beta"]);
    assert_eq!(names(&filtered(Operator::DateBetween, "joined", "2024-01-15, 2024-03-01T10:00:00Z")), vec!["Zebra", "Alpha"]);
    assert!(filtered(Operator::DateBetween, "joined", "2024-01-01").is_empty());
    assert!(filtered(Operator::DateBetween, "joined", "a,b").is_empty());
    assert!(filtered(Operator::DateBetween, "joined", "2020-01-01,2021-01-01,2022-01-01").is_empty());
    assert!(filtered(Operator::DateAfter, "joined", "yesterday").is_empty());
}

#[test]
fn timestamp_forms() {
    let z = parse_timestamp("2024-05-01T12:00:00Z").unwrap();
    assert_eq!(parse_timestamp("2024-05-01T14:00:00+02:00"), Some(z));
    assert_eq!(parse_timestamp("2024-05-01 12:00:00"), Some(z));
    assert_eq!(parse_timestamp("2024-05-01T12:00"), Some(z));
    assert!(parse_timestamp("2024-05-01T12:00:00.250Z").unwrap() > z);
    assert_eq!(parse_timestamp("2024-05-01").unwrap().to_rfc3339(), "2024-05-01T00:00:00+00:00");
    assert!(parse_timestamp("").is_none());
    assert!(parse_timestamp("05/01/2024").is_none());
}

#[test]
fn operator_names_round_trip_and_unknown_is_rejected() {
    for op in Operator::ALL {
        assert_eq!(op.as_str().parse::<Operator>().unwrap(), op);
    }
    let err = "like".parse::<Operator>().unwrap_err();
    assert_eq!(err.code_str(), "invalid_operator");
    assert_eq!(err.http_status(), 422);
    assert!(err.details()[0].contains("date_between"));
}

#[test]
fn search_runs_across_all_cells() {
    let rows = apply_search(scored(), "ZEB");
    assert_eq!(names(&rows), vec!["Zebra"]);
    assert_eq!(apply_search(scored(), "2024").len(), 2);
    assert!(matches_search(&row(&[("a", "Hello")]), "ell"));
}

#[test]
fn sort_is_stable_in_both_directions() {
    let mut rows = vec![
        row(&[("name", "b"), ("k", "1")]),
        row(&[("name", "a"), ("k", "2")]),
        row(&[("name", "b"), ("k", "3")]),
        row(&[("k", "4")]),
    ];
    sort_rows(&mut rows, "name", SortOrder::Asc);
    let ks: Vec<&str> = rows.iter().map(|r| r["k"].as_str()).collect();
    assert_eq!(ks, vec!["4", "2", "1", "3"]);
    sort_rows(&mut rows, "name", SortOrder::Desc);
    let ks: Vec<&str> = rows.iter().map(|r| r["k"].as_str()).collect();
    assert_eq!(ks, vec!["1", "3", "2", "4"]);
}

#[test]
fn pipeline_sorts_names() {
    let rows = vec![row(&[("name", "Zebra")]), row(&[("name", "Alpha")]), row(&[("name", "Beta")])];
    let q = RowQuery { sort_by: Some("name".into()), ..RowQuery::default() };
    let page = run_query(Table::new(vec!["name".into()], rows), &q, &LinkBase::new("/datasets/t/rows", None));
    assert_eq!(page.total, 3);
    assert_eq!(names(&page.rows.rows), vec!["Alpha", "Beta", "Zebra"]);
}

#[test]
fn pipeline_filters_before_total_and_search_before_filter() {
    let q = RowQuery {
        search: Some("a".into()),
        filter: Some(FilterSpec::new("score", Operator::Gt, "80")),
        limit: 1,
        ..RowQuery::default()
    };
    let (total, page) = select(scored(), &q);
    assert_eq!(total, 2);
    assert_eq!(names(&page), vec!["Zebra"]);
}

#[test]
fn page_size_and_links_hold_for_every_window() {
    let base = LinkBase::new("/datasets/t/rows", Some("search=x"));
    for total in [0usize, 1, 5, 10, 11] {
        let rows: Vec<Row> = (0..total).map(|i| row(&[("name", format!("r{:02}", i).as_str())])).collect();
        for limit in [1usize, 3, 5, 10] {
            for offset in [0usize, 1, 4, 5, 10, 12] {
                let q = RowQuery { limit, offset, ..RowQuery::default() };
                let (t, page) = select(rows.clone(), &q);
                assert_eq!(t, total);
                assert_eq!(page.len(), limit.min(total.saturating_sub(offset)));
                let links = build_links(&base, total, limit, offset);
                assert_eq!(links.first.is_some(), total > 0);
                assert_eq!(links.last.is_some(), total > limit);
                assert_eq!(links.next.is_some(), offset + limit < total);
                assert_eq!(links.prev.is_some(), offset > 0);
            }
        }
    }
}

#[test]
fn links_preserve_other_parameters() {
    let base = LinkBase::new("/datasets/agents/rows", Some("offset=20&field=role&operator=eq&value=a+b%26c&limit=10"));
    let links = build_links(&base, 45, 10, 20);
    assert_eq!(links.first.as_deref(), Some("/datasets/agents/rows?field=role&operator=eq&value=a%20b%26c&limit=10&offset=0"));
    assert_eq!(links.last.as_deref(), Some("/datasets/agents/rows?field=role&operator=eq&value=a%20b%26c&limit=10&offset=40"));
    assert_eq!(links.next.as_deref(), Some("/datasets/agents/rows?field=role&operator=eq&value=a%20b%26c&limit=10&offset=30"));
    assert_eq!(links.prev.as_deref(), Some("/datasets/agents/rows?field=role&operator=eq&value=a%20b%26c&limit=10&offset=10"));

    let bare = build_links(&LinkBase::new("/datasets/x/rows", None), 3, 2, 0);
    assert_eq!(bare.first.as_deref(), Some("/datasets/x/rows?limit=2&offset=0"));
    assert_eq!(bare.last.as_deref(), Some("/datasets/x/rows?limit=2&offset=2"));
    assert!(bare.prev.is_none());
}

#[test]
fn params_are_validated() {
    let q = RowQuery::from_params(QueryParams::default(), 100, 10_000).unwrap();
    assert_eq!(q, RowQuery::default());

    let p = QueryParams { limit: Some(0), ..Default::default() };
    assert_eq!(RowQuery::from_params(p, 100, 10_000).unwrap_err().code_str(), "invalid_limit");
    let p = QueryParams { limit: Some(10_001), ..Default::default() };
    assert_eq!(RowQuery::from_params(p, 100, 10_000).unwrap_err().code_str(), "invalid_limit");
    let p = QueryParams { offset: Some(-1), ..Default::default() };
    assert_eq!(RowQuery::from_params(p, 100, 10_000).unwrap_err().code_str(), "invalid_offset");
    let p = QueryParams { sort_order: Some("sideways".into()), ..Default::default() };
    assert_eq!(RowQuery::from_params(p, 100, 10_000).unwrap_err().code_str(), "invalid_sort_order");
    let p = QueryParams { operator: Some("like".into()), ..Default::default() };
    assert_eq!(RowQuery::from_params(p, 100, 10_000).unwrap_err().code_str(), "invalid_operator");
}

#[test]
fn filter_needs_all_three_parts() {
    let p = QueryParams { field: Some("score".into()), operator: Some("gt".into()), ..Default::default() };
    assert!(RowQuery::from_params(p, 100, 10_000).unwrap().filter.is_none());
    let p = QueryParams { field: Some("score".into()), operator: Some("gt".into()), value: Some("80".into()), search: Some(String::new()), ..Default::default() };
    let q = RowQuery::from_params(p, 100, 10_000).unwrap();
    assert_eq!(q.filter, Some(FilterSpec::new("score", Operator::Gt, "80")));
    assert!(q.search.is_none());
}
