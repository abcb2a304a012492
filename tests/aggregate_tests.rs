use issuescope::aggregate::{aggregate, dedupe_issues, Aggregator};
use issuescope::extract::IssueCategory;
use issuescope::timestamp::parse_timestamp;

fn item(category: &str, occurrences: u64, last_seen: Option<&str>, samples: &[&str]) -> IssueCategory {
    IssueCategory {
        category: category.to_string(),
        occurrences,
        last_seen: last_seen.map(str::to_string),
        samples: samples.iter().map(|s| s.to_string()).collect(),
    }
}

fn chunks() -> Vec<Vec<IssueCategory>> {
    vec![
        vec![item("Funds not reflected", 3, Some("2025-09-26T10:00:00Z"), &["a", "b"]), item("Login failure", 1, None, &["x"])],
        vec![item("funds not reflected", 5, Some("2025-09-26T12:30:00+02:00"), &["b", "c"])],
        vec![item(" FUNDS NOT REFLECTED", 2, Some("not a time"), &["d", "e"]), item("Login failure", 4, Some("2025-09-25 08:00:00"), &[])],
    ]
}

#[test]
fn totals_do_not_depend_on_chunk_order() {
    let forward = chunks();
    let mut backward = chunks();
    backward.reverse();
    let mut rotated = chunks();
    rotated.rotate_left(1);

    for order in [&forward, &backward, &rotated] {
        let agg = aggregate(order);
        assert_eq!(agg.len(), 2);
        assert_eq!(agg.get("funds not reflected").unwrap().occurrences, 10);
        assert_eq!(agg.get("LOGIN FAILURE").unwrap().occurrences, 5);
    }
}

#[test]
fn samples_stay_bounded_and_unique() {
    let agg = aggregate(&chunks());
    let funds = agg.get("Funds not reflected").unwrap();
    assert!(funds.samples.len() <= 3);
    let mut sorted = funds.samples.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(sorted.len(), funds.samples.len());
}

#[test]
fn last_seen_is_the_chronological_maximum() {
    let agg = aggregate(&chunks());
    // 12:30+02:00 is 10:30Z, later than 10:00Z; the unparseable value is ignored
    let funds = agg.get("Funds not reflected").unwrap();
    assert_eq!(funds.last_seen, parse_timestamp("2025-09-26T10:30:00Z"));

    let login = agg.get("Login failure").unwrap();
    assert_eq!(login.last_seen, parse_timestamp("2025-09-25T08:00:00Z"));
}

#[test]
fn first_seen_spelling_and_order_are_kept() {
    let agg = aggregate(&chunks());
    let names: Vec<&str> = agg.issues().iter().map(|i| i.category.as_str()).collect();
    assert_eq!(names, vec!["Funds not reflected", "Login failure"]);
}

#[test]
fn blank_categories_are_dropped_and_dedupe_rekeys() {
    let mut agg = Aggregator::new();
    agg.ingest(&[item("   ", 7, None, &[])]);
    assert!(agg.is_empty());

    let issues = aggregate(&chunks()).into_issues();
    let mut doubled = issues.clone();
    doubled.extend(issues.iter().cloned());
    let merged = dedupe_issues(&doubled);
    assert_eq!(merged.len(), 2);
    assert_eq!(merged[0].occurrences, 20);
}
