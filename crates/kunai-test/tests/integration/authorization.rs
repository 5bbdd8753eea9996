#![allow(clippy::unused_async, unused_must_use)]
//! Tests for path-based authorization through the full router.

use salvo::http::StatusCode;

use super::helpers::*;

fn config(policy: &str, rules: &str) -> String {
    format!("auth:\n  method: local\nserver:\n  access_mode: {policy}\n{USERS_YAML}{rules}")
}

const LAYERED_RULES: &str = "\
rules:
  list:
    - path: /docs
      access_mode: read
      groups: [staff]
    - path: /docs/alice
      access_mode: write
      users: [alice]
    - path: '^/drop/[^/]+\\.txt$'
      match: regex
      access_mode: write
      users: [bob]
";

fn tree() -> FakeFiles {
    FakeFiles::new(&["/docs", "/docs/alice"], &[("/a.txt", "A"), ("/docs/readme", "R")])
}

/// ## Summary
/// Under a read policy reads pass and writes are forbidden without a rule.
#[test_log::test(tokio::test)]
async fn read_policy_allows_get_and_forbids_put() {
    let (service, files) = fake_service(&config("read", ""), tree());

    TestRequest::get("/a.txt")
        .basic_auth("bob", "bob-pw")
        .send(&service)
        .await
        .assert_status(StatusCode::OK)
        .assert_body_contains("A");

    TestRequest::put("/a.txt")
        .basic_auth("bob", "bob-pw")
        .body("changed")
        .send(&service)
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let seen = files.seen();
    assert_eq!(seen.len(), 1, "forbidden request must not reach the tree");
    assert_eq!(seen[0].method, "GET");
}

/// ## Summary
/// PROPFIND counts as a read; MKCOL and DELETE are writes.
#[test_log::test(tokio::test)]
async fn dav_methods_are_classified() {
    let (service, files) = fake_service(&config("read", ""), tree());

    TestRequest::propfind("/docs")
        .basic_auth("bob", "bob-pw")
        .depth("0")
        .send(&service)
        .await
        .assert_status(StatusCode::MULTI_STATUS);
    TestRequest::mkcol("/docs/new")
        .basic_auth("bob", "bob-pw")
        .send(&service)
        .await
        .assert_status(StatusCode::FORBIDDEN);
    TestRequest::delete("/docs/readme")
        .basic_auth("bob", "bob-pw")
        .send(&service)
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let methods: Vec<String> = files.seen().into_iter().map(|s| s.method).collect();
    assert_eq!(methods, vec!["PROPFIND"]);
}

/// ## Summary
/// A write policy lets every method through.
#[test_log::test(tokio::test)]
async fn write_policy_allows_everything() {
    let (service, _files) = fake_service(&config("write", ""), tree());

    TestRequest::put("/anything/new.txt")
        .basic_auth("bob", "bob-pw")
        .body("x")
        .send(&service)
        .await
        .assert_status(StatusCode::CREATED);
}

/// ## Summary
/// With no policy floor and no matching rule every request is denied.
#[test_log::test(tokio::test)]
async fn none_policy_denies_without_rule() {
    let (service, files) = fake_service(&config("none", LAYERED_RULES), tree());

    TestRequest::get("/a.txt")
        .basic_auth("bob", "bob-pw")
        .send(&service)
        .await
        .assert_status(StatusCode::FORBIDDEN);

    assert!(files.seen().is_empty());
}

/// ## Summary
/// A narrow user write rule composes with a broad group read rule.
#[test_log::test(tokio::test)]
async fn group_read_and_user_write_rules_layer() {
    let (service, _files) = fake_service(&config("none", LAYERED_RULES), tree());

    TestRequest::get("/docs/readme")
        .basic_auth("alice", "alice-pw")
        .send(&service)
        .await
        .assert_status(StatusCode::OK);

    TestRequest::put("/docs/alice/notes.md")
        .basic_auth("alice", "alice-pw")
        .body("notes")
        .send(&service)
        .await
        .assert_status(StatusCode::CREATED);

    TestRequest::put("/docs/readme")
        .basic_auth("alice", "alice-pw")
        .body("nope")
        .send(&service)
        .await
        .assert_status(StatusCode::FORBIDDEN);

    TestRequest::get("/docs/readme")
        .basic_auth("bob", "bob-pw")
        .send(&service)
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

/// ## Summary
/// Regex rules are matched against the whole decoded path.
#[test_log::test(tokio::test)]
async fn regex_rule_grants_matching_paths_only() {
    let (service, _files) = fake_service(&config("none", LAYERED_RULES), tree());

    TestRequest::put("/drop/report.txt")
        .basic_auth("bob", "bob-pw")
        .body("r")
        .send(&service)
        .await
        .assert_status(StatusCode::CREATED);

    TestRequest::put("/drop/nested/report.txt")
        .basic_auth("bob", "bob-pw")
        .body("r")
        .send(&service)
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

/// ## Summary
/// Rules see the percent-decoded path.
#[test_log::test(tokio::test)]
async fn rules_match_decoded_paths() {
    let rules = "rules:\n  list:\n    - path: /shared docs\n      users: [bob]\n";
    let (service, _files) = fake_service(
        &config("none", rules),
        FakeFiles::new(&[], &[("/shared%20docs/a.txt", "S")]),
    );

    TestRequest::get("/shared%20docs/a.txt")
        .basic_auth("bob", "bob-pw")
        .send(&service)
        .await
        .assert_status(StatusCode::OK);
}

/// ## Summary
/// Under last-match precedence the newest matching rule decides.
#[test_log::test(tokio::test)]
async fn last_match_precedence_is_configurable() {
    let rules = "\
rules:
  precedence: last_match
  list:
    - path: /docs
      access_mode: write
      users: [alice]
    - path: /docs
      access_mode: read
      groups: [staff]
";
    let (service, _files) = fake_service(&config("none", rules), tree());

    TestRequest::put("/docs/readme")
        .basic_auth("alice", "alice-pw")
        .body("x")
        .send(&service)
        .await
        .assert_status(StatusCode::FORBIDDEN);

    TestRequest::get("/docs/readme")
        .basic_auth("alice", "alice-pw")
        .send(&service)
        .await
        .assert_status(StatusCode::OK);
}
