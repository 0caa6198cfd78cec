//! End-to-end tests for the `grid` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const ROWS: &str = r#"[
  {"id": "t1", "name": "resnet-a", "status": "completed", "tags": ["gpu"]},
  {"id": "t2", "name": "resnet-b", "status": "failed", "tags": ["gpu", "nightly"]},
  {"id": "t3", "name": "bert", "status": "running", "tags": []}
]"#;

const COLUMNS: &str = r#"
- id: name
  header: Name
  path: name
  sortable: true
  global_search: true
- id: status
  header: Status
  path: status
  sortable: true
  filter: enum
- id: tags
  header: Tags
  path: tags
  filter: enum
"#;

fn grid() -> Command {
    Command::cargo_bin("grid").unwrap()
}

fn write_fixtures(tmp: &TempDir) -> (String, String) {
    let rows = tmp.path().join("rows.json");
    let columns = tmp.path().join("columns.yaml");
    std::fs::write(&rows, ROWS).unwrap();
    std::fs::write(&columns, COLUMNS).unwrap();
    (
        rows.to_string_lossy().to_string(),
        columns.to_string_lossy().to_string(),
    )
}

#[test]
fn test_normalize_sorts_filter_values() {
    grid()
        .args(["normalize", "size=20&order=name:asc&filter.status=failed&filter.status=completed"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "filter.status=completed&filter.status=failed&order=name%3Aasc&page=0&size=20",
        ));
}

#[test]
fn test_normalize_rejects_bad_direction() {
    grid()
        .args(["normalize", "order=name:sideways"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid query string"));
}

#[test]
fn test_show_filters_and_sorts() {
    let tmp = TempDir::new().unwrap();
    let (rows, columns) = write_fixtures(&tmp);

    grid()
        .args([
            "show",
            &rows,
            "--columns",
            &columns,
            "--query",
            "filter.tags=gpu&order=name:desc",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("resnet-b"))
        .stdout(predicate::str::contains("resnet-a"))
        .stdout(predicate::str::contains("bert").not())
        .stdout(predicate::str::contains("Page 1/1 (2 rows)"))
        .stdout(predicate::str::contains("where tags IN (gpu)"))
        .stdout(predicate::str::contains("order by name desc"));
}

#[test]
fn test_show_rejects_unsortable_column() {
    let tmp = TempDir::new().unwrap();
    let (rows, columns) = write_fixtures(&tmp);

    grid()
        .args(["show", &rows, "--columns", &columns, "--query", "order=tags:asc"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not sortable"));
}

#[test]
fn test_show_infers_columns() {
    let tmp = TempDir::new().unwrap();
    let (rows, _) = write_fixtures(&tmp);

    grid()
        .args(["show", &rows, "--query", "q=bert"])
        .assert()
        .success()
        .stdout(predicate::str::contains("bert"))
        .stdout(predicate::str::contains("Page 1/1 (1 rows)"));
}
