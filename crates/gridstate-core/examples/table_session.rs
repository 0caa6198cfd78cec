//! Example of driving a table from Rust: filter, sort, page and persist.

use std::sync::Arc;

use gridstate_core::{
    Column, FilterKind, InMemoryFetcher, PrefsStore, QueryParams, Row, TableConfig,
    TableController, TableDriver,
};
use serde_json::json;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Declare the columns the view shows
    let columns = vec![
        Column::new("name", "Name").sortable().searchable(),
        Column::new("status", "Status")
            .sortable()
            .with_filter(FilterKind::Enum),
        Column::new("loss", "Loss")
            .with_path("last_metrics.loss")
            .sortable(),
    ];

    // 2. Some rows standing in for a backend
    let rows: Vec<Row> = (0..40)
        .map(|i| {
            let status = if i % 3 == 0 { "failed" } else { "completed" };
            Row::new(
                format!("task-{i:02}"),
                json!({"name": format!("run {i}"), "status": status, "last_metrics": {"loss": 1.0 / (i + 1) as f64}}),
            )
        })
        .collect();

    // 3. Mount the table
    let config = TableConfig::new("experiments").with_page_size(10);
    let table = TableController::new(columns.clone(), config)?;
    let mut driver = TableDriver::new(table, Arc::new(InMemoryFetcher::new(rows, &columns)));

    // 4. Interact: filter, sort by loss ascending, go to page 2
    driver.update(|t| t.set_column_filter("status", ["completed"]))?;
    driver.update(|t| t.apply_sort("loss", false))?;
    driver.update(|t| t.apply_sort("loss", false))?;
    driver.update(|t| t.set_page(1))?;
    driver.settle().await?;

    let table = driver.controller();
    for row in table.rows() {
        println!("{:<8} {}", row.id, row.data["last_metrics"]["loss"]);
    }

    // 5. Share the state as a URL and restore it elsewhere
    let qs = table.build_query_parameters().to_query_string();
    println!("?{qs}");
    let restored = QueryParams::from_query_string(&qs, 10)?;
    assert_eq!(restored.page_index(), 1);

    // 6. Save the column layout
    let store = PrefsStore::new(std::env::temp_dir().join("gridstate-prefs.yaml"));
    store.save(&table.column_prefs())?;

    Ok(())
}
