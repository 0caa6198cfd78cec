//! grid CLI: drive the table engine over a JSON row file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Table};
use tracing::info;
use tracing_subscriber::EnvFilter;

use gridstate::{
    Column, FilterKind, InMemoryFetcher, LoadState, PrefsStore, QueryParams, Row, SortDirection,
    TableConfig, TableController, TableDriver,
};

#[derive(Parser)]
#[command(
    name = "grid",
    about = "gridstate: filter, sort and page tabular records",
    version,
    author
)]
struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render one page of a JSON row file
    Show {
        /// JSON file holding an array of records
        rows: PathBuf,
        /// YAML column definitions (default: inferred from the first record)
        #[arg(long, short)]
        columns: Option<PathBuf>,
        /// Dot-path of the row identifier
        #[arg(long, default_value = "id")]
        id_path: String,
        /// URL query string with filter/sort/page state
        #[arg(long, short, default_value = "")]
        query: String,
        /// Column preferences file
        #[arg(long)]
        prefs: Option<PathBuf>,
        /// Table configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print the canonical form of a query string
    Normalize {
        query: String,
        /// Page size assumed when the query has none
        #[arg(long, default_value_t = 50)]
        size: usize,
    },
    /// Show the column layout after applying stored preferences
    Columns {
        /// YAML column definitions
        columns: PathBuf,
        /// Column preferences file
        #[arg(long)]
        prefs: Option<PathBuf>,
        /// Table whose preferences to apply
        #[arg(long, default_value = "table")]
        table: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Commands::Show {
            rows,
            columns,
            id_path,
            query,
            prefs,
            config,
        } => {
            cmd_show(rows, columns, id_path, query, prefs, config).await?;
        }
        Commands::Normalize { query, size } => {
            cmd_normalize(&query, size)?;
        }
        Commands::Columns {
            columns,
            prefs,
            table,
        } => {
            cmd_columns(columns, prefs, table)?;
        }
    }

    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}

// ─── Command implementations ──────────────────────────────────────────────────

async fn cmd_show(
    rows_path: PathBuf,
    columns_path: Option<PathBuf>,
    id_path: String,
    query: String,
    prefs_path: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = match &config_path {
        Some(path) => TableConfig::load(path)?,
        None => TableConfig::default(),
    };
    let rows = load_rows(&rows_path, &id_path)?;
    info!(rows = rows.len(), path = %rows_path.display(), "Loaded rows");
    let columns = match &columns_path {
        Some(path) => load_columns(path)?,
        None => infer_columns(&rows, &id_path),
    };

    let mut table = TableController::new(columns.clone(), config.clone())?;
    if let Some(path) = &prefs_path {
        if let Some(prefs) = PrefsStore::new(path).load(&config.table_id)? {
            table.apply_column_prefs(&prefs);
        }
    }

    let fetcher = Arc::new(InMemoryFetcher::new(rows, &columns));
    let mut driver = TableDriver::new(table, fetcher);
    if query.trim().is_empty() {
        driver.load();
    } else {
        let params = QueryParams::from_query_string(&query, config.default_page_size)
            .context("invalid query string")?;
        driver.update(|t| t.apply_query_params(&params))?;
    }
    driver.settle().await?;

    let table = driver.controller();
    if let LoadState::Error(e) = table.state() {
        anyhow::bail!("Fetch failed: {}", e);
    }

    let visible: Vec<&Column> = table.visible_columns().collect();
    let mut out = Table::new();
    out.load_preset(UTF8_FULL);
    out.set_header(visible.iter().map(|c| header_label(table, c)));
    for row in table.rows() {
        out.add_row(visible.iter().map(|c| row.display(c)));
    }

    let params = table.build_query_parameters();
    let page = table.page();
    println!("{}", out);
    println!(
        "Page {}/{} ({} rows)",
        page.index + 1,
        page.page_count().unwrap_or(1),
        page.total.unwrap_or(table.rows().len())
    );
    for clause in params.filter_clauses() {
        println!("  where {}", clause);
    }
    if let Some(q) = &params.global_query {
        println!("  search \"{}\"", q);
    }
    if !params.order_by.is_empty() {
        println!("  order by {}", params.order_by_clause());
    }
    Ok(())
}

fn cmd_normalize(query: &str, size: usize) -> Result<()> {
    let params = QueryParams::from_query_string(query, size).context("invalid query string")?;
    println!("{}", params.to_query_string());
    Ok(())
}

fn cmd_columns(columns_path: PathBuf, prefs_path: Option<PathBuf>, table_id: String) -> Result<()> {
    let mut table = TableController::new(load_columns(&columns_path)?, TableConfig::new(&table_id))?;
    if let Some(path) = &prefs_path {
        if let Some(prefs) = PrefsStore::new(path).load(&table_id)? {
            table.apply_column_prefs(&prefs);
        }
    }

    let mut out = Table::new();
    out.load_preset(UTF8_FULL);
    out.set_header(["#", "Column", "Header", "Path", "Visible", "Sortable", "Filter", "Width"]);
    for column in table.columns() {
        out.add_row([
            column.order.to_string(),
            column.id.clone(),
            column.header.clone(),
            column.path.clone(),
            yes_no(column.visible).to_string(),
            yes_no(column.sortable).to_string(),
            format!("{:?}", column.filter).to_lowercase(),
            column
                .width
                .map(|w| w.to_string())
                .unwrap_or_else(|| "-".to_string()),
        ]);
    }
    println!("Table: {}", table_id);
    println!("{}", out);
    Ok(())
}

// ─── Utilities ────────────────────────────────────────────────────────────────

fn load_rows(path: &Path, id_path: &str) -> Result<Vec<Row>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    let records: Vec<serde_json::Value> = serde_json::from_str(&content)?;
    records
        .into_iter()
        .enumerate()
        .map(|(i, record)| {
            Row::from_json(record, id_path)
                .with_context(|| format!("record {} has no '{}' identifier", i, id_path))
        })
        .collect()
}

fn load_columns(path: &Path) -> Result<Vec<Column>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    Ok(serde_yaml::from_str(&content)?)
}

/// One sortable, enum-filterable, searchable column per top-level key of the
/// first record, identifier first.
fn infer_columns(rows: &[Row], id_path: &str) -> Vec<Column> {
    let Some(serde_json::Value::Object(first)) = rows.first().map(|r| &r.data) else {
        return vec![Column::new(id_path, id_path).sortable()];
    };
    let mut keys: Vec<&String> = first.keys().collect();
    keys.sort_by(|a, b| (a.as_str() != id_path, a).cmp(&(b.as_str() != id_path, b)));
    keys.into_iter()
        .map(|key| {
            Column::new(key.as_str(), key.as_str())
                .sortable()
                .with_filter(FilterKind::Enum)
                .searchable()
        })
        .collect()
}

fn header_label(table: &TableController, column: &Column) -> String {
    let sort = table.sort();
    match (sort.direction_of(&column.id), sort.position_of(&column.id)) {
        (Some(direction), Some(position)) => {
            let arrow = match direction {
                SortDirection::Asc => "▲",
                SortDirection::Desc => "▼",
            };
            if sort.keys().len() > 1 {
                format!("{} {}{}", column.header, arrow, position + 1)
            } else {
                format!("{} {}", column.header, arrow)
            }
        }
        _ => column.header.clone(),
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}
