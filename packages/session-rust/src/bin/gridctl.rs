//! `gridctl`: prints a list as the grid would show it, as CSV.
//!
//! ```text
//! gridctl --list 3f2a... --filter status=Done --sort price:desc > books.csv
//! ```

use std::collections::BTreeSet;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use listgrid_core::{
    export_file_name, to_csv, FilterState, GridSettings, Item, NullPlacement, SortDirection,
    SortState,
};
use listgrid_session::{GridSession, HttpBackend, HttpBackendConfig};

#[derive(Debug, Parser)]
#[command(name = "gridctl", version, about = "Export a list the way the grid displays it")]
struct Args {
    /// Base URL of the list service.
    #[arg(long, env = "LISTGRID_URL", default_value = "http://localhost:8000/api")]
    url: String,

    /// Bearer token sent with every request.
    #[arg(long, env = "LISTGRID_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Id of the list to export.
    #[arg(long, env = "LISTGRID_LIST")]
    list: String,

    /// Saved view to apply, by name or id.
    #[arg(long)]
    view: Option<String>,

    /// Column filter as `column=value`; repeat to accept several values.
    #[arg(long = "filter", value_name = "COLUMN=VALUE")]
    filters: Vec<String>,

    /// Free-text search across all columns.
    #[arg(long, default_value = "")]
    search: String,

    /// Sort as `column[:asc|:desc]`, overriding the view's sort.
    #[arg(long, value_name = "COLUMN[:DIR]")]
    sort: Option<String>,

    /// Place empty values first when sorting.
    #[arg(long)]
    nulls_first: bool,

    /// Leave soft-deleted rows out.
    #[arg(long)]
    hide_deleted: bool,

    /// Omit the header row.
    #[arg(long)]
    no_header: bool,

    /// Write to `<list name>.csv` in the current directory instead of stdout.
    #[arg(long)]
    save: bool,

    /// Request timeout in seconds.
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    /// Log as JSON lines on stderr.
    #[arg(long)]
    json_logs: bool,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn parse_filters(raw: &[String]) -> anyhow::Result<FilterState> {
    let mut filters = FilterState::new();
    for entry in raw {
        let Some((column, value)) = entry.split_once('=') else {
            bail!("filter must be COLUMN=VALUE: {entry}");
        };
        filters
            .entry(column.trim().to_string())
            .or_insert_with(BTreeSet::new)
            .insert(value.to_string());
    }
    Ok(filters)
}

fn parse_sort(raw: &str) -> anyhow::Result<(String, SortDirection)> {
    let (column, direction) = match raw.rsplit_once(':') {
        Some((column, "asc")) => (column, SortDirection::Asc),
        Some((column, "desc")) => (column, SortDirection::Desc),
        Some((_, other)) => bail!("unknown sort direction: {other}"),
        None => (raw, SortDirection::Asc),
    };
    Ok((column.to_string(), direction))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.json_logs);

    let mut config = HttpBackendConfig::with_base_url(&args.url);
    config.request_timeout = Duration::from_secs(args.timeout);
    if let Some(token) = args.token.clone() {
        config = config.with_token(token);
    }
    let backend = Arc::new(HttpBackend::new(config)?);

    let settings = GridSettings {
        unknown_sort_position: if args.nulls_first {
            NullPlacement::Top
        } else {
            NullPlacement::Bottom
        },
        show_deleted_rows: !args.hide_deleted,
        ..GridSettings::default()
    };
    let mut session = GridSession::open(backend, &args.list, settings)
        .await
        .with_context(|| format!("failed to open list {}", args.list))?;

    if let Some(wanted) = &args.view {
        let view_id = session
            .views()
            .iter()
            .find(|v| v.id == *wanted || v.name == *wanted)
            .map(|v| v.id.clone())
            .with_context(|| format!("no view named {wanted}"))?;
        session.on_load_filter(&view_id)?;
    }
    if !args.filters.is_empty() {
        session.on_filter_change(parse_filters(&args.filters)?);
    }
    if let Some(raw) = &args.sort {
        let (column, direction) = parse_sort(raw)?;
        session.apply_sort(SortState::by(column, direction))?;
    }
    session.on_search(&args.search);

    let rows = session.display_rows();
    let items: Vec<&Item> = rows.iter().map(|r| &r.item).collect();
    let csv = to_csv(session.columns(), items, !args.no_header);
    info!(list = %args.list, rows = rows.len(), "exported");

    if args.save {
        let path = export_file_name(session.list_name());
        std::fs::write(&path, csv).with_context(|| format!("failed to write {path}"))?;
        info!(path = %path, "saved export");
    } else {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(csv.as_bytes())?;
        stdout.flush()?;
    }
    Ok(())
}
