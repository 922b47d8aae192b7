//! Read-only subcommands: resource registry and effective configuration

use anyhow::Result;
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

use hrline_core::{PaginationStrategy, ProgressContext, ResourceSpec};

use crate::config::{Config, Overrides};

fn init_quiet_logging(debug: bool) {
    // Nothing to show progress for; keep the terminal to the table
    let progress = ProgressContext::new();
    let quiet = progress.is_tty() && !debug;
    let _ = hrline_core::init_logging(quiet, debug, None, None);
}

fn table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(headers.iter().map(|h| Cell::new(h).fg(Color::Cyan)));
    table
}

fn paging(strategy: &PaginationStrategy) -> String {
    match strategy {
        PaginationStrategy::SinglePage => "single page".to_string(),
        PaginationStrategy::OffsetLimit {
            limit, total_path, ..
        } => match total_path {
            Some(path) => format!("offset, limit {limit}, total {path}"),
            None => format!("offset, limit {limit}"),
        },
        PaginationStrategy::PageNumber {
            base_page,
            page_param,
            total_path,
            ..
        } => format!("page `{page_param}` from {base_page}, total {total_path}"),
    }
}

fn params(resource: &ResourceSpec) -> String {
    resource
        .params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Print the registry, honoring `pipeline.only`
pub fn resources(config: &Config, debug: bool) -> Result<()> {
    init_quiet_logging(debug);
    let personio = config.personio(&Overrides::default())?;
    let selected = hrline_personio::select(hrline_personio::resources(&personio), &personio.only)?;

    let mut table = table(&["Resource", "Path", "Pagination", "Params", "Write"]);
    for r in &selected {
        table.add_row(vec![
            r.name.clone(),
            r.path.clone(),
            paging(&r.paginator),
            params(r),
            r.write_policy.to_string(),
        ]);
    }
    eprintln!("\n{table}");
    Ok(())
}

fn secret(value: &Option<String>) -> &'static str {
    if value.is_some() { "configured" } else { "not set" }
}

/// Print the effective configuration with secrets masked
pub fn config(config: &Config, debug: bool) -> Result<()> {
    init_quiet_logging(debug);
    let mut table = table(&["Setting", "Value"]);

    let source = config
        .source
        .as_ref()
        .map_or_else(|| "defaults".to_string(), |p| p.display().to_string());
    let p = &config.personio;
    let rows: Vec<(&str, String)> = vec![
        ("Config file", source),
        ("Pipeline", config.pipeline.name.clone()),
        ("Destination", config.pipeline.destination.clone()),
        ("Dataset", config.pipeline.dataset.clone()),
        ("Workers", config.pipeline.workers.to_string()),
        (
            "Run timeout",
            config
                .pipeline
                .timeout_secs
                .map_or_else(|| "none".to_string(), |s| format!("{s}s")),
        ),
        (
            "Resources",
            if config.pipeline.only.is_empty() {
                "all".to_string()
            } else {
                config.pipeline.only.join(", ")
            },
        ),
        ("API base URL", p.base_url.clone()),
        ("Token URL", p.token_url.clone()),
        ("Client ID", secret(&p.client_id).to_string()),
        ("Client secret", secret(&p.client_secret).to_string()),
        ("Token lifetime default", format!("{}s", p.default_expiration)),
        ("Token safety margin", format!("{}s", p.safety_margin_secs)),
        ("Attendances from", p.start_date.to_string()),
        (
            "Attendances to",
            p.end_date
                .map_or_else(|| "today".to_string(), |d| d.to_string()),
        ),
        ("Connect timeout", format!("{}s", config.http.connect_timeout_secs)),
        ("Request timeout", format!("{}s", config.http.request_timeout_secs)),
        ("Max retries", config.http.max_retries.to_string()),
        ("Slack hook", secret(&config.notify.slack_hook).to_string()),
        ("Start notification", config.notify.notify_start.to_string()),
        ("Data directory", config.output.data_dir.display().to_string()),
        ("Log directory", config.output.log_dir.display().to_string()),
        ("Timestamp format", config.output.timestamp_fmt.clone()),
    ];
    for (setting, value) in rows {
        table.add_row(vec![setting.to_string(), value]);
    }

    eprintln!("\n{table}");
    Ok(())
}
