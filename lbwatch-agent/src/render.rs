//! Terminal presentation of the poll state
//!
//! Pure string rendering (`render_status`, `render_pools_table`,
//! `render_error_panel`) plus a small task that redraws stdout whenever the
//! poll loop publishes.

use std::io::Write;

use tabled::settings::Style;
use tabled::{Table, Tabled};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::api::Pool;
use crate::poller::{CyclePhase, PollStatus};

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

const REMEDIATION_HINTS: [&str; 3] = [
    "Check that the API token has Load Balancing: Read permission",
    "Check that the account ID is correct",
    "Check proxy, firewall or network settings between this host and the API",
];

#[derive(Tabled)]
struct Row {
    #[tabled(rename = "Pool / Origin")]
    name: String,
    #[tabled(rename = "Description")]
    description: String,
    #[tabled(rename = "ID / Address")]
    id: String,
    #[tabled(rename = "Health")]
    health: String,
}

pub fn health_badge(healthy: Option<bool>) -> &'static str {
    match healthy {
        Some(true) => "healthy",
        Some(false) => "UNHEALTHY",
        None => "unknown",
    }
}

fn rows(pools: &[Pool]) -> Vec<Row> {
    let mut rows = Vec::new();

    for pool in pools {
        rows.push(Row {
            name: pool.name.clone(),
            description: pool
                .description
                .clone()
                .filter(|d| !d.is_empty())
                .unwrap_or_else(|| "-".into()),
            id: pool.id.clone(),
            health: health_badge(pool.healthy).to_string(),
        });

        for origin in &pool.origins {
            let mut health = health_badge(origin.healthy).to_string();
            if origin.is_disabled() {
                health.push_str(" (disabled)");
            }
            rows.push(Row {
                name: format!(
                    "  └ {}",
                    origin.name.as_deref().filter(|n| !n.is_empty()).unwrap_or("-")
                ),
                description: String::new(),
                id: origin
                    .address
                    .as_deref()
                    .filter(|a| !a.is_empty())
                    .unwrap_or("-")
                    .to_string(),
                health,
            });
        }
    }

    rows
}

pub fn render_pools_table(pools: &[Pool]) -> String {
    if pools.is_empty() {
        return "No load balancer pools found for this account.".to_string();
    }
    let mut table = Table::new(rows(pools));
    table.with(Style::rounded());
    table.to_string()
}

pub fn render_error_panel(message: &str) -> String {
    let mut out = String::new();
    out.push_str("❌ Failed to load pools\n");
    out.push_str("────────────────────────────────────────\n");
    out.push_str(message);
    out.push_str("\n\nThings to check:\n");
    for hint in REMEDIATION_HINTS {
        out.push_str("  • ");
        out.push_str(hint);
        out.push('\n');
    }
    out.push_str("\nRetrying on the next poll.");
    out
}

fn footer(status: &PollStatus) -> String {
    let updated = status
        .last_success
        .map(|t| t.with_timezone(&chrono::Local).format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "never".to_string());
    let sound = if status.muted { "muted" } else { "on" };
    let refreshing = if status.phase == CyclePhase::Loading { " · refreshing…" } else { "" };
    format!(
        "Updated {} · sound {}{}\n[m] toggle sound  [l] logout  [q] quit",
        updated, sound, refreshing
    )
}

/// Full screen content for a poll state
pub fn render_status(status: &PollStatus) -> String {
    let body = if let Some(error) = &status.error {
        render_error_panel(error)
    } else if let Some(pools) = &status.pools {
        render_pools_table(pools)
    } else if status.phase == CyclePhase::Stopped {
        "Stopped.".to_string()
    } else {
        "Loading pools…".to_string()
    };

    format!("{}\n\n{}", body, footer(status))
}

/// Redraw stdout on every published state until the sender goes away
pub fn spawn_terminal_view(mut rx: watch::Receiver<PollStatus>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let screen = render_status(&rx.borrow_and_update());
            {
                let mut stdout = std::io::stdout().lock();
                let _ = writeln!(stdout, "{}{}", CLEAR_SCREEN, screen);
                let _ = stdout.flush();
            }
            if rx.changed().await.is_err() {
                break;
            }
        }
    })
}
