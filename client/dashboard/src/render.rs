//! Terminal rendering of the card grid.

use owo_colors::OwoColorize;
use std::io::{self, Write};
use tokio::{
    sync::mpsc::UnboundedReceiver,
    time::{interval, MissedTickBehavior},
};

use crate::config::DashboardConfig;
use crate::dashboard::Dashboard;
use crate::ingest::{IngestEvent, StopSignal};
use crate::view::{CardView, LinkState, Severity, Status, TITLE};

const CARD_INNER: usize = 28;
const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

#[derive(Debug, Clone, Copy)]
pub struct GridStyle {
    pub columns: usize,
    pub color: bool,
}

impl From<&DashboardConfig> for GridStyle {
    fn from(config: &DashboardConfig) -> Self {
        Self {
            columns: config.columns,
            color: config.color,
        }
    }
}

pub fn render_grid(cards: &[CardView], link: LinkState, style: &GridStyle) -> String {
    let mut out = String::new();
    out.push_str(TITLE);
    out.push_str("\n\n");

    if cards.is_empty() {
        out.push_str("Waiting for telemetry...\n");
    }

    for row in cards.chunks(style.columns.max(1)) {
        // Cards with alerts are taller; pad the rest of the row to match.
        let body_height = row.iter().map(|card| card.alerts.len()).max().unwrap_or(0);
        let boxes: Vec<Vec<String>> = row
            .iter()
            .map(|card| card_lines(card, body_height, style.color))
            .collect();
        let height = boxes.first().map_or(0, Vec::len);
        for line in 0..height {
            let joined: Vec<&str> = boxes.iter().map(|card| card[line].as_str()).collect();
            out.push_str(&joined.join(" "));
            out.push('\n');
        }
    }

    out.push_str(&format!(
        "\nlink: {} | devices: {}\n",
        link.label(),
        cards.len()
    ));
    out
}

fn card_lines(card: &CardView, alert_rows: usize, color: bool) -> Vec<String> {
    let border = format!("+{}+", "-".repeat(CARD_INNER + 2));
    let mut lines = Vec::with_capacity(7 + alert_rows);
    lines.push(border.clone());
    lines.push(cell("", &card.device_id, None));
    for (label, value) in card.rows() {
        let paint = (color && label == "Status").then_some(Tone::Status(card.status));
        lines.push(cell(&format!("{label}: "), value, paint));
    }
    for alert in &card.alerts {
        let paint = color.then_some(Tone::Alert(alert.severity));
        lines.push(cell(&format!("{} ", alert.severity.marker()), &alert.message, paint));
    }
    for _ in card.alerts.len()..alert_rows {
        lines.push(cell("", "", None));
    }
    lines.push(border);
    lines
}

#[derive(Clone, Copy)]
enum Tone {
    Status(Status),
    Alert(Severity),
}

fn cell(prefix: &str, value: &str, paint: Option<Tone>) -> String {
    let text: String = format!("{prefix}{value}").chars().take(CARD_INNER).collect();
    let pad = " ".repeat(CARD_INNER - text.chars().count());
    let body = match paint {
        Some(tone) => {
            let shown: String = text.chars().skip(prefix.chars().count()).collect();
            format!("{prefix}{}", paint_text(&shown, tone))
        }
        None => text,
    };
    format!("| {body}{pad} |")
}

fn paint_text(text: &str, tone: Tone) -> String {
    match tone {
        Tone::Status(Status::Running) => text.green().bold().to_string(),
        Tone::Status(Status::Stopped) => text.red().bold().to_string(),
        Tone::Alert(Severity::Warning) => text.yellow().to_string(),
        Tone::Alert(Severity::Critical) => text.red().bold().to_string(),
    }
}

fn draw(dashboard: &Dashboard, style: &GridStyle) -> io::Result<()> {
    let frame = render_grid(&dashboard.cards(), dashboard.link(), style);
    let mut stdout = io::stdout().lock();
    write!(stdout, "{CLEAR_SCREEN}{frame}")?;
    stdout.flush()
}

/// Applies feed events as they arrive and redraws at most once per refresh
/// tick. Keeps showing the last state after the feed closes, until Ctrl-C.
/// Without a Ctrl-C handler the loop runs until the process is killed.
pub async fn run_terminal(
    config: &DashboardConfig,
    mut events: UnboundedReceiver<IngestEvent>,
    stop: StopSignal,
) {
    let style = GridStyle::from(config);
    let mut dashboard = Dashboard::new();
    let mut ticker = interval(config.refresh_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut ctrl_c_armed = true;
    let mut feed_open = true;

    loop {
        tokio::select! {
            result = &mut ctrl_c, if ctrl_c_armed => match result {
                Ok(()) => {
                    tracing::info!("shutdown requested");
                    stop.stop();
                    break;
                }
                Err(err) => {
                    tracing::warn!(error = %err, "ctrl-c handler unavailable");
                    ctrl_c_armed = false;
                }
            },
            event = events.recv(), if feed_open => match event {
                Some(event) => dashboard.handle(event),
                None => feed_open = false,
            },
            _ = ticker.tick() => {
                if dashboard.take_dirty() {
                    if let Err(err) = draw(&dashboard, &style) {
                        tracing::warn!(error = %err, "terminal draw failed");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{MetricValue, TelemetryUpdate};
    use chrono::Local;

    fn dashboard_with(devices: &[(&str, &[(&str, f64)])]) -> Dashboard {
        let mut dashboard = Dashboard::new();
        dashboard.handle(IngestEvent::Connected);
        for (device_id, metrics) in devices {
            dashboard.handle(IngestEvent::Telemetry {
                update: TelemetryUpdate::numbers(device_id, metrics),
                observed_at: Local::now(),
            });
        }
        dashboard
    }

    const PLAIN: GridStyle = GridStyle {
        columns: 2,
        color: false,
    };

    #[test]
    fn renders_one_box_per_device_in_rows() {
        let dashboard = dashboard_with(&[
            ("IMM-01", &[("cycle_time", 12.5), ("mold_temp", 180.2)]),
            ("IMM-02", &[("cycle_time", 0.0)]),
            ("QMC-01", &[]),
        ]);
        let out = render_grid(&dashboard.cards(), dashboard.link(), &PLAIN);

        assert!(out.starts_with(TITLE));
        assert!(out.contains("| IMM-01 "));
        assert!(out.contains("Status: RUNNING"));
        assert!(out.contains("Status: STOPPED"));
        assert!(out.contains("Cycle Time: 12.50 s"));
        assert!(out.contains("Mold Temp: 180.2 °C"));
        assert!(out.ends_with("link: live | devices: 3\n"));

        // Two cards per row: the third device starts a new row.
        let title_rows: Vec<&str> = out
            .lines()
            .filter(|line| line.starts_with("| IMM-") || line.starts_with("| QMC-"))
            .collect();
        assert_eq!(title_rows.len(), 2);
        assert!(title_rows[0].contains("IMM-01") && title_rows[0].contains("IMM-02"));
        assert!(title_rows[1].contains("QMC-01"));
    }

    #[test]
    fn box_lines_share_one_width() {
        let dashboard = dashboard_with(&[(
            "a-device-id-longer-than-any-card-is-wide",
            &[("mold_temp", 61.0)],
        )]);
        let out = render_grid(&dashboard.cards(), dashboard.link(), &PLAIN);
        let widths: Vec<usize> = out
            .lines()
            .filter(|line| line.starts_with('|') || line.starts_with('+'))
            .map(|line| line.chars().count())
            .collect();
        assert_eq!(widths.len(), 7);
        assert!(widths.iter().all(|width| *width == CARD_INNER + 4));
    }

    #[test]
    fn empty_dashboard_says_it_is_waiting() {
        let out = render_grid(&[], LinkState::Connecting, &PLAIN);
        assert!(out.contains("Waiting for telemetry"));
        assert!(out.contains("link: connecting | devices: 0"));
    }

    #[test]
    fn colors_only_the_status_when_enabled() {
        let dashboard = dashboard_with(&[("M1", &[("cycle_time", 1.0)])]);
        let style = GridStyle {
            columns: 4,
            color: true,
        };
        let out = render_grid(&dashboard.cards(), dashboard.link(), &style);
        assert!(out.contains("\u{1b}["));
        assert!(!render_grid(&dashboard.cards(), dashboard.link(), &PLAIN).contains("\u{1b}["));
    }

    #[test]
    fn alert_lines_keep_row_boxes_aligned() {
        let mut dashboard = dashboard_with(&[("IMM-01", &[("cycle_time", 50.0), ("clamping_pressure", 1200.0)])]);
        let mut update = TelemetryUpdate::numbers("QMC-01", &[("cycle_time", 20.0)]);
        update
            .metrics
            .insert("zone_temps".to_string(), MetricValue::Series(vec![190.0, 240.0]));
        dashboard.handle(IngestEvent::Telemetry {
            update,
            observed_at: Local::now(),
        });

        let out = render_grid(&dashboard.cards(), dashboard.link(), &PLAIN);
        assert!(out.contains("| ! Cycle time off 42.9%"));
        assert!(out.contains("| ! Clamp pressure 1200 ton"));
        assert!(out.contains("| !! Zone 2 temp 240°C"));

        let box_lines: Vec<&str> = out
            .lines()
            .filter(|line| line.starts_with('|') || line.starts_with('+'))
            .collect();
        // Both cards sit in one row: 7 base lines plus the taller card's two alerts.
        assert_eq!(box_lines.len(), 9);
        assert!(box_lines
            .iter()
            .all(|line| line.chars().count() == 2 * (CARD_INNER + 4) + 1));
    }
}
