use crate::registry::DeviceState;

pub const TITLE: &str = "Andon System Dashboard";

pub const CYCLE_TIME: &str = "cycle_time";
pub const MOLD_TEMP: &str = "mold_temp";
pub const ZONE_TEMPS: &str = "zone_temps";
pub const CLAMPING_PRESSURE: &str = "clamping_pressure";

/// Injection molding machines; the cycle time and clamping rules apply only to them.
const MOLDING_PREFIX: &str = "IMM";
const TARGET_CYCLE_SECS: f64 = 35.0;
const CYCLE_DEVIATION_PCT: f64 = 10.0;
const ZONE_TEMP_RANGE: (f64, f64) = (180.0, 220.0);
const CLAMPING_RANGE: (f64, f64) = (1800.0, 2500.0);

const TIME_FORMAT: &str = "%H:%M:%S";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Running,
    Stopped,
}

impl Status {
    /// A machine counts as running while it reports a positive cycle time.
    pub fn derive(state: &DeviceState) -> Self {
        match state.metric(CYCLE_TIME) {
            Some(cycle_time) if cycle_time > 0.0 => Status::Running,
            _ => Status::Stopped,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Status::Running => "RUNNING",
            Status::Stopped => "STOPPED",
        }
    }

    #[cfg_attr(not(feature = "gui"), allow(dead_code))]
    pub fn rgb(&self) -> (u8, u8, u8) {
        match self {
            Status::Running => (31, 139, 76),
            Status::Stopped => (196, 48, 48),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Critical,
}

impl Severity {
    pub fn marker(&self) -> &'static str {
        match self {
            Severity::Warning => "!",
            Severity::Critical => "!!",
        }
    }

    #[cfg_attr(not(feature = "gui"), allow(dead_code))]
    pub fn rgb(&self) -> (u8, u8, u8) {
        match self {
            Severity::Warning => (179, 122, 10),
            Severity::Critical => (196, 48, 48),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Alert {
    pub severity: Severity,
    pub message: String,
}

impl Alert {
    fn new(severity: Severity, message: String) -> Self {
        Self { severity, message }
    }
}

/// Threshold checks over the current metrics, recomputed per render like
/// [`Status`]. Only the first out-of-range heating zone is reported.
pub fn derive_alerts(device_id: &str, state: &DeviceState) -> Vec<Alert> {
    let mut alerts = Vec::new();
    let molding = device_id.starts_with(MOLDING_PREFIX);

    if let Some(cycle_time) = state.metric(CYCLE_TIME).filter(|_| molding) {
        let deviation = ((cycle_time - TARGET_CYCLE_SECS) / TARGET_CYCLE_SECS * 100.0).abs();
        if deviation > CYCLE_DEVIATION_PCT {
            alerts.push(Alert::new(
                Severity::Warning,
                format!("Cycle time off {deviation:.1}%"),
            ));
        }
    }

    if let Some(zones) = state.series(ZONE_TEMPS) {
        let (min, max) = ZONE_TEMP_RANGE;
        if let Some((index, temp)) = zones
            .iter()
            .enumerate()
            .find(|(_, temp)| **temp < min || **temp > max)
        {
            alerts.push(Alert::new(
                Severity::Critical,
                format!("Zone {} temp {temp:.0}°C", index + 1),
            ));
        }
    }

    if let Some(pressure) = state.metric(CLAMPING_PRESSURE).filter(|_| molding) {
        let (min, max) = CLAMPING_RANGE;
        if pressure < min || pressure > max {
            alerts.push(Alert::new(
                Severity::Warning,
                format!("Clamp pressure {pressure:.0} ton"),
            ));
        }
    }

    alerts
}

/// State of the feed connection as shown in the dashboard chrome.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LinkState {
    #[default]
    Connecting,
    Live,
    Closed,
}

impl LinkState {
    pub fn label(&self) -> &'static str {
        match self {
            LinkState::Connecting => "connecting",
            LinkState::Live => "live",
            LinkState::Closed => "closed",
        }
    }
}

/// Display-ready card for one device. Values are blank when the metric has
/// not been reported yet.
#[derive(Clone, Debug, PartialEq)]
pub struct CardView {
    pub device_id: String,
    pub status: Status,
    pub cycle_time: String,
    pub mold_temp: String,
    pub last_seen: String,
    pub alerts: Vec<Alert>,
}

impl CardView {
    pub fn build(device_id: &str, state: &DeviceState) -> Self {
        Self {
            device_id: device_id.to_string(),
            status: Status::derive(state),
            cycle_time: format_metric(state.metric(CYCLE_TIME), 2, "s"),
            mold_temp: format_metric(state.metric(MOLD_TEMP), 1, "°C"),
            last_seen: state.last_seen().format(TIME_FORMAT).to_string(),
            alerts: derive_alerts(device_id, state),
        }
    }

    /// Label/value rows below the card title, in display order.
    pub fn rows(&self) -> [(&'static str, &str); 4] {
        [
            ("Status", self.status.label()),
            ("Cycle Time", self.cycle_time.as_str()),
            ("Mold Temp", self.mold_temp.as_str()),
            ("Last Update", self.last_seen.as_str()),
        ]
    }
}

/// Cards for a registry snapshot, in snapshot order.
pub fn build_cards(snapshot: &[(String, DeviceState)]) -> Vec<CardView> {
    snapshot
        .iter()
        .map(|(device_id, state)| CardView::build(device_id, state))
        .collect()
}

fn format_metric(value: Option<f64>, precision: usize, unit: &str) -> String {
    match value {
        Some(value) => format!("{value:.precision$} {unit}"),
        None => String::new(),
    }
}
