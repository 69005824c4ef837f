use eframe::egui;
use std::time::Duration;
use tokio::{
    runtime::Runtime,
    sync::mpsc::{self, UnboundedReceiver},
    task::JoinHandle,
};

use crate::config::DashboardConfig;
use crate::dashboard::Dashboard;
use crate::ingest::{self, IngestEvent, StopSignal};
use crate::view::{CardView, TITLE};

const CARD_WIDTH: f32 = 250.0;

pub fn run(config: DashboardConfig) {
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            tracing::error!(error = %err, "tokio runtime");
            return;
        }
    };

    let stop = StopSignal::new();
    let (events_tx, events) = mpsc::unbounded_channel();
    let ingest = {
        let _entered = runtime.enter();
        ingest::spawn(config.endpoint.clone(), events_tx, stop.clone())
    };

    let app = DashboardGui {
        dashboard: Dashboard::new(),
        events,
        stop,
        ingest: Some(ingest),
        runtime,
        refresh: config.refresh_interval,
    };
    let options = eframe::NativeOptions::default();
    let result = eframe::run_native(
        TITLE,
        options,
        Box::new(|cc| {
            apply_portal_style(&cc.egui_ctx);
            Ok(Box::new(app))
        }),
    );
    if let Err(err) = result {
        tracing::error!(error = %err, "dashboard window failed");
    }
}

struct DashboardGui {
    dashboard: Dashboard,
    events: UnboundedReceiver<IngestEvent>,
    stop: StopSignal,
    ingest: Option<JoinHandle<()>>,
    runtime: Runtime,
    refresh: Duration,
}

impl eframe::App for DashboardGui {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        while let Ok(event) = self.events.try_recv() {
            self.dashboard.handle(event);
        }
        let cards = self.dashboard.cards();
        let link = self.dashboard.link();

        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading(TITLE);
                ui.separator();
                ui.label(format!("link: {}", link.label()));
                ui.label(format!("devices: {}", self.dashboard.registry().len()));
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            if self.dashboard.registry().is_empty() {
                ui.label("Waiting for telemetry...");
                return;
            }
            egui::ScrollArea::vertical().show(ui, |ui| {
                ui.horizontal_wrapped(|ui| {
                    for card in &cards {
                        machine_card(ui, card);
                    }
                });
            });
        });

        ctx.request_repaint_after(self.refresh);
    }
}

impl Drop for DashboardGui {
    fn drop(&mut self) {
        // Window closed: release the feed connection before the runtime goes.
        self.stop.stop();
        if let Some(handle) = self.ingest.take() {
            if let Err(err) = self.runtime.block_on(handle) {
                tracing::warn!(error = %err, "ingest task failed");
            }
        }
    }
}

fn machine_card(ui: &mut egui::Ui, card: &CardView) {
    let (r, g, b) = card.status.rgb();
    let status_color = egui::Color32::from_rgb(r, g, b);
    egui::Frame::group(ui.style())
        .fill(egui::Color32::from_rgb(249, 249, 249))
        .rounding(egui::Rounding::same(8.0))
        .stroke(egui::Stroke::new(2.0, status_color))
        .inner_margin(egui::Margin::same(16.0))
        .show(ui, |ui| {
            ui.set_width(CARD_WIDTH);
            ui.vertical(|ui| {
                ui.label(egui::RichText::new(&card.device_id).size(18.0).strong());
                for (label, value) in card.rows() {
                    ui.horizontal(|ui| {
                        ui.label(format!("{label}:"));
                        if label == "Status" {
                            ui.label(egui::RichText::new(value).color(status_color).strong());
                        } else {
                            ui.label(value);
                        }
                    });
                }
                for alert in &card.alerts {
                    let (r, g, b) = alert.severity.rgb();
                    ui.label(
                        egui::RichText::new(format!("{} {}", alert.severity.marker(), alert.message))
                            .color(egui::Color32::from_rgb(r, g, b)),
                    );
                }
            });
        });
}

fn apply_portal_style(ctx: &egui::Context) {
    let mut style = (*ctx.style()).clone();
    style.visuals = egui::Visuals::light();
    style.visuals.panel_fill = egui::Color32::from_rgb(246, 248, 251);
    style.visuals.window_fill = egui::Color32::from_rgb(246, 248, 251);
    style.visuals.override_text_color = Some(egui::Color32::from_rgb(15, 27, 42));
    style.text_styles.insert(
        egui::TextStyle::Heading,
        egui::FontId::new(20.0, egui::FontFamily::Proportional),
    );
    style.text_styles.insert(
        egui::TextStyle::Body,
        egui::FontId::new(14.0, egui::FontFamily::Proportional),
    );
    style.spacing.item_spacing = egui::vec2(20.0, 10.0);
    ctx.set_style(style);
}
