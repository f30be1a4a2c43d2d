//! Water Cup — 喝水杯桌面贴纸

use water_cup::app::{self, WIDGET_SIZE};

fn main() -> eframe::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([WIDGET_SIZE, WIDGET_SIZE])
            .with_title("喝水杯")
            .with_decorations(false) // 无边框贴纸
            .with_transparent(true)
            .with_resizable(false)
            .with_always_on_top()
            .with_icon(egui::IconData::default()),
        ..Default::default()
    };
    eframe::run_native(
        "water-cup",
        options,
        Box::new(|cc| Ok(Box::new(app::WaterCupApp::new(cc)))),
    )
}
