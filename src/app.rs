//! egui 主界面：透明无边框的杯子贴纸，点击计数、拖动移窗、右键菜单与设置窗口

use std::cell::Cell;
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use base64::{Engine as _, engine::general_purpose};
use eframe::egui;
use serde_json::json;

use crate::autolaunch;
use crate::counter::{CounterStorage, DailyCounterStore, SystemClock};
use crate::db::{self, MemoryStorage};
use crate::gesture::{GestureClassifier, GestureEvent, Point, PointerButton};
use crate::settings::{self, SettingsStore};

/// 挂件窗口边长（逻辑像素）
pub const WIDGET_SIZE: f32 = 160.0;

/// 设置窗口尺寸
const SETTINGS_SIZE: (f32, f32) = (560.0, 520.0);

/// 预设缩略图边长
const PRESET_THUMB: f32 = 48.0;

/// 午夜定时器的最长轮询间隔。单调时钟在休眠时不走，需定期对照墙上时钟
const MAX_ROLLOVER_WAIT: Duration = Duration::from_secs(60);

/// 内置杯子配色
mod cup_theme {
    pub const GLASS_RGBA: (u8, u8, u8, u8) = (210, 235, 250, 200);
    pub const WATER_RGBA: (u8, u8, u8, u8) = (90, 170, 235, 220);
    pub const OUTLINE_RGB: (u8, u8, u8) = (70, 110, 150);
}

/// 设置中文字体，避免菜单与设置页中文乱码。优先使用系统自带字体。
fn setup_chinese_fonts(ctx: &egui::Context) {
    let mut fonts = egui::FontDefinitions::default();

    #[cfg(windows)]
    let system_font_paths = [
        r"C:\Windows\Fonts\msyh.ttc",   // 微软雅黑
        r"C:\Windows\Fonts\simhei.ttf", // 黑体
    ];

    #[cfg(target_os = "macos")]
    let system_font_paths = [
        "/System/Library/Fonts/PingFang.ttc",
        "/System/Library/Fonts/STHeiti Light.ttc",
    ];

    #[cfg(not(any(windows, target_os = "macos")))]
    let system_font_paths = [
        "/usr/share/fonts/opentype/noto/NotoSansCJK-Regular.ttc",
        "/usr/share/fonts/noto-cjk/NotoSansCJK-Regular.ttc",
        "/usr/share/fonts/truetype/wqy/wqy-microhei.ttc",
    ];

    for path in system_font_paths {
        if let Ok(bytes) = std::fs::read(path) {
            fonts
                .font_data
                .insert("chinese".to_owned(), Arc::new(egui::FontData::from_owned(bytes)));
            for family in [egui::FontFamily::Proportional, egui::FontFamily::Monospace] {
                fonts
                    .families
                    .entry(family)
                    .or_default()
                    .push("chinese".to_owned());
            }
            ctx.set_fonts(fonts);
            return;
        }
    }
    log::debug!("no CJK system font found, menus may render boxes");
}

fn map_button(button: egui::PointerButton) -> PointerButton {
    match button {
        egui::PointerButton::Primary => PointerButton::Primary,
        egui::PointerButton::Secondary => PointerButton::Secondary,
        egui::PointerButton::Middle => PointerButton::Middle,
        _ => PointerButton::Other,
    }
}

/// 图片设置转为 egui 可加载的 URI：带协议的原样保留，其余视为本地路径
fn image_uri(image: &str) -> String {
    if image.starts_with("data:") || image.contains("://") {
        image.to_owned()
    } else {
        format!("file://{image}")
    }
}

/// 解码 `data:<mime>;base64,<内容>`，返回图片扩展名与字节
fn decode_data_uri(uri: &str) -> Option<(&'static str, Vec<u8>)> {
    let (meta, payload) = uri.strip_prefix("data:")?.split_once(',')?;
    let mime = meta.strip_suffix(";base64")?;
    let ext = match mime.to_ascii_lowercase().as_str() {
        "image/png" => "png",
        "image/svg+xml" => "svg",
        _ => return None,
    };
    let bytes = general_purpose::STANDARD.decode(payload.trim()).ok()?;
    Some((ext, bytes))
}

/// data URI 解码后在 egui 中注册的 `bytes://` 地址，带扩展名以便选中对应的解码器
fn inline_image_uri(data_uri: &str, ext: &str) -> String {
    format!("bytes://cup-image-{:016x}.{ext}", egui::Id::new(data_uri).value())
}

/// 浮层（右键菜单等）打开时的按下只用于关闭浮层，不算点杯子
fn accepts_press(popup_open: bool, over_popup: bool) -> bool {
    !popup_open && !over_popup
}

/// 距下一次午夜清零的等待时间，封顶 `MAX_ROLLOVER_WAIT`
fn rollover_wake_after(remaining: Duration) -> Duration {
    remaining.min(MAX_ROLLOVER_WAIT)
}

/// data URI 形式的杯子图片：只解码一次，字节交给 egui 缓存
#[derive(Default)]
struct InlineImage {
    /// (data URI, 注册的 `bytes://` 地址；解码失败为 `None`)
    current: Option<(String, Option<String>)>,
}

impl InlineImage {
    fn resolve(&mut self, ctx: &egui::Context, data_uri: &str) -> Option<String> {
        if let Some((source, uri)) = &self.current {
            if source == data_uri {
                return uri.clone();
            }
        }
        if let Some((_, Some(old))) = self.current.take() {
            ctx.forget_image(&old);
        }
        let uri = match decode_data_uri(data_uri) {
            Some((ext, bytes)) => {
                let uri = inline_image_uri(data_uri, ext);
                ctx.include_bytes(uri.clone(), bytes);
                Some(uri)
            }
            None => {
                log::warn!("cup image data URI is not a base64 png/svg, drawing the default cup");
                None
            }
        };
        self.current = Some((data_uri.to_owned(), uri.clone()));
        uri
    }
}

fn preset_uri(path: &Path) -> String {
    format!("file://{}", path.display())
}

/// 按窗口的实际位置把指针换算到屏幕坐标，并以相对位移移动窗口
#[derive(Debug, Default)]
struct WindowMover {
    /// 本帧开始时窗口左上角（设备像素）
    reported: Point,
    /// 本帧已请求的目标位置
    target: Point,
}

impl WindowMover {
    fn sync(&mut self, outer: Option<egui::Rect>, ppp: f32) {
        if let Some(rect) = outer {
            self.reported = Point::new(
                (rect.min.x * ppp).round() as i32,
                (rect.min.y * ppp).round() as i32,
            );
        }
        self.target = self.reported;
    }

    fn to_screen(&self, pos: egui::Pos2, ppp: f32) -> Point {
        Point::new(
            self.reported.x + (pos.x * ppp).round() as i32,
            self.reported.y + (pos.y * ppp).round() as i32,
        )
    }

    fn move_by(&mut self, ctx: &egui::Context, dx: i32, dy: i32, ppp: f32) {
        self.target.x += dx;
        self.target.y += dy;
        ctx.send_viewport_cmd(egui::ViewportCommand::OuterPosition(egui::pos2(
            self.target.x as f32 / ppp,
            self.target.y as f32 / ppp,
        )));
    }
}

/// 内置杯子：梯形杯身 + 水面 + 把手
fn paint_default_cup(painter: &egui::Painter, rect: egui::Rect) {
    use cup_theme::{GLASS_RGBA, OUTLINE_RGB, WATER_RGBA};

    let glass = egui::Color32::from_rgba_unmultiplied(GLASS_RGBA.0, GLASS_RGBA.1, GLASS_RGBA.2, GLASS_RGBA.3);
    let water = egui::Color32::from_rgba_unmultiplied(WATER_RGBA.0, WATER_RGBA.1, WATER_RGBA.2, WATER_RGBA.3);
    let stroke = egui::Stroke::new(3.0, egui::Color32::from_rgb(OUTLINE_RGB.0, OUTLINE_RGB.1, OUTLINE_RGB.2));

    let w = rect.width();
    let h = rect.height();
    let left = rect.min.x + w * 0.18;
    let right = rect.min.x + w * 0.72;
    let top = rect.min.y + h * 0.15;
    let bottom = rect.min.y + h * 0.88;
    let taper = w * 0.06;
    let water_top = rect.min.y + h * 0.42;
    let water_taper = taper * (water_top - top) / (bottom - top);

    let body = vec![
        egui::pos2(left, top),
        egui::pos2(right, top),
        egui::pos2(right - taper, bottom),
        egui::pos2(left + taper, bottom),
    ];
    painter.add(egui::Shape::convex_polygon(body.clone(), glass, egui::Stroke::NONE));

    let level = vec![
        egui::pos2(left + water_taper, water_top),
        egui::pos2(right - water_taper, water_top),
        egui::pos2(right - taper, bottom),
        egui::pos2(left + taper, bottom),
    ];
    painter.add(egui::Shape::convex_polygon(level, water, egui::Stroke::NONE));
    painter.add(egui::Shape::closed_line(body, stroke));

    let handle_center = egui::pos2(right + w * 0.02, rect.min.y + h * 0.48);
    painter.circle_stroke(handle_center, w * 0.12, stroke);
}

pub struct WaterCupApp {
    counter: DailyCounterStore<Box<dyn CounterStorage>>,
    /// 当前显示的计数，午夜回调也会写入
    count: Rc<Cell<u32>>,
    gesture: GestureClassifier,
    mover: WindowMover,
    settings: SettingsStore,
    presets: Vec<std::path::PathBuf>,
    show_settings: bool,
    /// 设置页中的图片路径输入框
    image_input: String,
    inline_image: InlineImage,
}

impl WaterCupApp {
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        setup_chinese_fonts(&cc.egui_ctx);
        egui_extras::install_image_loaders(&cc.egui_ctx);

        let storage: Box<dyn CounterStorage> = match db::open_and_init() {
            Ok(db) => Box::new(db),
            Err(e) => {
                log::warn!("counter database unavailable, counting in memory only: {e}");
                Box::new(MemoryStorage::default())
            }
        };
        let mut counter = DailyCounterStore::new(storage, SystemClock);
        let count = Rc::new(Cell::new(counter.read().count));

        let shown = count.clone();
        let ctx = cc.egui_ctx.clone();
        counter.schedule_rollover(move |value| {
            shown.set(value);
            ctx.request_repaint();
        });

        let settings = SettingsStore::load(db::settings_path());
        let auto_launch = settings.get().auto_launch;
        if auto_launch != autolaunch::is_enabled() {
            if let Err(e) = autolaunch::set_enabled(auto_launch) {
                log::warn!("failed to apply launch-at-login preference: {e}");
            }
        }
        let image_input = settings.get().cup_image.clone().unwrap_or_default();

        log::info!("water cup started with count {}", count.get());
        Self {
            counter,
            count,
            gesture: GestureClassifier::new(),
            mover: WindowMover::default(),
            settings,
            presets: settings::list_presets(&settings::presets_dir()),
            show_settings: false,
            image_input,
            inline_image: InlineImage::default(),
        }
    }

    fn on_tap(&mut self) {
        self.count.set(self.counter.increment());
    }

    fn reset_count(&mut self) {
        self.counter.reset();
        self.count.set(0);
    }

    fn set_auto_launch(&mut self, enabled: bool) {
        self.settings.set_auto_launch(enabled);
        if let Err(e) = autolaunch::set_enabled(enabled) {
            log::warn!("failed to update launch at login: {e}");
        }
    }

    /// Ctrl/Cmd+Backspace 清零，Ctrl/Cmd+, 打开设置
    fn handle_shortcuts(&mut self, ctx: &egui::Context) {
        let (reset, open_settings) = ctx.input_mut(|i| {
            (
                i.consume_key(egui::Modifiers::COMMAND, egui::Key::Backspace),
                i.consume_key(egui::Modifiers::COMMAND, egui::Key::Comma),
            )
        });
        if reset {
            self.reset_count();
        }
        if open_settings {
            self.show_settings = true;
        }
    }

    /// 原始指针事件交给手势判别器
    fn handle_pointer(&mut self, ctx: &egui::Context) {
        let (events, ppp, outer) = ctx.input(|i| {
            (i.events.clone(), i.pixels_per_point(), i.viewport().outer_rect)
        });
        // 上一帧结束时的浮层状态
        let popup_open = egui::Popup::is_any_open(ctx);
        self.mover.sync(outer, ppp);

        for event in events {
            match event {
                egui::Event::PointerButton {
                    pos,
                    button,
                    pressed: true,
                    ..
                } => {
                    let over_popup = ctx
                        .layer_id_at(pos)
                        .is_some_and(|layer| layer.order != egui::Order::Background);
                    if accepts_press(popup_open, over_popup) {
                        self.gesture.press(map_button(button), self.mover.to_screen(pos, ppp));
                    }
                }
                egui::Event::PointerButton {
                    button,
                    pressed: false,
                    ..
                } => {
                    if let Some(GestureEvent::Increment) = self.gesture.release(map_button(button)) {
                        self.on_tap();
                    }
                }
                egui::Event::PointerMoved(pos) => {
                    let point = self.mover.to_screen(pos, ppp);
                    if let Some(GestureEvent::MoveBy { dx, dy }) = self.gesture.moved(point) {
                        self.mover.move_by(ctx, dx, dy, ppp);
                    }
                }
                egui::Event::WindowFocused(false) => self.gesture.cancel(),
                _ => {}
            }
        }
    }
}

impl eframe::App for WaterCupApp {
    fn clear_color(&self, _visuals: &egui::Visuals) -> [f32; 4] {
        egui::Rgba::TRANSPARENT.to_array()
    }

    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if let Some(wait) = self.counter.tick() {
            ctx.request_repaint_after(rollover_wake_after(wait));
        }
        self.handle_shortcuts(ctx);
        self.handle_pointer(ctx);

        self.ui_cup(ctx);

        if self.show_settings {
            self.show_settings_viewport(ctx);
        }
    }
}

impl Drop for WaterCupApp {
    fn drop(&mut self) {
        self.counter.cancel_rollover();
    }
}

impl WaterCupApp {
    fn ui_cup(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                let rect = ui.max_rect();
                let uri = match self.settings.get().cup_image.as_deref() {
                    Some(image) if image.starts_with("data:") => self.inline_image.resolve(ui.ctx(), image),
                    Some(image) => Some(image_uri(image)),
                    None => None,
                };
                match uri {
                    Some(uri) => {
                        egui::Image::from_uri(uri)
                            .fit_to_exact_size(rect.size())
                            .paint_at(ui, rect);
                    }
                    None => paint_default_cup(ui.painter(), rect),
                }

                let [r, g, b, a] = self.settings.get().number_color_rgba();
                ui.painter().text(
                    rect.center() + egui::vec2(-rect.width() * 0.05, rect.height() * 0.12),
                    egui::Align2::CENTER_CENTER,
                    self.count.get().to_string(),
                    egui::FontId::proportional(40.0),
                    egui::Color32::from_rgba_unmultiplied(r, g, b, a),
                );

                let response = ui.interact(rect, ui.id().with("cup"), egui::Sense::click());
                response.context_menu(|ui| {
                    if ui.button("偏好设置…").clicked() {
                        self.show_settings = true;
                        ui.close();
                    }
                    if ui.button("清零今日计数").clicked() {
                        self.reset_count();
                        ui.close();
                    }
                    ui.separator();
                    if ui.button("退出").clicked() {
                        ui.ctx().send_viewport_cmd(egui::ViewportCommand::Close);
                    }
                });
            });
    }

    fn show_settings_viewport(&mut self, ctx: &egui::Context) {
        let viewport_id = egui::ViewportId::from_hash_of("water_cup_settings");
        let builder = egui::ViewportBuilder::default()
            .with_title("设置")
            .with_inner_size([SETTINGS_SIZE.0, SETTINGS_SIZE.1]);

        ctx.show_viewport_immediate(viewport_id, builder, |ctx, _class| {
            if ctx.input(|i| i.viewport().close_requested()) {
                self.show_settings = false;
            }
            egui::CentralPanel::default().show(ctx, |ui| self.ui_settings(ui));
        });
    }

    fn ui_settings(&mut self, ui: &mut egui::Ui) {
        ui.heading("数字颜色");
        let mut color = self.settings.get().number_color_rgba();
        if ui.color_edit_button_srgba_unmultiplied(&mut color).changed() {
            self.settings.set_number_color(&settings::color_to_hex(color));
        }
        ui.add_space(12.0);

        ui.heading("杯子图片");
        ui.horizontal(|ui| {
            ui.add(egui::TextEdit::singleline(&mut self.image_input).hint_text("图片路径或 URI"));
            if ui.button("应用").clicked() {
                // 空白输入等同恢复默认
                self.settings.apply_partial(&json!({ "cupImage": self.image_input }));
            }
            if ui.button("恢复默认").clicked() {
                self.image_input.clear();
                self.settings.apply_partial(&json!({ "cupImage": null }));
            }
        });
        if !self.presets.is_empty() {
            ui.label("预设");
            let mut picked = None;
            ui.horizontal_wrapped(|ui| {
                for preset in &self.presets {
                    let image = egui::Image::from_uri(preset_uri(preset))
                        .fit_to_exact_size(egui::vec2(PRESET_THUMB, PRESET_THUMB));
                    let name = preset.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
                    if ui.add(egui::Button::image(image)).on_hover_text(name).clicked() {
                        picked = Some(preset.display().to_string());
                    }
                }
            });
            if let Some(path) = picked {
                self.image_input = path.clone();
                self.settings.set_cup_image(Some(path));
            }
        }
        ui.add_space(12.0);

        let mut auto_launch = self.settings.get().auto_launch;
        if ui.checkbox(&mut auto_launch, "开机自动启动").changed() {
            self.set_auto_launch(auto_launch);
        }
        ui.add_space(12.0);

        if ui.button("清零今日计数").clicked() {
            self.reset_count();
        }
        ui.label(format!("今日已喝 {} 杯", self.count.get()));
    }
}
