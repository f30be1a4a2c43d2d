//! 用户偏好：杯子图片、数字颜色、开机自启。保存为 JSON 文件
//!
//! 读取与合并都按字段进行：某个字段类型不对时只忽略该字段，其余照常生效。

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// 默认数字颜色
pub const DEFAULT_NUMBER_COLOR: &str = "#1a1a1a";

/// 预设杯子图片目录名
pub const PRESETS_DIR: &str = "images_default";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceRecord {
    /// 图片路径或 URI；`None` 时绘制内置杯子
    pub cup_image: Option<String>,
    pub number_color: String,
    pub auto_launch: bool,
}

impl Default for PreferenceRecord {
    fn default() -> Self {
        Self {
            cup_image: None,
            number_color: DEFAULT_NUMBER_COLOR.to_owned(),
            auto_launch: false,
        }
    }
}

impl PreferenceRecord {
    /// 合并一份（可能不完整的）JSON 对象，返回是否有字段发生变化
    pub fn merge(&mut self, value: &Value) -> bool {
        let Some(obj) = value.as_object() else {
            log::warn!("ignoring settings payload that is not an object");
            return false;
        };
        let before = self.clone();

        match obj.get("cupImage") {
            Some(Value::String(s)) if !s.trim().is_empty() => self.cup_image = Some(s.trim().to_owned()),
            Some(Value::String(_)) | Some(Value::Null) => self.cup_image = None,
            Some(other) => log::warn!("ignoring cupImage of unexpected type: {other}"),
            None => {}
        }
        match obj.get("numberColor") {
            Some(Value::String(s)) if parse_hex_color(s).is_some() => self.number_color = s.trim().to_owned(),
            Some(other) => log::warn!("ignoring invalid numberColor: {other}"),
            None => {}
        }
        match obj.get("autoLaunch") {
            Some(Value::Bool(b)) => self.auto_launch = *b,
            Some(other) => log::warn!("ignoring autoLaunch of unexpected type: {other}"),
            None => {}
        }

        *self != before
    }

    /// 数字颜色 RGBA，解析失败时回退默认色
    pub fn number_color_rgba(&self) -> [u8; 4] {
        parse_hex_color(&self.number_color)
            .or_else(|| parse_hex_color(DEFAULT_NUMBER_COLOR))
            .unwrap_or([26, 26, 26, 255])
    }
}

/// 设置文件读写
pub struct SettingsStore {
    path: PathBuf,
    data: PreferenceRecord,
}

impl SettingsStore {
    /// 读取设置文件；文件不存在或损坏时使用默认值
    pub fn load(path: PathBuf) -> Self {
        let mut data = PreferenceRecord::default();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<Value>(&contents) {
                Ok(value) => {
                    data.merge(&value);
                }
                Err(e) => log::warn!("settings file {} is not valid JSON: {e}", path.display()),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("failed to read settings from {}: {e}", path.display()),
        }
        Self { path, data }
    }

    pub fn get(&self) -> &PreferenceRecord {
        &self.data
    }

    /// 合并部分更新并保存，返回是否有变化
    pub fn apply_partial(&mut self, partial: &Value) -> bool {
        let changed = self.data.merge(partial);
        if changed {
            self.persist_or_warn();
        }
        changed
    }

    pub fn set_cup_image(&mut self, image: Option<String>) {
        let image = image.map(|s| s.trim().to_owned()).filter(|s| !s.is_empty());
        if self.data.cup_image != image {
            self.data.cup_image = image;
            self.persist_or_warn();
        }
    }

    /// 非法颜色串会被忽略
    pub fn set_number_color(&mut self, color: &str) {
        let color = color.trim();
        if parse_hex_color(color).is_none() {
            log::warn!("ignoring invalid number color {color:?}");
            return;
        }
        if self.data.number_color != color {
            self.data.number_color = color.to_owned();
            self.persist_or_warn();
        }
    }

    pub fn set_auto_launch(&mut self, enabled: bool) {
        if self.data.auto_launch != enabled {
            self.data.auto_launch = enabled;
            self.persist_or_warn();
        }
    }

    pub fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let serialized = serde_json::to_string_pretty(&self.data)?;
        fs::write(&self.path, serialized)?;
        Ok(())
    }

    fn persist_or_warn(&self) {
        if let Err(e) = self.persist() {
            log::warn!("failed to write settings to {}: {e}", self.path.display());
        }
    }
}

/// 解析 `#rgb` / `#rrggbb` / `#rrggbbaa`（`#` 可省略）
pub fn parse_hex_color(s: &str) -> Option<[u8; 4]> {
    let hex = s.trim().trim_start_matches('#');
    if !hex.is_ascii() {
        return None;
    }
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    match hex.len() {
        3 => {
            let mut out = [255u8; 4];
            for (i, c) in hex.chars().enumerate() {
                let v = c.to_digit(16)? as u8;
                out[i] = v * 17;
            }
            Some(out)
        }
        6 => Some([byte(0)?, byte(2)?, byte(4)?, 255]),
        8 => Some([byte(0)?, byte(2)?, byte(4)?, byte(6)?]),
        _ => None,
    }
}

/// 颜色转 `#rrggbb`，不透明时省略 alpha
pub fn color_to_hex(rgba: [u8; 4]) -> String {
    let [r, g, b, a] = rgba;
    if a == 255 {
        format!("#{r:02x}{g:02x}{b:02x}")
    } else {
        format!("#{r:02x}{g:02x}{b:02x}{a:02x}")
    }
}

/// 预设图片目录：优先可执行文件旁，其次当前目录
pub fn presets_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(PRESETS_DIR)))
        .filter(|dir| dir.is_dir())
        .unwrap_or_else(|| PathBuf::from(PRESETS_DIR))
}

/// 列出目录下的 svg / png 预设，按文件名排序；目录不存在时为空
pub fn list_presets(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter(|p| {
            p.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("svg") || ext.eq_ignore_ascii_case("png"))
        })
        .collect();
    files.sort();
    files
}
