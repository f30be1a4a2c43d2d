//! 构建时生成杯子图标 icon.ico 并嵌入 Windows 可执行文件（任务栏/桌面/资源管理器显示）

/// 水的颜色
const WATER: [u8; 4] = [90, 170, 235, 255];
/// 杯壁颜色
const GLASS: [u8; 4] = [70, 110, 150, 255];

/// 梯形杯身：上宽下窄，下半部分为水
fn make_rgba_cup(size: u32) -> Vec<u8> {
    let s = size as f32;
    let (top, bottom) = (s * 0.12, s * 0.9);
    let (half_top, half_bottom) = (s * 0.36, s * 0.26);
    let water_line = s * 0.4;
    let wall = (s * 0.07).max(1.0);
    let cx = s * 0.5;

    let mut rgba = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let py = y as f32 + 0.5;
            let px = x as f32 + 0.5;
            let t = (py - top) / (bottom - top);
            let half = half_top + (half_bottom - half_top) * t;
            let dx = (px - cx).abs();
            let pixel = if !(0.0..=1.0).contains(&t) || dx > half {
                [0, 0, 0, 0]
            } else if dx > half - wall || py > bottom - wall {
                GLASS
            } else if py >= water_line {
                WATER
            } else {
                [0, 0, 0, 0]
            };
            rgba.extend_from_slice(&pixel);
        }
    }
    rgba
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    #[cfg(windows)]
    {
        let manifest_dir = std::path::PathBuf::from(std::env::var("CARGO_MANIFEST_DIR").unwrap());
        let icon_path = manifest_dir.join("icon.ico");

        let mut icon_dir = ico::IconDir::new(ico::ResourceType::Icon);
        for &size in &[16u32, 32u32, 48u32, 256u32] {
            let rgba = make_rgba_cup(size);
            let image = ico::IconImage::from_rgba_data(size, size, rgba);
            let entry = ico::IconDirEntry::encode(&image).expect("encode icon entry");
            icon_dir.add_entry(entry);
        }

        let mut file = std::fs::File::create(&icon_path).expect("create icon.ico");
        icon_dir.write(&mut file).expect("write icon.ico");

        let mut res = winres::WindowsResource::new();
        res.set_icon("icon.ico");
        if let Err(e) = res.compile() {
            eprintln!("winres: {} (若未装 Windows SDK/rc.exe，可忽略，图标将不嵌入 exe)", e);
        }
    }

    #[cfg(not(windows))]
    let _ = make_rgba_cup;
}
