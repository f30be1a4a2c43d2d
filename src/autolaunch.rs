//! 开机自启：把当前可执行文件登记到系统的登录启动项
//!
//! - Linux：`~/.config/autostart/water-cup.desktop`
//! - macOS：`~/Library/LaunchAgents/com.watercup.app.plist`
//! - Windows：`HKCU\Software\Microsoft\Windows\CurrentVersion\Run` 下的 `WaterCup`（直接调用注册表 API）

use std::path::{Path, PathBuf};

use crate::error::{Result, StoreError};

const APP_NAME: &str = "WaterCup";
const LAUNCH_AGENT_LABEL: &str = "com.watercup.app";

/// 打开或关闭开机自启
pub fn set_enabled(enabled: bool) -> Result<()> {
    let exe = std::env::current_exe()?;
    imp::set_enabled(&exe, enabled)?;
    log::info!("launch at login {}", if enabled { "enabled" } else { "disabled" });
    Ok(())
}

/// 系统中是否已登记
pub fn is_enabled() -> bool {
    imp::is_enabled()
}

/// XDG autostart 条目
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn desktop_entry(exe: &Path) -> String {
    format!(
        "[Desktop Entry]\nType=Application\nName={APP_NAME}\nExec=\"{}\"\nX-GNOME-Autostart-enabled=true\nNoDisplay=true\n",
        exe.display()
    )
}

/// launchd 用户代理
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
fn launch_agent_plist(exe: &Path) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>Label</key>
    <string>{LAUNCH_AGENT_LABEL}</string>
    <key>ProgramArguments</key>
    <array>
        <string>{}</string>
    </array>
    <key>RunAtLoad</key>
    <true/>
</dict>
</plist>
"#,
        exe.display()
    )
}

/// 写入或删除登记文件；删除时文件本就不存在不算错误
#[cfg_attr(not(any(target_os = "linux", target_os = "macos")), allow(dead_code))]
fn write_or_remove(path: &Path, contents: Option<String>) -> Result<()> {
    match contents {
        Some(contents) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, contents)?;
        }
        None => match std::fs::remove_file(path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(e.into()),
            _ => {}
        },
    }
    Ok(())
}

/// 以 NUL 结尾的 UTF-16 字符串，供 Win32 宽字符 API 使用
#[cfg_attr(not(windows), allow(dead_code))]
fn to_wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

#[cfg_attr(not(any(target_os = "linux", target_os = "macos")), allow(dead_code))]
fn entry_path(base: Option<PathBuf>, relative: &str) -> Result<PathBuf> {
    base.map(|dir| dir.join(relative))
        .ok_or_else(|| StoreError::AutoLaunch("cannot locate user directory".into()))
}

#[cfg(target_os = "linux")]
mod imp {
    use super::*;

    fn path() -> Result<PathBuf> {
        entry_path(dirs::config_dir(), "autostart/water-cup.desktop")
    }

    pub fn set_enabled(exe: &Path, enabled: bool) -> Result<()> {
        write_or_remove(&path()?, enabled.then(|| desktop_entry(exe)))
    }

    pub fn is_enabled() -> bool {
        path().is_ok_and(|p| p.is_file())
    }
}

#[cfg(target_os = "macos")]
mod imp {
    use super::*;

    fn path() -> Result<PathBuf> {
        entry_path(
            dirs::home_dir(),
            &format!("Library/LaunchAgents/{LAUNCH_AGENT_LABEL}.plist"),
        )
    }

    pub fn set_enabled(exe: &Path, enabled: bool) -> Result<()> {
        write_or_remove(&path()?, enabled.then(|| launch_agent_plist(exe)))
    }

    pub fn is_enabled() -> bool {
        path().is_ok_and(|p| p.is_file())
    }
}

#[cfg(windows)]
mod imp {
    use super::*;
    use windows_sys::Win32::Foundation::{ERROR_FILE_NOT_FOUND, ERROR_SUCCESS};
    use windows_sys::Win32::System::Registry::{
        HKEY, HKEY_CURRENT_USER, KEY_QUERY_VALUE, KEY_SET_VALUE, REG_SZ, RegCloseKey, RegDeleteValueW,
        RegOpenKeyExW, RegQueryValueExW, RegSetValueExW,
    };

    const RUN_KEY: &str = r"Software\Microsoft\Windows\CurrentVersion\Run";

    /// 已打开的 Run 键，离开作用域时关闭
    struct RunKey(HKEY);

    impl RunKey {
        fn open(access: u32) -> Result<Self> {
            let subkey = to_wide(RUN_KEY);
            let mut key: HKEY = std::ptr::null_mut();
            let status = unsafe { RegOpenKeyExW(HKEY_CURRENT_USER, subkey.as_ptr(), 0, access, &mut key) };
            check(status, "RegOpenKeyExW")?;
            Ok(Self(key))
        }
    }

    impl Drop for RunKey {
        fn drop(&mut self) {
            unsafe {
                RegCloseKey(self.0);
            }
        }
    }

    fn check(status: u32, call: &str) -> Result<()> {
        if status == ERROR_SUCCESS {
            Ok(())
        } else {
            Err(StoreError::AutoLaunch(format!("{call} failed with code {status}")))
        }
    }

    pub fn set_enabled(exe: &Path, enabled: bool) -> Result<()> {
        let key = RunKey::open(KEY_SET_VALUE)?;
        let name = to_wide(APP_NAME);
        if enabled {
            let value = to_wide(&format!("\"{}\"", exe.display()));
            let status = unsafe {
                RegSetValueExW(
                    key.0,
                    name.as_ptr(),
                    0,
                    REG_SZ,
                    value.as_ptr().cast(),
                    (value.len() * std::mem::size_of::<u16>()) as u32,
                )
            };
            check(status, "RegSetValueExW")
        } else {
            match unsafe { RegDeleteValueW(key.0, name.as_ptr()) } {
                ERROR_FILE_NOT_FOUND => Ok(()),
                status => check(status, "RegDeleteValueW"),
            }
        }
    }

    pub fn is_enabled() -> bool {
        let Ok(key) = RunKey::open(KEY_QUERY_VALUE) else {
            return false;
        };
        let name = to_wide(APP_NAME);
        let status = unsafe {
            RegQueryValueExW(
                key.0,
                name.as_ptr(),
                std::ptr::null_mut(),
                std::ptr::null_mut(),
                std::ptr::null_mut(),
                std::ptr::null_mut(),
            )
        };
        status == ERROR_SUCCESS
    }
}

#[cfg(not(any(target_os = "linux", target_os = "macos", windows)))]
mod imp {
    use super::*;

    pub fn set_enabled(_exe: &Path, _enabled: bool) -> Result<()> {
        Err(StoreError::AutoLaunch("unsupported platform".into()))
    }

    pub fn is_enabled() -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn desktop_entry_quotes_exec_path() {
        let entry = desktop_entry(Path::new("/opt/water cup/water-cup"));
        assert!(entry.starts_with("[Desktop Entry]\n"));
        assert!(entry.contains("Exec=\"/opt/water cup/water-cup\"\n"));
    }

    #[test]
    fn launch_agent_runs_at_load() {
        let plist = launch_agent_plist(Path::new("/Applications/WaterCup.app/Contents/MacOS/water-cup"));
        assert!(plist.contains("<string>com.watercup.app</string>"));
        assert!(plist.contains("<key>RunAtLoad</key>\n    <true/>"));
    }

    #[test]
    fn removing_missing_entry_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("autostart/water-cup.desktop");
        write_or_remove(&path, Some("x".into())).unwrap();
        assert!(path.is_file());
        write_or_remove(&path, None).unwrap();
        write_or_remove(&path, None).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn wide_strings_are_nul_terminated_utf16() {
        assert_eq!(to_wide("Run"), vec![b'R' as u16, b'u' as u16, b'n' as u16, 0]);
        assert_eq!(to_wide("杯"), vec![0x676f, 0]);
        assert_eq!(to_wide(""), vec![0]);
    }
}
