use std::ffi::OsString;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;
use tracing::{debug, info};

/// `SystemParametersInfoW` action that sets the desktop wallpaper.
#[cfg(any(windows, test))]
pub const SET_DESK_WALLPAPER: u32 = 20;

const GNOME_SCHEMA: &str = "org.gnome.desktop.background";
const GNOME_KEY: &str = "picture-uri";

#[derive(Debug, Error)]
pub enum WallpaperError {
    #[error("Failed to set wallpaper on {platform}: {detail}")]
    WallpaperSetFailed {
        platform: &'static str,
        detail: String,
    },
    #[error("OS {os} is not supported for setting wallpaper.")]
    UnsupportedPlatform { os: String },
}

/// Host platform as far as wallpaper support is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Platform {
    Windows,
    LinuxGnome,
    Unsupported(String),
}

impl Platform {
    pub fn detect() -> Self {
        Self::from_os(std::env::consts::OS)
    }

    pub fn from_os(os: &str) -> Self {
        match os {
            "windows" => Self::Windows,
            "linux" => Self::LinuxGnome,
            other => Self::Unsupported(other.to_string()),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Windows => f.write_str("windows"),
            Self::LinuxGnome => f.write_str("linux-gnome"),
            Self::Unsupported(os) => write!(f, "unsupported ({os})"),
        }
    }
}

pub trait WallpaperSetter {
    fn apply(&self, image_path: &Path) -> Result<(), WallpaperError>;
}

/// Picks the setter for `platform`. Done once at startup.
pub fn setter_for(platform: &Platform) -> Box<dyn WallpaperSetter> {
    debug!(%platform, "selecting wallpaper setter");
    match platform {
        Platform::Windows => Box::new(WindowsWallpaperSetter),
        Platform::LinuxGnome => Box::new(GnomeWallpaperSetter::default()),
        Platform::Unsupported(os) => Box::new(UnsupportedWallpaperSetter { os: os.clone() }),
    }
}

fn absolute(image_path: &Path, platform: &'static str) -> Result<PathBuf, WallpaperError> {
    std::path::absolute(image_path).map_err(|err| WallpaperError::WallpaperSetFailed {
        platform,
        detail: format!("cannot resolve {}: {err}", image_path.display()),
    })
}

pub struct WindowsWallpaperSetter;

impl WallpaperSetter for WindowsWallpaperSetter {
    fn apply(&self, image_path: &Path) -> Result<(), WallpaperError> {
        let abs_path = absolute(image_path, "Windows")?;
        set_desktop_wallpaper(&abs_path).map_err(|err| WallpaperError::WallpaperSetFailed {
            platform: "Windows",
            detail: err.to_string(),
        })?;
        info!(path = %abs_path.display(), "wallpaper set");
        Ok(())
    }
}

#[cfg(windows)]
fn set_desktop_wallpaper(abs_path: &Path) -> io::Result<()> {
    use std::os::windows::ffi::OsStrExt;
    use windows_sys::Win32::UI::WindowsAndMessaging::SystemParametersInfoW;

    let mut wide: Vec<u16> = abs_path
        .as_os_str()
        .encode_wide()
        .chain(std::iter::once(0))
        .collect();
    // SAFETY: `wide` is NUL-terminated UTF-16 and outlives the call.
    let ok = unsafe { SystemParametersInfoW(SET_DESK_WALLPAPER, 0, wide.as_mut_ptr().cast(), 0) };
    if ok == 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

#[cfg(not(windows))]
fn set_desktop_wallpaper(_abs_path: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "SystemParametersInfoW is only available on Windows builds",
    ))
}

/// Sets the GNOME background through `gsettings`.
pub struct GnomeWallpaperSetter {
    program: OsString,
}

impl Default for GnomeWallpaperSetter {
    fn default() -> Self {
        Self::with_program("gsettings")
    }
}

impl GnomeWallpaperSetter {
    pub fn with_program(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl WallpaperSetter for GnomeWallpaperSetter {
    fn apply(&self, image_path: &Path) -> Result<(), WallpaperError> {
        let abs_path = absolute(image_path, "Linux")?;
        let args = gsettings_args(&abs_path);
        debug!(program = ?self.program, ?args, "running gsettings");

        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .map_err(|err| WallpaperError::WallpaperSetFailed {
                platform: "Linux",
                detail: format!("could not run gsettings ({err}). Check if `gsettings` is installed."),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(WallpaperError::WallpaperSetFailed {
                platform: "Linux",
                detail: format!(
                    "gsettings exited with {} {}. Check if `gsettings` is installed.",
                    output.status,
                    stderr.trim()
                ),
            });
        }

        info!(path = %abs_path.display(), "wallpaper set");
        Ok(())
    }
}

/// Arguments for `gsettings` that point the GNOME background at `abs_path`.
fn gsettings_args(abs_path: &Path) -> [String; 4] {
    let uri = format!("file://{}", abs_path.display());
    [
        "set".to_string(),
        GNOME_SCHEMA.to_string(),
        GNOME_KEY.to_string(),
        format!("'{}'", uri.replace('\\', "\\\\").replace('\'', "\\'")),
    ]
}

/// Stand-in for hosts with no wallpaper support; always fails.
pub struct UnsupportedWallpaperSetter {
    os: String,
}

impl WallpaperSetter for UnsupportedWallpaperSetter {
    fn apply(&self, _image_path: &Path) -> Result<(), WallpaperError> {
        Err(WallpaperError::UnsupportedPlatform {
            os: self.os.clone(),
        })
    }
}
