//! Tray icon rendering and caching.

use std::sync::OnceLock;

use tray_icon::Icon;

/// Windows tray icons range from 16 px (100 % DPI) to 32 px (200 % DPI).
const TRAY_ICON_SIZE: u32 = 32;

/// RGBA pixel data cached for cheap cloning into `Icon`.
struct CachedIcon {
    rgba: Vec<u8>,
    width: u32,
    height: u32,
}

impl CachedIcon {
    fn render(muted: bool) -> Self {
        let img = crate::icon::render(muted, TRAY_ICON_SIZE);
        let (width, height) = img.dimensions();
        Self {
            rgba: img.into_raw(),
            width,
            height,
        }
    }

    fn to_icon(&self) -> Option<Icon> {
        match Icon::from_rgba(self.rgba.clone(), self.width, self.height) {
            Ok(icon) => Some(icon),
            Err(e) => {
                log::warn!("[tray] icon creation failed: {e}");
                None
            }
        }
    }
}

pub fn icon_live() -> Option<Icon> {
    static CACHE: OnceLock<CachedIcon> = OnceLock::new();
    CACHE.get_or_init(|| CachedIcon::render(false)).to_icon()
}

pub fn icon_muted() -> Option<Icon> {
    static CACHE: OnceLock<CachedIcon> = OnceLock::new();
    CACHE.get_or_init(|| CachedIcon::render(true)).to_icon()
}

pub fn icon_for(muted: bool) -> Option<Icon> {
    if muted { icon_muted() } else { icon_live() }
}
