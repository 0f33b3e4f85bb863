use eframe::egui::{self, Color32, Context, FontId, Rounding, TextStyle};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const DEFAULT_THEME: &str = "k_daylight";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeConfig {
    pub name: String,
    pub surface: String,
    pub panel: String,
    pub text: String,
    pub muted_text: String,
    pub accent: String,
    pub accent_soft: String,
    pub border: String,
    /// Used for inline errors and the chat apology line.
    #[serde(default = "default_danger")]
    pub danger: String,
    pub radius: f32,
    pub font_size_base: f32,
}

fn default_danger() -> String {
    "#d64545".to_string()
}

impl ThemeConfig {
    pub fn accent_color(&self) -> Color32 {
        parse_color(&self.accent).unwrap_or(Color32::LIGHT_BLUE)
    }

    pub fn muted_color(&self) -> Color32 {
        parse_color(&self.muted_text).unwrap_or(Color32::GRAY)
    }

    pub fn danger_color(&self) -> Color32 {
        parse_color(&self.danger).unwrap_or(Color32::RED)
    }

    fn is_dark(&self) -> bool {
        let bg = parse_color(&self.panel).unwrap_or(Color32::WHITE);
        let luminance =
            0.2126 * f32::from(bg.r()) + 0.7152 * f32::from(bg.g()) + 0.0722 * f32::from(bg.b());
        luminance < 128.0
    }
}

pub fn themes_dir(base: &Path) -> PathBuf {
    base.join("themes")
}

fn presets_file(base: &Path) -> PathBuf {
    themes_dir(base).join("presets.json")
}

/// Write the preset palette file on first run so it can be edited by hand.
pub fn ensure_theme_files(base: &Path) -> io::Result<()> {
    fs::create_dir_all(themes_dir(base))?;
    let path = presets_file(base);
    if !path.exists() {
        fs::write(&path, serde_json::to_string_pretty(&default_presets())?)?;
    }
    Ok(())
}

pub fn load_presets(base: &Path) -> Vec<ThemeConfig> {
    let path = presets_file(base);
    let Ok(contents) = fs::read_to_string(&path) else {
        return default_presets();
    };
    match serde_json::from_str::<Vec<ThemeConfig>>(&contents) {
        Ok(list) if !list.is_empty() => list,
        Ok(_) => default_presets(),
        Err(err) => {
            warn!(path = %path.display(), "ignoring unreadable theme presets: {err}");
            default_presets()
        }
    }
}

/// Pick a palette by name, falling back to the default one.
pub fn pick_theme(presets: &[ThemeConfig], preferred: Option<&str>) -> ThemeConfig {
    let wanted = preferred.unwrap_or(DEFAULT_THEME);
    presets
        .iter()
        .find(|t| t.name == wanted)
        .or_else(|| presets.iter().find(|t| t.name == DEFAULT_THEME))
        .or_else(|| presets.first())
        .cloned()
        .unwrap_or_else(|| default_presets().remove(0))
}

pub fn apply_theme(theme: &ThemeConfig, ctx: &Context) {
    let color = |hex: &str, fallback: Color32| parse_color(hex).unwrap_or(fallback);
    let text = color(&theme.text, Color32::BLACK);
    let surface = color(&theme.surface, Color32::LIGHT_GRAY);
    let accent = theme.accent_color();
    let accent_soft = color(&theme.accent_soft, accent);
    let rounding = Rounding::same(theme.radius);

    let mut visuals = if theme.is_dark() {
        egui::Visuals::dark()
    } else {
        egui::Visuals::light()
    };
    visuals.panel_fill = color(&theme.panel, Color32::WHITE);
    visuals.selection.bg_fill = accent_soft;
    visuals.hyperlink_color = accent;
    visuals.window_rounding = rounding;

    let widgets = &mut visuals.widgets;
    for state in [&mut widgets.noninteractive, &mut widgets.inactive] {
        state.bg_fill = surface;
        state.weak_bg_fill = surface;
        state.fg_stroke.color = text;
        state.bg_stroke.color = color(&theme.border, Color32::GRAY);
        state.rounding = rounding;
    }
    for state in [&mut widgets.hovered, &mut widgets.active] {
        state.bg_fill = accent_soft;
        state.weak_bg_fill = accent_soft;
        state.fg_stroke.color = text;
        state.bg_stroke.color = accent;
        state.rounding = rounding;
    }

    let base = theme.font_size_base;
    let mut style = (*ctx.style()).clone();
    style.text_styles = [
        (TextStyle::Small, FontId::proportional(base - 3.0)),
        (TextStyle::Body, FontId::proportional(base)),
        (TextStyle::Button, FontId::proportional(base)),
        (TextStyle::Heading, FontId::proportional(base + 8.0)),
        (TextStyle::Monospace, FontId::monospace(base - 2.0)),
    ]
    .into();
    style.visuals = visuals;
    ctx.set_style(style);
}

/// `#rrggbb` or `#rrggbbaa`.
fn parse_color(hex: &str) -> Option<Color32> {
    let digits = hex.trim().trim_start_matches('#');
    let value = u32::from_str_radix(digits, 16).ok()?;
    let [a, b, c, d] = value.to_be_bytes();
    match digits.len() {
        6 => Some(Color32::from_rgb(b, c, d)),
        8 => Some(Color32::from_rgba_unmultiplied(a, b, c, d)),
        _ => None,
    }
}

pub fn default_presets() -> Vec<ThemeConfig> {
    let palette = |name: &str, colors: [&str; 8], radius: f32, font: f32| ThemeConfig {
        name: name.to_string(),
        surface: colors[0].to_string(),
        panel: colors[1].to_string(),
        text: colors[2].to_string(),
        muted_text: colors[3].to_string(),
        accent: colors[4].to_string(),
        accent_soft: colors[5].to_string(),
        border: colors[6].to_string(),
        danger: colors[7].to_string(),
        radius,
        font_size_base: font,
    };
    vec![
        palette(
            "k_daylight",
            [
                "#f3f4fb", "#ffffff", "#1e1b4b", "#6b7280", "#6366f1", "#e0e7ff", "#d4d8e8",
                "#dc2626",
            ],
            8.0,
            16.0,
        ),
        palette(
            "k_midnight",
            [
                "#1e1b2e", "#13111f", "#ede9fe", "#a5a1c2", "#a78bfa", "#312a52", "#3b3556",
                "#f87171",
            ],
            8.0,
            16.0,
        ),
        palette(
            "calm_green",
            [
                "#eef7f1", "#fbfefc", "#123524", "#5b7a68", "#2f9e68", "#d3f0df", "#bfdccb",
                "#c0392b",
            ],
            10.0,
            16.0,
        ),
        palette(
            "high_contrast",
            [
                "#000000", "#0a0a0a", "#ffffff", "#d0d0d0", "#ffd500", "#4a3d00", "#ffffff",
                "#ff5c5c",
            ],
            0.0,
            18.0,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn parses_short_and_alpha_hex() {
        assert_eq!(parse_color("#6366f1"), Some(Color32::from_rgb(0x63, 0x66, 0xf1)));
        assert_eq!(
            parse_color("ff000080"),
            Some(Color32::from_rgba_unmultiplied(0xff, 0, 0, 0x80))
        );
        assert_eq!(parse_color("#abc"), None);
        assert_eq!(parse_color("purple"), None);
    }

    #[test]
    fn unknown_theme_name_falls_back_to_default() {
        let presets = default_presets();
        assert_eq!(pick_theme(&presets, Some("neon")).name, DEFAULT_THEME);
        assert_eq!(pick_theme(&presets, Some("k_midnight")).name, "k_midnight");
        assert!(pick_theme(&presets, Some("k_midnight")).is_dark());
    }

    #[test]
    fn presets_file_is_created_and_read_back() {
        let dir = TempDir::new().unwrap();
        ensure_theme_files(dir.path()).unwrap();
        assert_eq!(load_presets(dir.path()), default_presets());

        fs::write(presets_file(dir.path()), "{ not json").unwrap();
        assert_eq!(load_presets(dir.path()).len(), default_presets().len());
    }
}
