//! Grayscale layout of the spending totals for the e-ink canvas.

mod compose;
mod fonts;

use std::path::{Path, PathBuf};

use ab_glyph::FontVec;
use image::{GrayImage, ImageFormat, Luma};
use imageproc::drawing::{draw_text_mut, text_size};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::spending::Spending;
use crate::weather::{self, Weather};

pub use fonts::{download_missing as download_fonts, Fonts};

const BACKGROUND: u8 = 232;

const OVERLAY_FILE: &str = "character.png";
const OVERLAY_HEIGHT: u32 = 350;
const OVERLAY_BOTTOM_BLEED: i64 = 32;

const WEATHER_DIR: &str = "weather";
const WEATHER_PADDING: i32 = 40;
const WEATHER_TEXT_Y: i32 = 40;
const ICON_SIZE: u32 = 48;
const ICON_GAP: i32 = 12;
const ICON_Y: i64 = 38;

const TOTALS_TOP: i32 = 340;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no usable font found at {} or among the system serif fonts", .0.display())]
    NoFont(PathBuf),
    #[error("invalid font file {}", .0.display())]
    Font(PathBuf),
    #[error("failed to read {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error("failed to move rendered image into place at {}", .path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Pixel dimensions of the target display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

impl Default for Canvas {
    fn default() -> Self {
        Self {
            width: 1072,
            height: 1448,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct TextStyle {
    size: f32,
    shade: u8,
}

const LABEL: TextStyle = TextStyle { size: 36.0, shade: 150 };
const DAY: TextStyle = TextStyle { size: 80.0, shade: 100 };
const WEEK: TextStyle = TextStyle { size: 115.0, shade: 60 };
const MONTH: TextStyle = TextStyle { size: 200.0, shade: 0 };
const TEMPERATURE: TextStyle = TextStyle { size: 42.0, shade: 100 };

pub struct Renderer {
    canvas: Canvas,
    fonts: Fonts,
    assets_dir: PathBuf,
    overlay_opacity: f32,
}

impl Renderer {
    pub fn new(canvas: Canvas, fonts: Fonts, assets_dir: impl Into<PathBuf>, overlay_opacity: f32) -> Self {
        Self {
            canvas,
            fonts,
            assets_dir: assets_dir.into(),
            overlay_opacity,
        }
    }

    #[tracing::instrument(skip_all)]
    pub fn render(&self, spending: &Spending, weather: Option<&Weather>) -> GrayImage {
        let mut img = background(
            self.canvas,
            &self.assets_dir.join(OVERLAY_FILE),
            self.overlay_opacity,
        );

        if let Some(weather) = weather {
            self.draw_weather(&mut img, weather);
        }
        self.draw_totals(&mut img, spending);

        img
    }

    fn draw_weather(&self, img: &mut GrayImage, weather: &Weather) {
        let font = self.fonts.regular();
        let scale = fonts::em_scale(font, TEMPERATURE.size);
        let text = format!("{}°", weather.temperature);
        let (width, _) = text_size(scale, font, &text);

        let temp_x = self.canvas.width as i32 - WEATHER_PADDING - width as i32;
        let icon_x = temp_x - ICON_SIZE as i32 - ICON_GAP;

        let icon_path = self
            .assets_dir
            .join(WEATHER_DIR)
            .join(weather::icon_name(weather.code, weather.is_day));
        match compose::load_icon(&icon_path, ICON_SIZE) {
            Ok(Some(icon)) => compose::composite(img, &icon, icon_x as i64, ICON_Y, 1.0),
            Ok(None) => debug!("No weather icon at {}.", icon_path.display()),
            Err(err) => warn!("Could not load weather icon {}: {}", icon_path.display(), err),
        }

        draw_text_mut(
            img,
            Luma([TEMPERATURE.shade]),
            temp_x,
            WEATHER_TEXT_Y,
            scale,
            font,
            &text,
        );
    }

    fn draw_totals(&self, img: &mut GrayImage, spending: &Spending) {
        let center_x = self.canvas.width as i32 / 2;
        let rows = [
            ("DAY", 0, 45, spending.day, DAY, self.fonts.regular()),
            ("WEEK", 170, 45, spending.week, WEEK, self.fonts.medium()),
            ("MONTH", 380, 50, spending.month, MONTH, self.fonts.semibold()),
        ];

        for (label, offset, gap, amount, style, font) in rows {
            let top = TOTALS_TOP + offset;
            draw_centered(img, self.fonts.regular(), LABEL, center_x, top, label);
            draw_centered(img, font, style, center_x, top + gap, &format_amount(amount));
        }
    }
}

fn draw_centered(
    img: &mut GrayImage,
    font: &FontVec,
    style: TextStyle,
    center_x: i32,
    y: i32,
    text: &str,
) {
    let scale = fonts::em_scale(font, style.size);
    let (width, _) = text_size(scale, font, text);
    draw_text_mut(
        img,
        Luma([style.shade]),
        center_x - width as i32 / 2,
        y,
        scale,
        font,
        text,
    );
}

/// Blank canvas with the decorative overlay, if present, composited at
/// `opacity` along the bottom edge.
pub fn background(canvas: Canvas, overlay: &Path, opacity: f32) -> GrayImage {
    let mut img = GrayImage::from_pixel(canvas.width, canvas.height, Luma([BACKGROUND]));

    match compose::load_scaled(overlay, OVERLAY_HEIGHT) {
        Ok(Some(character)) => {
            let x = (canvas.width as i64 - character.width() as i64) / 2;
            let y = canvas.height as i64 - OVERLAY_HEIGHT as i64 + OVERLAY_BOTTOM_BLEED;
            compose::composite(&mut img, &character, x, y, opacity);
        }
        Ok(None) => debug!("No overlay image at {}.", overlay.display()),
        Err(err) => warn!("Could not load overlay image {}: {}", overlay.display(), err),
    }

    img
}

/// Whole currency units, half-to-even, with thousands separators: `$2,847`.
pub fn format_amount(amount: Decimal) -> String {
    let whole = amount.round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven);
    let digits = whole.abs().trunc().to_string();

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    if whole.is_sign_negative() && !whole.is_zero() {
        format!("-${}", grouped)
    } else {
        format!("${}", grouped)
    }
}

/// Writes `img` as a PNG at `path`, replacing any previous image only once
/// the new one is fully written.
pub fn write_png(img: &GrayImage, path: &Path) -> Result<(), Error> {
    let mut staging = path.as_os_str().to_owned();
    staging.push(".tmp");
    let staging = PathBuf::from(staging);

    img.save_with_format(&staging, ImageFormat::Png)?;
    std::fs::rename(&staging, path).map_err(|source| Error::Persist {
        path: path.to_path_buf(),
        source,
    })?;

    info!("Generated {}.", path.display());
    Ok(())
}
