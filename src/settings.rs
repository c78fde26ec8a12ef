use std::path::PathBuf;

use chrono_tz::Tz;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::render::Canvas;
use crate::spending::{WeekWindow, DEFAULT_EXCLUDED_CATEGORIES};
use crate::weather::Location;
use crate::CLIENT_NAME;

const CONFIG_NAME: &str = "config.toml";
const ENV_PREFIX: &str = "BUDGET_DISPLAY";

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub output: PathBuf,
    pub timezone: String,
    pub lookback_days: u32,
    pub excluded_categories: Vec<String>,
    pub week_window: WeekWindow,
    pub overlay_opacity: f32,
    pub assets_dir: PathBuf,
    pub fonts_dir: PathBuf,
    pub canvas: Canvas,
    pub weather: WeatherSettings,
}

#[derive(Debug, Deserialize)]
pub struct WeatherSettings {
    pub enabled: bool,
    pub latitude: f64,
    pub longitude: f64,
}

impl WeatherSettings {
    pub fn location(&self) -> Location {
        Location {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

impl Settings {
    pub fn new(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let file = match config_path {
            Some(path) => File::with_name(path),
            None => File::with_name(&default_config_path()).required(false),
        };

        Self::from_builder(Self::defaults()?.add_source(file).add_source(environment()))
    }

    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        let canvas = Canvas::default();

        Config::builder()
            .set_default("output", "display.png")?
            .set_default("timezone", "America/Los_Angeles")?
            .set_default("lookback_days", 35_i64)?
            .set_default("excluded_categories", DEFAULT_EXCLUDED_CATEGORIES.to_vec())?
            .set_default("week_window", "rolling")?
            .set_default("overlay_opacity", 0.70_f64)?
            .set_default("assets_dir", "assets")?
            .set_default("fonts_dir", "fonts")?
            .set_default("canvas.width", canvas.width as i64)?
            .set_default("canvas.height", canvas.height as i64)?
            .set_default("weather.enabled", true)?
            .set_default("weather.latitude", 33.6846_f64)?
            .set_default("weather.longitude", -117.8265_f64)
    }

    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, ConfigError> {
        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;

        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.tz()?;

        if !(0.0..=1.0).contains(&self.overlay_opacity) {
            return Err(ConfigError::Message(format!(
                "overlay_opacity must be between 0 and 1, got {}",
                self.overlay_opacity
            )));
        }

        if self.canvas.width == 0 || self.canvas.height == 0 {
            return Err(ConfigError::Message(format!(
                "canvas must not be empty, got {}x{}",
                self.canvas.width, self.canvas.height
            )));
        }

        Ok(())
    }

    /// The zone whose calendar decides what "today" is.
    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse()
            .map_err(|_| ConfigError::Message(format!("invalid timezone: {}", self.timezone)))
    }
}

/// `BUDGET_DISPLAY_` variables, `__` between nested keys and commas between
/// excluded categories.
fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("excluded_categories")
}

pub(crate) fn default_config_path() -> String {
    dirs::config_dir()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| std::env::temp_dir()))
        .join(CLIENT_NAME)
        .join(CONFIG_NAME)
        .display()
        .to_string()
}
