use std::path::Path;
use std::time::Duration;

use ab_glyph::{Font, FontVec, PxScale};
use anyhow::Result;
use tracing::{info, warn};

use super::Error;

const FONT_BASE_URL: &str =
    "https://raw.githubusercontent.com/google/fonts/main/ofl/cormorantgaramond";
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

const REGULAR: &str = "CormorantGaramond-Regular.ttf";
const MEDIUM: &str = "CormorantGaramond-Medium.ttf";
const SEMIBOLD: &str = "CormorantGaramond-SemiBold.ttf";

const SYSTEM_SERIF_PATHS: [&str; 3] = [
    "/usr/share/fonts/truetype/liberation/LiberationSerif-Regular.ttf",
    "/usr/share/fonts/truetype/liberation2/LiberationSerif-Regular.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSerif.ttf",
];

pub struct Fonts {
    regular: FontVec,
    medium: Option<FontVec>,
    semibold: Option<FontVec>,
}

impl Fonts {
    /// Loads the display faces from `dir`. Medium and SemiBold fall back to
    /// Regular; a missing Regular falls back to a system serif for every size.
    pub fn load(dir: &Path) -> Result<Self, Error> {
        let regular_path = dir.join(REGULAR);
        let regular = match read_font(&regular_path) {
            Ok(font) => font,
            Err(err) => {
                warn!("Could not load {}: {}", regular_path.display(), err);
                return Self::system().ok_or(Error::NoFont(regular_path));
            }
        };

        Ok(Self {
            regular,
            medium: optional_font(&dir.join(MEDIUM)),
            semibold: optional_font(&dir.join(SEMIBOLD)),
        })
    }

    /// The first installed system serif, used for every size.
    pub fn system() -> Option<Self> {
        SYSTEM_SERIF_PATHS
            .iter()
            .map(Path::new)
            .filter(|path| path.exists())
            .find_map(|path| read_font(path).ok())
            .map(|regular| Self {
                regular,
                medium: None,
                semibold: None,
            })
    }

    pub fn regular(&self) -> &FontVec {
        &self.regular
    }

    pub fn medium(&self) -> &FontVec {
        self.medium.as_ref().unwrap_or(&self.regular)
    }

    pub fn semibold(&self) -> &FontVec {
        self.semibold.as_ref().unwrap_or_else(|| self.medium())
    }
}

fn read_font(path: &Path) -> Result<FontVec, Error> {
    let bytes = std::fs::read(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;

    FontVec::try_from_vec(bytes).map_err(|_| Error::Font(path.to_path_buf()))
}

fn optional_font(path: &Path) -> Option<FontVec> {
    match read_font(path) {
        Ok(font) => Some(font),
        Err(err) => {
            warn!("{}, falling back to the regular face", err);
            None
        }
    }
}

/// Pixel scale for a font size given in em pixels.
pub fn em_scale(font: &impl Font, size: f32) -> PxScale {
    match font.units_per_em() {
        Some(units) if units > 0.0 => PxScale::from(size * font.height_unscaled() / units),
        _ => PxScale::from(size),
    }
}

/// Downloads any display face missing from `dir`. Failures are logged; the
/// fallbacks in [`Fonts::load`] take over.
pub async fn download_missing(dir: &Path) {
    let client = match reqwest::Client::builder()
        .timeout(DOWNLOAD_TIMEOUT)
        .user_agent("Mozilla/5.0")
        .build()
    {
        Ok(client) => client,
        Err(err) => {
            warn!("Could not build font download client: {}", err);
            return;
        }
    };

    for face in [REGULAR, MEDIUM, SEMIBOLD] {
        let path = dir.join(face);
        if path.exists() {
            continue;
        }

        match download(&client, &format!("{}/{}", FONT_BASE_URL, face), &path).await {
            Ok(()) => info!("Downloaded font {}.", path.display()),
            Err(err) => warn!("Could not download font {}: {:#}", face, err),
        }
    }
}

async fn download(client: &reqwest::Client, url: &str, path: &Path) -> Result<()> {
    let bytes = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .bytes()
        .await?;

    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, &bytes)?;

    Ok(())
}
