use std::io::stdout;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use clap::ArgMatches;
use tracing::{info, warn};

use crate::core::Transaction;
use crate::display::{print_totals, print_transactions};
use crate::plaid::{Credentials, Plaid};
use crate::render::{download_fonts, format_amount, write_png, Fonts, Renderer};
use crate::settings::Settings;
use crate::spending::{self, ExclusionSet, Spending, WeekWindow};
use crate::upstream::{plaid::Source, TransactionSource};
use crate::weather::{self, OpenMeteo};

/// First and last day to request so that every window is fully covered.
fn fetch_window(today: NaiveDate, lookback_days: u32, week: WeekWindow) -> (NaiveDate, NaiveDate) {
    let start = (today - Duration::days(lookback_days as i64))
        .min(spending::month_start(today))
        .min(week.start(today));

    (start, today)
}

/// `--date` if given, otherwise the calendar date at `now` in `tz`.
fn resolve_today(date: Option<&str>, tz: Tz, now: DateTime<Utc>) -> Result<NaiveDate> {
    match date {
        Some(date) => NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .with_context(|| format!("invalid --date {}, expected YYYY-MM-DD", date)),
        None => Ok(now.with_timezone(&tz).date_naive()),
    }
}

async fn collect<S: TransactionSource + Sync>(
    source: &S,
    today: NaiveDate,
    lookback_days: u32,
    week: WeekWindow,
) -> Result<Vec<Transaction>> {
    let (start, end) = fetch_window(today, lookback_days, week);
    info!("Pulling transactions from {} through {}.", start, end);

    source
        .transactions(start, end)
        .await
        .context("failed to fetch transactions")
}

/// Transactions for the current windows, or `None` when running on sample data.
#[tracing::instrument(skip(settings))]
async fn fetch(settings: &Settings, today: NaiveDate, demo: bool) -> Result<Option<Vec<Transaction>>> {
    if demo {
        info!("Demo mode requested, using sample data.");
        return Ok(None);
    }

    let credentials = match Credentials::from_env().context("failed to read plaid credentials")? {
        Some(credentials) => credentials,
        None => {
            info!("Plaid credentials not configured, using sample data.");
            return Ok(None);
        }
    };

    let client = Plaid::new(credentials)?;
    let txns = collect(
        &Source::new(&client),
        today,
        settings.lookback_days,
        settings.week_window,
    )
    .await?;

    Ok(Some(txns))
}

fn totals(settings: &Settings, txns: Option<&[Transaction]>, today: NaiveDate) -> Spending {
    let spending = match txns {
        Some(txns) => Spending::calculate(
            txns,
            &ExclusionSet::new(settings.excluded_categories.iter().cloned()),
            today,
            settings.week_window,
        ),
        None => Spending::sample(),
    };

    info!(
        "Day: {}, Week: {}, Month: {}",
        format_amount(spending.day),
        format_amount(spending.week),
        format_amount(spending.month)
    );

    spending
}

async fn render(matches: &ArgMatches, settings: Settings) -> Result<()> {
    let today = resolve_today(matches.value_of("date"), settings.tz()?, Utc::now())?;
    let txns = fetch(&settings, today, matches.is_present("demo")).await?;
    let spending = totals(&settings, txns.as_deref(), today);

    let weather = if settings.weather.enabled && !matches.is_present("no_weather") {
        match OpenMeteo::new() {
            Ok(client) => {
                weather::fetch(&client, settings.weather.location(), &settings.timezone).await
            }
            Err(err) => {
                warn!("Could not build weather client: {}", err);
                None
            }
        }
    } else {
        None
    };

    download_fonts(&settings.fonts_dir).await;
    let fonts = Fonts::load(&settings.fonts_dir)?;
    let renderer = Renderer::new(
        settings.canvas,
        fonts,
        &settings.assets_dir,
        settings.overlay_opacity,
    );
    let img = renderer.render(&spending, weather.as_ref());

    let output = matches
        .value_of("output")
        .map(PathBuf::from)
        .unwrap_or(settings.output);
    write_png(&img, &output).with_context(|| format!("failed to write {}", output.display()))?;

    Ok(())
}

async fn summary(matches: &ArgMatches, settings: Settings) -> Result<()> {
    let today = resolve_today(matches.value_of("date"), settings.tz()?, Utc::now())?;
    let txns = fetch(&settings, today, matches.is_present("demo")).await?;
    let spending = totals(&settings, txns.as_deref(), today);

    print_totals(stdout(), &spending)?;

    if let Some(txns) = &txns {
        let exclusions = ExclusionSet::new(settings.excluded_categories.iter().cloned());
        println!();
        print_transactions(
            stdout(),
            &spending::contributing(txns, &exclusions, today, settings.week_window),
        )?;
    }

    Ok(())
}

pub(crate) async fn run(matches: &ArgMatches, settings: Settings) -> Result<()> {
    match matches.subcommand() {
        Some(("render", render_matches)) => render(render_matches, settings).await,
        Some(("summary", summary_matches)) => summary(summary_matches, settings).await,
        None => unreachable!("subcommand is required"),
        _ => unreachable!(),
    }
}
