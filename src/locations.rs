use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use scraper::{Html, Selector};
use thiserror::Error;
use tracing::{error, info};

const GEOTARGETS_INDEX_URL: &str =
    "https://developers.google.com/adwords/api/docs/appendix/geotargeting";
const DEVELOPERS_BASE_URL: &str = "https://developers.google.com";

const UULE_PREFIX: &str = "w+CAIQICI";
// Uppercase, lowercase, digits plus the two url-safe extras, repeated once.
// The single key character is this table indexed by the canonical name's
// length, so the table length is the hard cap on name length.
const UULE_KEY: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_\
                        ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

static ANCHOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UuleError {
    #[error("canonical name is {len} characters, the uule key table holds {max}")]
    NameTooLong { len: usize, max: usize },
}

/// Build the `uule` URL parameter for a location's canonical name.
///
/// The format is fixed by the upstream endpoint: the literal prefix, one
/// key character selected by name length, then the base64 of the name's
/// UTF-8 bytes. A name past the end of the key table is a hard error, not
/// a wraparound.
pub fn encode_location_id(canonical_name: &str) -> Result<String, UuleError> {
    let len = canonical_name.chars().count();
    let key = UULE_KEY
        .as_bytes()
        .get(len)
        .copied()
        .ok_or(UuleError::NameTooLong { len, max: UULE_KEY.len() })?;
    let b64 = STANDARD.encode(canonical_name.as_bytes());
    Ok(format!("{}{}{}", UULE_PREFIX, key as char, b64))
}

/// Make sure the latest geo-targeting CSV exists under `data_dir`, fetching
/// it only when neither the upstream file nor its unzipped form is already
/// present. Returns the path to the CSV.
pub async fn ensure_locations_data(data_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create {}", data_dir.display()))?;
    let client = Client::new();
    let full_url = latest_locations_url(&client).await?;
    ensure_local_copy(&client, data_dir, &full_url).await
}

/// Scrape the geotargeting index page for the newest download link.
async fn latest_locations_url(client: &Client) -> Result<String> {
    let html = client
        .get(GEOTARGETS_INDEX_URL)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .context("failed to retrieve the locations index page")?
        .text()
        .await?;

    let doc = Html::parse_document(&html);
    let mut geo_urls: Vec<String> = doc
        .select(&ANCHOR)
        .filter_map(|a| a.value().attr("href"))
        .filter(|href| href.contains("geotargets"))
        .map(str::to_string)
        .collect();
    geo_urls.sort();
    geo_urls.dedup();

    // Version-stamped filenames sort chronologically, so the last one wins.
    let latest = geo_urls.pop().context("no geotargets download link on the index page")?;
    if latest.starts_with("http") {
        Ok(latest)
    } else {
        Ok(format!("{}{}", DEVELOPERS_BASE_URL, latest))
    }
}

async fn ensure_local_copy(client: &Client, data_dir: &Path, full_url: &str) -> Result<PathBuf> {
    let filename = full_url.rsplit('/').next().unwrap_or(full_url);
    let fp = data_dir.join(filename);
    let fp_csv = data_dir.join(filename.trim_end_matches(".zip"));

    if fp.exists() {
        info!(path = %fp.display(), "locations data up to date");
        return Ok(fp);
    }
    if fp_csv.exists() {
        info!(path = %fp_csv.display(), "locations data up to date");
        return Ok(fp_csv);
    }

    info!(url = full_url, "downloading locations data");
    let bytes = match client
        .get(full_url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
    {
        Ok(response) => response.bytes().await?,
        Err(err) => {
            error!(%err, "failed to retrieve locations data");
            return Err(err).context("locations download failed");
        }
    };

    if filename.ends_with(".zip") {
        extract_zipped_csv(&bytes, &fp_csv)?;
    } else {
        write_csv_passthrough(&bytes, &fp_csv)?;
    }
    Ok(fp_csv)
}

fn extract_zipped_csv(bytes: &[u8], out: &Path) -> Result<()> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    for i in 0..archive.len() {
        let mut member = archive.by_index(i)?;
        if member.name().ends_with(".csv") {
            let mut raw = Vec::new();
            member.read_to_end(&mut raw)?;
            return write_csv_passthrough(&raw, out);
        }
    }
    bail!("no csv member inside the locations archive")
}

/// Re-encode the upstream CSV as UTF-8, column for column, with no other
/// interpretation of its contents.
fn write_csv_passthrough(raw: &[u8], out: &Path) -> Result<()> {
    let text = String::from_utf8_lossy(raw);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());
    let mut writer = csv::Writer::from_path(out)
        .with_context(|| format!("failed to create {}", out.display()))?;
    for record in reader.records() {
        writer.write_record(&record?)?;
    }
    writer.flush()?;
    info!(path = %out.display(), "saved locations csv");
    Ok(())
}

// ── Tests ──
