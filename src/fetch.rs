use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use rusqlite::Connection;
use tokio::sync::Semaphore;
use tracing::{info, warn};
use url::Url;

use crate::db::{FetchRow, QueryRow};
use crate::locations;

const CONCURRENCY: usize = 8;
const MAX_RETRIES: u32 = 3;
const BASE_BACKOFF_MS: u64 = 2000;

const SEARCH_ENDPOINT: &str = "https://www.google.com/search";
const RESULTS_PER_PAGE: &str = "20";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Fetch stats returned after completion.
pub struct FetchStats {
    pub total: usize,
    pub ok: usize,
    pub errors: usize,
}

/// Build the result-page URL for a query, with the geo-targeting parameter
/// when a canonical location name is given.
pub fn build_search_url(query: &str, location: Option<&str>) -> Result<String> {
    let mut url = Url::parse(SEARCH_ENDPOINT)?;
    {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("q", query);
        pairs.append_pair("num", RESULTS_PER_PAGE);
        if let Some(name) = location {
            pairs.append_pair("uule", &locations::encode_location_id(name)?);
        }
    }
    Ok(url.into())
}

/// Fetch result pages concurrently, saving each page to the DB as it
/// arrives.
pub async fn fetch_serps_streaming(
    conn: &Connection,
    queries: Vec<QueryRow>,
) -> Result<FetchStats> {
    let client = Client::builder().user_agent(USER_AGENT).build()?;
    let semaphore = Arc::new(Semaphore::new(CONCURRENCY));
    let total = queries.len();

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );

    // Channel: workers send results, the main loop saves to DB
    let (tx, mut rx) = tokio::sync::mpsc::channel::<FetchRow>(CONCURRENCY * 2);

    for query in queries {
        let client = client.clone();
        let sem = Arc::clone(&semaphore);
        let tx = tx.clone();

        tokio::spawn(async move {
            let _permit = sem.acquire().await.expect("semaphore closed");
            let row = fetch_with_retry(&client, &query).await;
            let _ = tx.send(row).await;
        });
    }

    // Drop our copy of tx so rx closes when all spawned tasks finish
    drop(tx);

    let mut ok = 0usize;
    let mut errors = 0usize;

    let mut insert_stmt = conn.prepare(
        "INSERT INTO serp_data (query_id, query, location, html, status, error, latency_ms, fetched_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )?;
    let mut update_stmt = conn.prepare(
        "UPDATE queries SET visited = 1, visited_at = datetime('now') WHERE id = ?1",
    )?;

    while let Some(row) = rx.recv().await {
        if row.error.is_some() {
            errors += 1;
        } else {
            ok += 1;
        }

        insert_stmt.execute(rusqlite::params![
            row.query_id,
            row.query,
            row.location.as_deref().unwrap_or_default(),
            row.html,
            row.status,
            row.error,
            row.latency_ms,
            row.fetched_at,
        ])?;
        update_stmt.execute(rusqlite::params![row.query_id])?;
        pb.inc(1);
    }

    pb.finish_and_clear();
    info!("Fetched {} pages ({} ok, {} errors)", total, ok, errors);

    Ok(FetchStats { total, ok, errors })
}

async fn fetch_with_retry(client: &Client, query: &QueryRow) -> FetchRow {
    let mut row = fetch_one(client, query).await;

    for attempt in 0..MAX_RETRIES {
        let should_retry = matches!(row.status, Some(429) | Some(500) | Some(502) | Some(503));
        if !should_retry {
            break;
        }

        let backoff = Duration::from_millis(BASE_BACKOFF_MS * 2u64.pow(attempt));
        warn!(
            query = %query.query,
            attempt = attempt + 1,
            "throttled ({}), backing off {:.1}s",
            row.status.unwrap_or_default(),
            backoff.as_secs_f64()
        );
        tokio::time::sleep(backoff).await;
        row = fetch_one(client, query).await;
    }

    row
}

async fn fetch_one(client: &Client, query: &QueryRow) -> FetchRow {
    let fetched_at = Utc::now().to_rfc3339();
    let start = Instant::now();

    let url = match build_search_url(&query.query, query.location.as_deref()) {
        Ok(url) => url,
        Err(err) => return error_row(query, fetched_at, None, None, err.to_string()),
    };

    let response = client
        .get(&url)
        .header("Accept-Language", "en-US,en;q=0.9")
        .send()
        .await;
    let latency_ms = Some(start.elapsed().as_millis() as i64);

    match response {
        Ok(resp) => {
            let status = resp.status().as_u16() as i32;
            match resp.text().await {
                Ok(body) if (200..300).contains(&status) => FetchRow {
                    query_id: query.id,
                    query: query.query.clone(),
                    location: query.location.clone(),
                    html: Some(body),
                    status: Some(status),
                    error: None,
                    latency_ms,
                    fetched_at,
                },
                Ok(_) => error_row(
                    query,
                    fetched_at,
                    Some(status),
                    latency_ms,
                    format!("http status {}", status),
                ),
                Err(err) => {
                    error_row(query, fetched_at, Some(status), latency_ms, err.to_string())
                }
            }
        }
        Err(err) => error_row(query, fetched_at, None, latency_ms, err.to_string()),
    }
}

fn error_row(
    query: &QueryRow,
    fetched_at: String,
    status: Option<i32>,
    latency_ms: Option<i64>,
    error: String,
) -> FetchRow {
    FetchRow {
        query_id: query.id,
        query: query.query.clone(),
        location: query.location.clone(),
        html: None,
        status,
        error: Some(error),
        latency_ms,
        fetched_at,
    }
}

// ── Tests ──
