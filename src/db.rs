use std::collections::HashMap;

use anyhow::Result;
use rusqlite::Connection;
use serde::Serialize;

use crate::parser::classify::ComponentType;
use crate::parser::extract::{ParsedComponent, SubItem};

const DB_PATH: &str = "data/serps.sqlite";

pub fn connect() -> Result<Connection> {
    std::fs::create_dir_all("data")?;
    let conn = Connection::open(DB_PATH)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS queries (
            id         INTEGER PRIMARY KEY,
            query      TEXT NOT NULL,
            location   TEXT NOT NULL DEFAULT '',
            visited    BOOLEAN NOT NULL DEFAULT 0,
            visited_at TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(query, location)
        );
        CREATE INDEX IF NOT EXISTS idx_queries_visited ON queries(visited);

        CREATE TABLE IF NOT EXISTS serp_data (
            id         INTEGER PRIMARY KEY,
            query_id   INTEGER NOT NULL REFERENCES queries(id),
            query      TEXT NOT NULL,
            location   TEXT NOT NULL DEFAULT '',
            html       TEXT,
            status     INTEGER,
            error      TEXT,
            latency_ms INTEGER,
            fetched_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_serp_data_query ON serp_data(query);

        CREATE TABLE IF NOT EXISTS components (
            id        INTEGER PRIMARY KEY,
            serp_id   INTEGER NOT NULL REFERENCES serp_data(id),
            query     TEXT NOT NULL,
            rank      INTEGER NOT NULL,
            cmpt_type TEXT NOT NULL,
            sub_rank  INTEGER NOT NULL DEFAULT 0,
            title     TEXT,
            url       TEXT,
            cite      TEXT,
            text      TEXT,
            UNIQUE(serp_id, rank)
        );
        CREATE INDEX IF NOT EXISTS idx_components_type ON components(cmpt_type);

        CREATE TABLE IF NOT EXISTS sub_items (
            id        INTEGER PRIMARY KEY,
            serp_id   INTEGER NOT NULL REFERENCES serp_data(id),
            cmpt_rank INTEGER NOT NULL,
            position  INTEGER NOT NULL,
            title     TEXT,
            url       TEXT,
            cite      TEXT,
            UNIQUE(serp_id, cmpt_rank, position)
        );
        CREATE INDEX IF NOT EXISTS idx_sub_items_serp ON sub_items(serp_id);
        ",
    )?;
    Ok(())
}

// ── Query queue ──

pub struct QueryRow {
    pub id: i64,
    pub query: String,
    pub location: Option<String>,
}

pub fn insert_queries(conn: &Connection, queries: &[(String, Option<String>)]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut stmt =
            tx.prepare("INSERT OR IGNORE INTO queries (query, location) VALUES (?1, ?2)")?;
        for (query, location) in queries {
            count += stmt.execute(rusqlite::params![
                query,
                location.as_deref().unwrap_or_default()
            ])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

pub fn fetch_unvisited(conn: &Connection, limit: Option<usize>) -> Result<Vec<QueryRow>> {
    let sql = format!(
        "SELECT id, query, location FROM queries WHERE visited = 0 ORDER BY id{}",
        match limit {
            Some(n) => format!(" LIMIT {}", n),
            None => String::new(),
        }
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| {
            let location: String = row.get(2)?;
            Ok(QueryRow {
                id: row.get(0)?,
                query: row.get(1)?,
                location: if location.is_empty() { None } else { Some(location) },
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Fetching ──

pub struct FetchRow {
    pub query_id: i64,
    pub query: String,
    pub location: Option<String>,
    pub html: Option<String>,
    pub status: Option<i32>,
    pub error: Option<String>,
    pub latency_ms: Option<i64>,
    pub fetched_at: String,
}

// ── Parsing ──

pub struct SerpPage {
    pub serp_id: i64,
    pub query: String,
    pub html: String,
}

pub fn fetch_unparsed(conn: &Connection, limit: Option<usize>) -> Result<Vec<SerpPage>> {
    let sql = format!(
        "SELECT sd.id, sd.query, sd.html
         FROM serp_data sd
         LEFT JOIN components c ON c.serp_id = sd.id
         WHERE sd.html IS NOT NULL AND c.id IS NULL
         ORDER BY sd.id{}",
        match limit {
            Some(n) => format!(" LIMIT {}", n),
            None => String::new(),
        }
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(SerpPage {
                serp_id: row.get(0)?,
                query: row.get(1)?,
                html: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// One parsed page ready to be persisted.
pub struct ParsedSerp {
    pub serp_id: i64,
    pub query: String,
    pub components: Vec<ParsedComponent>,
}

pub fn save_parsed(conn: &Connection, pages: &[ParsedSerp]) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    {
        let mut c_stmt = tx.prepare(
            "INSERT OR REPLACE INTO components
             (serp_id, query, rank, cmpt_type, sub_rank, title, url, cite, text)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )?;
        let mut s_stmt = tx.prepare(
            "INSERT OR REPLACE INTO sub_items
             (serp_id, cmpt_rank, position, title, url, cite)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for page in pages {
            for cmpt in &page.components {
                c_stmt.execute(rusqlite::params![
                    page.serp_id,
                    page.query,
                    cmpt.rank as i64,
                    cmpt.cmpt_type.as_str(),
                    cmpt.sub_rank as i64,
                    cmpt.title,
                    cmpt.url,
                    cmpt.cite,
                    cmpt.text,
                ])?;
                for (position, sub) in cmpt.sub_items.iter().enumerate() {
                    s_stmt.execute(rusqlite::params![
                        page.serp_id,
                        cmpt.rank as i64,
                        position as i64,
                        sub.title,
                        sub.url,
                        sub.cite,
                    ])?;
                }
            }
        }
    }
    tx.commit()?;
    Ok(())
}

// ── Export ──

/// The downstream contract: one JSON object per component, with its page
/// identity flattened alongside the normalized record.
#[derive(Serialize)]
pub struct ExportRecord {
    pub serp_id: i64,
    pub query: String,
    #[serde(flatten)]
    pub component: ParsedComponent,
}

pub fn fetch_export_records(conn: &Connection) -> Result<Vec<ExportRecord>> {
    let mut sub_map: HashMap<(i64, i64), Vec<SubItem>> = HashMap::new();
    {
        let mut stmt = conn.prepare(
            "SELECT serp_id, cmpt_rank, title, url, cite
             FROM sub_items ORDER BY serp_id, cmpt_rank, position",
        )?;
        let subs = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                SubItem { title: row.get(2)?, url: row.get(3)?, cite: row.get(4)? },
            ))
        })?;
        for sub in subs {
            let (serp_id, cmpt_rank, item) = sub?;
            sub_map.entry((serp_id, cmpt_rank)).or_default().push(item);
        }
    }

    let mut stmt = conn.prepare(
        "SELECT serp_id, query, rank, cmpt_type, sub_rank, title, url, cite, text
         FROM components ORDER BY serp_id, rank",
    )?;
    let rows = stmt
        .query_map([], |row| {
            let serp_id: i64 = row.get(0)?;
            let rank: i64 = row.get(2)?;
            let cmpt_type: String = row.get(3)?;
            let sub_rank: i64 = row.get(4)?;
            Ok(ExportRecord {
                serp_id,
                query: row.get(1)?,
                component: ParsedComponent {
                    cmpt_type: ComponentType::from_tag(&cmpt_type),
                    rank: rank as usize,
                    sub_rank: sub_rank as usize,
                    title: row.get(5)?,
                    url: row.get(6)?,
                    cite: row.get(7)?,
                    text: row.get(8)?,
                    sub_items: Vec::new(),
                },
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut records = rows;
    for record in &mut records {
        if let Some(subs) = sub_map.remove(&(record.serp_id, record.component.rank as i64)) {
            record.component.sub_items = subs;
        }
    }
    Ok(records)
}

// ── Overview ──

pub struct OverviewRow {
    pub serp_id: i64,
    pub query: String,
    pub components: i64,
    pub general: i64,
    pub ads: i64,
    pub nested: i64,
    pub unknown: i64,
}

pub fn fetch_overview(
    conn: &Connection,
    cmpt_type: Option<&str>,
    limit: usize,
) -> Result<Vec<OverviewRow>> {
    let base = "SELECT c.serp_id, c.query,
                COUNT(*),
                SUM(c.cmpt_type = 'general'),
                SUM(c.cmpt_type IN ('ad', 'shopping_ads')),
                SUM(c.cmpt_type = 'nested'),
                SUM(c.cmpt_type = 'unknown')
         FROM components c
         GROUP BY c.serp_id";
    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<OverviewRow> {
        Ok(OverviewRow {
            serp_id: row.get(0)?,
            query: row.get(1)?,
            components: row.get(2)?,
            general: row.get(3)?,
            ads: row.get(4)?,
            nested: row.get(5)?,
            unknown: row.get(6)?,
        })
    }

    let rows = match cmpt_type {
        Some(t) => {
            let sql = format!(
                "{} HAVING SUM(c.cmpt_type = ?1) > 0 ORDER BY c.serp_id LIMIT {}",
                base, limit
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([t], map_row)?.collect::<Result<Vec<_>, _>>()?;
            rows
        }
        None => {
            let sql = format!("{} ORDER BY c.serp_id LIMIT {}", base, limit);
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], map_row)?.collect::<Result<Vec<_>, _>>()?;
            rows
        }
    };
    Ok(rows)
}

// ── Stats ──

pub struct Stats {
    pub queries: usize,
    pub visited: usize,
    pub unvisited: usize,
    pub fetched: usize,
    pub errors: usize,
    pub parsed: usize,
    pub components: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let queries: usize = conn.query_row("SELECT COUNT(*) FROM queries", [], |r| r.get(0))?;
    let visited: usize =
        conn.query_row("SELECT COUNT(*) FROM queries WHERE visited = 1", [], |r| r.get(0))?;
    let fetched: usize = conn.query_row("SELECT COUNT(*) FROM serp_data", [], |r| r.get(0))?;
    let errors: usize = conn.query_row(
        "SELECT COUNT(*) FROM serp_data WHERE error IS NOT NULL",
        [],
        |r| r.get(0),
    )?;
    let parsed: usize = conn.query_row(
        "SELECT COUNT(DISTINCT serp_id) FROM components",
        [],
        |r| r.get(0),
    )?;
    let components: usize =
        conn.query_row("SELECT COUNT(*) FROM components", [], |r| r.get(0))?;
    Ok(Stats {
        queries,
        visited,
        unvisited: queries - visited,
        fetched,
        errors,
        parsed,
        components,
    })
}

// ── Tests ──
