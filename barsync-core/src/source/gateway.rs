//! Quote-gateway session adapter.
//!
//! Speaks the gateway's HTTP/JSON protocol: `POST /session/login` yields a
//! session token, queries return a cursor-style envelope
//! `{error_code, error_msg, fields, rows, has_more}` paged via a `page`
//! parameter, `POST /session/logout` releases the token. Rows are
//! positional string records matched against the envelope's field list;
//! any non-"0" `error_code` is treated as failure.

use super::session::{MarketSession, SessionError};
use crate::bar::{is_chronological, Bar};
use chrono::NaiveDate;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Gateway address used when no override is configured.
pub const DEFAULT_GATEWAY_URL: &str = "http://127.0.0.1:8787";

const OK_CODE: &str = "0";
const SESSION_TOKEN_HEADER: &str = "X-Session-Token";
const DATE_FMT: &str = "%Y-%m-%d";

#[derive(Debug, Deserialize)]
struct LoginResponse {
    error_code: String,
    #[serde(default)]
    error_msg: String,
    #[serde(default)]
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueryEnvelope {
    error_code: String,
    #[serde(default)]
    error_msg: String,
    #[serde(default)]
    fields: Vec<String>,
    #[serde(default)]
    rows: Vec<Vec<String>>,
    #[serde(default)]
    has_more: bool,
}

/// Blocking HTTP session against the quote gateway.
pub struct GatewaySession {
    client: reqwest::blocking::Client,
    base: String,
    token: Option<String>,
}

impl GatewaySession {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("barsync/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("failed to build HTTP client");

        Self {
            client,
            base: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        }
    }

    /// Start a paged query, fetching the first page eagerly so the field
    /// list is known. Subsequent pages are fetched as the cursor drains.
    fn query(&self, path: &str, params: &[(&str, &str)]) -> Result<RowCursor<'_>, SessionError> {
        let token = self.token.as_deref().ok_or(SessionError::NotOpen)?;
        let mut cursor = RowCursor {
            client: &self.client,
            token,
            url: format!("{}{path}", self.base),
            params: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            fields: Vec::new(),
            rows: Vec::new().into_iter(),
            has_more: false,
            page: 1,
        };
        cursor.fetch_page()?;
        Ok(cursor)
    }
}

impl MarketSession for GatewaySession {
    fn open(&mut self) -> Result<(), SessionError> {
        let url = format!("{}/session/login", self.base);
        let resp = self
            .client
            .post(&url)
            .send()
            .map_err(|e| SessionError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SessionError::Transport(format!("login: HTTP {status}")));
        }

        let login: LoginResponse = resp
            .json()
            .map_err(|e| SessionError::Malformed(format!("login response: {e}")))?;

        if login.error_code != OK_CODE {
            return Err(SessionError::AuthRejected {
                code: login.error_code,
                msg: login.error_msg,
            });
        }

        let token = login
            .token
            .ok_or_else(|| SessionError::Malformed("login succeeded without a token".into()))?;

        debug!("gateway session opened");
        self.token = Some(token);
        Ok(())
    }

    fn list_instruments(&mut self) -> Result<Vec<String>, SessionError> {
        let cursor = self.query("/stocks/all", &[])?;
        let code_idx = field_position(cursor.fields(), "code")?;

        let mut codes = Vec::new();
        for row in cursor {
            let row = row?;
            let code = cell(&row, code_idx)?;
            codes.push(code.to_string());
        }
        Ok(codes)
    }

    fn fetch_history(
        &mut self,
        code: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Bar>, SessionError> {
        let start_s = start.format(DATE_FMT).to_string();
        let end_s = end.format(DATE_FMT).to_string();
        let params = [
            ("code", code),
            ("start", start_s.as_str()),
            ("end", end_s.as_str()),
            ("freq", "d"),
            ("adjust", "back"),
        ];

        let cursor = self.query("/history/daily", &params)?;
        let idx = FieldIndex::resolve(cursor.fields())?;

        let mut bars = Vec::new();
        for row in cursor {
            bars.push(parse_bar(&idx, &row?)?);
        }

        for bar in &bars {
            if !bar.is_sane() {
                return Err(SessionError::Malformed(format!(
                    "insane bar for {code} on {}",
                    bar.date
                )));
            }
        }
        if !is_chronological(&bars) {
            return Err(SessionError::Malformed(format!(
                "history for {code} is not chronological"
            )));
        }

        Ok(bars)
    }

    fn close(&mut self) {
        if let Some(token) = self.token.take() {
            let url = format!("{}/session/logout", self.base);
            match self
                .client
                .post(&url)
                .header(SESSION_TOKEN_HEADER, &token)
                .send()
            {
                Ok(resp) if resp.status().is_success() => debug!("gateway session closed"),
                Ok(resp) => warn!("logout returned HTTP {}", resp.status()),
                Err(e) => warn!("logout failed: {e}"),
            }
        }
    }
}

/// Lazy single-pass cursor over a paged query.
///
/// Yields rows from the buffered page and requests the next page only
/// once the buffer drains and the envelope said more rows exist. A page
/// fetch error ends the cursor after yielding the error.
struct RowCursor<'a> {
    client: &'a reqwest::blocking::Client,
    token: &'a str,
    url: String,
    params: Vec<(String, String)>,
    fields: Vec<String>,
    rows: std::vec::IntoIter<Vec<String>>,
    has_more: bool,
    page: usize,
}

impl RowCursor<'_> {
    /// Field list from the first page's envelope.
    fn fields(&self) -> &[String] {
        &self.fields
    }

    fn fetch_page(&mut self) -> Result<(), SessionError> {
        let resp = self
            .client
            .get(&self.url)
            .query(&self.params)
            .query(&[("page", self.page.to_string())])
            .header(SESSION_TOKEN_HEADER, self.token)
            .send()
            .map_err(|e| SessionError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SessionError::Transport(format!(
                "HTTP {status} from {}",
                self.url
            )));
        }

        let envelope: QueryEnvelope = resp
            .json()
            .map_err(|e| SessionError::Malformed(format!("envelope: {e}")))?;

        if envelope.error_code != OK_CODE {
            return Err(SessionError::ErrorCode {
                code: envelope.error_code,
                msg: envelope.error_msg,
            });
        }

        debug!(
            url = %self.url,
            page = self.page,
            rows = envelope.rows.len(),
            has_more = envelope.has_more,
            "gateway page"
        );

        if self.page == 1 {
            self.fields = envelope.fields;
        }
        self.rows = envelope.rows.into_iter();
        self.has_more = envelope.has_more;
        Ok(())
    }
}

impl Iterator for RowCursor<'_> {
    type Item = Result<Vec<String>, SessionError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(row) = self.rows.next() {
                return Some(Ok(row));
            }
            if !self.has_more {
                return None;
            }
            self.page += 1;
            if let Err(e) = self.fetch_page() {
                self.has_more = false;
                return Some(Err(e));
            }
        }
    }
}

// ── Row parsing helpers ─────────────────────────────────────────────

/// Column positions for the daily-history field list.
#[derive(Debug)]
struct FieldIndex {
    date: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: usize,
    amount: usize,
}

impl FieldIndex {
    fn resolve(fields: &[String]) -> Result<Self, SessionError> {
        Ok(Self {
            date: field_position(fields, "date")?,
            open: field_position(fields, "open")?,
            high: field_position(fields, "high")?,
            low: field_position(fields, "low")?,
            close: field_position(fields, "close")?,
            volume: field_position(fields, "volume")?,
            amount: field_position(fields, "amount")?,
        })
    }
}

fn field_position(fields: &[String], name: &str) -> Result<usize, SessionError> {
    fields
        .iter()
        .position(|f| f == name)
        .ok_or_else(|| SessionError::Malformed(format!("field list missing '{name}': {fields:?}")))
}

fn cell(row: &[String], i: usize) -> Result<&str, SessionError> {
    row.get(i)
        .map(String::as_str)
        .ok_or_else(|| SessionError::Malformed(format!("row shorter than field list: {row:?}")))
}

fn parse_bar(idx: &FieldIndex, row: &[String]) -> Result<Bar, SessionError> {
    Ok(Bar {
        date: parse_date(cell(row, idx.date)?)?,
        open: parse_f64(cell(row, idx.open)?, "open")?,
        high: parse_f64(cell(row, idx.high)?, "high")?,
        low: parse_f64(cell(row, idx.low)?, "low")?,
        close: parse_f64(cell(row, idx.close)?, "close")?,
        volume: parse_u64(cell(row, idx.volume)?, "volume")?,
        amount: parse_f64(cell(row, idx.amount)?, "amount")?,
    })
}

fn parse_date(s: &str) -> Result<NaiveDate, SessionError> {
    NaiveDate::parse_from_str(s, DATE_FMT)
        .map_err(|e| SessionError::Malformed(format!("bad date '{s}': {e}")))
}

fn parse_f64(s: &str, name: &str) -> Result<f64, SessionError> {
    s.parse()
        .map_err(|_| SessionError::Malformed(format!("bad {name} value '{s}'")))
}

fn parse_u64(s: &str, name: &str) -> Result<u64, SessionError> {
    s.parse()
        .map_err(|_| SessionError::Malformed(format!("bad {name} value '{s}'")))
}
