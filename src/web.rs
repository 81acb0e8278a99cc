use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use log::{info, warn};
use reqwest::Url;

use crate::chart::{self, RenderedChart, xml_escape};
use crate::comparison::{self, Selection};
use crate::passers_by_year::PassersByYear;
use crate::play_store;
use crate::scoring::ScoreError;

pub const SELECTION_PARAMS: [&str; 4] = ["qb1", "year1", "qb2", "year2"];

const MAX_HEADER_LINES: usize = 100;
const MAX_REQUEST_BYTES: u64 = 16 * 1024;
pub const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Process-wide, read-only state handed to every request.
#[derive(Debug, Clone)]
pub struct AppContext {
    pub db_path: PathBuf,
    pub passers: PassersByYear,
    passers_json: String,
}

impl AppContext {
    pub fn new(db_path: PathBuf, passers: PassersByYear) -> Result<Self> {
        let passers_json = script_safe_json(&passers.to_json()?);
        Ok(Self {
            db_path,
            passers,
            passers_json,
        })
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RequestError {
    #[error("query parameter {param} must be an integer year, got {value:?}")]
    InvalidYear { param: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl HttpResponse {
    fn html(status: u16, body: String) -> Self {
        Self {
            status,
            content_type: "text/html; charset=utf-8",
            body,
        }
    }

    fn text(status: u16, body: &str) -> Self {
        Self {
            status,
            content_type: "text/plain; charset=utf-8",
            body: body.to_string(),
        }
    }

    pub fn to_http(&self) -> String {
        format!(
            "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            self.status,
            status_text(self.status),
            self.content_type,
            self.body.len(),
            self.body
        )
    }
}

/// Splits a request target into its path and decoded query parameters.
/// Repeated keys keep their first value.
pub fn parse_target(target: &str) -> (String, HashMap<String, String>) {
    let mut params = HashMap::new();
    let Ok(url) = Url::parse("http://localhost/").and_then(|base| base.join(target)) else {
        return (target.to_string(), params);
    };
    for (key, value) in url.query_pairs() {
        params
            .entry(key.into_owned())
            .or_insert_with(|| value.into_owned());
    }
    (url.path().to_string(), params)
}

pub fn has_all_selection_params(params: &HashMap<String, String>) -> bool {
    SELECTION_PARAMS.iter().all(|key| params.contains_key(*key))
}

/// `None` when any of the four parameters is absent.
pub fn selections_from_params(
    params: &HashMap<String, String>,
) -> Result<Option<(Selection, Selection)>, RequestError> {
    if !has_all_selection_params(params) {
        return Ok(None);
    }
    let qb1 = params.get("qb1").cloned().unwrap_or_default();
    let qb2 = params.get("qb2").cloned().unwrap_or_default();
    let year1 = parse_year(params, "year1")?;
    let year2 = parse_year(params, "year2")?;
    Ok(Some((Selection::new(qb1, year1), Selection::new(qb2, year2))))
}

fn parse_year(params: &HashMap<String, String>, param: &'static str) -> Result<i32, RequestError> {
    let raw = params.get(param).map(String::as_str).unwrap_or_default();
    raw.trim()
        .parse::<i32>()
        .map_err(|_| RequestError::InvalidYear {
            param,
            value: raw.to_string(),
        })
}

pub fn handle_request(ctx: &AppContext, method: &str, target: &str) -> HttpResponse {
    let (path, params) = parse_target(target);
    if path != "/" {
        return HttpResponse::text(404, "Not Found");
    }
    if method != "GET" {
        return HttpResponse::text(405, "Method Not Allowed");
    }

    let selections = match selections_from_params(&params) {
        Ok(Some(selections)) => selections,
        Ok(None) => return HttpResponse::html(200, render_page(ctx, &params, None, None)),
        Err(err) => {
            return HttpResponse::html(
                400,
                render_page(ctx, &params, None, Some(&err.to_string())),
            );
        }
    };

    match build_chart(ctx, &selections.0, &selections.1) {
        Ok(rendered) => HttpResponse::html(200, render_page(ctx, &params, Some(&rendered), None)),
        Err(err) if err.downcast_ref::<ScoreError>().is_some() => {
            warn!("no plays for request {target}: {err:#}");
            let notice = format!("Nothing to chart: {err}");
            HttpResponse::html(404, render_page(ctx, &params, None, Some(&notice)))
        }
        Err(err) => {
            warn!("request {target} failed: {err:#}");
            HttpResponse::html(
                500,
                render_page(ctx, &params, None, Some("The play-by-play dataset is unavailable.")),
            )
        }
    }
}

fn build_chart(ctx: &AppContext, a: &Selection, b: &Selection) -> Result<RenderedChart> {
    let conn = play_store::open_db_read_only(&ctx.db_path)?;
    let result = comparison::compare(&conn, a, b)?;
    Ok(chart::render(&result))
}

pub fn run_server(ctx: &AppContext, addr: &str) -> Result<()> {
    let listener = TcpListener::bind(addr).with_context(|| format!("bind {addr}"))?;
    info!("serving quarterback comparisons on http://{addr}");
    serve(listener, ctx)
}

/// Accept loop; each connection is handled to completion before the next.
pub fn serve(listener: TcpListener, ctx: &AppContext) -> Result<()> {
    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                if let Err(err) = handle_connection(stream, ctx) {
                    warn!("connection failed: {err:#}");
                }
            }
            Err(err) => warn!("accept failed: {err}"),
        }
    }
    Ok(())
}

fn handle_connection(stream: TcpStream, ctx: &AppContext) -> Result<()> {
    let started = Instant::now();
    stream
        .set_read_timeout(Some(READ_TIMEOUT))
        .context("set read timeout")?;
    stream
        .set_write_timeout(Some(READ_TIMEOUT))
        .context("set write timeout")?;
    let mut reader = BufReader::new(
        stream
            .try_clone()
            .context("clone stream")?
            .take(MAX_REQUEST_BYTES),
    );

    let mut request_line = String::new();
    reader
        .read_line(&mut request_line)
        .context("read request line")?;
    // Cut off by the byte cap before the line ended.
    let truncated = !request_line.ends_with('\n');
    for _ in 0..MAX_HEADER_LINES {
        let mut header = String::new();
        let n = reader.read_line(&mut header).context("read header")?;
        if n == 0 || header.trim().is_empty() {
            break;
        }
    }

    let mut parts = request_line.split_whitespace();
    let response = match (parts.next(), parts.next()) {
        (Some(method), Some(target)) if !truncated => {
            let response = handle_request(ctx, method, target);
            info!(
                "{method} {target} -> {} ({} ms)",
                response.status,
                started.elapsed().as_millis()
            );
            response
        }
        _ => HttpResponse::text(400, "Bad Request"),
    };

    let mut stream = stream;
    stream
        .write_all(response.to_http().as_bytes())
        .context("write response")?;
    stream.flush().context("flush response")?;
    Ok(())
}

fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

fn render_page(
    ctx: &AppContext,
    params: &HashMap<String, String>,
    chart: Option<&RenderedChart>,
    notice: Option<&str>,
) -> String {
    let selected: HashMap<&str, &str> = SELECTION_PARAMS
        .iter()
        .filter_map(|key| params.get(*key).map(|v| (*key, v.as_str())))
        .collect();
    let selected_json =
        script_safe_json(&serde_json::to_string(&selected).unwrap_or_else(|_| "{}".to_string()));

    let notice_html = notice
        .map(|msg| format!(r#"<p class="notice">{}</p>"#, xml_escape(msg)))
        .unwrap_or_default();
    let chart_html = chart
        .map(|c| {
            format!(
                r#"<h2>{} vs {}</h2><img alt="EPA per play comparison" src="{}">"#,
                xml_escape(&c.label_a),
                xml_escape(&c.label_b),
                c.data_uri()
            )
        })
        .unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Quarterback EPA comparison</title>
<style>
body {{ font-family: sans-serif; margin: 2em; }}
fieldset {{ display: inline-block; margin-right: 1em; }}
.notice {{ color: #b00020; }}
</style>
</head>
<body>
<h1>Quarterback EPA comparison</h1>
<form method="get" action="/">
<fieldset><legend>First</legend>
<select name="year1" id="year1"></select>
<select name="qb1" id="qb1"></select>
</fieldset>
<fieldset><legend>Second</legend>
<select name="year2" id="year2"></select>
<select name="qb2" id="qb2"></select>
</fieldset>
<button type="submit">Compare</button>
</form>
{notice_html}
{chart_html}
<script>
const PASSERS_BY_YEAR = {passers};
const SELECTED = {selected_json};
function fillSeasons(yearId, qbId) {{
  const yearSel = document.getElementById(yearId);
  const qbSel = document.getElementById(qbId);
  const years = Object.keys(PASSERS_BY_YEAR).sort().reverse();
  for (const y of years) yearSel.add(new Option(y, y));
  if (SELECTED[yearId]) yearSel.value = SELECTED[yearId];
  const fillQbs = () => {{
    qbSel.length = 0;
    for (const qb of PASSERS_BY_YEAR[yearSel.value] || []) qbSel.add(new Option(qb, qb));
    if (SELECTED[qbId]) qbSel.value = SELECTED[qbId];
  }};
  yearSel.addEventListener("change", fillQbs);
  fillQbs();
}}
fillSeasons("year1", "qb1");
fillSeasons("year2", "qb2");
</script>
</body>
</html>
"#,
        passers = ctx.passers_json,
    )
}

/// Escapes markup characters so the JSON can sit inside a `<script>` element.
fn script_safe_json(json: &str) -> String {
    json.replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026")
}
