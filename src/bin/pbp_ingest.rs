use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::record::Field;
use parquet::schema::types::Type;

use qb_compare::config::{self, ServerConfig};
use qb_compare::play_store::{self, Play};

const NFLVERSE_PBP_URL: &str = "https://github.com/nflverse/nflverse-data/releases/download/pbp";
const DOWNLOAD_ATTEMPTS: u64 = 4;

const COLUMNS: [&str; 9] = [
    "season",
    "passer",
    "rusher",
    "epa",
    "interception",
    "sack",
    "qb_scramble",
    "rush",
    "air_yards",
];

fn main() -> Result<()> {
    config::load_dotenv();
    config::init_logging();

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let db_path = ServerConfig::resolve(&args).db_path;

    let files = config::arg_values(&args, "--file")
        .into_iter()
        .map(PathBuf::from)
        .collect::<Vec<_>>();
    let seasons = config::arg_values(&args, "--season")
        .iter()
        .map(|raw| {
            raw.parse::<i32>()
                .with_context(|| format!("invalid --season {raw}"))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut downloads = Vec::new();
    let sources = if files.is_empty() {
        if seasons.is_empty() {
            return Err(anyhow!(
                "usage: pbp_ingest --season <year> [--season <year> ...] | --file <pbp.parquet> [--db <path>]"
            ));
        }
        let tmp_dir = std::env::temp_dir().join("qb_compare_pbp");
        fs::create_dir_all(&tmp_dir).context("create temp directory")?;
        let mut out = Vec::new();
        for season in &seasons {
            let url = format!("{NFLVERSE_PBP_URL}/play_by_play_{season}.parquet");
            let path = tmp_dir.join(format!("play_by_play_{season}.parquet"));
            let path = download_file(&url, &path)?;
            downloads.push(Download { path: path.clone() });
            out.push(path);
        }
        out
    } else {
        files
    };

    let mut by_season: BTreeMap<i32, Vec<Play>> = BTreeMap::new();
    for path in &sources {
        let plays = read_plays(path)?;
        log::info!("{}: {} plays", path.display(), plays.len());
        for play in plays {
            by_season.entry(play.season).or_default().push(play);
        }
    }
    drop(downloads);
    if !seasons.is_empty() {
        by_season.retain(|season, _| seasons.contains(season));
    }
    if by_season.is_empty() {
        return Err(anyhow!("no plays decoded from {} source file(s)", sources.len()));
    }

    let mut conn = play_store::open_db(&db_path)?;
    let mut total = 0usize;
    println!("Play-by-play ingest complete");
    println!("DB: {}", db_path.display());
    for (season, plays) in &by_season {
        let n = play_store::replace_season(&mut conn, *season, plays)
            .with_context(|| format!("store season {season}"))?;
        total += n;
        println!("season {season}: {n} plays");
    }
    println!("Plays stored: {total}");
    Ok(())
}

/// Season file fetched into the temp directory, removed on drop.
struct Download {
    path: PathBuf,
}

impl Drop for Download {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.path) {
            log::warn!("could not remove {}: {err}", self.path.display());
        }
    }
}

fn download_file(url: &str, path: &Path) -> Result<PathBuf> {
    let client = reqwest::blocking::Client::builder()
        .user_agent("qb-compare/0.1")
        .timeout(std::time::Duration::from_secs(180))
        .build()
        .context("build http client")?;
    let mut last_err: Option<anyhow::Error> = None;
    for attempt in 1..=DOWNLOAD_ATTEMPTS {
        log::info!("downloading {url} (attempt {attempt})");
        let fetched = client
            .get(url)
            .send()
            .with_context(|| format!("request {url}"))
            .and_then(|res| {
                res.error_for_status()
                    .with_context(|| format!("status for {url}"))
            })
            .and_then(|res| res.bytes().with_context(|| format!("read body {url}")));
        match fetched {
            Ok(bytes) => {
                fs::write(path, &bytes).with_context(|| format!("write {}", path.display()))?;
                return Ok(path.to_path_buf());
            }
            Err(err) => {
                log::warn!("download attempt {attempt} failed: {err:#}");
                last_err = Some(err);
                if attempt < DOWNLOAD_ATTEMPTS {
                    std::thread::sleep(std::time::Duration::from_millis(500 * attempt));
                }
            }
        }
    }
    Err(last_err.unwrap_or_else(|| anyhow!("download failed for {url}")))
}

fn read_plays(path: &Path) -> Result<Vec<Play>> {
    let file = fs::File::open(path).with_context(|| format!("open {}", path.display()))?;
    let reader = SerializedFileReader::new(file).context("open parquet reader plays")?;

    let schema = reader.metadata().file_metadata().schema();
    let mut fields = Vec::with_capacity(COLUMNS.len());
    for name in COLUMNS {
        let field = schema
            .get_fields()
            .iter()
            .find(|f| f.name() == name)
            .ok_or_else(|| anyhow!("{} is missing column {name}", path.display()))?;
        fields.push(Arc::clone(field));
    }
    let projection = Type::group_type_builder(schema.name())
        .with_fields(fields)
        .build()
        .context("build parquet projection")?;

    let iter = reader
        .get_row_iter(Some(projection))
        .context("iterate play rows")?;
    let mut out = Vec::new();
    let mut skipped = 0usize;
    for row in iter {
        let Ok(row) = row else {
            skipped += 1;
            continue;
        };
        let mut play = Play::default();
        let mut season = None;
        for (name, field) in row.get_column_iter() {
            match name.as_str() {
                "season" => season = field_num(field).map(|v| v as i32),
                "passer" => play.passer = field_text(field),
                "rusher" => play.rusher = field_text(field),
                "epa" => play.epa = field_num(field),
                "interception" => play.interception = field_flag(field),
                "sack" => play.sack = field_flag(field),
                "qb_scramble" => play.qb_scramble = field_flag(field),
                "rush" => play.rush = field_flag(field),
                "air_yards" => play.air_yards = field_num(field),
                _ => {}
            }
        }
        let Some(season) = season else {
            skipped += 1;
            continue;
        };
        play.season = season;
        out.push(play);
    }
    if skipped > 0 {
        log::warn!("{}: skipped {skipped} undecodable rows", path.display());
    }
    Ok(out)
}

fn field_num(field: &Field) -> Option<f64> {
    let v = match field {
        Field::Double(v) => *v,
        Field::Float(v) => *v as f64,
        Field::Long(v) => *v as f64,
        Field::Int(v) => *v as f64,
        Field::Short(v) => *v as f64,
        Field::Byte(v) => *v as f64,
        Field::Bool(v) => {
            if *v {
                1.0
            } else {
                0.0
            }
        }
        Field::Str(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    v.is_finite().then_some(v)
}

fn field_flag(field: &Field) -> bool {
    field_num(field).is_some_and(|v| v == 1.0)
}

fn field_text(field: &Field) -> Option<String> {
    match field {
        Field::Str(s) if !s.trim().is_empty() => Some(s.clone()),
        _ => None,
    }
}
