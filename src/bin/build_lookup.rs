use anyhow::{Context, Result};

use qb_compare::config::{self, ServerConfig};
use qb_compare::passers_by_year::{self, DEFAULT_MIN_PLAYS};
use qb_compare::play_store;

fn main() -> Result<()> {
    config::load_dotenv();
    config::init_logging();

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let cfg = ServerConfig::resolve(&args);
    let min_plays = match config::arg_value(&args, "--min-plays") {
        Some(raw) => raw
            .parse::<u32>()
            .with_context(|| format!("invalid --min-plays {raw}"))?,
        None => DEFAULT_MIN_PLAYS,
    };

    let conn = play_store::open_db_read_only(&cfg.db_path)?;
    let lookup = passers_by_year::build_from_db(&conn, min_plays)?;
    let source = cfg.db_path.display().to_string();
    lookup.save(&cfg.lookup_path, Some(&source))?;

    println!("Passers lookup written");
    println!("DB: {}", cfg.db_path.display());
    println!("Lookup: {}", cfg.lookup_path.display());
    println!("Minimum plays: {min_plays}");
    for season in lookup.seasons() {
        // Minus the "Average" entry.
        let count = lookup.passers(season).len().saturating_sub(1);
        println!("season {season}: {count} passers");
    }
    Ok(())
}
