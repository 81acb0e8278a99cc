use anyhow::{Context, Result};

use qb_compare::config::{self, ServerConfig};
use qb_compare::passers_by_year::PassersByYear;
use qb_compare::web::{self, AppContext};

fn main() -> Result<()> {
    config::load_dotenv();
    config::init_logging();

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let cfg = ServerConfig::resolve(&args);

    let passers = PassersByYear::load(&cfg.lookup_path).with_context(|| {
        format!(
            "unable to load passers lookup (run build_lookup first?) from {}",
            cfg.lookup_path.display()
        )
    })?;
    log::info!(
        "loaded passers lookup with {} seasons from {}",
        passers.seasons().count(),
        cfg.lookup_path.display()
    );
    if !cfg.db_path.exists() {
        log::warn!(
            "play-by-play dataset {} does not exist yet; chart requests will fail",
            cfg.db_path.display()
        );
    }

    let ctx = AppContext::new(cfg.db_path.clone(), passers)?;
    web::run_server(&ctx, &cfg.bind_addr)
}
