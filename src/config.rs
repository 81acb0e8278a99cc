use std::path::PathBuf;

pub const DEFAULT_DB_PATH: &str = "pbp_data.db";
pub const DEFAULT_LOOKUP_PATH: &str = "passers_by_year.json";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5678";

pub const DB_PATH_ENV: &str = "QB_DB_PATH";
pub const LOOKUP_PATH_ENV: &str = "QB_LOOKUP_PATH";
pub const BIND_ADDR_ENV: &str = "QB_BIND_ADDR";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub db_path: PathBuf,
    pub lookup_path: PathBuf,
    pub bind_addr: String,
}

impl ServerConfig {
    /// Flag, then environment variable, then default.
    pub fn resolve(args: &[String]) -> Self {
        Self::resolve_with(args, |key| std::env::var(key).ok())
    }

    pub fn resolve_with(args: &[String], env: impl Fn(&str) -> Option<String>) -> Self {
        let db_path = arg_value(args, "--db")
            .or_else(|| non_blank(env(DB_PATH_ENV)))
            .unwrap_or_else(|| DEFAULT_DB_PATH.to_string());
        let lookup_path = arg_value(args, "--lookup")
            .or_else(|| non_blank(env(LOOKUP_PATH_ENV)))
            .unwrap_or_else(|| DEFAULT_LOOKUP_PATH.to_string());
        let bind_addr = arg_value(args, "--bind")
            .or_else(|| non_blank(env(BIND_ADDR_ENV)))
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        Self {
            db_path: PathBuf::from(db_path),
            lookup_path: PathBuf::from(lookup_path),
            bind_addr,
        }
    }
}

/// Loads `.env.local` then `.env`; missing files are fine.
pub fn load_dotenv() {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
}

pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}

/// Value of `--flag=value` or `--flag value`; the first non-blank hit wins.
pub fn arg_value(args: &[String], flag: &str) -> Option<String> {
    arg_values(args, flag).into_iter().next()
}

/// Every value given for a repeatable flag, in order.
pub fn arg_values(args: &[String], flag: &str) -> Vec<String> {
    let prefix = format!("{flag}=");
    let mut out = Vec::new();
    for (idx, arg) in args.iter().enumerate() {
        if let Some(raw) = arg.strip_prefix(&prefix) {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                out.push(trimmed.to_string());
            }
            continue;
        }
        if arg == flag
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
            && !next.starts_with("--")
        {
            out.push(next.trim().to_string());
        }
    }
    out
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn flag_beats_env_beats_default() {
        let cfg = ServerConfig::resolve_with(&args(&["--db", "a.db"]), |key| match key {
            DB_PATH_ENV => Some("env.db".to_string()),
            LOOKUP_PATH_ENV => Some("env.json".to_string()),
            _ => None,
        });
        assert_eq!(cfg.db_path, PathBuf::from("a.db"));
        assert_eq!(cfg.lookup_path, PathBuf::from("env.json"));
        assert_eq!(cfg.bind_addr, DEFAULT_BIND_ADDR);
    }

    #[test]
    fn blank_env_falls_back_to_default() {
        let cfg = ServerConfig::resolve_with(&[], |_| Some("  ".to_string()));
        assert_eq!(cfg.db_path, PathBuf::from(DEFAULT_DB_PATH));
    }

    #[test]
    fn repeated_flags_collect_in_order() {
        let raw = args(&["--season=2020", "--season", "2021", "--season", "--db", "x"]);
        assert_eq!(arg_values(&raw, "--season"), vec!["2020", "2021"]);
        assert_eq!(arg_value(&raw, "--db").as_deref(), Some("x"));
    }
}
