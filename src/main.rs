use apple_notes_export::store::DEFAULT_NOTE_LIMIT;
use apple_notes_export::utils::ExportConfig;
use apple_notes_export::{parallel, sequential};
use eyre::{Context, Result, eyre};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

struct Config {
    export: ExportConfig,
    single: Option<SingleTarget>,
    parallel: bool,
}

enum SingleTarget {
    Stdout,
    File(PathBuf),
}

#[derive(Deserialize, Default)]
struct FileConfig {
    target_dir: Option<PathBuf>,
    db_path: Option<PathBuf>,
    limit: Option<usize>,
    tags: Option<Vec<String>>,
}

fn default_db_path() -> Option<PathBuf> {
    dirs::home_dir()
        .map(|d| d.join("Library/Group Containers/group.com.apple.notes/NoteStore.sqlite"))
}

fn load_file_config(explicit_path: Option<&Path>) -> Result<FileConfig> {
    let path = if let Some(p) = explicit_path {
        if !p.exists() {
            return Err(eyre!("Config file not found: {}", p.display()));
        }
        Some(p.to_path_buf())
    } else {
        // Search: XDG/OS config dir, then nothing
        dirs::config_dir()
            .map(|d| d.join("notes-export/config.toml"))
            .filter(|p| p.exists())
    };

    match path {
        None => Ok(FileConfig::default()),
        Some(p) => {
            let content = fs::read_to_string(&p)
                .wrap_err_with(|| format!("Failed to read config: {}", p.display()))?;
            toml::from_str(&content)
                .wrap_err_with(|| format!("Failed to parse config: {}", p.display()))
        }
    }
}

fn parse_args() -> Result<Config> {
    let mut args = std::env::args().skip(1);

    let mut positional_target: Option<String> = None;
    let mut cli_db_path: Option<PathBuf> = None;
    let mut cli_limit: Option<usize> = None;
    let mut cli_tags: Option<Vec<String>> = None;
    let mut config_path: Option<PathBuf> = None;
    let mut single_file: Option<PathBuf> = None;
    let mut parallel = false;
    let mut force = false;
    let mut verbose = false;
    let mut quiet = false;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--db" => {
                let val = args
                    .next()
                    .ok_or_else(|| eyre!("--db requires a path argument"))?;
                cli_db_path = Some(PathBuf::from(val));
            }
            "--limit" => {
                let val = args
                    .next()
                    .ok_or_else(|| eyre!("--limit requires a number"))?;
                cli_limit = Some(
                    val.parse()
                        .map_err(|_| eyre!("--limit must be a positive integer"))?,
                );
            }
            "--tags" => {
                let val = args
                    .next()
                    .ok_or_else(|| eyre!("--tags requires a comma-separated list"))?;
                let parsed: Vec<String> = val
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
                if !parsed.is_empty() {
                    cli_tags = Some(parsed);
                }
            }
            "--config" => {
                let val = args
                    .next()
                    .ok_or_else(|| eyre!("--config requires a path argument"))?;
                config_path = Some(PathBuf::from(val));
            }
            "--single" => {
                let val = args
                    .next()
                    .ok_or_else(|| eyre!("--single requires an output path"))?;
                single_file = Some(PathBuf::from(val));
            }
            "--parallel" | "-p" => parallel = true,
            "--force" | "-f" => force = true,
            "--verbose" | "-v" => verbose = true,
            "--quiet" | "-q" => quiet = true,
            other if !other.starts_with('-') || other == "-" => {
                if positional_target.is_none() {
                    positional_target = Some(other.to_string());
                } else {
                    return Err(eyre!("Unexpected argument: {}", other));
                }
            }
            other => return Err(eyre!("Unknown argument: {}", other)),
        }
    }

    let file_cfg = load_file_config(config_path.as_deref())?;

    let single = match (&positional_target, single_file) {
        (Some(t), _) if t == "-" => Some(SingleTarget::Stdout),
        (_, Some(path)) => Some(SingleTarget::File(path)),
        _ => None,
    };

    // target_dir: CLI positional > config file
    let target_dir = match positional_target
        .filter(|t| t != "-")
        .or_else(|| file_cfg.target_dir.map(|p| p.to_string_lossy().into_owned()))
    {
        Some(p) => PathBuf::from(p),
        None if single.is_some() => PathBuf::new(),
        None => return Err(eyre!(
            "Usage: notes-export [TARGET_DIRECTORY | -] [--db <PATH>] [--config <PATH>] [--limit <N>] [--tags <TAG1,TAG2,...>] [--single <FILE>] [--parallel|-p] [--force|-f] [--verbose|-v] [--quiet|-q]\n\
             \n\
             Arguments:\n  \
             TARGET_DIRECTORY    Where to write exported .md files (or set target_dir in config.toml); '-' streams one combined document to stdout\n  \
             --db PATH           Path to NoteStore.sqlite\n  \
             --config PATH       Path to config.toml\n  \
             --limit N           Maximum number of notes to export (default 50)\n  \
             --tags TAGS         Comma-separated tags injected into frontmatter\n  \
             --single FILE       Write all notes to FILE as one Markdown document\n  \
             --parallel, -p      Export with one worker per CPU\n  \
             --force, -f         Overwrite all files regardless of timestamp\n  \
             --verbose, -v       Print each file written or skipped\n  \
             --quiet, -q         No output on success\n\
             \n\
             Config file searched at: $XDG_CONFIG_HOME/notes-export/config.toml"
        )),
    };

    // db_path: CLI > config file > OS default
    let db_path = cli_db_path
        .or(file_cfg.db_path)
        .or_else(default_db_path)
        .ok_or_else(|| eyre!("Could not determine database path. Set db_path in config.toml or use --db."))?;

    if !db_path.exists() {
        return Err(eyre!(
            "Note store not found at: {}\nUse --db to specify the path manually, or set db_path in config.toml.",
            db_path.display()
        ));
    }

    let limit = cli_limit.or(file_cfg.limit).unwrap_or(DEFAULT_NOTE_LIMIT);
    let tags = cli_tags.or(file_cfg.tags);

    Ok(Config {
        export: ExportConfig {
            target_dir,
            db_path,
            limit,
            tags,
            force,
            verbose,
            quiet,
        },
        single,
        parallel,
    })
}

fn main() -> Result<()> {
    env_logger::builder()
        .filter_level(if cfg!(debug_assertions) {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .parse_default_env()
        .init();

    let config = parse_args()?;

    match config.single {
        Some(SingleTarget::Stdout) => sequential::execute_single(&config.export, None),
        Some(SingleTarget::File(path)) => sequential::execute_single(&config.export, Some(&path)),
        None if config.parallel => parallel::execute(config.export),
        None => sequential::execute(config.export),
    }
}
