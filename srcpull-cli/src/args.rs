use std::path::PathBuf;

use clap::FromArgMatches;
use clap::{CommandFactory, Parser};

use srcpull::{Checksum, FetchSettings, PackageId, Repository, Url, Validation};

use crate::error::AppError;

// Shamelessly borrowed from https://github.com/crate-ci/clap-cargo/blob/0378657ffdf2b67bcd6f1ab56e04a1322b92dd0e/src/style.rs
// thanks to https://stackoverflow.com/a/79614957
use anstyle::AnsiColor::*;
use anstyle::Effects;
use anstyle::Style;

const HEADER: Style = Green.on_default().effects(Effects::BOLD);
const USAGE: Style = Green.on_default().effects(Effects::BOLD);
const LITERAL: Style = Cyan.on_default().effects(Effects::BOLD);
const PLACEHOLDER: Style = Cyan.on_default();
const ERROR: Style = Red.on_default().effects(Effects::BOLD);
const VALID: Style = Cyan.on_default().effects(Effects::BOLD);
const INVALID: Style = Yellow.on_default().effects(Effects::BOLD);

const APP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(HEADER)
    .usage(USAGE)
    .literal(LITERAL)
    .placeholder(PLACEHOLDER)
    .error(ERROR)
    .valid(VALID)
    .invalid(INVALID);

const CACHE_ENV: &str = "SRCPULL_CACHE";
const REQUIRE_CHECKSUMS_ENV: &str = "SRCPULL_REQUIRE_CHECKSUMS";

#[derive(Debug, Parser)]
#[command(name = "srcpull")]
#[command(about = "Fetch, verify and cache package sources, and build source archives")]
#[command(long_about = None)]
#[command(styles = APP_STYLING)]
#[command(term_width = 80)]
struct Args {
    #[command(flatten)]
    cache: CacheArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, clap::Args)]
struct CacheArgs {
    /// Cache directory to use. If omitted, check the `SRCPULL_CACHE` environment variable and
    /// then `~/.cache/srcpull`
    #[arg(long = "cache", short = 'c', value_name = "PATH", global = true)]
    cache_dir: Option<PathBuf>,

    /// Do not use a cache directory at all
    #[arg(long, global = true, conflicts_with = "cache_dir")]
    no_cache: bool,

    /// Remote cache to try before the upstream mirrors. May be repeated.
    #[arg(long = "cache-mirror", value_name = "URL", global = true)]
    cache_mirrors: Vec<String>,

    /// Refuse to download anything without a checksum (`true`), or skip checksum validation
    /// (`false`). If omitted, check the `SRCPULL_REQUIRE_CHECKSUMS` environment variable.
    #[arg(long, value_name = "BOOL", global = true)]
    require_checksums: Option<bool>,
}

#[derive(Debug, clap::Args)]
struct SourceArgs {
    /// Where to get the file from
    #[arg(value_name = "URL")]
    url: String,

    /// Mirror to try after URL. May be repeated.
    #[arg(long = "mirror", short = 'm', value_name = "URL")]
    mirrors: Vec<String>,

    /// Expected checksum, as `<md5|sha256|sha512>=<hex>`. May be repeated; the first one is the
    /// cache key.
    #[arg(long = "checksum", short = 'k', value_name = "CHECKSUM")]
    checksums: Vec<String>,
}

#[derive(Debug, clap::Args)]
struct RepoArgs {
    /// Root of the repository mirror
    #[arg(long = "repo", short = 'r', value_name = "PATH", default_value = ".")]
    root: PathBuf,
}

#[derive(Debug, clap::Subcommand)]
enum Command {
    /// Pull a single file
    Pull {
        #[command(flatten)]
        source: SourceArgs,

        /// Where to write the file. Defaults to the last segment of URL in the current directory.
        #[arg(long = "out", short = 'o', value_name = "PATH")]
        out: Option<PathBuf>,
    },
    /// Pull a single file into the cache
    Cache {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Build the source archives of a repository
    Archive {
        #[command(flatten)]
        repo: RepoArgs,

        /// Packages to archive, as `name.version`. Defaults to every package of the repository.
        #[arg(value_name = "PACKAGE")]
        packages: Vec<String>,

        /// Correct the checksums in `url.toml` instead of rejecting mismatching sources
        #[arg(long)]
        fix_digests: bool,

        /// Print a summary in this format
        #[arg(long, short = 'f', value_enum, value_name = "FORMAT")]
        format: Option<OutputFormat>,
    },
    /// Create an empty repository mirror
    Init {
        #[command(flatten)]
        repo: RepoArgs,

        /// Where the repository is synchronised from
        #[arg(value_name = "URL")]
        url: String,

        /// Name of the repository
        #[arg(long, default_value = "default")]
        name: String,
    },
    /// Synchronise a repository mirror with its url
    Update {
        #[command(flatten)]
        repo: RepoArgs,
    },
    /// Print the revision of a repository mirror
    Revision {
        #[command(flatten)]
        repo: RepoArgs,
    },
}

#[derive(Debug, Clone, clap::ValueEnum)]
pub enum OutputFormat {
    /// Output in JSON format
    Json,
    /// Output in TOML format
    Toml,
}

#[derive(Debug)]
pub struct ValidatedArgs {
    pub settings: FetchSettings,
    pub command: ValidatedCommand,
}

#[derive(Debug)]
pub struct Source {
    pub urls: Vec<Url>,
    pub checksums: Vec<Checksum>,
}

#[derive(Debug)]
pub enum ValidatedCommand {
    Pull {
        source: Source,
        out: PathBuf,
    },
    Cache {
        source: Source,
    },
    Archive {
        repository: Repository,
        /// Empty for every package
        packages: Vec<(Option<String>, PackageId)>,
        mode: Validation,
        format: Option<OutputFormat>,
    },
    Init {
        repository: Repository,
    },
    Update {
        repository: Repository,
    },
    Revision {
        repository: Repository,
    },
}

impl ValidatedArgs {
    /// Detect the cache directory, falling back to `SRCPULL_CACHE` then ~/.cache/srcpull
    fn detect_cache_dir(arg: Option<PathBuf>) -> Result<PathBuf, AppError> {
        match arg {
            Some(dir) => Ok(dir),
            None => match std::env::var_os(CACHE_ENV) {
                Some(dir) => Ok(PathBuf::from(dir)),
                None => {
                    let project_dirs = directories::ProjectDirs::from("", "", "srcpull").ok_or(
                        AppError::arg_validation("could not determine cache directory".to_string()),
                    )?;
                    Ok(project_dirs.cache_dir().to_path_buf())
                }
            },
        }
    }

    fn detect_require_checksums(arg: Option<bool>) -> Result<Option<bool>, AppError> {
        if arg.is_some() {
            return Ok(arg);
        }
        match std::env::var(REQUIRE_CHECKSUMS_ENV) {
            Ok(value) if value.is_empty() => Ok(None),
            Ok(value) => match value.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => Ok(Some(true)),
                "0" | "false" | "no" => Ok(Some(false)),
                _ => Err(AppError::arg_validation(format!(
                    "{REQUIRE_CHECKSUMS_ENV} must be true or false, not '{value}'"
                ))),
            },
            Err(_) => Ok(None),
        }
    }

    fn parse_urls(urls: &[String]) -> Result<Vec<Url>, AppError> {
        urls.iter()
            .map(|url| url.parse().map_err(|e: srcpull::Error| AppError::arg_validation(e.to_string())))
            .collect()
    }

    fn parse_checksums(checksums: &[String]) -> Result<Vec<Checksum>, AppError> {
        checksums
            .iter()
            .map(|c| c.parse().map_err(|e: srcpull::Error| AppError::arg_validation(e.to_string())))
            .collect()
    }

    fn settings(cache: CacheArgs) -> Result<FetchSettings, AppError> {
        let cache_dir = if cache.no_cache {
            None
        } else {
            Some(Self::detect_cache_dir(cache.cache_dir)?)
        };
        Ok(FetchSettings {
            cache_dir,
            cache_mirrors: Self::parse_urls(&cache.cache_mirrors)?,
            require_checksums: Self::detect_require_checksums(cache.require_checksums)?,
            silent_hits: false,
        })
    }

    fn source(source: SourceArgs) -> Result<Source, AppError> {
        let mut urls = vec![source.url];
        urls.extend(source.mirrors);
        Ok(Source {
            urls: Self::parse_urls(&urls)?,
            checksums: Self::parse_checksums(&source.checksums)?,
        })
    }

    /// Open an initialised repository
    fn open_repository(repo: RepoArgs) -> Result<Repository, AppError> {
        if !srcpull::layout::repo_file(&repo.root).is_file() {
            return Err(AppError::arg_validation(format!(
                "no repository found in {}",
                repo.root.display()
            )));
        }
        Ok(Repository::load(repo.root)?)
    }

    /// Find each named package in the repository, with its prefix directory.
    fn find_packages(
        repository: &Repository,
        names: &[String],
    ) -> Result<Vec<(Option<String>, PackageId)>, AppError> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let known = repository.packages()?;
        names
            .iter()
            .map(|name| {
                let package: PackageId = name
                    .parse()
                    .map_err(|e: srcpull::Error| AppError::arg_validation(e.to_string()))?;
                known
                    .iter()
                    .find(|(_, known)| *known == package)
                    .cloned()
                    .ok_or_else(|| {
                        AppError::arg_validation(format!(
                            "no package {package} in {}",
                            repository.root.display()
                        ))
                    })
            })
            .collect()
    }
}

impl TryFrom<Command> for ValidatedCommand {
    type Error = AppError;

    fn try_from(command: Command) -> Result<Self, Self::Error> {
        match command {
            Command::Pull { source, out } => {
                let source = ValidatedArgs::source(source)?;
                let out = match out {
                    Some(out) => out,
                    None => std::env::current_dir()?.join(source.urls[0].basename()),
                };
                Ok(ValidatedCommand::Pull { source, out })
            }
            Command::Cache { source } => Ok(ValidatedCommand::Cache {
                source: ValidatedArgs::source(source)?,
            }),
            Command::Archive {
                repo,
                packages,
                fix_digests,
                format,
            } => {
                let repository = ValidatedArgs::open_repository(repo)?;
                let packages = ValidatedArgs::find_packages(&repository, &packages)?;
                let mode = if fix_digests {
                    Validation::Fix
                } else {
                    Validation::Enforce
                };
                Ok(ValidatedCommand::Archive {
                    repository,
                    packages,
                    mode,
                    format,
                })
            }
            Command::Init { repo, url, name } => {
                let url = ValidatedArgs::parse_urls(&[url])?.remove(0);
                Ok(ValidatedCommand::Init {
                    repository: Repository::new(name, repo.root, url),
                })
            }
            Command::Update { repo } => Ok(ValidatedCommand::Update {
                repository: ValidatedArgs::open_repository(repo)?,
            }),
            Command::Revision { repo } => Ok(ValidatedCommand::Revision {
                repository: ValidatedArgs::open_repository(repo)?,
            }),
        }
    }
}

pub fn parse() -> Result<ValidatedArgs, AppError> {
    let matches = Args::command()
        .version(env!("CARGO_PKG_VERSION"))
        .get_matches();
    let args = match Args::from_arg_matches(&matches) {
        Ok(args) => args,
        Err(err) => {
            err.format(&mut Args::command()).exit();
        }
    };
    Ok(ValidatedArgs {
        settings: ValidatedArgs::settings(args.cache)?,
        command: ValidatedCommand::try_from(args.command)?,
    })
}
