use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use srcpull::{Fetcher, PullOutcome, Registry};

mod args;
mod error;
mod progress;

use args::{OutputFormat, ValidatedArgs, ValidatedCommand};
use error::AppError;

/// One line of the `archive` summary.
#[derive(Debug, serde::Serialize)]
struct ArchiveSummary {
    package: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    archive: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, serde::Serialize)]
struct Summary {
    archives: Vec<ArchiveSummary>,
}

fn print_summary(summary: &Summary, format: &OutputFormat) -> Result<(), AppError> {
    let text = match format {
        OutputFormat::Json => serde_json::to_string_pretty(summary)
            .context("failed to write the archive summary as JSON")?,
        OutputFormat::Toml => {
            toml::to_string(summary).context("failed to write the archive summary as TOML")?
        }
    };
    println!("{text}");
    Ok(())
}

async fn run(args: ValidatedArgs) -> Result<(), AppError> {
    log::debug!("fetch settings: {:?}", args.settings);
    let fetcher = Fetcher::new(Registry::new(), args.settings);
    match args.command {
        ValidatedCommand::Pull { source, out } => {
            let label = source.urls[0].basename();
            match fetcher
                .pull_file(&label, &out, &source.checksums, &source.urls)
                .await?
            {
                PullOutcome::Unavailable(reason) => Err(AppError::fetch(label, reason)),
                PullOutcome::UpToDate(()) => {
                    println!("✅ {} is up to date", out.display());
                    Ok(())
                }
                PullOutcome::Fetched(()) => {
                    println!("✅ 📦 Pulled {label} into {}", out.display());
                    Ok(())
                }
            }
        }
        ValidatedCommand::Cache { source } => {
            let label = source.urls[0].basename();
            match fetcher
                .pull_file_to_cache(&label, &source.checksums, &source.urls)
                .await?
            {
                PullOutcome::Unavailable(reason) => Err(AppError::fetch(label, reason)),
                PullOutcome::UpToDate(()) | PullOutcome::Fetched(()) => {
                    println!("✅ 🗄️  {label} is cached");
                    Ok(())
                }
            }
        }
        ValidatedCommand::Archive {
            repository,
            packages,
            mode,
            format,
        } => {
            let results = match (&format, packages.is_empty()) {
                (Some(_), true) => srcpull::make_archives(&fetcher, &repository, mode).await?,
                (_, true) => {
                    let packages = repository.packages()?;
                    progress::archive_with_progress(&fetcher, &repository, packages, mode).await
                }
                (_, false) => {
                    progress::archive_with_progress(&fetcher, &repository, packages, mode).await
                }
            };

            let mut failed = 0usize;
            let mut built = 0usize;
            let mut archives = Vec::with_capacity(results.len());
            for (package, result) in results {
                let (archive, error) = match result {
                    Ok(archive) => {
                        built += usize::from(archive.is_some());
                        (archive, None)
                    }
                    Err(err) => {
                        eprintln!("❌ {package}: {err}");
                        failed += 1;
                        (None, Some(err.to_string()))
                    }
                };
                archives.push(ArchiveSummary {
                    package: package.to_string(),
                    archive,
                    error,
                });
            }
            match &format {
                Some(format) => print_summary(&Summary { archives }, format)?,
                None => println!("\n🎉 Built {built} archive(s)!"),
            }
            if failed > 0 {
                Err(AppError::archive(failed))
            } else {
                Ok(())
            }
        }
        ValidatedCommand::Init { repository } => {
            repository.init()?;
            println!(
                "✅ Initialised repository '{}' in {}",
                repository.name,
                repository.root.display()
            );
            Ok(())
        }
        ValidatedCommand::Update { repository } => {
            repository.update(fetcher.registry()).await?;
            println!("✅ 🔗 Updated '{}' from {}", repository.name, repository.url);
            Ok(())
        }
        ValidatedCommand::Revision { repository } => {
            match repository.revision(fetcher.registry()).await? {
                Some(revision) => println!("{revision}"),
                None => eprintln!("'{}' has no revision", repository.name),
            }
            Ok(())
        }
    }
}

fn report(error: &AppError) {
    eprintln!("❌ {error}");
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        eprintln!("   caused by: {cause}");
        source = cause.source();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let result = match args::parse() {
        Ok(args) => run(args).await,
        Err(err) => Err(err),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report(&err);
            err.into()
        }
    }
}
