use std::path::PathBuf;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use srcpull::{Fetcher, PackageId, Repository, Validation};

pub type ArchiveResult = Result<Option<PathBuf>, srcpull::Error>;

fn make_progress_spinner(m: &MultiProgress, prefix: String) -> ProgressBar {
    let pb = m.add(ProgressBar::new_spinner());
    pb.enable_steady_tick(std::time::Duration::from_millis(120));
    pb.set_style(
        ProgressStyle::with_template("{prefix:.cyan.bold/blue.bold} 📦 {msg:.cyan/blue} {spinner}")
            .expect("spinner template is valid")
            .tick_chars("⣾⣽⣻⢿⡿⣟⣯⣷"),
    );
    pb.set_prefix(prefix);
    pb
}

fn complete_progress_bar(pb: ProgressBar, package: &PackageId, result: &ArchiveResult) {
    let template = if result.is_ok() {
        "{prefix:.cyan.bold/blue.bold} {msg:.cyan/blue}"
    } else {
        "{prefix:.cyan.bold/blue.bold} {msg:.red.bold}"
    };
    pb.set_style(ProgressStyle::with_template(template).expect("status template is valid"));
    let status = match result {
        Ok(Some(archive)) => format!("😸 {package} -> {}", archive.display()),
        Ok(None) => format!("😸 {package}: nothing to archive"),
        Err(_) => format!("😿 failed to archive '{package}'"),
    };
    pb.finish_with_message(status);
}

/// Archive `packages` concurrently, with one spinner per package. Using ordered bars means the
/// bars are shown in order.
pub async fn archive_with_progress(
    fetcher: &Fetcher,
    repository: &Repository,
    packages: Vec<(Option<String>, PackageId)>,
    mode: Validation,
) -> Vec<(PackageId, ArchiveResult)> {
    let count = packages.len();
    let mp = MultiProgress::new();
    let builds = packages
        .into_iter()
        .enumerate()
        .map(|(k, (prefix, package))| {
            let bar = make_progress_spinner(&mp, format!("[{}/{count}]", k + 1));
            async move {
                bar.set_message(package.to_string());
                let result = srcpull::make_archive(
                    fetcher,
                    &repository.root,
                    prefix.as_deref(),
                    &package,
                    mode,
                )
                .await;
                complete_progress_bar(bar, &package, &result);
                (package, result)
            }
        })
        .collect::<Vec<_>>();
    futures::future::join_all(builds).await
}
