//! Reading a local directory of daily log files

use std::path::Path;

use chrono::NaiveDate;
use eyre::Context;
use tracing::{debug, info};
use usage_stats::{DayGroup, LogKind};

/// Extension of daily log files.
const LOG_EXTENSION: &str = "log";
/// Format of a daily log file's stem.
const DATE_FMT: &str = "%Y-%m-%d";

/// Reads every `YYYY-MM-DD.log` file in `dir` into a day group, oldest first.
///
/// Other files are ignored. Bytes that aren't valid UTF-8 are replaced rather than failing the
/// whole file.
pub async fn read_log_dir(dir: &Path, kind: LogKind) -> eyre::Result<Vec<DayGroup>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .wrap_err_with(|| format!("Failed to open log directory {}", dir.display()))?;

    let mut days = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let Some(date) = log_date(&path) else {
            debug!("Ignoring {}", path.display());
            continue;
        };
        if !entry.file_type().await?.is_file() {
            continue;
        }

        let bytes = tokio::fs::read(&path)
            .await
            .wrap_err_with(|| format!("Failed to read {}", path.display()))?;
        let contents = String::from_utf8_lossy(&bytes);
        days.push(DayGroup::from_lines(date, contents.lines(), kind));
    }

    days.sort_by_key(|day| day.date);
    info!(files = days.len(), "Read {}", dir.display());

    Ok(days)
}

/// The date a log file covers, if its name is that of a daily log.
fn log_date(path: &Path) -> Option<NaiveDate> {
    if path.extension()? != LOG_EXTENSION {
        return None;
    }
    NaiveDate::parse_from_str(path.file_stem()?.to_str()?, DATE_FMT).ok()
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use chrono::NaiveDate;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use usage_stats::LogKind;

    use super::{log_date, read_log_dir};

    #[test]
    fn file_names() {
        assert_eq!(
            log_date(Path::new("logs/2015-03-02.log")),
            NaiveDate::from_ymd_opt(2015, 3, 2)
        );
        assert_eq!(log_date(Path::new("logs/2015-03-02.txt")), None);
        assert_eq!(log_date(Path::new("logs/notes.log")), None);
        assert_eq!(log_date(Path::new("logs/2015-02-30.log")), None);
    }

    #[tokio::test]
    async fn reads_sorted_day_groups() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("2015-03-09.log"),
            "2015-03-09 08:00:00\t1.16\t10.0.0.1\tua\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("2015-03-02.log"),
            indoc! {"
                2015-03-02 08:00:00\t1.16\t10.0.0.1\tua
                2015-03-02 09:00:00\t1.16\t10.0.0.2\tua
            "},
        )
        .unwrap();
        std::fs::write(dir.path().join("README"), "not a log").unwrap();
        std::fs::create_dir(dir.path().join("2015-03-03.log")).unwrap();

        let days = read_log_dir(dir.path(), LogKind::Minor).await.unwrap();

        assert_eq!(
            days.iter()
                .map(|d| (d.date.to_string(), d.hit_count()))
                .collect::<Vec<_>>(),
            [("2015-03-02".to_owned(), 2), ("2015-03-09".to_owned(), 1)]
        );
    }

    #[tokio::test]
    async fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(
            read_log_dir(&dir.path().join("nope"), LogKind::Minor)
                .await
                .is_err()
        );
    }
}
