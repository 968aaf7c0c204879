//! Retrieval pipeline: resolve a target to one image record, build the
//! archive URL, and stream the binary safely to disk.
//!
//! Writes go to a `.part` file first and are renamed into place only
//! after the byte count checks out, so a watcher on the output directory
//! (or an interrupted run) never observes a partial or empty image.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};
use indicatif::{ProgressBar, ProgressStyle};

use crate::api::{EpicClient, ImageRecord};
use crate::error::{EimgError, Result};

const CHUNK_SIZE: usize = 8192;

/// What the user asked for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Target {
    /// Most recent date with data, as resolved by the service.
    Latest,
    /// A specific calendar date.
    Date(NaiveDate),
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::Latest => write!(f, "latest"),
            Target::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

/// Parse a user-supplied `YYYY-MM-DD` date, failing fast before any
/// network call is made.
pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| EimgError::InvalidDate(raw.to_string()))
}

/// Outcome of a completed download. Only constructed after a non-empty
/// file has been renamed into its final place.
#[derive(Debug)]
pub struct DownloadResult {
    pub local_path: PathBuf,
    pub byte_size: u64,
    pub source_record: ImageRecord,
}

/// Download one Earth image for `target` into `output_dir`.
pub fn fetch(
    client: &EpicClient,
    target: Target,
    output_dir: &Path,
    filename_override: Option<&str>,
) -> Result<DownloadResult> {
    let records = match target {
        Target::Latest => client.latest_images()?,
        Target::Date(date) => client.images_for_date(date)?,
    };
    let record = select_record(&records, target)?.clone();
    tracing::info!(identifier = %record.identifier, %target, "selected image record");

    let filename = resolve_filename(filename_override);
    fs::create_dir_all(output_dir).map_err(|e| map_write_err(e, output_dir))?;
    let final_path = output_dir.join(&filename);
    let part_path = output_dir.join(format!("{filename}.part"));

    let response = client.get_image(&record)?;
    let total = response.content_length();
    let progress = progress_bar(total);

    let written = match stream_to_file(response, &part_path, &progress) {
        Ok(n) => n,
        Err(e) => {
            // no partial artifacts on any exit path
            let _ = fs::remove_file(&part_path);
            progress.finish_and_clear();
            return Err(e);
        }
    };
    progress.finish_and_clear();

    finalize(&part_path, &final_path, written, &record.identifier)?;

    Ok(DownloadResult {
        local_path: final_path,
        byte_size: written,
        source_record: record,
    })
}

/// Pick the record to download from a date's result set.
///
/// Policy: first record in the sequence as returned by the service. The
/// service's own ordering is taken as authoritative; no independent
/// recency re-sort is performed.
pub fn select_record(records: &[ImageRecord], target: Target) -> Result<&ImageRecord> {
    records
        .first()
        .ok_or_else(|| EimgError::NoImagesAvailable(target.to_string()))
}

/// Default name is `earth_<UTC timestamp>.png`; an override gets a
/// `.png` suffix if missing. Repeat calls with the same name overwrite.
fn resolve_filename(filename_override: Option<&str>) -> String {
    let mut name = match filename_override {
        Some(name) => name.to_string(),
        None => Utc::now().format("earth_%Y%m%d_%H%M%S.png").to_string(),
    };
    if !name.to_lowercase().ends_with(".png") {
        name.push_str(".png");
    }
    // strip anything that could escape the output directory
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect()
}

fn progress_bar(total: Option<u64>) -> ProgressBar {
    match total {
        Some(len) => {
            let bar = ProgressBar::new(len);
            bar.set_style(
                ProgressStyle::with_template("{bar:40} {bytes}/{total_bytes} {msg}").unwrap(),
            );
            bar
        }
        None => {
            let bar = ProgressBar::new_spinner();
            bar.set_style(ProgressStyle::with_template("{spinner} {bytes} {msg}").unwrap());
            bar
        }
    }
}

fn stream_to_file(mut reader: impl Read, dest: &Path, progress: &ProgressBar) -> Result<u64> {
    let mut file = fs::File::create(dest).map_err(|e| map_write_err(e, dest))?;
    let mut buf = [0u8; CHUNK_SIZE];
    let mut written: u64 = 0;
    loop {
        let n = reader
            .read(&mut buf)
            .map_err(|e| EimgError::Network(format!("download interrupted: {e}")))?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n]).map_err(|e| map_write_err(e, dest))?;
        written += n as u64;
        progress.set_position(written);
    }
    file.flush().map_err(|e| map_write_err(e, dest))?;
    Ok(written)
}

// Zero-byte guard plus atomic move into place. Removes the temp file on
// the failure path so nothing is left behind.
fn finalize(part_path: &Path, final_path: &Path, written: u64, label: &str) -> Result<()> {
    if written == 0 {
        let _ = fs::remove_file(part_path);
        return Err(EimgError::EmptyDownload(label.to_string()));
    }
    fs::rename(part_path, final_path).map_err(|e| {
        let _ = fs::remove_file(part_path);
        map_write_err(e, final_path)
    })
}

fn map_write_err(e: std::io::Error, path: &Path) -> EimgError {
    if e.kind() == std::io::ErrorKind::PermissionDenied {
        EimgError::Permission(path.to_path_buf())
    } else {
        EimgError::Io(e)
    }
}
