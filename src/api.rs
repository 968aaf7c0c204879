// API client module: a small blocking HTTP client for NASA's EPIC
// imagery API. Two JSON endpoints (date listing, per-date/latest image
// listing) plus the binary archive fetch. Synchronous on purpose: the
// tool is a one-shot CLI, not a server.

use std::time::Duration;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{EimgError, Result};

/// Metadata endpoints.
pub const API_BASE: &str = "https://api.nasa.gov/EPIC/api/natural";

/// Binary image archive.
pub const ARCHIVE_BASE: &str = "https://epic.gsfc.nasa.gov/archive/natural";

const USER_AGENT: &str = concat!("eimg/", env!("CARGO_PKG_VERSION"), " (Earth Image Downloader)");

/// Per-request timeout for the JSON endpoints.
const METADATA_TIMEOUT: Duration = Duration::from_secs(8);

/// The image payload is tens of megabytes; give it longer.
const IMAGE_TIMEOUT: Duration = Duration::from_secs(60);

/// Latitude/longitude of the point on Earth at the image center.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

/// DSCOVR position in the J2000 frame, kilometres.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct SatellitePosition {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// One available image as described by the metadata endpoints.
///
/// The wire response carries both a numeric `identifier` and an `image`
/// file stem; the archive path is built from the latter, so that is the
/// identifier we keep.
#[derive(Deserialize, Debug, Clone)]
pub struct ImageRecord {
    #[serde(rename = "image")]
    pub identifier: String,
    #[serde(rename = "date", deserialize_with = "epic_datetime")]
    pub capture_timestamp: NaiveDateTime,
    #[serde(default)]
    pub caption: String,
    #[serde(rename = "centroid_coordinates")]
    pub earth_center: Coordinates,
    #[serde(rename = "dscovr_j2000_position")]
    pub satellite_position: SatellitePosition,
}

impl ImageRecord {
    /// UTC capture date, used for the date-partitioned archive path.
    pub fn capture_date(&self) -> NaiveDate {
        self.capture_timestamp.date()
    }
}

// EPIC serves timestamps as "2025-01-15 00:36:33" (no T separator).
fn epic_datetime<'de, D>(deserializer: D) -> std::result::Result<NaiveDateTime, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%d %H:%M:%S").map_err(serde::de::Error::custom)
}

#[derive(Deserialize)]
struct DateEntry {
    date: NaiveDate,
}

/// Blocking EPIC API client. Holds the access key and attaches it as a
/// query parameter on every request; the key is never logged.
pub struct EpicClient {
    client: Client,
    api_base: String,
    archive_base: String,
    api_key: String,
}

impl EpicClient {
    /// Client against the production endpoints.
    pub fn new(api_key: String) -> Result<Self> {
        Self::with_base_urls(api_key, API_BASE, ARCHIVE_BASE)
    }

    /// Client against explicit base URLs. Test seam.
    pub fn with_base_urls(
        api_key: String,
        api_base: impl Into<String>,
        archive_base: impl Into<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(METADATA_TIMEOUT)
            .build()
            .map_err(|e| EimgError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(EpicClient {
            client,
            api_base: api_base.into(),
            archive_base: archive_base.into(),
            api_key,
        })
    }

    /// Dates with imagery, in service order (most recent first).
    pub fn available_dates(&self) -> Result<Vec<NaiveDate>> {
        let url = format!("{}/all", self.api_base);
        let entries: Vec<DateEntry> = self.get_json(&url)?;
        tracing::debug!(count = entries.len(), "fetched available dates");
        Ok(entries.into_iter().map(|e| e.date).collect())
    }

    /// All images captured on `date`. An empty vec is a normal outcome
    /// for a valid date with no imagery, not an error.
    pub fn images_for_date(&self, date: NaiveDate) -> Result<Vec<ImageRecord>> {
        let url = format!("{}/date/{}", self.api_base, date.format("%Y-%m-%d"));
        self.get_records(&url)
    }

    /// Images for the most recent date with data, resolved by the
    /// service itself in a single round trip.
    pub fn latest_images(&self) -> Result<Vec<ImageRecord>> {
        let url = format!("{}/images", self.api_base);
        self.get_records(&url)
    }

    /// Live check that the service accepts our key: `Ok(true)` on 200,
    /// `Ok(false)` on 401/403; other failures propagate.
    pub fn check_key(&self) -> Result<bool> {
        let url = format!("{}/images", self.api_base);
        let response = self
            .client
            .get(&url)
            .query(&[("api_key", &self.api_key)])
            .send()
            .map_err(map_transport)?;
        match check_status(response.status()) {
            Ok(()) => Ok(true),
            Err(EimgError::Auth) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Canonical archive path for a record, without the key:
    /// `<archive>/<YYYY>/<MM>/<DD>/png/<identifier>.png`, month and day
    /// zero-padded. This must match the remote path scheme exactly.
    pub fn image_url(&self, record: &ImageRecord) -> String {
        let date = record.capture_date();
        format!(
            "{}/{:04}/{:02}/{:02}/png/{}.png",
            self.archive_base,
            date.year(),
            date.month(),
            date.day(),
            record.identifier
        )
    }

    /// Open a streaming response for the record's image binary.
    pub fn get_image(&self, record: &ImageRecord) -> Result<Response> {
        let url = self.image_url(record);
        let response = self
            .client
            .get(&url)
            .query(&[("api_key", &self.api_key)])
            .timeout(IMAGE_TIMEOUT)
            .send()
            .map_err(map_transport)?;
        check_status(response.status())?;
        Ok(response)
    }

    fn get_records(&self, url: &str) -> Result<Vec<ImageRecord>> {
        let records: Vec<ImageRecord> = self.get_json(url)?;
        tracing::debug!(count = records.len(), "fetched image records");
        Ok(records)
    }

    fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .client
            .get(url)
            .query(&[("api_key", &self.api_key)])
            .send()
            .map_err(map_transport)?;
        check_status(response.status())?;
        response
            .json()
            .map_err(|e| EimgError::Network(format!("invalid response body: {}", e.without_url())))
    }
}

fn check_status(status: StatusCode) -> Result<()> {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        Err(EimgError::Auth)
    } else if status.is_server_error() {
        Err(EimgError::Service(status.as_u16()))
    } else if !status.is_success() {
        Err(EimgError::Network(format!("unexpected HTTP status {status}")))
    } else {
        Ok(())
    }
}

// reqwest errors can embed the full request URL, which would include the
// api_key query parameter; strip it before the message reaches the user.
fn map_transport(e: reqwest::Error) -> EimgError {
    let e = e.without_url();
    if e.is_timeout() {
        EimgError::Network("request timed out".to_string())
    } else {
        EimgError::Network(e.to_string())
    }
}
