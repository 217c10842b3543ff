//! Classification keys and the rules that derive them from capture metadata.

use crate::metadata::ExtractionResult;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::fmt;
use std::path::Path;

pub const UNKNOWN: &str = "Unknown";

/// EXIF timestamp layout, e.g. `2023:07:04 10:15:30`.
const EXIF_TIMESTAMP_FORMAT: &str = "%Y:%m:%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// The `(make, model, date)` triple a file is filed under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassificationKey {
    pub make: String,
    pub model: String,
    pub date: String,
}

impl ClassificationKey {
    pub fn unknown() -> Self {
        Self {
            make: UNKNOWN.to_string(),
            model: UNKNOWN.to_string(),
            date: UNKNOWN.to_string(),
        }
    }
}

impl Default for ClassificationKey {
    fn default() -> Self {
        Self::unknown()
    }
}

impl fmt::Display for ClassificationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.make, self.model, self.date)
    }
}

/// How a file's key is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileCategory {
    /// `.jpg` files: EXIF with the digitized timestamp.
    Jpeg,
    /// Anything else whose EXIF can be read: primary timestamp.
    Raw,
    /// No readable metadata: camera inherited from the last JPEG, filesystem date.
    Other,
}

impl FileCategory {
    /// Category a file starts in, judged by extension alone. Non-JPEG files
    /// are tried as raw first and demoted to `Other` when extraction fails.
    pub fn from_path(path: &Path) -> Self {
        let is_jpg = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("jpg"));
        if is_jpg {
            FileCategory::Jpeg
        } else {
            FileCategory::Raw
        }
    }
}

/// Resolve the key for a file whose metadata was extracted.
///
/// `category` must be `Jpeg` or `Raw`; an `Other` category selects no EXIF
/// timestamp and yields an unknown date.
pub fn resolve(category: FileCategory, extracted: &ExtractionResult) -> ClassificationKey {
    let (make, make_known) = match non_empty(extracted.make.as_deref()) {
        Some(make) => (make.to_string(), true),
        None => (UNKNOWN.to_string(), false),
    };
    let mut model = non_empty(extracted.model.as_deref())
        .unwrap_or(UNKNOWN)
        .to_string();
    if make_known {
        model = strip_make_prefix(&make, &model);
    }

    // JPEGs read the digitized field in place of the primary one.
    let timestamp = match category {
        FileCategory::Jpeg => extracted.digitized_timestamp.as_deref(),
        FileCategory::Raw => extracted.primary_timestamp.as_deref(),
        FileCategory::Other => None,
    };

    ClassificationKey {
        make,
        model,
        date: format_exif_date(timestamp),
    }
}

/// Resolve the key for a file without readable metadata: camera fields come
/// from the last JPEG resolved this run, the date from the filesystem.
pub fn resolve_other(
    last_jpeg: &ClassificationKey,
    creation_date: Option<NaiveDate>,
) -> ClassificationKey {
    ClassificationKey {
        make: last_jpeg.make.clone(),
        model: last_jpeg.model.clone(),
        date: creation_date
            .map(|d| d.format(DATE_FORMAT).to_string())
            .unwrap_or_else(|| UNKNOWN.to_string()),
    }
}

/// Reformat an EXIF timestamp as `YYYY-MM-DD`, or `Unknown`.
pub fn format_exif_date(timestamp: Option<&str>) -> String {
    timestamp
        .and_then(|raw| NaiveDateTime::parse_from_str(raw.trim(), EXIF_TIMESTAMP_FORMAT).ok())
        .map(|dt| dt.format(DATE_FORMAT).to_string())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// "Canon" + "Canon EOS R5" -> "EOS R5". A model that is nothing but the
/// make becomes `Unknown` rather than an empty path component.
fn strip_make_prefix(make: &str, model: &str) -> String {
    let prefixed = model
        .get(..make.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(make));
    if !prefixed {
        return model.to_string();
    }
    let rest = model[make.len()..].trim();
    if rest.is_empty() {
        UNKNOWN.to_string()
    } else {
        rest.to_string()
    }
}
