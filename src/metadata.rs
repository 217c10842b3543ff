use chrono::NaiveDate;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Capture metadata read from a file's EXIF block.
///
/// Timestamps are kept as the raw EXIF strings (`yyyy:MM:dd HH:mm:ss`);
/// interpreting them is the resolver's job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionResult {
    pub make: Option<String>,
    pub model: Option<String>,
    pub primary_timestamp: Option<String>,
    pub digitized_timestamp: Option<String>,
}

/// Reads capture metadata from a file. `None` means nothing usable could be
/// read; implementations never surface read/parse errors.
pub trait MetadataExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Option<ExtractionResult>;
}

/// EXIF extraction backed by kamadak-exif. Handles JPEG and the TIFF-based
/// raw containers (CR2, NEF, ARW, DNG...).
#[derive(Debug, Default, Clone, Copy)]
pub struct ExifExtractor;

impl MetadataExtractor for ExifExtractor {
    fn extract(&self, path: &Path) -> Option<ExtractionResult> {
        match read_exif(path) {
            Ok(result) => Some(result),
            Err(e) => {
                log::trace!("no EXIF in {}: {}", path.display(), e);
                None
            }
        }
    }
}

fn read_exif(path: &Path) -> anyhow::Result<ExtractionResult> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let exif = exif::Reader::new().read_from_container(&mut reader)?;

    let ascii = |tag: exif::Tag| -> Option<String> {
        let field = exif.get_field(tag, exif::In::PRIMARY)?;
        match field.value {
            exif::Value::Ascii(ref parts) => parts.first().map(|bytes| {
                String::from_utf8_lossy(bytes)
                    .trim_end_matches('\0')
                    .to_string()
            }),
            _ => None,
        }
    };

    Ok(ExtractionResult {
        make: ascii(exif::Tag::Make),
        model: ascii(exif::Tag::Model),
        primary_timestamp: ascii(exif::Tag::DateTime),
        digitized_timestamp: ascii(exif::Tag::DateTimeDigitized),
    })
}

/// Filesystem creation date of a file in local time.
/// Falls back to the modified time where the platform has no birth time.
pub fn filesystem_creation_date(path: &Path) -> anyhow::Result<NaiveDate> {
    let metadata = std::fs::metadata(path)?;
    let created = metadata.created().or_else(|_| metadata.modified())?;
    let datetime: chrono::DateTime<chrono::Local> = created.into();
    Ok(datetime.date_naive())
}
