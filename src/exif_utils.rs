use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use exif::{In, Reader as ExifReader, Tag, Value};

/// Capture time recorded by the camera (EXIF `DateTimeOriginal`).
///
/// Images without EXIF data, or with a malformed date, yield `None`.
pub fn picture_taken_time(path: &Path) -> Option<NaiveDateTime> {
    let file = File::open(path).ok()?;
    let exif = match ExifReader::new().read_from_container(&mut BufReader::new(&file)) {
        Ok(exif) => exif,
        Err(e) => {
            log::trace!("No EXIF data in {:?}: {}", path, e);
            return None;
        }
    };

    let field = exif.get_field(Tag::DateTimeOriginal, In::PRIMARY)?;
    match field.value {
        Value::Ascii(ref vec) if !vec.is_empty() => parse_exif_datetime(&vec[0]),
        _ => None,
    }
}

/// Parses the `YYYY:MM:DD HH:MM:SS` form cameras write into EXIF.
pub fn parse_exif_datetime(raw: &[u8]) -> Option<NaiveDateTime> {
    let dt = exif::DateTime::from_ascii(raw).ok()?;
    NaiveDate::from_ymd_opt(dt.year as i32, dt.month as u32, dt.day as u32)?.and_hms_opt(
        dt.hour as u32,
        dt.minute as u32,
        dt.second as u32,
    )
}
