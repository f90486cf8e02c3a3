use csv::{Reader, StringRecord};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::info;

use super::SampleSource;
use crate::error::SourceError;
use crate::processing::messages::Sample;

/// Replays recorded raw samples from CSV rows of `timestamp,ch0,ch1,...`.
///
/// The first row is a header. Cells that do not parse as numbers become NaN, so
/// the band-pass filter treats them as invalid samples.
pub struct CsvSource<R: Read> {
    reader: Reader<R>,
    record: StringRecord,
    row: u64,
}

impl CsvSource<File> {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, SourceError> {
        info!(path = %path.as_ref().display(), "replaying recorded samples");
        Ok(Self::from_reader(File::open(path)?))
    }
}

impl<R: Read> CsvSource<R> {
    pub fn from_reader(reader: R) -> Self {
        Self {
            reader: csv::ReaderBuilder::new()
                .has_headers(true)
                .flexible(true)
                .trim(csv::Trim::All)
                .from_reader(reader),
            record: StringRecord::new(),
            row: 0,
        }
    }
}

impl<R: Read> SampleSource for CsvSource<R> {
    fn next_sample(&mut self) -> Result<Option<Sample>, SourceError> {
        if !self.reader.read_record(&mut self.record)? {
            return Ok(None);
        }
        self.row += 1;

        let mut cells = self.record.iter();
        let timestamp = cells
            .next()
            .and_then(|cell| cell.parse::<f64>().ok())
            .ok_or_else(|| SourceError::Malformed {
                row: self.row,
                reason: "missing or unparsable timestamp".to_string(),
            })?;
        let values = cells
            .map(|cell| cell.parse::<f64>().unwrap_or(f64::NAN))
            .collect();
        Ok(Some(Sample::new(timestamp, values)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(text: &'static str) -> CsvSource<&'static [u8]> {
        CsvSource::from_reader(text.as_bytes())
    }

    #[test]
    fn reads_timestamp_and_channels() {
        let mut src = source("timestamp,ch0,ch1\n0.0,1.5,2.5\n0.01,-0.5,3\n");
        assert_eq!(
            src.next_sample().unwrap(),
            Some(Sample::new(0.0, vec![1.5, 2.5]))
        );
        assert_eq!(
            src.next_sample().unwrap(),
            Some(Sample::new(0.01, vec![-0.5, 3.0]))
        );
        assert_eq!(src.next_sample().unwrap(), None);
    }

    #[test]
    fn unparsable_cells_become_nan() {
        let mut src = source("timestamp,ch0\n0.0,oops\n0.01,\n");
        let first = src.next_sample().unwrap().unwrap();
        assert!(first.values[0].is_nan());
        let second = src.next_sample().unwrap().unwrap();
        assert!(second.values[0].is_nan());
    }

    #[test]
    fn bad_timestamp_is_malformed() {
        let mut src = source("timestamp,ch0\nnow,1.0\n");
        assert!(matches!(
            src.next_sample(),
            Err(SourceError::Malformed { row: 1, .. })
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        assert!(matches!(
            CsvSource::from_path("/nonexistent/ecg_raw.csv"),
            Err(SourceError::Io(_))
        ));
    }
}
