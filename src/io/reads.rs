//! # Read Streams
//!
//! Streaming access to FASTQ/FASTA read files, plain or gzipped. Reads
//! are consumed one sequence at a time and dropped after their range
//! contributions are emitted, so file size never bounds memory.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;

use crate::error::{HaplographError, Result};

/// Record format, detected from the first byte of the stream
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ReadFormat {
    Fastq,
    Fasta,
}

/// Iterator over the sequences of one read file
pub struct ReadStream {
    reader: Box<dyn BufRead + Send>,
    format: ReadFormat,
    path: PathBuf,
    line: usize,
    /// FASTA carry-over: the next record's header line
    pending_header: Option<String>,
    done: bool,
}

impl ReadStream {
    /// Open a read file; `.gz` and `.bgz` suffixes select gzip decoding
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(HaplographError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let file = File::open(path)?;
        let is_gzipped = path
            .extension()
            .map(|e| e == "gz" || e == "bgz")
            .unwrap_or(false);
        let reader: Box<dyn BufRead + Send> = if is_gzipped {
            Box::new(BufReader::new(MultiGzDecoder::new(file)))
        } else {
            Box::new(BufReader::new(file))
        };
        Self::from_reader(reader, path.to_path_buf())
    }

    fn from_reader(mut reader: Box<dyn BufRead + Send>, path: PathBuf) -> Result<Self> {
        let first = {
            let buf = reader.fill_buf()?;
            buf.first().copied()
        };
        let format = match first {
            Some(b'@') => ReadFormat::Fastq,
            Some(b'>') => ReadFormat::Fasta,
            None => ReadFormat::Fasta, // empty file: an empty stream
            Some(other) => {
                return Err(HaplographError::malformed(format!(
                    "{}: unrecognized read format (first byte {:#04x})",
                    path.display(),
                    other
                )))
            }
        };
        Ok(Self {
            reader,
            format,
            path,
            line: 0,
            pending_header: None,
            done: false,
        })
    }

    fn read_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        let bytes = self.reader.read_line(&mut line)?;
        if bytes == 0 {
            return Ok(None);
        }
        self.line += 1;
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(Some(line))
    }

    fn malformed(&self, message: &str) -> HaplographError {
        HaplographError::parse(self.line, format!("{}: {message}", self.path.display()))
    }

    fn next_fastq(&mut self) -> Result<Option<Vec<u8>>> {
        let Some(header) = self.read_line()? else {
            return Ok(None);
        };
        if !header.starts_with('@') {
            return Err(self.malformed("expected @ record header"));
        }
        let seq = self
            .read_line()?
            .ok_or_else(|| self.malformed("truncated FASTQ record"))?;
        let plus = self
            .read_line()?
            .ok_or_else(|| self.malformed("truncated FASTQ record"))?;
        if !plus.starts_with('+') {
            return Err(self.malformed("expected + separator"));
        }
        let qual = self
            .read_line()?
            .ok_or_else(|| self.malformed("truncated FASTQ record"))?;
        if qual.len() != seq.len() {
            return Err(self.malformed("quality length differs from sequence length"));
        }
        Ok(Some(seq.into_bytes()))
    }

    fn next_fasta(&mut self) -> Result<Option<Vec<u8>>> {
        let header = match self.pending_header.take() {
            Some(h) => h,
            None => match self.read_line()? {
                Some(h) => h,
                None => return Ok(None),
            },
        };
        if !header.starts_with('>') {
            return Err(self.malformed("expected > record header"));
        }
        let mut seq = Vec::new();
        loop {
            match self.read_line()? {
                None => break,
                Some(line) if line.starts_with('>') => {
                    self.pending_header = Some(line);
                    break;
                }
                Some(line) => seq.extend_from_slice(line.as_bytes()),
            }
        }
        Ok(Some(seq))
    }
}

impl Iterator for ReadStream {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let record = match self.format {
            ReadFormat::Fastq => self.next_fastq(),
            ReadFormat::Fasta => self.next_fasta(),
        };
        match record {
            Ok(Some(seq)) => Some(Ok(seq)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Zip two mate streams; a length mismatch between the files is a
/// format-contract violation
pub struct PairedReadStream {
    first: ReadStream,
    second: ReadStream,
}

impl PairedReadStream {
    pub fn open(path1: &Path, path2: &Path) -> Result<Self> {
        Ok(Self {
            first: ReadStream::open(path1)?,
            second: ReadStream::open(path2)?,
        })
    }
}

impl Iterator for PairedReadStream {
    type Item = Result<(Vec<u8>, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        match (self.first.next(), self.second.next()) {
            (None, None) => None,
            (Some(Ok(a)), Some(Ok(b))) => Some(Ok((a, b))),
            (Some(Err(e)), _) | (_, Some(Err(e))) => Some(Err(e)),
            (Some(_), None) | (None, Some(_)) => Some(Err(HaplographError::malformed(
                "paired read files have different record counts",
            ))),
        }
    }
}
