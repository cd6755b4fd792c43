//! # Read-Mapping File I/O
//!
//! One file per sample: `#key=value` provenance headers, a `HapIds\tcount`
//! column header, then one row per distinct haplotype set with its read
//! count. This is the only persisted output of read mapping.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::data::counts::{ReadMapping, ReadMappingCounts};
use crate::data::graph::HapId;
use crate::error::{HaplographError, Result};

/// Write one sample's mapping counts
pub fn write_read_mapping(mapping: &ReadMapping, path: &Path) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    writeln!(writer, "#sampleName={}", mapping.sample)?;
    writeln!(writer, "#filename1={}", mapping.filename1)?;
    if let Some(ref filename2) = mapping.filename2 {
        writeln!(writer, "#filename2={filename2}")?;
    }
    writeln!(writer, "HapIds\tcount")?;
    for (haps, count) in mapping.counts.iter_sorted() {
        let ids: Vec<&str> = haps.iter().map(|h| h.as_ref()).collect();
        writeln!(writer, "{}\t{count}", ids.join(","))?;
    }
    writer.flush()?;
    Ok(())
}

/// Parse a read-mapping file
pub fn read_read_mapping(path: &Path) -> Result<ReadMapping> {
    let reader = BufReader::new(File::open(path)?);

    let mut sample = None;
    let mut filename1 = None;
    let mut filename2 = None;
    let mut counts = ReadMappingCounts::new();
    let mut saw_column_header = false;

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        if let Some(header) = line.strip_prefix('#') {
            let (key, value) = header.split_once('=').ok_or_else(|| {
                HaplographError::parse(line_no + 1, format!("malformed header {line}"))
            })?;
            match key {
                "sampleName" => sample = Some(value.to_string()),
                "filename1" => filename1 = Some(value.to_string()),
                "filename2" => filename2 = Some(value.to_string()),
                _ => {
                    return Err(HaplographError::parse(
                        line_no + 1,
                        format!("unknown header key {key}"),
                    ))
                }
            }
            continue;
        }
        if !saw_column_header {
            if line != "HapIds\tcount" {
                return Err(HaplographError::parse(
                    line_no + 1,
                    "expected HapIds\\tcount column header",
                ));
            }
            saw_column_header = true;
            continue;
        }

        let (ids, count) = line.split_once('\t').ok_or_else(|| {
            HaplographError::parse(line_no + 1, format!("expected two columns, found {line}"))
        })?;
        let count: u32 = count
            .parse()
            .map_err(|_| HaplographError::parse(line_no + 1, format!("invalid count {count}")))?;
        let mut haps: Vec<HapId> = ids.split(',').map(HapId::from).collect();
        if haps.iter().any(|h| h.is_empty()) {
            return Err(HaplographError::parse(
                line_no + 1,
                "empty haplotype id in set",
            ));
        }
        // The stored list is sorted; re-sorting tolerates hand-edited files
        haps.sort();
        counts.add_count(haps, count);
    }

    let sample = sample
        .ok_or_else(|| HaplographError::malformed(format!("{}: no #sampleName header", path.display())))?;
    let filename1 = filename1
        .ok_or_else(|| HaplographError::malformed(format!("{}: no #filename1 header", path.display())))?;
    if !saw_column_header {
        return Err(HaplographError::malformed(format!(
            "{}: no column header",
            path.display()
        )));
    }

    Ok(ReadMapping {
        sample: sample.into(),
        filename1,
        filename2,
        counts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("haplograph_counts_{name}_{}", std::process::id()))
    }

    #[test]
    fn test_round_trip() {
        let mut counts = ReadMappingCounts::new();
        counts.add_count(vec!["h1".into(), "h2".into()], 7);
        counts.add_count(vec!["h3".into()], 2);
        let mapping = ReadMapping {
            sample: "S1".into(),
            filename1: "reads_1.fq.gz".to_string(),
            filename2: Some("reads_2.fq.gz".to_string()),
            counts,
        };

        let path = temp_path("roundtrip");
        write_read_mapping(&mapping, &path).unwrap();
        let parsed = read_read_mapping(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(parsed.sample.as_ref(), "S1");
        assert_eq!(parsed.filename1, "reads_1.fq.gz");
        assert_eq!(parsed.filename2.as_deref(), Some("reads_2.fq.gz"));
        assert_eq!(parsed.counts, mapping.counts);
    }

    #[test]
    fn test_missing_sample_header_is_malformed() {
        let path = temp_path("nosample");
        std::fs::write(&path, "HapIds\tcount\nh1\t3\n").unwrap();
        let result = read_read_mapping(&path);
        std::fs::remove_file(&path).ok();
        assert!(matches!(
            result,
            Err(HaplographError::MalformedInput { .. })
        ));
    }

    #[test]
    fn test_bad_count_is_parse_error() {
        let path = temp_path("badcount");
        std::fs::write(
            &path,
            "#sampleName=S\n#filename1=r.fq\nHapIds\tcount\nh1\tNaN\n",
        )
        .unwrap();
        let result = read_read_mapping(&path);
        std::fs::remove_file(&path).ok();
        assert!(matches!(result, Err(HaplographError::Parse { .. })));
    }
}
