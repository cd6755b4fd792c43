//! # K-mer Index Serialization
//!
//! The index file is a stream of per-range blocks, three lines each: a
//! `>contig:start-end` header, the comma-separated little-endian u64
//! words of the row bit matrix, and the `hash@row` pairs stored for the
//! range, the hash printed as a signed decimal int64. Range ids are
//! assigned in file order, which must agree with the graph's sorted
//! range order.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use tracing::{info, info_span};

use crate::data::graph::HaplotypeGraph;
use crate::data::range::RangeIdx;
use crate::error::{HaplographError, Result};
use crate::model::index::{KmerIndex, RangeKmerSets};

/// Write the index, one three-line block per range in ascending range order
pub fn write_index(index: &KmerIndex, graph: &HaplotypeGraph, path: &Path) -> Result<()> {
    info_span!("write_kmer_index", path = ?path).in_scope(|| {
        // Group the global kmer map per range in one pass
        let mut per_range: Vec<Vec<(u64, u32)>> = vec![Vec::new(); index.n_ranges()];
        for (kmer, entries) in index.iter_kmers() {
            for &(range, row) in entries {
                per_range[range.as_usize()].push((kmer, row));
            }
        }

        let mut writer = BufWriter::new(File::create(path)?);
        for (range_id, pairs) in per_range.iter_mut().enumerate() {
            let range = RangeIdx::new(range_id as u32);
            writeln!(writer, ">{}", graph.range(range))?;

            let words: Vec<String> = index
                .range_sets(range)
                .words()
                .iter()
                .map(|w| w.to_string())
                .collect();
            writeln!(writer, "{}", words.join(","))?;

            pairs.sort_unstable();
            let pairs: Vec<String> = pairs
                .iter()
                .map(|&(kmer, row)| format!("{}@{row}", kmer as i64))
                .collect();
            writeln!(writer, "{}", pairs.join(","))?;
        }
        writer.flush()?;
        info!(ranges = index.n_ranges(), kmers = index.n_kmers(), "kmer index written");
        Ok(())
    })
}

/// Parse an index file back into the in-memory structures
///
/// The graph supplies each range's haplotype list; the file must contain
/// exactly one block per graph range, in graph order.
pub fn read_index(graph: &HaplotypeGraph, path: &Path) -> Result<KmerIndex> {
    info_span!("read_kmer_index", path = ?path).in_scope(|| {
        let reader = BufReader::new(File::open(path)?);
        let mut lines = reader.lines().enumerate();

        let mut ranges: Vec<RangeKmerSets> = Vec::with_capacity(graph.n_ranges());
        let mut kmers: HashMap<u64, Vec<(RangeIdx, u32)>> = HashMap::new();

        loop {
            let Some((line_no, header)) = lines.next() else {
                break;
            };
            let header = header?;
            let range_id = ranges.len();
            if range_id >= graph.n_ranges() {
                return Err(HaplographError::malformed(format!(
                    "index file has more blocks than the graph has ranges ({})",
                    graph.n_ranges()
                )));
            }
            let range = RangeIdx::new(range_id as u32);

            let expected = format!(">{}", graph.range(range));
            if header != expected {
                return Err(HaplographError::parse(
                    line_no + 1,
                    format!("expected range header {expected}, found {header}"),
                ));
            }

            let (words_line_no, words_line) = lines.next().ok_or_else(|| {
                HaplographError::malformed("index file truncated inside a range block")
            })?;
            let words_line = words_line?;
            let words: Vec<u64> = if words_line.is_empty() {
                Vec::new()
            } else {
                words_line
                    .split(',')
                    .map(|w| {
                        w.parse().map_err(|_| {
                            HaplographError::parse(words_line_no + 1, format!("invalid word {w}"))
                        })
                    })
                    .collect::<Result<_>>()?
            };

            let (pairs_line_no, pairs_line) = lines.next().ok_or_else(|| {
                HaplographError::malformed("index file truncated inside a range block")
            })?;
            let pairs_line = pairs_line?;
            let mut pairs: Vec<(u64, u32)> = Vec::new();
            if !pairs_line.is_empty() {
                for pair in pairs_line.split(',') {
                    let (hash, row) = pair.split_once('@').ok_or_else(|| {
                        HaplographError::parse(pairs_line_no + 1, format!("invalid pair {pair}"))
                    })?;
                    let hash: i64 = hash.parse().map_err(|_| {
                        HaplographError::parse(pairs_line_no + 1, format!("invalid hash {hash}"))
                    })?;
                    let row: u32 = row.parse().map_err(|_| {
                        HaplographError::parse(pairs_line_no + 1, format!("invalid row id {row}"))
                    })?;
                    pairs.push((hash as u64, row));
                }
            }

            let n_rows = pairs.iter().map(|&(_, row)| row + 1).max().unwrap_or(0);
            let sets = RangeKmerSets::from_words(graph.haps(range).to_vec(), words, n_rows)?;
            for &(kmer, row) in &pairs {
                if row >= sets.n_rows() {
                    return Err(HaplographError::parse(
                        pairs_line_no + 1,
                        format!("row id {row} out of range"),
                    ));
                }
                kmers.entry(kmer).or_default().push((range, row));
            }
            ranges.push(sets);
        }

        if ranges.len() != graph.n_ranges() {
            return Err(HaplographError::malformed(format!(
                "index file has {} blocks, graph has {} ranges",
                ranges.len(),
                graph.n_ranges()
            )));
        }
        Ok(KmerIndex::from_parts(ranges, kmers))
    })
}
