//! # Haplotype-VCF Reading
//!
//! Parse haplotype-VCF files into the `HaplotypeGraph`. Each record
//! declares, via symbolic alternate alleles, which haplotype every sample
//! gamete carries at one reference range; `##ALT` header lines associate
//! haplotype ids with their provenance. Uses the `noodles` crate for
//! header parsing and bgzip decoding.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender};
use noodles::bgzf::Reader as BgzfReader;
use noodles::vcf::Header;
use tracing::{info, info_span};

use crate::data::gamete::SampleGamete;
use crate::data::graph::{GraphBuilder, HapAssignment, HapId, HaplotypeGraph};
use crate::data::range::ReferenceRange;
use crate::error::{HaplographError, Result};

/// Records sent from the parsing producer to graph-building consumers
const BATCH_SIZE: usize = 1024;
/// Bounded capacity between producer and consumers
const CHANNEL_CAPACITY: usize = 8;

/// Provenance of one haplotype id, from a `##ALT` header line
#[derive(Clone, Debug, Default)]
pub struct HapMetadata {
    pub id: HapId,
    pub description: Option<String>,
    pub sample: Option<String>,
    pub checksum: Option<String>,
    pub regions: Option<String>,
}

/// Open a haplotype-VCF file, decoding bgzip when the extension asks for it
fn open_reader(path: &Path) -> Result<Box<dyn BufRead + Send>> {
    let file = File::open(path)?;
    let is_gzipped = path
        .extension()
        .map(|e| e == "gz" || e == "bgz")
        .unwrap_or(false);
    let reader: Box<dyn BufRead + Send> = if is_gzipped {
        Box::new(BufReader::new(BgzfReader::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };
    Ok(reader)
}

/// Parse the inner `key=value` fields of a `##ALT=<...>` line
///
/// Values may be double-quoted; quoted commas belong to the value.
fn parse_alt_metadata(line: &str) -> Result<HapMetadata> {
    let inner = line
        .strip_prefix("##ALT=<")
        .and_then(|rest| rest.strip_suffix('>'))
        .ok_or_else(|| HaplographError::vcf(format!("malformed ALT header: {line}")))?;

    let mut fields = HashMap::new();
    let mut key = String::new();
    let mut value = String::new();
    let mut in_value = false;
    let mut quoted = false;
    for c in inner.chars() {
        match c {
            '=' if !in_value => in_value = true,
            '"' if in_value => quoted = !quoted,
            ',' if !quoted => {
                fields.insert(std::mem::take(&mut key), std::mem::take(&mut value));
                in_value = false;
            }
            _ if in_value => value.push(c),
            _ => key.push(c),
        }
    }
    if !key.is_empty() {
        fields.insert(key, value);
    }

    let id = fields
        .remove("ID")
        .ok_or_else(|| HaplographError::vcf(format!("ALT header without ID: {line}")))?;
    Ok(HapMetadata {
        id: id.into(),
        description: fields.remove("Description"),
        sample: fields.remove("SampleName").or_else(|| fields.remove("Source")),
        checksum: fields.remove("Checksum"),
        regions: fields.remove("Regions"),
    })
}

/// Streaming parser for one haplotype-VCF file
struct HapVcfParser {
    reader: Box<dyn BufRead + Send>,
    path: PathBuf,
    line: usize,
    samples: Vec<Arc<str>>,
    metadata: HashMap<HapId, HapMetadata>,
}

impl HapVcfParser {
    fn open(path: &Path) -> Result<Self> {
        info_span!("hapvcf_open", path = ?path).in_scope(|| {
            let mut reader = open_reader(path)?;
            let mut metadata = HashMap::new();
            let mut header_str = String::new();
            let mut line_no = 0usize;
            loop {
                let mut line = String::new();
                let bytes = reader.read_line(&mut line)?;
                if bytes == 0 {
                    break;
                }
                line_no += 1;
                if !line.starts_with('#') {
                    return Err(HaplographError::vcf(format!(
                        "{}: record before #CHROM header",
                        path.display()
                    )));
                }
                if line.starts_with("##ALT=") {
                    let meta = parse_alt_metadata(line.trim_end())?;
                    metadata.insert(meta.id.clone(), meta);
                }
                header_str.push_str(&line);
                if line.starts_with("#CHROM") {
                    break;
                }
            }

            let header: Header = header_str.parse()?;
            let samples: Vec<Arc<str>> = header
                .sample_names()
                .iter()
                .map(|s| Arc::from(s.as_str()))
                .collect();
            if samples.is_empty() {
                return Err(HaplographError::vcf(format!(
                    "{}: no sample columns",
                    path.display()
                )));
            }

            Ok(Self {
                reader,
                path: path.to_path_buf(),
                line: line_no,
                samples,
                metadata,
            })
        })
    }

    fn parse_error(&self, message: impl Into<String>) -> HaplographError {
        HaplographError::parse(
            self.line,
            format!("{}: {}", self.path.display(), message.into()),
        )
    }

    /// Parse the next record into gamete→haplotype assignments
    fn next_record(&mut self) -> Result<Option<Vec<HapAssignment>>> {
        let mut line = String::new();
        loop {
            line.clear();
            let bytes = self.reader.read_line(&mut line)?;
            if bytes == 0 {
                return Ok(None);
            }
            self.line += 1;
            if !line.trim().is_empty() {
                break;
            }
        }

        let fields: Vec<&str> = line.trim_end().split('\t').collect();
        if fields.len() < 10 {
            return Err(self.parse_error("record has fewer than 10 columns"));
        }
        let contig = fields[0];
        let pos: u32 = fields[1]
            .parse()
            .map_err(|_| self.parse_error("invalid POS"))?;
        let ref_allele = fields[3];
        let alts: Vec<HapId> = fields[4]
            .split(',')
            .map(|alt| {
                alt.strip_prefix('<')
                    .and_then(|a| a.strip_suffix('>'))
                    .map(HapId::from)
                    .ok_or_else(|| self.parse_error(format!("non-symbolic ALT allele {alt}")))
            })
            .collect::<Result<_>>()?;
        for alt in &alts {
            if !self.metadata.contains_key(alt) {
                return Err(self.parse_error(format!("ALT {alt} has no ##ALT metadata")));
            }
        }

        // Half-open range: 1-based POS and inclusive END
        let start = pos.saturating_sub(1);
        let end = parse_info_end(fields[7]).unwrap_or(start + ref_allele.len() as u32);
        let range = ReferenceRange::new(contig, start, end);

        let gt_position = fields[8]
            .split(':')
            .position(|key| key == "GT")
            .ok_or_else(|| self.parse_error("FORMAT without GT"))?;

        let mut assignments = Vec::new();
        for (sample_idx, column) in fields[9..].iter().enumerate() {
            let sample = self
                .samples
                .get(sample_idx)
                .ok_or_else(|| self.parse_error("more genotype columns than samples"))?;
            let gt = column
                .split(':')
                .nth(gt_position)
                .ok_or_else(|| self.parse_error("missing GT subfield"))?;
            for (gamete_idx, allele) in gt.split(['/', '|']).enumerate() {
                if allele == "." || allele == "0" {
                    continue; // absent at this range
                }
                let allele_no: usize = allele
                    .parse()
                    .map_err(|_| self.parse_error(format!("invalid GT allele {allele}")))?;
                let hap = alts
                    .get(allele_no - 1)
                    .ok_or_else(|| self.parse_error(format!("GT allele {allele_no} out of range")))?
                    .clone();
                assignments.push(HapAssignment {
                    range: range.clone(),
                    hap,
                    gamete: SampleGamete::new(sample.clone(), gamete_idx as u8),
                });
            }
        }
        Ok(Some(assignments))
    }
}

fn parse_info_end(info: &str) -> Option<u32> {
    info.split(';')
        .find_map(|field| field.strip_prefix("END="))
        .and_then(|value| value.parse().ok())
}

/// Haplotype-VCF files under a directory, sorted for determinism
pub fn list_hapvcf_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if name.ends_with(".vcf")
            || name.ends_with(".vcf.gz")
            || name.ends_with(".hvcf")
            || name.ends_with(".hvcf.gz")
        {
            files.push(path);
        }
    }
    files.sort();
    if files.is_empty() {
        return Err(HaplographError::vcf(format!(
            "no haplotype-VCF files under {}",
            dir.display()
        )));
    }
    Ok(files)
}

/// Load the haplotype graph from a directory of haplotype-VCF files
///
/// One producer thread parses files and sends record batches over a
/// bounded channel; `workers` consumers accumulate partial per-range
/// maps, which are merged and finalized after the channel drains. Range
/// ids are assigned by the terminal sort, not by arrival order.
pub fn load_graph(dir: &Path, workers: usize) -> Result<HaplotypeGraph> {
    let files = list_hapvcf_files(dir)?;
    let workers = workers.max(1);
    let (tx, rx): (Sender<Vec<HapAssignment>>, Receiver<Vec<HapAssignment>>) =
        bounded(CHANNEL_CAPACITY);

    let mut partials: Vec<GraphBuilder> = Vec::new();
    let mut producer_result: Result<()> = Ok(());

    std::thread::scope(|scope| {
        let producer = scope.spawn(move || -> Result<()> {
            for path in &files {
                let mut parser = HapVcfParser::open(path)?;
                let mut batch = Vec::with_capacity(BATCH_SIZE);
                while let Some(assignments) = parser.next_record()? {
                    batch.extend(assignments);
                    if batch.len() >= BATCH_SIZE {
                        let full = std::mem::replace(&mut batch, Vec::with_capacity(BATCH_SIZE));
                        if tx.send(full).is_err() {
                            return Ok(()); // consumers gone; nothing to do
                        }
                    }
                }
                if !batch.is_empty() && tx.send(batch).is_err() {
                    return Ok(());
                }
            }
            Ok(())
        });

        let consumers: Vec<_> = (0..workers)
            .map(|_| {
                let rx = rx.clone();
                scope.spawn(move || {
                    let mut builder = GraphBuilder::new();
                    for batch in rx.iter() {
                        for assignment in batch {
                            builder.add(assignment);
                        }
                    }
                    builder
                })
            })
            .collect();
        drop(rx);

        producer_result = producer.join().expect("producer panicked");
        partials = consumers
            .into_iter()
            .map(|handle| handle.join().expect("consumer panicked"))
            .collect();
    });
    producer_result?;

    let mut builder = GraphBuilder::new();
    for partial in partials {
        builder.merge(partial);
    }
    let graph = builder.finish()?;
    info!(
        ranges = graph.n_ranges(),
        gametes = graph.gametes().len(),
        "haplotype graph loaded"
    );
    Ok(graph)
}
