//! # Read-Mapping Pipeline
//!
//! Per-sample read mapping: stream each sample's reads against the kmer
//! index and persist the resulting count multiset. A sample that fails is
//! logged and skipped; the run continues with the next sample.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::{info, instrument, warn};

use crate::config::MapReadsArgs;
use crate::data::counts::ReadMapping;
use crate::data::graph::HaplotypeGraph;
use crate::error::{HaplographError, Result};
use crate::io::hapvcf::load_graph;
use crate::io::kmer_index::read_index;
use crate::io::read_counts::write_read_mapping;
use crate::io::reads::{PairedReadStream, ReadStream};
use crate::model::index::KmerIndex;
use crate::model::mapping::ReadMapper;

/// One sample's read files, from the key file or the CLI
#[derive(Clone, Debug)]
struct SampleReads {
    sample: String,
    read_file1: PathBuf,
    read_file2: Option<PathBuf>,
}

/// Read-mapping pipeline
pub struct MappingPipeline {
    args: MapReadsArgs,
}

impl MappingPipeline {
    pub fn new(args: MapReadsArgs) -> Self {
        Self { args }
    }

    /// Run mapping for every listed sample; returns the number of samples
    /// that failed
    #[instrument(name = "map_reads", skip(self))]
    pub fn run(&self) -> Result<usize> {
        let graph = load_graph(&self.args.hvcf_dir, 1)?;
        let index = read_index(&graph, &self.args.index)?;
        let samples = self.list_samples()?;
        std::fs::create_dir_all(&self.args.out_dir)?;

        let mut failed = 0usize;
        for entry in samples {
            let out = mapping_file(&self.args.out_dir, &entry.sample);
            if out.exists() {
                info!(sample = %entry.sample, "output exists, skipping");
                continue;
            }
            match self
                .map_sample(&graph, &index, &entry)
                .and_then(|mapping| write_read_mapping(&mapping, &out).map(|()| mapping))
            {
                Ok(mapping) => {
                    info!(
                        sample = %entry.sample,
                        sets = mapping.counts.n_sets(),
                        reads = mapping.counts.total_reads(),
                        "sample mapped"
                    );
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(sample = %entry.sample, error = %e, "sample aborted");
                    failed += 1;
                }
            }
        }
        Ok(failed)
    }

    fn map_sample(
        &self,
        graph: &HaplotypeGraph,
        index: &KmerIndex,
        entry: &SampleReads,
    ) -> Result<ReadMapping> {
        let mapper = ReadMapper::new(graph, index, self.args.mapping_params());
        let counts = match &entry.read_file2 {
            Some(read_file2) => {
                let pairs = PairedReadStream::open(&entry.read_file1, read_file2)?;
                mapper.map_paired_stream(pairs)?
            }
            None => {
                let reads = ReadStream::open(&entry.read_file1)?;
                mapper.map_single_stream(reads)?
            }
        };
        Ok(ReadMapping {
            sample: entry.sample.as_str().into(),
            filename1: entry.read_file1.display().to_string(),
            filename2: entry.read_file2.as_ref().map(|p| p.display().to_string()),
            counts,
        })
    }

    /// Samples from the key file, or the single CLI-specified sample
    fn list_samples(&self) -> Result<Vec<SampleReads>> {
        if let Some(ref key_file) = self.args.key_file {
            return parse_key_file(key_file);
        }
        let sample = self
            .args
            .sample
            .clone()
            .ok_or_else(|| HaplographError::config("sample name required"))?;
        let read_file1 = self
            .args
            .read_file1
            .clone()
            .ok_or_else(|| HaplographError::config("read-file1 required"))?;
        Ok(vec![SampleReads {
            sample,
            read_file1,
            read_file2: self.args.read_file2.clone(),
        }])
    }
}

/// Mapping output file for one sample
pub fn mapping_file(out_dir: &Path, sample: &str) -> PathBuf {
    out_dir.join(format!("{sample}_readmapping.txt"))
}

/// Parse `sample<TAB>readFile1[<TAB>readFile2]` rows
fn parse_key_file(path: &Path) -> Result<Vec<SampleReads>> {
    let reader = BufReader::new(File::open(path)?);
    let mut samples = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 2 || fields.len() > 3 {
            return Err(HaplographError::parse(
                line_no + 1,
                format!("key file row needs 2 or 3 columns, found {}", fields.len()),
            ));
        }
        samples.push(SampleReads {
            sample: fields[0].to_string(),
            read_file1: PathBuf::from(fields[1]),
            read_file2: fields.get(2).map(PathBuf::from),
        });
    }
    if samples.is_empty() {
        return Err(HaplographError::malformed(format!(
            "{}: key file lists no samples",
            path.display()
        )));
    }
    Ok(samples)
}
