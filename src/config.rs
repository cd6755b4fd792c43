//! # Configuration Logic
//!
//! CLI argument parsing and validation using clap derive. Every option
//! consumed by the core lives here; values outside their declared ranges
//! are fatal before any work begins.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::error::{HaplographError, Result};
use crate::model::ancestors::AncestorParams;
use crate::model::hmm::PathParams;
use crate::model::index::IndexParams;
use crate::model::mapping::MappingParams;

/// haplograph: pangenome haplotype-graph imputation from short reads
#[derive(Parser, Debug, Clone)]
#[command(name = "haplograph")]
#[command(version = "0.1.0")]
#[command(about = "Pangenome haplotype-graph imputation from short reads", long_about = None)]
pub struct Config {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Build the k-mer index over a haplotype graph
    BuildIndex(BuildIndexArgs),
    /// Map sample reads to haplotype sets using the k-mer index
    MapReads(MapReadsArgs),
    /// Infer haploid or diploid paths from read-mapping counts
    FindPaths(FindPathsArgs),
}

/// Whether paths carry one gamete or a gamete pair per range
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathType {
    Haploid,
    Diploid,
}

#[derive(Args, Debug, Clone)]
pub struct BuildIndexArgs {
    /// Directory of haplotype-VCF files describing the pangenome
    #[arg(long, value_name = "DIR")]
    pub hvcf_dir: PathBuf,

    /// Sequence-provider command template; `{hap}`, `{contig}`, `{start}`
    /// and `{end}` are substituted per lookup
    #[arg(long, value_name = "CMD")]
    pub seq_command: String,

    /// Output index file
    #[arg(long, short, value_name = "FILE")]
    pub out: PathBuf,

    /// Reject kmers present in more than this fraction of a range's haplotypes
    #[arg(long, default_value = "0.75")]
    pub max_haplotype_proportion: f64,

    /// Subsampling mask over kmer low bits; 0 retains all kmers
    #[arg(long, default_value = "0")]
    pub hash_mask: u64,

    /// Keep a kmer iff `kmer & hash_mask == hash_filter_value`
    #[arg(long, default_value = "0")]
    pub hash_filter_value: u64,

    /// Number of threads (default: all available cores)
    #[arg(long)]
    pub threads: Option<usize>,
}

#[derive(Args, Debug, Clone)]
pub struct MapReadsArgs {
    /// Directory of haplotype-VCF files describing the pangenome
    #[arg(long, value_name = "DIR")]
    pub hvcf_dir: PathBuf,

    /// K-mer index file produced by build-index
    #[arg(long, value_name = "FILE")]
    pub index: PathBuf,

    /// Key file with `sample<TAB>readFile1[<TAB>readFile2]` rows
    #[arg(long, value_name = "FILE", conflicts_with_all = ["sample", "read_file1", "read_file2"])]
    pub key_file: Option<PathBuf>,

    /// Sample name, for single-sample invocations
    #[arg(long, requires = "read_file1")]
    pub sample: Option<String>,

    /// Read file (FASTQ/FASTA, optionally gzipped)
    #[arg(long, value_name = "FILE")]
    pub read_file1: Option<PathBuf>,

    /// Mate file for paired-end reads
    #[arg(long, value_name = "FILE", requires = "read_file1")]
    pub read_file2: Option<PathBuf>,

    /// Directory for per-sample read-mapping files
    #[arg(long, value_name = "DIR")]
    pub out_dir: PathBuf,

    /// Within a range, keep haplotypes with at least this fraction of the
    /// maximum kmer hit count
    #[arg(long, default_value = "1.0")]
    pub min_proportion_of_max_count: f64,

    /// Drop reads whose kmer hits are not dominated by a single range
    #[arg(long, default_value = "false")]
    pub limit_single_ref_range: bool,

    /// Hit fraction the dominant range must hold
    #[arg(long, default_value = "0.9")]
    pub min_same_reference_range: f64,
}

#[derive(Args, Debug, Clone)]
pub struct FindPathsArgs {
    /// Directory of haplotype-VCF files describing the pangenome
    #[arg(long, value_name = "DIR")]
    pub hvcf_dir: PathBuf,

    /// Directory of per-sample read-mapping files
    #[arg(long, value_name = "DIR")]
    pub mapping_dir: PathBuf,

    /// Directory for per-sample path files
    #[arg(long, value_name = "DIR")]
    pub out_dir: PathBuf,

    /// Haploid or diploid inference
    #[arg(long, value_enum, default_value = "haploid")]
    pub path_type: PathType,

    /// Emission binomial success probability
    #[arg(long, default_value = "0.99")]
    pub prob_correct: f64,

    /// HMM self-transition probability
    #[arg(long, default_value = "0.99")]
    pub prob_same_gamete: f64,

    /// Skip ranges carried by fewer gametes; 0 disables the filter
    #[arg(long, default_value = "1")]
    pub min_gametes: u32,

    /// Skip ranges with fewer distinct observed haplotype sets
    #[arg(long, default_value = "0")]
    pub min_reads: u32,

    /// Skip ranges denser than this many reads per kilobase
    #[arg(long, default_value = "1000")]
    pub max_reads_per_kb: u32,

    /// Skip ranges where every haplotype has identical read support
    #[arg(long, default_value = "false")]
    pub remove_equal: bool,

    /// Inbreeding coefficient for diploid transitions
    #[arg(long, default_value = "0.0")]
    pub inbreeding_coefficient: f64,

    /// Restrict HMM states to the most likely ancestral gametes
    #[arg(long, default_value = "false")]
    pub use_likely_ancestors: bool,

    /// Maximum ancestors to select per sample
    #[arg(long, default_value = "20")]
    pub max_ancestors: usize,

    /// Stop ancestor selection at this coverage fraction
    #[arg(long, default_value = "1.0")]
    pub min_coverage: f64,

    /// Worker threads for concurrent samples
    #[arg(long, default_value = "3")]
    pub threads: usize,
}

impl Config {
    /// Parse command line arguments and validate
    pub fn parse_and_validate() -> Result<Self> {
        let config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        match &self.command {
            Command::BuildIndex(args) => args.validate(),
            Command::MapReads(args) => args.validate(),
            Command::FindPaths(args) => args.validate(),
        }
    }
}

fn check_dir_exists(path: &PathBuf, what: &str) -> Result<()> {
    if !path.is_dir() {
        return Err(HaplographError::config(format!(
            "{what} is not a directory: {}",
            path.display()
        )));
    }
    Ok(())
}

fn check_unit_interval(value: f64, name: &str, allow_zero: bool) -> Result<()> {
    let low_ok = if allow_zero { value >= 0.0 } else { value > 0.0 };
    if !low_ok || value > 1.0 {
        return Err(HaplographError::config(format!(
            "{name} must be in {}0, 1], got {value}",
            if allow_zero { "[" } else { "(" }
        )));
    }
    Ok(())
}

impl BuildIndexArgs {
    pub fn validate(&self) -> Result<()> {
        check_dir_exists(&self.hvcf_dir, "hvcf-dir")?;
        check_unit_interval(self.max_haplotype_proportion, "max-haplotype-proportion", false)?;
        if self.hash_filter_value & !self.hash_mask != 0 {
            return Err(HaplographError::config(
                "hash-filter-value has bits outside hash-mask",
            ));
        }
        if self.threads == Some(0) {
            return Err(HaplographError::config("threads must be at least 1"));
        }
        Ok(())
    }

    pub fn index_params(&self) -> IndexParams {
        IndexParams {
            max_haplotype_proportion: self.max_haplotype_proportion,
            hash_mask: self.hash_mask,
            hash_filter_value: self.hash_filter_value,
        }
    }

    /// Number of threads to use
    pub fn threads(&self) -> usize {
        self.threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }
}

impl MapReadsArgs {
    pub fn validate(&self) -> Result<()> {
        check_dir_exists(&self.hvcf_dir, "hvcf-dir")?;
        if !self.index.exists() {
            return Err(HaplographError::FileNotFound {
                path: self.index.clone(),
            });
        }
        if self.key_file.is_none() && self.read_file1.is_none() {
            return Err(HaplographError::config(
                "either key-file or sample/read-file1 is required",
            ));
        }
        if self.read_file1.is_some() && self.sample.is_none() {
            return Err(HaplographError::config(
                "read-file1 requires a sample name",
            ));
        }
        check_unit_interval(self.min_proportion_of_max_count, "min-proportion-of-max-count", false)?;
        check_unit_interval(self.min_same_reference_range, "min-same-reference-range", false)?;
        Ok(())
    }

    pub fn mapping_params(&self) -> MappingParams {
        MappingParams {
            min_proportion_of_max_count: self.min_proportion_of_max_count,
            limit_single_ref_range: self.limit_single_ref_range,
            min_same_reference_range: self.min_same_reference_range,
        }
    }
}

impl FindPathsArgs {
    pub fn validate(&self) -> Result<()> {
        check_dir_exists(&self.hvcf_dir, "hvcf-dir")?;
        check_dir_exists(&self.mapping_dir, "mapping-dir")?;
        check_unit_interval(self.prob_correct, "prob-correct", false)?;
        check_unit_interval(self.prob_same_gamete, "prob-same-gamete", false)?;
        check_unit_interval(self.inbreeding_coefficient, "inbreeding-coefficient", true)?;
        check_unit_interval(self.min_coverage, "min-coverage", false)?;
        if self.max_ancestors == 0 {
            return Err(HaplographError::config("max-ancestors must be at least 1"));
        }
        if self.threads == 0 {
            return Err(HaplographError::config("threads must be at least 1"));
        }
        Ok(())
    }

    pub fn path_params(&self) -> PathParams {
        PathParams {
            prob_correct: self.prob_correct,
            prob_same_gamete: self.prob_same_gamete,
            inbreeding: self.inbreeding_coefficient,
            min_reads: self.min_reads,
            max_reads_per_kb: self.max_reads_per_kb,
            remove_equal: self.remove_equal,
            min_gametes: self.min_gametes,
        }
    }

    pub fn ancestor_params(&self) -> AncestorParams {
        AncestorParams {
            max_ancestors: self.max_ancestors,
            min_coverage: self.min_coverage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find_paths_args(dir: &PathBuf) -> FindPathsArgs {
        FindPathsArgs {
            hvcf_dir: dir.clone(),
            mapping_dir: dir.clone(),
            out_dir: dir.clone(),
            path_type: PathType::Haploid,
            prob_correct: 0.99,
            prob_same_gamete: 0.99,
            min_gametes: 1,
            min_reads: 0,
            max_reads_per_kb: 1000,
            remove_equal: false,
            inbreeding_coefficient: 0.0,
            use_likely_ancestors: false,
            max_ancestors: 20,
            min_coverage: 1.0,
            threads: 3,
        }
    }

    #[test]
    fn test_out_of_range_probability_is_config_error() {
        let dir = std::env::temp_dir();
        let mut args = find_paths_args(&dir);
        args.prob_correct = 1.5;
        assert!(matches!(
            args.validate(),
            Err(HaplographError::Config { .. })
        ));

        let mut args = find_paths_args(&dir);
        args.inbreeding_coefficient = -0.1;
        assert!(args.validate().is_err());

        let mut args = find_paths_args(&dir);
        args.threads = 0;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_inbreeding_boundaries_are_valid() {
        let dir = std::env::temp_dir();
        let mut args = find_paths_args(&dir);
        args.inbreeding_coefficient = 0.0;
        assert!(args.validate().is_ok());
        args.inbreeding_coefficient = 1.0;
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_hash_filter_outside_mask_rejected() {
        let args = BuildIndexArgs {
            hvcf_dir: std::env::temp_dir(),
            seq_command: "agc getctg {hap}".to_string(),
            out: std::env::temp_dir().join("ix.txt"),
            max_haplotype_proportion: 0.75,
            hash_mask: 3,
            hash_filter_value: 4,
            threads: None,
        };
        assert!(matches!(
            args.validate(),
            Err(HaplographError::Config { .. })
        ));
    }
}
