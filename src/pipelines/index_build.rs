//! # Index-Build Pipeline
//!
//! Load the haplotype graph, stream every haplotype sequence through the
//! kmer index builder, and persist the index. Built once per pangenome;
//! mapping and path finding treat the result as read-only.

use tracing::{info, instrument};

use crate::config::BuildIndexArgs;
use crate::error::{HaplographError, Result};
use crate::io::hapvcf::load_graph;
use crate::io::kmer_index::write_index;
use crate::io::sequence::CommandSequenceSource;
use crate::model::index::KmerIndexBuilder;

/// Index construction pipeline
pub struct IndexBuildPipeline {
    args: BuildIndexArgs,
}

impl IndexBuildPipeline {
    pub fn new(args: BuildIndexArgs) -> Self {
        Self { args }
    }

    /// Run the pipeline: graph → index → file
    #[instrument(name = "build_index", skip(self))]
    pub fn run(&self) -> Result<()> {
        let threads = self.args.threads();
        let graph = load_graph(&self.args.hvcf_dir, threads)?;
        let source = CommandSequenceSource::new(&self.args.seq_command)?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| HaplographError::config(format!("thread pool: {e}")))?;
        let builder = KmerIndexBuilder::new(&graph, self.args.index_params());
        let index = pool.install(|| builder.build(&source))?;

        write_index(&index, &graph, &self.args.out)?;
        info!(out = ?self.args.out, "index build complete");
        Ok(())
    }
}
