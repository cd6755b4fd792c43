//! # Path-Finding Pipeline
//!
//! The multi-sample orchestrator: a producer loads read-mapping files, a
//! bounded channel fans samples out to path-finding workers, and a single
//! writer serializes finished paths. Workers share the graph read-only;
//! backpressure comes from the channel bounds, and a sample that fails
//! aborts only itself.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::{info, instrument, warn};

use crate::config::{FindPathsArgs, PathType};
use crate::data::counts::ReadMapping;
use crate::data::graph::HaplotypeGraph;
use crate::error::{HaplographError, Result};
use crate::io::hapvcf::load_graph;
use crate::io::paths::{path_file, write_path};
use crate::io::read_counts::read_read_mapping;
use crate::model::ancestors::AncestorSelector;
use crate::model::hmm::{DiploidPathFinder, HaploidPathFinder, PathNode};

/// Capacity of the sample and path channels
const CHANNEL_CAPACITY: usize = 10;

/// Cooperative cancellation shared by all pipeline workers
///
/// On cancel, the producer stops feeding new samples and each worker
/// finishes the sample it already holds.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Multi-sample path-finding pipeline
pub struct PathFindingPipeline {
    args: FindPathsArgs,
    cancel: CancelToken,
}

impl PathFindingPipeline {
    pub fn new(args: FindPathsArgs) -> Self {
        Self {
            args,
            cancel: CancelToken::new(),
        }
    }

    /// Token for cancelling the run from another thread
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Run path finding for every mapped sample; returns the number of
    /// samples that failed
    #[instrument(name = "find_paths", skip(self))]
    pub fn run(&self) -> Result<usize> {
        let graph = load_graph(&self.args.hvcf_dir, self.args.threads)?;
        let files = list_mapping_files(&self.args.mapping_dir)?;
        std::fs::create_dir_all(&self.args.out_dir)?;

        let failed = AtomicUsize::new(0);
        let (sample_tx, sample_rx): (Sender<ReadMapping>, Receiver<ReadMapping>) =
            bounded(CHANNEL_CAPACITY);
        let (path_tx, path_rx): (
            Sender<(Arc<str>, Vec<PathNode>)>,
            Receiver<(Arc<str>, Vec<PathNode>)>,
        ) = bounded(CHANNEL_CAPACITY);

        let mut worker_results: Vec<Result<()>> = Vec::new();
        std::thread::scope(|scope| {
            let producer = {
                let failed = &failed;
                let cancel = &self.cancel;
                let out_dir = &self.args.out_dir;
                scope.spawn(move || {
                    for file in &files {
                        if cancel.is_cancelled() {
                            break;
                        }
                        let mapping = match read_read_mapping(file) {
                            Ok(mapping) => mapping,
                            Err(e) => {
                                warn!(file = ?file, error = %e, "mapping file aborted");
                                failed.fetch_add(1, Ordering::Relaxed);
                                continue;
                            }
                        };
                        if path_file(out_dir, &mapping.sample).exists() {
                            info!(sample = %mapping.sample, "output exists, skipping");
                            continue;
                        }
                        if sample_tx.send(mapping).is_err() {
                            break;
                        }
                    }
                })
            };

            let workers: Vec<_> = (0..self.args.threads)
                .map(|_| {
                    let rx = sample_rx.clone();
                    let tx = path_tx.clone();
                    let graph = &graph;
                    let failed = &failed;
                    scope.spawn(move || -> Result<()> {
                        for mapping in rx.iter() {
                            match self.impute_sample(graph, &mapping) {
                                Ok(path) => {
                                    if tx.send((mapping.sample.clone(), path)).is_err() {
                                        break;
                                    }
                                }
                                Err(e) if e.is_fatal() => return Err(e),
                                Err(e) => {
                                    warn!(sample = %mapping.sample, error = %e, "sample aborted");
                                    failed.fetch_add(1, Ordering::Relaxed);
                                }
                            }
                        }
                        Ok(())
                    })
                })
                .collect();
            drop(sample_rx);
            drop(path_tx);

            let writer = {
                let failed = &failed;
                let graph = &graph;
                let out_dir = &self.args.out_dir;
                scope.spawn(move || {
                    for (sample, path) in path_rx.iter() {
                        match write_path(out_dir, &sample, &path, graph) {
                            Ok(_) => {
                                info!(sample = %sample, nodes = path.len(), "path written")
                            }
                            Err(e) => {
                                warn!(sample = %sample, error = %e, "path write aborted");
                                failed.fetch_add(1, Ordering::Relaxed);
                            }
                        }
                    }
                })
            };

            producer.join().expect("producer panicked");
            worker_results = workers
                .into_iter()
                .map(|handle| handle.join().expect("worker panicked"))
                .collect();
            writer.join().expect("writer panicked");
        });

        for result in worker_results {
            result?;
        }
        Ok(failed.load(Ordering::Relaxed))
    }

    /// Ancestor pruning (optional) followed by Viterbi path finding
    fn impute_sample(
        &self,
        graph: &HaplotypeGraph,
        mapping: &ReadMapping,
    ) -> Result<Vec<PathNode>> {
        let candidates = if self.args.use_likely_ancestors {
            let selector = AncestorSelector::new(graph, self.args.ancestor_params());
            selector
                .select(&mapping.sample, &mapping.counts)?
                .into_iter()
                .map(|pick| pick.gamete)
                .collect()
        } else {
            Vec::new()
        };

        let observations = mapping.counts.group_by_range(graph)?;
        let params = self.args.path_params();
        match self.args.path_type {
            PathType::Haploid => {
                HaploidPathFinder::new(graph, candidates, params).find_path(&observations)
            }
            PathType::Diploid => {
                DiploidPathFinder::new(graph, candidates, params).find_path(&observations)
            }
        }
    }
}

/// Read-mapping files under the input directory, sorted for determinism
fn list_mapping_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if name.ends_with("_readmapping.txt") {
            files.push(path);
        }
    }
    files.sort();
    if files.is_empty() {
        return Err(HaplographError::malformed(format!(
            "no read-mapping files under {}",
            dir.display()
        )));
    }
    Ok(files)
}
