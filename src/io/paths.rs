//! # Path Output
//!
//! Per-sample path files: one row per reference range in ascending
//! order, naming the chosen gamete(s) and their haplotype ids. An empty
//! body means the sample could not be imputed; re-runs skip samples whose
//! output already exists.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::data::graph::HaplotypeGraph;
use crate::error::Result;
use crate::model::hmm::PathNode;

/// Output file for one sample under the target directory
pub fn path_file(out_dir: &Path, sample: &str) -> PathBuf {
    out_dir.join(format!("{sample}_path.txt"))
}

/// Write one sample's inferred path
pub fn write_path(
    out_dir: &Path,
    sample: &str,
    path: &[PathNode],
    graph: &HaplotypeGraph,
) -> Result<PathBuf> {
    let file = path_file(out_dir, sample);
    let mut writer = BufWriter::new(File::create(&file)?);
    writeln!(writer, "#sample={sample}")?;
    writeln!(writer, "contig\tstart\tend\tgametes\thapids")?;
    for node in path {
        let range = graph.range(node.range);
        let mut gametes = graph.gametes().get(node.first).to_string();
        let mut hapids = hap_or_missing(graph, node);
        if let Some(second) = node.second {
            gametes.push(',');
            gametes.push_str(&graph.gametes().get(second).to_string());
            hapids.push(',');
            hapids.push_str(&match graph.hap_id_of(node.range, second) {
                Some(hap) => hap.to_string(),
                None => ".".to_string(),
            });
        }
        writeln!(
            writer,
            "{}\t{}\t{}\t{gametes}\t{hapids}",
            range.contig, range.start, range.end
        )?;
    }
    writer.flush()?;
    Ok(file)
}

fn hap_or_missing(graph: &HaplotypeGraph, node: &PathNode) -> String {
    match graph.hap_id_of(node.range, node.first) {
        Some(hap) => hap.to_string(),
        None => ".".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::gamete::SampleGamete;
    use crate::data::graph::HapAssignment;
    use crate::data::range::{RangeIdx, ReferenceRange};

    #[test]
    fn test_write_path_rows() {
        let graph = HaplotypeGraph::from_assignments(vec![
            HapAssignment {
                range: ReferenceRange::new("chr1", 0, 100),
                hap: "h1".into(),
                gamete: SampleGamete::new("A", 0),
            },
            HapAssignment {
                range: ReferenceRange::new("chr1", 100, 200),
                hap: "h2".into(),
                gamete: SampleGamete::new("A", 0),
            },
        ])
        .unwrap();
        let a0 = graph.gametes().index_of(&SampleGamete::new("A", 0)).unwrap();
        let path = vec![
            PathNode {
                range: RangeIdx::new(0),
                first: a0,
                second: Some(a0),
            },
            PathNode {
                range: RangeIdx::new(1),
                first: a0,
                second: Some(a0),
            },
        ];

        let dir = std::env::temp_dir().join(format!("haplograph_paths_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let file = write_path(&dir, "S1", &path, &graph).unwrap();
        let content = std::fs::read_to_string(&file).unwrap();
        std::fs::remove_dir_all(&dir).ok();

        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "#sample=S1");
        assert_eq!(lines[2], "chr1\t0\t100\tA_0,A_0\th1,h1");
        assert_eq!(lines[3], "chr1\t100\t200\tA_0,A_0\th2,h2");
    }

    #[test]
    fn test_empty_path_writes_header_only() {
        let graph = HaplotypeGraph::from_assignments(vec![HapAssignment {
            range: ReferenceRange::new("chr1", 0, 100),
            hap: "h1".into(),
            gamete: SampleGamete::new("A", 0),
        }])
        .unwrap();
        let dir = std::env::temp_dir().join(format!("haplograph_paths_empty_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let file = write_path(&dir, "S2", &[], &graph).unwrap();
        let content = std::fs::read_to_string(&file).unwrap();
        std::fs::remove_dir_all(&dir).ok();
        assert_eq!(content.lines().count(), 2);
    }
}
