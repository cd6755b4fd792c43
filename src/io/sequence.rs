//! # Haplotype Sequence Providers
//!
//! The index builder needs the nucleotide sequence behind each haplotype
//! id. Production pangenomes keep sequences in an external compressed
//! store, so the lookup is a trait seam with a shell-out implementation;
//! small graphs and tests use the in-memory map.

use std::collections::HashMap;
use std::process::Command;

use crate::data::graph::HapId;
use crate::data::range::ReferenceRange;
use crate::error::{HaplographError, Result};

/// Source of haplotype sequences, shared read-only across index workers
pub trait SequenceSource: Sync {
    /// The ACGT sequence of a haplotype at its reference range
    fn sequence(&self, hap: &HapId, range: &ReferenceRange) -> Result<String>;
}

/// In-memory sequence map, keyed by haplotype id
#[derive(Clone, Debug, Default)]
pub struct MemorySequenceSource {
    sequences: HashMap<HapId, String>,
}

impl MemorySequenceSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, hap: impl Into<HapId>, sequence: impl Into<String>) {
        self.sequences.insert(hap.into(), sequence.into());
    }
}

impl SequenceSource for MemorySequenceSource {
    fn sequence(&self, hap: &HapId, _range: &ReferenceRange) -> Result<String> {
        self.sequences.get(hap).cloned().ok_or_else(|| {
            HaplographError::missing_reference(format!("no sequence for haplotype {hap}"))
        })
    }
}

/// Shells out to an external compressed-genome tool
///
/// The command template is split on whitespace; the placeholders `{hap}`,
/// `{contig}`, `{start}` and `{end}` are substituted per lookup, and the
/// tool's stdout (whitespace stripped) is the sequence.
#[derive(Clone, Debug)]
pub struct CommandSequenceSource {
    template: Vec<String>,
}

impl CommandSequenceSource {
    pub fn new(template: &str) -> Result<Self> {
        let template: Vec<String> = template.split_whitespace().map(String::from).collect();
        if template.is_empty() {
            return Err(HaplographError::config(
                "sequence-provider command must not be empty",
            ));
        }
        Ok(Self { template })
    }

    fn render(&self, hap: &HapId, range: &ReferenceRange) -> Vec<String> {
        self.template
            .iter()
            .map(|token| {
                token
                    .replace("{hap}", hap)
                    .replace("{contig}", &range.contig)
                    .replace("{start}", &range.start.to_string())
                    .replace("{end}", &range.end.to_string())
            })
            .collect()
    }
}

impl SequenceSource for CommandSequenceSource {
    fn sequence(&self, hap: &HapId, range: &ReferenceRange) -> Result<String> {
        let args = self.render(hap, range);
        let output = Command::new(&args[0]).args(&args[1..]).output()?;
        if !output.status.success() {
            return Err(HaplographError::missing_reference(format!(
                "sequence provider failed for haplotype {hap} at {range}: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        let sequence: String = String::from_utf8_lossy(&output.stdout)
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        if sequence.is_empty() {
            return Err(HaplographError::missing_reference(format!(
                "sequence provider returned nothing for haplotype {hap}"
            )));
        }
        Ok(sequence)
    }
}
