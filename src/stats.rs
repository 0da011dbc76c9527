//! Aggregate statistics over decoded blocks.

use std::collections::HashMap;
use std::fmt;

use crate::decoder::ParsedBlock;

/// Record-level counters accumulated over one or more blocks.
#[derive(Debug, Default, Clone)]
pub struct RecordStatistics {
    pub total_records: usize,
    pub valid_records: usize,
    pub invalid_records: usize,
    pub record_lengths: Vec<usize>,
    pub item_frequency: HashMap<String, usize>,
}

impl RecordStatistics {
    pub fn new() -> Self {
        RecordStatistics::default()
    }

    /// Folds one decoded block into the counters.
    pub fn add_block(&mut self, block: &ParsedBlock) {
        for record in &block.records {
            self.total_records += 1;
            if record.valid {
                self.valid_records += 1;
            } else {
                self.invalid_records += 1;
            }
            self.record_lengths.push(record.byte_length);
            for item in &record.items {
                *self.item_frequency.entry(item.id.clone()).or_insert(0) += 1;
            }
        }
    }

    pub fn from_blocks<'a, I: IntoIterator<Item = &'a ParsedBlock>>(blocks: I) -> Self {
        let mut stats = RecordStatistics::new();
        for block in blocks {
            stats.add_block(block);
        }
        stats
    }
}

impl fmt::Display for RecordStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== RECORD STATISTICS ===")?;
        writeln!(f, "Total records: {}", self.total_records)?;
        writeln!(f, "Valid records: {}", self.valid_records)?;
        writeln!(f, "Invalid records: {}", self.invalid_records)?;
        if self.total_records > 0 {
            let rate = self.valid_records as f64 / self.total_records as f64 * 100.0;
            writeln!(f, "Success rate: {rate:.1}%")?;
        }
        if !self.record_lengths.is_empty() {
            let min = self.record_lengths.iter().min().copied().unwrap_or(0);
            let max = self.record_lengths.iter().max().copied().unwrap_or(0);
            let avg =
                self.record_lengths.iter().sum::<usize>() as f64 / self.record_lengths.len() as f64;
            writeln!(f, "Record lengths: min {min}, max {max}, avg {avg:.1}")?;
        }
        if !self.item_frequency.is_empty() {
            writeln!(f, "Data item frequency:")?;
            let mut items: Vec<_> = self.item_frequency.iter().collect();
            items.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
            for (id, count) in items {
                let pct = *count as f64 / self.total_records as f64 * 100.0;
                writeln!(f, "  {id:>12}: {count:>4} ({pct:.1}%)")?;
            }
        }
        Ok(())
    }
}
