#![forbid(unsafe_code)]

use crate::chunk::Chunk;
use crate::error::Result;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Running `(min, max, sum, count)` for one key.
///
/// The mean is only derived at the end, so merging is associative and commutative.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct RunningStat {
    pub min: f64,
    pub max: f64,
    pub sum: f64,
    pub count: u64,
}

impl RunningStat {
    pub fn new(value: f64) -> Self {
        Self {
            min: value,
            max: value,
            sum: value,
            count: 1,
        }
    }

    pub fn observe(&mut self, value: f64) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.sum += value;
        self.count += 1;
    }

    pub fn merge(&mut self, other: &RunningStat) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.sum += other.sum;
        self.count += other.count;
    }

    pub fn mean(&self) -> f64 {
        self.sum / self.count as f64
    }
}

/// Per-key statistics over a stream of chunks.
///
/// Each chunk is grouped locally first and then merged into the running table, so the
/// table is touched once per distinct key per chunk rather than once per row.
#[derive(Clone, Debug, Default)]
pub struct Aggregator {
    stats: HashMap<String, RunningStat>,
    rows: u64,
    chunks: usize,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_chunk(&mut self, chunk: &Chunk) {
        let mut local: HashMap<&str, RunningStat> = HashMap::new();
        chunk.for_each_row(|key, value| {
            local
                .entry(key)
                .and_modify(|stat| stat.observe(value))
                .or_insert_with(|| RunningStat::new(value));
        });

        for (key, stat) in local {
            match self.stats.get_mut(key) {
                Some(running) => running.merge(&stat),
                None => {
                    self.stats.insert(key.to_owned(), stat);
                }
            }
        }
        self.rows += chunk.num_rows() as u64;
        self.chunks += 1;
    }

    /// Drain `chunks` into the table, stopping at the first error.
    ///
    /// On error the table holds a partial result and should be discarded.
    pub fn consume<I>(&mut self, chunks: I) -> Result<()>
    where
        I: IntoIterator<Item = Result<Chunk>>,
    {
        for chunk in chunks {
            self.push_chunk(&chunk?);
        }
        Ok(())
    }

    /// Fold another aggregator's table into this one.
    pub fn merge(&mut self, other: Aggregator) {
        for (key, stat) in other.stats {
            self.stats
                .entry(key)
                .and_modify(|running| running.merge(&stat))
                .or_insert(stat);
        }
        self.rows += other.rows;
        self.chunks += other.chunks;
    }

    pub fn get(&self, key: &str) -> Option<&RunningStat> {
        self.stats.get(key)
    }

    pub fn key_count(&self) -> usize {
        self.stats.len()
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn chunks(&self) -> usize {
        self.chunks
    }

    pub fn finish(self) -> AggregateReport {
        let mut keys: Vec<KeySummary> = self
            .stats
            .into_iter()
            .map(|(key, stat)| KeySummary {
                min: stat.min,
                mean: stat.mean(),
                max: stat.max,
                count: stat.count,
                key,
            })
            .collect();
        keys.sort_unstable_by(|a, b| a.key.cmp(&b.key));

        AggregateReport {
            keys,
            rows: self.rows,
            chunks: self.chunks,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct KeySummary {
    pub key: String,
    pub min: f64,
    pub mean: f64,
    pub max: f64,
    pub count: u64,
}

impl fmt::Display for KeySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}/{:.1}/{:.1}", self.min, self.mean, self.max)
    }
}

/// Final aggregation result, sorted by key.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AggregateReport {
    pub keys: Vec<KeySummary>,
    pub rows: u64,
    pub chunks: usize,
}

impl AggregateReport {
    pub fn get(&self, key: &str) -> Option<&KeySummary> {
        self.keys
            .binary_search_by(|summary| summary.key.as_str().cmp(key))
            .ok()
            .map(|idx| &self.keys[idx])
    }

    /// Key to `"{min:.1}/{mean:.1}/{max:.1}"`.
    pub fn formatted(&self) -> BTreeMap<String, String> {
        self.keys
            .iter()
            .map(|summary| (summary.key.clone(), summary.to_string()))
            .collect()
    }
}

impl fmt::Display for AggregateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for summary in &self.keys {
            writeln!(f, "{}: {summary}", summary.key)?;
        }
        Ok(())
    }
}
