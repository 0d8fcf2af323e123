// Copyright 2025 STARGA Inc.
// Licensed under the Apache License, Version 2.0 (the “License”);
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at:
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an “AS IS” BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Part of the MIND project (Machine Intelligence Native Design).

//! CPU topology discovery.
//!
//! The hardware description is line-oriented `key : value` text with one
//! block per logical processor, as found in `/proc/cpuinfo`. Only the
//! `processor`, `physical id` and `core id` keys are consulted.

use std::collections::HashSet;
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Cursor};
use std::path::PathBuf;

use tracing::{debug, warn};

/// Default hardware description on Linux.
pub const CPUINFO_PATH: &str = "/proc/cpuinfo";

/// Physical layout of the logical processors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Topology {
    /// Logical processor ids in record order.
    pub processors: Vec<u32>,
    /// Physical package of each entry in `processors`.
    pub physical_ids: Vec<u32>,
    /// Processors that are the first hardware thread of their physical core.
    pub unique_processors: Vec<u32>,
}

impl Topology {
    /// No processor records were found; placement falls back to unpinned.
    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    pub fn physical_id_of(&self, processor: u32) -> Option<u32> {
        self.processors
            .iter()
            .position(|&p| p == processor)
            .map(|i| self.physical_ids[i])
    }

    /// Distinct physical packages in ascending order.
    pub fn groups(&self) -> Vec<u32> {
        let mut groups = self.physical_ids.clone();
        groups.sort_unstable();
        groups.dedup();
        groups
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} logical processors, {} physical cores, {} packages",
            self.processors.len(),
            self.unique_processors.len(),
            self.groups().len()
        )?;
        for (processor, package) in self.processors.iter().zip(&self.physical_ids) {
            let marker = if self.unique_processors.contains(processor) { "*" } else { "" };
            writeln!(f, "  cpu{processor}{marker} package {package}")?;
        }
        Ok(())
    }
}

/// A readable hardware description.
pub trait TopologySource {
    fn open(&self) -> io::Result<Box<dyn BufRead>>;
}

/// Reads a cpuinfo-formatted file.
#[derive(Debug, Clone)]
pub struct CpuInfoFile {
    pub path: PathBuf,
}

impl CpuInfoFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for CpuInfoFile {
    fn default() -> Self {
        Self::new(CPUINFO_PATH)
    }
}

impl TopologySource for CpuInfoFile {
    fn open(&self) -> io::Result<Box<dyn BufRead>> {
        Ok(Box::new(BufReader::new(File::open(&self.path)?)))
    }
}

/// In-memory hardware description.
#[derive(Debug, Clone)]
pub struct StaticTopology(pub String);

impl TopologySource for StaticTopology {
    fn open(&self) -> io::Result<Box<dyn BufRead>> {
        Ok(Box::new(Cursor::new(self.0.clone().into_bytes())))
    }
}

#[derive(Default)]
struct Record {
    processor: Option<u32>,
    physical_id: Option<u32>,
    core_id: Option<u32>,
}

impl Record {
    fn is_blank(&self) -> bool {
        self.processor.is_none() && self.physical_id.is_none() && self.core_id.is_none()
    }
}

/// Discover the topology described by `source`.
///
/// An unreadable source yields an empty topology. Records without both a
/// `physical id` and a `core id` are dropped.
pub fn discover(source: &dyn TopologySource) -> Topology {
    match source.open().and_then(parse) {
        Ok(topology) => {
            debug!(
                processors = topology.processors.len(),
                cores = topology.unique_processors.len(),
                "discovered cpu topology"
            );
            topology
        }
        Err(err) => {
            warn!(error = %err, "cpu topology unavailable, workers will not be pinned");
            Topology::default()
        }
    }
}

fn parse(reader: Box<dyn BufRead>) -> io::Result<Topology> {
    let mut topology = Topology::default();
    let mut seen = HashSet::new();
    let mut record = Record::default();
    for line in reader.split(b'\n') {
        let line = line?;
        let line = String::from_utf8_lossy(&line);
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim().parse::<u32>().ok();
        match key.trim() {
            "processor" => {
                finish(std::mem::take(&mut record), &mut topology, &mut seen);
                record.processor = value;
            }
            "physical id" => record.physical_id = value,
            "core id" => record.core_id = value,
            _ => {}
        }
    }
    finish(record, &mut topology, &mut seen);
    Ok(topology)
}

fn finish(record: Record, topology: &mut Topology, seen: &mut HashSet<(u32, u32)>) {
    if record.is_blank() {
        return;
    }
    let (Some(processor), Some(physical_id), Some(core_id)) =
        (record.processor, record.physical_id, record.core_id)
    else {
        warn!(processor = ?record.processor, "dropping incomplete cpu topology record");
        return;
    };
    topology.processors.push(processor);
    topology.physical_ids.push(physical_id);
    if seen.insert((physical_id, core_id)) {
        topology.unique_processors.push(processor);
    }
}
