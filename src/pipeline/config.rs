// Copyright (c) 2024 Mudit Bhargava
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.
//

// config.rs
//
// This file contains the configuration structs for the pipeline engine.
// Builder-style setters mirror how a simulator is usually assembled in
// tests: start from defaults, override a knob or two.

use crate::pipeline::instructions::OpClass;

/// Per-op-class resource counts (reservation stations or functional units).
#[derive(Debug, Clone, Copy)]
pub struct ClassCounts {
    pub add: usize,
    pub mul: usize,
    pub load: usize,
    pub store: usize,
    pub branch: usize,
}

impl ClassCounts {
    pub fn for_class(&self, class: OpClass) -> usize {
        match class {
            OpClass::Add => self.add,
            OpClass::Mul => self.mul,
            OpClass::Load => self.load,
            OpClass::Store => self.store,
            OpClass::Branch => self.branch,
        }
    }
}

/// Cycles a station occupies a functional unit, per op class. The STORE
/// latency covers address computation only; the memory write itself happens
/// at commit.
#[derive(Debug, Clone, Copy)]
pub struct LatencyConfig {
    pub add: usize,
    pub mul: usize,
    pub load: usize,
    pub store: usize,
    pub branch: usize,
}

impl LatencyConfig {
    pub fn for_class(&self, class: OpClass) -> usize {
        match class {
            OpClass::Add => self.add,
            OpClass::Mul => self.mul,
            OpClass::Load => self.load,
            OpClass::Store => self.store,
            OpClass::Branch => self.branch,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Max issues and commits per cycle
    pub issue_width: usize,
    /// Reorder buffer capacity
    pub rob_size: usize,
    /// Reservation stations per op class
    pub station_counts: ClassCounts,
    /// Functional units per op class
    pub unit_counts: ClassCounts,
    pub latencies: LatencyConfig,
    /// 2-bit counter table length
    pub predictor_table_size: usize,
    /// Byte span of the initialized data memory
    pub memory_size: usize,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatorConfig {
    pub fn new() -> Self {
        Self {
            issue_width: 4,
            rob_size: 16,
            station_counts: ClassCounts {
                add: 3,
                mul: 2,
                load: 2,
                store: 2,
                branch: 1,
            },
            unit_counts: ClassCounts {
                add: 2,
                mul: 2,
                load: 2,
                store: 2,
                branch: 1,
            },
            latencies: LatencyConfig {
                add: 1,
                mul: 2,
                load: 2,
                store: 1,
                branch: 1,
            },
            predictor_table_size: 64,
            memory_size: 128,
        }
    }

    pub fn with_issue_width(mut self, width: usize) -> Self {
        assert!(width > 0, "Issue width must be positive");
        self.issue_width = width;
        self
    }

    pub fn with_rob_size(mut self, size: usize) -> Self {
        assert!(size > 0, "ROB size must be positive");
        self.rob_size = size;
        self
    }

    pub fn with_station_counts(mut self, counts: ClassCounts) -> Self {
        self.station_counts = counts;
        self
    }

    pub fn with_unit_counts(mut self, counts: ClassCounts) -> Self {
        self.unit_counts = counts;
        self
    }

    pub fn with_latencies(mut self, latencies: LatencyConfig) -> Self {
        self.latencies = latencies;
        self
    }

    pub fn with_predictor_table_size(mut self, size: usize) -> Self {
        assert!(size > 0, "Predictor table size must be positive");
        self.predictor_table_size = size;
        self
    }

    pub fn with_memory_size(mut self, size: usize) -> Self {
        self.memory_size = size;
        self
    }
}
