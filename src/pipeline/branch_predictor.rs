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

// branch_predictor.rs
//
// This file contains the implementation of the branch predictor for the
// pipeline. Each branch instruction hashes (by its text, standing in for a
// PC) into a fixed table of 2-bit saturating counters; states 0 and 1
// predict not-taken, 2 and 3 predict taken. Accuracy bookkeeping is kept
// apart from the counters, so a pipeline flush disturbs neither.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::pipeline::instructions::Instruction;

/// Branch prediction states using a 2-bit saturating counter scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictionState {
    StronglyNotTaken = 0,
    WeaklyNotTaken = 1,
    WeaklyTaken = 2,
    StronglyTaken = 3,
}

impl PredictionState {
    pub fn is_taken(&self) -> bool {
        matches!(
            self,
            PredictionState::WeaklyTaken | PredictionState::StronglyTaken
        )
    }

    pub fn update(&self, taken: bool) -> Self {
        match (self, taken) {
            (PredictionState::StronglyNotTaken, false) => PredictionState::StronglyNotTaken,
            (PredictionState::StronglyNotTaken, true) => PredictionState::WeaklyNotTaken,
            (PredictionState::WeaklyNotTaken, false) => PredictionState::StronglyNotTaken,
            (PredictionState::WeaklyNotTaken, true) => PredictionState::WeaklyTaken,
            (PredictionState::WeaklyTaken, false) => PredictionState::WeaklyNotTaken,
            (PredictionState::WeaklyTaken, true) => PredictionState::StronglyTaken,
            (PredictionState::StronglyTaken, false) => PredictionState::WeaklyTaken,
            (PredictionState::StronglyTaken, true) => PredictionState::StronglyTaken,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BranchPredictor {
    table: Vec<PredictionState>,

    /// Statistics
    pub correct: usize,
    pub total: usize,
}

impl BranchPredictor {
    pub fn new(table_size: usize) -> Self {
        Self {
            table: vec![PredictionState::WeaklyNotTaken; table_size],
            correct: 0,
            total: 0,
        }
    }

    // DefaultHasher rather than a HashMap keeps the index stable across runs.
    fn index(&self, instr: &Instruction) -> usize {
        let mut hasher = DefaultHasher::new();
        instr.raw.hash(&mut hasher);
        (hasher.finish() % self.table.len() as u64) as usize
    }

    /// Counter state currently associated with this branch.
    pub fn state(&self, instr: &Instruction) -> PredictionState {
        self.table[self.index(instr)]
    }

    /// Predict taken iff the counter has saturated into the taken half.
    pub fn predict(&self, instr: &Instruction) -> bool {
        self.state(instr).is_taken()
    }

    /// Record a resolved branch against the prediction made at dispatch.
    pub fn update(&mut self, taken: bool, predicted: bool) {
        self.total += 1;
        if taken == predicted {
            self.correct += 1;
        }
    }

    /// Move this branch's counter one step toward the actual outcome.
    pub fn train(&mut self, instr: &Instruction, taken: bool) {
        let index = self.index(instr);
        self.table[index] = self.table[index].update(taken);
    }

    /// Fraction of correct predictions; 1.0 before any branch resolves.
    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        self.correct as f64 / self.total as f64
    }
}
