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

// memory.rs
//
// Word-addressed data memory. The image is sparse: every multiple of 8 below
// the configured size starts at 1.0, reads of any other address yield 0.0,
// and stores may populate new addresses.

use std::collections::BTreeMap;

pub const WORD_SIZE: i64 = 8;

#[derive(Debug, Clone, PartialEq)]
pub struct Memory {
    data: BTreeMap<i64, f64>,
    size: usize,
}

impl Memory {
    pub fn new(size: usize) -> Self {
        let mut data = BTreeMap::new();
        let mut addr = 0i64;
        while (addr as usize) < size {
            data.insert(addr, 1.0);
            addr += WORD_SIZE;
        }
        Self { data, size }
    }

    pub fn read(&self, addr: i64) -> f64 {
        self.data.get(&addr).copied().unwrap_or(0.0)
    }

    pub fn write(&mut self, addr: i64, value: f64) {
        self.data.insert(addr, value);
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Sorted (address, value) pairs for state snapshots.
    pub fn contents(&self) -> Vec<(i64, f64)> {
        self.data.iter().map(|(&addr, &value)| (addr, value)).collect()
    }
}
