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

// registers.rs
//
// Architectural register file: 32 integer and 32 floating-point registers,
// each paired with a producer tag naming the ROB entry that will write it.
// Writing a tag is the rename step of dispatch; commit clears the tag only
// when it still names the committing entry.

use crate::errors::SimulatorError;
use crate::pipeline::components::RobId;
use crate::pipeline::instructions::{Reg, RegBank};

#[derive(Debug, Clone, PartialEq)]
pub struct RegisterFile {
    pub int_regs: [i64; Reg::BANK_SIZE],
    pub fp_regs: [f64; Reg::BANK_SIZE],
    pub int_tags: [Option<RobId>; Reg::BANK_SIZE],
    pub fp_tags: [Option<RobId>; Reg::BANK_SIZE],
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterFile {
    pub fn new() -> Self {
        Self {
            int_regs: [0; Reg::BANK_SIZE],
            fp_regs: [0.0; Reg::BANK_SIZE],
            int_tags: [None; Reg::BANK_SIZE],
            fp_tags: [None; Reg::BANK_SIZE],
        }
    }

    /// Read the architectural value, widening integers to the pipeline's
    /// operand type.
    pub fn get(&self, reg: Reg) -> f64 {
        match reg.bank {
            RegBank::Int => self.int_regs[reg.num as usize] as f64,
            RegBank::Float => self.fp_regs[reg.num as usize],
        }
    }

    /// Write the architectural value. Integer-bank writes truncate.
    pub fn set(&mut self, reg: Reg, value: f64) {
        match reg.bank {
            RegBank::Int => self.int_regs[reg.num as usize] = value as i64,
            RegBank::Float => self.fp_regs[reg.num as usize] = value,
        }
    }

    pub fn tag(&self, reg: Reg) -> Option<RobId> {
        match reg.bank {
            RegBank::Int => self.int_tags[reg.num as usize],
            RegBank::Float => self.fp_tags[reg.num as usize],
        }
    }

    pub fn set_tag(&mut self, reg: Reg, tag: RobId) {
        match reg.bank {
            RegBank::Int => self.int_tags[reg.num as usize] = Some(tag),
            RegBank::Float => self.fp_tags[reg.num as usize] = Some(tag),
        }
    }

    pub fn clear_tag(&mut self, reg: Reg) {
        match reg.bank {
            RegBank::Int => self.int_tags[reg.num as usize] = None,
            RegBank::Float => self.fp_tags[reg.num as usize] = None,
        }
    }

    pub fn clear_all_tags(&mut self) {
        self.int_tags = [None; Reg::BANK_SIZE];
        self.fp_tags = [None; Reg::BANK_SIZE];
    }

    /// Name-based read for harness code; unknown names are a caller error.
    pub fn read_named(&self, name: &str) -> Result<f64, SimulatorError> {
        Ok(self.get(Reg::parse(name)?))
    }

    /// Name-based write for harness code.
    pub fn write_named(&mut self, name: &str, value: f64) -> Result<(), SimulatorError> {
        let reg = Reg::parse(name)?;
        self.set(reg, value);
        Ok(())
    }
}
