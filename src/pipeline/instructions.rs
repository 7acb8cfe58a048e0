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

// instructions.rs
//
// Decoded instruction model for the pipeline. It defines the register
// newtype, the ALU and branch operators, and the Operation sum type that
// dispatch, write-back, and commit all pattern-match on.

use std::fmt;

use crate::errors::SimulatorError;

/// Register bank: integer (R0..R31) or floating-point (F0..F31).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegBank {
    Int,
    Float,
}

/// A named architectural register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Reg {
    pub bank: RegBank,
    pub num: u8,
}

impl Reg {
    pub const BANK_SIZE: usize = 32;

    /// Parse a register name like "R4" or "F12" (case-insensitive).
    pub fn parse(name: &str) -> Result<Self, SimulatorError> {
        let name = name.trim();
        let bank = match name.chars().next() {
            Some('R') | Some('r') => RegBank::Int,
            Some('F') | Some('f') => RegBank::Float,
            _ => return Err(SimulatorError::InvalidRegister(name.to_string())),
        };
        let num = name[1..]
            .parse::<u8>()
            .map_err(|_| SimulatorError::InvalidRegister(name.to_string()))?;
        if num as usize >= Self::BANK_SIZE {
            return Err(SimulatorError::InvalidRegister(name.to_string()));
        }
        Ok(Self { bank, num })
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bank {
            RegBank::Int => write!(f, "R{}", self.num),
            RegBank::Float => write!(f, "F{}", self.num),
        }
    }
}

/// Arithmetic operator carried by ADD/SUB/MUL/DIV and the immediate forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl AluOp {
    /// Apply the operator. Division by zero yields 0.0 rather than trapping.
    pub fn apply(&self, vj: f64, vk: f64) -> f64 {
        match self {
            AluOp::Add => vj + vk,
            AluOp::Sub => vj - vk,
            AluOp::Mul => vj * vk,
            AluOp::Div => {
                if vk == 0.0 {
                    0.0
                } else {
                    vj / vk
                }
            },
        }
    }

    pub fn class(&self) -> OpClass {
        match self {
            AluOp::Add | AluOp::Sub => OpClass::Add,
            AluOp::Mul | AluOp::Div => OpClass::Mul,
        }
    }
}

/// Branch comparison: BEQ, BNE, or the single-operand BNEZ.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchCond {
    Eq,
    Ne,
    Nez,
}

impl BranchCond {
    pub fn eval(&self, vj: f64, vk: f64) -> bool {
        match self {
            BranchCond::Eq => vj == vk,
            BranchCond::Ne => vj != vk,
            BranchCond::Nez => vj != 0.0,
        }
    }
}

/// Reservation-station and functional-unit class an instruction routes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpClass {
    Add,
    Mul,
    Load,
    Store,
    Branch,
}

impl OpClass {
    pub const ALL: [OpClass; 5] = [
        OpClass::Add,
        OpClass::Mul,
        OpClass::Load,
        OpClass::Store,
        OpClass::Branch,
    ];
}

impl fmt::Display for OpClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OpClass::Add => "ADD",
            OpClass::Mul => "MUL",
            OpClass::Load => "LOAD",
            OpClass::Store => "STORE",
            OpClass::Branch => "BRANCH",
        };
        write!(f, "{}", name)
    }
}

/// Operand shape of a decoded instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// `op rd, rs, rt`
    Arith3 { op: AluOp, rd: Reg, rs: Reg, rt: Reg },
    /// `op rd, rs, imm`
    ArithI { op: AluOp, rd: Reg, rs: Reg, imm: i64 },
    /// `LD rd, offset(base)`
    Load { rd: Reg, base: Reg, offset: i64 },
    /// `SD rd, offset(base)`, where `rd` is the source of the stored value
    Store { rd: Reg, base: Reg, offset: i64 },
    /// `BEQ/BNE rs, rt, target` or `BNEZ rs, target`
    Branch {
        cond: BranchCond,
        rs: Reg,
        rt: Option<Reg>,
        target: String,
    },
    Halt,
}

impl Operation {
    /// Station class this operation issues to. `None` for HLT, which stops
    /// dispatch without entering the pipeline.
    pub fn class(&self) -> Option<OpClass> {
        match self {
            Operation::Arith3 { op, .. } | Operation::ArithI { op, .. } => Some(op.class()),
            Operation::Load { .. } => Some(OpClass::Load),
            Operation::Store { .. } => Some(OpClass::Store),
            Operation::Branch { .. } => Some(OpClass::Branch),
            Operation::Halt => None,
        }
    }

    /// Destination register tracked by the ROB. Stores and branches write no
    /// register.
    pub fn dest(&self) -> Option<Reg> {
        match self {
            Operation::Arith3 { rd, .. }
            | Operation::ArithI { rd, .. }
            | Operation::Load { rd, .. } => Some(*rd),
            _ => None,
        }
    }

    pub fn is_store(&self) -> bool {
        matches!(self, Operation::Store { .. })
    }
}

/// A decoded source line: the trimmed text (which also serves as the
/// instruction's identity for the branch predictor), its optional label, and
/// the operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub raw: String,
    pub label: Option<String>,
    pub op: Operation,
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}
