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

// mod.rs
//
// Text decoder: one assembly line in, one decoded instruction out. Lines the
// decoder cannot understand are dropped at load time; the reasons surface
// through the log facade rather than as hard errors.

use log::debug;

use crate::errors::SimulatorError;
use crate::pipeline::instructions::{AluOp, BranchCond, Instruction, Operation, Reg};

/// A parsed source line. A label may stand alone on its line, in which case
/// `instr` is `None` and the label binds to the next retained instruction.
#[derive(Debug, Clone)]
pub struct SourceLine {
    pub label: Option<String>,
    pub instr: Option<Instruction>,
}

/// Decode a single line: strip `#` comments, split an optional `label:`
/// prefix, then parse the remainder. Unrecognizable lines yield no
/// instruction.
pub fn parse_line(raw: &str) -> SourceLine {
    let without_comment = match raw.find('#') {
        Some(pos) => &raw[..pos],
        None => raw,
    };
    let mut body = without_comment.trim();
    let mut label = None;
    if let Some(pos) = body.find(':') {
        label = Some(body[..pos].trim().to_string());
        body = body[pos + 1..].trim();
    }
    if body.is_empty() {
        return SourceLine { label, instr: None };
    }
    match decode_operation(body) {
        Ok(op) => SourceLine {
            label: label.clone(),
            instr: Some(Instruction {
                raw: without_comment.trim().to_string(),
                label,
                op,
            }),
        },
        Err(err) => {
            debug!("dropping line {:?}: {}", raw, err);
            SourceLine { label, instr: None }
        },
    }
}

/// Decode an instruction body (label already removed). Tokens are separated
/// by spaces, tabs, commas, and parentheses, so `LD R1, 8(R2)` tokenizes as
/// `[LD, R1, 8, R2]`. LW and SW are accepted as aliases for LD and SD.
pub fn decode_operation(body: &str) -> Result<Operation, SimulatorError> {
    let tokens: Vec<&str> = body
        .split(|c: char| c == ' ' || c == '\t' || c == ',' || c == '(' || c == ')')
        .filter(|t| !t.is_empty())
        .collect();
    let mnemonic = match tokens.first() {
        Some(token) => token.to_ascii_uppercase(),
        None => return Err(SimulatorError::MalformedInstruction(body.to_string())),
    };
    let mnemonic = match mnemonic.as_str() {
        "LW" => "LD".to_string(),
        "SW" => "SD".to_string(),
        _ => mnemonic,
    };
    match mnemonic.as_str() {
        "ADD" | "SUB" | "MUL" | "DIV" => {
            let (rd, rs, rt) = three_registers(&tokens, body)?;
            let op = match mnemonic.as_str() {
                "ADD" => AluOp::Add,
                "SUB" => AluOp::Sub,
                "MUL" => AluOp::Mul,
                _ => AluOp::Div,
            };
            Ok(Operation::Arith3 { op, rd, rs, rt })
        },
        "ADDI" | "SUBI" => {
            if tokens.len() < 4 {
                return Err(SimulatorError::MalformedInstruction(body.to_string()));
            }
            let op = if mnemonic == "ADDI" { AluOp::Add } else { AluOp::Sub };
            Ok(Operation::ArithI {
                op,
                rd: Reg::parse(tokens[1])?,
                rs: Reg::parse(tokens[2])?,
                imm: parse_immediate(tokens[3])?,
            })
        },
        "LD" | "SD" => {
            let (rd, base, offset) = memory_operands(&tokens, body)?;
            if mnemonic == "LD" {
                Ok(Operation::Load { rd, base, offset })
            } else {
                Ok(Operation::Store { rd, base, offset })
            }
        },
        "BNE" | "BEQ" => {
            if tokens.len() < 4 {
                return Err(SimulatorError::MalformedInstruction(body.to_string()));
            }
            let cond = if mnemonic == "BEQ" { BranchCond::Eq } else { BranchCond::Ne };
            Ok(Operation::Branch {
                cond,
                rs: Reg::parse(tokens[1])?,
                rt: Some(Reg::parse(tokens[2])?),
                target: tokens[3].to_string(),
            })
        },
        "BNEZ" => {
            if tokens.len() < 3 {
                return Err(SimulatorError::MalformedInstruction(body.to_string()));
            }
            Ok(Operation::Branch {
                cond: BranchCond::Nez,
                rs: Reg::parse(tokens[1])?,
                rt: None,
                target: tokens[2].to_string(),
            })
        },
        "HLT" => Ok(Operation::Halt),
        other => Err(SimulatorError::UnknownOpcode(other.to_string())),
    }
}

fn three_registers(tokens: &[&str], body: &str) -> Result<(Reg, Reg, Reg), SimulatorError> {
    if tokens.len() < 4 {
        return Err(SimulatorError::MalformedInstruction(body.to_string()));
    }
    Ok((
        Reg::parse(tokens[1])?,
        Reg::parse(tokens[2])?,
        Reg::parse(tokens[3])?,
    ))
}

/// `LD rd, imm(base)`, or the offset-less `LD rd, (base)` form.
fn memory_operands(tokens: &[&str], body: &str) -> Result<(Reg, Reg, i64), SimulatorError> {
    match tokens.len() {
        n if n >= 4 => Ok((
            Reg::parse(tokens[1])?,
            Reg::parse(tokens[3])?,
            parse_immediate(tokens[2])?,
        )),
        3 => Ok((Reg::parse(tokens[1])?, Reg::parse(tokens[2])?, 0)),
        _ => Err(SimulatorError::MalformedInstruction(body.to_string())),
    }
}

fn parse_immediate(token: &str) -> Result<i64, SimulatorError> {
    token
        .parse::<i64>()
        .map_err(|_| SimulatorError::InvalidImmediate(token.to_string()))
}
