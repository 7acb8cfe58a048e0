use std::error::Error;
use std::fmt;

#[derive(Debug)]
pub enum SimulatorError {
    // Decode errors
    InvalidRegister(String),
    UnknownOpcode(String),
    MalformedInstruction(String),
    InvalidImmediate(String),
}

impl fmt::Display for SimulatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimulatorError::InvalidRegister(name) => {
                write!(f, "Invalid register name: {}", name)
            },
            SimulatorError::UnknownOpcode(opcode) => {
                write!(f, "Unknown opcode: {}", opcode)
            },
            SimulatorError::MalformedInstruction(line) => {
                write!(f, "Malformed instruction: {}", line)
            },
            SimulatorError::InvalidImmediate(imm) => {
                write!(f, "Invalid immediate value: {}", imm)
            },
        }
    }
}

impl Error for SimulatorError {}
