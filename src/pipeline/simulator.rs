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

// simulator.rs
//
// The pipeline engine. Each `step` advances one cycle by running the four
// stages in fixed order (Commit, Write-Back, Execute, Dispatch), so a slot
// freed at the tail of the pipeline is visible to later stages within the
// same tick. Architectural side effects (register and memory writes) happen
// only at commit, which is what makes the mis-prediction flush safe.

use std::collections::HashMap;
use std::fmt;

use log::{debug, trace};
use serde::Serialize;

use crate::assembler;
use crate::pipeline::branch_predictor::BranchPredictor;
use crate::pipeline::components::{
    EntryState, FunctionalUnit, ReorderBuffer, ReservationStation, RobEntry, RobId,
};
use crate::pipeline::config::SimulatorConfig;
use crate::pipeline::instructions::{Instruction, OpClass, Operation, Reg};
use crate::pipeline::memory::Memory;
use crate::pipeline::registers::RegisterFile;

pub struct Simulator {
    pub config: SimulatorConfig,
    pub instructions: Vec<Instruction>,
    pub labels: HashMap<String, usize>,
    /// Index of the next instruction to dispatch
    pub pc: usize,
    pub halted: bool,
    pub finished: bool,
    pub register_file: RegisterFile,
    pub memory: Memory,
    pub stations: Vec<ReservationStation>,
    pub units: Vec<FunctionalUnit>,
    pub rob: ReorderBuffer,
    pub branch_predictor: BranchPredictor,
    pub cycle: usize,
    pub stalls: usize,
    pub committed: usize,
    /// Stations whose countdown hit zero, in completion order. This order is
    /// the CDB arbitration order for write-back.
    pub waiting_wb: Vec<usize>,
    pub cycle_log: Vec<String>,
}

impl Simulator {
    pub fn new(config: SimulatorConfig) -> Self {
        let mut stations = Vec::new();
        let mut units = Vec::new();
        for class in OpClass::ALL {
            for i in 0..config.station_counts.for_class(class) {
                stations.push(ReservationStation::new(format!("{}{}", class, i), class));
            }
            for _ in 0..config.unit_counts.for_class(class) {
                units.push(FunctionalUnit::new(class));
            }
        }
        let memory = Memory::new(config.memory_size);
        let rob = ReorderBuffer::new(config.rob_size);
        let branch_predictor = BranchPredictor::new(config.predictor_table_size);
        Self {
            instructions: Vec::new(),
            labels: HashMap::new(),
            pc: 0,
            halted: false,
            finished: false,
            register_file: RegisterFile::new(),
            memory,
            stations,
            units,
            rob,
            branch_predictor,
            cycle: 0,
            stalls: 0,
            committed: 0,
            waiting_wb: Vec::new(),
            cycle_log: Vec::new(),
            config,
        }
    }

    /// Decode a program, build the label table, and reset all dynamic state.
    /// Labels index the next retained instruction; unparsable lines are
    /// dropped.
    pub fn load<S: AsRef<str>>(&mut self, lines: &[S]) {
        self.instructions.clear();
        self.labels.clear();
        for line in lines {
            let parsed = assembler::parse_line(line.as_ref());
            if let Some(label) = parsed.label {
                self.labels.insert(label, self.instructions.len());
            }
            if let Some(instr) = parsed.instr {
                self.instructions.push(instr);
            }
        }
        debug!(
            "loaded {} instructions, {} labels",
            self.instructions.len(),
            self.labels.len()
        );
        self.reset();
    }

    /// Clear dynamic state while keeping the loaded program and the config.
    pub fn reset(&mut self) {
        self.register_file = RegisterFile::new();
        self.memory = Memory::new(self.config.memory_size);
        self.rob = ReorderBuffer::new(self.config.rob_size);
        self.branch_predictor = BranchPredictor::new(self.config.predictor_table_size);
        for station in &mut self.stations {
            station.clear();
        }
        for unit in &mut self.units {
            unit.release();
        }
        self.pc = 0;
        self.halted = false;
        self.finished = false;
        self.cycle = 0;
        self.stalls = 0;
        self.committed = 0;
        self.waiting_wb.clear();
        self.cycle_log.clear();
    }

    /// Advance one cycle. A no-op once the program has finished.
    pub fn step(&mut self) {
        if self.finished {
            return;
        }
        self.cycle_log.clear();
        self.cycle += 1;
        self.commit();
        self.write_back();
        self.execute();
        self.dispatch();
    }

    /// Step until `finished` or the cycle cap. Returns cycles consumed.
    pub fn run(&mut self, max_cycles: usize) -> usize {
        let start = self.cycle;
        while !self.finished && self.cycle - start < max_cycles {
            self.step();
        }
        self.cycle - start
    }

    /// Stage 1: retire ready entries from the ROB head, up to the issue
    /// width. A mis-predicted branch flushes the pipeline and ends the stage.
    fn commit(&mut self) {
        let mut retired = 0;
        while retired < self.config.issue_width {
            let head = match self.rob.head() {
                Some(entry) if entry.ready => {
                    (entry.mispredicted, entry.branch_outcome, entry.pc_index, entry.id, entry.instr.raw.clone())
                },
                _ => break,
            };
            let (mispredicted, outcome, pc_index, id, raw) = head;
            if mispredicted {
                let (taken, target) = outcome.unwrap_or((false, None));
                let resume = pc_index + 1;
                let new_pc = if taken { target.unwrap_or(resume) } else { resume };
                self.cycle_log.push(format!(
                    "COMMIT: mispredicted branch '{}' (ROB {}), flushing pipeline",
                    raw, id
                ));
                debug!("mispredict flush, resuming at instruction {}", new_pc);
                self.flush(new_pc);
                break;
            }
            let mut entry = match self.rob.pop() {
                Some(entry) => entry,
                None => break,
            };
            entry.state = EntryState::Commit;
            match &entry.instr.op {
                Operation::Arith3 { .. } | Operation::ArithI { .. } | Operation::Load { .. } => {
                    if let Some(dest) = entry.dest {
                        // A later producer may have renamed the register; in
                        // that case the write is suppressed.
                        if self.register_file.tag(dest) == Some(entry.id) {
                            if let Some(result) = entry.result {
                                self.register_file.set(dest, result);
                            }
                            self.register_file.clear_tag(dest);
                        }
                    }
                },
                Operation::Store { .. } => {
                    if let (Some(address), Some(value)) = (entry.address, entry.store_value) {
                        self.memory.write(address, value);
                    }
                },
                Operation::Branch { .. } | Operation::Halt => {},
            }
            self.cycle_log
                .push(format!("COMMIT: '{}' (ROB {}) retired", entry.instr, entry.id));
            // The station stays bound to its entry until this point so the
            // ROB to station lookup keeps working for write-back and flush.
            for station in &mut self.stations {
                if station.dest == Some(entry.id) {
                    station.clear();
                    break;
                }
            }
            self.committed += 1;
            retired += 1;
        }
        if (self.halted || self.pc >= self.instructions.len()) && self.rob.is_empty() {
            self.finished = true;
        }
    }

    /// Stage 2: drain stations whose countdown reached zero, computing each
    /// result and publishing it. Stores and branches deposit their payload in
    /// the ROB without touching the CDB.
    fn write_back(&mut self) {
        let pending = std::mem::take(&mut self.waiting_wb);
        for station_idx in pending {
            let (dest, instr, vj, vk) = {
                let station = &self.stations[station_idx];
                if !station.busy {
                    continue;
                }
                let dest = match station.dest {
                    Some(dest) => dest,
                    None => continue,
                };
                let instr = match station.instr.clone() {
                    Some(instr) => instr,
                    None => continue,
                };
                (dest, instr, station.vj, station.vk)
            };
            if self.rob.get(dest).is_none() {
                // The entry was flushed out from underneath the station.
                self.stations[station_idx].clear();
                continue;
            }
            match &instr.op {
                Operation::Arith3 { op, .. } | Operation::ArithI { op, .. } => {
                    let result = op.apply(vj.unwrap_or(0.0), vk.unwrap_or(0.0));
                    self.publish(dest, result);
                },
                Operation::Load { .. } => {
                    let address = self.rob.get(dest).and_then(|entry| entry.address);
                    let result = address.map(|addr| self.memory.read(addr)).unwrap_or(0.0);
                    if let Some(address) = address {
                        self.cycle_log.push(format!(
                            "WRITE-BACK: LD for ROB {} read {} from address {}",
                            dest, result, address
                        ));
                    }
                    self.publish(dest, result);
                },
                Operation::Store { .. } => {
                    // The value travels through the ROB to commit; nothing is
                    // published on the CDB.
                    if let Some(entry) = self.rob.get_mut(dest) {
                        entry.store_value = vk;
                        entry.ready = true;
                        entry.state = EntryState::Wb;
                    }
                    self.cycle_log
                        .push(format!("WRITE-BACK: SD for ROB {} ready to commit", dest));
                },
                Operation::Branch { cond, target, .. } => {
                    let taken = cond.eval(vj.unwrap_or(0.0), vk.unwrap_or(0.0));
                    let target_index = self.labels.get(target).copied();
                    let predicted = self
                        .rob
                        .get(dest)
                        .map(|entry| entry.predicted_taken)
                        .unwrap_or(false);
                    self.branch_predictor.update(taken, predicted);
                    self.branch_predictor.train(&instr, taken);
                    if let Some(entry) = self.rob.get_mut(dest) {
                        entry.branch_outcome = Some((taken, target_index));
                        entry.mispredicted = taken != predicted;
                        entry.ready = true;
                        entry.state = EntryState::Wb;
                    }
                    self.cycle_log.push(format!(
                        "WRITE-BACK: branch in ROB {} resolved, taken: {}",
                        dest, taken
                    ));
                },
                Operation::Halt => {},
            }
            self.stations[station_idx].ready = true;
        }
    }

    /// CDB broadcast: record the result in the producing ROB entry, then wake
    /// every station waiting on the tag. For a memory station the arriving
    /// value is the base register, so the broadcast resolves the entry's
    /// address instead of overwriting the parked offset.
    fn publish(&mut self, tag: RobId, result: f64) {
        if let Some(entry) = self.rob.get_mut(tag) {
            entry.result = Some(result);
            entry.ready = true;
            entry.state = EntryState::Wb;
        }
        self.cycle_log.push(format!(
            "WRITE-BACK: ROB {} broadcast {:.2} on the CDB",
            tag, result
        ));
        let mut resolved_addresses = Vec::new();
        for station in &mut self.stations {
            if station.qj == Some(tag) {
                if matches!(station.class, OpClass::Load | OpClass::Store) {
                    let offset = station.vj.unwrap_or(0.0) as i64;
                    if let Some(dest) = station.dest {
                        resolved_addresses.push((dest, result as i64 + offset));
                    }
                } else {
                    station.vj = Some(result);
                }
                station.qj = None;
            }
            if station.qk == Some(tag) {
                station.vk = Some(result);
                station.qk = None;
            }
        }
        for (dest, address) in resolved_addresses {
            if let Some(entry) = self.rob.get_mut(dest) {
                if !entry.address_ready {
                    entry.address = Some(address);
                    entry.address_ready = true;
                }
            }
        }
    }

    /// Stage 3: release drained units, bind ready stations to idle units in
    /// declaration order, then advance every bound countdown.
    fn execute(&mut self) {
        for unit_idx in 0..self.units.len() {
            if let Some(station_idx) = self.units[unit_idx].station {
                let station = &self.stations[station_idx];
                if !station.busy || station.remaining == 0 {
                    if let Some(instr) = &station.instr {
                        self.cycle_log
                            .push(format!("EXECUTE: '{}' finished execution", instr));
                    }
                    self.units[unit_idx].release();
                }
            }
        }
        for station_idx in 0..self.stations.len() {
            let (class, dest, raw) = {
                let station = &self.stations[station_idx];
                if !station.busy || station.remaining == 0 || !station.operands_ready() {
                    continue;
                }
                let raw = match &station.instr {
                    Some(instr) => instr.raw.clone(),
                    None => continue,
                };
                (station.class, station.dest, raw)
            };
            if self.units.iter().any(|unit| unit.station == Some(station_idx)) {
                continue;
            }
            if matches!(class, OpClass::Load | OpClass::Store) {
                let dest = match dest {
                    Some(dest) => dest,
                    None => continue,
                };
                let address_ready = self
                    .rob
                    .get(dest)
                    .map(|entry| entry.address_ready)
                    .unwrap_or(false);
                if !address_ready {
                    continue;
                }
                // A load must not slip ahead of an uncommitted store: the
                // memory image only changes at commit.
                if class == OpClass::Load && self.rob.store_pending_before(dest) {
                    continue;
                }
            }
            let unit = self
                .units
                .iter_mut()
                .find(|unit| unit.class == class && !unit.busy);
            if let Some(unit) = unit {
                unit.assign(station_idx);
                if let Some(dest) = dest {
                    if let Some(entry) = self.rob.get_mut(dest) {
                        entry.state = EntryState::Exec;
                    }
                }
                self.cycle_log
                    .push(format!("EXECUTE: '{}' started on a {} unit", raw, class));
            }
        }
        for unit_idx in 0..self.units.len() {
            if let Some(station_idx) = self.units[unit_idx].station {
                let station = &mut self.stations[station_idx];
                if station.busy && station.remaining > 0 {
                    station.remaining -= 1;
                    if station.remaining == 0 {
                        self.waiting_wb.push(station_idx);
                    }
                }
            }
        }
    }

    /// Stage 4: issue up to `issue_width` instructions, stopping at HLT or
    /// the first structural hazard.
    fn dispatch(&mut self) {
        if self.halted {
            return;
        }
        let mut issued = 0;
        while issued < self.config.issue_width && self.pc < self.instructions.len() {
            let instr = self.instructions[self.pc].clone();
            let class = match instr.op.class() {
                Some(class) => class,
                None => {
                    self.halted = true;
                    self.cycle_log
                        .push("DISPATCH: HLT reached, issue stopped".to_string());
                    trace!("halted at instruction {}", self.pc);
                    break;
                },
            };
            let station_idx = match self.free_station(class) {
                Some(idx) if !self.rob.is_full() => idx,
                _ => {
                    self.stalls += 1;
                    self.cycle_log.push(format!(
                        "DISPATCH: stall, no free {} station or ROB slot for '{}'",
                        class, instr
                    ));
                    break;
                },
            };
            let id = self.rob.take_id();
            let mut entry = RobEntry::new(id, instr.clone(), self.pc, instr.op.dest());
            let latency = self.config.latencies.for_class(class);
            let mut vj = None;
            let mut vk = None;
            let mut qj = None;
            let mut qk = None;
            match &instr.op {
                Operation::Arith3 { rd, rs, rt, .. } => {
                    let (value, tag) = self.operand(*rs);
                    vj = value;
                    qj = tag;
                    let (value, tag) = self.operand(*rt);
                    vk = value;
                    qk = tag;
                    self.register_file.set_tag(*rd, id);
                },
                Operation::ArithI { rd, rs, imm, .. } => {
                    let (value, tag) = self.operand(*rs);
                    vj = value;
                    qj = tag;
                    vk = Some(*imm as f64);
                    self.register_file.set_tag(*rd, id);
                },
                Operation::Load { rd, base, offset } => {
                    let (base_value, base_tag) = self.operand(*base);
                    match base_tag {
                        None => {
                            entry.address = Some(base_value.unwrap_or(0.0) as i64 + offset);
                            entry.address_ready = true;
                        },
                        Some(tag) => qj = Some(tag),
                    }
                    vj = Some(*offset as f64);
                    self.register_file.set_tag(*rd, id);
                },
                Operation::Store { rd, base, offset } => {
                    let (base_value, base_tag) = self.operand(*base);
                    match base_tag {
                        None => {
                            entry.address = Some(base_value.unwrap_or(0.0) as i64 + offset);
                            entry.address_ready = true;
                        },
                        Some(tag) => qj = Some(tag),
                    }
                    vj = Some(*offset as f64);
                    // In SD, rd is the source of the stored value.
                    let (value, tag) = self.operand(*rd);
                    vk = value;
                    qk = tag;
                },
                Operation::Branch { rs, rt, .. } => {
                    let (value, tag) = self.operand(*rs);
                    vj = value;
                    qj = tag;
                    match rt {
                        Some(rt) => {
                            let (value, tag) = self.operand(*rt);
                            vk = value;
                            qk = tag;
                        },
                        None => vk = Some(0.0),
                    }
                    entry.predicted_taken = self.branch_predictor.predict(&instr);
                },
                Operation::Halt => {},
            }
            {
                let station = &mut self.stations[station_idx];
                station.busy = true;
                station.vj = vj;
                station.vk = vk;
                station.qj = qj;
                station.qk = qk;
                station.dest = Some(id);
                station.instr = Some(instr.clone());
                station.exec_cycles = latency;
                station.remaining = latency;
                station.ready = false;
            }
            self.cycle_log.push(format!(
                "DISPATCH: '{}' issued to {} as ROB {}",
                instr, self.stations[station_idx].name, id
            ));
            self.rob.push(entry);
            self.pc += 1;
            issued += 1;
        }
    }

    fn free_station(&self, class: OpClass) -> Option<usize> {
        self.stations
            .iter()
            .position(|station| station.class == class && !station.busy)
    }

    /// Rename-aware operand fetch: the value when the register has no
    /// producer, an early ROB forwarding when the producer already wrote
    /// back, otherwise the tag to wait on.
    fn operand(&self, reg: Reg) -> (Option<f64>, Option<RobId>) {
        match self.register_file.tag(reg) {
            None => (Some(self.register_file.get(reg)), None),
            Some(tag) => match self.rob.get(tag) {
                Some(entry) if entry.ready && entry.result.is_some() => (entry.result, None),
                _ => (None, Some(tag)),
            },
        }
    }

    /// Mis-prediction recovery: discard every speculative structure and
    /// restart fetch on the resolved path. Architectural state (registers,
    /// memory) is untouched because side effects happen only at commit.
    fn flush(&mut self, new_pc: usize) {
        for entry in &self.rob.entries {
            self.cycle_log
                .push(format!("FLUSH: discarding '{}' (ROB {})", entry.instr, entry.id));
        }
        for station in &mut self.stations {
            station.clear();
        }
        for unit in &mut self.units {
            unit.release();
        }
        self.register_file.clear_all_tags();
        self.rob.clear();
        self.waiting_wb.clear();
        self.pc = new_pc;
        // A stale HLT on the wrong path must not keep fetch stopped.
        self.halted = false;
    }

    /// Structural snapshot of the pipeline between ticks.
    pub fn state(&self) -> PipelineState {
        PipelineState {
            cycle: self.cycle,
            pc: self.pc,
            halted: self.halted,
            finished: self.finished,
            stations: self
                .stations
                .iter()
                .map(|station| StationState {
                    name: station.name.clone(),
                    busy: station.busy,
                    instr: station.instr.as_ref().map(|instr| instr.raw.clone()),
                    vj: station.vj,
                    vk: station.vk,
                    qj: station.qj.map(|tag| tag.0),
                    qk: station.qk.map(|tag| tag.0),
                    dest: station.dest.map(|tag| tag.0),
                    remaining: station.remaining,
                })
                .collect(),
            rob: self
                .rob
                .entries
                .iter()
                .map(|entry| RobEntryState {
                    id: entry.id.0,
                    instr: entry.instr.raw.clone(),
                    dest: entry.dest.map(|reg| reg.to_string()),
                    ready: entry.ready,
                    state: entry.state.to_string(),
                    result: entry.result,
                    mispredicted: entry.mispredicted,
                })
                .collect(),
            int_regs: self.register_file.int_regs.to_vec(),
            fp_regs: self.register_file.fp_regs.to_vec(),
            memory: self.memory.contents(),
            log: self.cycle_log.clone(),
        }
    }

    pub fn metrics(&self) -> Metrics {
        Metrics {
            cycles: self.cycle,
            committed: self.committed,
            ipc: if self.cycle > 0 {
                self.committed as f64 / self.cycle as f64
            } else {
                0.0
            },
            stalls: self.stalls,
            branch_accuracy: self.branch_predictor.accuracy(),
        }
    }
}

/// Snapshot of one reservation station.
#[derive(Debug, Clone, Serialize)]
pub struct StationState {
    pub name: String,
    pub busy: bool,
    pub instr: Option<String>,
    pub vj: Option<f64>,
    pub vk: Option<f64>,
    pub qj: Option<u32>,
    pub qk: Option<u32>,
    pub dest: Option<u32>,
    pub remaining: usize,
}

/// Snapshot of one reorder-buffer entry.
#[derive(Debug, Clone, Serialize)]
pub struct RobEntryState {
    pub id: u32,
    pub instr: String,
    pub dest: Option<String>,
    pub ready: bool,
    pub state: String,
    pub result: Option<f64>,
    pub mispredicted: bool,
}

/// Structural snapshot of the pipeline between ticks.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineState {
    pub cycle: usize,
    pub pc: usize,
    pub halted: bool,
    pub finished: bool,
    pub stations: Vec<StationState>,
    pub rob: Vec<RobEntryState>,
    pub int_regs: Vec<i64>,
    pub fp_regs: Vec<f64>,
    pub memory: Vec<(i64, f64)>,
    pub log: Vec<String>,
}

/// Aggregate performance counters.
#[derive(Debug, Clone, Serialize)]
pub struct Metrics {
    pub cycles: usize,
    pub committed: usize,
    pub ipc: f64,
    pub stalls: usize,
    pub branch_accuracy: f64,
}

impl fmt::Display for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Pipeline Statistics:")?;
        writeln!(f, "  Cycles: {}", self.cycles)?;
        writeln!(f, "  Instructions Committed: {}", self.committed)?;
        writeln!(f, "  Instructions Per Cycle (IPC): {:.2}", self.ipc)?;
        writeln!(f, "  Stalls: {}", self.stalls)?;
        write!(
            f,
            "  Branch Prediction Accuracy: {:.1}%",
            self.branch_accuracy * 100.0
        )
    }
}
