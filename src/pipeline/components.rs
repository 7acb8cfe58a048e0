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

// components.rs
//
// Hardware resources the engine schedules over: reservation stations,
// functional units, and the reorder buffer with its stable entry IDs.

use std::collections::VecDeque;
use std::fmt;

use crate::pipeline::instructions::{Instruction, OpClass, Reg};

/// Stable identity of a reorder-buffer entry. IDs come from a monotone
/// counter taken modulo twice the ROB capacity, so a lookup that misses
/// means the entry was flushed, never that a slot was reused underneath a
/// live reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RobId(pub u32);

impl fmt::Display for RobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Coarse lifecycle of a ROB entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Issue,
    Exec,
    Wb,
    Commit,
}

impl fmt::Display for EntryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntryState::Issue => "ISSUE",
            EntryState::Exec => "EXEC",
            EntryState::Wb => "WB",
            EntryState::Commit => "COMMIT",
        };
        write!(f, "{}", name)
    }
}

/// Reservation station: one buffered instruction plus its captured operands
/// (vj/vk) or the producer tags it still waits on (qj/qk). For LOAD and
/// STORE stations vj parks the address offset while qj, when set, names the
/// producer of the base register.
#[derive(Debug, Clone)]
pub struct ReservationStation {
    pub name: String,
    pub class: OpClass,
    pub busy: bool,
    pub vj: Option<f64>,
    pub vk: Option<f64>,
    pub qj: Option<RobId>,
    pub qk: Option<RobId>,
    pub dest: Option<RobId>,
    pub instr: Option<Instruction>,
    pub exec_cycles: usize,
    pub remaining: usize,
    pub ready: bool,
}

impl ReservationStation {
    pub fn new(name: String, class: OpClass) -> Self {
        Self {
            name,
            class,
            busy: false,
            vj: None,
            vk: None,
            qj: None,
            qk: None,
            dest: None,
            instr: None,
            exec_cycles: 0,
            remaining: 0,
            ready: false,
        }
    }

    /// Both source operands captured.
    pub fn operands_ready(&self) -> bool {
        self.qj.is_none() && self.qk.is_none()
    }

    pub fn clear(&mut self) {
        self.busy = false;
        self.vj = None;
        self.vk = None;
        self.qj = None;
        self.qk = None;
        self.dest = None;
        self.instr = None;
        self.exec_cycles = 0;
        self.remaining = 0;
        self.ready = false;
    }
}

/// A compute slot. The countdown lives in the bound station; the unit only
/// records the binding.
#[derive(Debug, Clone)]
pub struct FunctionalUnit {
    pub class: OpClass,
    pub station: Option<usize>,
    pub busy: bool,
}

impl FunctionalUnit {
    pub fn new(class: OpClass) -> Self {
        Self {
            class,
            station: None,
            busy: false,
        }
    }

    pub fn assign(&mut self, station_idx: usize) {
        self.station = Some(station_idx);
        self.busy = true;
    }

    pub fn release(&mut self) {
        self.station = None;
        self.busy = false;
    }
}

/// Reorder-buffer entry. The payload fields are disjoint by instruction
/// class: `result` for arithmetic and loads, `store_value` for stores,
/// `branch_outcome` for branches.
#[derive(Debug, Clone)]
pub struct RobEntry {
    pub id: RobId,
    pub instr: Instruction,
    /// Index of the instruction in the loaded program; the sequential
    /// successor on a flush is `pc_index + 1`.
    pub pc_index: usize,
    pub dest: Option<Reg>,
    pub ready: bool,
    pub state: EntryState,
    pub result: Option<f64>,
    pub store_value: Option<f64>,
    /// (taken, resolved target index); the target is `None` when the label
    /// was never defined.
    pub branch_outcome: Option<(bool, Option<usize>)>,
    pub address: Option<i64>,
    pub address_ready: bool,
    pub predicted_taken: bool,
    pub mispredicted: bool,
}

impl RobEntry {
    pub fn new(id: RobId, instr: Instruction, pc_index: usize, dest: Option<Reg>) -> Self {
        Self {
            id,
            instr,
            pc_index,
            dest,
            ready: false,
            state: EntryState::Issue,
            result: None,
            store_value: None,
            branch_outcome: None,
            address: None,
            address_ready: false,
            predicted_taken: false,
            mispredicted: false,
        }
    }
}

/// In-order retirement queue. Entries sit in program order; IDs are stable
/// and looked up by scan, never by position.
#[derive(Debug, Clone)]
pub struct ReorderBuffer {
    pub entries: VecDeque<RobEntry>,
    pub capacity: usize,
    next_id: u32,
}

impl ReorderBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            next_id: 0,
        }
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Hand out the next stable ID. Wrapping at `2 * capacity` is safe
    /// because at most `capacity` entries are ever in flight.
    pub fn take_id(&mut self) -> RobId {
        let id = RobId(self.next_id);
        self.next_id = (self.next_id + 1) % (2 * self.capacity as u32);
        id
    }

    pub fn push(&mut self, entry: RobEntry) {
        debug_assert!(!self.is_full(), "reorder buffer overflow");
        self.entries.push_back(entry);
    }

    pub fn head(&self) -> Option<&RobEntry> {
        self.entries.front()
    }

    pub fn pop(&mut self) -> Option<RobEntry> {
        self.entries.pop_front()
    }

    pub fn get(&self, id: RobId) -> Option<&RobEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    pub fn get_mut(&mut self, id: RobId) -> Option<&mut RobEntry> {
        self.entries.iter_mut().find(|entry| entry.id == id)
    }

    /// True when a store older than the entry named by `id` is still in
    /// flight. Loads defer execution on this, since the memory image only
    /// changes at commit.
    pub fn store_pending_before(&self, id: RobId) -> bool {
        for entry in &self.entries {
            if entry.id == id {
                return false;
            }
            if entry.instr.op.is_store() {
                return true;
            }
        }
        false
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
