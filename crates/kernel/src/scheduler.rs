use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};
use std::fmt;
use std::str::FromStr;

use types::{Config, Pid, Priority};
use vm::Cpu;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    RoundRobin,
    Fcfs,
    Priority,
}

impl Mode {
    pub const CHOICES: [&'static str; 3] = ["rr", "fcfs", "priority"];
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Mode::RoundRobin => "rr",
            Mode::Fcfs => "fcfs",
            Mode::Priority => "priority",
        };
        f.write_str(s)
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rr" => Ok(Mode::RoundRobin),
            "fcfs" => Ok(Mode::Fcfs),
            "priority" => Ok(Mode::Priority),
            other => Err(format!("unknown scheduling mode {:?}", other)),
        }
    }
}

/// The ready FIFO and the priority min-heap, always holding the same PIDs.
///
/// Every mutation goes through both structures so no caller can observe
/// them out of step. Heap ties break by insertion order.
#[derive(Debug, Default)]
pub struct ReadyQueues {
    fifo: VecDeque<Pid>,
    heap: BinaryHeap<Reverse<(Priority, u64, Pid)>>,
    seq: u64,
}

impl ReadyQueues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a PID. A PID already present is left where it is.
    pub fn push(&mut self, pid: Pid, priority: Priority) {
        if self.contains(pid) {
            return;
        }
        self.fifo.push_back(pid);
        self.heap.push(Reverse((priority, self.seq, pid)));
        self.seq += 1;
    }

    /// Dequeue the oldest PID.
    pub fn pop_fifo(&mut self) -> Option<Pid> {
        let pid = self.fifo.pop_front()?;
        self.heap.retain(|Reverse((_, _, p))| *p != pid);
        Some(pid)
    }

    /// Dequeue the most urgent PID.
    pub fn pop_priority(&mut self) -> Option<Pid> {
        let Reverse((_, _, pid)) = self.heap.pop()?;
        self.fifo.retain(|p| *p != pid);
        Some(pid)
    }

    /// Remove a PID from both structures. Returns whether it was queued.
    pub fn remove(&mut self, pid: Pid) -> bool {
        let queued = self.contains(pid);
        self.fifo.retain(|p| *p != pid);
        self.heap.retain(|Reverse((_, _, p))| *p != pid);
        queued
    }

    pub fn contains(&self, pid: Pid) -> bool {
        self.fifo.contains(&pid)
    }

    pub fn len(&self) -> usize {
        self.fifo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fifo.is_empty()
    }

    /// PIDs in FIFO order.
    pub fn pids(&self) -> Vec<Pid> {
        self.fifo.iter().copied().collect()
    }

    /// PIDs held by the heap, sorted ascending.
    pub fn heap_pids(&self) -> Vec<Pid> {
        let mut pids: Vec<Pid> = self.heap.iter().map(|Reverse((_, _, p))| *p).collect();
        pids.sort_unstable();
        pids
    }
}

/// Short-term scheduler.
#[derive(Debug, Clone)]
pub struct Scheduler {
    pub mode: Mode,
    pub quantum: u32,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            quantum: Config::DEFAULT_QUANTUM,
        }
    }
}

impl Scheduler {
    pub fn new(mode: Mode, quantum: u32) -> Self {
        Self { mode, quantum }
    }

    /// Pick the next process to run and arm the next decision point.
    ///
    /// Round robin always re-arms the CPU timer, even when nothing is ready,
    /// so the next decision still arrives on schedule. FCFS and priority are
    /// non-preemptive and disarm it.
    pub fn decide(&self, ready: &mut ReadyQueues, cpu: &mut Cpu) -> Option<Pid> {
        match self.mode {
            Mode::RoundRobin => {
                let next = ready.pop_fifo();
                cpu.arm_timer(self.quantum);
                next
            }
            Mode::Fcfs => {
                cpu.disarm_timer();
                ready.pop_fifo()
            }
            Mode::Priority => {
                cpu.disarm_timer();
                ready.pop_priority()
            }
        }
    }
}
