use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, VecDeque};
use std::fmt;

use types::{irq, FaultKind, Irq, Pid};

use crate::kernel::Kernel;

/// Deferred work carried by a TIMER interrupt.
pub type TimedAction = Box<dyn FnOnce(&mut Kernel) + Send>;

/// One opaque interrupt parameter.
pub enum Param {
    Int(i64),
    Text(String),
    Action(TimedAction),
}

impl Param {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Param::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Param::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Debug for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::Int(v) => write!(f, "{}", v),
            Param::Text(s) => write!(f, "{:?}", s),
            Param::Action(_) => f.write_str("<action>"),
        }
    }
}

pub struct Interrupt {
    pub irq: Irq,
    pub params: Vec<Param>,
}

impl Interrupt {
    pub fn new(irq: Irq, params: Vec<Param>) -> Self {
        Self { irq, params }
    }

    /// SW_FATAL naming the offending process and the reason.
    pub fn fatal(kind: FaultKind, pid: Pid) -> Self {
        Self::new(irq::SW_FATAL, vec![Param::Int(kind.code()), Param::Int(pid as i64)])
    }
}

impl fmt::Debug for Interrupt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interrupt")
            .field("irq", &irq::name(self.irq))
            .field("params", &self.params)
            .finish()
    }
}

/// Strict FIFO of pending interrupts. No reordering by IRQ number.
#[derive(Debug, Default)]
pub struct InterruptQueue {
    queue: VecDeque<Interrupt>,
}

impl InterruptQueue {
    pub fn enqueue(&mut self, interrupt: Interrupt) {
        self.queue.push_back(interrupt);
    }

    pub fn dequeue(&mut self) -> Option<Interrupt> {
        self.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }

    pub fn irqs(&self) -> Vec<Irq> {
        self.queue.iter().map(|i| i.irq).collect()
    }
}

struct TimedEntry {
    deadline: i64,
    seq: u64,
    interrupt: Interrupt,
}

impl PartialEq for TimedEntry {
    fn eq(&self, other: &Self) -> bool {
        (self.deadline, self.seq) == (other.deadline, other.seq)
    }
}

impl Eq for TimedEntry {}

impl PartialOrd for TimedEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimedEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.deadline, self.seq).cmp(&(other.deadline, other.seq))
    }
}

/// Min-heap of delayed interrupts.
///
/// Entries store an absolute deadline on a private clock that only moves
/// while the heap is non-empty, so advancing the clock by one is the same as
/// decrementing every entry's time left by one. Equal deadlines retire in
/// insertion order.
#[derive(Default)]
pub struct TimedEvents {
    now: i64,
    seq: u64,
    heap: BinaryHeap<Reverse<TimedEntry>>,
}

impl fmt::Debug for TimedEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimedEvents")
            .field("pending", &self.heap.len())
            .field("next_in", &self.time_left())
            .finish()
    }
}

impl TimedEvents {
    pub fn push(&mut self, interrupt: Interrupt, ticks: i64) {
        let entry = TimedEntry {
            deadline: self.now + ticks,
            seq: self.seq,
            interrupt,
        };
        self.seq += 1;
        self.heap.push(Reverse(entry));
    }

    pub fn advance(&mut self, ticks: i64) {
        if !self.heap.is_empty() {
            self.now += ticks;
        }
    }

    /// Time left on the soonest entry.
    pub fn time_left(&self) -> Option<i64> {
        self.heap.peek().map(|Reverse(e)| e.deadline - self.now)
    }

    /// Pop the soonest entry if its time has run out.
    pub fn pop_expired(&mut self) -> Option<Interrupt> {
        match self.time_left() {
            Some(left) if left <= 0 => self.heap.pop().map(|Reverse(e)| e.interrupt),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
