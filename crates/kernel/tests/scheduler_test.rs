use kernel::{Mode, ReadyQueues, Scheduler};
use vm::Cpu;

fn assert_parity(ready: &ReadyQueues) {
    let mut fifo = ready.pids();
    fifo.sort_unstable();
    assert_eq!(fifo, ready.heap_pids());
}

#[test]
fn test_queues_stay_in_lock_step() {
    let mut ready = ReadyQueues::new();
    ready.push(1, 5);
    ready.push(2, 1);
    ready.push(3, 9);
    ready.push(2, 1);
    assert_eq!(ready.len(), 3);
    assert_parity(&ready);

    assert_eq!(ready.pop_fifo(), Some(1));
    assert_parity(&ready);
    assert_eq!(ready.pop_priority(), Some(2));
    assert_parity(&ready);
    assert!(ready.remove(3));
    assert!(!ready.remove(3));
    assert!(ready.is_empty());
    assert_parity(&ready);
    println!("✅ ready FIFO and priority heap always hold the same pids");
}

#[test]
fn test_round_robin_selects_each_once() {
    let scheduler = Scheduler::new(Mode::RoundRobin, 3);
    let mut ready = ReadyQueues::new();
    let mut cpu = Cpu::new();
    for pid in 0..4 {
        ready.push(pid, 255);
    }

    // The switched-out process goes back on the tail, as a context switch does.
    let mut picked = Vec::new();
    for _ in 0..8 {
        let pid = scheduler.decide(&mut ready, &mut cpu).unwrap();
        assert_eq!(cpu.timer(), Some(3));
        picked.push(pid);
        ready.push(pid, 255);
        assert_parity(&ready);
    }
    assert_eq!(picked, vec![0, 1, 2, 3, 0, 1, 2, 3]);
}

#[test]
fn test_round_robin_rearms_on_empty_queue() {
    let scheduler = Scheduler::default();
    let mut ready = ReadyQueues::new();
    let mut cpu = Cpu::new();

    assert_eq!(scheduler.decide(&mut ready, &mut cpu), None);
    assert_eq!(cpu.timer(), Some(6));
}

#[test]
fn test_non_preemptive_modes_disarm_timer() {
    let mut ready = ReadyQueues::new();
    let mut cpu = Cpu::new();
    ready.push(7, 200);
    ready.push(8, 10);

    cpu.arm_timer(4);
    let fcfs = Scheduler::new(Mode::Fcfs, 4);
    assert_eq!(fcfs.decide(&mut ready, &mut cpu), Some(7));
    assert_eq!(cpu.timer(), None);

    cpu.arm_timer(4);
    ready.push(7, 200);
    let priority = Scheduler::new(Mode::Priority, 4);
    assert_eq!(priority.decide(&mut ready, &mut cpu), Some(8));
    assert_eq!(cpu.timer(), None);
    assert_eq!(ready.pids(), vec![7]);
    assert_parity(&ready);
}

#[test]
fn test_priority_ties_break_by_arrival() {
    let scheduler = Scheduler::new(Mode::Priority, 6);
    let mut ready = ReadyQueues::new();
    let mut cpu = Cpu::new();
    ready.push(4, 3);
    ready.push(2, 3);
    ready.push(9, 1);
    ready.push(1, 3);

    let order: Vec<_> = std::iter::from_fn(|| scheduler.decide(&mut ready, &mut cpu)).collect();
    assert_eq!(order, vec![9, 4, 2, 1]);
}

#[test]
fn test_mode_names() {
    for name in Mode::CHOICES {
        let mode: Mode = name.parse().unwrap();
        assert_eq!(mode.to_string(), name);
    }
    assert_eq!("rr".parse::<Mode>(), Ok(Mode::RoundRobin));
    assert!("lottery".parse::<Mode>().is_err());
    assert_eq!(Mode::default(), Mode::RoundRobin);
}
