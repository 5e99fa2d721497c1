use kernel::{
    BufferConsole, FsError, Kernel, KernelConfig, KernelError, MmuError, Mode, Param, TimedAction,
};
use storage::{Disk, Geometry};
use types::{irq, Pid, ProcessState};

const STORE_SEVEN: [u8; 6] = [0xA9, 0x07, 0x8D, 0x00, 0x00, 0x00];

/// LDX #0, then CPX/BNE against the 1 stored at $10 forever.
fn spin_program() -> Vec<u8> {
    let mut code = vec![0xA2, 0x00, 0xEC, 0x10, 0x00, 0xD0, 0xFB];
    code.resize(0x10, 0x00);
    code.push(0x01);
    code
}

fn boot(config: KernelConfig) -> Kernel {
    Kernel::new(config, Disk::default(), Box::new(BufferConsole::new()))
}

fn console(kernel: &Kernel) -> &BufferConsole {
    kernel
        .console()
        .as_any()
        .downcast_ref::<BufferConsole>()
        .unwrap()
}

fn run(kernel: &mut Kernel, code: &[u8]) -> Pid {
    let pid = kernel.load_program(code, None).unwrap();
    kernel.queue_program(pid).unwrap();
    kernel.start_execution();
    pid
}

fn pulse_until(kernel: &mut Kernel, mut done: impl FnMut(&Kernel) -> bool) {
    for _ in 0..1000 {
        if done(kernel) {
            return;
        }
        kernel.on_clock_pulse();
    }
    panic!("condition not reached in 1000 pulses");
}

fn assert_parity(kernel: &Kernel) {
    let mut fifo = kernel.ready_pids();
    fifo.sort_unstable();
    assert_eq!(fifo, kernel.ready().heap_pids());
}

#[test]
fn test_boot_loads_drivers_and_formats_disk() {
    let kernel = boot(KernelConfig::default());
    assert!(kernel.halted().is_none());
    assert!(kernel.list_files().is_empty());
    assert_eq!(kernel.fs().free_block_counts().unwrap(), (63, 192));
    assert_eq!(kernel.scheduler().quantum, 6);
    assert_eq!(kernel.scheduler().mode, Mode::RoundRobin);
}

#[test]
fn test_program_runs_to_completion() {
    let mut kernel = boot(KernelConfig::default());
    let pid = run(&mut kernel, &STORE_SEVEN);

    pulse_until(&mut kernel, |k| !k.terminated().is_empty());

    let pcb = &kernel.terminated()[0];
    assert_eq!(pcb.pid, pid);
    assert_eq!(pcb.regs.acc, 7);
    assert_eq!(pcb.state, ProcessState::Done);
    assert_eq!(kernel.mmu().memory().read(0), 7);
    assert!(kernel.process(pid).is_none());
    assert_eq!(kernel.active_pid(), None);
    assert_eq!(kernel.mmu().free_frames(), 3);

    let out = console(&kernel);
    assert!(out.contains("Program: 0 - Complete"));
    assert!(out.contains("  ACC: 7"));
    assert!(out.contains("  state: done"));
    println!("✅ LDA #7 / STA $0000 / BRK finished with ACC = 7");
}

#[test]
fn test_round_robin_switches_every_quantum() {
    let mut kernel = boot(KernelConfig {
        quantum: 2,
        ..KernelConfig::default()
    });
    let first = kernel.load_program(&spin_program(), None).unwrap();
    let second = kernel.load_program(&spin_program(), None).unwrap();
    kernel.queue_program(first).unwrap();
    kernel.queue_program(second).unwrap();
    kernel.start_execution();

    pulse_until(&mut kernel, |k| k.cycles() == 4);
    assert_eq!(kernel.context_switches(), 2);
    assert_eq!(kernel.active_pid(), Some(second));
    assert_eq!(kernel.ready_pids(), vec![first]);
    assert_parity(&kernel);

    pulse_until(&mut kernel, |k| k.cycles() == 6);
    assert_eq!(kernel.context_switches(), 3);
    assert_eq!(kernel.active_pid(), Some(first));
    assert_eq!(kernel.process(second).unwrap().state, ProcessState::Ready);
    assert!(kernel.terminated().is_empty());
    println!("✅ two spinning processes alternate every 2 cycles");
}

#[test]
fn test_bad_opcode_fails_only_that_process() {
    let mut kernel = boot(KernelConfig::default());
    let bad = run(&mut kernel, &[0x02]);

    pulse_until(&mut kernel, |k| !k.terminated().is_empty());
    assert_eq!(kernel.terminated()[0].pid, bad);
    assert_eq!(kernel.terminated()[0].state, ProcessState::Failed);
    assert!(console(&kernel).contains("process 0 fatal exception: bad opcode"));
    assert_eq!(kernel.active_pid(), None);
    assert!(kernel.process(bad).is_none());

    let good = run(&mut kernel, &STORE_SEVEN);
    pulse_until(&mut kernel, |k| k.terminated().len() == 2);
    assert_eq!(kernel.terminated()[1].pid, good);
    assert_eq!(kernel.terminated()[1].state, ProcessState::Done);
    assert!(kernel.halted().is_none());
    println!("✅ bad opcode kills its process and the kernel keeps going");
}

#[test]
fn test_kill_ready_process_twice() {
    let mut kernel = boot(KernelConfig::default());
    let pid = kernel.load_program(&STORE_SEVEN, None).unwrap();
    kernel.queue_program(pid).unwrap();
    assert_eq!(kernel.ready_pids(), vec![pid]);

    kernel.free_process(pid).unwrap();
    assert!(kernel.ready_pids().is_empty());
    assert!(kernel.ready().heap_pids().is_empty());
    assert!(kernel.process(pid).is_none());

    assert_eq!(kernel.free_process(pid), Err(KernelError::NoSuchProcess(pid)));
    assert!(kernel.halted().is_none());
    assert_eq!(kernel.mmu().free_frames(), 3);
}

#[test]
fn test_killing_active_process_schedules_next() {
    let mut kernel = boot(KernelConfig::default());
    let first = kernel.load_program(&spin_program(), None).unwrap();
    let second = kernel.load_program(&spin_program(), None).unwrap();
    kernel.queue_program(first).unwrap();
    kernel.queue_program(second).unwrap();
    kernel.start_execution();
    pulse_until(&mut kernel, |k| k.active_pid() == Some(first));

    kernel.free_process(first).unwrap();
    assert_eq!(kernel.active_pid(), None);
    assert!(!kernel.cpu().is_executing);
    pulse_until(&mut kernel, |k| k.active_pid() == Some(second));
    assert!(kernel.cpu().is_executing);
    assert_parity(&kernel);
}

#[test]
fn test_interrupt_queue_beats_expired_timer() {
    let mut kernel = boot(KernelConfig::default());
    let action: TimedAction = Box::new(|k: &mut Kernel| k.print_line("tick"));
    kernel.add_timed_event(action, 0);
    kernel.queue_interrupt(irq::DISPLAY, vec![Param::Text("hello".to_string())]);

    kernel.on_clock_pulse();
    assert!(console(&kernel).contains("hello"));
    assert!(kernel.interrupts_pending().is_empty());
    assert_eq!(kernel.timed_len(), 1);

    kernel.on_clock_pulse();
    assert_eq!(kernel.timed_len(), 0);
    assert_eq!(kernel.interrupts_pending(), vec![irq::TIMER]);
    assert!(!console(&kernel).contains("tick"));

    kernel.on_clock_pulse();
    assert!(console(&kernel).contains("tick"));
    println!("✅ pending interrupt served before the expired timer is promoted");
}

#[test]
fn test_timed_event_waits_one_extra_pulse() {
    let mut kernel = boot(KernelConfig::default());
    let action: TimedAction = Box::new(|k: &mut Kernel| k.print_line("later"));
    kernel.add_timed_event(action, 3);

    for _ in 0..3 {
        kernel.on_clock_pulse();
        assert!(!console(&kernel).contains("later"));
    }
    assert_eq!(kernel.interrupts_pending(), vec![irq::TIMER]);
    kernel.on_clock_pulse();
    assert!(console(&kernel).contains("later"));
}

#[test]
fn test_timed_action_can_rearm_itself() {
    fn heartbeat(kernel: &mut Kernel) {
        kernel.print_line("beat");
        kernel.add_timed_event(Box::new(heartbeat), 2);
    }

    let mut kernel = boot(KernelConfig::default());
    kernel.add_timed_event(Box::new(heartbeat), 2);
    for _ in 0..9 {
        kernel.on_clock_pulse();
    }
    let beats = console(&kernel).output().matches("beat").count();
    assert_eq!(beats, 3);
    assert_eq!(kernel.timed_len(), 1);
}

#[test]
fn test_syscall_prints_integer_and_string() {
    let mut kernel = boot(KernelConfig::default());
    run(&mut kernel, &[0xA2, 0x01, 0xA0, 0x2A, 0xFF, 0x00]);
    pulse_until(&mut kernel, |k| k.terminated().len() == 1);
    assert!(console(&kernel).contains("42"));

    let mut code = vec![0xA2, 0x02, 0xA0, 0x10, 0xFF, 0x00];
    code.resize(0x10, 0x00);
    code.extend_from_slice(b"hi there\0");
    run(&mut kernel, &code);
    pulse_until(&mut kernel, |k| k.terminated().len() == 2);
    assert!(console(&kernel).contains("hi there"));
    assert_eq!(kernel.terminated()[1].state, ProcessState::Done);
}

#[test]
fn test_bad_syscall_and_memory_violation() {
    let mut kernel = boot(KernelConfig::default());
    run(&mut kernel, &[0xA2, 0x03, 0xFF, 0x00]);
    pulse_until(&mut kernel, |k| k.terminated().len() == 1);
    assert_eq!(kernel.terminated()[0].state, ProcessState::Failed);
    assert!(console(&kernel).contains("process 0 fatal exception: bad syscall"));

    // STA $0100 is past the 256 byte limit.
    run(&mut kernel, &[0xA9, 0x01, 0x8D, 0x00, 0x01, 0x00]);
    pulse_until(&mut kernel, |k| k.terminated().len() == 2);
    assert_eq!(kernel.terminated()[1].state, ProcessState::Failed);
    assert!(console(&kernel).contains("process 1 fatal exception: memory access violation"));
    assert!(kernel.halted().is_none());
}

#[test]
fn test_invalid_interrupt_halts_kernel() {
    let mut kernel = boot(KernelConfig::default());
    kernel.queue_interrupt(99, Vec::new());
    kernel.on_clock_pulse();

    assert_eq!(kernel.halted(), Some("invalid interrupt 99"));
    assert!(console(&kernel).halted);
    let clock = kernel.clock();
    kernel.on_clock_pulse();
    assert_eq!(kernel.clock(), clock);
}

#[test]
fn test_keyboard_builds_input_lines() {
    let mut kernel = boot(KernelConfig::default());
    for (code, shifted) in [(72, false), (73, false), (49, true), (13, false)] {
        kernel.key_press(code, shifted);
    }
    for _ in 0..4 {
        kernel.on_clock_pulse();
    }
    assert_eq!(kernel.take_input_line(), Some("hi!".to_string()));
    assert_eq!(kernel.take_input_line(), None);

    kernel.key_press(-1, false);
    kernel.on_clock_pulse();
    assert!(kernel.halted().is_some());
}

#[test]
fn test_single_step_runs_one_cycle_per_step() {
    let mut kernel = boot(KernelConfig::default());
    let pid = kernel.load_program(&STORE_SEVEN, None).unwrap();
    kernel.step_program(pid).unwrap();

    for _ in 0..5 {
        kernel.on_clock_pulse();
    }
    assert_eq!(kernel.cycles(), 0);

    for expected in 1..=3 {
        assert!(kernel.step());
        kernel.on_clock_pulse();
        assert_eq!(kernel.cycles(), expected);
    }
    kernel.on_clock_pulse();
    assert_eq!(kernel.terminated()[0].regs.acc, 7);
    assert!(!kernel.step());
}

#[test]
fn test_switching_step_target_saves_the_old_process() {
    let mut kernel = boot(KernelConfig::default());
    let a = kernel.load_program(&STORE_SEVEN, None).unwrap();
    let b = kernel.load_program(&STORE_SEVEN, None).unwrap();

    kernel.step_program(a).unwrap();
    assert!(kernel.step());
    kernel.on_clock_pulse();
    assert_eq!(kernel.cpu().regs.acc, 7);

    kernel.step_program(b).unwrap();
    let pcb = kernel.process(a).unwrap();
    assert_eq!(pcb.regs.acc, 7);
    assert_eq!(pcb.regs.pc, 2);
    assert_eq!(pcb.state, ProcessState::Ready);
    assert!(kernel.ready().contains(a));
    assert_parity(&kernel);

    assert_eq!(kernel.active_pid(), Some(b));
    assert_eq!(kernel.process(b).unwrap().state, ProcessState::Running);
    assert_eq!(kernel.cpu().regs.acc, 0);
    println!("✅ stepping a new process saves and requeues the old one");
}

#[test]
fn test_run_leaves_step_mode() {
    let mut kernel = boot(KernelConfig::default());
    let a = kernel.load_program(&STORE_SEVEN, None).unwrap();
    let b = kernel.load_program(&STORE_SEVEN, None).unwrap();

    kernel.step_program(a).unwrap();
    assert!(kernel.step());
    kernel.on_clock_pulse();

    kernel.queue_program(b).unwrap();
    kernel.start_execution();
    assert!(!kernel.is_stepping());
    assert_eq!(kernel.ready_pids(), vec![a]);

    pulse_until(&mut kernel, |k| k.terminated().len() == 2);
    let order: Vec<Pid> = kernel.terminated().iter().map(|pcb| pcb.pid).collect();
    assert_eq!(order, vec![b, a]);
    assert!(kernel.terminated().iter().all(|pcb| pcb.regs.acc == 7));
    assert_eq!(kernel.cycles(), 6);
    println!("✅ run after stepping schedules everyone");
}

#[test]
fn test_boot_on_unusable_disk_traps() {
    let geometry = Geometry {
        block_size: 16,
        ..Geometry::default()
    };
    let kernel = Kernel::new(
        KernelConfig::default(),
        Disk::new(geometry),
        Box::new(BufferConsole::new()),
    );
    let reason = kernel.halted().unwrap();
    assert!(reason.starts_with("file system driver"), "{}", reason);
    assert!(console(&kernel).halted);
    println!("✅ bad disk geometry halts the kernel at boot");
}

#[test]
fn test_fcfs_and_priority_order() {
    let mut kernel = boot(KernelConfig {
        mode: Mode::Fcfs,
        ..KernelConfig::default()
    });
    let a = kernel.load_program(&STORE_SEVEN, Some(9)).unwrap();
    let b = kernel.load_program(&STORE_SEVEN, Some(1)).unwrap();
    kernel.queue_program(a).unwrap();
    kernel.queue_program(b).unwrap();
    kernel.start_execution();
    pulse_until(&mut kernel, |k| k.terminated().len() == 2);
    let order: Vec<Pid> = kernel.terminated().iter().map(|p| p.pid).collect();
    assert_eq!(order, vec![a, b]);

    kernel.scheduler_mut().mode = Mode::Priority;
    let c = kernel.load_program(&STORE_SEVEN, Some(9)).unwrap();
    let d = kernel.load_program(&STORE_SEVEN, Some(1)).unwrap();
    kernel.queue_program(c).unwrap();
    kernel.queue_program(d).unwrap();
    kernel.start_execution();
    pulse_until(&mut kernel, |k| k.terminated().len() == 4);
    let order: Vec<Pid> = kernel.terminated()[2..].iter().map(|p| p.pid).collect();
    assert_eq!(order, vec![d, c]);
}

#[test]
fn test_allocation_failures_leave_no_process() {
    let mut kernel = boot(KernelConfig::default());
    assert_eq!(
        kernel.allocate_program(Some(300), None),
        Err(KernelError::Alloc(MmuError::CeilingExceeded {
            requested: 300,
            limit: 256
        }))
    );
    assert_eq!(
        kernel.load_program(&[0xEA; 257], None),
        Err(KernelError::ProgramTooLarge(257))
    );
    assert_eq!(kernel.processes().count(), 0);
    assert_eq!(kernel.mmu().free_frames(), 3);
}

#[test]
fn test_swapped_processes_run_correctly() {
    let mut kernel = boot(KernelConfig {
        quantum: 1,
        ..KernelConfig::default()
    });
    let pids: Vec<Pid> = (0..4)
        .map(|_| kernel.load_program(&STORE_SEVEN, None).unwrap())
        .collect();
    assert_eq!(kernel.mmu().backed_pages(), 1);
    for pid in &pids {
        kernel.queue_program(*pid).unwrap();
    }
    kernel.start_execution();

    pulse_until(&mut kernel, |k| k.terminated().len() == 4);
    for pcb in kernel.terminated() {
        assert_eq!(pcb.state, ProcessState::Done);
        assert_eq!(pcb.regs.acc, 7);
    }
    assert_eq!(kernel.mmu().live_pages(), 0);
    assert_eq!(kernel.fs().free_block_counts().unwrap(), (63, 192));
    println!("✅ four processes on three frames all finish");
}

#[test]
fn test_file_commands_through_kernel() {
    let mut kernel = boot(KernelConfig::default());
    kernel.create_file("A").unwrap();
    kernel.write_file("A", &[0xDE, 0xAD, 0xBE]).unwrap();
    assert_eq!(kernel.read_file("A").unwrap(), vec![0xDE, 0xAD, 0xBE]);
    assert_eq!(kernel.create_file("A"), Err(KernelError::Fs(FsError::Exists)));
    kernel.delete_file("A").unwrap();
    assert_eq!(kernel.read_file("A"), Err(KernelError::Fs(FsError::NoSuchFile)));

    kernel.load_program(&STORE_SEVEN, None).unwrap();
    assert_eq!(kernel.format_disk(), Err(KernelError::Resident(1)));
    assert!(kernel.halted().is_none());
}
