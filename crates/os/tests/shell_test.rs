use kernel::{BufferConsole, Kernel, KernelConfig, Mode};
use os::shell::{format_utc, parse_program, rot13};
use os::{Outcome, Shell};
use storage::Disk;

const STORE_SEVEN: &str = "A9 07 8D 00 00 00";
const SPIN: &str = "A2 00 EC 10 00 D0 FB 00 00 00 00 00 00 00 00 00 01";

fn boot() -> (Kernel, Shell) {
    let kernel = Kernel::new(
        KernelConfig::default(),
        Disk::default(),
        Box::new(BufferConsole::new()),
    );
    (kernel, Shell::new())
}

fn console(kernel: &Kernel) -> &BufferConsole {
    kernel
        .console()
        .as_any()
        .downcast_ref::<BufferConsole>()
        .unwrap()
}

fn last_line(kernel: &Kernel) -> String {
    console(kernel).output().lines().last().unwrap_or("").to_string()
}

fn exec(kernel: &mut Kernel, shell: &mut Shell, line: &str) -> String {
    assert_eq!(shell.handle_input(kernel, line), Outcome::Continue);
    last_line(kernel)
}

fn pulse(kernel: &mut Kernel, n: usize) {
    for _ in 0..n {
        kernel.on_clock_pulse();
    }
}

#[test]
fn test_ver_and_unknown_command() {
    let (mut kernel, mut shell) = boot();
    assert_eq!(exec(&mut kernel, &mut shell, "ver"), "CharonOS version 0.3.1");
    assert_eq!(
        exec(&mut kernel, &mut shell, "frobnicate"),
        "Invalid Command. Type 'help' for, well... help."
    );
    // blank input is ignored
    assert_eq!(shell.handle_input(&mut kernel, "   "), Outcome::Continue);
    println!("✅ ver and unknown command");
}

#[test]
fn test_help_and_man() {
    let (mut kernel, mut shell) = boot();
    exec(&mut kernel, &mut shell, "help");
    let out = console(&kernel).output();
    assert!(out.contains("Commands:"));
    assert!(out.contains("  rot13 <string>"));
    assert!(out.contains("  ls - Lists the files on disk."));

    assert_eq!(
        exec(&mut kernel, &mut shell, "man ls"),
        "ls - Lists the files on disk."
    );
    assert_eq!(exec(&mut kernel, &mut shell, "man nope"), "No manual entry for nope.");
    assert_eq!(
        exec(&mut kernel, &mut shell, "man"),
        "Usage: man <topic>  Please supply a topic."
    );
    println!("✅ help and man");
}

#[test]
fn test_trace_prompt_and_rot13() {
    let (mut kernel, mut shell) = boot();
    assert_eq!(exec(&mut kernel, &mut shell, "trace on"), "Trace ON");
    assert!(kernel.trace_enabled());
    assert_eq!(exec(&mut kernel, &mut shell, "trace on"), "Trace is already on.");
    assert_eq!(exec(&mut kernel, &mut shell, "trace off"), "Trace OFF");
    assert!(!kernel.trace_enabled());

    exec(&mut kernel, &mut shell, "prompt $ os");
    assert_eq!(shell.prompt(), "$ os");

    assert_eq!(exec(&mut kernel, &mut shell, "rot13 Hello, World"), "Hello, World = 'Uryyb, Jbeyq'");
    assert_eq!(rot13(&rot13("Zebra 42")), "Zebra 42");
    println!("✅ trace, prompt and rot13");
}

#[test]
fn test_date_formatting() {
    assert_eq!(format_utc(0), "1970-01-01 at 00:00:00 UTC");
    assert_eq!(format_utc(951_782_400), "2000-02-29 at 00:00:00 UTC");
    assert_eq!(format_utc(1_700_000_000), "2023-11-14 at 22:13:20 UTC");
    println!("✅ date formatting");
}

#[test]
fn test_program_text_validation() {
    assert_eq!(parse_program(&["A9", "07"]), Some(vec![0xA9, 0x07]));
    assert_eq!(parse_program(&["a907"]), Some(vec![0xA9, 0x07]));
    assert_eq!(parse_program(&["A9", "0"]), None);
    assert_eq!(parse_program(&["ZZ"]), None);
    assert_eq!(parse_program(&[]), None);
    let too_long = "00".repeat(257);
    assert_eq!(parse_program(&[too_long.as_str()]), None);
    println!("✅ program text validation");
}

#[test]
fn test_load_and_run_to_completion() {
    let (mut kernel, mut shell) = boot();
    assert_eq!(exec(&mut kernel, &mut shell, &format!("load {}", STORE_SEVEN)), "PID: 0");
    assert!(console(&kernel).contains("Loaded Program"));
    assert_eq!(exec(&mut kernel, &mut shell, "load XYZ"), "Invalid Program!");
    assert_eq!(exec(&mut kernel, &mut shell, "load"), "Invalid Program!");

    assert_eq!(exec(&mut kernel, &mut shell, "ps -l"), "Loaded processes: 0");
    assert_eq!(exec(&mut kernel, &mut shell, "ps"), "No active processes");

    exec(&mut kernel, &mut shell, "run 0");
    pulse(&mut kernel, 1);
    assert_eq!(kernel.active_pid(), Some(0));
    pulse(&mut kernel, 50);

    assert!(console(&kernel).contains("Program: 0 - Complete"));
    assert_eq!(kernel.terminated().len(), 1);
    assert_eq!(exec(&mut kernel, &mut shell, "ps -l"), "Loaded processes: None");
    println!("✅ load and run");
}

#[test]
fn test_load_with_priority() {
    let (mut kernel, mut shell) = boot();
    exec(&mut kernel, &mut shell, &format!("load -p 3 {}", STORE_SEVEN));
    assert_eq!(kernel.process(0).unwrap().priority, 3);
    assert_eq!(exec(&mut kernel, &mut shell, "load -p high A9"), "Invalid priority");
    println!("✅ load with priority");
}

#[test]
fn test_run_errors() {
    let (mut kernel, mut shell) = boot();
    assert_eq!(exec(&mut kernel, &mut shell, "run"), "Please supply a PID");
    assert_eq!(exec(&mut kernel, &mut shell, "run 7"), "No such program 7");
    assert_eq!(exec(&mut kernel, &mut shell, "runall"), "No loaded processes");
    println!("✅ run errors");
}

#[test]
fn test_runall_queues_every_loaded_process() {
    let (mut kernel, mut shell) = boot();
    exec(&mut kernel, &mut shell, &format!("load {}", SPIN));
    exec(&mut kernel, &mut shell, &format!("load {}", SPIN));
    exec(&mut kernel, &mut shell, "runall");
    pulse(&mut kernel, 1);

    assert_eq!(kernel.active_pid(), Some(0));
    assert_eq!(kernel.ready_pids(), vec![1]);
    assert_eq!(exec(&mut kernel, &mut shell, "ps"), "Active PIDs: 0 1");
    println!("✅ runall");
}

#[test]
fn test_kill_and_unload_rules() {
    let (mut kernel, mut shell) = boot();
    exec(&mut kernel, &mut shell, &format!("load {}", SPIN));
    exec(&mut kernel, &mut shell, &format!("load {}", SPIN));
    exec(&mut kernel, &mut shell, "run 0");
    pulse(&mut kernel, 1);
    assert_eq!(kernel.active_pid(), Some(0));

    assert_eq!(
        exec(&mut kernel, &mut shell, "kill 1"),
        "Use unload to remove loaded, but non-active, processes"
    );
    assert_eq!(
        exec(&mut kernel, &mut shell, "unload 0"),
        "Use kill to remove active processes"
    );
    assert_eq!(exec(&mut kernel, &mut shell, "kill 0"), "Killed PID: 0");
    assert_eq!(exec(&mut kernel, &mut shell, "unload 1"), "Unloaded PID: 1");
    assert_eq!(exec(&mut kernel, &mut shell, "kill x"), "Please supply a valid PID");
    assert_eq!(exec(&mut kernel, &mut shell, "unload 1"), "failed, no such process 1");
    assert_eq!(kernel.processes().count(), 0);
    println!("✅ kill and unload");
}

#[test]
fn test_scheduler_commands() {
    let (mut kernel, mut shell) = boot();
    assert_eq!(exec(&mut kernel, &mut shell, "quantum 3"), "Set quantum to: 3");
    assert_eq!(kernel.scheduler().quantum, 3);
    assert_eq!(exec(&mut kernel, &mut shell, "quantum 0"), "Invalid quantum");
    assert_eq!(exec(&mut kernel, &mut shell, "quantum many"), "Invalid quantum");
    exec(&mut kernel, &mut shell, "quantum default");
    assert_eq!(kernel.scheduler().quantum, 6);

    assert_eq!(exec(&mut kernel, &mut shell, "setschedule fcfs"), "Set mode to: fcfs");
    assert_eq!(kernel.scheduler().mode, Mode::Fcfs);
    assert_eq!(exec(&mut kernel, &mut shell, "getschedule"), "Schedule mode: fcfs");
    assert_eq!(
        exec(&mut kernel, &mut shell, "setschedule lottery"),
        "Invalid mode, choices: [rr, fcfs, priority]"
    );
    exec(&mut kernel, &mut shell, "setschedule default");
    assert_eq!(kernel.scheduler().mode, Mode::RoundRobin);
    println!("✅ scheduler commands");
}

#[test]
fn test_single_step_commands() {
    let (mut kernel, mut shell) = boot();
    assert_eq!(exec(&mut kernel, &mut shell, "step"), "No program is being stepped");
    exec(&mut kernel, &mut shell, &format!("load {}", SPIN));
    assert_eq!(
        exec(&mut kernel, &mut shell, "step 0"),
        "Program ready, type step to advance"
    );
    pulse(&mut kernel, 5);
    assert_eq!(kernel.cpu().regs.pc, 0);

    exec(&mut kernel, &mut shell, "step");
    pulse(&mut kernel, 1);
    assert_eq!(kernel.cpu().regs.pc, 2);
    assert_eq!(kernel.cycles(), 1);
    println!("✅ single step");
}

#[test]
fn test_file_commands() {
    let (mut kernel, mut shell) = boot();
    assert_eq!(exec(&mut kernel, &mut shell, "ls"), "No files");
    assert_eq!(exec(&mut kernel, &mut shell, "create notes"), "success");
    assert_eq!(exec(&mut kernel, &mut shell, "create notes"), "failed, file exists");
    assert_eq!(exec(&mut kernel, &mut shell, "write notes hello   disk"), "success");
    assert_eq!(exec(&mut kernel, &mut shell, "read notes"), "hello disk");
    assert_eq!(exec(&mut kernel, &mut shell, "read other"), "failed, no such file");

    exec(&mut kernel, &mut shell, "ls");
    assert!(console(&kernel).contains("File listing:\n  notes"));

    assert_eq!(exec(&mut kernel, &mut shell, "delete notes"), "success");
    assert!(kernel.list_files().is_empty());
    assert_eq!(exec(&mut kernel, &mut shell, "create"), "Please supply a filename");
    println!("✅ file commands");
}

#[test]
fn test_format_refused_while_resident() {
    let (mut kernel, mut shell) = boot();
    exec(&mut kernel, &mut shell, "create keep");
    exec(&mut kernel, &mut shell, &format!("load {}", STORE_SEVEN));
    assert_eq!(
        exec(&mut kernel, &mut shell, "format"),
        "failed, 1 processes are resident"
    );
    assert_eq!(kernel.list_files(), vec!["keep".to_string()]);

    exec(&mut kernel, &mut shell, "unload 0");
    assert_eq!(exec(&mut kernel, &mut shell, "format"), "success");
    assert!(kernel.list_files().is_empty());
    println!("✅ format");
}

#[test]
fn test_status_goes_to_the_status_screen() {
    let (mut kernel, mut shell) = boot();
    exec(&mut kernel, &mut shell, "status all systems go");
    assert_eq!(shell.status_message(), "all systems go");
    pulse(&mut kernel, 1);
    assert_eq!(console(&kernel).screen("status"), ["all systems go".to_string()]);
    println!("✅ status");
}

#[test]
fn test_shutdown_and_crash() {
    let (mut kernel, mut shell) = boot();
    assert_eq!(shell.handle_input(&mut kernel, "shutdown"), Outcome::Shutdown);
    assert!(console(&kernel).contains("Shutting down..."));
    assert_eq!(kernel.halted(), Some("shutdown"));

    let (mut kernel, mut shell) = boot();
    exec(&mut kernel, &mut shell, "crash");
    assert_eq!(kernel.halted(), Some("forced crash"));
    assert!(console(&kernel).halted);
    println!("✅ shutdown and crash");
}

#[test]
fn test_cls_clears_output() {
    let (mut kernel, mut shell) = boot();
    exec(&mut kernel, &mut shell, "ver");
    exec(&mut kernel, &mut shell, "cls");
    assert_eq!(console(&kernel).output(), "");
    println!("✅ cls");
}

#[test]
fn test_run_while_stepping_resumes_scheduling() {
    let (mut kernel, mut shell) = boot();
    exec(&mut kernel, &mut shell, &format!("load {}", STORE_SEVEN));
    exec(&mut kernel, &mut shell, &format!("load {}", STORE_SEVEN));
    exec(&mut kernel, &mut shell, "step 0");
    exec(&mut kernel, &mut shell, "step");
    pulse(&mut kernel, 1);

    exec(&mut kernel, &mut shell, "run 1 0");
    assert!(!console(&kernel).contains("No such program"));
    pulse(&mut kernel, 50);

    assert!(console(&kernel).contains("Program: 0 - Complete"));
    assert!(console(&kernel).contains("Program: 1 - Complete"));
    assert_eq!(exec(&mut kernel, &mut shell, "ps -l"), "Loaded processes: None");
    println!("✅ run while stepping");
}
