use anyhow::{anyhow, Context, Result};
use clap::Parser;
use colored::*;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use kernel::{Kernel, KernelConfig, Mode};
use os::{logger, Outcome, Shell, TerminalConsole};
use storage::{Disk, DiskImage};
use types::Config;

/// Boots the simulated operating system on the host terminal
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Disk image to load at boot and save on shutdown
    #[arg(short, long)]
    disk: Option<PathBuf>,

    /// Milliseconds between hardware clock pulses
    #[arg(short, long, default_value_t = Config::CPU_CLOCK_INTERVAL_MS)]
    interval_ms: u64,

    /// Round robin quantum in CPU cycles
    #[arg(short, long, default_value_t = Config::DEFAULT_QUANTUM)]
    quantum: u32,

    /// Scheduling mode (rr, fcfs, priority)
    #[arg(short, long, default_value = "rr")]
    schedule: Mode,

    /// Start with the OS trace on
    #[arg(short, long)]
    trace: bool,

    /// Host log level (off, error, warn, info, debug, trace)
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    /// Pulses between status refreshes
    #[arg(long, default_value_t = Config::STATUS_REFRESH_TICKS)]
    status_ticks: i64,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();

    let level = logger::parse_level(&args.log_level)
        .ok_or_else(|| anyhow!("invalid log level: {}", args.log_level))?;
    logger::init(level).map_err(|e| anyhow!("Failed to install logger: {}", e))?;

    println!("{}", format!("{} v{}", Config::NAME, Config::VERSION).bold().blue());
    println!("{}", "=====================================".blue());

    let disk = match &args.disk {
        Some(path) if path.exists() => {
            println!("{} {}", "💾".bold(), format!("Loading disk image {:?}", path).cyan());
            DiskImage::load(path).with_context(|| format!("Failed to load disk image {:?}", path))?
        }
        _ => Disk::default(),
    };

    let config = KernelConfig {
        quantum: args.quantum,
        mode: args.schedule,
        trace: args.trace,
    };
    let kernel = Kernel::new(config, disk, Box::new(TerminalConsole::new()));
    let kernel = Arc::new(Mutex::new(kernel));

    {
        let mut kernel = lock(&kernel)?;
        if let Some(msg) = kernel.halted() {
            anyhow::bail!("kernel halted during boot: {}", msg);
        }
        schedule_status(&mut kernel, args.status_ticks);
    }

    let clock = spawn_clock(Arc::clone(&kernel), Duration::from_millis(args.interval_ms));

    let mut shell = Shell::new();
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("{} ", shell.prompt().green());
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            lock(&kernel)?.shutdown();
            break;
        };
        let line = line.context("Failed to read stdin")?;

        let mut kernel = lock(&kernel)?;
        if kernel.halted().is_some() {
            break;
        }
        if shell.handle_input(&mut kernel, &line) == Outcome::Shutdown || kernel.halted().is_some() {
            break;
        }
    }

    let _ = clock.join();

    let kernel = lock(&kernel)?;
    match kernel.halted() {
        Some("shutdown") => {
            if let Some(path) = &args.disk {
                DiskImage::save(kernel.fs().disk(), path)
                    .with_context(|| format!("Failed to save disk image {:?}", path))?;
                println!("{} {}", "💾".bold(), format!("Saved disk image {:?}", path).cyan());
            }
        }
        Some(msg) => println!("{} {}", "❌".bold(), format!("Kernel trapped: {}", msg).red()),
        None => {}
    }
    println!(
        "{} {} pulses, {} cycles, {} context switches",
        "📊".bold(),
        kernel.clock(),
        kernel.cycles(),
        kernel.context_switches()
    );
    Ok(())
}

fn lock(kernel: &Mutex<Kernel>) -> Result<std::sync::MutexGuard<'_, Kernel>> {
    kernel.lock().map_err(|_| anyhow!("kernel lock poisoned"))
}

/// Periodic status refresh that re-arms itself on every firing.
fn schedule_status(kernel: &mut Kernel, ticks: i64) {
    kernel.add_timed_event(
        Box::new(move |kernel: &mut Kernel| {
            log::debug!("OS clock {} cycles {}", kernel.clock(), kernel.cycles());
            schedule_status(kernel, ticks);
        }),
        ticks,
    );
}

fn spawn_clock(kernel: Arc<Mutex<Kernel>>, interval: Duration) -> thread::JoinHandle<()> {
    thread::spawn(move || loop {
        thread::sleep(interval);
        let Ok(mut kernel) = kernel.lock() else {
            break;
        };
        kernel.on_clock_pulse();
        if kernel.halted().is_some() {
            break;
        }
    })
}
