use std::time::{SystemTime, UNIX_EPOCH};

use kernel::{Kernel, KernelError, Mode, Param};
use types::{irq, Config, Pid, Priority};

/// What the host loop should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    Shutdown,
}

type Action = fn(&mut Shell, &mut Kernel, &[&str]) -> Outcome;

struct ShellCommand {
    name: &'static str,
    description: &'static str,
    action: Action,
}

const COMMANDS: &[ShellCommand] = &[
    ShellCommand { name: "ver", description: "- Displays the current version data.", action: Shell::ver },
    ShellCommand { name: "help", description: "- Lists the available commands.", action: Shell::help },
    ShellCommand { name: "shutdown", description: "- Shuts down the OS and saves the disk.", action: Shell::shutdown },
    ShellCommand { name: "cls", description: "- Clears the screen and resets the cursor position.", action: Shell::cls },
    ShellCommand { name: "man", description: "<topic> - Displays the manual page for <topic>.", action: Shell::man },
    ShellCommand { name: "trace", description: "<on | off> - Turns the OS trace on or off.", action: Shell::trace },
    ShellCommand { name: "rot13", description: "<string> - Does rot13 obfuscation on <string>.", action: Shell::rot13 },
    ShellCommand { name: "prompt", description: "<string> - Sets the prompt.", action: Shell::prompt_cmd },
    ShellCommand { name: "date", description: "- Displays the current date.", action: Shell::date },
    ShellCommand { name: "whereami", description: "- Shows the current location of the system.", action: Shell::whereami },
    ShellCommand { name: "status", description: "<string> - Sets the status bar message.", action: Shell::status },
    ShellCommand { name: "load", description: "[-p <priority>] <hex> - Loads a program.", action: Shell::load },
    ShellCommand { name: "run", description: "<pid> [pids...] - Runs loaded programs.", action: Shell::run },
    ShellCommand { name: "runall", description: "- Runs every loaded program.", action: Shell::runall },
    ShellCommand { name: "quantum", description: "<n | default> - Sets the round robin quantum.", action: Shell::quantum },
    ShellCommand { name: "setschedule", description: "<rr | fcfs | priority | default> - Sets the scheduling mode.", action: Shell::setschedule },
    ShellCommand { name: "getschedule", description: "- Shows the scheduling mode.", action: Shell::getschedule },
    ShellCommand { name: "step", description: "[pid] - Single steps a loaded program.", action: Shell::step },
    ShellCommand { name: "ps", description: "[-l | -v] - Lists active, loaded or all process details.", action: Shell::ps },
    ShellCommand { name: "kill", description: "<pid> - Kills an active process.", action: Shell::kill },
    ShellCommand { name: "unload", description: "<pid> - Removes a loaded, inactive process.", action: Shell::unload },
    ShellCommand { name: "create", description: "<filename> - Creates a file.", action: Shell::create },
    ShellCommand { name: "read", description: "<filename> - Prints a file.", action: Shell::read },
    ShellCommand { name: "write", description: "<filename> <data> - Writes data to a file.", action: Shell::write },
    ShellCommand { name: "delete", description: "<filename> - Deletes a file.", action: Shell::delete },
    ShellCommand { name: "format", description: "- Formats the disk.", action: Shell::format },
    ShellCommand { name: "ls", description: "- Lists the files on disk.", action: Shell::ls },
    ShellCommand { name: "crash", description: "- Halts the kernel.", action: Shell::crash },
];

/// Command interpreter. Every command is a thin call into the kernel.
#[derive(Debug)]
pub struct Shell {
    prompt: String,
    status: String,
}

impl Default for Shell {
    fn default() -> Self {
        Self {
            prompt: ">".to_string(),
            status: String::new(),
        }
    }
}

impl Shell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn status_message(&self) -> &str {
        &self.status
    }

    /// Run one input line.
    pub fn handle_input(&mut self, kernel: &mut Kernel, line: &str) -> Outcome {
        let mut words = line.split_whitespace();
        let Some(name) = words.next() else {
            return Outcome::Continue;
        };
        let args: Vec<&str> = words.collect();
        let name = name.to_ascii_lowercase();

        match COMMANDS.iter().find(|command| command.name == name) {
            Some(command) => (command.action)(self, kernel, &args),
            None => {
                kernel.print_line("Invalid Command. Type 'help' for, well... help.");
                Outcome::Continue
            }
        }
    }

    fn ver(&mut self, kernel: &mut Kernel, _args: &[&str]) -> Outcome {
        kernel.print_line(&format!("{} version {}", Config::NAME, Config::VERSION));
        Outcome::Continue
    }

    fn help(&mut self, kernel: &mut Kernel, _args: &[&str]) -> Outcome {
        kernel.print_line("Commands:");
        for command in COMMANDS {
            kernel.print_line(&format!("  {} {}", command.name, command.description));
        }
        Outcome::Continue
    }

    fn shutdown(&mut self, kernel: &mut Kernel, _args: &[&str]) -> Outcome {
        kernel.print_line("Shutting down...");
        kernel.shutdown();
        Outcome::Shutdown
    }

    fn cls(&mut self, kernel: &mut Kernel, _args: &[&str]) -> Outcome {
        let console = kernel.console_mut();
        console.clear_screen();
        console.reset_xy();
        Outcome::Continue
    }

    fn man(&mut self, kernel: &mut Kernel, args: &[&str]) -> Outcome {
        let Some(topic) = args.first() else {
            kernel.print_line("Usage: man <topic>  Please supply a topic.");
            return Outcome::Continue;
        };
        match COMMANDS.iter().find(|command| command.name == *topic) {
            Some(command) => kernel.print_line(&format!("{} {}", command.name, command.description)),
            None => kernel.print_line(&format!("No manual entry for {}.", topic)),
        }
        Outcome::Continue
    }

    fn trace(&mut self, kernel: &mut Kernel, args: &[&str]) -> Outcome {
        match args.first().copied() {
            Some("on") if kernel.trace_enabled() => kernel.print_line("Trace is already on."),
            Some("on") => {
                kernel.set_trace(true);
                kernel.print_line("Trace ON");
            }
            Some("off") => {
                kernel.set_trace(false);
                kernel.print_line("Trace OFF");
            }
            Some(_) => kernel.print_line("Invalid argument.  Usage: trace <on | off>."),
            None => kernel.print_line("Usage: trace <on | off>"),
        }
        Outcome::Continue
    }

    fn rot13(&mut self, kernel: &mut Kernel, args: &[&str]) -> Outcome {
        if args.is_empty() {
            kernel.print_line("Usage: rot13 <string>  Please supply a string.");
        } else {
            let text = args.join(" ");
            kernel.print_line(&format!("{} = '{}'", text, rot13(&text)));
        }
        Outcome::Continue
    }

    fn prompt_cmd(&mut self, kernel: &mut Kernel, args: &[&str]) -> Outcome {
        if args.is_empty() {
            kernel.print_line("Usage: prompt <string>  Please supply a string.");
        } else {
            self.prompt = args.join(" ");
        }
        Outcome::Continue
    }

    fn date(&mut self, kernel: &mut Kernel, _args: &[&str]) -> Outcome {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        kernel.print_line(&format_utc(secs));
        Outcome::Continue
    }

    fn whereami(&mut self, kernel: &mut Kernel, _args: &[&str]) -> Outcome {
        kernel.print_line("36 degrees 56' 25\" N, 116 degrees 29' 06\" W");
        Outcome::Continue
    }

    fn status(&mut self, kernel: &mut Kernel, args: &[&str]) -> Outcome {
        if args.is_empty() {
            kernel.print_line("Usage: status <string>  Please supply a string.");
            return Outcome::Continue;
        }
        self.status = args.join(" ");
        kernel.queue_interrupt(
            irq::DISPLAY,
            vec![Param::Text("status".to_string()), Param::Text(self.status.clone())],
        );
        Outcome::Continue
    }

    fn load(&mut self, kernel: &mut Kernel, args: &[&str]) -> Outcome {
        let (priority, hex_words) = match args {
            ["-p", priority, rest @ ..] => match priority.parse::<Priority>() {
                Ok(priority) => (Some(priority), rest),
                Err(_) => {
                    kernel.print_line("Invalid priority");
                    return Outcome::Continue;
                }
            },
            rest => (None, rest),
        };
        let Some(code) = parse_program(hex_words) else {
            kernel.print_line("Invalid Program!");
            return Outcome::Continue;
        };

        match kernel.load_program(&code, priority) {
            Ok(pid) => {
                kernel.print_line("Loaded Program");
                kernel.print_line(&format!("PID: {}", pid));
            }
            Err(err) => kernel.print_line(&format!("failed, {}", err)),
        }
        Outcome::Continue
    }

    fn run(&mut self, kernel: &mut Kernel, args: &[&str]) -> Outcome {
        if args.is_empty() {
            kernel.print_line("Please supply a PID");
            return Outcome::Continue;
        }
        for arg in args {
            let queued = parse_pid(arg).map(|pid| kernel.queue_program(pid));
            match queued {
                // the active process keeps running, or resumes from step mode
                Some(Ok(())) | Some(Err(KernelError::Busy(_))) => {}
                _ => kernel.print_line(&format!("No such program {}", arg)),
            }
        }
        kernel.start_execution();
        Outcome::Continue
    }

    fn runall(&mut self, kernel: &mut Kernel, _args: &[&str]) -> Outcome {
        let active = kernel.active_pid();
        let pids: Vec<Pid> = kernel
            .processes()
            .map(|pcb| pcb.pid)
            .filter(|pid| Some(*pid) != active && !kernel.ready().contains(*pid))
            .collect();
        if pids.is_empty() {
            kernel.print_line("No loaded processes");
            return Outcome::Continue;
        }
        for pid in pids {
            let _ = kernel.queue_program(pid);
        }
        kernel.start_execution();
        Outcome::Continue
    }

    fn quantum(&mut self, kernel: &mut Kernel, args: &[&str]) -> Outcome {
        match args.first().copied() {
            None => kernel.print_line("Please supply a quantum"),
            Some("default") => {
                kernel.scheduler_mut().quantum = Config::DEFAULT_QUANTUM;
                kernel.print_line("Reset quantum to default");
            }
            Some(arg) => match arg.parse::<u32>() {
                Ok(quantum) if quantum > 0 => {
                    kernel.scheduler_mut().quantum = quantum;
                    kernel.print_line(&format!("Set quantum to: {}", quantum));
                }
                _ => kernel.print_line("Invalid quantum"),
            },
        }
        Outcome::Continue
    }

    fn setschedule(&mut self, kernel: &mut Kernel, args: &[&str]) -> Outcome {
        match args.first().copied() {
            None => kernel.print_line("Please supply a mode"),
            Some("default") => {
                kernel.scheduler_mut().mode = Mode::default();
                kernel.print_line("Reset mode to default");
            }
            Some(arg) => match arg.parse::<Mode>() {
                Ok(mode) => {
                    kernel.scheduler_mut().mode = mode;
                    kernel.print_line(&format!("Set mode to: {}", mode));
                }
                Err(_) => kernel.print_line(&format!(
                    "Invalid mode, choices: [{}]",
                    Mode::CHOICES.join(", ")
                )),
            },
        }
        Outcome::Continue
    }

    fn getschedule(&mut self, kernel: &mut Kernel, _args: &[&str]) -> Outcome {
        let mode = kernel.scheduler().mode;
        kernel.print_line(&format!("Schedule mode: {}", mode));
        Outcome::Continue
    }

    fn step(&mut self, kernel: &mut Kernel, args: &[&str]) -> Outcome {
        match args.first() {
            Some(arg) => match parse_pid(arg).map(|pid| kernel.step_program(pid)) {
                Some(Ok(())) => kernel.print_line("Program ready, type step to advance"),
                Some(Err(err)) => kernel.print_line(&format!("failed, {}", err)),
                None => kernel.print_line("Please supply a valid PID"),
            },
            None => {
                if !kernel.step() {
                    kernel.print_line("No program is being stepped");
                }
            }
        }
        Outcome::Continue
    }

    fn ps(&mut self, kernel: &mut Kernel, args: &[&str]) -> Outcome {
        match args.first().copied() {
            Some("-l") => {
                let loaded: Vec<String> = kernel.processes().map(|pcb| pcb.pid.to_string()).collect();
                if loaded.is_empty() {
                    kernel.print_line("Loaded processes: None");
                } else {
                    kernel.print_line(&format!("Loaded processes: {}", loaded.join(" ")));
                }
            }
            Some("-v") => {
                let dumps: Vec<String> = kernel.processes().map(|pcb| pcb.to_string()).collect();
                for dump in dumps {
                    for line in dump.lines() {
                        kernel.print_line(line);
                    }
                }
            }
            _ => match kernel.active_pid() {
                Some(active) => {
                    let mut pids = vec![active.to_string()];
                    pids.extend(kernel.ready_pids().iter().map(|pid| pid.to_string()));
                    kernel.print_line(&format!("Active PIDs: {}", pids.join(" ")));
                }
                None => kernel.print_line("No active processes"),
            },
        }
        Outcome::Continue
    }

    fn kill(&mut self, kernel: &mut Kernel, args: &[&str]) -> Outcome {
        let Some(pid) = args.first().and_then(|arg| parse_pid(arg)) else {
            kernel.print_line("Please supply a valid PID");
            return Outcome::Continue;
        };
        if kernel.active_pid() == Some(pid) || kernel.ready().contains(pid) {
            match kernel.free_process(pid) {
                Ok(()) => kernel.print_line(&format!("Killed PID: {}", pid)),
                Err(err) => kernel.print_line(&format!("failed, {}", err)),
            }
        } else if kernel.process(pid).is_some() {
            kernel.print_line("Use unload to remove loaded, but non-active, processes");
        } else {
            kernel.print_line("failed, no such process");
        }
        Outcome::Continue
    }

    fn unload(&mut self, kernel: &mut Kernel, args: &[&str]) -> Outcome {
        let Some(pid) = args.first().and_then(|arg| parse_pid(arg)) else {
            kernel.print_line("Please supply a valid PID");
            return Outcome::Continue;
        };
        if kernel.active_pid() == Some(pid) || kernel.ready().contains(pid) {
            kernel.print_line("Use kill to remove active processes");
        } else {
            match kernel.free_process(pid) {
                Ok(()) => kernel.print_line(&format!("Unloaded PID: {}", pid)),
                Err(err) => kernel.print_line(&format!("failed, {}", err)),
            }
        }
        Outcome::Continue
    }

    fn create(&mut self, kernel: &mut Kernel, args: &[&str]) -> Outcome {
        let Some(name) = args.first() else {
            kernel.print_line("Please supply a filename");
            return Outcome::Continue;
        };
        let result = kernel.create_file(name);
        report(kernel, result);
        Outcome::Continue
    }

    fn read(&mut self, kernel: &mut Kernel, args: &[&str]) -> Outcome {
        let Some(name) = args.first() else {
            kernel.print_line("Please supply a filename");
            return Outcome::Continue;
        };
        match kernel.read_file(name) {
            Ok(data) => kernel.print_line(&String::from_utf8_lossy(&data)),
            Err(err) => kernel.print_line(&format!("failed, {}", err)),
        }
        Outcome::Continue
    }

    fn write(&mut self, kernel: &mut Kernel, args: &[&str]) -> Outcome {
        let Some((name, data)) = args.split_first() else {
            kernel.print_line("Please supply a filename");
            return Outcome::Continue;
        };
        let data = data.join(" ");
        let result = kernel.write_file(name, data.as_bytes());
        report(kernel, result);
        Outcome::Continue
    }

    fn delete(&mut self, kernel: &mut Kernel, args: &[&str]) -> Outcome {
        let Some(name) = args.first() else {
            kernel.print_line("Please supply a filename");
            return Outcome::Continue;
        };
        let result = kernel.delete_file(name);
        report(kernel, result);
        Outcome::Continue
    }

    fn format(&mut self, kernel: &mut Kernel, _args: &[&str]) -> Outcome {
        let result = kernel.format_disk();
        report(kernel, result);
        Outcome::Continue
    }

    fn ls(&mut self, kernel: &mut Kernel, _args: &[&str]) -> Outcome {
        let files = kernel.list_files();
        if files.is_empty() {
            kernel.print_line("No files");
            return Outcome::Continue;
        }
        kernel.print_line("File listing:");
        for file in files {
            kernel.print_line(&format!("  {}", file));
        }
        Outcome::Continue
    }

    fn crash(&mut self, kernel: &mut Kernel, _args: &[&str]) -> Outcome {
        kernel.trap_error("forced crash");
        Outcome::Continue
    }
}

fn report(kernel: &mut Kernel, result: Result<(), KernelError>) {
    match result {
        Ok(()) => kernel.print_line("success"),
        Err(err) => kernel.print_line(&format!("failed, {}", err)),
    }
}

fn parse_pid(arg: &str) -> Option<Pid> {
    arg.parse().ok()
}

/// Hex program text, whitespace allowed between bytes.
pub fn parse_program(words: &[&str]) -> Option<Vec<u8>> {
    let text: String = words.concat();
    let code = hex::decode(&text).ok()?;
    if code.is_empty() || code.len() > Config::PROGRAM_ALLOWED_MEM {
        return None;
    }
    Some(code)
}

pub fn rot13(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            'a'..='m' | 'A'..='M' => (c as u8 + 13) as char,
            'n'..='z' | 'N'..='Z' => (c as u8 - 13) as char,
            _ => c,
        })
        .collect()
}

/// `YYYY-MM-DD at HH:MM:SS UTC` for seconds since the Unix epoch.
pub fn format_utc(secs: u64) -> String {
    let (year, month, day) = civil_from_days((secs / 86_400) as i64);
    let rem = secs % 86_400;
    format!(
        "{:04}-{:02}-{:02} at {:02}:{:02}:{:02} UTC",
        year,
        month,
        day,
        rem / 3600,
        rem % 3600 / 60,
        rem % 60
    )
}

// Days since 1970-01-01 to a proleptic Gregorian date.
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}
