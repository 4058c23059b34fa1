//! `luz`: assembles LASM source into object images, links object images into
//! an executable image, runs an executable to completion, or drives it
//! through an interactive single-step debug shell.

use clap::{Parser, Subcommand};
use luz::memory::composite::CompositeMemory;
use luz::memory::peripheral::SharedQueue;
use luz::{constants, Cpu, Debugger, Memory, Storage};
use luzobj::{Executable, ObjectImage};
use std::error::Error;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;

#[derive(Debug, Parser)]
#[command(name = "luz", version, about = "Assembler, linker and simulator for the Luz ISA", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Assemble one or more LASM sources into a single relocatable object.
    Assemble {
        /// Source files, concatenated in order before assembling.
        sources: Vec<PathBuf>,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Link one or more object images into an executable image.
    Link {
        /// Object files produced by `assemble`.
        objects: Vec<PathBuf>,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Run an executable image to completion and print the final registers.
    Run {
        executable: PathBuf,
        /// Use raw `$rN` register names instead of ABI aliases.
        #[arg(long)]
        no_alias: bool,
    },
    /// Load an executable and step through it interactively from stdin.
    Debug { executable: PathBuf },
}

fn main() {
    if let Err(err) = run(Args::parse()) {
        eprintln!("luz: {}", err);
        process::exit(1);
    }
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
    match args.command {
        Command::Assemble { sources, output } => assemble(&sources, &output),
        Command::Link { objects, output } => link(&objects, &output),
        Command::Run { executable, no_alias } => run_executable(&executable, !no_alias),
        Command::Debug { executable } => debug_executable(&executable),
    }
}

fn assemble(sources: &[PathBuf], output: &PathBuf) -> Result<(), Box<dyn Error>> {
    if sources.is_empty() {
        return Err("assemble requires at least one source file".into());
    }
    let mut text = String::new();
    for source in sources {
        text.push_str(&fs::read_to_string(source)?);
        text.push('\n');
    }
    let image = lasm::assemble(&text)?;
    let mut file = fs::File::create(output)?;
    image.write_to(&mut file)?;
    Ok(())
}

fn link(objects: &[PathBuf], output: &PathBuf) -> Result<(), Box<dyn Error>> {
    if objects.is_empty() {
        return Err("link requires at least one object file".into());
    }
    let images = objects
        .iter()
        .map(|path| {
            let mut file = fs::File::open(path)?;
            let image = ObjectImage::read_from(&mut file)?;
            Ok(image)
        })
        .collect::<Result<Vec<_>, Box<dyn Error>>>()?;
    let executable = luzld::link(&images)?;
    let mut file = fs::File::create(output)?;
    executable.write_to(&mut file)?;
    Ok(())
}

/// Extra room mapped past the highest linked segment, standing in for stack
/// and heap space no segment claims.
const STACK_SLACK: u32 = 0x1_0000;

/// Builds the flat address space an executable runs in: a zeroed scratch
/// region below the peripheral window, the peripheral hook itself, and one
/// generously-sized region above it holding every linked segment plus slack.
/// Mapping the space this way (rather than one mount per segment) keeps any
/// address a running program computes — a stack pointer past its data, a
/// loop index that overruns — landing on mapped, zeroed memory instead of
/// tripping `CompositeMemory`'s "unmapped gap" error.
fn load(executable: &Executable) -> Result<(CompositeMemory, SharedQueue), Box<dyn Error>> {
    let mut memory = CompositeMemory::new();

    let peripheral_base = constants::DEFAULT_PERIPHERAL_ADDRESS;
    let peripheral_end = peripheral_base + constants::WORD_BYTES;

    memory
        .mount("scratch", 0, Box::new(Memory::new(peripheral_base)))
        .map_err(|_| "scratch region overlaps the peripheral window")?;

    let queue = SharedQueue::new(constants::WORD_BYTES);
    memory
        .mount("peripheral", peripheral_base, Box::new(queue.clone()))
        .map_err(|_| "peripheral window overlaps a program segment")?;

    let program_end = executable
        .segments
        .iter()
        .map(|segment| segment.base + segment.bytes.len() as u32)
        .max()
        .unwrap_or(peripheral_end)
        .max(peripheral_end)
        + STACK_SLACK;
    let mut program = vec![0u8; (program_end - peripheral_end) as usize];
    for segment in &executable.segments {
        let start = segment
            .base
            .checked_sub(peripheral_end)
            .ok_or_else(|| format!("segment \"{}\" starts inside the peripheral window", segment.name))? as usize;
        program[start..start + segment.bytes.len()].copy_from_slice(&segment.bytes);
    }
    memory
        .mount("program", peripheral_end, Box::new(Memory::from(&program[..])))
        .map_err(|_| "program region overlaps the peripheral window")?;

    Ok((memory, queue))
}

fn run_executable(path: &PathBuf, use_alias: bool) -> Result<(), Box<dyn Error>> {
    let mut file = fs::File::open(path)?;
    let executable = Executable::read_from(&mut file)?;
    let entry = executable.entry;
    let (memory, queue) = load(&executable)?;

    let mut cpu = Cpu::new(memory, entry);
    cpu.run();

    for (id, value) in cpu.registers().iter() {
        println!("{:<5} = 0x{:08x}", luz::isa::register_display_name(id, use_alias), value);
    }
    let drained = queue.drain();
    if !drained.is_empty() {
        println!("peripheral queue: {:?}", drained);
    }
    Ok(())
}

fn debug_executable(path: &PathBuf) -> Result<(), Box<dyn Error>> {
    let mut file = fs::File::open(path)?;
    let executable = Executable::read_from(&mut file)?;
    let entry = executable.entry;
    let (memory, queue) = load(&executable)?;

    let mut debugger = Debugger::new(Cpu::new(memory, entry));
    let stdin = io::stdin();
    print_help();
    loop {
        print!("(luz) ");
        io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let words: Vec<&str> = line.split_whitespace().collect();
        match words.as_slice() {
            [] => continue,
            ["q"] | ["quit"] => break,
            ["help"] => print_help(),
            ["s"] | ["step"] => step_and_report(&mut debugger, 1),
            ["s", count] | ["step", count] => match count.parse::<u32>() {
                Ok(count) => step_and_report(&mut debugger, count),
                Err(_) => println!("expected an instruction count, found \"{}\"", count),
            },
            ["r"] | ["regs"] => print_registers(&debugger),
            ["m", address, length] | ["mem", address, length] => {
                match (parse_u32(address), length.parse::<u32>()) {
                    (Ok(address), Ok(length)) => print_memory(&debugger, address, length),
                    _ => println!("usage: m <address> <length>"),
                }
            }
            ["set", "alias", "0"] => debugger.set_alias(false),
            ["set", "alias", "1"] => debugger.set_alias(true),
            _ => println!("unrecognized command, try \"help\""),
        }
        if debugger.halted() {
            let drained = queue.drain();
            if !drained.is_empty() {
                println!("peripheral queue: {:?}", drained);
            }
        }
    }
    Ok(())
}

fn step_and_report<M: Storage>(debugger: &mut Debugger<M>, count: u32) {
    let executed = debugger.step(count);
    println!("ran {} instruction(s), pc = 0x{:08x}{}", executed, debugger.pc(), if debugger.halted() { ", halted" } else { "" });
}

fn print_registers<M: Storage>(debugger: &Debugger<M>) {
    for view in debugger.registers() {
        println!("{:<5} = 0x{:08x}", view.name, view.value);
    }
}

fn print_memory<M: Storage>(debugger: &Debugger<M>, address: u32, length: u32) {
    let bytes = debugger.memory(address, length);
    for (offset, byte) in bytes.iter().enumerate() {
        match byte {
            Some(value) => print!("{:02x} ", value),
            None => print!("?? "),
        }
        if (offset + 1) % 16 == 0 {
            println!();
        }
    }
    println!();
}

fn print_help() {
    println!("commands: s [n] | r | m <addr> <len> | set alias 0|1 | q | help");
}

fn parse_u32(text: &str) -> Result<u32, std::num::ParseIntError> {
    if let Some(hex) = text.strip_prefix("0x") {
        u32::from_str_radix(hex, 16)
    } else {
        text.parse::<u32>()
    }
}
