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

// main.rs
//
// Command-line entry point: load an assembly program, run the pipeline to
// completion, and print metrics, optionally tracing every cycle or dumping
// the final state as JSON.

use clap::Parser;
use colored::Colorize;
use std::fs;
use std::path::PathBuf;
use tomasulo_rust::pipeline::config::SimulatorConfig;
use tomasulo_rust::pipeline::simulator::Simulator;

#[derive(Parser)]
#[command(name = "tomasulo_rust")]
#[command(about = "A cycle-accurate Tomasulo out-of-order pipeline simulator")]
#[command(version)]
struct Cli {
    /// Input assembly file (falls back to a built-in demo program)
    input: Option<PathBuf>,

    /// Maximum cycles to simulate
    #[arg(long, default_value = "10000")]
    max_cycles: usize,

    /// Print the per-cycle log while stepping
    #[arg(short, long)]
    trace: bool,

    /// Dump the final pipeline state and metrics as JSON
    #[arg(long)]
    json: bool,

    /// Max issues and commits per cycle
    #[arg(long, default_value = "4")]
    issue_width: usize,

    /// Reorder buffer capacity
    #[arg(long, default_value = "16")]
    rob_size: usize,
}

// Built-in demo: a dependent arithmetic chain, a memory round trip, and a
// counted loop that exercises the predictor and the flush path.
fn demo_program() -> Vec<String> {
    vec![
        "ADDI R1, R0, 8".to_string(),
        "ADDI R2, R0, 3".to_string(),
        "ADD R3, R1, R2".to_string(),
        "SD R3, 0(R0)".to_string(),
        "LD R4, 0(R0)".to_string(),
        "LOOP: SUBI R2, R2, 1".to_string(),
        "BNEZ R2, LOOP".to_string(),
        "HLT".to_string(),
    ]
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let lines: Vec<String> = match &cli.input {
        Some(path) => match fs::read_to_string(path) {
            Ok(text) => text.lines().map(|line| line.to_string()).collect(),
            Err(err) => {
                eprintln!("Failed to read {}: {}", path.display(), err);
                std::process::exit(1);
            },
        },
        None => {
            println!("No input file given, running the built-in demo program");
            demo_program()
        },
    };

    let config = SimulatorConfig::new()
        .with_issue_width(cli.issue_width)
        .with_rob_size(cli.rob_size);
    let mut simulator = Simulator::new(config);
    simulator.load(&lines);

    if cli.trace {
        while !simulator.finished && simulator.cycle < cli.max_cycles {
            simulator.step();
            println!("{}", format!("--- cycle {} ---", simulator.cycle).bold());
            for line in &simulator.cycle_log {
                println!("  {}", line);
            }
        }
    } else {
        simulator.run(cli.max_cycles);
    }

    if simulator.finished {
        println!("{}", "Simulation finished".green().bold());
    } else {
        println!(
            "{}",
            format!("Stopped after {} cycles without finishing", simulator.cycle).yellow()
        );
    }

    println!("\n{}", simulator.metrics());

    println!("\nNon-zero integer registers:");
    for (i, value) in simulator.register_file.int_regs.iter().enumerate() {
        if *value != 0 {
            print!("R{}: {}  ", i, value);
        }
    }
    println!();

    if cli.json {
        match serde_json::to_string_pretty(&simulator.state()) {
            Ok(json) => println!("{}", json),
            Err(err) => eprintln!("Failed to serialize state: {}", err),
        }
        match serde_json::to_string_pretty(&simulator.metrics()) {
            Ok(json) => println!("{}", json),
            Err(err) => eprintln!("Failed to serialize metrics: {}", err),
        }
    }
}
