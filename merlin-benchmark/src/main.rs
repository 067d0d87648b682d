mod latency;
mod throughput;
mod utils;

pub use utils::{calculate_percentiles, create_test_schema, format_duration, QUERIES};

use std::env;
use std::time::Instant;

fn print_usage() {
    println!("Usage: merlin-benchmark [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --all           Run all benchmarks (default)");
    println!("  --latency       Run per-query latency benchmarks");
    println!("  --throughput    Run concurrent throughput benchmarks");
    println!("  --help          Show this help message");
    println!();
}

fn main() {
    println!("Merlin Translation Benchmark Suite");
    println!();

    let args: Vec<String> = env::args().collect();
    let benchmark_type = args.get(1).map(|s| s.as_str()).unwrap_or("--all");

    let start = Instant::now();

    match benchmark_type {
        "--all" | "" => {
            latency::run();
            throughput::run();
        }
        "--latency" => latency::run(),
        "--throughput" => throughput::run(),
        "--help" | "-h" | "help" => {
            print_usage();
            return;
        }
        _ => {
            println!("Unknown option: {}", benchmark_type);
            print_usage();
            return;
        }
    }

    println!("\nTotal time: {:.2?}", start.elapsed());
}
