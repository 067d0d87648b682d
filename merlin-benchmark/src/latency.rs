use merlin_eql::{EqlTranspiler, TransformOptions};
use std::time::{Duration, Instant};

use super::{calculate_percentiles, create_test_schema, format_duration, QUERIES};

const LATENCY_SAMPLE_COUNT: usize = 10000;
const WARMUP_COUNT: usize = 1000;

pub fn run() {
    println!("\n=== Latency Benchmark Results ===\n");

    let plain = EqlTranspiler::default();
    let full = EqlTranspiler::new(
        TransformOptions::default()
            .with_field_name_translator(create_test_schema())
            .with_extract_parameters(true),
    );

    for (label, transpiler) in [("plain", &plain), ("schema+params", &full)] {
        println!("  [{}]", label);
        for query in QUERIES {
            for _ in 0..WARMUP_COUNT {
                let _ = transpiler.transform(query);
            }

            let mut latencies = Vec::with_capacity(LATENCY_SAMPLE_COUNT);
            for _ in 0..LATENCY_SAMPLE_COUNT {
                let start = Instant::now();
                let _ = std::hint::black_box(transpiler.transform(query));
                latencies.push(start.elapsed());
            }

            let (p50, p90, p99) = calculate_percentiles(&mut latencies);
            let sum: Duration = latencies.iter().sum();
            let avg = sum / latencies.len() as u32;
            println!(
                "    P50 {:>10}  P90 {:>10}  P99 {:>10}  Avg {:>10}  {}",
                format_duration(p50),
                format_duration(p90),
                format_duration(p99),
                format_duration(avg),
                query
            );
        }
        println!();
    }
}
