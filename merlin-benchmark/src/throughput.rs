use merlin_eql::{EqlTranspiler, TransformOptions};
use std::sync::Arc;
use std::time::Instant;

use super::{create_test_schema, QUERIES};

const QUERIES_PER_TASK: usize = 20000;

pub fn run() {
    println!("\n=== Throughput Benchmark Results ===\n");

    let runtime = tokio::runtime::Runtime::new().unwrap();
    let transpiler = Arc::new(EqlTranspiler::new(
        TransformOptions::default().with_field_name_translator(create_test_schema()),
    ));

    for tasks in [1usize, 4, 8] {
        let start = Instant::now();
        runtime.block_on(async {
            let handles: Vec<_> = (0..tasks)
                .map(|t| {
                    let transpiler = transpiler.clone();
                    tokio::task::spawn_blocking(move || {
                        for i in 0..QUERIES_PER_TASK {
                            let query = QUERIES[(i + t) % QUERIES.len()];
                            let _ = std::hint::black_box(transpiler.transform(query));
                        }
                    })
                })
                .collect();
            for handle in handles {
                handle.await.unwrap();
            }
        });

        let elapsed = start.elapsed();
        let total = tasks * QUERIES_PER_TASK;
        println!(
            "  {} task(s): {} queries in {:.2?} ({:.0} queries/sec)",
            tasks,
            total,
            elapsed,
            total as f64 / elapsed.as_secs_f64()
        );
    }
}
