use merlin_schema::{FieldDataType, FieldDef, SchemaRegistry};
use std::time::Duration;

/// Representative queries, from a bare category match to long lookup lists
pub const QUERIES: &[&str] = &[
    "process where true",
    "process where process.name == \"cmd.exe\"",
    "process where process.pid in (1, 2, 3, 4, 5, 6, 7, 8)",
    "file where file.path like~ (\"C:\\\\Windows\\\\*\", \"*.dll\", \"*.exe\")",
    "network where cidrMatch(source.ip, \"10.0.0.0/8\", \"192.168.0.0/16\")",
    "process where startsWith~(process.name, \"power\") and not endsWith(process.name, \".bak\")",
    "any where (a + b) * 2 > 10 or length(user.name) == 0",
];

pub fn create_test_schema() -> SchemaRegistry {
    let defs = vec![
        FieldDef::new("event.category", "category", FieldDataType::String),
        FieldDef::new("process.name", "proc_name", FieldDataType::String),
        FieldDef::new("process.pid", "proc_pid", FieldDataType::UInt64),
        FieldDef::new("file.path", "file_path", FieldDataType::String),
        FieldDef::new("source.ip", "src_ip", FieldDataType::Ip),
        FieldDef::new("user.name", "user_name", FieldDataType::String),
        FieldDef::new("a", "a", FieldDataType::Int64),
        FieldDef::new("b", "b", FieldDataType::Int64),
    ];
    SchemaRegistry::from_definitions(defs).unwrap()
}

pub fn calculate_percentiles(latencies: &mut [Duration]) -> (Duration, Duration, Duration) {
    latencies.sort();
    let pick = |p: usize| latencies[(latencies.len() * p / 100).min(latencies.len() - 1)];
    (pick(50), pick(90), pick(99))
}

pub fn format_duration(d: Duration) -> String {
    let nanos = d.as_nanos();
    if nanos < 1_000 {
        format!("{}ns", nanos)
    } else if nanos < 1_000_000 {
        format!("{:.2}µs", nanos as f64 / 1_000.0)
    } else {
        format!("{:.2}ms", nanos as f64 / 1_000_000.0)
    }
}
