use std::io::Write;

use probcount::benchmark::{self, exact_unique_count};
use probcount::source::{LogFile, TokenSource};
use probcount::Error;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::NamedTempFile;

fn write_access_log(lines: usize, distinct: u32, seed: u64) -> NamedTempFile {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut file = NamedTempFile::new().unwrap();
    for i in 0..lines {
        if i % 97 == 0 {
            writeln!(file, "-- malformed entry without address --").unwrap();
            continue;
        }
        let host = rng.gen_range(0..distinct);
        let [a, b, c, d] = (0x0a00_0000u32 + host).to_be_bytes();
        writeln!(
            file,
            "{a}.{b}.{c}.{d} - - [10/Oct/2023:13:55:36 +0000] \"GET /course/{i} HTTP/1.1\" 200 512"
        )
        .unwrap();
    }
    file.flush().unwrap();
    file
}

#[test]
fn test_log_file_is_replayable() {
    let log = write_access_log(2_000, 300, 7);
    let source = LogFile::new(log.path());

    let first: Vec<String> = source.tokens().unwrap().collect();
    let second: Vec<String> = source.tokens().unwrap().collect();
    assert_eq!(first, second);
    // every 97th line is malformed and skipped
    assert_eq!(first.len(), 2_000 - 2_000usize.div_ceil(97));
    assert!(first.iter().all(|ip| ip.starts_with("10.")));
}

#[test]
fn test_benchmark_on_log_file() {
    let log = write_access_log(60_000, 20_000, 42);
    let source = LogFile::new(log.path());
    let exact = exact_unique_count(source.tokens().unwrap());

    let report = benchmark::run(&source, 14).unwrap();
    assert_eq!(report.exact_count, exact);
    assert!(
        report.relative_error_percent() < 5.0,
        "relative error {:.2}%",
        report.relative_error_percent()
    );

    let rendered = report.to_string();
    assert!(rendered.contains("Unique elements"));
    assert!(rendered.contains(&format!("{:.1}", exact as f64)));
}

#[test]
fn test_benchmark_missing_file() {
    let source = LogFile::new("/definitely/not/here.log");
    match benchmark::run(&source, 14) {
        Err(Error::Io { path, .. }) => assert_eq!(path, source.path()),
        other => panic!("expected io error, got {other:?}"),
    }
}
