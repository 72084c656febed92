//! Differential tests: run the fixture programs through both the JIT and the
//! reference interpreter and require identical host-call traces.

#![cfg(feature = "jit")]

use simasm::test_harness::*;
use simasm::{Error, Fault, parse_file};

fn fixture_path(name: &str) -> std::path::PathBuf {
    std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../tests/fixtures/asm")
        .join(name)
}

fn load_fixture(name: &str) -> String {
    let path = fixture_path(name);
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("read {}: {e}", path.display()))
}

#[test]
fn test_rectangle() {
    let run = assert_backends_agree(&load_fixture("rectangle.asm"), &[]);
    let stats = run.result.unwrap();
    assert_eq!(stats.pixels, 12);
    assert_eq!(stats.flushes, 1);

    let mut drawn = pixels(&run.events);
    drawn.sort_unstable();
    let mut expected: Vec<_> = (10..14)
        .flat_map(|x| (20..23).map(move |y| (x, y, 0xFFFF_0000_u32 as i32)))
        .collect();
    expected.sort_unstable();
    assert_eq!(drawn, expected);
}

#[test]
fn test_scatter() {
    let rand_values: Vec<i32> = (0..32).map(|i| i * 37 + 5).collect();
    let run = assert_backends_agree(&load_fixture("scatter.asm"), &rand_values);
    let stats = run.result.unwrap();
    assert_eq!(stats.rand_calls, 32);
    assert_eq!(stats.pixels, 16);
    for (x, y, _) in pixels(&run.events) {
        assert!((0..100).contains(&x) && (0..100).contains(&y), "({x}, {y})");
    }
}

#[test]
fn test_bounce() {
    let run = assert_backends_agree(&load_fixture("bounce.asm"), &[]);
    let stats = run.result.unwrap();
    assert_eq!(stats.flushes, 50);
    assert_eq!(stats.pixels, 100);
    for (x, y, _) in pixels(&run.events) {
        assert_eq!(x, y);
        assert!((0..=40).contains(&x), "{x}");
    }
}

#[test]
fn test_countdown() {
    let run = assert_backends_agree(&load_fixture("countdown.asm"), &[]);
    run.result.unwrap();
    let expected: Vec<_> = (1..=5)
        .rev()
        .map(|n| (n, n, n))
        .chain((1..=5).map(|n| (n, 0, n)))
        .collect();
    assert_eq!(pixels(&run.events), expected);
}

#[test]
fn test_fixtures_parse_from_disk() {
    for name in ["rectangle.asm", "scatter.asm", "bounce.asm", "countdown.asm"] {
        let program = parse_file(&fixture_path(name)).unwrap();
        assert!(!program.is_empty(), "{name}");
    }
}

#[test]
fn test_missing_file_is_io_error() {
    let err = parse_file(&fixture_path("no-such-program.asm")).unwrap_err();
    assert!(matches!(err, Error::Io { .. }), "{err}");
}

#[test]
fn test_faults_agree() {
    for (source, fault) in [
        ("POP R0\n", Fault::StackUnderflow),
        ("f: PUSH R0\nCALL f\n", Fault::StackOverflow),
        ("MOV R0 -1\nPUSH R0\nRET\n", Fault::BadReturnAddress),
    ] {
        let run = assert_backends_agree(source, &[]);
        match run.result {
            Err(Error::Fault(f)) => assert_eq!(f, fault, "{source}"),
            ref other => panic!("{source}: expected {fault}, got {other:?}"),
        }
    }
}

#[test]
fn test_wrapping_arithmetic_agrees() {
    let run = assert_backends_agree(
        "MOV R0 2147483647\n\
         ADD R1 R0 1\n\
         SUB R2 R1 1\n\
         MOV R3 -2147483648\n\
         MOD R4 R3 -1\n\
         MOD R5 R3 10\n\
         MOV R6 4294967295\n\
         CALL SIM_PUT_PIXEL R1 R2 R4\n\
         CALL SIM_PUT_PIXEL R5 R6 R6\n",
        &[],
    );
    run.result.unwrap();
    assert_eq!(
        pixels(&run.events),
        [(i32::MIN, i32::MAX, 0), (-8, -1, -1)]
    );
}
