//! End-to-end tests: program text is parsed, lowered, JIT-compiled and run
//! against a recording simulator.

#![cfg(feature = "jit")]

use inkwell::context::Context;
use simasm::jit::JitProgram;
use simasm::test_harness::*;
use simasm::{CompileOptions, Error, Fault, HostStats, parse_source};

fn small_stack(words: u32) -> CompileOptions {
    CompileOptions { stack_size: words }
}

#[test]
fn test_put_pixel_then_flush() {
    let run = run_jit(
        "MOV R0,5\n\
         MOV R1,3\n\
         SUB R2,R0,R1\n\
         CALL SIM_PUT_PIXEL R2,R2,R2\n\
         CALL SIM_FLUSH\n\
         EXIT\n",
    );
    let stats = run.result.expect("run");
    assert_eq!(
        stats,
        HostStats {
            pixels: 1,
            rand_calls: 0,
            flushes: 1
        }
    );
    assert_eq!(
        run.events,
        [
            HostEvent::Init,
            HostEvent::PutPixel {
                x: 2,
                y: 2,
                argb: 2
            },
            HostEvent::Flush,
            HostEvent::Exit,
        ]
    );
}

#[test]
fn test_br_if_on_unwritten_register_falls_through() {
    let run = run_jit(
        "MOV R1 9\n\
         loop: CALL SIM_PUT_PIXEL R1 R1 R1\n\
         BR_IF R0 loop\n\
         CALL SIM_FLUSH\n",
    );
    run.result.expect("run");
    assert_eq!(pixels(&run.events), [(9, 9, 9)]);
    assert_eq!(flushes(&run.events), 1);
}

#[test]
fn test_counting_loop() {
    let run = run_jit(
        "MOV R0 0\n\
         MOV R1 5\n\
         loop:\n\
           CALL SIM_PUT_PIXEL R0 R0 R0\n\
           ADD R0 R0 1\n\
           CMP R2 R0 R1\n\
           BR_IF R2 loop\n\
         CALL SIM_FLUSH\n",
    );
    run.result.expect("run");
    let expected: Vec<_> = (0..5).map(|i| (i, i, i)).collect();
    assert_eq!(pixels(&run.events), expected);
}

#[test]
fn test_nested_calls_resume_after_call_site() {
    let run = run_jit(
        "CALL outer\n\
         MOV R2 3\n\
         CALL SIM_PUT_PIXEL R0 R1 R2\n\
         EXIT\n\
         outer: MOV R0 1\n\
         CALL inner\n\
         ADD R0 R0 10\n\
         RET\n\
         inner: MOV R1 2\n\
         RET\n",
    );
    run.result.expect("run");
    assert_eq!(pixels(&run.events), [(11, 2, 3)]);
}

#[test]
fn test_call_as_last_instruction_returns_to_exit() {
    let run = run_jit(
        "BR start\n\
         f: CALL SIM_FLUSH\n\
         RET\n\
         start: CALL f\n",
    );
    run.result.expect("run");
    assert_eq!(flushes(&run.events), 1);
}

#[test]
fn test_label_past_end_exits() {
    let run = run_jit("BR end\nCALL SIM_FLUSH\nend:\n");
    run.result.expect("run");
    assert_eq!(flushes(&run.events), 0);
}

#[test]
fn test_exit_stops_execution() {
    let run = run_jit("EXIT\nCALL SIM_FLUSH\n");
    run.result.expect("run");
    assert_eq!(run.events, [HostEvent::Init, HostEvent::Exit]);
}

#[test]
fn test_empty_program_runs() {
    let run = run_jit("; nothing here\n\n");
    assert_eq!(run.result.expect("run"), HostStats::default());
    assert_eq!(run.events, [HostEvent::Init, HostEvent::Exit]);
}

#[test]
fn test_rand_result_lands_in_register() {
    let run = run_jit_with(
        "CALL SIM_RAND R3\n\
         CALL SIM_RAND R4\n\
         CALL SIM_PUT_PIXEL R3 R4 R3\n",
        &CompileOptions::default(),
        RecordingSimulator::with_rand([7, 123]),
    );
    assert_eq!(run.result.expect("run").rand_calls, 2);
    assert_eq!(pixels(&run.events), [(7, 123, 7)]);
}

#[test]
fn test_push_pop_swaps_registers() {
    let run = run_jit(
        "MOV R0 1\n\
         MOV R1 2\n\
         PUSH R0\n\
         PUSH R1\n\
         POP R0\n\
         POP R1\n\
         CALL SIM_PUT_PIXEL R0 R1 R0\n\
         PUSH SP\n\
         POP R2\n\
         CALL SIM_PUT_PIXEL R2 R2 R2\n",
    );
    run.result.expect("run");
    assert_eq!(pixels(&run.events), [(2, 1, 2), (1023, 1023, 1023)]);
}

#[test]
fn test_push_overflows_on_full_stack() {
    let run = run_jit_with(
        "PUSH R0\n\
         PUSH R0\n\
         PUSH R0\n\
         PUSH R0\n\
         CALL SIM_FLUSH\n\
         PUSH R0\n\
         CALL SIM_FLUSH\n",
        &small_stack(4),
        RecordingSimulator::new(),
    );
    assert!(
        matches!(run.result, Err(Error::Fault(Fault::StackOverflow))),
        "{:?}",
        run.result
    );
    assert_eq!(
        run.events,
        [HostEvent::Init, HostEvent::Flush, HostEvent::Exit]
    );
}

#[test]
fn test_unbounded_recursion_overflows() {
    let run = run_jit_with("f: CALL f\n", &small_stack(16), RecordingSimulator::new());
    assert!(matches!(
        run.result,
        Err(Error::Fault(Fault::StackOverflow))
    ));
}

#[test]
fn test_pop_and_ret_on_empty_stack_underflow() {
    for source in ["POP R0\n", "RET\n", "PUSH R0\nPOP R0\nPOP R0\n"] {
        let run = run_jit(source);
        assert!(
            matches!(run.result, Err(Error::Fault(Fault::StackUnderflow))),
            "{source}: {:?}",
            run.result
        );
        assert_eq!(run.events.last(), Some(&HostEvent::Exit));
    }
}

#[test]
fn test_ret_to_unknown_address_faults() {
    let run = run_jit("MOV R0 999\nPUSH R0\nRET\n");
    assert!(matches!(
        run.result,
        Err(Error::Fault(Fault::BadReturnAddress))
    ));
}

#[test]
fn test_undefined_labels_fail_before_running() {
    for (source, line) in [
        ("MOV R0 1\nBR nowhere\n", 2),
        ("BR_IF R0 nowhere\n", 1),
        ("CALL SIM_FLUSH\nCALL SIM_FLUSH\nCALL nowhere\n", 3),
    ] {
        let run = run_jit(source);
        match run.result {
            Err(Error::UndefinedLabel { line: l, ref label }) => {
                assert_eq!(l, line, "{source}");
                assert_eq!(label, "nowhere");
            }
            ref other => panic!("{source}: expected undefined label, got {other:?}"),
        }
        assert!(run.events.is_empty(), "{source}: simulator was touched");
    }
}

#[test]
fn test_unknown_opcode_fails_before_running() {
    let run = run_jit("MOV R0 1\nJMP R0\n");
    assert!(matches!(
        run.result,
        Err(Error::UnknownOpcode { line: 2, .. })
    ));
    assert!(run.events.is_empty());
}

#[test]
fn test_compiled_program_starts_fresh_each_run() {
    let program = parse_source(
        "ADD R0 R0 1\n\
         PUSH R0\n\
         CALL SIM_PUT_PIXEL R0 R0 R0\n",
    )
    .unwrap();
    let context = Context::create();
    let jit = JitProgram::build(&context, &program, &CompileOptions::default()).unwrap();

    for _ in 0..2 {
        let sim = RecordingSimulator::new();
        jit.run(Box::new(sim.clone())).unwrap();
        assert_eq!(pixels(&sim.events()), [(1, 1, 1)]);
    }
}

#[test]
fn test_fault_does_not_poison_next_run() {
    let context = Context::create();
    let options = small_stack(1);
    let program = parse_source("PUSH R0\nPUSH R0\n").unwrap();
    let jit = JitProgram::build(&context, &program, &options).unwrap();

    let err = jit.run(Box::new(RecordingSimulator::new())).unwrap_err();
    assert!(matches!(err, Error::Fault(Fault::StackOverflow)));

    let ok = run_jit("CALL SIM_FLUSH\n");
    assert_eq!(ok.result.unwrap().flushes, 1);
}
