//! Execution driver: lowers a program, links it against the host bridge and
//! runs it through LLVM's MCJIT.

use inkwell::OptimizationLevel;
use inkwell::context::Context;
use inkwell::execution_engine::{ExecutionEngine, JitFunction};
use inkwell::module::Module;
use inkwell::targets::{InitializationConfig, Target};

use crate::host::{HostFn, HostStats, Session, Simulator};
use crate::isa::Program;
use crate::llvm_frontend::{ENTRY_SYMBOL, translate_program};
use crate::{CompileOptions, Error, Result, parse_source};

type EntryFn = unsafe extern "C" fn();

/// A lowered, verified and linked program ready to run.
pub struct JitProgram<'ctx> {
    entry: JitFunction<'ctx, EntryFn>,
    _engine: ExecutionEngine<'ctx>,
    module: Module<'ctx>,
}

impl<'ctx> JitProgram<'ctx> {
    /// Lower `program`, create the execution engine and bind every external
    /// symbol the module declares.
    ///
    /// Fails without running anything on undefined labels, verification
    /// failures and unresolved symbols.
    pub fn build(
        context: &'ctx Context,
        program: &Program,
        options: &CompileOptions,
    ) -> Result<Self> {
        let module = translate_program(context, program, options)?;

        Target::initialize_native(&InitializationConfig::default()).map_err(Error::Jit)?;
        let engine = module
            .create_jit_execution_engine(OptimizationLevel::None)
            .map_err(|e| Error::Jit(e.to_string()))?;

        bind_host_symbols(&module, &engine)?;
        let entry = lookup_entry(&engine)?;

        Ok(Self {
            entry,
            _engine: engine,
            module,
        })
    }

    /// Textual LLVM IR of the linked module.
    #[must_use]
    pub fn ir(&self) -> String {
        self.module.print_to_string().to_string()
    }

    /// Run the program against `simulator`.
    ///
    /// Calls [`Simulator::init`] before the first instruction and
    /// [`Simulator::exit`] after the program returned, whether or not it
    /// aborted. A stack fault is reported as [`Error::Fault`].
    pub fn run(&self, simulator: Box<dyn Simulator>) -> Result<HostStats> {
        let session = Session::begin(simulator)?;
        session.init();
        self.call_entry();
        let (stats, fault) = session.finish();

        match fault {
            Some(fault) => {
                tracing::debug!(%fault, "program faulted");
                Err(Error::Fault(fault))
            }
            None => Ok(stats),
        }
    }

    #[allow(unsafe_code)]
    fn call_entry(&self) {
        // SAFETY: the entry is the generated `void ()` function. Its stack
        // accesses are bounds checked in IR and its only external calls go to
        // the trampolines bound in `bind_host_symbols`.
        unsafe { self.entry.call() }
    }
}

/// Map every declaration in `module` to its host trampoline.
///
/// LLVM intrinsics (the entry block's `llvm.memset`) are resolved by the
/// engine itself and skipped. Other declarations are checked against the [`HostFn`] table before any code is
/// generated, so a missing symbol is reported here and not at first call.
fn bind_host_symbols<'ctx>(module: &Module<'ctx>, engine: &ExecutionEngine<'ctx>) -> Result<()> {
    for function in module.get_functions() {
        if function.count_basic_blocks() > 0 || function.get_intrinsic_id() != 0 {
            continue;
        }
        let name = function.get_name().to_string_lossy();
        let host = HostFn::from_symbol(&name)
            .ok_or_else(|| Error::UnresolvedSymbol(name.to_string()))?;
        engine.add_global_mapping(&function, host.address());
        tracing::debug!(symbol = host.symbol(), "bound host symbol");
    }
    Ok(())
}

#[allow(unsafe_code)]
fn lookup_entry<'ctx>(engine: &ExecutionEngine<'ctx>) -> Result<JitFunction<'ctx, EntryFn>> {
    // SAFETY: ENTRY_SYMBOL is always declared with type `void ()`.
    unsafe { engine.get_function::<EntryFn>(ENTRY_SYMBOL) }
        .map_err(|e| Error::Jit(format!("entry `{ENTRY_SYMBOL}`: {e}")))
}

/// Textual LLVM IR of a parsed program, without running it.
pub fn program_ir(program: &Program, options: &CompileOptions) -> Result<String> {
    let context = Context::create();
    let module = translate_program(&context, program, options)?;
    Ok(module.print_to_string().to_string())
}

/// Lower program text and return its LLVM IR without running it.
pub fn emit_llvm(source: &str, options: &CompileOptions) -> Result<String> {
    program_ir(&parse_source(source)?, options)
}

/// Build a parsed program in a fresh context and run it once.
pub fn run_program(
    program: &Program,
    options: &CompileOptions,
    simulator: Box<dyn Simulator>,
) -> Result<HostStats> {
    let context = Context::create();
    let jit = JitProgram::build(&context, program, options)?;
    jit.run(simulator)
}

/// Compile and run program text in one go.
pub fn run_source(
    source: &str,
    options: &CompileOptions,
    simulator: Box<dyn Simulator>,
) -> Result<HostStats> {
    run_program(&parse_source(source)?, options, simulator)
}
