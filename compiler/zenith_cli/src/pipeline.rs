//! The compilation pipeline
//!
//! One compilation unit flows through the stages strictly in order; each
//! stage completes before the next begins. The pipeline stops at the first
//! stage that reports an error, or at the requested gate.

use clap::ValueEnum;
use log::{debug, info};
use zenith_cfg::{Cfg, CfgBuilder, InterferenceGraph, Liveness};
use zenith_codegen::{allocate, create_target, AllocationResult, MachineInst, VregAllocator};
use zenith_common::{Diagnostic, Diagnostics, Phase, Severity, Span};
use zenith_lexer::{Lexer, Token};
use zenith_parser::Parser;
use zenith_sema::ir::Stmt;
use zenith_sema::{Analyzer, Unit};

/// Pipeline stages, in execution order; used for gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum Stage {
    Lex,
    Parse,
    Semantic,
    Cfg,
    Select,
    Liveness,
    Interference,
    RegAlloc,
}

/// Options consumed by [`compile`]
#[derive(Debug, Clone)]
pub struct CompileOptions {
    pub source: String,
    /// Shown in diagnostics; not read from disk here.
    pub file_name: String,
    pub target: String,
    pub stop_after: Option<Stage>,
    pub verbose: bool,
}

impl CompileOptions {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            file_name: "<input>".to_string(),
            target: "z80".to_string(),
            stop_after: None,
            verbose: false,
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    pub fn stop_after(mut self, stage: Stage) -> Self {
        self.stop_after = Some(stage);
        self
    }
}

/// Everything the back end produced for one function
#[derive(Debug)]
pub struct FunctionCode {
    pub name: String,
    /// Statement-level CFG out of the builder.
    pub cfg: Cfg<Stmt>,
    /// Virtual-register machine code after selection.
    pub machine: Option<Cfg<MachineInst>>,
    pub liveness: Option<Liveness>,
    pub interference: Option<InterferenceGraph>,
    pub allocation: Option<AllocationResult>,
}

/// Aggregate result of a pipeline run
#[derive(Debug, Default)]
pub struct CompileOutput {
    pub file_name: String,
    pub tokens: Vec<Token>,
    pub unit: Option<Unit>,
    pub functions: Vec<FunctionCode>,
    /// One virtual-register arena per compilation, shared by selection and
    /// allocation across functions.
    pub vregs: Option<VregAllocator>,
    pub diagnostics: Diagnostics,
    pub success: bool,
}

impl CompileOutput {
    fn finish(mut self, reached_end: bool) -> Self {
        self.success = reached_end && !self.diagnostics.has_errors();
        self
    }
}

fn codegen_error(diagnostics: &mut Diagnostics, message: String) {
    diagnostics.add(Diagnostic {
        phase: Phase::Codegen,
        severity: Severity::Error,
        message,
        span: Span::empty(),
        help: None,
    });
}

/// Run the full pipeline over one source text.
pub fn compile(options: &CompileOptions) -> CompileOutput {
    let gate = |stage: Stage| options.stop_after == Some(stage);

    let mut output = CompileOutput {
        file_name: options.file_name.clone(),
        ..CompileOutput::default()
    };

    // Lexical analysis.
    info!("lexing {}", options.file_name);
    let mut lexer = Lexer::new(&options.source, 0);
    output.tokens = lexer.tokenize();
    output.diagnostics.extend(lexer.take_diagnostics());
    if output.diagnostics.has_errors() || gate(Stage::Lex) {
        return output.finish(gate(Stage::Lex));
    }
    debug!("{} tokens", output.tokens.len());

    // Parsing.
    info!("parsing {}", options.file_name);
    let mut parser = Parser::new(output.tokens.clone());
    let program = parser.parse_program();
    output.diagnostics.extend(parser.take_diagnostics());
    if output.diagnostics.has_errors() || gate(Stage::Parse) {
        return output.finish(gate(Stage::Parse));
    }
    debug!("{} top-level declarations", program.decls.len());

    // Semantic analysis.
    info!("analyzing {}", options.file_name);
    let (unit, semantic_diagnostics) = Analyzer::new().analyze(&program);
    output.diagnostics.extend(semantic_diagnostics);
    if output.diagnostics.has_errors() || gate(Stage::Semantic) {
        output.unit = Some(unit);
        return output.finish(gate(Stage::Semantic));
    }

    // CFG construction, per function.
    for func in unit.functions() {
        output.functions.push(FunctionCode {
            name: func.name.clone(),
            cfg: CfgBuilder::build(func),
            machine: None,
            liveness: None,
            interference: None,
            allocation: None,
        });
    }
    if gate(Stage::Cfg) {
        output.unit = Some(unit);
        return output.finish(true);
    }

    // Instruction selection.
    let target = match create_target(&options.target) {
        Ok(target) => target,
        Err(err) => {
            codegen_error(&mut output.diagnostics, err.to_string());
            output.unit = Some(unit);
            return output.finish(false);
        }
    };
    info!("selecting for target '{}'", target.name());

    let mut vregs = VregAllocator::new();
    for code in &mut output.functions {
        let func = unit.function(&code.name).expect("function unchanged");
        match target.select_function(&unit, func, &mut vregs) {
            Ok(machine) => code.machine = Some(machine),
            Err(err) => codegen_error(&mut output.diagnostics, err.to_string()),
        }
    }
    if output.diagnostics.has_errors() || gate(Stage::Select) {
        output.unit = Some(unit);
        output.vregs = Some(vregs);
        return output.finish(gate(Stage::Select));
    }

    // Liveness over the selected code.
    for code in &mut output.functions {
        let machine = code.machine.as_ref().expect("selection succeeded");
        code.liveness = Some(Liveness::compute(machine));
    }
    if gate(Stage::Liveness) {
        output.unit = Some(unit);
        output.vregs = Some(vregs);
        return output.finish(true);
    }

    // Interference graphs.
    for code in &mut output.functions {
        let machine = code.machine.as_ref().expect("selection succeeded");
        let liveness = code.liveness.as_ref().expect("liveness computed");
        code.interference = Some(InterferenceGraph::build(machine, liveness));
    }
    if gate(Stage::Interference) {
        output.unit = Some(unit);
        output.vregs = Some(vregs);
        return output.finish(true);
    }

    // Register allocation.
    let set = target.calling_convention().register_set();
    for code in &mut output.functions {
        let machine = code.machine.as_mut().expect("selection succeeded");
        match allocate(machine, &mut vregs, set) {
            Ok(result) => {
                // Spill rewriting changes the instruction stream; refresh
                // the dependent analyses.
                let liveness = Liveness::compute(machine);
                code.interference = Some(InterferenceGraph::build(machine, &liveness));
                code.liveness = Some(liveness);
                code.allocation = Some(result);
            }
            Err(err) => codegen_error(&mut output.diagnostics, err.to_string()),
        }
    }

    output.unit = Some(unit);
    output.vregs = Some(vregs);
    output.finish(true)
}
