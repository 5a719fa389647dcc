// Basic types (words, operand slots, opcodes, ...) used everywhere:
pub mod types;

// A single lexed token and its kind:
pub mod token;

// Diagnostics shared by every stage:
pub mod diagnostics;

// The four pipeline stages, each consuming its own copy of the token stream:
pub mod lexer;
pub mod parser;
pub mod semantic;
pub mod codegen;

use std::collections::HashMap;

use token::Token;
use types::SmlWord;
pub use diagnostics::{Diagnostic, DiagnosticKind, Stage};

/// Recognized host options.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Config
{
	/// When set, `compile` returns a `DebugDump` alongside the normal output.
	pub debug: bool,

	/// When set, code generation still runs even if the lexer, parser or
	/// semantic analyzer reported errors. The host is responsible for
	/// labeling such output as untrustworthy.
	pub compile_despite_errors: bool,
}

/// Supplementary dumps for a `debug` compilation: the raw token list, and
/// the constant pool / variable table as they stood before address
/// resolution. This crate only hands back the data — formatting it for
/// display is a host concern, not this crate's.
#[derive(Clone, Debug)]
pub struct DebugDump
{
	pub tokens: Vec<Token>,
	pub constants_before_resolution: Vec<i32>,
	pub variables_before_resolution: Vec<char>,
}

/// Everything a caller gets back from one compilation.
#[derive(Clone, Debug)]
pub struct CompileOutput
{
	pub words: Vec<SmlWord>,
	pub diagnostics: Vec<Diagnostic>,
	pub had_errors: bool,
	pub variables: Vec<(char, u8)>,
	pub constants: Vec<(i32, u8)>,
	pub line_equivalence: HashMap<u32, usize>,
	pub debug: Option<DebugDump>,
}

/// Runs the full pipeline over `source` and returns a structured result.
/// Never panics on malformed SIMPLE input — every stage degrades to
/// diagnostics plus best-effort recovery rather than aborting.
pub fn compile(source: &str, config: &Config) -> CompileOutput
{
	let lexed = lexer::tokenize(source);
	let parsed = parser::parse(&lexed.tokens);
	let analyzed = semantic::analyze(&lexed.tokens);

	let mut diagnostics = Vec::new();
	diagnostics.extend(lexed.diagnostics.iter().cloned());
	diagnostics.extend(parsed.diagnostics);
	diagnostics.extend(analyzed.diagnostics);

	let should_run_codegen = diagnostics.is_empty() || config.compile_despite_errors;

	let (words, variables, constants, line_equivalence) = if should_run_codegen
	{
		let generated = codegen::generate(&lexed.tokens);
		diagnostics.extend(generated.diagnostics);
		(generated.words, generated.variables, generated.constants, generated.line_equivalence)
	}
	else
	{
		(Vec::new(), Vec::new(), Vec::new(), HashMap::new())
	};

	let debug = if config.debug
	{
		Some(DebugDump
		{
			tokens: lexed.tokens,
			constants_before_resolution: constants.iter().map(|(v, _)| *v).collect(),
			variables_before_resolution: variables.iter().map(|(c, _)| *c).collect(),
		})
	}
	else
	{
		None
	};

	let had_errors = !diagnostics.is_empty();

	CompileOutput { words, diagnostics, had_errors, variables, constants, line_equivalence, debug }
}
