use std::fmt;

// Which stage raised a diagnostic. Kept as a plain struct with a
// `Display` impl rather than reaching for a derive-macro error crate.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Stage
{
	Lexer,
	Parser,
	Semantic,
	CodeGen,
}

impl fmt::Display for Stage
{
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result
	{
		match self
		{
			Stage::Lexer 	=> write!(f, "lexer"),
			Stage::Parser 	=> write!(f, "parser"),
			Stage::Semantic => write!(f, "semantic"),
			Stage::CodeGen 	=> write!(f, "codegen"),
		}
	}
}

// Every diagnosable condition, one variant per kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DiagnosticKind
{
	InvalidCharacter(char),
	UnexpectedToken(String),
	MissingEnd,
	LineOutOfOrder(u32),
	DuplicateLine(u32),
	UninitializedVariable(char),
	UnknownJumpTarget(u32),
	NonPositiveJumpTarget(i32),
	DivideByZero,
	AddressOverflow,
}

impl fmt::Display for DiagnosticKind
{
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result
	{
		match self
		{
			DiagnosticKind::InvalidCharacter(c) 		=> write!(f, "Invalid character '{:}'.", c),
			DiagnosticKind::UnexpectedToken(s) 			=> write!(f, "Unexpected token: {:}.", s),
			DiagnosticKind::MissingEnd 					=> write!(f, "\"end\" expected."),
			DiagnosticKind::LineOutOfOrder(n) 			=> write!(f, "Line number {:} is out of order.", n),
			DiagnosticKind::DuplicateLine(n) 			=> write!(f, "Line number {:} is a duplicate.", n),
			DiagnosticKind::UninitializedVariable(c) 	=> write!(f, "Variable '{:}' is used before it is initialized.", c),
			DiagnosticKind::UnknownJumpTarget(n) 		=> write!(f, "Line {:} does not exist.", n),
			DiagnosticKind::NonPositiveJumpTarget(n) 	=> write!(f, "Jump target {:} is not a positive line number.", n),
			DiagnosticKind::DivideByZero 				=> write!(f, "Division by the literal 0."),
			DiagnosticKind::AddressOverflow 			=> write!(f, "The maximum number of SML words ({:}) is exceeded.", crate::types::MAX_BUFFER_WORDS),
		}
	}
}

// One diagnostic entry: stage, kind, offending source line. The human
// message is derived from `kind`'s own `Display` impl on demand, not
// stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic
{
	pub stage: Stage,
	pub kind: DiagnosticKind,
	pub line: u32,
}

impl Diagnostic
{
	pub fn new(stage: Stage, line: u32, kind: DiagnosticKind) -> Diagnostic
	{
		Diagnostic { stage, kind, line }
	}
}

impl fmt::Display for Diagnostic
{
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result
	{
		write!(f, "[Line {:}] {:} error: {:}", self.line, self.stage, self.kind)
	}
}
