// Independent second pass over the same token stream: shares no state
// with the parser, and re-derives everything it needs (symbol table,
// valid-line set) from scratch.
use std::collections::HashSet;

use crate::diagnostics::{Diagnostic, DiagnosticKind, Stage};
use crate::token::{Token, TokenKind};
use crate::types::{BinOp, Keyword};

pub struct SemanticResult
{
	pub diagnostics: Vec<Diagnostic>,
	pub had_errors: bool,
}

enum Factor
{
	Number(i32),
	Variable(char),
}

pub fn analyze(tokens: &[Token]) -> SemanticResult
{
	let valid_lines = collect_valid_lines(tokens);

	let mut a = Analyzer
	{
		tokens,
		pos: 0,
		symbols: Vec::new(),
		seen_lines: HashSet::new(),
		valid_lines,
		last_line: 0,
		diagnostics: Vec::new(),
	};

	a.run();

	let had_errors = !a.diagnostics.is_empty();
	SemanticResult { diagnostics: a.diagnostics, had_errors }
}

fn collect_valid_lines(tokens: &[Token]) -> HashSet<u32>
{
	let mut valid_lines = HashSet::new();

	for t in tokens
	{
		if let TokenKind::LineNumber(n) = t.kind
		{
			valid_lines.insert(n);
		}
	}

	valid_lines
}

struct Analyzer<'a>
{
	tokens: &'a [Token],
	pos: usize,
	symbols: Vec<char>,
	seen_lines: HashSet<u32>,
	valid_lines: HashSet<u32>,
	last_line: u32,
	diagnostics: Vec<Diagnostic>,
}

impl<'a> Analyzer<'a>
{
	fn peek(&self) -> &Token
	{
		&self.tokens[self.pos.min(self.tokens.len() - 1)]
	}

	fn at_eof(&self) -> bool
	{
		matches!(self.peek().kind, TokenKind::Eof)
	}

	fn advance(&mut self)
	{
		if !self.at_eof()
		{
			self.pos += 1;
		}
	}

	fn run(&mut self)
	{
		while !matches!(self.peek().kind, TokenKind::Eof | TokenKind::Keyword(Keyword::End))
		{
			match self.peek().kind.clone()
			{
				TokenKind::LineNumber(n) =>
				{
					self.check_label_order(n);
					self.advance();
					self.analyze_stmt_body(n);
				},

				// Shape errors are the parser's exclusive responsibility;
				// the analyzer just resyncs and moves on.
				_ => self.advance(),
			}
		}
	}

	fn check_label_order(&mut self, n: u32)
	{
		// Independent checks: a non-adjacent duplicate (e.g. a repeated
		// label arriving after other labels in between) is both out of
		// order relative to the immediately-preceding label and a repeat
		// of an earlier one, so both diagnostics can fire together.
		if n < self.last_line
		{
			self.diagnostics.push(Diagnostic::new(Stage::Semantic, n, DiagnosticKind::LineOutOfOrder(n)));
		}

		if self.seen_lines.contains(&n)
		{
			self.diagnostics.push(Diagnostic::new(Stage::Semantic, n, DiagnosticKind::DuplicateLine(n)));
		}

		self.seen_lines.insert(n);
		self.last_line = n;
	}

	fn analyze_stmt_body(&mut self, line: u32)
	{
		match self.peek().kind.clone()
		{
			TokenKind::Keyword(Keyword::Input) =>
			{
				self.advance();

				if let TokenKind::Identifier(c) = self.peek().kind
				{
					self.advance();
					self.introduce(c);
				}
			},

			TokenKind::Keyword(Keyword::Let) =>
			{
				self.advance();

				let lhs = if let TokenKind::Identifier(c) = self.peek().kind
				{
					self.advance();
					Some(c)
				}
				else
				{
					None
				};

				if matches!(self.peek().kind, TokenKind::Assign)
				{
					self.advance();
					self.analyze_expr(line);
				}

				// The left-hand variable enters the symbol table only
				// after the right-hand side has been checked, so a
				// self-reference to an uninitialized `v` in `let v = v`
				// is caught as an ordinary uninitialized-variable use.
				if let Some(c) = lhs
				{
					self.introduce(c);
				}
			},

			TokenKind::Keyword(Keyword::Print) =>
			{
				self.advance();

				if let TokenKind::Identifier(c) = self.peek().kind
				{
					self.advance();
					self.check_initialized(c, line);
				}
			},

			TokenKind::Keyword(Keyword::If) =>
			{
				self.advance();
				self.analyze_expr(line);

				if matches!(self.peek().kind, TokenKind::Comparison(_))
				{
					self.advance();
				}

				self.analyze_expr(line);

				if matches!(self.peek().kind, TokenKind::Keyword(Keyword::Goto))
				{
					self.advance();
				}

				self.check_jump_target(line);
			},

			TokenKind::Keyword(Keyword::Goto) =>
			{
				self.advance();
				self.check_jump_target(line);
			},

			TokenKind::Comment => self.advance(),

			_ => self.advance(),
		}
	}

	fn analyze_expr(&mut self, line: u32)
	{
		self.analyze_factor(line);

		if let TokenKind::Operator(op) = self.peek().kind
		{
			self.advance();
			let rhs = self.analyze_factor(line);

			if op == BinOp::Div
			{
				if let Some(Factor::Number(0)) = rhs
				{
					self.diagnostics.push(Diagnostic::new(Stage::Semantic, line, DiagnosticKind::DivideByZero));
				}
			}
		}
	}

	fn analyze_factor(&mut self, line: u32) -> Option<Factor>
	{
		match self.peek().kind
		{
			TokenKind::Identifier(c) =>
			{
				self.advance();
				self.check_initialized(c, line);
				Some(Factor::Variable(c))
			},

			TokenKind::Number(n) =>
			{
				self.advance();
				Some(Factor::Number(n))
			},

			_ => None,
		}
	}

	fn check_jump_target(&mut self, line: u32)
	{
		if let TokenKind::Number(n) = self.peek().kind
		{
			self.advance();

			if n <= 0
			{
				self.diagnostics.push(Diagnostic::new(Stage::Semantic, line, DiagnosticKind::NonPositiveJumpTarget(n)));
			}
			else if !self.valid_lines.contains(&(n as u32))
			{
				self.diagnostics.push(Diagnostic::new(Stage::Semantic, line, DiagnosticKind::UnknownJumpTarget(n as u32)));
			}
		}
	}

	fn check_initialized(&mut self, c: char, line: u32)
	{
		if !self.symbols.contains(&c)
		{
			self.diagnostics.push(Diagnostic::new(Stage::Semantic, line, DiagnosticKind::UninitializedVariable(c)));
		}
	}

	fn introduce(&mut self, c: char)
	{
		if !self.symbols.contains(&c)
		{
			self.symbols.push(c);
		}
	}
}

#[cfg(test)]
mod tests
{
	use super::*;
	use crate::lexer::tokenize;

	fn analyze_source(source: &str) -> SemanticResult
	{
		analyze(&tokenize(source).tokens)
	}

	#[test]
	fn well_formed_program_has_no_diagnostics()
	{
		let r = analyze_source("10 input a\n20 let b = a + 5\n30 print b\n99 end");
		assert!(!r.had_errors);
	}

	#[test]
	fn uninitialized_variable_use_is_reported()
	{
		let r = analyze_source("10 print q\n20 end");
		assert_eq!(r.diagnostics.len(), 1);
		assert_eq!(r.diagnostics[0].kind, DiagnosticKind::UninitializedVariable('q'));
		assert_eq!(r.diagnostics[0].line, 10);
	}

	#[test]
	fn unknown_jump_target_is_reported()
	{
		let r = analyze_source("10 goto 99\n20 end");
		assert_eq!(r.diagnostics.len(), 1);
		assert_eq!(r.diagnostics[0].kind, DiagnosticKind::UnknownJumpTarget(99));
	}

	#[test]
	fn non_positive_jump_target_is_reported()
	{
		let r = analyze_source("10 goto -5\n20 end");
		assert_eq!(r.diagnostics.len(), 1);
		assert_eq!(r.diagnostics[0].kind, DiagnosticKind::NonPositiveJumpTarget(-5));
	}

	#[test]
	fn duplicate_label_is_reported()
	{
		let r = analyze_source("10 input a\n10 print a\n20 end");
		assert_eq!(r.diagnostics.len(), 1);
		assert_eq!(r.diagnostics[0].kind, DiagnosticKind::DuplicateLine(10));
	}

	#[test]
	fn out_of_order_label_is_reported()
	{
		let r = analyze_source("20 input a\n10 print a\n30 end");
		assert!(r.diagnostics.iter().any(|d| d.kind == DiagnosticKind::LineOutOfOrder(10)));
	}

	#[test]
	fn non_adjacent_duplicate_is_also_out_of_order()
	{
		// The second '10' repeats an earlier label (duplicate) *and* comes
		// after '20' (out of order) — both diagnostics must fire.
		let r = analyze_source("10 input a\n20 input b\n10 print a\n30 end");
		assert_eq!(r.diagnostics.len(), 2);
		assert!(r.diagnostics.iter().any(|d| d.kind == DiagnosticKind::LineOutOfOrder(10)));
		assert!(r.diagnostics.iter().any(|d| d.kind == DiagnosticKind::DuplicateLine(10)));
	}

	#[test]
	fn divide_by_zero_literal_is_reported()
	{
		let r = analyze_source("10 input a\n20 let b = a / 0\n99 end");
		assert_eq!(r.diagnostics.len(), 1);
		assert_eq!(r.diagnostics[0].kind, DiagnosticKind::DivideByZero);
		assert_eq!(r.diagnostics[0].line, 20);
	}

	#[test]
	fn self_referential_let_on_uninitialized_variable_is_rejected()
	{
		let r = analyze_source("10 let v = v\n20 end");
		assert_eq!(r.diagnostics.len(), 1);
		assert_eq!(r.diagnostics[0].kind, DiagnosticKind::UninitializedVariable('v'));
	}

	#[test]
	fn identity_assignment_of_known_variable_is_fine()
	{
		let r = analyze_source("10 let u = 1\n20 let v = u\n30 end");
		assert!(!r.had_errors);
	}
}
