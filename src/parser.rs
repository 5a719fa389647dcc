// Pure shape validator: walks its own cursor over the token stream and
// never builds a tree (accept/reject plus diagnostics) even though the
// grammar here is driven by hand instead of nom, since recovery needs to
// resync on arbitrary tokens rather than just fail a combinator.
use crate::diagnostics::{Diagnostic, DiagnosticKind, Stage};
use crate::token::{Token, TokenKind};
use crate::types::Keyword;

pub struct ParseResult
{
	pub diagnostics: Vec<Diagnostic>,
	pub had_errors: bool,
}

pub fn parse(tokens: &[Token]) -> ParseResult
{
	let mut cur = Cursor::new(tokens);
	let mut diagnostics = Vec::new();
	let mut last_line: u32 = 0;

	while !matches!(cur.peek().kind, TokenKind::Eof | TokenKind::Keyword(Keyword::End))
	{
		match cur.peek().kind.clone()
		{
			TokenKind::LineNumber(n) =>
			{
				last_line = n;
				cur.advance();
				parse_stmt_body(&mut cur, &mut diagnostics);
			},

			_ =>
			{
				unexpected(&mut cur, &mut diagnostics);
			},
		}
	}

	if matches!(cur.peek().kind, TokenKind::Eof)
	{
		diagnostics.push(Diagnostic::new(Stage::Parser, last_line, DiagnosticKind::MissingEnd));
	}
	else
	{
		cur.advance(); // consume 'end'
	}

	let had_errors = !diagnostics.is_empty();
	ParseResult { diagnostics, had_errors }
}

struct Cursor<'a>
{
	tokens: &'a [Token],
	pos: usize,
}

impl<'a> Cursor<'a>
{
	fn new(tokens: &'a [Token]) -> Cursor<'a>
	{
		Cursor { tokens, pos: 0 }
	}

	fn peek(&self) -> &Token
	{
		&self.tokens[self.pos.min(self.tokens.len() - 1)]
	}

	fn at_eof(&self) -> bool
	{
		matches!(self.peek().kind, TokenKind::Eof)
	}

	// Recovery advances exactly one token; once the stream is at Eof it
	// simply stops moving.
	fn advance(&mut self)
	{
		if !self.at_eof()
		{
			self.pos += 1;
		}
	}
}

fn unexpected(cur: &mut Cursor, diagnostics: &mut Vec<Diagnostic>)
{
	let tok = cur.peek().clone();
	diagnostics.push(Diagnostic::new(Stage::Parser, tok.line, DiagnosticKind::UnexpectedToken(tok.kind.to_string())));
	cur.advance();
}

fn parse_stmt_body(cur: &mut Cursor, diagnostics: &mut Vec<Diagnostic>)
{
	match cur.peek().kind.clone()
	{
		TokenKind::Keyword(Keyword::Input) =>
		{
			cur.advance();
			expect_identifier(cur, diagnostics);
		},

		TokenKind::Keyword(Keyword::Let) =>
		{
			cur.advance();
			expect_identifier(cur, diagnostics);

			if matches!(cur.peek().kind, TokenKind::Assign)
			{
				cur.advance();
				parse_expr(cur, diagnostics);
			}
			// A `let` without '=' does not abort the statement: the
			// assignment clause simply does not execute.
		},

		TokenKind::Keyword(Keyword::Print) =>
		{
			cur.advance();
			expect_identifier(cur, diagnostics);
		},

		TokenKind::Keyword(Keyword::If) =>
		{
			cur.advance();
			parse_expr(cur, diagnostics);
			expect_comparison(cur, diagnostics);
			parse_expr(cur, diagnostics);
			expect_keyword(cur, Keyword::Goto, diagnostics);
			expect_number(cur, diagnostics);
		},

		TokenKind::Keyword(Keyword::Goto) =>
		{
			cur.advance();
			expect_number(cur, diagnostics);
		},

		TokenKind::Comment =>
		{
			cur.advance();
		},

		_ => unexpected(cur, diagnostics),
	}
}

fn parse_expr(cur: &mut Cursor, diagnostics: &mut Vec<Diagnostic>)
{
	parse_factor(cur, diagnostics);

	if matches!(cur.peek().kind, TokenKind::Operator(_))
	{
		cur.advance();
		parse_factor(cur, diagnostics);
	}
}

fn parse_factor(cur: &mut Cursor, diagnostics: &mut Vec<Diagnostic>)
{
	match cur.peek().kind
	{
		TokenKind::Identifier(_) | TokenKind::Number(_) => cur.advance(),
		_ => unexpected(cur, diagnostics),
	}
}

fn expect_identifier(cur: &mut Cursor, diagnostics: &mut Vec<Diagnostic>)
{
	match cur.peek().kind
	{
		TokenKind::Identifier(_) => cur.advance(),
		_ => unexpected(cur, diagnostics),
	}
}

fn expect_number(cur: &mut Cursor, diagnostics: &mut Vec<Diagnostic>)
{
	match cur.peek().kind
	{
		TokenKind::Number(_) => cur.advance(),
		_ => unexpected(cur, diagnostics),
	}
}

fn expect_comparison(cur: &mut Cursor, diagnostics: &mut Vec<Diagnostic>)
{
	match cur.peek().kind
	{
		TokenKind::Comparison(_) => cur.advance(),
		_ => unexpected(cur, diagnostics),
	}
}

fn expect_keyword(cur: &mut Cursor, keyword: Keyword, diagnostics: &mut Vec<Diagnostic>)
{
	match cur.peek().kind
	{
		TokenKind::Keyword(k) if k == keyword => cur.advance(),
		_ => unexpected(cur, diagnostics),
	}
}
