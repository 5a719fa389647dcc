// Praise the nom :) small combinators for each token shape, tried in a
// fixed priority order.
use nom::
{
	IResult,
	branch::alt,
	bytes::complete::{tag, take_while1},
	character::complete::{char as nchar, digit1, one_of},
	combinator::{map, map_res, opt, recognize, rest},
	sequence::{pair, preceded},
};

use crate::diagnostics::{Diagnostic, DiagnosticKind, Stage};
use crate::token::{Token, TokenKind};
use crate::types::{BinOp, CmpOp, Keyword};

pub struct LexResult
{
	pub tokens: Vec<Token>,
	pub diagnostics: Vec<Diagnostic>,
}

enum LexItem
{
	Skip,
	Emit(TokenKind),
}

// Tokenizes the whole source, one physical line at a time. On an
// unrecognized character, records a diagnostic, drops that single
// character, and resumes — the lexer never aborts.
pub fn tokenize(source: &str) -> LexResult
{
	let mut tokens = Vec::new();
	let mut diagnostics = Vec::new();

	// Tracks the most recently seen SIMPLE line-number token, used to
	// attribute diagnostics and ordinary tokens to a source line.
	let mut current_line: u32 = 1;

	for raw_line in source.split('\n')
	{
		let mut rest_of_line = raw_line;

		// Only the first non-whitespace token of a physical line is
		// eligible to be a line-number.
		let mut first_token_on_line = true;

		while !rest_of_line.is_empty()
		{
			match lex_step(rest_of_line, first_token_on_line)
			{
				Some((remaining, LexItem::Skip)) =>
				{
					rest_of_line = remaining;
				},

				Some((remaining, LexItem::Emit(kind))) =>
				{
					if let TokenKind::LineNumber(n) = kind
					{
						current_line = n;
					}

					tokens.push(Token::new(kind, current_line));
					rest_of_line = remaining;
					first_token_on_line = false;
				},

				None =>
				{
					let bad_char = rest_of_line.chars().next().expect("loop guard ensures non-empty");
					diagnostics.push(Diagnostic::new(Stage::Lexer, current_line, DiagnosticKind::InvalidCharacter(bad_char)));

					let mut chars = rest_of_line.chars();
					chars.next();
					rest_of_line = chars.as_str();
				},
			}
		}
	}

	tokens.push(Token::new(TokenKind::Eof, current_line));

	LexResult { tokens, diagnostics }
}

// Tries each pattern in a fixed priority order, first match wins.
fn lex_step(i: &str, first_token_on_line: bool) -> Option<(&str, LexItem)>
{
	if first_token_on_line
	{
		if let Ok((rest, n)) = line_number_token(i)
		{
			return Some((rest, LexItem::Emit(TokenKind::LineNumber(n))));
		}
	}

	if let Ok((rest, kw)) = keyword_token(i)
	{
		return Some((rest, LexItem::Emit(TokenKind::Keyword(kw))));
	}

	if let Ok((rest, _)) = comment_token(i)
	{
		return Some((rest, LexItem::Emit(TokenKind::Comment)));
	}

	if let Ok((rest, _)) = whitespace_token(i)
	{
		return Some((rest, LexItem::Skip));
	}

	if let Ok((rest, c)) = identifier_token(i)
	{
		return Some((rest, LexItem::Emit(TokenKind::Identifier(c))));
	}

	if let Ok((rest, n)) = number_token(i)
	{
		return Some((rest, LexItem::Emit(TokenKind::Number(n))));
	}

	if let Ok((rest, op)) = operator_token(i)
	{
		return Some((rest, LexItem::Emit(TokenKind::Operator(op))));
	}

	if let Ok((rest, cmp)) = comparison_token(i)
	{
		return Some((rest, LexItem::Emit(TokenKind::Comparison(cmp))));
	}

	if let Ok((rest, _)) = assign_token(i)
	{
		return Some((rest, LexItem::Emit(TokenKind::Assign)));
	}

	None
}

fn line_number_token(i: &str) -> IResult<&str, u32>
{
	map_res(digit1, |s: &str| s.parse::<u32>())(i)
}

fn keyword_token(i: &str) -> IResult<&str, Keyword>
{
	alt((
		map(tag("input"), |_| Keyword::Input),
		map(tag("let"), 	|_| Keyword::Let),
		map(tag("print"), |_| Keyword::Print),
		map(tag("goto"), 	|_| Keyword::Goto),
		map(tag("if"), 	|_| Keyword::If),
		map(tag("end"), 	|_| Keyword::End),
	))(i)
}

fn comment_token(i: &str) -> IResult<&str, ()>
{
	map(preceded(tag("rem"), rest), |_: &str| ())(i)
}

fn whitespace_token(i: &str) -> IResult<&str, ()>
{
	map(take_while1(|c: char| c.is_whitespace()), |_| ())(i)
}

fn identifier_token(i: &str) -> IResult<&str, char>
{
	one_of("abcdefghijklmnopqrstuvwxyz")(i)
}

// An optional '-' followed by one or more digits; this also swallows the
// unary-minus-as-part-of-the-literal case (there is no separate
// unary-minus grammar).
fn number_token(i: &str) -> IResult<&str, i32>
{
	map_res(recognize(pair(opt(nchar('-')), digit1)), |s: &str| s.parse::<i32>())(i)
}

fn operator_token(i: &str) -> IResult<&str, BinOp>
{
	map(one_of("+-*/%"), |c| BinOp::from_char(c).expect("one_of guarantees a valid operator char"))(i)
}

// Order matters: >=, <=, == and != must not be split into their prefixes,
// and the standalone '=' (assignment) is tried only after these.
fn comparison_token(i: &str) -> IResult<&str, CmpOp>
{
	alt((
		map(tag(">="), |_| CmpOp::Ge),
		map(tag(">"), 	|_| CmpOp::Gt),
		map(tag("<="), |_| CmpOp::Le),
		map(tag("<"), 	|_| CmpOp::Lt),
		map(tag("=="), |_| CmpOp::Eq),
		map(tag("!="), |_| CmpOp::Ne),
	))(i)
}

fn assign_token(i: &str) -> IResult<&str, ()>
{
	map(nchar('='), |_| ())(i)
}
