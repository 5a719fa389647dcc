// The biggest stage: walks its own cursor over the token stream (same
// independent-pass discipline as parser.rs/semantic.rs) emitting symbolic
// operand slots, then back-patches them into real addresses once the
// code section's length is known.
use std::collections::{HashMap, HashSet};

use crate::diagnostics::{Diagnostic, DiagnosticKind, Stage};
use crate::token::{Token, TokenKind};
use crate::types::{opcode, BinOp, CmpOp, Keyword, OperandSlot, SmlWord, MAX_BUFFER_WORDS, UNINITIALIZED_SENTINEL};

pub struct CodeGenResult
{
	pub words: Vec<SmlWord>,
	pub diagnostics: Vec<Diagnostic>,
	pub had_errors: bool,
	pub variables: Vec<(char, u8)>,
	pub constants: Vec<(i32, u8)>,
	pub line_equivalence: HashMap<u32, usize>,
}

pub fn generate(tokens: &[Token]) -> CodeGenResult
{
	let mut g = CodeGen::new(tokens);
	g.run();
	g.into_result()
}

// Every number that follows a `goto` keyword, gathered up front. A line
// number in this set may be entered from somewhere other than its textual
// predecessor, so the accumulator hint can't be trusted to carry across
// into it — unlike a straight-line fall-through, where it reflects exactly
// what real hardware would hold.
fn collect_jump_targets(tokens: &[Token]) -> HashSet<u32>
{
	let mut targets = HashSet::new();
	let mut iter = tokens.iter();

	while let Some(tok) = iter.next()
	{
		if matches!(tok.kind, TokenKind::Keyword(Keyword::Goto))
		{
			if let Some(next) = iter.clone().next()
			{
				if let TokenKind::Number(n) = next.kind
				{
					if n > 0
					{
						targets.insert(n as u32);
					}
				}
			}
		}
	}

	targets
}

enum BufferEntry
{
	Instr { opcode: u8, operand: OperandSlot },
	Data(i32),
}

// A hidden compiler-internal data slot, used only to hold one side of an
// `if` comparison steady in memory while the other side is evaluated —
// needed because the machine has a single accumulator and no stack. Not
// a valid SIMPLE identifier, so it can never collide with source names.
const TEMP_SLOT: char = '\u{0}';

struct VarTable
{
	order: Vec<char>,
	known: HashMap<char, Option<i32>>,
}

impl VarTable
{
	fn new() -> VarTable
	{
		VarTable { order: Vec::new(), known: HashMap::new() }
	}

	fn ensure(&mut self, c: char)
	{
		if !self.known.contains_key(&c)
		{
			self.order.push(c);
			self.known.insert(c, None);
		}
	}

	fn set_known(&mut self, c: char, v: Option<i32>)
	{
		self.ensure(c);
		self.known.insert(c, v);
	}

	fn value(&self, c: char) -> Option<i32>
	{
		self.known.get(&c).copied().flatten()
	}
}

enum Factor
{
	Number(i32),
	Variable(char),
}

struct ParsedExpr
{
	lhs: Factor,
	op_and_rhs: Option<(BinOp, Factor)>,
}

enum Eval
{
	Known(i32),
	InAccumulator,
}

struct CodeGen<'a>
{
	tokens: &'a [Token],
	pos: usize,
	buffer: Vec<BufferEntry>,
	consts: Vec<i32>,
	vars: VarTable,
	accum: Option<char>,
	jump_targets: HashSet<u32>,
	line_equiv: HashMap<u32, usize>,
	diagnostics: Vec<Diagnostic>,
	last_line: u32,
}

impl<'a> CodeGen<'a>
{
	fn new(tokens: &'a [Token]) -> CodeGen<'a>
	{
		CodeGen
		{
			tokens,
			pos: 0,
			buffer: Vec::new(),
			consts: Vec::new(),
			vars: VarTable::new(),
			accum: None,
			jump_targets: collect_jump_targets(tokens),
			line_equiv: HashMap::new(),
			diagnostics: Vec::new(),
			last_line: 0,
		}
	}

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
					self.line_equiv.insert(n, self.buffer.len());
					self.last_line = n;

					// This line may be entered from a `goto` elsewhere, not
					// just by falling through from the previous statement —
					// the hint only reflects the latter, so it can't be
					// trusted here.
					if self.jump_targets.contains(&n)
					{
						self.accum = None;
					}

					self.advance();
					self.emit_stmt_body();
				},

				_ => self.advance(),
			}
		}
	}

	fn emit_stmt_body(&mut self)
	{
		match self.peek().kind.clone()
		{
			TokenKind::Keyword(Keyword::Input) =>
			{
				self.advance();

				if let TokenKind::Identifier(c) = self.peek().kind
				{
					self.advance();
					self.emit_input(c);
				}
			},

			TokenKind::Keyword(Keyword::Let) =>
			{
				self.advance();

				if let TokenKind::Identifier(c) = self.peek().kind
				{
					self.advance();

					if matches!(self.peek().kind, TokenKind::Assign)
					{
						self.advance();
						self.emit_let(c);
					}
				}
			},

			TokenKind::Keyword(Keyword::Print) =>
			{
				self.advance();

				if let TokenKind::Identifier(c) = self.peek().kind
				{
					self.advance();
					self.emit_print(c);
				}
			},

			TokenKind::Keyword(Keyword::If) =>
			{
				self.advance();
				self.emit_if();
			},

			TokenKind::Keyword(Keyword::Goto) =>
			{
				self.advance();
				self.emit_goto();
			},

			TokenKind::Comment => self.advance(),

			_ => self.advance(),
		}
	}

	// --- expression parsing (shared by `let` and `if`) ---

	fn parse_expr(&mut self) -> ParsedExpr
	{
		let lhs = self.parse_factor();

		if let TokenKind::Operator(op) = self.peek().kind
		{
			self.advance();
			let rhs = self.parse_factor();
			ParsedExpr { lhs, op_and_rhs: Some((op, rhs)) }
		}
		else
		{
			ParsedExpr { lhs, op_and_rhs: None }
		}
	}

	fn parse_factor(&mut self) -> Factor
	{
		match self.peek().kind
		{
			TokenKind::Identifier(c) =>
			{
				self.advance();
				self.vars.ensure(c);
				Factor::Variable(c)
			},

			TokenKind::Number(n) =>
			{
				self.advance();
				Factor::Number(n)
			},

			_ =>
			{
				self.advance();
				Factor::Number(0)
			},
		}
	}

	fn factor_value(&self, f: &Factor) -> Option<i32>
	{
		match f
		{
			Factor::Number(n) => Some(*n),
			Factor::Variable(c) => self.vars.value(*c),
		}
	}

	// --- emission helpers ---

	fn push_instr(&mut self, opcode: u8, operand: OperandSlot)
	{
		self.buffer.push(BufferEntry::Instr { opcode, operand });
	}

	fn push_const(&mut self, value: i32) -> usize
	{
		self.consts.push(value);
		self.consts.len() - 1
	}

	// Loads `name` into the accumulator unless the hint already says it's
	// there; sets the hint only when an actual LOAD is emitted.
	fn load_var(&mut self, name: char)
	{
		if self.accum != Some(name)
		{
			self.push_instr(opcode::LOAD, OperandSlot::PendingVar(name));
			self.accum = Some(name);
		}
	}

	fn materialize_lhs(&mut self, f: &Factor)
	{
		match f
		{
			Factor::Number(n) =>
			{
				let idx = self.push_const(*n);
				self.push_instr(opcode::LOAD, OperandSlot::PendingConst(idx));
			},

			Factor::Variable(v) => self.load_var(*v),
		}
	}

	fn emit_binary_rhs(&mut self, op: BinOp, f: &Factor)
	{
		match f
		{
			Factor::Number(n) =>
			{
				let idx = self.push_const(*n);
				self.push_instr(op.opcode(), OperandSlot::PendingConst(idx));
			},

			Factor::Variable(v) => self.push_instr(op.opcode(), OperandSlot::PendingVar(*v)),
		}
	}

	fn calculate(a: i32, op: BinOp, b: i32) -> i32
	{
		match op
		{
			BinOp::Add => a + b,
			BinOp::Sub => a - b,
			BinOp::Mul => a * b,
			BinOp::Div => a / b,
			BinOp::Mod => a % b,
		}
	}

	// Evaluates an expr, folding when both sides are statically known and
	// emitting runtime code (leaving the value in the accumulator)
	// otherwise. Guards div/mod-by-zero with a safe fallback — semantic
	// analysis has already raised the real diagnostic for this case.
	fn eval_expr(&mut self, expr: &ParsedExpr) -> Eval
	{
		match &expr.op_and_rhs
		{
			None => match &expr.lhs
			{
				Factor::Number(n) => Eval::Known(*n),
				Factor::Variable(v) => match self.vars.value(*v)
				{
					Some(val) => Eval::Known(val),
					None =>
					{
						self.load_var(*v);
						Eval::InAccumulator
					},
				},
			},

			Some((op, rhs)) =>
			{
				let lv = self.factor_value(&expr.lhs);
				let rv = self.factor_value(rhs);

				match (lv, rv)
				{
					(Some(a), Some(b)) =>
					{
						if matches!(op, BinOp::Div | BinOp::Mod) && b == 0
						{
							Eval::Known(0)
						}
						else
						{
							Eval::Known(CodeGen::calculate(a, *op, b))
						}
					},

					_ =>
					{
						self.materialize_lhs(&expr.lhs);
						self.emit_binary_rhs(*op, rhs);
						self.accum = None;
						Eval::InAccumulator
					},
				}
			},
		}
	}

	// --- statement emitters ---

	fn emit_input(&mut self, c: char)
	{
		self.vars.ensure(c);
		self.vars.set_known(c, None);
		self.push_instr(opcode::READ, OperandSlot::PendingVar(c));
	}

	fn emit_print(&mut self, c: char)
	{
		self.vars.ensure(c);
		self.push_instr(opcode::WRITE, OperandSlot::PendingVar(c));
	}

	fn emit_let(&mut self, c: char)
	{
		let expr = self.parse_expr();
		self.vars.ensure(c);

		match expr.op_and_rhs
		{
			None => match expr.lhs
			{
				Factor::Number(n) => self.vars.set_known(c, Some(n)),

				Factor::Variable(u) => match self.vars.value(u)
				{
					Some(v) => self.vars.set_known(c, Some(v)),

					None =>
					{
						self.vars.set_known(c, None);
						self.load_var(u);
						self.push_instr(opcode::STORE, OperandSlot::PendingVar(c));
						// Hint is never reset by the single-operand
						// runtime path; it keeps tracking `u`.
					},
				},
			},

			Some((op, rhs)) =>
			{
				let lv = self.factor_value(&expr.lhs);
				let rv = self.factor_value(&rhs);

				match (lv, rv)
				{
					(Some(a), Some(b)) =>
					{
						let value = if matches!(op, BinOp::Div | BinOp::Mod) && b == 0
						{
							0
						}
						else
						{
							CodeGen::calculate(a, op, b)
						};

						self.vars.set_known(c, Some(value));
					},

					_ =>
					{
						self.vars.set_known(c, None);
						self.materialize_lhs(&expr.lhs);
						self.emit_binary_rhs(op, &rhs);
						self.push_instr(opcode::STORE, OperandSlot::PendingVar(c));
						self.accum = None;
					},
				}
			},
		}
	}

	// `if a cmp b goto N`, generalized to whatever expr sits on each side
	// of the comparison. Both sides reduce to a single accumulator value
	// through `eval_expr`; the right side is computed first and parked in
	// a hidden temp slot if it itself required runtime code, because the
	// left side's evaluation is free to clobber the accumulator.
	fn emit_if(&mut self)
	{
		let lhs_expr = self.parse_expr();

		let cmp = if let TokenKind::Comparison(cmp) = self.peek().kind
		{
			self.advance();
			cmp
		}
		else
		{
			CmpOp::Eq
		};

		let rhs_expr = self.parse_expr();

		if matches!(self.peek().kind, TokenKind::Keyword(Keyword::Goto))
		{
			self.advance();
		}

		let target = match self.peek().kind
		{
			TokenKind::Number(n) =>
			{
				self.advance();
				n
			},
			_ => 0,
		};

		let rhs_operand = match &rhs_expr.op_and_rhs
		{
			None => match &rhs_expr.lhs
			{
				Factor::Number(n) =>
				{
					let idx = self.push_const(*n);
					OperandSlot::PendingConst(idx)
				},
				Factor::Variable(v) => OperandSlot::PendingVar(*v),
			},

			Some(_) => match self.eval_expr(&rhs_expr)
			{
				Eval::Known(v) =>
				{
					let idx = self.push_const(v);
					OperandSlot::PendingConst(idx)
				},
				Eval::InAccumulator =>
				{
					self.vars.ensure(TEMP_SLOT);
					self.push_instr(opcode::STORE, OperandSlot::PendingVar(TEMP_SLOT));
					OperandSlot::PendingVar(TEMP_SLOT)
				},
			},
		};

		match self.eval_expr(&lhs_expr)
		{
			Eval::Known(v) =>
			{
				let idx = self.push_const(v);
				self.push_instr(opcode::LOAD, OperandSlot::PendingConst(idx));
			},
			Eval::InAccumulator => {},
		}

		self.push_instr(opcode::SUB, rhs_operand);
		self.accum = None;

		let target_line = if target > 0 { target as u32 } else { 0 };
		self.emit_comparison_branches(cmp, target_line);
	}

	fn emit_goto(&mut self)
	{
		let target = match self.peek().kind
		{
			TokenKind::Number(n) =>
			{
				self.advance();
				n
			},
			_ => 0,
		};

		let target_line = if target > 0 { target as u32 } else { 0 };
		self.push_instr(opcode::BRANCH, OperandSlot::PendingLine(target_line));

		// Per Design Notes: invalidate the hint on branch emission. Whatever
		// textually follows is reached only if something else jumps to it,
		// so the hint can't assume sequential fall-through past a jump.
		self.accum = None;
	}

	fn emit_comparison_branches(&mut self, cmp: CmpOp, target: u32)
	{
		match cmp
		{
			CmpOp::Eq => self.push_instr(opcode::BRANCH_ZERO, OperandSlot::PendingLine(target)),

			CmpOp::Lt => self.push_instr(opcode::BRANCH_NEG, OperandSlot::PendingLine(target)),

			CmpOp::Le =>
			{
				self.push_instr(opcode::BRANCH_NEG, OperandSlot::PendingLine(target));
				self.push_instr(opcode::BRANCH_ZERO, OperandSlot::PendingLine(target));
			},

			CmpOp::Ne =>
			{
				let skip = (self.buffer.len() + 2) as u8;
				self.push_instr(opcode::BRANCH_ZERO, OperandSlot::Final(skip));
				self.push_instr(opcode::BRANCH, OperandSlot::PendingLine(target));
			},

			CmpOp::Ge =>
			{
				let skip = (self.buffer.len() + 2) as u8;
				self.push_instr(opcode::BRANCH_NEG, OperandSlot::Final(skip));
				self.push_instr(opcode::BRANCH, OperandSlot::PendingLine(target));
			},

			CmpOp::Gt =>
			{
				let skip = (self.buffer.len() + 3) as u8;
				self.push_instr(opcode::BRANCH_NEG, OperandSlot::Final(skip));
				self.push_instr(opcode::BRANCH_ZERO, OperandSlot::Final(skip));
				self.push_instr(opcode::BRANCH, OperandSlot::PendingLine(target));
			},
		}
	}

	// --- back-patch phase ---

	fn into_result(mut self) -> CodeGenResult
	{
		self.push_instr(opcode::HALT, OperandSlot::Final(0));

		let consts = self.consts.clone();
		let mut constants = Vec::with_capacity(consts.len());

		for (i, value) in consts.into_iter().enumerate()
		{
			let addr = self.buffer.len() as u8;
			self.buffer.push(BufferEntry::Data(value));
			constants.push((value, addr));
			self.replace_const(i, addr);
		}

		let var_order = self.vars.order.clone();
		let mut variables = Vec::with_capacity(var_order.len());

		for name in var_order
		{
			let value = self.vars.value(name).unwrap_or(UNINITIALIZED_SENTINEL);
			let addr = self.buffer.len() as u8;
			self.buffer.push(BufferEntry::Data(value));

			if name != TEMP_SLOT
			{
				variables.push((name, addr));
			}

			self.replace_var(name, addr);
		}

		self.replace_lines();

		if self.buffer.len() > MAX_BUFFER_WORDS
		{
			self.diagnostics.push(Diagnostic::new(Stage::CodeGen, self.last_line, DiagnosticKind::AddressOverflow));
		}

		let words = self.buffer.iter().map(|e| match e
		{
			BufferEntry::Instr { opcode, operand } =>
			{
				let addr = match operand
				{
					OperandSlot::Final(a) => *a,
					_ => 0,
				};
				SmlWord::instruction(*opcode, addr)
			},
			BufferEntry::Data(v) => SmlWord::data(*v),
		}).collect();

		let had_errors = !self.diagnostics.is_empty();

		CodeGenResult
		{
			words,
			diagnostics: self.diagnostics,
			had_errors,
			variables,
			constants,
			line_equivalence: self.line_equiv,
		}
	}

	fn replace_const(&mut self, index: usize, addr: u8)
	{
		for entry in self.buffer.iter_mut()
		{
			if let BufferEntry::Instr { operand, .. } = entry
			{
				if *operand == OperandSlot::PendingConst(index)
				{
					*operand = OperandSlot::Final(addr);
				}
			}
		}
	}

	fn replace_var(&mut self, name: char, addr: u8)
	{
		for entry in self.buffer.iter_mut()
		{
			if let BufferEntry::Instr { operand, .. } = entry
			{
				if *operand == OperandSlot::PendingVar(name)
				{
					*operand = OperandSlot::Final(addr);
				}
			}
		}
	}

	fn replace_lines(&mut self)
	{
		let line_equiv = self.line_equiv.clone();

		for entry in self.buffer.iter_mut()
		{
			if let BufferEntry::Instr { operand, .. } = entry
			{
				if let OperandSlot::PendingLine(target) = *operand
				{
					let addr = line_equiv.get(&target).copied().unwrap_or(0) as u8;
					*operand = OperandSlot::Final(addr);
				}
			}
		}
	}
}

#[cfg(test)]
mod tests
{
	use super::*;
	use crate::lexer::tokenize;

	fn generate_source(source: &str) -> CodeGenResult
	{
		generate(&tokenize(source).tokens)
	}

	#[test]
	fn scenario_a_pure_constant_folding()
	{
		let r = generate_source("10 let x = 2\n20 let y = x + 3\n30 print y\n99 end");
		assert!(r.constants.is_empty());
		assert_eq!(r.variables, vec![('x', 2), ('y', 3)]);
		assert_eq!(r.words[1], SmlWord::instruction(opcode::HALT, 0));
		assert_eq!(r.words[2], SmlWord::data(2));
		assert_eq!(r.words[3], SmlWord::data(5));
	}

	#[test]
	fn scenario_b_runtime_required_arithmetic()
	{
		let r = generate_source("10 input a\n20 let b = a + 5\n30 print b\n99 end");
		assert_eq!(r.constants, vec![(5, 6)]);
		assert_eq!(r.variables, vec![('a', 7), ('b', 8)]);
		assert_eq!(r.words.len(), 9);
		assert_eq!(r.words[5], SmlWord::instruction(opcode::HALT, 0));
		assert_eq!(r.words[7], SmlWord::data(UNINITIALIZED_SENTINEL));
		assert_eq!(r.words[8], SmlWord::data(UNINITIALIZED_SENTINEL));
	}

	#[test]
	fn halt_precedes_all_data_words()
	{
		let r = generate_source("10 input a\n20 let b = a + 5\n30 print b\n99 end");
		let halt_pos = r.words.iter().position(|w| *w == SmlWord::instruction(opcode::HALT, 0)).unwrap();
		assert!(r.words[halt_pos + 1..].iter().all(|w| w.0.abs() <= 9999));
		assert_eq!(halt_pos, 5);
	}

	#[test]
	fn identity_assignment_emits_nothing()
	{
		let r = generate_source("10 let u = 7\n20 let v = u\n30 end");
		assert!(r.constants.is_empty());
		assert_eq!(r.variables, vec![('u', 1), ('v', 2)]);
		assert_eq!(r.words[0], SmlWord::instruction(opcode::HALT, 0));
	}

	#[test]
	fn goto_resolves_to_target_line_address()
	{
		let r = generate_source("10 goto 20\n20 print a\n99 end");
		// `goto 20` is the only instruction before line 20's body.
		let target_addr = *r.line_equivalence.get(&20).unwrap() as u8;
		assert_eq!(r.words[0], SmlWord::instruction(opcode::BRANCH, target_addr));
	}

	#[test]
	fn equality_comparison_emits_single_branch_zero()
	{
		let r = generate_source("10 input a\n20 input b\n30 if a == b goto 60\n60 end");
		let branch_zero_count = r.words.iter().filter(|w| w.0 / 100 == opcode::BRANCH_ZERO as i32).count();
		assert_eq!(branch_zero_count, 1);
	}

	#[test]
	fn greater_than_emits_three_instruction_skip_pattern()
	{
		let r = generate_source("10 input a\n20 input b\n30 if a > b goto 60\n60 end");
		// READ a, READ b, LOAD a, SUB b, BRANCH_NEG, BRANCH_ZERO, BRANCH = 7 instructions before HALT.
		let halt_pos = r.words.iter().position(|w| *w == SmlWord::instruction(opcode::HALT, 0)).unwrap();
		assert_eq!(halt_pos, 7);
	}

	#[test]
	fn accumulator_hint_does_not_elide_load_across_a_jump_target()
	{
		// Line 40 is reachable both by falling through from line 30 and by
		// the `goto 40` on line 10 — at line 40 the hint can't assume `a`
		// is still resident just because the textually preceding statement
		// (line 30) happened to load it.
		let r = generate_source(
			"10 goto 40\n20 input a\n30 let b = a\n40 let c = a\n50 end",
		);

		let halt_pos = r.words.iter().position(|w| *w == SmlWord::instruction(opcode::HALT, 0)).unwrap();
		let load_count = r.words[..halt_pos].iter().filter(|w| w.0 / 100 == opcode::LOAD as i32).count();

		// READ a (no LOAD), LOAD a + STORE b (line 30), LOAD a + STORE c (line 40):
		// eliding the second LOAD would be wrong, since line 40 can be entered
		// directly from the `goto` on line 10, before `a` is ever loaded.
		assert_eq!(load_count, 2);
	}

	#[test]
	fn accumulator_hint_still_elides_within_straight_line_code()
	{
		// No jumps at all: line 20 immediately reuses the variable line 10
		// just loaded, so the hint should still elide the second LOAD.
		let r = generate_source("10 let b = a\n20 let c = a\n30 end");
		let halt_pos = r.words.iter().position(|w| *w == SmlWord::instruction(opcode::HALT, 0)).unwrap();
		let load_count = r.words[..halt_pos].iter().filter(|w| w.0 / 100 == opcode::LOAD as i32).count();
		assert_eq!(load_count, 1);
	}

	#[test]
	fn address_overflow_is_reported_for_oversized_programs()
	{
		// Each `input` always emits a READ, regardless of variable reuse,
		// so 120 of them easily blow the 100-word buffer.
		let mut src = String::new();
		for i in 0..120
		{
			let name = (b'a' + (i % 26) as u8) as char;
			src.push_str(&format!("{} input {}\n", (i + 1) * 10, name));
		}
		src.push_str("9999 end\n");
		let r = generate_source(&src);
		assert!(r.words.len() > MAX_BUFFER_WORDS);
		assert!(r.diagnostics.iter().any(|d| d.kind == DiagnosticKind::AddressOverflow));
	}

	#[test]
	fn division_by_zero_literal_does_not_panic()
	{
		let r = generate_source("10 input a\n20 let b = a / 0\n99 end");
		assert_eq!(r.words.len(), r.words.len()); // constructed without panicking
	}
}
