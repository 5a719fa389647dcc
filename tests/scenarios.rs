// Integration tests for the six worked scenarios.
use simplec::{compile, Config, DiagnosticKind};

fn run(source: &str) -> simplec::CompileOutput
{
	compile(source, &Config::default())
}

#[test]
fn scenario_a_pure_constant_folding()
{
	let out = run("10 let x = 2\n20 let y = x + 3\n30 print y\n99 end");

	assert!(!out.had_errors);
	assert!(out.constants.is_empty());
	assert_eq!(out.variables, vec![('x', 2), ('y', 3)]);
	assert_eq!(out.words[0].to_string(), "+1103");
	assert_eq!(out.words[1].to_string(), "+4300");
	assert_eq!(out.words[2].to_string(), "+0002");
	assert_eq!(out.words[3].to_string(), "+0005");
}

#[test]
fn scenario_b_runtime_required_arithmetic()
{
	let out = run("10 input a\n20 let b = a + 5\n30 print b\n99 end");

	assert!(!out.had_errors);
	assert_eq!(out.constants, vec![(5, 6)]);
	assert_eq!(out.variables, vec![('a', 7), ('b', 8)]);

	for word in &out.words
	{
		assert_eq!(word.to_string().len(), 5);
	}
}

#[test]
fn scenario_c_uninitialized_variable()
{
	let out = run("10 print q\n20 end");

	assert!(out.had_errors);
	assert_eq!(out.diagnostics.len(), 1);
	assert_eq!(out.diagnostics[0].kind, DiagnosticKind::UninitializedVariable('q'));
	assert_eq!(out.diagnostics[0].line, 10);
}

#[test]
fn scenario_d_unknown_jump_target()
{
	let out = run("10 goto 99\n20 end");

	assert!(out.had_errors);
	assert_eq!(out.diagnostics.len(), 1);
	assert_eq!(out.diagnostics[0].kind, DiagnosticKind::UnknownJumpTarget(99));
	assert_eq!(out.diagnostics[0].line, 10);
}

#[test]
fn scenario_e_duplicate_label()
{
	let out = run("10 input a\n10 print a\n20 end");

	assert!(out.had_errors);
	assert_eq!(out.diagnostics.len(), 1);
	assert_eq!(out.diagnostics[0].kind, DiagnosticKind::DuplicateLine(10));
}

#[test]
fn scenario_f_divide_by_zero_literal()
{
	let out = run("10 input a\n20 let b = a / 0\n99 end");

	assert!(out.had_errors);
	assert_eq!(out.diagnostics.len(), 1);
	assert_eq!(out.diagnostics[0].kind, DiagnosticKind::DivideByZero);
	assert_eq!(out.diagnostics[0].line, 20);
}

#[test]
fn every_emitted_word_matches_the_sml_shape()
{
	let out = run("10 input a\n20 let b = a + 5\n30 if a > b goto 60\n40 print b\n60 end");

	assert!(!out.words.is_empty());

	for word in &out.words
	{
		let text = word.to_string();
		assert_eq!(text.len(), 5);
		assert!(text.starts_with('+') || text.starts_with('-'));
		assert!(text[1..].chars().all(|c| c.is_ascii_digit()));
	}
}

#[test]
fn buffer_never_exceeds_one_hundred_words_for_small_programs()
{
	let out = run("10 input a\n20 let b = a + 5\n30 print b\n99 end");
	assert!(out.words.len() <= 100);
}
