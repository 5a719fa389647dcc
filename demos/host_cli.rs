// Illustrative host only: reads a SIMPLE source file, compiles it, and
// prints the emitted SML words or the diagnostics. None of this is part
// of the core — it's a thin example of wiring a front end to `compile`.
use std::env;
use std::fs;
use std::process;

use simplec::{compile, Config};

fn main()
{
	let mut args = env::args().skip(1);

	let path = match args.next()
	{
		Some(p) => p,
		None =>
		{
			eprintln!("usage: simplec-cli <source-file> [--debug] [--force]");
			process::exit(2);
		},
	};

	let mut config = Config::default();

	for flag in args
	{
		match flag.as_str()
		{
			"--debug" => config.debug = true,
			"--force" => config.compile_despite_errors = true,
			other => eprintln!("ignoring unknown flag: {}", other),
		}
	}

	let source = match fs::read_to_string(&path)
	{
		Ok(s) => s,
		Err(e) =>
		{
			eprintln!("could not read {}: {}", path, e);
			process::exit(1);
		},
	};

	let output = compile(&source, &config);

	for diagnostic in &output.diagnostics
	{
		eprintln!("{}", diagnostic);
	}

	if output.had_errors && !config.compile_despite_errors
	{
		eprintln!("compilation failed, no output emitted");
		process::exit(1);
	}

	if output.had_errors
	{
		eprintln!("-- output below is inoperante (compiled despite errors) --");
	}

	for word in &output.words
	{
		println!("{}", word);
	}

	if config.debug
	{
		if let Some(dump) = &output.debug
		{
			eprintln!("-- debug dump --");
			eprintln!("tokens: {:?}", dump.tokens);
			eprintln!("constants before resolution: {:?}", dump.constants_before_resolution);
			eprintln!("variables before resolution: {:?}", dump.variables_before_resolution);
		}
	}
}
