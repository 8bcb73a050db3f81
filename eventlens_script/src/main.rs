//! CLI entry point for eventlens_script.
//! Usage: cargo run -p eventlens_script -- parse events/flavor_eng.txt

use std::path::{Path, PathBuf};
use std::{env, process};

use eventlens_script::{ScriptError, parse_events_file};
use walkdir::WalkDir;

fn main() {
    let args: Vec<String> = env::args().collect();

    // Accept either `<bin> -- <cmd> ...` or `<bin> <cmd> ...`
    let rest: &[String] = match args.as_slice() {
        [_, flag, tail @ ..] if flag == "--" => tail,
        [_, tail @ ..] => tail,
        [] => &[],
    };
    match rest {
        [cmd, path, flags @ ..] if cmd == "parse" => run_parse(Path::new(path), flags.iter().any(|f| f == "--pretty")),
        [cmd, path, ..] if cmd == "lint" => run_lint(Path::new(path)),
        _ => {
            eprintln!("Usage:\n  eventlens_script parse <file.txt> [--pretty]\n  eventlens_script lint <file-or-dir>");
            process::exit(2);
        },
    }
}

fn run_parse(path: &Path, pretty: bool) {
    let events = parse_events_file(path).unwrap_or_else(|e| {
        eprintln!("error: {e}");
        process::exit(1);
    });
    let json = if pretty {
        serde_json::to_string_pretty(&events)
    } else {
        serde_json::to_string(&events)
    };
    match json {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("error: unable to serialize events: {e}");
            process::exit(1);
        },
    }
}

fn script_files(path: &Path) -> Vec<PathBuf> {
    if path.is_file() {
        return vec![path.to_path_buf()];
    }
    let mut files: Vec<PathBuf> = WalkDir::new(path)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|p| p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("txt")))
        .collect();
    files.sort();
    files
}

fn run_lint(path: &Path) {
    if !path.exists() {
        eprintln!("error: '{}' does not exist", path.display());
        process::exit(2);
    }
    let files = script_files(path);
    if files.is_empty() {
        eprintln!("lint: no .txt files under '{}'", path.display());
    }

    let mut failures = 0usize;
    let mut total_events = 0usize;
    for file in &files {
        match parse_events_file(file) {
            Ok(events) => total_events += events.len(),
            Err(err) => {
                failures += 1;
                report(file, &err);
            },
        }
    }
    println!(
        "lint: {} file(s), {} event(s), {} failure(s)",
        files.len(),
        total_events,
        failures
    );
    if failures > 0 {
        process::exit(1);
    }
}

fn report(file: &Path, err: &ScriptError) {
    match err.line() {
        Some(line) => eprintln!("{}:{line}: {err}", file.display()),
        None => eprintln!("{}: {err}", file.display()),
    }
}
