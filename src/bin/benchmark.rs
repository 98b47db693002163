use std::path::PathBuf;
use std::time::{Duration, Instant};

use ts_refactor::config::RefactorConfig;
use ts_refactor::diagnostics::Diagnostic;
use ts_refactor::references;
use ts_refactor::registry::{ActionArgs, ActionContext, Registry};
use ts_refactor::workspace::Workspace;

const RUNS: u32 = 5;

fn report(times: &[Duration]) {
    let avg: u128 = times.iter().map(|t| t.as_micros()).sum::<u128>() / times.len().max(1) as u128;
    println!("  Average: {}μs", avg);
    println!();
}

fn main() {
    let project_path = std::env::args().nth(1).unwrap_or_else(|| ".".to_string());
    let test_file = std::env::args()
        .nth(2)
        .unwrap_or_else(|| "src/index.ts".to_string());

    println!("==================================================");
    println!("TS REFACTOR - BENCHMARK");
    println!("==================================================");
    println!();
    println!("Project: {}", project_path);
    println!("Test file: {}", test_file);
    println!();

    println!("--- WORKSPACE INITIALIZATION ---");
    let root = PathBuf::from(&project_path);
    let start = Instant::now();
    let mut workspace = Workspace::new(root.clone(), RefactorConfig::default());
    workspace.initialize().expect("Failed to initialize workspace");
    let init_time = start.elapsed();
    println!("  Indexed {} files in {:?}", workspace.file_count(), init_time);
    println!();

    let program = workspace.program();
    let config = workspace.config.clone();
    let full_path = root.join(&test_file);
    let file = program
        .file(&full_path)
        .expect("Test file not found in workspace");

    println!("--- FIND REFERENCES ({} declarations) ---", file.declarations.len());
    let mut times = Vec::new();
    for decl in &file.declarations {
        let Ok(symbol) = program.declaration_symbol(file, decl) else {
            continue;
        };
        let start = Instant::now();
        let refs = references::find_references(&program, &symbol).unwrap_or_default();
        let elapsed = start.elapsed();
        times.push(elapsed);
        println!("  {}: {:?} ({} refs)", decl.name, elapsed, refs.len());
    }
    report(&times);

    println!("--- APPLICABLE ACTIONS ---");
    let registry = Registry::builtin();
    let args = ActionArgs::default();
    let diagnostics: Vec<Diagnostic> = Vec::new();
    times.clear();
    for i in 1..=RUNS {
        let start = Instant::now();
        let mut offered = 0;
        for decl in &file.declarations {
            let at = decl.name_range.start;
            let ctx = ActionContext::new(&program, file, at..at, &diagnostics, &config, &args);
            offered += registry.applicable(&ctx).len();
        }
        let elapsed = start.elapsed();
        times.push(elapsed);
        println!("  Run {}: {:?} ({} actions)", i, elapsed, offered);
    }
    report(&times);

    println!("==================================================");
    println!("SUMMARY");
    println!("==================================================");
    println!("  Initialization: {:?} ({} files)", init_time, workspace.file_count());
    println!();
}
