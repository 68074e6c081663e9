use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use log::info;

use ninemlc::backend::{render_summary, render_template_file, FlatView};
use ninemlc::compiler::diagnostics::SourceDiagnostics;
use ninemlc::{Component, Compiler, ModelError};

#[derive(Parser, Debug)]
#[command(version, about = "Hybrid-dynamics component compiler", long_about = None)]
struct Args {
    /// The component description (*.json) to compile
    #[arg(name = "COMPONENT_FILE")]
    component_file: String,

    /// Flatten the component
    #[arg(short, long, default_value_t = false)]
    flatten: bool,

    /// Print the resulting component as JSON
    #[arg(short, long, default_value_t = false)]
    json: bool,

    /// Renders a template using the flat component
    #[arg(short, long)]
    template: Option<String>,

    /// Upper bound on regimes after flattening
    #[arg(short, long)]
    max_regimes: Option<usize>,

    /// Flatten subnodes and run validation passes on one thread
    #[arg(short, long, default_value_t = false)]
    sequential: bool,

    /// Verbose output
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

fn report(files: &SourceDiagnostics, error: &ModelError) -> anyhow::Result<ExitCode> {
    files
        .emit_stderr(&files.from_model_error(error))
        .context("failed to print diagnostics")?;
    Ok(ExitCode::FAILURE)
}

fn main() -> anyhow::Result<ExitCode> {
    ninemlc::init_logger();
    let args = Args::parse();

    let source = std::fs::read_to_string(&args.component_file)
        .with_context(|| format!("failed to read {}", args.component_file))?;
    let files = SourceDiagnostics::new(&args.component_file, &source);
    let component: Component = match serde_json::from_str(&source) {
        Ok(component) => component,
        Err(err) => {
            files
                .emit_stderr(&[files.from_json_error(&err)])
                .context("failed to print diagnostics")?;
            return Ok(ExitCode::FAILURE);
        }
    };

    let mut compiler = Compiler::new()
        .verbose(args.verbose)
        .parallel(!args.sequential);
    if let Some(limit) = args.max_regimes {
        compiler = compiler.max_regimes(limit);
    }
    let bar = "=".repeat(40);

    let component = if args.flatten {
        match compiler.compile(&component) {
            Ok(result) => {
                if args.verbose {
                    println!("{}\nFLATTENED ({})\n{}", bar, result.fingerprint(), bar);
                }
                result.into_flat()
            }
            Err(err) => return report(&files, &err),
        }
    } else {
        let validation = compiler.validate(&component);
        if let Err(err) = validation.into_result(&component.name) {
            return report(&files, &err);
        }
        info!("'{}' is valid", component.name);
        component
    };

    if args.json {
        let json = serde_json::to_string_pretty(&component)
            .context("failed to serialize component")?;
        println!("{}", json);
    }

    match FlatView::new(&component) {
        Ok(view) => {
            let text = match &args.template {
                Some(template) => render_template_file(&view, template)?,
                None if args.json => return Ok(ExitCode::SUCCESS),
                None => render_summary(&view)?,
            };
            println!("{}", text);
        }
        Err(err) if args.template.is_some() => return report(&files, &err),
        Err(_) => {
            if !args.json {
                println!(
                    "'{}' is valid ({} node(s)); use --flatten to flatten it",
                    component.name,
                    component.node_count()
                );
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}
