mod dir_loader;

use std::collections::BTreeMap;
use std::fs;

use clap::{Args, Parser, Subcommand};
use pl_api::{render_ref, Scenario, SimulationStateBuilder};
use pl_core::{PromptValue, RenderError, RenderLimits, RenderOutput};

use dir_loader::{list_templates, DirLoader};

#[derive(Debug, Parser)]
#[command(name = "prompt-preview")]
#[command(about = "Prompt template preview CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Render(RenderArgs),
    Check(CheckArgs),
    List(ListArgs),
}

#[derive(Debug, Args)]
struct RenderArgs {
    #[arg(long = "templates-dir")]
    templates_dir: String,
    #[arg(long = "template")]
    template: String,
    #[arg(long = "scenario")]
    scenario: Option<String>,
    #[arg(long = "json")]
    json: bool,
}

#[derive(Debug, Args)]
struct CheckArgs {
    #[arg(long = "templates-dir")]
    templates_dir: String,
    #[arg(long = "template")]
    template: Option<String>,
}

#[derive(Debug, Args)]
struct ListArgs {
    #[arg(long = "templates-dir")]
    templates_dir: String,
}

fn main() {
    let cli = Cli::parse();
    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(error) => emit_error(error),
    };

    std::process::exit(exit_code);
}

fn run(cli: Cli) -> Result<i32, RenderError> {
    match cli.command {
        Command::Render(args) => run_render(args),
        Command::Check(args) => run_check(args),
        Command::List(args) => run_list(args),
    }
}

fn run_render(args: RenderArgs) -> Result<i32, RenderError> {
    let loader = DirLoader::new(&args.templates_dir)?;
    let state = load_state(args.scenario.as_deref())?;
    let output = render_ref(&args.template, state, &loader, &RenderLimits::default())?;

    if args.json {
        let json = serde_json::to_string_pretty(&output).map_err(|error| {
            RenderError::new(
                "CLI_OUTPUT_ENCODE",
                format!("Failed to encode render output: {}", error),
            )
        })?;
        println!("{}", json);
    } else {
        print_output(&output);
    }
    Ok(0)
}

fn run_check(args: CheckArgs) -> Result<i32, RenderError> {
    let loader = DirLoader::new(&args.templates_dir)?;
    let references = match args.template {
        Some(reference) => vec![reference],
        None => list_templates(loader.root())?,
    };

    // Checks render against an empty scenario: data gaps are tolerated by
    // design, so anything that fails here is a structural problem.
    let state = SimulationStateBuilder::new().build();
    let mut failures = 0usize;
    for reference in &references {
        match render_ref(reference, state.clone(), &loader, &RenderLimits::default()) {
            Ok(_) => println!("ok   {}", reference),
            Err(error) => {
                failures += 1;
                match error.line {
                    Some(line) => {
                        println!("fail {} [{} line {}] {}", reference, error.code, line, error.message)
                    }
                    None => println!("fail {} [{}] {}", reference, error.code, error.message),
                }
            }
        }
    }

    if failures > 0 {
        println!("{} of {} templates failed", failures, references.len());
        return Ok(1);
    }
    println!("{} templates ok", references.len());
    Ok(0)
}

fn run_list(args: ListArgs) -> Result<i32, RenderError> {
    let loader = DirLoader::new(&args.templates_dir)?;
    for reference in list_templates(loader.root())? {
        println!("{}", reference);
    }
    Ok(0)
}

fn load_state(scenario_path: Option<&str>) -> Result<BTreeMap<String, PromptValue>, RenderError> {
    let Some(path) = scenario_path else {
        return Ok(SimulationStateBuilder::new().build());
    };

    let text = fs::read_to_string(path).map_err(|error| {
        RenderError::new(
            "CLI_SCENARIO_READ",
            format!("Failed to read scenario \"{}\": {}", path, error),
        )
    })?;
    let scenario: Scenario = serde_json::from_str(&text).map_err(|error| {
        RenderError::new(
            "CLI_SCENARIO_PARSE",
            format!("Failed to parse scenario \"{}\": {}", path, error),
        )
    })?;
    Ok(SimulationStateBuilder::from_scenario(scenario).build())
}

fn print_output(output: &RenderOutput) {
    if output.messages.is_empty() {
        println!("{}", output.rendered_text);
        return;
    }
    for message in &output.messages {
        println!("--- [ {} ] ---", message.role.as_str());
        println!("{}", message.content);
        println!();
    }
}

fn emit_error(error: RenderError) -> i32 {
    match error.line {
        Some(line) => eprintln!("error[{}] line {}: {}", error.code, line, error.message),
        None => eprintln!("error[{}]: {}", error.code, error.message),
    }
    1
}

#[cfg(test)]
pub(crate) mod cli_test_support {
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::time::{SystemTime, UNIX_EPOCH};

    pub(crate) fn temp_path(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time should be monotonic")
            .as_nanos();
        std::env::temp_dir().join(format!("promptlang-rs-{}-{}", name, nanos))
    }

    pub(crate) fn write_file(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("parent should be created");
        }
        fs::write(path, content).expect("file should be written");
    }
}
