use clap::{Parser, Subcommand};
use rendition::compiler::{CompileOptions, Compiler};
use rendition::filters::FilterRegistry;
use rendition::{config, data_source, output, rules};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "rendition")]
#[command(about = "Incremental static site compiler")]
#[command(long_about = "\
Incremental static site compiler

Items under content/ are compiled through the pipelines declared in
rules.toml and written to output/. Only items whose inputs changed since the
last run are recompiled.

Site structure:

  site/
  ├── config.toml          # Optional, see 'rendition gen-config'
  ├── rules.toml           # Compile steps, routes and layout filters
  ├── content/             # Items: about.md → /about/, blog/index.md → /blog/
  ├── layouts/             # Layouts: default.html → /default/
  ├── lib/                 # Any change here recompiles everything
  ├── output/              # Compiled site
  └── tmp/                 # Compiled content cache

Rules:

  [[compile]]
  pattern = \"/blog/*\"
  steps = [{ filter = \"markdown\" }, { layout = \"/default/\" }]

  [[route]]
  pattern = \"/drafts/*\"
  skip = true

  [[layout]]
  pattern = \"*\"
  filter = \"template\"")]
#[command(version)]
struct Cli {
    /// Site root directory
    #[arg(long, default_value = ".", global = true)]
    site: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile outdated items and write the output
    Compile {
        /// Recompile every item regardless of timestamps
        #[arg(long)]
        force: bool,
        /// Compile only this item (and whatever it depends on)
        #[arg(long, value_name = "IDENTIFIER")]
        only: Option<String>,
        /// Also show skipped items, filters and dependency waits
        #[arg(long, short)]
        verbose: bool,
    },
    /// Load the site and route every item without compiling
    Check,
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Command::Compile {
            force,
            only,
            verbose,
        } => {
            let site = data_source::load_site(&cli.site)?;
            let rules = rules::load_rules(&site.root.join(&site.config.rules_file))?;
            let filters = FilterRegistry::with_builtins();

            println!("==> Compiling {}", site.root.display());
            let (tx, rx) = std::sync::mpsc::channel();
            let root = site.root.clone();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    output::print_event(&event, &root, verbose);
                }
            });
            let result = Compiler::new(&site, &rules, &filters)
                .with_events(tx)
                .compile(&CompileOptions { force, only });
            printer.join().map_err(|_| "output thread panicked")?;

            let report = result?;
            output::print_report(&report, &site.root);
        }
        Command::Check => {
            let site = data_source::load_site(&cli.site)?;
            let rules = rules::load_rules(&site.root.join(&site.config.rules_file))?;
            let filters = FilterRegistry::with_builtins();

            println!("==> Checking {}", site.root.display());
            let routes = Compiler::new(&site, &rules, &filters).routes()?;
            output::print_routes(&routes);
            println!(
                "==> Site is valid: {} items, {} layouts",
                site.items.len(),
                site.layouts.len()
            );
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}
