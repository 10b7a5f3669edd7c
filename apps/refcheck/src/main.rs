//! refcheck CLI binary entry point.
//! Resolves configuration, delegates to the library and maps results to exit codes.

use anyhow::Context;
use clap::Parser;
use refcheck::cli::{Cli, Commands};
use refcheck::config::{self, Effective, Overrides};
use refcheck::output::{self, error_prefix, note_prefix};
use refcheck::review::{self, ReviewOutcome, TerminalPrompt};
use refcheck::{checks, planner, resolve, runner, Error};
use std::io;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("refcheck=debug")
    } else {
        EnvFilter::try_from_env("REFCHECK_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", error_prefix(), e);
            match e.downcast_ref::<Error>() {
                Some(Error::Config(_)) => 2,
                _ => 1,
            }
        }
    };
    std::process::exit(code);
}

fn effective(cli: &Cli, ov: Overrides) -> anyhow::Result<Effective> {
    let eff = config::resolve_effective(&Overrides {
        root: cli.root.clone(),
        config: cli.config.clone(),
        ..ov
    })?;
    if eff.config_file.is_none() && !eff.render.is_json() {
        eprintln!("{} No refcheck.toml found; using defaults.", note_prefix());
    }
    Ok(eff)
}

fn run(cli: Cli) -> anyhow::Result<i32> {
    match &cli.cmd {
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(0)
        }
        Commands::Check {
            include,
            exclude,
            checkers,
            output,
            quiet,
        } => {
            let eff = effective(
                &cli,
                Overrides {
                    include: include.clone(),
                    exclude: exclude.clone(),
                    checkers: checkers.clone(),
                    output: output.clone(),
                    quiet: *quiet,
                    ..Default::default()
                },
            )?;
            let report = runner::run(&eff.scan_config()?)?;
            output::print_scan(&report, &eff.root, &eff.render);
            Ok(if report.has_errors() { 1 } else { 0 })
        }
        Commands::Fix {
            all,
            dry_run,
            include,
            exclude,
            checkers,
            output,
        } => {
            let eff = effective(
                &cli,
                Overrides {
                    include: include.clone(),
                    exclude: exclude.clone(),
                    checkers: checkers.clone(),
                    output: output.clone(),
                    dry_run: dry_run.then_some(true),
                    ..Default::default()
                },
            )?;
            fix(&eff, *all)
        }
        Commands::Undo { id, list, output } => {
            let eff = effective(
                &cli,
                Overrides {
                    output: output.clone(),
                    ..Default::default()
                },
            )?;
            let engine = eff.patch_engine();
            if *list {
                output::print_patch_list(&engine.list()?, &eff.render);
                return Ok(0);
            }
            let record = engine.undo(id.as_deref())?;
            output::print_record(&record, &[], "reversed", &eff.render);
            Ok(0)
        }
        Commands::Redo { id, output } => {
            let eff = effective(
                &cli,
                Overrides {
                    output: output.clone(),
                    ..Default::default()
                },
            )?;
            let record = eff.patch_engine().redo(id.as_deref())?;
            output::print_record(&record, &[], "reapplied", &eff.render);
            Ok(0)
        }
        Commands::List { output } => {
            let eff = effective(
                &cli,
                Overrides {
                    output: output.clone(),
                    ..Default::default()
                },
            )?;
            output::print_available(&checks::available(), &resolve::available(), &eff.render);
            Ok(0)
        }
    }
}

fn fix(eff: &Effective, all: bool) -> anyhow::Result<i32> {
    let report = runner::run(&eff.scan_config()?)?;
    let fixable = report.fixable();
    if fixable.is_empty() {
        if !eff.render.is_json() {
            println!("nothing to fix ({} issues, none with a suggestion)", report.issues.len());
        }
        return Ok(if report.has_errors() { 1 } else { 0 });
    }
    let accepted = if all {
        fixable
    } else {
        let stdin = io::stdin();
        let mut prompt = TerminalPrompt::new(
            stdin.lock(),
            io::stderr(),
            &eff.root,
            eff.render.context_lines,
            eff.render.colors(),
        );
        match review::review(&fixable, &mut prompt).context("reading review answers")? {
            ReviewOutcome::Completed { accepted, .. } => accepted,
            ReviewOutcome::Aborted { decided } => {
                eprintln!(
                    "{} review aborted after {} decisions; nothing was applied",
                    note_prefix(),
                    decided
                );
                return Ok(1);
            }
        }
    };
    let plan = planner::plan(&accepted);
    output::print_conflicts(&plan.conflicts, &eff.render);
    if plan.is_empty() {
        eprintln!("{} no edits left to apply", note_prefix());
        return Ok(if plan.conflicts.is_empty() { 0 } else { 1 });
    }
    let record = eff.patch_engine().apply(&plan, eff.dry_run)?;
    let verb = if eff.dry_run { "dry run" } else { "applied" };
    output::print_record(&record, &plan.conflicts, verb, &eff.render);
    Ok(0)
}
