mod app;
mod cli;
mod completions;
mod config;
mod connectivity;
mod db;
mod domain;
mod locks;
mod logging;
mod prompt;
mod service;
mod store;
mod sync;
mod ui;

use std::io;

use app::{App, AppError};
use cli::Commands;
use config::{Overrides, Settings};

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}

fn print_json(value: &impl serde::Serialize) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).expect("json serialization should work")
    );
}

fn run() -> Result<(), AppError> {
    use clap::Parser;

    let cli = cli::Cli::parse();
    logging::init(cli.verbose);

    if let Commands::Completions(args) = &cli.command {
        return completions::run_completions_command(args.shell.as_deref(), args.install);
    }

    let overrides = Overrides {
        remote_host: cli.remote_host.clone(),
        remote_database: cli.remote_database.clone(),
    };
    let settings = Settings::load(cli.config.as_deref(), &overrides)?;
    let mut app = App::open(&cli.db, settings)?;
    let palette = ui::Palette::auto();

    match cli.command {
        Commands::Ls(args) => {
            let activities = app.list_all()?;
            if args.json {
                print_json(&activities);
            } else {
                ui::print_activity_list(&activities);
            }
        }
        Commands::Show(args) => match app.get(&args.name)? {
            Some(activity) => {
                if args.json {
                    print_json(&activity);
                } else {
                    ui::print_activity(&activity);
                }
            }
            None => return Err(AppError::NotFound(args.name)),
        },
        Commands::Suggest(args) => {
            if args.once || args.json {
                let suggestion = app.suggest()?.ok_or_else(prompt::no_activities)?;
                if args.json {
                    print_json(&suggestion);
                } else {
                    prompt::write_suggestion(&mut io::stdout().lock(), &suggestion, &palette)?;
                }
            } else {
                prompt::run_suggest_loop(
                    &mut app,
                    io::stdin().lock(),
                    &mut io::stdout().lock(),
                    &palette,
                )?;
            }
        }
        Commands::Add(args) => {
            let activity = app.add(&args.name, args.priority)?;
            println!(
                "added {} {}",
                palette.name(&activity.name),
                palette.priority(activity.priority)
            );
        }
        Commands::Rm(args) => {
            if !app.delete(&args.name)? {
                return Err(AppError::NotFound(args.name));
            }
            println!("removed {}", palette.name(args.name.trim()));
        }
        Commands::Adjust(args) => {
            let updated = app.adjust_priority(&args.name, args.delta)?;
            println!(
                "{} priority {}",
                palette.name(args.name.trim()),
                palette.priority(updated)
            );
        }
        Commands::Status(args) => {
            let report = app.connectivity_status()?;
            if args.json {
                print_json(&report);
            } else {
                ui::print_status(&report);
            }
        }
        Commands::Queue(args) => {
            if let Some(id) = args.discard {
                app.discard_queue_entry(id)?;
                println!("discarded queued operation #{id}");
                return Ok(());
            }
            let entries = app.pending_queue()?;
            if args.json {
                print_json(&entries);
            } else {
                ui::print_queue(&entries);
            }
        }
        Commands::Sync(args) => {
            if !args.json {
                let status = app.connectivity_status()?;
                println!("pending operations: {}", status.pending_operations);
            }
            let report = app.trigger_sync()?;
            if args.json {
                print_json(&report);
            } else {
                ui::print_sync_report(&report);
            }
            app::ensure_complete(&report)?;
        }
        Commands::InitRemote => {
            let path = app.init_remote()?;
            println!("initialized remote store at {}", path.display());
        }
        Commands::Completions(_) => {
            unreachable!("completions are handled before app initialization")
        }
    }

    Ok(())
}
