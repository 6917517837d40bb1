use std::process::ExitCode;

use clap::Parser;

mod cli;
mod commands;

use cli::{Cli, Command};

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Some(mode) = cli.color {
        devbox::set_color_mode(mode);
    }
    devbox::init_logging();

    let config = match devbox::Config::load() {
        Ok(c) => c,
        Err(e) => {
            devbox::log_error_stderr(
                devbox::color_enabled_stderr(),
                &format!("devbox: failed to load configuration: {e}"),
            );
            return ExitCode::from(devbox::exit_code_for_io_error(&e));
        }
    };
    tracing::debug!(base_dir = %config.base_dir.display(), "configuration loaded");
    let orch = devbox::Orchestrator::from_config(config);

    match &cli.command {
        Command::Create {
            repo,
            instance,
            purpose,
        } => commands::run_create(&cli, &orch, repo, instance, purpose.clone()),
        Command::Attach { name } => commands::run_attach(&cli, &orch, name),
        Command::Rebuild { name, force } => commands::run_rebuild(&cli, &orch, name, *force),
        Command::Remove { name, force, yes } => commands::run_remove(&orch, name, *force, *yes),
        Command::List { json, git } => commands::run_list(&orch, *json, *git),
    }
}
