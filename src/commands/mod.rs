use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use devbox::{
    color_enabled_stderr, color_enabled_stdout, exit_code_for_flow_error, exit_code_for_io_error,
    log_error_stderr, log_info_stderr, log_warn_stderr, paint, ContainerStatus, CreateRequest,
    DockerCli, FlowError, GitCli, InstanceSummary, Orchestrator, RemoveRequest, SafetyReport,
};

use crate::cli::Cli;

type Host = Orchestrator<DockerCli, GitCli>;

/// Print a flow failure (message, payload, suggestion) and map it to an exit code.
fn report_failure(e: &FlowError) -> ExitCode {
    let use_err = color_enabled_stderr();
    log_error_stderr(use_err, &format!("devbox: {} [{}]", e.message, e.code.as_str()));
    if !e.candidates.is_empty() {
        eprintln!("  candidates:");
        for c in &e.candidates {
            eprintln!("    {}", paint(use_err, "\x1b[34;1m", c));
        }
    }
    if let Some(gs) = &e.git_state {
        eprintln!("{}", devbox::build_safety_report(gs).render(use_err));
    } else if let Some(s) = &e.suggestion {
        log_warn_stderr(use_err, s);
    }
    if e.was_running {
        log_warn_stderr(use_err, "note: the container was running before this command acted on it.");
    }
    ExitCode::from(exit_code_for_flow_error(e))
}

fn progress_printer(verbose: bool) -> impl FnMut(&str) {
    let use_err = color_enabled_stderr();
    move |msg: &str| {
        if verbose {
            log_info_stderr(use_err, &format!("devbox: {msg}"));
        }
    }
}

pub(crate) fn run_create(
    cli: &Cli,
    orch: &Host,
    repo: &str,
    instance: &str,
    purpose: Option<String>,
) -> ExitCode {
    let req = CreateRequest {
        repo: repo.to_string(),
        instance: instance.to_string(),
        purpose,
    };
    let mut progress = progress_printer(cli.verbose);
    match orch.create(&req, Some(&mut progress)) {
        Ok(out) => {
            let use_err = color_enabled_stderr();
            log_info_stderr(
                use_err,
                &format!(
                    "devbox: created {} (container {}, {} config)",
                    out.workspace.name,
                    out.state.container_name,
                    out.state.config_source.map(|s| s.as_str()).unwrap_or("unknown")
                ),
            );
            println!("{}", out.workspace.root.display());
            ExitCode::SUCCESS
        }
        Err(e) => report_failure(&e),
    }
}

pub(crate) fn run_attach(cli: &Cli, orch: &Host, name: &str) -> ExitCode {
    let mut progress = progress_printer(cli.verbose);
    match orch.attach(name, Some(&mut progress)) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => report_failure(&e),
    }
}

pub(crate) fn run_rebuild(cli: &Cli, orch: &Host, name: &str, force: bool) -> ExitCode {
    let mut progress = progress_printer(cli.verbose);
    match orch.rebuild(name, force, Some(&mut progress)) {
        Ok(out) => {
            log_info_stderr(
                color_enabled_stderr(),
                &format!(
                    "devbox: rebuilt {} (container {})",
                    out.workspace.name, out.state.container_name
                ),
            );
            ExitCode::SUCCESS
        }
        Err(e) => report_failure(&e),
    }
}

/// Show the report and read the instance name back from an interactive stdin.
fn prompt_typed_name(name: &str, report: Option<&SafetyReport>) -> Option<String> {
    if !atty::is(atty::Stream::Stdin) {
        return None;
    }
    let use_err = color_enabled_stderr();
    match report {
        Some(r) => {
            eprintln!("{}", r.render(use_err));
            if r.has_danger() {
                log_error_stderr(use_err, "devbox: some of this work exists nowhere else and cannot be recovered.");
            }
        }
        None => log_warn_stderr(use_err, "devbox: git state could not be determined."),
    }
    eprint!(
        "{} ",
        paint(use_err, "\x1b[33m", &format!("Type '{name}' to remove it permanently:"))
    );
    let _ = io::stderr().flush();
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line).ok()?;
    Some(line.trim().to_string())
}

pub(crate) fn run_remove(orch: &Host, name: &str, force: bool, yes: bool) -> ExitCode {
    let mut confirm = prompt_typed_name;
    match orch.remove(name, RemoveRequest { force, yes }, Some(&mut confirm)) {
        Ok(out) => {
            let use_err = color_enabled_stderr();
            log_info_stderr(use_err, &format!("devbox: removed {}", out.workspace.name));
            if let Some(method) = out.confirmation {
                if out.audit_logged {
                    eprintln!("  forced removal recorded ({})", method.as_str());
                } else {
                    log_warn_stderr(use_err, "devbox: forced removal could not be recorded in the audit log.");
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => report_failure(&e),
    }
}

fn status_cell(status: Option<ContainerStatus>, use_color: bool) -> String {
    match status {
        Some(ContainerStatus::Running) => paint(use_color, "\x1b[32m", "running"),
        Some(s) => s.as_str().to_string(),
        None => "unknown".to_string(),
    }
}

fn git_cell(row: &InstanceSummary) -> String {
    match &row.git_state {
        Some(g) if g.is_clean() => "clean".to_string(),
        Some(g) => format!("dirty ({})", devbox::evaluate_safety_checks(g).len()),
        None => "-".to_string(),
    }
}

pub(crate) fn run_list(orch: &Host, json: bool, git: bool) -> ExitCode {
    let rows = match orch.list(git) {
        Ok(r) => r,
        Err(e) => {
            log_error_stderr(color_enabled_stderr(), &format!("devbox: {e}"));
            return ExitCode::from(exit_code_for_io_error(&e));
        }
    };
    if json {
        match serde_json::to_string_pretty(&rows) {
            Ok(s) => println!("{s}"),
            Err(e) => {
                log_error_stderr(color_enabled_stderr(), &format!("devbox: {e}"));
                return ExitCode::from(1);
            }
        }
        return ExitCode::SUCCESS;
    }
    if rows.is_empty() {
        log_info_stderr(color_enabled_stderr(), "devbox: no instances.");
        return ExitCode::SUCCESS;
    }
    let use_out = color_enabled_stdout();
    let width = rows.iter().map(|r| r.name.len()).max().unwrap_or(4).max(4);
    for r in &rows {
        let mut line = format!(
            "{:<width$}  {:<9}  {}",
            r.name,
            status_cell(r.status, use_out),
            r.last_attached
        );
        if git {
            line.push_str(&format!("  {}", git_cell(r)));
        }
        if let Some(p) = &r.purpose {
            line.push_str(&format!("  {p}"));
        }
        println!("{line}");
    }
    ExitCode::SUCCESS
}
