// Binary entry point for the command-line tracker.
use anyhow::Result;
use episodic::cli::{print_help, split_args};
use episodic::config::Config;
use episodic::context::{AppContext, StandardContext};
use episodic::controller::{ToggleOutcome, TrackerController};
use episodic::model::display::{format_timestamp, render_report};
use episodic::store::SyncMode;
use simplelog::{
    ColorChoice, CombinedLogger, ConfigBuilder, LevelFilter, SharedLogger, TermLogger,
    TerminalMode, WriteLogger,
};
use std::fs::OpenOptions;

fn init_logging(ctx: &dyn AppContext) {
    let log_config = ConfigBuilder::new().set_time_format_rfc3339().build();

    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        LevelFilter::Warn,
        log_config.clone(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )];

    if let Some(path) = ctx.get_log_path() {
        match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => loggers.push(WriteLogger::new(LevelFilter::Debug, log_config, file)),
            Err(e) => eprintln!("Warning: cannot open log file {}: {}", path.display(), e),
        }
    }

    // Only fails if a logger is already installed.
    let _ = CombinedLogger::init(loggers);
}

fn print_warnings(warnings: &[String]) {
    for w in warnings {
        eprintln!("Warning: {}", w);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    // Handle help flag
    if args.is_empty() || args.iter().any(|arg| arg == "--help" || arg == "-h") {
        print_help("episodic");
        return Ok(());
    }

    let (override_root, words) = split_args(&args);
    let ctx = StandardContext::new(override_root);
    init_logging(&ctx);

    let config = Config::load_or_init(&ctx)?;
    let (controller, ticks) = TrackerController::from_config(&ctx, &config)?;

    let Some((command, rest)) = words.split_first() else {
        print_help("episodic");
        return Ok(());
    };
    let argument = rest.join(" ");

    let report = match controller.start().await {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Error: {}", TrackerController::describe_error(&e));
            std::process::exit(1);
        }
    };
    match &report.mode {
        SyncMode::Online | SyncMode::Offline => {}
        SyncMode::SyncError(reason) => {
            eprintln!("Warning: working offline, remote store unavailable ({})", reason)
        }
    }

    let outcome = match command.as_str() {
        "list" => {
            let mode = match &report.mode {
                SyncMode::Online => "remote store",
                SyncMode::Offline => "local cache (no remote configured)",
                SyncMode::SyncError(_) => "local cache (remote unavailable)",
            };
            println!("Tracking {} series (from {}):", report.series.len(), mode);
            for name in &report.series {
                println!("  - {}", name);
            }
            Ok(())
        }
        "add" | "remove" => {
            if argument.trim().is_empty() {
                eprintln!("Usage: episodic {} <name>", command);
                std::process::exit(2);
            }
            let name = argument.trim();
            if command == "add" {
                controller.add_series(name).await.map(|warnings| {
                    print_warnings(&warnings);
                    println!("Added '{}'", name);
                })
            } else {
                controller.remove_series(name).await.map(|removed| match removed {
                    Some(warnings) => {
                        print_warnings(&warnings);
                        println!("Removed '{}'", name);
                    }
                    None => println!("'{}' is not tracked; nothing removed.", name),
                })
            }
        }
        "check" => controller.check_now().await.map(|report| match report {
            Some(report) => print!("{}", render_report(&report)),
            None => println!("Nothing to check. Add a series first."),
        }),
        "notifications" => controller.toggle_notifications().await.map(|outcome| {
            match outcome {
                ToggleOutcome::Enabled => println!("Weekly notifications enabled."),
                ToggleOutcome::Disabled => println!("Weekly notifications disabled."),
                ToggleOutcome::PermissionDenied => {
                    println!("Notification permission was not granted; nothing changed.")
                }
                ToggleOutcome::Unavailable(permission) => {
                    println!("Notifications are {} on this system.", permission)
                }
            }
        }),
        "status" => {
            let store = controller.store.lock().await;
            let settings = store.settings();
            println!(
                "Notifications: {}",
                if settings.notif_enabled { "on" } else { "off" }
            );
            println!("Permission:    {}", controller.permission().await);
            println!("Last check:    {}", format_timestamp(settings.last_checked_at));
            println!(
                "Next check:    {}",
                store
                    .next_due()
                    .map(|d| format_timestamp(Some(d)))
                    .unwrap_or_else(|| "not scheduled".to_string())
            );
            println!(
                "Remote store:  {}",
                if store.is_online_capable() { "configured" } else { "none" }
            );
            Ok(())
        }
        "daemon" => {
            match controller.scheduler.lock().await.next_due() {
                Some(next) => println!("Next check at {}", next.format("%a %Y-%m-%d %H:%M")),
                None => println!("Weekly check is disabled; waiting for nothing until Ctrl-C."),
            }
            tokio::select! {
                _ = controller.serve_ticks(ticks) => {}
                _ = tokio::signal::ctrl_c() => {
                    log::info!("Interrupted; shutting down");
                }
            }
            controller.scheduler.lock().await.disarm();
            Ok(())
        }
        other => {
            eprintln!("Unknown command '{}'. Try 'episodic --help'.", other);
            std::process::exit(2);
        }
    };

    if let Err(e) = outcome {
        eprintln!("Error: {}", TrackerController::describe_error(&e));
        std::process::exit(1);
    }
    Ok(())
}
