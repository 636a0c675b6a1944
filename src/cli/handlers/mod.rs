mod init;
pub use init::cmd_init;

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::NaiveDate;
use regex::Regex;
use tracing::info;

/// Global override for project directory (set by -C flag)
static PROJECT_DIR_OVERRIDE: Mutex<Option<PathBuf>> = Mutex::new(None);

use crate::board::Dashboard;
use crate::cli::commands::*;
use crate::cli::output::*;
use crate::io::{config_io, dataset_io, logging};
use crate::io::project_io::{self, ProjectError};
use crate::model::project::Project;
use crate::model::FailurePolicy;
use crate::ops::calendar::{build_calendar, month_start};
use crate::ops::reorder::{CardBounds, DragReorderEngine, DropOutcome};
use crate::ops::transfer::TransferRequest;
use crate::ops::{check, search};
use crate::sync::file_backend::FileBackend;
use crate::view::drag::DataTransfer;

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let json = cli.json;

    // Store -C override for load_project_cwd()
    if let Some(ref dir) = cli.project_dir {
        let abs = std::fs::canonicalize(dir)
            .map_err(|e| format!("cannot resolve -C path '{}': {}", dir, e))?;
        set_project_dir(abs);
    }

    match cli.command {
        None => {
            eprintln!("No subcommand given (try `rb --help`).");
            Ok(())
        }
        Some(cmd) => match cmd {
            Commands::Init(args) => cmd_init(args),

            // Read commands
            Commands::Routes(args) => cmd_routes(args, json),
            Commands::Show(args) => cmd_show(args, json),
            Commands::Calendar(args) => cmd_calendar(args, json),
            Commands::Search(args) => cmd_search(args, json),
            Commands::Check => cmd_check(json),

            // Write commands
            Commands::Reorder(args) => cmd_reorder(args, json),
            Commands::Transfer(args) => cmd_transfer(args, json),
            Commands::MoveRoute(args) => cmd_move_route(args, json),
            Commands::Plan(args) => cmd_plan(args, json),
            Commands::SyncPolicy(args) => cmd_sync_policy(args, json),
        },
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn set_project_dir(dir: PathBuf) {
    let mut guard = PROJECT_DIR_OVERRIDE
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    guard.replace(dir);
}

fn start_dir() -> Result<PathBuf, ProjectError> {
    let guard = PROJECT_DIR_OVERRIDE
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    match guard.as_ref() {
        Some(dir) => Ok(dir.clone()),
        None => std::env::current_dir().map_err(ProjectError::IoError),
    }
}

fn load_project_cwd() -> Result<Project, ProjectError> {
    let root = project_io::discover_project(&start_dir()?)?;
    project_io::load_project(&root)
}

/// A dashboard over the project's dataset file, loaded and ready for writes
fn open_dashboard(project: &Project) -> Result<Dashboard<FileBackend>, Box<dyn std::error::Error>> {
    logging::init(&project.board_dir, &project.config.log);
    let backend = FileBackend::new(&project.board_dir, &project.dataset_path());
    let mut dash = Dashboard::new(backend, project.config.sync.on_failure);
    if !dash.refetch() {
        let reason = dash
            .notices
            .latest()
            .map(|n| n.text.clone())
            .unwrap_or_else(|| "could not load dataset".to_string());
        return Err(reason.into());
    }
    Ok(dash)
}

fn parse_date(value: &str) -> Result<NaiveDate, Box<dyn std::error::Error>> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| format!("invalid date '{}' (expected YYYY-MM-DD)", value).into())
}

fn parse_month(value: &str) -> Result<NaiveDate, Box<dyn std::error::Error>> {
    NaiveDate::parse_from_str(&format!("{}-01", value), "%Y-%m-%d")
        .map_err(|_| format!("invalid month '{}' (expected YYYY-MM)", value).into())
}

/// Deliver the queued background writes and report them. Any failure
/// makes the command fail.
fn finish_sync(dash: &mut Dashboard<FileBackend>, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let outcomes = dash.flush_sync();
    if json {
        let results: Vec<SyncResultJson> = outcomes.iter().map(sync_to_json).collect();
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        for outcome in &outcomes {
            if !outcome.is_failure() {
                continue;
            }
            eprintln!("{}", format_sync_outcome(outcome));
        }
    }
    let failed = outcomes.iter().filter(|o| o.is_failure()).count();
    if failed > 0 {
        return Err(format!("{} of {} writes failed", failed, outcomes.len()).into());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Read command handlers
// ---------------------------------------------------------------------------

fn cmd_routes(args: RoutesArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let project = load_project_cwd()?;
    let date = args.date.as_deref().map(parse_date).transpose()?;
    let options = &project.dataset.options;
    let routes: Vec<_> = project
        .dataset
        .routes
        .iter()
        .filter(|r| date.is_none_or(|d| r.delivery_date == Some(d)))
        .collect();

    if json {
        let out: Vec<RouteSummaryJson> = routes.iter().map(|r| route_to_json(r, options)).collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else if routes.is_empty() {
        println!("no routes");
    } else {
        for route in routes {
            println!("{}", format_route_line(route, options));
        }
    }
    Ok(())
}

fn cmd_show(args: ShowArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let project = load_project_cwd()?;
    let route = project
        .dataset
        .routes
        .iter()
        .find(|r| r.id == args.route_id)
        .ok_or_else(|| format!("route not found: {}", args.route_id))?;
    let options = &project.dataset.options;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&route_detail_to_json(route, options))?
        );
    } else {
        for line in format_route_detail(route, options) {
            println!("{}", line);
        }
    }
    Ok(())
}

fn cmd_calendar(args: CalendarArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let project = load_project_cwd()?;
    let month = match args.month.as_deref() {
        Some(m) => parse_month(m)?,
        None => month_start(chrono::Local::now().date_naive()),
    };
    let calendar = build_calendar(&project.dataset.routes, month);

    if json {
        println!("{}", serde_json::to_string_pretty(&calendar_to_json(&calendar))?);
    } else {
        for line in format_calendar(&calendar) {
            println!("{}", line);
        }
        for (date, routes) in &calendar.days {
            let names: Vec<String> = routes
                .iter()
                .filter_map(|id| project.dataset.routes.iter().find(|r| r.id == *id))
                .map(|r| format!("{} ({})", r.name, r.id))
                .collect();
            println!("{}  {}", date.format("%a %d"), names.join(", "));
        }
    }
    Ok(())
}

fn cmd_search(args: SearchArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let project = load_project_cwd()?;
    let re = Regex::new(&args.pattern)?;
    let routes = &project.dataset.routes;
    let hits = search::search_orders(routes, &re, args.route);

    if json {
        let out: Vec<SearchHitJson> = hits.iter().map(|h| hit_to_json(h, routes)).collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    // One line per order even if several fields matched
    let mut seen = HashSet::new();
    for hit in &hits {
        if !seen.insert(hit.order_id) {
            continue;
        }
        let order = routes
            .iter()
            .find(|r| r.id == hit.route_id)
            .and_then(|r| r.order(hit.order_id));
        match order {
            Some(order) => println!("[{}] {}", hit.route_id, format_stop_line(order).trim_start()),
            None => println!("[{}] #{} (in {:?})", hit.route_id, hit.order_id, hit.field),
        }
    }
    Ok(())
}

/// Validates the dataset file as stored, before load-time normalization
fn cmd_check(json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let root = project_io::discover_project(&start_dir()?)?;
    let board_dir = root.join(project_io::BOARD_DIR);
    let config = project_io::read_board_config(&board_dir)?;
    let dataset_path = board_dir.join(&config.data.dataset);
    let dataset = if dataset_path.exists() {
        dataset_io::read_dataset_raw(&dataset_path)?
    } else {
        Default::default()
    };
    let result = check::check_dataset(&dataset);

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_check(&result);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Write command handlers
// ---------------------------------------------------------------------------

/// Drives the same drag engine the dashboard uses: pick up the order,
/// hover the target card on the requested side, drop.
fn cmd_reorder(args: ReorderArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let project = load_project_cwd()?;
    let mut dash = open_dashboard(&project)?;
    let route_id = dash
        .store
        .route_id_of_order(args.order_id)
        .ok_or_else(|| format!("order not found: {}", args.order_id))?;
    let orders = dash
        .store
        .find_route_by_id(route_id)
        .map(|r| r.delivery_orders.iter().map(|o| o.id).collect())
        .unwrap_or_default();

    let mut engine = DragReorderEngine::new(route_id, orders);
    let mut transfer = DataTransfer::new();
    engine.handle_drag_start(args.order_id, &mut transfer);

    // A card two units tall: the top half means before, the bottom after
    let card = CardBounds::new(0.0, 2.0);
    let outcome = match (args.before, args.after, args.end) {
        (Some(target), _, _) => {
            hover(&mut engine, target, 0.5, card)?;
            engine.handle_drop_on_card(target)
        }
        (_, Some(target), _) => {
            hover(&mut engine, target, 1.5, card)?;
            engine.handle_drop_on_card(target)
        }
        (_, _, true) => engine.handle_drop_at_end(),
        _ => return Err("say where to put it: --before <id>, --after <id> or --end".into()),
    };

    if matches!(outcome, DropOutcome::Ignored) {
        println!("order {} is already there", args.order_id);
        return Ok(());
    }
    dash.handle_drop(route_id, outcome)?;
    info!(order_id = args.order_id, route_id, "reorder from cli");
    finish_sync(&mut dash, json)?;
    if !json
        && let Some(route) = dash.store.find_route_by_id(route_id)
    {
        for line in format_route_detail(route, &dash.options) {
            println!("{}", line);
        }
    }
    Ok(())
}

fn hover(
    engine: &mut DragReorderEngine,
    target: i64,
    pointer_y: f64,
    card: CardBounds,
) -> Result<(), Box<dyn std::error::Error>> {
    if !engine.orders().contains(&target) {
        return Err(format!("order {} is not on route {}", target, engine.route_id()).into());
    }
    engine.handle_drag_over_card(target, pointer_y, card);
    Ok(())
}

fn cmd_transfer(args: TransferArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let project = load_project_cwd()?;
    let mut dash = open_dashboard(&project)?;
    let source = dash
        .store
        .route_id_of_order(args.order_id)
        .ok_or_else(|| format!("order not found: {}", args.order_id))?;
    if source == args.route_id {
        println!("order {} is already on route {}", args.order_id, source);
        return Ok(());
    }
    dash.transfer(TransferRequest::new(args.order_id, source, args.route_id))?;
    finish_sync(&mut dash, json)?;
    if !json {
        println!(
            "moved order {} from route {} to route {}",
            args.order_id, source, args.route_id
        );
    }
    Ok(())
}

fn cmd_move_route(args: MoveRouteArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let date = parse_date(&args.date)?;
    let project = load_project_cwd()?;
    let mut dash = open_dashboard(&project)?;
    if dash.store.find_route_by_id(args.route_id).is_none() {
        return Err(format!("route not found: {}", args.route_id).into());
    }
    if dash.move_route_to_date(args.route_id, date).is_none() {
        println!("route {} already runs on {}", args.route_id, date);
        return Ok(());
    }
    finish_sync(&mut dash, json)?;
    if !json {
        println!("route {} now runs on {}", args.route_id, date);
    }
    Ok(())
}

fn cmd_plan(args: PlanArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let project = load_project_cwd()?;
    let Some(index) = args.index else {
        let route = project
            .dataset
            .routes
            .iter()
            .find(|r| r.id == args.route_id)
            .ok_or_else(|| format!("route not found: {}", args.route_id))?;
        if json {
            println!("{}", serde_json::to_string_pretty(&plans_to_json(route))?);
            return Ok(());
        }
        match &route.saved_optimizations {
            Some(plans) if !plans.is_empty() => {
                for (i, plan) in plans.iter().enumerate() {
                    let active = route.using_optimization_indx == Some(i);
                    println!("{}", format_plan_line(i, plan, active));
                }
            }
            _ => println!("route {} has no saved plans", route.id),
        }
        return Ok(());
    };

    let mut dash = open_dashboard(&project)?;
    let tickets = dash.apply_plan(args.route_id, index)?;
    finish_sync(&mut dash, json)?;
    if !json {
        println!(
            "route {} follows plan #{} ({} writes)",
            args.route_id,
            index,
            tickets.len()
        );
    }
    Ok(())
}

fn cmd_sync_policy(args: SyncPolicyArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let root = project_io::discover_project(&start_dir()?)?;
    let board_dir = root.join(project_io::BOARD_DIR);
    let (config, mut doc) = config_io::read_config(&board_dir)?;

    let policy = match args.policy {
        None => config.sync.on_failure,
        Some(arg) => {
            let policy = match arg {
                PolicyArg::Log => FailurePolicy::Log,
                PolicyArg::Rollback => FailurePolicy::Rollback,
            };
            config_io::set_failure_policy(&mut doc, policy);
            config_io::write_config(&board_dir, &doc)?;
            policy
        }
    };

    if json {
        println!("{}", serde_json::json!({ "on_failure": policy.as_str() }));
    } else {
        println!("{}", policy.as_str());
    }
    Ok(())
}
