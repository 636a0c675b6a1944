use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "rb", about = concat!("routeboard v", env!("CARGO_PKG_VERSION"), " - delivery routes, stop by stop"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Run against a different project directory
    #[arg(short = 'C', long = "project-dir", global = true)]
    pub project_dir: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new routeboard project in the current directory
    Init(InitArgs),
    /// List routes with their counters
    Routes(RoutesArgs),
    /// Show a route and its stops
    Show(ShowArgs),
    /// Show which routes run on which days of a month
    Calendar(CalendarArgs),
    /// Move an order within its route
    Reorder(ReorderArgs),
    /// Move an order to the end of another route
    Transfer(TransferArgs),
    /// Reschedule a route to another day
    MoveRoute(MoveRouteArgs),
    /// Reorder a route by one of its saved plans
    Plan(PlanArgs),
    /// Search orders by regex
    Search(SearchArgs),
    /// Validate dataset integrity
    Check,
    /// Show or set what happens when a background write fails
    SyncPolicy(SyncPolicyArgs),
}

#[derive(Args)]
pub struct InitArgs {
    /// Project name (defaults to the directory name)
    #[arg(long)]
    pub name: Option<String>,
    /// Reinitialize even if routeboard/ already exists
    #[arg(long)]
    pub force: bool,
}

#[derive(Args)]
pub struct RoutesArgs {
    /// Only routes running on this day (YYYY-MM-DD)
    #[arg(long)]
    pub date: Option<String>,
}

#[derive(Args)]
pub struct ShowArgs {
    /// Route id
    pub route_id: i64,
}

#[derive(Args)]
pub struct CalendarArgs {
    /// Month to show (YYYY-MM); defaults to the current month
    pub month: Option<String>,
}

#[derive(Args)]
pub struct ReorderArgs {
    /// Order to move
    pub order_id: i64,
    /// Place it before this order
    #[arg(long, conflicts_with_all = ["after", "end"])]
    pub before: Option<i64>,
    /// Place it after this order
    #[arg(long, conflicts_with_all = ["before", "end"])]
    pub after: Option<i64>,
    /// Place it last
    #[arg(long, conflicts_with_all = ["before", "after"])]
    pub end: bool,
}

#[derive(Args)]
pub struct TransferArgs {
    /// Order to move
    pub order_id: i64,
    /// Target route id
    pub route_id: i64,
}

#[derive(Args)]
pub struct MoveRouteArgs {
    /// Route id
    pub route_id: i64,
    /// New day (YYYY-MM-DD)
    pub date: String,
}

#[derive(Args)]
pub struct PlanArgs {
    /// Route id
    pub route_id: i64,
    /// Saved plan index; lists the plans when omitted
    pub index: Option<usize>,
}

#[derive(Args)]
pub struct SearchArgs {
    /// Regex pattern
    pub pattern: String,
    /// Limit to one route
    #[arg(long)]
    pub route: Option<i64>,
}

#[derive(Args)]
pub struct SyncPolicyArgs {
    /// New policy; prints the current one when omitted
    pub policy: Option<PolicyArg>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum PolicyArg {
    /// Keep the local change and show a notice
    Log,
    /// Undo the local change
    Rollback,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn reorder_flags_conflict() {
        assert!(Cli::try_parse_from(["rb", "reorder", "4", "--before", "2", "--end"]).is_err());
        assert!(Cli::try_parse_from(["rb", "reorder", "4", "--after", "2"]).is_ok());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["rb", "routes", "--json", "-C", "/tmp/x"]).unwrap();
        assert!(cli.json);
        assert_eq!(cli.project_dir.as_deref(), Some("/tmp/x"));
    }
}
