use clap::{Parser, Subcommand};
use listen::ListenCmd;
use report::ReportCmd;
use trace::TraceCmd;

pub mod listen;
pub mod report;
pub mod trace;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Set tracker server adress
    #[arg(long, value_name = "ADRESS", default_value_t = String::from("localhost:3000"))]
    tracker: String,

    /// Set cockpit server adress
    #[arg(long, value_name = "ADRESS", default_value_t = String::from("localhost:8080"))]
    cockpit: String,

    #[command(subcommand)]
    command: LynkCmds,
}

#[derive(Subcommand)]
enum LynkCmds {
    /// follow live shipment positions
    Listen(ListenCmd),
    /// download a batch report
    Report(ReportCmd),
    /// export the audit trail
    Trace(TraceCmd),
}

#[tokio::main]
async fn main() -> Result<(), String> {
    let cli = Cli::parse();

    match &cli.command {
        LynkCmds::Listen(cmd) => listen::run_listen_cmd(cmd, cli.tracker).await,
        LynkCmds::Report(cmd) => report::run_report_cmd(cmd, cli.cockpit).await,
        LynkCmds::Trace(cmd) => trace::run_trace_cmd(cmd, cli.cockpit).await,
    }
}
