use std::path::PathBuf;

use clap::Args;
use serde::Deserialize;
use serde_json::Value;

use libs::export::{DirectorySink, Export, SaveAs, TRACE_EXPORT_FILENAME};

#[derive(Args)]
pub struct TraceCmd {
    /// search the event / record type
    #[arg(short, long, default_value = "")]
    query: String,

    /// keep only this status
    #[arg(short, long)]
    status: Option<String>,

    /// directory the export is written to
    #[arg(long, default_value = ".")]
    out: PathBuf,
}

#[derive(Deserialize)]
struct TraceResponse {
    result: Value,
}

pub async fn run_trace_cmd(cmd: &TraceCmd, target: String) -> Result<(), String> {
    let data = get_trace_data(&target, &cmd.query, cmd.status.as_deref())
        .await
        .map_err(|e| format!("Error: {}", e))?;

    let export = trace_export(data).map_err(|e| format!("Error: {}", e))?;
    let path = DirectorySink::new(cmd.out.clone())
        .save(&export)
        .map_err(|e| format!("Error: {}", e))?;
    println!("Trace data saved to {}", path.display());
    Ok(())
}

fn trace_export(data: TraceResponse) -> Result<Export, String> {
    if data.result.is_null() {
        return Err("empty trace response".to_string());
    }
    Export::json(TRACE_EXPORT_FILENAME.to_string(), &data.result).map_err(|e| e.to_string())
}

async fn get_trace_data(
    target: &str,
    query: &str,
    status: Option<&str>,
) -> Result<TraceResponse, reqwest::Error> {
    let url = format!("http://{}/api/trace", target);
    let mut params = vec![("q", query)];
    if let Some(status) = status {
        params.push(("status", status));
    }
    let res = reqwest::Client::new()
        .get(url)
        .query(&params)
        .send()
        .await?
        .error_for_status()?
        .json::<TraceResponse>()
        .await?;
    Ok(res)
}
