use std::path::PathBuf;

use clap::Args;
use reqwest::Url;
use serde::Deserialize;

use libs::export::{batch_report, DirectorySink, SaveAs};
use libs::models::BatchRecord;

#[derive(Args)]
pub struct ReportCmd {
    /// batch name, e.g. "Batch #1234"
    batch: String,

    /// directory the report is written to
    #[arg(long, default_value = ".")]
    out: PathBuf,
}

#[derive(Deserialize)]
struct BatchResponse {
    result: BatchRecord,
}

pub async fn run_report_cmd(cmd: &ReportCmd, target: String) -> Result<(), String> {
    let batch = get_batch(&target, &cmd.batch)
        .await
        .map_err(|e| format!("Error: {}", e))?;

    let export = batch_report(&cmd.batch, &batch);
    let path = DirectorySink::new(cmd.out.clone())
        .save(&export)
        .map_err(|e| format!("Error: {}", e))?;
    println!("Report saved to {}", path.display());
    Ok(())
}

async fn get_batch(target: &str, name: &str) -> Result<BatchRecord, String> {
    let mut url =
        Url::parse(&format!("http://{}/api/batches", target)).map_err(|e| e.to_string())?;
    url.path_segments_mut()
        .map_err(|_| format!("{} can't be a base url", target))?
        .push(name);

    let res = reqwest::get(url).await.map_err(|e| e.to_string())?;
    if res.status() == reqwest::StatusCode::NOT_FOUND {
        return Err(format!("unknown batch {}", name));
    }
    let body = res
        .error_for_status()
        .map_err(|e| e.to_string())?
        .json::<BatchResponse>()
        .await
        .map_err(|e| e.to_string())?;
    Ok(body.result)
}
