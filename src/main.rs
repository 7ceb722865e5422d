use clap::Parser;
use std::process::ExitCode;
use std::time::Instant;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use nucleus_client::bulk::parse_update;
use nucleus_client::config::{Args, Command};
use nucleus_client::{
    AssetUpdate, AsyncNucleusClient, Error, FindingFilter, FindingUpdate, NewAsset, Result, Severity, metrics,
};

#[tokio::main]
async fn main() -> ExitCode {
    // parse cli arguments
    let args = Args::parse();

    let filter = if args.verbose {
        EnvFilter::new("nucleus_client=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let client = match AsyncNucleusClient::open(args.client_config()) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(2);
        }
    };

    let outcome = run(&client, args.command.clone()).await;
    client.close();

    if args.metrics {
        print!("{}", metrics::render());
    }

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report(&e);
            ExitCode::FAILURE
        }
    }
}

fn report(e: &Error) {
    eprintln!("Error: {}", e);
    if let Some(status) = e.status_code() {
        eprintln!("Status code: {}", status);
    }
    if let Some(body) = e.body() {
        eprintln!("Response: {}", body);
    }
}

async fn run(client: &AsyncNucleusClient, command: Command) -> Result<()> {
    match command {
        Command::Projects => {
            for project in client.get_projects().await? {
                println!("Project: {} (ID: {})", project.project_name, project.project_id);
            }
        }
        Command::Metrics { project_id } => {
            let metrics = client.get_project_metrics(project_id).await?;
            println!("Critical findings: {}", metrics.finding_count_critical);
            println!("High findings: {}", metrics.finding_count_high);
            println!("Medium findings: {}", metrics.finding_count_medium);
            println!("Low findings: {}", metrics.finding_count_low);
        }
        Command::Assets { project_id } => {
            for asset in client.get_project_assets(project_id).await? {
                println!("Asset: {} ({}) [ID: {}]", asset.asset_name, asset.asset_type, asset.asset_id);
            }
        }
        Command::CreateAsset {
            project_id,
            name,
            asset_type,
            ip,
            os_name,
            os_version,
            groups,
        } => {
            let mut asset = NewAsset::new(name, asset_type);
            asset.ip_address = ip;
            asset.operating_system_name = os_name;
            asset.operating_system_version = os_version;
            asset.asset_groups = groups;
            let created = client.create_asset(project_id, &asset).await?;
            println!("Created asset with ID: {}", created.asset_id);
        }
        Command::UpdateAsset {
            project_id,
            asset_id,
            name,
            notes,
            ip,
        } => {
            let update = AssetUpdate {
                asset_name: name,
                asset_notes: notes,
                ip_address: ip,
                asset_groups: None,
            };
            client.update_asset(project_id, asset_id, &update).await?;
            println!("Asset {} updated successfully", asset_id);
        }
        Command::Findings { project_id, severity } => {
            let findings = client
                .search_findings(project_id, &[FindingFilter::severity(severity)])
                .await?;
            for finding in findings {
                println!("{} finding: {}", severity, finding.finding_name);
                println!("  Severity: {}", finding.finding_severity);
                println!("  Status: {}", finding.finding_status);
                println!("  Discovered: {}", finding.finding_discovered.to_rfc3339());
            }
        }
        Command::AssetFindings {
            project_id,
            asset_ids,
            limit,
        } => {
            let asset_ids = if asset_ids.is_empty() {
                client
                    .get_project_assets(project_id)
                    .await?
                    .into_iter()
                    .take(limit)
                    .map(|a| a.asset_id)
                    .collect()
            } else {
                asset_ids
            };

            let start_time = Instant::now();
            let results = client.get_findings_for_assets(project_id, &asset_ids).await;
            println!(
                "Fetched findings for {} assets in {:.2} seconds",
                asset_ids.len(),
                start_time.elapsed().as_secs_f64()
            );

            for (asset_id, findings) in results {
                match findings {
                    Ok(findings) => {
                        println!("\nFindings for asset {}:", asset_id);
                        for finding in findings.iter().take(3) {
                            println!("- {} ({})", finding.finding_name, finding.finding_severity);
                        }
                    }
                    Err(e) => println!("Error fetching findings for asset {}: {}", asset_id, e),
                }
            }
        }
        Command::BulkUpdate { project_id, updates } => {
            let updates = updates
                .iter()
                .map(|spec| parse_update(spec))
                .collect::<Result<Vec<_>>>()?;
            let result = client.bulk_update_findings(project_id, &updates).await;
            println!("Bulk update completed: {}", result);
            for item in result.failed() {
                if let Err(e) = &item.outcome {
                    println!("  {} failed: {}", item.finding_number, e);
                }
            }
            if !result.all_succeeded() {
                return Err(Error::api(format!("bulk update incomplete: {}", result)));
            }
        }
        Command::RiskScore { project_id } => {
            let score = client.get_project_risk_score(project_id).await?;
            println!("Project risk score: {}", score);
        }
        Command::Demo { search_project } => demo(client, search_project).await?,
    }
    Ok(())
}

// Concurrent fetch, the same read twice to show the cache, then a bulk update
async fn demo(client: &AsyncNucleusClient, search_project: u64) -> Result<()> {
    println!("Fetching data concurrently...");
    let start_time = Instant::now();
    let critical = [FindingFilter::severity(Severity::Critical)];
    let (projects, findings) = tokio::join!(
        client.get_projects(),
        client.search_findings(search_project, &critical),
    );
    let (projects, findings) = (projects?, findings?);
    println!(
        "Concurrent fetching completed in {:.2} seconds ({} projects, {} critical findings)",
        start_time.elapsed().as_secs_f64(),
        projects.len(),
        findings.len()
    );

    println!("\nDemonstrating caching...");
    println!("First request (will hit API):");
    let start_time = Instant::now();
    client.get_projects().await?;
    println!("Time taken: {:.2} seconds", start_time.elapsed().as_secs_f64());

    println!("\nSecond request (should hit cache):");
    let start_time = Instant::now();
    client.get_projects().await?;
    println!("Time taken: {:.2} seconds", start_time.elapsed().as_secs_f64());

    if let Some(project) = projects.first() {
        println!("\nPerforming bulk operations on project {}...", project.project_id);
        let result = client
            .bulk_update_findings(project.project_id, &demo_updates())
            .await;
        println!("Bulk update completed: {}", result);
    }
    Ok(())
}

fn demo_updates() -> Vec<FindingUpdate> {
    vec![
        FindingUpdate::status("VULN-001", "In Progress").comment("Working on fix"),
        FindingUpdate::status("VULN-002", "In Progress").comment("Under review"),
    ]
}
