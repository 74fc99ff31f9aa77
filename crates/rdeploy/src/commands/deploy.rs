//! Deploy command implementation

use camino::{Utf8Path, Utf8PathBuf};
use clap::Args;
use miette::{IntoDiagnostic, Result};

use crate::config::{Config, Target};
use crate::deploy::{DeployContext, DeployHooks, RemoteDeployer};

/// Arguments for the deploy command
#[derive(Debug, Args)]
pub struct DeployArgs {
    /// Deploy target name (as defined in rdeploy.toml)
    pub target: String,

    /// Files to deploy, each sent as its own record
    #[arg(required = true)]
    pub files: Vec<Utf8PathBuf>,

    /// Dry run - build the records and show where they would go
    #[arg(long)]
    pub dry_run: bool,
}

/// Run the deploy command
pub fn run(workspace_root: &Utf8Path, args: DeployArgs) -> Result<()> {
    let workspace_root = workspace_root.canonicalize_utf8().into_diagnostic()?;
    tracing::info!("Loading configuration from {}", workspace_root);

    let config = Config::load(&workspace_root).into_diagnostic()?;

    let target = config.target(&args.target).ok_or_else(|| {
        miette::miette!(
            "Deploy target '{}' not found in rdeploy.toml\n\nAvailable targets: {}",
            args.target,
            if config.deploy.is_empty() {
                "(none configured)".to_string()
            } else {
                config.target_names().join(", ")
            }
        )
    })?;

    if target.hosts.is_empty() {
        tracing::warn!("Target '{}' has no hosts", target.name);
    }

    let deployer = RemoteDeployer::new(DeployContext::from_config(&config, &workspace_root));
    let files = absolute_files(&args.files)?;

    // Hosts are handled one at a time, so a single thread is all we need
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .into_diagnostic()?;

    if args.dry_run {
        return rt.block_on(dry_run(&deployer, &target, &files));
    }

    let hooks = DeployHooks::default().on_completed(|file, target, err| match err {
        None => tracing::debug!("Finished '{}' for target '{}'", file, target.name),
        Some(e) => println!("{}: not deployed ({})", file, e),
    });

    let mut failed = 0;
    for file in &files {
        match rt.block_on(deployer.deploy_file(file, &target, &hooks)) {
            Ok(report) => println!(
                "{}: delivered to {}/{} hosts",
                file,
                report.delivered(),
                report.outcomes.len()
            ),
            Err(_) => failed += 1,
        }
    }

    preparation_result(failed, files.len())?;

    tracing::info!("Deployment complete!");
    Ok(())
}

async fn dry_run(deployer: &RemoteDeployer, target: &Target, files: &[Utf8PathBuf]) -> Result<()> {
    println!("Target: {}", target.name);
    println!("Hosts (in delivery order):");
    for address in deployer.resolve_hosts(target).iter().rev() {
        println!("  - {}", address);
    }

    println!("\nWould deploy the following files:");
    let mut failed = 0;
    for file in files {
        match deployer.prepare(file).await {
            Ok(prepared) => println!(
                "  - {} ({} bytes, {}, {} byte frame)",
                prepared.name,
                prepared.raw_len,
                if prepared.is_compressed { "gzip" } else { "raw" },
                prepared.frame.wire_len()
            ),
            Err(e) => {
                println!("  - {}: not deployed ({})", file, e);
                failed += 1;
            }
        }
    }

    preparation_result(failed, files.len())
}

fn preparation_result(failed: usize, total: usize) -> Result<()> {
    if failed > 0 {
        return Err(miette::miette!(
            "{} of {} files could not be prepared for deployment",
            failed,
            total
        ));
    }
    Ok(())
}

/// Resolve command-line paths against the current directory
///
/// Paths are canonicalized so they line up with the canonical workspace
/// root even when either one is reached through a symlink. A file that does
/// not exist keeps its canonical parent, so the deployment reports it as
/// unreadable rather than outside the root.
fn absolute_files(files: &[Utf8PathBuf]) -> Result<Vec<Utf8PathBuf>> {
    let cwd = std::env::current_dir().into_diagnostic()?;
    let cwd = Utf8PathBuf::try_from(cwd).into_diagnostic()?;

    Ok(files
        .iter()
        .map(|f| {
            let absolute = if f.is_absolute() { f.clone() } else { cwd.join(f) };
            canonicalize_lenient(&absolute)
        })
        .collect())
}

fn canonicalize_lenient(path: &Utf8Path) -> Utf8PathBuf {
    if let Ok(canonical) = path.canonicalize_utf8() {
        return canonical;
    }

    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => parent
            .canonicalize_utf8()
            .map(|p| p.join(name))
            .unwrap_or_else(|_| path.to_path_buf()),
        _ => path.to_path_buf(),
    }
}
