use anyhow::Result;
use clap::Parser;
use std::path::Path;
use std::process::ExitCode;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

mod app;
mod batch;
mod cli;
mod config;
mod enrich;
mod errors;
mod log;
mod merge;
mod plan;
mod prompt;
mod provider;
mod state;
mod ux;
mod wire;

use cli::{Args, Command};
use errors::{user_message, FlowError};
use prompt::{AdRequest, FitnessProfile};
use provider::Provider;
use state::PlanStore;

// All generation work shares one cooperative thread; the plan store is only
// touched from here.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    log::init_tracing(args.debug);

    let mut cfg = config::Config::load(args.config.as_deref().map(Path::new))?;
    args.apply_to(&mut cfg);
    cfg.resolve_credential(|var| std::env::var(var).ok());

    let prov = provider::make_provider(&cfg)?;
    info!(provider = ?cfg.provider, text_model = %cfg.text_model, image_model = %cfg.image_model, "backend configured");

    let outcome = match &args.command {
        Command::Plan(p) => run_plan(&*prov, &cfg, &FitnessProfile::from(p), !args.no_progress).await?,
        Command::Ads(a) => run_ads(&*prov, &cfg, &AdRequest::from(a)).await?,
    };

    match outcome {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(err) => {
            if let FlowError::MalformedResponse { raw, reason } = &err {
                error!(%reason, raw_bytes = raw.len(), "plan response rejected");
            }
            eprintln!("{}", user_message(&err));
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Outer `Result` is for local I/O trouble; the inner one is the flow outcome
/// shown to the user.
async fn run_plan(
    prov: &dyn Provider,
    cfg: &config::Config,
    profile: &FitnessProfile,
    progress: bool,
) -> Result<Result<(), FlowError>> {
    let store = PlanStore::new();
    let generated = match app::generate_plan(prov, &store, profile).await {
        Ok(g) => g,
        Err(e) => return Ok(Err(e)),
    };

    // First render: structure only, every exercise still pending.
    println!("{}", ux::render_plan(&generated.plan));

    let mut run = if cfg.save_outputs {
        let mut run = log::RunDir::create(Path::new(&cfg.out_dir), "plan")?;
        run.save_raw_response(&generated.raw)?;
        Some(run)
    } else {
        None
    };

    let bar = ux::enrichment_progress(generated.plan.exercise_count(), progress);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut snapshots = store.subscribe();
    let watch = async {
        while let Some(event) = rx.recv().await {
            let ready = snapshots.borrow_and_update().as_ref().map_or(0, |p| p.enriched_count());
            ux::track(&bar, &event, ready);
        }
    };
    let (report, ()) = tokio::join!(
        app::enrich_plan(prov, &store, &generated, &cfg.image_mime_type, tx),
        watch
    );
    bar.finish_and_clear();

    if let Some(final_plan) = store.snapshot() {
        println!("{}", ux::render_plan(&final_plan));
        if let Some(run) = run.as_mut() {
            run.save_plan(&final_plan)?;
        }
    } else {
        warn!("plan was superseded before it could be shown");
    }
    println!("{}", ux::render_report(&report));

    if let Some(run) = run {
        let dir = run.finish()?;
        println!("Saved to {}", dir.display());
    }
    Ok(Ok(()))
}

async fn run_ads(prov: &dyn Provider, cfg: &config::Config, request: &AdRequest) -> Result<Result<(), FlowError>> {
    println!("Generating {} formats...", prompt::ad_formats().len());
    let images = match app::generate_ads(prov, request, &cfg.image_mime_type).await {
        Ok(images) => images,
        Err(e) => return Ok(Err(e)),
    };
    println!("{}", ux::render_batch(&request.title, &images));

    if cfg.save_outputs {
        let mut run = log::RunDir::create(Path::new(&cfg.out_dir), "ads")?;
        run.save_batch(&request.title, &images)?;
        let dir = run.finish()?;
        println!("Saved to {}", dir.display());
    }
    Ok(Ok(()))
}
