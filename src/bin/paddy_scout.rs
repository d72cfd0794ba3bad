//! paddy_scout - Analyze field images for paddy and weeds.
//!
//! Images are sent to the detection service; results are summarized, scored
//! for field-health risk, and kept in a short local history.

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::io::IsTerminal;
use std::path::PathBuf;

use paddy_scout::controller::RiskPage;
use paddy_scout::{
    field_advice, report, AppConfig, Controller, HttpInferenceClient, SqliteStateStore,
};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(
    name = "paddy_scout",
    about = "Detect paddy and weeds in field images and assess field health risk"
)]
struct Args {
    /// Detection service base URL (overrides config)
    #[arg(long, value_name = "URL")]
    service_url: Option<String>,

    /// Local state database holding the detection history (overrides config)
    #[arg(long, value_name = "PATH")]
    state_db: Option<String>,

    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze an image (PNG, JPG or WEBP, up to 16 MB)
    Analyze {
        #[arg(value_name = "IMAGE")]
        image: PathBuf,

        /// Write the image with detection boxes drawn on it
        #[arg(long, value_name = "PATH")]
        annotate: Option<PathBuf>,

        /// Also print the risk assessment
        #[arg(long)]
        risk: bool,
    },
    /// Browse or clear the detection history
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
    /// Risk assessment of the active result
    Risk,
    /// Show which model the detection service runs
    ModelInfo,
}

#[derive(Subcommand, Debug)]
enum HistoryAction {
    /// List stored analyses, most recent first
    List,
    /// Show the full result of one entry (1 = most recent)
    Show { position: usize },
    /// Make an entry the active result and show its risk assessment
    Risk { position: usize },
    /// Remove all history
    Clear,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = ui::Ui::from_args(&args.ui, is_tty, stdout_is_tty);

    let mut cfg = AppConfig::load()?;
    if let Some(url) = args.service_url {
        cfg.service_url = url;
    }
    if let Some(path) = args.state_db {
        cfg.state_db_path = path;
    }

    let client = HttpInferenceClient::from_config(&cfg)?;
    let store = SqliteStateStore::open(&cfg.state_db_path)?;
    let mut controller = Controller::new(client, store)?;

    match args.command {
        Command::Analyze {
            image,
            annotate,
            risk,
        } => {
            controller.select_file(&image)?;
            let result = {
                let _stage = ui.stage("Analyze image");
                controller.analyze()?.clone()
            };
            println!("{}", report::analysis_summary(&result));
            if let Some(reference) = result.predicted_image() {
                match controller.client().resolve_image_ref(reference) {
                    Ok(url) => println!("Service rendering: {}", url),
                    Err(err) => log::warn!("{:#}", err),
                }
            }
            if let Some(notice) = &controller.state().notice {
                println!("{}", notice);
            }
            if !result.is_empty() {
                println!();
                print!(
                    "{}",
                    report::field_advice(&field_advice(result.crop_count(), result.weed_count()))
                );
            }
            if let Some(out) = annotate {
                let _stage = ui.stage("Draw detections");
                controller.annotate(&out)?;
                println!("Annotated image written to {}", out.display());
            }
            if risk {
                println!();
                print!("{}", report::risk_page(Some(&RiskPage::for_result(&result))));
            }
        }
        Command::History { action } => match action {
            HistoryAction::List => print!("{}", report::history_table(controller.view_history())),
            HistoryAction::Show { position } => {
                let entry = controller
                    .history()
                    .get(to_index(position)?)
                    .ok_or_else(|| anyhow!("no history entry at position {}", position))?;
                print!("{}", report::analysis_summary(&entry.full_result));
            }
            HistoryAction::Risk { position } => {
                let page = controller.select_for_risk(to_index(position)?)?;
                print!("{}", report::risk_page(Some(&page)));
            }
            HistoryAction::Clear => {
                controller.clear_history()?;
                print!("{}", report::history_table(controller.view_history()));
            }
        },
        Command::Risk => print!("{}", report::risk_page(controller.risk_report().as_ref())),
        Command::ModelInfo => {
            let info = {
                let _stage = ui.stage("Query model info");
                controller.client().model_info()?
            };
            print!("{}", report::model_info(&info));
        }
    }
    Ok(())
}

fn to_index(position: usize) -> Result<usize> {
    position
        .checked_sub(1)
        .ok_or_else(|| anyhow!("history positions start at 1"))
}
