use std::{fs, path::PathBuf, sync::Arc};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use shared::{
    domain::{FieldMap, ProductTag},
    steps::StepKind,
};
use storage::{ResolutionStore, SqliteStore};
use workflow::WorkflowClient;

#[derive(Parser, Debug)]
#[command(about = "Console driver for the GST bridge gateway")]
struct Args {
    #[arg(long, default_value = "http://127.0.0.1:8071")]
    gateway_url: String,
    /// SQLite file holding this session's workflow records and credentials.
    #[arg(long, default_value = "./data/console.db")]
    store: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log into a product line (invoice or waybill).
    Login {
        #[arg(long)]
        product: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Drop the credential for a product line.
    Logout {
        #[arg(long)]
        product: String,
    },
    /// Preview the hydrated payload for a step without submitting it.
    Hydrate {
        #[arg(long)]
        step: String,
        /// JSON object file standing in for the screen's form values.
        #[arg(long)]
        form: Option<PathBuf>,
    },
    /// Run a workflow step: hydrate, submit, persist on success.
    Step {
        #[arg(long)]
        step: String,
        #[arg(long)]
        form: Option<PathBuf>,
    },
    /// Download the rendered document for an id.
    Print {
        #[arg(long)]
        product: String,
        #[arg(long)]
        id: String,
        /// Output path; defaults to the document's own filename.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Show the stored record at a workflow key.
    Show { key: String },
    /// Full session reset: drop every record and both credentials.
    Reset,
}

fn parse_product(raw: &str) -> Result<ProductTag> {
    ProductTag::parse(raw)
        .ok_or_else(|| anyhow!("unknown product '{raw}'; expected 'invoice' or 'waybill'"))
}

fn parse_step(raw: &str) -> Result<StepKind> {
    Ok(match raw {
        "issue" => StepKind::IssueInvoice,
        "ewb-by-irn" => StepKind::EwbFromInvoice,
        "generate" => StepKind::GenerateEwb,
        "consolidate" => StepKind::ConsolidateEwb,
        "multi-vehicle" => StepKind::SplitMultiVehicle,
        "upload" => StepKind::UploadBatch,
        other => bail!(
            "unknown step '{other}'; expected one of issue, ewb-by-irn, generate, consolidate, multi-vehicle, upload"
        ),
    })
}

fn load_form(path: Option<&PathBuf>) -> Result<FieldMap> {
    let Some(path) = path else {
        return Ok(FieldMap::new());
    };
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read form file '{}'", path.display()))?;
    serde_json::from_str::<FieldMap>(&raw)
        .with_context(|| format!("form file '{}' is not a JSON object", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();

    let database_url = format!("sqlite://{}", args.store.replace('\\', "/"));
    let sqlite = SqliteStore::new(&database_url).await?;
    let store = ResolutionStore::new(Arc::new(sqlite));
    let client = WorkflowClient::new(args.gateway_url, store.clone());

    match args.command {
        Command::Login {
            product,
            email,
            password,
        } => {
            let product = parse_product(&product)?;
            let credential = client.login(product, &email, &password).await?;
            println!(
                "Logged into {product} as company {} (session {})",
                credential.company_id, credential.session_id
            );
        }
        Command::Logout { product } => {
            let product = parse_product(&product)?;
            client.logout(product).await?;
            println!("Logged out of {product}");
        }
        Command::Hydrate { step, form } => {
            let step = parse_step(&step)?;
            let form = load_form(form.as_ref())?;
            let payload = client.hydrate(step, &form).await;
            println!("{}", serde_json::to_string_pretty(&payload)?);
        }
        Command::Step { step, form } => {
            let step = parse_step(&step)?;
            let form = load_form(form.as_ref())?;
            let persisted = client.run_step(step, &form).await?;
            println!(
                "Step succeeded; persisted at '{}':\n{}",
                step.record_key(),
                serde_json::to_string_pretty(&persisted)?
            );
        }
        Command::Print { product, id, out } => {
            let product = parse_product(&product)?;
            let document = client.download(product, "print", &id).await?;
            let path = out.unwrap_or_else(|| PathBuf::from(&document.filename));
            fs::write(&path, &document.bytes)
                .with_context(|| format!("failed to write '{}'", path.display()))?;
            println!(
                "Saved {} ({}, {} bytes)",
                path.display(),
                document.content_type,
                document.bytes.len()
            );
        }
        Command::Show { key } => match store.get_record(&key).await {
            Some(record) => {
                println!(
                    "# created {} under {}",
                    record.created_at, record.credential_key
                );
                println!("{}", serde_json::to_string_pretty(&record.fields)?);
            }
            None => println!("no record at '{key}'"),
        },
        Command::Reset => {
            store.reset().await?;
            println!("Session reset; all records and credentials dropped");
        }
    }

    Ok(())
}
