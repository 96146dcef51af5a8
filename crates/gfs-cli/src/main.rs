use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use gfs_config::{ConfigConsumer, ServiceConfig, UnusedKeyPolicy};
use gfs_db::PgStore;
use gfs_schemas::{
    GeneratorInfo, InstallData, InstallOrder, InstallOrderStatus, InstallType, Quote,
};
use gfs_workflow::{TransitionEngine, TransitionError, WorkflowRecords};

#[derive(Parser)]
#[command(name = "gfs")]
#[command(about = "Generator field service operator CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> env -> local)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Quote lifecycle
    Quote {
        #[command(subcommand)]
        cmd: QuoteCmd,
    },

    /// Install orders (read-only)
    Install {
        #[command(subcommand)]
        cmd: InstallCmd,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    Status,
    /// Apply embedded SQL migrations.
    Migrate,
}

#[derive(Subcommand)]
enum QuoteCmd {
    /// Print one quote
    Show {
        #[arg(long)]
        id: i64,
    },

    /// Approve a quote (draft|pending -> approved)
    Approve {
        #[arg(long)]
        id: i64,

        /// Operator id recorded as approved_by
        #[arg(long = "as")]
        actor: String,
    },

    /// Convert an approved quote into its install order
    Convert {
        #[arg(long)]
        id: i64,

        /// Operator id recorded as created_by
        #[arg(long = "as")]
        actor: String,

        #[arg(long)]
        customer_id: i64,

        #[arg(long, value_enum, default_value_t = InstallTypeArg::NewInstall)]
        install_type: InstallTypeArg,

        /// Generator brand (requires --model)
        #[arg(long, requires = "model")]
        brand: Option<String>,

        /// Generator model (requires --brand)
        #[arg(long, requires = "brand")]
        model: Option<String>,

        /// Generator feature, repeatable
        #[arg(long = "feature")]
        features: Vec<String>,

        #[arg(long)]
        material_cost: Option<f64>,

        #[arg(long)]
        labor_cost: Option<f64>,

        #[arg(long)]
        total_cost: Option<f64>,
    },
}

#[derive(Subcommand)]
enum InstallCmd {
    /// List install orders, newest first
    List {
        /// pending | in_progress | completed
        #[arg(long)]
        status: Option<String>,
    },

    /// Print one install order
    Show {
        #[arg(long)]
        id: i64,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum InstallTypeArg {
    NewInstall,
    Replacement,
    Upgrade,
}

impl From<InstallTypeArg> for InstallType {
    fn from(a: InstallTypeArg) -> Self {
        match a {
            InstallTypeArg::NewInstall => InstallType::NewInstall,
            InstallTypeArg::Replacement => InstallType::Replacement,
            InstallTypeArg::Upgrade => InstallType::Upgrade,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");

    // stderr only: stdout is key=value output for scripts.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Db { cmd } => {
            let pool = connect().await?;
            match cmd {
                DbCmd::Status => {
                    let s = gfs_db::status(&pool).await?;
                    println!(
                        "db_ok={} has_quotes_table={} has_install_orders_table={}",
                        s.ok, s.has_quotes_table, s.has_install_orders_table
                    );
                }
                DbCmd::Migrate => {
                    gfs_db::migrate(&pool).await?;
                    println!("migrations_applied=true");
                }
            }
        }

        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = gfs_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Quote { cmd } => {
            let engine = engine().await?;
            match cmd {
                QuoteCmd::Show { id } => {
                    let q = engine
                        .store()
                        .fetch_quote(id)
                        .await?
                        .with_context(|| format!("quote {id} not found"))?;
                    print_quote(&q);
                }
                QuoteCmd::Approve { id, actor } => {
                    let q = engine
                        .approve_quote(id, &actor)
                        .await
                        .map_err(|e| refused("approve", id, e))?;
                    println!("approved=true");
                    print_quote(&q);
                }
                QuoteCmd::Convert {
                    id,
                    actor,
                    customer_id,
                    install_type,
                    brand,
                    model,
                    features,
                    material_cost,
                    labor_cost,
                    total_cost,
                } => {
                    let mut data = InstallData::new(customer_id, actor);
                    data.install_type = install_type.into();
                    data.generator_info = match (brand, model) {
                        (Some(brand), Some(model)) => Some(GeneratorInfo {
                            brand,
                            model,
                            features,
                        }),
                        _ if !features.is_empty() => {
                            bail!("--feature requires --brand and --model")
                        }
                        _ => None,
                    };
                    data.material_cost = material_cost;
                    data.labor_cost = labor_cost;
                    data.total_cost = total_cost;

                    let order = engine
                        .convert_quote_to_install(id, data)
                        .await
                        .map_err(|e| refused("convert", id, e))?;
                    println!("converted=true");
                    print_install_order(&order);
                }
            }
        }

        Commands::Install { cmd } => {
            let engine = engine().await?;
            match cmd {
                InstallCmd::List { status } => {
                    let status = status
                        .as_deref()
                        .map(InstallOrderStatus::parse)
                        .transpose()?;
                    let orders = engine.store().list_install_orders(status).await?;
                    println!("count={}", orders.len());
                    for o in &orders {
                        println!(
                            "id={} order_number={} quote_id={} status={} created_at={}",
                            o.id,
                            o.order_number,
                            o.quote_id,
                            o.status.as_str(),
                            o.created_at.to_rfc3339()
                        );
                    }
                }
                InstallCmd::Show { id } => {
                    let o = engine
                        .store()
                        .fetch_install_order(id)
                        .await?
                        .with_context(|| format!("install order {id} not found"))?;
                    print_install_order(&o);
                }
            }
        }
    }

    Ok(())
}

/// Connect using GFS_CONFIG layers (or defaults) and the env var they name.
async fn connect() -> Result<gfs_db::PgPool> {
    let paths = gfs_config::config_paths_from_env();
    let cfg = if paths.is_empty() {
        ServiceConfig::default()
    } else {
        let path_refs: Vec<&str> = paths.iter().map(String::as_str).collect();
        let loaded = gfs_config::load_layered_yaml(&path_refs)?;
        gfs_config::report_unused_keys(
            ConfigConsumer::Cli,
            &loaded.config_json,
            UnusedKeyPolicy::Warn,
        )?;
        ServiceConfig::from_config_json(&loaded.config_json)?
    };

    let secrets = gfs_config::resolve_secrets(&cfg)?;
    let pool = gfs_db::connect(&secrets.database_url, cfg.database.max_connections).await?;
    Ok(pool)
}

async fn engine() -> Result<TransitionEngine<PgStore>> {
    let pool = connect().await?;
    Ok(TransitionEngine::new(PgStore::new(pool)))
}

fn refused(op: &str, quote_id: i64, e: TransitionError) -> anyhow::Error {
    anyhow::anyhow!(
        "QUOTE_{}_REFUSED quote_id={} kind={}: {}",
        op.to_ascii_uppercase(),
        quote_id,
        e.kind().as_str(),
        e
    )
}

fn print_quote(q: &Quote) {
    println!("quote_id={}", q.id);
    println!("customer_id={}", opt(&q.customer_id));
    println!("quote_status={}", q.quote_status.as_str());
    println!("converted_to_install={}", q.converted_to_install);
    println!("install_order_id={}", opt(&q.install_order_id));
    println!("approval_date={}", opt_dt(&q.approval_date));
    println!("approved_by={}", q.approved_by.as_deref().unwrap_or(""));
    println!("updated_at={}", q.updated_at.to_rfc3339());
}

fn print_install_order(o: &InstallOrder) {
    println!("install_order_id={}", o.id);
    println!("order_number={}", o.order_number);
    println!("quote_id={}", o.quote_id);
    println!("customer_id={}", o.customer_id);
    println!("status={}", o.status.as_str());
    println!("install_type={}", o.install_type.as_str());
    if let Some(g) = &o.generator_info {
        println!("generator={} {}", g.brand, g.model);
    }
    println!("material_cost={}", opt(&o.material_cost));
    println!("labor_cost={}", opt(&o.labor_cost));
    println!("total_cost={}", opt(&o.total_cost));
    println!("created_by={}", o.created_by);
    println!("created_at={}", o.created_at.to_rfc3339());
}

fn opt<T: std::fmt::Display>(v: &Option<T>) -> String {
    v.as_ref().map(|x| x.to_string()).unwrap_or_default()
}

fn opt_dt(dt: &Option<DateTime<Utc>>) -> String {
    dt.as_ref().map(|d| d.to_rfc3339()).unwrap_or_default()
}
