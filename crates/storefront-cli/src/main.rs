mod catalog;
mod db;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "storefront-cli")]
#[command(about = "Storefront catalog command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Inspect products
    Products {
        #[command(subcommand)]
        command: ProductCommands,
    },
    /// Inspect variants
    Variants {
        #[command(subcommand)]
        command: VariantCommands,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    Ping,
    Migrate,
    /// Create the demo `TSHIRT-001` product (color × size, auto-generated).
    Seed {
        #[arg(long, default_value_t = 1)]
        seller_id: i64,
    },
}

#[derive(Debug, Subcommand)]
enum ProductCommands {
    List {
        /// Restrict to one seller; all sellers when omitted.
        #[arg(long)]
        seller_id: Option<i64>,
        #[arg(long)]
        page: Option<i64>,
        #[arg(long)]
        page_size: Option<i64>,
    },
    Show {
        product_id: i64,
    },
}

#[derive(Debug, Subcommand)]
enum VariantCommands {
    /// Find the variant matching every `--option name=value`.
    Find {
        product_id: i64,
        #[arg(long = "option", value_parser = catalog::parse_selection_pair)]
        options: Vec<(String, String)>,
    },
    Aggregate {
        product_id: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("storefront-cli ready; run with --help for commands");
        return Ok(());
    };

    let config = storefront_core::load_app_config()?;
    let pool_config = storefront_db::PoolConfig::from_app_config(&config);
    let pool = storefront_db::connect_pool(&config.database_url, pool_config).await?;

    match command {
        Commands::Db { command } => match command {
            DbCommands::Ping => db::run_ping(&pool).await,
            DbCommands::Migrate => db::run_migrate(&pool).await,
            DbCommands::Seed { seller_id } => db::run_seed(&pool, seller_id).await,
        },
        Commands::Products { command } => match command {
            ProductCommands::List {
                seller_id,
                page,
                page_size,
            } => catalog::run_list_products(&pool, seller_id, page, page_size).await,
            ProductCommands::Show { product_id } => {
                catalog::run_show_product(&pool, product_id).await
            }
        },
        Commands::Variants { command } => match command {
            VariantCommands::Find {
                product_id,
                options,
            } => catalog::run_find_variant(&pool, product_id, options).await,
            VariantCommands::Aggregate { product_id } => {
                catalog::run_aggregate(&pool, product_id).await
            }
        },
    }
}
