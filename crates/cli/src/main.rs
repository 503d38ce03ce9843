//! stockledger CLI: migrations, reference data, stock movements and reports.
//!
//! # Usage
//!
//! ```bash
//! # Apply the schema
//! stockledger migrate
//!
//! # Receive and issue stock (actor from --actor or STOCKLEDGER_ACTOR)
//! stockledger receive --product <uuid> --warehouse <uuid> --quantity 100 --reference PO-17
//! stockledger issue --product <uuid> --warehouse <uuid> --quantity 30 --key req-42
//!
//! # Current stock, history, reports
//! stockledger stock --product <uuid>
//! stockledger history --product <uuid> --kind out --from 2026-01-01
//! stockledger report valuation
//! ```
//!
//! Configuration comes from `config/{environment}.toml` and `STOCKLEDGER__*`
//! environment variables. Results are printed to stdout as JSON; logs go to
//! stderr.

#![cfg_attr(not(test), forbid(unsafe_code))]

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

use stockledger_core::{CategoryId, ProductId, UnitId, UserId, WarehouseId};
use stockledger_infra::MovementFilter;
use stockledger_inventory::{MovementKind, MovementRequest, ProductDraft, StockQuery};
use stockledger_observability::LogFormat;

mod commands;

#[derive(Parser)]
#[command(name = "stockledger")]
#[command(author, version, about = "Inventory stock-movement ledger")]
struct Cli {
    /// Log output format (json or pretty)
    #[arg(long, global = true, env = "STOCKLEDGER_LOG_FORMAT", default_value = "pretty")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Manage reference data
    Catalog {
        #[command(subcommand)]
        action: CatalogAction,
    },
    /// Record a stock-in movement
    Receive(MovementArgs),
    /// Record a stock-out movement (rejected if stock does not cover it)
    Issue(MovementArgs),
    /// Show current (or historical) stock of a product
    Stock {
        #[arg(long)]
        product: ProductId,

        /// Limit to one warehouse
        #[arg(long)]
        warehouse: Option<WarehouseId>,

        /// Stock as of this instant (RFC 3339), inclusive
        #[arg(long)]
        as_of: Option<DateTime<Utc>>,
    },
    /// List movements, newest first
    History(HistoryArgs),
    /// Reporting views
    Report {
        #[command(subcommand)]
        view: ReportView,
    },
}

#[derive(clap::Args)]
struct MovementArgs {
    #[arg(long)]
    product: ProductId,

    #[arg(long)]
    warehouse: WarehouseId,

    /// Units to move; must be positive
    #[arg(long, allow_negative_numbers = true)]
    quantity: i64,

    /// External document (PO, SO, ...)
    #[arg(long)]
    reference: Option<String>,

    #[arg(long)]
    notes: Option<String>,

    /// Idempotency key; a retry with the same key returns the original movement
    #[arg(long)]
    key: Option<String>,

    /// Acting user id
    #[arg(long, env = "STOCKLEDGER_ACTOR")]
    actor: UserId,
}

impl MovementArgs {
    fn into_request(self) -> MovementRequest {
        MovementRequest {
            product_id: self.product,
            warehouse_id: self.warehouse,
            quantity: self.quantity,
            reference: self.reference,
            notes: self.notes,
            idempotency_key: self.key,
        }
    }
}

#[derive(clap::Args)]
struct HistoryArgs {
    #[arg(long)]
    product: Option<ProductId>,

    #[arg(long)]
    warehouse: Option<WarehouseId>,

    /// IN or OUT
    #[arg(long)]
    kind: Option<MovementKind>,

    #[arg(long)]
    actor: Option<UserId>,

    /// First day (inclusive, YYYY-MM-DD)
    #[arg(long)]
    from: Option<NaiveDate>,

    /// Last day (inclusive, YYYY-MM-DD)
    #[arg(long)]
    to: Option<NaiveDate>,

    #[arg(long)]
    limit: Option<u32>,

    #[arg(long)]
    offset: Option<u32>,
}

#[derive(Subcommand)]
enum CatalogAction {
    /// Add a product category
    AddCategory {
        #[arg(long)]
        name: String,
    },
    /// Add a unit of measure
    AddUnit {
        #[arg(long)]
        name: String,

        #[arg(long)]
        abbreviation: String,
    },
    /// Add a warehouse
    AddWarehouse {
        #[arg(long)]
        name: String,

        #[arg(long)]
        location: Option<String>,

        /// Register as inactive
        #[arg(long)]
        inactive: bool,
    },
    /// Add a product
    AddProduct {
        #[arg(long)]
        sku: String,

        #[arg(long)]
        name: String,

        #[arg(long)]
        category: CategoryId,

        #[arg(long)]
        unit: UnitId,

        #[arg(long)]
        cost_price: Decimal,

        #[arg(long)]
        sell_price: Decimal,

        #[arg(long, default_value_t = 0)]
        min_stock: i64,
    },
    /// Delete a product that has no movements
    RemoveProduct {
        #[arg(long)]
        product: ProductId,
    },
    /// List products
    Products,
    /// List warehouses
    Warehouses,
}

#[derive(Subcommand)]
enum ReportView {
    /// Stock valued at cost price
    Valuation,
    /// Daily IN/OUT totals for the configured number of days
    Trend {
        /// Last day of the window (defaults to today, UTC)
        #[arg(long)]
        today: Option<NaiveDate>,
    },
    /// Stock value and units per category
    Categories,
    /// Net stock per warehouse
    Warehouses,
    /// Products at or below their minimum stock
    LowStock,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    stockledger_observability::init_with(
        cli.log_format,
        stockledger_observability::tracing::DEFAULT_FILTER,
    );

    if let Err(e) = run(cli).await {
        tracing::error!("command failed: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let ctx = commands::Context::connect().await?;

    match cli.command {
        Commands::Migrate => commands::migrate(&ctx).await?,
        Commands::Catalog { action } => match action {
            CatalogAction::AddCategory { name } => {
                commands::catalog::add_category(&ctx, &name).await?;
            }
            CatalogAction::AddUnit { name, abbreviation } => {
                commands::catalog::add_unit(&ctx, &name, &abbreviation).await?;
            }
            CatalogAction::AddWarehouse {
                name,
                location,
                inactive,
            } => {
                commands::catalog::add_warehouse(&ctx, &name, location, !inactive).await?;
            }
            CatalogAction::AddProduct {
                sku,
                name,
                category,
                unit,
                cost_price,
                sell_price,
                min_stock,
            } => {
                let draft = ProductDraft {
                    sku,
                    name,
                    category_id: category,
                    unit_id: unit,
                    cost_price,
                    sell_price,
                    min_stock,
                };
                commands::catalog::add_product(&ctx, draft).await?;
            }
            CatalogAction::RemoveProduct { product } => {
                commands::catalog::remove_product(&ctx, product).await?;
            }
            CatalogAction::Products => commands::catalog::list_products(&ctx).await?,
            CatalogAction::Warehouses => commands::catalog::list_warehouses(&ctx).await?,
        },
        Commands::Receive(args) => {
            let actor = args.actor;
            commands::movement::record(&ctx, MovementKind::In, args.into_request(), actor).await?;
        }
        Commands::Issue(args) => {
            let actor = args.actor;
            commands::movement::record(&ctx, MovementKind::Out, args.into_request(), actor).await?;
        }
        Commands::Stock {
            product,
            warehouse,
            as_of,
        } => {
            let mut query = StockQuery::product(product);
            if let Some(w) = warehouse {
                query = query.in_warehouse(w);
            }
            if let Some(at) = as_of {
                query = query.as_of(at);
            }
            commands::movement::stock(&ctx, query).await?;
        }
        Commands::History(args) => {
            let filter = MovementFilter {
                product_id: args.product,
                warehouse_id: args.warehouse,
                kind: args.kind,
                user_id: args.actor,
                start_date: args.from,
                end_date: args.to,
            };
            commands::report::history(&ctx, filter, args.limit, args.offset).await?;
        }
        Commands::Report { view } => match view {
            ReportView::Valuation => commands::report::valuation(&ctx).await?,
            ReportView::Trend { today } => {
                let today = today.unwrap_or_else(|| Utc::now().date_naive());
                commands::report::trend(&ctx, today).await?;
            }
            ReportView::Categories => commands::report::categories(&ctx).await?,
            ReportView::Warehouses => commands::report::warehouses(&ctx).await?,
            ReportView::LowStock => commands::report::low_stock(&ctx).await?,
        },
    }
    Ok(())
}
