//! History and reporting views.

use chrono::NaiveDate;

use stockledger_infra::MovementFilter;

use super::{Context, print_json};

pub async fn history(
    ctx: &Context,
    filter: MovementFilter,
    limit: Option<u32>,
    offset: Option<u32>,
) -> anyhow::Result<()> {
    let page = ctx.reports().movement_history(filter, limit, offset).await?;
    print_json(&page)
}

pub async fn valuation(ctx: &Context) -> anyhow::Result<()> {
    print_json(&ctx.reports().valuation().await?)
}

pub async fn trend(ctx: &Context, today: NaiveDate) -> anyhow::Result<()> {
    print_json(&ctx.reports().stock_trend(today).await?)
}

pub async fn categories(ctx: &Context) -> anyhow::Result<()> {
    print_json(&ctx.reports().category_distribution().await?)
}

pub async fn warehouses(ctx: &Context) -> anyhow::Result<()> {
    print_json(&ctx.reports().warehouse_comparison().await?)
}

pub async fn low_stock(ctx: &Context) -> anyhow::Result<()> {
    print_json(&ctx.reports().low_stock().await?)
}
