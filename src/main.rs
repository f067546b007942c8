use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use devmarket_client::catalog::{CatalogFilter, Tool, ToolId, BROWSE_CATEGORIES};
use devmarket_client::entitlement::simulated::{
    SimulatedDownloads, SimulatedPayments, SimulatedQuotaService,
};
use devmarket_client::entitlement::ServerSnapshot;
use devmarket_client::{MemoryTokenStore, Session, Settings, TokenStore};
use dotenv::dotenv;
use serde_json::json;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// Listings served to the demo session in place of the catalog service.
fn demo_catalog() -> anyhow::Result<Vec<Tool>> {
    let tools = serde_json::from_value(json!([
        {
            "id": 1,
            "name": "React Component Generator",
            "description": "Automatically generate React components with TypeScript, tests, and stories",
            "price": 29.99, "seller": "CodeCraft Studios", "rating": 4.8, "downloads": 1247,
            "category": "Frontend", "tags": ["React", "TypeScript", "Components"],
            "fileSize": "2.4 MB"
        },
        {
            "id": 2,
            "name": "API Documentation Builder",
            "description": "Generate beautiful API docs from your OpenAPI specifications",
            "price": 0, "seller": "DevTools Inc", "rating": 4.6, "downloads": 892,
            "category": "Backend", "tags": ["API", "Documentation", "OpenAPI"],
            "purchased": true, "fileSize": "1.8 MB"
        },
        {
            "id": 3,
            "name": "Docker Compose Templates",
            "description": "Pre-configured Docker Compose files for popular development stacks",
            "price": 15.99, "seller": "CloudNinja", "rating": 4.9, "downloads": 2156,
            "category": "DevOps", "tags": ["Docker", "DevOps", "Templates"]
        },
        {
            "id": 7,
            "name": "Vue 3 Dashboard Template",
            "description": "Modern dashboard template with Vue 3, TypeScript, and Tailwind CSS",
            "price": 49.99, "seller": "VueExpert", "rating": 4.9, "downloads": 310,
            "category": "Frontend", "tags": ["Vue", "Dashboard", "Template"],
            "purchased": true, "status": "expired", "fileSize": "5.7 MB"
        }
    ]))?;
    Ok(tools)
}

fn demo_snapshot() -> anyhow::Result<ServerSnapshot> {
    let snapshot = serde_json::from_value(json!({
        "user": {
            "id": "demo-user",
            "name": "John Doe",
            "plan": "Pro",
            "quota": {"used": 8, "limit": 10, "resetDate": "2024-10-01"}
        },
        "entitlements": [
            {"toolId": 7, "purchased": true, "status": "expired", "downloadCount": 2}
        ]
    }))?;
    Ok(snapshot)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    let config = Settings::new().context("loading configuration")?;
    info!("Configuration loaded ({} environment)", config.environment);

    let latency = Duration::from_millis(config.downloads.simulated_latency_ms);
    let tokens = Arc::new(MemoryTokenStore::new());
    tokens.store("demo-token").await?;

    let session = Session::with_services(
        config,
        Arc::new(SimulatedPayments::new(latency)),
        Arc::new(SimulatedDownloads::new(latency)),
        Arc::new(SimulatedQuotaService::new(demo_snapshot()?)),
        tokens,
    )?;

    session.tracker.load_catalog(demo_catalog()?).await;
    let user = session
        .restore()
        .await?
        .context("demo token should restore a session")?;
    info!("Signed in as {} ({} plan)", user.name, user.plan);

    for category in BROWSE_CATEGORIES {
        let count = session.tracker.browse(&CatalogFilter::new().category(category)).await.len();
        info!("{}: {} tools", category, count);
    }

    for tool in session.tracker.browse(&CatalogFilter::new().category("Frontend")).await {
        info!(
            "[{}] {} - ${:.2} (purchased: {})",
            tool.category, tool.name, tool.price, tool.purchased
        );
    }

    let steps: [(&str, ToolId); 5] = [
        ("download", ToolId(2)),
        ("download", ToolId(3)),
        ("purchase", ToolId(3)),
        ("download", ToolId(3)),
        ("download", ToolId(7)),
    ];
    for (action, tool_id) in steps {
        let result = match action {
            "purchase" => session.tracker.attempt_purchase(tool_id).await,
            _ => session.tracker.attempt_download(tool_id).await,
        };
        match result {
            Ok(entitlement) => info!(
                "{} of tool {} succeeded ({} downloads)",
                action, tool_id, entitlement.download_count
            ),
            Err(e) => error!("{} of tool {} failed: {}", action, tool_id, e.user_message()),
        }
    }

    // the quota is used up by now
    if let Err(e) = session.tracker.attempt_download(ToolId(2)).await {
        error!("download of tool 2 failed: {}", e.user_message());
    }

    if let Some(quota) = session.tracker.quota().await {
        info!("Quota used: {}/{}", quota.used, quota.limit);
    }
    if session.quota_warning().await {
        info!("You're running low on downloads. Consider upgrading your plan.");
    }
    for (tool, entitlement) in session.tracker.purchased_tools().await {
        info!(
            "Purchased: {} [{:?}] downloaded {} times",
            tool.name, tool.status, entitlement.download_count
        );
    }
    for record in session.tracker.history().await {
        info!(
            "{} {} {:?}",
            record.download_date.format("%Y-%m-%d %H:%M:%S"),
            record.tool_name,
            record.status
        );
    }

    session.logout().await?;
    Ok(())
}
