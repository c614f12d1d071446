use anyhow::Result;

use super::Context;

pub async fn list(ctx: &Context) -> Result<()> {
    let nodes = ctx.client.list_nodes().await?;

    println!("{:<22} {:<15} {:<8} NAME", "ID", "TYPE", "ENABLED");
    for node in nodes {
        let kind = kind_label(&node.kind);
        let enabled = if node.enabled { "yes" } else { "no" };
        println!("{:<22} {:<15} {:<8} {}", node.id, kind, enabled, node.name);
    }
    Ok(())
}

pub async fn set_enabled(ctx: &Context, node_id: &str, enabled: bool) -> Result<()> {
    let node = ctx.client.set_node_enabled(node_id, enabled).await?;
    let action = if node.enabled { "enabled" } else { "disabled" };
    println!("✓ Node {} {}", node.id, action);
    Ok(())
}

fn kind_label(kind: &mscan_core::workflow::NodeKind) -> &'static str {
    use mscan_core::workflow::NodeKind;
    match kind {
        NodeKind::GoogleSearch => "google_search",
        NodeKind::PdfAnalysis => "pdf_analysis",
        NodeKind::ReportWriter => "report_writer",
    }
}
