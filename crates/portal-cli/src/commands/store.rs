use anyhow::Result;
use serde_json::json;

use portal_store::{NodeRole, StoreClient, StoreConfig};

use crate::cli::OutputFormat;
use crate::output::{print_value, print_warning};

pub async fn topology(client: &StoreClient, config: &StoreConfig, format: OutputFormat) -> Result<()> {
    let role = client.node_role().await?;
    let writes_to = match &role {
        NodeRole::Master => Some(config.endpoint()),
        NodeRole::Replica { master: Some(addr) } => Some(addr.to_string()),
        NodeRole::Replica { master: None } => None,
    };

    print_value(
        &json!({
            "endpoint": config.endpoint(),
            "database": config.database,
            "role": role.to_string(),
            "writes_to": writes_to,
            "topology_refresh_ms": config.topology_refresh_ms,
        }),
        format,
    );

    if writes_to.is_none() {
        print_warning("The local node is a replica with no known master; session writes will fail");
    }
    Ok(())
}
