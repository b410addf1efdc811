//! Bare-metal node resource classes.

use tracing::{info, warn};

use crate::error::Result;
use crate::openstack::BareMetalApi;

/// Resource class given to nodes that have none.
pub const DEFAULT_NODE_RESOURCE_CLASS: &str = "baremetal";

/// Sets the default resource class on every node without one.
///
/// Nodes with another class are left as they are, with a warning.
///
/// # Errors
///
/// Returns any API error.
pub async fn ensure_node_resource_classes<B: BareMetalApi + ?Sized>(baremetal: &B) -> Result<usize> {
    let mut updated = 0;
    for node in baremetal.list_nodes().await? {
        match node.resource_class.as_deref() {
            Some(class) if !class.is_empty() => {
                if class != DEFAULT_NODE_RESOURCE_CLASS {
                    warn!(
                        "Node {} is using a resource class {class} instead of the default \
                         {DEFAULT_NODE_RESOURCE_CLASS}. Make sure you use the correct flavor for it.",
                        node.uuid
                    );
                }
            }
            _ => {
                baremetal
                    .set_resource_class(&node.uuid, DEFAULT_NODE_RESOURCE_CLASS)
                    .await?;
                info!(
                    "Node {} resource class was set to {DEFAULT_NODE_RESOURCE_CLASS}",
                    node.uuid
                );
                updated += 1;
            }
        }
    }
    Ok(updated)
}
