//! Office and category lookups.

use crate::activity::CategorySpec;
use crate::error::IngestError;
use crate::store::{categories, offices, Resolution, SqlValue, Store};
use tracing::info;
use uuid::Uuid;

/// Look up an office by exact name. Offices are provisioned by hand and never
/// created here, so a typo fails loudly instead of forking the dimension.
pub async fn resolve_office<S: Store + ?Sized>(
    store: &mut S,
    name: &str,
) -> Result<Uuid, IngestError> {
    store
        .find_id(&offices(), &[("name", SqlValue::text(name))])
        .await?
        .ok_or_else(|| IngestError::UnknownOffice(name.to_string()))
}

/// Look up a category by exact name, creating it with the activity's
/// description on first use.
pub async fn resolve_category<S: Store + ?Sized>(
    store: &mut S,
    category: &CategorySpec,
) -> Result<Resolution, IngestError> {
    let table = categories();
    if let Some(id) = store
        .find_id(&table, &[("name", SqlValue::text(category.name.as_str()))])
        .await?
    {
        return Ok(Resolution::found(id));
    }

    let id = store
        .insert(
            &table,
            &[
                ("name", SqlValue::text(category.name.as_str())),
                ("description", SqlValue::text(category.description.as_str())),
            ],
        )
        .await?;
    info!(category = %category.name, %id, "created category");
    Ok(Resolution::created(id))
}
