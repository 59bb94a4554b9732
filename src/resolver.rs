//! Allow-list identity resolution
//!
//! The allow-list is persisted as a comma-joined string of `type:externalId`
//! entries. Resolution expands it back into identities, asking the live
//! provider for full records when a caller token is available and falling
//! back to unresolved stubs otherwise.

use crate::constants::{ALLOW_LIST_SEPARATOR, IDENTITY_ID_SEPARATOR};
use crate::model::Identity;
use crate::providers::IdentityProvider;
use crate::utils::with_timeout;
use std::time::Duration;

/// One well-formed allow-list entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllowListEntry<'a> {
    /// Entry exactly as stored
    pub raw: &'a str,
    pub external_id_type: &'a str,
    pub external_id: &'a str,
}

impl AllowListEntry<'_> {
    /// Unresolved identity for this entry
    pub fn stub(&self) -> Identity {
        Identity::stub(self.raw, self.external_id_type, self.external_id)
    }
}

/// Parse a serialized allow-list
///
/// Blank entries are ignored. Entries without a `:` are skipped with a
/// warning. Only the first `:` separates type from id.
pub fn parse_allow_list(list: &str) -> impl Iterator<Item = AllowListEntry<'_>> {
    list.split(ALLOW_LIST_SEPARATOR)
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|raw| match raw.split_once(IDENTITY_ID_SEPARATOR) {
            Some((external_id_type, external_id)) => Some(AllowListEntry {
                raw,
                external_id_type,
                external_id,
            }),
            None => {
                tracing::warn!("Skipping malformed allowed identity entry '{}'", raw);
                None
            }
        })
}

/// Expand a serialized allow-list into identities
///
/// With a provider and a non-empty `access_token` every entry is looked up;
/// lookup failures degrade to a stub for that entry only.
pub async fn resolve_allowed_identities(
    list: &str,
    provider: Option<&dyn IdentityProvider>,
    access_token: &str,
    timeout: Duration,
) -> Vec<Identity> {
    let mut identities = Vec::new();

    for entry in parse_allow_list(list) {
        let resolved = match provider {
            Some(provider) if !access_token.is_empty() => {
                let lookup = with_timeout(
                    timeout,
                    format!("resolving identity {}", entry.raw),
                    provider.get_identity(entry.external_id, entry.external_id_type, access_token),
                )
                .await;
                match lookup {
                    Ok(identity) => Some(identity),
                    Err(e) => {
                        tracing::debug!("Falling back to stub for {}: {}", entry.raw, e);
                        None
                    }
                }
            }
            _ => None,
        };

        identities.push(resolved.unwrap_or_else(|| entry.stub()));
    }

    identities
}

/// Serialize identities into the persisted allow-list form
pub fn allowed_id_string(identities: &[Identity]) -> String {
    let separator = ALLOW_LIST_SEPARATOR.to_string();
    identities
        .iter()
        .map(Identity::allow_list_entry)
        .collect::<Vec<_>>()
        .join(separator.as_str())
}
