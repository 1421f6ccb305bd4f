//! `getOrCreateContact` (§4.6, C6 contact half).

use super::entity::{canonicalize_phone, Contact};
use super::repository::ContactRepository;
use crate::error::{is_duplicate_key_error, EngineError, Result};
use tracing::warn;

pub struct GetOrCreateContactInput<'a> {
    pub user_id: &'a str,
    pub phone: &'a str,
    pub name: Option<&'a str>,
    pub alternate_phones: &'a [String],
}

/// Resolve or create the `Contact` for `(userId, phone)`, per §4.6.
///
/// 1. Canonicalize `phone` to digits-only; empty after normalization is an
///    error.
/// 2. Build the search set: canonical form, the raw trimmed form (if
///    different), and every alternate phone's canonical + raw trimmed
///    form.
/// 3. Look up an existing contact in that set; on a concurrent-insert race
///    (duplicate-key error), re-read rather than failing.
/// 4. Backfill a non-canonical stored phone and a differing provided name;
///    update failures are logged but non-fatal.
pub async fn get_or_create_contact(
    repo: &ContactRepository,
    input: GetOrCreateContactInput<'_>,
) -> Result<Contact> {
    let canonical = canonicalize_phone(input.phone);
    if canonical.is_empty() {
        return Err(EngineError::validation("phone has no digits after normalization"));
    }

    let mut search_set = vec![canonical.clone()];
    let raw_trimmed = input.phone.trim().to_string();
    if raw_trimmed != canonical {
        search_set.push(raw_trimmed);
    }
    for alt in input.alternate_phones {
        let alt_canonical = canonicalize_phone(alt);
        if !alt_canonical.is_empty() && !search_set.contains(&alt_canonical) {
            search_set.push(alt_canonical);
        }
        let alt_trimmed = alt.trim().to_string();
        if !alt_trimmed.is_empty() && !search_set.contains(&alt_trimmed) {
            search_set.push(alt_trimmed);
        }
    }

    let found = repo.find_by_user_and_phones(input.user_id, &search_set).await?;

    let mut contact = match found {
        Some(contact) => contact,
        None => {
            let new_contact = Contact {
                id: None,
                user_id: input.user_id.to_string(),
                phone: canonical.clone(),
                name: input.name.map(str::to_string),
            };
            match repo.insert(&new_contact).await {
                Ok(id) => Contact { id: Some(id), ..new_contact },
                Err(EngineError::Database(err)) if is_duplicate_key_error(&err) => repo
                    .find_by_user_and_phones(input.user_id, &search_set)
                    .await?
                    .ok_or_else(|| EngineError::conflict("contact insert raced but re-read found nothing"))?,
                Err(other) => return Err(other),
            }
        }
    };

    if contact.phone != canonical {
        if let Some(id) = contact.id {
            if let Err(err) = repo.update_phone(&id, &canonical).await {
                warn!(contact_id = %id, error = %err, "failed to backfill canonical phone");
            } else {
                contact.phone = canonical;
            }
        }
    }

    if let Some(name) = input.name {
        let differs = contact.name.as_deref().map(str::trim) != Some(name.trim());
        if differs {
            if let Some(id) = contact.id {
                if let Err(err) = repo.update_name(&id, name).await {
                    warn!(contact_id = %id, error = %err, "failed to update contact name");
                } else {
                    contact.name = Some(name.to_string());
                }
            }
        }
    }

    Ok(contact)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_phone_after_normalization_errors() {
        let canonical = canonicalize_phone("+() -");
        assert!(canonical.is_empty());
    }
}
