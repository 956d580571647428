//! Contact directory loading.
//!
//! Each role pulls its counterparts from a list of sources in priority order.
//! Earlier sources win: later ones only add ids not seen yet. The general
//! contacts endpoint is a last resort, consulted only when nothing else
//! produced a contact, and is filtered by the counterpart identity kinds.

use std::collections::HashMap;

use crate::api::client::ApiClient;
use crate::api::models::{Contact, Role};
use crate::chat::identity::{IdentityKind, LocalIdentity, Profile};
use crate::chat::store::Store;
use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactSource {
    /// Class-teacher assignments matched against the guardian's wards.
    ClassTeachers,
    Guardian,
    Teacher,
    Admin,
    General,
}

/// Everything that differs between the guardian, teacher, director and admin views.
#[derive(Debug, Clone, PartialEq)]
pub struct RoleConfig {
    pub role: Role,
    pub sources: Vec<ContactSource>,
    /// Identity kinds kept when falling back to the general contacts list.
    pub counterpart_kinds: Vec<IdentityKind>,
}

impl RoleConfig {
    pub fn for_role(role: Role) -> Self {
        use ContactSource::*;
        let (sources, counterpart_kinds) = match role {
            Role::Guardian => (vec![ClassTeachers, Guardian], vec![IdentityKind::Staff]),
            Role::Teacher => (vec![Teacher], vec![IdentityKind::Guardian, IdentityKind::Director]),
            Role::Director | Role::Admin => (vec![Admin], vec![IdentityKind::Staff, IdentityKind::Guardian]),
        };
        Self { role, sources, counterpart_kinds }
    }

    pub fn resolve_identity(&self, profile: &Profile) -> Result<LocalIdentity, crate::error::IdentityError> {
        LocalIdentity::resolve(self.role, profile)
    }

    fn accepts_fallback(&self, contact: &Contact) -> bool {
        contact
            .id
            .parse::<LocalIdentity>()
            .is_ok_and(|id| self.counterpart_kinds.contains(&id.kind))
    }
}

/// Teachers first, then directors, then by name.
pub fn sort_contacts(contacts: &mut [Contact]) {
    contacts.sort_by(|a, b| {
        a.role
            .rank()
            .cmp(&b.role.rank())
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
            .then_with(|| a.id.cmp(&b.id))
    });
}

async fn fetch_source(
    api: &ApiClient,
    source: ContactSource,
    profile: &Profile,
    identity: &LocalIdentity,
) -> Result<Vec<Contact>, ApiError> {
    match source {
        ContactSource::ClassTeachers => {
            let assignments = api.class_teachers().await?;
            let mut out: Vec<Contact> = Vec::new();
            for a in assignments {
                let wards: Vec<_> = profile.students.iter().filter(|w| w.class == a.class).cloned().collect();
                if wards.is_empty() {
                    continue;
                }
                let id = LocalIdentity::staff(a.teacher_id.clone()).to_string();
                // One teacher may hold several classes.
                if let Some(existing) = out.iter_mut().find(|c| c.id == id) {
                    existing.students.get_or_insert_with(Vec::new).extend(wards);
                    let subjects = existing.subjects.get_or_insert_with(Vec::new);
                    for s in a.subjects {
                        if !subjects.contains(&s) {
                            subjects.push(s);
                        }
                    }
                    continue;
                }
                out.push(Contact {
                    id,
                    name: a.teacher_name,
                    role: Role::Teacher,
                    subjects: (!a.subjects.is_empty()).then_some(a.subjects),
                    students: Some(wards),
                    phone: None,
                });
            }
            Ok(out)
        }
        ContactSource::Guardian => api.contacts_guardian(&identity.id).await,
        ContactSource::Teacher => api.contacts_teacher(&identity.id).await,
        ContactSource::Admin => api.contacts_admin().await,
        ContactSource::General => api.contacts_general().await,
    }
}

/// Fetch the directory for `config.role` and store it.
///
/// When no source could be reached at all the stored list is left untouched.
/// Returns the number of contacts stored, or `None` when nothing was stored.
pub async fn load_contacts(
    api: &ApiClient,
    config: &RoleConfig,
    profile: &Profile,
    identity: &LocalIdentity,
    store: &Store,
) -> Option<usize> {
    let me = identity.to_string();
    let mut by_id: HashMap<String, Contact> = HashMap::new();
    let mut reached = false;

    for source in &config.sources {
        match fetch_source(api, *source, profile, identity).await {
            Ok(contacts) => {
                reached = true;
                log::debug!("{source:?} returned {} contacts", contacts.len());
                for c in contacts {
                    if c.id != me {
                        by_id.entry(c.id.clone()).or_insert(c);
                    }
                }
            }
            Err(e) => log::warn!("contact source {source:?} failed for {me}: {e}"),
        }
    }

    if by_id.is_empty() {
        match fetch_source(api, ContactSource::General, profile, identity).await {
            Ok(contacts) => {
                reached = true;
                for c in contacts.into_iter().filter(|c| c.id != me && config.accepts_fallback(c)) {
                    by_id.entry(c.id.clone()).or_insert(c);
                }
            }
            Err(e) => log::error!("general contacts fallback failed for {me}: {e}"),
        }
    }

    if !reached {
        log::error!("no contact source reachable for {me}; keeping previous directory");
        return None;
    }

    let mut contacts: Vec<Contact> = by_id.into_values().collect();
    sort_contacts(&mut contacts);
    let count = contacts.len();
    store.set_contacts(config.role, contacts);
    Some(count)
}
