//! Process-wide messaging state: the per-role contact directory and the
//! per-counterpart conversation lists.
//!
//! All mutation goes through [`Action`]s applied by [`MessagingState::reduce`];
//! views hold a [`Store`] and re-read after each revision bump.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::watch;

use crate::api::models::{Contact, Role, Thread, ThreadStatus};

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SetContacts { role: Role, contacts: Vec<Contact> },
    AddRequest { user_id: String, request: Thread },
    UpdateRequestStatus { request_id: String, status: ThreadStatus },
}

#[derive(Debug, Default, Clone)]
pub struct MessagingState {
    contacts: HashMap<Role, Vec<Contact>>,
    requests: HashMap<String, Vec<Thread>>,
}

impl MessagingState {
    /// Apply one action. Returns whether anything changed.
    pub fn reduce(&mut self, action: Action) -> bool {
        match action {
            Action::SetContacts { role, contacts } => {
                self.contacts.insert(role, contacts);
                true
            }
            Action::AddRequest { user_id, request } => {
                self.add_request(user_id, request);
                true
            }
            Action::UpdateRequestStatus { request_id, status } => {
                self.update_request_status(&request_id, status) > 0
            }
        }
    }

    fn add_request(&mut self, user_id: String, request: Thread) {
        let list = self.requests.entry(user_id).or_default();
        match list.iter_mut().find(|t| t.id == request.id) {
            Some(existing) => *existing = request,
            None => list.push(request),
        }
        // Newest first; threads without a timestamp sink to the bottom.
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    }

    fn update_request_status(&mut self, request_id: &str, status: ThreadStatus) -> usize {
        let mut patched = 0;
        let mut owners = 0;
        for list in self.requests.values_mut() {
            let before = patched;
            for thread in list.iter_mut().filter(|t| t.id == request_id) {
                thread.status = status;
                patched += 1;
            }
            if patched > before {
                owners += 1;
            }
        }
        if owners > 1 {
            log::warn!("thread id {request_id} is shared by {owners} conversations; patched all of them");
        }
        patched
    }

    pub fn contacts_by_role(&self, role: Role) -> &[Contact] {
        self.contacts.get(&role).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn requests_by_user(&self, user_id: &str) -> &[Thread] {
        self.requests.get(user_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Counterparts with at least one thread, most recent activity first.
    pub fn counterparts(&self) -> Vec<String> {
        let mut ids: Vec<_> = self
            .requests
            .iter()
            .filter(|(_, list)| !list.is_empty())
            .map(|(id, list)| (id.clone(), list[0].created_at))
            .collect();
        ids.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ids.into_iter().map(|(id, _)| id).collect()
    }
}

/// Shared handle to [`MessagingState`]. Cheap to clone.
#[derive(Clone)]
pub struct Store {
    state: Arc<RwLock<MessagingState>>,
    revision: Arc<watch::Sender<u64>>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self {
            state: Arc::new(RwLock::new(MessagingState::default())),
            revision: Arc::new(tx),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, MessagingState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, MessagingState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn dispatch(&self, action: Action) {
        let changed = self.write().reduce(action);
        if changed {
            self.revision.send_modify(|rev| *rev += 1);
        }
    }

    /// Receiver that ticks after every state change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    /// Calls `notify` with each new revision until it returns `false` or
    /// every handle to this store has been dropped.
    pub fn forward_changes<F>(&self, mut notify: F) -> impl Future<Output = ()> + Send + 'static
    where
        F: FnMut(u64) -> bool + Send + 'static,
    {
        let mut revisions = self.subscribe();
        async move {
            while revisions.changed().await.is_ok() {
                let revision = *revisions.borrow_and_update();
                if !notify(revision) {
                    break;
                }
            }
        }
    }

    pub fn set_contacts(&self, role: Role, contacts: Vec<Contact>) {
        self.dispatch(Action::SetContacts { role, contacts });
    }

    pub fn add_request(&self, user_id: impl Into<String>, request: Thread) {
        self.dispatch(Action::AddRequest { user_id: user_id.into(), request });
    }

    pub fn update_request_status(&self, request_id: impl Into<String>, status: ThreadStatus) {
        self.dispatch(Action::UpdateRequestStatus { request_id: request_id.into(), status });
    }

    pub fn contacts_by_role(&self, role: Role) -> Vec<Contact> {
        self.read().contacts_by_role(role).to_vec()
    }

    pub fn requests_by_user(&self, user_id: &str) -> Vec<Thread> {
        self.read().requests_by_user(user_id).to_vec()
    }

    pub fn counterparts(&self) -> Vec<String> {
        self.read().counterparts()
    }

    pub fn snapshot(&self) -> MessagingState {
        self.read().clone()
    }
}
