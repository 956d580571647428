//! A mounted messaging view, shared by every role.
//!
//! [`Messenger`] owns the wiring (identity, directory, history, realtime);
//! [`ConversationView`] adds the per-screen state: which counterpart is
//! selected and what is in the compose box.

use chrono::Utc;

use crate::api::client::ApiClient;
use crate::api::models::{Contact, NewThread, Role, Thread, ThreadResponse, ThreadStatus};
use crate::chat::directory::{self, RoleConfig};
use crate::chat::identity::{LocalIdentity, Profile};
use crate::chat::realtime::{ChannelHandle, RealtimeChannel, RealtimeConfig};
use crate::chat::store::Store;
use crate::error::{SendError, SessionError};

#[derive(Clone)]
pub struct Messenger {
    api: ApiClient,
    store: Store,
    config: RoleConfig,
    profile: Profile,
    identity: LocalIdentity,
}

impl Messenger {
    /// Resolve the local identity. A profile that cannot produce one leaves
    /// nothing to load, so this is the only fatal step.
    pub fn new(api: ApiClient, store: Store, role: Role, profile: Profile) -> Result<Self, SessionError> {
        let config = RoleConfig::for_role(role);
        let identity = config.resolve_identity(&profile).inspect_err(|e| {
            log::error!("cannot load messages for {role}: {e}");
        })?;
        Ok(Self { api, store, config, profile, identity })
    }

    /// Full mount sequence: contacts, history, then the realtime channel.
    pub async fn mount(
        api: ApiClient,
        store: Store,
        role: Role,
        profile: Profile,
        realtime: RealtimeConfig,
    ) -> Result<(Self, ChannelHandle), SessionError> {
        let messenger = Self::new(api, store, role, profile)?;
        messenger.load_contacts().await;
        messenger.load_history().await;
        let channel = messenger.open_channel(realtime);
        Ok((messenger, channel))
    }

    pub fn identity(&self) -> &LocalIdentity {
        &self.identity
    }

    pub fn role(&self) -> Role {
        self.config.role
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn contacts(&self) -> Vec<Contact> {
        self.store.contacts_by_role(self.config.role)
    }

    pub async fn load_contacts(&self) -> Option<usize> {
        directory::load_contacts(&self.api, &self.config, &self.profile, &self.identity, &self.store).await
    }

    /// File every historical thread under its counterpart. Failures leave the store as it was.
    pub async fn load_history(&self) -> usize {
        let me = self.identity.to_string();
        match self.api.threads_for(&me).await {
            Ok(threads) => {
                let count = threads.len();
                for thread in threads {
                    let counterpart = thread.counterpart_of(&me).to_string();
                    self.store.add_request(counterpart, thread);
                }
                log::info!("loaded {count} threads for {me}");
                count
            }
            Err(e) => {
                log::error!("failed to load conversations for {me}: {e}");
                0
            }
        }
    }

    pub fn open_channel(&self, realtime: RealtimeConfig) -> ChannelHandle {
        RealtimeChannel::open(realtime, self.identity.clone(), self.store.clone())
    }

    /// Create a thread and file the server's copy under `counterpart`.
    /// Nothing is stored before the server confirms.
    pub async fn send_thread(&self, counterpart: &str, questions: Vec<String>) -> Result<Thread, SendError> {
        let questions = clean(questions);
        if questions.is_empty() {
            return Err(SendError::EmptyMessage);
        }
        let body = NewThread {
            sender_id: self.identity.to_string(),
            recipient_id: counterpart.to_string(),
            questions,
        };
        let thread = self.api.create_thread(&body).await?;
        self.store.add_request(counterpart, thread.clone());
        Ok(thread)
    }

    /// Answer a received thread, one answer per question.
    pub async fn respond(&self, thread_id: &str, answers: Vec<String>) -> Result<(), SendError> {
        let answers = clean(answers);
        if answers.is_empty() {
            return Err(SendError::EmptyMessage);
        }
        let timestamp = Utc::now().to_rfc3339();
        let responses = answers
            .into_iter()
            .map(|answer| ThreadResponse { answer, timestamp: timestamp.clone() })
            .collect();
        match self.api.respond(thread_id, responses).await? {
            Some(thread) => {
                let counterpart = thread.counterpart_of(&self.identity.to_string()).to_string();
                self.store.add_request(counterpart, thread);
            }
            None => self.store.update_request_status(thread_id, ThreadStatus::Responded),
        }
        Ok(())
    }
}

fn clean(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Sent,
    Received,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bubble {
    pub direction: Direction,
    pub thread: Thread,
}

/// Ready-to-send payload taken out of the compose state.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSend {
    pub counterpart: String,
    pub questions: Vec<String>,
    multi: bool,
}

impl PendingSend {
    pub fn is_multi(&self) -> bool {
        self.multi
    }
}

pub struct ConversationView {
    messenger: Messenger,
    selected: Option<String>,
    compose: String,
    drafts: Vec<String>,
    sending: bool,
}

impl ConversationView {
    pub fn new(messenger: Messenger) -> Self {
        Self { messenger, selected: None, compose: String::new(), drafts: Vec::new(), sending: false }
    }

    pub fn messenger(&self) -> &Messenger {
        &self.messenger
    }

    pub fn select(&mut self, counterpart: impl Into<String>) {
        self.selected = Some(counterpart.into());
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn compose(&self) -> &str {
        &self.compose
    }

    pub fn set_compose(&mut self, text: impl Into<String>) {
        self.compose = text.into();
    }

    pub fn drafts(&self) -> &[String] {
        &self.drafts
    }

    pub fn push_draft(&mut self, text: impl Into<String>) {
        self.drafts.push(text.into());
    }

    pub fn remove_draft(&mut self, index: usize) -> Option<String> {
        (index < self.drafts.len()).then(|| self.drafts.remove(index))
    }

    pub fn is_sending(&self) -> bool {
        self.sending
    }

    /// Threads with the selected counterpart, newest first.
    pub fn threads(&self) -> Vec<Thread> {
        match &self.selected {
            Some(id) => self.messenger.store.requests_by_user(id),
            None => Vec::new(),
        }
    }

    pub fn bubbles(&self) -> Vec<Bubble> {
        let me = &self.messenger.identity;
        self.threads()
            .into_iter()
            .map(|thread| Bubble {
                direction: if me.matches(&thread.sender_id) { Direction::Sent } else { Direction::Received },
                thread,
            })
            .collect()
    }

    fn prepare(&mut self, questions: Vec<String>, multi: bool) -> Result<PendingSend, SendError> {
        if self.sending {
            return Err(SendError::InFlight);
        }
        let counterpart = self.selected.clone().ok_or(SendError::NoCounterpart)?;
        let questions = clean(questions);
        if questions.is_empty() {
            return Err(SendError::EmptyMessage);
        }
        self.sending = true;
        Ok(PendingSend { counterpart, questions, multi })
    }

    /// Validate the compose box and mark a send in flight.
    pub fn prepare_quick_send(&mut self) -> Result<PendingSend, SendError> {
        self.prepare(vec![self.compose.clone()], false)
    }

    pub fn prepare_multi_send(&mut self) -> Result<PendingSend, SendError> {
        self.prepare(self.drafts.clone(), true)
    }

    /// Settle a send started with `prepare_*`. Input is cleared only on success.
    pub fn complete_send(&mut self, pending: &PendingSend, result: &Result<Thread, SendError>) {
        self.sending = false;
        match result {
            Ok(thread) => {
                log::debug!("thread {} sent to {}", thread.id, pending.counterpart);
                if pending.multi {
                    self.drafts.clear();
                } else {
                    self.compose.clear();
                }
            }
            Err(e) => log::error!("failed to send message to {}: {e}", pending.counterpart),
        }
    }

    pub async fn send_pending(&mut self, pending: PendingSend) -> Result<Thread, SendError> {
        let result = self.messenger.send_thread(&pending.counterpart, pending.questions.clone()).await;
        self.complete_send(&pending, &result);
        result
    }

    pub async fn send_quick_message(&mut self) -> Result<Thread, SendError> {
        let pending = self.prepare_quick_send()?;
        self.send_pending(pending).await
    }

    pub async fn send_multi_message(&mut self) -> Result<Thread, SendError> {
        let pending = self.prepare_multi_send()?;
        self.send_pending(pending).await
    }

    pub async fn respond(&self, thread_id: &str, answers: Vec<String>) -> Result<(), SendError> {
        self.messenger.respond(thread_id, answers).await
    }
}
