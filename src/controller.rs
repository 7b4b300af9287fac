//! Conversation state controller.
//!
//! Owns the conversation list and the active thread. Every mutation goes
//! through a named operation here; persistence is written after each one and
//! title generation runs as detached tasks tagged with a conversation id.
//!
//! Two `send_message` calls racing on the same conversation are not
//! serialized: their thread writes and the loading flag can interleave.
//! Front ends are expected to hold off sending while `is_loading` is set.

use crate::client::CompletionClient;
use crate::error::ControllerError;
use crate::models::{ChatMessage, Conversation, Message, Model, Role};
use crate::storage::Persistence;
use crate::title::{clean_title, DEFAULT_TITLE, PENDING_TITLE};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Shown in place of an assistant reply when the completion fails.
pub const ERROR_REPLY: &str = "Sorry, I encountered an error. Please try again.";

/// Everything the presentation layer renders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControllerState {
    pub conversations: Vec<Conversation>,
    pub active_id: Option<String>,
    pub messages: Vec<Message>,
    pub is_loading: bool,
    pub selected_model: Model,
}

impl ControllerState {
    fn contains(&self, conversation_id: &str) -> bool {
        self.conversations.iter().any(|c| c.id == conversation_id)
    }

    fn set_title(&mut self, conversation_id: &str, title: &str) -> bool {
        match self.conversations.iter_mut().find(|c| c.id == conversation_id) {
            Some(conversation) => {
                conversation.title = title.to_string();
                true
            }
            None => false,
        }
    }

    // Inserts a fresh conversation at the head and makes it active
    fn push_new_conversation(&mut self) -> Conversation {
        let conversation = Conversation::new(DEFAULT_TITLE);
        self.conversations.insert(0, conversation.clone());
        self.active_id = Some(conversation.id.clone());
        self.messages.clear();
        conversation
    }
}

#[derive(Clone)]
pub struct ConversationController {
    state: Arc<Mutex<ControllerState>>,
    persistence: Persistence,
    client: Arc<dyn CompletionClient>,
    title_tasks: Arc<std::sync::Mutex<Vec<JoinHandle<()>>>>,
}

impl ConversationController {
    /// Creates a controller with empty state. Use [`Self::load`] to restore a
    /// previous session.
    pub fn new(persistence: Persistence, client: Arc<dyn CompletionClient>) -> Self {
        Self {
            state: Arc::new(Mutex::new(ControllerState::default())),
            persistence,
            client,
            title_tasks: Arc::new(std::sync::Mutex::new(Vec::new())),
        }
    }

    /// Restores the conversation list and model preference from persistence.
    /// The most recent conversation becomes active.
    pub async fn load(persistence: Persistence, client: Arc<dyn CompletionClient>) -> Self {
        let conversations = persistence.load_conversations().await;
        let selected_model = persistence.load_selected_model().await.unwrap_or_default();

        let (active_id, messages) = match conversations.first() {
            Some(head) => (Some(head.id.clone()), persistence.load_messages(&head.id).await),
            None => (None, Vec::new()),
        };
        log::info!(
            "Loaded {} conversations (model {})",
            conversations.len(),
            selected_model
        );

        let controller = Self::new(persistence, client);
        *controller.state.lock().await = ControllerState {
            conversations,
            active_id,
            messages,
            is_loading: false,
            selected_model,
        };
        controller
    }

    pub async fn snapshot(&self) -> ControllerState {
        self.state.lock().await.clone()
    }

    pub async fn create_conversation(&self) -> Conversation {
        let (conversation, conversations) = {
            let mut state = self.state.lock().await;
            let conversation = state.push_new_conversation();
            (conversation, state.conversations.clone())
        };
        log::info!("Created conversation {}", conversation.id);
        self.persistence.save_conversations(&conversations).await;
        conversation
    }

    /// Makes `conversation_id` active and loads its thread. Returns `false`
    /// without changing anything if the id is unknown.
    pub async fn select_conversation(&self, conversation_id: &str) -> bool {
        if !self.state.lock().await.contains(conversation_id) {
            log::debug!("Ignoring select of unknown conversation {}", conversation_id);
            return false;
        }

        let messages = self.persistence.load_messages(conversation_id).await;
        let mut state = self.state.lock().await;
        // Deleted while the thread was loading
        if !state.contains(conversation_id) {
            return false;
        }
        state.active_id = Some(conversation_id.to_string());
        state.messages = messages;
        true
    }

    /// Removes a conversation and its stored thread. Deleting the active
    /// conversation activates the new head of the list, if any.
    pub async fn delete_conversation(&self, conversation_id: &str) -> bool {
        let (was_active, next_head, conversations) = {
            let mut state = self.state.lock().await;
            let Some(index) = state.conversations.iter().position(|c| c.id == conversation_id) else {
                log::debug!("Ignoring delete of unknown conversation {}", conversation_id);
                return false;
            };
            state.conversations.remove(index);
            let was_active = state.active_id.as_deref() == Some(conversation_id);
            // Nothing is active until the head's thread is loaded, so a send
            // in the meantime cannot write over the head's stored history
            if was_active {
                state.active_id = None;
                state.messages.clear();
            }
            (was_active, state.conversations.first().map(|c| c.id.clone()), state.conversations.clone())
        };

        log::info!("Deleted conversation {}", conversation_id);
        self.persistence.save_conversations(&conversations).await;
        self.persistence.remove_messages(conversation_id).await;

        if let (true, Some(head)) = (was_active, next_head) {
            let messages = self.persistence.load_messages(&head).await;
            let mut state = self.state.lock().await;
            if state.active_id.is_none() && state.conversations.first().is_some_and(|c| c.id == head) {
                state.active_id = Some(head);
                state.messages = messages;
            }
        }
        true
    }

    /// Switches the model used for completions and titles.
    pub async fn set_model(&self, model: Model) {
        self.state.lock().await.selected_model = model;
        self.persistence.save_selected_model(model).await;
        log::info!("Selected model {}", model);
    }

    /// Sends a user message, or replaces message `edit_id` and everything
    /// after it, then requests a reply.
    ///
    /// The user message is in the thread and persisted before any network
    /// call. A failed completion is recorded as an assistant message, so the
    /// only errors returned are rejections made before state is touched.
    pub async fn send_message(&self, content: &str, edit_id: Option<&str>) -> Result<(), ControllerError> {
        if content.trim().is_empty() {
            return Err(ControllerError::EmptyMessage);
        }

        let (conversation_id, thread, model, created) = {
            let mut state = self.state.lock().await;

            let thread = match edit_id {
                Some(edit_id) => {
                    let Some(index) = state.messages.iter().position(|m| m.id == edit_id) else {
                        log::error!("Message not found for editing: {}", edit_id);
                        return Err(ControllerError::MessageNotFound(edit_id.to_string()));
                    };
                    let mut thread = state.messages[..index].to_vec();
                    thread.push(Message {
                        id: edit_id.to_string(),
                        role: Role::User,
                        content: content.to_string(),
                    });
                    thread
                }
                None => {
                    let mut thread = state.messages.clone();
                    thread.push(Message::user(content));
                    thread
                }
            };

            let (conversation_id, created) = match state.active_id.clone() {
                Some(id) => (id, false),
                None => (state.push_new_conversation().id, true),
            };

            state.messages = thread.clone();
            state.set_title(&conversation_id, PENDING_TITLE);
            state.is_loading = true;

            let conversations = state.conversations.clone();
            self.persistence.save_messages(&conversation_id, &thread).await;
            self.persistence.save_conversations(&conversations).await;
            (conversation_id, thread, state.selected_model, created)
        };

        if created {
            log::info!("Created conversation {} for first message", conversation_id);
        }

        self.spawn_title_update(conversation_id.clone(), thread.clone(), model);

        let wire: Vec<ChatMessage> = thread.iter().map(Message::to_chat_message).collect();
        let result = self.client.complete(model, &wire).await;

        let reply = match &result {
            Ok(completion) => Message::assistant(completion.message.clone()),
            Err(e) => {
                log::error!("Error sending message in {}: {}", conversation_id, e);
                Message::assistant(ERROR_REPLY)
            }
        };
        let mut final_thread = thread;
        final_thread.push(reply);

        {
            let mut state = self.state.lock().await;
            state.is_loading = false;
            if state.active_id.as_deref() == Some(conversation_id.as_str()) {
                state.messages = final_thread.clone();
            }
            if !state.contains(&conversation_id) {
                log::warn!("Conversation {} was deleted before its reply arrived", conversation_id);
                return Ok(());
            }
            // Written under the lock so a delete cannot run between the
            // existence check and the write
            self.persistence.save_messages(&conversation_id, &final_thread).await;
        }

        if result.is_ok() {
            self.spawn_title_update(conversation_id, final_thread, model);
        }
        Ok(())
    }

    fn spawn_title_update(&self, conversation_id: String, thread: Vec<Message>, model: Model) {
        let state = self.state.clone();
        let persistence = self.persistence.clone();
        let client = self.client.clone();

        let handle = tokio::spawn(async move {
            let title = match client.summarize(model, &thread).await {
                Ok(raw) => clean_title(&raw),
                Err(e) => {
                    log::warn!("Error generating title for {}: {}", conversation_id, e);
                    DEFAULT_TITLE.to_string()
                }
            };

            let conversations = {
                let mut state = state.lock().await;
                if !state.set_title(&conversation_id, &title) {
                    log::debug!("Discarding title for deleted conversation {}", conversation_id);
                    return;
                }
                state.conversations.clone()
            };
            log::debug!("Conversation {} titled '{}'", conversation_id, title);
            persistence.save_conversations(&conversations).await;
        });

        match self.title_tasks.lock() {
            Ok(mut tasks) => {
                tasks.retain(|task| !task.is_finished());
                tasks.push(handle);
            }
            Err(e) => log::error!("Title task list poisoned: {}", e),
        }
    }

    /// Waits until every title request started so far has been merged.
    pub async fn wait_for_titles(&self) {
        loop {
            let pending = match self.title_tasks.lock() {
                Ok(mut tasks) => std::mem::take(&mut *tasks),
                Err(e) => {
                    log::error!("Title task list poisoned: {}", e);
                    return;
                }
            };
            if pending.is_empty() {
                return;
            }
            for result in futures::future::join_all(pending).await {
                if let Err(e) = result {
                    log::error!("Title task failed: {}", e);
                }
            }
        }
    }
}
