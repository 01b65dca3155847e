//! Routes extracted items to their integrations.
//!
//! Items are dispatched one at a time in a fixed order: tasks, events, notes,
//! shopping lists. Each adapter call yields its own [`Outcome`], so a failure
//! for one item is recorded and the loop carries on.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use super::notifications::NotificationDispatcher;
use super::Clock;
use crate::adapters::Integration;
use crate::domain::{
    DispatchResult, DispatchSummary, EventItem, NoteItem, SourceItem, StructuredData, Summary,
    TaskItem,
};

/// Title given to shopping-list pages, suffixed with `MM-DD`
pub const SHOPPING_LIST_TITLE_PREFIX: &str = "Shopping list";

/// Fan-out of one extraction to the integrations
pub struct Dispatcher {
    tasks: Arc<dyn Integration<TaskItem>>,
    events: Arc<dyn Integration<EventItem>>,
    notes: Arc<dyn Integration<NoteItem>>,
    notifications: NotificationDispatcher,
    clock: Clock,
}

impl Dispatcher {
    pub fn new(
        tasks: Arc<dyn Integration<TaskItem>>,
        events: Arc<dyn Integration<EventItem>>,
        notes: Arc<dyn Integration<NoteItem>>,
        notifications: NotificationDispatcher,
        clock: Clock,
    ) -> Self {
        Self {
            tasks,
            events,
            notes,
            notifications,
            clock,
        }
    }

    /// Title for a shopping list created now
    pub fn shopping_list_title(&self) -> String {
        format!(
            "{} {}",
            SHOPPING_LIST_TITLE_PREFIX,
            (self.clock)().format("%m-%d")
        )
    }

    /// Create every item, notify, and summarize
    #[instrument(skip_all, fields(items = data.item_count()))]
    pub async fn dispatch(&self, data: StructuredData, tokens: u64) -> DispatchSummary {
        let mut results = Vec::with_capacity(data.item_count());

        for task in &data.tasks {
            let outcome = self.tasks.create(task).await;
            results.push(DispatchResult::new(SourceItem::Task(task.clone()), outcome));
        }

        for event in &data.events {
            let outcome = self.events.create(event).await;
            results.push(DispatchResult::new(SourceItem::Event(event.clone()), outcome));
        }

        for note in &data.notes {
            let outcome = self.notes.create(note).await;
            results.push(DispatchResult::new(SourceItem::Note(note.clone()), outcome));
        }

        if !data.shopping_lists.is_empty() {
            let title = self.shopping_list_title();
            for list in &data.shopping_lists {
                let note = NoteItem::new(title.clone(), list.content.clone());
                let outcome = self.notes.create(&note).await;
                results.push(DispatchResult::new(SourceItem::ShoppingList(note), outcome));
            }
        }

        self.notifications.notify(&results).await;

        let summary = Summary::from_results(&results, tokens);
        let failed = Summary::failed_count(&results);
        if failed > 0 {
            warn!(failed, total = results.len(), "Some items could not be created");
        }
        info!(
            tasks = summary.tasks_created,
            events = summary.events_created,
            notes = summary.notes_created,
            shopping_lists = summary.shopping_lists_created,
            tokens,
            "Dispatch complete"
        );

        DispatchSummary {
            parsed_data: data,
            results,
            summary,
        }
    }
}
