//! Push notifications for dispatch results.
//!
//! Best-effort side channel: every result produces one push,
//! send errors are logged and swallowed, and nothing here can fail a request.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::adapters::{PushNotification, PushNotifier};
use crate::domain::{DispatchResult, ItemKind, LinkField};

/// Fallback when an event result carries no start time
const UNKNOWN_START: &str = "an unknown date";

/// Per-kind notification template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Template {
    pub title: &'static str,
    /// `{title}` and `{start}` are substituted
    pub message: &'static str,
    pub tag: &'static str,
    pub action_label: &'static str,
    pub link: LinkField,
}

/// Template for a result kind
pub fn template_for(kind: ItemKind) -> Template {
    match kind {
        ItemKind::Task => Template {
            title: "New task in Google Tasks",
            message: "Task \"{title}\" was created.",
            tag: "white_check_mark",
            action_label: "Open task",
            link: LinkField::WebViewLink,
        },
        ItemKind::Event => Template {
            title: "New event in Google Calendar",
            message: "Event \"{title}\" was created for {start}.",
            tag: "calendar",
            action_label: "Open event",
            link: LinkField::HtmlLink,
        },
        ItemKind::Note => Template {
            title: "New page in Notion",
            message: "Note \"{title}\" was created.",
            tag: "notebook_with_decorative_cover",
            action_label: "Open page",
            link: LinkField::Url,
        },
        ItemKind::ShoppingList => Template {
            title: "New shopping list in Notion",
            message: "Shopping list \"{title}\" was created.",
            tag: "shopping_trolley",
            action_label: "Open list",
            link: LinkField::Url,
        },
    }
}

/// Render the notification for one result
pub fn render(result: &DispatchResult) -> PushNotification {
    let template = template_for(result.kind());

    let message = template
        .message
        .replace("{title}", result.item.title())
        .replace("{start}", result.item.start().unwrap_or(UNKNOWN_START));

    let mut notification = PushNotification::new(message)
        .with_title(template.title)
        .with_tags([template.tag]);

    if let Some(url) = result
        .outcome
        .receipt()
        .and_then(|receipt| receipt.link(template.link))
    {
        notification = notification.with_action(template.action_label, url);
    }
    notification
}

/// Sends one push per dispatch result
pub struct NotificationDispatcher {
    notifier: Arc<dyn PushNotifier>,
}

impl NotificationDispatcher {
    pub fn new(notifier: Arc<dyn PushNotifier>) -> Self {
        Self { notifier }
    }

    /// Announce every result; never fails
    pub async fn notify(&self, results: &[DispatchResult]) {
        for result in results {
            let notification = render(result);
            match self.notifier.push(&notification).await {
                Ok(()) => debug!(kind = result.kind().as_str(), "Notification sent"),
                Err(e) => warn!(
                    kind = result.kind().as_str(),
                    error = %e,
                    "Failed to send notification"
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EventItem, Outcome, Receipt, SourceItem, TaskItem, TaskReceipt};

    #[test]
    fn test_task_notification_with_link() {
        let result = DispatchResult::new(
            SourceItem::Task(TaskItem::new("Buy milk")),
            Outcome::Created(Receipt::Task(TaskReceipt {
                task_id: Some("t1".to_string()),
                title: Some("Buy milk".to_string()),
                due: None,
                status: Some("needsAction".to_string()),
                web_view_link: Some("https://tasks.google.com/t1".to_string()),
            })),
        );

        let n = render(&result);
        assert_eq!(n.title.as_deref(), Some("New task in Google Tasks"));
        assert_eq!(n.message, "Task \"Buy milk\" was created.");
        assert_eq!(n.tags, vec!["white_check_mark".to_string()]);
        assert_eq!(n.actions[0].label, "Open task");
        assert_eq!(n.actions[0].url, "https://tasks.google.com/t1");
    }

    #[test]
    fn test_failed_event_has_no_action() {
        let result = DispatchResult::new(
            SourceItem::Event(EventItem::new(
                "Call Alice",
                "2026-10-17 15:00:00",
                "2026-10-17 16:00:00",
            )),
            Outcome::failed("calendar down"),
        );

        let n = render(&result);
        assert_eq!(
            n.message,
            "Event \"Call Alice\" was created for 2026-10-17 15:00:00."
        );
        assert!(n.actions.is_empty());
    }

    #[test]
    fn test_every_kind_has_distinct_tag() {
        let kinds = [
            ItemKind::Task,
            ItemKind::Event,
            ItemKind::Note,
            ItemKind::ShoppingList,
        ];
        let mut tags: Vec<&str> = kinds.iter().map(|k| template_for(*k).tag).collect();
        tags.sort();
        tags.dedup();
        assert_eq!(tags.len(), kinds.len());
        assert_eq!(template_for(ItemKind::ShoppingList).link, LinkField::Url);
    }
}
