//! Closed placeholder set for prompt template rendering.

use crate::storage::work_items::WorkItem;

/// Substitute every occurrence of `{name}` for a supported placeholder.
///
/// Unsupported `{name}` tokens are left verbatim: validation of template
/// placeholders happens once, when a template is saved, not at render time.
pub fn render(template: &str, item: &WorkItem) -> String {
    template
        .replace("{article_title}", item.title.as_deref().unwrap_or(""))
        .replace("{article_content}", item.content_text.as_deref().unwrap_or(""))
        .replace("{article_author}", item.author.as_deref().unwrap_or(""))
        .replace("{article_raw_html}", item.content_html.as_deref().unwrap_or(""))
}

/// Prepend `prefix` to `comment`, unless `comment` already starts with it.
pub fn with_disclosure_prefix(comment: &str, prefix: &str) -> String {
    if comment.starts_with(prefix) {
        comment.to_string()
    } else {
        format!("{prefix} {comment}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::work_items::WorkItemStatus;
    use chrono::Utc;
    use uuid::Uuid;

    fn item(title: &str, content: &str, author: &str, html: &str) -> WorkItem {
        WorkItem {
            id: Uuid::new_v4(),
            process_id: Uuid::new_v4(),
            login_id: Uuid::new_v4(),
            user_id: "1".to_string(),
            article_id: "1001".to_string(),
            upstream_comment_id: None,
            prompt_template_id: None,
            llm_provider_id: None,
            title: Some(title.to_string()),
            author: Some(author.to_string()),
            category_id: None,
            task_id: None,
            url: None,
            content_text: Some(content.to_string()),
            content_html: Some(html.to_string()),
            published_at: None,
            edited_at: None,
            scraped_at: None,
            comment_text: None,
            llm_model_name: None,
            llm_provider_name: None,
            generation_tokens: None,
            generation_time_ms: None,
            status: WorkItemStatus::Prepared,
            created_at: Utc::now(),
            posted_at: None,
            failed_at: None,
            error_message: None,
            retry_count: 0,
        }
    }

    #[test]
    fn substitutes_all_supported_placeholders() {
        let template = "Titel: {article_title}\nVon: {article_author}\n{article_content}";
        let work_item = item("Ein Titel", "Der Inhalt.", "Max", "<p>Der Inhalt.</p>");
        let rendered = render(template, &work_item);
        assert_eq!(rendered, "Titel: Ein Titel\nVon: Max\nDer Inhalt.");
    }

    #[test]
    fn unsupported_placeholder_is_left_verbatim() {
        let template = "{article_title} {not_a_real_placeholder}";
        let work_item = item("Titel", "Inhalt", "Autor", "<p>Inhalt</p>");
        let rendered = render(template, &work_item);
        assert_eq!(rendered, "Titel {not_a_real_placeholder}");
    }

    #[test]
    fn missing_field_substitutes_empty_string() {
        let mut work_item = item("Titel", "Inhalt", "Autor", "<p>Inhalt</p>");
        work_item.title = None;
        let rendered = render("[{article_title}] {article_author}", &work_item);
        assert_eq!(rendered, "[] Autor");
    }

    #[test]
    fn disclosure_prefix_is_added_once() {
        let prefix = "[Dieser Kommentar stammt von einem KI-ChatBot.]";
        let once = with_disclosure_prefix("Toller Artikel!", prefix);
        assert_eq!(once, format!("{prefix} Toller Artikel!"));

        let twice = with_disclosure_prefix(&once, prefix);
        assert_eq!(twice, once);
    }
}
