//! Discovery, article-fetch, and comment-posting operations against the
//! upstream platform.

use chrono::{DateTime, Utc};
use scraper::{Html, Selector};
use uuid::Uuid;

use crate::error::ScrapingError;
use crate::storage::processes::ProcessFilter;

use super::mapping;
use super::session::SessionRegistry;

/// An article discovered from the index page. Metadata only, no body.
#[derive(Debug, Clone)]
pub struct DiscoveredArticle {
    /// Upstream article id.
    pub article_id: String,
    /// Upstream account id owning the article, when extractable from the
    /// card (the index page does not always expose it).
    pub user_id: String,
    /// Article title.
    pub title: String,
    /// Article author display name.
    pub author: String,
    /// Article URL, absolute.
    pub url: String,
}

/// Full article content, fetched from the detail page.
#[derive(Debug, Clone)]
pub struct ArticleContent {
    /// Article title.
    pub title: String,
    /// Article author display name.
    pub author: String,
    /// Cleaned article body text.
    pub content_text: String,
    /// Raw article HTML with `<textarea>` children stripped.
    pub content_html: String,
    /// Category id, resolved from the "Kategorie:" detail line.
    pub category_id: Option<i64>,
    /// Task id, resolved from the "Aufgabe:" detail line.
    pub task_id: Option<i64>,
    /// CSRF token found in the comment form, required to post a comment.
    pub csrf_token: Option<String>,
}

/// Discover up to `limit` articles matching `filter` on `tab`.
pub async fn discover_articles(
    registry: &SessionRegistry,
    session: &super::session::Session,
    base_url: &str,
    filter: &ProcessFilter,
    limit: usize,
) -> Result<Vec<DiscoveredArticle>, ScrapingError> {
    let tab = filter.tab.as_deref().unwrap_or("alle");
    let mut url = format!("{base_url}/articles/?tab={tab}");
    if let Some(category) = &filter.category {
        url.push_str(&format!("&kategorie={category}"));
    }
    if let Some(task) = &filter.task {
        url.push_str(&format!("&aufgabe={task}"));
    }

    let parsed = reqwest::Url::parse(&url).map_err(|_| ScrapingError::ParseError {
        message: format!("invalid articles url: {url}"),
    })?;

    let response = registry
        .request_with_redirects(session, reqwest::Method::GET, parsed, None)
        .await?;

    if !response.status().is_success() {
        return Err(ScrapingError::HttpStatus {
            status: response.status().as_u16(),
            path: "/articles/".to_string(),
        });
    }

    let html = response
        .text()
        .await
        .map_err(|source| ScrapingError::Network { source })?;

    let mut articles = extract_articles(&html, base_url);

    if let Some(search) = &filter.search {
        let search_lower = search.to_lowercase();
        articles.retain(|a| a.title.to_lowercase().contains(&search_lower));
    }

    articles.truncate(limit);
    Ok(articles)
}

fn extract_articles(html: &str, base_url: &str) -> Vec<DiscoveredArticle> {
    let document = Html::parse_document(html);
    let Ok(card_selector) = Selector::parse("[class*=article-list] > div") else {
        return Vec::new();
    };
    let link_selector = Selector::parse("a").unwrap();
    let title_selector = Selector::parse(".article-title").unwrap();
    let author_selector = Selector::parse(".article-author").unwrap();

    let mut articles = Vec::new();
    for card in document.select(&card_selector) {
        let Some(link) = card.select(&link_selector).next() else {
            continue;
        };
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let Some(article_id) = href.trim_matches('/').rsplit('/').next() else {
            continue;
        };
        if article_id.is_empty() {
            continue;
        }

        let title = card
            .select(&title_selector)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .unwrap_or_else(|| "Unknown Title".to_string());
        let author = card
            .select(&author_selector)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .unwrap_or_else(|| "Unknown Author".to_string());

        let url = if href.starts_with('/') {
            format!("{base_url}{href}")
        } else {
            href.to_string()
        };

        articles.push(DiscoveredArticle {
            article_id: article_id.to_string(),
            user_id: String::new(),
            title,
            author,
            url,
        });
    }
    articles
}

/// Fetch the full content of a single article.
pub async fn fetch_article(
    registry: &SessionRegistry,
    session: &super::session::Session,
    base_url: &str,
    article_id: &str,
) -> Result<ArticleContent, ScrapingError> {
    let url = format!("{base_url}/article/{article_id}/");
    let parsed = reqwest::Url::parse(&url).map_err(|_| ScrapingError::ParseError {
        message: format!("invalid article url: {url}"),
    })?;

    let response = registry
        .request_with_redirects(session, reqwest::Method::GET, parsed, None)
        .await?;

    if !response.status().is_success() {
        return Err(ScrapingError::HttpStatus {
            status: response.status().as_u16(),
            path: format!("/article/{article_id}/"),
        });
    }

    let html = response
        .text()
        .await
        .map_err(|source| ScrapingError::Network { source })?;

    parse_article_detail(&html)
}

fn parse_article_detail(html: &str) -> Result<ArticleContent, ScrapingError> {
    let mut document = Html::parse_document(html);

    // `div.article` can embed a `<textarea>` (e.g. the text-to-speech
    // mirror of the body); strip it before serializing.
    let textarea_selector = Selector::parse("div.article textarea").unwrap();
    let textarea_ids: Vec<_> = document
        .select(&textarea_selector)
        .map(|el| el.id())
        .collect();
    for id in textarea_ids {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }

    let h1_selector = Selector::parse("h1").unwrap();
    let (title, author) = if let Some(h1) = document.select(&h1_selector).next() {
        let text = h1.text().collect::<String>().trim().to_string();
        if let Some((title, author)) = text.split_once(" von ") {
            (title.trim().to_string(), author.trim().to_string())
        } else {
            (text, "Unknown Author".to_string())
        }
    } else {
        ("Unknown Title".to_string(), "Unknown Author".to_string())
    };

    let paragraph_selector = Selector::parse(".article .highlight-target p").unwrap();
    let content_text: String = document
        .select(&paragraph_selector)
        .map(|p| p.text().collect::<String>().trim().to_string())
        .collect::<Vec<_>>()
        .join("\n");

    let article_selector = Selector::parse("div.article").unwrap();
    let content_html = document
        .select(&article_selector)
        .next()
        .map(|el| el.html())
        .unwrap_or_default();

    let list_item_selector = Selector::parse("li.list-group-item").unwrap();
    let mut category_id = None;
    let mut task_id = None;
    for item in document.select(&list_item_selector) {
        let text = item.text().collect::<String>();
        let text = text.trim();
        if let Some(rest) = text.strip_prefix("Kategorie:") {
            category_id = mapping::category_id(rest.trim());
        } else if let Some(rest) = text.strip_prefix("Aufgabe:") {
            task_id = mapping::task_id(rest.trim());
        }
    }

    let comment_form_selector = Selector::parse("form").unwrap();
    let csrf_input_selector = Selector::parse("input[name=csrfmiddlewaretoken]").unwrap();
    let csrf_token = document
        .select(&comment_form_selector)
        .find(|form| {
            form.value()
                .attr("action")
                .is_some_and(|action| action.contains("/comment/"))
        })
        .and_then(|form| form.select(&csrf_input_selector).next())
        .and_then(|input| input.value().attr("value"))
        .map(str::to_string);

    Ok(ArticleContent {
        title,
        author,
        content_text,
        content_html,
        category_id,
        task_id,
        csrf_token,
    })
}

/// Post a comment to an article. Returns `true` on a 200/302 response,
/// mirroring the upstream platform's redirect-after-post pattern.
pub async fn post_comment(
    registry: &SessionRegistry,
    session: &super::session::Session,
    base_url: &str,
    article_id: &str,
    csrf_token: &str,
    comment_text: &str,
) -> Result<bool, ScrapingError> {
    let url = format!("{base_url}/article/{article_id}/comment/");
    let parsed = reqwest::Url::parse(&url).map_err(|_| ScrapingError::ParseError {
        message: format!("invalid comment url: {url}"),
    })?;

    let form = [
        ("csrfmiddlewaretoken", csrf_token),
        ("text", comment_text),
        ("status", "20"),
        ("highlight", ""),
    ];

    let response = registry
        .request_with_redirects(session, reqwest::Method::POST, parsed, Some(&form))
        .await?;

    Ok(matches!(response.status().as_u16(), 200 | 302))
}

/// Construct the synthetic upstream comment id, since the upstream
/// platform's response does not expose one.
///
/// Format: `{article_id}-{unix_seconds}-{item_id_prefix8}`.
pub fn synthetic_comment_id(article_id: &str, posted_at: DateTime<Utc>, item_id: Uuid) -> String {
    format!(
        "{article_id}-{}-{}",
        posted_at.timestamp(),
        &item_id.simple().to_string()[..8]
    )
}
