//! # rl-ui
//!
//! Askama templates. Everything a template shows is pre-formatted here so
//! the markup stays free of logic.

use askama::Template;
use chrono::{Local, TimeZone};
use rl_core::{PostView, PostsPage, Timestamp};

pub const SITE_TITLE: &str = "Roving Lily 漂流百合";

/// One post as shown on the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostCard {
    pub id: u32,
    pub nickname: String,
    pub owner: String,
    pub content: String,
    pub likes: u64,
    pub dislikes: u64,
    pub attention: u64,
    pub reply_count: usize,
    pub posted_at: String,
    pub last_reply_at: String,
}

impl PostCard {
    pub fn from_view(view: &PostView) -> Self {
        Self {
            id: view.id,
            nickname: view.nickname.clone(),
            owner: view.owner.clone(),
            content: view.content.clone(),
            likes: view.likes,
            dislikes: view.dislikes,
            attention: view.attention,
            reply_count: view.reply_count,
            posted_at: local_datetime(view.posted_time),
            last_reply_at: local_datetime(view.last_reply_time),
        }
    }
}

/// Formats a ledger timestamp in the server's local time zone.
pub fn local_datetime(ts: Timestamp) -> String {
    i64::try_from(ts)
        .ok()
        .and_then(|millis| Local.timestamp_millis_opt(millis).single())
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[derive(Template)]
#[template(path = "posts.html")]
pub struct PostsTemplate {
    pub title: &'static str,
    pub heading: String,
    pub posts: Vec<PostCard>,
    /// Shown only when the ledger is monitoring the rendered day.
    pub activity: Option<u64>,
    pub skipped: usize,
}

impl PostsTemplate {
    pub fn new(page: &PostsPage, activity: Option<u64>) -> Self {
        let day = page
            .bucket
            .date()
            .map(|date| date.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| format!("day {}", page.bucket));

        Self {
            title: SITE_TITLE,
            heading: format!("Posts {} on {}", page.index.label(), day),
            posts: page.posts.iter().map(PostCard::from_view).collect(),
            activity,
            skipped: page.skipped,
        }
    }
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub title: &'static str,
    pub version: &'static str,
}

impl Default for IndexTemplate {
    fn default() -> Self {
        Self {
            title: SITE_TITLE,
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}
