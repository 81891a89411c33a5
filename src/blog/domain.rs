// Domain types - pure, no storage access
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fmt;

/// New types for compile-time safety
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(uuid::Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PostId(pub i64);

impl PostId {
    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which posts a feed query selects, after slugs and usernames are resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostFilter {
    All,
    Group(i64),
    Author(UserId),
    FollowedBy(UserId),
}

// -- Field errors --

/// Field-level validation messages, rendered next to each form input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors {
    entries: Vec<(&'static str, String)>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.entries.push((field, message.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has(&self, field: &str) -> bool {
        self.entries.iter().any(|(f, _)| *f == field)
    }

    /// All messages for `field` joined into one line; empty when the field is valid.
    pub fn message(&self, field: &str) -> String {
        self.entries
            .iter()
            .filter(|(f, _)| *f == field)
            .map(|(_, m)| m.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn into_result<T>(self, value: T) -> Result<T, FieldErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .entries
            .iter()
            .map(|(field, msg)| format!("{field}: {msg}"))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

const REQUIRED: &str = "This field is required.";
const INVALID_CHOICE: &str = "Select a valid choice.";

// -- Public input (what clients may send) --

/// Post form as submitted by a client. It has no author, timestamp or image
/// field; unknown form fields are ignored on deserialization.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostInput {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub group: Option<String>,
}

/// A post form that passed field validation. The group id is well-formed but
/// not yet checked against the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostDraft {
    pub text: String,
    pub group_id: Option<i64>,
}

impl PostInput {
    pub fn validate(&self) -> Result<PostDraft, FieldErrors> {
        let mut errors = FieldErrors::new();

        let text = self.text.trim();
        if text.is_empty() {
            errors.add("text", REQUIRED);
        }

        let group_id = match self.group.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => match raw.parse::<i64>() {
                Ok(id) => Some(id),
                Err(_) => {
                    errors.add("group", INVALID_CHOICE);
                    None
                }
            },
        };

        errors.into_result(PostDraft {
            text: text.to_string(),
            group_id,
        })
    }

    /// Mark the chosen group as nonexistent.
    pub fn unknown_group_error() -> FieldErrors {
        let mut errors = FieldErrors::new();
        errors.add("group", INVALID_CHOICE);
        errors
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommentInput {
    #[serde(default)]
    pub text: String,
}

impl CommentInput {
    pub fn validate(&self) -> Result<String, FieldErrors> {
        let mut errors = FieldErrors::new();
        let text = self.text.trim();
        if text.is_empty() {
            errors.add("text", REQUIRED);
        }
        errors.into_result(text.to_string())
    }
}

// -- Internal records (what the server persists) --

/// A post ready to insert. Author and timestamp come from the server only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPost {
    author_id: UserId,
    text: String,
    group_id: Option<i64>,
    image: Option<String>,
    created_at: DateTime<Utc>,
}

impl NewPost {
    pub fn new(author_id: UserId, draft: PostDraft, created_at: DateTime<Utc>) -> Self {
        Self {
            author_id,
            text: draft.text,
            group_id: draft.group_id,
            image: None,
            created_at,
        }
    }

    /// Attach a stored image path (relative to the media directory).
    #[cfg(test)]
    pub fn with_image(mut self, path: impl Into<String>) -> Self {
        self.image = Some(path.into());
        self
    }

    pub fn author_id(&self) -> &UserId {
        &self.author_id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn group_id(&self) -> Option<i64> {
        self.group_id
    }

    pub fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// A comment ready to insert; post, author and timestamp are set server-side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewComment {
    post_id: PostId,
    author_id: UserId,
    text: String,
    created_at: DateTime<Utc>,
}

impl NewComment {
    pub fn new(post_id: PostId, author_id: UserId, text: String, created_at: DateTime<Utc>) -> Self {
        Self {
            post_id,
            author_id,
            text,
            created_at,
        }
    }

    pub fn post_id(&self) -> PostId {
        self.post_id
    }

    pub fn author_id(&self) -> &UserId {
        &self.author_id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Stored timestamps are RFC 3339 with millisecond precision so that text
/// ordering matches time ordering.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

// -- Pagination --

/// One page of a feed plus the metadata the paginator renders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: u32,
    pub num_pages: u32,
    pub count: u64,
}

/// Resolved slice of a result set: which page, and the LIMIT/OFFSET to fetch it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub number: u32,
    pub num_pages: u32,
    pub limit: u32,
    pub offset: u64,
}

impl PageWindow {
    /// Resolve a raw `page` parameter against a result set of `count` items.
    ///
    /// Missing or non-numeric values select page 1. Values below 1 or past the
    /// end select the last page. An empty result set still has one page.
    pub fn resolve(raw: Option<&str>, count: u64, per_page: u32) -> Self {
        let per_page = per_page.max(1);
        let num_pages = count.div_ceil(u64::from(per_page)).max(1);
        let num_pages = u32::try_from(num_pages).unwrap_or(u32::MAX);

        let number = match raw.map(str::trim).map(str::parse::<i64>) {
            None | Some(Err(_)) => 1,
            Some(Ok(n)) if n < 1 || n > i64::from(num_pages) => num_pages,
            Some(Ok(n)) => n as u32,
        };

        Self {
            number,
            num_pages,
            limit: per_page,
            offset: u64::from(number - 1) * u64::from(per_page),
        }
    }

    pub fn into_page<T>(self, items: Vec<T>, count: u64) -> Page<T> {
        Page {
            items,
            number: self.number,
            num_pages: self.num_pages,
            count,
        }
    }
}

impl<T> Page<T> {
    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn has_other_pages(&self) -> bool {
        self.has_previous() || self.has_next()
    }

    pub fn previous_number(&self) -> u32 {
        self.number.saturating_sub(1).max(1)
    }

    pub fn next_number(&self) -> u32 {
        (self.number + 1).min(self.num_pages)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Only the author of a post may change it.
pub fn is_owner(actor: &UserId, author_id: &str) -> bool {
    actor.as_str() == author_id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_input_requires_text() {
        let input = PostInput {
            text: "   ".to_string(),
            group: None,
        };
        let errors = input.validate().unwrap_err();
        assert!(errors.has("text"));
        assert_eq!(errors.message("text"), REQUIRED);
        assert!(!errors.has("group"));
    }

    #[test]
    fn post_input_trims_text_and_parses_group() {
        let input = PostInput {
            text: "  hello world \n".to_string(),
            group: Some("7".to_string()),
        };
        let draft = input.validate().unwrap();
        assert_eq!(draft.text, "hello world");
        assert_eq!(draft.group_id, Some(7));
    }

    #[test]
    fn post_input_empty_group_means_none() {
        let input = PostInput {
            text: "x".to_string(),
            group: Some(String::new()),
        };
        assert_eq!(input.validate().unwrap().group_id, None);
    }

    #[test]
    fn post_input_rejects_malformed_group() {
        let input = PostInput {
            text: "x".to_string(),
            group: Some("rust".to_string()),
        };
        let errors = input.validate().unwrap_err();
        assert_eq!(errors.message("group"), INVALID_CHOICE);
    }

    #[test]
    fn comment_input_requires_text() {
        assert!(CommentInput::default().validate().is_err());
        let ok = CommentInput {
            text: " nice ".to_string(),
        };
        assert_eq!(ok.validate().unwrap(), "nice");
    }

    #[test]
    fn new_post_takes_author_and_time_from_server() {
        let now = Utc::now();
        let draft = PostDraft {
            text: "hi".to_string(),
            group_id: None,
        };
        let post = NewPost::new(UserId::new("me"), draft, now).with_image("posts/a.gif");
        assert_eq!(post.author_id().as_str(), "me");
        assert_eq!(post.created_at(), now);
        assert_eq!(post.image(), Some("posts/a.gif"));
    }

    #[test]
    fn timestamps_sort_lexically() {
        let a = Utc::now();
        let b = a + chrono::Duration::milliseconds(1);
        assert!(format_timestamp(a) < format_timestamp(b));
        assert!(format_timestamp(a).ends_with('Z'));
    }

    #[test]
    fn window_first_page_by_default() {
        let w = PageWindow::resolve(None, 25, 10);
        assert_eq!((w.number, w.num_pages, w.offset), (1, 3, 0));
        assert_eq!(PageWindow::resolve(Some("abc"), 25, 10).number, 1);
    }

    #[test]
    fn window_saturates_to_last_page() {
        assert_eq!(PageWindow::resolve(Some("99"), 25, 10).number, 3);
        assert_eq!(PageWindow::resolve(Some("0"), 25, 10).number, 3);
        assert_eq!(PageWindow::resolve(Some("-4"), 25, 10).number, 3);
        let last = PageWindow::resolve(Some("3"), 25, 10);
        assert_eq!(last.offset, 20);
    }

    #[test]
    fn window_empty_set_has_one_page() {
        let w = PageWindow::resolve(Some("5"), 0, 10);
        assert_eq!((w.number, w.num_pages, w.offset), (1, 1, 0));
    }

    #[test]
    fn window_exact_multiple() {
        let w = PageWindow::resolve(Some("2"), 20, 10);
        assert_eq!((w.number, w.num_pages, w.offset), (2, 2, 10));
    }

    #[test]
    fn page_navigation_flags() {
        let page = PageWindow::resolve(Some("2"), 25, 10).into_page(vec![1, 2, 3], 25);
        assert!(page.has_previous());
        assert!(page.has_next());
        assert_eq!(page.previous_number(), 1);
        assert_eq!(page.next_number(), 3);

        let only = PageWindow::resolve(None, 3, 10).into_page(vec![1, 2, 3], 3);
        assert!(!only.has_other_pages());
    }

    #[test]
    fn owner_check() {
        assert!(is_owner(&UserId::new("u1"), "u1"));
        assert!(!is_owner(&UserId::new("u2"), "u1"));
    }
}
