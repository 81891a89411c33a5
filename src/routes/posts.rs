use askama::Template;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Router};

use crate::blog::domain::is_owner;
use crate::blog::{
    CommentInput, CommentOutcome, CreateOutcome, EditOutcome, FeedContext, FeedSubject,
    FieldErrors, Page, PostFilter, PostId, PostInput, UserId,
};
use crate::db::models::{CommentView, Group, PostView, User};
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, MaybeUser};
use crate::routes::home::{invalidate_index, Html};
use crate::routes::PageQuery;
use crate::state::AppState;

// --- View structs ---

/// One `<option>` of the group select.
pub struct GroupChoice {
    pub id: i64,
    pub title: String,
    pub selected: bool,
}

// --- Templates ---

#[derive(Template)]
#[template(path = "pages/group.html")]
pub struct GroupTemplate {
    pub user: Option<CurrentUser>,
    pub group: Group,
    pub page: Page<PostView>,
}

#[derive(Template)]
#[template(path = "pages/profile.html")]
pub struct ProfileTemplate {
    pub user: Option<CurrentUser>,
    pub author: User,
    pub page: Page<PostView>,
    pub is_self: bool,
    pub is_following: bool,
    pub follower_count: u64,
    pub following_count: u64,
}

#[derive(Template)]
#[template(path = "pages/post_detail.html")]
pub struct PostDetailTemplate {
    pub user: Option<CurrentUser>,
    pub post: PostView,
    pub comments: Vec<CommentView>,
    pub author_post_count: u64,
    pub can_edit: bool,
    pub comment_text: String,
    pub errors: FieldErrors,
}

#[derive(Template)]
#[template(path = "pages/post_form.html")]
pub struct PostFormTemplate {
    pub user: Option<CurrentUser>,
    pub is_edit: bool,
    pub action: String,
    pub text: String,
    pub groups: Vec<GroupChoice>,
    pub errors: FieldErrors,
}

// --- Router ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/group/{slug}/", get(group_posts))
        .route("/profile/{username}/", get(profile))
        .route("/posts/{id}/", get(post_detail))
        .route("/create/", get(create_page).post(create_post))
        .route("/posts/{id}/edit/", get(edit_page).post(edit_post))
        .route("/posts/{id}/comment/", post(add_comment))
}

// --- Helpers ---

fn detail_url(id: PostId) -> String {
    format!("/posts/{}/", id)
}

fn profile_url(username: &str) -> String {
    format!("/profile/{}/", username)
}

async fn group_choices(state: &AppState, selected: Option<i64>) -> AppResult<Vec<GroupChoice>> {
    let groups = state.repo.list_groups().await?;
    Ok(groups
        .into_iter()
        .map(|g| GroupChoice {
            selected: selected == Some(g.id),
            id: g.id,
            title: g.title,
        })
        .collect())
}

/// The group the user picked, if it parses; used to keep the selection on re-render.
fn selected_group(input: &PostInput) -> Option<i64> {
    input
        .group
        .as_deref()
        .and_then(|g| g.trim().parse::<i64>().ok())
}

async fn render_form(
    state: &AppState,
    user: CurrentUser,
    post_id: Option<PostId>,
    text: String,
    selected: Option<i64>,
    errors: FieldErrors,
) -> AppResult<Response> {
    let action = match post_id {
        Some(id) => format!("/posts/{}/edit/", id),
        None => "/create/".to_string(),
    };
    let groups = group_choices(state, selected).await?;

    Ok(Html(PostFormTemplate {
        user: Some(user),
        is_edit: post_id.is_some(),
        action,
        text,
        groups,
        errors,
    })
    .into_response())
}

// --- Handlers ---

async fn group_posts(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> AppResult<Response> {
    let feed = state
        .feeds
        .assemble(FeedContext::Group { slug: &slug }, query.page.as_deref())
        .await?;

    let FeedSubject::Group(group) = feed.subject else {
        return Err(AppError::Internal("group feed without a group".into()));
    };

    Ok(Html(GroupTemplate {
        user,
        group,
        page: feed.page,
    })
    .into_response())
}

async fn profile(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> AppResult<Response> {
    let feed = state
        .feeds
        .assemble(FeedContext::Profile { username: &username }, query.page.as_deref())
        .await?;

    let FeedSubject::Author(author) = feed.subject else {
        return Err(AppError::Internal("profile feed without an author".into()));
    };
    let author_id = UserId::new(&author.id);

    let viewer = user.as_ref().map(CurrentUser::user_id);
    let is_self = viewer.as_ref() == Some(&author_id);
    let is_following = match &viewer {
        Some(v) if !is_self => state.follows.is_following(v, &author_id).await?,
        _ => false,
    };

    Ok(Html(ProfileTemplate {
        user,
        follower_count: state.follows.follower_count(&author_id).await?,
        following_count: state.follows.following_count(&author_id).await?,
        author,
        page: feed.page,
        is_self,
        is_following,
    })
    .into_response())
}

async fn post_detail(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(id): Path<i64>,
) -> AppResult<Response> {
    render_detail(&state, user, PostId(id), String::new(), FieldErrors::new()).await
}

/// Post page with comments; `comment_text` and `errors` refill a rejected comment form.
async fn render_detail(
    state: &AppState,
    user: Option<CurrentUser>,
    post_id: PostId,
    comment_text: String,
    errors: FieldErrors,
) -> AppResult<Response> {
    let post = state.posts.get(post_id).await?;
    let comments = state.repo.list_comments(post_id).await?;
    let author_post_count = state
        .repo
        .count_posts(&PostFilter::Author(UserId::new(&post.author_id)))
        .await?;
    let can_edit = user
        .as_ref()
        .is_some_and(|u| is_owner(&u.user_id(), &post.author_id));

    Ok(Html(PostDetailTemplate {
        user,
        post,
        comments,
        author_post_count,
        can_edit,
        comment_text,
        errors,
    })
    .into_response())
}

async fn create_page(State(state): State<AppState>, user: CurrentUser) -> AppResult<Response> {
    render_form(&state, user, None, String::new(), None, FieldErrors::new()).await
}

async fn create_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Form(input): Form<PostInput>,
) -> AppResult<Response> {
    match state.posts.create_post(&user.user_id(), &input).await? {
        CreateOutcome::Created(_) => {
            invalidate_index(&state).await;
            Ok(Redirect::to(&profile_url(&user.username)).into_response())
        }
        CreateOutcome::Invalid(errors) => {
            let selected = selected_group(&input);
            render_form(&state, user, None, input.text, selected, errors).await
        }
    }
}

async fn edit_page(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Response> {
    let post_id = PostId(id);
    let post = state.posts.get(post_id).await?;

    if !is_owner(&user.user_id(), &post.author_id) {
        return Ok(Redirect::to(&detail_url(post_id)).into_response());
    }

    render_form(
        &state,
        user,
        Some(post_id),
        post.text,
        post.group_id,
        FieldErrors::new(),
    )
    .await
}

async fn edit_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Form(input): Form<PostInput>,
) -> AppResult<Response> {
    let post_id = PostId(id);

    match state.posts.edit_post(&user.user_id(), post_id, &input).await? {
        EditOutcome::Updated => {
            invalidate_index(&state).await;
            Ok(Redirect::to(&detail_url(post_id)).into_response())
        }
        EditOutcome::Forbidden => Ok(Redirect::to(&detail_url(post_id)).into_response()),
        EditOutcome::Invalid(errors) => {
            let selected = selected_group(&input);
            render_form(&state, user, Some(post_id), input.text, selected, errors).await
        }
    }
}

async fn add_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Form(input): Form<CommentInput>,
) -> AppResult<Response> {
    let post_id = PostId(id);

    match state
        .posts
        .add_comment(&user.user_id(), post_id, &input)
        .await?
    {
        CommentOutcome::Added(_) => Ok(Redirect::to(&detail_url(post_id)).into_response()),
        CommentOutcome::Invalid(errors) => {
            tracing::debug!("Rejected comment on post {}: {}", post_id, errors);
            render_detail(&state, Some(user), post_id, input.text, errors).await
        }
    }
}
