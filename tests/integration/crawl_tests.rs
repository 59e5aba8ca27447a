//! Integration tests for the crawler
//!
//! These tests use wiremock to stand up a mock forum and run the full
//! login, crawl, classify, anonymize and aggregate cycle end-to-end.

use forum_sieve::analysis::Summary;
use forum_sieve::config::{parse_config, Config, Credentials};
use forum_sieve::crawler::{Coordinator, RateLimiter};
use forum_sieve::post::OpportunityCategory;
use forum_sieve::state::TerminationReason;
use forum_sieve::Anonymizer;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LOGIN_PAGE: &str = r#"<html><head><title>Log in</title></head><body>
    <form id="login-form" action="/login" method="post">
        <input type="hidden" name="csrf_token" value="tok123">
        <input type="text" name="username">
        <input type="password" name="password">
    </form>
</body></html>"#;

const LOGGED_IN_PAGE: &str =
    r#"<html><body><div class="user-menu">Welcome back <a href="/logout">Logout</a></div></body></html>"#;

/// Creates a test configuration pointing at the mock server
///
/// Pacing is disabled and retry delays are a few milliseconds.
fn create_test_config(base_url: &str) -> Config {
    parse_config(&format!(
        r#"
        [site]
        base-url = "{}"

        [sections]
        general = "/forum/general"
        parenting = "/forum/parenting"

        [crawler]
        max-pages = 5
        page-retries = 0
        max-retries = 3
        retry-delay-ms = 10
        max-retry-delay-ms = 40
        login-attempts = 2

        [rate-limit]
        interval-ms = 0
        jitter-ms = 0
        "#,
        base_url
    ))
    .expect("test config is valid")
}

fn credentials() -> Credentials {
    Credentials::new("tester", "secret")
}

/// Renders a forum listing page; each post is (id, author, content)
fn forum_page(posts: &[(&str, &str, &str)]) -> String {
    let mut html = String::from(
        r#"<html><head><title>General discussion</title></head><body><div class="posts">"#,
    );
    for (id, author, content) in posts {
        html.push_str(&format!(
            r#"<div class="post" data-post-id="{id}">
                <span class="author">{author}</span>
                <time datetime="2024-01-17T14:30:00Z">Jan 17</time>
                <h3 class="title">Topic {id}</h3>
                <div class="content">{content}</div>
                <span class="replies">4 replies</span>
                <span class="views">1,200 views</span>
            </div>"#,
            id = id,
            author = author,
            content = content
        ));
    }
    html.push_str("</div></body></html>");
    html
}

fn html(body: impl Into<String>) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(body.into())
        .insert_header("content-type", "text/html")
}

/// Mounts robots.txt, the login form, a successful login and logout
async fn mount_site(server: &MockServer, robots: &str) {
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(robots.to_string()))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(html(LOGIN_PAGE))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/logout"))
        .respond_with(html("<html><body>Bye</body></html>"))
        .mount(server)
        .await;
}

async fn mount_login_success(server: &MockServer, times: u64) {
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(html(LOGGED_IN_PAGE))
        .expect(times)
        .mount(server)
        .await;
}

/// Mounts page `page` (1 = no query parameter) of a section
async fn mount_page(server: &MockServer, section_path: &str, page: u32, body: String) {
    let mock = Mock::given(method("GET")).and(path(section_path));
    if page == 1 {
        mock.respond_with(html(body)).mount(server).await;
    } else {
        mock.and(query_param("page", page.to_string()))
            .respond_with(html(body))
            .with_priority(1)
            .mount(server)
            .await;
    }
}

#[tokio::test]
async fn test_full_run_single_section() {
    let server = MockServer::start().await;
    mount_site(&server, "User-agent: *\nAllow: /").await;
    mount_login_success(&server, 1).await;

    mount_page(
        &server,
        "/forum/general",
        1,
        forum_page(&[
            ("1", "mommy_sarah", "Can anyone recommend a pediatrician? Email me at sarah@example.com"),
            ("2", "rivka", "We loved Dr. Cohen, highly recommend. Ask mommy_sarah too"),
        ]),
    )
    .await;
    // Post 1 is a sticky thread repeated on every page
    mount_page(
        &server,
        "/forum/general",
        2,
        forum_page(&[
            ("1", "mommy_sarah", "Can anyone recommend a pediatrician? Email me at sarah@example.com"),
            ("3", "leah", "Looking for a stroller that fits in a small car"),
        ]),
    )
    .await;
    mount_page(&server, "/forum/general", 3, forum_page(&[])).await;

    let coordinator = Coordinator::new(create_test_config(&server.uri()));
    let report = coordinator
        .run(&credentials(), &["general".to_string()])
        .await
        .expect("run completes");

    assert!(!report.aborted);
    assert_eq!(report.posts.len(), 3);

    let ids: Vec<&str> = report.posts.iter().map(|p| p.post_id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2", "3"]);

    // Authors are masked and contact details redacted
    for post in &report.posts {
        assert!(Anonymizer::is_token(&post.author), "author {}", post.author);
    }
    assert!(report.posts[0].content.contains("[REDACTED_EMAIL]"));
    assert!(!report.posts[0].content.contains("sarah@example.com"));
    assert!(report.posts[1].content.contains("[REDACTED_NAME]"));

    // Classification happened before export
    assert!(report.posts[0].is_question);
    assert!(report.posts[1].is_answer);
    assert_eq!(report.posts[0].replies_count, 4);
    assert_eq!(report.posts[0].views_count, 1200);
    assert!(report.posts[0].engagement_score > 0.0);

    assert_eq!(report.sections.len(), 1);
    let section = &report.sections[0];
    assert_eq!(section.outcome, TerminationReason::Exhausted);
    assert_eq!(section.pages_fetched, 3);
    assert_eq!(section.posts, 3);
    assert_eq!(section.duplicates, 1);

    let corpus = &report.summary.corpus;
    assert_eq!(corpus.posts, 3);
    assert_eq!(corpus.total_views, 3600);
    assert_eq!(corpus.posts_by_hour[14], 3);
    assert_eq!(report.summary.sections.len(), 1);

    // Insights are computed from the anonymized posts
    let service = &report.insights.categories[&OpportunityCategory::Service];
    assert!(service.posts >= 1);
    assert!(service.top_posts.iter().all(|p| !p.preview.contains("sarah@")));
    assert_eq!(report.insights.posts_by_month[0], 3);
}

#[tokio::test]
async fn test_robots_disallow_abandons_section_without_fetching() {
    let server = MockServer::start().await;
    mount_site(&server, "User-agent: *\nDisallow: /forum/").await;
    mount_login_success(&server, 1).await;

    Mock::given(method("GET"))
        .and(path("/forum/general"))
        .respond_with(html(forum_page(&[("1", "a", "b")])))
        .expect(0)
        .mount(&server)
        .await;

    let coordinator = Coordinator::new(create_test_config(&server.uri()));
    let report = coordinator
        .run(&credentials(), &["general".to_string()])
        .await
        .unwrap();

    assert!(!report.aborted);
    assert!(report.posts.is_empty());
    assert_eq!(report.sections[0].outcome, TerminationReason::PolicyViolation);
    assert_eq!(report.sections[0].pages_fetched, 0);
}

#[tokio::test]
async fn test_not_found_is_blocked_without_retry() {
    let server = MockServer::start().await;
    mount_site(&server, "User-agent: *\nAllow: /").await;
    mount_login_success(&server, 1).await;

    Mock::given(method("GET"))
        .and(path("/forum/general"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let coordinator = Coordinator::new(create_test_config(&server.uri()));
    let report = coordinator
        .run(&credentials(), &["general".to_string()])
        .await
        .unwrap();

    let section = &report.sections[0];
    assert_eq!(section.outcome, TerminationReason::Blocked);
    assert!(section.detail.as_deref().unwrap_or("").contains("404"));
}

#[tokio::test]
async fn test_transient_503_is_retried_transparently() {
    let server = MockServer::start().await;
    mount_site(&server, "User-agent: *\nAllow: /").await;
    mount_login_success(&server, 1).await;

    Mock::given(method("GET"))
        .and(path("/forum/general"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    mount_page(
        &server,
        "/forum/general",
        1,
        forum_page(&[("1", "dina", "hello"), ("2", "leah", "hi there")]),
    )
    .await;

    let mut config = create_test_config(&server.uri());
    config.crawler.max_pages = 1;

    let report = Coordinator::new(config)
        .run(&credentials(), &["general".to_string()])
        .await
        .unwrap();

    assert_eq!(report.posts.len(), 2);
    assert_eq!(report.sections[0].outcome, TerminationReason::MaxPages);
    assert_eq!(report.sections[0].pages_fetched, 1);
}

#[tokio::test]
async fn test_persistent_5xx_abandons_section_after_retries() {
    let server = MockServer::start().await;
    mount_site(&server, "User-agent: *\nAllow: /").await;
    mount_login_success(&server, 1).await;

    // max-retries = 3 attempts per fetch, page-retries = 0
    Mock::given(method("GET"))
        .and(path("/forum/general"))
        .respond_with(ResponseTemplate::new(502))
        .expect(3)
        .mount(&server)
        .await;

    let report = Coordinator::new(create_test_config(&server.uri()))
        .run(&credentials(), &["general".to_string()])
        .await
        .unwrap();

    let section = &report.sections[0];
    assert_eq!(section.outcome, TerminationReason::FetchFailed);
    assert!(section.detail.as_deref().unwrap_or("").contains("502"));
}

#[tokio::test]
async fn test_session_expiry_triggers_exactly_one_relogin() {
    let server = MockServer::start().await;
    mount_site(&server, "User-agent: *\nAllow: /").await;
    mount_login_success(&server, 2).await;

    // The first page request is answered with the login form
    Mock::given(method("GET"))
        .and(path("/forum/general"))
        .respond_with(html(LOGIN_PAGE))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    mount_page(
        &server,
        "/forum/general",
        1,
        forum_page(&[("1", "dina", "hello")]),
    )
    .await;

    let mut config = create_test_config(&server.uri());
    config.crawler.max_pages = 1;

    let report = Coordinator::new(config)
        .run(&credentials(), &["general".to_string()])
        .await
        .unwrap();

    assert!(!report.aborted);
    assert_eq!(report.posts.len(), 1);
    assert_eq!(report.sections[0].outcome, TerminationReason::MaxPages);
}

#[tokio::test]
async fn test_session_still_expired_after_relogin_is_blocked() {
    let server = MockServer::start().await;
    mount_site(&server, "User-agent: *\nAllow: /").await;
    mount_login_success(&server, 2).await;

    Mock::given(method("GET"))
        .and(path("/forum/general"))
        .respond_with(html("<html><body>Please log in to view this forum</body></html>"))
        .expect(2)
        .mount(&server)
        .await;

    let report = Coordinator::new(create_test_config(&server.uri()))
        .run(&credentials(), &["general".to_string()])
        .await
        .unwrap();

    assert_eq!(report.sections[0].outcome, TerminationReason::Blocked);
    assert!(report.posts.is_empty());
}

#[tokio::test]
async fn test_auth_failure_aborts_with_empty_summary() {
    let server = MockServer::start().await;
    mount_site(&server, "User-agent: *\nAllow: /").await;

    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(html(
            "<html><body>Your account has been locked after too many login attempts</body></html>",
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/forum/general"))
        .respond_with(html(forum_page(&[("1", "a", "b")])))
        .expect(0)
        .mount(&server)
        .await;

    let report = Coordinator::new(create_test_config(&server.uri()))
        .run(&credentials(), &[])
        .await
        .unwrap();

    assert!(report.aborted);
    assert!(report.abort_reason.unwrap().contains("locked"));
    assert!(report.posts.is_empty());
    assert!(report.sections.is_empty());
    assert_eq!(report.summary, Summary::empty(50.0));
}

#[tokio::test]
async fn test_max_pages_is_respected() {
    let server = MockServer::start().await;
    mount_site(&server, "User-agent: *\nAllow: /").await;
    mount_login_success(&server, 1).await;

    mount_page(&server, "/forum/general", 1, forum_page(&[("1", "a", "one")])).await;
    mount_page(&server, "/forum/general", 2, forum_page(&[("2", "b", "two")])).await;
    Mock::given(method("GET"))
        .and(path("/forum/general"))
        .and(query_param("page", "3"))
        .respond_with(html(forum_page(&[("3", "c", "three")])))
        .with_priority(1)
        .expect(0)
        .mount(&server)
        .await;

    let mut config = create_test_config(&server.uri());
    config.crawler.max_pages = 2;

    let report = Coordinator::new(config)
        .run(&credentials(), &["general".to_string()])
        .await
        .unwrap();

    assert_eq!(report.posts.len(), 2);
    assert_eq!(report.sections[0].outcome, TerminationReason::MaxPages);
    assert_eq!(report.sections[0].pages_fetched, 2);
}

#[tokio::test]
async fn test_empty_first_page_ends_section() {
    let server = MockServer::start().await;
    mount_site(&server, "User-agent: *\nAllow: /").await;
    mount_login_success(&server, 1).await;

    mount_page(&server, "/forum/general", 1, forum_page(&[])).await;
    Mock::given(method("GET"))
        .and(path("/forum/general"))
        .and(query_param("page", "2"))
        .respond_with(html(forum_page(&[("2", "b", "two")])))
        .with_priority(1)
        .expect(0)
        .mount(&server)
        .await;

    let report = Coordinator::new(create_test_config(&server.uri()))
        .run(&credentials(), &["general".to_string()])
        .await
        .unwrap();

    assert!(report.posts.is_empty());
    assert_eq!(report.sections[0].outcome, TerminationReason::Exhausted);
    assert_eq!(report.sections[0].pages_fetched, 1);
    assert_eq!(report.summary.sections.len(), 1);
}

#[tokio::test]
async fn test_unparseable_page_is_skipped() {
    let server = MockServer::start().await;
    mount_site(&server, "User-agent: *\nAllow: /").await;
    mount_login_success(&server, 1).await;

    mount_page(
        &server,
        "/forum/general",
        1,
        "<html><head><title>Database Error</title></head><body></body></html>".to_string(),
    )
    .await;
    mount_page(&server, "/forum/general", 2, forum_page(&[("2", "b", "two")])).await;
    mount_page(&server, "/forum/general", 3, forum_page(&[])).await;

    let report = Coordinator::new(create_test_config(&server.uri()))
        .run(&credentials(), &["general".to_string()])
        .await
        .unwrap();

    assert_eq!(report.posts.len(), 1);
    assert_eq!(report.sections[0].pages_fetched, 3);
    assert_eq!(report.sections[0].outcome, TerminationReason::Exhausted);
}

#[tokio::test]
async fn test_rate_limiter_spaces_requests() {
    let server = MockServer::start().await;
    mount_site(&server, "User-agent: *\nAllow: /").await;
    mount_login_success(&server, 1).await;
    mount_page(&server, "/forum/general", 1, forum_page(&[("1", "a", "one")])).await;

    let mut config = create_test_config(&server.uri());
    config.crawler.max_pages = 1;
    config.rate_limit.interval_ms = 100;

    let start = Instant::now();
    Coordinator::new(config)
        .run(&credentials(), &["general".to_string()])
        .await
        .unwrap();

    // login page, login POST, robots.txt, page 1, logout: four gaps
    assert!(start.elapsed() >= Duration::from_millis(400));
}

#[tokio::test]
async fn test_shared_limiter_spacing() {
    let limiter = std::sync::Arc::new(RateLimiter::new(Duration::from_millis(50), Duration::ZERO));
    let start = Instant::now();

    let mut handles = Vec::new();
    for _ in 0..4 {
        let limiter = limiter.clone();
        handles.push(tokio::spawn(async move { limiter.acquire().await }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert!(start.elapsed() >= Duration::from_millis(150));
}

#[tokio::test]
async fn test_cancelled_run_stops_before_first_page() {
    let server = MockServer::start().await;
    mount_site(&server, "User-agent: *\nAllow: /").await;
    mount_login_success(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/forum/general"))
        .respond_with(html(forum_page(&[("1", "a", "one")])))
        .expect(0)
        .mount(&server)
        .await;

    let token = CancellationToken::new();
    token.cancel();

    let report = Coordinator::new(create_test_config(&server.uri()))
        .with_cancellation(token)
        .run(&credentials(), &["general".to_string()])
        .await
        .unwrap();

    assert!(!report.aborted);
    assert_eq!(report.sections[0].outcome, TerminationReason::Cancelled);
    assert_eq!(report.sections[0].pages_fetched, 0);
}

#[tokio::test]
async fn test_parallel_sections_share_author_tokens() {
    let server = MockServer::start().await;
    mount_site(&server, "User-agent: *\nAllow: /").await;
    mount_login_success(&server, 2).await;

    mount_page(
        &server,
        "/forum/general",
        1,
        forum_page(&[("g1", "mommy_sarah", "Any tips for teething?")]),
    )
    .await;
    mount_page(
        &server,
        "/forum/parenting",
        1,
        forum_page(&[("p1", "mommy_sarah", "Sleep training worked for us")]),
    )
    .await;

    let mut config = create_test_config(&server.uri());
    config.crawler.max_pages = 1;
    config.crawler.parallel_sections = true;

    let report = Coordinator::new(config)
        .execute(&credentials(), &[])
        .await
        .unwrap();

    assert_eq!(report.posts.len(), 2);
    assert_eq!(report.sections.len(), 2);
    assert_eq!(report.sections[0].section.name(), "general");
    assert_eq!(report.sections[1].section.name(), "parenting");
    assert_eq!(report.posts[0].author, report.posts[1].author);
    assert_eq!(report.summary.corpus.posts, 2);
    assert_eq!(report.summary.sections.len(), 2);
}

const SESSION_LOGIN_PAGE: &str = r#"<html><head><title>Sign in</title></head><body>
    <form action="/session" method="post">
        <input type="hidden" name="authenticity_token" value="xyz">
        <input type="text" name="username">
        <input type="password" name="password">
    </form>
</body></html>"#;

#[tokio::test]
async fn test_rejected_password_on_separate_form_action_aborts() {
    let server = MockServer::start().await;
    mount_site(&server, "User-agent: *\nAllow: /").await;

    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(html(SESSION_LOGIN_PAGE))
        .with_priority(1)
        .mount(&server)
        .await;
    // A bad password re-renders the form at the action URL with a 200
    Mock::given(method("POST"))
        .and(path("/session"))
        .respond_with(html(format!(
            "<p class=\"flash\">Invalid username or password.</p>{}",
            SESSION_LOGIN_PAGE
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/forum/general"))
        .respond_with(html(forum_page(&[("1", "a", "b")])))
        .expect(0)
        .mount(&server)
        .await;

    let report = Coordinator::new(create_test_config(&server.uri()))
        .run(&Credentials::new("tester", "wrong"), &[])
        .await
        .unwrap();

    assert!(report.aborted);
    assert!(report.abort_reason.unwrap().contains("rejected"));
    assert!(report.posts.is_empty());
    assert!(report.sections.is_empty());
}

#[tokio::test]
async fn test_transient_login_failures_exhaust_attempts() {
    let server = MockServer::start().await;
    mount_site(&server, "User-agent: *\nAllow: /").await;

    // login-attempts = 2
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;

    let report = Coordinator::new(create_test_config(&server.uri()))
        .run(&credentials(), &["general".to_string()])
        .await
        .unwrap();

    assert!(report.aborted);
    let reason = report.abort_reason.unwrap();
    assert!(reason.contains("after 2 attempts"), "reason: {}", reason);
    assert!(reason.contains("503"));
    assert!(report.posts.is_empty());
}

#[tokio::test]
async fn test_failed_relogin_mid_run_keeps_collected_posts() {
    let server = MockServer::start().await;
    mount_site(&server, "User-agent: *\nAllow: /").await;

    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(html(LOGGED_IN_PAGE))
        .up_to_n_times(1)
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(html(
            "<html><body>Your account has been locked after too many login attempts</body></html>",
        ))
        .expect(1)
        .mount(&server)
        .await;

    mount_page(
        &server,
        "/forum/general",
        1,
        forum_page(&[("1", "dina", "hello"), ("2", "leah", "hi there")]),
    )
    .await;
    // The session is dropped server-side before page 2
    mount_page(&server, "/forum/general", 2, LOGIN_PAGE.to_string()).await;
    Mock::given(method("GET"))
        .and(path("/forum/parenting"))
        .respond_with(html(forum_page(&[("p1", "a", "b")])))
        .expect(0)
        .mount(&server)
        .await;

    let report = Coordinator::new(create_test_config(&server.uri()))
        .run(&credentials(), &[])
        .await
        .unwrap();

    assert!(report.aborted);
    assert!(report.abort_reason.unwrap().contains("locked"));
    assert_eq!(report.posts.len(), 2);
    assert_eq!(report.summary.corpus.posts, 2);
    assert_eq!(report.sections.len(), 1);
    assert_eq!(report.sections[0].outcome, TerminationReason::AuthFailure);
    assert_eq!(report.sections[0].posts, 2);
}
