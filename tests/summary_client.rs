use mockito::{Matcher, Server};
use orthopub::article::{ArticleRecord, NO_ABSTRACT};
use orthopub::summary::{SummaryClient, SummaryConfig, SummaryStatus, NOTHING_TO_SUMMARIZE};
use orthopub::OrthoError;
use serde_json::json;
use std::time::{Duration, Instant};

const KEY: &str = "sk-test-key";

fn client(base_url: String) -> SummaryClient {
    SummaryClient::new(SummaryConfig {
        base_url,
        batch_delay: Duration::ZERO,
        ..Default::default()
    })
    .unwrap()
}

fn completion(content: &str) -> String {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 120, "completion_tokens": 80, "total_tokens": 200}
    })
    .to_string()
}

fn article(pmid: &str, abstract_text: &str) -> ArticleRecord {
    ArticleRecord {
        pmid: pmid.to_string(),
        title: format!("Title {}", pmid),
        authors: vec![],
        journal: "Injury".into(),
        abstract_text: abstract_text.to_string(),
        publication_date: "2024".into(),
    }
}

#[tokio::test]
async fn test_summarize_success() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer sk-test-key")
        .match_body(Matcher::PartialJson(json!({
            "model": "gpt-4o",
            "max_tokens": 300
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(completion("  고관절 골절 환자의 수술 결과를 분석한 연구입니다.  "))
        .expect(1)
        .create_async()
        .await;

    let summary = client(server.url())
        .summarize("Hip fracture outcomes were analysed.", KEY)
        .await
        .unwrap();
    assert_eq!(summary, "고관절 골절 환자의 수술 결과를 분석한 연구입니다.");

    mock.assert_async().await;
}

#[tokio::test]
async fn test_status_codes_map_to_error_kinds() {
    let cases = [
        (401, r#"{"error":{"message":"Incorrect API key provided"}}"#),
        (403, r#"{"error":{"message":"Not allowed"}}"#),
        (429, r#"{"error":{"message":"Rate limit reached"}}"#),
        (400, r#"{"error":{"message":"Bad input"}}"#),
        (500, "Internal Server Error"),
    ];

    for (status, body) in cases {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(status)
            .with_body(body)
            .create_async()
            .await;

        let err = client(server.url()).summarize("Some abstract.", KEY).await.unwrap_err();
        match status {
            401 => assert!(matches!(&err, OrthoError::Unauthorized(m) if m == "Incorrect API key provided")),
            403 => assert!(matches!(err, OrthoError::Forbidden(_))),
            429 => assert!(matches!(err, OrthoError::RateLimited(_))),
            400 => assert!(matches!(err, OrthoError::BadRequest(_))),
            _ => assert!(matches!(err, OrthoError::RemoteRejected { status: 500, .. })),
        }
    }
}

#[tokio::test]
async fn test_missing_choices_is_malformed() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_body(r#"{"choices":[]}"#)
        .create_async()
        .await;

    let err = client(server.url()).summarize("Some abstract.", KEY).await.unwrap_err();
    assert!(matches!(err, OrthoError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_no_request_for_bad_key_or_missing_abstract() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .expect(0)
        .create_async()
        .await;
    let client = client(server.url());

    assert!(matches!(
        client.summarize("Some abstract.", "not-a-key").await,
        Err(OrthoError::InvalidCredential(_))
    ));
    assert_eq!(client.summarize(NO_ABSTRACT, KEY).await.unwrap(), NOTHING_TO_SUMMARIZE);

    mock.assert_async().await;
}

#[tokio::test]
async fn test_long_abstract_is_truncated_before_sending() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .match_body(Matcher::Regex("내용이 길어 일부만 요약".into()))
        .with_status(200)
        .with_body(completion("요약"))
        .expect(1)
        .create_async()
        .await;

    let long = "word ".repeat(2000);
    client(server.url()).summarize(&long, KEY).await.unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn test_batch_keeps_order_and_isolates_failures() {
    let mut server = Server::new_async().await;

    server
        .mock("POST", "/chat/completions")
        .match_body(Matcher::Regex("FIRST-ABSTRACT".into()))
        .with_status(200)
        .with_body(completion("첫 번째 요약"))
        .create_async()
        .await;
    server
        .mock("POST", "/chat/completions")
        .match_body(Matcher::Regex("SECOND-ABSTRACT".into()))
        .with_status(429)
        .with_body(r#"{"error":{"message":"Rate limit reached"}}"#)
        .create_async()
        .await;
    server
        .mock("POST", "/chat/completions")
        .match_body(Matcher::Regex("THIRD-ABSTRACT".into()))
        .with_status(200)
        .with_body(completion("세 번째 요약"))
        .create_async()
        .await;

    let articles = [
        article("1", "FIRST-ABSTRACT text"),
        article("2", "SECOND-ABSTRACT text"),
        article("3", "THIRD-ABSTRACT text"),
    ];
    let outcomes = client(server.url()).summarize_batch(&articles, KEY).await;

    assert_eq!(outcomes.len(), 3);
    let pmids: Vec<&str> = outcomes.iter().map(|o| o.pmid.as_str()).collect();
    assert_eq!(pmids, vec!["1", "2", "3"]);

    assert_eq!(outcomes[0].status, SummaryStatus::Succeeded);
    assert_eq!(outcomes[0].text, "첫 번째 요약");
    assert_eq!(outcomes[1].status, SummaryStatus::Failed);
    assert!(outcomes[1].text.starts_with("요약 생성 실패: "));
    assert_eq!(outcomes[2].status, SummaryStatus::Succeeded);
    assert_eq!(outcomes[2].text, "세 번째 요약");
}

#[tokio::test]
async fn test_batch_with_bad_key_fails_each_record_without_requests() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .expect(0)
        .create_async()
        .await;

    let articles = [article("1", "abc"), article("2", "def")];
    let outcomes = client(server.url()).summarize_batch(&articles, "").await;

    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|o| o.status == SummaryStatus::Failed));

    mock.assert_async().await;
}

#[tokio::test]
async fn test_batch_pauses_between_requests() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_body(completion("요약"))
        .expect(3)
        .create_async()
        .await;

    let delay = Duration::from_millis(50);
    let client = SummaryClient::new(SummaryConfig {
        base_url: server.url(),
        batch_delay: delay,
        ..Default::default()
    })
    .unwrap();

    let articles = [article("1", "one"), article("2", "two"), article("3", "three")];
    let started = Instant::now();
    let outcomes = client.summarize_batch(&articles, KEY).await;

    assert!(started.elapsed() >= delay * 2);
    assert!(outcomes.iter().all(|o| o.is_success()));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_batch_skips_pause_without_requests() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .expect(0)
        .create_async()
        .await;

    let client = SummaryClient::new(SummaryConfig {
        base_url: server.url(),
        batch_delay: Duration::from_secs(5),
        ..Default::default()
    })
    .unwrap();

    let articles = [article("1", "one"), article("2", NO_ABSTRACT), article("3", "")];
    let started = Instant::now();

    let failed = client.summarize_batch(&articles, "bad-key").await;
    assert!(failed.iter().all(|o| o.status == SummaryStatus::Failed));

    let placeholders = client.summarize_batch(&articles[1..], KEY).await;
    assert!(placeholders.iter().all(|o| o.text == NOTHING_TO_SUMMARIZE));

    assert!(started.elapsed() < Duration::from_secs(5));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_unreachable_host_is_connectivity() {
    // Nothing listens on the discard port
    let err = client("http://127.0.0.1:9".into())
        .summarize("Some abstract.", KEY)
        .await
        .unwrap_err();
    assert!(err.is_connectivity());
    assert!(!err.is_remote());
}
