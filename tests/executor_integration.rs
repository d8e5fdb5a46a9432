//! Integration tests for the extraction executor: escalation, fallback,
//! failure caching and metrics through the public API.

use std::sync::Arc;
use std::time::Duration;

use digestor_core::{
    BatchRunner, EscalationLevel, ExtractContext, ExtractionOutcome, FailureReason, SiteOverride,
};
use tokio_util::sync::CancellationToken;

mod support;
use support::{ScriptedExtractor, catalog_of, defaults, executor_for, text_of};

const SLOW_URL: &str = "https://slow.example.com/story";

#[tokio::test(start_paused = true)]
async fn test_fallback_extractor_succeeds_after_primary_exhausts_levels() {
    let basic = Arc::new(ScriptedExtractor::always(text_of(40)).with_hooks());
    let enhanced = Arc::new(
        ScriptedExtractor::new()
            .with_hooks()
            .at(EscalationLevel::Scroll, text_of(500)),
    );
    let executor = executor_for(catalog_of(
        defaults("basic", &["enhanced"]),
        &[("basic", basic.clone()), ("enhanced", enhanced.clone())],
    ));

    let outcome = executor
        .extract(SLOW_URL, &ExtractContext::new())
        .await
        .unwrap();

    let ExtractionOutcome::Extracted(article) = outcome else {
        panic!("expected success, got {outcome:?}");
    };
    assert_eq!(article.extractor, "enhanced");
    assert_eq!(article.level, EscalationLevel::Scroll);
    assert_eq!(article.text.chars().count(), 500);
    assert_eq!(article.metadata.get("extraction_method").unwrap(), "enhanced");
    assert_eq!(article.metadata.get("strategy").unwrap(), "basic+scroll");

    // Primary climbed the whole ladder; the fallback restarted at basic.
    assert_eq!(basic.levels(), EscalationLevel::ALL.to_vec());
    assert_eq!(
        enhanced.levels(),
        vec![
            EscalationLevel::Basic,
            EscalationLevel::Consent,
            EscalationLevel::Scroll
        ]
    );
    assert_eq!(article.attempts.len(), 2);
    assert!(!article.attempts[0].success);
    assert_eq!(article.attempts[0].escalation_level_reached, EscalationLevel::Full);
    assert!(article.attempts[1].success);

    let report = executor.metrics_report();
    assert_eq!(report.extractors["basic"].failures, 1);
    assert_eq!(report.extractors["enhanced"].successes, 1);
    assert_eq!(report.total_attempts, 2);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_url_is_cached_and_short_circuits() {
    let basic = Arc::new(ScriptedExtractor::always(text_of(10)));
    let mobile = Arc::new(ScriptedExtractor::always(text_of(10)));
    let executor = executor_for(catalog_of(
        defaults("basic", &["mobile"]),
        &[("basic", basic.clone()), ("mobile", mobile.clone())],
    ));
    let url = "https://walled.example.com/a";

    let first = executor.extract(url, &ExtractContext::new()).await.unwrap();
    let ExtractionOutcome::Failed(failure) = &first else {
        panic!("expected failure");
    };
    assert_eq!(failure.reason, FailureReason::AllStrategiesExhausted);
    assert_eq!(failure.attempted_extractors(), vec!["basic", "mobile"]);
    let before = executor.metrics_report();
    assert_eq!(before.total_attempts, 2);
    assert_eq!(before.cached_failures, 0);

    let second = executor.extract(url, &ExtractContext::new()).await.unwrap();
    assert!(second.is_cache_hit());
    assert!(second.attempts().is_empty());

    let after = executor.metrics_report();
    assert_eq!(after.cached_failures, 1);
    assert_eq!(after.total_attempts, 2);
    assert_eq!(basic.calls(), 1);
    assert_eq!(mobile.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_reset_failure_cache_allows_retry() {
    let basic = Arc::new(ScriptedExtractor::new());
    let executor = executor_for(catalog_of(defaults("basic", &[]), &[("basic", basic.clone())]));
    let url = "https://flaky.example.com/a";

    executor.extract(url, &ExtractContext::new()).await.unwrap();
    assert!(executor.extract(url, &ExtractContext::new()).await.unwrap().is_cache_hit());

    assert_eq!(executor.reset_failure_cache(), 1);
    let outcome = executor.extract(url, &ExtractContext::new()).await.unwrap();
    assert!(!outcome.is_cache_hit());
    assert_eq!(basic.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_counts_as_level_failure_and_falls_back() {
    let slow = Arc::new(
        ScriptedExtractor::always(text_of(200)).with_delay(Duration::from_secs(60)),
    );
    let fast = Arc::new(ScriptedExtractor::always(text_of(200)));
    let mut catalog = catalog_of(
        defaults("slow", &["fast"]),
        &[("slow", slow.clone()), ("fast", fast.clone())],
    );
    catalog.add_override(
        SiteOverride::new("slow.example.com", "slow")
            .unwrap()
            .with_timeout(Duration::from_secs(1)),
    );
    let executor = executor_for(catalog);

    let outcome = executor
        .extract(SLOW_URL, &ExtractContext::new())
        .await
        .unwrap();
    let ExtractionOutcome::Extracted(article) = outcome else {
        panic!("expected fallback success");
    };
    assert_eq!(article.extractor, "fast");
    let detail = article.attempts[0].error_detail.as_deref().unwrap();
    assert!(detail.contains("timed out"), "unexpected detail: {detail}");
}

#[tokio::test(start_paused = true)]
async fn test_title_from_context_survives_into_metadata() {
    let basic = Arc::new(ScriptedExtractor::always(text_of(150)));
    let executor = executor_for(catalog_of(defaults("basic", &[]), &[("basic", basic)]));

    let outcome = executor
        .extract(
            "https://example.com/post",
            &ExtractContext::with_title("Feed Title"),
        )
        .await
        .unwrap();
    let ExtractionOutcome::Extracted(article) = outcome else {
        panic!("expected success");
    };
    assert_eq!(article.title(), Some("Feed Title"));
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_extraction_is_not_cached() {
    let slow =
        Arc::new(ScriptedExtractor::always(text_of(200)).with_delay(Duration::from_secs(5)));
    let executor = executor_for(catalog_of(defaults("slow", &[]), &[("slow", slow)]));
    let cancel = CancellationToken::new();

    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        canceller.cancel();
    });

    let outcome = executor
        .extract_with_cancellation(SLOW_URL, &ExtractContext::new(), &cancel)
        .await
        .unwrap();
    let ExtractionOutcome::Failed(failure) = outcome else {
        panic!("expected cancellation");
    };
    assert_eq!(failure.reason, FailureReason::Cancelled);
    assert!(executor.failure_cache().is_empty());
    assert_eq!(executor.metrics_report().total_attempts, 0);
}

#[tokio::test(start_paused = true)]
async fn test_test_extraction_leaves_cache_and_metrics_alone() {
    let basic = Arc::new(ScriptedExtractor::new());
    let executor = executor_for(catalog_of(defaults("basic", &[]), &[("basic", basic.clone())]));
    let url = "https://example.com/broken";

    let report = executor
        .test_extraction(url, &ExtractContext::new())
        .await
        .unwrap();
    assert!(!report.in_failure_cache);
    assert!(!report.outcome.is_success());
    assert!(executor.failure_cache().is_empty());
    assert_eq!(executor.metrics_report().total_attempts, 0);
    assert_eq!(basic.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_batch_returns_outcomes_in_input_order() {
    let basic = Arc::new(ScriptedExtractor::always(text_of(150)));
    let executor = Arc::new(executor_for(catalog_of(
        defaults("basic", &[]),
        &[("basic", basic.clone())],
    )));
    let runner = BatchRunner::new(executor, 3).unwrap();
    let urls: Vec<String> = (0..8)
        .map(|i| format!("https://example.com/{i}"))
        .collect();

    let mut completed = 0;
    let report = runner
        .run(
            urls.clone(),
            &ExtractContext::new(),
            &CancellationToken::new(),
            |_| completed += 1,
        )
        .await
        .unwrap();

    assert_eq!(completed, 8);
    let returned: Vec<&str> = report.outcomes.iter().map(ExtractionOutcome::url).collect();
    assert_eq!(returned, urls.iter().map(String::as_str).collect::<Vec<_>>());
    assert_eq!(report.summary.extracted, 8);
    assert_eq!(basic.calls(), 8);
}
