//! Tests for batched candidate fetching against an in-memory mailbox

mod common;

use common::{
    newsletter, plain_message, raw_message, InMemoryMailbox, RecordingReporter,
};
use inbox_unsubscribe::exclusions::SenderExclusions;
use inbox_unsubscribe::links::{is_http, RegexLinkExtractor};
use inbox_unsubscribe::models::ClassifiedMessage;
use inbox_unsubscribe::scanner::BatchFetcher;
use inbox_unsubscribe::state::{MemoryState, PersistentState};

const OPERATOR: &str = "me@gmail.com";

async fn collect(
    mailbox: &mut InMemoryMailbox,
    exclusions: &SenderExclusions,
    reporter: &RecordingReporter,
    target: usize,
) -> Vec<ClassifiedMessage> {
    let extractor = RegexLinkExtractor::new();
    BatchFetcher::new(mailbox, &extractor, exclusions, reporter)
        .collect(target)
        .await
        .unwrap()
}

fn numbered_newsletters(count: usize) -> Vec<Vec<u8>> {
    (1..=count)
        .map(|i| {
            newsletter(
                &format!("Sender {} <news{}@shop{}.com>", i, i, i),
                &format!("Issue {}", i),
                &format!("https://shop{}.com/unsubscribe", i),
            )
        })
        .collect()
}

// ============================================================================
// Deduplication and exclusions
// ============================================================================

#[tokio::test]
async fn test_duplicate_subject_accepted_once() {
    let mut mailbox = InMemoryMailbox::new(vec![
        newsletter("a@one.com", "Hello", "https://one.com/u"),
        newsletter("b@two.com", "Weekly deals", "https://two.com/u"),
        newsletter("c@three.com", "News", "https://three.com/u"),
        newsletter("d@four.com", "Weekly deals", "https://four.com/u"),
        newsletter("e@five.com", "Update", "https://five.com/u"),
    ]);
    let reporter = RecordingReporter::default();

    let results = collect(&mut mailbox, &SenderExclusions::default(), &reporter, 5).await;

    assert_eq!(results.len(), 4);
    let deals: Vec<&ClassifiedMessage> = results
        .iter()
        .filter(|m| m.subject == "Weekly deals")
        .collect();
    assert_eq!(deals.len(), 1);
    // Newest first: message 4 is seen before message 2
    assert_eq!(deals[0].sender_email, "d@four.com");
}

#[tokio::test]
async fn test_skip_listed_sender_excluded() {
    let state = MemoryState::with_skipped(["spam@foo.com"]);
    let exclusions = state.exclusions_for(OPERATOR).unwrap();
    let mut mailbox = InMemoryMailbox::new(vec![
        newsletter("ok@one.com", "First", "https://one.com/u"),
        newsletter("spam@foo.com", "Second", "https://foo.com/u"),
        newsletter("ok@two.com", "Third", "https://two.com/u"),
    ]);
    let reporter = RecordingReporter::default();

    let results = collect(&mut mailbox, &exclusions, &reporter, 3).await;

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|m| m.sender_email != "spam@foo.com"));
}

#[tokio::test]
async fn test_resolved_sender_excluded_for_operator_only() {
    let state = MemoryState::new();
    state.add_history(OPERATOR, "done@bar.com").unwrap();
    state.add_history("other@yahoo.com", "news@shop.com").unwrap();
    let exclusions = state.exclusions_for(OPERATOR).unwrap();

    let mut mailbox = InMemoryMailbox::new(vec![
        newsletter("done@bar.com", "Old", "https://bar.com/u"),
        newsletter("news@shop.com", "Sale", "https://shop.com/u"),
    ]);
    let reporter = RecordingReporter::default();

    let results = collect(&mut mailbox, &exclusions, &reporter, 5).await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].sender_email, "news@shop.com");
}

#[tokio::test]
async fn test_same_sender_same_links_accepted_once() {
    let mut mailbox = InMemoryMailbox::new(vec![
        newsletter("Shop <news@shop.com>", "Monday", "https://shop.com/u"),
        newsletter("Shop <news@shop.com>", "Tuesday", "https://shop.com/u"),
        newsletter("Shop <news@shop.com>", "Wednesday", "https://shop.com/other"),
    ]);
    let reporter = RecordingReporter::default();

    let results = collect(&mut mailbox, &SenderExclusions::default(), &reporter, 3).await;

    assert_eq!(results.len(), 2);
    let subjects: Vec<&str> = results.iter().map(|m| m.subject.as_str()).collect();
    assert!(subjects.contains(&"Wednesday"));
    assert!(subjects.contains(&"Tuesday"));
}

// ============================================================================
// Batching and termination
// ============================================================================

#[tokio::test]
async fn test_target_caps_results_and_fetches_newest_first() {
    let mut mailbox = InMemoryMailbox::new(numbered_newsletters(10));
    let reporter = RecordingReporter::default();

    let results = collect(&mut mailbox, &SenderExclusions::default(), &reporter, 3).await;

    assert_eq!(results.len(), 3);
    assert_eq!(mailbox.fetched, vec!["10", "9", "8"]);
    assert_eq!(reporter.batches(), vec![3]);
}

#[tokio::test]
async fn test_rejections_trigger_smaller_follow_up_batch() {
    let mut mailbox = InMemoryMailbox::new(vec![
        newsletter("a@one.com", "One", "https://one.com/u"),
        newsletter("b@two.com", "Two", "https://two.com/u"),
        newsletter("c@three.com", "Three", "https://three.com/u"),
        newsletter("d@four.com", "Same", "https://four.com/u"),
        newsletter("e@five.com", "Same", "https://five.com/u"),
    ]);
    let reporter = RecordingReporter::default();

    let results = collect(&mut mailbox, &SenderExclusions::default(), &reporter, 3).await;

    assert_eq!(results.len(), 3);
    assert_eq!(mailbox.fetched, vec!["5", "4", "3", "2"]);
    assert_eq!(reporter.batches(), vec![3, 1]);
}

#[tokio::test]
async fn test_exhausted_pool_returns_fewer() {
    let mut mailbox = InMemoryMailbox::new(numbered_newsletters(3));
    let reporter = RecordingReporter::default();

    let results = collect(&mut mailbox, &SenderExclusions::default(), &reporter, 10).await;

    assert_eq!(results.len(), 3);
    assert_eq!(mailbox.fetched.len(), 3);
    assert_eq!(*reporter.finished.lock().unwrap(), Some(3));
}

#[tokio::test]
async fn test_empty_mailbox() {
    let mut mailbox = InMemoryMailbox::new(Vec::new());
    let reporter = RecordingReporter::default();

    let results = collect(&mut mailbox, &SenderExclusions::default(), &reporter, 5).await;

    assert!(results.is_empty());
    assert!(mailbox.fetched.is_empty());
    assert!(reporter.batches().is_empty());
}

#[tokio::test]
async fn test_search_criteria_forwarded() {
    let mut mailbox = InMemoryMailbox::new(numbered_newsletters(2));
    let reporter = RecordingReporter::default();
    let extractor = RegexLinkExtractor::new();
    let exclusions = SenderExclusions::default();

    BatchFetcher::new(&mut mailbox, &extractor, &exclusions, &reporter)
        .with_criteria("UNSEEN")
        .collect(1)
        .await
        .unwrap();

    assert_eq!(mailbox.searches, vec!["UNSEEN"]);
}

#[tokio::test]
async fn test_results_sorted_by_sender_name() {
    let mut mailbox = InMemoryMailbox::new(vec![
        newsletter("Zed <z@x.com>", "One", "https://x.com/z"),
        newsletter("Amy <a@y.com>", "Two", "https://y.com/a"),
        newsletter("Mo <m@z.com>", "Three", "https://z.com/m"),
    ]);
    let reporter = RecordingReporter::default();

    let results = collect(&mut mailbox, &SenderExclusions::default(), &reporter, 3).await;

    let names: Vec<&str> = results.iter().map(|m| m.sender_name.as_str()).collect();
    assert_eq!(names, vec!["Amy", "Mo", "Zed"]);
}

// ============================================================================
// Per-message failures
// ============================================================================

#[tokio::test]
async fn test_fetch_failure_skips_message_and_continues() {
    let mut mailbox = InMemoryMailbox::new(numbered_newsletters(5)).failing("5");
    let reporter = RecordingReporter::default();

    let results = collect(&mut mailbox, &SenderExclusions::default(), &reporter, 3).await;

    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|m| m.id != "5"));
    assert_eq!(mailbox.fetched, vec!["5", "4", "3", "2"]);

    let warnings = reporter.warnings();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("5"));
}

#[tokio::test]
async fn test_timed_out_message_skipped_and_fetch_continues() {
    let mut mailbox = InMemoryMailbox::new(numbered_newsletters(5)).timing_out("4");
    let reporter = RecordingReporter::default();

    let results = collect(&mut mailbox, &SenderExclusions::default(), &reporter, 3).await;

    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|m| m.id != "4"));
    assert_eq!(mailbox.fetched, vec!["5", "4", "3", "2"]);

    let warnings = reporter.warnings();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("timed out"));
}

#[tokio::test]
async fn test_lost_connection_keeps_candidates_found_so_far() {
    let mut mailbox = InMemoryMailbox::new(numbered_newsletters(6)).disconnecting_at("4");
    let reporter = RecordingReporter::default();

    let results = collect(&mut mailbox, &SenderExclusions::default(), &reporter, 4).await;

    // 6 and 5 were accepted before the connection dropped; nothing after 4 is tried
    let ids: Vec<&str> = results.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["5", "6"]);
    assert_eq!(mailbox.fetched, vec!["6", "5", "4"]);

    let warnings = reporter.warnings();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("keeping the 2 candidates"));
    assert_eq!(*reporter.finished.lock().unwrap(), Some(2));
}

#[tokio::test]
async fn test_message_without_sender_skipped() {
    let no_from = b"Subject: Orphan\r\nContent-Type: text/plain\r\n\r\nhi\r\n".to_vec();
    let mut mailbox = InMemoryMailbox::new(vec![
        newsletter("a@one.com", "One", "https://one.com/u"),
        no_from,
    ]);
    let reporter = RecordingReporter::default();

    let results = collect(&mut mailbox, &SenderExclusions::default(), &reporter, 2).await;

    assert_eq!(results.len(), 1);
    assert_eq!(reporter.warnings().len(), 1);
}

// ============================================================================
// Link content
// ============================================================================

#[tokio::test]
async fn test_link_less_message_still_listed() {
    let mut mailbox = InMemoryMailbox::new(vec![plain_message("Friend <pal@home.net>", "Hi")]);
    let reporter = RecordingReporter::default();

    let results = collect(&mut mailbox, &SenderExclusions::default(), &reporter, 1).await;

    assert_eq!(results.len(), 1);
    assert!(!results[0].has_links());
    assert!(!results[0].raw.is_empty());
}

#[tokio::test]
async fn test_header_and_body_links_merged_without_mailto() {
    let raw = raw_message(
        "Shop <news@shop.com>",
        "Deals",
        Some("<mailto:leave@shop.com>, <https://shop.com/u?a=1&b=2>"),
        Some(concat!(
            "<p>Bye?</p>",
            "<a href=\"https://shop.com/u?a=1&amp;b=2\">Unsubscribe</a>",
            "<a href=\"mailto:leave@shop.com\">Unsubscribe by mail</a>",
            "<a href='https://shop.com/prefs'>Click here</a> to manage"
        )),
    );
    let mut mailbox = InMemoryMailbox::new(vec![raw]);
    let reporter = RecordingReporter::default();

    let results = collect(&mut mailbox, &SenderExclusions::default(), &reporter, 1).await;

    let links: Vec<&str> = results[0].links.iter().map(|l| l.as_str()).collect();
    assert_eq!(links, vec!["https://shop.com/prefs", "https://shop.com/u?a=1&b=2"]);
    assert!(results[0].links.iter().all(|l| is_http(l)));
}
