use chrono::{TimeZone, Utc};

use chatbuff::history::{estimate_tokens, EntryKind, HistoryLog, NewEntry, SESSION_CLEARED, SESSION_STARTED};

#[test]
fn fresh_log_opens_with_one_system_entry() {
    let log = HistoryLog::new();
    assert_eq!(log.len(), 1);
    assert_eq!(log.entries()[0].kind, EntryKind::System);
    assert_eq!(log.entries()[0].message, SESSION_STARTED);
}

#[test]
fn append_assigns_distinct_ids_and_timestamps() {
    let mut log = HistoryLog::new();
    let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();

    let a = log.append(NewEntry::new(EntryKind::User, "hello")).id;
    let b = log.append(NewEntry::new(EntryKind::Other, "hi").at(at)).clone();

    assert_ne!(a, b.id);
    assert_eq!(b.timestamp, at);
    assert_eq!(log.last().map(|e| e.message.as_str()), Some("hi"));
    assert_eq!(log.of_kind(EntryKind::User).count(), 1);
}

#[test]
fn clear_leaves_exactly_one_fresh_system_entry() {
    let mut log = HistoryLog::new();
    let started_id = log.entries()[0].id;
    for i in 0..5 {
        log.append(NewEntry::new(EntryKind::Generate, format!("g{}", i)).with_tokens(3));
    }

    log.clear();

    assert_eq!(log.len(), 1);
    let only = &log.entries()[0];
    assert_eq!(only.kind, EntryKind::System);
    assert_eq!(only.message, SESSION_CLEARED);
    assert_ne!(only.id, started_id, "ids are not reused after a clear");
    assert_eq!(log.stats().total_tokens, 0);
}

#[test]
fn token_total_sums_only_entries_with_tokens() {
    let mut log = HistoryLog::new();
    log.append(NewEntry::new(EntryKind::Generate, "first").with_tokens(10));
    log.append(NewEntry::new(EntryKind::User, "no tokens here"));
    log.append(NewEntry::new(EntryKind::Generate, "second").with_tokens(5));
    log.append(NewEntry::error("backend down"));

    let stats = log.stats();
    assert_eq!(stats.total_tokens, 15);
    assert_eq!(stats.entries, 5);
    assert_eq!(stats.count(EntryKind::Generate), 2);
    assert_eq!(stats.count(EntryKind::Error), 1);
    assert_eq!(stats.count(EntryKind::Commit), 0);
}

#[test]
fn stats_follow_the_log_without_caching() {
    let mut log = HistoryLog::new();
    log.append(NewEntry::new(EntryKind::Generate, "x").with_tokens(4));
    assert_eq!(log.stats().total_tokens, 4);

    log.append(NewEntry::new(EntryKind::Generate, "y").with_tokens(6));
    assert_eq!(log.stats().total_tokens, 10);
}

#[test]
fn token_estimate_rounds_up_per_four_chars() {
    assert_eq!(estimate_tokens(Vec::<&str>::new()), 0);
    assert_eq!(estimate_tokens(["abcd"]), 1);
    assert_eq!(estimate_tokens(["abcde"]), 2);
    assert_eq!(estimate_tokens(["ab", "cd", "e"]), 2);
}
