//! Concurrency tests for token consumption
//!
//! The realistic failure mode is two Helpers scanning codes for the
//! same job within milliseconds of each other. Exactly one may win.

use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;

use snapcrew::{
    generate_job_id, Job, JobStatus, JoinConfig, JoinManager, JoinStore, MemoryStore,
};

fn setup() -> (Arc<JoinManager>, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let config = JoinConfig {
        secret: "race-secret".to_string(),
        ..JoinConfig::default()
    };
    (
        Arc::new(JoinManager::new(store.clone(), config)),
        store,
    )
}

fn post_job(store: &MemoryStore) -> String {
    let job_id = generate_job_id();
    store
        .insert_job(Job::new(job_id.clone(), "requester-1".to_string()))
        .unwrap();
    job_id
}

#[test]
fn test_two_tokens_one_job_exactly_one_winner() {
    let (manager, store) = setup();
    let job_id = post_job(&store);

    let tokens = [
        manager.issue_token(&job_id).unwrap().token,
        manager.issue_token(&job_id).unwrap().token,
    ];

    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = tokens
        .into_iter()
        .enumerate()
        .map(|(i, token)| {
            let manager = manager.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                manager.consume_token(&token, &format!("helper-{i}")).unwrap()
            })
        })
        .collect();

    let results: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().expect("consumer thread panicked"))
        .collect();

    let winners = results.iter().filter(|r| r.is_some()).count();
    assert_eq!(winners, 1, "exactly one consume may succeed");

    let assignment = store.assignment_for_job(&job_id).unwrap().unwrap();
    let winning = results.into_iter().flatten().next().unwrap();
    assert_eq!(assignment.helper_id, winning.helper_id);

    let job = store.get_job(&job_id).unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Accepted);
}

#[test]
fn test_same_token_raced_by_many_helpers() {
    let (manager, store) = setup();
    let job_id = post_job(&store);
    let token = manager.issue_token(&job_id).unwrap().token;

    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|i| {
            let manager = manager.clone();
            let barrier = barrier.clone();
            let token = token.clone();
            thread::spawn(move || {
                barrier.wait();
                manager.consume_token(&token, &format!("helper-{i}")).unwrap()
            })
        })
        .collect();

    let winners = handles
        .into_iter()
        .map(|h| h.join().expect("consumer thread panicked"))
        .filter(|r| r.is_some())
        .count();

    assert_eq!(winners, 1);
    assert!(store.assignment_for_job(&job_id).unwrap().is_some());
}

#[test]
fn test_parallel_issuance_yields_distinct_tokens_and_codes() {
    let (manager, store) = setup();
    let job_id = post_job(&store);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let manager = manager.clone();
            let job_id = job_id.clone();
            thread::spawn(move || {
                (0..25)
                    .map(|_| manager.issue_token(&job_id).unwrap())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut tokens = HashSet::new();
    let mut codes = HashSet::new();
    for handle in handles {
        for issued in handle.join().expect("issuer thread panicked") {
            assert!(tokens.insert(issued.token.clone()), "duplicate token issued");
            assert!(
                codes.insert(issued.short_code.clone()),
                "duplicate short code issued"
            );
        }
    }
    assert_eq!(tokens.len(), 100);
    assert_eq!(codes.len(), 100);
}

#[test]
fn test_concurrent_checks_do_not_disturb_consumption() {
    let (manager, store) = setup();
    let job_id = post_job(&store);
    let issued = manager.issue_token(&job_id).unwrap();

    let checkers: Vec<_> = (0..4)
        .map(|_| {
            let manager = manager.clone();
            let token = issued.token.clone();
            thread::spawn(move || {
                for _ in 0..50 {
                    // Outcome varies with timing; the call must never fault.
                    manager.check_token(&token).unwrap();
                }
            })
        })
        .collect();

    let assignment = manager.consume_token(&issued.token, "helper-a").unwrap();
    assert!(assignment.is_some());

    for handle in checkers {
        handle.join().expect("checker thread panicked");
    }

    let assignment = store.assignment_for_job(&job_id).unwrap().unwrap();
    assert_eq!(assignment.helper_id, "helper-a");
}
