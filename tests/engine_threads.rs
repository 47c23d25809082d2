//! Engines do all their work on the calling thread. Kept in its own test
//! binary so no other test's threads show up in the count.

#![cfg(target_os = "linux")]

use std::sync::Arc;
use std::time::{Duration, Instant};

use unified_search::cache::EmbeddingCache;
use unified_search::config::Config;
use unified_search::embedding::HashEmbedder;
use unified_search::registry::SearchRegistry;
use unified_search_core::adapter::InMemoryAdapter;
use unified_search_core::models::{Filter, SearchableDocument};

fn thread_count() -> usize {
    std::fs::read_dir("/proc/self/task").unwrap().count()
}

/// Pool threads exit asynchronously once told to stop; give them a moment.
fn settled_thread_count(target: usize) -> usize {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let count = thread_count();
        if count <= target || Instant::now() >= deadline {
            return count;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}

#[test]
fn test_keyword_engine_leaves_no_threads_behind() {
    let before = thread_count();

    let registry = SearchRegistry::new(
        Config::from_toml_str("[global]\ndefault_strategy_name = \"keyword\"\n").unwrap(),
        Arc::new(HashEmbedder::new(32)),
        Arc::new(EmbeddingCache::in_memory(10)),
    );
    let adapter = Arc::new(InMemoryAdapter::new(
        "notes",
        vec![SearchableDocument::new("Weekly sync notes")],
    ));
    registry.register_adapter("notes", adapter.clone());
    let engine = registry.manager("notes").unwrap().default_engine().unwrap();

    assert_eq!(engine.search("weekly", &Filter::new(), None).unwrap().len(), 1);
    adapter.push(SearchableDocument::new("weekly budget"));
    assert_eq!(engine.search("weekly", &Filter::new(), None).unwrap().len(), 2);

    let after = settled_thread_count(before);
    assert!(after <= before, "threads before: {}, after: {}", before, after);
}
