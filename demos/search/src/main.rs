//! # Debounced Search Demo
//!
//! A search box over an in-memory catalog. Keystrokes are debounced, the
//! "network" call is a tokio sleep, and results open as tabs.
//!
//! Run with `RUST_LOG=debug` to see the store's action and state-diff logs.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tiller_core::{
    DebugOptions, Effect, Identifiable, OpenArray, OpenCollection, Specifier, Store,
    TokioScheduler,
};
use tracing_subscriber::EnvFilter;

// ============================================================================
// State
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
struct Crate {
    name: &'static str,
    summary: &'static str,
}

impl Identifiable for Crate {
    type Id = &'static str;

    fn id(&self) -> &'static str {
        self.name
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
struct SearchState {
    query: String,
    results: Vec<Crate>,
    searching: bool,
    tabs: OpenArray<Crate>,
}

// ============================================================================
// Actions
// ============================================================================

#[derive(Debug, Clone)]
enum SearchAction {
    /// The user typed into the search box
    QueryChanged(String),

    /// The catalog answered
    ResultsLoaded(Vec<Crate>),

    /// The user opened a result as a tab
    Open(&'static str),

    /// The user closed the current tab
    CloseTab,
}

/// Debounce key for in-flight catalog requests.
#[derive(Debug, Hash, PartialEq, Eq)]
struct SearchRequest;

// ============================================================================
// Environment
// ============================================================================

struct Env {
    catalog: Arc<Vec<Crate>>,
    scheduler: TokioScheduler,
    latency: Duration,
}

impl Env {
    fn search(&self, query: String) -> impl std::future::Future<Output = Vec<Crate>> {
        let catalog = self.catalog.clone();
        let latency = self.latency;
        async move {
            tokio::time::sleep(latency).await;
            catalog
                .iter()
                .filter(|c| c.name.contains(&query) || c.summary.contains(&query))
                .cloned()
                .collect()
        }
    }
}

// ============================================================================
// Reducer
// ============================================================================

fn reducer(state: &mut SearchState, action: SearchAction, env: &Env) -> Effect<SearchAction> {
    match action {
        SearchAction::QueryChanged(query) => {
            state.query = query.clone();
            if query.is_empty() {
                state.results.clear();
                state.searching = false;
                return Effect::cancel(SearchRequest);
            }
            state.searching = true;
            Effect::future(env.search(query))
                .map(SearchAction::ResultsLoaded)
                .debounce(SearchRequest, Duration::from_millis(300), &env.scheduler)
        }
        SearchAction::ResultsLoaded(results) => {
            state.results = results;
            state.searching = false;
            Effect::none()
        }
        SearchAction::Open(name) => {
            if let Some(found) = state.results.iter().find(|c| c.name == name) {
                let found = found.clone();
                if state.tabs.index_of(&Specifier::Id(name)).is_some() {
                    state.tabs.open_by_id(Some(name));
                } else {
                    state.tabs.insert_at_cursor(found);
                }
            }
            Effect::none()
        }
        SearchAction::CloseTab => {
            state.tabs.close(&Specifier::Current);
            Effect::none()
        }
    }
}

fn catalog() -> Vec<Crate> {
    vec![
        Crate { name: "tokio", summary: "async runtime" },
        Crate { name: "tracing", summary: "structured diagnostics" },
        Crate { name: "serde", summary: "serialization framework" },
        Crate { name: "thiserror", summary: "derive for error types" },
        Crate { name: "futures", summary: "async streams and combinators" },
        Crate { name: "parking_lot", summary: "compact synchronization primitives" },
    ]
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let scheduler = TokioScheduler::current()?;
    let env = Env {
        catalog: Arc::new(catalog()),
        scheduler: scheduler.clone(),
        latency: Duration::from_millis(120),
    };

    let store = Store::builder(SearchState::default(), reducer, env)
        .with_scheduler(scheduler)
        .with_label("search")
        .build();
    store.debug(DebugOptions::actions_and_state_changes(
        tracing::Level::DEBUG,
        tracing::Level::TRACE,
    ));

    // A read-only view of just the result names
    let names = store.derive_state(|s: &SearchState| {
        s.results.iter().map(|c| c.name).collect::<Vec<_>>()
    });
    let _results = names.observe(
        |names| names.clone(),
        |names| println!("results: {names:?}"),
    );
    let _status = store.observe(
        |s| s.searching,
        |searching| {
            if *searching {
                println!("searching...");
            }
        },
    );

    // Type "as", "asy", "async" quickly; only the last query hits the catalog
    for query in ["as", "asy", "async"] {
        println!("typed: {query}");
        store.send(SearchAction::QueryChanged(query.to_string()));
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    tokio::time::sleep(Duration::from_millis(600)).await;

    for name in names.state() {
        store.send(SearchAction::Open(name));
    }
    store.with_state(|s| {
        println!(
            "open tabs: {:?}, current: {:?}",
            s.tabs.iter().map(|c| c.name).collect::<Vec<_>>(),
            s.tabs.current().map(|c| c.name)
        );
    });

    store.send(SearchAction::CloseTab);
    println!("after close: {:?}", store.state().tabs.current().map(|c| c.name));

    // Clearing the box cancels anything still debouncing
    store.send(SearchAction::QueryChanged("ser".into()));
    store.send(SearchAction::QueryChanged(String::new()));
    tokio::time::sleep(Duration::from_millis(600)).await;

    println!("final query: {:?}, results: {}", store.state().query, store.state().results.len());
    Ok(())
}
