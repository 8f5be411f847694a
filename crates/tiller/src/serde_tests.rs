//! Serde round-trips for collection state, which usually lives inside
//! persisted or restored app state.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::collection::fixtures::{Color, Page};
use crate::{NavigationalArray, OpenArray, OpenCollection};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Workspace {
    tabs: OpenArray<Color>,
    history: NavigationalArray<Page>,
}

#[test]
fn open_array_serializes_elements_and_cursor() {
    let tabs = OpenArray::new(vec![Color::Red, Color::Blue], Some(1));
    let value = serde_json::to_value(&tabs).unwrap();
    assert_eq!(
        value,
        json!({ "elements": ["Red", "Blue"], "cursor": 1 })
    );
}

#[test]
fn workspace_state_round_trips() {
    let mut history = NavigationalArray::new(vec![Page(1), Page(2)], Some(1));
    history.navigate_back();
    let workspace = Workspace {
        tabs: OpenArray::new(vec![Color::Green], Some(0)),
        history,
    };

    let encoded = serde_json::to_string(&workspace).unwrap();
    let decoded: Workspace = serde_json::from_str(&encoded).unwrap();
    assert_eq!(decoded, workspace);
    assert_eq!(decoded.history.cursor(), Some(0));
}

#[test]
fn out_of_bounds_cursor_is_dropped_on_decode() {
    let tabs: OpenArray<Color> =
        serde_json::from_value(json!({ "elements": ["Red"], "cursor": 3 })).unwrap();
    assert_eq!(tabs.cursor(), None);
    assert_eq!(tabs.len(), 1);

    let history: NavigationalArray<Page> =
        serde_json::from_value(json!({ "elements": [], "cursor": 0 })).unwrap();
    assert!(history.is_empty());
    assert_eq!(history.cursor(), None);
}

#[test]
fn missing_cursor_decodes_as_closed() {
    let tabs: OpenArray<Color> =
        serde_json::from_value(json!({ "elements": ["Green"], "cursor": null })).unwrap();
    assert_eq!(tabs.current(), None);
}
