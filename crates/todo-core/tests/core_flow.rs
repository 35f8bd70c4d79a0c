use std::fs;

use todo_core::clock::SystemClock;
use todo_core::env::FileEnv;
use todo_core::filter::Filter;
use todo_core::store::TaskStore;
use todo_core::theme::{Theme, ThemeState};
use tempfile::tempdir;

#[test]
fn file_store_roundtrip_and_filtering() {
    let temp = tempdir().expect("tempdir");
    let env = FileEnv::open(temp.path(), false).expect("open env");
    let mut store = TaskStore::open(env, SystemClock);

    let milk = store.add("Buy milk").expect("add milk");
    store.add("Walk dog").expect("add dog");
    store.toggle(&milk.id).expect("toggle milk");
    store.set_filter(Filter::Completed);
    assert_eq!(store.visible_tasks().len(), 1);

    let mut theme = ThemeState::load(store.persistence());
    assert_eq!(theme.current(), Theme::Light);
    theme.toggle(store.persistence_mut());
    let expected = store.tasks();
    drop(store);

    let env = FileEnv::open(temp.path(), false).expect("reopen env");
    let reopened = TaskStore::open(env, SystemClock);
    assert_eq!(reopened.tasks(), expected);
    assert_eq!(reopened.filter(), Filter::All);
    assert_eq!(reopened.remaining_count(), 1);
    assert_eq!(
        ThemeState::load(reopened.persistence()).current(),
        Theme::Dark
    );
}

#[test]
fn corrupt_file_opens_empty_and_recovers() {
    let temp = tempdir().expect("tempdir");
    fs::write(
        temp.path().join(FileEnv::FILE_NAME),
        r#"{"todo:v1":"not json","theme":"dark"}"#,
    )
    .expect("seed file");

    let env = FileEnv::open(temp.path(), false).expect("open env");
    let mut store = TaskStore::open(env, SystemClock);
    assert!(store.is_empty());
    assert_eq!(
        ThemeState::load(store.persistence()).current(),
        Theme::Dark
    );

    store.add("fresh");
    let raw = fs::read_to_string(temp.path().join(FileEnv::FILE_NAME)).expect("read back");
    assert!(raw.contains("fresh"));
}
