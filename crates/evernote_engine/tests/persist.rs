use std::fs;

use evernote_engine::{
    ensure_parent_dir, preference_name, AtomicFile, MemoryPreferenceStore, PreferenceError,
    PreferenceStore, RonFilePreferenceStore,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

#[test]
fn creates_missing_parent_dir() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("state").join("prefs.ron");
    assert!(!file.parent().unwrap().exists());
    let dir = ensure_parent_dir(&file).unwrap();
    assert!(dir.is_dir());
}

#[test]
fn atomic_write_replaces_existing_content() {
    let temp = TempDir::new().unwrap();
    let file = AtomicFile::new(temp.path().join("prefs.ron"));

    file.write("hello").unwrap();
    assert_eq!(fs::read_to_string(file.path()).unwrap(), "hello");
    file.write("world").unwrap();
    assert_eq!(fs::read_to_string(file.path()).unwrap(), "world");
}

#[test]
fn parent_that_is_a_file_is_an_error() {
    let temp = TempDir::new().unwrap();
    let blocker = temp.path().join("not_a_dir");
    fs::write(&blocker, "x").unwrap();

    let file = AtomicFile::new(blocker.join("prefs.ron"));
    assert!(file.write("data").is_err());
    assert_eq!(fs::read_to_string(&blocker).unwrap(), "x");
}

#[test]
fn preference_names_carry_the_plugin_prefix() {
    assert_eq!(preference_name("accesstoken"), "evernote_accesstoken");
}

#[test]
fn file_store_survives_reopening() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("prefs.ron");

    let store = RonFilePreferenceStore::new(&path);
    store.set("7", "evernote_accesstoken", "S=s1:U=9").unwrap();
    store.set("8", "evernote_accesstoken", "other").unwrap();
    drop(store);

    let reopened = RonFilePreferenceStore::new(&path);
    assert_eq!(
        reopened.get("7", "evernote_accesstoken").unwrap().as_deref(),
        Some("S=s1:U=9")
    );
    assert_eq!(
        reopened.get("8", "evernote_accesstoken").unwrap().as_deref(),
        Some("other")
    );

    reopened.clear("7", "evernote_accesstoken").unwrap();
    assert_eq!(reopened.get("7", "evernote_accesstoken").unwrap(), None);
    assert_eq!(
        reopened.get("8", "evernote_accesstoken").unwrap().as_deref(),
        Some("other")
    );
}

#[test]
fn missing_file_reads_as_empty() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("prefs.ron");

    let store = RonFilePreferenceStore::new(&path);
    assert_eq!(store.get("7", "evernote_userid").unwrap(), None);
    store.set("7", "evernote_userid", "42").unwrap();
    assert_eq!(
        store.get("7", "evernote_userid").unwrap().as_deref(),
        Some("42")
    );
}

#[test]
fn corrupt_file_is_an_error_and_is_left_untouched() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("prefs.ron");
    let truncated = r#"(users: {"alice": {"evernote_accesstoken": "S=s1:U=9""#;
    fs::write(&path, truncated).unwrap();

    let store = RonFilePreferenceStore::new(&path);
    assert!(matches!(
        store.get("alice", "evernote_accesstoken"),
        Err(PreferenceError::Parse { .. })
    ));
    assert!(matches!(
        store.set("bob", "evernote_tokensecret", "s"),
        Err(PreferenceError::Parse { .. })
    ));
    assert!(store.clear("bob", "evernote_tokensecret").is_err());
    assert_eq!(fs::read_to_string(&path).unwrap(), truncated);
}

#[test]
fn memory_store_keeps_users_apart() {
    let store = MemoryPreferenceStore::new();
    store.set("1", "evernote_tokensecret", "a").unwrap();
    store.set("2", "evernote_tokensecret", "b").unwrap();
    store.clear("1", "evernote_tokensecret").unwrap();

    assert_eq!(store.get("1", "evernote_tokensecret").unwrap(), None);
    assert_eq!(
        store.get("2", "evernote_tokensecret").unwrap().as_deref(),
        Some("b")
    );
}
