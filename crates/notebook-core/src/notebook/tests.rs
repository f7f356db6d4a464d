use super::*;
use crate::error::NotebookError;
use crate::model::{IndexEntry, LinkDirection, LinkEdge};
use crate::report::{DiagnosticSeverity, MutationKind, MutationStage};
use crate::store::StoreNode;
use std::fs;
use tempfile::TempDir;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn path(name: &str) -> PathName {
    PathName::new(name).unwrap()
}

fn create_test_notebook(pages: &[(&str, &str)]) -> (Arc<MemoryStore>, Notebook) {
    init_logging();
    let store = Arc::new(MemoryStore::new());
    for (name, text) in pages {
        store.store_page(&path(name), text).unwrap();
    }
    let notebook = Notebook::from_store(store.clone(), NotebookConfig::default()).unwrap();
    (store, notebook)
}

fn text_of(store: &MemoryStore, name: &str) -> String {
    store
        .page_text(&path(name))
        .unwrap_or_else(|| panic!("no page {}", name))
}

fn edit_page(notebook: &Notebook, name: &str, text: &str) {
    let page = notebook.get_page(&path(name)).unwrap();
    page.set_parse_tree(notebook.format().parse(text)).unwrap();
    notebook.store_page(&page).unwrap();
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
    refuse_store: Option<PathName>,
    refuse_move: bool,
}

impl Recorder {
    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl NotebookListener for Recorder {
    fn will_store(&self, path: &PathName) -> Result<()> {
        self.push(format!("will_store {}", path));
        if self.refuse_store.as_ref() == Some(path) {
            return Err(NotebookError::Aborted(format!("{} is locked", path)));
        }
        Ok(())
    }

    fn did_store(&self, path: &PathName) {
        self.push(format!("did_store {}", path));
    }

    fn will_move(&self, path: &PathName, newpath: &PathName) -> Result<()> {
        self.push(format!("will_move {} {}", path, newpath));
        if self.refuse_move {
            return Err(NotebookError::Aborted("no moving".to_string()));
        }
        Ok(())
    }

    fn did_move(&self, path: &PathName, newpath: &PathName) {
        self.push(format!("did_move {} {}", path, newpath));
    }

    fn will_delete(&self, path: &PathName) -> Result<()> {
        self.push(format!("will_delete {}", path));
        Ok(())
    }

    fn did_delete(&self, path: &PathName) {
        self.push(format!("did_delete {}", path));
    }

    fn properties_changed(&self, config: &NotebookConfig) {
        self.push(format!("properties_changed {}", config.name));
    }

    fn suggest_link(&self, _source: &PathName, word: &str) -> Option<PathName> {
        (word == "todo").then(|| path("Tasks:Todo"))
    }

    fn new_page_template(&self, path: &PathName, template: &mut PageTemplate) {
        if path.is_child_of(&PathName::new("Journal").unwrap()) {
            template.name = "Journal".to_string();
        }
    }
}

/// Index answering from a fixed list of names and floating links; it
/// knows no backlinks and forgets nothing.
#[derive(Default)]
struct FixedIndex {
    names: Vec<PathName>,
    floating: Vec<LinkEdge>,
    fail_update: bool,
}

impl Index for FixedIndex {
    fn probably_up_to_date(&self) -> bool {
        true
    }

    fn on_store_page(&self, _path: &PathName, _text: &str) -> Result<()> {
        Ok(())
    }

    fn on_delete_page(&self, _path: &PathName) -> Result<()> {
        Ok(())
    }

    fn update(&self, path: &PathName) -> Result<()> {
        if self.fail_update {
            return Err(NotebookError::Store(format!("can not index {}", path)));
        }
        Ok(())
    }

    fn lookup_by_name(&self, path: &PathName) -> Option<IndexEntry> {
        let has_content = self.names.contains(path);
        let has_children = self.names.iter().any(|name| name.is_child_of(path));
        (has_content || has_children).then(|| IndexEntry {
            name: path.clone(),
            has_content,
            has_children,
            is_placeholder: false,
        })
    }

    fn list_links(&self, _path: &PathName, _direction: LinkDirection) -> Vec<LinkEdge> {
        Vec::new()
    }

    fn list_floating_links(&self, word: &str) -> Vec<LinkEdge> {
        self.floating
            .iter()
            .filter(|edge| {
                let anchor = edge.href.split(':').next().unwrap_or_default();
                anchor.to_lowercase() == word.to_lowercase()
            })
            .cloned()
            .collect()
    }
}

fn edge(source: &str, target: &str, href: &str) -> LinkEdge {
    LinkEdge {
        source: path(source),
        target: path(target),
        href: href.to_string(),
    }
}

fn notebook_with_index(store: Arc<MemoryStore>, index: FixedIndex) -> Notebook {
    Notebook::new(
        None,
        NotebookConfig::default(),
        store,
        Arc::new(index),
        Arc::new(MarkdownFormat),
    )
}

// Pages and the identity cache

#[test]
fn test_get_page_returns_same_object_while_valid() {
    let (_store, notebook) = create_test_notebook(&[("a", "A")]);
    let first = notebook.get_page(&path("a")).unwrap();
    let second = notebook.get_page(&path("a")).unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    let flushed = notebook.flush_page_cache(&path("a"));
    assert_eq!(flushed, vec![path("a")]);
    assert!(!first.is_valid());

    let third = notebook.get_page(&path("a")).unwrap();
    assert!(!Arc::ptr_eq(&first, &third));
    assert!(third.is_valid());
}

#[test]
fn test_get_page_for_missing_page() {
    let (_store, notebook) = create_test_notebook(&[]);
    let page = notebook.get_page(&path("Nothing:Here")).unwrap();
    assert!(!page.has_content());
    assert!(!page.has_children());
    assert!(page.parse_tree().is_none());
}

#[test]
fn test_parent_of_placeholder_has_children() {
    let (_store, notebook) = create_test_notebook(&[("a", "[[x:y]]")]);
    let page = notebook.get_page(&path("x")).unwrap();
    assert!(page.has_children());
    assert!(!page.has_content());
}

#[test]
fn test_get_new_page_adds_number() {
    let (_store, notebook) = create_test_notebook(&[("Note", "N"), ("Note 1:Child", "C")]);
    let page = notebook.get_new_page(&path("Note")).unwrap();
    assert_eq!(page.name(), &path("Note 2"));
    assert!(!page.has_content());

    let page = notebook.get_new_page(&path("Fresh")).unwrap();
    assert_eq!(page.name(), &path("Fresh"));
}

#[test]
fn test_get_home_page() {
    let (_store, notebook) = create_test_notebook(&[("Home", "# Home\n")]);
    let page = notebook.get_home_page().unwrap();
    assert_eq!(page.name(), &path("Home"));
    assert!(page.has_content());
}

#[test]
fn test_store_page_writes_and_indexes() {
    let (store, notebook) = create_test_notebook(&[]);
    let parent = notebook.get_page(&path("a")).unwrap();
    assert!(!parent.has_children());

    let page = notebook.get_page(&path("a:b")).unwrap();
    page.set_parse_tree(notebook.format().parse("see [[c]]\n")).unwrap();
    assert!(page.is_modified());
    notebook.store_page(&page).unwrap();

    assert!(!page.is_modified());
    assert_eq!(text_of(&store, "a:b"), "see [[c]]\n");
    assert!(parent.has_children());
    let entry = notebook.index().lookup_by_name(&path("a:b")).unwrap();
    assert!(entry.has_content);
    assert_eq!(notebook.index().count_links(&path("a:b"), LinkDirection::Forward), 1);
}

#[test]
fn test_store_page_notifies_listeners_in_order() {
    let (_store, notebook) = create_test_notebook(&[]);
    let recorder = Arc::new(Recorder::default());
    notebook.connect(recorder.clone());

    edit_page(&notebook, "a", "A");
    assert_eq!(recorder.events(), vec!["will_store a", "did_store a"]);
}

#[test]
fn test_will_store_listener_aborts_store() {
    let (store, notebook) = create_test_notebook(&[]);
    notebook.connect(Arc::new(Recorder {
        refuse_store: Some(path("a")),
        ..Default::default()
    }));

    let page = notebook.get_page(&path("a")).unwrap();
    page.set_parse_tree(notebook.format().parse("A")).unwrap();
    let result = notebook.store_page(&page);
    assert!(matches!(result, Err(NotebookError::Aborted(_))));
    assert!(store.page_text(&path("a")).is_none());
    assert!(page.is_modified());
}

#[test]
#[should_panic(expected = "no longer valid")]
fn test_store_invalid_page_is_a_bug() {
    let (_store, notebook) = create_test_notebook(&[("a", "A")]);
    let page = notebook.get_page(&path("a")).unwrap();
    notebook.flush_page_cache(&path("a"));
    let _ = notebook.store_page(&page);
}

#[tokio::test]
async fn test_store_page_async_returns_background_job() {
    let (store, notebook) = create_test_notebook(&[]);
    let recorder = Arc::new(Recorder::default());
    notebook.connect(recorder.clone());

    let page = notebook.get_page(&path("a")).unwrap();
    page.set_parse_tree(notebook.format().parse("async [[b]]")).unwrap();
    let job = notebook
        .store_page_async(&page)
        .unwrap()
        .expect("runs in the background inside a runtime");
    // Emitted before the write is done
    assert_eq!(recorder.events(), vec!["will_store a", "did_store a"]);

    job.await.unwrap().unwrap();
    assert_eq!(text_of(&store, "a"), "async [[b]]");
    assert_eq!(notebook.index().count_links(&path("b"), LinkDirection::Backward), 1);
}

#[test]
fn test_store_page_async_without_runtime() {
    let (store, notebook) = create_test_notebook(&[]);
    let page = notebook.get_page(&path("a")).unwrap();
    page.set_parse_tree(notebook.format().parse("A")).unwrap();
    assert!(notebook.store_page_async(&page).unwrap().is_none());
    assert_eq!(text_of(&store, "a"), "A");
}

// Links

#[test]
fn test_lookup_from_user_input() {
    let (_store, notebook) = create_test_notebook(&[("proj:a", "A"), ("proj:b", "B")]);
    let b = path("proj:b");

    assert_eq!(notebook.lookup_from_user_input("+child", Some(&b)).unwrap(), path("proj:b:child"));
    assert_eq!(notebook.lookup_from_user_input("a", Some(&b)).unwrap(), path("proj:a"));
    assert_eq!(notebook.lookup_from_user_input(":a", Some(&b)).unwrap(), path("a"));
    assert_eq!(notebook.lookup_from_user_input("Foo:Bar", None).unwrap(), path("Foo:Bar"));
    assert!(matches!(
        notebook.lookup_from_user_input("+child", None),
        Err(NotebookError::InvalidName(_))
    ));
    assert!(matches!(
        notebook.lookup_from_user_input("::", None),
        Err(NotebookError::InvalidName(_))
    ));
}

#[test]
fn test_resolve_and_relative_link() {
    let (_store, notebook) = create_test_notebook(&[("proj:a", "A"), ("proj:b", "B")]);
    let b = path("proj:b");

    assert_eq!(notebook.resolve_link("a", &b).unwrap(), path("proj:a"));
    assert_eq!(notebook.resolve_link("missing", &b).unwrap(), path("missing"));
    assert_eq!(notebook.relative_link(&b, &path("proj:a")), "a");
    assert_eq!(notebook.relative_link(&b, &path("proj:b:c")), "+c");
    assert_eq!(notebook.relative_link(&b, &path("proj")), "proj");
    assert_eq!(notebook.relative_link(&b, &path("Proj2:x")), "Proj2:x");
    assert_eq!(notebook.relative_link(&b, &path("PROJ")), ":PROJ");
    assert_eq!(notebook.relative_link(&b, &PathName::root()), ":");
}

#[test]
fn test_suggest_link_asks_listeners() {
    let (_store, notebook) = create_test_notebook(&[]);
    assert!(notebook.suggest_link(&path("a"), "todo").is_none());

    notebook.connect(Arc::new(Recorder::default()));
    assert_eq!(notebook.suggest_link(&path("a"), "todo"), Some(path("Tasks:Todo")));
    assert!(notebook.suggest_link(&path("a"), "other").is_none());
}

// Move

#[test]
fn test_move_anchors_floating_link_to_new_location() {
    let (store, notebook) = create_test_notebook(&[("proj:a", "A"), ("proj:b", "See [[a]]")]);

    let report = notebook.move_page(&path("proj:a"), &path("archive:a"), true).unwrap();

    assert_eq!(text_of(&store, "proj:b"), "See [[archive:a]]");
    assert_eq!(text_of(&store, "archive:a"), "A");
    assert!(store.page_text(&path("proj:a")).is_none());
    assert_eq!(report.stage, MutationStage::PostNotified);
    assert!(report.existed);
    assert_eq!(report.updated_pages, vec![path("proj:b")]);
    assert!(report.diagnostics.is_empty());
    assert_eq!(
        notebook.resolve_link("archive:a", &path("proj:b")).unwrap(),
        path("archive:a")
    );
}

#[test]
fn test_move_keeps_label_and_absolute_links() {
    let (store, notebook) = create_test_notebook(&[
        ("proj:a", "A"),
        ("proj:a:c", "C"),
        ("x", "[[proj:a|Label]] [[:proj:a]] [[proj:a:c]] [[https://example.com]]"),
    ]);

    notebook.move_page(&path("proj:a"), &path("archive:a"), true).unwrap();
    assert_eq!(
        text_of(&store, "x"),
        "[[archive:a|Label]] [[:archive:a]] [[archive:a:c]] [[https://example.com]]"
    );
}

#[test]
fn test_move_pins_links_from_moved_page() {
    let (store, notebook) = create_test_notebook(&[("proj:a", "[[b]] and [[+sub]]"), ("proj:b", "B")]);

    let report = notebook.move_page(&path("proj:a"), &path("archive:a"), true).unwrap();

    assert_eq!(text_of(&store, "archive:a"), "[[proj:b]] and [[+sub]]");
    assert!(report.updated_pages.contains(&path("archive:a")));
}

#[test]
fn test_move_and_back_restores_links() {
    let pages = [
        ("a:b", "B with [[c]]"),
        ("a:c", "C"),
        ("a:d", "[[b]]"),
        ("x", "link [[a:b]] and [[:a:b]]"),
    ];
    let (store, notebook) = create_test_notebook(&pages);

    notebook.move_page(&path("a:b"), &path("a:e"), true).unwrap();
    assert_eq!(text_of(&store, "a:d"), "[[e]]");
    assert_eq!(text_of(&store, "x"), "link [[a:e]] and [[:a:e]]");

    let report = notebook.move_page(&path("a:e"), &path("a:b"), true).unwrap();
    assert!(report.diagnostics.is_empty());
    for (name, text) in pages {
        assert_eq!(text_of(&store, name), text, "page {}", name);
    }
}

#[test]
fn test_move_into_own_subtree() {
    let (store, notebook) = create_test_notebook(&[("a", "A"), ("x", "[[a]]")]);

    notebook.move_page(&path("a"), &path("a:b"), true).unwrap();

    assert_eq!(text_of(&store, "a:b"), "A");
    assert_eq!(text_of(&store, "x"), "[[a:b]]");
    let entry = notebook.index().lookup_by_name(&path("a")).unwrap();
    assert!(!entry.has_content);
    assert!(entry.has_children);
}

#[test]
fn test_move_placeholder_only_updates_links() {
    let (store, notebook) = create_test_notebook(&[("x", "[[ghost]]")]);

    let report = notebook.move_page(&path("ghost"), &path("real"), true).unwrap();

    assert!(!report.existed);
    assert_eq!(text_of(&store, "x"), "[[real]]");
}

#[test]
fn test_move_reanchors_floating_links_under_old_parent() {
    init_logging();
    let store = Arc::new(MemoryStore::new());
    store.store_page(&path("a:b"), "B").unwrap();
    store.store_page(&path("a:x"), "See [[b]] and [[b:sub]]").unwrap();
    store.store_page(&path("b"), "Top").unwrap();
    store.store_page(&path("z"), "[[b]]").unwrap();
    // State after the move: `[[b]]` below `a` now finds the top level `b`
    let index = FixedIndex {
        names: vec![path("a:x"), path("b"), path("c:b"), path("z")],
        floating: vec![
            edge("a:x", "b", "b"),
            edge("a:x", "b:sub", "b:sub"),
            edge("z", "b", "b"),
        ],
        ..Default::default()
    };
    let notebook = notebook_with_index(store.clone(), index);

    let report = notebook.move_page(&path("a:b"), &path("c:b"), true).unwrap();

    assert_eq!(text_of(&store, "a:x"), "See [[c:b]] and [[c:b:sub]]");
    assert_eq!(text_of(&store, "z"), "[[b]]");
    assert_eq!(report.updated_pages, vec![path("a:x")]);
    assert!(report.diagnostics.is_empty());
}

#[test]
fn test_index_error_after_store_move_keeps_move() {
    init_logging();
    let store = Arc::new(MemoryStore::new());
    store.store_page(&path("a"), "A").unwrap();
    let index = FixedIndex {
        names: vec![path("a")],
        fail_update: true,
        ..Default::default()
    };
    let notebook = notebook_with_index(store.clone(), index);
    let recorder = Arc::new(Recorder::default());
    notebook.connect(recorder.clone());

    let result = notebook.move_page(&path("a"), &path("b"), true);
    assert!(matches!(result, Err(NotebookError::Store(_))));
    assert_eq!(text_of(&store, "b"), "A");
    assert!(store.page_text(&path("a")).is_none());
    assert_eq!(recorder.events(), vec!["will_move a b"]);
}

#[test]
#[should_panic(expected = "unsaved changes")]
fn test_move_with_unsaved_page_is_a_bug() {
    let (_store, notebook) = create_test_notebook(&[("a", "A")]);
    let page = notebook.get_page(&path("a")).unwrap();
    page.set_parse_tree(notebook.format().parse("changed")).unwrap();
    let _ = notebook.move_page(&path("a"), &path("b"), false);
}

#[test]
fn test_move_without_link_update() {
    let (store, notebook) = create_test_notebook(&[("proj:a", "A"), ("proj:b", "See [[a]]")]);

    let report = notebook.move_page(&path("proj:a"), &path("archive:a"), false).unwrap();

    assert_eq!(text_of(&store, "proj:b"), "See [[a]]");
    assert!(report.updated_pages.is_empty());
    assert_eq!(report.stage, MutationStage::PostNotified);
}

#[test]
fn test_move_invalidates_cached_pages() {
    let (_store, notebook) = create_test_notebook(&[("a", "A"), ("a:b", "B")]);
    let a = notebook.get_page(&path("a")).unwrap();
    let ab = notebook.get_page(&path("a:b")).unwrap();
    let placeholder = notebook.get_page(&path("z")).unwrap();
    assert!(!placeholder.has_content());

    notebook.move_page(&path("a"), &path("z"), true).unwrap();

    assert!(!a.is_valid());
    assert!(!ab.is_valid());
    assert!(!placeholder.is_valid());
    assert!(notebook.get_page(&path("z")).unwrap().has_content());
    assert!(notebook.get_page(&path("z:b")).unwrap().has_content());
}

#[test]
fn test_move_onto_existing_page_fails() {
    let (store, notebook) = create_test_notebook(&[("a", "A"), ("b", "B")]);
    let result = notebook.move_page(&path("a"), &path("b"), true);
    assert!(matches!(result, Err(NotebookError::PageExists(_))));
    assert_eq!(text_of(&store, "a"), "A");
    assert_eq!(text_of(&store, "b"), "B");
}

#[test]
fn test_move_root_is_invalid() {
    let (_store, notebook) = create_test_notebook(&[("a", "A")]);
    let result = notebook.move_page(&PathName::root(), &path("b"), false);
    assert!(matches!(result, Err(NotebookError::InvalidName(_))));
}

#[test]
fn test_move_with_stale_index() {
    init_logging();
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    store.store_page(&path("a"), "A").unwrap();
    let format: Arc<dyn Format> = Arc::new(MarkdownFormat);
    let index = Arc::new(MemoryIndex::new(store.clone(), format.clone()));
    index.rebuild().unwrap();
    index.mark_stale();
    let notebook = Notebook::new(None, NotebookConfig::default(), store.clone(), index.clone(), format);

    let result = notebook.move_page(&path("a"), &path("b"), true);
    assert!(matches!(result, Err(NotebookError::IndexStale)));
    assert!(store.get_node(&path("a")).unwrap().source.is_some());

    // Without link updates the index does not matter
    notebook.move_page(&path("a"), &path("b"), false).unwrap();
    assert_eq!(
        store.get_node(&path("b")).unwrap(),
        StoreNode {
            source: Some("A".to_string()),
            has_children: false,
            attachments_dir: None,
            readonly: false,
        }
    );
}

#[test]
fn test_move_notifies_listeners() {
    let (_store, notebook) = create_test_notebook(&[("a", "A")]);
    let recorder = Arc::new(Recorder::default());
    notebook.connect(recorder.clone());

    notebook.move_page(&path("a"), &path("b"), true).unwrap();
    assert_eq!(recorder.events(), vec!["will_move a b", "did_move a b"]);
}

#[test]
fn test_will_move_listener_aborts_before_store() {
    let (store, notebook) = create_test_notebook(&[("a", "A")]);
    let recorder = Arc::new(Recorder {
        refuse_move: true,
        ..Default::default()
    });
    notebook.connect(recorder.clone());

    let result = notebook.move_page(&path("a"), &path("b"), true);
    assert!(matches!(result, Err(NotebookError::Aborted(_))));
    assert_eq!(text_of(&store, "a"), "A");
    assert_eq!(recorder.events(), vec!["will_move a b"]);
}

#[test]
fn test_failed_repair_is_reported_not_raised() {
    let (store, notebook) = create_test_notebook(&[("proj:a", "A"), ("proj:b", "See [[a]]")]);
    notebook.connect(Arc::new(Recorder {
        refuse_store: Some(path("proj:b")),
        ..Default::default()
    }));

    let report = notebook.move_page(&path("proj:a"), &path("archive:a"), true).unwrap();

    assert_eq!(report.stage, MutationStage::PostNotified);
    assert!(report.has_errors());
    let error = report
        .diagnostics
        .iter()
        .find(|d| d.severity == DiagnosticSeverity::Error)
        .unwrap();
    assert_eq!(error.page, Some(path("proj:b")));
    assert!(report
        .diagnostics
        .iter()
        .any(|d| d.severity == DiagnosticSeverity::Warning));

    // The move itself stays, the failed page keeps its old text
    assert_eq!(text_of(&store, "archive:a"), "A");
    assert_eq!(text_of(&store, "proj:b"), "See [[a]]");
    let page = notebook.get_page(&path("proj:b")).unwrap();
    assert!(!page.is_modified());
}

// Rename

#[test]
fn test_rename_updates_self_link_and_heading() {
    let (store, notebook) = create_test_notebook(&[("x", "# x\n\nMe: [[x]]\n")]);

    let report = notebook.rename_page(&path("x"), "y", true, true).unwrap();

    assert_eq!(report.new_path, Some(path("y")));
    assert_eq!(text_of(&store, "y"), "# y\n\nMe: [[y]]\n");
    assert!(store.page_text(&path("x")).is_none());
}

#[test]
fn test_rename_within_namespace() {
    let (store, notebook) = create_test_notebook(&[("a:old", "# Old\n"), ("a:other", "[[old]]")]);

    let report = notebook.rename_page(&path("a:old"), "New: Name", false, true).unwrap();

    assert_eq!(report.new_path, Some(path("a:New Name")));
    assert_eq!(text_of(&store, "a:New Name"), "# Old\n");
    assert_eq!(text_of(&store, "a:other"), "[[New Name]]");
}

#[test]
fn test_rename_to_invalid_name() {
    let (_store, notebook) = create_test_notebook(&[("a", "A")]);
    let result = notebook.rename_page(&path("a"), ":?", true, true);
    assert!(matches!(result, Err(NotebookError::InvalidName(_))));
}

// Delete

#[test]
fn test_delete_replaces_links_by_text() {
    let (store, notebook) = create_test_notebook(&[
        ("proj:old", "Old"),
        ("proj:sibling", "See [[old]] and [[old:child|the child]] here"),
    ]);

    let report = notebook.delete_page(&path("proj:old"), true).unwrap();

    assert!(report.existed);
    assert_eq!(report.updated_pages, vec![path("proj:sibling")]);
    assert_eq!(text_of(&store, "proj:sibling"), "See old and the child here");
    let page = notebook.get_page(&path("proj:sibling")).unwrap();
    assert_eq!(page.parse_tree().unwrap().links().count(), 0);
    assert!(notebook.index().lookup_by_name(&path("proj:old")).is_none());
}

#[test]
fn test_delete_without_backlinks() {
    let (store, notebook) = create_test_notebook(&[("a", "A"), ("b", "B")]);

    let report = notebook.delete_page(&path("a"), true).unwrap();
    assert!(report.existed);
    assert!(report.updated_pages.is_empty());
    assert_eq!(text_of(&store, "b"), "B");

    let report = notebook.delete_page(&path("a"), true).unwrap();
    assert!(!report.existed);
    assert!(report.updated_pages.is_empty());
}

#[test]
fn test_delete_without_link_update_keeps_links() {
    let (store, notebook) = create_test_notebook(&[("a", "A"), ("b", "[[a]]")]);
    notebook.delete_page(&path("a"), false).unwrap();
    assert_eq!(text_of(&store, "b"), "[[a]]");
    assert!(notebook.index().lookup_by_name(&path("a")).unwrap().is_placeholder);
}

#[test]
fn test_delete_invalidates_cached_pages_and_notifies() {
    let (_store, notebook) = create_test_notebook(&[("a", "A"), ("a:b", "B")]);
    let recorder = Arc::new(Recorder::default());
    notebook.connect(recorder.clone());
    let ab = notebook.get_page(&path("a:b")).unwrap();

    let report = notebook.delete_page(&path("a"), true).unwrap();

    assert!(!ab.is_valid());
    assert_eq!(report.stage, MutationStage::PostNotified);
    assert_eq!(recorder.events(), vec!["will_delete a", "did_delete a"]);
}

#[test]
fn test_trash_page() {
    let (store, notebook) = create_test_notebook(&[("a", "A"), ("b", "[[a]]")]);

    let report = notebook.trash_page(&path("a"), true).unwrap();
    assert_eq!(report.kind, MutationKind::Trash);
    assert!(report.existed);
    assert_eq!(store.trashed(), vec![path("a")]);
    assert_eq!(text_of(&store, "b"), "a");
}

#[test]
fn test_trash_disabled_by_config() {
    init_logging();
    let store = Arc::new(MemoryStore::new());
    store.store_page(&path("a"), "A").unwrap();
    let config = NotebookConfig {
        disable_trash: true,
        ..Default::default()
    };
    let notebook = Notebook::from_store(store.clone(), config).unwrap();
    let recorder = Arc::new(Recorder::default());
    notebook.connect(recorder.clone());

    let result = notebook.trash_page(&path("a"), true);
    assert!(matches!(result, Err(NotebookError::TrashNotSupported(_))));
    assert_eq!(text_of(&store, "a"), "A");
    assert!(recorder.events().is_empty());
}

#[test]
fn test_trash_not_supported_by_store() {
    init_logging();
    let store = Arc::new(MemoryStore::new().without_trash());
    store.store_page(&path("a"), "A").unwrap();
    let notebook = Notebook::from_store(store.clone(), NotebookConfig::default()).unwrap();

    let result = notebook.trash_page(&path("a"), true);
    assert!(matches!(result, Err(NotebookError::TrashNotSupported(_))));
    assert_eq!(text_of(&store, "a"), "A");
}

// Properties, templates and files

#[test]
fn test_get_template() {
    let (_store, notebook) = create_test_notebook(&[]);
    let template = notebook.get_template(&path("Notes:Idea"));
    assert_eq!(template.name, "Default");
    assert_eq!(template.context["page"]["basename"], "Idea");

    notebook.set_namespace_property(&path("Notes"), "template", serde_json::json!("Note"));
    assert_eq!(notebook.get_template(&path("Notes:Idea")).name, "Note");

    notebook.connect(Arc::new(Recorder::default()));
    assert_eq!(notebook.get_template(&path("Journal:2024")).name, "Journal");
}

#[test]
fn test_save_properties_in_memory() {
    let (_store, notebook) = create_test_notebook(&[]);
    let recorder = Arc::new(Recorder::default());
    notebook.connect(recorder.clone());

    notebook
        .save_properties(PropertiesUpdate {
            name: Some("Scratch".to_string()),
            home_page: Some(path("Start")),
            icon: Some(PathBuf::from("/icons/nb.png")),
            ..Default::default()
        })
        .unwrap();

    let config = notebook.config();
    assert_eq!(config.name, "Scratch");
    assert_eq!(config.home_page, path("Start"));
    assert_eq!(config.icon.as_deref(), Some("/icons/nb.png"));
    assert_eq!(recorder.events(), vec!["properties_changed Scratch"]);
}

#[test]
fn test_save_properties_rejects_bad_keyword() {
    let (_store, notebook) = create_test_notebook(&[]);
    let result = notebook.save_properties(PropertiesUpdate {
        interwiki_keyword: Some("not valid".to_string()),
        ..Default::default()
    });
    assert!(matches!(result, Err(NotebookError::InvalidConfig(_))));
    assert!(notebook.config().interwiki_keyword.is_none());
}

#[test]
fn test_resolve_file_in_memory_notebook() {
    init_logging();
    let store = Arc::new(MemoryStore::new().with_attachments_root(PathBuf::from("/nb")));
    let notebook = Notebook::from_store(store, NotebookConfig::default()).unwrap();

    assert_eq!(
        notebook.get_attachments_dir(&path("a:b")),
        Some(PathBuf::from("/nb/a/b"))
    );
    assert_eq!(
        notebook.resolve_file("./x.png", Some(&path("a:b"))).unwrap(),
        PathBuf::from("/nb/a/b/x.png")
    );
    // No notebook folder to fall back on
    assert!(matches!(
        notebook.resolve_file("x.png", None),
        Err(NotebookError::NoRootFolder)
    ));
}

#[test]
fn test_notebook_from_dir() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("proj")).unwrap();
    fs::write(root.join("proj/a.md"), "# a\n").unwrap();
    fs::write(root.join("proj/b.md"), "See [[a]]\n").unwrap();

    let notebook = Notebook::new_from_dir(root).unwrap();
    assert_eq!(notebook.dir(), Some(root));
    assert!(!notebook.is_readonly());

    let report = notebook.move_page(&path("proj:a"), &path("archive:a"), true).unwrap();
    assert!(report.diagnostics.is_empty());
    assert!(root.join("archive/a.md").is_file());
    assert!(!root.join("proj/a.md").exists());
    assert_eq!(
        fs::read_to_string(root.join("proj/b.md")).unwrap(),
        "See [[archive:a]]\n"
    );
}

#[test]
fn test_files_in_notebook_dir() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    let notebook = Notebook::new_from_dir(root).unwrap();
    let page = path("Proj:Page");

    let attachments = notebook.get_attachments_dir(&page).unwrap();
    assert_eq!(attachments, root.join("Proj/Page"));
    assert_eq!(
        notebook.resolve_file("./img.png", Some(&page)).unwrap(),
        root.join("Proj/Page/img.png")
    );
    assert_eq!(
        notebook.relative_filepath(&root.join("Proj/Page/img.png"), Some(&page)).as_deref(),
        Some("./img.png")
    );
    assert_eq!(
        notebook.relative_filepath(&root.join("Other/doc.pdf"), Some(&page)).as_deref(),
        Some("../../Other/doc.pdf")
    );
    assert_eq!(
        notebook.relative_filepath(&root.join("top.txt"), None).as_deref(),
        Some("./top.txt")
    );
}

#[test]
fn test_save_properties_writes_relative_paths() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    let notebook = Notebook::new_from_dir(root).unwrap();

    notebook
        .save_properties(PropertiesUpdate {
            icon: Some(root.join("icons/nb.png")),
            document_root: Some(root.join("docs")),
            ..Default::default()
        })
        .unwrap();

    let saved = NotebookConfig::load_dir(root).unwrap();
    assert_eq!(saved.icon.as_deref(), Some("./icons/nb.png"));
    assert_eq!(saved.document_root.as_deref(), Some("./docs"));

    // `/x` links now go below the document root
    assert_eq!(
        notebook.resolve_file("/manual.pdf", None).unwrap(),
        root.join("docs/manual.pdf")
    );
    assert_eq!(
        notebook.relative_filepath(&root.join("docs/manual.pdf"), None).as_deref(),
        Some("/manual.pdf")
    );
}
