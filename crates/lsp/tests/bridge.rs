use editor_lsp_bridge::core::RopeExt;
use editor_lsp_bridge::{
    uri_for_path, ComparisonPolicy, Config, Error, Host, LocalHost, ResolutionFailure,
    SandboxOptions, Session,
};
use lsp_types::{Position, Range};
use ropey::Rope;
use std::fs;
use std::path::{Path, PathBuf};

struct Workspace {
    dir: tempfile::TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("temp dir"),
        }
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn write(&self, relative: &str, text: &str) -> PathBuf {
        let path = self.root().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create dirs");
        }
        fs::write(&path, text).expect("write file");
        path
    }

    fn uri(&self, relative: &str) -> String {
        uri_for_path(&self.root().join(relative)).expect("absolute path")
    }
}

fn session() -> Session<LocalHost> {
    Session::local(Config::new()).expect("spawn context")
}

#[test_log::test]
fn resolves_marker_at_depth() {
    let ws = Workspace::new();
    ws.write("module/app.iml", "<module/>");
    ws.write("module/src/main/java/App.java", "class App {}");
    let session = session();

    let (project, relative) = session
        .resolve(&ws.uri("module/src/main/java/App.java"))
        .unwrap();

    assert_eq!(project.root(), ws.root().join("module"));
    assert_eq!(relative, PathBuf::from("src/main/java/App.java"));
    assert_eq!(relative.components().count(), 4);
}

#[test_log::test]
fn nearest_marker_wins() {
    let ws = Workspace::new();
    ws.write("outer.iml", "");
    ws.write("inner/inner.iml", "");
    ws.write("inner/A.txt", "a");
    let session = session();

    let (project, relative) = session.resolve(&ws.uri("inner/A.txt")).unwrap();
    assert_eq!(project.root(), ws.root().join("inner"));
    assert_eq!(relative, PathBuf::from("A.txt"));
}

#[test]
fn unmarked_tree_fails_resolution() {
    let ws = Workspace::new();
    ws.write("lonely/A.txt", "a");
    ws.write("lonely/app.iml", "");
    // Nothing above the temp dir carries this extension.
    let mut config = Config::new();
    config
        .update(serde_json::json!({ "markerExtension": "bridge-marker-7f3a" }))
        .unwrap();
    let session = Session::local(config).unwrap();

    let err = session.resolve(&ws.uri("lonely/A.txt")).unwrap_err();
    assert!(matches!(
        err,
        Error::Resolution {
            reason: ResolutionFailure::NoProjectMarker { .. },
            ..
        }
    ));
    assert!(session.projects().is_empty());
}

#[test]
fn configured_marker_is_shared_by_resolver_and_host() {
    let ws = Workspace::new();
    ws.write("pkg/Cargo.toml", "[package]");
    ws.write("pkg/src/lib.rs", "pub fn f() {}");
    let mut config = Config::new();
    config
        .update(serde_json::json!({ "markerExtension": "toml" }))
        .unwrap();
    let session = Session::local(config).unwrap();

    let (project, document) = session.resolve_document(&ws.uri("pkg/src/lib.rs")).unwrap();
    assert_eq!(project.root(), ws.root().join("pkg"));
    assert_eq!(document.text(), "pub fn f() {}");
    assert_eq!(session.host().open_count(), 1);
}

#[test]
fn two_slash_uri_is_normalised() {
    let ws = Workspace::new();
    ws.write("app.iml", "");
    ws.write("A.txt", "a");
    let uri = ws.uri("A.txt").replacen("file:///", "file://", 1);

    let document = session().get_document(&uri).unwrap();
    assert_eq!(document.text(), "a");
}

#[test_log::test]
fn disposed_project_is_reopened_on_next_request() {
    let ws = Workspace::new();
    ws.write("app.iml", "");
    ws.write("A.txt", "a");
    let session = session();

    let (first, _) = session.resolve(&ws.uri("A.txt")).unwrap();
    session.host().dispose_project(&first);
    let (second, _) = session.resolve(&ws.uri("A.txt")).unwrap();

    assert!(!first.same_as(&second));
    assert!(session.host().is_live(&second));
    assert_eq!(session.host().open_count(), 2);
}

#[test]
fn missing_resource_is_not_found() {
    let ws = Workspace::new();
    ws.write("app.iml", "");
    let err = session().get_document(&ws.uri("Missing.txt")).unwrap_err();
    assert!(matches!(err, Error::ResourceNotFound { .. }));
}

#[test_log::test]
fn reload_observes_external_edits() {
    let ws = Workspace::new();
    ws.write("app.iml", "");
    let file = ws.write("notes.txt", "first");
    let session = session();

    let document = session.get_document(&ws.uri("notes.txt")).unwrap();
    fs::write(&file, "second").unwrap();
    assert_eq!(document.text(), "first");

    session.reload_document_at_uri(&ws.uri("notes.txt")).unwrap();
    assert_eq!(document.text(), "second");
}

#[test_log::test]
fn difference_from_action_reconstructs_the_transform() {
    let ws = Workspace::new();
    ws.write("app.iml", "");
    let original = "fn main() {\n    let count = 1;\n    println!(\"{count}\");\n}\n";
    ws.write("src/main.rs", original);
    let session = session();

    let (project, document) = session.resolve_document(&ws.uri("src/main.rs")).unwrap();
    let outcome = session
        .difference_from_action(&project, &document, |editor| {
            let text = editor.text().replace("count", "total");
            editor.set_text(&text);
            Ok(())
        })
        .unwrap();

    assert!(outcome.is_clean());
    assert_eq!(outcome.edits.len(), 2);
    assert!(outcome.edits.iter().all(|edit| edit.new_text == "total"));
    assert_eq!(outcome.edits[0].range.start, Position::new(1, 8));

    let mut replayed = Rope::from_str(original);
    replayed.apply_text_edits(&outcome.edits).unwrap();
    assert_eq!(replayed.to_string(), original.replace("count", "total"));
    assert_eq!(document.text(), original);
}

#[test]
fn difference_from_action_with_caret_and_policy() {
    let ws = Workspace::new();
    ws.write("app.iml", "");
    ws.write("list.txt", "alpha\nbeta\n");
    let session = session();
    let (project, document) = session.resolve_document(&ws.uri("list.txt")).unwrap();

    let options = SandboxOptions {
        caret: Position::new(1, 4),
        policy: ComparisonPolicy::Exact,
    };
    let outcome = session
        .difference_from_action_with(&project, &document, options, |editor| {
            editor.type_text("s");
            editor.replace(Range::new(Position::new(0, 0), Position::new(0, 1)), "A")
        })
        .unwrap();

    assert!(outcome.is_clean());
    assert_eq!(outcome.edits.len(), 2);
    assert_eq!(outcome.edits[0].new_text, "A");
    assert_eq!(outcome.edits[1].range.start, Position::new(1, 4));
    assert_eq!(outcome.edits[1].new_text, "s");
}

#[test_log::test]
fn failed_transform_reports_error_and_releases_editor() {
    let ws = Workspace::new();
    ws.write("app.iml", "");
    ws.write("a.txt", "abc");
    let session = session();
    let (project, document) = session.resolve_document(&ws.uri("a.txt")).unwrap();

    let outcome = session
        .difference_from_action(&project, &document, |_| anyhow::bail!("lookup failed"))
        .unwrap();

    assert_eq!(outcome.transform_error.as_deref(), Some("lookup failed"));
    assert!(outcome.edits.is_empty());
    assert_eq!(session.host().live_sessions(), 0);
}
