use feedcaster_core::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;
use std::cell::RefCell;
use std::collections::HashSet;
use tempfile::tempdir;

/// Records every call; fails the post whose 1-based position is `fail_at`.
#[derive(Default)]
struct FakeInstance {
    account: String,
    fail_at: Option<usize>,
    posted: RefCell<Vec<String>>,
    uploads: RefCell<Vec<MediaRequest>>,
}

impl FakeInstance {
    fn for_account(account: &str) -> Self {
        Self {
            account: account.to_string(),
            ..Default::default()
        }
    }

    fn collaborators(&self) -> Collaborators<'_> {
        Collaborators {
            poster: self,
            uploader: self,
            identity: self,
        }
    }
}

impl Poster for FakeInstance {
    fn post(&self, text: &str, _media_ids: &[String]) -> std::result::Result<(), CollaboratorError> {
        let attempt = self.posted.borrow().len() + 1;
        if self.fail_at == Some(attempt) {
            return Err(CollaboratorError::new("post", "422", "Validation failed"));
        }
        self.posted.borrow_mut().push(text.to_string());
        Ok(())
    }
}

impl MediaUploader for FakeInstance {
    fn upload(&self, request: &MediaRequest) -> Result<String> {
        self.uploads.borrow_mut().push(request.clone());
        Ok(format!("m{}", self.uploads.borrow().len()))
    }
}

impl AccountLookup for FakeInstance {
    fn authenticated_account(&self) -> std::result::Result<String, CollaboratorError> {
        Ok(self.account.clone())
    }
}

fn open_weights() -> AdmissionWeights {
    AdmissionWeights {
        media: 1.0,
        urls: 1.0,
        mentions: 1.0,
        base: 1.0,
    }
}

fn post(id: &str) -> PreparedPost {
    PreparedPost {
        candidate_id: id.to_string(),
        text: format!("post {}", id),
        media: Vec::new(),
    }
}

// ── Feed Source ──────────────────────────────────────────────────────────────

fn feed_pipeline() -> Pipeline {
    let mut config = PipelineConfig::new()
        .with_filter(FilterConfig::new().with_weights(open_weights()))
        .with_compose(
            ComposeConfig::new("{title} {link}")
                .with_variable(TemplateVariable::path("{title}", "data.title").truncatable())
                .with_variable(
                    TemplateVariable::path("{link}", "data.permalink").with_prefix("https://redd.it"),
                ),
        )
        .with_feed(
            FeedConfig::default()
                .with_root_node("data.children")
                .with_timestamp_field("data.created_utc"),
        );
    config.candidate = CandidateFields {
        id: Some("data.id".into()),
        body: "data.title".into(),
        author: Some("data.author".into()),
        links: None,
        media: None,
        ..Default::default()
    };
    Pipeline::new("mybot", SourceKind::Feed, config).unwrap()
}

fn listing(items: &[(&str, u64)]) -> serde_json::Value {
    let children: Vec<_> = items
        .iter()
        .map(|(id, ts)| {
            json!({"data": {"id": id, "title": format!("Title {}", id), "author": "someone",
                            "permalink": format!("/r/x/{}/", id), "created_utc": ts}})
        })
        .collect();
    json!({"data": {"children": children}})
}

#[test]
fn test_feed_cursor_survives_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("mybot.json");
    let pipeline = feed_pipeline();

    {
        let mut store = JsonStateStore::open(&path).unwrap();
        let first = pipeline
            .feed_candidates(&mut store, &listing(&[("a", 10), ("b", 11)]))
            .unwrap();
        assert_eq!(first.len(), 2);
    }

    let mut store = JsonStateStore::open(&path).unwrap();
    let second = pipeline
        .feed_candidates(&mut store, &listing(&[("a", 10), ("b", 11), ("c", 12)]))
        .unwrap();
    let ids: Vec<_> = second.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["c"]);
    assert_eq!(store.get(LAST_MAX_TIMESTAMP_KEY).unwrap(), Some(json!(12)));
}

#[test]
fn test_feed_mentions_are_neutralized() {
    let pipeline = feed_pipeline();
    let doc = json!({"data": {"children": [
        {"data": {"id": "m", "title": "ping @friend", "author": "someone",
                  "permalink": "/r/x/m/", "created_utc": 1}}
    ]}});
    let mut store = MemoryStateStore::new();
    let candidates = pipeline.feed_candidates(&mut store, &doc).unwrap();
    let prepared = pipeline
        .prepare_with(candidates, None, None, &mut StdRng::seed_from_u64(7))
        .unwrap();

    assert_eq!(prepared.len(), 1);
    assert_eq!(prepared[0].text, "ping @\\friend https://redd.it/r/x/m/");
}

// ── Records Source ───────────────────────────────────────────────────────────

#[test]
fn test_records_file_end_to_end() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("quotes.json");
    std::fs::write(
        &path,
        json!([
            {"id": "1", "text": "Thanks @friend", "who": "Ada"},
            {"id": "2", "text": "cc @fan@mybot", "who": "Bob"},
            {"id": "3", "text": "", "who": "Eve"}
        ])
        .to_string(),
    )
    .unwrap();

    let mut config = PipelineConfig::new()
        .with_filter(FilterConfig::new().with_weights(open_weights()))
        .with_compose(
            ComposeConfig::new("{text} ({who})")
                .with_variable(TemplateVariable::field("{text}", "text").truncatable())
                .with_variable(TemplateVariable::field("{who}", "who").with_default("anon")),
        );
    config.candidate = CandidateFields {
        author: None,
        links: None,
        media: None,
        ..Default::default()
    };
    let pipeline = Pipeline::new("mybot", SourceKind::Records, config).unwrap();

    let candidates = pipeline.candidates(read_records(&path).unwrap()).unwrap();
    let prepared = pipeline
        .prepare_with(candidates, None, None, &mut StdRng::seed_from_u64(1))
        .unwrap();

    // Own account mention dropped by the filter chain.
    let texts: Vec<_> = prepared.iter().map(|p| p.text.as_str()).collect();
    assert!(texts.contains(&"Thanks #friend (Ada)"));
    assert!(!texts.iter().any(|t| t.contains("mybot")));

    let instance = FakeInstance::for_account("mybot");
    let report = pipeline.publish(&prepared, &instance.collaborators()).unwrap();
    assert!(report.is_success());
    assert_eq!(report.posted, prepared.len());
}

#[test]
fn test_missing_records_file_posts_nothing() {
    let dir = tempdir().unwrap();
    let records = read_records(&dir.path().join("absent.json")).unwrap();
    assert!(records.is_empty());
}

// ── Folder Source ────────────────────────────────────────────────────────────

fn folder_fixture() -> tempfile::TempDir {
    let dir = tempdir().unwrap();
    let root = dir.path().join("content");
    std::fs::create_dir_all(root.join("cats")).unwrap();
    std::fs::write(root.join("cats/tabby.png"), b"png").unwrap();
    std::fs::write(root.join("cats/calico.mp4"), b"mp4").unwrap();
    std::fs::write(root.join("dog.jpg"), b"jpg").unwrap();
    dir
}

fn folder_pipeline(root: &std::path::Path) -> (Pipeline, IndexConfig) {
    let index = IndexConfig::new().with_folder(root);
    let config = PipelineConfig::new()
        .with_index(index.clone())
        .with_compose(
            ComposeConfig::new("{name} from {dir}")
                .with_variable(TemplateVariable::field("{name}", "basename"))
                .with_variable(TemplateVariable::field("{dir}", "dirname")),
        );
    (Pipeline::new("mybot", SourceKind::Folder, config).unwrap(), index)
}

#[test]
fn test_folder_cycles_through_every_file() {
    let dir = folder_fixture();
    let root = dir.path().join("content");
    let state = dir.path().join("mybot.json");
    let (pipeline, index) = folder_pipeline(&root);
    let mut rng = StdRng::seed_from_u64(42);

    let mut seen = HashSet::new();
    for _ in 0..3 {
        let mut store = JsonStateStore::open(&state).unwrap();
        let mut library = ContentLibrary::open(&mut store, index.clone(), chrono::Utc::now()).unwrap();
        let post = pipeline
            .next_from_folder(&mut library, None, &mut rng)
            .unwrap()
            .unwrap();
        assert_eq!(post.media.len(), 1);
        seen.insert(post.candidate_id);
    }
    assert_eq!(seen.len(), 3);

    let store = JsonStateStore::open(&state).unwrap();
    let persisted: ContentIndex = load_state(&store, INDEX_STATE_KEY).unwrap().unwrap();
    assert!(persisted.entries().iter().all(|e| e.count == 1));
}

#[test]
fn test_folder_video_and_scope() {
    let dir = folder_fixture();
    let root = dir.path().join("content");
    let (pipeline, index) = folder_pipeline(&root);
    let mut store = MemoryStateStore::new();
    let mut library = ContentLibrary::open(&mut store, index, chrono::Utc::now()).unwrap();
    let mut rng = StdRng::seed_from_u64(3);

    let mut kinds = Vec::new();
    for _ in 0..2 {
        let post = pipeline
            .next_from_folder(&mut library, Some("cats/"), &mut rng)
            .unwrap()
            .unwrap();
        assert!(post.candidate_id.starts_with("cats/"));
        assert!(post.text.ends_with("from cats"));
        kinds.push((post.candidate_id, post.media[0].kind));
    }
    assert!(kinds.contains(&("cats/calico.mp4".to_string(), MediaKind::Video)));
    assert!(kinds.contains(&("cats/tabby.png".to_string(), MediaKind::Image)));
}

#[test]
fn test_rehearsal_leaves_persisted_state_alone() {
    let dir = folder_fixture();
    let root = dir.path().join("content");
    let state = dir.path().join("mybot.json");
    let (pipeline, index) = folder_pipeline(&root);

    let disk = JsonStateStore::open(&state).unwrap();
    let mut scratch =
        MemoryStateStore::snapshot(&disk, &[INDEX_STATE_KEY, LAST_MAX_TIMESTAMP_KEY]).unwrap();
    let mut library = ContentLibrary::open(&mut scratch, index, chrono::Utc::now()).unwrap();
    let post = pipeline
        .next_from_folder(&mut library, None, &mut StdRng::seed_from_u64(9))
        .unwrap();
    assert!(post.is_some());

    let reopened = JsonStateStore::open(&state).unwrap();
    assert_eq!(reopened.get(INDEX_STATE_KEY).unwrap(), None);
}

// ── Publishing ───────────────────────────────────────────────────────────────

#[test]
fn test_batch_stops_at_first_failure() {
    let pipeline = feed_pipeline();
    let instance = FakeInstance {
        account: "mybot".into(),
        fail_at: Some(2),
        ..Default::default()
    };

    let report = pipeline
        .publish(&[post("a"), post("b"), post("c")], &instance.collaborators())
        .unwrap();

    assert_eq!(report.posted, 1);
    assert_eq!(report.skipped, 1);
    let (failed, err) = report.failure.unwrap();
    assert_eq!(failed, "b");
    assert_eq!(err.code, "422");
    assert_eq!(*instance.posted.borrow(), vec!["post a".to_string()]);
}

#[test]
fn test_identity_accepts_leading_at() {
    let pipeline = feed_pipeline();
    let instance = FakeInstance::for_account("@MyBot");
    let report = pipeline.publish(&[post("a")], &instance.collaborators()).unwrap();
    assert_eq!(report.posted, 1);
}

#[test]
fn test_empty_batch_skips_identity_check() {
    let pipeline = feed_pipeline();
    let instance = FakeInstance::for_account("somebody-else");
    let report = pipeline.publish(&[], &instance.collaborators()).unwrap();
    assert_eq!(report.posted, 0);
    assert!(report.failure.is_none());
}
