use crate::auth::AuthService;
use crate::comments::CommentService;
use crate::config::{CommentsConfig, Config, EbooksConfig};
use crate::db::{
    CommentSort, Database, Ebook, ModerationWordUpdate, Session, Severity, User, WordCategory,
    WordFilter, now_timestamp,
};
use crate::ebooks::EbookService;
use crate::error::AppError;
use crate::formats::write_sample_pdf;
use crate::moderation::ModerationService;
use std::sync::Arc;

fn test_db() -> Database {
    Database::open_memory().unwrap()
}

fn create_user(db: &Database, id: &str, username: &str) {
    let user = User {
        id: id.to_string(),
        username: username.to_string(),
        password_hash: "hash".to_string(),
        display_name: None,
        role: "user".to_string(),
        created_at: now_timestamp(),
        last_login: None,
    };
    db.create_user(&user).unwrap();
}

fn create_ebook(db: &Database, id: &str, title: &str) {
    let ebook = Ebook {
        id: id.to_string(),
        title: title.to_string(),
        description: None,
        uploader_id: "user-1".to_string(),
        page_count: 1,
        is_blocked: false,
        block_reason: None,
        created_at: now_timestamp(),
        updated_at: now_timestamp(),
    };
    db.create_ebook(&ebook, &["Once upon a time.".to_string()])
        .unwrap();
}

/// Two users and two ebooks.
fn setup(db: &Database) {
    create_user(db, "user-1", "alice");
    create_user(db, "user-2", "bob");
    create_ebook(db, "book-1", "First Book");
    create_ebook(db, "book-2", "Second Book");
}

struct Services {
    db: Database,
    moderation: Arc<ModerationService>,
    comments: CommentService,
    ebooks: EbookService,
}

fn services() -> Services {
    let db = test_db();
    setup(&db);
    let moderation = Arc::new(ModerationService::new(db.clone()).unwrap());
    let comments = CommentService::new(
        db.clone(),
        Arc::clone(&moderation),
        CommentsConfig::default(),
    );
    let ebooks = EbookService::new(
        db.clone(),
        Arc::clone(&moderation),
        EbooksConfig::default(),
    );
    Services {
        db,
        moderation,
        comments,
        ebooks,
    }
}

// ========== DATABASE ==========

#[test]
fn db_open_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pageturn.db");

    {
        let db = Database::open(&path).unwrap();
        create_user(&db, "user-1", "alice");
    }

    let db = Database::open(&path).unwrap();
    assert!(db.get_user_by_username("alice").unwrap().is_some());
}

#[test]
fn db_duplicate_username_conflicts() {
    let db = test_db();
    create_user(&db, "user-1", "alice");

    let dup = User {
        id: "user-2".to_string(),
        username: "alice".to_string(),
        password_hash: "hash2".to_string(),
        display_name: None,
        role: "user".to_string(),
        created_at: now_timestamp(),
        last_login: None,
    };
    assert!(matches!(db.create_user(&dup), Err(AppError::Conflict(_))));
}

#[test]
fn db_delete_user_with_content_conflicts() {
    let db = test_db();
    setup(&db);
    create_user(&db, "user-3", "carol");

    assert!(matches!(db.delete_user("alice"), Err(AppError::Conflict(_))));
    assert!(db.delete_user("carol").unwrap());
    assert!(!db.delete_user("carol").unwrap());
}

#[test]
fn db_expired_sessions_cleanup() {
    let db = test_db();
    create_user(&db, "user-1", "alice");

    let expired = Session {
        token: "expired".to_string(),
        user_id: "user-1".to_string(),
        expires_at: now_timestamp() - 3600,
    };
    let valid = Session {
        token: "valid".to_string(),
        user_id: "user-1".to_string(),
        expires_at: now_timestamp() + 3600,
    };

    db.create_session(&expired).unwrap();
    db.create_session(&valid).unwrap();

    assert_eq!(db.cleanup_expired_sessions().unwrap(), 1);
    assert!(db.get_session("expired").unwrap().is_none());
    assert!(db.get_session("valid").unwrap().is_some());
}

#[test]
fn db_pages_in_order() {
    let db = test_db();
    create_user(&db, "user-1", "alice");

    let ebook = Ebook {
        id: "book-1".to_string(),
        title: "Paged".to_string(),
        description: None,
        uploader_id: "user-1".to_string(),
        page_count: 3,
        is_blocked: false,
        block_reason: None,
        created_at: now_timestamp(),
        updated_at: now_timestamp(),
    };
    let pages = vec!["one".to_string(), "two".to_string(), "three".to_string()];
    db.create_ebook(&ebook, &pages).unwrap();

    let window = db.get_pages("book-1", 1, 5).unwrap();
    let numbers: Vec<i64> = window.iter().map(|p| p.page_number).collect();
    assert_eq!(numbers, vec![2, 3]);
    assert_eq!(window[0].content, "two");
    assert_eq!(db.get_page_texts("book-1").unwrap(), pages);
}

// ========== MODERATION WORDS ==========

#[test]
fn word_create_normalizes_and_conflicts() {
    let s = services();

    let word = s
        .moderation
        .create("  BadWord ", Severity::High, WordCategory::Profanity, None, Some("user-1"))
        .unwrap();
    assert_eq!(word.word, "badword");
    assert_eq!(word.language, "en");
    assert!(word.is_active);
    assert_eq!(word.created_by.as_deref(), Some("user-1"));

    let dup = s
        .moderation
        .create("badword", Severity::Low, WordCategory::Other, None, None);
    assert!(matches!(dup, Err(AppError::Conflict(_))));
}

#[test]
fn word_empty_rejected() {
    let s = services();
    let result = s
        .moderation
        .create("   ", Severity::Low, WordCategory::Other, None, None);
    assert!(matches!(result, Err(AppError::InvalidInput(_))));
}

#[test]
fn word_soft_delete_and_readd() {
    let s = services();

    let word = s
        .moderation
        .create("spam", Severity::Medium, WordCategory::Spam, None, None)
        .unwrap();
    s.moderation.delete(word.id, Some("user-1")).unwrap();

    // Deleted words stay in the store but stop matching.
    let stored = s.moderation.get(word.id).unwrap();
    assert!(!stored.is_active);
    assert_eq!(stored.updated_by.as_deref(), Some("user-1"));
    assert!(s.moderation.validate_comment("buy spam now").is_valid);

    // Deleting again reports not found.
    assert!(matches!(
        s.moderation.delete(word.id, None),
        Err(AppError::NotFound(_))
    ));

    let again = s
        .moderation
        .create("spam", Severity::High, WordCategory::Spam, None, None)
        .unwrap();
    assert_ne!(again.id, word.id);
    assert!(!s.moderation.validate_comment("buy spam now").is_valid);

    // The old row cannot be re-activated while the new one is active.
    let reactivate = ModerationWordUpdate {
        is_active: Some(true),
        ..ModerationWordUpdate::default()
    };
    assert!(matches!(
        s.moderation.update(word.id, reactivate, None),
        Err(AppError::Conflict(_))
    ));
}

#[test]
fn word_update_changes_matching() {
    let s = services();
    let word = s
        .moderation
        .create("darn", Severity::Low, WordCategory::Profanity, None, None)
        .unwrap();
    assert!(s.moderation.validate_content("darn it").is_valid);

    let changes = ModerationWordUpdate {
        severity: Some(Severity::Critical),
        ..ModerationWordUpdate::default()
    };
    let updated = s.moderation.update(word.id, changes, Some("user-2")).unwrap();
    assert_eq!(updated.severity, Severity::Critical);
    assert_eq!(updated.word, "darn");
    assert_eq!(updated.updated_by.as_deref(), Some("user-2"));

    assert!(!s.moderation.validate_content("darn it").is_valid);
}

#[test]
fn word_update_unknown_is_not_found() {
    let s = services();
    let result = s
        .moderation
        .update(999, ModerationWordUpdate::default(), None);
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[test]
fn word_list_filters() {
    let s = services();
    s.moderation
        .create("alpha", Severity::Low, WordCategory::Spam, None, None)
        .unwrap();
    let beta = s
        .moderation
        .create("beta", Severity::High, WordCategory::Violence, None, None)
        .unwrap();
    s.moderation
        .create("gamma", Severity::High, WordCategory::Spam, None, None)
        .unwrap();
    s.moderation.delete(beta.id, None).unwrap();

    let active = s.moderation.list(&WordFilter::default()).unwrap();
    let names: Vec<&str> = active.iter().map(|w| w.word.as_str()).collect();
    assert_eq!(names, vec!["alpha", "gamma"]);

    let high = s
        .moderation
        .list(&WordFilter {
            severity: Some(Severity::High),
            include_inactive: true,
            ..WordFilter::default()
        })
        .unwrap();
    assert_eq!(high.len(), 2);

    let spam = s
        .moderation
        .list(&WordFilter {
            category: Some(WordCategory::Spam),
            ..WordFilter::default()
        })
        .unwrap();
    assert_eq!(spam.len(), 2);
}

#[test]
fn word_stats_counts_active_only() {
    let s = services();
    s.moderation
        .create("one", Severity::Low, WordCategory::Spam, None, None)
        .unwrap();
    s.moderation
        .create("two", Severity::Low, WordCategory::Profanity, None, None)
        .unwrap();
    let three = s
        .moderation
        .create("three", Severity::Critical, WordCategory::Spam, None, None)
        .unwrap();
    s.moderation.delete(three.id, None).unwrap();

    let stats = s.moderation.stats().unwrap();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.by_severity["low"], 2);
    assert_eq!(stats.by_severity["critical"], 0);
    assert_eq!(stats.by_category["spam"], 1);
    assert_eq!(stats.by_category["profanity"], 1);
    assert!(!stats.by_category.contains_key("violence"));
}

#[test]
fn moderation_reloads_from_store() {
    let db = test_db();
    let first = ModerationService::new(db.clone()).unwrap();
    first
        .create("villain", Severity::High, WordCategory::Violence, None, None)
        .unwrap();

    let second = ModerationService::new(db).unwrap();
    assert_eq!(second.active_words().len(), 1);
    assert!(!second.validate_content("the villain laughed").is_valid);
}

// ========== COMMENTS ==========

#[test]
fn comment_create_top_level_and_reply() {
    let s = services();

    let parent = s
        .comments
        .create_comment("user-1", "book-1", "  Great opening  ", None)
        .unwrap();
    assert_eq!(parent.content, "Great opening");
    assert!(parent.is_top_level());
    assert!(parent.is_active);

    let reply = s
        .comments
        .create_comment("user-2", "book-1", "Agreed", Some(&parent.id))
        .unwrap();
    assert_eq!(reply.parent_comment_id.as_deref(), Some(parent.id.as_str()));
}

#[test]
fn comment_reply_to_reply_rejected() {
    let s = services();
    let parent = s
        .comments
        .create_comment("user-1", "book-1", "Top", None)
        .unwrap();
    let reply = s
        .comments
        .create_comment("user-2", "book-1", "Reply", Some(&parent.id))
        .unwrap();

    let nested = s
        .comments
        .create_comment("user-1", "book-1", "Nested", Some(&reply.id));
    assert!(matches!(nested, Err(AppError::InvalidInput(_))));

    // Nothing was inserted.
    assert_eq!(s.comments.stats().unwrap().total, 2);
}

#[test]
fn comment_reply_across_ebooks_rejected() {
    let s = services();
    let parent = s
        .comments
        .create_comment("user-1", "book-1", "Top", None)
        .unwrap();

    let result = s
        .comments
        .create_comment("user-2", "book-2", "Wrong book", Some(&parent.id));
    assert!(matches!(result, Err(AppError::InvalidInput(_))));
    assert_eq!(s.comments.stats().unwrap().total, 1);
}

#[test]
fn comment_missing_references_not_found() {
    let s = services();

    let no_ebook = s
        .comments
        .create_comment("user-1", "missing", "Hello", None);
    assert!(matches!(no_ebook, Err(AppError::NotFound(_))));

    let no_parent = s
        .comments
        .create_comment("user-1", "book-1", "Hello", Some("missing"));
    assert!(matches!(no_parent, Err(AppError::NotFound(_))));

    let no_user = s.comments.create_comment("ghost", "book-1", "Hello", None);
    assert!(matches!(no_user, Err(AppError::NotFound(_))));
}

#[test]
fn comment_reply_to_deleted_parent_not_found() {
    let s = services();
    let parent = s
        .comments
        .create_comment("user-1", "book-1", "Top", None)
        .unwrap();
    s.comments.delete_comment(&parent.id, "user-1").unwrap();

    let result = s
        .comments
        .create_comment("user-2", "book-1", "Late reply", Some(&parent.id));
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[test]
fn comment_content_checks() {
    let s = services();

    let empty = s.comments.create_comment("user-1", "book-1", "   ", None);
    assert!(matches!(empty, Err(AppError::InvalidInput(_))));

    let long = "x".repeat(CommentsConfig::default().max_length + 1);
    let too_long = s.comments.create_comment("user-1", "book-1", &long, None);
    assert!(matches!(too_long, Err(AppError::InvalidInput(_))));
}

#[test]
fn comment_moderation_rejects_any_match() {
    let s = services();
    s.moderation
        .create("meh", Severity::Low, WordCategory::Other, None, None)
        .unwrap();

    let result = s
        .comments
        .create_comment("user-1", "book-1", "This book is MEH", None);
    match result {
        Err(AppError::ContentRejected(validation)) => {
            assert!(!validation.is_valid);
            assert_eq!(validation.matched_words(), "meh");
        }
        other => panic!("expected rejection, got {:?}", other),
    }
    assert_eq!(s.comments.stats().unwrap().total, 0);
}

#[test]
fn comment_edit_is_not_moderated() {
    let s = services();
    let comment = s
        .comments
        .create_comment("user-1", "book-1", "Fine words", None)
        .unwrap();
    s.moderation
        .create("rude", Severity::Critical, WordCategory::Profanity, None, None)
        .unwrap();

    let edited = s
        .comments
        .update_comment(&comment.id, "user-1", "Rude words")
        .unwrap();
    assert_eq!(edited.content, "Rude words");
}

#[test]
fn comment_non_owner_cannot_edit_or_delete() {
    let s = services();
    let comment = s
        .comments
        .create_comment("user-1", "book-1", "Mine", None)
        .unwrap();

    let edit = s.comments.update_comment(&comment.id, "user-2", "Hijacked");
    assert!(matches!(edit, Err(AppError::Forbidden(_))));

    let delete = s.comments.delete_comment(&comment.id, "user-2");
    assert!(matches!(delete, Err(AppError::Forbidden(_))));

    let stored = s.db.get_comment(&comment.id).unwrap().unwrap();
    assert_eq!(stored.content, "Mine");
    assert!(stored.is_active);
}

#[test]
fn comment_delete_cascades_to_replies() {
    let s = services();
    let parent = s
        .comments
        .create_comment("user-1", "book-1", "Top", None)
        .unwrap();
    let mut reply_ids = Vec::new();
    for i in 0..3 {
        let reply = s
            .comments
            .create_comment("user-2", "book-1", &format!("Reply {}", i), Some(&parent.id))
            .unwrap();
        reply_ids.push(reply.id);
    }

    assert_eq!(s.comments.delete_comment(&parent.id, "user-1").unwrap(), 4);

    for id in &reply_ids {
        assert!(!s.db.get_comment(id).unwrap().unwrap().is_active);
    }

    // Already deleted.
    let again = s.comments.delete_comment(&parent.id, "user-1");
    assert!(matches!(again, Err(AppError::NotFound(_))));
}

#[test]
fn comment_delete_reply_only_affects_reply() {
    let s = services();
    let parent = s
        .comments
        .create_comment("user-1", "book-1", "Top", None)
        .unwrap();
    let reply = s
        .comments
        .create_comment("user-2", "book-1", "Reply", Some(&parent.id))
        .unwrap();
    let sibling = s
        .comments
        .create_comment("user-1", "book-1", "Sibling", Some(&parent.id))
        .unwrap();

    assert_eq!(s.comments.delete_comment(&reply.id, "user-2").unwrap(), 1);
    assert!(s.db.get_comment(&parent.id).unwrap().unwrap().is_active);
    assert!(s.db.get_comment(&sibling.id).unwrap().unwrap().is_active);
}

#[test]
fn comment_delete_counts_only_active_replies() {
    let s = services();
    let parent = s
        .comments
        .create_comment("user-1", "book-1", "Top", None)
        .unwrap();
    let reply = s
        .comments
        .create_comment("user-2", "book-1", "Reply", Some(&parent.id))
        .unwrap();
    s.comments
        .create_comment("user-2", "book-1", "Another", Some(&parent.id))
        .unwrap();
    s.comments.delete_comment(&reply.id, "user-2").unwrap();

    assert_eq!(s.comments.delete_comment(&parent.id, "user-1").unwrap(), 2);
}

#[test]
fn comment_list_paginates_parents_with_all_replies() {
    let s = services();
    let mut parents = Vec::new();
    for i in 0..5 {
        let parent = s
            .comments
            .create_comment("user-1", "book-1", &format!("Top {}", i), None)
            .unwrap();
        parents.push(parent);
    }
    for i in 0..12 {
        s.comments
            .create_comment("user-2", "book-1", &format!("Reply {}", i), Some(&parents[4].id))
            .unwrap();
    }

    let page = s
        .comments
        .list_by_ebook("book-1", Some(1), Some(2), CommentSort::Newest)
        .unwrap();
    assert_eq!(page.pagination.total_items, 5);
    assert_eq!(page.pagination.total_pages, 3);
    assert_eq!(page.comments.len(), 2);

    // Newest first: the last parent leads with every one of its replies.
    assert_eq!(page.comments[0].comment.id, parents[4].id);
    assert_eq!(page.comments[0].replies.len(), 12);
    assert_eq!(page.comments[0].replies[0].content, "Reply 0");
    assert_eq!(page.comments[1].comment.id, parents[3].id);
    assert!(page.comments[1].replies.is_empty());

    let last = s
        .comments
        .list_by_ebook("book-1", Some(3), Some(2), CommentSort::Newest)
        .unwrap();
    assert_eq!(last.comments.len(), 1);
    assert_eq!(last.comments[0].comment.id, parents[0].id);

    let oldest = s
        .comments
        .list_by_ebook("book-1", None, None, CommentSort::Oldest)
        .unwrap();
    assert_eq!(oldest.comments[0].comment.id, parents[0].id);
    assert_eq!(oldest.pagination.page_size, 10);
}

#[test]
fn comment_list_hides_inactive_and_other_ebooks() {
    let s = services();
    let kept = s
        .comments
        .create_comment("user-1", "book-1", "Kept", None)
        .unwrap();
    let gone = s
        .comments
        .create_comment("user-1", "book-1", "Gone", None)
        .unwrap();
    let hidden_reply = s
        .comments
        .create_comment("user-2", "book-1", "Hidden", Some(&kept.id))
        .unwrap();
    s.comments
        .create_comment("user-1", "book-2", "Elsewhere", None)
        .unwrap();

    s.comments.delete_comment(&gone.id, "user-1").unwrap();
    s.comments.delete_comment(&hidden_reply.id, "user-2").unwrap();

    let page = s
        .comments
        .list_by_ebook("book-1", None, None, CommentSort::Newest)
        .unwrap();
    assert_eq!(page.pagination.total_items, 1);
    assert_eq!(page.comments.len(), 1);
    assert_eq!(page.comments[0].comment.id, kept.id);
    assert!(page.comments[0].replies.is_empty());
}

#[test]
fn comment_list_page_far_past_end_is_empty() {
    let s = services();
    s.comments
        .create_comment("user-1", "book-1", "Only one", None)
        .unwrap();

    let page = s
        .comments
        .list_by_ebook("book-1", Some(i64::MAX), Some(10), CommentSort::Newest)
        .unwrap();
    assert!(page.comments.is_empty());
    assert_eq!(page.pagination.total_items, 1);

    let window = s
        .ebooks
        .read_pages("book-1", Some(i64::MAX), Some(20), false)
        .unwrap();
    assert!(window.pages.is_empty());
}

#[test]
fn comment_list_unknown_ebook() {
    let s = services();
    let result = s
        .comments
        .list_by_ebook("missing", None, None, CommentSort::Newest);
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[test]
fn comment_concurrent_replies_stay_consistent() {
    let s = services();
    let parent = s
        .comments
        .create_comment("user-1", "book-1", "Busy thread", None)
        .unwrap();

    std::thread::scope(|scope| {
        for t in 0..4 {
            let comments = &s.comments;
            let parent_id = parent.id.clone();
            scope.spawn(move || {
                for i in 0..10 {
                    comments
                        .create_comment(
                            "user-2",
                            "book-1",
                            &format!("Reply {}-{}", t, i),
                            Some(&parent_id),
                        )
                        .unwrap();
                }
            });
        }
    });

    let page = s
        .comments
        .list_by_ebook("book-1", None, None, CommentSort::Newest)
        .unwrap();
    assert_eq!(page.comments.len(), 1);
    assert_eq!(page.comments[0].replies.len(), 40);

    assert_eq!(s.comments.delete_comment(&parent.id, "user-1").unwrap(), 41);
    let stats = s.comments.stats().unwrap();
    assert_eq!(stats.active, 0);
    assert_eq!(stats.replies, 40);
}

#[test]
fn comment_bulk_delete() {
    let s = services();
    let a = s
        .comments
        .create_comment("user-1", "book-1", "A", None)
        .unwrap();
    s.comments
        .create_comment("user-2", "book-1", "A reply", Some(&a.id))
        .unwrap();
    let b = s
        .comments
        .create_comment("user-2", "book-2", "B", None)
        .unwrap();
    let c = s
        .comments
        .create_comment("user-1", "book-2", "C", None)
        .unwrap();

    let ids = vec![a.id.clone(), b.id.clone(), "missing".to_string()];
    assert_eq!(s.comments.bulk_delete(&ids).unwrap(), 3);
    assert!(s.db.get_comment(&c.id).unwrap().unwrap().is_active);

    // Repeating changes nothing.
    assert_eq!(s.comments.bulk_delete(&ids).unwrap(), 0);

    assert!(matches!(
        s.comments.bulk_delete(&[]),
        Err(AppError::InvalidInput(_))
    ));
}

#[test]
fn comment_toggle_status_restores_thread() {
    let s = services();
    let parent = s
        .comments
        .create_comment("user-1", "book-1", "Top", None)
        .unwrap();
    let reply = s
        .comments
        .create_comment("user-2", "book-1", "Reply", Some(&parent.id))
        .unwrap();

    let hidden = s.comments.toggle_status(&parent.id, false).unwrap();
    assert!(!hidden.is_active);
    assert!(!s.db.get_comment(&reply.id).unwrap().unwrap().is_active);

    let restored = s.comments.toggle_status(&parent.id, true).unwrap();
    assert!(restored.is_active);
    assert!(s.db.get_comment(&reply.id).unwrap().unwrap().is_active);

    let page = s
        .comments
        .list_by_ebook("book-1", None, None, CommentSort::Newest)
        .unwrap();
    assert_eq!(page.comments[0].replies.len(), 1);

    assert!(matches!(
        s.comments.toggle_status("missing", true),
        Err(AppError::NotFound(_))
    ));
}

#[test]
fn comment_stats() {
    let s = services();
    let parent = s
        .comments
        .create_comment("user-1", "book-1", "Top", None)
        .unwrap();
    s.comments
        .create_comment("user-2", "book-1", "Reply", Some(&parent.id))
        .unwrap();
    let other = s
        .comments
        .create_comment("user-2", "book-2", "Other", None)
        .unwrap();
    s.comments.delete_comment(&other.id, "user-2").unwrap();

    let stats = s.comments.stats().unwrap();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.active, 2);
    assert_eq!(stats.inactive, 1);
    assert_eq!(stats.top_level, 2);
    assert_eq!(stats.replies, 1);
}

// ========== EBOOKS ==========

#[test]
fn ebook_create_from_text_paginates() {
    let s = services();
    let text = "word ".repeat(1000);
    let ebook = s
        .ebooks
        .create_from_text("user-1", " Long Book ", Some("A test"), &text)
        .unwrap();

    assert_eq!(ebook.title, "Long Book");
    assert_eq!(ebook.page_count, 3);
    assert!(!ebook.is_blocked);

    let window = s.ebooks.read_pages(&ebook.id, Some(2), None, false).unwrap();
    assert_eq!(window.pages.len(), 1);
    assert_eq!(window.pages[0].page_number, 2);
    assert_eq!(window.pagination.total_pages, 3);
}

#[test]
fn ebook_requires_title_text_and_uploader() {
    let s = services();
    assert!(matches!(
        s.ebooks.create_from_text("user-1", "  ", None, "text"),
        Err(AppError::InvalidInput(_))
    ));
    assert!(matches!(
        s.ebooks.create_from_text("user-1", "Empty", None, " \n "),
        Err(AppError::InvalidInput(_))
    ));
    assert!(matches!(
        s.ebooks.create_from_text("ghost", "Orphan", None, "text"),
        Err(AppError::NotFound(_))
    ));
}

#[test]
fn ebook_content_policy_tolerates_medium_words() {
    let s = services();
    s.moderation
        .create("gloomy", Severity::Medium, WordCategory::Other, None, None)
        .unwrap();

    let ebook = s
        .ebooks
        .create_from_text("user-1", "Weather", None, "A gloomy day.")
        .unwrap();
    assert!(!ebook.is_blocked);

    // The same word fails a comment.
    assert!(!s.moderation.validate_comment("A gloomy day.").is_valid);
}

#[test]
fn ebook_with_critical_word_is_blocked() {
    let s = services();
    s.moderation
        .create("forbidden", Severity::Critical, WordCategory::Violence, None, None)
        .unwrap();

    let ebook = s
        .ebooks
        .create_from_text("user-1", "Dark Tale", None, "The Forbidden spell.")
        .unwrap();
    assert!(ebook.is_blocked);
    assert_eq!(
        ebook.block_reason.as_deref(),
        Some("Prohibited content: forbidden")
    );

    // Hidden from readers, visible to staff.
    assert!(matches!(
        s.ebooks.get_readable(&ebook.id, false),
        Err(AppError::NotFound(_))
    ));
    assert!(s.ebooks.get_readable(&ebook.id, true).is_ok());
    assert!(s.ebooks.list(false).unwrap().iter().all(|e| e.id != ebook.id));
    assert!(s.ebooks.list(true).unwrap().iter().any(|e| e.id == ebook.id));
}

#[test]
fn ebook_screen_blocks_existing_ebook() {
    let s = services();
    s.moderation
        .create("upon", Severity::High, WordCategory::Other, None, None)
        .unwrap();

    let report = s.ebooks.screen("book-1").unwrap();
    assert!(!report.validation.is_valid);
    assert_eq!(report.validation.overall_severity, Severity::High);
    assert!(report.ebook.is_blocked);

    // Removing the word does not unblock on its own.
    let word_id = s.moderation.active_words()[0].id;
    s.moderation.delete(word_id, None).unwrap();
    let report = s.ebooks.screen("book-1").unwrap();
    assert!(report.validation.is_valid);
    assert!(report.ebook.is_blocked);

    let unblocked = s.ebooks.set_blocked("book-1", false, None).unwrap();
    assert!(!unblocked.is_blocked);
    assert!(unblocked.block_reason.is_none());
}

#[test]
fn ebook_import_text_file() {
    let s = services();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("short-story.txt");
    std::fs::write(&path, "A short story about a lighthouse.").unwrap();

    let ebook = s.ebooks.import_file("user-1", &path, None, None).unwrap();
    assert_eq!(ebook.title, "short-story");
    assert_eq!(ebook.page_count, 1);

    let unsupported = dir.path().join("book.epub");
    std::fs::write(&unsupported, "zip").unwrap();
    assert!(matches!(
        s.ebooks.import_file("user-1", &unsupported, None, None),
        Err(AppError::InvalidInput(_))
    ));
}

#[test]
fn ebook_import_pdf_file() {
    let s = services();
    let dir = tempfile::tempdir().unwrap();

    let with_info = dir.path().join("voyage.pdf");
    write_sample_pdf(
        &with_info,
        &["The ship left at dawn.", "Land was sighted at noon."],
        Some(("The Voyage", "A short sea story")),
    )
    .unwrap();

    let ebook = s.ebooks.import_file("user-1", &with_info, None, None).unwrap();
    assert_eq!(ebook.title, "The Voyage");
    assert_eq!(ebook.description.as_deref(), Some("A short sea story"));
    assert_eq!(ebook.page_count, 2);
    assert!(!ebook.is_blocked);

    let renamed = s
        .ebooks
        .import_file("user-1", &with_info, Some("Sea Story"), Some("Retitled"))
        .unwrap();
    assert_eq!(renamed.title, "Sea Story");
    assert_eq!(renamed.description.as_deref(), Some("Retitled"));

    let without_info = dir.path().join("ship-log.pdf");
    write_sample_pdf(&without_info, &["Day one at sea."], None).unwrap();
    let ebook = s.ebooks.import_file("user-1", &without_info, None, None).unwrap();
    assert_eq!(ebook.title, "ship-log");
    assert!(ebook.description.is_none());
    assert_eq!(ebook.page_count, 1);
}

// ========== AUTH ==========

#[test]
fn auth_create_user_and_login() {
    let db = test_db();
    let auth = AuthService::new(db, 30, true);

    auth.create_user("alice", "password123", "user").unwrap();
    let (user, token) = auth.login("alice", "password123").unwrap();
    assert_eq!(user.username, "alice");

    let found = auth.validate_token(&token).unwrap().unwrap();
    assert_eq!(found.id, user.id);

    auth.logout(&token).unwrap();
    assert!(auth.validate_token(&token).unwrap().is_none());
}

#[test]
fn auth_invalid_password() {
    let db = test_db();
    let auth = AuthService::new(db, 30, true);
    auth.create_user("alice", "password123", "user").unwrap();

    assert!(matches!(
        auth.login("alice", "wrong"),
        Err(AppError::Unauthorized(_))
    ));
    assert!(matches!(
        auth.login("nobody", "password123"),
        Err(AppError::Unauthorized(_))
    ));
}

#[test]
fn auth_registration_disabled() {
    let db = test_db();
    let auth = AuthService::new(db, 30, false);
    assert!(matches!(
        auth.register("alice", "password123"),
        Err(AppError::Forbidden(_))
    ));
}

#[test]
fn auth_rejects_bad_input() {
    let db = test_db();
    let auth = AuthService::new(db, 30, true);

    assert!(auth.create_user("bad name", "password123", "user").is_err());
    assert!(auth.create_user("alice", "abc", "user").is_err());
    assert!(auth.create_user("alice", "password123", "superuser").is_err());
}

#[test]
fn auth_change_password() {
    let db = test_db();
    let auth = AuthService::new(db, 30, true);
    auth.create_user("alice", "oldpass", "user").unwrap();

    assert!(auth.change_password("alice", "newpass").unwrap());
    assert!(auth.login("alice", "oldpass").is_err());
    assert!(auth.login("alice", "newpass").is_ok());
    assert!(!auth.change_password("nobody", "newpass").unwrap());
}

#[test]
fn auth_roles() {
    let db = test_db();
    let auth = AuthService::new(db, 30, true);

    let admin = auth.create_user("admin", "password", "admin").unwrap();
    let moderator = auth.create_user("mod", "password", "moderator").unwrap();
    let user = auth.create_user("user", "password", "user").unwrap();

    assert!(auth.is_admin(&admin));
    assert!(!auth.is_admin(&moderator));
    assert!(auth.is_staff(&admin));
    assert!(auth.is_staff(&moderator));
    assert!(!auth.is_staff(&user));
    assert!(matches!(
        auth.require_staff(&user),
        Err(AppError::Forbidden(_))
    ));
}

// ========== CONFIG ==========

#[test]
fn config_parse_toml() {
    let toml = r#"
[server]
bind = "127.0.0.1:9000"
title = "Reading Room"

[database]
path = "/tmp/test.db"

[comments]
max_length = 500
default_page_size = 5

[ebooks]
screen_on_upload = false
"#;

    let config: Config = toml::from_str(toml).unwrap();
    assert_eq!(config.server.bind.port(), 9000);
    assert_eq!(config.server.title, "Reading Room");
    assert_eq!(config.comments.max_length, 500);
    assert_eq!(config.comments.default_page_size, 5);
    assert_eq!(config.comments.max_page_size, 50);
    assert!(!config.ebooks.screen_on_upload);
    assert_eq!(config.ebooks.chars_per_page, 2000);
    assert!(config.auth.registration_enabled());
}

#[test]
fn config_default_file_parses() {
    let config: Config = toml::from_str(&Config::generate_default()).unwrap();
    assert_eq!(config.server.bind.port(), 8080);
    assert_eq!(config.auth.session_days, 30);
    assert!(config.ebooks.screen_on_upload);
}
