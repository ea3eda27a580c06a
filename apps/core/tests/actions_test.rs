use tabseek_core::actions::{
    execute, open_group_tab, perform, perform_many, validate_edit, ActionError, ItemAction,
};
use tabseek_core::discovery::{BrowserSource, MemoryBrowser, Navigation};
use tabseek_core::model::{SearchableItem, TabGroup};

const NOW: i64 = 1_750_000_000_000;

#[tokio::test]
async fn opening_a_bookmark_opens_its_url() {
    let browser = MemoryBrowser::deterministic_fixture(NOW);
    let item = SearchableItem::bookmark("10", "GitHub", "https://github.com/");

    let outcome = perform(&browser, &item, &ItemAction::Open { new_tab: true }).await;

    assert!(outcome.success, "{}", outcome.message);
    assert_eq!(
        browser.navigations(),
        vec![Navigation::OpenedUrl {
            url: "https://github.com/".into(),
            new_tab: true
        }]
    );
}

#[tokio::test]
async fn opening_a_tab_activates_it_unless_new_tab_requested() {
    let browser = MemoryBrowser::deterministic_fixture(NOW);
    let tab = SearchableItem::tab(7, 1, "Inbox", "https://mail.example.com/");

    assert!(perform(&browser, &tab, &ItemAction::Open { new_tab: false }).await.success);
    assert!(perform(&browser, &tab, &ItemAction::Open { new_tab: true }).await.success);

    assert_eq!(
        browser.navigations(),
        vec![
            Navigation::ActivatedTab {
                tab_id: 7,
                window_id: 1
            },
            Navigation::OpenedUrl {
                url: "https://mail.example.com/".into(),
                new_tab: true
            },
        ]
    );
    assert!(browser.snapshot().tabs.iter().any(|tab| tab.id == 7 && tab.active));
}

#[tokio::test]
async fn editing_a_bookmark_updates_title_and_url() {
    let browser = MemoryBrowser::deterministic_fixture(NOW);
    let item = SearchableItem::bookmark("20", "Rust Docs", "https://doc.rust-lang.org/");

    let action = ItemAction::Edit {
        title: "  Std Docs ".into(),
        url: "https://doc.rust-lang.org/std/".into(),
    };
    let outcome = perform(&browser, &item, &action).await;
    assert!(outcome.success, "{}", outcome.message);

    let snapshot = browser.snapshot();
    let edited = &snapshot.bookmarks[0].children[1].children[0];
    assert_eq!(edited.title, "Std Docs");
    assert_eq!(edited.url.as_deref(), Some("https://doc.rust-lang.org/std/"));
}

#[tokio::test]
async fn invalid_edit_is_reported_without_touching_the_bookmark() {
    let browser = MemoryBrowser::deterministic_fixture(NOW);
    let item = SearchableItem::bookmark("20", "Rust Docs", "https://doc.rust-lang.org/");

    let action = ItemAction::Edit {
        title: "Docs".into(),
        url: "not a url".into(),
    };
    let outcome = perform(&browser, &item, &action).await;

    assert!(!outcome.success);
    assert!(outcome.message.contains("invalid url"));
    assert_eq!(browser.snapshot().bookmarks[0].children[1].children[0].title, "Rust Docs");
}

#[tokio::test]
async fn edit_is_unsupported_outside_bookmarks() {
    let browser = MemoryBrowser::deterministic_fixture(NOW);
    let item = SearchableItem::history("h1", "News", "https://news.example.com/");
    let action = ItemAction::Edit {
        title: "News".into(),
        url: "https://news.example.com/".into(),
    };

    let error = execute(&browser, &item, &action).await.expect_err("edit should fail");
    assert!(matches!(error, ActionError::Unsupported { .. }));
}

#[tokio::test]
async fn delete_routes_to_each_source() {
    let browser = MemoryBrowser::deterministic_fixture(NOW);

    let bookmark = SearchableItem::bookmark("11", "Old Site", "https://old.example.com/");
    let tab = SearchableItem::tab(8, 1, "Crates", "https://crates.io/");
    let history = SearchableItem::history("h1", "News", "https://news.example.com/");
    let download = SearchableItem::download(31, "/home/user/Downloads/Q4_Report.pdf", NOW);

    for item in [&bookmark, &tab, &history, &download] {
        let outcome = perform(&browser, item, &ItemAction::Delete).await;
        assert!(outcome.success, "{}", outcome.message);
    }

    let snapshot = browser.snapshot();
    assert_eq!(snapshot.bookmarks[0].children[0].children.len(), 1);
    assert!(snapshot.tabs.iter().all(|tab| tab.id != 8));
    assert!(snapshot.history.is_empty());
    assert!(snapshot.downloads.is_empty());
}

#[tokio::test]
async fn deleting_a_missing_item_fails_softly() {
    let browser = MemoryBrowser::deterministic_fixture(NOW);
    let ghost = SearchableItem::tab(99, 1, "Ghost", "https://ghost.example.com/");

    let outcome = perform(&browser, &ghost, &ItemAction::Delete).await;

    assert!(!outcome.success);
    assert!(outcome.message.contains("not found"));
}

#[tokio::test]
async fn incognito_and_copy_link_use_the_item_url() {
    let browser = MemoryBrowser::deterministic_fixture(NOW);
    let item = SearchableItem::bookmark("10", "GitHub", "https://github.com/");

    let outcome = perform(&browser, &item, &ItemAction::OpenIncognito).await;
    assert!(outcome.success, "{}", outcome.message);
    assert_eq!(outcome.message, "Opened 'GitHub' in an incognito window");
    assert_eq!(
        browser.navigations(),
        vec![Navigation::OpenedIncognito("https://github.com/".into())]
    );

    let outcome = perform(&browser, &item, &ItemAction::CopyLink).await;
    assert!(outcome.success, "{}", outcome.message);
    assert_eq!(browser.clipboard().as_deref(), Some("https://github.com/"));

    let download = SearchableItem::download(31, "/home/user/Downloads/Q4_Report.pdf", NOW);
    let outcome = perform(&browser, &download, &ItemAction::CopyLink).await;
    assert!(!outcome.success);
    assert!(outcome.message.contains("no url"));
}

#[tokio::test]
async fn batch_copy_writes_one_clipboard_entry() {
    let browser = MemoryBrowser::deterministic_fixture(NOW);
    let items = vec![
        SearchableItem::bookmark("10", "GitHub", "https://github.com/"),
        SearchableItem::history("h1", "News", "https://news.example.com/"),
        SearchableItem::download(31, "/home/user/Downloads/Q4_Report.pdf", NOW),
    ];

    let outcome = perform_many(&browser, &items, &ItemAction::CopyLink).await;

    assert_eq!((outcome.succeeded, outcome.failed), (2, 1));
    assert_eq!(outcome.message, "Copied 2 links");
    assert_eq!(
        browser.clipboard().as_deref(),
        Some("https://github.com/\nhttps://news.example.com/")
    );
}

#[tokio::test]
async fn batch_open_and_delete_count_each_item() {
    let browser = MemoryBrowser::deterministic_fixture(NOW);
    let bookmarks = vec![
        SearchableItem::bookmark("10", "GitHub", "https://github.com/"),
        SearchableItem::bookmark("11", "Old Site", "https://old.example.com/"),
    ];

    let opened = perform_many(&browser, &bookmarks, &ItemAction::Open { new_tab: true }).await;
    assert_eq!(opened.succeeded, 2);
    assert_eq!(opened.message, "open succeeded for 2 of 2 items");
    assert_eq!(browser.navigations().len(), 2);

    let mut doomed = bookmarks.clone();
    doomed.push(SearchableItem::bookmark("404", "Ghost", "https://ghost.example.com/"));
    let deleted = perform_many(&browser, &doomed, &ItemAction::Delete).await;
    assert_eq!((deleted.succeeded, deleted.failed), (2, 1));
    assert!(browser.snapshot().bookmarks[0].children[0].children.is_empty());
}

#[tokio::test]
async fn batch_edit_is_rejected_without_side_effects() {
    let browser = MemoryBrowser::deterministic_fixture(NOW);
    let items = vec![SearchableItem::bookmark("20", "Rust Docs", "https://doc.rust-lang.org/")];
    let action = ItemAction::Edit {
        title: "Docs".into(),
        url: "https://docs.rs/".into(),
    };

    let outcome = perform_many(&browser, &items, &action).await;

    assert_eq!((outcome.succeeded, outcome.failed), (0, 1));
    assert_eq!(browser.snapshot().bookmarks[0].children[1].children[0].title, "Rust Docs");
}

async fn fixture_groups(browser: &MemoryBrowser) -> Vec<TabGroup> {
    browser.query_tab_groups().await.expect("fixture groups")
}

#[tokio::test]
async fn open_group_tab_switches_to_the_live_tab() {
    let browser = MemoryBrowser::deterministic_fixture(NOW);
    let groups = fixture_groups(&browser).await;

    let outcome = open_group_tab(&browser, &groups[0], 1, true).await;

    assert!(outcome.success, "{}", outcome.message);
    assert_eq!(outcome.message, "Switched to 'Crates'");
    assert_eq!(
        browser.navigations(),
        vec![Navigation::ActivatedTab {
            tab_id: 8,
            window_id: 1
        }]
    );
}

#[tokio::test]
async fn saved_group_restores_every_tab_when_enabled() {
    let browser = MemoryBrowser::deterministic_fixture(NOW);
    let groups = fixture_groups(&browser).await;

    let outcome = open_group_tab(&browser, &groups[1], 1, true).await;

    assert_eq!(outcome.message, "Restored 2 tabs of 'Reading'");
    assert_eq!(
        browser.navigations(),
        vec![
            Navigation::OpenedUrl {
                url: "https://blog.rust-lang.org/".into(),
                new_tab: true
            },
            Navigation::OpenedUrl {
                url: "https://this-week-in-rust.org/".into(),
                new_tab: true
            },
        ]
    );
}

#[tokio::test]
async fn saved_group_opens_only_the_clicked_tab_when_disabled() {
    let browser = MemoryBrowser::deterministic_fixture(NOW);
    let groups = fixture_groups(&browser).await;

    let outcome = open_group_tab(&browser, &groups[1], 1, false).await;

    assert_eq!(outcome.message, "Opened 'This Week in Rust'");
    assert_eq!(
        browser.navigations(),
        vec![Navigation::OpenedUrl {
            url: "https://this-week-in-rust.org/".into(),
            new_tab: false
        }]
    );

    let missing = open_group_tab(&browser, &groups[1], 5, false).await;
    assert!(!missing.success);
    assert!(missing.message.contains("no tab at position 5"));
}

#[test]
fn edit_validation_rejects_blank_fields() {
    assert!(matches!(validate_edit("", "https://a.io"), Err(ActionError::EmptyTitle)));
    assert!(matches!(validate_edit("A", "   "), Err(ActionError::EmptyUrl)));
}
