//! Integration tests for the lexicon repository.
//!
//! These exercise the repository through its public surface: cached views
//! must always agree with a fresh run of their query, whatever sequence of
//! writes happened in between.

use std::cell::RefCell;
use std::rc::Rc;

use lexicon_repository::query::fields::{
    FORM, GLOSS, GLOSS_WRITING_SYSTEM, HAS_HOMOGRAPH, HOMOGRAPH_NUMBER,
};
use lexicon_repository::{
    EntryEvent, LanguageForm, LexEntry, LexEntryRepository, LexSense, LexiconError, MatchOptions,
    MemoryEntryStore, Query, RecordToken, ResultSet, SortRules, WritingSystem,
};
use pretty_assertions::assert_eq;
use uuid::Uuid;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

fn vernacular() -> WritingSystem {
    WritingSystem::new("v")
}

fn repository() -> LexEntryRepository<MemoryEntryStore> {
    init_tracing();
    LexEntryRepository::new(MemoryEntryStore::new())
}

fn add_entry(repo: &LexEntryRepository<MemoryEntryStore>, form: &str) -> LexEntry {
    let mut entry = repo.create_item().unwrap();
    if !form.is_empty() {
        entry.set_lexical_form("v", form);
    }
    repo.save_item(&mut entry).unwrap();
    entry
}

fn forms(results: &ResultSet) -> Vec<Option<&str>> {
    results.iter().map(|t| t.text(FORM)).collect()
}

fn homographs(results: &ResultSet) -> Vec<(bool, i64)> {
    results
        .iter()
        .map(|t| {
            (
                t[HAS_HOMOGRAPH].as_bool().unwrap(),
                t[HOMOGRAPH_NUMBER].as_int().unwrap(),
            )
        })
        .collect()
}

/// Rows with the homograph fields dropped, as a fresh headword query yields.
fn without_homographs(results: &ResultSet) -> Vec<RecordToken> {
    results
        .iter()
        .map(|t| {
            t.fields()
                .iter()
                .filter(|(name, _)| *name != HAS_HOMOGRAPH && *name != HOMOGRAPH_NUMBER)
                .fold(RecordToken::new(t.repository_id()), |row, (name, value)| {
                    row.with_field(name.clone(), value.clone())
                })
        })
        .collect()
}

fn record_events(repo: &LexEntryRepository<MemoryEntryStore>) -> Rc<RefCell<Vec<EntryEvent>>> {
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = events.clone();
    repo.on_entry_event(move |event| sink.borrow_mut().push(event.clone()));
    events
}

#[test]
fn test_homograph_numbering() {
    let repo = repository();
    let ws = vernacular();
    let entries: Vec<LexEntry> = ["zo", "ba", "ba", "ba"]
        .into_iter()
        .map(|form| add_entry(&repo, form))
        .collect();

    let results = repo.get_all_entries_sorted_by_headword(&ws).unwrap();
    assert_eq!(
        forms(&results),
        vec![Some("ba"), Some("ba"), Some("ba"), Some("zo")]
    );
    assert_eq!(
        homographs(&results),
        vec![(true, 1), (true, 2), (true, 3), (false, 1)]
    );

    assert_eq!(repo.get_homograph_number(&entries[0], &ws).unwrap(), 0);
    assert_eq!(repo.get_homograph_number(&entries[1], &ws).unwrap(), 1);
    assert_eq!(repo.get_homograph_number(&entries[3], &ws).unwrap(), 3);
}

#[test]
fn test_homographs_follow_edits() {
    let repo = repository();
    let ws = vernacular();
    let first = add_entry(&repo, "ba");
    let mut second = add_entry(&repo, "ba");
    assert_eq!(repo.get_homograph_number(&first, &ws).unwrap(), 1);

    second.set_lexical_form("v", "bo");
    repo.save_item(&mut second).unwrap();

    let results = repo.get_all_entries_sorted_by_headword(&ws).unwrap();
    assert_eq!(homographs(&results), vec![(false, 1), (false, 1)]);
    assert_eq!(repo.get_homograph_number(&first, &ws).unwrap(), 0);
}

#[test]
fn test_citation_form_is_the_headword() {
    let repo = repository();
    let ws = vernacular();
    let mut entry = repo.create_item().unwrap();
    entry.set_lexical_form("v", "banana");
    entry.set_citation_form("v", "ba");
    repo.save_item(&mut entry).unwrap();
    add_entry(&repo, "ba");

    let results = repo.get_all_entries_sorted_by_headword(&ws).unwrap();
    assert_eq!(homographs(&results), vec![(true, 1), (true, 2)]);
}

#[test]
fn test_entries_without_headword_are_never_homographs() {
    let repo = repository();
    let ws = vernacular();
    let blank = add_entry(&repo, "");
    add_entry(&repo, "");
    add_entry(&repo, "ba");

    let results = repo.get_all_entries_sorted_by_headword(&ws).unwrap();
    assert_eq!(forms(&results), vec![None, None, Some("ba")]);
    assert_eq!(homographs(&results), vec![(false, 0), (false, 0), (false, 1)]);
    assert_eq!(repo.get_homograph_number(&blank, &ws).unwrap(), 0);
}

#[test]
fn test_delete_then_read_drops_rows() {
    let repo = repository();
    let ws = vernacular();
    let doomed = add_entry(&repo, "ba");
    let kept = add_entry(&repo, "zo");
    repo.get_all_entries_sorted_by_headword(&ws).unwrap();
    repo.get_all_entries_sorted_by_lexical_form(&ws).unwrap();

    repo.delete_item(&doomed).unwrap();

    let headwords = repo.get_all_entries_sorted_by_headword(&ws).unwrap();
    let lexical_forms = repo.get_all_entries_sorted_by_lexical_form(&ws).unwrap();
    assert!(headwords.find_first(&doomed).is_none());
    assert!(lexical_forms.find_first(&doomed).is_none());
    assert_eq!(lexical_forms.repository_ids(), vec![kept.repository_id()]);
    assert!(matches!(
        repo.get_item(doomed.repository_id()),
        Err(LexiconError::NotFound(_))
    ));
    assert!(matches!(
        repo.get_homograph_number(&doomed, &ws),
        Err(LexiconError::NotFound(_))
    ));
}

#[test]
fn test_delete_by_id_uses_unknown_label() {
    let repo = repository();
    let entry = add_entry(&repo, "ba");
    let events = record_events(&repo);

    repo.delete_item_by_id(entry.repository_id()).unwrap();
    assert_eq!(*events.borrow(), vec![EntryEvent::deleted("?")]);
    assert_eq!(repo.count_all_items(), 0);

    assert!(matches!(
        repo.delete_item_by_id(entry.repository_id()),
        Err(LexiconError::NotFound(_))
    ));
}

#[test]
fn test_delete_all_clears_every_view() {
    let repo = repository();
    let ws = vernacular();
    add_entry(&repo, "ba");
    add_entry(&repo, "zo");
    repo.get_all_entries_sorted_by_lexical_form(&ws).unwrap();

    repo.delete_all_items().unwrap();
    assert!(repo.get_all_entries_sorted_by_lexical_form(&ws).unwrap().is_empty());
    assert_eq!(repo.cache_stats().total_rows, 0);
}

#[test]
fn test_save_emits_modified_with_first_alternative() {
    let repo = repository();
    let events = record_events(&repo);

    let mut entry = repo.create_item().unwrap();
    entry.set_lexical_form("en", "apple");
    entry.set_lexical_form("v", "ba");
    repo.save_item(&mut entry).unwrap();

    let mut unnamed = repo.create_item().unwrap();
    repo.save_item(&mut unnamed).unwrap();

    assert_eq!(
        *events.borrow(),
        vec![EntryEvent::modified("apple"), EntryEvent::modified("?")]
    );
}

#[test]
fn test_saving_clean_entry_does_nothing() {
    let repo = repository();
    let mut entry = add_entry(&repo, "ba");
    let events = record_events(&repo);
    let before = repo.last_modified();

    repo.save_item(&mut entry).unwrap();
    assert!(events.borrow().is_empty());
    assert_eq!(repo.last_modified(), before);
}

#[test]
fn test_reentrant_save_is_ignored() {
    let repo = Rc::new(repository());
    let mut other = repo.create_item().unwrap();
    other.set_lexical_form("v", "zo");
    let pending = Rc::new(RefCell::new(other));

    let events = Rc::new(RefCell::new(Vec::new()));
    let weak = Rc::downgrade(&repo);
    let (sink, inner) = (events.clone(), pending.clone());
    repo.on_entry_event(move |event| {
        sink.borrow_mut().push(event.clone());
        if let Some(repo) = weak.upgrade() {
            repo.save_item(&mut inner.borrow_mut()).unwrap();
        }
    });

    let mut entry = repo.create_item().unwrap();
    entry.set_lexical_form("v", "ba");
    repo.save_item(&mut entry).unwrap();

    assert_eq!(*events.borrow(), vec![EntryEvent::modified("ba")]);
    assert!(pending.borrow().is_dirty());

    // Outside of a running save it goes through.
    let mut later = pending.borrow().clone();
    repo.save_item(&mut later).unwrap();
    assert!(!later.is_dirty());
    assert_eq!(
        *events.borrow(),
        vec![EntryEvent::modified("ba"), EntryEvent::modified("zo")]
    );
}

#[test]
fn test_save_items_persists_dirty_entries_silently() {
    let repo = repository();
    let ws = vernacular();
    let events = record_events(&repo);
    let mut entries = vec![repo.create_item().unwrap(), repo.create_item().unwrap()];
    entries[0].set_lexical_form("v", "zo");
    entries[1].set_lexical_form("v", "ba");
    repo.get_all_entries_sorted_by_lexical_form(&ws).unwrap();

    repo.save_items(&mut entries).unwrap();

    assert!(entries.iter().all(|e| !e.is_dirty()));
    assert!(events.borrow().is_empty());
    let results = repo.get_all_entries_sorted_by_lexical_form(&ws).unwrap();
    assert_eq!(forms(&results), vec![Some("ba"), Some("zo")]);
    assert_eq!(
        repo.get_item(entries[1].repository_id())
            .unwrap()
            .lexical_form()
            .get("v"),
        Some("ba")
    );
}

#[test]
fn test_cached_views_match_fresh_queries() {
    let repo = repository();
    let ws = vernacular();
    let en = WritingSystem::new("en");

    let mut a = add_entry(&repo, "mu");
    let mut b = add_entry(&repo, "ka");
    let c = add_entry(&repo, "");

    let queries = [
        Query::lexical_form(&ws),
        Query::lexical_form_or_alternative(&ws),
        Query::definition_or_gloss(&en),
        Query::semantic_domain(),
        Query::lexical_forms_with_glosses(&ws),
        Query::gloss(&en),
    ];
    repo.get_all_entries_sorted_by_headword(&ws).unwrap();
    repo.get_all_entries_sorted_by_lexical_form(&ws).unwrap();
    repo.get_all_entries_sorted_by_lexical_form_or_alternative(&ws).unwrap();
    repo.get_all_entries_sorted_by_definition_or_gloss(&en).unwrap();
    repo.get_entries_with_semantic_domain_sorted_by_semantic_domain().unwrap();
    repo.get_entries_with_matching_gloss_sorted_by_lexical_form(&LanguageForm::new("en", "x"), &ws)
        .unwrap();
    repo.get_items_matching(&Query::gloss(&en)).unwrap();

    a.add_sense(
        LexSense::new()
            .with_gloss("en", "water")
            .with_definition("en", "clear liquid")
            .with_semantic_domain("1.3 Water"),
    );
    repo.save_item(&mut a).unwrap();

    b.set_lexical_form("v", "zu");
    b.set_lexical_form("en", "bee");
    b.add_sense(LexSense::new().with_gloss("en", "bee").with_semantic_domain("1.6 Animal"));
    repo.save_item(&mut b).unwrap();

    repo.delete_item(&c).unwrap();
    let mut d = add_entry(&repo, "ka");
    d.add_sense(LexSense::new().with_definition("en", "stone"));
    repo.save_item(&mut d).unwrap();

    a.senses_mut()[0].gloss.set("en", "river");
    repo.save_item(&mut a).unwrap();

    assert_eq!(
        repo.get_all_entries_sorted_by_lexical_form(&ws).unwrap(),
        repo.get_items_matching(&queries[0]).unwrap()
    );
    assert_eq!(
        repo.get_all_entries_sorted_by_lexical_form_or_alternative(&ws)
            .unwrap(),
        repo.get_items_matching(&queries[1]).unwrap()
    );
    assert_eq!(
        repo.get_all_entries_sorted_by_definition_or_gloss(&en).unwrap(),
        repo.get_items_matching(&queries[2]).unwrap()
    );
    assert_eq!(
        repo.get_entries_with_semantic_domain_sorted_by_semantic_domain()
            .unwrap(),
        repo.get_items_matching(&queries[3]).unwrap()
    );

    let fresh_glosses = repo.get_items_matching(&queries[4]).unwrap();
    for gloss in ["river", "bee", "water"] {
        let expected = fresh_glosses.filter(|t| {
            t.text(GLOSS) == Some(gloss) && t.text(GLOSS_WRITING_SYSTEM) == Some("en")
        });
        let lookup = LanguageForm::new("en", gloss);
        assert_eq!(
            repo.get_entries_with_matching_gloss_sorted_by_lexical_form(&lookup, &ws)
                .unwrap(),
            expected
        );
    }

    let headwords = repo.get_all_entries_sorted_by_headword(&ws).unwrap();
    let fresh_headwords = repo.get_items_matching(&Query::headword(&ws)).unwrap();
    assert_eq!(without_homographs(&headwords), fresh_headwords.tokens().to_vec());
    assert_eq!(forms(&headwords), vec![Some("ka"), Some("mu"), Some("zu")]);

    let stats = repo.cache_stats();
    assert_eq!(stats.caches, 6);
    assert_eq!(stats.sizes[&queries[0].label()], 3);
    assert_eq!(stats.sizes[&queries[4].label()], fresh_glosses.len());
    assert!(!stats.sizes.contains_key(&queries[5].label()));
}

#[test]
fn test_notify_updates_views_without_persisting() {
    let repo = repository();
    let ws = vernacular();
    let mut entry = add_entry(&repo, "ba");
    repo.get_all_entries_sorted_by_lexical_form(&ws).unwrap();

    entry.set_lexical_form("v", "bo");
    repo.notify_that_lex_entry_has_been_updated(&entry).unwrap();

    let results = repo.get_all_entries_sorted_by_lexical_form(&ws).unwrap();
    assert_eq!(forms(&results), vec![Some("bo")]);
    let stored = repo.get_item(entry.repository_id()).unwrap();
    assert_eq!(stored.lexical_form().get("v"), Some("ba"));

    let stranger = LexEntry::new(lexicon_repository::RepositoryId::new(999));
    assert!(matches!(
        repo.notify_that_lex_entry_has_been_updated(&stranger),
        Err(LexiconError::NotFound(_))
    ));
}

#[test]
fn test_definition_or_gloss_view() {
    let repo = repository();
    let en = WritingSystem::new("en");

    let mut gloss_only = repo.create_item().unwrap();
    gloss_only.add_sense(LexSense::new().with_gloss("en", "cat"));
    repo.save_item(&mut gloss_only).unwrap();

    let mut both = repo.create_item().unwrap();
    both.add_sense(LexSense::new().with_gloss("en", "dog").with_definition("en", "canine"));
    repo.save_item(&mut both).unwrap();

    let mut same = repo.create_item().unwrap();
    same.add_sense(LexSense::new().with_gloss("en", "eel").with_definition("en", "eel"));
    repo.save_item(&mut same).unwrap();

    let results = repo.get_all_entries_sorted_by_definition_or_gloss(&en).unwrap();
    assert_eq!(
        forms(&results),
        vec![Some("canine"), Some("cat"), Some("dog"), Some("eel")]
    );
    assert_eq!(results.rows_for(&both).len(), 2);
    assert_eq!(results.rows_for(&same).len(), 1);
}

#[test]
fn test_matching_gloss() {
    let repo = repository();
    let ws = vernacular();

    let mut zo = repo.create_item().unwrap();
    zo.set_lexical_form("v", "zo");
    zo.add_sense(LexSense::new().with_gloss("en", "water").with_gloss("fr", "eau"));
    repo.save_item(&mut zo).unwrap();

    let mut ba = repo.create_item().unwrap();
    ba.set_lexical_form("v", "ba");
    ba.add_sense(LexSense::new().with_gloss("en", "water"));
    repo.save_item(&mut ba).unwrap();

    let results = repo
        .get_entries_with_matching_gloss_sorted_by_lexical_form(
            &LanguageForm::new("en", "water"),
            &ws,
        )
        .unwrap();
    assert_eq!(forms(&results), vec![Some("ba"), Some("zo")]);
    assert!(results.iter().all(|t| t.text(GLOSS) == Some("water")));

    let eau = LanguageForm::new("fr", "eau");
    let french = repo
        .get_entries_with_matching_gloss_sorted_by_lexical_form(&eau, &ws)
        .unwrap();
    assert_eq!(french.repository_ids(), vec![zo.repository_id()]);

    let empty = LanguageForm::new("en", "");

    assert!(matches!(
        repo.get_entries_with_matching_gloss_sorted_by_lexical_form(&empty, &ws),
        Err(LexiconError::InvalidArgument(_))
    ));
}

#[test]
fn test_matching_and_similar_lexical_forms() {
    let repo = repository();
    let ws = vernacular();
    for form in ["ban", "bat", "banana", "zo"] {
        add_entry(&repo, form);
    }

    let exact = repo.get_entries_with_matching_lexical_form("bat", &ws).unwrap();
    assert_eq!(forms(&exact), vec![Some("bat")]);
    assert!(repo
        .get_entries_with_matching_lexical_form("bad", &ws)
        .unwrap()
        .is_empty());

    let similar = repo
        .get_entries_with_similar_lexical_form("ban", &ws, MatchOptions::None)
        .unwrap();
    assert_eq!(forms(&similar), vec![Some("ban")]);

    let with_prefixed = repo
        .get_entries_with_similar_lexical_form("ban", &ws, MatchOptions::IncludePrefixedForms)
        .unwrap();
    assert_eq!(
        forms(&with_prefixed),
        vec![Some("ban"), Some("banana"), Some("bat")]
    );

    let next_closest = repo
        .get_entries_with_similar_lexical_form("ban", &ws, MatchOptions::IncludeNextClosest)
        .unwrap();
    assert_eq!(forms(&next_closest), vec![Some("ban"), Some("bat")]);
}

#[test]
fn test_lookup_by_id() {
    let repo = repository();
    let mut entry = repo.create_item().unwrap();
    entry.set_id("ba_1234");
    entry.set_lexical_form("v", "ba");
    repo.save_item(&mut entry).unwrap();
    add_entry(&repo, "zo");

    let found = repo.get_lex_entry_with_matching_id("ba_1234").unwrap().unwrap();
    assert_eq!(found.repository_id(), entry.repository_id());
    assert!(repo.get_lex_entry_with_matching_id("missing").unwrap().is_none());
    assert!(matches!(
        repo.get_lex_entry_with_matching_id(""),
        Err(LexiconError::InvalidArgument(_))
    ));

    let mut twin = repo.create_item().unwrap();
    twin.set_id("ba_1234");
    repo.save_item(&mut twin).unwrap();
    assert!(matches!(
        repo.get_lex_entry_with_matching_id("ba_1234"),
        Err(LexiconError::InvariantViolation(_))
    ));
}

#[test]
fn test_lookup_by_guid() {
    let repo = repository();
    let first = add_entry(&repo, "ba");
    add_entry(&repo, "zo");

    let found = repo
        .get_lex_entry_with_matching_guid(first.guid())
        .unwrap()
        .unwrap();
    assert_eq!(found.repository_id(), first.repository_id());
    assert!(repo
        .get_lex_entry_with_matching_guid(Uuid::new_v4())
        .unwrap()
        .is_none());
    assert!(matches!(
        repo.get_lex_entry_with_matching_guid(Uuid::nil()),
        Err(LexiconError::InvalidArgument(_))
    ));

    let mut twin = repo.create_item().unwrap();
    twin.set_guid(first.guid());
    repo.save_item(&mut twin).unwrap();
    assert!(matches!(
        repo.get_lex_entry_with_matching_guid(first.guid()),
        Err(LexiconError::InvariantViolation(_))
    ));
}

#[test]
fn test_case_insensitive_writing_system_gets_its_own_view() {
    let repo = repository();
    let ordinal = vernacular();
    let folded = vernacular().with_sort_rules(SortRules::CaseInsensitive);
    for form in ["b", "C", "a"] {
        add_entry(&repo, form);
    }

    let by_code_point = repo.get_all_entries_sorted_by_lexical_form(&ordinal).unwrap();
    let by_letter = repo.get_all_entries_sorted_by_lexical_form(&folded).unwrap();
    assert_eq!(forms(&by_code_point), vec![Some("C"), Some("a"), Some("b")]);
    assert_eq!(forms(&by_letter), vec![Some("a"), Some("b"), Some("C")]);
    assert_eq!(repo.cache_stats().caches, 2);
}

#[test]
fn test_blank_writing_system_is_rejected() {
    let repo = repository();
    let blank = WritingSystem::new("");
    assert!(matches!(
        repo.get_all_entries_sorted_by_headword(&blank),
        Err(LexiconError::InvalidArgument(_))
    ));
    assert!(matches!(
        repo.get_all_entries_sorted_by_lexical_form(&blank),
        Err(LexiconError::InvalidArgument(_))
    ));
    assert!(repo.cache_stats().caches == 0);
}
