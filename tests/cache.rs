use text_token_filter as ttf;
use ttf::store::{ContextLevel, Profile, Scope};
use ttf::{EngineConfig, FilterOptions, Grammar, MemoryStore, ResolutionContext, TextFilter, Viewer};

fn fixture() -> MemoryStore {
    MemoryStore::new()
        .with_profile(Profile { id: 2, email: "a@b.com".into(), ..Default::default() })
        .with_scope(Scope { id: 5, fullname: "Physics 101".into(), ..Default::default() })
        .with_role(2, 5, "teacher")
        .with_metadata(5, ContextLevel::Course, "credits", "3")
}

#[test]
fn test_repeated_token_hits_store_once() {
    let store = fixture();
    let ctx = ResolutionContext::new(Viewer::Authenticated(2), Some(5), &store);
    let mut f = TextFilter::new(ctx, EngineConfig::default());
    let out = f.filter("{USER_EMAIL} and {USER_EMAIL}", &FilterOptions::default());
    assert_eq!(out, "a@b.com and a@b.com");
    assert_eq!(store.calls("profile"), 1);
}

#[test]
fn test_cache_survives_across_calls_on_one_instance() {
    let store = fixture();
    let ctx = ResolutionContext::new(Viewer::Authenticated(2), Some(5), &store);
    let mut f = TextFilter::new(ctx, EngineConfig::default());
    for _ in 0..3 {
        f.filter("{COURSE_FULLNAME} {TEACHER_EMAIL}", &FilterOptions::default());
    }
    assert_eq!(store.calls("scope"), 1);
    assert_eq!(store.calls("role_holders"), 1);
    assert_eq!(f.cache().len(), 2);
}

#[test]
fn test_each_instance_owns_its_cache() {
    let store = fixture();
    for _ in 0..2 {
        let ctx = ResolutionContext::new(Viewer::Authenticated(2), Some(5), &store);
        TextFilter::new(ctx, EngineConfig::default()).filter("{USER_EMAIL}", &FilterOptions::default());
    }
    assert_eq!(store.calls("profile"), 2);
}

#[test]
fn test_distinct_fields_are_distinct_keys() {
    let store = fixture();
    let ctx = ResolutionContext::new(Viewer::Authenticated(2), Some(5), &store);
    let mut f = TextFilter::new(ctx, EngineConfig::default());
    f.filter("{USER_EMAIL} {USER_USERNAME}", &FilterOptions::default());
    assert_eq!(store.calls("profile"), 2);
}

#[test]
fn test_metadata_cached_but_missing_values_are_not() {
    let store = fixture();
    let ctx = ResolutionContext::new(Viewer::Authenticated(2), Some(5), &store);
    let mut f = TextFilter::new(ctx, EngineConfig::default().with_grammar(Grammar::Namespaced));
    let out = f.filter(
        "{{metadata::course::credits}} {{metadata::course::credits}}",
        &FilterOptions::default(),
    );
    assert_eq!(out, "3 3");
    assert_eq!(store.calls("field_value"), 1);

    // Nothing stored for a value that isn't there: each occurrence asks again.
    f.filter("{{metadata::course::hours}} {{metadata::course::hours}}", &FilterOptions::default());
    assert_eq!(store.calls("field_value"), 3);
}

#[test]
fn test_failures_are_not_cached() {
    let store = fixture().failing("profile");
    let ctx = ResolutionContext::new(Viewer::Authenticated(2), Some(5), &store);
    let mut f = TextFilter::new(ctx, EngineConfig::default());
    f.filter("{USER_EMAIL} {USER_EMAIL}", &FilterOptions::default());
    assert_eq!(store.calls("profile"), 2);
    assert!(f.cache().is_empty());
}
