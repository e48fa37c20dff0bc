use facet_core::CanonicalFilter;
use facet_core::FacetCache;
use facet_core::FacetDefinition;
use facet_core::FacetQuery;
use facet_core::FacetRegistry;
use facet_core::IdSet;
use facet_core::IdSetCache;
use facet_core::IdSetKey;
use facet_core::MemoryQuery;
use facet_core::RawFilter;
use facet_core::ResolutionContext;
use facet_core::ResolveOptions;
use facet_core::RowCache;
use facet_core::raw_filter_from_json;
use facet_core::resolve;
use facet_index::Indexer;
use facet_index::JsonFieldExtractor;
use facet_index::JsonIndexStore;
use facet_index::MemoryIndexStore;
use facet_utils_cache::MemoryCacheStore;
use pretty_assertions::assert_eq;
use serde_json::Value;
use serde_json::json;
use std::cell::Cell;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// The four products every scenario below starts from.
fn products() -> Vec<Value> {
    vec![
        json!({"id": 1, "color": "red", "size": "S", "brand": {"name": "Acme"}}),
        json!({"id": 2, "color": "blue", "size": "S", "brand": {"name": "Bolt"}}),
        json!({"id": 3, "color": "red", "size": "M", "brand": {"name": "Acme"}}),
        json!({"id": 4, "color": "green", "size": "M"}),
    ]
}

fn registry() -> Arc<FacetRegistry> {
    let mut registry = FacetRegistry::new();
    registry
        .define(
            "Product",
            [
                FacetDefinition::new("Product", "color"),
                FacetDefinition::new("Product", "size"),
                FacetDefinition::new("Product", "brand.name").with_title("Brand"),
            ],
        )
        .unwrap();
    Arc::new(registry)
}

fn memory_cache() -> FacetCache {
    FacetCache::new(
        Arc::new(MemoryCacheStore::new()),
        "facet-filter.cache",
        Duration::from_secs(3600),
    )
}

/// Indexes the products and returns a context plus the row cache it reads.
fn indexed_context() -> (ResolutionContext, Arc<RowCache>) {
    let registry = registry();
    let index = Arc::new(MemoryIndexStore::new());
    let rows = Arc::new(RowCache::new(index.clone(), memory_cache()));
    let indexer = Indexer::new(index).observe(rows.clone());
    indexer
        .build_index(
            &registry.indexed_fields("Product").unwrap(),
            &products(),
            &JsonFieldExtractor::default(),
        )
        .unwrap();
    (ResolutionContext::new(registry, rows.clone()), rows)
}

fn ids(values: &[u64]) -> IdSet {
    values.iter().copied().collect()
}

fn raw(value: Value) -> RawFilter {
    raw_filter_from_json(&value)
}

fn sample_filters() -> Vec<Value> {
    vec![
        json!({}),
        json!({"color": "red"}),
        json!({"color": ["red", "green"], "size": "M"}),
        json!({"size": "S", "brand": "Acme"}),
        json!({"color": "purple"}),
        json!({"color": ["red", "blue"], "size": ["S", "M"], "brand": "Bolt"}),
    ]
}

#[test]
fn product_scenario_matches_expected_sets() {
    let (mut ctx, _) = indexed_context();
    let all = ids(&[1, 2, 3, 4]);

    let filter = ctx.normalize("Product", &raw(json!({"color": ["red"]}))).unwrap();
    let resolution = ctx
        .resolve("Product", &filter, &all, &ResolveOptions::default())
        .unwrap();
    assert_eq!(resolution.final_ids, ids(&[1, 3]));
    assert_eq!(resolution.ids_for("Product.color"), Some(&all));
    assert_eq!(resolution.ids_for("Product.size"), Some(&ids(&[1, 3])));

    let both = ctx
        .normalize("Product", &raw(json!({"color": ["red"], "size": ["M"]})))
        .unwrap();
    let resolution = ctx
        .resolve("Product", &both, &all, &ResolveOptions::default())
        .unwrap();
    assert_eq!(resolution.final_ids, ids(&[3]));
}

#[test]
fn normalization_is_idempotent() {
    let (mut ctx, _) = indexed_context();
    for input in sample_filters() {
        let once = ctx.normalize("Product", &raw(input)).unwrap();
        let key = once.cache_key().unwrap();
        let reparsed = CanonicalFilter::from_cache_key(&key).unwrap();
        let twice = ctx.normalize("Product", &reparsed.to_raw()).unwrap();
        assert_eq!(twice, once);
        assert_eq!(twice.cache_key().unwrap(), key);
    }
}

#[test]
fn select_all_resolves_like_select_none() {
    let (mut ctx, _) = indexed_context();
    let facets = ctx.load_facets("Product").unwrap();
    let all = ids(&[1, 2, 3, 4]);

    let everything = ctx
        .normalize(
            "Product",
            &raw(json!({"color": ["red", "blue", "green"], "size": "M"})),
        )
        .unwrap();
    let cleared = ctx.normalize("Product", &raw(json!({"size": "M"}))).unwrap();
    assert_eq!(everything, cleared);
    assert_eq!(
        resolve(&facets, &everything, &all),
        resolve(&facets, &cleared, &all)
    );
}

#[test]
fn empty_filter_is_identity() {
    let (mut ctx, _) = indexed_context();
    let facets = ctx.load_facets("Product").unwrap();
    let candidates = ids(&[2, 3, 4]);
    let empty = ctx.empty_filter("Product").unwrap();

    let resolution = resolve(&facets, &empty, &candidates);
    assert_eq!(resolution.final_ids, candidates);
    assert_eq!(resolution.per_facet_ids.len(), facets.len());
    assert!(resolution.per_facet_ids.values().all(|set| *set == candidates));
}

#[test]
fn each_facet_excludes_exactly_its_own_selection() {
    let (mut ctx, _) = indexed_context();
    let facets = ctx.load_facets("Product").unwrap();
    let all = ids(&[1, 2, 3, 4]);

    for input in sample_filters() {
        let filter = ctx.normalize("Product", &raw(input)).unwrap();
        let resolution = resolve(&facets, &filter, &all);
        for facet in &facets {
            let Some(own) = resolution.ids_for(facet.slug()) else {
                panic!("no id set for {}", facet.slug());
            };
            assert!(own.is_superset(&resolution.final_ids));
            let lifted = resolve(&facets, &filter.with_cleared(facet.param_name()), &all);
            assert_eq!(&lifted.final_ids, own, "facet {}", facet.slug());
        }
    }
}

#[test]
fn equivalent_filters_share_one_cache_entry() {
    let (mut ctx, rows) = indexed_context();
    let first = ctx
        .normalize("Product", &raw(json!({"size": "M", "color": ["red", "green"]})))
        .unwrap();
    let second = ctx
        .normalize(
            "Product",
            &raw(json!({"color": ["green", "red", "green"], "size": ["M"], "weight": 3})),
        )
        .unwrap();

    let cache = IdSetCache::new(rows.cache().clone());
    let calls = Cell::new(0);
    let compute = || {
        calls.set(calls.get() + 1);
        Ok(ids(&[3, 4]))
    };
    let a: IdSet = cache
        .get_or_compute(&IdSetKey::new("Product", first), compute)
        .unwrap();
    let b: IdSet = cache
        .get_or_compute(&IdSetKey::new("Product", second), compute)
        .unwrap();
    assert_eq!(a, b);
    assert_eq!(calls.get(), 1);
}

#[test]
fn pagination_count_matches_all_ids() {
    let (mut ctx, _) = indexed_context();
    for input in sample_filters() {
        let base = MemoryQuery::new("Product", products()).offset(1).limit(1);
        let mut query = FacetQuery::new(base).facets_match_filter(raw(input.clone()));
        let count = query.count_for_pagination(&mut ctx).unwrap();
        let all_ids = query.all_ids(&mut ctx).unwrap();
        assert_eq!(count, all_ids.len() as u64, "filter {input}");
        assert!(query.get(&mut ctx).unwrap().len() <= 1);
    }
}

#[test]
fn facet_query_constrains_base_query_and_feeds_option_counts() {
    let (mut ctx, _) = indexed_context();
    let base = MemoryQuery::new("Product", products()).where_eq("size", "M");
    let filter = raw(json!({"color": "red"}));
    let mut query = FacetQuery::new(base).facet_filter(filter.clone());

    assert_eq!(query.get(&mut ctx).unwrap(), vec![3]);
    assert!(query.is_constrained());
    query.apply_filter(&mut ctx).unwrap();
    assert_eq!(query.get(&mut ctx).unwrap(), vec![3]);

    let facets = ctx.facets("Product", &filter).unwrap();
    let color: Vec<(String, bool, usize)> = facets[0]
        .options()
        .into_iter()
        .map(|option| (option.value, option.selected, option.total))
        .collect();
    assert_eq!(
        color,
        vec![
            ("red".to_string(), true, 1),
            ("blue".to_string(), false, 0),
            ("green".to_string(), false, 1),
        ]
    );
    let sizes: Vec<String> = facets[1]
        .non_missing_options()
        .into_iter()
        .map(|option| option.value)
        .collect();
    assert_eq!(sizes, vec!["M".to_string()]);
}

#[test]
fn reindexing_invalidates_cached_rows_and_id_sets() {
    let dir = TempDir::new().unwrap();
    let registry = registry();
    let index =
        Arc::new(JsonIndexStore::open(dir.path().join("facetrows.json"), "facetrows").unwrap());
    let rows = Arc::new(RowCache::new(index.clone(), memory_cache()));
    let indexer = Indexer::new(index).observe(rows.clone());
    let fields = registry.indexed_fields("Product").unwrap();
    let extractor = JsonFieldExtractor::default();
    indexer.build_index(&fields, &products(), &extractor).unwrap();

    let red = raw(json!({"color": "red"}));
    let mut ctx = ResolutionContext::new(registry.clone(), rows.clone());
    let mut query =
        FacetQuery::new(MemoryQuery::new("Product", products())).facet_filter(red.clone());
    assert_eq!(query.get(&mut ctx).unwrap(), vec![1, 3]);

    indexer.reset_rows(&fields, &[3]).unwrap();
    indexer
        .build_index(
            &fields,
            &[json!({"id": 3, "color": "blue", "size": "M"})],
            &extractor,
        )
        .unwrap();

    let mut fresh = ResolutionContext::new(registry, rows);
    let mut query =
        FacetQuery::new(MemoryQuery::new("Product", products())).facet_filter(red);
    assert_eq!(query.get(&mut fresh).unwrap(), vec![1]);
}
