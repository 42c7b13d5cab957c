use anyhow::Result;
use core::hint::black_box;
use criterion::{Criterion, criterion_group, criterion_main};
use css_media_queries::MediaValues;
use std::sync::Arc;
use style_engine::{
    DomSubscriber as _, DomUpdate, NodeKey, StyleDom, StyleEngineConfig, StyleEngineContext,
    StyleResolver, StyleSheetContents,
};

const CSS: &str = ".card { padding: 4px } .card .title { font-size: 18px } \
     ul > li { margin: 0 } li:first-child { color: red } #main p { color: navy } \
     section p.note { font-style: italic } a:hover { text-decoration: none } \
     div div div span { margin: 1px } [data-level] { outline: thin } .wide { width: 100% }";

/// `<div id=main>` holding `sections` cards, each with a title, a list and
/// a handful of paragraphs.
fn build_document(sections: u64) -> Result<StyleDom> {
    let mut dom = StyleDom::new();
    let mut next_key = 1_u64;
    let mut insert = |dom: &mut StyleDom, parent: u64, tag: &str| -> Result<u64> {
        next_key += 1;
        dom.apply_update(DomUpdate::InsertElement {
            parent: NodeKey(parent),
            node: NodeKey(next_key),
            tag: tag.into(),
            pos: usize::MAX,
        })?;
        Ok(next_key)
    };
    dom.apply_update(DomUpdate::InsertElement {
        parent: NodeKey::ROOT,
        node: NodeKey(1),
        tag: "div".into(),
        pos: 0,
    })?;
    dom.apply_update(DomUpdate::SetAttr {
        node: NodeKey(1),
        name: "id".into(),
        value: "main".into(),
    })?;
    for _ in 0..sections {
        let section = insert(&mut dom, 1, "section")?;
        dom.apply_update(DomUpdate::SetAttr {
            node: NodeKey(section),
            name: "class".into(),
            value: "card".into(),
        })?;
        let title = insert(&mut dom, section, "h2")?;
        dom.apply_update(DomUpdate::SetAttr {
            node: NodeKey(title),
            name: "class".into(),
            value: "title".into(),
        })?;
        let list = insert(&mut dom, section, "ul")?;
        for _ in 0..5 {
            insert(&mut dom, list, "li")?;
        }
        for index in 0..4 {
            let paragraph = insert(&mut dom, section, "p")?;
            if index % 2 == 0 {
                dom.apply_update(DomUpdate::SetAttr {
                    node: NodeKey(paragraph),
                    name: "class".into(),
                    value: "note".into(),
                })?;
            }
            insert(&mut dom, paragraph, "a")?;
        }
    }
    Ok(dom)
}

fn context_for(config: StyleEngineConfig) -> StyleEngineContext {
    StyleEngineContext::new(config, MediaValues::default())
        .with_author_sheets(vec![Arc::new(StyleSheetContents::parse(CSS))])
}

fn bench_resolve_tree(criterion: &mut Criterion) {
    let _logger = env_logger::builder().is_test(true).try_init();
    let Ok(dom) = build_document(50) else {
        return;
    };

    let variants = [
        ("style_resolve_tree_default", StyleEngineConfig::default()),
        (
            "style_resolve_tree_no_cache",
            StyleEngineConfig::default().with_matched_properties_cache(false),
        ),
        (
            "style_resolve_tree_no_filter",
            StyleEngineConfig::default().with_selector_filter(false),
        ),
    ];
    for (name, config) in variants {
        let context = context_for(config);
        criterion.bench_function(name, |bencher| {
            bencher.iter(|| {
                let mut resolver = StyleResolver::new(&context);
                let styles = resolver.resolve_tree(&context, &dom, NodeKey(1), None);
                black_box((styles.len(), resolver.stats()));
            });
        });
    }
}

fn bench_context_build(criterion: &mut Criterion) {
    criterion.bench_function("style_context_build", |bencher| {
        bencher.iter(|| black_box(context_for(StyleEngineConfig::default()).author_rules().len()));
    });
}

criterion_group!(style_benches, bench_resolve_tree, bench_context_build);
criterion_main!(style_benches);
