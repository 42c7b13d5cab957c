use anyhow::Result;
use css_cascade::{CascadeOrigin, PropertyId};
use css_media_queries::MediaValues;
use std::sync::Arc;
use style_engine::{
    DomSubscriber as _, DomUpdate, NodeKey, SheetRule, StyleDom, StyleEngineConfig,
    StyleEngineContext, StyleResolver, StyleSheetContents,
};

fn init_logging() {
    let _logger = env_logger::builder().is_test(true).try_init();
}

fn insert(dom: &mut StyleDom, parent: u64, node: u64, tag: &str) -> Result<()> {
    dom.apply_update(DomUpdate::InsertElement {
        parent: NodeKey(parent),
        node: NodeKey(node),
        tag: tag.into(),
        pos: usize::MAX,
    })
}

fn set_attr(dom: &mut StyleDom, node: u64, name: &str, value: &str) -> Result<()> {
    dom.apply_update(DomUpdate::SetAttr {
        node: NodeKey(node),
        name: name.into(),
        value: value.into(),
    })
}

/// `<div id=box class="x y"><p class=text></p></div>`
fn document() -> Result<StyleDom> {
    let mut dom = StyleDom::new();
    insert(&mut dom, 0, 1, "div")?;
    insert(&mut dom, 1, 2, "p")?;
    set_attr(&mut dom, 1, "id", "box")?;
    set_attr(&mut dom, 1, "class", "x y")?;
    set_attr(&mut dom, 2, "class", "text")?;
    Ok(dom)
}

fn author_context(css: &str) -> StyleEngineContext {
    StyleEngineContext::default().with_author_sheets(vec![Arc::new(StyleSheetContents::parse(css))])
}

fn resolve(context: &StyleEngineContext, dom: &StyleDom, node: u64, property: PropertyId) -> String {
    let mut resolver = StyleResolver::new(context);
    let styles = resolver.resolve_tree(context, dom, NodeKey(1), None);
    styles
        .get(&NodeKey(node))
        .map_or_else(String::new, |style| style.get(property).to_owned())
}

fn resolve_custom(
    context: &StyleEngineContext,
    dom: &StyleDom,
    node: u64,
    name: &str,
) -> Option<String> {
    let mut resolver = StyleResolver::new(context);
    let styles = resolver.resolve_tree(context, dom, NodeKey(1), None);
    styles
        .get(&NodeKey(node))
        .and_then(|style| style.custom_property(name).map(str::to_owned))
}

#[test]
fn higher_specificity_wins_regardless_of_source_order() -> Result<()> {
    init_logging();
    let dom = document()?;
    let context = author_context("#box { color: green } .x.y { color: red } div { color: blue }");
    assert_eq!(resolve(&context, &dom, 1, PropertyId::Color), "green");

    let compound = author_context(".x { color: red } div.x { color: blue } .y { color: orange }");
    assert_eq!(resolve(&compound, &dom, 1, PropertyId::Color), "blue");
    Ok(())
}

#[test]
fn equal_specificity_falls_back_to_source_order() -> Result<()> {
    let dom = document()?;
    let context = author_context(".x { color: red } .y { color: blue }");
    assert_eq!(resolve(&context, &dom, 1, PropertyId::Color), "blue");
    let swapped = author_context(".y { color: blue } .x { color: red }");
    assert_eq!(resolve(&swapped, &dom, 1, PropertyId::Color), "red");
    Ok(())
}

#[test]
fn later_sheets_win_ties_across_sheets() -> Result<()> {
    let dom = document()?;
    let context = StyleEngineContext::default().with_author_sheets(vec![
        Arc::new(StyleSheetContents::parse(".y { color: red }")),
        Arc::new(StyleSheetContents::parse(".x { color: blue }")),
    ]);
    assert_eq!(resolve(&context, &dom, 1, PropertyId::Color), "blue");
    Ok(())
}

#[test]
fn important_beats_later_and_more_specific_normal() -> Result<()> {
    let dom = document()?;
    let context = author_context("div { color: blue !important } #box.x { color: red }");
    assert_eq!(resolve(&context, &dom, 1, PropertyId::Color), "blue");
    Ok(())
}

#[test]
fn important_declarations_apply_in_reverse_match_order() -> Result<()> {
    let dom = document()?;
    // Both important: the walk runs from the highest-priority entry down,
    // so the more specific rule keeps the property.
    let context =
        author_context("#box { color: green !important } div { color: blue !important }");
    assert_eq!(resolve(&context, &dom, 1, PropertyId::Color), "green");
    Ok(())
}

#[test]
fn author_beats_more_specific_user_agent() -> Result<()> {
    let mut dom = StyleDom::new();
    insert(&mut dom, 0, 1, "body")?;
    let context = author_context("* { margin: 3px }");
    // The user-agent sheet has `body { margin: 8px }`.
    assert_eq!(resolve(&context, &dom, 1, PropertyId::Margin), "3px");
    assert_eq!(resolve(&StyleEngineContext::default(), &dom, 1, PropertyId::Margin), "8px");
    Ok(())
}

#[test]
fn user_sits_between_user_agent_and_author() -> Result<()> {
    let dom = document()?;
    let user = Arc::new(StyleSheetContents::parse("#box { color: purple; margin: 1px }"));
    let author = Arc::new(StyleSheetContents::parse("div { color: teal }"));
    let context = StyleEngineContext::new(StyleEngineConfig::default(), MediaValues::default())
        .with_user_sheet(user)
        .with_author_sheet(author);

    assert_eq!(resolve(&context, &dom, 1, PropertyId::Color), "teal");
    assert_eq!(resolve(&context, &dom, 1, PropertyId::Margin), "1px");

    let mut resolver = StyleResolver::new(&context);
    let result = resolver.match_result_for(&context, &dom, NodeKey(1), None);
    let origins: Vec<CascadeOrigin> = result.iter().map(|entry| entry.origin).collect();
    let mut sorted = origins.clone();
    sorted.sort();
    assert_eq!(origins, sorted);
    assert_eq!(origins.first(), Some(&CascadeOrigin::UserAgent));
    assert_eq!(origins.last(), Some(&CascadeOrigin::Author));
    Ok(())
}

#[test]
fn unlayered_rules_beat_layered_ones() -> Result<()> {
    let dom = document()?;
    let context = author_context(
        "@layer base, theme; \
         #box { color: red } \
         @layer theme { div { color: blue; margin: 5px } } \
         @layer base { #box { margin: 9px } }",
    );
    assert_eq!(resolve(&context, &dom, 1, PropertyId::Color), "red");
    assert_eq!(resolve(&context, &dom, 1, PropertyId::Margin), "5px");
    Ok(())
}

#[test]
fn nested_layers_lose_to_their_parent_layer() -> Result<()> {
    let dom = document()?;
    let context = author_context(
        "@layer base { p { color: green } @layer inner { p { color: red; margin: 2px } } }",
    );
    assert_eq!(resolve(&context, &dom, 2, PropertyId::Color), "green");
    assert_eq!(resolve(&context, &dom, 2, PropertyId::Margin), "2px");
    Ok(())
}

#[test]
fn nested_layers_keep_their_parents_slot() -> Result<()> {
    let dom = document()?;
    // `base.inner` first appears after `theme` but still sorts inside `base`.
    let context = author_context(
        "@layer base, theme; \
         @layer theme { p { color: blue } } \
         @layer base { @layer inner { p { color: red } } }",
    );
    assert_eq!(resolve(&context, &dom, 2, PropertyId::Color), "blue");

    let across_sheets = StyleEngineContext::default().with_author_sheets(vec![
        Arc::new(StyleSheetContents::parse(
            "@layer base { p { margin: 1px } } @layer theme { p { margin: 3px } }",
        )),
        Arc::new(StyleSheetContents::parse(
            "@layer base.extra { p { margin: 9px } }",
        )),
    ]);
    assert_eq!(resolve(&across_sheets, &dom, 2, PropertyId::Margin), "3px");
    Ok(())
}

#[test]
fn inline_style_beats_every_author_selector() -> Result<()> {
    let mut dom = document()?;
    set_attr(&mut dom, 1, "style", "color: black")?;
    let context = author_context("#box.x.y { color: red }");
    assert_eq!(resolve(&context, &dom, 1, PropertyId::Color), "black");

    let important = author_context("#box { color: red !important }");
    assert_eq!(resolve(&important, &dom, 1, PropertyId::Color), "red");
    Ok(())
}

#[test]
fn inheritance_and_explicit_keywords() -> Result<()> {
    let dom = document()?;
    let context = author_context(
        "div { color: navy; margin: 4px } .text { margin: inherit } p { font-size: 20px }",
    );
    assert_eq!(resolve(&context, &dom, 2, PropertyId::Color), "navy");
    assert_eq!(resolve(&context, &dom, 2, PropertyId::Margin), "4px");

    let reset = author_context("div { color: navy } p { color: initial }");
    assert_eq!(resolve(&reset, &dom, 2, PropertyId::Color), "canvastext");
    Ok(())
}

#[test]
fn custom_properties_are_parsed_with_their_block() {
    let sheet = StyleSheetContents::parse("p { --brand: blue; color: red; --Brand: Navy }");
    let properties = sheet.child_rules().first().and_then(|rule| match rule {
        SheetRule::Style(style) => Some(style.properties()),
        _ => None,
    });
    assert!(properties.is_some_and(|block| block.property_count() == 1
        && block.custom_property_count() == 2
        && block.get_custom("--Brand").is_some_and(|decl| decl.value.as_text() == "Navy")));
}

#[test]
fn custom_properties_cascade_and_inherit() -> Result<()> {
    let dom = document()?;
    let context = author_context(
        "div { --brand: blue; --gap: 1px !important } \
         #box { --brand: red; --gap: 2px } \
         .text { --gap: inherit } \
         p { --local: 5px }",
    );
    assert_eq!(resolve_custom(&context, &dom, 1, "--brand").as_deref(), Some("red"));
    assert_eq!(resolve_custom(&context, &dom, 1, "--gap").as_deref(), Some("1px"));
    assert_eq!(resolve_custom(&context, &dom, 1, "--local"), None);
    // Custom properties always inherit.
    assert_eq!(resolve_custom(&context, &dom, 2, "--brand").as_deref(), Some("red"));
    assert_eq!(resolve_custom(&context, &dom, 2, "--gap").as_deref(), Some("1px"));
    assert_eq!(resolve_custom(&context, &dom, 2, "--local").as_deref(), Some("5px"));

    let reset = author_context("div { --brand: blue } p { --brand: initial }");
    assert_eq!(resolve_custom(&reset, &dom, 1, "--brand").as_deref(), Some("blue"));
    assert_eq!(resolve_custom(&reset, &dom, 2, "--brand"), None);
    Ok(())
}

#[test]
fn inline_custom_properties_win_and_block_sharing() -> Result<()> {
    let mut dom = document()?;
    insert(&mut dom, 1, 3, "p")?;
    set_attr(&mut dom, 2, "style", "--brand: green")?;
    let context = author_context("p { --brand: purple; color: var(--brand) }");
    assert_eq!(resolve_custom(&context, &dom, 2, "--brand").as_deref(), Some("green"));
    assert_eq!(resolve_custom(&context, &dom, 3, "--brand").as_deref(), Some("purple"));
    // `var()` is kept as written.
    assert_eq!(resolve(&context, &dom, 3, PropertyId::Color), "var(--brand)");
    Ok(())
}
