use hovertex::{
    dom::{Document, ElementId},
    events::{MouseEvent, MutationRecord},
    mathjax::{MathItem, MathJaxRuntime},
    relay::{Channel, ContextId, RelaySlot},
    PageExtractor,
};

const WINDOW: ContextId = ContextId(1);

// RUST_LOG=debug shows the per-strategy trail when a test goes wrong
fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn modern_container(doc: &mut Document, counter: Option<&str>) -> ElementId {
    let container = doc.create_element("mjx-container");
    if let Some(counter) = counter {
        doc.set_attribute(container, "ctxtmenu_counter", counter);
    }
    doc.append_child(doc.body(), container);
    let math = doc.create_element("mjx-math");
    doc.append_child(container, math);
    container
}

fn attach(runtime: &MathJaxRuntime) -> PageExtractor {
    PageExtractor::attach(runtime, WINDOW).expect("v3/v4 runtime should attach")
}

// Collects what a router-side slot would end up holding after the posts
fn received(channel: &mut Channel) -> Vec<String> {
    let mut slot = RelaySlot::new(WINDOW);
    let mut out = Vec::new();
    for msg in channel.drain() {
        if slot.deliver(&msg) {
            out.push(slot.latest().unwrap().latex.clone());
        }
    }
    out
}

// =============================================================================
// Version gating
// =============================================================================

#[test]
fn attaches_only_for_mathjax_3_and_4() {
    assert!(PageExtractor::attach(&MathJaxRuntime::new("3.2.2"), WINDOW).is_some());
    assert!(PageExtractor::attach(&MathJaxRuntime::new("4.0.0-beta.4"), WINDOW).is_some());
    assert!(PageExtractor::attach(&MathJaxRuntime::new("2.7.9"), WINDOW).is_none());
    assert!(PageExtractor::attach(&MathJaxRuntime::new(""), WINDOW).is_none());
}

// =============================================================================
// Registry lookup
// =============================================================================

#[test]
fn registry_match_recovers_the_recorded_source() {
    init_logs();
    let mut doc = Document::new("example.org");
    let container = modern_container(&mut doc, None);

    let mut runtime = MathJaxRuntime::new("3.2.2");
    runtime.push_item(MathItem {
        typeset_root: Some(container),
        math: Some(r" \nabla \cdot E ".to_string()),
        ..MathItem::default()
    });

    let extractor = attach(&runtime);
    assert_eq!(
        extractor.extract_for_container(&doc, &runtime, container),
        Some(r"\nabla \cdot E".to_string())
    );
}

#[test]
fn registry_falls_back_to_the_input_field() {
    let mut doc = Document::new("example.org");
    let container = modern_container(&mut doc, None);

    let mut runtime = MathJaxRuntime::new("4.0.0");
    runtime.push_item(MathItem {
        typeset_root: Some(container),
        math: None,
        input: Some(r"\vec{F}=m\vec{a}".to_string()),
        ..MathItem::default()
    });

    let extractor = attach(&runtime);
    assert_eq!(
        extractor.extract_for_container(&doc, &runtime, container),
        Some(r"\vec{F}=m\vec{a}".to_string())
    );
}

#[test]
fn registry_matches_structurally_equal_roots_across_whitespace() {
    let mut doc = Document::new("example.org");
    let container = modern_container(&mut doc, None);
    doc.set_text(doc.children(container)[0], "x + y");

    // A structurally identical tree kept elsewhere by the runtime, with
    // different internal whitespace
    let root = doc.create_element("mjx-container");
    let math = doc.create_element("mjx-math");
    doc.set_text(math, "x  +  y");
    doc.append_child(root, math);

    let mut runtime = MathJaxRuntime::new("3.2.2");
    runtime.push_item(MathItem {
        typeset_root: Some(root),
        math: Some("x+y".to_string()),
        ..MathItem::default()
    });

    let extractor = attach(&runtime);
    assert_eq!(
        extractor.extract_for_container(&doc, &runtime, container),
        Some("x+y".to_string())
    );
}

#[test]
fn registry_walk_terminates_on_a_circular_list() {
    init_logs();
    let mut doc = Document::new("example.org");
    let container = modern_container(&mut doc, None);
    doc.set_attribute(container, "data-tex", "fallback");

    let unrelated = doc.create_element("div");
    doc.set_text(unrelated, "other");

    let mut runtime = MathJaxRuntime::new("3.2.2");
    let a = runtime.push_item(MathItem {
        typeset_root: Some(unrelated),
        math: Some("not-it".to_string()),
        ..MathItem::default()
    });
    let b = runtime.push_item(MathItem {
        typeset_root: Some(unrelated),
        math: Some("not-it-either".to_string()),
        ..MathItem::default()
    });
    runtime.set_next(b, Some(a));

    let extractor = attach(&runtime);
    // Must terminate and fall through to the attribute strategy
    assert_eq!(
        extractor.extract_for_container(&doc, &runtime, container),
        Some("fallback".to_string())
    );
}

// =============================================================================
// Annotation lookup
// =============================================================================

fn tex_annotation(doc: &mut Document, parent: ElementId, tex: &str) {
    let math = doc.create_element("math");
    doc.append_child(parent, math);
    let semantics = doc.create_element("semantics");
    doc.append_child(math, semantics);
    let ann = doc.create_element("annotation");
    doc.set_attribute(ann, "encoding", "application/x-tex");
    doc.set_text(ann, tex);
    doc.append_child(semantics, ann);
}

#[test]
fn annotation_in_subtree_is_found() {
    let mut doc = Document::new("example.org");
    let container = modern_container(&mut doc, None);
    tex_annotation(&mut doc, container, r"\partial_t u = \Delta u");

    let runtime = MathJaxRuntime::new("3.2.2");
    let extractor = attach(&runtime);
    assert_eq!(
        extractor.extract_for_container(&doc, &runtime, container),
        Some(r"\partial_t u = \Delta u".to_string())
    );
}

#[test]
fn annotation_in_shadow_subtree_is_found() {
    let mut doc = Document::new("example.org");
    let container = modern_container(&mut doc, None);
    let shadow = doc.attach_shadow(container);
    tex_annotation(&mut doc, shadow, r"\oint B \cdot dl");

    let runtime = MathJaxRuntime::new("3.2.2");
    let extractor = attach(&runtime);
    assert_eq!(
        extractor.extract_for_container(&doc, &runtime, container),
        Some(r"\oint B \cdot dl".to_string())
    );
}

#[test]
fn annotation_without_tex_encoding_is_skipped() {
    let mut doc = Document::new("example.org");
    let container = modern_container(&mut doc, None);
    let ann = doc.create_element("annotation");
    doc.set_attribute(ann, "encoding", "application/x-llm");
    doc.set_text(ann, "not latex");
    doc.append_child(container, ann);

    let runtime = MathJaxRuntime::new("3.2.2");
    let extractor = attach(&runtime);
    assert_eq!(extractor.extract_for_container(&doc, &runtime, container), None);
}

// =============================================================================
// Sibling scripts and attributes
// =============================================================================

#[test]
fn sibling_script_is_found_backward_too() {
    let mut doc = Document::new("example.org");
    let script = doc.create_element("script");
    doc.set_attribute(script, "type", "math/tex; mode=display");
    doc.set_text(script, r"\det(A)");
    doc.append_child(doc.body(), script);
    let container = modern_container(&mut doc, None);

    let runtime = MathJaxRuntime::new("3.2.2");
    let extractor = attach(&runtime);
    assert_eq!(
        extractor.extract_for_container(&doc, &runtime, container),
        Some(r"\det(A)".to_string())
    );
}

#[test]
fn sibling_scan_stops_after_eight() {
    let mut doc = Document::new("example.org");
    let container = modern_container(&mut doc, None);
    for _ in 0..8 {
        let spacer = doc.create_element("p");
        doc.append_child(doc.body(), spacer);
    }
    let script = doc.create_element("script");
    doc.set_attribute(script, "type", "math/tex");
    doc.set_text(script, "x");
    doc.append_child(doc.body(), script);

    let runtime = MathJaxRuntime::new("3.2.2");
    let extractor = attach(&runtime);
    assert_eq!(extractor.extract_for_container(&doc, &runtime, container), None);
}

#[test]
fn attribute_fallback_order_includes_data_original() {
    let mut doc = Document::new("example.org");
    let container = modern_container(&mut doc, None);
    doc.set_attribute(container, "data-original", "from-original");

    let runtime = MathJaxRuntime::new("3.2.2");
    let extractor = attach(&runtime);
    assert_eq!(
        extractor.extract_for_container(&doc, &runtime, container),
        Some("from-original".to_string())
    );
}

// =============================================================================
// Triggers and broadcasting
// =============================================================================

#[test]
fn hover_on_container_broadcasts_with_mjx_id() {
    let mut doc = Document::new("example.org");
    let container = modern_container(&mut doc, Some("3"));
    doc.set_attribute(container, "data-tex", r"\sigma");
    let child = doc.children(container)[0];

    let runtime = MathJaxRuntime::new("3.2.2");
    let extractor = attach(&runtime);
    let mut channel = Channel::new();
    extractor.on_mouse_over(&doc, &runtime, &mut channel, &MouseEvent::over(child));

    let mut slot = RelaySlot::new(WINDOW);
    slot.pump(&mut channel);
    let result = slot.latest().expect("broadcast should be delivered");
    assert_eq!(result.latex, r"\sigma");
    assert_eq!(result.mjx_id.as_deref(), Some("3"));
}

#[test]
fn hover_outside_any_container_broadcasts_nothing() {
    let mut doc = Document::new("example.org");
    let plain = doc.create_element("p");
    doc.append_child(doc.body(), plain);

    let runtime = MathJaxRuntime::new("3.2.2");
    let extractor = attach(&runtime);
    let mut channel = Channel::new();
    extractor.on_mouse_over(&doc, &runtime, &mut channel, &MouseEvent::over(plain));

    assert!(channel.is_empty());
}

#[test]
fn extraction_failure_broadcasts_nothing() {
    let mut doc = Document::new("example.org");
    let container = modern_container(&mut doc, None);

    let runtime = MathJaxRuntime::new("3.2.2");
    let extractor = attach(&runtime);
    let mut channel = Channel::new();
    extractor.on_click(&doc, &runtime, &mut channel, &MouseEvent::over(container));

    assert!(channel.is_empty());
}

#[test]
fn mutation_records_trigger_extraction_per_added_container() {
    let mut doc = Document::new("example.org");
    let wrapper = doc.create_element("div");
    doc.append_child(doc.body(), wrapper);
    for tex in ["one", "two"] {
        let container = doc.create_element("mjx-container");
        doc.set_attribute(container, "data-tex", tex);
        doc.append_child(wrapper, container);
    }

    let runtime = MathJaxRuntime::new("3.2.2");
    let extractor = attach(&runtime);
    let mut channel = Channel::new();
    extractor.on_mutations(
        &doc,
        &runtime,
        &mut channel,
        &[MutationRecord { added: vec![wrapper] }],
    );

    assert_eq!(received(&mut channel), vec!["one", "two"]);
}

#[test]
fn initial_scan_covers_legacy_shapes_and_does_not_deduplicate() {
    let mut doc = Document::new("example.org");
    let container = modern_container(&mut doc, None);
    doc.set_attribute(container, "data-tex", "modern");
    let legacy = doc.create_element("span");
    doc.add_class(legacy, "MathJax");
    doc.set_attribute(legacy, "data-tex", "legacy");
    doc.append_child(doc.body(), legacy);

    let runtime = MathJaxRuntime::new("3.2.2");
    let extractor = attach(&runtime);
    let mut channel = Channel::new();
    extractor.initial_scan(&doc, &runtime, &mut channel);
    extractor.initial_scan(&doc, &runtime, &mut channel);

    // Two passes, two broadcasts per container: repeats are not filtered
    assert_eq!(received(&mut channel), vec!["modern", "legacy", "modern", "legacy"]);
}
