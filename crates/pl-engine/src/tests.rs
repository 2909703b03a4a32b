use std::collections::BTreeMap;

use pl_core::{PromptValue, RenderError, RenderLimits};

use crate::functions::FunctionRegistry;
use crate::include::MapLoader;
use crate::interpreter::Renderer;

fn npc_state() -> BTreeMap<String, PromptValue> {
    let mut npc = BTreeMap::new();
    npc.insert("name".to_string(), PromptValue::String("Lydia".to_string()));
    npc.insert("level".to_string(), PromptValue::Number(7.0));

    let mut moods = BTreeMap::new();
    moods.insert("calm".to_string(), PromptValue::Number(0.8));
    moods.insert("angry".to_string(), PromptValue::Number(0.1));

    let mut root = BTreeMap::new();
    root.insert("npc".to_string(), PromptValue::Map(npc));
    root.insert("moods".to_string(), PromptValue::Map(moods));
    root.insert(
        "party".to_string(),
        PromptValue::List(vec![
            PromptValue::String("Lydia".to_string()),
            PromptValue::String("Faendal".to_string()),
            PromptValue::String("Marcurio".to_string()),
        ]),
    );
    root.insert("empty_list".to_string(), PromptValue::List(Vec::new()));
    root.insert("empty_map".to_string(), PromptValue::Map(BTreeMap::new()));
    root
}

fn try_render_with(
    source: &str,
    state: BTreeMap<String, PromptValue>,
    loader: &MapLoader,
    limits: &RenderLimits,
) -> Result<String, RenderError> {
    let functions = FunctionRegistry::builtin();
    Renderer::new(state, loader, &functions, limits).render_source(source, None)
}

fn try_render(source: &str, loader: &MapLoader) -> Result<String, RenderError> {
    try_render_with(source, npc_state(), loader, &RenderLimits::default())
}

fn render(source: &str) -> String {
    try_render(source, &MapLoader::default()).expect("render should pass")
}

#[test]
fn interpolation_and_stringification_rules() {
    assert_eq!(render("Hello {{ npc.name }}!"), "Hello Lydia!");
    assert_eq!(render("{{ npc.level }}"), "7");
    assert_eq!(render("{{ npc.level / 2 }}"), "3.5");
    assert_eq!(render("{{ npc.missing }}"), "");
    assert_eq!(render("{{ npc.nonexistent.deep }}"), "");
    assert_eq!(render("{{ party }}{{ moods }}"), "");
    assert_eq!(render("{{ npc.level > 3 }}"), "true");
    assert_eq!(render("{{ null }}"), "");
}

#[test]
fn literal_whitespace_survives_untouched() {
    assert_eq!(render("  a \n\n b  "), "  a \n\n b  ");
    assert_eq!(render("a\n{% set x = 1 %}\nb"), "a\n\nb");
    assert_eq!(render("x{# comment #}y"), "xy");
}

#[test]
fn if_follows_the_truthiness_table() {
    for falsy in [
        "null",
        "false",
        "0",
        "''",
        "empty_list",
        "empty_map",
        "npc.missing",
    ] {
        let source = format!("{{% if {} %}}T{{% else %}}F{{% endif %}}", falsy);
        assert_eq!(
            try_render(&source, &MapLoader::default()).expect("render should pass"),
            "F",
            "condition: {}",
            falsy
        );
    }
    for truthy in ["true", "1", "'0'", "npc", "party", "npc.name"] {
        let source = format!("{{% if {} %}}T{{% else %}}F{{% endif %}}", truthy);
        assert_eq!(
            try_render(&source, &MapLoader::default()).expect("render should pass"),
            "T",
            "condition: {}",
            truthy
        );
    }
}

#[test]
fn if_without_matching_arm_or_else_renders_nothing() {
    assert_eq!(render("a{% if npc.missing %}X{% endif %}b"), "ab");
    assert_eq!(
        render("{% if false %}A{% elif npc.level > 100 %}B{% endif %}"),
        ""
    );
    assert_eq!(
        render("{% if false %}A{% elif npc.level > 1 %}B{% else %}C{% endif %}"),
        "B"
    );
}

#[test]
fn for_iterates_lists_with_loop_metadata() {
    assert_eq!(
        render("{% for member in party %}{{ loop.index }}:{{ member }} {% endfor %}"),
        "1:Lydia 2:Faendal 3:Marcurio "
    );
    assert_eq!(
        render(
            "{% for member in party %}{% if loop.first %}[{% endif %}{{ member }}\
             {% if not loop.last %}, {% endif %}{% if loop.last %}]{% endif %}{% endfor %}"
        ),
        "[Lydia, Faendal, Marcurio]"
    );
    assert_eq!(
        render("{% for member in party %}{{ loop.index0 }}/{{ loop.length }} {% endfor %}"),
        "0/3 1/3 2/3 "
    );
}

#[test]
fn for_iterates_maps_as_key_value_entries_in_key_order() {
    assert_eq!(
        render("{% for mood in moods %}{{ mood.key }}={{ mood.value }};{% endfor %}"),
        "angry=0.1;calm=0.8;"
    );
}

#[test]
fn empty_and_non_iterable_loops_run_zero_times() {
    assert_eq!(render("a{% for x in empty_list %}X{% endfor %}b"), "ab");
    assert_eq!(render("a{% for x in empty_map %}X{% endfor %}b"), "ab");
    assert_eq!(render("a{% for x in npc.name %}X{% endfor %}b"), "ab");
    assert_eq!(render("a{% for x in npc.missing %}X{% endfor %}b"), "ab");
    assert_eq!(render("a{% for x in 42 %}X{% endfor %}b"), "ab");
}

#[test]
fn loop_variables_are_scoped_to_the_iteration() {
    assert_eq!(
        render("{% for member in party %}{{ member }}{% endfor %}{{ member }}"),
        "LydiaFaendalMarcurio"
    );
}

#[test]
fn set_binds_into_the_current_frame() {
    assert_eq!(
        render("{% set greeting = 'Well met' %}{{ greeting }}, {{ npc.name }}"),
        "Well met, Lydia"
    );
    // A set inside a loop frame does not leak out of it.
    assert_eq!(
        render("{% for x in party %}{% set inner = x %}{% endfor %}{{ inner }}"),
        ""
    );
    assert_eq!(
        render("{% set level = npc.level + 1 %}{{ level }}"),
        "8"
    );
}

#[test]
fn blocks_fall_back_to_their_own_body() {
    assert_eq!(
        render("{% block tone %}Stay in character.{% endblock %}"),
        "Stay in character."
    );
}

#[test]
fn later_block_in_same_document_wins_everywhere() {
    assert_eq!(
        render("{% block tone %}first{% endblock %}|{% block tone %}second{% endblock %}"),
        "second|second"
    );
}

#[test]
fn including_file_overrides_included_blocks_regardless_of_order() {
    let loader = MapLoader::from_entries(&[(
        "base.prompt",
        "[{% block tone %}generic{% endblock %}]",
    )]);

    let override_before = "{% block tone %}follower{% endblock %}{% include 'base.prompt' %}";
    let override_after = "{% include 'base.prompt' %}{% block tone %}follower{% endblock %}";

    assert_eq!(
        try_render(override_before, &loader).expect("render should pass"),
        "follower[follower]"
    );
    assert_eq!(
        try_render(override_after, &loader).expect("render should pass"),
        "[follower]follower"
    );
}

#[test]
fn block_overrides_compose_transitively_across_include_chains() {
    let loader = MapLoader::from_entries(&[
        (
            "middle.prompt",
            "{% block rank %}housecarl{% endblock %}{% include 'deep.prompt' %}",
        ),
        ("deep.prompt", "<{% block rank %}citizen{% endblock %}>"),
    ]);
    assert_eq!(
        try_render("{% include 'middle.prompt' %}", &loader).expect("render should pass"),
        "housecarl<housecarl>"
    );
}

#[test]
fn includes_render_in_their_own_scope_frame() {
    let loader = MapLoader::from_entries(&[
        ("sub.prompt", "{% set local = 'hidden' %}{{ npc.name }}"),
    ]);
    assert_eq!(
        try_render("{% include 'sub.prompt' %}|{{ local }}", &loader)
            .expect("render should pass"),
        "Lydia|"
    );
}

#[test]
fn nested_includes_resolve_relative_to_the_including_file() {
    let loader = MapLoader::from_entries(&[
        ("npc/follower.prompt", "{% include 'shared/tone.prompt' %}"),
        ("npc/shared/tone.prompt", "calm"),
    ]);
    assert_eq!(
        try_render("{% include 'npc/follower.prompt' %}", &loader)
            .expect("render should pass"),
        "calm"
    );
}

#[test]
fn include_cycle_is_detected_not_overflowed() {
    let loader = MapLoader::from_entries(&[
        ("a.prompt", "{% include 'b.prompt' %}"),
        ("b.prompt", "{% include 'a.prompt' %}"),
    ]);
    let error = try_render("{% include 'a.prompt' %}", &loader)
        .expect_err("cycle should be rejected");
    assert_eq!(error.code, "INCLUDE_CYCLE");
    assert!(error.message.contains("a.prompt -> b.prompt -> a.prompt"));
}

#[test]
fn self_include_is_detected_when_root_reference_is_known() {
    let loader = MapLoader::from_entries(&[("a.prompt", "{% include 'a.prompt' %}")]);
    let functions = FunctionRegistry::builtin();
    let limits = RenderLimits::default();
    let error = Renderer::new(npc_state(), &loader, &functions, &limits)
        .render_source("{% include 'a.prompt' %}", Some("a.prompt"))
        .expect_err("self include should be rejected");
    assert_eq!(error.code, "INCLUDE_CYCLE");
}

#[test]
fn missing_template_is_distinguishable_from_parse_errors() {
    let error = try_render("{% include 'missing.prompt' %}", &MapLoader::default())
        .expect_err("missing template should fail");
    assert_eq!(error.code, "TEMPLATE_NOT_FOUND");
}

#[test]
fn escaping_reference_is_rejected_with_its_line() {
    let error = try_render("\n{% include '../outside.prompt' %}", &MapLoader::default())
        .expect_err("escape should be rejected");
    assert_eq!(error.code, "INCLUDE_ESCAPES_ROOT");
    assert_eq!(error.line, Some(2));
}

#[test]
fn syntax_errors_inside_includes_abort_the_whole_render() {
    let loader = MapLoader::from_entries(&[("bad.prompt", "{% frobnicate %}")]);
    let error = try_render("before {% include 'bad.prompt' %}", &loader)
        .expect_err("included syntax error should abort");
    assert_eq!(error.code, "PARSE_UNKNOWN_DIRECTIVE");
}

#[test]
fn include_depth_limit_aborts_pathological_chains() {
    let loader = MapLoader::from_entries(&[("loop.prompt", "{% include 'loop2.prompt' %}"),
        ("loop2.prompt", "{% include 'loop.prompt' %}")]);
    let limits = RenderLimits {
        max_include_depth: 1,
        ..RenderLimits::default()
    };
    let error = try_render_with(
        "{% include 'loop.prompt' %}",
        npc_state(),
        &loader,
        &limits,
    )
    .expect_err("depth limit should trip before the cycle check");
    assert_eq!(error.code, "RENDER_LIMIT_EXCEEDED");
}

#[test]
fn loop_iteration_limit_aborts_large_nested_loops() {
    let limits = RenderLimits {
        max_loop_iterations: 5,
        ..RenderLimits::default()
    };
    let error = try_render_with(
        "{% for a in party %}{% for b in party %}x{% endfor %}{% endfor %}",
        npc_state(),
        &MapLoader::default(),
        &limits,
    )
    .expect_err("iteration limit should trip");
    assert_eq!(error.code, "RENDER_LIMIT_EXCEEDED");
}

#[test]
fn output_budget_aborts_runaway_text() {
    let limits = RenderLimits {
        max_output_bytes: 16,
        ..RenderLimits::default()
    };
    let error = try_render_with(
        "{% for member in party %}a very long chunk of text {% endfor %}",
        npc_state(),
        &MapLoader::default(),
        &limits,
    )
    .expect_err("output budget should trip");
    assert_eq!(error.code, "RENDER_LIMIT_EXCEEDED");
}

#[test]
fn nested_same_name_blocks_resolve_to_the_innermost_body() {
    // Registration recurses into block bodies, so the inner declaration is
    // the one left in the table when the outer site emits.
    assert_eq!(
        render("{% block a %}{% block a %}x{% endblock %}{% endblock %}"),
        "x"
    );
}

#[test]
fn renders_are_idempotent() {
    let loader = MapLoader::from_entries(&[(
        "base.prompt",
        "{% block tone %}generic{% endblock %}",
    )]);
    let source =
        "{% include 'base.prompt' %}{% for m in party %}{{ m }},{% endfor %}{{ npc.level * 3 }}";
    let first = try_render(source, &loader).expect("render should pass");
    let second = try_render(source, &loader).expect("render should pass");
    assert_eq!(first, second);
    assert_eq!(first, "genericLydia,Faendal,Marcurio,21");
}
