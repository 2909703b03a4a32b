pub mod state;

use std::collections::BTreeMap;

use pl_core::{PromptValue, RenderError, RenderLimits, RenderOutput};
use pl_engine::{split_sections, FunctionRegistry, Renderer};

pub use pl_core::{Message, Role};
pub use pl_engine::{resolve_reference, MapLoader, TemplateLoader};
pub use state::{
    ActionInfo, ChatTurn, GameEvent, NpcInfo, PlayerInfo, Scenario, SceneInfo,
    SimulationStateBuilder,
};

/// Renders template source against a state map. Every call allocates its
/// own scope stack and block table; the loader is only consulted for
/// `{% include %}` directives.
pub fn render(
    template_source: &str,
    state: BTreeMap<String, PromptValue>,
    loader: &dyn TemplateLoader,
) -> Result<RenderOutput, RenderError> {
    render_with_limits(template_source, state, loader, &RenderLimits::default())
}

pub fn render_with_limits(
    template_source: &str,
    state: BTreeMap<String, PromptValue>,
    loader: &dyn TemplateLoader,
    limits: &RenderLimits,
) -> Result<RenderOutput, RenderError> {
    let functions = FunctionRegistry::builtin();
    let rendered_text = Renderer::new(state, loader, &functions, limits)
        .render_source(template_source, None)?;
    let messages = split_sections(&rendered_text)?;
    Ok(RenderOutput {
        messages,
        rendered_text,
    })
}

/// Renders a template the loader itself serves, so relative includes
/// resolve against the template's own directory and self-inclusion is
/// reported as a cycle.
pub fn render_ref(
    reference: &str,
    state: BTreeMap<String, PromptValue>,
    loader: &dyn TemplateLoader,
    limits: &RenderLimits,
) -> Result<RenderOutput, RenderError> {
    let resolved = resolve_reference("", reference)?;
    let template_source = loader.load(&resolved)?;
    let functions = FunctionRegistry::builtin();
    let rendered_text = Renderer::new(state, loader, &functions, limits)
        .render_source(&template_source, Some(&resolved))?;
    let messages = split_sections(&rendered_text)?;
    Ok(RenderOutput {
        messages,
        rendered_text,
    })
}
