use std::borrow::Cow;

use wgpu::naga::ShaderStage;

use crate::types::InitError;

/// Compiles GLSL through naga, turning validation failures into [`InitError::Shader`].
///
/// `create_shader_module` reports problems through the device error callback,
/// so the call is wrapped in a validation error scope and the scope is
/// resolved before returning.
pub(crate) fn compile_glsl(
    device: &wgpu::Device,
    label: &str,
    source: &str,
    stage: ShaderStage,
) -> Result<wgpu::ShaderModule, InitError> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Borrowed(source),
            stage,
            defines: &[],
        },
    });
    if let Some(error) = pollster::block_on(device.pop_error_scope()) {
        return Err(InitError::Shader {
            label: label.to_string(),
            code: source.to_string(),
            log: error.to_string(),
        });
    }
    tracing::debug!(label, "compiled shader");
    Ok(module)
}

/// Uniform block shared by every stage. Must match `SceneUniforms`.
const SCENE_BLOCK: &str = r"layout(std140, set = 0, binding = 0) uniform Scene {
    vec4 viewport;
    vec4 dot_color;
    vec4 text_rect;
} scene;

vec2 pixel_to_ndc(vec2 pixel) {
    return vec2(pixel.x / scene.viewport.x * 2.0 - 1.0, 1.0 - pixel.y / scene.viewport.y * 2.0);
}
";

const DOT_VERTEX_HEAD: &str = r"#version 450
layout(location = 0) in vec2 a_center;
layout(location = 1) in float a_radius;
layout(location = 0) out vec2 v_local;
layout(location = 1) out float v_radius;
";

/// Expands each dot instance into a screen-space quad one pixel larger than
/// the dot so the rim can fade out.
const DOT_VERTEX_BODY: &str = r"
vec2 unit_corner(int index) {
    float x = (index == 1 || index == 2 || index == 4) ? 1.0 : 0.0;
    float y = (index == 2 || index == 4 || index == 5) ? 1.0 : 0.0;
    return vec2(x, y);
}

void main() {
    vec2 corner = unit_corner(gl_VertexIndex) * 2.0 - 1.0;
    float extent = a_radius + 1.0;
    v_local = corner * extent;
    v_radius = a_radius;
    gl_Position = vec4(pixel_to_ndc(a_center + v_local), 0.0, 1.0);
}
";

const DOT_FRAGMENT_HEAD: &str = r"#version 450
layout(location = 0) in vec2 v_local;
layout(location = 1) in float v_radius;
layout(location = 0) out vec4 outColor;
";

const DOT_FRAGMENT_BODY: &str = r"
void main() {
    float coverage = clamp(v_radius - length(v_local) + 0.5, 0.0, 1.0);
    outColor = vec4(scene.dot_color.rgb, scene.dot_color.a * coverage);
}
";

const TEXT_VERTEX_HEAD: &str = r"#version 450
layout(location = 0) out vec2 v_uv;
";

const TEXT_VERTEX_BODY: &str = r"
vec2 unit_corner(int index) {
    float x = (index == 1 || index == 2 || index == 4) ? 1.0 : 0.0;
    float y = (index == 2 || index == 4 || index == 5) ? 1.0 : 0.0;
    return vec2(x, y);
}

void main() {
    vec2 corner = unit_corner(gl_VertexIndex);
    vec2 pixel = scene.text_rect.xy + corner * scene.text_rect.zw;
    v_uv = corner;
    gl_Position = vec4(pixel_to_ndc(pixel), 0.0, 1.0);
}
";

const TEXT_FRAGMENT: &str = r"#version 450
layout(location = 0) in vec2 v_uv;
layout(location = 0) out vec4 outColor;

layout(set = 1, binding = 0) uniform texture2D text_texture;
layout(set = 1, binding = 1) uniform sampler text_sampler;

void main() {
    outColor = texture(sampler2D(text_texture, text_sampler), v_uv);
}
";

pub(crate) fn dot_vertex_source() -> String {
    [DOT_VERTEX_HEAD, SCENE_BLOCK, DOT_VERTEX_BODY].concat()
}

pub(crate) fn dot_fragment_source() -> String {
    [DOT_FRAGMENT_HEAD, SCENE_BLOCK, DOT_FRAGMENT_BODY].concat()
}

pub(crate) fn text_vertex_source() -> String {
    [TEXT_VERTEX_HEAD, SCENE_BLOCK, TEXT_VERTEX_BODY].concat()
}

pub(crate) fn text_fragment_source() -> String {
    TEXT_FRAGMENT.to_string()
}
