use super::CompileError;
use crate::frame::{FrameConstants, TILE_HEIGHT, TILE_WIDTH};

/// Name of the compute entry point every shader must export.
pub const ENTRY_POINT: &str = "cs_main";

/// Resources the frame loop binds for the compute shader (all in group 0).
///
/// The layout also supplies the WGSL declarations shared with the host
/// (`FrameConstants`, `FrameTarget`, `Accumulation`, `TILE_W`, `TILE_H`), so a
/// shader file never restates them. They are appended after the user's
/// source; WGSL module scope is order-independent and diagnostics keep the
/// file's own line numbers.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FrameLayout {
    texel: naga::StorageFormat,
    texel_name: &'static str,
}

impl FrameLayout {
    pub const CONSTANTS_BINDING: u32 = 0;
    pub const TARGET_BINDING: u32 = 1;
    pub const ACCUMULATION_BINDING: u32 = 2;

    /// Bytes of accumulation storage per pixel (`vec4<f32>`).
    pub const ACCUMULATION_TEXEL_SIZE: u64 = 16;

    /// Returns `None` if `target_format` cannot back a storage view.
    pub fn new(target_format: wgpu::TextureFormat) -> Option<Self> {
        let (texel, texel_name) = match target_format {
            wgpu::TextureFormat::Rgba8Unorm => (naga::StorageFormat::Rgba8Unorm, "rgba8unorm"),
            wgpu::TextureFormat::Bgra8Unorm => (naga::StorageFormat::Bgra8Unorm, "bgra8unorm"),
            wgpu::TextureFormat::Rgba16Float => (naga::StorageFormat::Rgba16Float, "rgba16float"),
            _ => return None,
        };

        Some(Self { texel, texel_name })
    }

    /// Host-side declarations appended to every shader.
    pub fn prelude(&self) -> String {
        format!(
            "
struct FrameConstants {{
    frame: u32,
    time: f32,
    render_width: f32,
    render_height: f32,
}}

const TILE_W: u32 = {TILE_WIDTH}u;
const TILE_H: u32 = {TILE_HEIGHT}u;

alias FrameTarget = texture_storage_2d<{texel}, write>;
alias Accumulation = array<vec4<f32>>;
",
            texel = self.texel_name,
        )
    }

    /// Parses and validates `source` against this layout.
    ///
    /// Returns the complete WGSL (user source + prelude) ready to hand to the
    /// device. Nothing here touches the GPU, so a broken edit never reaches
    /// pipeline creation.
    pub fn prepare(&self, source: &str, origin: &str) -> Result<String, CompileError> {
        let full = format!("{source}\n{}", self.prelude());

        let module = naga::front::wgsl::parse_str(&full)
            .map_err(|e| CompileError::new(origin, e.emit_to_string(&full)))?;

        naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::default(),
        )
        .validate(&module)
        .map_err(|e| CompileError::new(origin, e.emit_to_string(&full)))?;

        self.check_entry_point(&module)
            .and_then(|()| self.check_bindings(&module))
            .and_then(|()| check_overrides(&module))
            .map_err(|msg| CompileError::new(origin, msg))?;

        Ok(full)
    }

    fn check_entry_point(&self, module: &naga::Module) -> Result<(), String> {
        let entry = module
            .entry_points
            .iter()
            .find(|ep| ep.name == ENTRY_POINT)
            .ok_or_else(|| format!("entry point `{ENTRY_POINT}` not found"))?;

        if entry.stage != naga::ShaderStage::Compute {
            return Err(format!("`{ENTRY_POINT}` must be a @compute entry point"));
        }

        let [x, y, z] = entry.workgroup_size;
        if [x, y, z] != [TILE_WIDTH, TILE_HEIGHT, 1] {
            return Err(format!(
                "`{ENTRY_POINT}` has @workgroup_size({x}, {y}, {z}), dispatch assumes \
                 ({TILE_WIDTH}, {TILE_HEIGHT}, 1); use @workgroup_size(TILE_W, TILE_H)"
            ));
        }

        Ok(())
    }

    fn check_bindings(&self, module: &naga::Module) -> Result<(), String> {
        let mut layouter = naga::proc::Layouter::default();
        layouter.update(module.to_ctx()).map_err(|e| e.to_string())?;

        for (_, var) in module.global_variables.iter() {
            let Some(binding) = &var.binding else { continue };
            let name = var.name.as_deref().unwrap_or("<unnamed>");

            if binding.group != 0 {
                return Err(format!(
                    "`{name}` is bound at group {}; only group 0 is provided",
                    binding.group
                ));
            }

            let expected = match binding.binding {
                Self::CONSTANTS_BINDING => {
                    if var.space == naga::AddressSpace::Uniform {
                        check_binding_size(name, layouter[var.ty].size, FrameConstants::SIZE)?;
                        continue;
                    }
                    "var<uniform> FrameConstants".to_string()
                }
                Self::TARGET_BINDING => {
                    if self.is_frame_target(&module.types[var.ty].inner) {
                        continue;
                    }
                    format!("texture_storage_2d<{}, write> (FrameTarget)", self.texel_name)
                }
                Self::ACCUMULATION_BINDING => {
                    let read_write = naga::StorageAccess::LOAD | naga::StorageAccess::STORE;
                    if let naga::AddressSpace::Storage { access } = var.space {
                        if access.contains(read_write) {
                            check_binding_size(
                                name,
                                layouter[var.ty].size,
                                Self::ACCUMULATION_TEXEL_SIZE,
                            )?;
                            continue;
                        }
                    }
                    "var<storage, read_write> Accumulation".to_string()
                }
                other => {
                    return Err(format!(
                        "`{name}` uses binding {other}; only bindings 0..=2 are provided"
                    ));
                }
            };

            return Err(format!(
                "`{name}` at binding {} must be declared as {expected}",
                binding.binding
            ));
        }

        Ok(())
    }

    fn is_frame_target(&self, inner: &naga::TypeInner) -> bool {
        matches!(
            inner,
            naga::TypeInner::Image {
                dim: naga::ImageDimension::D2,
                arrayed: false,
                class: naga::ImageClass::Storage { format, access },
            } if *format == self.texel && *access == naga::StorageAccess::STORE
        )
    }
}

// The smallest buffer the shader accepts must fit what the layout guarantees.
// A runtime-sized array counts as one element.
fn check_binding_size(name: &str, size: u32, provided: u64) -> Result<(), String> {
    if u64::from(size) > provided {
        return Err(format!(
            "`{name}` needs at least {size} bytes, the frame layout binds {provided}"
        ));
    }
    Ok(())
}

// No pipeline constants are supplied at pipeline creation.
fn check_overrides(module: &naga::Module) -> Result<(), String> {
    for (_, constant) in module.overrides.iter() {
        if constant.init.is_none() {
            let name = constant.name.as_deref().unwrap_or("<unnamed>");
            return Err(format!("override `{name}` needs a default value"));
        }
    }
    Ok(())
}
